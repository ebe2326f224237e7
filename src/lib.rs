/*  Copyright (C) 2025 Saúl Valdelvira
 *
 *  This program is free software: you can redistribute it and/or modify
 *  it under the terms of the GNU General Public License as published by
 *  the Free Software Foundation, version 3.
 *
 *  This program is distributed in the hope that it will be useful,
 *  but WITHOUT ANY WARRANTY; without even the implied warranty of
 *  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *  GNU General Public License for more details.
 *
 *  You should have received a copy of the GNU General Public License
 *  along with this program.  If not, see <https://www.gnu.org/licenses/>. */

//! Blocking synchronization primitives
//!
//! Everything here is built from two pieces: a [SpinLock](spin::SpinLock)
//! for very short critical sections, and a [WaitChannel](wchan::WaitChannel)
//! where contexts sleep until an event wakes them. No primitive busy-waits
//! while it's blocked.
//!
//! The following synchronization primitives are implemented
//! - [Semaphore]
//! - [Mutex]
//! - [Condvar]
//! - [RwLock]
//!
//! On top of them, [rendezvous] solves a three-party matching problem, and
//! [harness] has the drivers that stress the reader-writer lock and the
//! rendezvous.
//!
//! Broken preconditions, like releasing a lock owned by another thread or
//! signaling a condition variable without holding its lock, panic.
//!
//! # Examples
//! ## Semaphore
//! ```
//! use synch::Semaphore;
//! use std::sync::Arc;
//!
//! let done = Arc::new(Semaphore::new("done", 0));
//!
//! let threads = (0..10).map(|_| {
//!     let done = Arc::clone(&done);
//!     std::thread::spawn(move || done.inc())
//! }).collect::<Vec<_>>();
//!
//! for _ in 0..10 {
//!     done.dec();
//! }
//! for t in threads {
//!     t.join().unwrap();
//! }
//! assert_eq!(done.value(), 0);
//! ```
//!
//! ## Reader-writer test
//! ```
//! use synch::harness::{self, RwTestConfig};
//!
//! let config = RwTestConfig { writers: 1, readers: 4, ..Default::default() };
//! let outcome = harness::rwtest(&config).unwrap();
//! assert!(outcome.passed);
//! ```

pub mod error;
pub use error::{Error, Result};

pub mod spin;
pub mod thread;
pub mod wchan;

pub mod semaphore;
pub use semaphore::Semaphore;

pub mod mutex;
pub use mutex::{Mutex, MutexGuard};

pub mod condvar;
pub use condvar::Condvar;

pub mod rwlock;
pub use rwlock::RwLock;

pub mod rendezvous;

pub mod harness;
