//! Condition Variable
//!
//! [Condition variables](Condvar) provide a way to block a thread
//! while waiting for an event to occur.
//!
//! A `Condvar` is used together with a [Mutex] guarding some shared
//! state. Every call takes that mutex as an argument, and the caller must
//! hold it. The pairing is a convention: nothing stops two different
//! mutexes being used with the same condition variable, but not holding
//! the mutex you pass is caught at runtime.
//!
//! # signal vs broadcast
//! [`signal`] wakes one waiting thread, [`broadcast`] wakes all of
//! them. Either way, a woken thread does not return from [`wait`] until
//! it has reacquired the mutex on its own: ownership is never handed
//! over by the signaler.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::thread;
//! use synch::{Condvar, Mutex};
//!
//! let shared = Arc::new((Mutex::new("ready lock"), Condvar::new("ready cv"), AtomicBool::new(false)));
//!
//! let s = Arc::clone(&shared);
//! let waiter = thread::spawn(move || {
//!     let (lock, cv, ready) = &*s;
//!     lock.acquire();
//!     cv.wait_while(lock, || !ready.load(Ordering::Relaxed));
//!     println!("ready");
//!     lock.release();
//! });
//!
//! let (lock, cv, ready) = &*shared;
//! lock.acquire();
//! ready.store(true, Ordering::Relaxed);
//! cv.signal(lock);
//! lock.release();
//!
//! waiter.join().unwrap();
//! ```
//!
//! [`signal`]: Condvar::signal
//! [`broadcast`]: Condvar::broadcast
//! [`wait`]: Condvar::wait

use log::{debug, trace};

use crate::error::{self, Result};
use crate::mutex::Mutex;
use crate::spin::SpinLock;
use crate::wchan::WaitChannel;

/// A Conditional Variable
///
/// Condvar provides a way to block a thread
/// while waiting for an event to occur.
pub struct Condvar {
    name: String,
    spin: SpinLock<()>,
    wchan: WaitChannel,
}

impl Condvar {
    /// Creates a new [Condvar]
    pub fn new(name: &str) -> Self {
        Self::with_name(name.to_owned())
    }

    /// Like [new](Self::new), but reports allocation failure
    pub fn try_new(name: &str) -> Result<Self> {
        error::try_copy_name(name, "condition variable").map(Self::with_name)
    }

    fn with_name(name: String) -> Self {
        debug!("cv {name}: created");
        Self {
            name,
            spin: SpinLock::new(()),
            wchan: WaitChannel::new(),
        }
    }

    /// Releases `lock`, sleeps until another thread calls
    /// [signal](Self::signal) or [broadcast](Self::broadcast), and
    /// reacquires `lock` before returning.
    ///
    /// Releasing `lock` and going to sleep happen as one step for any
    /// concurrent `signal` on this condition variable, so a wakeup sent
    /// after the caller released `lock` is never missed.
    ///
    /// The thread may also wake when the condition variable is dropped,
    /// so callers should recheck their condition in a loop, or use
    /// [wait_while](Self::wait_while).
    ///
    /// # Panics
    /// If the caller doesn't hold `lock`
    pub fn wait(&self, lock: &Mutex) {
        self.assert_held(lock, "wait");

        let guard = self.spin.lock();
        lock.release();
        trace!("cv {}: sleeping", self.name);
        self.wchan.sleep(guard);
        lock.acquire();
    }

    /// Like [wait](Self::wait), but keeps waiting while `predicate` returns true.
    /// The predicate is checked with `lock` held, before the first wait too.
    ///
    /// # Example
    /// ```
    /// use synch::{Condvar, Mutex};
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicI32, Ordering};
    /// use std::thread;
    ///
    /// let shared = Arc::new((Mutex::new("lk"), Condvar::new("cv"), AtomicI32::new(10)));
    /// let s = Arc::clone(&shared);
    ///
    /// let counter = thread::spawn(move || {
    ///     let (lock, cv, n) = &*s;
    ///     for _ in 0..10 {
    ///         lock.acquire();
    ///         n.fetch_sub(1, Ordering::Relaxed);
    ///         cv.signal(lock);
    ///         lock.release();
    ///     }
    /// });
    ///
    /// let (lock, cv, n) = &*shared;
    /// lock.acquire();
    /// cv.wait_while(lock, || n.load(Ordering::Relaxed) > 0);
    /// assert_eq!(n.load(Ordering::Relaxed), 0);
    /// lock.release();
    ///
    /// counter.join().unwrap();
    /// ```
    pub fn wait_while<F>(&self, lock: &Mutex, mut predicate: F)
    where
        F: FnMut() -> bool
    {
        while predicate() {
            self.wait(lock);
        }
    }

    /// Wakes up one thread [waiting](Self::wait) on this `Condvar`, if any.
    /// To wake up all of them, use [broadcast](Self::broadcast)
    ///
    /// # Panics
    /// If the caller doesn't hold `lock`
    pub fn signal(&self, lock: &Mutex) {
        self.assert_held(lock, "signal");

        let guard = self.spin.lock();
        if self.wchan.wake_one(&guard) {
            trace!("cv {}: signaled a waiter", self.name);
        }
    }

    /// Wakes up all threads [waiting](Self::wait) on this `Condvar`.
    ///
    /// # Panics
    /// If the caller doesn't hold `lock`
    pub fn broadcast(&self, lock: &Mutex) {
        self.assert_held(lock, "broadcast");

        let guard = self.spin.lock();
        let woken = self.wchan.wake_all(&guard);
        trace!("cv {}: broadcast woke {woken} waiters", self.name);
    }

    /// Returns the name given at creation
    pub fn name(&self) -> &str {
        &self.name
    }

    fn assert_held(&self, lock: &Mutex, op: &str) {
        assert!(
            lock.held_by_caller(),
            "cv {}: {op} without holding lock {}",
            self.name,
            lock.name()
        );
    }
}

impl Drop for Condvar {
    fn drop(&mut self) {
        let guard = self.spin.lock();
        let woken = self.wchan.wake_all(&guard);
        drop(guard);
        debug!("cv {}: destroyed, woke {woken} waiters", self.name);
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct Shared {
        lock: Mutex,
        cv: Condvar,
        flag: AtomicBool,
        count: AtomicUsize,
    }

    fn shared() -> Arc<Shared> {
        Arc::new(Shared {
            lock: Mutex::new("lk"),
            cv: Condvar::new("cv"),
            flag: AtomicBool::new(false),
            count: AtomicUsize::new(0),
        })
    }

    #[test]
    fn wait_returns_with_lock_held() {
        let s = shared();
        let s1 = Arc::clone(&s);
        let waiter = std::thread::spawn(move || {
            s1.lock.acquire();
            s1.cv.wait_while(&s1.lock, || !s1.flag.load(Ordering::Relaxed));
            let held = s1.lock.held_by_caller();
            s1.lock.release();
            held
        });

        s.lock.acquire();
        s.flag.store(true, Ordering::Relaxed);
        s.cv.signal(&s.lock);
        s.lock.release();

        assert!(waiter.join().unwrap());
    }

    /* A waits holding L, B takes L, signals, releases. Repeated to shake out
     * a wakeup slipping between A releasing L and A going to sleep. */
    #[test]
    fn no_lost_wakeups() {
        const ROUNDS: usize = 10_000;
        let s = shared();

        let s1 = Arc::clone(&s);
        let ponger = std::thread::spawn(move || {
            for round in 1..=ROUNDS {
                s1.lock.acquire();
                s1.cv.wait_while(&s1.lock, || s1.count.load(Ordering::Relaxed) < round);
                s1.flag.store(true, Ordering::Relaxed);
                s1.cv.signal(&s1.lock);
                s1.lock.release();
            }
        });

        for _ in 0..ROUNDS {
            s.lock.acquire();
            s.count.fetch_add(1, Ordering::Relaxed);
            s.cv.signal(&s.lock);
            s.cv.wait_while(&s.lock, || !s.flag.load(Ordering::Relaxed));
            s.flag.store(false, Ordering::Relaxed);
            s.lock.release();
        }

        ponger.join().unwrap();
    }

    #[test]
    fn broadcast_wakes_all() {
        const K: usize = 8;
        let s = shared();

        let waiters = (0..K).map(|_| {
            let s = Arc::clone(&s);
            std::thread::spawn(move || {
                s.lock.acquire();
                s.count.fetch_add(1, Ordering::Relaxed);
                s.cv.wait_while(&s.lock, || !s.flag.load(Ordering::Relaxed));
                s.lock.release();
            })
        }).collect::<Vec<_>>();

        loop {
            s.lock.acquire();
            let ready = s.count.load(Ordering::Relaxed) == K;
            if ready {
                s.flag.store(true, Ordering::Relaxed);
                s.cv.broadcast(&s.lock);
            }
            s.lock.release();
            if ready { break }
            std::thread::sleep(Duration::from_millis(1));
        }

        for w in waiters { w.join().unwrap() }
    }

    #[test]
    fn signal_wakes_one() {
        let s = shared();

        let waiters = (0..2).map(|_| {
            let s = Arc::clone(&s);
            std::thread::spawn(move || {
                s.lock.acquire();
                s.cv.wait(&s.lock);
                s.count.fetch_add(1, Ordering::SeqCst);
                s.lock.release();
            })
        }).collect::<Vec<_>>();

        while s.cv.wchan.len() < 2 {
            std::thread::sleep(Duration::from_millis(1));
        }

        s.lock.acquire();
        s.cv.signal(&s.lock);
        s.lock.release();
        while s.count.load(Ordering::SeqCst) < 1 {
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(s.cv.wchan.len(), 1);

        s.lock.acquire();
        s.cv.signal(&s.lock);
        s.lock.release();

        for w in waiters { w.join().unwrap() }
        assert_eq!(s.count.load(Ordering::SeqCst), 2);
    }

    #[test]
    #[should_panic(expected = "signal without holding lock")]
    fn signal_without_lock() {
        let s = shared();
        s.cv.signal(&s.lock);
    }

    #[test]
    #[should_panic(expected = "broadcast without holding lock")]
    fn broadcast_without_lock() {
        let lock = Mutex::new("lk");
        let cv = Condvar::new("cv");
        cv.broadcast(&lock);
    }

    #[test]
    fn wait_with_lock_held_elsewhere() {
        let s = shared();
        s.lock.acquire();
        let s1 = Arc::clone(&s);
        let res = std::thread::spawn(move || s1.cv.wait(&s1.lock)).join();
        assert!(res.is_err());
        s.lock.release();
    }
}
