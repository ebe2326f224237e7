//! Test drivers
//!
//! Each driver forks a set of threads against a shared primitive, waits
//! for all of them on a [Semaphore], and reports an [Outcome]. A driver
//! that deadlocks never returns: catching that is up to whoever runs it.

use core::fmt;
use core::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{info, trace};

use crate::error::Result;
use crate::rendezvous::{Rendezvous, Role};
use crate::rwlock::RwLock;
use crate::semaphore::Semaphore;

/// The result of running a driver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub name: &'static str,
    pub passed: bool,
    pub detail: Option<String>,
}

impl Outcome {
    fn pass(name: &'static str) -> Self {
        Self { name, passed: true, detail: None }
    }

    fn fail(name: &'static str, detail: String) -> Self {
        Self { name, passed: false, detail: Some(detail) }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.passed, &self.detail) {
            (true, _) => write!(f, "{}: SUCCESS", self.name),
            (false, Some(detail)) => write!(f, "{}: FAIL ({detail})", self.name),
            (false, None) => write!(f, "{}: FAIL", self.name),
        }
    }
}

/// Signals a finish semaphore when dropped, so a thread that dies on a
/// failed assertion still lets the driver go on
struct Finish(Arc<Semaphore>);

impl Drop for Finish {
    fn drop(&mut self) {
        self.0.inc();
    }
}

fn fork<F>(name: String, finished: &Arc<Semaphore>, body: F) -> Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    let finish = Finish(Arc::clone(finished));
    let handle = thread::Builder::new().name(name).spawn(move || {
        let _finish = finish;
        body();
    })?;
    Ok(handle)
}

/// Waits for every thread through `finished`, then joins them.
/// Returns how many of them panicked
fn collect(finished: &Semaphore, handles: Vec<JoinHandle<()>>) -> usize {
    for _ in 0..handles.len() {
        finished.dec();
    }
    handles
        .into_iter()
        .map(JoinHandle::join)
        .filter(|res| res.is_err())
        .count()
}

/// Configuration of [rwtest]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RwTestConfig {
    pub writers: usize,
    pub readers: usize,
    pub writer_iterations: usize,
    pub reader_iterations: usize,
}

impl Default for RwTestConfig {
    fn default() -> Self {
        Self {
            writers: 2,
            readers: 10,
            writer_iterations: 100,
            reader_iterations: 10,
        }
    }
}

#[derive(Default)]
struct Inside {
    readers: AtomicUsize,
    writers: AtomicUsize,
    violations: AtomicUsize,
}

impl Inside {
    fn enter_write(&self) {
        let writers = self.writers.fetch_add(1, Ordering::SeqCst);
        if writers != 0 || self.readers.load(Ordering::SeqCst) != 0 {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn leave_write(&self) {
        self.writers.fetch_sub(1, Ordering::SeqCst);
    }

    fn enter_read(&self) {
        self.readers.fetch_add(1, Ordering::SeqCst);
        if self.writers.load(Ordering::SeqCst) != 0 {
            self.violations.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn leave_read(&self) {
        self.readers.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Forks writers and readers against one [RwLock], checking on every
/// entry that writers are alone and readers never meet a writer.
///
/// # Errors
/// If a thread can't be forked. Threads forked before the failure are
/// left to finish on their own.
pub fn rwtest(config: &RwTestConfig) -> Result<Outcome> {
    const NAME: &str = "rwt1";

    let rwlock = Arc::new(RwLock::try_new("readwrite test")?);
    let finished = Arc::new(Semaphore::try_new("threads_finish", 0)?);
    let inside = Arc::new(Inside::default());
    let mut handles = Vec::with_capacity(config.writers + config.readers);

    for num in 0..config.writers {
        let (rwlock, inside) = (Arc::clone(&rwlock), Arc::clone(&inside));
        let iterations = config.writer_iterations;
        handles.push(fork(format!("writer {num}"), &finished, move || {
            for i in 0..iterations {
                rwlock.acquire_write();
                inside.enter_write();
                trace!("write thread {num} {i}");
                thread::yield_now();
                inside.leave_write();
                rwlock.release_write();
            }
        })?);
        info!("writer thread created");
    }

    for num in 0..config.readers {
        let (rwlock, inside) = (Arc::clone(&rwlock), Arc::clone(&inside));
        let iterations = config.reader_iterations;
        handles.push(fork(format!("reader {num}"), &finished, move || {
            for i in 0..iterations {
                rwlock.acquire_read();
                inside.enter_read();
                trace!("read thread {num} {i}");
                thread::yield_now();
                inside.leave_read();
                rwlock.release_read();
            }
        })?);
        info!("reader thread created");
    }

    let panicked = collect(&finished, handles);
    let readers_left = rwlock.readers();
    info!("rwtest end");

    let violations = inside.violations.load(Ordering::SeqCst);
    let outcome = if panicked > 0 {
        Outcome::fail(NAME, format!("{panicked} threads panicked"))
    } else if violations > 0 {
        Outcome::fail(NAME, format!("{violations} exclusion violations"))
    } else if readers_left > 0 {
        Outcome::fail(NAME, format!("{readers_left} readers left inside"))
    } else {
        Outcome::pass(NAME)
    };
    Ok(outcome)
}

/// Configuration of [whalemating]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WhaleConfig {
    /// Threads forked for each role
    pub per_role: usize,
}

impl Default for WhaleConfig {
    fn default() -> Self {
        Self { per_role: 10 }
    }
}

/// Forks `per_role` threads of every [Role] against one [Rendezvous],
/// and checks that every one of them got out through exactly
/// `per_role` matches.
///
/// # Errors
/// If a thread can't be forked. Threads already forked may stay blocked
/// forever, since their counterparts never arrive.
pub fn whalemating(config: &WhaleConfig) -> Result<Outcome> {
    const NAME: &str = "sp1";

    let rendezvous = Arc::new(Rendezvous::try_new()?);
    let finished = Arc::new(Semaphore::try_new("whalemating finish", 0)?);
    let mut handles = Vec::with_capacity(config.per_role * Role::ALL.len());

    for index in 0..config.per_role {
        for role in Role::ALL {
            let rendezvous = Arc::clone(&rendezvous);
            handles.push(fork(format!("{role} whale {index}"), &finished, move || {
                trace!("{role} {index} starting");
                rendezvous.enter(role);
                trace!("{role} {index} ending");
            })?);
        }
    }
    info!("whalemating: forked {} threads", handles.len());

    let panicked = collect(&finished, handles);
    let matches = rendezvous.matches();
    let stranded = Role::ALL.iter().map(|&role| rendezvous.population(role)).sum::<usize>();
    info!("whalemating: {matches} matches");

    let outcome = if panicked > 0 {
        Outcome::fail(NAME, format!("{panicked} threads panicked"))
    } else if stranded > 0 {
        Outcome::fail(NAME, format!("{stranded} whales left inside"))
    } else if matches != config.per_role {
        Outcome::fail(NAME, format!("{matches} matches, expected {}", config.per_role))
    } else {
        Outcome::pass(NAME)
    };
    Ok(outcome)
}
