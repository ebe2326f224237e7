//! Counting semaphore

use log::{debug, trace};

use crate::error::{self, Result};
use crate::spin::SpinLock;
use crate::thread;
use crate::wchan::WaitChannel;

/// A counting semaphore
///
/// [dec](Semaphore::dec) ("P") blocks while the count is 0, and
/// [inc](Semaphore::inc) ("V") wakes one blocked context. Waiters are
/// not served in FIFO order: a context arriving after an `inc` may take
/// the unit before one that was already sleeping.
///
/// # Example
/// ```no_run
/// use synch::Semaphore;
/// use std::{sync::Arc, thread, time::Duration};
///
/// let semaphore = Arc::new(Semaphore::new("example", 0));
///
/// let sem1 = Arc::clone(&semaphore);
/// let wait_t = thread::spawn(move || {
///     for _ in 0..3 {
///         sem1.dec();
///         println!("Thread 1 decremented");
///     }
/// });
///
/// let sem2 = Arc::clone(&semaphore);
/// let writer_t = thread::spawn(move || {
///     for _ in 0..4 {
///         println!("Thread 2 increments");
///         sem2.inc();
///         thread::sleep(Duration::from_millis(100));
///     }
/// });
///
/// wait_t.join().unwrap();
/// writer_t.join().unwrap();
///
/// assert_eq!(semaphore.value(), 1);
/// ```
pub struct Semaphore {
    name: String,
    count: SpinLock<u32>,
    wchan: WaitChannel,
}

impl Semaphore {

    /// Creates a new semaphore with an initial `count`
    pub fn new(name: &str, count: u32) -> Self {
        Self::with_name(name.to_owned(), count)
    }

    /// Like [new](Self::new), but reports allocation failure
    pub fn try_new(name: &str, count: u32) -> Result<Self> {
        let name = error::try_copy_name(name, "semaphore")?;
        Ok(Self::with_name(name, count))
    }

    fn with_name(name: String, count: u32) -> Self {
        debug!("semaphore {name}: created with count {count}");
        Self {
            name,
            count: SpinLock::new(count),
            wchan: WaitChannel::new(),
        }
    }

    /// Decrements the semaphore ("P").
    /// If the count is 0, blocks until it is > 0
    ///
    /// # Panics
    /// If called from an [interrupt context](crate::thread::InterruptContext),
    /// even when the call would not need to block.
    pub fn dec(&self) {
        assert!(
            !thread::in_interrupt(),
            "semaphore {}: dec called from an interrupt context",
            self.name
        );

        let mut count = self.count.lock();
        while *count == 0 {
            trace!("semaphore {}: sleeping", self.name);
            self.wchan.sleep(count);
            count = self.count.lock();
        }
        *count -= 1;
    }

    /// Attempts to decrement the semaphore.
    /// If the count is 0, returns `false` instead of blocking
    pub fn try_dec(&self) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return false
        }
        *count -= 1;
        true
    }

    /// Increments the semaphore ("V"), waking one waiter
    ///
    /// # Panics
    /// If the count would overflow
    pub fn inc(&self) {
        let mut count = self.count.lock();
        *count = match count.checked_add(1) {
            Some(n) => n,
            None => panic!("semaphore {}: count overflow", self.name),
        };
        if self.wchan.wake_one(&count) {
            trace!("semaphore {}: woke a waiter", self.name);
        }
    }

    /// Returns the state of the counter
    pub fn value(&self) -> u32 {
        *self.count.lock()
    }

    /// Returns the name given at creation
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        debug!("semaphore {}: destroyed with count {}", self.name, self.count.get_mut());
        if !std::thread::panicking() {
            assert!(
                self.wchan.is_empty(),
                "semaphore {}: destroyed with waiters",
                self.name
            );
        }
    }
}
