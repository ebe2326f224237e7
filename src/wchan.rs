//! Wait channels
//!
//! A [WaitChannel] is a queue of sleeping contexts associated with an
//! event. It is always used together with a [SpinLock] owned by the
//! primitive: the caller checks its condition under that lock and, if it
//! has to wait, hands the guard to [sleep](WaitChannel::sleep).
//!
//! The caller is queued *before* its guard is released, and wakers must
//! hold the same guard. So a wakeup can never slip in between "decide to
//! wait" and "actually sleep".

use std::collections::VecDeque;
use std::sync::Arc;

use crate::spin::{SpinLock, SpinLockGuard};
use crate::thread::Parker;

/// A queue of contexts waiting for an event.
///
/// While it has sleepers, a channel is bound to the [SpinLock] they passed
/// to [sleep](Self::sleep): later sleepers and wakers must hold that same
/// lock. Debug builds check it.
#[derive(Default)]
pub struct WaitChannel {
    sleepers: SpinLock<Sleepers>,
}

#[derive(Default)]
struct Sleepers {
    queue: VecDeque<Arc<Parker>>,
    /* Address of the sleepers' lock, meaningless while the queue is empty */
    lock: usize,
}

impl Sleepers {
    fn check_lock(&self, addr: usize) {
        debug_assert!(
            self.queue.is_empty() || self.lock == addr,
            "wait channel used with a lock other than its sleepers'"
        );
    }
}

impl WaitChannel {
    /// Creates an empty wait channel
    pub const fn new() -> Self {
        Self {
            sleepers: SpinLock::new(Sleepers { queue: VecDeque::new(), lock: 0 }),
        }
    }

    /// Queues the running context on this channel, releases `guard` and
    /// blocks until woken.
    ///
    /// The guard is not reacquired: callers that need to recheck their
    /// condition lock again after this returns.
    pub fn sleep<T>(&self, guard: SpinLockGuard<'_, T>) {
        let parker = Arc::new(Parker::current());
        {
            let mut sleepers = self.sleepers.lock();
            sleepers.check_lock(guard.lock_addr());
            sleepers.lock = guard.lock_addr();
            sleepers.queue.push_back(Arc::clone(&parker));
        }
        drop(guard);
        parker.park();
    }

    /// Wakes one sleeping context, if any. Returns whether one was woken.
    ///
    /// `held` is the guard of the lock the sleepers passed to
    /// [sleep](Self::sleep).
    pub fn wake_one<T>(&self, held: &SpinLockGuard<'_, T>) -> bool {
        let next = {
            let mut sleepers = self.sleepers.lock();
            sleepers.check_lock(held.lock_addr());
            sleepers.queue.pop_front()
        };
        match next {
            Some(parker) => {
                parker.unpark();
                true
            }
            None => false,
        }
    }

    /// Wakes every sleeping context. Returns how many were woken.
    pub fn wake_all<T>(&self, held: &SpinLockGuard<'_, T>) -> usize {
        let queue = {
            let mut sleepers = self.sleepers.lock();
            sleepers.check_lock(held.lock_addr());
            core::mem::take(&mut sleepers.queue)
        };
        for parker in &queue {
            parker.unpark();
        }
        queue.len()
    }

    /// Returns the number of queued contexts
    pub fn len(&self) -> usize {
        self.sleepers.lock().queue.len()
    }

    /// Returns true if no context is queued
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
