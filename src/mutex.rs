//! A sleeping mutual exclusion lock, with ownership tracking
//!
//! Unlike the [SpinLock](crate::spin::SpinLock), a [Mutex] puts the
//! contending context to sleep on a wait channel. It also remembers which
//! context holds it, so that a release by anybody else is caught.
//!
//! The mutex does not wrap any data: it guards whatever state its users
//! agree to touch only while holding it. That makes it usable with a
//! [Condvar](crate::Condvar), and lets it be acquired in one place and
//! released in another through [acquire](Mutex::acquire) and
//! [release](Mutex::release). For scoped use, [lock](Mutex::lock) returns
//! a guard that releases on drop.

use core::marker::PhantomData;
use std::thread::ThreadId;

use log::{debug, trace};

use crate::error::{self, Result};
use crate::spin::SpinLock;
use crate::thread;
use crate::wchan::WaitChannel;

/// Who may [release](Mutex::release) a [Mutex]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleasePolicy {
    /// Only the context that acquired the lock may release it
    Owned,
    /// Any context may release the lock, as long as it is held.
    ///
    /// Used by the [RwLock](crate::RwLock), where the first reader in
    /// takes the lock and the last reader out gives it back.
    Handoff,
}

struct State {
    held: bool,
    owner: Option<ThreadId>,
}

/// A mutual exclusion lock.
///
/// # Example
/// ```
/// use synch::Mutex;
/// use std::sync::Arc;
/// use std::sync::atomic::{AtomicU32, Ordering};
///
/// let lock = Arc::new(Mutex::new("counter"));
/// let counter = Arc::new(AtomicU32::new(0));
///
/// let threads = (0..10).map(|_| {
///     let lock = Arc::clone(&lock);
///     let counter = Arc::clone(&counter);
///     std::thread::spawn(move || {
///         let _guard = lock.lock();
///         let n = counter.load(Ordering::Relaxed);
///         counter.store(n + 1, Ordering::Relaxed);
///     })
/// }).collect::<Vec<_>>();
///
/// for t in threads {
///     t.join().unwrap();
/// }
/// assert_eq!(counter.load(Ordering::Relaxed), 10);
/// ```
pub struct Mutex {
    name: String,
    policy: ReleasePolicy,
    state: SpinLock<State>,
    wchan: WaitChannel,
}

/// A guard for a [Mutex], created by [Mutex::lock]
///
/// The mutex is released when the guard drops. The guard can't leave
/// the thread that acquired the lock.
#[must_use = "if unused, the lock will release automatically"]
pub struct MutexGuard<'a> {
    mutex: &'a Mutex,
    _not_send: PhantomData<*const ()>,
}

impl Drop for MutexGuard<'_> {
    fn drop(&mut self) {
        self.mutex.release();
    }
}

impl MutexGuard<'_> {
    /// Returns the mutex this guard holds
    pub fn mutex(&self) -> &Mutex {
        self.mutex
    }
}

impl Mutex {
    /// Creates a new, unheld, `Mutex`
    pub fn new(name: &str) -> Self {
        Self::with_policy(name.to_owned(), ReleasePolicy::Owned)
    }

    /// Like [new](Self::new), but reports allocation failure
    pub fn try_new(name: &str) -> Result<Self> {
        let name = error::try_copy_name(name, "lock")?;
        Ok(Self::with_policy(name, ReleasePolicy::Owned))
    }

    /// Creates a mutex that any context may release.
    /// See [ReleasePolicy::Handoff]
    pub fn handoff(name: &str) -> Self {
        Self::with_policy(name.to_owned(), ReleasePolicy::Handoff)
    }

    /// Like [handoff](Self::handoff), but reports allocation failure
    pub fn try_handoff(name: &str) -> Result<Self> {
        let name = error::try_copy_name(name, "lock")?;
        Ok(Self::with_policy(name, ReleasePolicy::Handoff))
    }

    fn with_policy(name: String, policy: ReleasePolicy) -> Self {
        debug!("lock {name}: created ({policy:?})");
        Self {
            name,
            policy,
            state: SpinLock::new(State { held: false, owner: None }),
            wchan: WaitChannel::new(),
        }
    }

    /// Acquires the lock, sleeping until it's available
    ///
    /// # Panics
    /// If the caller already owns an [Owned](ReleasePolicy::Owned) lock,
    /// since it would sleep forever.
    pub fn acquire(&self) {
        let me = thread::current();
        let mut state = self.state.lock();
        if self.policy == ReleasePolicy::Owned {
            assert!(
                !(state.held && state.owner == Some(me)),
                "lock {}: acquired twice by the same thread",
                self.name
            );
        }
        while state.held {
            trace!("lock {}: sleeping", self.name);
            self.wchan.sleep(state);
            state = self.state.lock();
        }
        state.held = true;
        state.owner = Some(me);
    }

    /// Acquires the lock if it's available, without sleeping.
    /// Returns whether the lock was acquired
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.held {
            return false
        }
        state.held = true;
        state.owner = Some(thread::current());
        true
    }

    /// Releases the lock, waking one waiter
    ///
    /// # Panics
    /// - If the lock is not held
    /// - If the caller is not the owner, unless the lock was built
    ///   with [ReleasePolicy::Handoff]
    pub fn release(&self) {
        let mut state = self.state.lock();
        assert!(state.held, "lock {}: released while not held", self.name);
        if self.policy == ReleasePolicy::Owned {
            assert!(
                state.owner == Some(thread::current()),
                "lock {}: released by a thread that doesn't own it",
                self.name
            );
        }
        state.held = false;
        state.owner = None;
        if self.wchan.wake_one(&state) {
            trace!("lock {}: woke a waiter", self.name);
        }
    }

    /// Acquires the lock, returning a guard that releases it on drop
    pub fn lock(&self) -> MutexGuard<'_> {
        self.acquire();
        MutexGuard { mutex: self, _not_send: PhantomData }
    }

    /// Returns true if the calling context holds the lock.
    ///
    /// Meant for assertions: by the time the caller looks at the answer
    /// for some other thread, it may already be stale.
    pub fn held_by_caller(&self) -> bool {
        let state = self.state.lock();
        state.held && state.owner == Some(thread::current())
    }

    /// Returns true if any context holds the lock
    pub fn is_held(&self) -> bool {
        self.state.lock().held
    }

    /// Returns the release policy of this lock
    pub fn policy(&self) -> ReleasePolicy {
        self.policy
    }

    /// Returns the name given at creation
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for Mutex {
    fn drop(&mut self) {
        debug!("lock {}: destroyed", self.name);
        if !std::thread::panicking() {
            assert!(!self.state.get_mut().held, "lock {}: destroyed while held", self.name);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn acquire_release() {
        let lock = Mutex::new("lk");
        assert!(!lock.held_by_caller());
        lock.acquire();
        assert!(lock.held_by_caller());
        assert!(lock.is_held());
        assert!(!lock.try_acquire());
        lock.release();
        assert!(!lock.is_held());
        assert!(lock.try_acquire());
        lock.release();
    }

    #[test]
    fn guard_releases_on_drop() {
        let lock = Mutex::try_new("guarded").unwrap();
        {
            let guard = lock.lock();
            assert!(guard.mutex().held_by_caller());
        }
        assert!(!lock.is_held());
    }

    #[test]
    fn not_held_by_other_threads() {
        let lock = Arc::new(Mutex::new("lk"));
        let _guard = lock.lock();
        let l = Arc::clone(&lock);
        let seen = std::thread::spawn(move || l.held_by_caller()).join().unwrap();
        assert!(!seen);
        assert!(lock.held_by_caller());
    }

    #[test]
    fn mutual_exclusion() {
        let lock = Arc::new(Mutex::new("lk"));
        let inside = Arc::new(AtomicUsize::new(0));
        let total = Arc::new(AtomicUsize::new(0));

        let handles = (0..8).map(|_| {
            let lock = Arc::clone(&lock);
            let inside = Arc::clone(&inside);
            let total = Arc::clone(&total);
            std::thread::spawn(move || {
                for _ in 0..200 {
                    lock.acquire();
                    assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                    let n = total.load(Ordering::Relaxed);
                    std::thread::yield_now();
                    total.store(n + 1, Ordering::Relaxed);
                    inside.fetch_sub(1, Ordering::SeqCst);
                    lock.release();
                }
            })
        }).collect::<Vec<_>>();

        for h in handles { h.join().unwrap() }
        assert_eq!(total.load(Ordering::Relaxed), 1600);
    }

    #[test]
    #[should_panic(expected = "released while not held")]
    fn release_unheld() {
        let lock = Mutex::new("lk");
        lock.release();
    }

    #[test]
    #[should_panic(expected = "released while not held")]
    fn double_release() {
        let lock = Mutex::new("lk");
        lock.acquire();
        lock.release();
        lock.release();
    }

    #[test]
    fn release_by_non_owner() {
        let lock = Arc::new(Mutex::new("lk"));
        lock.acquire();
        let l = Arc::clone(&lock);
        let res = std::thread::spawn(move || l.release()).join();
        assert!(res.is_err());
        assert!(lock.held_by_caller());
        lock.release();
    }

    #[test]
    fn handoff_release_by_other_thread() {
        let lock = Arc::new(Mutex::handoff("handoff"));
        assert_eq!(lock.policy(), ReleasePolicy::Handoff);
        lock.acquire();
        let l = Arc::clone(&lock);
        std::thread::spawn(move || l.release()).join().unwrap();
        assert!(!lock.is_held());
    }

    #[test]
    #[should_panic(expected = "acquired twice")]
    fn recursive_acquire() {
        let lock = Mutex::new("lk");
        lock.acquire();
        lock.acquire();
    }

    #[test]
    #[should_panic(expected = "destroyed while held")]
    fn drop_while_held() {
        let lock = Mutex::new("lk");
        lock.acquire();
        drop(lock);
    }
}
