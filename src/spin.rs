//! The short lock, the core primitive of this crate
//!
//! A [SpinLock] protects the few words of state that every blocking
//! primitive keeps (a counter, an owner, a reader count). It is only ever
//! held for a handful of instructions, and never across a sleep: the
//! [wait channel](crate::wchan::WaitChannel) takes the guard by value
//! and releases it for the caller.

use core::cell::UnsafeCell;
use core::marker::PhantomData;
use core::ops::{Deref, DerefMut};
use core::sync::atomic::{AtomicBool, Ordering};

/// A spin lock protecting a value of type `T`.
pub struct SpinLock<T> {
    lock: AtomicBool,
    data: UnsafeCell<T>,
}

unsafe impl<T: Send> Sync for SpinLock<T> {}

/// A guard for the [SpinLock]
///
/// This structure represents a borrow of the spinlock.
/// When dropped, the [SpinLock] is marked as available again
#[must_use = "if unused, the lock will release automatically"]
pub struct SpinLockGuard<'a, T> {
    spin: &'a SpinLock<T>,
    /* Shares `T` like a `&mut T` would */
    _marker: PhantomData<&'a mut T>,
}

impl<T> SpinLockGuard<'_, T> {
    /// Address of the [SpinLock] this guard borrows
    pub(crate) fn lock_addr(&self) -> usize {
        core::ptr::from_ref(self.spin).addr()
    }
}

impl<T> Drop for SpinLockGuard<'_, T> {
    fn drop(&mut self) {
        self.spin.lock.store(false, Ordering::Release);
    }
}

impl<T> Deref for SpinLockGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        /* SAFETY: the guard is the only live borrow of the lock */
        unsafe { &*self.spin.data.get() }
    }
}

impl<T> DerefMut for SpinLockGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        unsafe { &mut *self.spin.data.get() }
    }
}

impl<T> SpinLock<T> {

    /// Creates a new `SpinLock` protecting `data`
    pub const fn new(data: T) -> Self {
        Self {
            lock: AtomicBool::new(false),
            data: UnsafeCell::new(data),
        }
    }

    /// If the lock is available, returns a [SpinLockGuard] inside a [Some] variant.
    /// If it's borrowed, which would've caused the thread to wait for the previous
    /// guard to drop, returns immediately with a [None] variant.
    pub fn try_lock(&self) -> Option<SpinLockGuard<'_, T>> {
        if self.lock
                  .compare_exchange(
                      false,
                      true,
                      Ordering::Acquire,
                      Ordering::Relaxed
                  ).is_ok()
        {
            Some(SpinLockGuard { spin: self, _marker: PhantomData })
        } else {
            None
        }
    }

    /// Waits for the lock to be available, and immediately
    /// borrows it, returning a [SpinLockGuard]
    ///
    /// This function spins until the lock is available.
    /// For a non-blocking alternative, see [try_lock](Self::try_lock)
    pub fn lock(&self) -> SpinLockGuard<'_, T> {
        loop {
            if let Some(guard) = self.try_lock() {
                return guard
            }
            while self.is_locked() {
                core::hint::spin_loop();
            }
        }
    }

    /// Returns true if the lock is currently borrowed
    pub fn is_locked(&self) -> bool {
        self.lock.load(Ordering::Relaxed)
    }

    /// Gets a mutable reference to the protected value.
    ///
    /// The `&mut self` receiver statically guarantees that no guard is
    /// alive, so no spinning is needed.
    pub fn get_mut(&mut self) -> &mut T {
        self.data.get_mut()
    }
}

impl<T: Default> Default for SpinLock<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}
