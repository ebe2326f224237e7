//! Execution contexts
//!
//! The blocking primitives need three things from the thread subsystem:
//! an identity for the running context, a way to give up the processor
//! until somebody wakes us, and a way to tell whether the running
//! context is allowed to block at all.
//!
//! Identities are [ThreadId]s and are compared by value. Blocking is
//! done with [park](std::thread::park), wrapped in a [Parker] so that
//! a wakeup that arrives before the sleep is never lost.

use core::cell::Cell;
use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, Thread, ThreadId};

thread_local! {
    static IN_INTERRUPT: Cell<bool> = const { Cell::new(false) };
}

/// Returns the identity of the running context
pub fn current() -> ThreadId {
    thread::current().id()
}

/// Returns true if the running context must not block
pub fn in_interrupt() -> bool {
    IN_INTERRUPT.with(Cell::get)
}

/// Marks the running context as non-blockable while alive.
///
/// This models an interrupt handler: any attempt to sleep on a
/// [Semaphore](crate::Semaphore) while an `InterruptContext` is alive
/// is a fatal error.
///
/// # Example
/// ```
/// use synch::thread::{self, InterruptContext};
///
/// assert!(!thread::in_interrupt());
/// {
///     let _irq = InterruptContext::enter();
///     assert!(thread::in_interrupt());
/// }
/// assert!(!thread::in_interrupt());
/// ```
#[must_use = "the context stops being an interrupt context when this is dropped"]
pub struct InterruptContext {
    prev: bool,
    /* Tied to the thread that entered it */
    _not_send: PhantomData<*const ()>,
}

impl InterruptContext {
    /// Enters an interrupt context on the running thread
    pub fn enter() -> Self {
        let prev = IN_INTERRUPT.replace(true);
        Self { prev, _not_send: PhantomData }
    }
}

impl Drop for InterruptContext {
    fn drop(&mut self) {
        IN_INTERRUPT.set(self.prev);
    }
}

/// A sleeping context, as stored in a [wait channel](crate::wchan::WaitChannel)
pub(crate) struct Parker {
    thread: Thread,
    woken: AtomicBool,
}

impl Parker {
    /// Creates a parker for the running context
    pub(crate) fn current() -> Self {
        Self {
            thread: thread::current(),
            woken: AtomicBool::new(false),
        }
    }

    /// Blocks the running context until [unpark](Self::unpark) is called.
    ///
    /// Must be called from the thread that created the parker.
    pub(crate) fn park(&self) {
        while !self.woken.load(Ordering::Acquire) {
            thread::park();
        }
    }

    /// Wakes the context that owns this parker
    pub(crate) fn unpark(&self) {
        self.woken.store(true, Ordering::Release);
        self.thread.unpark();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn identities_differ_between_threads() {
        let me = current();
        let other = std::thread::spawn(current).join().unwrap();
        assert_eq!(me, current());
        assert_ne!(me, other);
    }

    #[test]
    fn interrupt_context_nests() {
        let outer = InterruptContext::enter();
        {
            let _inner = InterruptContext::enter();
            assert!(in_interrupt());
        }
        assert!(in_interrupt());
        drop(outer);
        assert!(!in_interrupt());
    }

    #[test]
    fn interrupt_flag_is_per_thread() {
        let _irq = InterruptContext::enter();
        let other = std::thread::spawn(in_interrupt).join().unwrap();
        assert!(!other);
    }

    #[test]
    fn unpark_before_park_is_not_lost() {
        let parker = Parker::current();
        parker.unpark();
        parker.park();
    }

    #[test]
    fn unpark_from_another_thread() {
        let parker = Arc::new(Parker::current());
        let p = Arc::clone(&parker);
        let waker = std::thread::spawn(move || p.unpark());
        parker.park();
        waker.join().unwrap();
    }
}
