//! A read-write lock

use core::marker::PhantomData;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use log::debug;

use crate::error::{self, Result};
use crate::mutex::Mutex;

/// A read-write lock
///
/// This lock allows an arbitrary amount of readers, or a single writer
/// at the same time.
///
/// It is built from two [Mutex]es. The *admission* mutex guards the
/// reader count. The *exclusion* mutex is held while a writer is inside,
/// or while at least one reader is: the first reader in acquires it and
/// the last reader out releases it. Those two readers are usually
/// different threads, so the exclusion mutex is a
/// [handoff](crate::mutex::ReleasePolicy::Handoff) lock.
///
/// There is no writer priority: a steady stream of readers can keep a
/// writer waiting indefinitely.
///
/// # Example
/// ```
/// use synch::RwLock;
///
/// let rw = RwLock::new("example");
/// {
///     let _r1 = rw.read();
///     let _r2 = rw.read();
///     assert_eq!(rw.readers(), 2);
/// }
/// {
///     let _w = rw.write();
///     assert!(rw.is_writing());
/// }
/// ```
pub struct RwLock {
    name: String,
    readers: AtomicUsize,
    /* Set only while a writer holds `exclusion` */
    writer: AtomicBool,
    admission: Mutex,
    exclusion: Mutex,
}

/// A read guard for a [RwLock], created by [RwLock::read].
///
/// Read access may be given back from any thread, so this guard is `Send`.
#[must_use = "if unused, the lock will release automatically"]
pub struct RwLockReadGuard<'a> {
    rwlock: &'a RwLock,
}

impl Drop for RwLockReadGuard<'_> {
    fn drop(&mut self) {
        self.rwlock.release_read();
    }
}

/// A write guard for a [RwLock], created by [RwLock::write]
#[must_use = "if unused, the lock will release automatically"]
pub struct RwLockWriteGuard<'a> {
    rwlock: &'a RwLock,
    _not_send: PhantomData<*const ()>,
}

impl Drop for RwLockWriteGuard<'_> {
    fn drop(&mut self) {
        self.rwlock.release_write();
    }
}

impl RwLock {
    /// Creates a new, unlocked, `RwLock`
    pub fn new(name: &str) -> Self {
        debug!("rwlock {name}: created");
        Self {
            name: name.to_owned(),
            readers: AtomicUsize::new(0),
            writer: AtomicBool::new(false),
            admission: Mutex::new(name),
            exclusion: Mutex::handoff(name),
        }
    }

    /// Like [new](Self::new), but reports allocation failure
    pub fn try_new(name: &str) -> Result<Self> {
        let admission = Mutex::try_new(name)?;
        let exclusion = Mutex::try_handoff(name)?;
        let name = error::try_copy_name(name, "rwlock")?;
        debug!("rwlock {name}: created");
        Ok(Self {
            name,
            readers: AtomicUsize::new(0),
            writer: AtomicBool::new(false),
            admission,
            exclusion,
        })
    }

    /// Enters as a reader, sleeping while a writer is inside
    pub fn acquire_read(&self) {
        self.admission.acquire();
        /* The reader count is only touched with the admission lock held */
        if self.readers.load(Ordering::Relaxed) == 0 {
            self.exclusion.acquire();
        }
        self.readers.fetch_add(1, Ordering::Relaxed);
        self.admission.release();
    }

    /// Leaves as a reader. The last reader out lets writers in
    ///
    /// # Panics
    /// If there are no readers inside
    pub fn release_read(&self) {
        self.admission.acquire();
        let readers = self.readers.load(Ordering::Relaxed);
        if readers == 0 {
            self.admission.release();
            panic!("rwlock {}: release_read without readers", self.name);
        }
        self.readers.store(readers - 1, Ordering::Relaxed);
        if readers == 1 {
            self.exclusion.release();
        }
        self.admission.release();
    }

    /// Enters as a writer, sleeping while anybody else is inside
    pub fn acquire_write(&self) {
        self.exclusion.acquire();
        self.writer.store(true, Ordering::Release);
    }

    /// Leaves as a writer
    ///
    /// # Panics
    /// If the caller isn't the writer inside
    pub fn release_write(&self) {
        assert!(
            self.exclusion.held_by_caller() && self.is_writing(),
            "rwlock {}: release_write by a thread that isn't writing",
            self.name
        );
        self.writer.store(false, Ordering::Release);
        self.exclusion.release();
    }

    /// Locks `self` for reading, until the returned guard drops
    pub fn read(&self) -> RwLockReadGuard<'_> {
        self.acquire_read();
        RwLockReadGuard { rwlock: self }
    }

    /// Locks `self` for writing, until the returned guard drops
    pub fn write(&self) -> RwLockWriteGuard<'_> {
        self.acquire_write();
        RwLockWriteGuard { rwlock: self, _not_send: PhantomData }
    }

    /// Returns the number of readers inside
    pub fn readers(&self) -> usize {
        self.readers.load(Ordering::Relaxed)
    }

    /// Returns true if a writer is inside
    pub fn is_writing(&self) -> bool {
        self.writer.load(Ordering::Acquire)
    }

    /// Returns the name given at creation
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for RwLock {
    fn drop(&mut self) {
        debug!("rwlock {}: destroyed", self.name);
        if !std::thread::panicking() {
            let readers = *self.readers.get_mut();
            assert!(readers == 0, "rwlock {}: destroyed with {readers} readers", self.name);
            assert!(!*self.writer.get_mut(), "rwlock {}: destroyed with a writer inside", self.name);
        }
    }
}
