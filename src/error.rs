//! Errors reported by this crate
//!
//! Only recoverable conditions are represented here. Broken preconditions
//! (releasing a lock you don't own, signaling without the lock, ...) are
//! programming errors and panic.

use core::fmt;
use std::io;

/// An error returned when building a primitive or running a test driver
#[derive(Debug)]
pub enum Error {
    /// Allocating the resources for a primitive failed
    OutOfMemory {
        /// The kind of primitive being created
        primitive: &'static str,
    },
    /// A test driver could not fork one of its threads
    Spawn(io::Error),
}

/// A [Result](core::result::Result) with this crate's [Error]
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::OutOfMemory { primitive } => write!(f, "out of memory creating {primitive}"),
            Self::Spawn(err) => write!(f, "thread fork failed: {err}"),
        }
    }
}

impl core::error::Error for Error {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Spawn(err) => Some(err),
            Self::OutOfMemory { .. } => None,
        }
    }
}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Self {
        Self::Spawn(err)
    }
}

/// Copies a primitive's name, reporting allocation failure instead of aborting
pub(crate) fn try_copy_name(name: &str, primitive: &'static str) -> Result<String> {
    let mut owned = String::new();
    owned
        .try_reserve_exact(name.len())
        .map_err(|_| Error::OutOfMemory { primitive })?;
    owned.push_str(name);
    Ok(owned)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn copies_names() {
        assert_eq!(try_copy_name("sem", "semaphore").unwrap(), "sem");
    }

    #[test]
    fn display() {
        let err = Error::OutOfMemory { primitive: "lock" };
        assert_eq!(err.to_string(), "out of memory creating lock");
    }
}
