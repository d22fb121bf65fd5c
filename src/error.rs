//! Error taxonomy for the public `Meld` surface.
//!
//! Three kinds, mirroring the three ways an operation can go wrong:
//! bad arguments (rejected before any mutation), a domain failure
//! (missing/duplicate id, dead or empty block, failed merge condition),
//! and storage growth that could not be satisfied.

use thiserror::Error;

/// The single error type returned by every public operation.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Non-positive id, identical ids where distinct ones are required,
    /// invalid ability value, or a negative aura / prior-fight count.
    #[error("invalid input")]
    InvalidInput,

    /// The operation is well-formed but cannot be applied to the current
    /// state. Nothing was mutated.
    #[error("operation failed")]
    Failed,

    /// Fallible storage growth could not be satisfied.
    #[error("out of memory")]
    OutOfMemory,
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;
