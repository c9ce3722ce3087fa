//! Error types for the core message crate.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Payloads longer than the enforced maximum are rejected up front;
    /// message slots are fixed-size and never truncate.
    #[error("payload of {len} bytes exceeds the {max} byte maximum")]
    PayloadTooLarge { len: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, Error>;
