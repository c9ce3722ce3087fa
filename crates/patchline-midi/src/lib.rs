//! Core message types for patchline.
//!
//! `Message`, `Payload`, and `PortId` are plain Copy values that move through
//! lock-free queues without touching the heap; `TimeBase` converts between
//! the seconds the public surface speaks and the frames the queues schedule
//! in.

pub mod error;
pub use error::{Error, Result};

mod message;
pub use message::{Message, Payload, PortId, MAX_PAYLOAD_LEN};

mod time;
pub use time::TimeBase;

#[cfg(feature = "serde")]
mod serde_support;
