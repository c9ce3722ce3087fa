//! # patchline - timestamped MIDI scheduling over periodic callbacks
//!
//! Umbrella crate coordinating:
//! - **patchline-midi** - message, payload, and time-base types
//! - **patchline-client** - queues, period scheduler, client/port surface,
//!   and the driver seam (with an in-process loopback driver)
//!
//! Application code enqueues timestamped messages through ports; once per
//! period a real-time callback delivers due messages into per-port buffers at
//! collision-free offsets, re-bases everything still pending, and captures
//! inbound events for out-of-callback retrieval.
//!
//! ## Quick Start
//!
//! ```
//! use patchline::prelude::*;
//! use std::sync::Arc;
//!
//! # fn main() -> patchline::Result<()> {
//! let driver = Arc::new(LoopbackDriver::new(48_000));
//! let client = Client::new("sequencer", driver.clone());
//!
//! let out = client.register_port("out", PortDirection::Output)?;
//! let input = client.register_port("in", PortDirection::Input)?;
//! client.connect(&out, &input)?;
//!
//! // Queue a note-on for right now, then crank two periods: one to deliver,
//! // one for the loopback to hand it to the input side.
//! out.send(&[0x90, 0x40, 0x7F], 0.0)?;
//! driver.run_period(256);
//! driver.run_period(256);
//!
//! let note = input.receive().expect("delivered on the first period");
//! assert_eq!(note.bytes, vec![0x90, 0x40, 0x7F]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! - `loopback` (default) - in-process driver for tests and demos
//! - `serde` - serialization for the message value types

/// Re-export of patchline-midi for direct access
pub use patchline_midi as midi;

/// Re-export of patchline-client for direct access
pub use patchline_client as client;

// Core types
pub use patchline_midi::{Message, Payload, PortId, TimeBase, MAX_PAYLOAD_LEN};

// Client surface
pub use patchline_client::{
    CallbackId, Client, ClientBuilder, Diagnostic, DriverPort, Error, EventBuffer, MidiDriver,
    PeriodPorts, Port, PortDirection, PortInfo, ProcessCallback, ReceivedMessage, Result,
    MAX_PORTS_PER_CLIENT,
};

#[cfg(feature = "loopback")]
pub use patchline_client::LoopbackDriver;

pub mod prelude {
    //! Common imports for applications.

    pub use crate::{
        Client, ClientBuilder, Diagnostic, Error, Message, Payload, Port, PortDirection, PortId,
        ReceivedMessage, Result, TimeBase,
    };

    #[cfg(feature = "loopback")]
    pub use crate::LoopbackDriver;
}
