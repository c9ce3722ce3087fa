//! Timestamped MIDI message scheduling over periodic real-time callbacks.
//!
//! An application thread enqueues messages for future delivery and polls for
//! captured input; once per period the driver invokes the scheduler, which
//! delivers due messages into per-port buffers with collision-free offsets,
//! re-bases everything still pending, and captures inbound events for later
//! retrieval. The callback side never blocks and never allocates.
//!
//! Feature gates: `loopback` (in-process driver for tests and demos).

pub mod error;
pub use error::{Error, Result};

mod client;
pub use client::{Client, ClientBuilder, Port, ReceivedMessage};

mod port;
pub use port::{PortDirection, PortInfo, MAX_PORTS_PER_CLIENT};

mod diag;
pub use diag::Diagnostic;

pub(crate) mod queue;
pub(crate) mod sched;

pub mod driver;
pub use driver::{CallbackId, DriverPort, EventBuffer, MidiDriver, PeriodPorts, ProcessCallback};

#[cfg(feature = "loopback")]
pub use driver::loopback::LoopbackDriver;

pub use patchline_midi::{Message, Payload, PortId, TimeBase, MAX_PAYLOAD_LEN};
