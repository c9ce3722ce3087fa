//! The seam to the runtime that owns ports and invokes the period callback.

#[cfg(feature = "loopback")]
pub mod loopback;

use crate::error::Result;
use crate::port::PortDirection;
use patchline_midi::PortId;

/// Identifies one installed period callback for later removal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CallbackId(pub u64);

/// Invoked once per period with the period's frame count. `ports` and the
/// buffers it hands out are valid only for the duration of the call. The
/// callback must meet the period's deadline: no blocking, no allocation.
pub type ProcessCallback = Box<dyn FnMut(&mut dyn PeriodPorts, u32) + Send>;

/// A port as the driver knows it.
#[derive(Clone, Debug)]
pub struct DriverPort {
    pub id: PortId,
    pub name: String,
    pub direction: PortDirection,
}

/// Per-period buffer access handed to the process callback.
pub trait PeriodPorts {
    /// Write buffer for an output port. `None` when the buffer cannot be
    /// produced this period; the caller skips the port.
    fn output_buffer(&mut self, port: PortId) -> Option<&mut EventBuffer>;

    /// Read buffer for an input port. `None` when the buffer cannot be
    /// produced this period.
    fn input_buffer(&mut self, port: PortId) -> Option<&EventBuffer>;
}

/// Lifecycle, patchbay, and callback registration of the external runtime.
///
/// Driver methods must not be called from inside a process callback.
pub trait MidiDriver: Send + Sync {
    fn sample_rate(&self) -> u32;

    /// Register a new port. Names are unique across the driver.
    fn register_port(&self, name: &str, direction: PortDirection) -> Result<PortId>;

    /// Look up an existing port by exact name.
    fn find_port(&self, name: &str) -> Option<DriverPort>;

    /// List ports, optionally filtered by a substring of the name.
    fn ports(&self, name_filter: Option<&str>) -> Vec<DriverPort>;

    /// Connect an output port to an input port. `Ok(false)` when the
    /// connection already existed.
    fn connect(&self, source: PortId, destination: PortId) -> Result<bool>;

    /// Break a connection. `Ok(false)` when none existed.
    fn disconnect(&self, source: PortId, destination: PortId) -> Result<bool>;

    /// Install a period callback; the driver invokes it once per period from
    /// now on.
    fn activate(&self, callback: ProcessCallback) -> Result<CallbackId>;

    /// Remove a period callback. On return no invocation of it is in flight
    /// and none will follow.
    fn deactivate(&self, callback: CallbackId) -> Result<()>;
}

/// Timestamped events for one port and one period, in a preallocated arena.
pub struct EventBuffer {
    nframes: u32,
    used: usize,
    data: Box<[u8]>,
    events: Vec<EventSpan>,
}

#[derive(Clone, Copy, Debug)]
struct EventSpan {
    offset: u32,
    start: usize,
    len: usize,
}

impl EventBuffer {
    pub fn with_capacity(max_events: usize, data_capacity: usize) -> Self {
        Self {
            nframes: 0,
            used: 0,
            data: vec![0u8; data_capacity].into_boxed_slice(),
            events: Vec::with_capacity(max_events),
        }
    }

    /// Frame count of the period this buffer belongs to.
    #[inline]
    pub fn nframes(&self) -> u32 {
        self.nframes
    }

    /// Discard contents for a new period. Capacity is retained.
    pub fn reset(&mut self, nframes: u32) {
        self.nframes = nframes;
        self.used = 0;
        self.events.clear();
    }

    pub(crate) fn set_nframes(&mut self, nframes: u32) {
        self.nframes = nframes;
    }

    /// Append an event at `offset`. Returns `false` when the offset lies
    /// outside the period or the event table / byte arena is out of room.
    /// Never allocates.
    pub fn write(&mut self, offset: u32, bytes: &[u8]) -> bool {
        if offset >= self.nframes
            || self.events.len() == self.events.capacity()
            || self.used + bytes.len() > self.data.len()
        {
            return false;
        }
        let start = self.used;
        self.data[start..start + bytes.len()].copy_from_slice(bytes);
        self.used += bytes.len();
        self.events.push(EventSpan {
            offset,
            start,
            len: bytes.len(),
        });
        true
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// The event at `index`, as (offset, bytes).
    pub fn event(&self, index: usize) -> Option<(u32, &[u8])> {
        let span = self.events.get(index)?;
        Some((span.offset, &self.data[span.start..span.start + span.len]))
    }

    /// Events in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u8])> + '_ {
        self.events
            .iter()
            .map(|span| (span.offset, &self.data[span.start..span.start + span.len]))
    }

    /// Reorder events by offset, keeping insertion order among equals.
    /// Drivers call this before presenting a buffer merged from several
    /// sources.
    pub fn sort_by_offset(&mut self) {
        self.events.sort_by_key(|span| span.offset);
    }
}
