//! In-process driver for tests and demos.
//!
//! One port namespace, explicit patchbay connections, and a hand-cranked
//! clock: each [`LoopbackDriver::run_period`] call presents previously routed
//! events on the input ports, invokes every installed callback, then routes
//! events from connected output ports forward. A connection therefore carries
//! one period of latency, the same as a daemon gives a feedback cycle.

use super::{CallbackId, DriverPort, EventBuffer, MidiDriver, PeriodPorts, ProcessCallback};
use crate::error::{Error, Result};
use crate::port::PortDirection;
use parking_lot::Mutex;
use patchline_midi::PortId;
use std::sync::Arc;
use tracing::debug;

/// Event slots per port buffer.
const MAX_EVENTS_PER_PORT: usize = 256;
/// Byte arena per port buffer.
const DATA_CAPACITY_PER_PORT: usize = 64 * 1024;

#[derive(Clone)]
pub struct LoopbackDriver {
    inner: Arc<Inner>,
}

struct Inner {
    sample_rate: u32,
    state: Mutex<State>,
}

struct State {
    ports: Vec<LoopbackPort>,
    /// (source output index, destination input index)
    connections: Vec<(usize, usize)>,
    callbacks: Vec<(u64, ProcessCallback)>,
    next_callback: u64,
}

struct LoopbackPort {
    name: String,
    direction: PortDirection,
    /// The period buffer handed to callbacks.
    buffer: EventBuffer,
    /// Events routed here during the previous period, presented next period.
    staged: EventBuffer,
}

impl LoopbackDriver {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            inner: Arc::new(Inner {
                sample_rate,
                state: Mutex::new(State {
                    ports: Vec::new(),
                    connections: Vec::new(),
                    callbacks: Vec::new(),
                    next_callback: 0,
                }),
            }),
        }
    }

    /// Drive one period of `nframes` frames.
    pub fn run_period(&self, nframes: u32) {
        let mut state = self.inner.state.lock();
        let State {
            ports,
            connections,
            callbacks,
            ..
        } = &mut *state;

        // Inputs present what was routed last period; everything else starts
        // the period empty.
        for port in ports.iter_mut() {
            match port.direction {
                PortDirection::Input => {
                    std::mem::swap(&mut port.buffer, &mut port.staged);
                    port.buffer.sort_by_offset();
                    port.buffer.set_nframes(nframes);
                    port.staged.reset(nframes);
                }
                PortDirection::Output => {
                    port.buffer.reset(nframes);
                    port.staged.reset(nframes);
                }
            }
        }

        let mut view = PeriodView {
            ports: ports.as_mut_slice(),
        };
        for (_, callback) in callbacks.iter_mut() {
            callback(&mut view, nframes);
        }

        // Route connected output events forward for the next period.
        for &(source, destination) in connections.iter() {
            let events: Vec<(u32, Vec<u8>)> = ports[source]
                .buffer
                .iter()
                .map(|(offset, bytes)| (offset, bytes.to_vec()))
                .collect();
            for (offset, bytes) in events {
                if !ports[destination].staged.write(offset, &bytes) {
                    debug!(source, destination, "staging buffer full; event dropped");
                }
            }
        }
    }

    fn lookup(state: &State, id: PortId) -> Result<&LoopbackPort> {
        state
            .ports
            .get(id.as_raw() as usize)
            .ok_or_else(|| Error::UnknownPort(format!("#{}", id.as_raw())))
    }
}

struct PeriodView<'a> {
    ports: &'a mut [LoopbackPort],
}

impl PeriodPorts for PeriodView<'_> {
    fn output_buffer(&mut self, port: PortId) -> Option<&mut EventBuffer> {
        let port = self.ports.get_mut(port.as_raw() as usize)?;
        if port.direction == PortDirection::Output {
            Some(&mut port.buffer)
        } else {
            None
        }
    }

    fn input_buffer(&mut self, port: PortId) -> Option<&EventBuffer> {
        let port = self.ports.get(port.as_raw() as usize)?;
        if port.direction == PortDirection::Input {
            Some(&port.buffer)
        } else {
            None
        }
    }
}

impl MidiDriver for LoopbackDriver {
    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }

    fn register_port(&self, name: &str, direction: PortDirection) -> Result<PortId> {
        let mut state = self.inner.state.lock();
        if state.ports.iter().any(|p| p.name == name) {
            return Err(Error::DuplicatePort(name.to_string()));
        }
        let id = PortId::from_raw(state.ports.len() as u64);
        state.ports.push(LoopbackPort {
            name: name.to_string(),
            direction,
            buffer: EventBuffer::with_capacity(MAX_EVENTS_PER_PORT, DATA_CAPACITY_PER_PORT),
            staged: EventBuffer::with_capacity(MAX_EVENTS_PER_PORT, DATA_CAPACITY_PER_PORT),
        });
        debug!(name, ?direction, "registered loopback port");
        Ok(id)
    }

    fn find_port(&self, name: &str) -> Option<DriverPort> {
        let state = self.inner.state.lock();
        state
            .ports
            .iter()
            .enumerate()
            .find(|(_, p)| p.name == name)
            .map(|(index, p)| DriverPort {
                id: PortId::from_raw(index as u64),
                name: p.name.clone(),
                direction: p.direction,
            })
    }

    fn ports(&self, name_filter: Option<&str>) -> Vec<DriverPort> {
        let state = self.inner.state.lock();
        state
            .ports
            .iter()
            .enumerate()
            .filter(|(_, p)| name_filter.map_or(true, |f| p.name.contains(f)))
            .map(|(index, p)| DriverPort {
                id: PortId::from_raw(index as u64),
                name: p.name.clone(),
                direction: p.direction,
            })
            .collect()
    }

    fn connect(&self, source: PortId, destination: PortId) -> Result<bool> {
        let mut state = self.inner.state.lock();
        let source_port = Self::lookup(&state, source)?;
        if source_port.direction != PortDirection::Output {
            return Err(Error::Driver(format!(
                "\"{}\" is not an output port",
                source_port.name
            )));
        }
        let destination_port = Self::lookup(&state, destination)?;
        if destination_port.direction != PortDirection::Input {
            return Err(Error::Driver(format!(
                "\"{}\" is not an input port",
                destination_port.name
            )));
        }
        let connection = (source.as_raw() as usize, destination.as_raw() as usize);
        if state.connections.contains(&connection) {
            return Ok(false);
        }
        state.connections.push(connection);
        debug!(
            source = source.as_raw(),
            destination = destination.as_raw(),
            "connected"
        );
        Ok(true)
    }

    fn disconnect(&self, source: PortId, destination: PortId) -> Result<bool> {
        let mut state = self.inner.state.lock();
        let connection = (source.as_raw() as usize, destination.as_raw() as usize);
        let before = state.connections.len();
        state.connections.retain(|c| *c != connection);
        Ok(state.connections.len() != before)
    }

    fn activate(&self, callback: ProcessCallback) -> Result<CallbackId> {
        let mut state = self.inner.state.lock();
        let id = state.next_callback;
        state.next_callback += 1;
        state.callbacks.push((id, callback));
        Ok(CallbackId(id))
    }

    /// Removal shares the period lock, so no invocation of the callback is in
    /// flight once this returns.
    fn deactivate(&self, callback: CallbackId) -> Result<()> {
        let mut state = self.inner.state.lock();
        state.callbacks.retain(|(id, _)| *id != callback.0);
        Ok(())
    }
}
