//! The per-period scheduling pass.
//!
//! Runs inside the driver callback: deliver due outbound messages into port
//! buffers with collision-free, strictly increasing offsets per port, re-base
//! everything still pending, then capture inbound events into the receive
//! ring.

use crate::diag::{DiagSender, Diagnostic};
use crate::driver::{EventBuffer, PeriodPorts};
use crate::port::{PortDirection, ServicedPort};
use crate::queue::receive::ReceiveProducer;
use crate::queue::send::SendQueue;
use arc_swap::ArcSwap;
use patchline_midi::{Message, Payload, PortId};
use std::sync::Arc;

pub(crate) struct PeriodScheduler {
    serviced: Arc<ArcSwap<Vec<ServicedPort>>>,
    send: Arc<SendQueue>,
    producer: ReceiveProducer,
    diags: DiagSender,
}

impl PeriodScheduler {
    pub fn new(
        serviced: Arc<ArcSwap<Vec<ServicedPort>>>,
        send: Arc<SendQueue>,
        producer: ReceiveProducer,
        diags: DiagSender,
    ) -> Self {
        Self {
            serviced,
            send,
            producer,
            diags,
        }
    }

    /// One period. RT-safe: a lock-free snapshot load, a single `try_lock` on
    /// the send queue, wait-free ring pushes, no allocation.
    pub fn run_period(&mut self, ports: &mut dyn PeriodPorts, nframes: u32) {
        let serviced = self.serviced.load();

        // Outbound. A contended lock defers the whole pass -- delivery and
        // re-basing together -- to the next period.
        if let Some(mut queue) = self.send.lock_for_period() {
            for port in serviced
                .iter()
                .filter(|p| p.direction == PortDirection::Output)
            {
                match ports.output_buffer(port.id) {
                    Some(buffer) => {
                        deliver_for_port(&mut queue, port.id, nframes, buffer, &self.diags)
                    }
                    None => self
                        .diags
                        .report(Diagnostic::BufferUnavailable { port: port.id }),
                }
            }
        }

        // Inbound.
        for port in serviced
            .iter()
            .filter(|p| p.direction == PortDirection::Input)
        {
            match ports.input_buffer(port.id) {
                Some(buffer) => {
                    for (offset, bytes) in buffer.iter() {
                        let Ok(payload) = Payload::new(bytes) else {
                            self.diags
                                .report(Diagnostic::OversizedEvent { port: port.id });
                            continue;
                        };
                        let message = Message::new(port.id, u64::from(offset), payload);
                        if !self.producer.push(message) {
                            self.diags
                                .report(Diagnostic::ReceiveOverflow { port: port.id });
                        }
                    }
                }
                None => self
                    .diags
                    .report(Diagnostic::BufferUnavailable { port: port.id }),
            }
        }
    }
}

/// Deliver due messages for one port and re-base the rest.
///
/// Scanning in ascending time order: a message whose time collides with the
/// previously emitted offset in this pass is bumped to `previous + 1`, so
/// emitted offsets strictly increase within the period. The bump applies to
/// the delivered copy only. A due message bumped to exactly the period
/// boundary stays queued; the saturating re-base then lands it at offset 0 of
/// the next period.
fn deliver_for_port(
    queue: &mut Vec<Message>,
    port: PortId,
    nframes: u32,
    buffer: &mut EventBuffer,
    diags: &DiagSender,
) {
    let period = u64::from(nframes);
    let mut delivered = 0usize;
    let mut last_offset = 0u64;
    let mut index = 0usize;
    while index < queue.len() {
        if queue[index].port != port {
            index += 1;
            continue;
        }
        let time = queue[index].time;
        let offset = if delivered > 0 && time <= last_offset {
            last_offset + 1
        } else {
            time
        };
        if offset < period {
            let message = queue.remove(index);
            if !buffer.write(offset as u32, message.payload.as_slice()) {
                diags.report(Diagnostic::WriteRejected { port });
            }
            delivered += 1;
            last_offset = offset;
        } else {
            queue[index].time = time.saturating_sub(period);
            index += 1;
        }
    }
}
