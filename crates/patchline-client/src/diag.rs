//! Faults observed inside the period callback.
//!
//! Reporting from the callback is a `try_send` of a small Copy value into a
//! bounded channel; nothing allocates or blocks there. The application drains
//! and logs at its leisure.

use crossbeam_channel::{bounded, Receiver, Sender};
use patchline_midi::PortId;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Diagnostic {
    /// The driver had no buffer for this port; it was skipped this period.
    BufferUnavailable { port: PortId },
    /// The port buffer had no room left; the due message was dropped.
    WriteRejected { port: PortId },
    /// The receive ring was full; the captured event was dropped.
    ReceiveOverflow { port: PortId },
    /// An inbound event exceeded the payload bound and was dropped.
    OversizedEvent { port: PortId },
}

pub(crate) fn diag_channel(capacity: usize) -> (DiagSender, DiagReceiver) {
    let (tx, rx) = bounded(capacity);
    (DiagSender { tx }, DiagReceiver { rx })
}

#[derive(Clone)]
pub(crate) struct DiagSender {
    tx: Sender<Diagnostic>,
}

impl DiagSender {
    /// Best-effort: a full channel drops the report, never the period.
    #[inline]
    pub fn report(&self, diagnostic: Diagnostic) {
        let _ = self.tx.try_send(diagnostic);
    }
}

pub(crate) struct DiagReceiver {
    rx: Receiver<Diagnostic>,
}

impl DiagReceiver {
    /// Drain pending diagnostics, logging each one.
    pub fn drain(&self) -> Vec<Diagnostic> {
        let mut drained = Vec::new();
        while let Ok(diagnostic) = self.rx.try_recv() {
            warn!(?diagnostic, "period callback fault");
            drained.push(diagnostic);
        }
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_and_drain() {
        let (tx, rx) = diag_channel(8);
        let port = PortId::from_raw(1);
        tx.report(Diagnostic::BufferUnavailable { port });
        tx.report(Diagnostic::ReceiveOverflow { port });

        let drained = rx.drain();
        assert_eq!(
            drained,
            vec![
                Diagnostic::BufferUnavailable { port },
                Diagnostic::ReceiveOverflow { port },
            ]
        );
        assert!(rx.drain().is_empty());
    }

    #[test]
    fn test_full_channel_drops_silently() {
        let (tx, rx) = diag_channel(1);
        let port = PortId::from_raw(0);
        tx.report(Diagnostic::WriteRejected { port });
        tx.report(Diagnostic::WriteRejected { port });
        assert_eq!(rx.drain().len(), 1);
    }
}
