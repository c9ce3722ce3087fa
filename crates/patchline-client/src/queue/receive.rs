//! Captured inbound messages, callback to application.
//!
//! The callback pushes into an SPSC ring; the application drains the ring
//! into a staging deque so retrieval can take the first match for a port
//! without disturbing per-port FIFO order.

use patchline_midi::{Message, PortId};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::collections::VecDeque;

pub(crate) fn receive_channel(capacity: usize) -> (ReceiveProducer, ReceiveQueue) {
    let rb = HeapRb::<Message>::new(capacity);
    let (producer, consumer) = rb.split();
    (
        ReceiveProducer { producer },
        ReceiveQueue {
            consumer,
            staged: VecDeque::new(),
        },
    )
}

/// Callback side. Wait-free push; `false` when the ring is full.
pub(crate) struct ReceiveProducer {
    producer: HeapProd<Message>,
}

impl ReceiveProducer {
    #[inline]
    pub fn push(&mut self, message: Message) -> bool {
        self.producer.try_push(message).is_ok()
    }
}

/// Application side.
pub(crate) struct ReceiveQueue {
    consumer: HeapCons<Message>,
    staged: VecDeque<Message>,
}

impl ReceiveQueue {
    fn drain_ring(&mut self) {
        while let Some(message) = self.consumer.try_pop() {
            self.staged.push_back(message);
        }
    }

    /// Remove and return the oldest captured message for `port`.
    pub fn take_for_port(&mut self, port: PortId) -> Option<Message> {
        self.drain_ring();
        let at = self.staged.iter().position(|m| m.port == port)?;
        self.staged.remove(at)
    }

    /// Captured messages currently waiting, across all ports.
    pub fn pending(&mut self) -> usize {
        self.drain_ring();
        self.staged.len()
    }

    /// Drop everything captured so far. Teardown only.
    pub fn clear(&mut self) {
        self.drain_ring();
        self.staged.clear();
    }
}
