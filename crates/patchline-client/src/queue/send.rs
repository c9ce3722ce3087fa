//! Time-ordered pending outbound messages.

use parking_lot::{Mutex, MutexGuard};
use patchline_midi::Message;

/// Pending outbound messages for every output port of one client, ascending
/// by delivery time.
///
/// The application side locks to insert; the callback side must only ever go
/// through [`SendQueue::lock_for_period`], so it can never block on an
/// application-held lock.
pub(crate) struct SendQueue {
    inner: Mutex<Vec<Message>>,
}

impl SendQueue {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Insert keeping ascending time order. A new message lands before the
    /// first entry with a strictly greater time, so equal times keep
    /// submission order.
    pub fn push(&self, message: Message) {
        let mut queue = self.inner.lock();
        let at = queue.partition_point(|m| m.time <= message.time);
        queue.insert(at, message);
    }

    /// Non-blocking claim of the queue for one period's delivery pass.
    /// `None` means an application-side insert holds the lock; the caller
    /// skips the pass and retries next period.
    pub fn lock_for_period(&self) -> Option<MutexGuard<'_, Vec<Message>>> {
        self.inner.try_lock()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Drop every pending message. Teardown only.
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use patchline_midi::{Payload, PortId};

    fn message(time: u64, tag: u8) -> Message {
        Message::new(PortId::from_raw(0), time, Payload::new(&[tag]).unwrap())
    }

    fn times(queue: &SendQueue) -> Vec<(u64, u8)> {
        queue
            .lock_for_period()
            .unwrap()
            .iter()
            .map(|m| (m.time, m.payload.as_slice()[0]))
            .collect()
    }

    #[test]
    fn test_insertion_keeps_time_order() {
        let queue = SendQueue::with_capacity(8);
        queue.push(message(300, 1));
        queue.push(message(100, 2));
        queue.push(message(200, 3));

        assert_eq!(times(&queue), vec![(100, 2), (200, 3), (300, 1)]);
    }

    #[test]
    fn test_equal_times_keep_submission_order() {
        let queue = SendQueue::with_capacity(8);
        queue.push(message(100, 1));
        queue.push(message(100, 2));
        queue.push(message(50, 3));
        queue.push(message(100, 4));

        assert_eq!(times(&queue), vec![(50, 3), (100, 1), (100, 2), (100, 4)]);
    }

    #[test]
    fn test_lock_for_period_yields_under_contention() {
        let queue = SendQueue::with_capacity(8);
        let guard = queue.lock_for_period().unwrap();
        assert!(queue.lock_for_period().is_none());
        drop(guard);
        assert!(queue.lock_for_period().is_some());
    }

    #[test]
    fn test_clear_empties_the_queue() {
        let queue = SendQueue::with_capacity(8);
        queue.push(message(10, 0));
        queue.push(message(20, 0));
        assert_eq!(queue.len(), 2);
        queue.clear();
        assert_eq!(queue.len(), 0);
    }
}
