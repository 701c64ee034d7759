//! Bounded per-encoder item queue
//!
//! Every encoder worker owns exactly one of these. Producers hold a sender
//! clone (installed on their source handle) and hand items over from their
//! own thread; the worker blocks on the receiving side. The bound caps
//! memory per stream; overflow surfaces to the producer as backpressure at
//! the source, never as a silent drop.

use crossbeam_channel::{Receiver, Sender};

/// Maximum queued video frames per encoder.
/// Chosen to limit memory usage (a few hundred MB at 4K RGB24).
pub(crate) const VIDEO_QUEUE_BOUND: usize = 10;

/// Maximum queued audio buffers per encoder.
/// At 48kHz with 20ms buffers this allows ~5 seconds of buffering.
pub(crate) const AUDIO_QUEUE_BOUND: usize = 256;

/// Bounded FIFO feeding one encoder worker.
pub(crate) struct ItemQueue<T> {
    tx: Sender<T>,
    rx: Receiver<T>,
}

impl<T> ItemQueue<T> {
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        Self { tx, rx }
    }

    /// Sender half handed to the producing source.
    pub fn producer(&self) -> Sender<T> {
        self.tx.clone()
    }

    /// Receiver half the worker (and the initializer probe) blocks on.
    pub fn receiver(&self) -> &Receiver<T> {
        &self.rx
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::TrySendError;

    #[test]
    fn test_bound_refuses_excess_push() {
        let queue: ItemQueue<u32> = ItemQueue::bounded(3);
        let tx = queue.producer();

        for i in 0..3 {
            tx.try_send(i).unwrap();
        }
        // The fourth push on a bound-3 queue is observably refused.
        assert!(matches!(tx.try_send(3), Err(TrySendError::Full(3))));
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn test_fifo_order() {
        let queue: ItemQueue<u32> = ItemQueue::bounded(8);
        let tx = queue.producer();
        for i in 0..5 {
            tx.try_send(i).unwrap();
        }
        for i in 0..5 {
            assert_eq!(queue.receiver().try_recv().unwrap(), i);
        }
    }

    #[test]
    fn test_pop_frees_capacity() {
        let queue: ItemQueue<u32> = ItemQueue::bounded(1);
        let tx = queue.producer();
        tx.try_send(0).unwrap();
        assert!(tx.try_send(1).is_err());
        queue.receiver().try_recv().unwrap();
        assert!(tx.try_send(1).is_ok());
    }
}
