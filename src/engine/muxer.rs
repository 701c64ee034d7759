//! Muxer thread: the single serialization point for container writes
//!
//! Workers hand finished packets to the muxer over one bounded channel and
//! never touch the container themselves; codec threads run concurrently
//! while I/O stays serialized on this one thread. Within a stream, write
//! order equals arrival order equals encode order. Across streams packets
//! are written in arrival order; the container's interleaving is trusted
//! for file-level ordering.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Sender, TrySendError};

use super::DurationTracker;
use crate::codec::CodecPacket;
use crate::errors::RecordingError;
use crate::events::EventSink;
use crate::sink::ContainerSink;
use crate::types::EncodedPacket;

/// Bound of the worker → muxer packet channel. Packets drain to the
/// container far faster than codecs produce them; hitting this bound means
/// the sink has stalled and the session is in trouble anyway.
pub(crate) const PACKET_QUEUE_BOUND: usize = 256;

/// Totals accumulated by the muxer thread.
#[derive(Debug, Default)]
pub(crate) struct MuxStats {
    pub packets_per_stream: Vec<u64>,
    pub bytes_written: u64,
}

/// Engine-side handle to the muxer thread.
pub(crate) struct Muxer {
    join: Option<JoinHandle<MuxStats>>,
}

impl Muxer {
    /// Start the write loop. The sink moves onto the muxer thread; the
    /// returned sender is cloned once per worker and must not be retained
    /// by the engine, otherwise the loop never observes end of input.
    pub fn start<S: ContainerSink + 'static>(
        sink: S,
        stream_count: usize,
        events: EventSink,
    ) -> Result<(Muxer, Sender<EncodedPacket>), RecordingError> {
        let (tx, rx) = crossbeam_channel::bounded::<EncodedPacket>(PACKET_QUEUE_BOUND);

        let join = thread::Builder::new()
            .name("avrec-muxer".into())
            .spawn(move || {
                let mut sink = sink;
                let mut stats = MuxStats {
                    packets_per_stream: vec![0; stream_count],
                    bytes_written: 0,
                };
                let mut failed = false;

                for packet in rx.iter() {
                    if failed {
                        // Keep draining so workers never block on a dead sink.
                        continue;
                    }
                    match sink.write_packet(&packet) {
                        Ok(()) => {
                            if let Some(count) =
                                stats.packets_per_stream.get_mut(packet.stream_index)
                            {
                                *count += 1;
                            }
                            stats.bytes_written += packet.data.len() as u64;
                        }
                        Err(err) => {
                            events.session_error(&err);
                            failed = true;
                        }
                    }
                }

                // All workers are done. The header was written before this
                // thread existed, so the trailer is always due here.
                if let Err(err) = sink.write_trailer() {
                    // Reported, but cleanup still happens.
                    events.session_error(&err);
                }
                sink.close();
                log::debug!("muxer finished: {} bytes written", stats.bytes_written);
                stats
            })
            .map_err(|e| RecordingError::resource(format!("Failed to spawn muxer thread: {}", e)))?;

        Ok((Muxer { join: Some(join) }, tx))
    }

    /// Wait for the write loop to drain and the container to be closed.
    /// Called by the finalizer after all workers have been joined.
    pub fn join(mut self) -> MuxStats {
        match self.join.take() {
            Some(join) => join.join().unwrap_or_else(|_| {
                log::error!("muxer thread panicked");
                MuxStats::default()
            }),
            None => MuxStats::default(),
        }
    }
}

/// Worker-side hand-off of codec output to the muxer.
///
/// The hand-off is a fire-and-forget enqueue: a worker never waits for the
/// container. The duration tracker sees the end timestamp of every packet
/// that was accepted.
#[derive(Clone)]
pub(crate) struct PacketSender {
    tx: Sender<EncodedPacket>,
    stream_index: usize,
    duration: Arc<DurationTracker>,
}

impl PacketSender {
    pub fn new(tx: Sender<EncodedPacket>, stream_index: usize, duration: Arc<DurationTracker>) -> Self {
        Self {
            tx,
            stream_index,
            duration,
        }
    }

    pub fn forward(&self, packets: Vec<CodecPacket>) -> Result<(), RecordingError> {
        for packet in packets {
            let end = packet.pts + packet.duration;
            let packet = EncodedPacket {
                stream_index: self.stream_index,
                pts: packet.pts,
                duration: packet.duration,
                data: packet.data,
                key_frame: packet.key_frame,
            };
            match self.tx.try_send(packet) {
                Ok(()) => self.duration.observe(end),
                Err(TrySendError::Full(_)) => {
                    return Err(RecordingError::resource(
                        "Muxer queue overflow: container writer is stalled",
                    ));
                }
                Err(TrySendError::Disconnected(_)) => {
                    return Err(RecordingError::io("Muxer is no longer running"));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemorySink;

    fn packet(stream_index: usize, pts: i64) -> EncodedPacket {
        EncodedPacket {
            stream_index,
            pts,
            duration: 10,
            data: vec![1, 2, 3],
            key_frame: false,
        }
    }

    #[test]
    fn test_muxer_preserves_per_stream_order() {
        let (mut sink, view) = MemorySink::new();
        sink.write_header(&[], &crate::config::SessionMetadata::new())
            .unwrap();
        let (events, _events_rx) = EventSink::channel();
        let (muxer, tx) = Muxer::start(sink, 2, events).unwrap();

        for pts in [0, 10, 20] {
            tx.send(packet(0, pts)).unwrap();
        }
        tx.send(packet(1, 5)).unwrap();
        drop(tx);

        let stats = muxer.join();
        assert_eq!(stats.packets_per_stream, vec![3, 1]);
        assert_eq!(stats.bytes_written, 12);

        let written: Vec<(usize, i64)> = view
            .packets()
            .iter()
            .map(|p| (p.stream_index, p.pts))
            .collect();
        let stream0: Vec<i64> = written
            .iter()
            .filter(|(s, _)| *s == 0)
            .map(|(_, pts)| *pts)
            .collect();
        assert_eq!(stream0, vec![0, 10, 20]);
        assert!(view.trailer_written());
        assert!(view.closed());
    }

    #[test]
    fn test_write_failure_reports_and_keeps_draining() {
        let (mut sink, view) = MemorySink::new();
        sink.write_header(&[], &crate::config::SessionMetadata::new())
            .unwrap();
        view.fail_packets(true);
        let (events, events_rx) = EventSink::channel();
        let (muxer, tx) = Muxer::start(sink, 1, events).unwrap();

        tx.send(packet(0, 0)).unwrap();
        tx.send(packet(0, 10)).unwrap();
        drop(tx);

        let stats = muxer.join();
        assert_eq!(stats.packets_per_stream, vec![0]);
        assert!(matches!(
            events_rx.recv().unwrap(),
            crate::events::EngineEvent::SessionError { .. }
        ));
        // Trailer and close still happen after a write failure.
        assert!(view.trailer_written());
        assert!(view.closed());
    }
}
