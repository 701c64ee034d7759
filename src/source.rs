//! Producer-facing source handles
//!
//! A source is the hand-off point between an external producer (capture
//! device, screen grabber, synthetic generator) and the engine. The producer
//! keeps one clone of the handle and pushes items from its own thread; the
//! engine subscribes the per-encoder queue to the other clone. Pushes go
//! straight into the queue under its own synchronization, so the queue lock
//! is the only coupling between producer and encoder.
//!
//! Backpressure is non-blocking on the producer side: a push against a full
//! queue hands the item back instead of blocking or silently dropping, and
//! `is_ready()` lets producers throttle themselves before producing.

use std::fmt;
use std::sync::{Arc, Mutex};

use crossbeam_channel::{Sender, TrySendError};

use crate::types::{AudioBuffer, AudioFormat, VideoFormat, VideoFrame};

/// A refused push. The item is handed back to the producer.
#[derive(Debug)]
pub enum PushError<T> {
    /// The encoder queue is at its bound; retry after `is_ready()` turns true.
    Backpressure(T),
    /// The source is not connected to a running recording session.
    Disconnected(T),
}

impl<T> PushError<T> {
    /// Recover the refused item.
    pub fn into_item(self) -> T {
        match self {
            PushError::Backpressure(item) | PushError::Disconnected(item) => item,
        }
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PushError::Backpressure(_) => write!(f, "encoder queue is full"),
            PushError::Disconnected(_) => {
                write!(f, "source is not connected to a recording session")
            }
        }
    }
}

impl<T: fmt::Debug> std::error::Error for PushError<T> {}

/// Shared state behind the cloneable source handles.
struct SourceHub<T, F> {
    format: Option<F>,
    sink: Mutex<Option<Sender<T>>>,
}

impl<T, F: Copy> SourceHub<T, F> {
    fn new(format: Option<F>) -> Self {
        Self {
            format,
            sink: Mutex::new(None),
        }
    }

    fn push(&self, item: T) -> Result<(), PushError<T>> {
        let sink = self.sink.lock().unwrap();
        match sink.as_ref() {
            Some(tx) => match tx.try_send(item) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(item)) => Err(PushError::Backpressure(item)),
                Err(TrySendError::Disconnected(item)) => Err(PushError::Disconnected(item)),
            },
            None => Err(PushError::Disconnected(item)),
        }
    }

    fn is_ready(&self) -> bool {
        let sink = self.sink.lock().unwrap();
        match sink.as_ref() {
            Some(tx) => !tx.is_full(),
            None => false,
        }
    }

    fn subscribe(&self, tx: Sender<T>) {
        *self.sink.lock().unwrap() = Some(tx);
    }

    fn disconnect(&self) {
        *self.sink.lock().unwrap() = None;
    }
}

/// Handle to an external producer of PCM audio buffers.
#[derive(Clone)]
pub struct AudioBufferSource {
    hub: Arc<SourceHub<AudioBuffer, AudioFormat>>,
}

impl AudioBufferSource {
    /// Create a source whose format is known before any buffer is produced.
    pub fn new(format: AudioFormat) -> Self {
        Self {
            hub: Arc::new(SourceHub::new(Some(format))),
        }
    }

    /// Create a source whose format is taken from the first pushed buffer.
    pub fn from_first_buffer() -> Self {
        Self {
            hub: Arc::new(SourceHub::new(None)),
        }
    }

    /// The declared format, if known ahead of data.
    pub fn format(&self) -> Option<AudioFormat> {
        self.hub.format
    }

    /// Whether the encoder can currently accept a buffer.
    pub fn is_ready(&self) -> bool {
        self.hub.is_ready()
    }

    /// Hand a buffer to the encoder. Never blocks; a full queue or a
    /// disconnected session returns the buffer to the caller.
    pub fn push_buffer(&self, buffer: AudioBuffer) -> Result<(), PushError<AudioBuffer>> {
        self.hub.push(buffer)
    }

    pub(crate) fn subscribe(&self, tx: Sender<AudioBuffer>) {
        self.hub.subscribe(tx);
    }

    pub(crate) fn disconnect(&self) {
        self.hub.disconnect();
    }

    /// Identity of the shared hub; clones of one source compare equal.
    pub(crate) fn hub_id(&self) -> usize {
        Arc::as_ptr(&self.hub) as usize
    }
}

/// Handle to an external producer of raw video frames.
#[derive(Clone)]
pub struct VideoFrameSource {
    hub: Arc<SourceHub<VideoFrame, VideoFormat>>,
}

impl VideoFrameSource {
    /// Create a source whose format is known before any frame is produced.
    pub fn new(format: VideoFormat) -> Self {
        Self {
            hub: Arc::new(SourceHub::new(Some(format))),
        }
    }

    /// Create a source whose format is taken from the first pushed frame.
    pub fn from_first_frame() -> Self {
        Self {
            hub: Arc::new(SourceHub::new(None)),
        }
    }

    /// The declared format, if known ahead of data.
    pub fn format(&self) -> Option<VideoFormat> {
        self.hub.format
    }

    /// Whether the encoder can currently accept a frame.
    pub fn is_ready(&self) -> bool {
        self.hub.is_ready()
    }

    /// Hand a frame to the encoder. Never blocks; a full queue or a
    /// disconnected session returns the frame to the caller.
    pub fn push_frame(&self, frame: VideoFrame) -> Result<(), PushError<VideoFrame>> {
        self.hub.push(frame)
    }

    pub(crate) fn subscribe(&self, tx: Sender<VideoFrame>) {
        self.hub.subscribe(tx);
    }

    pub(crate) fn disconnect(&self) {
        self.hub.disconnect();
    }

    pub(crate) fn hub_id(&self) -> usize {
        Arc::as_ptr(&self.hub) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_buffer(pts: i64) -> AudioBuffer {
        AudioBuffer::new(vec![0.0; 8], AudioFormat::new(48000, 2), pts)
    }

    #[test]
    fn test_push_without_subscription_is_refused() {
        let source = AudioBufferSource::new(AudioFormat::new(48000, 2));
        assert!(!source.is_ready());

        let result = source.push_buffer(test_buffer(0));
        match result {
            Err(PushError::Disconnected(buffer)) => assert_eq!(buffer.pts, 0),
            other => panic!("expected Disconnected, got {other:?}"),
        }
    }

    #[test]
    fn test_push_applies_backpressure_at_bound() {
        let source = VideoFrameSource::new(VideoFormat::new(4, 4, 30.0));
        let (tx, _rx) = crossbeam_channel::bounded(2);
        source.subscribe(tx);

        let frame = || VideoFrame::new(vec![0; 48], VideoFormat::new(4, 4, 30.0), 0);
        assert!(source.push_frame(frame()).is_ok());
        assert!(source.push_frame(frame()).is_ok());
        assert!(!source.is_ready());
        assert!(matches!(
            source.push_frame(frame()),
            Err(PushError::Backpressure(_))
        ));
    }

    #[test]
    fn test_disconnect_stops_accepting() {
        let source = AudioBufferSource::new(AudioFormat::new(48000, 2));
        let (tx, rx) = crossbeam_channel::bounded(4);
        source.subscribe(tx);

        assert!(source.push_buffer(test_buffer(1)).is_ok());
        source.disconnect();
        assert!(matches!(
            source.push_buffer(test_buffer(2)),
            Err(PushError::Disconnected(_))
        ));
        // The item pushed before disconnect is still queued.
        assert_eq!(rx.try_recv().unwrap().pts, 1);
    }

    #[test]
    fn test_clones_share_one_hub() {
        let source = VideoFrameSource::from_first_frame();
        let clone = source.clone();
        assert_eq!(source.hub_id(), clone.hub_id());
        assert!(source.format().is_none());
    }
}
