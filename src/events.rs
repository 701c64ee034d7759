//! Engine event stream
//!
//! The engine and its worker threads report progress and failures through a
//! single event channel. The receiver side is handed to the caller; events
//! are never delivered through callbacks, so no engine lock is ever held
//! while the caller reacts to one.

use crossbeam_channel::{Receiver, Sender};

use crate::errors::{ErrorKind, RecordingError};

/// Events emitted by a recording session.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Recorded duration advanced; value is the furthest presentation
    /// timestamp observed so far, microseconds. Strictly increasing.
    DurationChanged(i64),
    /// One stream failed to set up; other streams may still be viable.
    StreamInitializationError { kind: ErrorKind, message: String },
    /// The session failed fatally; the caller is expected to finalize.
    SessionError { kind: ErrorKind, message: String },
    /// The finalizer flushed all workers, wrote the trailer (when the
    /// header had been written), and closed the container.
    FinalizationDone,
}

/// Cloneable sender half of the event stream.
#[derive(Clone)]
pub(crate) struct EventSink {
    tx: Sender<EngineEvent>,
}

impl EventSink {
    pub fn channel() -> (EventSink, Receiver<EngineEvent>) {
        let (tx, rx) = crossbeam_channel::unbounded();
        (EventSink { tx }, rx)
    }

    pub fn emit(&self, event: EngineEvent) {
        // A dropped receiver is not an error; the session keeps running.
        if self.tx.send(event).is_err() {
            log::debug!("event receiver dropped; discarding engine event");
        }
    }

    pub fn session_error(&self, err: &RecordingError) {
        log::error!("session error: {err}");
        self.emit(EngineEvent::SessionError {
            kind: err.kind(),
            message: err.to_string(),
        });
    }

    pub fn stream_init_error(&self, err: &RecordingError) {
        log::warn!("stream initialization error: {err}");
        self.emit(EngineEvent::StreamInitializationError {
            kind: err.kind(),
            message: err.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_arrive_in_order() {
        let (sink, rx) = EventSink::channel();
        sink.emit(EngineEvent::DurationChanged(1));
        sink.emit(EngineEvent::DurationChanged(2));
        sink.emit(EngineEvent::FinalizationDone);

        assert_eq!(rx.recv().unwrap(), EngineEvent::DurationChanged(1));
        assert_eq!(rx.recv().unwrap(), EngineEvent::DurationChanged(2));
        assert_eq!(rx.recv().unwrap(), EngineEvent::FinalizationDone);
    }

    #[test]
    fn test_emit_survives_dropped_receiver() {
        let (sink, rx) = EventSink::channel();
        drop(rx);
        sink.emit(EngineEvent::FinalizationDone);
    }

    #[test]
    fn test_error_events_carry_kind() {
        let (sink, rx) = EventSink::channel();
        sink.session_error(&RecordingError::Io("disk full".into()));

        match rx.recv().unwrap() {
            EngineEvent::SessionError { kind, message } => {
                assert_eq!(kind, ErrorKind::Io);
                assert!(message.contains("disk full"));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
