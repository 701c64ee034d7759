//! Recording engine orchestration
//!
//! The engine owns one encoder worker per stream plus the muxer and drives
//! the session lifecycle: `initialize` resolves source formats and builds
//! the per-stream queues, `start` writes the container header and launches
//! all threads, `set_paused` propagates to the workers, and `finalize`
//! consumes the engine and hands shutdown to an asynchronous finalizer.
//!
//! Ownership is a tree: the engine holds worker and muxer handles, workers
//! hold their queue and codec, the muxer holds the sink. Sources are
//! external; the engine only keeps cloneable handles so it can disconnect
//! them during shutdown.

mod audio;
mod finalizer;
mod initializer;
mod muxer;
mod queue;
mod video;
mod worker;

pub use finalizer::FinalizeHandle;

use std::mem;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossbeam_channel::Receiver;

use self::audio::AudioWorker;
use self::initializer::PendingStream;
use self::muxer::{Muxer, PacketSender};
use self::video::VideoWorker;
use self::worker::{spawn_encoder, WorkerHandle};
use crate::codec::{AudioCodec, VideoCodec};
use crate::config::{EncoderSettings, SessionMetadata};
use crate::errors::RecordingError;
use crate::events::{EngineEvent, EventSink};
use crate::sink::{ContainerSink, StreamDescriptor};
use crate::source::{AudioBufferSource, VideoFrameSource};

/// Lifecycle phase of a recording session.
///
/// Finalization is not a state here: `finalize` consumes the engine, and
/// the finalizing/finalized phases live behind the returned handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uninitialized,
    Initializing,
    Running,
    Paused,
}

/// One stream to record: a source handle paired with the codec that will
/// encode its items.
pub enum StreamInput {
    Audio {
        source: AudioBufferSource,
        codec: Box<dyn AudioCodec>,
    },
    Video {
        source: VideoFrameSource,
        codec: Box<dyn VideoCodec>,
    },
}

impl StreamInput {
    pub fn audio(source: AudioBufferSource, codec: impl AudioCodec + 'static) -> Self {
        StreamInput::Audio {
            source,
            codec: Box::new(codec),
        }
    }

    pub fn video(source: VideoFrameSource, codec: impl VideoCodec + 'static) -> Self {
        StreamInput::Video {
            source,
            codec: Box::new(codec),
        }
    }
}

/// Non-owning reference to a connected source, kept for disconnect.
pub(crate) enum SourceRef {
    Audio(AudioBufferSource),
    Video(VideoFrameSource),
}

impl SourceRef {
    pub fn disconnect(&self) {
        match self {
            SourceRef::Audio(source) => source.disconnect(),
            SourceRef::Video(source) => source.disconnect(),
        }
    }
}

/// Furthest presentation timestamp observed across all streams.
///
/// Workers report packet end times from their own threads; only forward
/// movement is published, so `DurationChanged` values are strictly
/// increasing no matter how reports interleave.
pub(crate) struct DurationTracker {
    recorded: Mutex<i64>,
    events: EventSink,
}

impl DurationTracker {
    pub fn new(events: EventSink) -> Self {
        Self {
            recorded: Mutex::new(0),
            events,
        }
    }

    pub fn observe(&self, timestamp: i64) {
        let mut recorded = self.recorded.lock().unwrap();
        if timestamp > *recorded {
            *recorded = timestamp;
            self.events.emit(EngineEvent::DurationChanged(timestamp));
        }
    }

    pub fn recorded(&self) -> i64 {
        *self.recorded.lock().unwrap()
    }
}

/// Orchestrator of one recording session.
pub struct RecordingEngine<S: ContainerSink> {
    settings: EncoderSettings,
    metadata: SessionMetadata,
    sink: Option<S>,
    state: EngineState,
    events: EventSink,
    events_rx: Receiver<EngineEvent>,
    duration: Arc<DurationTracker>,
    pending: Vec<PendingStream>,
    sources: Vec<SourceRef>,
    workers: Vec<WorkerHandle>,
    muxer: Option<Muxer>,
}

impl<S: ContainerSink + 'static> RecordingEngine<S> {
    /// Create an engine for one session writing into `sink`.
    pub fn new(settings: EncoderSettings, sink: S) -> Self {
        let (events, events_rx) = EventSink::channel();
        let duration = Arc::new(DurationTracker::new(events.clone()));
        Self {
            settings,
            metadata: SessionMetadata::default(),
            sink: Some(sink),
            state: EngineState::Uninitialized,
            events,
            events_rx,
            duration,
            pending: Vec::new(),
            sources: Vec::new(),
            workers: Vec::new(),
            muxer: None,
        }
    }

    /// Receiver for this session's events. May be cloned freely.
    pub fn events(&self) -> Receiver<EngineEvent> {
        self.events_rx.clone()
    }

    /// Session metadata forwarded to the container header. Ignored once the
    /// header has been written.
    pub fn set_metadata(&mut self, metadata: SessionMetadata) {
        self.metadata = metadata;
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// Furthest recorded timestamp so far, microseconds.
    pub fn duration_us(&self) -> i64 {
        self.duration.recorded()
    }

    /// Resolve formats for all inputs and build their stream queues.
    ///
    /// Blocks for at most `timeout` while waiting for format-less sources
    /// to produce their first item. Streams that cannot be set up are
    /// reported through `StreamInitializationError` events and skipped;
    /// the session stays usable as long as one stream survives.
    pub fn initialize(
        &mut self,
        inputs: Vec<StreamInput>,
        timeout: Duration,
    ) -> Result<(), RecordingError> {
        if self.state != EngineState::Uninitialized {
            return Err(RecordingError::resource(
                "Session is already initialized",
            ));
        }
        self.state = EngineState::Initializing;
        log::debug!("initializing session with {} input(s)", inputs.len());

        let (pending, sources) = initializer::resolve_streams(inputs, timeout, &self.events);
        log::info!("initialized {} stream(s)", pending.len());
        self.pending = pending;
        self.sources = sources;
        Ok(())
    }

    /// Write the container header and launch the muxer and all workers.
    ///
    /// Fails the whole session if no stream survived initialization or the
    /// header cannot be written; in both cases a `SessionError` is emitted
    /// and nothing is started.
    pub fn start(&mut self) -> Result<(), RecordingError> {
        if self.state != EngineState::Initializing {
            return Err(RecordingError::resource(
                "Session must be initialized exactly once before start",
            ));
        }

        if self.pending.is_empty() {
            let err = RecordingError::resource("No valid stream found for encoding");
            self.events.session_error(&err);
            return Err(err);
        }

        let streams: Vec<StreamDescriptor> = self
            .pending
            .iter()
            .enumerate()
            .map(|(index, pending)| match pending {
                PendingStream::Audio { format, .. } => StreamDescriptor::Audio {
                    index,
                    format: *format,
                },
                PendingStream::Video { format, .. } => StreamDescriptor::Video {
                    index,
                    format: *format,
                },
            })
            .collect();

        let mut sink = match self.sink.take() {
            Some(sink) => sink,
            None => return Err(RecordingError::resource("Container sink already consumed")),
        };

        if let Err(err) = sink.write_header(&streams, &self.metadata) {
            log::warn!("could not write header: {err}");
            let err = RecordingError::resource(format!("Cannot start writing the stream: {err}"));
            self.events.session_error(&err);
            // Keep the sink so finalize can still release its resources.
            self.sink = Some(sink);
            return Err(err);
        }
        log::debug!("stream header is successfully written");

        let (muxer, packet_tx) = Muxer::start(sink, streams.len(), self.events.clone())?;
        self.muxer = Some(muxer);

        for (index, pending) in mem::take(&mut self.pending).into_iter().enumerate() {
            let packets = PacketSender::new(packet_tx.clone(), index, self.duration.clone());
            let handle = match pending {
                PendingStream::Audio {
                    codec,
                    format,
                    queue,
                    first,
                } => spawn_encoder(
                    format!("avrec-audio-{index}"),
                    AudioWorker::new(codec, format, self.settings.clone(), packets),
                    queue,
                    first,
                    self.events.clone(),
                    false,
                ),
                PendingStream::Video {
                    codec,
                    format,
                    queue,
                    first,
                } => spawn_encoder(
                    format!("avrec-video-{index}"),
                    VideoWorker::new(codec, format, self.settings.clone(), packets),
                    queue,
                    first,
                    self.events.clone(),
                    true,
                ),
            };
            match handle {
                Ok(handle) => self.workers.push(handle),
                Err(err) => {
                    self.events.session_error(&err);
                    return Err(err);
                }
            }
        }

        self.state = EngineState::Running;
        log::info!("recording session started with {} stream(s)", streams.len());
        Ok(())
    }

    /// Pause or resume all streams. Paused workers keep consuming their
    /// queues without encoding; resuming the video path re-bases timestamps
    /// so no gap is recorded.
    pub fn set_paused(&mut self, paused: bool) {
        match (self.state, paused) {
            (EngineState::Running, true) => self.state = EngineState::Paused,
            (EngineState::Paused, false) => self.state = EngineState::Running,
            _ => return,
        }
        for worker in &self.workers {
            worker.set_paused(paused);
        }
        log::debug!("session {}", if paused { "paused" } else { "resumed" });
    }

    /// Ask all video streams to emit a keyframe as soon as possible.
    pub fn request_keyframe(&self) {
        for worker in self.workers.iter().filter(|w| w.is_video()) {
            worker.request_keyframe();
        }
    }

    /// Shut the session down. Consumes the engine, so finalizing twice is
    /// impossible by construction.
    ///
    /// Sources are disconnected first so no new item can race the worker
    /// stop signals; the actual draining, trailer write, and close run on
    /// the finalizer's own thread behind the returned handle. Exactly one
    /// `FinalizationDone` event follows, and the trailer is written iff the
    /// header was.
    pub fn finalize(mut self) -> FinalizeHandle {
        log::debug!("finalize requested");

        for source in &self.sources {
            source.disconnect();
        }
        self.sources.clear();
        // Streams that never reached start() release their queues here.
        self.pending.clear();

        finalizer::spawn(
            mem::take(&mut self.workers),
            self.muxer.take(),
            self.sink.take(),
            self.duration.clone(),
            self.events.clone(),
        )
    }
}

impl<S: ContainerSink> Drop for RecordingEngine<S> {
    fn drop(&mut self) {
        // After finalize() everything below is already empty. A session
        // dropped without finalize is torn down in the background: workers
        // drain and flush on their own threads once told to stop.
        for source in &self.sources {
            source.disconnect();
        }
        for worker in &self.workers {
            worker.stop();
        }
        self.workers.clear();
    }
}
