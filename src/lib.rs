//! avrec: concurrent audio/video recording engine
//!
//! This crate takes live audio buffers and video frames from arbitrary
//! producer sources, encodes them concurrently on per-stream worker
//! threads, and multiplexes the resulting packets into a single interleaved
//! output container with correct timestamps, backpressure, and clean
//! shutdown.
//!
//! # Features
//! - One worker thread per stream; codecs run concurrently, container I/O
//!   stays serialized on a dedicated muxer thread
//! - Bounded per-stream queues with observable producer backpressure
//! - Pause/resume with gapless video timestamp re-basing
//! - Per-stream initialization failures that leave other streams viable
//! - Asynchronous finalization that never blocks the caller
//! - Pluggable codecs and container sinks (H.264/Opus/MP4 adapters behind
//!   the `h264`, `opus`, and `mp4` features)
//!
//! # Usage
//! ```rust
//! use std::time::Duration;
//! use avrec::testing::{MemorySink, PassthroughVideoCodec};
//! use avrec::{
//!     EncoderSettings, RecordingEngine, StreamInput, VideoFormat, VideoFrameSource,
//! };
//!
//! let (sink, _view) = MemorySink::new();
//! let mut engine = RecordingEngine::new(EncoderSettings::default(), sink);
//!
//! let format = VideoFormat::new(640, 480, 30.0);
//! let source = VideoFrameSource::new(format);
//! engine
//!     .initialize(
//!         vec![StreamInput::video(source.clone(), PassthroughVideoCodec::new())],
//!         Duration::from_secs(1),
//!     )
//!     .unwrap();
//! engine.start().unwrap();
//!
//! // Producers push frames from their own threads via `source`.
//!
//! let stats = engine.finalize().wait();
//! assert_eq!(stats.packets_per_stream.len(), 1);
//! ```

pub mod clock;
pub mod codec;
pub mod config;
pub mod engine;
pub mod errors;
pub mod events;
pub mod sink;
pub mod source;
pub mod types;

// Testing utilities - synthetic data and collaborator doubles
pub mod testing;

// Re-exports for convenience
pub use clock::MediaClock;
pub use config::{EncoderSettings, RecordingQuality, SessionMetadata, SessionStats};
pub use engine::{EngineState, FinalizeHandle, RecordingEngine, StreamInput};
pub use errors::{ErrorKind, RecordingError};
pub use events::EngineEvent;
pub use sink::{ContainerSink, StreamDescriptor};
pub use source::{AudioBufferSource, PushError, VideoFrameSource};
pub use types::{AudioBuffer, AudioFormat, EncodedPacket, VideoFormat, VideoFrame};

#[cfg(feature = "h264")]
pub use codec::H264Codec;
#[cfg(feature = "opus")]
pub use codec::OpusCodec;
#[cfg(feature = "mp4")]
pub use sink::Mp4Sink;

/// Initialize logging for the recording engine
pub fn init_logging() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "avrec=info");
    }
    let _ = env_logger::try_init();
}

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
