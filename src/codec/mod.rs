//! Codec collaborator traits
//!
//! The engine drives codecs through these traits and never depends on a
//! concrete implementation. A codec is owned by exactly one encoder worker
//! and is only ever touched from that worker's thread; `open` runs on the
//! worker thread before the first item, `flush` drains whatever the codec
//! still buffers (delayed frames, partial audio frames) during shutdown.

use crate::config::EncoderSettings;
use crate::errors::RecordingError;
use crate::types::{AudioBuffer, AudioFormat, VideoFormat, VideoFrame};

#[cfg(feature = "h264")]
mod h264;
#[cfg(feature = "opus")]
mod opus;

#[cfg(feature = "h264")]
pub use h264::H264Codec;
#[cfg(feature = "opus")]
pub use opus::OpusCodec;

/// One encoded unit produced by a codec, before stream assignment.
#[derive(Debug, Clone)]
pub struct CodecPacket {
    /// Encoded payload bytes
    pub data: Vec<u8>,
    /// Presentation timestamp, microseconds
    pub pts: i64,
    /// Play time covered by the packet, microseconds
    pub duration: i64,
    /// Whether the packet starts a decodable unit
    pub key_frame: bool,
}

/// PCM-to-packet audio codec.
pub trait AudioCodec: Send {
    /// Open the codec for the resolved source format. Called once, on the
    /// worker thread, before any buffer is encoded.
    fn open(&mut self, format: &AudioFormat, settings: &EncoderSettings)
        -> Result<(), RecordingError>;

    /// Encode one buffer. May emit zero packets (samples buffered) or
    /// several (buffer spans multiple codec frames).
    fn encode(&mut self, buffer: &AudioBuffer) -> Result<Vec<CodecPacket>, RecordingError>;

    /// Drain buffered samples at end of stream.
    fn flush(&mut self) -> Result<Vec<CodecPacket>, RecordingError>;
}

/// Raw-frame-to-packet video codec.
pub trait VideoCodec: Send {
    /// Open the codec for the resolved source format. Called once, on the
    /// worker thread, before any frame is encoded.
    fn open(&mut self, format: &VideoFormat, settings: &EncoderSettings)
        -> Result<(), RecordingError>;

    /// Encode one frame. May emit zero packets (codec delay) or several
    /// (delayed frames becoming available).
    fn encode(&mut self, frame: &VideoFrame) -> Result<Vec<CodecPacket>, RecordingError>;

    /// Drain delayed frames at end of stream.
    fn flush(&mut self) -> Result<Vec<CodecPacket>, RecordingError>;

    /// Ask for the next encoded frame to be a keyframe. Optional.
    fn request_keyframe(&mut self) {}
}
