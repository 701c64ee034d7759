//! Core media types shared by sources, workers, and the muxer
//!
//! All timestamps are presentation times in microseconds. Items (audio
//! buffers, video frames) are moved into a worker's queue on push and moved
//! out on pop; they are never shared between threads.

use serde::{Deserialize, Serialize};

/// One second in microseconds; the engine's common timebase.
pub const MICROS_PER_SECOND: i64 = 1_000_000;

/// PCM audio stream parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of interleaved channels
    pub channels: u16,
}

impl AudioFormat {
    pub fn new(sample_rate: u32, channels: u16) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    /// Whether this format can drive a codec.
    pub fn is_valid(&self) -> bool {
        self.sample_rate > 0 && self.channels > 0
    }

    /// Duration in microseconds of `sample_count` samples per channel.
    pub fn samples_duration_us(&self, sample_count: usize) -> i64 {
        if self.sample_rate == 0 {
            return 0;
        }
        sample_count as i64 * MICROS_PER_SECOND / self.sample_rate as i64
    }
}

/// Raw video stream parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VideoFormat {
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Nominal frames per second
    pub frame_rate: f64,
}

impl VideoFormat {
    pub fn new(width: u32, height: u32, frame_rate: f64) -> Self {
        Self {
            width,
            height,
            frame_rate,
        }
    }

    /// Whether this format can drive a codec.
    pub fn is_valid(&self) -> bool {
        self.width > 0 && self.height > 0 && self.frame_rate > 0.0
    }

    /// Nominal duration of one frame in microseconds.
    pub fn frame_duration_us(&self) -> i64 {
        if self.frame_rate <= 0.0 {
            return 0;
        }
        (MICROS_PER_SECOND as f64 / self.frame_rate) as i64
    }

    /// Expected byte length of one RGB24 frame.
    pub fn rgb_frame_len(&self) -> usize {
        (self.width * self.height * 3) as usize
    }
}

/// One chunk of interleaved f32 PCM handed from a source to an encoder.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Interleaved f32 PCM samples
    pub samples: Vec<f32>,
    /// Format the samples were captured in
    pub format: AudioFormat,
    /// Presentation timestamp of the first sample, microseconds
    pub pts: i64,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, format: AudioFormat, pts: i64) -> Self {
        Self {
            samples,
            format,
            pts,
        }
    }

    /// Samples per channel contained in this buffer.
    pub fn frame_count(&self) -> usize {
        if self.format.channels == 0 {
            return 0;
        }
        self.samples.len() / self.format.channels as usize
    }

    /// Play time covered by this buffer, microseconds.
    pub fn duration_us(&self) -> i64 {
        self.format.samples_duration_us(self.frame_count())
    }
}

/// One RGB24 video frame handed from a source to an encoder.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Packed RGB24 pixel data, row-major
    pub data: Vec<u8>,
    /// Format the frame was produced in
    pub format: VideoFormat,
    /// Presentation timestamp, microseconds
    pub pts: i64,
}

impl VideoFrame {
    pub fn new(data: Vec<u8>, format: VideoFormat, pts: i64) -> Self {
        Self { data, format, pts }
    }
}

/// Codec output unit ready for container writing.
///
/// Produced by exactly one encoder worker and consumed exactly once by the
/// muxer.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedPacket {
    /// Index of the stream this packet belongs to
    pub stream_index: usize,
    /// Presentation timestamp, microseconds
    pub pts: i64,
    /// Play time covered by the packet, microseconds
    pub duration: i64,
    /// Encoded payload bytes
    pub data: Vec<u8>,
    /// Whether the packet starts a decodable unit (IDR/I frame)
    pub key_frame: bool,
}
