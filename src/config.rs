//! Session configuration types

use serde::{Deserialize, Serialize};

/// Quality presets for a recording session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordingQuality {
    /// 720p-class bitrates - good for previews/streaming
    Low,
    /// 1080p-class bitrates - balanced quality
    Medium,
    /// High bitrate for archival quality
    High,
    /// Custom settings
    Custom,
}

impl RecordingQuality {
    /// Get recommended video bitrate in bits per second
    pub fn video_bitrate(&self) -> u32 {
        match self {
            RecordingQuality::Low => 2_500_000,
            RecordingQuality::Medium => 5_000_000,
            RecordingQuality::High => 10_000_000,
            RecordingQuality::Custom => 5_000_000,
        }
    }

    /// Get recommended audio bitrate in bits per second
    pub fn audio_bitrate(&self) -> u32 {
        match self {
            RecordingQuality::Low => 96_000,
            RecordingQuality::Medium => 128_000,
            RecordingQuality::High => 192_000,
            RecordingQuality::Custom => 128_000,
        }
    }
}

impl Default for RecordingQuality {
    fn default() -> Self {
        RecordingQuality::High
    }
}

/// Per-session encoder configuration.
///
/// Stream dimensions and sample rates come from the source formats; the
/// settings only carry rate-control hints and container options. The engine
/// treats these as opaque and forwards them to codecs and the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncoderSettings {
    /// Target video bitrate in bits per second
    pub video_bitrate: u32,
    /// Target audio bitrate in bits per second
    pub audio_bitrate: u32,
    /// Quality preset used
    pub quality: RecordingQuality,
    /// Enable fast-start for web streaming (moov before mdat)
    pub fast_start: bool,
}

impl EncoderSettings {
    /// Create settings from a quality preset
    pub fn from_quality(quality: RecordingQuality) -> Self {
        Self {
            video_bitrate: quality.video_bitrate(),
            audio_bitrate: quality.audio_bitrate(),
            quality,
            fast_start: true,
        }
    }

    /// Set custom video bitrate
    pub fn with_video_bitrate(mut self, bitrate: u32) -> Self {
        self.video_bitrate = bitrate;
        self.quality = RecordingQuality::Custom;
        self
    }

    /// Set custom audio bitrate
    pub fn with_audio_bitrate(mut self, bitrate: u32) -> Self {
        self.audio_bitrate = bitrate;
        self.quality = RecordingQuality::Custom;
        self
    }

    /// Set fast-start mode
    pub fn with_fast_start(mut self, enabled: bool) -> Self {
        self.fast_start = enabled;
        self
    }
}

impl Default for EncoderSettings {
    fn default() -> Self {
        Self::from_quality(RecordingQuality::High)
    }
}

/// Arbitrary key-value session metadata forwarded to the container header.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionMetadata {
    /// Optional title tag
    pub title: Option<String>,
    /// Remaining tags, in insertion order
    pub tags: Vec<(String, String)>,
}

impl SessionMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the title tag
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Add a key-value tag
    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.push((key.into(), value.into()));
        self
    }
}

/// Statistics returned once a session has been finalized
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionStats {
    /// Packets written per stream, indexed by stream index
    pub packets_per_stream: Vec<u64>,
    /// Total payload bytes handed to the container
    pub bytes_written: u64,
    /// Furthest presentation timestamp observed, microseconds
    pub duration_us: i64,
}

impl SessionStats {
    /// Total packets written across all streams
    pub fn total_packets(&self) -> u64 {
        self.packets_per_stream.iter().sum()
    }
}
