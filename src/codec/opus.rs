//! Opus audio codec adapter using libopus

use super::{AudioCodec, CodecPacket};
use crate::config::EncoderSettings;
use crate::errors::RecordingError;
use crate::types::{AudioBuffer, AudioFormat, MICROS_PER_SECOND};

/// Opus frame size in samples at 48kHz.
/// 20ms frame duration × 48000 Hz = 960 samples per channel.
/// See RFC 6716 Section 2.1.4: "Opus supports frame sizes from 2.5ms to 60ms"
/// 20ms is the default and most common choice for voice/music.
const OPUS_FRAME_SAMPLES: usize = 960;

/// Opus application type constant.
/// Value 2049 = OPUS_APPLICATION_AUDIO (optimized for music/mixed content)
/// Other options: 2048 = VOIP (speech), 2051 = LOW_DELAY
const OPUS_APPLICATION_AUDIO: i32 = 2049;

/// Opus encoder accumulating PCM into 20ms packets.
///
/// # Thread Safety
/// The underlying `libopus` encoder is NOT thread-safe for concurrent
/// access, but IS safe to use from a single thread after being moved there.
/// The engine enforces this: the codec is moved into its encoder worker
/// thread at `start()` and never escapes it until the session is finalized.
///
/// Do NOT implement `Clone` or `Sync` for this type.
pub struct OpusCodec {
    encoder: *mut libopus_sys::OpusEncoder,
    format: Option<AudioFormat>,
    /// Buffer for accumulating samples until we have a full frame
    sample_buffer: Vec<f32>,
    /// Timestamp of the first sample in the buffer (set once, never updated)
    base_pts: Option<i64>,
    /// Total samples per channel encoded (for PTS calculation)
    samples_encoded: u64,
}

// SAFETY: OpusCodec can be sent to another thread because:
// 1. The raw pointer `encoder` points to memory allocated by libopus
// 2. libopus encoders are safe to use from any single thread
// 3. We do NOT implement Sync, preventing concurrent access
// 4. The worker ownership model ensures only one thread accesses the codec
unsafe impl Send for OpusCodec {}

impl OpusCodec {
    pub fn new() -> Self {
        Self {
            encoder: std::ptr::null_mut(),
            format: None,
            sample_buffer: Vec::new(),
            base_pts: None,
            samples_encoded: 0,
        }
    }

    fn encode_pending(&mut self) -> Result<Vec<CodecPacket>, RecordingError> {
        let format = self
            .format
            .ok_or_else(|| RecordingError::format("Codec is not open"))?;

        let channels = format.channels as usize;
        let samples_per_frame = OPUS_FRAME_SAMPLES * channels;
        let frame_duration = OPUS_FRAME_SAMPLES as i64 * MICROS_PER_SECOND / 48_000;

        let mut packets = Vec::new();
        while self.sample_buffer.len() >= samples_per_frame {
            let frame_samples: Vec<f32> = self.sample_buffer.drain(..samples_per_frame).collect();

            // PTS from absolute sample position since the first buffer
            let pts = self.base_pts.unwrap_or(0)
                + self.samples_encoded as i64 * MICROS_PER_SECOND / 48_000;

            let mut output = vec![0u8; 4000]; // Max Opus packet size
            let len = unsafe {
                libopus_sys::opus_encode_float(
                    self.encoder,
                    frame_samples.as_ptr(),
                    OPUS_FRAME_SAMPLES as i32,
                    output.as_mut_ptr(),
                    output.len() as i32,
                )
            };

            if len < 0 {
                return Err(RecordingError::format(format!(
                    "Opus encoding failed: error code {}",
                    len
                )));
            }

            output.truncate(len as usize);

            packets.push(CodecPacket {
                data: output,
                pts,
                duration: frame_duration,
                key_frame: true,
            });

            self.samples_encoded += OPUS_FRAME_SAMPLES as u64;
        }

        Ok(packets)
    }
}

impl Default for OpusCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioCodec for OpusCodec {
    fn open(
        &mut self,
        format: &AudioFormat,
        settings: &EncoderSettings,
    ) -> Result<(), RecordingError> {
        if format.sample_rate != 48000 {
            return Err(RecordingError::format(
                "Opus requires 48000 Hz sample rate",
            ));
        }

        if format.channels != 1 && format.channels != 2 {
            return Err(RecordingError::format(
                "Opus supports only mono (1) or stereo (2) channels",
            ));
        }

        let mut error: i32 = 0;
        let encoder = unsafe {
            libopus_sys::opus_encoder_create(
                format.sample_rate as i32,
                format.channels as i32,
                OPUS_APPLICATION_AUDIO,
                &mut error,
            )
        };

        if encoder.is_null() || error != 0 {
            return Err(RecordingError::resource(format!(
                "Failed to create Opus encoder: error code {}",
                error
            )));
        }

        let result = unsafe {
            libopus_sys::opus_encoder_ctl(
                encoder,
                libopus_sys::OPUS_SET_BITRATE_REQUEST as i32,
                settings.audio_bitrate as i32,
            )
        };

        if result != 0 {
            unsafe { libopus_sys::opus_encoder_destroy(encoder) };
            return Err(RecordingError::resource(format!(
                "Failed to set bitrate: error code {}",
                result
            )));
        }

        self.encoder = encoder;
        self.format = Some(*format);
        self.sample_buffer =
            Vec::with_capacity(OPUS_FRAME_SAMPLES * format.channels as usize * 2);
        Ok(())
    }

    /// May return no packets if not enough samples accumulated for a full
    /// Opus frame, or several if the buffer spans multiple frames.
    fn encode(&mut self, buffer: &AudioBuffer) -> Result<Vec<CodecPacket>, RecordingError> {
        let format = self
            .format
            .ok_or_else(|| RecordingError::format("Codec is not open"))?;

        if buffer.format != format {
            return Err(RecordingError::format(format!(
                "Buffer format mismatch: expected {}Hz/{}ch, got {}Hz/{}ch",
                format.sample_rate,
                format.channels,
                buffer.format.sample_rate,
                buffer.format.channels
            )));
        }

        if self.base_pts.is_none() && !buffer.samples.is_empty() {
            self.base_pts = Some(buffer.pts);
        }

        self.sample_buffer.extend_from_slice(&buffer.samples);
        self.encode_pending()
    }

    /// Encodes any remaining buffered samples, padding the tail with
    /// silence up to a full Opus frame.
    fn flush(&mut self) -> Result<Vec<CodecPacket>, RecordingError> {
        if self.sample_buffer.is_empty() {
            return Ok(Vec::new());
        }

        let format = self
            .format
            .ok_or_else(|| RecordingError::format("Codec is not open"))?;

        let samples_per_frame = OPUS_FRAME_SAMPLES * format.channels as usize;
        let padding_needed = samples_per_frame - (self.sample_buffer.len() % samples_per_frame);
        if padding_needed < samples_per_frame {
            self.sample_buffer.extend(vec![0.0f32; padding_needed]);
        }

        self.encode_pending()
    }
}

impl Drop for OpusCodec {
    fn drop(&mut self) {
        if !self.encoder.is_null() {
            unsafe {
                libopus_sys::opus_encoder_destroy(self.encoder);
            }
        }
    }
}
