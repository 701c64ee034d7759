//! Synthetic media data for offline testing
//!
//! Generates frames and buffers with realistic-looking content so encoder
//! paths can be exercised reliably without capture hardware.

use crate::types::{AudioBuffer, AudioFormat, VideoFormat, VideoFrame};

/// Create a synthetic RGB24 video frame.
///
/// The gradient pattern changes each frame to exercise temporal encoding;
/// the presentation timestamp follows the format's nominal frame rate.
pub fn synthetic_video_frame(frame_number: u64, format: VideoFormat) -> VideoFrame {
    let width = format.width;
    let height = format.height;
    let mut data = vec![0u8; format.rgb_frame_len()];

    let base = (frame_number % 256) as u8;
    for y in 0..height {
        for x in 0..width {
            let idx = ((y * width + x) * 3) as usize;
            // RGB gradient that varies by position and frame
            data[idx] = base.wrapping_add((x % 256) as u8); // R
            data[idx + 1] = base.wrapping_add((y % 256) as u8); // G
            data[idx + 2] = base.wrapping_add(((x + y) % 256) as u8); // B
        }
    }

    let pts = frame_number as i64 * format.frame_duration_us();
    VideoFrame::new(data, format, pts)
}

/// Create a synthetic audio buffer of interleaved f32 PCM.
///
/// A 440Hz sine wave, phase-continuous across consecutive buffer numbers.
pub fn synthetic_audio_buffer(
    buffer_number: u64,
    samples_per_buffer: usize,
    format: AudioFormat,
) -> AudioBuffer {
    let sample_rate = format.sample_rate as f64;
    let frequency = 440.0;
    let channels = format.channels as usize;

    let mut samples = vec![0.0f32; samples_per_buffer * channels];
    for i in 0..samples_per_buffer {
        let t = (buffer_number as f64 * samples_per_buffer as f64 + i as f64) / sample_rate;
        let value = (2.0 * std::f64::consts::PI * frequency * t).sin() as f32 * 0.3;
        for channel in 0..channels {
            samples[i * channels + channel] = value;
        }
    }

    let pts = format.samples_duration_us(buffer_number as usize * samples_per_buffer);
    AudioBuffer::new(samples, format, pts)
}
