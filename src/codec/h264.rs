//! H.264 video codec adapter using openh264

use openh264::encoder::{Encoder, FrameType};
use openh264::formats::YUVBuffer;

use super::{CodecPacket, VideoCodec};
use crate::config::EncoderSettings;
use crate::errors::RecordingError;
use crate::types::{VideoFormat, VideoFrame};

/// H.264 encoder producing Annex B packets.
pub struct H264Codec {
    encoder: Option<Encoder>,
    format: Option<VideoFormat>,
    frame_count: u64,
}

impl H264Codec {
    pub fn new() -> Self {
        Self {
            encoder: None,
            format: None,
            frame_count: 0,
        }
    }

    /// Get the number of frames encoded
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }
}

impl Default for H264Codec {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoCodec for H264Codec {
    /// Note: openh264 determines dimensions from the YUVSource at encode
    /// time; the settings bitrate is a hint for the encoder's rate control.
    fn open(
        &mut self,
        format: &VideoFormat,
        _settings: &EncoderSettings,
    ) -> Result<(), RecordingError> {
        let encoder = Encoder::new()
            .map_err(|e| RecordingError::format(format!("Failed to create encoder: {}", e)))?;
        self.encoder = Some(encoder);
        self.format = Some(*format);
        Ok(())
    }

    fn encode(&mut self, frame: &VideoFrame) -> Result<Vec<CodecPacket>, RecordingError> {
        let format = self
            .format
            .ok_or_else(|| RecordingError::format("Codec is not open"))?;
        let encoder = self
            .encoder
            .as_mut()
            .ok_or_else(|| RecordingError::format("Codec is not open"))?;

        let expected = format.rgb_frame_len();
        if frame.data.len() != expected {
            return Err(RecordingError::format(format!(
                "Invalid frame size: expected {} bytes, got {}",
                expected,
                frame.data.len()
            )));
        }

        let yuv = rgb_to_yuv420(&frame.data, format.width, format.height);
        let yuv_buffer = YUVBuffer::from_vec(yuv, format.width as usize, format.height as usize);

        let bitstream = encoder
            .encode(&yuv_buffer)
            .map_err(|e| RecordingError::format(format!("Encoding failed: {}", e)))?;

        self.frame_count += 1;

        let key_frame = matches!(bitstream.frame_type(), FrameType::IDR | FrameType::I);
        let data = bitstream.to_vec();

        // The encoder may return no data for some frames.
        if data.is_empty() {
            return Ok(Vec::new());
        }

        Ok(vec![CodecPacket {
            data,
            pts: frame.pts,
            duration: format.frame_duration_us(),
            key_frame,
        }])
    }

    fn flush(&mut self) -> Result<Vec<CodecPacket>, RecordingError> {
        // openh264 emits each frame synchronously; nothing is buffered.
        Ok(Vec::new())
    }

    fn request_keyframe(&mut self) {
        if let Some(encoder) = self.encoder.as_mut() {
            encoder.force_intra_frame();
        }
    }
}

/// Convert RGB24 to YUV420 planar format
fn rgb_to_yuv420(rgb: &[u8], width: u32, height: u32) -> Vec<u8> {
    let w = width as usize;
    let h = height as usize;

    // YUV420: Y plane (w*h) + U plane (w/2 * h/2) + V plane (w/2 * h/2)
    let y_size = w * h;
    let uv_size = (w / 2) * (h / 2);
    let mut yuv = vec![0u8; y_size + uv_size * 2];

    let (y_plane, uv_planes) = yuv.split_at_mut(y_size);
    let (u_plane, v_plane) = uv_planes.split_at_mut(uv_size);

    for y in 0..h {
        for x in 0..w {
            let rgb_idx = (y * w + x) * 3;
            let r = rgb[rgb_idx] as i32;
            let g = rgb[rgb_idx + 1] as i32;
            let b = rgb[rgb_idx + 2] as i32;

            // BT.601 conversion
            let y_val = ((66 * r + 129 * g + 25 * b + 128) >> 8) + 16;
            y_plane[y * w + x] = y_val.clamp(0, 255) as u8;

            // Subsample U and V (2x2 blocks)
            if y % 2 == 0 && x % 2 == 0 {
                let uv_idx = (y / 2) * (w / 2) + (x / 2);
                let u_val = ((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128;
                let v_val = ((112 * r - 94 * g - 18 * b + 128) >> 8) + 128;
                u_plane[uv_idx] = u_val.clamp(0, 255) as u8;
                v_plane[uv_idx] = v_val.clamp(0, 255) as u8;
            }
        }
    }

    yuv
}
