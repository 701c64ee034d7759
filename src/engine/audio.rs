//! Audio encoder worker

use super::muxer::PacketSender;
use super::worker::StreamEncoder;
use crate::codec::AudioCodec;
use crate::config::EncoderSettings;
use crate::errors::RecordingError;
use crate::types::{AudioBuffer, AudioFormat};

/// Per-stream logic for one audio source: drives the codec and forwards
/// packets to the muxer. The codec may buffer samples across buffers, so a
/// single item can yield zero or several packets.
pub(crate) struct AudioWorker {
    codec: Box<dyn AudioCodec>,
    format: AudioFormat,
    settings: EncoderSettings,
    packets: PacketSender,
}

impl AudioWorker {
    pub fn new(
        codec: Box<dyn AudioCodec>,
        format: AudioFormat,
        settings: EncoderSettings,
        packets: PacketSender,
    ) -> Self {
        Self {
            codec,
            format,
            settings,
            packets,
        }
    }
}

impl StreamEncoder for AudioWorker {
    type Item = AudioBuffer;

    fn init(&mut self) -> Result<(), RecordingError> {
        self.codec.open(&self.format, &self.settings)
    }

    fn process_one(&mut self, buffer: AudioBuffer) -> Result<(), RecordingError> {
        let packets = self.codec.encode(&buffer)?;
        self.packets.forward(packets)
    }

    fn cleanup(&mut self) -> Result<(), RecordingError> {
        let packets = self.codec.flush()?;
        self.packets.forward(packets)
    }
}
