//! In-memory collaborator doubles
//!
//! A recording sink that captures every call for later inspection (with
//! optional failure injection), and codecs that pass items through as
//! packets one-to-one. Together they let whole-session behavior be asserted
//! deterministically.

use std::sync::{Arc, Mutex};

use crate::codec::{AudioCodec, CodecPacket, VideoCodec};
use crate::config::{EncoderSettings, SessionMetadata};
use crate::errors::RecordingError;
use crate::sink::{ContainerSink, StreamDescriptor};
use crate::types::{AudioBuffer, AudioFormat, EncodedPacket, VideoFormat, VideoFrame};

#[derive(Default)]
struct SinkState {
    header_writes: u32,
    trailer_writes: u32,
    closed: bool,
    fail_header: bool,
    fail_packets: bool,
    fail_trailer: bool,
    streams: Vec<StreamDescriptor>,
    metadata: Option<SessionMetadata>,
    packets: Vec<EncodedPacket>,
}

/// Container sink recording all calls in memory.
pub struct MemorySink {
    state: Arc<Mutex<SinkState>>,
}

/// Inspection handle for a [`MemorySink`], usable while the sink itself is
/// owned by the muxer thread.
#[derive(Clone)]
pub struct MemorySinkView {
    state: Arc<Mutex<SinkState>>,
}

impl MemorySink {
    pub fn new() -> (MemorySink, MemorySinkView) {
        let state = Arc::new(Mutex::new(SinkState::default()));
        (
            MemorySink {
                state: state.clone(),
            },
            MemorySinkView { state },
        )
    }
}

impl ContainerSink for MemorySink {
    fn write_header(
        &mut self,
        streams: &[StreamDescriptor],
        metadata: &SessionMetadata,
    ) -> Result<(), RecordingError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_header {
            return Err(RecordingError::io("injected header failure"));
        }
        state.header_writes += 1;
        state.streams = streams.to_vec();
        state.metadata = Some(metadata.clone());
        Ok(())
    }

    fn write_packet(&mut self, packet: &EncodedPacket) -> Result<(), RecordingError> {
        let mut state = self.state.lock().unwrap();
        if state.header_writes == 0 {
            return Err(RecordingError::io("packet written before header"));
        }
        if state.fail_packets {
            return Err(RecordingError::io("injected packet write failure"));
        }
        state.packets.push(packet.clone());
        Ok(())
    }

    fn write_trailer(&mut self) -> Result<(), RecordingError> {
        let mut state = self.state.lock().unwrap();
        if state.header_writes == 0 {
            return Err(RecordingError::io("trailer written before header"));
        }
        if state.fail_trailer {
            return Err(RecordingError::format("injected trailer failure"));
        }
        state.trailer_writes += 1;
        Ok(())
    }

    fn close(&mut self) {
        self.state.lock().unwrap().closed = true;
    }
}

impl MemorySinkView {
    pub fn header_written(&self) -> bool {
        self.state.lock().unwrap().header_writes > 0
    }

    pub fn header_writes(&self) -> u32 {
        self.state.lock().unwrap().header_writes
    }

    pub fn trailer_written(&self) -> bool {
        self.state.lock().unwrap().trailer_writes > 0
    }

    pub fn trailer_writes(&self) -> u32 {
        self.state.lock().unwrap().trailer_writes
    }

    pub fn closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn streams(&self) -> Vec<StreamDescriptor> {
        self.state.lock().unwrap().streams.clone()
    }

    pub fn metadata(&self) -> Option<SessionMetadata> {
        self.state.lock().unwrap().metadata.clone()
    }

    pub fn packets(&self) -> Vec<EncodedPacket> {
        self.state.lock().unwrap().packets.clone()
    }

    /// Packets of one stream, in write order.
    pub fn stream_packets(&self, stream_index: usize) -> Vec<EncodedPacket> {
        self.state
            .lock()
            .unwrap()
            .packets
            .iter()
            .filter(|p| p.stream_index == stream_index)
            .cloned()
            .collect()
    }

    pub fn fail_header(&self, fail: bool) {
        self.state.lock().unwrap().fail_header = fail;
    }

    pub fn fail_packets(&self, fail: bool) {
        self.state.lock().unwrap().fail_packets = fail;
    }

    pub fn fail_trailer(&self, fail: bool) {
        self.state.lock().unwrap().fail_trailer = fail;
    }
}

/// Audio codec emitting exactly one packet per buffer, carrying the
/// buffer's own timestamps.
pub struct PassthroughAudioCodec {
    open: bool,
}

impl PassthroughAudioCodec {
    pub fn new() -> Self {
        Self { open: false }
    }
}

impl Default for PassthroughAudioCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioCodec for PassthroughAudioCodec {
    fn open(
        &mut self,
        format: &AudioFormat,
        _settings: &EncoderSettings,
    ) -> Result<(), RecordingError> {
        if !format.is_valid() {
            return Err(RecordingError::format("invalid audio format"));
        }
        self.open = true;
        Ok(())
    }

    fn encode(&mut self, buffer: &AudioBuffer) -> Result<Vec<CodecPacket>, RecordingError> {
        if !self.open {
            return Err(RecordingError::format("codec is not open"));
        }
        Ok(vec![CodecPacket {
            data: vec![0xAA; buffer.samples.len().max(1)],
            pts: buffer.pts,
            duration: buffer.duration_us(),
            key_frame: true,
        }])
    }

    fn flush(&mut self) -> Result<Vec<CodecPacket>, RecordingError> {
        Ok(Vec::new())
    }
}

/// Video codec emitting exactly one packet per frame, carrying the frame's
/// own timestamps. Keyframe requests mark the next packet.
pub struct PassthroughVideoCodec {
    open: bool,
    frame_count: u64,
    keyframe_requested: bool,
}

impl PassthroughVideoCodec {
    pub fn new() -> Self {
        Self {
            open: false,
            frame_count: 0,
            keyframe_requested: false,
        }
    }
}

impl Default for PassthroughVideoCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoCodec for PassthroughVideoCodec {
    fn open(
        &mut self,
        format: &VideoFormat,
        _settings: &EncoderSettings,
    ) -> Result<(), RecordingError> {
        if !format.is_valid() {
            return Err(RecordingError::format("invalid video format"));
        }
        self.open = true;
        Ok(())
    }

    fn encode(&mut self, frame: &VideoFrame) -> Result<Vec<CodecPacket>, RecordingError> {
        if !self.open {
            return Err(RecordingError::format("codec is not open"));
        }
        let key_frame = self.frame_count == 0 || self.keyframe_requested;
        self.keyframe_requested = false;
        self.frame_count += 1;
        Ok(vec![CodecPacket {
            data: vec![0x55; frame.data.len().min(64).max(1)],
            pts: frame.pts,
            duration: frame.format.frame_duration_us(),
            key_frame,
        }])
    }

    fn flush(&mut self) -> Result<Vec<CodecPacket>, RecordingError> {
        Ok(Vec::new())
    }

    fn request_keyframe(&mut self) {
        self.keyframe_requested = true;
    }
}

/// Which codec call should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecFailure {
    OnOpen,
    OnEncode,
}

/// Audio codec that fails at a configurable point, for error-path tests.
pub struct FailingAudioCodec {
    failure: CodecFailure,
}

impl FailingAudioCodec {
    pub fn new(failure: CodecFailure) -> Self {
        Self { failure }
    }
}

impl AudioCodec for FailingAudioCodec {
    fn open(
        &mut self,
        _format: &AudioFormat,
        _settings: &EncoderSettings,
    ) -> Result<(), RecordingError> {
        if self.failure == CodecFailure::OnOpen {
            return Err(RecordingError::format("Cannot initialize encoder"));
        }
        Ok(())
    }

    fn encode(&mut self, _buffer: &AudioBuffer) -> Result<Vec<CodecPacket>, RecordingError> {
        Err(RecordingError::format("encode failed"))
    }

    fn flush(&mut self) -> Result<Vec<CodecPacket>, RecordingError> {
        Ok(Vec::new())
    }
}
