//! Container sink collaborator trait
//!
//! The sink represents the multiplexed output container. It is owned
//! exclusively by the muxer thread once the session starts; no other
//! component ever writes to it. Call order is guaranteed by the engine:
//! `write_header` once, then packets, then `write_trailer` at most once and
//! only if the header succeeded, then `close`.

use crate::config::SessionMetadata;
use crate::errors::RecordingError;
use crate::types::{AudioFormat, EncodedPacket, VideoFormat};

#[cfg(feature = "mp4")]
mod mp4;

#[cfg(feature = "mp4")]
pub use mp4::Mp4Sink;

/// Description of one stream registered with the container.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamDescriptor {
    Audio { index: usize, format: AudioFormat },
    Video { index: usize, format: VideoFormat },
}

impl StreamDescriptor {
    /// The stream index packets of this stream carry.
    pub fn index(&self) -> usize {
        match self {
            StreamDescriptor::Audio { index, .. } => *index,
            StreamDescriptor::Video { index, .. } => *index,
        }
    }

    pub fn is_video(&self) -> bool {
        matches!(self, StreamDescriptor::Video { .. })
    }
}

/// Writer for the multiplexed output container.
pub trait ContainerSink: Send {
    /// Open the container and write its header for the given streams.
    fn write_header(
        &mut self,
        streams: &[StreamDescriptor],
        metadata: &SessionMetadata,
    ) -> Result<(), RecordingError>;

    /// Append one encoded packet. Packets of one stream arrive in
    /// presentation order; the container's own interleaving is trusted for
    /// cross-stream file-level ordering.
    fn write_packet(&mut self, packet: &EncodedPacket) -> Result<(), RecordingError>;

    /// Write the container trailer. Called at most once, and only after a
    /// successful `write_header`.
    fn write_trailer(&mut self) -> Result<(), RecordingError>;

    /// Release the underlying I/O resources. Always called, even after a
    /// trailer failure.
    fn close(&mut self);
}
