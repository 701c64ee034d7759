//! MP4 container sink using muxide
//!
//! This backend writes the session's video track to an MP4 file. muxide's
//! writer wants the video parameters up front, so the muxer is built lazily
//! at `write_header` when the resolved stream layout is known.
//!
//! Limitation: muxide is driven video-only here; sessions that carry an
//! audio stream need a sink backend with audio track support.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use muxide::api::{Metadata, Muxer, MuxerBuilder, VideoCodec};

use super::{ContainerSink, StreamDescriptor};
use crate::config::{EncoderSettings, SessionMetadata};
use crate::errors::RecordingError;
use crate::types::{EncodedPacket, MICROS_PER_SECOND};

/// MP4 file sink for a single H.264 video stream.
pub struct Mp4Sink {
    path: PathBuf,
    settings: EncoderSettings,
    muxer: Option<Muxer<BufWriter<File>>>,
    video_stream: Option<usize>,
}

impl Mp4Sink {
    /// Create a sink that will write to `path` once the header is requested.
    pub fn new<P: AsRef<Path>>(path: P, settings: EncoderSettings) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            settings,
            muxer: None,
            video_stream: None,
        }
    }
}

impl ContainerSink for Mp4Sink {
    fn write_header(
        &mut self,
        streams: &[StreamDescriptor],
        metadata: &SessionMetadata,
    ) -> Result<(), RecordingError> {
        let video = streams
            .iter()
            .find_map(|stream| match stream {
                StreamDescriptor::Video { index, format } => Some((*index, *format)),
                _ => None,
            })
            .ok_or_else(|| RecordingError::format("MP4 backend requires a video stream"))?;

        if streams.len() > 1 {
            return Err(RecordingError::format(
                "MP4 backend only writes a single video track",
            ));
        }

        let (index, format) = video;

        let file = File::create(&self.path)
            .map_err(|e| RecordingError::io(format!("Failed to create output file: {}", e)))?;
        let writer = BufWriter::new(file);

        let mut builder = MuxerBuilder::new(writer)
            .video(
                VideoCodec::H264,
                format.width,
                format.height,
                format.frame_rate,
            )
            .with_fast_start(self.settings.fast_start);

        let mut tags = Metadata::new().with_current_time();
        if let Some(ref title) = metadata.title {
            tags = tags.with_title(title);
        }
        builder = builder.with_metadata(tags);

        let muxer = builder
            .build()
            .map_err(|e| RecordingError::format(format!("Failed to create muxer: {}", e)))?;

        self.muxer = Some(muxer);
        self.video_stream = Some(index);
        Ok(())
    }

    fn write_packet(&mut self, packet: &EncodedPacket) -> Result<(), RecordingError> {
        let muxer = self
            .muxer
            .as_mut()
            .ok_or_else(|| RecordingError::io("Container header has not been written"))?;

        if Some(packet.stream_index) != self.video_stream {
            return Err(RecordingError::io(format!(
                "Unknown stream index {}",
                packet.stream_index
            )));
        }

        let pts = packet.pts as f64 / MICROS_PER_SECOND as f64;
        muxer
            .write_video(pts, &packet.data, packet.key_frame)
            .map_err(|e| RecordingError::io(format!("Failed to write frame: {}", e)))
    }

    fn write_trailer(&mut self) -> Result<(), RecordingError> {
        let muxer = self
            .muxer
            .take()
            .ok_or_else(|| RecordingError::io("Container header has not been written"))?;

        let stats = muxer
            .finish_with_stats()
            .map_err(|e| RecordingError::format(format!("Failed to finalize container: {}", e)))?;

        log::debug!(
            "mp4 trailer written: {} frames, {:.2}s, {} bytes",
            stats.video_frames,
            stats.duration_secs,
            stats.bytes_written
        );
        Ok(())
    }

    fn close(&mut self) {
        // finish_with_stats() already flushed the writer; dropping a muxer
        // that never finished discards the partial file handle.
        self.muxer = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VideoFormat;
    use tempfile::tempdir;

    #[test]
    fn test_header_requires_video_stream() {
        let dir = tempdir().expect("tempdir");
        let mut sink = Mp4Sink::new(dir.path().join("out.mp4"), EncoderSettings::default());

        let streams = [StreamDescriptor::Audio {
            index: 0,
            format: crate::types::AudioFormat::new(48000, 2),
        }];
        assert!(sink
            .write_header(&streams, &SessionMetadata::new())
            .is_err());
    }

    #[test]
    fn test_packet_before_header_fails() {
        let dir = tempdir().expect("tempdir");
        let mut sink = Mp4Sink::new(dir.path().join("out.mp4"), EncoderSettings::default());

        let packet = EncodedPacket {
            stream_index: 0,
            pts: 0,
            duration: 33_333,
            data: vec![0, 0, 0, 1],
            key_frame: true,
        };
        assert!(sink.write_packet(&packet).is_err());
    }

    #[test]
    fn test_header_creates_file() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("out.mp4");
        let mut sink = Mp4Sink::new(&path, EncoderSettings::default());

        let streams = [StreamDescriptor::Video {
            index: 0,
            format: VideoFormat::new(640, 480, 30.0),
        }];
        sink.write_header(&streams, &SessionMetadata::new().with_title("Test"))
            .expect("header should be written");

        assert!(path.exists());
    }
}
