//! Video encoder worker
//!
//! Besides driving the codec, the video path owns the pause re-basing:
//! source frames keep their capture-clock timestamps, and the worker maps
//! them onto the recording timeline. Pausing arms a re-base so the first
//! frame after resume continues right where the last written frame ended;
//! recorded timestamps never jump backwards and never leave a gap.

use super::muxer::PacketSender;
use super::worker::StreamEncoder;
use crate::codec::VideoCodec;
use crate::config::EncoderSettings;
use crate::errors::RecordingError;
use crate::types::{VideoFormat, VideoFrame};

/// Mapping from source timestamps onto the recording timeline.
enum BaseTime {
    /// No frame seen yet; the first frame defines time zero.
    Unset,
    /// A pause happened; the next frame re-anchors the mapping.
    Rebase,
    /// Source pts minus this base is the recorded pts.
    Set(i64),
}

pub(crate) struct VideoWorker {
    codec: Box<dyn VideoCodec>,
    format: VideoFormat,
    settings: EncoderSettings,
    packets: PacketSender,
    base: BaseTime,
    /// End timestamp (pts + duration) of the last encoded frame.
    next_pts: i64,
}

impl VideoWorker {
    pub fn new(
        codec: Box<dyn VideoCodec>,
        format: VideoFormat,
        settings: EncoderSettings,
        packets: PacketSender,
    ) -> Self {
        Self {
            codec,
            format,
            settings,
            packets,
            base: BaseTime::Unset,
            next_pts: 0,
        }
    }

    fn rebase(&mut self, source_pts: i64) -> i64 {
        let base = match self.base {
            BaseTime::Unset => source_pts,
            BaseTime::Rebase => source_pts - self.next_pts,
            BaseTime::Set(base) => base,
        };
        self.base = BaseTime::Set(base);
        source_pts - base
    }
}

impl StreamEncoder for VideoWorker {
    type Item = VideoFrame;

    fn init(&mut self) -> Result<(), RecordingError> {
        self.codec.open(&self.format, &self.settings)
    }

    fn process_one(&mut self, mut frame: VideoFrame) -> Result<(), RecordingError> {
        frame.pts = self.rebase(frame.pts);
        self.next_pts = frame.pts + self.format.frame_duration_us();

        let packets = self.codec.encode(&frame)?;
        self.packets.forward(packets)
    }

    fn cleanup(&mut self) -> Result<(), RecordingError> {
        let packets = self.codec.flush()?;
        self.packets.forward(packets)
    }

    fn on_paused(&mut self) {
        self.base = BaseTime::Rebase;
    }

    fn request_keyframe(&mut self) {
        self.codec.request_keyframe();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::engine::muxer::PacketSender;
    use crate::engine::DurationTracker;
    use crate::events::EventSink;
    use crate::testing::PassthroughVideoCodec;
    use crate::types::EncodedPacket;

    fn worker_with_capture() -> (VideoWorker, crossbeam_channel::Receiver<EncodedPacket>) {
        let format = VideoFormat::new(4, 4, 25.0); // 40ms frames
        let (tx, rx) = crossbeam_channel::bounded(64);
        let (events, _events_rx) = EventSink::channel();
        let duration = Arc::new(DurationTracker::new(events));
        let mut worker = VideoWorker::new(
            Box::new(PassthroughVideoCodec::new()),
            format,
            EncoderSettings::default(),
            PacketSender::new(tx, 0, duration),
        );
        worker.init().unwrap();
        (worker, rx)
    }

    fn frame(pts: i64) -> VideoFrame {
        VideoFrame::new(vec![0; 48], VideoFormat::new(4, 4, 25.0), pts)
    }

    #[test]
    fn test_first_frame_defines_time_zero() {
        let (mut worker, rx) = worker_with_capture();
        worker.process_one(frame(5_000_000)).unwrap();
        worker.process_one(frame(5_040_000)).unwrap();

        assert_eq!(rx.try_recv().unwrap().pts, 0);
        assert_eq!(rx.try_recv().unwrap().pts, 40_000);
    }

    #[test]
    fn test_resume_continues_without_gap_or_jump() {
        let (mut worker, rx) = worker_with_capture();
        worker.process_one(frame(1_000_000)).unwrap();
        worker.process_one(frame(1_040_000)).unwrap();

        // Producer time keeps running during the pause; recorded time must not.
        worker.on_paused();
        worker.process_one(frame(9_000_000)).unwrap();
        worker.process_one(frame(9_040_000)).unwrap();

        let pts: Vec<i64> = (0..4).map(|_| rx.try_recv().unwrap().pts).collect();
        assert_eq!(pts, vec![0, 40_000, 80_000, 120_000]);
    }

    #[test]
    fn test_double_pause_without_frames_between() {
        let (mut worker, rx) = worker_with_capture();
        worker.process_one(frame(0)).unwrap();
        worker.on_paused();
        worker.on_paused();
        worker.process_one(frame(77_000_000)).unwrap();

        let pts: Vec<i64> = (0..2).map(|_| rx.try_recv().unwrap().pts).collect();
        assert_eq!(pts, vec![0, 40_000]);
    }
}
