//! Property-based tests for the recording engine
//!
//! These verify ordering, duration, and backpressure invariants using
//! proptest for input generation and shrinking.

use std::time::Duration;

use proptest::prelude::*;

use avrec::testing::{MemorySink, PassthroughAudioCodec, PassthroughVideoCodec};
use avrec::{
    AudioBuffer, AudioBufferSource, AudioFormat, EncoderSettings, EngineEvent, RecordingEngine,
    RecordingQuality, StreamInput, VideoFormat, VideoFrameSource,
};

const INIT_TIMEOUT: Duration = Duration::from_secs(2);

fn audio_format() -> AudioFormat {
    AudioFormat::new(48000, 2)
}

fn buffer(pts: i64) -> AudioBuffer {
    AudioBuffer::new(vec![0.0; 960 * 2], audio_format(), pts)
}

fn push_retrying(source: &AudioBufferSource, mut item: AudioBuffer) {
    loop {
        match source.push_buffer(item) {
            Ok(()) => return,
            Err(err) => {
                item = err.into_item();
                std::thread::sleep(Duration::from_millis(1));
            }
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// INVARIANT: packets of one stream leave the engine in push order.
    #[test]
    fn audio_packets_keep_push_order(
        gaps in prop::collection::vec(1i64..50_000, 1..40),
    ) {
        let (sink, view) = MemorySink::new();
        let mut engine = RecordingEngine::new(EncoderSettings::default(), sink);
        let source = AudioBufferSource::new(audio_format());

        engine
            .initialize(
                vec![StreamInput::audio(source.clone(), PassthroughAudioCodec::new())],
                INIT_TIMEOUT,
            )
            .unwrap();
        engine.start().unwrap();

        // Strictly increasing timestamps with arbitrary gaps.
        let mut pts = 0;
        let mut pushed = Vec::new();
        for gap in &gaps {
            pts += gap;
            pushed.push(pts);
            push_retrying(&source, buffer(pts));
        }

        engine.finalize().wait();

        let written: Vec<i64> = view.stream_packets(0).iter().map(|p| p.pts).collect();
        prop_assert_eq!(written, pushed);
    }

    /// INVARIANT: duration events are strictly increasing for any ordering
    /// of timestamp reports, and the final duration is the furthest packet
    /// end observed.
    #[test]
    fn duration_events_never_decrease(
        timestamps in prop::collection::vec(0i64..1_000_000_000, 1..50),
    ) {
        let (sink, _view) = MemorySink::new();
        let mut engine = RecordingEngine::new(EncoderSettings::default(), sink);
        let events = engine.events();
        let source = AudioBufferSource::new(audio_format());

        engine
            .initialize(
                vec![StreamInput::audio(source.clone(), PassthroughAudioCodec::new())],
                INIT_TIMEOUT,
            )
            .unwrap();
        engine.start().unwrap();

        for &pts in &timestamps {
            push_retrying(&source, buffer(pts));
        }

        let stats = engine.finalize().wait();

        let buffer_duration = 20_000;
        let expected = timestamps.iter().max().unwrap() + buffer_duration;
        prop_assert_eq!(stats.duration_us, expected);

        let mut last = 0;
        for event in events.try_iter() {
            if let EngineEvent::DurationChanged(value) = event {
                prop_assert!(value > last, "duration went from {} to {}", last, value);
                last = value;
            }
        }
        prop_assert_eq!(last, stats.duration_us);
    }

    /// INVARIANT: a bound-N queue accepts exactly N pushes without a
    /// consumer and refuses the rest, returning each refused item intact.
    #[test]
    fn queue_bound_is_exact(
        extra in 1usize..30,
    ) {
        let (sink, _view) = MemorySink::new();
        let mut engine = RecordingEngine::new(EncoderSettings::default(), sink);
        let format = VideoFormat::new(4, 4, 30.0);
        let source = VideoFrameSource::new(format);

        engine
            .initialize(
                vec![StreamInput::video(source.clone(), PassthroughVideoCodec::new())],
                INIT_TIMEOUT,
            )
            .unwrap();

        // Workers only start at start(); nothing consumes the queue here.
        let bound = 10;
        let mut accepted = 0;
        let mut refused = 0;
        for n in 0..(bound + extra) {
            let frame = avrec::VideoFrame::new(
                vec![0; format.rgb_frame_len()],
                format,
                n as i64,
            );
            match source.push_frame(frame) {
                Ok(()) => accepted += 1,
                Err(err) => {
                    prop_assert_eq!(err.into_item().pts, n as i64);
                    refused += 1;
                }
            }
        }
        prop_assert_eq!(accepted, bound);
        prop_assert_eq!(refused, extra);

        engine.finalize().wait();
    }
}

proptest! {
    /// INVARIANT: settings builders preserve every value they set.
    #[test]
    fn settings_preserve_values(
        video_bitrate in 100_000u32..50_000_000,
        audio_bitrate in 16_000u32..512_000,
        fast_start in prop::bool::ANY,
    ) {
        let settings = EncoderSettings::from_quality(RecordingQuality::Medium)
            .with_video_bitrate(video_bitrate)
            .with_audio_bitrate(audio_bitrate)
            .with_fast_start(fast_start);

        prop_assert_eq!(settings.video_bitrate, video_bitrate);
        prop_assert_eq!(settings.audio_bitrate, audio_bitrate);
        prop_assert_eq!(settings.fast_start, fast_start);
        prop_assert_eq!(settings.quality, RecordingQuality::Custom);
    }

    /// INVARIANT: formats validate exactly when every field is usable.
    #[test]
    fn format_validity(
        sample_rate in 0u32..200_000,
        channels in 0u16..16,
    ) {
        let format = AudioFormat::new(sample_rate, channels);
        prop_assert_eq!(format.is_valid(), sample_rate > 0 && channels > 0);
    }
}
