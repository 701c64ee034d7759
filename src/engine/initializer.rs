//! One-shot stream initialization
//!
//! Codecs cannot be opened with partial format information, but some
//! sources only learn their format once their first item exists. The
//! initializer bridges that gap: it subscribes every source to its future
//! encoder queue, takes declared formats where available, and waits (up to
//! a deadline) for a first item from the rest. A first item taken here is
//! not lost; it is carried along and encoded before anything else in the
//! queue.
//!
//! Streams that fail here fail alone: an invalid or missing format is
//! reported per stream and the remaining streams stay viable.

use std::time::{Duration, Instant};

use crossbeam_channel::Select;

use super::queue::{ItemQueue, AUDIO_QUEUE_BOUND, VIDEO_QUEUE_BOUND};
use super::{SourceRef, StreamInput};
use crate::codec::{AudioCodec, VideoCodec};
use crate::errors::RecordingError;
use crate::events::EventSink;
use crate::source::{AudioBufferSource, VideoFrameSource};
use crate::types::{AudioBuffer, AudioFormat, VideoFormat, VideoFrame};

/// A stream whose format is resolved and whose queue is already fed by its
/// source, waiting for `start()` to attach a worker.
pub(crate) enum PendingStream {
    Audio {
        codec: Box<dyn AudioCodec>,
        format: AudioFormat,
        queue: ItemQueue<AudioBuffer>,
        first: Option<AudioBuffer>,
    },
    Video {
        codec: Box<dyn VideoCodec>,
        format: VideoFormat,
        queue: ItemQueue<VideoFrame>,
        first: Option<VideoFrame>,
    },
}

enum Probe {
    Audio {
        slot: usize,
        source: AudioBufferSource,
        codec: Box<dyn AudioCodec>,
        queue: ItemQueue<AudioBuffer>,
    },
    Video {
        slot: usize,
        source: VideoFrameSource,
        codec: Box<dyn VideoCodec>,
        queue: ItemQueue<VideoFrame>,
    },
}

enum ProbeItem {
    Audio(AudioBuffer),
    Video(VideoFrame),
}

/// Resolve every input into a pending stream, or fail it with a per-stream
/// event. Blocks the caller for at most `timeout`.
pub(crate) fn resolve_streams(
    inputs: Vec<StreamInput>,
    timeout: Duration,
    events: &EventSink,
) -> (Vec<PendingStream>, Vec<SourceRef>) {
    let mut slots: Vec<Option<(PendingStream, SourceRef)>> = Vec::new();
    slots.resize_with(inputs.len(), || None);
    let mut waiting: Vec<Probe> = Vec::new();
    let mut seen_hubs: Vec<usize> = Vec::new();

    for (slot, input) in inputs.into_iter().enumerate() {
        match input {
            StreamInput::Audio { source, codec } => {
                if seen_hubs.contains(&source.hub_id()) {
                    events.stream_init_error(&RecordingError::resource(
                        "Audio source is already bound to an encoder",
                    ));
                    continue;
                }
                seen_hubs.push(source.hub_id());

                let queue = ItemQueue::bounded(AUDIO_QUEUE_BOUND);
                source.subscribe(queue.producer());
                match source.format() {
                    Some(format) if format.is_valid() => {
                        slots[slot] = Some((
                            PendingStream::Audio {
                                codec,
                                format,
                                queue,
                                first: None,
                            },
                            SourceRef::Audio(source),
                        ));
                    }
                    Some(_) => {
                        events.stream_init_error(&RecordingError::format(
                            "Audio source declares an invalid format",
                        ));
                        source.disconnect();
                    }
                    None => waiting.push(Probe::Audio {
                        slot,
                        source,
                        codec,
                        queue,
                    }),
                }
            }
            StreamInput::Video { source, codec } => {
                if seen_hubs.contains(&source.hub_id()) {
                    events.stream_init_error(&RecordingError::resource(
                        "Video source is already bound to an encoder",
                    ));
                    continue;
                }
                seen_hubs.push(source.hub_id());

                let queue = ItemQueue::bounded(VIDEO_QUEUE_BOUND);
                source.subscribe(queue.producer());
                match source.format() {
                    Some(format) if format.is_valid() => {
                        slots[slot] = Some((
                            PendingStream::Video {
                                codec,
                                format,
                                queue,
                                first: None,
                            },
                            SourceRef::Video(source),
                        ));
                    }
                    Some(_) => {
                        events.stream_init_error(&RecordingError::format(
                            "Video source declares an invalid format",
                        ));
                        source.disconnect();
                    }
                    None => waiting.push(Probe::Video {
                        slot,
                        source,
                        codec,
                        queue,
                    }),
                }
            }
        }
    }

    // Wait for a first item from every format-less source.
    let deadline = Instant::now() + timeout;
    while !waiting.is_empty() {
        let received = {
            let mut sel = Select::new();
            for probe in &waiting {
                match probe {
                    Probe::Audio { queue, .. } => sel.recv(queue.receiver()),
                    Probe::Video { queue, .. } => sel.recv(queue.receiver()),
                };
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            match sel.select_timeout(remaining) {
                Ok(op) => {
                    let index = op.index();
                    let item = match &waiting[index] {
                        Probe::Audio { queue, .. } => {
                            op.recv(queue.receiver()).ok().map(ProbeItem::Audio)
                        }
                        Probe::Video { queue, .. } => {
                            op.recv(queue.receiver()).ok().map(ProbeItem::Video)
                        }
                    };
                    Some((index, item))
                }
                Err(_) => None,
            }
        };

        let Some((index, item)) = received else {
            break;
        };
        let probe = waiting.remove(index);

        match (probe, item) {
            (
                Probe::Audio {
                    slot,
                    source,
                    codec,
                    queue,
                },
                Some(ProbeItem::Audio(buffer)),
            ) => {
                let format = buffer.format;
                if format.is_valid() {
                    log::debug!(
                        "audio stream resolved from first buffer: {}Hz/{}ch",
                        format.sample_rate,
                        format.channels
                    );
                    slots[slot] = Some((
                        PendingStream::Audio {
                            codec,
                            format,
                            queue,
                            first: Some(buffer),
                        },
                        SourceRef::Audio(source),
                    ));
                } else {
                    events.stream_init_error(&RecordingError::format(
                        "Audio source produced an invalid format",
                    ));
                    source.disconnect();
                }
            }
            (
                Probe::Video {
                    slot,
                    source,
                    codec,
                    queue,
                },
                Some(ProbeItem::Video(frame)),
            ) => {
                let format = frame.format;
                if format.is_valid() {
                    log::debug!(
                        "video stream resolved from first frame: {}x{} @ {}fps",
                        format.width,
                        format.height,
                        format.frame_rate
                    );
                    slots[slot] = Some((
                        PendingStream::Video {
                            codec,
                            format,
                            queue,
                            first: Some(frame),
                        },
                        SourceRef::Video(source),
                    ));
                } else {
                    events.stream_init_error(&RecordingError::format(
                        "Video source produced an invalid format",
                    ));
                    source.disconnect();
                }
            }
            (probe, _) => {
                let source = match probe {
                    Probe::Audio { source, .. } => SourceRef::Audio(source),
                    Probe::Video { source, .. } => SourceRef::Video(source),
                };
                source.disconnect();
                events.stream_init_error(&RecordingError::resource(
                    "Source stopped producing during initialization",
                ));
            }
        }
    }

    // Whatever is still waiting missed the deadline.
    for probe in waiting {
        let source = match probe {
            Probe::Audio { source, .. } => SourceRef::Audio(source),
            Probe::Video { source, .. } => SourceRef::Video(source),
        };
        source.disconnect();
        events.stream_init_error(&RecordingError::resource(
            "Source produced no data before the initialization deadline",
        ));
    }

    let mut pending = Vec::new();
    let mut sources = Vec::new();
    for entry in slots.into_iter().flatten() {
        pending.push(entry.0);
        sources.push(entry.1);
    }
    (pending, sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EngineEvent;
    use crate::testing::{PassthroughAudioCodec, PassthroughVideoCodec};

    #[test]
    fn test_declared_formats_resolve_immediately() {
        let audio = AudioBufferSource::new(AudioFormat::new(48000, 2));
        let (events, events_rx) = EventSink::channel();

        let (pending, sources) = resolve_streams(
            vec![StreamInput::audio(
                audio.clone(),
                PassthroughAudioCodec::new(),
            )],
            Duration::from_millis(0),
            &events,
        );

        assert_eq!(pending.len(), 1);
        assert_eq!(sources.len(), 1);
        assert!(events_rx.try_recv().is_err());
        // The source is live: items flow into the stream queue already.
        assert!(audio
            .push_buffer(AudioBuffer::new(
                vec![0.0; 4],
                AudioFormat::new(48000, 2),
                0
            ))
            .is_ok());
    }

    #[test]
    fn test_first_frame_resolves_format() {
        let video = VideoFrameSource::from_first_frame();
        let (events, _events_rx) = EventSink::channel();

        let pusher = video.clone();
        let producer = std::thread::spawn(move || {
            let format = VideoFormat::new(8, 8, 30.0);
            loop {
                let frame = VideoFrame::new(vec![0; format.rgb_frame_len()], format, 0);
                match pusher.push_frame(frame) {
                    Ok(()) => break,
                    Err(_) => std::thread::sleep(Duration::from_millis(1)),
                }
            }
        });

        let (pending, _sources) = resolve_streams(
            vec![StreamInput::video(video, PassthroughVideoCodec::new())],
            Duration::from_secs(2),
            &events,
        );
        producer.join().unwrap();

        assert_eq!(pending.len(), 1);
        match &pending[0] {
            PendingStream::Video { format, first, .. } => {
                assert_eq!(format.width, 8);
                assert!(first.is_some(), "first frame must be carried along");
            }
            _ => panic!("expected video stream"),
        }
    }

    #[test]
    fn test_silent_source_fails_its_stream_only() {
        let silent = AudioBufferSource::from_first_buffer();
        let live = AudioBufferSource::new(AudioFormat::new(48000, 2));
        let (events, events_rx) = EventSink::channel();

        let (pending, _sources) = resolve_streams(
            vec![
                StreamInput::audio(silent, PassthroughAudioCodec::new()),
                StreamInput::audio(live, PassthroughAudioCodec::new()),
            ],
            Duration::from_millis(20),
            &events,
        );

        assert_eq!(pending.len(), 1, "the live stream must survive");
        assert!(matches!(
            events_rx.try_recv().unwrap(),
            EngineEvent::StreamInitializationError { .. }
        ));
    }

    #[test]
    fn test_duplicate_source_is_rejected() {
        let source = AudioBufferSource::new(AudioFormat::new(48000, 2));
        let (events, events_rx) = EventSink::channel();

        let (pending, _sources) = resolve_streams(
            vec![
                StreamInput::audio(source.clone(), PassthroughAudioCodec::new()),
                StreamInput::audio(source, PassthroughAudioCodec::new()),
            ],
            Duration::from_millis(0),
            &events,
        );

        assert_eq!(pending.len(), 1);
        assert!(matches!(
            events_rx.try_recv().unwrap(),
            EngineEvent::StreamInitializationError { .. }
        ));
    }
}
