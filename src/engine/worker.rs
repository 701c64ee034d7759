//! Encoder worker threads
//!
//! Each stream runs one worker thread that pulls items from its bounded
//! queue, drives the codec, and hands packets to the muxer. The loop blocks
//! only while waiting for items or commands; it never blocks on the muxer.
//!
//! Lifecycle per worker: `init` (open codec) → process loop → drain →
//! `cleanup` (flush codec). A paused worker keeps consuming its queue but
//! skips encoding until resumed. Stop is signalled by the finalizer; the
//! worker drains whatever is still queued before flushing, and the engine's
//! calling thread is never blocked.

use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Select, Sender};

use super::queue::ItemQueue;
use crate::errors::RecordingError;
use crate::events::EventSink;

/// Control messages delivered to a worker out of band of its item queue.
pub(crate) enum WorkerCommand {
    Pause(bool),
    RequestKeyframe,
    Stop,
}

/// Per-stream encoding logic driven by the worker run loop.
pub(crate) trait StreamEncoder: Send {
    type Item: Send;

    /// Open the codec. Runs once, on the worker thread, before the loop.
    fn init(&mut self) -> Result<(), RecordingError>;

    /// Encode one item and forward the resulting packets.
    fn process_one(&mut self, item: Self::Item) -> Result<(), RecordingError>;

    /// Flush the codec and forward whatever it still buffered.
    fn cleanup(&mut self) -> Result<(), RecordingError>;

    /// Called when the worker transitions into the paused state.
    fn on_paused(&mut self) {}

    /// Ask the codec for a keyframe on the next encoded item.
    fn request_keyframe(&mut self) {}
}

/// Engine-side handle to a running worker thread.
pub(crate) struct WorkerHandle {
    commands: Sender<WorkerCommand>,
    join: Option<JoinHandle<()>>,
    is_video: bool,
}

impl WorkerHandle {
    pub fn set_paused(&self, paused: bool) {
        let _ = self.commands.send(WorkerCommand::Pause(paused));
    }

    pub fn request_keyframe(&self) {
        let _ = self.commands.send(WorkerCommand::RequestKeyframe);
    }

    /// Signal the run loop to drain, flush, and exit. Does not block.
    pub fn stop(&self) {
        let _ = self.commands.send(WorkerCommand::Stop);
    }

    /// Wait for the worker thread to finish. Called by the finalizer only.
    pub fn join(&mut self) {
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("encoder worker thread panicked");
            }
        }
    }

    pub fn is_video(&self) -> bool {
        self.is_video
    }
}

/// Spawn the run loop for one stream.
///
/// `first` is the item captured by the initializer while resolving the
/// source format; it precedes everything already sitting in the queue.
pub(crate) fn spawn_encoder<E: StreamEncoder + 'static>(
    name: String,
    mut encoder: E,
    queue: ItemQueue<E::Item>,
    first: Option<E::Item>,
    events: EventSink,
    is_video: bool,
) -> Result<WorkerHandle, RecordingError> {
    let (cmd_tx, cmd_rx) = crossbeam_channel::unbounded();

    let join = thread::Builder::new()
        .name(name.clone())
        .spawn(move || run_loop(&name, &mut encoder, &queue, first, &cmd_rx, &events))
        .map_err(|e| RecordingError::resource(format!("Failed to spawn worker thread: {}", e)))?;

    Ok(WorkerHandle {
        commands: cmd_tx,
        join: Some(join),
        is_video,
    })
}

fn run_loop<E: StreamEncoder>(
    name: &str,
    encoder: &mut E,
    queue: &ItemQueue<E::Item>,
    first: Option<E::Item>,
    commands: &Receiver<WorkerCommand>,
    events: &EventSink,
) {
    if let Err(err) = encoder.init() {
        log::error!("{name}: codec init failed: {err}");
        events.session_error(&err);
        return;
    }
    log::debug!("{name}: worker started");

    let mut paused = false;
    // After a failed encode the worker keeps draining its queue so the
    // producer is not wedged, but nothing further reaches the muxer.
    let mut failed = false;

    if let Some(item) = first {
        if let Err(err) = encoder.process_one(item) {
            events.session_error(&err);
            failed = true;
        }
    }

    let items = queue.receiver().clone();
    let mut sel = Select::new();
    let command_ready = sel.recv(commands);
    let item_ready = sel.recv(&items);

    loop {
        let op = sel.select();
        if op.index() == command_ready {
            match op.recv(commands) {
                Ok(WorkerCommand::Pause(p)) => {
                    if p && !paused {
                        encoder.on_paused();
                    }
                    paused = p;
                }
                Ok(WorkerCommand::RequestKeyframe) => encoder.request_keyframe(),
                Ok(WorkerCommand::Stop) | Err(_) => break,
            }
        } else {
            debug_assert_eq!(op.index(), item_ready);
            match op.recv(&items) {
                Ok(item) => {
                    if paused || failed {
                        continue;
                    }
                    if let Err(err) = encoder.process_one(item) {
                        events.session_error(&err);
                        failed = true;
                    }
                }
                // All producers gone; nothing more will arrive.
                Err(_) => break,
            }
        }
    }

    // Drain what was queued before the stop signal, then flush the codec.
    while let Ok(item) = items.try_recv() {
        if paused || failed {
            continue;
        }
        if let Err(err) = encoder.process_one(item) {
            events.session_error(&err);
            failed = true;
        }
    }

    match encoder.cleanup() {
        Ok(()) => log::debug!("{name}: worker finished"),
        Err(err) => {
            if failed {
                log::debug!("{name}: codec flush after failure: {err}");
            } else {
                events.session_error(&err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use crate::events::EngineEvent;

    struct CountingEncoder {
        processed: Arc<AtomicUsize>,
        flushed: Arc<AtomicUsize>,
        fail_init: bool,
    }

    impl StreamEncoder for CountingEncoder {
        type Item = u32;

        fn init(&mut self) -> Result<(), RecordingError> {
            if self.fail_init {
                return Err(RecordingError::format("codec refused to open"));
            }
            Ok(())
        }

        fn process_one(&mut self, _item: u32) -> Result<(), RecordingError> {
            self.processed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn cleanup(&mut self) -> Result<(), RecordingError> {
            self.flushed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn counting(fail_init: bool) -> (CountingEncoder, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let processed = Arc::new(AtomicUsize::new(0));
        let flushed = Arc::new(AtomicUsize::new(0));
        (
            CountingEncoder {
                processed: processed.clone(),
                flushed: flushed.clone(),
                fail_init,
            },
            processed,
            flushed,
        )
    }

    #[test]
    fn test_worker_processes_queue_then_flushes() {
        let (encoder, processed, flushed) = counting(false);
        let queue = ItemQueue::bounded(16);
        let tx = queue.producer();
        let (events, _rx) = EventSink::channel();

        let mut handle = spawn_encoder("enc-test".into(), encoder, queue, Some(0), events, false)
            .expect("worker spawns");

        for i in 1..5 {
            tx.send(i).unwrap();
        }
        std::thread::sleep(Duration::from_millis(50));
        handle.stop();
        handle.join();

        assert_eq!(processed.load(Ordering::SeqCst), 5);
        assert_eq!(flushed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_worker_drains_after_stop() {
        let (encoder, processed, _) = counting(false);
        let queue = ItemQueue::bounded(16);
        let tx = queue.producer();
        // Queue items before the worker even starts, then stop immediately:
        // everything must still be encoded before the flush.
        for i in 0..8 {
            tx.send(i).unwrap();
        }
        let (events, _rx) = EventSink::channel();
        let mut handle = spawn_encoder("enc-drain".into(), encoder, queue, None, events, false)
            .expect("worker spawns");
        handle.stop();
        handle.join();

        assert_eq!(processed.load(Ordering::SeqCst), 8);
    }

    #[test]
    fn test_paused_worker_skips_items() {
        let (encoder, processed, _) = counting(false);
        let queue = ItemQueue::bounded(16);
        let tx = queue.producer();
        let (events, _rx) = EventSink::channel();
        let mut handle = spawn_encoder("enc-pause".into(), encoder, queue, None, events, false)
            .expect("worker spawns");

        handle.set_paused(true);
        std::thread::sleep(Duration::from_millis(20));
        for i in 0..4 {
            tx.send(i).unwrap();
        }
        std::thread::sleep(Duration::from_millis(50));
        handle.stop();
        handle.join();

        assert_eq!(processed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_init_failure_reports_session_error() {
        let (encoder, processed, flushed) = counting(true);
        let queue = ItemQueue::bounded(4);
        let (events, events_rx) = EventSink::channel();
        let mut handle = spawn_encoder("enc-fail".into(), encoder, queue, None, events, false)
            .expect("worker spawns");
        handle.join();

        assert_eq!(processed.load(Ordering::SeqCst), 0);
        assert_eq!(flushed.load(Ordering::SeqCst), 0);
        assert!(matches!(
            events_rx.recv().unwrap(),
            EngineEvent::SessionError { .. }
        ));
    }
}
