//! Asynchronous session shutdown
//!
//! Finalization runs on its own transient thread so the engine's caller is
//! never blocked behind codec flushes or container I/O. The caller owns the
//! returned handle; waiting on it transfers the session statistics back
//! once the trailer is written and the container closed.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::muxer::Muxer;
use super::worker::WorkerHandle;
use super::DurationTracker;
use crate::config::SessionStats;
use crate::events::{EngineEvent, EventSink};
use crate::sink::ContainerSink;

/// Handle to an in-flight finalization.
pub struct FinalizeHandle {
    join: Option<JoinHandle<SessionStats>>,
}

impl FinalizeHandle {
    /// Block until the session is fully shut down and return its stats.
    ///
    /// `FinalizationDone` is emitted on the event stream regardless of
    /// whether anyone waits on the handle.
    pub fn wait(mut self) -> SessionStats {
        match self.join.take() {
            Some(join) => join.join().unwrap_or_else(|_| {
                log::error!("finalizer thread panicked");
                SessionStats::default()
            }),
            None => SessionStats::default(),
        }
    }

    /// Whether the shutdown already finished.
    pub fn is_done(&self) -> bool {
        self.join.as_ref().map_or(true, |join| join.is_finished())
    }
}

/// Stop and drain all workers, flush the muxer, close the container, and
/// emit `FinalizationDone`. Sources must already be disconnected so no new
/// items race the stop signals.
pub(crate) fn spawn<S: ContainerSink + 'static>(
    mut workers: Vec<WorkerHandle>,
    muxer: Option<Muxer>,
    unopened_sink: Option<S>,
    duration: Arc<DurationTracker>,
    events: EventSink,
) -> FinalizeHandle {
    let join = thread::spawn(move || {
        log::debug!("finalizing recording session");

        for worker in &workers {
            worker.stop();
        }
        for worker in &mut workers {
            worker.join();
        }
        // Joined workers dropped their packet senders; the muxer loop can
        // now observe end of input, write the trailer, and close.
        drop(workers);

        let mut stats = SessionStats {
            duration_us: duration.recorded(),
            ..SessionStats::default()
        };
        if let Some(muxer) = muxer {
            let mux_stats = muxer.join();
            stats.packets_per_stream = mux_stats.packets_per_stream;
            stats.bytes_written = mux_stats.bytes_written;
        }

        // A session that never wrote its header has no trailer to write;
        // the container I/O is still released.
        if let Some(mut sink) = unopened_sink {
            sink.close();
        }

        log::debug!("done finalizing");
        events.emit(EngineEvent::FinalizationDone);
        stats
    });

    FinalizeHandle { join: Some(join) }
}
