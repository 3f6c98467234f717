// Copyright 2026 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-output tile presentation workers.
//!
//! A [`TileWorker`] owns one connected output's slice of each frame. Jobs are
//! queued to a dedicated thread, which selects the layers touching the tile,
//! submits them to the output, and raises the worker's completion signal:
//!
//! ```text
//!            present()                      wait()
//!  caller ──────────────► job queue        ◄──────── caller
//!                            │                ▲
//!                            ▼                │
//!  worker thread:  Idle ─► Presenting ─► Signaled ─► Idle ...
//!                                                    └─► Exited on exit()
//! ```
//!
//! The signal is raised after every job, including jobs whose tile has no
//! visible layers and therefore submits nothing.

use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{Receiver, Sender};
use mosaic_core::callback::UploadCallback;
use mosaic_core::layer::{Layer, TileLayer};
use mosaic_core::output::OutputId;
use mosaic_core::tile::TileWindow;
use parking_lot::Mutex;
use tracing::{debug, error, trace};

use crate::fence::Fence;
use crate::output::PhysicalOutput;
use crate::signal::CompletionSignal;

/// Errors from [`TileWorker`] lifecycle operations.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    /// The completion signal could not be created.
    #[error("failed to create completion signal for {0:?}")]
    Signal(OutputId, #[source] io::Error),
    /// The worker thread could not be started.
    #[error("failed to start tile worker for {0:?}")]
    Spawn(OutputId, #[source] io::Error),
    /// The worker has exited and accepts no more jobs.
    #[error("tile worker for {0:?} has exited")]
    Exited(OutputId),
}

struct Job {
    window: TileWindow,
    layers: Arc<[Layer]>,
    upload: Option<UploadCallback>,
}

#[derive(Default)]
struct TileState {
    layers: Vec<TileLayer>,
    release_fence: Option<Fence>,
}

/// Presentation worker for one connected output.
pub struct TileWorker {
    output_id: OutputId,
    jobs: Mutex<Option<Sender<Job>>>,
    thread: Mutex<Option<JoinHandle<()>>>,
    signal: Arc<CompletionSignal>,
    state: Arc<Mutex<TileState>>,
}

impl fmt::Debug for TileWorker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileWorker")
            .field("output_id", &self.output_id)
            .finish_non_exhaustive()
    }
}

impl TileWorker {
    /// Starts a worker presenting to `output`.
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError`] if the completion signal or the thread cannot
    /// be created.
    pub fn spawn(output: Arc<dyn PhysicalOutput>, output_id: OutputId) -> Result<Self, WorkerError> {
        let signal =
            Arc::new(CompletionSignal::new().map_err(|err| WorkerError::Signal(output_id, err))?);
        let state = Arc::new(Mutex::new(TileState::default()));
        let (sender, receiver) = crossbeam_channel::unbounded();

        let thread = {
            let signal = Arc::clone(&signal);
            let state = Arc::clone(&state);
            thread::Builder::new()
                .name(format!("mosaic-tile-{}", output_id.0))
                .spawn(move || run(output.as_ref(), output_id, &receiver, &signal, &state))
                .map_err(|err| WorkerError::Spawn(output_id, err))?
        };

        debug!(?output_id, "tile worker started");
        Ok(Self {
            output_id,
            jobs: Mutex::new(Some(sender)),
            thread: Mutex::new(Some(thread)),
            signal,
            state,
        })
    }

    /// Returns the output this worker presents to.
    #[must_use]
    pub fn output_id(&self) -> OutputId {
        self.output_id
    }

    /// Queues one frame for this tile.
    ///
    /// Each successful call must be paired with a [`wait`](Self::wait).
    ///
    /// # Errors
    ///
    /// Returns [`WorkerError::Exited`] after [`exit`](Self::exit).
    pub fn present(
        &self,
        window: TileWindow,
        layers: Arc<[Layer]>,
        upload: Option<UploadCallback>,
    ) -> Result<(), WorkerError> {
        let jobs = self.jobs.lock();
        let sender = jobs.as_ref().ok_or(WorkerError::Exited(self.output_id))?;
        sender
            .send(Job {
                window,
                layers,
                upload,
            })
            .map_err(|_| WorkerError::Exited(self.output_id))
    }

    /// Blocks until the most recently queued frame has been handled.
    ///
    /// A failed wait is logged and treated as complete; the tile may show a
    /// stale frame.
    pub fn wait(&self) {
        if let Err(err) = self.signal.wait() {
            error!(output_id = ?self.output_id, %err, "tile completion wait failed");
        }
    }

    /// Stops the worker thread and releases the retained layers and fence.
    ///
    /// Any queued frame is finished first. Calling this more than once is a
    /// no-op.
    pub fn exit(&self) {
        drop(self.jobs.lock().take());
        if let Some(thread) = self.thread.lock().take() {
            if thread.join().is_err() {
                error!(output_id = ?self.output_id, "tile worker panicked");
            }
        }

        let mut state = self.state.lock();
        state.layers.clear();
        state.release_fence = None;
    }

    /// Number of layers retained by the last frame, zero after an empty one.
    #[must_use]
    pub fn retained_layers(&self) -> usize {
        self.state.lock().layers.len()
    }

    /// Returns `true` while a release fence from the output is held.
    #[must_use]
    pub fn holds_release_fence(&self) -> bool {
        self.state.lock().release_fence.is_some()
    }
}

impl Drop for TileWorker {
    fn drop(&mut self) {
        self.exit();
    }
}

fn run(
    output: &dyn PhysicalOutput,
    output_id: OutputId,
    jobs: &Receiver<Job>,
    signal: &CompletionSignal,
    state: &Mutex<TileState>,
) {
    for job in jobs {
        compose(output, output_id, &job, &mut state.lock());
        if let Err(err) = signal.signal() {
            error!(?output_id, %err, "failed to signal tile completion");
        }
    }
    debug!(?output_id, "tile worker exiting");
}

fn compose(output: &dyn PhysicalOutput, output_id: OutputId, job: &Job, state: &mut TileState) {
    let window = &job.window;
    state.layers.clear();
    window.assign(job.layers.iter(), &mut state.layers);
    trace!(
        ?output_id,
        ordinal = window.ordinal,
        source_left = window.source_left,
        source_right = window.source_right,
        device_left = window.device_left,
        device_right = window.device_right,
        layers = state.layers.len(),
        "tile assigned"
    );

    if state.layers.is_empty() {
        return;
    }

    match output.present(&state.layers, job.upload.as_ref()) {
        Ok(fence) => state.release_fence = fence,
        Err(err) => error!(?output_id, %err, "tile present failed"),
    }
}
