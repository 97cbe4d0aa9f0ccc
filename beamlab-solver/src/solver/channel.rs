//! Background solver channel
//!
//! The kernel runs on a dedicated worker thread. Requests go out over a
//! standard channel, and ready/progress/result/error messages come back over
//! an unbounded tokio channel, so callers await results without blocking the
//! runtime.
//!
//! One request is in flight at a time. Concurrent `solve` calls queue on an
//! async mutex and run in arrival order. Dropping the channel asks the worker
//! to shut down; `terminate` also waits for the thread to exit.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread::JoinHandle;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::error::{BeamError, BeamResult};
use crate::solver::kernel::SolverKernel;
use crate::solver::protocol::{
    ProgressEvent, SolveRequest, SolveResult, SolverOutput, TransferBuffer, WorkerCommand,
    WorkerMessage,
};

/// Lifecycle of a background channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelState {
    /// No worker has been spawned yet
    Uninitialized,
    /// Worker spawned, ready signal not yet seen
    AwaitingReady,
    /// Idle and accepting requests
    Ready,
    /// A request is in flight
    Busy,
    /// Worker is gone
    Terminated,
}

struct EventStream {
    rx: UnboundedReceiver<WorkerMessage>,
    ready: bool,
}

/// Handle to a solver worker thread
pub struct BackgroundSolverChannel {
    commands: mpsc::Sender<WorkerCommand>,
    events: tokio::sync::Mutex<EventStream>,
    state: Mutex<ChannelState>,
    next_request: AtomicU64,
    worker: Option<JoinHandle<()>>,
}

impl BackgroundSolverChannel {
    /// Spawn a worker thread running `kernel`
    pub fn spawn(kernel: Arc<dyn SolverKernel>) -> BeamResult<Self> {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = unbounded_channel();

        let worker = std::thread::Builder::new()
            .name("beamlab-solver".to_string())
            .spawn(move || run_worker(kernel, command_rx, event_tx))?;
        debug!("Spawned background solver thread");

        Ok(Self {
            commands: command_tx,
            events: tokio::sync::Mutex::new(EventStream {
                rx: event_rx,
                ready: false,
            }),
            state: Mutex::new(ChannelState::AwaitingReady),
            next_request: AtomicU64::new(1),
            worker: Some(worker),
        })
    }

    /// Current lifecycle state
    pub fn state(&self) -> ChannelState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(ChannelState::Terminated)
    }

    fn set_state(&self, state: ChannelState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    /// Wait until the worker has signalled readiness
    pub async fn wait_ready(&self) -> BeamResult<()> {
        let mut events = self.events.lock().await;
        self.await_ready(&mut events).await
    }

    async fn await_ready(&self, events: &mut EventStream) -> BeamResult<()> {
        while !events.ready {
            match events.rx.recv().await {
                Some(WorkerMessage::Ready) => {
                    events.ready = true;
                    self.set_state(ChannelState::Ready);
                    debug!("Background solver is ready");
                }
                Some(other) => debug!("Discarding {} message before ready", other.kind()),
                None => {
                    self.set_state(ChannelState::Terminated);
                    return Err(BeamError::ChannelTerminated);
                }
            }
        }
        Ok(())
    }

    /// Run one request on the worker
    ///
    /// Progress events for this request are passed to `on_progress` as they
    /// arrive. Calls made before the worker is ready wait for readiness;
    /// calls made while another request is in flight wait for it to finish.
    pub async fn solve<F>(
        &self,
        request: SolveRequest,
        mut on_progress: F,
    ) -> BeamResult<SolverOutput>
    where
        F: FnMut(ProgressEvent) + Send,
    {
        let mut events = self.events.lock().await;
        self.await_ready(&mut events).await?;

        let request_id = self.next_request.fetch_add(1, Ordering::Relaxed);
        if self
            .commands
            .send(WorkerCommand::SolveRequest {
                request_id,
                request,
            })
            .is_err()
        {
            self.set_state(ChannelState::Terminated);
            return Err(BeamError::ChannelTerminated);
        }
        self.set_state(ChannelState::Busy);
        debug!("Dispatched request {request_id}");

        let outcome = loop {
            let Some(message) = events.rx.recv().await else {
                self.set_state(ChannelState::Terminated);
                return Err(BeamError::ChannelTerminated);
            };
            if message.request_id() != Some(request_id) {
                // Left over from a request whose caller went away
                debug!("Discarding stale {} message", message.kind());
                continue;
            }
            match message {
                WorkerMessage::Progress { event, .. } => on_progress(event),
                WorkerMessage::Result { result, .. } => break result.into_output(),
                WorkerMessage::Error { message, stack, .. } => {
                    break Err(BeamError::Worker { message, stack })
                }
                WorkerMessage::Ready => {}
            }
        };

        self.set_state(ChannelState::Ready);
        outcome
    }

    /// Shut the worker down and wait for its thread to exit
    pub fn terminate(mut self) -> BeamResult<()> {
        self.shutdown();
        if let Some(worker) = self.worker.take() {
            worker.join().map_err(|_| BeamError::Worker {
                message: "solver thread panicked".to_string(),
                stack: None,
            })?;
        }
        info!("Background solver terminated");
        Ok(())
    }

    fn shutdown(&self) {
        // A closed command channel means the worker already exited
        let _ = self.commands.send(WorkerCommand::Shutdown);
        self.set_state(ChannelState::Terminated);
    }
}

impl Drop for BackgroundSolverChannel {
    fn drop(&mut self) {
        if self.state() != ChannelState::Terminated {
            self.shutdown();
            debug!("Background solver channel dropped; worker signalled to exit");
        }
    }
}

impl std::fmt::Debug for BackgroundSolverChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundSolverChannel")
            .field("state", &self.state())
            .finish()
    }
}

fn run_worker(
    kernel: Arc<dyn SolverKernel>,
    commands: mpsc::Receiver<WorkerCommand>,
    events: UnboundedSender<WorkerMessage>,
) {
    if events.send(WorkerMessage::Ready).is_err() {
        return;
    }

    while let Ok(command) = commands.recv() {
        let (request_id, request) = match command {
            WorkerCommand::Shutdown => break,
            WorkerCommand::SolveRequest {
                request_id,
                request,
            } => (request_id, request),
        };

        let progress_tx = events.clone();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            kernel.solve(&request, &mut |event| {
                let _ = progress_tx.send(WorkerMessage::Progress { request_id, event });
            })
        }));

        let message = match outcome {
            Ok(Ok(output)) => {
                let mut displacements = TransferBuffer::new(output.displacements);
                let mut reactions = TransferBuffer::new(output.reactions);
                let sent = SolveResult::transfer_from(
                    &mut displacements,
                    &mut reactions,
                    output.metadata,
                    output.timing,
                );
                debug!(
                    "Request {request_id} buffers detached on the worker side: {}",
                    displacements.is_detached() && reactions.is_detached()
                );
                match sent {
                    Ok(result) => WorkerMessage::Result { request_id, result },
                    Err(err) => WorkerMessage::from_error(request_id, &err),
                }
            }
            Ok(Err(err)) => WorkerMessage::from_error(request_id, &err),
            Err(payload) => {
                let message = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "solver panicked".to_string());
                warn!("Solver kernel panicked on request {request_id}: {message}");
                WorkerMessage::Error {
                    request_id,
                    message: format!("solver panicked: {message}"),
                    stack: None,
                }
            }
        };

        if events.send(message).is_err() {
            break;
        }
    }
    debug!("Background solver thread exiting");
}
