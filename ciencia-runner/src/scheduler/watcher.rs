//! Run watcher
//!
//! One watcher task exists per live engine process. It owns the process
//! handle, streams stdout/stderr into a log buffer, flushes the buffer into
//! the run record on an interval and commits exactly one terminal transition
//! when the process exits, is cancelled or outlives its duration limit.

use ciencia_core::domain::run::Run;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::MonitoringError;
use crate::launcher::ProcessHandle;
use crate::service::{ActiveRuns, CancelRequest, LogBuffer, RunEvent, RunTracker};

/// How long output readers may keep draining after the process is gone.
/// Grandchildren of the engine can hold the pipes open past its exit.
const READER_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// Watches a single running process until it reaches a terminal state
pub struct RunWatcher {
    run_id: Uuid,
    handle: ProcessHandle,
    tracker: Arc<RunTracker>,
    cancel_rx: mpsc::Receiver<CancelRequest>,
    active: ActiveRuns,
    flush_interval: Duration,
    max_duration: Option<Duration>,
}

impl RunWatcher {
    pub(crate) fn new(
        run_id: Uuid,
        handle: ProcessHandle,
        tracker: Arc<RunTracker>,
        cancel_rx: mpsc::Receiver<CancelRequest>,
        active: ActiveRuns,
        flush_interval: Duration,
        max_duration: Option<Duration>,
    ) -> Self {
        Self {
            run_id,
            handle,
            tracker,
            cancel_rx,
            active,
            flush_interval,
            max_duration,
        }
    }

    /// Starts watching in a background task
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.watch())
    }

    async fn watch(self) {
        let RunWatcher {
            run_id,
            mut handle,
            tracker,
            mut cancel_rx,
            active,
            flush_interval,
            max_duration,
        } = self;

        debug!("Watching run {} (pid {:?})", run_id, handle.process_id());

        let buffer = LogBuffer::new();
        let mut readers = Vec::new();
        if let Some(stdout) = handle.take_stdout() {
            readers.push(spawn_reader(stdout, buffer.clone()));
        }
        if let Some(stderr) = handle.take_stderr() {
            readers.push(spawn_reader(stderr, buffer.clone()));
        }

        let mut child = handle.into_child();
        let deadline = max_duration.map(|limit| Instant::now() + limit);
        let mut ticker = time::interval(flush_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut waiting: Vec<oneshot::Sender<Run>> = Vec::new();

        let event = loop {
            tokio::select! {
                status = child.wait() => {
                    break match status {
                        Ok(status) => RunEvent::Exited { exit_code: status.code() },
                        Err(e) => RunEvent::MonitoringLost {
                            error: MonitoringError::Wait(e).to_string(),
                        },
                    };
                }
                Some(request) = cancel_rx.recv() => {
                    info!("Cancelling run {}: {}", run_id, request.reason);
                    waiting.push(request.ack);
                    break terminate(run_id, &mut child, request.reason).await;
                }
                _ = wait_for_deadline(deadline) => {
                    let limit = max_duration.unwrap_or_default();
                    warn!("Run {} exceeded its maximum duration of {:?}", run_id, limit);
                    let reason = format!("exceeded maximum run duration of {}s", limit.as_secs());
                    break terminate(run_id, &mut child, reason).await;
                }
                _ = ticker.tick() => {
                    flush(&tracker, run_id, &buffer).await;
                }
            }
        };

        drain_readers(run_id, readers).await;
        flush(&tracker, run_id, &buffer).await;

        let committed = match tracker.transition(run_id, event).await {
            Ok(run) => Some(run),
            Err(e) => {
                error!("Failed to record outcome of run {}: {}", run_id, e);
                tracker.get_status(run_id).await.ok()
            }
        };

        active.lock().remove(&run_id);

        while let Ok(request) = cancel_rx.try_recv() {
            waiting.push(request.ack);
        }
        if let Some(run) = committed {
            for ack in waiting {
                let _ = ack.send(run.clone());
            }
        }
    }
}

/// Kills the process and waits for it to be reaped
async fn terminate(run_id: Uuid, child: &mut Child, reason: String) -> RunEvent {
    if let Err(e) = child.start_kill() {
        warn!("Failed to signal process of run {}: {}", run_id, e);
    }

    if let Err(e) = child.wait().await {
        warn!("Failed to reap process of run {}: {}", run_id, e);
    }

    RunEvent::Cancelled { reason }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn flush(tracker: &RunTracker, run_id: Uuid, buffer: &LogBuffer) {
    let chunk = buffer.drain();
    if chunk.is_empty() {
        return;
    }

    if let Err(e) = tracker.append_logs(run_id, &chunk).await {
        warn!("Failed to flush {} bytes of logs for run {}: {}", chunk.len(), run_id, e);
    }
}

fn spawn_reader<R>(stream: R, buffer: LogBuffer) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut line = Vec::new();

        loop {
            line.clear();
            match reader.read_until(b'\n', &mut line).await {
                Ok(0) => break,
                Ok(_) => buffer.push_line(&String::from_utf8_lossy(&line)),
                Err(e) => {
                    debug!("Output stream closed with error: {}", e);
                    break;
                }
            }
        }
    })
}

async fn drain_readers(run_id: Uuid, readers: Vec<JoinHandle<()>>) {
    let deadline = Instant::now() + READER_DRAIN_TIMEOUT;

    for mut reader in readers {
        if time::timeout_at(deadline, &mut reader).await.is_err() {
            debug!("Output of run {} still open after exit, detaching reader", run_id);
            reader.abort();
        }
    }
}
