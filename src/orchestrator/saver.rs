//! Periodic background saver.
//!
//! While the driving process reports `running`, the saver sleeps for one
//! interval and then runs its save action, and repeats. Liveness is checked
//! only when the saver wakes, so a save that has started always completes.
//! Save failures are logged and sent to the owner over a channel; the loop
//! keeps going.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Local};
use crossbeam_channel::{unbounded, Receiver, Sender};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::state::{RunnerStatus, SaverPhase};
use crate::error::RunnerError;

/// Something that can say whether its driving process is still running.
pub trait StatusSource: Send + 'static {
    fn is_running(&self) -> bool;
}

impl StatusSource for watch::Receiver<RunnerStatus> {
    fn is_running(&self) -> bool {
        self.borrow().is_running()
    }
}

/// A failed save attempt, as reported to the saver's owner.
#[derive(Debug, Clone)]
pub struct SaveFailure {
    /// 1-based number of the save attempt that failed
    pub attempt: u64,
    pub message: String,
    pub at: DateTime<Local>,
}

/// Owner side of a running saver.
pub struct PeriodicSaveHandle {
    phase_rx: watch::Receiver<SaverPhase>,
    cancel_tx: watch::Sender<bool>,
    failures: Receiver<SaveFailure>,
    task: JoinHandle<SaverPhase>,
}

impl PeriodicSaveHandle {
    pub fn phase(&self) -> SaverPhase {
        *self.phase_rx.borrow()
    }

    /// Watch phase changes.
    pub fn subscribe(&self) -> watch::Receiver<SaverPhase> {
        self.phase_rx.clone()
    }

    /// Ask the saver to stop. Takes effect while it waits; a save in
    /// progress completes first.
    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// Failures reported since the last call.
    pub fn failures(&self) -> Vec<SaveFailure> {
        self.failures.try_iter().collect()
    }

    /// Wait for the saver to exit and return its final phase.
    pub async fn join(self) -> Result<SaverPhase, RunnerError> {
        self.task
            .await
            .map_err(|e| RunnerError::Join(e.to_string()))
    }
}

impl fmt::Debug for PeriodicSaveHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicSaveHandle")
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

fn advance(phase_tx: &watch::Sender<SaverPhase>, next: SaverPhase) {
    phase_tx.send_if_modified(|phase| {
        if phase.can_transition_to(next) {
            *phase = next;
            true
        } else {
            false
        }
    });
}

/// Spawn a saver bound to `status` on the current tokio runtime.
pub fn start_periodic_saver<S, F, Fut, E>(
    status: S,
    interval: Duration,
    mut save_action: F,
) -> PeriodicSaveHandle
where
    S: StatusSource,
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), E>> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    let (phase_tx, phase_rx) = watch::channel(SaverPhase::Idle);
    let (cancel_tx, mut cancel_rx) = watch::channel(false);
    let (failure_tx, failures): (Sender<SaveFailure>, Receiver<SaveFailure>) = unbounded();

    let task = tokio::spawn(async move {
        let mut cancel_open = true;
        let mut attempt: u64 = 0;

        let final_phase = loop {
            if *cancel_rx.borrow() {
                break SaverPhase::Cancelled;
            }
            if !status.is_running() {
                break SaverPhase::Stopped;
            }
            advance(&phase_tx, SaverPhase::Running);

            let deadline = tokio::time::Instant::now() + interval;
            let cancelled = loop {
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => break false,
                    changed = cancel_rx.changed(), if cancel_open => match changed {
                        Ok(()) if *cancel_rx.borrow() => break true,
                        Ok(()) => {}
                        // Owner dropped the handle; keep saving until the process stops
                        Err(_) => cancel_open = false,
                    },
                }
            };
            if cancelled {
                break SaverPhase::Cancelled;
            }

            attempt += 1;
            log::debug!("[Saver] Periodic save #{}", attempt);
            if let Err(e) = save_action().await {
                log::error!("[Saver] Periodic save #{} failed: {}", attempt, e);
                let _ = failure_tx.send(SaveFailure {
                    attempt,
                    message: e.to_string(),
                    at: Local::now(),
                });
            }
        };

        log::info!(
            "[Saver] Exiting after {} save(s): {}",
            attempt,
            final_phase.as_str()
        );
        advance(&phase_tx, final_phase);
        final_phase
    });

    PeriodicSaveHandle {
        phase_rx,
        cancel_tx,
        failures,
        task,
    }
}
