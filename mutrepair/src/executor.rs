// SPDX-License-Identifier: Apache-2.0

//! Deadline-bounded execution of one untrusted task on a worker thread.
//!
//! Cancellation is cooperative. When the deadline passes the task's
//! [`CancelToken`] is set and the caller gets [`ExecutionOutcome::Timeout`]
//! right away; a task that never polls its token keeps its thread busy
//! until it finishes on its own. The worker is detached, never joined, in
//! that case.

use std::any::Any;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(300);
pub const DEFAULT_GRACE: Duration = Duration::from_millis(500);

/// Classification of one execution of candidate code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    Valid,
    /// A pre- or postcondition check failed.
    SpecViolation(String),
    RuntimeFault(String),
    Timeout(Duration),
    /// The call could not be set up: missing class or routine, bad inputs,
    /// static state that could not be assigned.
    InitError(String),
    /// The routine raised an exception its specification does not allow.
    MethodException(String),
}

impl ExecutionOutcome {
    /// Whether this outcome shows the candidate is wrong on the input.
    pub fn falsifies(&self) -> bool {
        matches!(
            self,
            ExecutionOutcome::SpecViolation(_) | ExecutionOutcome::MethodException(_)
        )
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionOutcome::Valid => write!(f, "valid"),
            ExecutionOutcome::SpecViolation(msg) => write!(f, "specification violation: {}", msg),
            ExecutionOutcome::RuntimeFault(msg) => write!(f, "runtime fault: {}", msg),
            ExecutionOutcome::Timeout(after) => write!(f, "timed out after {:?}", after),
            ExecutionOutcome::InitError(msg) => write!(f, "initialization error: {}", msg),
            ExecutionOutcome::MethodException(msg) => write!(f, "method exception: {}", msg),
        }
    }
}

/// Shared flag a running task polls to learn it should stop.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TimeoutExecutor {
    deadline: Duration,
    grace: Duration,
}

impl Default for TimeoutExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_DEADLINE)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic with non-string payload".to_string()
    }
}

impl TimeoutExecutor {
    pub fn new(deadline: Duration) -> Self {
        Self {
            deadline,
            grace: DEFAULT_GRACE,
        }
    }

    /// How long to wait for a cancelled task to acknowledge before
    /// detaching it.
    pub fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Runs `task` on a fresh worker thread and classifies the result.
    ///
    /// Panics inside the task become [`ExecutionOutcome::RuntimeFault`]; a
    /// worker that cannot be started is an [`ExecutionOutcome::InitError`].
    /// Never blocks for longer than the deadline plus the grace period.
    pub fn run<F>(&self, task: F) -> ExecutionOutcome
    where
        F: FnOnce(&CancelToken) -> ExecutionOutcome + Send + 'static,
    {
        let token = CancelToken::new();
        let worker_token = token.clone();
        let (tx, rx) = mpsc::channel::<ExecutionOutcome>();
        let start = Instant::now();

        let spawned = std::thread::Builder::new()
            .name("mutrepair-exec".to_string())
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| task(&worker_token)))
                    .unwrap_or_else(|payload| {
                        ExecutionOutcome::RuntimeFault(format!(
                            "panicked: {}",
                            panic_message(payload.as_ref())
                        ))
                    });
                // The receiver is gone once the caller has given up.
                let _ = tx.send(outcome);
            });
        let handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                return ExecutionOutcome::InitError(format!("could not start worker: {}", e));
            }
        };

        match rx.recv_timeout(self.deadline) {
            Ok(outcome) => {
                let _ = handle.join();
                log::trace!(
                    "TimeoutExecutor::run; outcome: {} in {:?}",
                    outcome,
                    start.elapsed()
                );
                outcome
            }
            Err(mpsc::RecvTimeoutError::Timeout) => {
                token.cancel();
                let acknowledged = rx.recv_timeout(self.grace).is_ok();
                let elapsed = start.elapsed();
                if acknowledged {
                    let _ = handle.join();
                } else {
                    log::warn!(
                        "TimeoutExecutor::run; worker did not stop within {:?} of cancellation; detaching",
                        self.grace
                    );
                }
                log::info!("TimeoutExecutor::run; timed out after {:?}", elapsed);
                ExecutionOutcome::Timeout(elapsed)
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                let _ = handle.join();
                ExecutionOutcome::RuntimeFault("worker exited without an outcome".to_string())
            }
        }
    }
}
