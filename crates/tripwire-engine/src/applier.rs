//! Applying a plan
//!
//! Creates run first, one put per alarm, then deletes in batches of at most
//! [`MAX_DELETE_BATCH`] names. Every call goes through the [`Pacer`].
//! Throttled calls are retried per [`RetryPolicy`]; any other failure is
//! recorded against the affected names and the loop moves on.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};
use tripwire_types::AlarmSpec;

use crate::cloud::{AlarmApi, MAX_DELETE_BATCH};
use crate::error::{CloudError, CloudResult, EngineError, Result};
use crate::pacer::Pacer;
use crate::retry::RetryPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplyAction {
    Create,
    Delete,
}

impl std::fmt::Display for ApplyAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApplyAction::Create => write!(f, "create"),
            ApplyAction::Delete => write!(f, "delete"),
        }
    }
}

/// One alarm that could not be created or deleted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyFailure {
    pub name: String,
    pub action: ApplyAction,
    pub cause: CloudError,
    /// Calls made for this item (or its batch) before giving up
    pub attempts: u32,
}

/// What an apply run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplyReport {
    pub created: Vec<String>,
    pub deleted: Vec<String>,
    pub failures: Vec<ApplyFailure>,
    /// Calls made, retries included
    pub api_calls: u32,
}

impl ApplyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct Attempted<T> {
    outcome: CloudResult<T>,
    attempts: u32,
    /// Retrying was cut short by the deadline
    out_of_time: bool,
}

/// Executes create and delete lists against the alarm API
pub struct Applier {
    alarms: Arc<dyn AlarmApi>,
    pacer: Pacer,
    retry: RetryPolicy,
    deadline: Option<Instant>,
}

impl Applier {
    pub fn new(alarms: Arc<dyn AlarmApi>, pacer: Pacer) -> Self {
        Self {
            alarms,
            pacer,
            retry: RetryPolicy::default(),
            deadline: None,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Stop before starting any call once `deadline` has passed
    pub fn with_deadline(mut self, deadline: Option<Instant>) -> Self {
        self.deadline = deadline;
        self
    }

    fn past_deadline(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Apply `to_create` then `to_delete`
    ///
    /// Item failures land in the report. Only a passed deadline returns an
    /// error, carrying the report built so far. A throttled item whose next
    /// retry would start after the deadline is recorded as failed first.
    pub async fn apply(&mut self, to_create: &[AlarmSpec], to_delete: &[String]) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();
        let alarms = Arc::clone(&self.alarms);

        for spec in to_create {
            self.pacer.wait().await;
            if self.past_deadline() {
                return Err(deadline_with(report));
            }

            let attempted = self
                .call_with_retry(&spec.name, || alarms.put_metric_alarm(spec))
                .await;
            report.api_calls += attempted.attempts;

            match attempted.outcome {
                Ok(()) => {
                    debug!(alarm = %spec.name, attempts = attempted.attempts, "Created alarm");
                    report.created.push(spec.name.clone());
                }
                Err(cause) => {
                    warn!(alarm = %spec.name, error = %cause, "Failed to create alarm");
                    report.failures.push(ApplyFailure {
                        name: spec.name.clone(),
                        action: ApplyAction::Create,
                        cause,
                        attempts: attempted.attempts,
                    });
                }
            }

            if attempted.out_of_time {
                return Err(deadline_with(report));
            }
        }

        for batch in to_delete.chunks(MAX_DELETE_BATCH) {
            self.pacer.wait().await;
            if self.past_deadline() {
                return Err(deadline_with(report));
            }

            let label = batch.first().map(String::as_str).unwrap_or_default();
            let attempted = self
                .call_with_retry(label, || alarms.delete_alarms(batch))
                .await;
            report.api_calls += attempted.attempts;

            match attempted.outcome {
                Ok(item_errors) => {
                    let failed: BTreeMap<String, CloudError> = item_errors
                        .into_iter()
                        .map(|e| (e.name, e.error))
                        .collect();

                    for name in batch {
                        match failed.get(name) {
                            Some(cause) => {
                                warn!(alarm = %name, error = %cause, "Failed to delete alarm");
                                report.failures.push(ApplyFailure {
                                    name: name.clone(),
                                    action: ApplyAction::Delete,
                                    cause: cause.clone(),
                                    attempts: attempted.attempts,
                                });
                            }
                            None => {
                                debug!(alarm = %name, "Deleted alarm");
                                report.deleted.push(name.clone());
                            }
                        }
                    }
                }
                Err(cause) => {
                    warn!(batch_size = batch.len(), error = %cause, "Delete batch failed");
                    report
                        .failures
                        .extend(batch.iter().map(|name| ApplyFailure {
                            name: name.clone(),
                            action: ApplyAction::Delete,
                            cause: cause.clone(),
                            attempts: attempted.attempts,
                        }));
                }
            }

            if attempted.out_of_time {
                return Err(deadline_with(report));
            }
        }

        info!(
            created = report.created.len(),
            deleted = report.deleted.len(),
            failed = report.failures.len(),
            api_calls = report.api_calls,
            "Apply finished"
        );
        Ok(report)
    }

    /// Run `call` through the pacer, retrying throttled attempts
    async fn call_with_retry<T, F, Fut>(&mut self, label: &str, mut call: F) -> Attempted<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = CloudResult<T>>,
    {
        let mut attempts = 0;
        loop {
            attempts += 1;
            let outcome = self.pacer.call(call()).await;

            match outcome {
                Err(e) if e.is_throttling() && self.retry.allows_retry_after(attempts) => {
                    let delay = self.retry.backoff(attempts);
                    if self.deadline.is_some_and(|d| Instant::now() + delay >= d) {
                        warn!(
                            target_name = %label,
                            attempt = attempts,
                            "Throttled with no time left before the deadline"
                        );
                        return Attempted {
                            outcome: Err(e),
                            attempts,
                            out_of_time: true,
                        };
                    }

                    warn!(
                        target_name = %label,
                        attempt = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Throttled; backing off"
                    );
                    sleep(delay).await;

                    // The retry must not start past the deadline either
                    self.pacer.wait().await;
                    if self.past_deadline() {
                        return Attempted {
                            outcome: Err(e),
                            attempts,
                            out_of_time: true,
                        };
                    }
                }
                outcome => {
                    return Attempted {
                        outcome,
                        attempts,
                        out_of_time: false,
                    }
                }
            }
        }
    }
}

fn deadline_with(report: ApplyReport) -> EngineError {
    EngineError::DeadlineExceeded {
        phase: "apply",
        partial: Some(Box::new(report)),
    }
}
