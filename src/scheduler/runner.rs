/*
 *  Copyright 2025 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Execution Runner
//!
//! The [`ExecutionRunner`] owns the state machine for a single firing:
//! - Persists a `Running` execution row before the provider is invoked,
//!   so history always shows a running row before any terminal state
//! - Races the provider call against the schedule's timeout
//! - Classifies the outcome and drives retries with exponential backoff,
//!   advancing `attempt` in place on the same execution row
//! - Records statistics, broadcasts every state transition, and alerts
//!   the owning collaborator on permanent failure
//!
//! One driving loop per firing replaces ad hoc recursive timer callbacks:
//! retry waits are plain awaited sleeps inside the loop, which keeps retry
//! exhaustion and cancellation straightforward to reason about.
//!
//! Failures never escape a firing: every error is converted into
//! persisted state, statistics, and a broadcast. The only errors this
//! module returns are persistence-port failures.
//!
//! Timeout semantics: when the timer wins the race the provider future is
//! dropped, which cancels it at its next await point. Work the provider
//! has moved off the cooperative runtime (e.g. onto a blocking thread)
//! cannot be interrupted and runs on unobserved.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::broadcast::{MetricsEvent, NotificationBroadcaster, TaskStatusEvent};
use crate::error::{ExecutionError, StoreError};
use crate::models::{
    ExecutionState, NewTaskExecution, TaskExecution, TaskExecutionPatch, TaskSchedule,
};
use crate::provider::{Alerter, SearchProvider};
use crate::retry::RetryPolicy;
use crate::stats::StatsAggregator;
use crate::stores::ExecutionStore;

/// Drives single firings of scheduled tasks through their lifecycle.
pub struct ExecutionRunner {
    executions: Arc<dyn ExecutionStore>,
    stats: Arc<StatsAggregator>,
    broadcaster: Arc<NotificationBroadcaster>,
    provider: Arc<dyn SearchProvider>,
    alerter: Arc<dyn Alerter>,
}

impl ExecutionRunner {
    pub fn new(
        executions: Arc<dyn ExecutionStore>,
        stats: Arc<StatsAggregator>,
        broadcaster: Arc<NotificationBroadcaster>,
        provider: Arc<dyn SearchProvider>,
        alerter: Arc<dyn Alerter>,
    ) -> Self {
        Self {
            executions,
            stats,
            broadcaster,
            provider,
            alerter,
        }
    }

    /// Runs one complete firing of `schedule` and returns the terminal
    /// execution row.
    ///
    /// `duration_ms` of the returned row spans the entire firing - the
    /// first attempt's start to the final terminal transition, retry
    /// waits included.
    pub async fn run_firing(
        &self,
        schedule: &TaskSchedule,
    ) -> Result<TaskExecution, StoreError> {
        let started = Utc::now();
        let policy = RetryPolicy::for_max_retries(schedule.max_retries);

        let mut execution = self
            .executions
            .create(NewTaskExecution {
                task_id: schedule.id,
                state: ExecutionState::Running,
                start_time: started,
                attempt: 1,
            })
            .await?;
        self.broadcast(&execution, None, None);
        info!(
            "Execution {} started for task '{}' (attempt 1)",
            execution.id, schedule.name
        );

        // Configuration problems fail the firing before the provider is
        // ever invoked, regardless of the retry budget.
        if let Err(config_error) = validate_executable(schedule) {
            return self
                .finalize_failure(schedule, execution, config_error, started)
                .await;
        }

        loop {
            match self.attempt(schedule).await {
                Ok(result) => {
                    return self
                        .finalize_success(schedule, execution, result, started)
                        .await;
                }
                Err(attempt_error) => {
                    if attempt_error.is_transient() && policy.allows_retry(execution.attempt) {
                        let failed_attempt = execution.attempt;
                        let delay = policy.calculate_delay(failed_attempt);
                        warn!(
                            "Attempt {} of task '{}' failed ({}), retrying in {:?}",
                            failed_attempt, schedule.name, attempt_error, delay
                        );

                        // Same row, attempt advanced in place.
                        execution = self
                            .executions
                            .update(
                                execution.id,
                                TaskExecutionPatch {
                                    state: Some(ExecutionState::Pending),
                                    attempt: Some(failed_attempt + 1),
                                    error: Some(attempt_error.to_string()),
                                    ..Default::default()
                                },
                            )
                            .await?;
                        self.broadcast(&execution, None, Some(attempt_error.to_string()));

                        tokio::time::sleep(delay).await;

                        execution = self
                            .executions
                            .update(
                                execution.id,
                                TaskExecutionPatch {
                                    state: Some(ExecutionState::Running),
                                    ..Default::default()
                                },
                            )
                            .await?;
                        self.broadcast(&execution, None, None);
                    } else {
                        return self
                            .finalize_failure(schedule, execution, attempt_error, started)
                            .await;
                    }
                }
            }
        }
    }

    /// Runs one attempt: the provider call raced against the timeout.
    async fn attempt(&self, schedule: &TaskSchedule) -> Result<serde_json::Value, ExecutionError> {
        let timeout = Duration::from_millis(schedule.timeout_ms.max(0) as u64);
        match tokio::time::timeout(
            timeout,
            self.provider.run(schedule.task_type, &schedule.payload),
        )
        .await
        {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(provider_error)) => Err(ExecutionError::Provider(provider_error)),
            Err(_) => Err(ExecutionError::Timeout {
                timeout_ms: schedule.timeout_ms,
            }),
        }
    }

    async fn finalize_success(
        &self,
        schedule: &TaskSchedule,
        execution: TaskExecution,
        result: serde_json::Value,
        started: DateTime<Utc>,
    ) -> Result<TaskExecution, StoreError> {
        let ended = Utc::now();
        let duration_ms = (ended - started).num_milliseconds();
        let serialized =
            serde_json::to_string(&result).unwrap_or_else(|_| "null".to_string());

        let execution = self
            .executions
            .update(
                execution.id,
                TaskExecutionPatch {
                    state: Some(ExecutionState::Completed),
                    end_time: Some(ended),
                    duration_ms: Some(duration_ms),
                    result: Some(serialized),
                    ..Default::default()
                },
            )
            .await?;

        self.record_stats(schedule, duration_ms, true, ExecutionState::Completed, None)
            .await;
        self.broadcast(&execution, Some(result), None);
        info!(
            "Execution {} completed for task '{}' in {} ms (attempt {})",
            execution.id, schedule.name, duration_ms, execution.attempt
        );
        Ok(execution)
    }

    async fn finalize_failure(
        &self,
        schedule: &TaskSchedule,
        execution: TaskExecution,
        cause: ExecutionError,
        started: DateTime<Utc>,
    ) -> Result<TaskExecution, StoreError> {
        let ended = Utc::now();
        let duration_ms = (ended - started).num_milliseconds();
        let final_state = match cause {
            ExecutionError::Timeout { .. } => ExecutionState::Timeout,
            _ => ExecutionState::Failed,
        };

        let execution = self
            .executions
            .update(
                execution.id,
                TaskExecutionPatch {
                    state: Some(final_state),
                    end_time: Some(ended),
                    duration_ms: Some(duration_ms),
                    error: Some(cause.to_string()),
                    ..Default::default()
                },
            )
            .await?;

        self.record_stats(
            schedule,
            duration_ms,
            false,
            final_state,
            Some(cause.to_string()),
        )
        .await;
        self.broadcast(&execution, None, Some(cause.to_string()));
        error!(
            "Execution {} failed permanently for task '{}' after {} attempt(s): {}",
            execution.id, schedule.name, execution.attempt, cause
        );

        self.alerter.permanent_failure(schedule, &execution).await;
        Ok(execution)
    }

    async fn record_stats(
        &self,
        schedule: &TaskSchedule,
        duration_ms: i64,
        success: bool,
        state: ExecutionState,
        error: Option<String>,
    ) {
        match self
            .stats
            .record_outcome(schedule.id, duration_ms, success, state, error)
            .await
        {
            Ok(metrics) => self.broadcaster.publish_global(MetricsEvent {
                task_id: schedule.id,
                metrics,
            }),
            Err(e) => warn!("Failed to record stats for task {}: {}", schedule.id, e),
        }
    }

    fn broadcast(
        &self,
        execution: &TaskExecution,
        result: Option<serde_json::Value>,
        error: Option<String>,
    ) {
        self.broadcaster.publish(TaskStatusEvent {
            task_id: execution.task_id,
            state: execution.state,
            execution_id: Some(execution.id),
            result,
            error,
        });
    }
}

/// Checks that a schedule is executable before its provider call.
fn validate_executable(schedule: &TaskSchedule) -> Result<(), ExecutionError> {
    if schedule.payload.trim().is_empty() {
        return Err(ExecutionError::Configuration(format!(
            "task '{}' has no payload reference",
            schedule.name
        )));
    }
    Ok(())
}
