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

//! Error types for the scheduling engine.
//!
//! The taxonomy follows the failure classes of the engine:
//! - [`SchedulerError`] - errors surfaced through the control surface
//!   (create/pause/resume/update/delete and queries)
//! - [`ExecutionError`] - errors arising inside a single firing
//!   (timeout, provider failure, configuration problems)
//! - [`StoreError`] - errors from the persistence ports
//! - [`ProviderError`] - opaque wrapper around search-provider failures
//!
//! Failures inside a firing never propagate out of the execution runner as
//! unhandled errors; they are converted into persisted execution state,
//! statistics, and broadcasts. Control-surface errors propagate to the
//! caller as typed variants so that "task not found" is distinguishable
//! from "task exists but is currently inactive".

use thiserror::Error;
use uuid::Uuid;

/// Errors from the persistence ports ([`crate::stores`]).
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested record does not exist (or has been soft-deleted).
    #[error("record not found: {0}")]
    NotFound(Uuid),

    /// The underlying storage backend failed.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Opaque wrapper around a failure reported by the search provider.
///
/// The engine never inspects provider internals; the original error is
/// carried as a source for diagnostics only.
#[derive(Debug, Error)]
#[error("search provider failed: {message}")]
pub struct ProviderError {
    /// Human-readable description of the provider failure.
    pub message: String,
    /// The underlying provider-specific error, if any.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ProviderError {
    /// Creates a provider error from a message alone.
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Creates a provider error wrapping an underlying cause.
    pub fn with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Errors arising inside a single firing of a scheduled task.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The timeout timer won the race against the provider call.
    #[error("execution timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: i64 },

    /// The provider call itself failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// The schedule is not executable as configured (for example a missing
    /// payload reference). Detected before the provider is invoked and
    /// never retried.
    #[error("invalid schedule configuration: {0}")]
    Configuration(String),
}

impl ExecutionError {
    /// Whether this failure may be retried within the same firing.
    ///
    /// Timeouts and provider failures are transient; configuration errors
    /// fail the firing immediately regardless of the retry budget.
    pub fn is_transient(&self) -> bool {
        !matches!(self, ExecutionError::Configuration(_))
    }
}

/// Errors surfaced through the scheduler's public operation surface.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// No schedule exists with the given id.
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    /// The cron expression could not be parsed. Rejected at schedule
    /// time, never at first tick.
    #[error("invalid cron expression '{expression}': {reason}")]
    InvalidCronExpression { expression: String, reason: String },

    /// The timezone name is not a known IANA timezone.
    #[error("invalid timezone: {0}")]
    InvalidTimezone(String),

    /// The task definition is not executable (for example an empty
    /// payload reference).
    #[error("invalid task configuration: {0}")]
    InvalidConfiguration(String),

    /// An ad hoc trigger was requested while a firing for the same task
    /// is still in flight.
    #[error("a firing for task {0} is already in progress")]
    FiringInProgress(Uuid),

    /// A persistence port failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}
