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

//! External collaborator seams.
//!
//! The engine never performs searches or sends alerts itself; both are
//! injected behind the traits in this module. The search provider is the
//! executor callback of the system: an opaque async operation whose result
//! the engine serializes and persists without inspection.

use async_trait::async_trait;

use crate::error::ProviderError;
use crate::models::{TaskExecution, TaskSchedule, TaskType};

/// The injected search operation a firing invokes.
///
/// Which method runs is decided by the schedule's [`TaskType`];
/// `search_ref` is the schedule's opaque payload reference (e.g. a
/// saved-search id). Provider errors are wrapped by the runner without
/// inspecting their internals.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Executes a saved simple search and returns its opaque result.
    async fn simple_search(&self, search_ref: &str) -> Result<serde_json::Value, ProviderError>;

    /// Executes a saved advanced search and returns its opaque result.
    async fn advanced_search(&self, search_ref: &str)
        -> Result<serde_json::Value, ProviderError>;

    /// Dispatches to the operation selected by the schedule's task type.
    async fn run(
        &self,
        task_type: TaskType,
        search_ref: &str,
    ) -> Result<serde_json::Value, ProviderError> {
        match task_type {
            TaskType::SimpleSearch => self.simple_search(search_ref).await,
            TaskType::AdvancedSearch => self.advanced_search(search_ref).await,
        }
    }
}

/// Escalation collaborator for permanently failed firings.
///
/// Invoked exactly once per firing that exhausts its retries (or fails on
/// configuration). Delivery is best-effort: implementations report
/// problems through their own channels, and the engine never lets an alert
/// failure affect the execution outcome.
#[async_trait]
pub trait Alerter: Send + Sync {
    /// Notifies the schedule owner that a firing failed permanently.
    async fn permanent_failure(&self, schedule: &TaskSchedule, execution: &TaskExecution);
}

/// An [`Alerter`] that only logs. Useful for embedding the engine without
/// an alerting backend.
#[derive(Debug, Default)]
pub struct LogAlerter;

#[async_trait]
impl Alerter for LogAlerter {
    async fn permanent_failure(&self, schedule: &TaskSchedule, execution: &TaskExecution) {
        tracing::warn!(
            "Permanent failure for task '{}' (owner: {}, execution: {}, attempts: {}): {}",
            schedule.name,
            schedule.owner_identity,
            execution.id,
            execution.attempt,
            execution.error.as_deref().unwrap_or("unknown error")
        );
    }
}
