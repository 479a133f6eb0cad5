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

//! Task Statistics Model
//!
//! A [`TaskStats`] row is a rolling aggregate over a task's executions for
//! one period window. Counters are updated incrementally on every terminal
//! execution; the average duration is a running mean, never recomputed
//! from full history.
//!
//! Invariant: `total_runs == successful_runs + failed_runs` at all times.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::ExecutionState;

/// Rolling per-task statistics for one period window.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStats {
    /// The task these statistics aggregate over
    pub task_id: Uuid,
    /// Number of terminal executions recorded in this window
    pub total_runs: i64,
    /// Number of successful executions
    pub successful_runs: i64,
    /// Number of permanently failed executions (including timeouts)
    pub failed_runs: i64,
    /// Running mean of firing durations, in milliseconds
    pub average_duration_ms: f64,
    /// Terminal state of the most recently recorded execution
    pub last_execution_state: ExecutionState,
    /// Error message of the most recent failure, if any
    pub last_error: Option<String>,
    /// Start of the aggregation window
    pub period_start: DateTime<Utc>,
    /// End of the aggregation window
    pub period_end: DateTime<Utc>,
    /// When the row was created
    pub created_at: DateTime<Utc>,
    /// When the row was last updated
    pub updated_at: DateTime<Utc>,
}

impl TaskStats {
    /// Folds one terminal outcome into the counters.
    ///
    /// The mean is advanced incrementally:
    /// `new_avg = (old_avg * n + duration) / (n + 1)` where `n` is the
    /// run count before this outcome.
    pub fn record(
        &mut self,
        duration_ms: i64,
        success: bool,
        state: ExecutionState,
        error: Option<String>,
    ) {
        let n = self.total_runs as f64;
        self.average_duration_ms = (self.average_duration_ms * n + duration_ms as f64) / (n + 1.0);
        self.total_runs += 1;
        if success {
            self.successful_runs += 1;
        } else {
            self.failed_runs += 1;
        }
        self.last_execution_state = state;
        if let Some(error) = error {
            self.last_error = Some(error);
        }
    }
}

/// A fresh, zeroed statistics row for a new period window.
#[derive(Debug, Clone)]
pub struct NewTaskStats {
    pub task_id: Uuid,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}
