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

//! Task Execution Model
//!
//! A [`TaskExecution`] tracks one firing instance of a schedule: a single
//! logical occurrence of the task becoming due, however many retry
//! attempts it takes to resolve. Retries advance the `attempt` counter in
//! place on the same row; they never create new rows. Once an execution
//! reaches a terminal state it is never mutated again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle state of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionState {
    /// Waiting for a retry timer; the firing is not finished.
    #[serde(rename = "PENDING")]
    Pending,
    /// An attempt is currently in flight.
    #[serde(rename = "RUNNING")]
    Running,
    /// The firing resolved successfully.
    #[serde(rename = "COMPLETED")]
    Completed,
    /// The firing failed permanently (retries exhausted or a
    /// configuration error).
    #[serde(rename = "FAILED")]
    Failed,
    /// The firing failed permanently and the final cause was the timeout
    /// timer winning the race.
    #[serde(rename = "TIMEOUT")]
    Timeout,
    /// The firing was skipped without running.
    #[serde(rename = "SKIPPED")]
    Skipped,
}

impl ExecutionState {
    /// Whether this state is final. Terminal executions are never mutated
    /// again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionState::Completed
                | ExecutionState::Failed
                | ExecutionState::Timeout
                | ExecutionState::Skipped
        )
    }
}

/// Represents one firing instance of a schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskExecution {
    /// Unique identifier for the execution
    pub id: Uuid,
    /// The owning schedule
    pub task_id: Uuid,
    /// Current lifecycle state
    pub state: ExecutionState,
    /// When the firing started (first attempt)
    pub start_time: DateTime<Utc>,
    /// When the firing reached a terminal state
    pub end_time: Option<DateTime<Utc>>,
    /// Total firing duration in milliseconds, first attempt's start to the
    /// final terminal transition (retry waits included)
    pub duration_ms: Option<i64>,
    /// Attempt number, starting at 1 and advanced in place on retry
    pub attempt: i32,
    /// Error message of the most recent failure
    pub error: Option<String>,
    /// Provider result, serialized to JSON text
    pub result: Option<String>,
    /// When the row was created
    pub created_at: DateTime<Utc>,
    /// When the row was last updated
    pub updated_at: DateTime<Utc>,
}

/// A new execution row, created when a tick fires.
#[derive(Debug, Clone)]
pub struct NewTaskExecution {
    pub task_id: Uuid,
    pub state: ExecutionState,
    pub start_time: DateTime<Utc>,
    pub attempt: i32,
}

/// A partial update to an execution row. `None` fields are left unchanged.
#[derive(Debug, Clone, Default)]
pub struct TaskExecutionPatch {
    pub state: Option<ExecutionState>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub attempt: Option<i32>,
    pub error: Option<String>,
    pub result: Option<String>,
}
