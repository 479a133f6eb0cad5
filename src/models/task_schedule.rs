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

//! Task Schedule Model
//!
//! A [`TaskSchedule`] is a recurring job definition: a cron expression, an
//! opaque payload reference, a timeout, and a retry budget. Schedules are
//! created through the scheduler facade, mutated by pause/resume/update,
//! and soft-deleted (the underlying row is retained).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Discriminates what the schedule payload means and which provider
/// operation a firing invokes.
///
/// Adding a task type is a compile-time-checked extension: every dispatch
/// site must handle the new variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskType {
    /// A one-way saved search executed against the simple search API.
    #[serde(rename = "SIMPLE_SEARCH")]
    SimpleSearch,
    /// A multi-leg / filtered saved search executed against the advanced
    /// search API.
    #[serde(rename = "ADVANCED_SEARCH")]
    AdvancedSearch,
}

/// Whether a schedule is eligible to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleState {
    /// The schedule should have a live tick loop registered.
    #[serde(rename = "ENABLED")]
    Enabled,
    /// The schedule is paused; no ticks fire.
    #[serde(rename = "DISABLED")]
    Disabled,
}

/// Represents a recurring job definition.
///
/// Invariant: a schedule has at most one live entry in the job registry at
/// any time, and `state == Enabled` implies such an entry exists (and vice
/// versa), modulo the brief window during a transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSchedule {
    /// Unique identifier for the schedule
    pub id: Uuid,
    /// Human-readable schedule name
    pub name: String,
    /// Identity of the owning user (e.g. an email address)
    pub owner_identity: String,
    /// What the payload means and which provider operation to invoke
    pub task_type: TaskType,
    /// Opaque payload reference (e.g. a saved-search id)
    pub payload: String,
    /// Cron expression defining the recurring fire times
    pub cron_expression: String,
    /// IANA timezone the cron expression is evaluated in
    pub timezone: String,
    /// Maximum time a single attempt may run, in milliseconds
    pub timeout_ms: i64,
    /// Number of retries allowed after the initial attempt of a firing
    pub max_retries: i32,
    /// Whether the schedule is eligible to fire
    pub state: ScheduleState,
    /// When the schedule last fired
    pub last_run_at: Option<DateTime<Utc>>,
    /// When the schedule is next due to fire
    pub next_run_at: Option<DateTime<Utc>>,
    /// Soft-delete marker; a deleted row is retained but never returned
    pub deleted_at: Option<DateTime<Utc>>,
    /// When the row was created
    pub created_at: DateTime<Utc>,
    /// When the row was last updated
    pub updated_at: DateTime<Utc>,
}

impl TaskSchedule {
    /// Whether the schedule is eligible to fire.
    pub fn is_enabled(&self) -> bool {
        self.state == ScheduleState::Enabled && self.deleted_at.is_none()
    }
}

/// A new schedule to be persisted.
///
/// `timezone`, `timeout_ms`, `max_retries`, and `state` fall back to the
/// scheduler's configured defaults when omitted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTaskSchedule {
    pub name: String,
    pub owner_identity: String,
    pub task_type: TaskType,
    pub payload: String,
    pub cron_expression: String,
    pub timezone: Option<String>,
    pub timeout_ms: Option<i64>,
    pub max_retries: Option<i32>,
    pub state: Option<ScheduleState>,
    /// First fire time, derived from the cron expression by the caller.
    pub next_run_at: Option<DateTime<Utc>>,
}

/// A partial update to a schedule. `None` fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskSchedulePatch {
    pub name: Option<String>,
    pub task_type: Option<TaskType>,
    pub payload: Option<String>,
    pub cron_expression: Option<String>,
    pub timezone: Option<String>,
    pub timeout_ms: Option<i64>,
    pub max_retries: Option<i32>,
    pub state: Option<ScheduleState>,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
}
