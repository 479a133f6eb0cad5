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

//! Persistence ports for the scheduling engine.
//!
//! Durable storage is an external collaborator: the engine reaches it only
//! through the narrow repository traits in this module. A production
//! deployment backs them with its relational store; [`memory`] provides
//! lock-guarded in-memory implementations for tests and embedding.
//!
//! Writes issued by a single firing are awaited sequentially by the
//! execution runner, so per-execution state transitions reach the store in
//! order. No ordering is guaranteed between a store write and the
//! corresponding broadcast.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    NewTaskExecution, NewTaskSchedule, NewTaskStats, TaskExecution, TaskExecutionPatch,
    TaskSchedule, TaskSchedulePatch, TaskStats,
};

pub use memory::{MemoryExecutionStore, MemoryScheduleStore, MemoryStatsStore};

/// Durable storage for [`TaskSchedule`] rows.
#[async_trait]
pub trait ScheduleStore: Send + Sync {
    /// Returns every enabled, non-deleted schedule. Used to rebuild the
    /// job registry on process start.
    async fn find_active(&self) -> Result<Vec<TaskSchedule>, StoreError>;

    /// Looks up a schedule by id. Soft-deleted rows are not found.
    async fn find_by_id(&self, id: Uuid) -> Result<TaskSchedule, StoreError>;

    /// Returns every non-deleted schedule.
    async fn list(&self) -> Result<Vec<TaskSchedule>, StoreError>;

    /// Persists a new schedule and returns the stored row.
    async fn create(&self, def: NewTaskSchedule) -> Result<TaskSchedule, StoreError>;

    /// Applies a partial update and returns the updated row.
    async fn update(&self, id: Uuid, patch: TaskSchedulePatch)
        -> Result<TaskSchedule, StoreError>;

    /// Marks a schedule deleted. The underlying row is retained.
    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError>;
}

/// Durable storage for [`TaskExecution`] rows.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    /// Persists a new execution row and returns it.
    async fn create(&self, def: NewTaskExecution) -> Result<TaskExecution, StoreError>;

    /// Applies a partial update and returns the updated row. Rejects
    /// updates to executions that already reached a terminal state.
    async fn update(
        &self,
        id: Uuid,
        patch: TaskExecutionPatch,
    ) -> Result<TaskExecution, StoreError>;

    /// Looks up an execution by id.
    async fn find_by_id(&self, id: Uuid) -> Result<TaskExecution, StoreError>;

    /// Returns up to `limit` executions of a task, most recent first.
    async fn find_by_task(
        &self,
        task_id: Uuid,
        limit: usize,
    ) -> Result<Vec<TaskExecution>, StoreError>;

    /// Retention cleanup: removes terminal executions that started before
    /// `cutoff`. Returns the number of rows removed.
    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError>;
}

/// Durable storage for [`TaskStats`] rows.
///
/// Rows are keyed by `(task_id, period_start)`; a task accumulates one row
/// per period window.
#[async_trait]
pub trait StatsStore: Send + Sync {
    /// Returns the most recent statistics row for a task, if any.
    async fn find_latest(&self, task_id: Uuid) -> Result<Option<TaskStats>, StoreError>;

    /// Persists a fresh, zeroed row for a new period window.
    async fn create(&self, def: NewTaskStats) -> Result<TaskStats, StoreError>;

    /// Replaces the row matching the given row's key.
    async fn update(&self, stats: TaskStats) -> Result<TaskStats, StoreError>;

    /// Returns all statistics rows across all tasks.
    async fn find_all(&self) -> Result<Vec<TaskStats>, StoreError>;
}
