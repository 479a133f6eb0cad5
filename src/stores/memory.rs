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

//! In-memory implementations of the persistence ports.
//!
//! These back the test suite and are suitable for embedding the engine
//! without a durable store. All maps are guarded by async read-write
//! locks; rows are plain clones, so readers never observe a partially
//! applied update.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{ExecutionStore, ScheduleStore, StatsStore};
use crate::error::StoreError;
use crate::models::{
    ExecutionState, NewTaskExecution, NewTaskSchedule, NewTaskStats, ScheduleState, TaskExecution,
    TaskExecutionPatch, TaskSchedule, TaskSchedulePatch, TaskStats,
};

/// In-memory [`ScheduleStore`].
#[derive(Debug, Default)]
pub struct MemoryScheduleStore {
    rows: RwLock<HashMap<Uuid, TaskSchedule>>,
}

impl MemoryScheduleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ScheduleStore for MemoryScheduleStore {
    async fn find_active(&self) -> Result<Vec<TaskSchedule>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .values()
            .filter(|s| s.state == ScheduleState::Enabled && s.deleted_at.is_none())
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<TaskSchedule, StoreError> {
        let rows = self.rows.read().await;
        rows.get(&id)
            .filter(|s| s.deleted_at.is_none())
            .cloned()
            .ok_or(StoreError::NotFound(id))
    }

    async fn list(&self) -> Result<Vec<TaskSchedule>, StoreError> {
        let rows = self.rows.read().await;
        let mut schedules: Vec<TaskSchedule> = rows
            .values()
            .filter(|s| s.deleted_at.is_none())
            .cloned()
            .collect();
        schedules.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(schedules)
    }

    async fn create(&self, def: NewTaskSchedule) -> Result<TaskSchedule, StoreError> {
        let now = Utc::now();
        let schedule = TaskSchedule {
            id: Uuid::new_v4(),
            name: def.name,
            owner_identity: def.owner_identity,
            task_type: def.task_type,
            payload: def.payload,
            cron_expression: def.cron_expression,
            timezone: def.timezone.unwrap_or_else(|| "UTC".to_string()),
            timeout_ms: def.timeout_ms.unwrap_or(30_000),
            max_retries: def.max_retries.unwrap_or(3),
            state: def.state.unwrap_or(ScheduleState::Enabled),
            last_run_at: None,
            next_run_at: def.next_run_at,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        self.rows.write().await.insert(schedule.id, schedule.clone());
        Ok(schedule)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: TaskSchedulePatch,
    ) -> Result<TaskSchedule, StoreError> {
        let mut rows = self.rows.write().await;
        let schedule = rows
            .get_mut(&id)
            .filter(|s| s.deleted_at.is_none())
            .ok_or(StoreError::NotFound(id))?;

        if let Some(name) = patch.name {
            schedule.name = name;
        }
        if let Some(task_type) = patch.task_type {
            schedule.task_type = task_type;
        }
        if let Some(payload) = patch.payload {
            schedule.payload = payload;
        }
        if let Some(cron_expression) = patch.cron_expression {
            schedule.cron_expression = cron_expression;
        }
        if let Some(timezone) = patch.timezone {
            schedule.timezone = timezone;
        }
        if let Some(timeout_ms) = patch.timeout_ms {
            schedule.timeout_ms = timeout_ms;
        }
        if let Some(max_retries) = patch.max_retries {
            schedule.max_retries = max_retries;
        }
        if let Some(state) = patch.state {
            schedule.state = state;
        }
        if let Some(last_run_at) = patch.last_run_at {
            schedule.last_run_at = Some(last_run_at);
        }
        if let Some(next_run_at) = patch.next_run_at {
            schedule.next_run_at = Some(next_run_at);
        }
        schedule.updated_at = Utc::now();
        Ok(schedule.clone())
    }

    async fn soft_delete(&self, id: Uuid) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        let schedule = rows
            .get_mut(&id)
            .filter(|s| s.deleted_at.is_none())
            .ok_or(StoreError::NotFound(id))?;
        schedule.deleted_at = Some(Utc::now());
        schedule.updated_at = Utc::now();
        Ok(())
    }
}

/// In-memory [`ExecutionStore`].
#[derive(Debug, Default)]
pub struct MemoryExecutionStore {
    rows: RwLock<HashMap<Uuid, TaskExecution>>,
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionStore for MemoryExecutionStore {
    async fn create(&self, def: NewTaskExecution) -> Result<TaskExecution, StoreError> {
        let now = Utc::now();
        let execution = TaskExecution {
            id: Uuid::new_v4(),
            task_id: def.task_id,
            state: def.state,
            start_time: def.start_time,
            end_time: None,
            duration_ms: None,
            attempt: def.attempt,
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
        };
        self.rows
            .write()
            .await
            .insert(execution.id, execution.clone());
        Ok(execution)
    }

    async fn update(
        &self,
        id: Uuid,
        patch: TaskExecutionPatch,
    ) -> Result<TaskExecution, StoreError> {
        let mut rows = self.rows.write().await;
        let execution = rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;

        // Terminal states are final.
        if execution.state.is_terminal() {
            return Err(StoreError::Backend(format!(
                "execution {} is terminal and cannot be updated",
                id
            )));
        }

        if let Some(state) = patch.state {
            execution.state = state;
        }
        if let Some(end_time) = patch.end_time {
            execution.end_time = Some(end_time);
        }
        if let Some(duration_ms) = patch.duration_ms {
            execution.duration_ms = Some(duration_ms);
        }
        if let Some(attempt) = patch.attempt {
            execution.attempt = attempt;
        }
        if let Some(error) = patch.error {
            execution.error = Some(error);
        }
        if let Some(result) = patch.result {
            execution.result = Some(result);
        }
        execution.updated_at = Utc::now();
        Ok(execution.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<TaskExecution, StoreError> {
        let rows = self.rows.read().await;
        rows.get(&id).cloned().ok_or(StoreError::NotFound(id))
    }

    async fn find_by_task(
        &self,
        task_id: Uuid,
        limit: usize,
    ) -> Result<Vec<TaskExecution>, StoreError> {
        let rows = self.rows.read().await;
        let mut executions: Vec<TaskExecution> = rows
            .values()
            .filter(|e| e.task_id == task_id)
            .cloned()
            .collect();
        executions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        executions.truncate(limit);
        Ok(executions)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, StoreError> {
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|_, e| !(e.state.is_terminal() && e.start_time < cutoff));
        Ok((before - rows.len()) as u64)
    }
}

/// In-memory [`StatsStore`].
#[derive(Debug, Default)]
pub struct MemoryStatsStore {
    rows: RwLock<Vec<TaskStats>>,
}

impl MemoryStatsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StatsStore for MemoryStatsStore {
    async fn find_latest(&self, task_id: Uuid) -> Result<Option<TaskStats>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .iter()
            .filter(|s| s.task_id == task_id)
            .max_by_key(|s| s.period_start)
            .cloned())
    }

    async fn create(&self, def: NewTaskStats) -> Result<TaskStats, StoreError> {
        let now = Utc::now();
        let stats = TaskStats {
            task_id: def.task_id,
            total_runs: 0,
            successful_runs: 0,
            failed_runs: 0,
            average_duration_ms: 0.0,
            last_execution_state: ExecutionState::Pending,
            last_error: None,
            period_start: def.period_start,
            period_end: def.period_end,
            created_at: now,
            updated_at: now,
        };
        self.rows.write().await.push(stats.clone());
        Ok(stats)
    }

    async fn update(&self, mut stats: TaskStats) -> Result<TaskStats, StoreError> {
        let mut rows = self.rows.write().await;
        let row = rows
            .iter_mut()
            .find(|s| s.task_id == stats.task_id && s.period_start == stats.period_start)
            .ok_or(StoreError::NotFound(stats.task_id))?;
        stats.updated_at = Utc::now();
        *row = stats.clone();
        Ok(stats)
    }

    async fn find_all(&self) -> Result<Vec<TaskStats>, StoreError> {
        Ok(self.rows.read().await.clone())
    }
}
