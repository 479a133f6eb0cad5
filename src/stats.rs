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

//! Rolling execution statistics.
//!
//! The [`StatsAggregator`] folds each terminal execution into the task's
//! current [`TaskStats`] window. Windows are created lazily on a task's
//! first recorded outcome and rolled over when an outcome arrives after
//! the window's end; old windows are retained as history. Aggregation is
//! pure bookkeeping: the only side effect is the persisted stats row.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{ExecutionState, NewTaskStats, TaskStats};
use crate::stores::StatsStore;

/// Maintains rolling per-task counters from completed executions.
pub struct StatsAggregator {
    store: Arc<dyn StatsStore>,
    window: Duration,
}

impl StatsAggregator {
    /// Creates an aggregator over the given store with the given period
    /// window length.
    pub fn new(store: Arc<dyn StatsStore>, window: std::time::Duration) -> Self {
        let window = Duration::from_std(window).unwrap_or_else(|_| Duration::hours(24));
        Self { store, window }
    }

    /// Records one terminal execution outcome and returns the updated
    /// statistics row.
    ///
    /// Each terminal execution must be recorded exactly once; the caller
    /// (the execution runner) guarantees this by recording only at the
    /// single terminal transition of a firing.
    pub async fn record_outcome(
        &self,
        task_id: Uuid,
        duration_ms: i64,
        success: bool,
        state: ExecutionState,
        error: Option<String>,
    ) -> Result<TaskStats, StoreError> {
        let now = Utc::now();

        let current = match self.store.find_latest(task_id).await? {
            Some(stats) if stats.period_end > now => stats,
            previous => {
                if previous.is_some() {
                    debug!("Stats window expired for task {}, opening a new one", task_id);
                }
                self.store
                    .create(NewTaskStats {
                        task_id,
                        period_start: now,
                        period_end: now + self.window,
                    })
                    .await?
            }
        };

        let mut updated = current;
        updated.record(duration_ms, success, state, error);
        self.store.update(updated).await
    }

    /// Returns the most recent statistics row for a task, if any.
    pub async fn latest(&self, task_id: Uuid) -> Result<Option<TaskStats>, StoreError> {
        self.store.find_latest(task_id).await
    }
}
