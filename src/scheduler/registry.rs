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

//! Live job registry.
//!
//! The [`JobRegistry`] is the in-memory map from task id to its live
//! scheduling handle and the single source of truth for "is this task
//! currently active". It is a transient, process-local projection of the
//! schedule table: never persisted, rebuilt on process start by replaying
//! every enabled schedule.
//!
//! The registry is owned by the scheduler facade and injected where
//! needed, so independent scheduler instances can coexist in one process.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::warn;
use uuid::Uuid;

use super::cron::CronHandle;

/// In-memory index of tasks with a live, ticking schedule.
///
/// Guarantees at most one handle per task id; `unregister` is idempotent.
#[derive(Debug, Default)]
pub struct JobRegistry {
    entries: RwLock<HashMap<Uuid, Arc<CronHandle>>>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a live handle for a task.
    ///
    /// If a handle is already registered for the task it is stopped and
    /// replaced, preserving the at-most-one invariant.
    pub fn register(&self, task_id: Uuid, handle: Arc<CronHandle>) {
        let mut entries = self.entries.write().expect("registry lock poisoned");
        if let Some(previous) = entries.insert(task_id, handle) {
            warn!("Replacing live handle for task {}", task_id);
            previous.stop();
        }
    }

    /// Removes and returns the live handle for a task, if one exists.
    pub fn unregister(&self, task_id: Uuid) -> Option<Arc<CronHandle>> {
        self.entries
            .write()
            .expect("registry lock poisoned")
            .remove(&task_id)
    }

    /// Whether a live handle is registered for the task.
    pub fn is_active(&self, task_id: Uuid) -> bool {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .contains_key(&task_id)
    }

    /// Returns the live handle for a task, if one exists.
    pub fn get(&self, task_id: Uuid) -> Option<Arc<CronHandle>> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(&task_id)
            .cloned()
    }

    /// Ids of all currently registered tasks.
    pub fn active_ids(&self) -> Vec<Uuid> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .keys()
            .copied()
            .collect()
    }

    /// Number of currently registered tasks.
    pub fn len(&self) -> usize {
        self.entries.read().expect("registry lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
