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

//! Live status broadcasting.
//!
//! The [`NotificationBroadcaster`] pushes execution state changes to
//! per-task observers and aggregate metrics updates to global observers.
//! Delivery is best-effort and unordered across observers: no replay, no
//! queueing beyond the channel itself, no acknowledgment. An observer that
//! disconnects mid-broadcast simply misses events; its sender is pruned on
//! the next publish.
//!
//! Broadcasts are hints. They carry no ordering guarantee relative to the
//! corresponding store write, so consumers re-fetch authoritative state
//! when correctness matters.

use std::collections::HashMap;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::{ExecutionState, TaskStats};

/// A task-scoped execution state change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskStatusEvent {
    pub task_id: Uuid,
    pub state: ExecutionState,
    pub execution_id: Option<Uuid>,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

/// A global aggregate-metrics update, published after every recorded
/// outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsEvent {
    pub task_id: Uuid,
    pub metrics: TaskStats,
}

/// Fan-out hub for live status events.
///
/// Observer membership is a plain multi-map from task id to a set of
/// observer handles, cleaned up when an observer's receiver is dropped.
#[derive(Debug, Default)]
pub struct NotificationBroadcaster {
    task_observers: RwLock<HashMap<Uuid, HashMap<String, mpsc::UnboundedSender<TaskStatusEvent>>>>,
    global_observers: RwLock<HashMap<String, mpsc::UnboundedSender<MetricsEvent>>>,
}

impl NotificationBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes an observer to one task's status events.
    ///
    /// Re-subscribing with the same observer id replaces the previous
    /// subscription.
    pub fn subscribe(
        &self,
        task_id: Uuid,
        observer_id: impl Into<String>,
    ) -> mpsc::UnboundedReceiver<TaskStatusEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut observers = self.task_observers.write().expect("observer map poisoned");
        observers
            .entry(task_id)
            .or_default()
            .insert(observer_id.into(), tx);
        rx
    }

    /// Removes an observer's subscription to one task. Idempotent.
    pub fn unsubscribe(&self, task_id: Uuid, observer_id: &str) {
        let mut observers = self.task_observers.write().expect("observer map poisoned");
        if let Some(task_observers) = observers.get_mut(&task_id) {
            task_observers.remove(observer_id);
            if task_observers.is_empty() {
                observers.remove(&task_id);
            }
        }
    }

    /// Publishes a status event to every observer of the task.
    ///
    /// Observers whose receiver has been dropped are pruned here.
    pub fn publish(&self, event: TaskStatusEvent) {
        let mut observers = self.task_observers.write().expect("observer map poisoned");
        if let Some(task_observers) = observers.get_mut(&event.task_id) {
            task_observers.retain(|_, tx| tx.send(event.clone()).is_ok());
            if task_observers.is_empty() {
                observers.remove(&event.task_id);
            }
        }
    }

    /// Subscribes an observer to the global metrics channel.
    pub fn subscribe_global(
        &self,
        observer_id: impl Into<String>,
    ) -> mpsc::UnboundedReceiver<MetricsEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.global_observers
            .write()
            .expect("observer map poisoned")
            .insert(observer_id.into(), tx);
        rx
    }

    /// Removes a global observer. Idempotent.
    pub fn unsubscribe_global(&self, observer_id: &str) {
        self.global_observers
            .write()
            .expect("observer map poisoned")
            .remove(observer_id);
    }

    /// Publishes a metrics event to every global observer.
    pub fn publish_global(&self, event: MetricsEvent) {
        let mut observers = self.global_observers.write().expect("observer map poisoned");
        observers.retain(|_, tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live observers for a task (pruning not yet applied).
    pub fn observer_count(&self, task_id: Uuid) -> usize {
        self.task_observers
            .read()
            .expect("observer map poisoned")
            .get(&task_id)
            .map(|m| m.len())
            .unwrap_or(0)
    }
}
