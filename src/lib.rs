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

//! # Farewatch
//!
//! A scheduled task execution engine for flight-price monitoring: turns
//! persisted `(cron expression, payload, timeout, retry policy)` tuples
//! into live, recurring, time-bounded executions of an injected async
//! search operation.
//!
//! ## Architecture
//!
//! - [`scheduler::SchedulerService`] - the public operation surface
//!   (create/pause/resume/update/delete, status, history, ad hoc trigger,
//!   restore, shutdown)
//! - [`scheduler::CronScheduler`] - cron tick generation with
//!   prevent-overrun semantics
//! - [`scheduler::JobRegistry`] - in-memory index of live jobs, the
//!   source of truth for "is this task active"
//! - [`scheduler::ExecutionRunner`] - the per-firing state machine:
//!   timeout race, retries with exponential backoff, terminal
//!   classification
//! - [`stats::StatsAggregator`] - rolling success/failure counters and
//!   running mean durations
//! - [`broadcast::NotificationBroadcaster`] - best-effort live status
//!   fan-out to subscribed observers
//!
//! Durable storage, the search provider, and failure alerting are
//! external collaborators injected behind the traits in [`stores`] and
//! [`provider`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use farewatch::models::{NewTaskSchedule, TaskType};
//! use farewatch::scheduler::{SchedulerConfig, SchedulerService};
//! use farewatch::stores::{MemoryExecutionStore, MemoryScheduleStore, MemoryStatsStore};
//!
//! let service = SchedulerService::new(
//!     Arc::new(MemoryScheduleStore::new()),
//!     Arc::new(MemoryExecutionStore::new()),
//!     Arc::new(MemoryStatsStore::new()),
//!     my_search_provider,
//!     my_alerter,
//!     SchedulerConfig::default(),
//! );
//!
//! let task = service
//!     .create_task(NewTaskSchedule {
//!         name: "nightly fare check".into(),
//!         owner_identity: "traveler@example.com".into(),
//!         task_type: TaskType::SimpleSearch,
//!         payload: "saved-search-42".into(),
//!         cron_expression: "0 6 * * *".into(),
//!         timezone: None,
//!         timeout_ms: None,
//!         max_retries: None,
//!         state: None,
//!         next_run_at: None,
//!     })
//!     .await?;
//! ```

pub mod broadcast;
pub mod error;
pub mod logging;
pub mod models;
pub mod provider;
pub mod retry;
pub mod scheduler;
pub mod stats;
pub mod stores;

pub use broadcast::{MetricsEvent, NotificationBroadcaster, TaskStatusEvent};
pub use error::{ExecutionError, ProviderError, SchedulerError, StoreError};
pub use models::{
    ExecutionState, NewTaskExecution, NewTaskSchedule, NewTaskStats, ScheduleState, TaskExecution,
    TaskExecutionPatch, TaskSchedule, TaskSchedulePatch, TaskStats, TaskType,
};
pub use provider::{Alerter, LogAlerter, SearchProvider};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use scheduler::{
    CronHandle, CronScheduler, ExecutionRunner, JobRegistry, PauseOutcome, ResumeOutcome,
    SchedulerConfig, SchedulerService, TaskStatus,
};
pub use stats::StatsAggregator;
pub use stores::{
    ExecutionStore, MemoryExecutionStore, MemoryScheduleStore, MemoryStatsStore, ScheduleStore,
    StatsStore,
};
