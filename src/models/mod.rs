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

//! Data models for the scheduling engine.
//!
//! Three persisted entities make up the model:
//! - [`TaskSchedule`] - a recurring job definition
//! - [`TaskExecution`] - one firing instance of a schedule
//! - [`TaskStats`] - a rolling aggregate over a task's executions
//!
//! Each entity has a full row type, an insert shape (`New*`), and where
//! the control surface mutates it, a patch shape with optional fields.

pub mod task_execution;
pub mod task_schedule;
pub mod task_stats;

pub use task_execution::{ExecutionState, NewTaskExecution, TaskExecution, TaskExecutionPatch};
pub use task_schedule::{
    NewTaskSchedule, ScheduleState, TaskSchedule, TaskSchedulePatch, TaskType,
};
pub use task_stats::{NewTaskStats, TaskStats};
