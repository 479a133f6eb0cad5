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

//! The scheduling core: cron tick generation, the live job registry, the
//! per-firing execution runner, and the public facade composing them.

pub mod config;
pub mod cron;
pub mod registry;
pub mod runner;
pub mod service;

pub use config::SchedulerConfig;
pub use cron::{CronHandle, CronScheduler, TickCallback, TickFuture};
pub use registry::JobRegistry;
pub use runner::ExecutionRunner;
pub use service::{PauseOutcome, ResumeOutcome, SchedulerService, TaskStatus};
