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

use std::time::Duration;

/// Configuration for the scheduler facade.
///
/// These values fill in fields a task definition omits and size the
/// statistics window; per-task settings always win over these defaults.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum time a single execution attempt may run before it is
    /// treated as timed out, applied when a definition omits `timeout_ms`.
    pub default_timeout: Duration,

    /// Number of retries allowed after a firing's initial attempt,
    /// applied when a definition omits `max_retries`.
    pub default_max_retries: i32,

    /// Timezone applied when a definition omits one.
    pub default_timezone: String,

    /// Length of one statistics aggregation window.
    pub stats_window: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            default_timeout: Duration::from_secs(30),
            default_max_retries: 3,
            default_timezone: "UTC".to_string(),
            stats_window: Duration::from_secs(24 * 60 * 60), // 24 hours
        }
    }
}
