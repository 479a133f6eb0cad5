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

//! Retry policies and backoff strategies for failed executions.
//!
//! A [`RetryPolicy`] bounds how many attempts a single firing may make and
//! how long to wait between them. The delay grows according to a
//! [`BackoffStrategy`]; the engine default is exponential with base 2 and
//! an initial delay of one second, so the wait after a failed attempt `n`
//! is `2^n` seconds.

use std::time::Duration;

/// Strategy for growing the delay between retry attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum BackoffStrategy {
    /// Every retry waits `initial_delay`.
    Fixed,
    /// Delay grows linearly: `initial_delay * attempt * multiplier`.
    Linear { multiplier: f64 },
    /// Delay grows exponentially: `initial_delay * base^attempt * multiplier`.
    Exponential { base: f64, multiplier: f64 },
}

/// Bounds and pacing for retries within a single firing.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of attempts, counting the initial one. A policy
    /// with `max_attempts = 3` allows the initial attempt plus two
    /// retries.
    pub max_attempts: i32,
    /// Delay before the first retry (and the unit for grown delays).
    pub initial_delay: Duration,
    /// Upper bound applied to any computed delay.
    pub max_delay: Duration,
    /// How the delay grows across attempts.
    pub backoff_strategy: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_secs(3600),
            backoff_strategy: BackoffStrategy::Exponential {
                base: 2.0,
                multiplier: 1.0,
            },
        }
    }
}

impl RetryPolicy {
    /// Builds the engine's standard policy for a schedule that allows
    /// `max_retries` retries after the initial attempt.
    pub fn for_max_retries(max_retries: i32) -> Self {
        Self {
            max_attempts: max_retries.max(0) + 1,
            ..Self::default()
        }
    }

    /// Computes the delay to wait after attempt number `attempt` failed.
    ///
    /// The delay is a function of the attempt number alone, independent of
    /// the execution timeout. Attempt numbers start at 1.
    pub fn calculate_delay(&self, attempt: i32) -> Duration {
        let attempt = attempt.max(1);
        let millis = self.initial_delay.as_millis() as f64;
        let delay = match &self.backoff_strategy {
            BackoffStrategy::Fixed => millis,
            BackoffStrategy::Linear { multiplier } => millis * attempt as f64 * multiplier,
            BackoffStrategy::Exponential { base, multiplier } => {
                millis * base.powi(attempt) * multiplier
            }
        };
        let delay = Duration::from_millis(delay as u64);
        delay.min(self.max_delay)
    }

    /// Whether another attempt is allowed after `attempt` attempts have
    /// already been made.
    pub fn allows_retry(&self, attempt: i32) -> bool {
        attempt < self.max_attempts
    }
}
