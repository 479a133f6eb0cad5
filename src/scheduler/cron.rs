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

//! Cron-driven tick generation.
//!
//! The [`CronScheduler`] turns a cron expression into repeated
//! invocations of a zero-argument async callback. Each scheduled task gets
//! its own tick loop: compute the next occurrence in the schedule's
//! timezone, sleep until it, fire. Expressions are parsed once at schedule
//! time, so an unparsable expression fails the create operation rather
//! than the first tick.
//!
//! Prevent-overrun: each task carries a one-permit guard. A tick that
//! arrives while the previous firing is still in flight is dropped - not
//! queued, not recorded as a failure. This is deliberate load shedding.
//!
//! Stopping a handle cancels future ticks only; a firing already in
//! flight runs to completion.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use croner::Cron;
use tokio::sync::{Notify, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::SchedulerError;

/// The future a tick callback produces.
pub type TickFuture = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// A zero-argument async callback fired on every non-suppressed tick.
pub type TickCallback = Arc<dyn Fn() -> TickFuture + Send + Sync + 'static>;

/// Parses a cron expression, failing fast on malformed input.
///
/// The seconds field is optional: both five-field (minute-granularity)
/// and six-field expressions are accepted.
pub fn parse_cron(expression: &str) -> Result<Cron, SchedulerError> {
    Cron::new(expression)
        .with_seconds_optional()
        .parse()
        .map_err(|e| SchedulerError::InvalidCronExpression {
            expression: expression.to_string(),
            reason: e.to_string(),
        })
}

/// Validates an IANA timezone name.
pub fn parse_timezone(name: &str) -> Result<Tz, SchedulerError> {
    name.parse::<Tz>()
        .map_err(|_| SchedulerError::InvalidTimezone(name.to_string()))
}

/// Computes the first fire time of `expression` after `after`, evaluated
/// in `timezone`.
pub fn next_run_after(
    expression: &str,
    timezone: &str,
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>, SchedulerError> {
    let cron = parse_cron(expression)?;
    let tz = parse_timezone(timezone)?;
    next_occurrence(&cron, expression, &tz, after)
}

fn next_occurrence(
    cron: &Cron,
    expression: &str,
    tz: &Tz,
    after: DateTime<Utc>,
) -> Result<DateTime<Utc>, SchedulerError> {
    cron.find_next_occurrence(&after.with_timezone(tz), false)
        .map(|next| next.with_timezone(&Utc))
        .map_err(|e| SchedulerError::InvalidCronExpression {
            expression: expression.to_string(),
            reason: e.to_string(),
        })
}

/// Handle to one task's live tick loop.
///
/// Dropping the handle does not stop the loop; call [`CronHandle::stop`].
/// The handle also exposes the task's overrun guard so ad hoc triggering
/// shares the same no-overlapping-firings invariant as cron ticks.
#[derive(Debug)]
pub struct CronHandle {
    task_id: Uuid,
    shutdown: Arc<Notify>,
    guard: Arc<Semaphore>,
    join: JoinHandle<()>,
}

impl CronHandle {
    /// Stops the tick loop. Future ticks are cancelled; an in-flight
    /// firing runs to completion. Idempotent.
    pub fn stop(&self) {
        self.shutdown.notify_one();
    }

    pub fn task_id(&self) -> Uuid {
        self.task_id
    }

    /// Claims the task's overrun guard for one firing. Returns `None`
    /// when a firing is already in flight.
    pub fn try_begin_firing(&self) -> Option<OwnedSemaphorePermit> {
        self.guard.clone().try_acquire_owned().ok()
    }

    /// Whether the tick loop has exited.
    pub fn is_finished(&self) -> bool {
        self.join.is_finished()
    }
}

/// Converts cron expressions into repeating, overrun-guarded callback
/// invocations.
#[derive(Debug, Default)]
pub struct CronScheduler;

impl CronScheduler {
    pub fn new() -> Self {
        Self
    }

    /// Spawns a tick loop for `expression` (evaluated in `timezone`) and
    /// returns its handle.
    ///
    /// Fails fast if the expression or timezone does not parse; nothing
    /// is spawned in that case.
    pub fn schedule(
        &self,
        task_id: Uuid,
        expression: &str,
        timezone: &str,
        callback: TickCallback,
    ) -> Result<CronHandle, SchedulerError> {
        let cron = parse_cron(expression)?;
        let tz = parse_timezone(timezone)?;

        let shutdown = Arc::new(Notify::new());
        let guard = Arc::new(Semaphore::new(1));

        let join = tokio::spawn(tick_loop(
            task_id,
            cron,
            expression.to_string(),
            tz,
            Arc::clone(&shutdown),
            Arc::clone(&guard),
            callback,
        ));

        debug!(
            "Scheduled task {} with expression '{}' ({})",
            task_id, expression, timezone
        );

        Ok(CronHandle {
            task_id,
            shutdown,
            guard,
            join,
        })
    }
}

async fn tick_loop(
    task_id: Uuid,
    cron: Cron,
    expression: String,
    tz: Tz,
    shutdown: Arc<Notify>,
    guard: Arc<Semaphore>,
    callback: TickCallback,
) {
    loop {
        let now = Utc::now();
        let next = match next_occurrence(&cron, &expression, &tz, now) {
            Ok(next) => next,
            Err(e) => {
                // Expressions are validated at schedule time; reaching
                // this means the expression has no future occurrence.
                error!("Tick loop for task {} stopping: {}", task_id, e);
                break;
            }
        };
        let delay = (next - now).to_std().unwrap_or(std::time::Duration::ZERO);

        tokio::select! {
            _ = shutdown.notified() => {
                debug!("Tick loop for task {} stopped", task_id);
                break;
            }
            _ = tokio::time::sleep(delay) => {}
        }

        match guard.clone().try_acquire_owned() {
            Ok(permit) => {
                let firing = callback();
                tokio::spawn(async move {
                    let _permit = permit; // held until the firing resolves
                    firing.await;
                });
            }
            Err(_) => {
                debug!(
                    "Previous firing for task {} still in flight, tick dropped",
                    task_id
                );
            }
        }
    }
}
