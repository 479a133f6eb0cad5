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

//! Scheduler facade.
//!
//! The [`SchedulerService`] is the public operation surface of the
//! engine: create/pause/resume/update/delete tasks, query status and
//! execution history, trigger ad hoc firings, and restore live jobs from
//! the schedule store on process start. It composes the job registry, the
//! cron scheduler, the execution runner, the stats aggregator, and the
//! notification broadcaster.
//!
//! Liveness decisions always trust the registry over the persisted
//! `state` column; the two can transiently disagree after a process
//! restart, and pause/resume treat "nothing to do" as an explicit outcome
//! rather than an error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::config::SchedulerConfig;
use super::cron::{self, CronScheduler, TickCallback};
use super::registry::JobRegistry;
use super::runner::ExecutionRunner;
use crate::broadcast::NotificationBroadcaster;
use crate::error::{SchedulerError, StoreError};
use crate::models::{
    NewTaskSchedule, ScheduleState, TaskExecution, TaskSchedule, TaskSchedulePatch, TaskStats,
};
use crate::provider::{Alerter, SearchProvider};
use crate::stats::StatsAggregator;
use crate::stores::{ExecutionStore, ScheduleStore, StatsStore};

/// Result of a pause operation.
///
/// "Not found" is a [`SchedulerError::TaskNotFound`] error, so callers can
/// tell a missing task from one that exists but is already inactive.
#[derive(Debug)]
pub enum PauseOutcome {
    /// The live job was stopped and the schedule disabled.
    Paused(TaskSchedule),
    /// The task exists but had no live job to stop.
    AlreadyInactive,
}

/// Result of a resume operation.
#[derive(Debug)]
pub enum ResumeOutcome {
    /// A live job was registered and the schedule enabled.
    Resumed(TaskSchedule),
    /// The task already has a live job; nothing was changed.
    AlreadyActive,
}

/// Snapshot of one task's current standing.
#[derive(Debug)]
pub struct TaskStatus {
    pub schedule: TaskSchedule,
    pub latest_stats: Option<TaskStats>,
    /// Read directly from the job registry, not inferred from the
    /// persisted `state` column.
    pub is_active: bool,
    /// Derived from the cron expression at call time.
    pub next_run_at: Option<DateTime<Utc>>,
}

/// The public operation surface of the scheduling engine.
pub struct SchedulerService {
    schedules: Arc<dyn ScheduleStore>,
    executions: Arc<dyn ExecutionStore>,
    registry: Arc<JobRegistry>,
    cron: CronScheduler,
    runner: Arc<ExecutionRunner>,
    stats: Arc<StatsAggregator>,
    broadcaster: Arc<NotificationBroadcaster>,
    config: SchedulerConfig,
}

impl SchedulerService {
    /// Assembles a scheduler over the given stores and collaborators.
    ///
    /// Every instance owns its own registry and broadcaster, so multiple
    /// independent schedulers can coexist in one process.
    pub fn new(
        schedules: Arc<dyn ScheduleStore>,
        executions: Arc<dyn ExecutionStore>,
        stats_store: Arc<dyn StatsStore>,
        provider: Arc<dyn SearchProvider>,
        alerter: Arc<dyn Alerter>,
        config: SchedulerConfig,
    ) -> Self {
        let broadcaster = Arc::new(NotificationBroadcaster::new());
        let stats = Arc::new(StatsAggregator::new(
            Arc::clone(&stats_store),
            config.stats_window,
        ));
        let runner = Arc::new(ExecutionRunner::new(
            Arc::clone(&executions),
            Arc::clone(&stats),
            Arc::clone(&broadcaster),
            provider,
            alerter,
        ));

        Self {
            schedules,
            executions,
            registry: Arc::new(JobRegistry::new()),
            cron: CronScheduler::new(),
            runner,
            stats,
            broadcaster,
            config,
        }
    }

    /// The live status channel hub, for wiring up transports.
    pub fn broadcaster(&self) -> Arc<NotificationBroadcaster> {
        Arc::clone(&self.broadcaster)
    }

    /// The live job registry.
    pub fn registry(&self) -> Arc<JobRegistry> {
        Arc::clone(&self.registry)
    }

    /// Creates a task schedule and, when enabled, registers its live job.
    ///
    /// Cron expression, timezone, and payload reference are validated
    /// here; a malformed definition is rejected before anything persists.
    pub async fn create_task(
        &self,
        def: NewTaskSchedule,
    ) -> Result<TaskSchedule, SchedulerError> {
        cron::parse_cron(&def.cron_expression)?;
        let timezone = def
            .timezone
            .clone()
            .unwrap_or_else(|| self.config.default_timezone.clone());
        cron::parse_timezone(&timezone)?;
        if def.payload.trim().is_empty() {
            return Err(SchedulerError::InvalidConfiguration(
                "payload reference must not be empty".to_string(),
            ));
        }

        let next_run_at = cron::next_run_after(&def.cron_expression, &timezone, Utc::now())?;
        let def = NewTaskSchedule {
            timezone: Some(timezone),
            timeout_ms: def
                .timeout_ms
                .or(Some(self.config.default_timeout.as_millis() as i64)),
            max_retries: def.max_retries.or(Some(self.config.default_max_retries)),
            state: def.state.or(Some(ScheduleState::Enabled)),
            next_run_at: Some(next_run_at),
            ..def
        };

        let schedule = self.schedules.create(def).await?;
        if schedule.state == ScheduleState::Enabled {
            self.activate(&schedule)?;
        }
        info!(
            "Created task '{}' ({}) for {} - next run {}",
            schedule.name, schedule.id, schedule.owner_identity, next_run_at
        );
        Ok(schedule)
    }

    /// Looks up a schedule by id.
    pub async fn get_task(&self, id: Uuid) -> Result<TaskSchedule, SchedulerError> {
        schedule_or_not_found(self.schedules.find_by_id(id).await)
    }

    /// Lists all non-deleted schedules.
    pub async fn list_tasks(&self) -> Result<Vec<TaskSchedule>, SchedulerError> {
        Ok(self.schedules.list().await?)
    }

    /// Stops a task's live job and disables its schedule.
    ///
    /// Cancels future ticks only: a firing already in flight runs to
    /// completion and still persists its terminal state.
    pub async fn pause_task(&self, id: Uuid) -> Result<PauseOutcome, SchedulerError> {
        schedule_or_not_found(self.schedules.find_by_id(id).await)?;

        match self.registry.unregister(id) {
            Some(handle) => {
                handle.stop();
                let updated = self
                    .schedules
                    .update(
                        id,
                        TaskSchedulePatch {
                            state: Some(ScheduleState::Disabled),
                            ..Default::default()
                        },
                    )
                    .await?;
                info!("Paused task '{}' ({})", updated.name, id);
                Ok(PauseOutcome::Paused(updated))
            }
            None => {
                debug!("Pause for task {} was a no-op: no live job", id);
                Ok(PauseOutcome::AlreadyInactive)
            }
        }
    }

    /// Registers a live job for a disabled task and enables its schedule.
    pub async fn resume_task(&self, id: Uuid) -> Result<ResumeOutcome, SchedulerError> {
        let schedule = schedule_or_not_found(self.schedules.find_by_id(id).await)?;

        if self.registry.is_active(id) {
            debug!("Resume for task {} was a no-op: already active", id);
            return Ok(ResumeOutcome::AlreadyActive);
        }

        let next_run_at =
            cron::next_run_after(&schedule.cron_expression, &schedule.timezone, Utc::now())?;
        let updated = self
            .schedules
            .update(
                id,
                TaskSchedulePatch {
                    state: Some(ScheduleState::Enabled),
                    next_run_at: Some(next_run_at),
                    ..Default::default()
                },
            )
            .await?;
        self.activate(&updated)?;
        info!("Resumed task '{}' ({})", updated.name, id);
        Ok(ResumeOutcome::Resumed(updated))
    }

    /// Applies a partial update to a task.
    ///
    /// An `Enabled -> Disabled` transition pauses the live job first; a
    /// `Disabled -> Enabled` transition registers one after persisting. A
    /// cadence change (cron expression or timezone) on a task that stays
    /// enabled restarts its tick loop so the new cadence takes effect.
    pub async fn update_task(
        &self,
        id: Uuid,
        patch: TaskSchedulePatch,
    ) -> Result<TaskSchedule, SchedulerError> {
        let existing = schedule_or_not_found(self.schedules.find_by_id(id).await)?;

        if let Some(expression) = &patch.cron_expression {
            cron::parse_cron(expression)?;
        }
        if let Some(timezone) = &patch.timezone {
            cron::parse_timezone(timezone)?;
        }
        if let Some(payload) = &patch.payload {
            if payload.trim().is_empty() {
                return Err(SchedulerError::InvalidConfiguration(
                    "payload reference must not be empty".to_string(),
                ));
            }
        }

        let target_state = patch.state.unwrap_or(existing.state);
        let cadence_changed = patch.cron_expression.is_some() || patch.timezone.is_some();

        let mut patch = patch;
        if cadence_changed {
            let expression = patch
                .cron_expression
                .clone()
                .unwrap_or_else(|| existing.cron_expression.clone());
            let timezone = patch
                .timezone
                .clone()
                .unwrap_or_else(|| existing.timezone.clone());
            patch.next_run_at = Some(cron::next_run_after(&expression, &timezone, Utc::now())?);
        }

        if target_state == ScheduleState::Disabled {
            if let Some(handle) = self.registry.unregister(id) {
                handle.stop();
            }
        }

        let updated = self.schedules.update(id, patch).await?;

        if target_state == ScheduleState::Enabled {
            if cadence_changed {
                if let Some(handle) = self.registry.unregister(id) {
                    handle.stop();
                }
            }
            if !self.registry.is_active(id) {
                self.activate(&updated)?;
            }
        }

        info!("Updated task '{}' ({})", updated.name, id);
        Ok(updated)
    }

    /// Pauses a task if active, then soft-deletes its schedule row.
    pub async fn delete_task(&self, id: Uuid) -> Result<(), SchedulerError> {
        let schedule = schedule_or_not_found(self.schedules.find_by_id(id).await)?;

        if let Some(handle) = self.registry.unregister(id) {
            handle.stop();
            self.schedules
                .update(
                    id,
                    TaskSchedulePatch {
                        state: Some(ScheduleState::Disabled),
                        ..Default::default()
                    },
                )
                .await?;
        }
        self.schedules.soft_delete(id).await?;
        info!("Deleted task '{}' ({})", schedule.name, id);
        Ok(())
    }

    /// Returns a task's schedule, latest statistics, registry liveness,
    /// and next fire time.
    pub async fn get_task_status(&self, id: Uuid) -> Result<TaskStatus, SchedulerError> {
        let schedule = schedule_or_not_found(self.schedules.find_by_id(id).await)?;
        let latest_stats = self.stats.latest(id).await?;
        let is_active = self.registry.is_active(id);
        let next_run_at =
            cron::next_run_after(&schedule.cron_expression, &schedule.timezone, Utc::now()).ok();

        Ok(TaskStatus {
            schedule,
            latest_stats,
            is_active,
            next_run_at,
        })
    }

    /// Returns up to `limit` executions of a task, most recent first.
    pub async fn get_executions(
        &self,
        id: Uuid,
        limit: usize,
    ) -> Result<Vec<TaskExecution>, SchedulerError> {
        schedule_or_not_found(self.schedules.find_by_id(id).await)?;
        Ok(self.executions.find_by_task(id, limit).await?)
    }

    /// Returns a task's most recent execution, if any.
    pub async fn get_latest_execution(
        &self,
        id: Uuid,
    ) -> Result<Option<TaskExecution>, SchedulerError> {
        Ok(self.get_executions(id, 1).await?.into_iter().next())
    }

    /// Runs one firing of a task immediately, outside its cron cadence.
    ///
    /// Shares the overrun guard with cron ticks: if a firing is already in
    /// flight this returns [`SchedulerError::FiringInProgress`] instead of
    /// overlapping it. The firing is awaited, so provider failures are
    /// visible synchronously through the returned execution row.
    pub async fn trigger_task(&self, id: Uuid) -> Result<TaskExecution, SchedulerError> {
        let schedule = schedule_or_not_found(self.schedules.find_by_id(id).await)?;
        info!("Ad hoc trigger for task '{}' ({})", schedule.name, id);

        match self.registry.get(id) {
            Some(handle) => {
                let _permit = handle
                    .try_begin_firing()
                    .ok_or(SchedulerError::FiringInProgress(id))?;
                Ok(self.runner.run_firing(&schedule).await?)
            }
            // No live job means no tick can overlap; run unguarded.
            None => Ok(self.runner.run_firing(&schedule).await?),
        }
    }

    /// Rebuilds the job registry from the schedule store.
    ///
    /// Called once on process start: every enabled schedule gets a live
    /// job. Rows whose stored expression or timezone no longer parses are
    /// logged and skipped rather than failing the whole replay.
    pub async fn restore(&self) -> Result<usize, SchedulerError> {
        let active = self.schedules.find_active().await?;
        let mut restored = 0;
        for schedule in active {
            if self.registry.is_active(schedule.id) {
                continue;
            }
            match self.activate(&schedule) {
                Ok(()) => restored += 1,
                Err(e) => error!(
                    "Skipping task '{}' ({}) during restore: {}",
                    schedule.name, schedule.id, e
                ),
            }
        }
        info!("Restored {} scheduled task(s) from the schedule store", restored);
        Ok(restored)
    }

    /// Stops every live job without touching persisted state.
    ///
    /// Enabled schedules keep `state = ENABLED` and are picked up again by
    /// [`SchedulerService::restore`] on the next start. In-flight firings
    /// run to completion.
    pub fn shutdown(&self) {
        let ids = self.registry.active_ids();
        for id in &ids {
            if let Some(handle) = self.registry.unregister(*id) {
                handle.stop();
            }
        }
        info!("Scheduler shut down; {} live job(s) stopped", ids.len());
    }

    /// Retention cleanup: removes terminal executions that started before
    /// `before`. Returns the number of rows removed.
    pub async fn purge_executions(&self, before: DateTime<Utc>) -> Result<u64, SchedulerError> {
        let removed = self.executions.delete_before(before).await?;
        info!("Purged {} execution record(s) older than {}", removed, before);
        Ok(removed)
    }

    /// Registers a live tick loop for `schedule`.
    fn activate(&self, schedule: &TaskSchedule) -> Result<(), SchedulerError> {
        let callback = self.tick_callback(schedule.id);
        let handle = self.cron.schedule(
            schedule.id,
            &schedule.cron_expression,
            &schedule.timezone,
            callback,
        )?;
        self.registry.register(schedule.id, Arc::new(handle));
        Ok(())
    }

    /// Builds the per-tick callback for a task.
    ///
    /// Each tick re-reads the schedule so timeout/retry changes take
    /// effect on the next firing without restarting the loop.
    fn tick_callback(&self, task_id: Uuid) -> TickCallback {
        let schedules = Arc::clone(&self.schedules);
        let runner = Arc::clone(&self.runner);
        Arc::new(move || {
            let schedules = Arc::clone(&schedules);
            let runner = Arc::clone(&runner);
            Box::pin(async move {
                run_tick(schedules, runner, task_id).await;
            })
        })
    }
}

/// One cron tick: load the schedule, advance its run times, run a firing.
async fn run_tick(
    schedules: Arc<dyn ScheduleStore>,
    runner: Arc<ExecutionRunner>,
    task_id: Uuid,
) {
    let schedule = match schedules.find_by_id(task_id).await {
        Ok(schedule) => schedule,
        Err(StoreError::NotFound(_)) => {
            debug!("Tick for task {} ignored: schedule no longer exists", task_id);
            return;
        }
        Err(e) => {
            error!("Failed to load schedule {} for tick: {}", task_id, e);
            return;
        }
    };
    if !schedule.is_enabled() {
        debug!("Tick for disabled task {} ignored", task_id);
        return;
    }

    let now = Utc::now();
    let next_run_at =
        cron::next_run_after(&schedule.cron_expression, &schedule.timezone, now).ok();
    if let Err(e) = schedules
        .update(
            task_id,
            TaskSchedulePatch {
                last_run_at: Some(now),
                next_run_at,
                ..Default::default()
            },
        )
        .await
    {
        warn!("Failed to update run times for task {}: {}", task_id, e);
    }

    if let Err(e) = runner.run_firing(&schedule).await {
        error!("Firing for task {} could not persist its state: {}", task_id, e);
    }
}

fn schedule_or_not_found(
    result: Result<TaskSchedule, StoreError>,
) -> Result<TaskSchedule, SchedulerError> {
    result.map_err(|e| match e {
        StoreError::NotFound(id) => SchedulerError::TaskNotFound(id),
        other => SchedulerError::Store(other),
    })
}
