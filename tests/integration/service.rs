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

//! Integration tests for the scheduler facade.
//!
//! Tasks here use minute-granularity cron expressions, so no cron tick
//! fires within a test; firings are driven through the ad hoc trigger.

use std::sync::Arc;
use std::time::Duration;

use chrono::{Timelike, Utc};
use serde_json::json;

use farewatch::error::SchedulerError;
use farewatch::models::{ExecutionState, ScheduleState, TaskSchedulePatch};
use farewatch::scheduler::{PauseOutcome, ResumeOutcome};
use farewatch::stores::ScheduleStore;

use crate::fixtures::*;

#[tokio::test]
async fn test_create_task_registers_live_job() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));

    let task = harness
        .service
        .create_task(task_def("*/5 * * * *"))
        .await
        .unwrap();

    assert_eq!(task.state, ScheduleState::Enabled);
    assert_eq!(task.timezone, "UTC");
    assert_eq!(task.timeout_ms, 30_000);
    assert_eq!(task.max_retries, 3);
    assert!(harness.service.registry().is_active(task.id));

    let stored = harness.schedules.find_by_id(task.id).await.unwrap();
    assert_eq!(stored.state, ScheduleState::Enabled);
}

#[tokio::test]
async fn test_create_disabled_task_registers_nothing() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));
    let mut def = task_def("*/5 * * * *");
    def.state = Some(ScheduleState::Disabled);

    let task = harness.service.create_task(def).await.unwrap();

    assert!(!harness.service.registry().is_active(task.id));
}

#[tokio::test]
async fn test_malformed_cron_expression_fails_creation() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));

    let result = harness.service.create_task(task_def("every tuesday")).await;

    assert!(matches!(
        result,
        Err(SchedulerError::InvalidCronExpression { .. })
    ));
    assert!(harness.schedules.list().await.unwrap().is_empty());
    assert!(harness.service.registry().is_empty());
}

#[tokio::test]
async fn test_unknown_timezone_fails_creation() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));
    let mut def = task_def("*/5 * * * *");
    def.timezone = Some("Mars/Olympus_Mons".to_string());

    let result = harness.service.create_task(def).await;

    assert!(matches!(result, Err(SchedulerError::InvalidTimezone(_))));
}

#[tokio::test]
async fn test_empty_payload_fails_creation() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));
    let mut def = task_def("*/5 * * * *");
    def.payload = String::new();

    let result = harness.service.create_task(def).await;

    assert!(matches!(
        result,
        Err(SchedulerError::InvalidConfiguration(_))
    ));
}

#[tokio::test]
async fn test_next_run_is_derived_from_the_cron_expression() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));

    let task = harness
        .service
        .create_task(task_def("0 6 * * *"))
        .await
        .unwrap();

    let next = task.next_run_at.unwrap();
    assert!(next > Utc::now());
    assert_eq!(next.hour(), 6);
    assert_eq!(next.minute(), 0);
}

#[tokio::test]
async fn test_pause_stops_live_job_and_disables_schedule() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));
    let task = harness
        .service
        .create_task(task_def("*/5 * * * *"))
        .await
        .unwrap();

    let outcome = harness.service.pause_task(task.id).await.unwrap();

    let PauseOutcome::Paused(updated) = outcome else {
        panic!("expected a live job to be paused");
    };
    assert_eq!(updated.state, ScheduleState::Disabled);
    assert!(!harness.service.registry().is_active(task.id));

    // A second pause finds nothing to stop.
    let outcome = harness.service.pause_task(task.id).await.unwrap();
    assert!(matches!(outcome, PauseOutcome::AlreadyInactive));
}

#[tokio::test]
async fn test_pause_unknown_task_is_a_typed_error() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));

    let result = harness.service.pause_task(uuid::Uuid::new_v4()).await;

    assert!(matches!(result, Err(SchedulerError::TaskNotFound(_))));
}

#[tokio::test]
async fn test_resume_twice_registers_exactly_one_job() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));
    let mut def = task_def("*/5 * * * *");
    def.state = Some(ScheduleState::Disabled);
    let task = harness.service.create_task(def).await.unwrap();

    let first = harness.service.resume_task(task.id).await.unwrap();
    assert!(matches!(first, ResumeOutcome::Resumed(_)));
    assert_eq!(harness.service.registry().len(), 1);

    let second = harness.service.resume_task(task.id).await.unwrap();
    assert!(matches!(second, ResumeOutcome::AlreadyActive));
    assert_eq!(harness.service.registry().len(), 1);

    let stored = harness.schedules.find_by_id(task.id).await.unwrap();
    assert_eq!(stored.state, ScheduleState::Enabled);
}

#[tokio::test]
async fn test_update_to_disabled_pauses_the_live_job() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));
    let task = harness
        .service
        .create_task(task_def("*/5 * * * *"))
        .await
        .unwrap();

    let updated = harness
        .service
        .update_task(
            task.id,
            TaskSchedulePatch {
                state: Some(ScheduleState::Disabled),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.state, ScheduleState::Disabled);
    assert!(!harness.service.registry().is_active(task.id));
}

#[tokio::test]
async fn test_update_to_enabled_registers_a_live_job() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));
    let mut def = task_def("*/5 * * * *");
    def.state = Some(ScheduleState::Disabled);
    let task = harness.service.create_task(def).await.unwrap();

    harness
        .service
        .update_task(
            task.id,
            TaskSchedulePatch {
                state: Some(ScheduleState::Enabled),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert!(harness.service.registry().is_active(task.id));
}

#[tokio::test]
async fn test_cadence_change_keeps_a_single_live_job() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));
    let task = harness
        .service
        .create_task(task_def("*/5 * * * *"))
        .await
        .unwrap();

    let updated = harness
        .service
        .update_task(
            task.id,
            TaskSchedulePatch {
                cron_expression: Some("0 6 * * *".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.cron_expression, "0 6 * * *");
    assert_eq!(updated.next_run_at.unwrap().hour(), 6);
    assert_eq!(harness.service.registry().len(), 1);
}

#[tokio::test]
async fn test_update_rejects_malformed_cron() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));
    let task = harness
        .service
        .create_task(task_def("*/5 * * * *"))
        .await
        .unwrap();

    let result = harness
        .service
        .update_task(
            task.id,
            TaskSchedulePatch {
                cron_expression: Some("bogus".to_string()),
                ..Default::default()
            },
        )
        .await;

    assert!(matches!(
        result,
        Err(SchedulerError::InvalidCronExpression { .. })
    ));
    // The stored schedule is untouched.
    let stored = harness.schedules.find_by_id(task.id).await.unwrap();
    assert_eq!(stored.cron_expression, "*/5 * * * *");
}

#[tokio::test]
async fn test_delete_stops_job_and_soft_deletes_row() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));
    let task = harness
        .service
        .create_task(task_def("*/5 * * * *"))
        .await
        .unwrap();

    harness.service.delete_task(task.id).await.unwrap();

    assert!(!harness.service.registry().is_active(task.id));
    assert!(matches!(
        harness.service.get_task(task.id).await,
        Err(SchedulerError::TaskNotFound(_))
    ));
    assert!(harness.schedules.find_active().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_status_reads_liveness_from_the_registry() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));
    let task = harness
        .service
        .create_task(task_def("*/5 * * * *"))
        .await
        .unwrap();

    let status = harness.service.get_task_status(task.id).await.unwrap();
    assert!(status.is_active);
    assert!(status.latest_stats.is_none());
    assert!(status.next_run_at.unwrap() > Utc::now());

    harness.service.pause_task(task.id).await.unwrap();

    let status = harness.service.get_task_status(task.id).await.unwrap();
    assert!(!status.is_active);
}

#[tokio::test]
async fn test_trigger_runs_one_firing_synchronously() {
    let harness = build_service(MockProvider::always_succeeding(json!({ "price": 250 })));
    let task = harness
        .service
        .create_task(task_def("*/5 * * * *"))
        .await
        .unwrap();

    let execution = harness.service.trigger_task(task.id).await.unwrap();

    assert_eq!(execution.state, ExecutionState::Completed);
    assert!(execution.result.as_deref().unwrap().contains("250"));

    let status = harness.service.get_task_status(task.id).await.unwrap();
    let stats = status.latest_stats.unwrap();
    assert_eq!(stats.total_runs, 1);
    assert_eq!(stats.successful_runs, 1);
}

#[tokio::test]
async fn test_trigger_while_firing_in_flight_is_rejected() {
    let harness = build_service(MockProvider::always_sleeping(Duration::from_millis(200)));
    let task = harness
        .service
        .create_task(task_def("*/5 * * * *"))
        .await
        .unwrap();

    let service = Arc::clone(&harness.service);
    let id = task.id;
    let in_flight = tokio::spawn(async move { service.trigger_task(id).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let second = harness.service.trigger_task(task.id).await;
    assert!(matches!(second, Err(SchedulerError::FiringInProgress(_))));

    let first = in_flight.await.unwrap().unwrap();
    assert_eq!(first.state, ExecutionState::Completed);
}

#[tokio::test]
async fn test_pause_does_not_abort_in_flight_firing() {
    let harness = build_service(MockProvider::always_sleeping(Duration::from_millis(200)));
    let task = harness
        .service
        .create_task(task_def("*/5 * * * *"))
        .await
        .unwrap();

    let service = Arc::clone(&harness.service);
    let id = task.id;
    let in_flight = tokio::spawn(async move { service.trigger_task(id).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let outcome = harness.service.pause_task(task.id).await.unwrap();
    assert!(matches!(outcome, PauseOutcome::Paused(_)));
    assert!(!harness.service.registry().is_active(task.id));

    // The firing runs to completion and its terminal state persists.
    let execution = in_flight.await.unwrap().unwrap();
    assert_eq!(execution.state, ExecutionState::Completed);

    let latest = harness
        .service
        .get_latest_execution(task.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.state, ExecutionState::Completed);
}

#[tokio::test]
async fn test_execution_history_is_most_recent_first_and_limited() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));
    let task = harness
        .service
        .create_task(task_def("*/5 * * * *"))
        .await
        .unwrap();

    for _ in 0..3 {
        harness.service.trigger_task(task.id).await.unwrap();
    }

    let executions = harness.service.get_executions(task.id, 2).await.unwrap();
    assert_eq!(executions.len(), 2);
    assert!(executions[0].start_time >= executions[1].start_time);

    let latest = harness
        .service
        .get_latest_execution(task.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(latest.id, executions[0].id);
}

#[tokio::test]
async fn test_restore_replays_enabled_schedules_only() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));

    // Seed the store directly, as if a previous process had crashed.
    let enabled_a = harness.schedules.create(task_def("*/5 * * * *")).await.unwrap();
    let enabled_b = harness.schedules.create(task_def("0 6 * * *")).await.unwrap();
    let mut disabled = task_def("*/5 * * * *");
    disabled.state = Some(ScheduleState::Disabled);
    let disabled = harness.schedules.create(disabled).await.unwrap();
    // A row whose stored expression has rotted is skipped, not fatal.
    let broken = harness.schedules.create(task_def("broken cron")).await.unwrap();

    let restored = harness.service.restore().await.unwrap();

    assert_eq!(restored, 2);
    assert!(harness.service.registry().is_active(enabled_a.id));
    assert!(harness.service.registry().is_active(enabled_b.id));
    assert!(!harness.service.registry().is_active(disabled.id));
    assert!(!harness.service.registry().is_active(broken.id));
}

#[tokio::test]
async fn test_shutdown_stops_jobs_but_keeps_schedules_enabled() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));
    let task_a = harness
        .service
        .create_task(task_def("*/5 * * * *"))
        .await
        .unwrap();
    let task_b = harness
        .service
        .create_task(task_def("0 6 * * *"))
        .await
        .unwrap();

    harness.service.shutdown();

    assert!(harness.service.registry().is_empty());
    let active = harness.schedules.find_active().await.unwrap();
    assert_eq!(active.len(), 2);

    // A later restore picks both up again.
    let restored = harness.service.restore().await.unwrap();
    assert_eq!(restored, 2);
    assert!(harness.service.registry().is_active(task_a.id));
    assert!(harness.service.registry().is_active(task_b.id));
}

#[tokio::test]
async fn test_purge_removes_old_terminal_executions() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));
    let task = harness
        .service
        .create_task(task_def("*/5 * * * *"))
        .await
        .unwrap();

    harness.service.trigger_task(task.id).await.unwrap();
    harness.service.trigger_task(task.id).await.unwrap();

    let removed = harness.service.purge_executions(Utc::now()).await.unwrap();

    assert_eq!(removed, 2);
    assert!(harness
        .service
        .get_executions(task.id, 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_permanent_failure_reaches_the_alerter() {
    let harness = build_service(MockProvider::always_failing("provider down"));
    let mut def = task_def("*/5 * * * *");
    def.max_retries = Some(0);
    let task = harness.service.create_task(def).await.unwrap();

    let execution = harness.service.trigger_task(task.id).await.unwrap();

    assert_eq!(execution.state, ExecutionState::Failed);
    assert_eq!(harness.alerter.alert_count(), 1);
    assert_eq!(harness.alerter.alerts()[0], (task.id, execution.id));
}
