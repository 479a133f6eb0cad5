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

//! Integration tests for the live status channel.

use serde_json::json;

use farewatch::models::ExecutionState;

use crate::fixtures::*;

#[tokio::test]
async fn test_observers_receive_the_firing_lifecycle() {
    let harness = build_service(MockProvider::always_succeeding(json!({ "price": 310 })));
    let task = harness
        .service
        .create_task(task_def("*/5 * * * *"))
        .await
        .unwrap();
    let broadcaster = harness.service.broadcaster();
    let mut rx = broadcaster.subscribe(task.id, "websocket-1");

    let execution = harness.service.trigger_task(task.id).await.unwrap();

    let events = drain(&mut rx);
    let states: Vec<ExecutionState> = events.iter().map(|e| e.state).collect();
    assert_eq!(states, vec![ExecutionState::Running, ExecutionState::Completed]);
    assert!(events.iter().all(|e| e.execution_id == Some(execution.id)));
    assert_eq!(events[1].result, Some(json!({ "price": 310 })));
}

#[tokio::test]
async fn test_unsubscribed_observer_misses_events() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));
    let task = harness
        .service
        .create_task(task_def("*/5 * * * *"))
        .await
        .unwrap();
    let broadcaster = harness.service.broadcaster();
    let mut rx = broadcaster.subscribe(task.id, "websocket-1");
    broadcaster.unsubscribe(task.id, "websocket-1");

    harness.service.trigger_task(task.id).await.unwrap();

    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_disconnected_observer_is_pruned_mid_broadcast() {
    let harness = build_service(MockProvider::always_succeeding(json!(1)));
    let task = harness
        .service
        .create_task(task_def("*/5 * * * *"))
        .await
        .unwrap();
    let broadcaster = harness.service.broadcaster();
    let rx = broadcaster.subscribe(task.id, "gone");
    drop(rx);

    harness.service.trigger_task(task.id).await.unwrap();

    assert_eq!(broadcaster.observer_count(task.id), 0);
}

#[tokio::test]
async fn test_failure_events_carry_the_error() {
    let harness = build_service(MockProvider::always_failing("no seats"));
    let mut def = task_def("*/5 * * * *");
    def.max_retries = Some(0);
    let task = harness.service.create_task(def).await.unwrap();
    let broadcaster = harness.service.broadcaster();
    let mut rx = broadcaster.subscribe(task.id, "websocket-1");

    harness.service.trigger_task(task.id).await.unwrap();

    let events = drain(&mut rx);
    let last = events.last().unwrap();
    assert_eq!(last.state, ExecutionState::Failed);
    assert!(last.error.as_deref().unwrap().contains("no seats"));
}
