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

//! Integration tests for the cron tick loop.
//!
//! These run in real time against seconds-granularity expressions, since
//! the tick loop derives its deadlines from the wall clock.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use farewatch::scheduler::{CronScheduler, TickCallback};

fn counting_callback(count: Arc<AtomicUsize>) -> TickCallback {
    Arc::new(move || {
        let count = Arc::clone(&count);
        Box::pin(async move {
            count.fetch_add(1, Ordering::SeqCst);
        })
    })
}

#[tokio::test]
async fn test_tick_loop_fires_and_stop_cancels_future_ticks() {
    let scheduler = CronScheduler::new();
    let count = Arc::new(AtomicUsize::new(0));

    let handle = scheduler
        .schedule(
            Uuid::new_v4(),
            "* * * * * *",
            "UTC",
            counting_callback(Arc::clone(&count)),
        )
        .unwrap();

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    let fired = count.load(Ordering::SeqCst);
    assert!((1..=3).contains(&fired), "expected 1-3 ticks, got {}", fired);

    handle.stop();
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(handle.is_finished());

    let after_stop = count.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(1_200)).await;
    assert_eq!(count.load(Ordering::SeqCst), after_stop);
}

#[tokio::test]
async fn test_overlapping_ticks_are_suppressed_not_queued() {
    let scheduler = CronScheduler::new();
    let active = Arc::new(AtomicUsize::new(0));
    let max_active = Arc::new(AtomicUsize::new(0));
    let fired = Arc::new(AtomicUsize::new(0));

    let callback: TickCallback = {
        let active = Arc::clone(&active);
        let max_active = Arc::clone(&max_active);
        let fired = Arc::clone(&fired);
        Arc::new(move || {
            let active = Arc::clone(&active);
            let max_active = Arc::clone(&max_active);
            let fired = Arc::clone(&fired);
            Box::pin(async move {
                fired.fetch_add(1, Ordering::SeqCst);
                let now_active = active.fetch_add(1, Ordering::SeqCst) + 1;
                max_active.fetch_max(now_active, Ordering::SeqCst);
                // Outlive the next tick so it must be suppressed.
                tokio::time::sleep(Duration::from_millis(1_400)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            })
        })
    };

    let handle = scheduler
        .schedule(Uuid::new_v4(), "* * * * * *", "UTC", callback)
        .unwrap();

    tokio::time::sleep(Duration::from_millis(3_600)).await;
    handle.stop();

    // Never two firings of the same task at once, and at least one tick
    // was dropped rather than queued.
    assert_eq!(max_active.load(Ordering::SeqCst), 1);
    let fired = fired.load(Ordering::SeqCst);
    assert!((1..=2).contains(&fired), "expected 1-2 firings, got {}", fired);
}

#[tokio::test]
async fn test_overrun_guard_is_shared_with_manual_firings() {
    let scheduler = CronScheduler::new();
    let count = Arc::new(AtomicUsize::new(0));

    // A far-future expression: no tick interferes with the guard.
    let handle = scheduler
        .schedule(
            Uuid::new_v4(),
            "0 0 1 1 *",
            "UTC",
            counting_callback(count),
        )
        .unwrap();

    let first = handle.try_begin_firing();
    assert!(first.is_some());
    assert!(handle.try_begin_firing().is_none());

    drop(first);
    assert!(handle.try_begin_firing().is_some());

    handle.stop();
}

#[tokio::test]
async fn test_malformed_expression_spawns_nothing() {
    let scheduler = CronScheduler::new();
    let count = Arc::new(AtomicUsize::new(0));

    let result = scheduler.schedule(
        Uuid::new_v4(),
        "61 * * * *",
        "UTC",
        counting_callback(Arc::clone(&count)),
    );

    assert!(result.is_err());
    assert_eq!(count.load(Ordering::SeqCst), 0);
}
