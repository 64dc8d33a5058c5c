//! Integration tests for the timer actor.
//!
//! These tests drive the timer through `spawn_timer()` and the `TimerHandle`
//! interface, with tokio's paused clock standing in for wall time. Sleeps
//! end on half-second marks so no assertion races a tick.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use pomo_core::{FixedClock, Phase, RunState, SettingsUpdate, DAILY_BUCKETS, MONTHLY_BUCKETS, WEEKLY_BUCKETS};
use pomod::persistence::Persistence;
use pomod::store::MemoryStore;
use pomod::timer::{spawn_timer, TimerEvent, TimerHandle, TimerOptions};
use serde_json::json;
use tokio::sync::broadcast;
use tokio::time::sleep;

// ============================================================================
// Test Helpers
// ============================================================================

fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn spawn_on(store: &MemoryStore, clock: &FixedClock) -> TimerHandle {
    spawn_timer(
        Persistence::new(Arc::new(store.clone())),
        Arc::new(clock.clone()),
        TimerOptions::default(),
    )
}

fn spawn_fresh() -> (TimerHandle, MemoryStore, FixedClock) {
    let store = MemoryStore::new();
    let clock = FixedClock::at_local_date(day(2024, 5, 14));
    let handle = spawn_on(&store, &clock);
    (handle, store, clock)
}

async fn configure_minutes(handle: &TimerHandle, work: i64, brk: i64) {
    handle
        .configure(SettingsUpdate {
            work_minutes: Some(json!(work)),
            break_minutes: Some(json!(brk)),
            ..Default::default()
        })
        .await
        .unwrap();
}

/// Waits until the actor has exited and its event channel closed.
async fn wait_for_shutdown(mut events: broadcast::Receiver<TimerEvent>) {
    loop {
        match events.recv().await {
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

// ============================================================================
// Countdown Scenarios
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_full_work_interval_flips_to_break() {
    let (handle, store, _clock) = spawn_fresh();

    handle.start().await.unwrap();
    sleep(Duration::from_millis(1_500_500)).await;

    let view = handle.get_state().await.unwrap();
    assert_eq!(view.phase, Phase::Break);
    assert_eq!(view.run_state, RunState::Running);
    assert_eq!(view.seconds_remaining, 300);
    assert_eq!(view.completed_pomodoros, 1);

    let raw = store.snapshot().await;
    assert_eq!(raw.get("completionHistory"), Some(&json!([{"date": "2024-05-14"}])));
    assert_eq!(raw.get("dailyCompletedCount"), Some(&json!(1)));
}

#[tokio::test(start_paused = true)]
async fn test_double_start_counts_once_per_second() {
    let (handle, _store, _clock) = spawn_fresh();

    handle.start().await.unwrap();
    handle.start().await.unwrap();
    sleep(Duration::from_millis(10_500)).await;

    let view = handle.get_state().await.unwrap();
    assert_eq!(view.seconds_remaining, 1490);
}

#[tokio::test(start_paused = true)]
async fn test_pause_freezes_and_start_resumes() {
    let (handle, _store, _clock) = spawn_fresh();

    handle.start().await.unwrap();
    sleep(Duration::from_millis(5_500)).await;
    let paused = handle.pause().await.unwrap();
    assert_eq!(paused.run_state, RunState::Paused);
    assert_eq!(paused.seconds_remaining, 1495);

    sleep(Duration::from_secs(30)).await;
    assert_eq!(handle.get_state().await.unwrap().seconds_remaining, 1495);

    let resumed = handle.start().await.unwrap();
    assert_eq!(resumed.seconds_remaining, 1495);
    sleep(Duration::from_millis(2_500)).await;
    assert_eq!(handle.get_state().await.unwrap().seconds_remaining, 1493);
}

#[tokio::test(start_paused = true)]
async fn test_pause_while_stopped_is_noop() {
    let (handle, store, _clock) = spawn_fresh();
    handle.get_state().await.unwrap();
    let before = store.snapshot().await;

    let view = handle.pause().await.unwrap();
    assert_eq!(view.run_state, RunState::Stopped);
    assert_eq!(store.snapshot().await, before);
}

#[tokio::test(start_paused = true)]
async fn test_reset_mid_break_returns_to_work() {
    let (handle, _store, _clock) = spawn_fresh();
    configure_minutes(&handle, 1, 5).await;

    handle.start().await.unwrap();
    sleep(Duration::from_millis(70_500)).await;
    assert_eq!(handle.get_state().await.unwrap().phase, Phase::Break);

    let view = handle.reset().await.unwrap();
    assert_eq!(view.phase, Phase::Work);
    assert_eq!(view.run_state, RunState::Stopped);
    assert_eq!(view.seconds_remaining, 60);

    // The cancelled driver no longer ticks
    sleep(Duration::from_secs(5)).await;
    assert_eq!(handle.get_state().await.unwrap().seconds_remaining, 60);
}

#[tokio::test(start_paused = true)]
async fn test_phases_alternate_and_only_work_is_counted() {
    let (handle, store, _clock) = spawn_fresh();
    configure_minutes(&handle, 1, 1).await;
    let mut events = handle.subscribe();

    handle.start().await.unwrap();
    // work ends at 60 s, break at 120 s, work again at 180 s
    sleep(Duration::from_millis(180_500)).await;

    let view = handle.get_state().await.unwrap();
    assert_eq!(view.phase, Phase::Break);
    assert_eq!(view.completed_pomodoros, 2);

    let raw = store.snapshot().await;
    assert_eq!(raw.get("completionHistory").and_then(|v| v.as_array()).map(Vec::len), Some(2));

    let mut completions = Vec::new();
    loop {
        match events.try_recv() {
            Ok(TimerEvent::PhaseCompleted { completion, .. }) => completions.push(completion.completed),
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    // Earlier completions may have been dropped by a lagging receiver
    assert_eq!(completions.last(), Some(&Phase::Work));
}

#[tokio::test(start_paused = true)]
async fn test_auto_switch_off_waits_for_start() {
    let (handle, _store, _clock) = spawn_fresh();
    handle
        .configure(SettingsUpdate {
            work_minutes: Some(json!(1)),
            auto_switch_enabled: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();

    handle.start().await.unwrap();
    sleep(Duration::from_millis(90_500)).await;

    let view = handle.get_state().await.unwrap();
    assert_eq!(view.phase, Phase::Break);
    assert_eq!(view.run_state, RunState::Stopped);
    assert_eq!(view.seconds_remaining, 300);
    assert_eq!(view.completed_pomodoros, 1);
}

// ============================================================================
// Restart Recovery
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_persisted_running_restores_as_stopped() {
    let store = MemoryStore::new();
    store.insert_raw("runState", json!("running")).await;
    store.insert_raw("phase", json!("work")).await;
    store.insert_raw("secondsRemaining", json!(754)).await;
    let clock = FixedClock::at_local_date(day(2024, 5, 14));

    let handle = spawn_on(&store, &clock);
    let view = handle.get_state().await.unwrap();
    assert_eq!(view.run_state, RunState::Stopped);
    assert_eq!(view.phase, Phase::Work);
    assert_eq!(view.seconds_remaining, 754);

    // Nothing counts down until the user starts again
    sleep(Duration::from_secs(10)).await;
    assert_eq!(handle.get_state().await.unwrap().seconds_remaining, 754);
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_timer_reloads_on_start() {
    let store = MemoryStore::new();
    store.insert_raw("runState", json!("stopped")).await;
    store.insert_raw("phase", json!("break")).await;
    store.insert_raw("secondsRemaining", json!(0)).await;
    let clock = FixedClock::at_local_date(day(2024, 5, 14));

    let handle = spawn_on(&store, &clock);
    let view = handle.start().await.unwrap();
    assert_eq!(view.phase, Phase::Break);
    assert_eq!(view.seconds_remaining, 300);
}

#[tokio::test(start_paused = true)]
async fn test_state_survives_daemon_restart() {
    let (handle, store, clock) = spawn_fresh();
    handle.start().await.unwrap();
    sleep(Duration::from_millis(12_500)).await;

    let events = handle.subscribe();
    drop(handle);
    wait_for_shutdown(events).await;

    let stored = store.snapshot().await.get("secondsRemaining").cloned();

    let handle = spawn_on(&store, &clock);
    let view = handle.get_state().await.unwrap();
    assert_eq!(view.run_state, RunState::Stopped);
    assert_eq!(Some(json!(view.seconds_remaining)), stored);
}

// ============================================================================
// Settings, Counter, Statistics
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_garbage_work_minutes_uses_default() {
    let (handle, _store, _clock) = spawn_fresh();

    let settings = handle
        .configure(SettingsUpdate {
            work_minutes: Some(json!("abc")),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(settings.durations.work_minutes, 25);
    assert_eq!(handle.get_state().await.unwrap().seconds_remaining, 1500);
}

#[tokio::test(start_paused = true)]
async fn test_settings_persist_across_restart() {
    let (handle, store, clock) = spawn_fresh();
    handle
        .configure(SettingsUpdate {
            work_minutes: Some(json!("45")),
            sound_enabled: Some(false),
            ..Default::default()
        })
        .await
        .unwrap();

    let events = handle.subscribe();
    drop(handle);
    wait_for_shutdown(events).await;

    let handle = spawn_on(&store, &clock);
    let settings = handle.get_settings().await.unwrap();
    assert_eq!(settings.durations.work_minutes, 45);
    assert!(!settings.sound_enabled);
    assert!(settings.notification_enabled);
    assert_eq!(handle.get_state().await.unwrap().seconds_remaining, 45 * 60);
}

#[tokio::test(start_paused = true)]
async fn test_counter_matches_ledger_after_day_change() {
    let store = MemoryStore::new();
    store
        .insert_raw(
            "completionHistory",
            json!([{"date": "2024-05-13"}, {"date": "2024-05-13"}, {"date": "2024-05-14"}]),
        )
        .await;
    store.insert_raw("dailyCompletedCount", json!(2)).await;
    store.insert_raw("lastResetDate", json!("2024-05-13")).await;
    let clock = FixedClock::at_local_date(day(2024, 5, 14));

    let handle = spawn_on(&store, &clock);
    assert_eq!(handle.get_state().await.unwrap().completed_pomodoros, 1);

    clock.set_local_date(day(2024, 5, 15));
    assert_eq!(handle.check_and_reset().await.unwrap(), 0);

    // The ledger is never truncated
    let raw = store.snapshot().await;
    assert_eq!(raw.get("completionHistory").and_then(|v| v.as_array()).map(Vec::len), Some(3));
    assert_eq!(raw.get("lastResetDate"), Some(&json!("2024-05-15")));
}

#[tokio::test(start_paused = true)]
async fn test_stats_have_fixed_bucket_counts() {
    let (handle, store, _clock) = spawn_fresh();
    store
        .insert_raw(
            "completionHistory",
            json!([{"date": "2024-05-14"}, {"date": "2024-05-01"}, {"date": "2023-05-31"}, {"date": "garbage"}]),
        )
        .await;

    let stats = handle.get_stats().await.unwrap();
    assert_eq!(stats.daily.len(), DAILY_BUCKETS);
    assert_eq!(stats.weekly.len(), WEEKLY_BUCKETS);
    assert_eq!(stats.monthly.len(), MONTHLY_BUCKETS);

    assert_eq!(stats.daily.labels.last().map(String::as_str), Some("05-14"));
    assert_eq!(stats.daily.total(), 2);
    // May 2023 is outside the rolling twelve months ending May 2024
    assert_eq!(stats.monthly.total(), 2);
}

// ============================================================================
// Persistence Failures
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_write_failures_do_not_stop_the_countdown() {
    let (handle, store, _clock) = spawn_fresh();
    handle.get_state().await.unwrap();
    store.set_fail_writes(true);

    handle.start().await.unwrap();
    sleep(Duration::from_millis(3_500)).await;

    let view = handle.get_state().await.unwrap();
    assert_eq!(view.run_state, RunState::Running);
    assert_eq!(view.seconds_remaining, 1497);
    assert_eq!(store.snapshot().await.get("runState"), Some(&json!("stopped")));

    store.set_fail_writes(false);
    sleep(Duration::from_secs(1)).await;
    assert_eq!(store.snapshot().await.get("secondsRemaining"), Some(&json!(1496)));
}

#[tokio::test(start_paused = true)]
async fn test_corrupt_snapshot_during_tick_pauses_timer() {
    let (handle, store, _clock) = spawn_fresh();
    let mut events = handle.subscribe();

    handle.start().await.unwrap();
    sleep(Duration::from_millis(2_500)).await;
    store.insert_raw("phase", json!(42)).await;
    sleep(Duration::from_secs(1)).await;

    let mut halted = false;
    loop {
        match events.try_recv() {
            Ok(TimerEvent::Halted { .. }) => halted = true,
            Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    assert!(halted);

    let view = handle.get_state().await.unwrap();
    assert_eq!(view.run_state, RunState::Paused);
    assert_eq!(view.seconds_remaining, 1498);

    // No further ticks until the user starts again
    sleep(Duration::from_secs(5)).await;
    assert_eq!(handle.get_state().await.unwrap().seconds_remaining, 1498);
}
