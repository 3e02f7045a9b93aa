//! Integration tests for the tick scheduler.
//!
//! Every async test runs on a paused clock: `sleep_until` resolves as soon
//! as the runtime is idle, and `time::advance` simulates slow tick work.

use std::time::Duration;

use hearth_tick::{TickConfig, TickPolicy, TickScheduler};
use tokio::time;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

// =========================================================================
// TickConfig
// =========================================================================

#[test]
fn test_default_config_is_event_driven() {
    let cfg = TickConfig::default();
    assert_eq!(cfg.tick_rate_hz, 0);
    assert_eq!(cfg.period(), None);
    assert_eq!(cfg.policy, TickPolicy::Skip);
}

#[test]
fn test_with_rate_sets_period() {
    assert_eq!(TickConfig::with_rate(20).period(), Some(ms(50)));
}

#[test]
fn test_validated_clamps_rate_and_threshold() {
    let cfg = TickConfig {
        tick_rate_hz: 1_000,
        budget_warn_threshold: 3.0,
        ..TickConfig::default()
    }
    .validated();

    assert_eq!(cfg.tick_rate_hz, TickConfig::MAX_TICK_RATE_HZ);
    assert_eq!(cfg.budget_warn_threshold, 1.0);
}

#[test]
fn test_tick_policy_reads_snake_case_names() {
    let skip: TickPolicy = serde_json::from_str(r#""skip""#).unwrap();
    let drop: TickPolicy = serde_json::from_str(r#""drop""#).unwrap();

    assert_eq!(skip, TickPolicy::Skip);
    assert_eq!(drop, TickPolicy::Drop);
    assert!(serde_json::from_str::<TickPolicy>(r#""catch_up""#).is_err());
}

// =========================================================================
// Construction
// =========================================================================

#[test]
fn test_scheduler_initial_state() {
    let s = TickScheduler::with_rate(30);

    assert_eq!(s.tick_count(), 0);
    assert_eq!(s.tick_rate_hz(), 30);
    assert!(!s.is_event_driven());
    assert_eq!(s.metrics().total_ticks, 0);
}

#[test]
fn test_scheduler_zero_rate_is_event_driven() {
    let s = TickScheduler::with_rate(0);
    assert!(s.is_event_driven());
    assert_eq!(s.period(), None);
}

// =========================================================================
// Firing
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_wait_for_tick_fires_after_one_period() {
    let start = time::Instant::now();
    let mut s = TickScheduler::with_rate(20);

    let info = s.wait_for_tick().await;

    assert_eq!(info.tick, 1);
    assert_eq!(info.dt, ms(50));
    assert!(!info.overrun);
    assert_eq!(time::Instant::now() - start, ms(50));
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_tick_counts_monotonically() {
    let mut s = TickScheduler::with_rate(20);

    for expected in 1..=5 {
        assert_eq!(s.wait_for_tick().await.tick, expected);
    }
    assert_eq!(s.tick_count(), 5);
    assert_eq!(s.metrics().total_ticks, 5);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_tick_event_driven_never_fires() {
    let mut s = TickScheduler::with_rate(0);

    let result = time::timeout(Duration::from_secs(5), s.wait_for_tick()).await;

    assert!(result.is_err());
    assert_eq!(s.tick_count(), 0);
}

// =========================================================================
// Overrun policies
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_skip_policy_skips_missed_periods() {
    let mut s = TickScheduler::with_rate(20);
    s.wait_for_tick().await;

    time::advance(ms(120)).await;
    let late = s.wait_for_tick().await;

    assert!(late.overrun);
    assert_eq!(late.ticks_skipped, 1);

    let before = time::Instant::now();
    let next = s.wait_for_tick().await;
    assert!(!next.overrun);
    assert_eq!(time::Instant::now() - before, ms(50));
    assert_eq!(s.metrics().total_overruns, 1);
    assert_eq!(s.metrics().total_skipped, 1);
}

#[tokio::test(start_paused = true)]
async fn test_drop_policy_keeps_original_cadence() {
    let mut s = TickScheduler::new(TickConfig {
        policy: TickPolicy::Drop,
        ..TickConfig::with_rate(20)
    });
    s.wait_for_tick().await;

    time::advance(ms(120)).await;
    let second = s.wait_for_tick().await;
    let third = s.wait_for_tick().await;

    assert!(second.overrun);
    assert_eq!(second.ticks_skipped, 0);
    assert!(third.overrun, "deadline at 150ms already passed at 170ms");

    let fourth = s.wait_for_tick().await;
    assert!(!fourth.overrun);
}

// =========================================================================
// Budget monitoring
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_flags_slow_work() {
    let mut s = TickScheduler::with_rate(20);
    s.wait_for_tick().await;

    time::advance(ms(45)).await;
    s.record_tick_end();

    let m = s.metrics();
    assert_eq!(m.budget_warnings, 1);
    assert!((m.budget_utilization - 0.9).abs() < 1e-6);
    assert_eq!(m.max_tick_time, ms(45));
}

#[tokio::test(start_paused = true)]
async fn test_record_tick_end_fast_work_is_not_flagged() {
    let mut s = TickScheduler::with_rate(20);
    s.wait_for_tick().await;

    time::advance(ms(5)).await;
    s.record_tick_end();

    assert_eq!(s.metrics().budget_warnings, 0);
    assert_eq!(s.metrics().avg_tick_time, ms(5));
}

#[test]
fn test_record_tick_end_without_tick_is_noop() {
    let mut s = TickScheduler::with_rate(20);
    s.record_tick_end();
    assert_eq!(s.metrics().max_tick_time, Duration::ZERO);
}

// =========================================================================
// Metrics switch
// =========================================================================

#[tokio::test(start_paused = true)]
async fn test_metrics_disabled_leaves_counters_at_zero() {
    let mut s = TickScheduler::new(TickConfig {
        tick_rate_hz: 20,
        metrics_enabled: false,
        ..TickConfig::default()
    });

    s.wait_for_tick().await;
    time::advance(ms(45)).await;
    s.record_tick_end();

    assert_eq!(s.tick_count(), 1);
    assert_eq!(s.metrics().total_ticks, 0);
    assert_eq!(s.metrics().budget_warnings, 0);
    assert_eq!(s.metrics().max_tick_time, Duration::ZERO);
}
