//! Fixed-timestep scheduler for Hearth's authoritative tick.
//!
//! The server's tick loop owns all shared state. Each tick it drains the
//! inbound queue and applies every queued message in order; this crate only
//! decides *when* that happens and reports how long it took.
//!
//! # Event-driven mode
//!
//! With `tick_rate_hz == 0` there is no fixed cadence:
//! [`TickScheduler::wait_for_tick`] never resolves and the server applies
//! each message as soon as it is dequeued.
//!
//! # Integration
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         _ = scheduler.wait_for_tick() => {
//!             while let Ok(event) = inbound.try_recv() {
//!                 dispatcher.apply(event);
//!             }
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```
//!
//! All timing uses `tokio::time::Instant`, so tests can drive the scheduler
//! with a paused clock.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do when the tick loop wakes up later than scheduled.
///
/// Serialized in `snake_case`, so a config file says `"tick_policy": "drop"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TickPolicy {
    /// Forget the missed deadlines and schedule the next tick one period
    /// from now.
    #[default]
    Skip,
    /// Keep the original cadence: the next deadline is one period after the
    /// missed one, even if that is already in the past.
    Drop,
}

/// Scheduler settings.
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Ticks per second. 0 selects event-driven mode.
    pub tick_rate_hz: u32,
    pub policy: TickPolicy,
    /// Fraction of the tick period (0.0–1.0) above which a tick's work is
    /// logged as a warning.
    pub budget_warn_threshold: f64,
    pub metrics_enabled: bool,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: 0,
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.80,
            metrics_enabled: true,
        }
    }
}

impl TickConfig {
    pub const MAX_TICK_RATE_HZ: u32 = 128;

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self {
            tick_rate_hz,
            ..Default::default()
        }
    }

    /// Caps the rate at [`Self::MAX_TICK_RATE_HZ`] and clamps the warn
    /// threshold into `0.0..=1.0`.
    pub fn validated(mut self) -> Self {
        if self.tick_rate_hz > Self::MAX_TICK_RATE_HZ {
            warn!(
                rate = self.tick_rate_hz,
                max = Self::MAX_TICK_RATE_HZ,
                "tick rate too high, clamping"
            );
            self.tick_rate_hz = Self::MAX_TICK_RATE_HZ;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }

    /// Length of one tick, `None` in event-driven mode.
    pub fn period(&self) -> Option<Duration> {
        (self.tick_rate_hz != 0)
            .then(|| Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz)))
    }
}

// ---------------------------------------------------------------------------
// Per-tick report and metrics
// ---------------------------------------------------------------------------

/// Returned by [`TickScheduler::wait_for_tick`] each time a tick fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickInfo {
    /// Starts at 1.
    pub tick: u64,
    /// Always the configured period.
    pub dt: Duration,
    /// The tick fired more than a tenth of a period late.
    pub overrun: bool,
    /// Whole periods skipped under [`TickPolicy::Skip`].
    pub ticks_skipped: u64,
}

/// Counters kept while `metrics_enabled` is set.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Exponential moving average of work time, α = 0.1.
    pub avg_tick_time: Duration,
    pub max_tick_time: Duration,
    /// Work time of the last tick over the period. Above 1.0 is an overrun.
    pub budget_utilization: f64,
    /// Ticks whose work crossed the warn threshold.
    pub budget_warnings: u64,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Fixed-timestep scheduler driving the server's tick loop.
#[derive(Debug)]
pub struct TickScheduler {
    config: TickConfig,
    period: Option<Duration>,
    tick_count: u64,
    next_tick: Option<Instant>,
    /// Set when a tick fires, taken by `record_tick_end`.
    work_started: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// The first tick is due one period after construction.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        let period = config.period();
        let next_tick = period.map(|p| Instant::now() + p);

        match period {
            None => debug!("tick scheduler in event-driven mode"),
            Some(p) => debug!(
                rate_hz = config.tick_rate_hz,
                period_ms = p.as_secs_f64() * 1000.0,
                policy = ?config.policy,
                "tick scheduler created"
            ),
        }

        Self {
            config,
            period,
            tick_count: 0,
            next_tick,
            work_started: None,
            metrics: TickMetrics::default(),
        }
    }

    pub fn with_rate(tick_rate_hz: u32) -> Self {
        Self::new(TickConfig::with_rate(tick_rate_hz))
    }

    /// Sleeps until the next tick is due.
    ///
    /// Never resolves in event-driven mode, which makes it safe to use as
    /// one branch of a `tokio::select!`.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let (deadline, period) = match (self.next_tick, self.period) {
            (Some(deadline), Some(period)) => (deadline, period),
            _ => std::future::pending().await,
        };

        time::sleep_until(deadline).await;

        let now = Instant::now();
        self.tick_count += 1;
        self.work_started = Some(now);

        let late_by = now.saturating_duration_since(deadline);
        let overrun = late_by > period / 10;
        let mut ticks_skipped = 0;

        let next = match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    ticks_skipped = (late_by.as_nanos() / period.as_nanos()) as u64;
                    if ticks_skipped > 0 {
                        warn!(
                            tick = self.tick_count,
                            skipped = ticks_skipped,
                            late_ms = late_by.as_secs_f64() * 1000.0,
                            "tick late, skipping ahead"
                        );
                    }
                }
                now + period
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick late, keeping cadence"
                    );
                }
                deadline + period
            }
        };
        self.next_tick = Some(next);

        if self.config.metrics_enabled {
            self.metrics.total_ticks += 1;
            self.metrics.total_skipped += ticks_skipped;
            if overrun {
                self.metrics.total_overruns += 1;
            }
        }

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: period,
            overrun,
            ticks_skipped,
        }
    }

    /// Marks the end of the current tick's work.
    ///
    /// Feeds the budget check and the timing metrics. A call without a
    /// preceding tick does nothing.
    pub fn record_tick_end(&mut self) {
        let Some(started) = self.work_started.take() else {
            return;
        };
        let Some(period) = self.period else {
            return;
        };
        let elapsed = started.elapsed();
        let utilization = elapsed.as_secs_f64() / period.as_secs_f64();
        let over_budget = utilization >= self.config.budget_warn_threshold;

        if over_budget {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                period_ms = period.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "tick work near or over budget"
            );
        }

        if !self.config.metrics_enabled {
            return;
        }
        let m = &mut self.metrics;
        m.budget_utilization = utilization;
        if over_budget {
            m.budget_warnings += 1;
        }
        m.max_tick_time = m.max_tick_time.max(elapsed);
        m.avg_tick_time = if m.total_ticks <= 1 {
            elapsed
        } else {
            Duration::from_secs_f64(
                m.avg_tick_time.as_secs_f64() * 0.9 + elapsed.as_secs_f64() * 0.1,
            )
        };
    }

    pub fn is_event_driven(&self) -> bool {
        self.period.is_none()
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }

    pub fn tick_rate_hz(&self) -> u32 {
        self.config.tick_rate_hz
    }

    pub fn period(&self) -> Option<Duration> {
        self.period
    }
}
