//! Fixed-interval tick scheduler for Hackbox round timers.
//!
//! A room only ticks while a round is running, so the scheduler is created
//! stopped and armed with [`TickScheduler::start`] when a round begins.
//! [`TickScheduler::stop`] disarms it; the return value tells the caller
//! whether this call is the one that observed the stop.
//!
//! # Integration
//!
//! The scheduler sits inside a room actor's `tokio::select!` loop. While it
//! is stopped, [`TickScheduler::wait_for_tick`] pends forever, so the loop
//! only ever wakes up for commands:
//!
//! ```ignore
//! loop {
//!     tokio::select! {
//!         Some(cmd) = cmd_rx.recv() => { /* handle commands */ }
//!         tick = scheduler.wait_for_tick() => {
//!             room.tick();
//!             scheduler.record_tick_end();
//!         }
//!     }
//! }
//! ```

use std::time::{Duration, Instant};

use rand::Rng;
use tokio::time::{self, Instant as TokioInstant};
use tracing::{debug, trace, warn};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// What to do after waking up late for a tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TickPolicy {
    /// Schedule the next tick one interval from now and report how many
    /// ticks were missed.
    #[default]
    Skip,
    /// Keep the original cadence; the next deadline may already be due.
    Drop,
}

/// Configuration for a [`TickScheduler`].
#[derive(Debug, Clone)]
pub struct TickConfig {
    /// Wall-clock time between ticks. Must be non-zero.
    pub interval: Duration,
    pub policy: TickPolicy,
    /// Fraction of `interval` (0.0–1.0) that tick work may take before a
    /// warning is logged by [`TickScheduler::record_tick_end`].
    pub budget_warn_threshold: f64,
    /// Upper bound of a random delay added before the first tick after
    /// each [`TickScheduler::start`]. Zero disables it.
    pub initial_jitter: Duration,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(500),
            policy: TickPolicy::default(),
            budget_warn_threshold: 0.80,
            initial_jitter: Duration::ZERO,
        }
    }
}

impl TickConfig {
    /// Shortest interval the scheduler accepts.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1);

    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Clamps out-of-range values. Called by [`TickScheduler::new`].
    pub fn validated(mut self) -> Self {
        if self.interval < Self::MIN_INTERVAL {
            warn!(
                interval_ms = self.interval.as_secs_f64() * 1000.0,
                "tick interval below minimum, clamping"
            );
            self.interval = Self::MIN_INTERVAL;
        }
        self.budget_warn_threshold = self.budget_warn_threshold.clamp(0.0, 1.0);
        self
    }
}

// ---------------------------------------------------------------------------
// Tick info and metrics
// ---------------------------------------------------------------------------

/// Returned by [`TickScheduler::wait_for_tick`] for every tick that fires.
#[derive(Debug, Clone)]
pub struct TickInfo {
    /// Tick number since the last `start`, starting at 1.
    pub tick: u64,
    /// Fixed interval; use this rather than measured elapsed time.
    pub dt: Duration,
    /// The tick fired more than 10% of an interval late.
    pub overrun: bool,
    /// Whole intervals that passed without a tick (`Skip` policy only).
    pub ticks_skipped: u64,
}

/// Counters kept across every run of a scheduler.
#[derive(Debug, Clone, Default)]
pub struct TickMetrics {
    pub total_ticks: u64,
    pub total_overruns: u64,
    pub total_skipped: u64,
    /// Longest tick work measured by `record_tick_end`.
    pub max_tick_time: Duration,
}

// ---------------------------------------------------------------------------
// Scheduler
// ---------------------------------------------------------------------------

/// Start/stop fixed-interval tick scheduler. One per room.
pub struct TickScheduler {
    config: TickConfig,
    tick_count: u64,
    /// `Some` while running.
    next_tick: Option<TokioInstant>,
    tick_start: Option<Instant>,
    metrics: TickMetrics,
}

impl TickScheduler {
    /// Creates a stopped scheduler.
    pub fn new(config: TickConfig) -> Self {
        let config = config.validated();
        debug!(
            interval_ms = config.interval.as_secs_f64() * 1000.0,
            policy = ?config.policy,
            "tick scheduler created"
        );
        Self {
            config,
            tick_count: 0,
            next_tick: None,
            tick_start: None,
            metrics: TickMetrics::default(),
        }
    }

    pub fn with_interval(interval: Duration) -> Self {
        Self::new(TickConfig::with_interval(interval))
    }

    /// Arms the scheduler. The first tick fires one interval (plus jitter)
    /// from now and the tick counter restarts at zero.
    ///
    /// Calling `start` on a running scheduler restarts its schedule.
    pub fn start(&mut self) {
        let jitter = if self.config.initial_jitter.is_zero() {
            Duration::ZERO
        } else {
            let max_us = self.config.initial_jitter.as_micros() as u64;
            Duration::from_micros(rand::rng().random_range(0..max_us.max(1)))
        };
        self.tick_count = 0;
        self.tick_start = None;
        self.next_tick = Some(TokioInstant::now() + self.config.interval + jitter);
        debug!("tick scheduler started");
    }

    /// Disarms the scheduler.
    ///
    /// Returns `true` if it was running, so exactly one caller observes any
    /// given stop.
    pub fn stop(&mut self) -> bool {
        let was_running = self.next_tick.take().is_some();
        if was_running {
            debug!(ticks = self.tick_count, "tick scheduler stopped");
        }
        was_running
    }

    /// Waits until the next tick is due.
    ///
    /// Pends forever while stopped. Cancel-safe: dropping the future before
    /// the deadline leaves the scheduler untouched.
    pub async fn wait_for_tick(&mut self) -> TickInfo {
        let Some(next) = self.next_tick else {
            return std::future::pending().await;
        };
        let interval = self.config.interval;

        time::sleep_until(next).await;

        let now = TokioInstant::now();
        self.tick_count += 1;
        self.tick_start = Some(Instant::now());

        let late_by = now.saturating_duration_since(next);
        let overrun = late_by > interval / 10;
        let mut ticks_skipped = 0;

        self.next_tick = Some(match self.config.policy {
            TickPolicy::Skip => {
                if overrun {
                    ticks_skipped = (late_by.as_nanos() / interval.as_nanos()) as u64;
                    if ticks_skipped > 0 {
                        warn!(
                            tick = self.tick_count,
                            skipped = ticks_skipped,
                            late_ms = late_by.as_secs_f64() * 1000.0,
                            "tick overrun, skipping ahead"
                        );
                    }
                }
                now + interval
            }
            TickPolicy::Drop => {
                if overrun {
                    warn!(
                        tick = self.tick_count,
                        late_ms = late_by.as_secs_f64() * 1000.0,
                        "tick overrun, keeping cadence"
                    );
                }
                next + interval
            }
        });

        if overrun {
            self.metrics.total_overruns += 1;
        }
        self.metrics.total_skipped += ticks_skipped;
        self.metrics.total_ticks += 1;

        trace!(tick = self.tick_count, overrun, "tick fired");

        TickInfo {
            tick: self.tick_count,
            dt: interval,
            overrun,
            ticks_skipped,
        }
    }

    /// Marks the end of the work done for the current tick.
    pub fn record_tick_end(&mut self) {
        let Some(start) = self.tick_start.take() else {
            return;
        };
        let elapsed = start.elapsed();
        let utilization = elapsed.as_secs_f64() / self.config.interval.as_secs_f64();

        if utilization >= self.config.budget_warn_threshold {
            warn!(
                tick = self.tick_count,
                elapsed_ms = elapsed.as_secs_f64() * 1000.0,
                budget_ms = self.config.interval.as_secs_f64() * 1000.0,
                utilization_pct = format!("{:.1}", utilization * 100.0),
                "tick approaching budget limit"
            );
        }
        if elapsed > self.metrics.max_tick_time {
            self.metrics.max_tick_time = elapsed;
        }
    }

    pub fn is_running(&self) -> bool {
        self.next_tick.is_some()
    }

    /// Ticks fired since the last `start`.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    pub fn metrics(&self) -> &TickMetrics {
        &self.metrics
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_half_second() {
        let cfg = TickConfig::default();
        assert_eq!(cfg.interval, Duration::from_millis(500));
        assert_eq!(cfg.policy, TickPolicy::Skip);
        assert!(cfg.initial_jitter.is_zero());
    }

    #[test]
    fn test_validated_clamps_zero_interval_and_threshold() {
        let cfg = TickConfig {
            interval: Duration::ZERO,
            budget_warn_threshold: 3.0,
            ..TickConfig::default()
        }
        .validated();
        assert_eq!(cfg.interval, TickConfig::MIN_INTERVAL);
        assert_eq!(cfg.budget_warn_threshold, 1.0);
    }

    #[test]
    fn test_record_tick_end_without_tick_is_noop() {
        let mut s = TickScheduler::with_interval(Duration::from_millis(10));
        s.record_tick_end();
        assert_eq!(s.metrics().max_tick_time, Duration::ZERO);
    }
}
