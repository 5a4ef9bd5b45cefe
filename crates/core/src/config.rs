// crates/core/src/config.rs
//! Tracker configuration knobs and their derived durations.

use std::time::Duration;

/// Tunable timing parameters for the job tracker.
///
/// The defaults mirror the production values: a 2-hour retention window
/// (which is also the remote-cache TTL), 2-second progress ticks, a 1-second
/// broadcaster poll, and a 60x demo compression of planned stage durations.
#[derive(Debug, Clone)]
pub struct TrackerConfig {
    /// Eviction age for status records, and the remote backend's TTL.
    pub retention_hours: u64,
    /// Nominal progress-update granularity, before speed compression.
    pub tick_ms: u64,
    /// Broadcaster poll cadence.
    pub poll_secs: u64,
    /// Planned stage durations (and the tick interval) are divided by this
    /// factor so a nominal 30-minute job runs in ~30 seconds for demos.
    pub speed_multiplier: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            retention_hours: 2,
            tick_ms: 2000,
            poll_secs: 1,
            speed_multiplier: 60.0,
        }
    }
}

impl TrackerConfig {
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_hours * 3600)
    }

    /// Remote-cache TTL in seconds; identical to the retention window.
    pub fn ttl_secs(&self) -> u64 {
        self.retention_hours * 3600
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_secs.max(1))
    }

    /// Wall-clock tick interval after speed compression.
    pub fn scaled_tick(&self) -> Duration {
        Duration::from_millis(self.tick_ms.max(1)).div_f64(self.speed())
    }

    /// Compress a nominal planned duration by the speed multiplier.
    pub fn scale(&self, nominal: Duration) -> Duration {
        nominal.div_f64(self.speed())
    }

    fn speed(&self) -> f64 {
        if self.speed_multiplier >= 1.0 {
            self.speed_multiplier
        } else {
            1.0
        }
    }
}
