//! Time sources.
//!
//! Timing-sensitive logic (the prober's requeue sweep in particular) takes
//! a [`Clock`] so tests can drive it deterministically instead of sleeping.

use std::sync::Mutex;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Source of both monotonic and wall-clock time.
pub trait Clock: Send + Sync {
    fn now_instant(&self) -> Instant;
    /// Wall clock as UNIX seconds.
    fn now_unix(&self) -> f64;
}

/// The real clocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_instant(&self) -> Instant {
        Instant::now()
    }

    fn now_unix(&self) -> f64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0)
    }
}

/// A manually advanced clock for deterministic tests.
#[derive(Debug)]
pub struct ManualClock {
    instant: Mutex<Instant>,
    unix: Mutex<f64>,
}

impl ManualClock {
    pub fn new(instant: Instant, unix: f64) -> Self {
        Self {
            instant: Mutex::new(instant),
            unix: Mutex::new(unix),
        }
    }

    pub fn advance(&self, duration: Duration) {
        *self.instant.lock().unwrap() += duration;
        *self.unix.lock().unwrap() += duration.as_secs_f64();
    }
}

impl Clock for ManualClock {
    fn now_instant(&self) -> Instant {
        *self.instant.lock().unwrap()
    }

    fn now_unix(&self) -> f64 {
        *self.unix.lock().unwrap()
    }
}
