// src/engine/clock.rs

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::project::ProjectId;

/// Wall time from first start to last stop, plus accumulated running time.
///
/// Starts may nest: steps of one project can run at the same time. Running
/// time counts the spans during which at least one of them was active.
#[derive(Debug, Clone, Default)]
pub struct Clock {
    start: Option<Instant>,
    resumed: Option<Instant>,
    end: Option<Instant>,
    exec: Duration,
    running: usize,
}

impl Clock {
    pub fn start(&mut self) {
        let now = Instant::now();
        if self.start.is_none() {
            self.start = Some(now);
        }
        if self.running == 0 {
            self.resumed = Some(now);
        }
        self.running += 1;
    }

    pub fn stop(&mut self) {
        let now = Instant::now();
        self.end = Some(now);
        self.running = self.running.saturating_sub(1);
        if self.running > 0 {
            return;
        }
        if let Some(resumed) = self.resumed.take() {
            self.exec += now.saturating_duration_since(resumed);
        }
    }

    pub fn wall_time(&self) -> Duration {
        match (self.start, self.end) {
            (Some(start), Some(end)) => end.saturating_duration_since(start),
            _ => Duration::ZERO,
        }
    }

    pub fn exec_time(&self) -> Duration {
        self.exec
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ClockKey {
    Global,
    Project(ProjectId),
}

/// Clocks keyed by project, plus one global clock.
#[derive(Debug, Default)]
pub struct Clocks {
    clocks: Mutex<HashMap<ClockKey, Clock>>,
}

impl Clocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&self, key: ClockKey) {
        self.clocks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .start();
    }

    pub fn stop(&self, key: ClockKey) {
        self.clocks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(key)
            .or_default()
            .stop();
    }

    /// `(wall_time, exec_time)` for `key`; zero if never started.
    pub fn times(&self, key: &ClockKey) -> (Duration, Duration) {
        self.clocks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .map(|c| (c.wall_time(), c.exec_time()))
            .unwrap_or_default()
    }
}
