//! Per-step countdown timer.
//!
//! Driven externally: the front-end calls [`MicroTimer::tick`] once a second.
//! A new timer is created for every step, so nothing carries over between
//! steps.

/// Countdown for the active step.
#[derive(Debug, Clone, PartialEq)]
pub struct MicroTimer {
    total_secs: u32,
    remaining_secs: u32,
    running: bool,
    finished: bool,
}

impl MicroTimer {
    /// Timer for a step estimated at `minutes` (fractional allowed, at least 1s).
    pub fn new(minutes: f64) -> Self {
        let secs = if minutes.is_finite() && minutes > 0.0 {
            (minutes * 60.0).round().clamp(1.0, u32::MAX as f64) as u32
        } else {
            1
        };
        Self {
            total_secs: secs,
            remaining_secs: secs,
            running: false,
            finished: false,
        }
    }

    /// Start or pause. No-op once finished.
    pub fn toggle(&mut self) {
        if !self.finished {
            self.running = !self.running;
        }
    }

    /// Advance one second. Returns `true` on the tick that finishes the timer.
    pub fn tick(&mut self) -> bool {
        if !self.running || self.finished {
            return false;
        }
        self.remaining_secs = self.remaining_secs.saturating_sub(1);
        if self.remaining_secs == 0 {
            self.running = false;
            self.finished = true;
            return true;
        }
        false
    }

    /// Back to the full duration, paused.
    pub fn reset(&mut self) {
        self.remaining_secs = self.total_secs;
        self.running = false;
        self.finished = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn total_secs(&self) -> u32 {
        self.total_secs
    }

    pub fn remaining_secs(&self) -> u32 {
        self.remaining_secs
    }

    /// Share of time left, 1.0 → 0.0 (drives the progress ring).
    pub fn fraction_remaining(&self) -> f64 {
        self.remaining_secs as f64 / self.total_secs as f64
    }

    /// `m:ss`
    pub fn display(&self) -> String {
        format!("{}:{:02}", self.remaining_secs / 60, self.remaining_secs % 60)
    }
}
