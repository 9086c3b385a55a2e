//! Interval progress, composed into anything that works in cycles.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    /// Seconds per cycle
    pub interval: f32,
    #[serde(default)]
    pub elapsed: f32,
}

impl Progress {
    pub fn new(interval: f32) -> Self {
        debug_assert!(interval >= 0.0, "negative progress interval");
        Self {
            interval: interval.max(0.0),
            elapsed: 0.0,
        }
    }

    /// Advance and report whether the cycle is complete. Elapsed time stops at the interval.
    pub fn advance(&mut self, delta_seconds: f32) -> bool {
        self.elapsed = (self.elapsed + delta_seconds.max(0.0)).min(self.interval);
        self.is_done()
    }

    pub fn is_done(&self) -> bool {
        self.elapsed >= self.interval
    }

    /// Completion in [0, 1]
    pub fn ratio(&self) -> f32 {
        if self.interval > 0.0 {
            self.elapsed / self.interval
        } else {
            1.0
        }
    }

    pub fn reset(&mut self) {
        self.elapsed = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_cycle() {
        let mut progress = Progress::new(3.0);
        assert!(!progress.advance(1.0));
        assert!((progress.ratio() - 1.0 / 3.0).abs() < 0.001);
        assert!(!progress.advance(1.0));
        assert!(progress.advance(5.0));
        assert_eq!(progress.elapsed, 3.0);

        progress.reset();
        assert_eq!(progress.ratio(), 0.0);
    }

    #[test]
    fn test_zero_interval_is_done() {
        let progress = Progress::new(0.0);
        assert!(progress.is_done());
        assert_eq!(progress.ratio(), 1.0);
    }
}
