use std::cell::Cell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::warn;
use serde::Serialize;

/// Monotonic time in milliseconds.
pub trait Clock {
    fn now_ms(&self) -> f64;
}

/// `performance.now()`, the same timeline `requestAnimationFrame` uses.
#[cfg(target_arch = "wasm32")]
pub struct PerformanceClock {
    performance: web_sys::Performance,
}

#[cfg(target_arch = "wasm32")]
impl PerformanceClock {
    pub fn new() -> Option<Self> {
        let performance = web_sys::window()?.performance()?;
        Some(Self { performance })
    }
}

#[cfg(target_arch = "wasm32")]
impl Clock for PerformanceClock {
    fn now_ms(&self) -> f64 {
        self.performance.now()
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub struct SystemClock {
    start: std::time::Instant,
}

#[cfg(not(target_arch = "wasm32"))]
impl SystemClock {
    pub fn new() -> Self {
        Self {
            start: std::time::Instant::now(),
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl Clock for SystemClock {
    fn now_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

/// Hand-advanced clock for fixed-tick hosts and tests. Clones share time.
#[derive(Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<f64>>,
}

impl ManualClock {
    pub fn new(start_ms: f64) -> Self {
        Self {
            now: Rc::new(Cell::new(start_ms)),
        }
    }

    pub fn set(&self, ms: f64) {
        self.now.set(ms);
    }

    pub fn advance(&self, ms: f64) {
        self.now.set(self.now.get() + ms);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> f64 {
        self.now.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSnapshot {
    pub fps: f64,
    pub frame_time_ms: f64,
    pub min_frame_time: f64,
    pub max_frame_time: f64,
    pub frame_count: u32,
    pub throttled_count: u32,
}

/// Rolling one-second window over rendered frames.
#[derive(Debug, Clone, Default)]
pub struct FrameStats {
    frame_times: VecDeque<(f64, f64)>, // (timestamp, interval since previous frame) in ms
    last_frame: Option<f64>,
    total_frames: u32,
    throttled: u32,
}

impl FrameStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_frame(&mut self, now: f64) {
        if let Some(last) = self.last_frame {
            self.frame_times.push_back((now, now - last));
        }
        self.last_frame = Some(now);
        self.total_frames += 1;

        let one_second_ago = now - 1000.0;
        while let Some(&(timestamp, _)) = self.frame_times.front() {
            if timestamp < one_second_ago {
                self.frame_times.pop_front();
            } else {
                break;
            }
        }
    }

    pub fn record_throttled(&mut self) {
        self.throttled += 1;
    }

    pub fn snapshot(&self) -> FrameSnapshot {
        if self.frame_times.is_empty() {
            return FrameSnapshot {
                fps: 0.0,
                frame_time_ms: 0.0,
                min_frame_time: 0.0,
                max_frame_time: 0.0,
                frame_count: self.total_frames,
                throttled_count: self.throttled,
            };
        }
        let window = self.frame_times.len() as f64;
        let durations = self.frame_times.iter().map(|(_, d)| *d);
        FrameSnapshot {
            fps: window,
            frame_time_ms: durations.clone().sum::<f64>() / window,
            min_frame_time: durations.clone().fold(f64::INFINITY, f64::min),
            max_frame_time: durations.fold(0.0f64, f64::max),
            frame_count: self.total_frames,
            throttled_count: self.throttled,
        }
    }
}

/// Logs a warning when `operation` blew its latency budget.
pub fn warn_if_slow(operation: &str, id: &str, elapsed_ms: f64, budget_ms: f64) -> bool {
    let slow = elapsed_ms > budget_ms;
    if slow {
        warn!("{operation} for viewer {id} took {elapsed_ms:.1} ms (budget {budget_ms:.0} ms)");
    }
    slow
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_keeps_last_second() {
        let mut stats = FrameStats::new();
        for i in 0..120 {
            stats.record_frame(i as f64 * 16.0);
        }
        let snap = stats.snapshot();
        assert_eq!(snap.frame_count, 120);
        assert!((60.0..=64.0).contains(&snap.fps), "fps {}", snap.fps);
        assert!((snap.frame_time_ms - 16.0).abs() < 1e-9);
    }

    #[test]
    fn empty_snapshot_is_zeroed() {
        let mut stats = FrameStats::new();
        stats.record_throttled();
        let snap = stats.snapshot();
        assert_eq!(snap.fps, 0.0);
        assert_eq!(snap.throttled_count, 1);
    }

    #[test]
    fn manual_clock_is_shared() {
        let clock = ManualClock::new(10.0);
        let other = clock.clone();
        clock.advance(5.0);
        assert_eq!(other.now_ms(), 15.0);
    }

    #[test]
    fn slow_operations_are_flagged() {
        assert!(warn_if_slow("create", "card-1", 80.0, 50.0));
        assert!(!warn_if_slow("create", "card-1", 10.0, 50.0));
    }
}
