//! Frame pacing and per-frame motion.
//!
//! The host calls [`RenderScheduler::admit`] from its frame callback (a
//! `requestAnimationFrame` tick in the browser, a fixed tick elsewhere).
//! Frames arriving faster than the target rate are dropped rather than
//! queued, and nothing is admitted while the instance is paused.

use cgmath::{Matrix4, Rad};

use crate::config::Tuning;

/// Slack so a 60 Hz display is not halved by timestamp jitter.
const FRAME_TOLERANCE_MS: f64 = 1.0;

/// Opaque token for a scheduled frame; cancelling it is the only way to
/// stop a pending callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FrameHandle(pub i32);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RotationVelocity {
    pub x: f32,
    pub y: f32,
}

impl RotationVelocity {
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

/// Orientation of the root object as Euler angles plus residual velocity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Motion {
    pub rotation_x: f32,
    pub rotation_y: f32,
    pub velocity: RotationVelocity,
}

impl Motion {
    pub fn new(rotation_x: f32, rotation_y: f32) -> Self {
        Self {
            rotation_x,
            rotation_y,
            velocity: RotationVelocity::default(),
        }
    }

    pub fn rotate_by(&mut self, dx: f32, dy: f32) {
        self.rotation_x += dx;
        self.rotation_y += dy;
    }

    pub fn model(&self) -> Matrix4<f32> {
        Matrix4::from_angle_x(Rad(self.rotation_x)) * Matrix4::from_angle_y(Rad(self.rotation_y))
    }

    /// One frame of inertia: decay, apply the residual, snap tiny values to
    /// zero so the object does not creep forever.
    pub fn damp(&mut self, tuning: &Tuning) {
        if self.velocity.is_zero() {
            return;
        }
        self.velocity.x *= tuning.damping;
        self.velocity.y *= tuning.damping;
        self.rotate_by(self.velocity.x, self.velocity.y);
        if self.velocity.magnitude() < tuning.velocity_epsilon {
            self.velocity = RotationVelocity::default();
        }
    }

    pub fn auto_rotate(&mut self, tuning: &Tuning) {
        self.rotate_by(tuning.auto_rotation[0], tuning.auto_rotation[1]);
    }
}

#[derive(Debug, Clone)]
pub struct RenderScheduler {
    frame_interval_ms: f64,
    last_frame_time: Option<f64>,
    visible: bool,
    pending: Option<FrameHandle>,
}

impl RenderScheduler {
    pub fn new(target_fps: f64) -> Self {
        Self {
            frame_interval_ms: 1000.0 / target_fps.max(1.0),
            last_frame_time: None,
            visible: true,
            pending: None,
        }
    }

    pub fn frame_interval_ms(&self) -> f64 {
        self.frame_interval_ms
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Returns true when the frame at `now` should do work. Skipped frames
    /// leave `last_frame_time` alone so the next one catches up.
    pub fn admit(&mut self, now: f64) -> bool {
        if !self.visible {
            return false;
        }
        let Some(last) = self.last_frame_time else {
            self.last_frame_time = Some(now);
            return true;
        };
        let elapsed = now - last;
        if elapsed + FRAME_TOLERANCE_MS < self.frame_interval_ms {
            return false;
        }
        // Keep the cadence aligned to the interval instead of drifting.
        let lag = if elapsed >= self.frame_interval_ms {
            elapsed % self.frame_interval_ms
        } else {
            0.0
        };
        self.last_frame_time = Some(now - lag);
        true
    }

    pub fn pause(&mut self) -> Option<FrameHandle> {
        self.visible = false;
        self.pending.take()
    }

    pub fn resume(&mut self) {
        self.visible = true;
        self.last_frame_time = None;
    }

    pub fn set_pending(&mut self, handle: Option<FrameHandle>) {
        self.pending = handle;
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn take_pending(&mut self) -> Option<FrameHandle> {
        self.pending.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttles_to_target_rate() {
        let mut s = RenderScheduler::new(60.0);
        assert!(s.admit(0.0));
        assert!(!s.admit(5.0));
        assert!(!s.admit(10.0));
        assert!(s.admit(16.7));
        // 120 Hz ticks render every other frame.
        let mut admitted = 0;
        for i in 1..=120 {
            if s.admit(16.7 + i as f64 * 8.33) {
                admitted += 1;
            }
        }
        assert!((58..=62).contains(&admitted), "admitted {admitted}");
    }

    #[test]
    fn paused_scheduler_admits_nothing() {
        let mut s = RenderScheduler::new(60.0);
        s.set_pending(Some(FrameHandle(3)));
        assert_eq!(s.pause(), Some(FrameHandle(3)));
        assert!(!s.admit(1000.0));
        s.resume();
        assert!(s.admit(1000.0));
    }

    #[test]
    fn damping_decays_to_zero() {
        let tuning = Tuning::default();
        let mut m = Motion::new(0.0, 0.0);
        m.velocity = RotationVelocity { x: 0.3, y: -0.2 };
        let mut last = m.velocity.magnitude();
        let mut frames = 0;
        while !m.velocity.is_zero() {
            m.damp(&tuning);
            let mag = m.velocity.magnitude();
            assert!(mag <= last);
            last = mag;
            frames += 1;
            assert!(frames < 1000, "velocity never settled");
        }
        assert!(m.rotation_x > 0.0 && m.rotation_y < 0.0);
    }
}
