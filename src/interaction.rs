//! Pointer state machine for one viewer.
//!
//! ```text
//!   Idle ──move+hit──▶ Hovering ──move, no hit──▶ Idle
//!    │                    │
//!    └──down+hit──▶ Dragging ◀──down+hit──┘
//!                     │
//!                     └──up / leave──▶ Idle (auto-rotation deferred)
//! ```
//!
//! The controller never touches the scene directly: it mutates the
//! [`Motion`] it is handed and reports tooltip changes and selections back
//! to the registry.

use crate::config::Tuning;
use crate::raycast::Hit;
use crate::scheduler::{Motion, RotationVelocity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    Hovering,
    Dragging,
}

/// One pointer sample. `x`/`y` are relative to the canvas, `client_x`/
/// `client_y` to the viewport (for tooltip placement).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PointerInput {
    pub x: f32,
    pub y: f32,
    pub client_x: f32,
    pub client_y: f32,
    /// Bitmask of pressed buttons, as in `PointerEvent.buttons`.
    pub buttons: u16,
}

impl PointerInput {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            x,
            y,
            client_x: x,
            client_y: y,
            buttons: 0,
        }
    }

    pub fn pressed(mut self) -> Self {
        self.buttons = 1;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TooltipUpdate {
    Unchanged,
    Show { segment: usize },
    Follow,
    Hide,
}

#[derive(Debug, Clone)]
pub struct InteractionController {
    tuning: Tuning,
    state: InteractionState,
    last_pointer: Option<[f32; 2]>,
    drag_travel: f32,
    hovered: Option<usize>,
    /// Last pointer sample that landed on the shape while hovering.
    hover_pointer: Option<PointerInput>,
    resume_at: Option<f64>,
}

impl InteractionController {
    pub fn new(tuning: Tuning) -> Self {
        Self {
            tuning,
            state: InteractionState::Idle,
            last_pointer: None,
            drag_travel: 0.0,
            hovered: None,
            hover_pointer: None,
            resume_at: None,
        }
    }

    pub fn state(&self) -> InteractionState {
        self.state
    }

    pub fn hovered(&self) -> Option<usize> {
        self.hovered
    }

    pub fn hover_pointer(&self) -> Option<PointerInput> {
        self.hover_pointer
    }

    pub fn is_dragging(&self) -> bool {
        self.state == InteractionState::Dragging
    }

    pub fn resume_pending(&self) -> bool {
        self.resume_at.is_some()
    }

    /// Auto-rotation runs only when idle and no deferred resume is pending.
    pub fn auto_rotation_active(&self) -> bool {
        self.state == InteractionState::Idle && self.resume_at.is_none()
    }

    /// 0 at rest, 1 while hovering; drives the wireframe glow.
    pub fn glow(&self) -> f32 {
        if self.state == InteractionState::Hovering {
            1.0
        } else {
            0.0
        }
    }

    pub fn cancel_deferred_resume(&mut self) {
        self.resume_at = None;
    }

    /// Clears the deferred resume once its deadline has passed.
    pub fn poll(&mut self, now: f64) {
        if self.resume_at.is_some_and(|at| now >= at) {
            self.resume_at = None;
        }
    }

    pub fn pointer_down(&mut self, input: PointerInput, hit: Option<Hit>, motion: &mut Motion) -> TooltipUpdate {
        if hit.is_none() {
            return TooltipUpdate::Unchanged;
        }
        self.state = InteractionState::Dragging;
        self.last_pointer = Some([input.x, input.y]);
        self.drag_travel = 0.0;
        self.hovered = None;
        self.hover_pointer = None;
        self.resume_at = None;
        motion.velocity = RotationVelocity::default();
        TooltipUpdate::Hide
    }

    pub fn pointer_move(&mut self, input: PointerInput, hit: Option<Hit>, motion: &mut Motion) -> TooltipUpdate {
        if self.state == InteractionState::Dragging {
            let [lx, ly] = self.last_pointer.unwrap_or([input.x, input.y]);
            let (dx, dy) = (input.x - lx, input.y - ly);
            self.drag_travel += (dx * dx + dy * dy).sqrt();
            self.last_pointer = Some([input.x, input.y]);

            // Horizontal travel spins around Y, vertical around X.
            let s = self.tuning.drag_sensitivity;
            motion.velocity = RotationVelocity { x: dy * s, y: dx * s };
            motion.rotate_by(motion.velocity.x, motion.velocity.y);
            return TooltipUpdate::Unchanged;
        }

        if input.buttons != 0 {
            return TooltipUpdate::Unchanged;
        }

        match hit {
            Some(hit) => {
                self.state = InteractionState::Hovering;
                self.hover_pointer = Some(input);
                self.resume_at = None;
                match hit.segment {
                    Some(segment) if self.hovered != Some(segment) => {
                        self.hovered = Some(segment);
                        TooltipUpdate::Show { segment }
                    }
                    Some(_) => TooltipUpdate::Follow,
                    None => {
                        self.hovered = None;
                        TooltipUpdate::Hide
                    }
                }
            }
            None if self.state == InteractionState::Hovering => {
                self.state = InteractionState::Idle;
                self.hovered = None;
                self.hover_pointer = None;
                TooltipUpdate::Hide
            }
            None => TooltipUpdate::Unchanged,
        }
    }

    /// Ends a drag. Returns the segment to select when the release counts
    /// as a click: negligible residual velocity and almost no travel.
    pub fn pointer_up(&mut self, hit: Option<Hit>, motion: &Motion, now: f64) -> Option<usize> {
        if self.state != InteractionState::Dragging {
            return None;
        }
        self.end_drag(now);
        let is_click = motion.velocity.magnitude() < self.tuning.click_velocity_threshold
            && self.drag_travel <= self.tuning.click_travel_px;
        if is_click {
            hit.and_then(|h| h.segment)
        } else {
            None
        }
    }

    pub fn pointer_leave(&mut self, now: f64) -> TooltipUpdate {
        match self.state {
            InteractionState::Dragging => {
                self.end_drag(now);
                TooltipUpdate::Unchanged
            }
            InteractionState::Hovering => {
                self.state = InteractionState::Idle;
                self.hovered = None;
                self.hover_pointer = None;
                TooltipUpdate::Hide
            }
            InteractionState::Idle => TooltipUpdate::Unchanged,
        }
    }

    fn end_drag(&mut self, now: f64) {
        self.state = InteractionState::Idle;
        self.last_pointer = None;
        self.resume_at = Some(now + self.tuning.resume_delay_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::SegmentLayout;

    fn hit(primitive: usize) -> Option<Hit> {
        Some(Hit {
            primitive,
            segment: SegmentLayout::new(12, 6).segment_of(primitive),
            distance: 4.0,
        })
    }

    fn controller() -> (InteractionController, Motion) {
        (InteractionController::new(Tuning::default()), Motion::default())
    }

    #[test]
    fn click_on_primitive_seven_selects_fourth_segment() {
        let (mut c, mut m) = controller();
        let p = PointerInput::at(120.0, 80.0).pressed();
        c.pointer_down(p, hit(7), &mut m);
        assert_eq!(c.state(), InteractionState::Dragging);
        assert_eq!(c.pointer_up(hit(7), &m, 0.0), Some(3));
        assert_eq!(c.state(), InteractionState::Idle);
    }

    #[test]
    fn drag_release_is_not_a_click() {
        let (mut c, mut m) = controller();
        c.pointer_down(PointerInput::at(100.0, 100.0).pressed(), hit(0), &mut m);
        c.pointer_move(PointerInput::at(140.0, 110.0).pressed(), hit(0), &mut m);
        assert!(!m.velocity.is_zero());
        assert_eq!(c.pointer_up(hit(0), &m, 0.0), None);
        assert!(!m.velocity.is_zero(), "release keeps residual velocity");
    }

    #[test]
    fn drag_applies_rotation_immediately() {
        let (mut c, mut m) = controller();
        c.pointer_down(PointerInput::at(0.0, 0.0).pressed(), hit(0), &mut m);
        c.pointer_move(PointerInput::at(10.0, -20.0).pressed(), None, &mut m);
        assert!((m.rotation_y - 0.1).abs() < 1e-6);
        assert!((m.rotation_x + 0.2).abs() < 1e-6);
    }

    #[test]
    fn hover_enters_and_leaves() {
        let (mut c, mut m) = controller();
        assert_eq!(c.pointer_move(PointerInput::at(1.0, 1.0), hit(4), &mut m), TooltipUpdate::Show { segment: 2 });
        assert_eq!(c.state(), InteractionState::Hovering);
        assert!(!c.auto_rotation_active());
        assert_eq!(c.glow(), 1.0);
        assert_eq!(c.pointer_move(PointerInput::at(2.0, 1.0), hit(5), &mut m), TooltipUpdate::Follow);
        assert_eq!(c.pointer_move(PointerInput::at(2.0, 1.0), hit(6), &mut m), TooltipUpdate::Show { segment: 3 });
        assert_eq!(c.pointer_move(PointerInput::at(300.0, 1.0), None, &mut m), TooltipUpdate::Hide);
        assert_eq!(c.state(), InteractionState::Idle);
        assert!(c.auto_rotation_active());
    }

    #[test]
    fn pointer_down_off_object_does_nothing() {
        let (mut c, mut m) = controller();
        assert_eq!(c.pointer_down(PointerInput::at(1.0, 1.0).pressed(), None, &mut m), TooltipUpdate::Unchanged);
        assert_eq!(c.state(), InteractionState::Idle);
        assert_eq!(c.pointer_up(hit(0), &m, 0.0), None);
    }

    #[test]
    fn resume_is_deferred_and_cancelled_by_new_drag() {
        let (mut c, mut m) = controller();
        c.pointer_down(PointerInput::at(0.0, 0.0).pressed(), hit(0), &mut m);
        c.pointer_leave(1000.0);
        assert!(!c.auto_rotation_active());
        c.poll(2000.0);
        assert!(c.resume_pending());

        c.pointer_down(PointerInput::at(0.0, 0.0).pressed(), hit(0), &mut m);
        assert!(!c.resume_pending());
        c.poll(4000.0);
        assert!(!c.auto_rotation_active(), "still dragging");

        c.pointer_up(None, &m, 5000.0);
        c.poll(7499.0);
        assert!(!c.auto_rotation_active());
        c.poll(7500.0);
        assert!(c.auto_rotation_active());
    }

    #[test]
    fn hover_remembers_pointer_until_it_ends() {
        let (mut c, mut m) = controller();
        assert_eq!(c.hover_pointer(), None);
        let over = PointerInput::at(40.0, 60.0);
        c.pointer_move(over, hit(2), &mut m);
        assert_eq!(c.hover_pointer(), Some(over));
        c.pointer_leave(0.0);
        assert_eq!(c.hover_pointer(), None);

        c.pointer_move(over, hit(2), &mut m);
        c.pointer_down(over.pressed(), hit(2), &mut m);
        assert_eq!(c.hover_pointer(), None);
    }

    #[test]
    fn held_button_does_not_start_hover() {
        let (mut c, mut m) = controller();
        let input = PointerInput::at(5.0, 5.0).pressed();
        assert_eq!(c.pointer_move(input, hit(2), &mut m), TooltipUpdate::Unchanged);
        assert_eq!(c.state(), InteractionState::Idle);
    }
}
