mod common;

use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use portfolio_viewer::headless::{parts, parts_with_callback, HeadlessLog};
use portfolio_viewer::{FrameOutcome, InteractionState, PointerInput};

use common::{bottom_facing_cube, cube_config, registry, LABELS, TICK_MS};

/// Lower-right of center on a 400x400 canvas.
const ON_D: (f32, f32) = (230.0, 230.0);

#[test]
fn click_on_bottom_face_selects_d() {
    let (mut viewers, _clock) = registry();
    let log = HeadlessLog::new();
    let selected = Rc::new(RefCell::new(Vec::new()));
    let sink = selected.clone();
    let parts = parts_with_callback(
        &log,
        400,
        400,
        Box::new(move |label: &str| sink.borrow_mut().push(label.to_string())),
    );
    viewers.create("cube", bottom_facing_cube(), parts).unwrap();

    let hit = viewers.pick("cube", ON_D.0, ON_D.1).unwrap();
    assert_eq!(hit.primitive, 7);
    assert_eq!(hit.segment, Some(3));

    assert!(viewers.pointer_down("cube", PointerInput::at(ON_D.0, ON_D.1).pressed()));
    assert_eq!(viewers.get("cube").unwrap().state(), InteractionState::Dragging);
    let label = viewers.pointer_up("cube", PointerInput::at(ON_D.0, ON_D.1));

    assert_eq!(label.as_deref(), Some("D"));
    assert_eq!(*selected.borrow(), vec!["D".to_string()]);
    assert_eq!(viewers.get("cube").unwrap().state(), InteractionState::Idle);
}

#[test]
fn drag_is_not_a_click() {
    let (mut viewers, _clock) = registry();
    let log = HeadlessLog::new();
    let selected = Rc::new(RefCell::new(0));
    let sink = selected.clone();
    let parts = parts_with_callback(&log, 400, 400, Box::new(move |_: &str| *sink.borrow_mut() += 1));
    viewers.create("cube", bottom_facing_cube(), parts).unwrap();

    viewers.pointer_down("cube", PointerInput::at(ON_D.0, ON_D.1).pressed());
    viewers.pointer_move("cube", PointerInput::at(ON_D.0 + 30.0, ON_D.1).pressed());
    assert_eq!(viewers.pointer_up("cube", PointerInput::at(ON_D.0 + 30.0, ON_D.1)), None);
    assert_eq!(*selected.borrow(), 0);
}

#[test]
fn press_on_empty_space_does_not_drag() {
    let (mut viewers, _clock) = registry();
    let log = HeadlessLog::new();
    viewers.create("cube", bottom_facing_cube(), parts(&log, 400, 400)).unwrap();

    viewers.pointer_down("cube", PointerInput::at(5.0, 5.0).pressed());
    assert_eq!(viewers.get("cube").unwrap().state(), InteractionState::Idle);
    assert_eq!(viewers.pointer_up("cube", PointerInput::at(5.0, 5.0)), None);
}

#[test]
fn drag_rotates_and_inertia_decays() {
    let (mut viewers, clock) = registry();
    let log = HeadlessLog::new();
    viewers.create("cube", bottom_facing_cube(), parts(&log, 400, 400)).unwrap();
    let start = *viewers.get("cube").unwrap().motion();

    viewers.pointer_down("cube", PointerInput::at(ON_D.0, ON_D.1).pressed());
    viewers.pointer_move("cube", PointerInput::at(ON_D.0 + 30.0, ON_D.1 + 10.0).pressed());

    let dragged = *viewers.get("cube").unwrap().motion();
    assert_relative_eq!(dragged.velocity.y, 0.3, epsilon = 1e-6);
    assert_relative_eq!(dragged.velocity.x, 0.1, epsilon = 1e-6);
    assert_relative_eq!(dragged.rotation_y, start.rotation_y + 0.3, epsilon = 1e-6);
    assert_relative_eq!(dragged.rotation_x, start.rotation_x + 0.1, epsilon = 1e-6);

    viewers.pointer_up("cube", PointerInput::at(ON_D.0 + 30.0, ON_D.1 + 10.0));
    clock.advance(TICK_MS);
    assert_eq!(viewers.frame("cube"), FrameOutcome::Rendered);
    let coasting = *viewers.get("cube").unwrap().motion();
    assert_relative_eq!(coasting.velocity.y, 0.3 * 0.95, epsilon = 1e-6);
    assert_relative_eq!(coasting.rotation_y, dragged.rotation_y + 0.3 * 0.95, epsilon = 1e-5);

    let mut previous = coasting.velocity.magnitude();
    for _ in 0..300 {
        clock.advance(TICK_MS);
        viewers.frame("cube");
        let now = viewers.get("cube").unwrap().motion().velocity.magnitude();
        assert!(now <= previous);
        previous = now;
    }
    assert!(viewers.get("cube").unwrap().motion().velocity.is_zero());
}

#[test]
fn auto_rotation_resumes_after_delay() {
    let (mut viewers, clock) = registry();
    let log = HeadlessLog::new();
    let mut config = bottom_facing_cube();
    config.animated = true;
    viewers.create("cube", config, parts(&log, 400, 400)).unwrap();

    clock.set(1000.0);
    viewers.pointer_down("cube", PointerInput::at(ON_D.0, ON_D.1).pressed());
    viewers.pointer_up("cube", PointerInput::at(ON_D.0, ON_D.1));
    let released = *viewers.get("cube").unwrap().motion();
    assert!(viewers.get("cube").unwrap().interaction().resume_pending());

    clock.set(1000.0 + TICK_MS);
    assert_eq!(viewers.frame("cube"), FrameOutcome::Rendered);
    assert_eq!(*viewers.get("cube").unwrap().motion(), released);

    clock.set(3400.0);
    assert_eq!(viewers.frame("cube"), FrameOutcome::Rendered);
    assert_eq!(*viewers.get("cube").unwrap().motion(), released);

    clock.set(3500.0);
    viewers.frame("cube");
    let instance = viewers.get("cube").unwrap();
    assert!(!instance.interaction().resume_pending());
    let after = instance.motion();
    assert_relative_eq!(after.rotation_x, released.rotation_x + 0.003, epsilon = 1e-6);
    assert_relative_eq!(after.rotation_y, released.rotation_y + 0.005, epsilon = 1e-6);
}

#[test]
fn hovering_cancels_deferred_resume() {
    let (mut viewers, clock) = registry();
    let log = HeadlessLog::new();
    viewers.create("cube", bottom_facing_cube(), parts(&log, 400, 400)).unwrap();

    viewers.pointer_down("cube", PointerInput::at(ON_D.0, ON_D.1).pressed());
    viewers.pointer_up("cube", PointerInput::at(ON_D.0, ON_D.1));
    assert!(viewers.get("cube").unwrap().interaction().resume_pending());

    viewers.pointer_move("cube", PointerInput::at(ON_D.0, ON_D.1));
    let instance = viewers.get("cube").unwrap();
    assert_eq!(instance.state(), InteractionState::Hovering);
    assert!(!instance.interaction().resume_pending());
    assert!(!instance.interaction().auto_rotation_active());

    clock.advance(5000.0);
    viewers.frame("cube");
    assert_eq!(viewers.get("cube").unwrap().state(), InteractionState::Hovering);
}

#[test]
fn hover_shows_tooltip_and_highlights_face() {
    let (mut viewers, clock) = registry();
    let log = HeadlessLog::new();
    viewers.create("cube", bottom_facing_cube(), parts(&log, 400, 400)).unwrap();

    viewers.pointer_move("cube", PointerInput::at(ON_D.0, ON_D.1));
    let tooltip = log.tooltip().unwrap();
    assert_eq!(tooltip.label, "D");
    assert_eq!(tooltip.text.as_deref(), Some("About D"));
    assert_eq!(tooltip.anchor, [ON_D.0, ON_D.1]);

    viewers.frame("cube");
    assert_eq!(log.last_highlight(), Some(3));
    assert_relative_eq!(log.last_wire_opacity(), 0.8);

    // Following the pointer within the same face moves the tooltip.
    viewers.pointer_move("cube", PointerInput::at(ON_D.0 + 4.0, ON_D.1 + 2.0));
    assert_eq!(log.tooltip().unwrap().anchor, [ON_D.0 + 4.0, ON_D.1 + 2.0]);

    viewers.pointer_move("cube", PointerInput::at(5.0, 5.0));
    assert!(log.tooltip().is_none());
    assert_eq!(viewers.get("cube").unwrap().state(), InteractionState::Idle);

    clock.advance(TICK_MS);
    viewers.frame("cube");
    assert_eq!(log.last_highlight(), None);
    assert_relative_eq!(log.last_wire_opacity(), 0.3);
}

#[test]
fn leaving_the_canvas_hides_tooltip() {
    let (mut viewers, _clock) = registry();
    let log = HeadlessLog::new();
    viewers.create("cube", bottom_facing_cube(), parts(&log, 400, 400)).unwrap();

    viewers.pointer_move("cube", PointerInput::at(ON_D.0, ON_D.1));
    assert!(log.tooltip().is_some());
    viewers.pointer_leave("cube");
    assert!(log.tooltip().is_none());
    assert!(viewers.get("cube").unwrap().interaction().auto_rotation_active());
}

#[test]
fn release_outside_ends_drag() {
    let (mut viewers, _clock) = registry();
    let log = HeadlessLog::new();
    viewers.create("cube", bottom_facing_cube(), parts(&log, 400, 400)).unwrap();

    viewers.pointer_down("cube", PointerInput::at(ON_D.0, ON_D.1).pressed());
    assert!(viewers.release_outside("cube"));
    let instance = viewers.get("cube").unwrap();
    assert_eq!(instance.state(), InteractionState::Idle);
    assert!(instance.interaction().resume_pending());
}

#[test]
fn non_interactive_viewer_ignores_pointer() {
    let (mut viewers, _clock) = registry();
    let log = HeadlessLog::new();
    let mut config = cube_config();
    config.interactive = false;
    viewers.create("cube", config, parts(&log, 400, 400)).unwrap();

    assert!(!viewers.pointer_down("cube", PointerInput::at(200.0, 200.0).pressed()));
    assert!(!viewers.pointer_move("cube", PointerInput::at(200.0, 200.0)));
    assert_eq!(viewers.pointer_up("cube", PointerInput::at(200.0, 200.0)), None);
    assert!(log.tooltip().is_none());
    assert_eq!(viewers.get("cube").unwrap().state(), InteractionState::Idle);
}

#[test]
fn hover_follows_the_face_turning_under_a_still_pointer() {
    let (mut viewers, clock) = registry();
    let log = HeadlessLog::new();
    viewers.create("cube", bottom_facing_cube(), parts(&log, 400, 400)).unwrap();

    // Flick downwards, then rest the pointer on the still-spinning cube.
    let rest = (ON_D.0, ON_D.1 + 60.0);
    viewers.pointer_down("cube", PointerInput::at(ON_D.0, ON_D.1).pressed());
    viewers.pointer_move("cube", PointerInput::at(rest.0, rest.1).pressed());
    assert_eq!(viewers.pointer_up("cube", PointerInput::at(rest.0, rest.1)), None);
    viewers.pointer_move("cube", PointerInput::at(rest.0, rest.1));
    assert_eq!(viewers.get("cube").unwrap().state(), InteractionState::Hovering);
    let first = log.tooltip().unwrap().label;

    let mut seen = vec![first.clone()];
    for _ in 0..200 {
        clock.advance(TICK_MS);
        viewers.frame("cube");
        let tooltip = log.tooltip();
        let highlighted = log.last_highlight().map(|i| LABELS[i].to_string());
        assert_eq!(tooltip.as_ref().map(|t| t.label.clone()), highlighted);
        if let Some(tooltip) = tooltip {
            if !seen.contains(&tooltip.label) {
                seen.push(tooltip.label);
            }
        }
    }
    assert!(seen.len() > 1, "tooltip stuck on {first}");
    assert!(viewers.get("cube").unwrap().motion().velocity.is_zero());
}

