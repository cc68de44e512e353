mod common;

use portfolio_viewer::headless::{parts, HeadlessBinding, HeadlessLog, HeadlessRenderer};
use portfolio_viewer::{FrameOutcome, InstanceParts, PointerInput, ViewerError};

use common::{bottom_facing_cube, cube_config, registry, sphere_config};

#[test]
fn create_registers_and_schedules_first_frame() {
    let (mut viewers, _clock) = registry();
    let log = HeadlessLog::new();
    viewers.create("card-1", cube_config(), parts(&log, 320, 240)).unwrap();

    assert!(viewers.contains("card-1"));
    assert_eq!(viewers.len(), 1);
    assert_eq!(log.frames_requested(), 1);
    assert_eq!(log.live_materials(), 6);
    assert_eq!(log.live_textures(), 6);
    assert_eq!(log.live_geometries(), 2);

    let instance = viewers.get("card-1").unwrap();
    assert_eq!(instance.renderer().size(), (320, 240));
    assert!(instance.has_pending_frame());
}

#[test]
fn destroy_releases_everything_and_is_idempotent() {
    let (mut viewers, _clock) = registry();
    let log = HeadlessLog::new();
    viewers.create("card", cube_config(), parts(&log, 200, 200)).unwrap();

    assert!(viewers.destroy("card"));
    assert!(log.is_clean());
    assert!(log.context_released());
    assert!(!log.listeners_attached());
    assert!(!log.canvas_attached());
    assert!(log.pending_frames().is_empty());

    let events = log.events().len();
    assert!(!viewers.destroy("card"));
    assert_eq!(log.events().len(), events);
}

#[test]
fn operations_on_destroyed_id_are_noops() {
    let (mut viewers, _clock) = registry();
    let log = HeadlessLog::new();
    viewers.create("card", cube_config(), parts(&log, 200, 200)).unwrap();
    viewers.destroy("card");
    let events = log.events();

    assert!(!viewers.pause("card"));
    assert!(!viewers.resume("card"));
    assert!(!viewers.resize("card", 10, 10));
    assert!(!viewers.update_theme_css("card", "#000", "#fff"));
    assert_eq!(viewers.frame("card"), FrameOutcome::Missing);
    assert!(!viewers.pointer_down("card", PointerInput::at(100.0, 100.0).pressed()));
    assert_eq!(viewers.pointer_up("card", PointerInput::at(100.0, 100.0)), None);
    assert!(viewers.pick("card", 100.0, 100.0).is_none());
    assert!(viewers.stats("card").is_none());

    assert_eq!(log.events(), events);
    assert_eq!(log.frames_requested(), 1);
}

#[test]
fn teardown_follows_fixed_order() {
    let (mut viewers, _clock) = registry();
    let log = HeadlessLog::new();
    viewers.create("card", cube_config(), parts(&log, 200, 200)).unwrap();
    viewers.destroy("card");

    let events = log.events();
    assert_eq!(events[0], "cancel_frame");
    assert_eq!(events[1], "detach_listeners");
    let n = events.len();
    assert_eq!(&events[n - 2..], ["release_context", "detach_canvas"]);

    let releases = &events[2..n - 2];
    assert_eq!(releases.len(), 6 + 6 + 2);
    assert!(releases.iter().all(|e| e.starts_with("release_")));
    // Geometry goes last, after every material and texture.
    assert!(releases[12..].iter().all(|e| e == "release_geometry"));
}

#[test]
fn recreate_after_destroy_starts_fresh() {
    let (mut viewers, _clock) = registry();
    let first = HeadlessLog::new();
    viewers.create("card", cube_config(), parts(&first, 200, 200)).unwrap();
    viewers.destroy("card");

    let second = HeadlessLog::new();
    viewers.create("card", sphere_config(4), parts(&second, 200, 200)).unwrap();
    assert!(viewers.contains("card"));
    assert_eq!(viewers.get("card").unwrap().segments().len(), 4);
    assert_eq!(second.live_geometries(), 3);
    assert!(first.is_clean());
}

#[test]
fn create_replaces_existing_instance() {
    let (mut viewers, _clock) = registry();
    let old = HeadlessLog::new();
    viewers.create("card", cube_config(), parts(&old, 200, 200)).unwrap();

    let new = HeadlessLog::new();
    viewers.create("card", bottom_facing_cube(), parts(&new, 200, 200)).unwrap();

    assert_eq!(viewers.len(), 1);
    assert!(old.is_clean());
    assert!(old.context_released());
    assert!(!new.context_released());
    assert_eq!(new.live_materials(), 6);
}

#[test]
fn failed_build_is_not_registered() {
    let (mut viewers, _clock) = registry();
    let log = HeadlessLog::new();
    let failing = InstanceParts {
        renderer: HeadlessRenderer::new(log.clone()).failing_after(3),
        binding: Box::new(HeadlessBinding::new(log.clone())),
        width: 200,
        height: 200,
        on_select: None,
    };

    let err = viewers.create("card", cube_config(), failing).unwrap_err();
    assert!(matches!(err, ViewerError::BuildFailure(_)));
    assert!(err.wants_fallback());
    assert!(!viewers.contains("card"));
    assert!(log.is_clean());
    assert!(log.context_released());
    assert!(!log.canvas_attached());
    assert!(!log.listeners_attached());
}

#[test]
fn wrong_segment_count_is_rejected() {
    let (mut viewers, _clock) = registry();
    let log = HeadlessLog::new();
    let mut config = cube_config();
    config.segments.truncate(5);

    assert!(viewers.create("card", config, parts(&log, 200, 200)).is_err());
    assert!(viewers.is_empty());
    assert!(log.is_clean());
}

#[test]
fn teardown_destroys_every_instance() {
    let (mut viewers, _clock) = registry();
    let logs: Vec<_> = (0..3).map(|_| HeadlessLog::new()).collect();
    for (i, log) in logs.iter().enumerate() {
        viewers.create(&format!("card-{i}"), cube_config(), parts(log, 200, 200)).unwrap();
    }

    viewers.teardown();
    assert!(viewers.is_empty());
    assert!(logs.iter().all(|log| log.is_clean() && log.context_released()));
}

#[test]
fn dropping_the_registry_tears_down() {
    let log = HeadlessLog::new();
    {
        let (mut viewers, _clock) = registry();
        viewers.create("card", sphere_config(2), parts(&log, 200, 200)).unwrap();
    }
    assert!(log.is_clean());
    assert!(log.context_released());
    assert!(!log.canvas_attached());
}

#[test]
fn resize_updates_camera_and_surface() {
    let (mut viewers, _clock) = registry();
    let log = HeadlessLog::new();
    viewers.create("card", cube_config(), parts(&log, 200, 200)).unwrap();

    assert!(viewers.resize("card", 640, 480));
    let instance = viewers.get("card").unwrap();
    assert_eq!(instance.renderer().size(), (640, 480));
    assert_eq!(instance.camera().width, 640.0);
    assert_eq!(instance.camera().height, 480.0);

    // A collapsed container keeps the last good size.
    assert!(viewers.resize("card", 0, 0));
    assert_eq!(viewers.get("card").unwrap().renderer().size(), (640, 480));
}
