#![allow(dead_code)]

use std::f32::consts::FRAC_PI_2;

use portfolio_viewer::headless::HeadlessRenderer;
use portfolio_viewer::performance::ManualClock;
use portfolio_viewer::{Rgb, Segment, ShapeKind, SizeClass, ThemeColors, ViewerConfig, ViewerRegistry};

pub const LABELS: [&str; 6] = ["A", "B", "C", "D", "E", "F"];

/// Frame spacing comfortably above the 60 fps interval.
pub const TICK_MS: f64 = 17.0;

pub fn theme() -> ThemeColors {
    ThemeColors::new(Rgb::from_bytes(0x3a, 0x7b, 0xd5), Rgb::from_bytes(0x00, 0xd2, 0xff))
}

pub fn cube_config() -> ViewerConfig {
    let segments = LABELS
        .iter()
        .enumerate()
        .map(|(i, label)| {
            Segment::new(*label, Rgb::new(0.1 * i as f32, 0.4, 0.6)).with_tooltip(format!("About {label}"))
        })
        .collect();
    ViewerConfig::new(ShapeKind::Cube, SizeClass::Small, segments, theme())
}

/// Cube turned so its -Y face ("D") looks at the camera, without
/// auto-rotation.
pub fn bottom_facing_cube() -> ViewerConfig {
    let mut config = cube_config();
    config.initial_rotation = Some([-FRAC_PI_2, 0.0]);
    config.animated = false;
    config
}

pub fn sphere_config(segments: usize) -> ViewerConfig {
    let segments = (0..segments)
        .map(|i| Segment::new(format!("topic-{i}"), Rgb::new(0.8, 0.2, 0.1 * i as f32)))
        .collect();
    ViewerConfig::new(ShapeKind::Icosphere, SizeClass::Small, segments, theme())
}

pub fn registry() -> (ViewerRegistry<HeadlessRenderer>, ManualClock) {
    let clock = ManualClock::new(0.0);
    (ViewerRegistry::new(Box::new(clock.clone())), clock)
}
