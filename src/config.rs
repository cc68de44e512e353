//! Viewer configuration: the serde form handed over by the page and the
//! validated form the registry works with.

use serde::Deserialize;

use crate::color::{Rgb, ThemeColors};
use crate::error::{Result, ViewerError};

/// Number of faces on the faceted shape.
pub const CUBE_FACES: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Cube,
    Icosphere,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeClass {
    /// Hover previews on cards.
    #[default]
    Small,
    /// Modal views.
    Large,
}

/// Performance budgets per size class. Tunable, not semantic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBudget {
    pub icosphere_detail: u32,
    pub max_points: usize,
    pub label_texture_px: u32,
}

impl SizeClass {
    pub fn budget(self) -> SizeBudget {
        match self {
            SizeClass::Small => SizeBudget {
                icosphere_detail: 1,
                max_points: 100,
                label_texture_px: 128,
            },
            SizeClass::Large => SizeBudget {
                icosphere_detail: 2,
                max_points: 200,
                label_texture_px: 256,
            },
        }
    }
}

/// Motion and interaction constants shared by every instance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tuning {
    pub target_fps: f64,
    /// Radians of rotation per pixel of pointer travel.
    pub drag_sensitivity: f32,
    /// Per-frame velocity multiplier once the pointer is released.
    pub damping: f32,
    pub velocity_epsilon: f32,
    /// Per-frame auto-rotation increment, (x, y) in radians.
    pub auto_rotation: [f32; 2],
    pub resume_delay_ms: f64,
    pub click_velocity_threshold: f32,
    pub click_travel_px: f32,
    pub build_budget_ms: f64,
}

impl Default for Tuning {
    fn default() -> Self {
        Self {
            target_fps: 60.0,
            drag_sensitivity: 0.01,
            damping: 0.95,
            velocity_epsilon: 1e-4,
            auto_rotation: [0.003, 0.005],
            resume_delay_ms: 2500.0,
            click_velocity_threshold: 0.02,
            click_travel_px: 6.0,
            build_budget_ms: 50.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SegmentOptions {
    pub label: String,
    pub color: String,
    #[serde(default)]
    pub tooltip: Option<String>,
}

/// Configuration as the page sends it (a plain JS object).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerOptions {
    pub shape_kind: ShapeKind,
    #[serde(default)]
    pub size_class: SizeClass,
    pub segments: Vec<SegmentOptions>,
    pub primary_color: String,
    pub secondary_color: String,
    #[serde(default = "default_true")]
    pub interactive: bool,
    #[serde(default = "default_true")]
    pub animated: bool,
    #[serde(default)]
    pub point_count: Option<usize>,
    #[serde(default)]
    pub initial_rotation: Option<[f32; 2]>,
}

fn default_true() -> bool {
    true
}

/// One labeled, clickable region of the shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Segment {
    pub label: String,
    pub color: Rgb,
    pub tooltip: Option<String>,
}

impl Segment {
    pub fn new(label: impl Into<String>, color: Rgb) -> Self {
        Self {
            label: label.into(),
            color,
            tooltip: None,
        }
    }

    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewerConfig {
    pub shape: ShapeKind,
    pub size: SizeClass,
    pub segments: Vec<Segment>,
    pub theme: ThemeColors,
    pub interactive: bool,
    pub animated: bool,
    pub point_count: Option<usize>,
    pub initial_rotation: Option<[f32; 2]>,
}

impl ViewerConfig {
    pub fn new(shape: ShapeKind, size: SizeClass, segments: Vec<Segment>, theme: ThemeColors) -> Self {
        Self {
            shape,
            size,
            segments,
            theme,
            interactive: true,
            animated: true,
            point_count: None,
            initial_rotation: None,
        }
    }

    pub fn from_options(options: &ViewerOptions) -> Result<Self> {
        let theme = ThemeColors::parse(&options.primary_color, &options.secondary_color)?;
        let segments = options
            .segments
            .iter()
            .map(|s| {
                Ok(Segment {
                    label: s.label.clone(),
                    color: Rgb::parse(&s.color)?,
                    tooltip: s.tooltip.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            shape: options.shape_kind,
            size: options.size_class,
            segments,
            theme,
            interactive: options.interactive,
            animated: options.animated,
            point_count: options.point_count,
            initial_rotation: options.initial_rotation,
        })
    }

    pub fn budget(&self) -> SizeBudget {
        self.size.budget()
    }

    /// Requested point count clamped to the size-class ceiling.
    pub fn resolved_point_count(&self) -> usize {
        let cap = self.budget().max_points;
        self.point_count.map_or(cap, |n| n.min(cap))
    }

    /// Checks the segment count against the regions the shape exposes.
    pub fn validate(&self, region_capacity: usize) -> Result<()> {
        let n = self.segments.len();
        match self.shape {
            ShapeKind::Cube if n != CUBE_FACES => Err(ViewerError::InvalidConfig(format!(
                "a cube needs exactly {CUBE_FACES} segments, got {n}"
            ))),
            ShapeKind::Icosphere if n == 0 || n > region_capacity => {
                Err(ViewerError::InvalidConfig(format!(
                    "an icosphere needs 1..={region_capacity} segments, got {n}"
                )))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(shape: ShapeKind, n: usize) -> ViewerOptions {
        ViewerOptions {
            shape_kind: shape,
            size_class: SizeClass::Small,
            segments: (0..n)
                .map(|i| SegmentOptions {
                    label: format!("S{i}"),
                    color: "#336699".into(),
                    tooltip: None,
                })
                .collect(),
            primary_color: "#ffffff".into(),
            secondary_color: " rgb(0, 0, 0)".into(),
            interactive: true,
            animated: true,
            point_count: None,
            initial_rotation: None,
        }
    }

    #[test]
    fn cube_requires_six_segments() {
        let config = ViewerConfig::from_options(&options(ShapeKind::Cube, 5)).unwrap();
        assert!(matches!(config.validate(12), Err(ViewerError::InvalidConfig(_))));

        let config = ViewerConfig::from_options(&options(ShapeKind::Cube, 6)).unwrap();
        assert!(config.validate(12).is_ok());
    }

    #[test]
    fn icosphere_bounded_by_capacity() {
        let config = ViewerConfig::from_options(&options(ShapeKind::Icosphere, 81)).unwrap();
        assert!(config.validate(80).is_err());
        let config = ViewerConfig::from_options(&options(ShapeKind::Icosphere, 0)).unwrap();
        assert!(config.validate(80).is_err());
    }

    #[test]
    fn bad_segment_color_is_rejected() {
        let mut opts = options(ShapeKind::Cube, 6);
        opts.segments[2].color = "not-a-color".into();
        assert!(matches!(
            ViewerConfig::from_options(&opts),
            Err(ViewerError::InvalidColor(_))
        ));
    }

    #[test]
    fn point_count_clamps_per_size_class() {
        let mut config = ViewerConfig::from_options(&options(ShapeKind::Icosphere, 1)).unwrap();
        config.point_count = Some(500);
        assert_eq!(config.resolved_point_count(), 100);
        config.size = SizeClass::Large;
        assert_eq!(config.resolved_point_count(), 200);
        config.point_count = Some(42);
        assert_eq!(config.resolved_point_count(), 42);
        config.point_count = None;
        assert_eq!(config.resolved_point_count(), 200);
    }
}
