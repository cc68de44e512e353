//! Face label textures as a deterministic draw list. The browser backend
//! rasterizes it with Canvas2D; the layout itself (wrapping, font size,
//! glow passes) is decided here so identical inputs always produce
//! identical textures.

use crate::color::{Rgb, ThemeColors};

/// Fraction of the texture width a line of text may occupy.
const MAX_LINE_WIDTH: f32 = 0.8;
/// Rough advance of one glyph relative to the font size.
const GLYPH_ADVANCE: f32 = 0.55;
const BASE_FONT: f32 = 0.16;
const MAX_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlowPass {
    pub blur_px: f32,
    pub alpha: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LabelTexture {
    pub size_px: u32,
    pub background: Rgb,
    pub lines: Vec<String>,
    pub font_px: f32,
    pub line_height_px: f32,
    pub fill: Rgb,
    pub outline: Rgb,
    pub outline_px: f32,
    pub glow: Rgb,
    /// Drawn widest first.
    pub glow_passes: Vec<GlowPass>,
}

impl LabelTexture {
    pub fn new(label: &str, background: Rgb, theme: &ThemeColors, size_px: u32) -> Self {
        let size = size_px as f32;
        let (lines, font_px) = layout(label, size);
        Self {
            size_px,
            background,
            lines,
            font_px,
            line_height_px: font_px * 1.2,
            fill: theme.primary,
            outline: background.scale(0.35),
            outline_px: (size / 64.0).max(1.0),
            glow: theme.secondary,
            glow_passes: vec![
                GlowPass { blur_px: size / 12.0, alpha: 0.45 },
                GlowPass { blur_px: size / 24.0, alpha: 0.7 },
                GlowPass { blur_px: size / 64.0, alpha: 1.0 },
            ],
        }
    }

    /// Baseline y of each line, vertically centered on the texture.
    pub fn baselines(&self) -> Vec<f32> {
        let block = self.line_height_px * self.lines.len() as f32;
        let top = (self.size_px as f32 - block) / 2.0;
        (0..self.lines.len())
            .map(|i| top + self.line_height_px * (i as f32 + 0.5))
            .collect()
    }

    pub fn estimated_width(&self, line: &str) -> f32 {
        text_width(line, self.font_px)
    }
}

fn text_width(text: &str, font_px: f32) -> f32 {
    text.chars().count() as f32 * font_px * GLYPH_ADVANCE
}

/// Greedy word wrap. The font shrinks while the label needs more than
/// `MAX_LINES` lines; words longer than a line are kept whole.
fn layout(label: &str, size: f32) -> (Vec<String>, f32) {
    let max_width = size * MAX_LINE_WIDTH;
    let mut font_px = size * BASE_FONT;
    loop {
        let lines = wrap(label, font_px, max_width);
        if lines.len() <= MAX_LINES || font_px <= size * BASE_FONT * 0.5 {
            return (lines, font_px);
        }
        font_px *= 0.85;
    }
}

fn wrap(label: &str, font_px: f32, max_width: f32) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    for word in label.split_whitespace() {
        let candidate = if current.is_empty() {
            word.to_string()
        } else {
            format!("{current} {word}")
        };
        if current.is_empty() || text_width(&candidate, font_px) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::replace(&mut current, word.to_string()));
        }
    }
    if !current.is_empty() || lines.is_empty() {
        lines.push(current);
    }
    lines
}
