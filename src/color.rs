//! CSS color strings to linear-ish RGB triples.

use crate::error::{Result, ViewerError};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb { r: 0.0, g: 0.0, b: 0.0 };
    pub const WHITE: Rgb = Rgb { r: 1.0, g: 1.0, b: 1.0 };

    pub fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_bytes(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(..)` or `rgba(..)`.
    /// Alpha is accepted and dropped.
    pub fn parse(input: &str) -> Result<Rgb> {
        let s = input.trim();
        if let Some(hex) = s.strip_prefix('#') {
            return Self::parse_hex(hex).ok_or_else(|| invalid(input));
        }
        let lower = s.to_ascii_lowercase();
        let body = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(|| invalid(input))?;

        let parts: Vec<&str> = body.split(',').map(str::trim).collect();
        if parts.len() != 3 && parts.len() != 4 {
            return Err(invalid(input));
        }
        let mut channels = [0u8; 3];
        for (slot, part) in channels.iter_mut().zip(parts.iter()) {
            let value: f32 = part.parse().map_err(|_| invalid(input))?;
            if !(0.0..=255.0).contains(&value) {
                return Err(invalid(input));
            }
            *slot = value.round() as u8;
        }
        Ok(Self::from_bytes(channels[0], channels[1], channels[2]))
    }

    fn parse_hex(hex: &str) -> Option<Rgb> {
        let byte = |s: &str| u8::from_str_radix(s, 16).ok();
        match hex.len() {
            3 => {
                let mut out = [0u8; 3];
                for (i, c) in hex.chars().enumerate() {
                    let v = c.to_digit(16)? as u8;
                    out[i] = v * 17;
                }
                Some(Self::from_bytes(out[0], out[1], out[2]))
            }
            6 | 8 => Some(Self::from_bytes(
                byte(hex.get(0..2)?)?,
                byte(hex.get(2..4)?)?,
                byte(hex.get(4..6)?)?,
            )),
            _ => None,
        }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    pub fn scale(self, factor: f32) -> Rgb {
        Rgb::new(
            (self.r * factor).clamp(0.0, 1.0),
            (self.g * factor).clamp(0.0, 1.0),
            (self.b * factor).clamp(0.0, 1.0),
        )
    }

    /// `#rrggbb`, the form handed back to Canvas2D.
    pub fn to_css(self) -> String {
        let c = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        format!("#{:02x}{:02x}{:02x}", c(self.r), c(self.g), c(self.b))
    }
}

fn invalid(input: &str) -> ViewerError {
    ViewerError::InvalidColor(format!("{input:?}"))
}

/// The pair of theme colors sampled by the page at call time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThemeColors {
    pub primary: Rgb,
    pub secondary: Rgb,
}

impl ThemeColors {
    pub fn new(primary: Rgb, secondary: Rgb) -> Self {
        Self { primary, secondary }
    }

    pub fn parse(primary: &str, secondary: &str) -> Result<ThemeColors> {
        Ok(Self {
            primary: Rgb::parse(primary)?,
            secondary: Rgb::parse(secondary)?,
        })
    }

    /// Color of the `index`-th cloud point: primary on even, secondary on odd.
    pub fn alternating(&self, index: usize) -> Rgb {
        if index % 2 == 0 {
            self.primary
        } else {
            self.secondary
        }
    }
}
