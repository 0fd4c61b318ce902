//! Pixel colours and the line-ring image used by the renderer handlers.

use std::fmt;
use std::ops::{Add, Mul};
use std::str::FromStr;

use sondeo_core::Buffer2D;

/// Linear RGBA colour, components nominally in `0..=1`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Color {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl Color {
    /// Opaque black.
    pub const BLACK: Self = Self::rgb(0.0, 0.0, 0.0);
    /// Opaque white.
    pub const WHITE: Self = Self::rgb(1.0, 1.0, 1.0);

    /// Opaque colour.
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Linear blend, `t = 0` gives `self`.
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let t = t.clamp(0.0, 1.0);
        self * (1.0 - t) + other * t
    }
}

impl Add for Color {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            r: self.r + rhs.r,
            g: self.g + rhs.g,
            b: self.b + rhs.b,
            a: self.a + rhs.a,
        }
    }
}

impl Mul<f32> for Color {
    type Output = Self;

    fn mul(self, k: f32) -> Self {
        Self {
            r: self.r * k,
            g: self.g * k,
            b: self.b * k,
            a: self.a * k,
        }
    }
}

impl FromStr for Color {
    type Err = String;

    /// `r,g,b[,a]`. Components above 1 switch the whole colour to a 0..255 scale.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<f32> = s
            .split(',')
            .map(|p| p.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .map_err(|_| format!("invalid colour: {s}"))?;

        let (r, g, b, a) = match parts.as_slice() {
            [r, g, b] => (*r, *g, *b, None),
            [r, g, b, a] => (*r, *g, *b, Some(*a)),
            _ => return Err(format!("colour needs 3 or 4 components: {s}")),
        };
        let scale = if parts.iter().any(|&c| c > 1.0) {
            1.0 / 255.0
        } else {
            1.0
        };
        Ok(Self {
            r: r * scale,
            g: g * scale,
            b: b * scale,
            a: a.map_or(1.0, |a| a * scale),
        })
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.r, self.g, self.b, self.a)
    }
}

/// Fixed-size ring of image lines.
///
/// Each block writes one line of `width` pixels; `height` lines are kept.
/// Consecutive identical flat lines are counted so an image that has been
/// only background for a full ring reports [`is_empty`](Self::is_empty).
#[derive(Debug, Clone)]
pub struct LinedImage {
    lines: Buffer2D<Color>,
    background: Color,
    last_line: usize,
    same_lines: usize,
    last_fill: Color,
}

impl LinedImage {
    /// Creates an image filled with `background`.
    pub fn new(width: usize, height: usize, background: Color) -> Self {
        let mut lines = Buffer2D::new(height, width);
        lines.fill(background);
        Self {
            lines,
            background,
            last_line: 0,
            same_lines: height,
            last_fill: background,
        }
    }

    /// Pixels per line.
    pub fn width(&self) -> usize {
        self.lines.columns()
    }

    /// Number of lines kept.
    pub fn height(&self) -> usize {
        self.lines.rows()
    }

    /// Advances the ring and returns the new line for manual drawing.
    pub fn next_line(&mut self) -> &mut [Color] {
        self.same_lines = 0;
        self.advance()
    }

    /// Advances the ring with a single-colour line.
    ///
    /// Once the whole ring holds the same flat colour further writes are
    /// skipped.
    pub fn fill_next_line_flat(&mut self, color: Color) {
        if self.same_lines == 0 || self.last_fill != color {
            self.last_fill = color;
            self.same_lines = 1;
        } else {
            if self.same_lines >= self.height() {
                return;
            }
            self.same_lines += 1;
        }
        self.advance().fill(color);
    }

    /// True when every line is the flat background.
    pub fn is_empty(&self) -> bool {
        self.same_lines >= self.height() && self.last_fill == self.background
    }

    /// Copies the image oldest line first into `out` (`height × width`).
    pub fn copy_ordered(&self, out: &mut Buffer2D<Color>) {
        let (height, width) = (self.height(), self.width());
        out.reshape(height, width, self.background);
        for i in 0..height {
            let src = (self.last_line + 1 + i) % height.max(1);
            if let (Some(from), Some(to)) = (self.lines.row(src), out.row_mut(i)) {
                to.copy_from_slice(from);
            }
        }
    }

    fn advance(&mut self) -> &mut [Color] {
        let height = self.height();
        if height == 0 {
            return &mut [];
        }
        self.last_line = (self.last_line + 1) % height;
        self.lines.row_mut(self.last_line).unwrap_or(&mut [])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_color_parse() {
        assert_eq!("1,0,0".parse::<Color>(), Ok(Color::rgb(1.0, 0.0, 0.0)));
        let c: Color = "255, 0, 51, 255".parse().unwrap();
        assert!((c.b - 0.2).abs() < 1e-6);
        assert!((c.a - 1.0).abs() < 1e-6);
        assert!("1,2".parse::<Color>().is_err());
        assert!("a,b,c".parse::<Color>().is_err());
    }

    #[test]
    fn test_lerp() {
        let mid = Color::BLACK.lerp(Color::WHITE, 0.5);
        assert_eq!(mid, Color::rgb(0.5, 0.5, 0.5));
        assert_eq!(Color::BLACK.lerp(Color::WHITE, 3.0), Color::WHITE);
    }

    #[test]
    fn test_empty_tracking() {
        let mut image = LinedImage::new(4, 3, Color::BLACK);
        assert!(image.is_empty());

        image.next_line().fill(Color::WHITE);
        assert!(!image.is_empty());

        for _ in 0..2 {
            image.fill_next_line_flat(Color::BLACK);
        }
        assert!(!image.is_empty());
        image.fill_next_line_flat(Color::BLACK);
        assert!(image.is_empty());
    }

    #[test]
    fn test_ordered_copy() {
        let mut image = LinedImage::new(1, 3, Color::BLACK);
        image.next_line()[0] = Color::rgb(0.1, 0.0, 0.0);
        image.next_line()[0] = Color::rgb(0.2, 0.0, 0.0);
        let mut out = Buffer2D::default();
        image.copy_ordered(&mut out);
        assert_eq!(out.row(0).unwrap()[0], Color::BLACK);
        assert_eq!(out.row(1).unwrap()[0].r, 0.1);
        assert_eq!(out.row(2).unwrap()[0].r, 0.2);
    }
}
