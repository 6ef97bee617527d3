//! Shared types for regionshot
//!
//! Geometry, raw capture images and the selector configuration. These are
//! shared between the overlay renderer (regionshot-overlay) and the host
//! binary that feeds it captured screens.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bytes per RGBA8 pixel
pub const BYTES_PER_PIXEL: usize = 4;

// ─────────────────────────────────────────────────────────────────────────────
// Geometry
// ─────────────────────────────────────────────────────────────────────────────

/// A display rectangle in virtual-screen coordinates.
///
/// `x`/`y` is the top-left (minimum) corner. Monitors left of or above the
/// primary display have negative origins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    pub fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Minimum corner (the origin)
    pub fn min(&self) -> (i32, i32) {
        (self.x, self.y)
    }

    /// Maximum corner (exclusive), widened so it cannot overflow
    pub fn max(&self) -> (i64, i64) {
        (
            i64::from(self.x) + i64::from(self.width),
            i64::from(self.y) + i64::from(self.height),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Check if `other` lies entirely inside this rectangle
    pub fn contains_rect(&self, other: &Rect) -> bool {
        let (max_x, max_y) = self.max();
        let (other_max_x, other_max_y) = other.max();
        other.x >= self.x && other.y >= self.y && other_max_x <= max_x && other_max_y <= max_y
    }
}

impl fmt::Display for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}x{}", self.x, self.y, self.width, self.height)
    }
}

/// Errors when parsing a rectangle from `X,Y,WxH`
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseRectError {
    #[error("expected X,Y,WxH but got '{0}'")]
    Format(String),

    #[error("invalid number '{0}'")]
    Number(String),
}

impl FromStr for Rect {
    type Err = ParseRectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(',').collect();
        let [x, y, size] = parts.as_slice() else {
            return Err(ParseRectError::Format(s.to_string()));
        };
        let (width, height) = size
            .split_once(['x', 'X'])
            .ok_or_else(|| ParseRectError::Format(s.to_string()))?;

        fn num<T: FromStr>(v: &str) -> Result<T, ParseRectError> {
            v.trim()
                .parse()
                .map_err(|_| ParseRectError::Number(v.trim().to_string()))
        }

        Ok(Rect::new(num(x)?, num(y)?, num(width)?, num(height)?))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw images
// ─────────────────────────────────────────────────────────────────────────────

/// Errors when constructing a raw image
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImageError {
    #[error("image has zero size ({width}x{height})")]
    Empty { width: u32, height: u32 },

    #[error("pixel buffer is {actual} bytes, expected {expected} for {width}x{height} RGBA")]
    BufferSize {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
}

/// Expected RGBA8 buffer length for a `width` x `height` region
pub fn rgba_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * BYTES_PER_PIXEL
}

/// A tightly packed RGBA8 image, rows ordered top to bottom.
#[derive(Clone, PartialEq, Eq)]
pub struct RawImage {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl fmt::Debug for RawImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl RawImage {
    /// Wrap an RGBA8 buffer, validating its length
    pub fn new(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, ImageError> {
        if width == 0 || height == 0 {
            return Err(ImageError::Empty { width, height });
        }
        let expected = rgba_len(width, height);
        if pixels.len() != expected {
            return Err(ImageError::BufferSize {
                width,
                height,
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// An image filled with one colour
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, ImageError> {
        let pixels = rgba.repeat(width as usize * height as usize);
        Self::new(width, height, pixels)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// RGBA value at (x, y), if inside the image
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * BYTES_PER_PIXEL;
        let p = &self.pixels[offset..offset + BYTES_PER_PIXEL];
        Some([p[0], p[1], p[2], p[3]])
    }

    /// A dimmed copy used as the selection backdrop.
    ///
    /// Colour channels are scaled by `factor` (clamped to 0..=1); alpha is kept.
    pub fn darkened(&self, factor: f32) -> RawImage {
        let factor = factor.clamp(0.0, 1.0);
        let pixels = self
            .pixels
            .chunks_exact(BYTES_PER_PIXEL)
            .flat_map(|p| {
                [
                    (p[0] as f32 * factor).round() as u8,
                    (p[1] as f32 * factor).round() as u8,
                    (p[2] as f32 * factor).round() as u8,
                    p[3],
                ]
            })
            .collect();
        RawImage {
            width: self.width,
            height: self.height,
            pixels,
        }
    }

    /// Copy out a sub-rectangle (relative to the image), rows top to bottom
    pub fn crop(&self, left: u32, top: u32, width: u32, height: u32) -> Option<Vec<u8>> {
        if left.checked_add(width)? > self.width || top.checked_add(height)? > self.height {
            return None;
        }
        let stride = self.width as usize * BYTES_PER_PIXEL;
        let row_len = width as usize * BYTES_PER_PIXEL;
        let mut out = Vec::with_capacity(rgba_len(width, height));
        for row in top as usize..(top + height) as usize {
            let start = row * stride + left as usize * BYTES_PER_PIXEL;
            out.extend_from_slice(&self.pixels[start..start + row_len]);
        }
        Some(out)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// How overlay windows are placed full-screen on their monitor.
///
/// Some window systems add decorations when a monitor is passed at window
/// creation; those need a windowed creation followed by a re-bind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorBinding {
    /// Pick per platform (re-bind on Linux, bind at creation elsewhere)
    #[default]
    Auto,
    /// Create the window full-screen on its monitor
    AtCreation,
    /// Create windowed, then switch to full-screen using the monitor's refresh rate
    RebindAfterCreation,
}

impl MonitorBinding {
    /// Resolve `Auto` for the platform this was compiled for
    pub fn resolve(self) -> MonitorBinding {
        match self {
            MonitorBinding::Auto if cfg!(target_os = "linux") => {
                MonitorBinding::RebindAfterCreation
            }
            MonitorBinding::Auto => MonitorBinding::AtCreation,
            other => other,
        }
    }
}

fn default_window_title() -> String {
    "regionshot region selector".to_string()
}

fn default_true() -> bool {
    true
}

fn default_clear_color() -> [f32; 4] {
    [1.0, 1.0, 1.0, 1.0]
}

fn default_dim_factor() -> f32 {
    0.5
}

/// Region selector settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectorConfig {
    #[serde(default = "default_window_title")]
    pub window_title: String,
    /// Linear texture filtering (nearest when false)
    #[serde(default = "default_true")]
    pub smooth: bool,
    /// Framebuffer clear colour (RGBA, 0..1)
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
    #[serde(default)]
    pub monitor_binding: MonitorBinding,
    /// Brightness multiplier for the darkened backdrop
    #[serde(default = "default_dim_factor")]
    pub dim_factor: f32,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            window_title: default_window_title(),
            smooth: true,
            clear_color: default_clear_color(),
            monitor_binding: MonitorBinding::Auto,
            dim_factor: default_dim_factor(),
        }
    }
}
