// Per-node style state mutated by the widget and read by the compositor.
// Display impls produce the CSS text each value stands for.

use image::RgbaImage;
use std::fmt;
use std::sync::Arc;

/// `translate(x, y)`, optionally followed by a self-centering `translate(-50%, -50%)`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub x: f32,
    pub y: f32,
    pub centered: bool,
}

impl Transform {
    pub fn centered_at(x: f32, y: f32) -> Self {
        Self { x, y, centered: true }
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "translate({}px, {}px)", self.x, self.y)?;
        if self.centered {
            write!(f, " translate(-50%, -50%)")?;
        }
        Ok(())
    }
}

pub const REFLECTION_SATURATE: f32 = 0.4;
pub const REFLECTION_BRIGHTNESS: f32 = 1.1;
pub const SURFACE_BLUR_PX: i64 = 24;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Filter {
    pub blur_px: i64,
    pub saturate: f32,
    pub brightness: f32,
}

impl Filter {
    /// The button reflection: roughness-driven blur, washed out and slightly brightened.
    pub fn reflection(blur_px: i64) -> Self {
        Self { blur_px, saturate: REFLECTION_SATURATE, brightness: REFLECTION_BRIGHTNESS }
    }

    /// The small surface reflection under the button; always heavily blurred.
    pub fn surface() -> Self {
        Self::reflection(SURFACE_BLUR_PX)
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "blur({}px) saturate({}) brightness({})",
            self.blur_px, self.saturate, self.brightness
        )
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackgroundSize {
    Cover,
}

#[derive(Clone, Debug)]
pub struct Background {
    pub image: Arc<RgbaImage>,
    pub size: BackgroundSize,
}

impl Background {
    pub fn cover(image: Arc<RgbaImage>) -> Self {
        Self { image, size: BackgroundSize::Cover }
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }
}

#[derive(Clone, Debug)]
pub struct Style {
    pub transform: Option<Transform>,
    pub opacity: f32,
    pub filter: Option<Filter>,
    pub background: Option<Background>,
    /// `display: none` for the whole node.
    pub hidden: bool,
    pub border_radius: Option<u32>,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            transform: None,
            opacity: 1.0,
            filter: None,
            background: None,
            hidden: false,
            border_radius: None,
        }
    }
}
