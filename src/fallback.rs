// Static reflection used when no camera stream is available:
// a translucent diagonal gradient, blurred and tinted like the live reflection.

use crate::config::blur_radius;
use crate::style::{REFLECTION_BRIGHTNESS, REFLECTION_SATURATE};
use crate::types::FrameBuffer;
use crate::vision::color_filter;
use image::{Rgba, RgbaImage, imageops};

/// (offset, r, g, b, alpha)
const STOPS: [(f32, f32, f32, f32, f32); 3] = [
    (0.0, 255.0, 255.0, 255.0, 0.3),
    (0.5, 200.0, 200.0, 200.0, 0.1),
    (1.0, 150.0, 150.0, 150.0, 0.3),
];

fn sample_stops(t: f32) -> [f32; 4] {
    let t = t.clamp(0.0, 1.0);
    let mut lo = STOPS[0];
    let mut hi = STOPS[STOPS.len() - 1];
    for pair in STOPS.windows(2) {
        if t >= pair[0].0 && t <= pair[1].0 {
            (lo, hi) = (pair[0], pair[1]);
            break;
        }
    }
    let span = hi.0 - lo.0;
    let k = if span > 0.0 { (t - lo.0) / span } else { 0.0 };
    let lerp = |a: f32, b: f32| a + (b - a) * k;
    [lerp(lo.1, hi.1), lerp(lo.2, hi.2), lerp(lo.3, hi.3), lerp(lo.4, hi.4)]
}

/// Gradient from the top-left corner `(0,0)` to `(width,height)`.
pub fn linear_gradient(width: u32, height: u32) -> RgbaImage {
    let (w, h) = (width.max(1), height.max(1));
    let (dx, dy) = (w as f32, h as f32);
    let len2 = dx * dx + dy * dy;
    RgbaImage::from_fn(w, h, |x, y| {
        // Project the pixel centre onto the gradient line.
        let t = ((x as f32 + 0.5) * dx + (y as f32 + 0.5) * dy) / len2;
        let [r, g, b, a] = sample_stops(t);
        Rgba([r.round() as u8, g.round() as u8, b.round() as u8, (a * 255.0).round() as u8])
    })
}

/// The fallback reflection for a widget of `width×height` at `roughness`.
pub fn gradient_image(width: u32, height: u32, roughness: f64) -> RgbaImage {
    // 1) Paint the diagonal stops at the button's size.
    let mut img = linear_gradient(width, height);

    // 2) Same blur the live reflection would get. Visual: rougher = softer bands.
    let radius = blur_radius(roughness);
    if radius > 0 {
        img = imageops::blur(&img, radius as f32);
    }
    // 3) Muted, slightly brightened, like the reflection filter.
    tint(&mut img, REFLECTION_SATURATE, REFLECTION_BRIGHTNESS);
    img
}

fn tint(img: &mut RgbaImage, saturate: f32, brightness: f32) {
    let mut fb = FrameBuffer {
        width: img.width() as usize,
        height: img.height() as usize,
        pixels: img
            .pixels()
            .map(|p| ((p[0] as u32) << 16) | ((p[1] as u32) << 8) | p[2] as u32)
            .collect(),
    };
    color_filter(&mut fb, saturate, brightness);
    for (p, packed) in img.pixels_mut().zip(&fb.pixels) {
        p[0] = ((packed >> 16) & 0xFF) as u8;
        p[1] = ((packed >> 8) & 0xFF) as u8;
        p[2] = (packed & 0xFF) as u8;
    }
}
