// Pixel operations behind the CSS-like styles: blur, saturate/brightness,
// object-fit: cover resampling and gamma-correct layer mixing.
// Everything works on packed 0x00RRGGBB buffers; alpha travels in a `Mask`.

use crate::error::Error;
use crate::style::Filter;
use crate::types::{FrameBuffer, Mask};
use image::RgbaImage;

/// A colour buffer plus its coverage.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    pub color: FrameBuffer,
    pub alpha: Mask,
}

impl Layer {
    pub fn opaque(color: FrameBuffer) -> Self {
        let alpha = Mask::opaque(color.width, color.height);
        Self { color, alpha }
    }

    pub fn width(&self) -> usize {
        self.color.width
    }

    pub fn height(&self) -> usize {
        self.color.height
    }
}

#[inline]
fn unpack(p: u32) -> (u32, u32, u32) {
    ((p >> 16) & 0xFF, (p >> 8) & 0xFF, p & 0xFF)
}

#[inline]
fn pack(r: u32, g: u32, b: u32) -> u32 {
    (r << 16) | (g << 8) | b
}

/// Straight-alpha RGBA image to a layer.
pub fn rgba_to_layer(img: &RgbaImage) -> Layer {
    let (w, h) = (img.width() as usize, img.height() as usize);
    let mut color = FrameBuffer::new(w, h);
    let mut alpha = Mask { width: w, height: h, alpha: vec![0.0; w * h] };
    for (i, p) in img.pixels().enumerate() {
        color.pixels[i] = pack(p[0] as u32, p[1] as u32, p[2] as u32);
        alpha.alpha[i] = p[3] as f32 / 255.0;
    }
    Layer { color, alpha }
}

/// Source index for every destination pixel when `src_w×src_h` covers `dst_w×dst_h`:
/// scaled uniformly until both axes are filled, centred, overflow cropped.
fn cover_map(src_w: usize, src_h: usize, dst_w: usize, dst_h: usize) -> Vec<usize> {
    let mut map = Vec::with_capacity(dst_w * dst_h);
    if src_w == 0 || src_h == 0 {
        return map;
    }
    let scale = (dst_w as f32 / src_w as f32).max(dst_h as f32 / src_h as f32);
    let off_x = (src_w as f32 * scale - dst_w as f32) / 2.0;
    let off_y = (src_h as f32 * scale - dst_h as f32) / 2.0;
    for y in 0..dst_h {
        let sy = (((y as f32 + 0.5 + off_y) / scale) as usize).min(src_h - 1);
        for x in 0..dst_w {
            let sx = (((x as f32 + 0.5 + off_x) / scale) as usize).min(src_w - 1);
            map.push(sy * src_w + sx);
        }
    }
    map
}

/// Resample `src` to exactly `width×height` with object-fit: cover.
pub fn cover(src: &FrameBuffer, width: usize, height: usize) -> FrameBuffer {
    let map = cover_map(src.width, src.height, width, height);
    if map.is_empty() {
        return FrameBuffer::new(width, height);
    }
    FrameBuffer { width, height, pixels: map.iter().map(|&i| src.pixels[i]).collect() }
}

/// `cover` for a layer; colour and alpha stay aligned.
pub fn cover_layer(src: &Layer, width: usize, height: usize) -> Layer {
    let map = cover_map(src.width(), src.height(), width, height);
    if map.is_empty() {
        return Layer {
            color: FrameBuffer::new(width, height),
            alpha: Mask { width, height, alpha: vec![0.0; width * height] },
        };
    }
    Layer {
        color: FrameBuffer {
            width,
            height,
            pixels: map.iter().map(|&i| src.color.pixels[i]).collect(),
        },
        alpha: Mask { width, height, alpha: map.iter().map(|&i| src.alpha.alpha[i]).collect() },
    }
}

/// Separable box blur with clamped edges (no dark borders).
pub fn box_blur_rgb(
    src: &FrameBuffer,
    tmp: &mut FrameBuffer, // horizontal pass result (scratch)
    dst: &mut FrameBuffer,
    radius: usize,
) -> Result<(), Error> {
    // 1) All three buffers must share a size, else rows would smear into each other.
    if src.width != dst.width || src.height != dst.height {
        return Err(Error::Compose("box_blur: size mismatch src↔dst".into()));
    }
    if tmp.width != src.width || tmp.height != src.height {
        return Err(Error::Compose("box_blur: size mismatch tmp".into()));
    }
    let w = src.width;
    let h = src.height;
    if w == 0 || h == 0 {
        return Ok(());
    }
    let r = radius as isize;
    let win = (2 * radius + 1) as u32; // pixels in the sliding window

    // 2) Horizontal pass: rows of src into tmp. Edges repeat the border pixel.
    for y in 0..h {
        let row = y * w;
        let at = |x: isize| src.pixels[row + x.clamp(0, w as isize - 1) as usize];
        let (mut sr, mut sg, mut sb) = (0u32, 0u32, 0u32);
        for x in -r..=r {
            // Prime the window centred on x = 0
            let (pr, pg, pb) = unpack(at(x));
            sr += pr;
            sg += pg;
            sb += pb;
        }
        for x in 0..w as isize {
            tmp.pixels[row + x as usize] = pack(sr / win, sg / win, sb / win);
            // Slide: add the pixel entering on the right, drop the one leaving on the left
            let (ar, ag, ab) = unpack(at(x + r + 1));
            let (dr, dg, db) = unpack(at(x - r));
            sr = sr + ar - dr;
            sg = sg + ag - dg;
            sb = sb + ab - db;
        }
    }

    // 3) Vertical pass: columns of tmp into dst, same running sum.
    //    Visual: after both passes a sharp edge turns into a soft ramp `2r+1` px wide.
    for x in 0..w {
        let at = |y: isize| tmp.pixels[y.clamp(0, h as isize - 1) as usize * w + x];
        let (mut sr, mut sg, mut sb) = (0u32, 0u32, 0u32);
        for y in -r..=r {
            let (pr, pg, pb) = unpack(at(y));
            sr += pr;
            sg += pg;
            sb += pb;
        }
        for y in 0..h as isize {
            dst.pixels[y as usize * w + x] = pack(sr / win, sg / win, sb / win);
            let (ar, ag, ab) = unpack(at(y + r + 1));
            let (dr, dg, db) = unpack(at(y - r));
            sr = sr + ar - dr;
            sg = sg + ag - dg;
            sb = sb + ab - db;
        }
    }
    Ok(())
}

/// Two box passes approximate a gaussian of the same radius well enough for reflections.
/// Non-positive radii leave the image untouched, like `blur(0px)` and invalid CSS values.
pub fn blur(src: &FrameBuffer, radius: i64) -> Result<FrameBuffer, Error> {
    if radius <= 0 {
        return Ok(src.clone());
    }
    let half = (radius as usize).div_ceil(2); // two passes of r/2 spread about as far as one of r
    let mut tmp = FrameBuffer::new(src.width, src.height);
    let mut once = FrameBuffer::new(src.width, src.height);
    let mut twice = FrameBuffer::new(src.width, src.height);
    box_blur_rgb(src, &mut tmp, &mut once, half)?;
    box_blur_rgb(&once, &mut tmp, &mut twice, half)?;
    Ok(twice)
}

/// CSS `saturate(s) brightness(b)` applied per pixel.
pub fn color_filter(fb: &mut FrameBuffer, saturate: f32, brightness: f32) {
    let s = saturate;
    let m = [
        [0.213 + 0.787 * s, 0.715 - 0.715 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 + 0.285 * s, 0.072 - 0.072 * s],
        [0.213 - 0.213 * s, 0.715 - 0.715 * s, 0.072 + 0.928 * s],
    ];
    for p in &mut fb.pixels {
        let (r, g, b) = unpack(*p);
        let (r, g, b) = (r as f32, g as f32, b as f32);
        let ch = |row: [f32; 3]| {
            ((row[0] * r + row[1] * g + row[2] * b) * brightness).round().clamp(0.0, 255.0) as u32
        };
        *p = pack(ch(m[0]), ch(m[1]), ch(m[2]));
    }
}

/// Full filter chain in CSS order: blur, then saturate, then brightness.
pub fn apply_filter(src: &FrameBuffer, filter: &Filter) -> Result<FrameBuffer, Error> {
    let mut out = blur(src, filter.blur_px)?;
    color_filter(&mut out, filter.saturate, filter.brightness);
    Ok(out)
}

/// Scale every channel by `factor`; used for the pressed dimming.
pub fn dim(fb: &mut FrameBuffer, factor: f32) {
    color_filter(fb, 1.0, factor);
}

// ---------------------- sRGB <-> linear lookup (gamma-correct mixing) ----------------------

pub struct GammaLut {
    // sRGB(0..255) -> linear (0..1)
    srgb_to_linear: [f32; 256],
    // linear(0..1) -> sRGB(0..255), index = (linear * 4095).round()
    linear_to_srgb: [u8; 4096],
}

impl Default for GammaLut {
    fn default() -> Self {
        Self::new()
    }
}

impl GammaLut {
    pub fn new() -> Self {
        let mut s2l = [0.0f32; 256];
        for (v, slot) in s2l.iter_mut().enumerate() {
            let c = v as f32 / 255.0;
            *slot = if c <= 0.04045 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) };
        }
        let mut l2s = [0u8; 4096];
        for (i, slot) in l2s.iter_mut().enumerate() {
            let l = i as f32 / 4095.0;
            let s = if l <= 0.003_130_8 { 12.92 * l } else { 1.055 * l.powf(1.0 / 2.4) - 0.055 };
            *slot = (s * 255.0).round().clamp(0.0, 255.0) as u8;
        }
        Self { srgb_to_linear: s2l, linear_to_srgb: l2s }
    }

    #[inline]
    fn to_linear(&self, v: u32) -> f32 {
        self.srgb_to_linear[(v & 0xFF) as usize]
    }

    #[inline]
    fn to_srgb(&self, l: f32) -> u32 {
        self.linear_to_srgb[(l.clamp(0.0, 1.0) * 4095.0).round() as usize] as u32
    }

    /// Lay `src` over `dst` at coverage `a`, mixing in linear light.
    #[inline]
    pub fn mix(&self, dst: u32, src: u32, a: f32) -> u32 {
        if a <= 0.0 {
            return dst;
        }
        if a >= 1.0 {
            return src & 0x00FF_FFFF;
        }
        let (dr, dg, db) = unpack(dst);
        let (sr, sg, sb) = unpack(src);
        let inv = 1.0 - a;
        let r = self.to_srgb(a * self.to_linear(sr) + inv * self.to_linear(dr));
        let g = self.to_srgb(a * self.to_linear(sg) + inv * self.to_linear(dg));
        let b = self.to_srgb(a * self.to_linear(sb) + inv * self.to_linear(db));
        pack(r, g, b)
    }
}
