// Software compositor: paints a mounted widget's tree onto the host canvas.
// Back to front: surface reflection, button body, details layer
// (fingerprints + cursor reflection).

use crate::builder::{FINGERPRINT_CLASS, PRESSED_CLASS};
use crate::draw::{self, cursor_cell, cursor_glyph_size};
use crate::error::Error;
use crate::style::{Filter, Transform};
use crate::tree::{Node, NodeId, NodeKind, RenderTree};
use crate::types::{FrameBuffer, Mask, Rect};
use crate::vision::{self, GammaLut, Layer};
use crate::widget::{FINGERPRINT_SIZE, ShinyButton};
use std::collections::HashMap;

const SURFACE_OPACITY: f32 = 0.55;
const BUTTON_REFLECTION_OPACITY: f32 = 0.85;
const BUTTON_BASE: u32 = 0x00_2A_2D_33;
const PRESSED_DIM: f32 = 0.8;
const SHADOW_MAX_ALPHA: f32 = 0.45;
const PRESSED_SHADE: f32 = 0.15;
const TEXT_COLOR: u32 = 0x00_F4_F4_F4;
const TEXT_SCALE: i32 = 2;
const CURSOR_SCALE: usize = 2;
const SMUDGE_STRENGTH: f32 = 0.18;
const SMUDGE_COLOR: u32 = 0x00_E8_EC_F0;

/// Filtered background images are reused until the image, size or filter changes.
#[derive(Clone, Debug, PartialEq)]
struct CacheKey {
    image: usize,
    width: usize,
    height: usize,
    filter: Option<String>,
}

#[derive(Default)]
pub struct Compositor {
    lut: GammaLut,
    backgrounds: HashMap<NodeId, (CacheKey, Layer)>,
}

impl Compositor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paint `widget` at its mount origin. Unmounted widgets paint nothing.
    pub fn render(&mut self, widget: &ShinyButton, canvas: &mut FrameBuffer) -> Result<(), Error> {
        if !widget.is_mounted() {
            return Ok(());
        }
        let tree = widget.tree();
        let parts = widget.parts();

        let container = widget.container_rect();
        let container_radius = radius_of(tree, parts.container);
        let container_pressed = tree.has_class(parts.container, PRESSED_CLASS);

        // 1) Surface reflection behind the button.
        let surface_pressed = tree.has_class(parts.surface_reflection, PRESSED_CLASS);
        if let Some(mut layer) =
            self.media_layer(tree, parts.surface_reflection, rect_size(container))?
        {
            if surface_pressed {
                vision::dim(&mut layer.color, PRESSED_DIM);
            }
            self.blit(canvas, &layer, container, container_radius, SURFACE_OPACITY);
        }

        // 2) Button body, sunk one pixel while pressed.
        let button_pressed = tree.has_class(parts.button, PRESSED_CLASS);
        let mut button = widget.button_rect();
        if container_pressed || button_pressed {
            button.y += 1.0;
        }
        let button_radius = radius_of(tree, parts.button);
        fill_rounded(canvas, button, button_radius, BUTTON_BASE, 1.0, &self.lut);

        if let Some(layer) = self.media_layer(tree, parts.button_reflection, rect_size(button))? {
            self.blit(canvas, &layer, button, button_radius, BUTTON_REFLECTION_OPACITY);
        }
        if tree.get(parts.shadow).is_some_and(|n| !n.style.hidden) {
            shade_vertical(canvas, button, button_radius, SHADOW_MAX_ALPHA, &self.lut);
        }
        if button_pressed {
            fill_rounded(canvas, button, button_radius, 0, PRESSED_SHADE, &self.lut);
        }
        if let Some(NodeKind::Text(label)) = tree.get(parts.text).map(|n| &n.kind) {
            let w = draw::text_width_5x7(label, TEXT_SCALE);
            let h = draw::GLYPH_H * TEXT_SCALE;
            let c = button.center();
            draw::draw_text_5x7_scaled(
                canvas,
                c.x.round() as i32 - w / 2,
                c.y.round() as i32 - h / 2,
                label,
                TEXT_COLOR,
                TEXT_SCALE,
            );
        }

        // 3) Details layer: rounded only when the corner shim applied a radius.
        let details = widget.details_rect();
        let details_radius = radius_of(tree, parts.details);
        let mut overlay = transparent_layer(rect_size(details));
        for &child in tree.children(parts.details) {
            let Some(node) = tree.get(child) else { continue };
            if node.classes.contains(FINGERPRINT_CLASS) && !node.style.hidden {
                if let Some(t) = node.style.transform {
                    paint_smudge(&mut overlay, t.x, t.y, FINGERPRINT_SIZE / 2.0);
                }
            }
        }
        if let Some(cursor) = tree.get(parts.cursor) {
            if cursor.style.opacity > 0.0 && !cursor.style.hidden {
                let t = cursor.style.transform.unwrap_or(Transform::centered_at(0.0, 0.0));
                paint_cursor(&mut overlay, t.x, t.y, cursor.style.opacity);
            }
        }
        self.blit(canvas, &overlay, details, details_radius, 1.0);
        Ok(())
    }

    /// The frame or background a video node currently shows, covered to `size` and filtered.
    fn media_layer(
        &mut self,
        tree: &RenderTree,
        id: NodeId,
        size: (usize, usize),
    ) -> Result<Option<Layer>, Error> {
        let Some(node) = tree.get(id) else { return Ok(None) };
        if node.style.hidden || size.0 == 0 || size.1 == 0 {
            return Ok(None);
        }
        let filter = node.style.filter;

        if let Some(frame) = live_frame(node) {
            let covered = vision::cover(&frame, size.0, size.1);
            let color = match &filter {
                Some(f) => vision::apply_filter(&covered, f)?,
                None => covered,
            };
            return Ok(Some(Layer::opaque(color)));
        }

        let Some(bg) = node.style.background.as_ref() else { return Ok(None) };
        let key = CacheKey {
            image: std::sync::Arc::as_ptr(&bg.image) as usize,
            width: size.0,
            height: size.1,
            filter: filter.as_ref().map(Filter::to_string),
        };
        if let Some((cached_key, layer)) = self.backgrounds.get(&id) {
            if *cached_key == key {
                return Ok(Some(layer.clone()));
            }
        }
        let mut layer = vision::cover_layer(&vision::rgba_to_layer(&bg.image), size.0, size.1);
        if let Some(f) = &filter {
            layer.color = vision::apply_filter(&layer.color, f)?;
        }
        self.backgrounds.insert(id, (key, layer.clone()));
        Ok(Some(layer))
    }

    /// Lay `layer` over `canvas` at `rect`, clipped to its rounded corners.
    fn blit(&self, canvas: &mut FrameBuffer, layer: &Layer, rect: Rect, radius: f32, opacity: f32) {
        let x0 = rect.x.floor() as i64;
        let y0 = rect.y.floor() as i64;
        for ly in 0..layer.height() {
            let cy = y0 + ly as i64;
            if cy < 0 || cy >= canvas.height as i64 {
                continue;
            }
            for lx in 0..layer.width() {
                let cx = x0 + lx as i64;
                if cx < 0 || cx >= canvas.width as i64 {
                    continue;
                }
                let i = ly * layer.width() + lx;
                let a = layer.alpha.alpha[i] * opacity;
                if a <= 0.0 {
                    continue;
                }
                let cover = rounded_coverage(rect, radius, cx as f32 + 0.5, cy as f32 + 0.5);
                if cover <= 0.0 {
                    continue;
                }
                let ci = cy as usize * canvas.width + cx as usize;
                canvas.pixels[ci] = self.lut.mix(canvas.pixels[ci], layer.color.pixels[i], a * cover);
            }
        }
    }
}

fn live_frame(node: &Node) -> Option<FrameBuffer> {
    let video = node.video()?;
    if video.video_hidden {
        return None;
    }
    video.stream.as_ref()?.latest_frame()
}

fn radius_of(tree: &RenderTree, id: NodeId) -> f32 {
    tree.get(id).and_then(|n| n.style.border_radius).unwrap_or(0) as f32
}

fn rect_size(r: Rect) -> (usize, usize) {
    (r.width.max(0.0).round() as usize, r.height.max(0.0).round() as usize)
}

fn transparent_layer((w, h): (usize, usize)) -> Layer {
    Layer {
        color: FrameBuffer::new(w, h),
        alpha: Mask { width: w, height: h, alpha: vec![0.0; w * h] },
    }
}

/// Antialiased coverage of pixel centre `(px,py)` by a rounded rect.
/// Radii larger than half the short side are reduced, as CSS does.
pub fn rounded_coverage(rect: Rect, radius: f32, px: f32, py: f32) -> f32 {
    let r = radius.clamp(0.0, rect.width.min(rect.height) / 2.0);
    let c = rect.center();
    let hx = rect.width / 2.0 - r;
    let hy = rect.height / 2.0 - r;
    let qx = (px - c.x).abs() - hx;
    let qy = (py - c.y).abs() - hy;
    let outside = (qx.max(0.0).powi(2) + qy.max(0.0).powi(2)).sqrt();
    let inside = qx.max(qy).min(0.0);
    let dist = outside + inside - r;
    (0.5 - dist).clamp(0.0, 1.0)
}

fn fill_rounded(canvas: &mut FrameBuffer, rect: Rect, radius: f32, color: u32, alpha: f32, lut: &GammaLut) {
    for_each_covered(canvas, rect, radius, |canvas, i, cover, _t| {
        canvas.pixels[i] = lut.mix(canvas.pixels[i], color, alpha * cover);
    });
}

/// Darkens toward the bottom edge: transparent at the top, `max_alpha` black at the bottom.
fn shade_vertical(canvas: &mut FrameBuffer, rect: Rect, radius: f32, max_alpha: f32, lut: &GammaLut) {
    for_each_covered(canvas, rect, radius, |canvas, i, cover, t| {
        canvas.pixels[i] = lut.mix(canvas.pixels[i], 0, max_alpha * t * cover);
    });
}

/// Calls `f(canvas, index, coverage, t)` for every canvas pixel inside `rect`,
/// where `t` runs 0..1 from the top edge to the bottom.
fn for_each_covered(
    canvas: &mut FrameBuffer,
    rect: Rect,
    radius: f32,
    mut f: impl FnMut(&mut FrameBuffer, usize, f32, f32),
) {
    let x0 = rect.x.floor().max(0.0) as usize;
    let y0 = rect.y.floor().max(0.0) as usize;
    let x1 = ((rect.x + rect.width).ceil().max(0.0) as usize).min(canvas.width);
    let y1 = ((rect.y + rect.height).ceil().max(0.0) as usize).min(canvas.height);
    for y in y0..y1 {
        let t = if rect.height > 0.0 {
            ((y as f32 + 0.5 - rect.y) / rect.height).clamp(0.0, 1.0)
        } else {
            0.0
        };
        for x in x0..x1 {
            let cover = rounded_coverage(rect, radius, x as f32 + 0.5, y as f32 + 0.5);
            if cover > 0.0 {
                f(canvas, y * canvas.width + x, cover, t);
            }
        }
    }
}

/// Soft oily disc centred at `(cx,cy)`; overlapping marks build up.
fn paint_smudge(layer: &mut Layer, cx: f32, cy: f32, radius: f32) {
    if radius <= 0.0 {
        return;
    }
    let sigma = radius * 0.5;
    let denom = 2.0 * sigma * sigma;
    let (w, h) = (layer.width() as i64, layer.height() as i64);
    let x0 = (cx - radius).floor() as i64;
    let x1 = (cx + radius).ceil() as i64;
    let y0 = (cy - radius).floor() as i64;
    let y1 = (cy + radius).ceil() as i64;
    for y in y0.max(0)..=y1.min(h - 1) {
        for x in x0.max(0)..=x1.min(w - 1) {
            let dx = x as f32 + 0.5 - cx;
            let dy = y as f32 + 0.5 - cy;
            let d2 = dx * dx + dy * dy;
            if d2 > radius * radius {
                continue;
            }
            let a = (-d2 / denom).exp() * SMUDGE_STRENGTH;
            let i = y as usize * layer.width() + x as usize;
            let old = layer.alpha.alpha[i];
            layer.alpha.alpha[i] = old + a * (1.0 - old);
            layer.color.pixels[i] = SMUDGE_COLOR;
        }
    }
}

/// Cursor glyph centred on `(cx,cy)` at `opacity`.
fn paint_cursor(layer: &mut Layer, cx: f32, cy: f32, opacity: f32) {
    let (gw, gh) = cursor_glyph_size();
    let left = (cx - (gw * CURSOR_SCALE) as f32 / 2.0).round() as i64;
    let top = (cy - (gh * CURSOR_SCALE) as f32 / 2.0).round() as i64;
    let (w, h) = (layer.width() as i64, layer.height() as i64);
    for row in 0..gh * CURSOR_SCALE {
        for col in 0..gw * CURSOR_SCALE {
            let Some(color) = cursor_cell(col / CURSOR_SCALE, row / CURSOR_SCALE) else { continue };
            let x = left + col as i64;
            let y = top + row as i64;
            if x < 0 || y < 0 || x >= w || y >= h {
                continue;
            }
            let i = y as usize * layer.width() + x as usize;
            layer.color.pixels[i] = color;
            layer.alpha.alpha[i] = opacity.clamp(0.0, 1.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::HostAgent;
    use crate::config::ButtonOptions;
    use crate::interaction::InputEvent;
    use crate::media::testing::{ScriptedSource, wait_until};
    use crate::media::{StreamConstraints, UnavailableSource};
    use crate::types::Point;

    const PAGE: u32 = 0x00_10_10_10;

    fn widget(source: Box<dyn crate::media::MediaSource>) -> ShinyButton {
        let opts = ButtonOptions { width: 120, height: 60, border_radius: 20, ..Default::default() };
        ShinyButton::new(opts, &HostAgent::native(), source, StreamConstraints::default())
    }

    #[test]
    fn unmounted_widget_paints_nothing() {
        let b = widget(Box::new(UnavailableSource::new("test")));
        let mut canvas = FrameBuffer::filled(200, 100, PAGE);
        Compositor::new().render(&b, &mut canvas).unwrap();
        assert!(canvas.pixels.iter().all(|&p| p == PAGE));
    }

    #[test]
    fn mounted_widget_paints_inside_its_box_only() {
        let mut b = widget(Box::new(UnavailableSource::new("test")));
        b.mount(Point::new(40.0, 20.0));
        assert!(wait_until(|| b.poll_media()));
        let mut canvas = FrameBuffer::filled(200, 100, PAGE);
        Compositor::new().render(&b, &mut canvas).unwrap();

        assert_ne!(canvas.get(100, 50), Some(PAGE));
        assert_eq!(canvas.get(10, 10), Some(PAGE));
        assert_eq!(canvas.get(170, 90), Some(PAGE));
        // Rounded corner stays clear.
        assert_eq!(canvas.get(40, 20), Some(PAGE));
    }

    #[test]
    fn cursor_shows_only_when_focused() {
        let mut b = widget(Box::new(UnavailableSource::new("test")));
        b.mount(Point::new(0.0, 0.0));
        b.handle(&InputEvent::PointerMove { client: Point::new(30.0, 30.0) });

        let mut comp = Compositor::new();
        let mut hidden = FrameBuffer::filled(120, 60, PAGE);
        comp.render(&b, &mut hidden).unwrap();

        b.handle(&InputEvent::ContainerEnter);
        let mut shown = FrameBuffer::filled(120, 60, PAGE);
        comp.render(&b, &mut shown).unwrap();
        assert_ne!(hidden, shown);
    }

    #[test]
    fn fingerprint_changes_pixels_at_mark() {
        let mut b = widget(Box::new(UnavailableSource::new("test")));
        b.mount(Point::new(0.0, 0.0));
        let mut comp = Compositor::new();
        let mut before = FrameBuffer::filled(120, 60, PAGE);
        comp.render(&b, &mut before).unwrap();

        // Left of the label.
        b.handle(&InputEvent::ButtonPointerDown { client: Point::new(15.0, 30.0) });
        b.handle(&InputEvent::ButtonPointerUp);
        let mut after = FrameBuffer::filled(120, 60, PAGE);
        comp.render(&b, &mut after).unwrap();
        assert_ne!(before.get(15, 30), after.get(15, 30));
    }

    #[test]
    fn live_frames_reach_the_canvas() {
        let mut b = widget(Box::new(ScriptedSource::working(0x00_FF_00_00)));
        b.mount(Point::new(0.0, 0.0));
        assert!(wait_until(|| b.poll_media()));
        let stream = b
            .tree()
            .get(b.parts().button_reflection)
            .and_then(Node::video)
            .and_then(|v| v.stream.clone())
            .unwrap();
        assert!(wait_until(|| stream.latest_frame().is_some()));

        let mut canvas = FrameBuffer::filled(120, 60, PAGE);
        Compositor::new().render(&b, &mut canvas).unwrap();
        let p = canvas.get(20, 30).unwrap();
        let (r, g) = ((p >> 16) & 0xFF, (p >> 8) & 0xFF);
        assert!(r > g, "reflection should tint the button red, got {p:06x}");
        b.destroy();
    }

    #[test]
    fn rounded_coverage_corners() {
        let r = Rect::new(0.0, 0.0, 100.0, 50.0);
        assert_eq!(rounded_coverage(r, 20.0, 50.0, 25.0), 1.0);
        assert_eq!(rounded_coverage(r, 20.0, 0.5, 0.5), 0.0);
        assert_eq!(rounded_coverage(r, 0.0, 0.5, 0.5), 1.0);
        assert_eq!(rounded_coverage(r, 20.0, 150.0, 25.0), 0.0);
        // Oversized radius turns the rect into a pill, not an error.
        assert_eq!(rounded_coverage(r, 500.0, 50.0, 25.0), 1.0);
    }
}
