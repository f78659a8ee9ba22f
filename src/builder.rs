// Builds the widget's render tree from its options, once, at construction.

use crate::config::ButtonOptions;
use crate::style::{Filter, Transform};
use crate::tree::{NodeId, NodeKind, RenderTree, VideoSurface};
use crate::types::Rect;

pub const CONTAINER_CLASS: &str = "shiny-button-container";
pub const DETAILS_CLASS: &str = "shiny-button-details-container";
pub const CURSOR_CLIP_CLASS: &str = "shiny-button-hacky-cursor-inner-div";
pub const CURSOR_CLASS: &str = "shiny-button-cursor";
pub const SURFACE_REFLECTION_CLASS: &str = "shiny-button-surface-reflection";
pub const BUTTON_CLASS: &str = "shiny-button";
pub const BUTTON_REFLECTION_CLASS: &str = "shiny-button-reflection";
pub const SHADOW_CLASS: &str = "shiny-button-shadow";
pub const TEXT_CLASS: &str = "shiny-button-text";
pub const FINGERPRINT_CLASS: &str = "shiny-button-fingerprint";
pub const PRESSED_CLASS: &str = "pressed";

/// Gap between the container edge and the button body.
pub const BUTTON_INSET: f32 = 8.0;
/// Cursor glyph box, px.
pub const CURSOR_SIZE: f32 = 22.0;

/// Identifies the host runtime, like a user-agent string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HostAgent(pub String);

impl HostAgent {
    /// Default agent for the native host.
    pub fn native() -> Self {
        Self(format!(
            "shiny-button/{} ({})",
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS
        ))
    }

    /// Chromium-based hosts clip rounded layers correctly on their own.
    pub fn is_chromium(&self) -> bool {
        self.0.contains("Chrome")
    }
}

impl Default for HostAgent {
    fn default() -> Self {
        Self::native()
    }
}

/// The tree plus handles to every node the widget mutates later.
#[derive(Debug)]
pub struct Parts {
    pub tree: RenderTree,
    pub container: NodeId,
    pub details: NodeId,
    pub cursor_clip: NodeId,
    pub cursor: NodeId,
    pub surface_reflection: NodeId,
    pub button: NodeId,
    pub button_reflection: NodeId,
    pub shadow: NodeId,
    pub text: NodeId,
    /// Corner radius forced onto the details layer.
    pub show_border_radius: bool,
}

pub fn build(options: &ButtonOptions, agent: &HostAgent) -> Parts {
    let mut tree = RenderTree::new();
    let (w, h) = (options.width as f32, options.height as f32);
    let full = Rect::new(0.0, 0.0, w, h);
    let button_frame = Rect::new(
        BUTTON_INSET,
        BUTTON_INSET,
        (w - 2.0 * BUTTON_INSET).max(0.0),
        (h - 2.0 * BUTTON_INSET).max(0.0),
    );
    let button_full = Rect::new(0.0, 0.0, button_frame.width, button_frame.height);

    let container = tree.create(NodeKind::Block, CONTAINER_CLASS, full);
    if let Some(n) = tree.get_mut(container) {
        n.style.border_radius = Some(options.border_radius);
    }

    // Cursor reflection and fingerprints live in the details layer.
    let details = tree.create(NodeKind::Block, DETAILS_CLASS, full);
    let cursor_clip = tree.create(NodeKind::Block, CURSOR_CLIP_CLASS, full);
    let cursor = tree.create(
        NodeKind::Icon,
        CURSOR_CLASS,
        Rect::new(0.0, 0.0, CURSOR_SIZE, CURSOR_SIZE),
    );
    if let Some(n) = tree.get_mut(cursor) {
        n.style.opacity = 0.0;
        n.style.transform = Some(Transform::centered_at(0.0, 0.0));
    }
    tree.append_child(cursor_clip, cursor);
    tree.append_child(details, cursor_clip);

    let surface_reflection = tree.create(
        NodeKind::Video(VideoSurface::inline_muted()),
        SURFACE_REFLECTION_CLASS,
        full,
    );
    if let Some(n) = tree.get_mut(surface_reflection) {
        n.style.filter = Some(Filter::surface());
        n.style.border_radius = Some(options.border_radius);
    }

    let button = tree.create(NodeKind::Block, BUTTON_CLASS, button_frame);
    let button_radius = (options.border_radius as f32 - BUTTON_INSET).max(0.0) as u32;
    if let Some(n) = tree.get_mut(button) {
        n.style.border_radius = Some(button_radius);
    }

    let button_reflection = tree.create(
        NodeKind::Video(VideoSurface::inline_muted()),
        BUTTON_REFLECTION_CLASS,
        button_full,
    );
    if let Some(n) = tree.get_mut(button_reflection) {
        n.style.filter = Some(Filter::reflection(options.blur_radius()));
    }

    let shadow = tree.create(NodeKind::Block, SHADOW_CLASS, button_full);
    let text = tree.create(NodeKind::Text(options.text.clone()), TEXT_CLASS, button_full);

    tree.append_child(button, button_reflection);
    tree.append_child(button, shadow);
    tree.append_child(button, text);

    tree.append_child(container, details);
    tree.append_child(container, surface_reflection);
    tree.append_child(container, button);

    let show_border_radius = !agent.is_chromium();
    if show_border_radius {
        if let Some(n) = tree.get_mut(details) {
            n.style.border_radius = Some(options.border_radius);
        }
    }

    Parts {
        tree,
        container,
        details,
        cursor_clip,
        cursor,
        surface_reflection,
        button,
        button_reflection,
        shadow,
        text,
        show_border_radius,
    }
}
