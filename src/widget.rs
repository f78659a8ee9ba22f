// The shiny button itself: owns the render tree, the media request and the
// interaction record, and keeps the tree's styles in step with all three.

use crate::builder::{self, FINGERPRINT_CLASS, HostAgent, PRESSED_CLASS, Parts};
use crate::config::{ButtonOptions, blur_radius};
use crate::fallback;
use crate::interaction::{InputEvent, InteractionState};
use crate::media::{self, MediaOutcome, MediaSource, MediaStream, PendingMedia, StreamConstraints};
use crate::style::{Background, Filter, Transform};
use crate::tree::{NodeId, NodeKind, RenderTree};
use crate::types::{Point, Rect};
use std::collections::VecDeque;
use std::sync::Arc;

/// Oldest fingerprint is evicted past this many.
pub const MAX_FINGERPRINTS: usize = 20;
/// Fingerprint decal box, px.
pub const FINGERPRINT_SIZE: f32 = 28.0;

enum MediaState {
    Pending(PendingMedia),
    Bound(MediaStream),
    Fallback,
    Released,
}

/// Coarse media status for hosts and HUDs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaStatus {
    Pending,
    Live,
    Fallback,
    Released,
}

pub struct ShinyButton {
    options: ButtonOptions,
    parts: Parts,
    state: InteractionState,
    fingerprints: VecDeque<NodeId>,
    media: MediaState,
    /// Host position of the container; `None` while not embedded.
    origin: Option<Point>,
    destroyed: bool,
}

impl ShinyButton {
    /// Build the widget and start the media request. Returns immediately;
    /// reflections stay blank until `poll_media` sees the outcome.
    pub fn new(
        options: ButtonOptions,
        agent: &HostAgent,
        source: Box<dyn MediaSource>,
        constraints: StreamConstraints,
    ) -> Self {
        let parts = builder::build(&options, agent);
        tracing::debug!(
            width = options.width,
            height = options.height,
            corner_shim = parts.show_border_radius,
            "shiny button built"
        );
        let pending = media::request(source, constraints);
        Self {
            options,
            parts,
            state: InteractionState::default(),
            fingerprints: VecDeque::with_capacity(MAX_FINGERPRINTS + 1),
            media: MediaState::Pending(pending),
            origin: None,
            destroyed: false,
        }
    }

    /// Pick up the media outcome if it has arrived. Returns true when the tree changed.
    pub fn poll_media(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        let MediaState::Pending(pending) = &mut self.media else {
            return false;
        };
        match pending.poll() {
            None => false,
            Some(MediaOutcome::Ready(stream)) => {
                tracing::info!(stream = stream.id(), resolution = ?stream.resolution(), "camera stream bound");
                self.bind_stream(&stream);
                self.media = MediaState::Bound(stream);
                true
            }
            Some(MediaOutcome::Unavailable(err)) => {
                tracing::warn!(error = %err, "camera unavailable; using gradient reflection");
                self.use_fallback_reflection();
                self.media = MediaState::Fallback;
                true
            }
        }
    }

    fn bind_stream(&mut self, stream: &MediaStream) {
        for id in [self.parts.button_reflection, self.parts.surface_reflection] {
            if let Some(v) = self.parts.tree.get_mut(id).and_then(|n| n.video_mut()) {
                v.stream = Some(stream.clone());
            }
        }
    }

    fn use_fallback_reflection(&mut self) {
        let image = Arc::new(fallback::gradient_image(
            self.options.width,
            self.options.height,
            self.options.roughness,
        ));
        for id in [self.parts.button_reflection, self.parts.surface_reflection] {
            if let Some(n) = self.parts.tree.get_mut(id) {
                n.style.background = Some(Background::cover(image.clone()));
                if let Some(v) = n.video_mut() {
                    v.video_hidden = true;
                }
            }
        }
    }

    /// React to one input event. Ignored once destroyed.
    pub fn handle(&mut self, event: &InputEvent) {
        if self.destroyed {
            return;
        }
        let details_origin = self.details_rect().origin();
        let reaction = self.state.apply(event, details_origin);

        if reaction.press_changed {
            tracing::debug!(pressed = self.state.pressed, "press state changed");
            self.update_button_state();
        }
        if let Some(mark) = reaction.mark {
            self.add_fingerprint(mark);
        }
        if reaction.cursor_dirty {
            if let InputEvent::PointerMove { client } = event {
                tracing::trace!(x = client.x, y = client.y, "pointer moved");
            }
            self.update_cursor();
        }
    }

    fn update_cursor(&mut self) {
        let cursor = self.state.cursor.unwrap_or_default();
        let opacity = self.state.cursor_opacity();
        if let Some(n) = self.parts.tree.get_mut(self.parts.cursor) {
            n.style.transform = Some(Transform::centered_at(cursor.x, cursor.y));
            n.style.opacity = opacity;
        }
    }

    /// Pressed marker goes on container, button and surface reflection together.
    fn update_button_state(&mut self) {
        let targets = [self.parts.container, self.parts.button, self.parts.surface_reflection];
        for id in targets {
            if self.state.pressed {
                self.parts.tree.add_class(id, PRESSED_CLASS);
            } else {
                self.parts.tree.remove_class(id, PRESSED_CLASS);
            }
        }
    }

    fn add_fingerprint(&mut self, at: Point) {
        let tree = &mut self.parts.tree;
        let mark = tree.create(
            NodeKind::Block,
            FINGERPRINT_CLASS,
            Rect::new(0.0, 0.0, FINGERPRINT_SIZE, FINGERPRINT_SIZE),
        );
        if let Some(n) = tree.get_mut(mark) {
            n.style.transform = Some(Transform::centered_at(at.x, at.y));
        }
        tree.append_child(self.parts.details, mark);
        self.fingerprints.push_back(mark);

        if self.fingerprints.len() > MAX_FINGERPRINTS {
            if let Some(oldest) = self.fingerprints.pop_front() {
                tree.remove(oldest);
                tracing::debug!(kept = self.fingerprints.len(), "evicted oldest fingerprint");
            }
        }
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        let text = text.into();
        if let Some(n) = self.parts.tree.get_mut(self.parts.text) {
            n.kind = NodeKind::Text(text.clone());
        }
        self.options.text = text;
    }

    /// Re-derives the button reflection filter immediately.
    pub fn set_roughness(&mut self, roughness: f64) {
        self.options.roughness = roughness;
        if let Some(n) = self.parts.tree.get_mut(self.parts.button_reflection) {
            n.style.filter = Some(Filter::reflection(blur_radius(roughness)));
        }
    }

    /// Root node for the host to embed.
    pub fn element(&self) -> NodeId {
        self.parts.container
    }

    pub fn tree(&self) -> &RenderTree {
        &self.parts.tree
    }

    pub fn parts(&self) -> &Parts {
        &self.parts
    }

    /// Embed the root at `origin` in host coordinates.
    pub fn mount(&mut self, origin: Point) {
        if self.destroyed {
            return;
        }
        self.origin = Some(origin);
    }

    pub fn is_mounted(&self) -> bool {
        self.origin.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Stop every track of a bound stream and detach the root. The widget is inert afterwards.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        let bound = self
            .parts
            .tree
            .get(self.parts.button_reflection)
            .and_then(|n| n.video())
            .and_then(|v| v.stream.clone());
        if let Some(stream) = bound {
            stream.stop_all();
            tracing::info!(stream = stream.id(), "camera stream stopped");
        }
        self.media = MediaState::Released;
        self.origin = None;
        self.destroyed = true;
    }

    fn host_origin(&self) -> Point {
        self.origin.unwrap_or_default()
    }

    fn host_rect(&self, id: NodeId) -> Rect {
        self.parts
            .tree
            .absolute_rect(id)
            .unwrap_or_default()
            .offset(self.host_origin())
    }

    pub fn container_rect(&self) -> Rect {
        self.host_rect(self.parts.container)
    }

    pub fn button_rect(&self) -> Rect {
        self.host_rect(self.parts.button)
    }

    pub fn details_rect(&self) -> Rect {
        self.host_rect(self.parts.details)
    }

    pub fn state(&self) -> &InteractionState {
        &self.state
    }

    pub fn options(&self) -> &ButtonOptions {
        &self.options
    }

    pub fn fingerprint_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.fingerprints.iter().copied()
    }

    /// Fingerprint positions relative to the details layer, oldest first.
    pub fn fingerprint_positions(&self) -> Vec<Point> {
        self.fingerprints
            .iter()
            .filter_map(|id| self.parts.tree.get(*id))
            .filter_map(|n| n.style.transform)
            .map(|t| Point::new(t.x, t.y))
            .collect()
    }

    pub fn media_status(&self) -> MediaStatus {
        match self.media {
            MediaState::Pending(_) => MediaStatus::Pending,
            MediaState::Bound(_) => MediaStatus::Live,
            MediaState::Fallback => MediaStatus::Fallback,
            MediaState::Released => MediaStatus::Released,
        }
    }
}

impl Drop for ShinyButton {
    fn drop(&mut self) {
        // Lets the capture thread finish even if the host never called destroy.
        if let MediaState::Bound(stream) = &self.media {
            stream.stop_all();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::{BUTTON_INSET, SURFACE_REFLECTION_CLASS};
    use crate::error::Error;
    use crate::media::UnavailableSource;
    use crate::media::testing::{ScriptedSource, wait_until};
    use crate::tree::Node;
    use std::sync::atomic::Ordering;

    fn offline(options: ButtonOptions) -> ShinyButton {
        ShinyButton::new(
            options,
            &HostAgent::native(),
            Box::new(UnavailableSource::new("test")),
            StreamConstraints::default(),
        )
    }

    fn settle(button: &mut ShinyButton) {
        assert!(wait_until(|| button.poll_media()));
    }

    fn press_at(button: &mut ShinyButton, x: f32, y: f32) {
        button.handle(&InputEvent::ButtonPointerDown { client: Point::new(x, y) });
        button.handle(&InputEvent::ButtonPointerUp);
    }

    #[test]
    fn usable_before_media_resolves() {
        let mut b = offline(ButtonOptions::default());
        b.handle(&InputEvent::ContainerEnter);
        assert!(b.state().focus);
        assert!(matches!(b.media_status(), MediaStatus::Pending | MediaStatus::Fallback));
    }

    #[test]
    fn media_failure_installs_gradient_on_both_surfaces() {
        let mut b = offline(ButtonOptions::default());
        settle(&mut b);
        assert_eq!(b.media_status(), MediaStatus::Fallback);
        let p = b.parts();
        for id in [p.button_reflection, p.surface_reflection] {
            let node = b.tree().get(id).unwrap();
            let bg = node.style.background.as_ref().expect("background image");
            assert!(!bg.is_empty());
            assert!(node.video().unwrap().video_hidden);
            assert!(node.video().unwrap().stream.is_none());
        }
    }

    #[test]
    fn camera_error_also_falls_back() {
        let mut b = ShinyButton::new(
            ButtonOptions::default(),
            &HostAgent::native(),
            Box::new(ScriptedSource::failing(Error::CameraInit("no device".into()))),
            StreamConstraints::default(),
        );
        settle(&mut b);
        assert_eq!(b.media_status(), MediaStatus::Fallback);
    }

    #[test]
    fn stream_is_shared_by_both_surfaces() {
        let mut b = ShinyButton::new(
            ButtonOptions::default(),
            &HostAgent::native(),
            Box::new(ScriptedSource::working(0x00_80_80_80)),
            StreamConstraints::default(),
        );
        settle(&mut b);
        assert_eq!(b.media_status(), MediaStatus::Live);
        let p = b.parts();
        let ids: Vec<u64> = [p.button_reflection, p.surface_reflection]
            .iter()
            .map(|id| b.tree().get(*id).and_then(Node::video).and_then(|v| v.stream.as_ref()).unwrap().id())
            .collect();
        assert_eq!(ids[0], ids[1]);
        b.destroy();
    }

    #[test]
    fn destroy_stops_tracks_and_unmounts() {
        let source = ScriptedSource::working(0);
        let released = source.released.clone();
        let mut b = ShinyButton::new(
            ButtonOptions::default(),
            &HostAgent::native(),
            Box::new(source),
            StreamConstraints::default(),
        );
        b.mount(Point::new(10.0, 10.0));
        settle(&mut b);
        let stream = b
            .tree()
            .get(b.parts().button_reflection)
            .and_then(Node::video)
            .and_then(|v| v.stream.clone())
            .unwrap();
        assert!(stream.is_active());

        b.destroy();
        assert!(stream.tracks().iter().all(|t| !t.is_live()));
        assert!(!b.is_mounted());
        assert!(b.is_destroyed());
        assert_eq!(b.media_status(), MediaStatus::Released);
        assert!(wait_until(|| released.load(Ordering::Acquire)));

        // Inert.
        b.handle(&InputEvent::ContainerEnter);
        assert!(!b.state().focus);
        b.mount(Point::new(0.0, 0.0));
        assert!(!b.is_mounted());
    }

    #[test]
    fn dropping_a_live_widget_releases_the_camera() {
        let source = ScriptedSource::working(0);
        let released = source.released.clone();
        let mut b = ShinyButton::new(
            ButtonOptions::default(),
            &HostAgent::native(),
            Box::new(source),
            StreamConstraints::default(),
        );
        settle(&mut b);
        drop(b);
        assert!(wait_until(|| released.load(Ordering::Acquire)));
    }

    #[test]
    fn cursor_tracks_document_moves_but_shows_only_on_focus() {
        let mut b = offline(ButtonOptions::default());
        b.mount(Point::new(100.0, 40.0));

        b.handle(&InputEvent::PointerMove { client: Point::new(20.0, 10.0) });
        let cursor = b.tree().get(b.parts().cursor).unwrap();
        assert_eq!(
            cursor.style.transform.unwrap().to_string(),
            "translate(-80px, -30px) translate(-50%, -50%)"
        );
        assert_eq!(cursor.style.opacity, 0.0);

        b.handle(&InputEvent::ContainerEnter);
        assert_eq!(b.tree().get(b.parts().cursor).unwrap().style.opacity, 1.0);

        b.handle(&InputEvent::ButtonPointerDown { client: Point::new(150.0, 60.0) });
        assert_eq!(b.tree().get(b.parts().cursor).unwrap().style.opacity, 1.0);

        b.handle(&InputEvent::ContainerLeave);
        assert_eq!(b.tree().get(b.parts().cursor).unwrap().style.opacity, 0.0);
    }

    #[test]
    fn pressed_class_moves_together() {
        let mut b = offline(ButtonOptions::default());
        let p = [b.parts().container, b.parts().button, b.parts().surface_reflection];

        b.handle(&InputEvent::ButtonPointerDown { client: Point::new(50.0, 50.0) });
        assert!(p.iter().all(|id| b.tree().has_class(*id, PRESSED_CLASS)));
        assert!(b.tree().has_class(p[2], SURFACE_REFLECTION_CLASS));

        b.handle(&InputEvent::ButtonPointerLeave);
        assert!(p.iter().all(|id| !b.tree().has_class(*id, PRESSED_CLASS)));

        b.handle(&InputEvent::TouchStart { touches: vec![Point::new(30.0, 30.0)] });
        assert!(p.iter().all(|id| b.tree().has_class(*id, PRESSED_CLASS)));
        b.handle(&InputEvent::TouchEnd);
        assert!(p.iter().all(|id| !b.tree().has_class(*id, PRESSED_CLASS)));
    }

    #[test]
    fn fingerprint_lands_at_projected_press() {
        let mut b = offline(ButtonOptions::default());
        b.mount(Point::new(40.0, 30.0));
        press_at(&mut b, 90.0, 70.0);
        assert_eq!(b.fingerprint_positions(), vec![Point::new(50.0, 40.0)]);
        let id = b.fingerprint_ids().next().unwrap();
        assert_eq!(b.tree().get(id).and_then(|n| n.parent()), Some(b.parts().details));
        assert!(b.tree().has_class(id, FINGERPRINT_CLASS));
    }

    #[test]
    fn fingerprints_are_bounded_fifo() {
        let mut b = offline(ButtonOptions::default());
        for i in 0..MAX_FINGERPRINTS {
            press_at(&mut b, i as f32, 0.0);
        }
        let first = b.fingerprint_ids().next().unwrap();
        assert_eq!(b.fingerprint_positions().len(), MAX_FINGERPRINTS);

        press_at(&mut b, 20.0, 0.0);
        let xs: Vec<f32> = b.fingerprint_positions().iter().map(|p| p.x).collect();
        assert_eq!(xs, (1..=20).map(|i| i as f32).collect::<Vec<_>>());
        assert!(!b.tree().contains(first));

        for i in 21..60 {
            press_at(&mut b, i as f32, 0.0);
        }
        assert_eq!(b.fingerprint_positions().len(), MAX_FINGERPRINTS);
        // details holds the cursor clip plus the marks.
        assert_eq!(b.tree().children(b.parts().details).len(), MAX_FINGERPRINTS + 1);
    }

    #[test]
    fn empty_touch_presses_without_a_mark() {
        let mut b = offline(ButtonOptions::default());
        b.handle(&InputEvent::TouchStart { touches: vec![] });
        assert!(b.state().pressed);
        assert!(b.fingerprint_positions().is_empty());
    }

    #[test]
    fn setters_update_tree_and_options() {
        let mut b = offline(ButtonOptions::default());
        b.set_text("Shine");
        assert!(matches!(
            b.tree().get(b.parts().text).map(|n| &n.kind),
            Some(NodeKind::Text(s)) if s == "Shine"
        ));
        assert_eq!(b.options().text, "Shine");

        b.set_roughness(1.0);
        let f = b.tree().get(b.parts().button_reflection).and_then(|n| n.style.filter).unwrap();
        assert_eq!(f.blur_px, 16);
        b.set_roughness(-0.25);
        let f = b.tree().get(b.parts().button_reflection).and_then(|n| n.style.filter).unwrap();
        assert_eq!(f.blur_px, -4);
        assert_eq!(b.options().roughness, -0.25);
    }

    #[test]
    fn rects_follow_mount_origin() {
        let mut b = offline(ButtonOptions::default());
        assert_eq!(b.element(), b.parts().container);
        assert!(!b.is_mounted());
        b.mount(Point::new(48.0, 48.0));
        assert!(b.is_mounted());
        assert_eq!(b.container_rect(), Rect::new(48.0, 48.0, 300.0, 100.0));
        assert_eq!(b.button_rect().x, 48.0 + BUTTON_INSET);
        assert_eq!(b.details_rect().origin(), Point::new(48.0, 48.0));
    }
}
