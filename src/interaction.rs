// Pointer/touch state for the widget.
//
// `InteractionState` is the flat record the widget keeps (focus, pressed,
// cursor) and `apply` says what an event changed. `PointerRouter` turns a
// polled mouse (position + primary button) into the same events a document
// would dispatch, so hosts without an event system can still drive the widget.

use crate::types::{Point, Rect};

#[derive(Clone, Debug, PartialEq)]
pub enum InputEvent {
    /// Pointer entered the container.
    ContainerEnter,
    /// Pointer left the container.
    ContainerLeave,
    /// Pointer moved anywhere in the host, in host coordinates.
    PointerMove { client: Point },
    ButtonPointerDown { client: Point },
    ButtonPointerUp,
    /// Pointer left the button (not the container).
    ButtonPointerLeave,
    /// Touch began on the button; only the first touch counts.
    TouchStart { touches: Vec<Point> },
    TouchEnd,
}

/// What applying an event changed.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Reaction {
    /// Cursor transform/opacity must be re-rendered.
    pub cursor_dirty: bool,
    /// `pressed` flipped.
    pub press_changed: bool,
    /// Where to leave a fingerprint, relative to the details layer.
    pub mark: Option<Point>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct InteractionState {
    pub focus: bool,
    pub pressed: bool,
    /// Relative to the details layer; `None` until the first move.
    pub cursor: Option<Point>,
}

impl InteractionState {
    /// Cursor reflection is visible exactly while focused.
    pub fn cursor_opacity(&self) -> f32 {
        if self.focus { 1.0 } else { 0.0 }
    }

    /// Update the record. `details_origin` is the details layer's position in host coordinates.
    pub fn apply(&mut self, event: &InputEvent, details_origin: Point) -> Reaction {
        let mut reaction = Reaction::default();
        match event {
            InputEvent::ContainerEnter => {
                self.focus = true;
                reaction.cursor_dirty = true;
            }
            InputEvent::ContainerLeave => {
                self.focus = false;
                reaction.cursor_dirty = true;
            }
            InputEvent::PointerMove { client } => {
                self.cursor = Some(client.relative_to(details_origin));
                reaction.cursor_dirty = true;
            }
            InputEvent::ButtonPointerDown { client } => {
                reaction.press_changed = self.set_pressed(true);
                reaction.mark = Some(client.relative_to(details_origin));
            }
            InputEvent::TouchStart { touches } => {
                reaction.press_changed = self.set_pressed(true);
                reaction.mark = touches.first().map(|t| t.relative_to(details_origin));
            }
            InputEvent::ButtonPointerUp | InputEvent::ButtonPointerLeave | InputEvent::TouchEnd => {
                reaction.press_changed = self.set_pressed(false);
            }
        }
        reaction
    }

    fn set_pressed(&mut self, pressed: bool) -> bool {
        let changed = self.pressed != pressed;
        self.pressed = pressed;
        changed
    }
}

/// One poll of the host's mouse.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct PointerSample {
    /// `None` when the host can't report a position.
    pub position: Option<Point>,
    pub primary_down: bool,
}

/// Edge detector from polled samples to input events.
#[derive(Debug, Default)]
pub struct PointerRouter {
    last: Option<Point>,
    over_container: bool,
    over_button: bool,
    was_down: bool,
}

impl PointerRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events for this sample, in dispatch order: move, enter/leave, button leave, down/up.
    pub fn route(&mut self, sample: PointerSample, container: Rect, button: Rect) -> Vec<InputEvent> {
        let mut events = Vec::new();

        // 1) Document-wide move, only for a fresh reported position.
        if let Some(p) = sample.position {
            if self.last != Some(p) {
                events.push(InputEvent::PointerMove { client: p });
            }
        }
        self.last = sample.position;

        // 2) Hit test. No position means the pointer left the window: outside both.
        let (in_container, in_button) = match self.last {
            Some(p) => (container.contains(p), button.contains(p)),
            None => (false, false),
        };

        if in_container != self.over_container {
            events.push(if in_container {
                InputEvent::ContainerEnter
            } else {
                InputEvent::ContainerLeave
            });
            self.over_container = in_container;
        }

        // 3) Button leave, then press edges over the button.
        if self.over_button && !in_button {
            events.push(InputEvent::ButtonPointerLeave);
        }
        self.over_button = in_button;

        match (self.was_down, sample.primary_down) {
            (false, true) if in_button => {
                if let Some(p) = self.last {
                    events.push(InputEvent::ButtonPointerDown { client: p });
                }
            }
            (true, false) if in_button => events.push(InputEvent::ButtonPointerUp),
            _ => {}
        }
        self.was_down = sample.primary_down;

        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORIGIN: Point = Point::new(100.0, 50.0);

    #[test]
    fn move_projects_relative_to_details_layer() {
        let mut s = InteractionState::default();
        assert_eq!(s.cursor, None);
        let r = s.apply(&InputEvent::PointerMove { client: Point::new(130.0, 45.0) }, ORIGIN);
        assert!(r.cursor_dirty);
        assert_eq!(s.cursor, Some(Point::new(30.0, -5.0)));
    }

    #[test]
    fn opacity_follows_focus_only() {
        let mut s = InteractionState::default();
        assert_eq!(s.cursor_opacity(), 0.0);
        s.apply(&InputEvent::ContainerEnter, ORIGIN);
        assert_eq!(s.cursor_opacity(), 1.0);
        s.apply(&InputEvent::ButtonPointerDown { client: ORIGIN }, ORIGIN);
        assert_eq!(s.cursor_opacity(), 1.0);
        s.apply(&InputEvent::ContainerLeave, ORIGIN);
        assert!(s.pressed);
        assert_eq!(s.cursor_opacity(), 0.0);
    }

    #[test]
    fn press_marks_and_release_events() {
        let mut s = InteractionState::default();
        let r = s.apply(&InputEvent::ButtonPointerDown { client: Point::new(110.0, 60.0) }, ORIGIN);
        assert!(r.press_changed);
        assert_eq!(r.mark, Some(Point::new(10.0, 10.0)));

        for release in [InputEvent::ButtonPointerUp, InputEvent::ButtonPointerLeave, InputEvent::TouchEnd] {
            s.pressed = true;
            let r = s.apply(&release, ORIGIN);
            assert!(r.press_changed);
            assert!(!s.pressed);
            assert_eq!(r.mark, None);
        }
    }

    #[test]
    fn touch_uses_first_point_only() {
        let mut s = InteractionState::default();
        let touches = vec![Point::new(105.0, 55.0), Point::new(400.0, 400.0)];
        let r = s.apply(&InputEvent::TouchStart { touches }, ORIGIN);
        assert!(s.pressed);
        assert_eq!(r.mark, Some(Point::new(5.0, 5.0)));

        let mut s = InteractionState::default();
        let r = s.apply(&InputEvent::TouchStart { touches: vec![] }, ORIGIN);
        assert!(s.pressed);
        assert_eq!(r.mark, None);
    }

    #[test]
    fn repeated_press_still_marks() {
        let mut s = InteractionState::default();
        s.apply(&InputEvent::ButtonPointerDown { client: ORIGIN }, ORIGIN);
        let r = s.apply(&InputEvent::ButtonPointerDown { client: ORIGIN }, ORIGIN);
        assert!(!r.press_changed);
        assert!(r.mark.is_some());
    }

    fn sample(x: f32, y: f32, down: bool) -> PointerSample {
        PointerSample { position: Some(Point::new(x, y)), primary_down: down }
    }

    #[test]
    fn router_emits_document_moves_everywhere() {
        let container = Rect::new(50.0, 50.0, 300.0, 100.0);
        let button = Rect::new(58.0, 58.0, 284.0, 84.0);
        let mut router = PointerRouter::new();

        let ev = router.route(sample(10.0, 10.0, false), container, button);
        assert_eq!(ev, vec![InputEvent::PointerMove { client: Point::new(10.0, 10.0) }]);

        // Same position: nothing.
        assert!(router.route(sample(10.0, 10.0, false), container, button).is_empty());
    }

    #[test]
    fn router_enter_press_release_leave() {
        let container = Rect::new(50.0, 50.0, 300.0, 100.0);
        let button = Rect::new(58.0, 58.0, 284.0, 84.0);
        let mut r = PointerRouter::new();

        let ev = r.route(sample(100.0, 100.0, false), container, button);
        assert_eq!(
            ev,
            vec![InputEvent::PointerMove { client: Point::new(100.0, 100.0) }, InputEvent::ContainerEnter]
        );

        let ev = r.route(sample(100.0, 100.0, true), container, button);
        assert_eq!(ev, vec![InputEvent::ButtonPointerDown { client: Point::new(100.0, 100.0) }]);

        let ev = r.route(sample(100.0, 100.0, false), container, button);
        assert_eq!(ev, vec![InputEvent::ButtonPointerUp]);

        // Into the container margin: leaves the button but not the container.
        let ev = r.route(sample(52.0, 52.0, false), container, button);
        assert_eq!(
            ev,
            vec![InputEvent::PointerMove { client: Point::new(52.0, 52.0) }, InputEvent::ButtonPointerLeave]
        );

        let ev = r.route(sample(5.0, 5.0, false), container, button);
        assert_eq!(
            ev,
            vec![InputEvent::PointerMove { client: Point::new(5.0, 5.0) }, InputEvent::ContainerLeave]
        );
    }

    #[test]
    fn router_ignores_presses_outside_the_button() {
        let container = Rect::new(50.0, 50.0, 300.0, 100.0);
        let button = Rect::new(58.0, 58.0, 284.0, 84.0);
        let mut r = PointerRouter::new();
        r.route(sample(20.0, 20.0, false), container, button);
        assert!(r.route(sample(20.0, 20.0, true), container, button).is_empty());
        // Dragging in while held doesn't start a press.
        let ev = r.route(sample(100.0, 100.0, true), container, button);
        assert!(!ev.iter().any(|e| matches!(e, InputEvent::ButtonPointerDown { .. })));
    }

    #[test]
    fn router_drag_out_leaves_button() {
        let container = Rect::new(50.0, 50.0, 300.0, 100.0);
        let button = Rect::new(58.0, 58.0, 284.0, 84.0);
        let mut r = PointerRouter::new();
        r.route(sample(100.0, 100.0, false), container, button);
        r.route(sample(100.0, 100.0, true), container, button);
        let ev = r.route(sample(500.0, 500.0, true), container, button);
        assert!(ev.contains(&InputEvent::ButtonPointerLeave));
        assert!(ev.contains(&InputEvent::ContainerLeave));
    }

    #[test]
    fn router_window_exit_clears_focus() {
        let container = Rect::new(50.0, 50.0, 300.0, 100.0);
        let button = Rect::new(58.0, 58.0, 284.0, 84.0);
        let mut r = PointerRouter::new();
        r.route(sample(100.0, 100.0, false), container, button);

        let gone = PointerSample { position: None, primary_down: false };
        let ev = r.route(gone, container, button);
        assert_eq!(ev, vec![InputEvent::ContainerLeave, InputEvent::ButtonPointerLeave]);

        let mut s = InteractionState::default();
        s.apply(&InputEvent::ContainerEnter, ORIGIN);
        for e in &ev {
            s.apply(e, ORIGIN);
        }
        assert!(!s.focus);
        assert_eq!(s.cursor_opacity(), 0.0);

        // Still gone: nothing more. Coming back at the same spot moves and re-enters.
        assert!(r.route(gone, container, button).is_empty());
        let ev = r.route(sample(100.0, 100.0, false), container, button);
        assert_eq!(
            ev,
            vec![InputEvent::PointerMove { client: Point::new(100.0, 100.0) }, InputEvent::ContainerEnter]
        );
    }
}
