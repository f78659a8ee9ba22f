// The widget's render tree: an arena of nodes with class names and styles.
// The builder creates it, the widget mutates it, the compositor reads it.

use crate::media::MediaStream;
use crate::style::Style;
use crate::types::Rect;
use std::collections::BTreeSet;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

/// A surface that plays a media stream.
#[derive(Clone, Debug, Default)]
pub struct VideoSurface {
    pub stream: Option<MediaStream>,
    /// Hides the playback itself; the node's background still paints.
    pub video_hidden: bool,
    pub autoplay: bool,
    pub muted: bool,
    pub plays_inline: bool,
}

impl VideoSurface {
    pub fn inline_muted() -> Self {
        Self { stream: None, video_hidden: false, autoplay: true, muted: true, plays_inline: true }
    }
}

#[derive(Clone, Debug)]
pub enum NodeKind {
    Block,
    Video(VideoSurface),
    Text(String),
    Icon,
}

#[derive(Clone, Debug)]
pub struct Node {
    pub kind: NodeKind,
    /// Base class, fixed at creation.
    pub name: &'static str,
    pub classes: BTreeSet<&'static str>,
    pub style: Style,
    /// Position and size relative to the parent.
    pub frame: Rect,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn video(&self) -> Option<&VideoSurface> {
        match &self.kind {
            NodeKind::Video(v) => Some(v),
            _ => None,
        }
    }

    pub fn video_mut(&mut self) -> Option<&mut VideoSurface> {
        match &mut self.kind {
            NodeKind::Video(v) => Some(v),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct RenderTree {
    slots: Vec<Option<Node>>,
    live: usize,
}

impl RenderTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a detached node.
    pub fn create(&mut self, kind: NodeKind, name: &'static str, frame: Rect) -> NodeId {
        let mut classes = BTreeSet::new();
        classes.insert(name);
        let node = Node {
            kind,
            name,
            classes,
            style: Style::default(),
            frame,
            parent: None,
            children: Vec::new(),
        };
        self.slots.push(Some(node));
        self.live += 1;
        NodeId(self.slots.len() - 1)
    }

    /// Attach `child` as the last child of `parent`, detaching it from any previous parent.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.contains(parent) || !self.contains(child) || parent == child {
            return;
        }
        self.detach(child);
        if let Some(p) = self.get_mut(parent) {
            p.children.push(child);
        }
        if let Some(c) = self.get_mut(child) {
            c.parent = Some(parent);
        }
    }

    fn detach(&mut self, id: NodeId) {
        let Some(parent) = self.get(id).and_then(|n| n.parent) else { return };
        if let Some(p) = self.get_mut(parent) {
            p.children.retain(|c| *c != id);
        }
        if let Some(n) = self.get_mut(id) {
            n.parent = None;
        }
    }

    /// Detach `id` from its parent and free it along with its subtree.
    /// Returns false when the node was already gone.
    pub fn remove(&mut self, id: NodeId) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.detach(id);
        let mut stack = vec![id];
        while let Some(next) = stack.pop() {
            if let Some(node) = self.slots.get_mut(next.0).and_then(Option::take) {
                self.live -= 1;
                stack.extend(node.children);
            }
        }
        true
    }

    pub fn contains(&self, id: NodeId) -> bool {
        matches!(self.slots.get(id.0), Some(Some(_)))
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0).and_then(Option::as_ref)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        self.slots.get_mut(id.0).and_then(Option::as_mut)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    pub fn add_class(&mut self, id: NodeId, class: &'static str) {
        if let Some(n) = self.get_mut(id) {
            n.classes.insert(class);
        }
    }

    pub fn remove_class(&mut self, id: NodeId, class: &'static str) {
        if let Some(n) = self.get_mut(id) {
            n.classes.remove(class);
        }
    }

    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.get(id).is_some_and(|n| n.classes.contains(class))
    }

    /// Frame of `id` in the coordinate space of its topmost ancestor.
    pub fn absolute_rect(&self, id: NodeId) -> Option<Rect> {
        let node = self.get(id)?;
        let mut rect = node.frame;
        let mut up = node.parent;
        while let Some(p) = up {
            let parent = self.get(p)?;
            rect.x += parent.frame.x;
            rect.y += parent.frame.y;
            up = parent.parent;
        }
        Some(rect)
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }
}
