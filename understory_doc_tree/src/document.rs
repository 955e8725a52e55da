// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core document implementation: structure, mutation recording, listeners, layout boxes.

use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;
use kurbo::{Point, Rect};

use crate::types::{ListenerKinds, Mutation, NodeId, NodeKind, RecordKinds};

/// An in-memory document tree.
///
/// The document owns its nodes; consumers hold [`NodeId`] handles.
/// Mutations inside an observed root are queued as [`Mutation`] records, and
/// value changes on form controls (which produce no record) are queued separately
/// for nodes that registered [`ListenerKinds::VALUE_COMMIT`].
pub struct Document {
    nodes: Vec<Option<Node>>, // slots
    generations: Vec<u32>,    // last generation per slot (persists across frees)
    free_list: Vec<usize>,
    root: NodeId,
    observation: Option<Observation>,
    records: Vec<Mutation>,
    value_commits: Vec<NodeId>,
}

impl core::fmt::Debug for Document {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        f.debug_struct("Document")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &self.free_list.len())
            .field("root", &self.root)
            .field("observing", &self.observation.is_some())
            .field("pending_records", &self.records.len())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
struct Observation {
    root: NodeId,
    kinds: RecordKinds,
    subtree: bool,
    attribute_filter: Option<Vec<String>>,
}

#[derive(Clone, Debug)]
struct Node {
    generation: u32,
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    tag: String,
    attributes: Vec<(String, String)>,
    text: String,
    value: String,
    bounds: Rect,
    listeners: ListenerKinds,
}

impl Node {
    fn new(generation: u32, kind: NodeKind) -> Self {
        Self {
            generation,
            kind,
            parent: None,
            children: Vec::new(),
            tag: String::new(),
            attributes: Vec::new(),
            text: String::new(),
            value: String::new(),
            bounds: Rect::ZERO,
            listeners: ListenerKinds::empty(),
        }
    }
}

impl Document {
    /// Create a document whose root is an element named `root_tag`.
    pub fn new(root_tag: &str) -> Self {
        let mut doc = Self {
            nodes: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            root: NodeId::new(0, 0),
            observation: None,
            records: Vec::new(),
            value_commits: Vec::new(),
        };
        doc.root = doc.create_element(root_tag);
        doc
    }

    /// The root element.
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Create a detached element. Tag names are stored lowercase.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let id = self.alloc(NodeKind::Element);
        self.node_mut(id).tag = tag.to_ascii_lowercase();
        id
    }

    /// Create a detached text node.
    pub fn create_text(&mut self, text: &str) -> NodeId {
        let id = self.alloc(NodeKind::Text);
        self.node_mut(id).text = text.to_string();
        id
    }

    fn alloc(&mut self, kind: NodeKind) -> NodeId {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(Node::new(generation, kind));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(Node::new(generation, kind)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        NodeId::new(idx, generation)
    }

    /// Append `child` as the last child of `parent`, detaching it from any previous parent first.
    ///
    /// Ignored when either id is stale, when `parent` is a text node, or when `child`
    /// is an inclusive ancestor of `parent`.
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.insert_at(parent, child, None);
    }

    /// Insert `child` before `reference` among `parent`'s children.
    ///
    /// Falls back to appending when `reference` is not a child of `parent`.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: NodeId) {
        self.insert_at(parent, child, Some(reference));
    }

    fn insert_at(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) {
        if !self.is_alive(parent) || !self.is_alive(child) {
            return;
        }
        if self.node(parent).kind != NodeKind::Element || self.is_inclusive_ancestor(child, parent)
        {
            return;
        }
        if let Some(old) = self.node(child).parent {
            self.remove_child(old, child);
        }
        let p = self.node_mut(parent);
        let at = reference
            .and_then(|r| p.children.iter().position(|c| *c == r))
            .unwrap_or(p.children.len());
        p.children.insert(at, child);
        self.node_mut(child).parent = Some(parent);
        if self.records_kind(parent, RecordKinds::CHILD_LIST) {
            self.records.push(Mutation::ChildList {
                target: parent,
                added: vec![child],
                removed: Vec::new(),
            });
        }
    }

    /// Detach `child` from `parent`. The detached subtree stays alive and walkable.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) {
        if !self.is_alive(parent) || !self.is_alive(child) {
            return;
        }
        if self.node(child).parent != Some(parent) {
            return;
        }
        self.node_mut(parent).children.retain(|c| *c != child);
        self.node_mut(child).parent = None;
        if self.records_kind(parent, RecordKinds::CHILD_LIST) {
            self.records.push(Mutation::ChildList {
                target: parent,
                added: Vec::new(),
                removed: vec![child],
            });
        }
    }

    /// Release `id` and its subtree, detaching it first if it still has a parent.
    ///
    /// The root cannot be freed.
    pub fn free_subtree(&mut self, id: NodeId) {
        if !self.is_alive(id) || id == self.root {
            return;
        }
        if let Some(parent) = self.node(id).parent {
            self.remove_child(parent, id);
        }
        self.free_recursive(id);
    }

    fn free_recursive(&mut self, id: NodeId) {
        let children = core::mem::take(&mut self.node_mut(id).children);
        for child in children {
            self.free_recursive(child);
        }
        self.nodes[id.idx()] = None;
        self.free_list.push(id.idx());
    }

    /// Replace the text of a text node.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        let Some(n) = self.node_opt_mut(id) else {
            return;
        };
        if n.kind != NodeKind::Text {
            return;
        }
        n.text.clear();
        n.text.push_str(text);
        if self.records_kind(id, RecordKinds::CHARACTER_DATA) {
            self.records.push(Mutation::CharacterData { target: id });
        }
    }

    /// Set an attribute on an element.
    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) {
        let Some(n) = self.node_opt_mut(id) else {
            return;
        };
        if n.kind != NodeKind::Element {
            return;
        }
        match n.attributes.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => n.attributes.push((name.to_string(), value.to_string())),
        }
        self.record_attribute(id, name);
    }

    /// Remove an attribute from an element.
    pub fn remove_attribute(&mut self, id: NodeId, name: &str) {
        let Some(n) = self.node_opt_mut(id) else {
            return;
        };
        let before = n.attributes.len();
        n.attributes.retain(|(k, _)| k != name);
        if n.attributes.len() != before {
            self.record_attribute(id, name);
        }
    }

    fn record_attribute(&mut self, id: NodeId, name: &str) {
        if !self.records_kind(id, RecordKinds::ATTRIBUTES) {
            return;
        }
        let allowed = self
            .observation
            .as_ref()
            .and_then(|o| o.attribute_filter.as_ref())
            .is_none_or(|filter| filter.iter().any(|f| f == name));
        if allowed {
            self.records.push(Mutation::Attributes {
                target: id,
                name: name.to_string(),
            });
        }
    }

    /// Replace the live value of a form control.
    ///
    /// Like a real form control, this produces no mutation record. If the node has a
    /// [`ListenerKinds::VALUE_COMMIT`] registration, the node is queued for
    /// [`take_value_commits`](Self::take_value_commits).
    pub fn set_value(&mut self, id: NodeId, value: &str) {
        let Some(n) = self.node_opt_mut(id) else {
            return;
        };
        n.value.clear();
        n.value.push_str(value);
        if n.listeners.contains(ListenerKinds::VALUE_COMMIT) {
            self.value_commits.push(id);
        }
    }

    /// Set the layout box of a node in document coordinates.
    pub fn set_bounds(&mut self, id: NodeId, bounds: Rect) {
        if let Some(n) = self.node_opt_mut(id) {
            n.bounds = bounds;
        }
    }

    /// Register listeners on a node.
    pub fn add_listeners(&mut self, id: NodeId, kinds: ListenerKinds) {
        if let Some(n) = self.node_opt_mut(id) {
            n.listeners |= kinds;
        }
    }

    /// Unregister listeners on a node.
    pub fn remove_listeners(&mut self, id: NodeId, kinds: ListenerKinds) {
        if let Some(n) = self.node_opt_mut(id) {
            n.listeners.remove(kinds);
        }
    }

    /// Listener registrations on a node; empty for stale ids.
    pub fn listeners(&self, id: NodeId) -> ListenerKinds {
        self.get(id)
            .map(|n| n.listeners)
            .unwrap_or(ListenerKinds::empty())
    }

    /// Start recording mutations inside `root`.
    ///
    /// With `subtree` false only mutations whose target is `root` itself are recorded.
    /// `attribute_filter` of `None` records every attribute name.
    /// Replaces any previous observation.
    pub fn observe(
        &mut self,
        root: NodeId,
        kinds: RecordKinds,
        subtree: bool,
        attribute_filter: Option<Vec<String>>,
    ) {
        self.observation = Some(Observation {
            root,
            kinds,
            subtree,
            attribute_filter,
        });
    }

    /// Stop recording and drop any queued records.
    pub fn disconnect(&mut self) {
        self.observation = None;
        self.records.clear();
    }

    /// True while an observation is active.
    pub fn is_observed(&self) -> bool {
        self.observation.is_some()
    }

    /// Drain queued mutation records in the order they happened.
    pub fn take_mutations(&mut self) -> Vec<Mutation> {
        core::mem::take(&mut self.records)
    }

    /// Drain queued value commits in the order they happened.
    pub fn take_value_commits(&mut self) -> Vec<NodeId> {
        core::mem::take(&mut self.value_commits)
    }

    fn records_kind(&self, target: NodeId, kind: RecordKinds) -> bool {
        let Some(o) = &self.observation else {
            return false;
        };
        if !o.kinds.contains(kind) {
            return false;
        }
        if target == o.root {
            return true;
        }
        o.subtree && self.is_inclusive_ancestor(o.root, target)
    }

    // --- queries ---

    /// Returns true if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.get(id).is_some()
    }

    /// Kind of a live node.
    pub fn kind(&self, id: NodeId) -> Option<NodeKind> {
        self.get(id).map(|n| n.kind)
    }

    /// Parent of a node, if attached.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id)?.parent
    }

    /// Children of a node in order; empty for text nodes and stale ids.
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// First child of a node.
    pub fn first_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id).first().copied()
    }

    /// Next sibling of a node.
    pub fn next_sibling(&self, id: NodeId) -> Option<NodeId> {
        let parent = self.parent(id)?;
        let siblings = self.children(parent);
        let at = siblings.iter().position(|c| *c == id)?;
        siblings.get(at + 1).copied()
    }

    /// Lowercase tag name of an element; `None` for text nodes.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        let n = self.get(id)?;
        (n.kind == NodeKind::Element).then_some(n.tag.as_str())
    }

    /// Text of a text node; `None` for elements.
    pub fn text(&self, id: NodeId) -> Option<&str> {
        let n = self.get(id)?;
        (n.kind == NodeKind::Text).then_some(n.text.as_str())
    }

    /// Live value of a form control (empty unless set).
    pub fn value(&self, id: NodeId) -> Option<&str> {
        self.get(id).map(|n| n.value.as_str())
    }

    /// Attribute value.
    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.get(id)?
            .attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Layout box of a node.
    pub fn bounds(&self, id: NodeId) -> Option<Rect> {
        self.get(id).map(|n| n.bounds)
    }

    /// True if `ancestor` is `node` or one of its ancestors.
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = Some(node);
        while let Some(c) = cur {
            if c == ancestor {
                return true;
            }
            cur = self.parent(c);
        }
        false
    }

    /// Box covering the characters `start..end` of a text node.
    ///
    /// Text is laid out on a single line with a uniform advance: the node's width divided
    /// by its character count. Offsets past the end are clamped. A collapsed range yields
    /// a zero-width box at the caret position, spanning the node's height.
    pub fn text_range_rect(&self, id: NodeId, start: usize, end: usize) -> Option<Rect> {
        let n = self.get(id)?;
        if n.kind != NodeKind::Text {
            return None;
        }
        let len = n.text.chars().count();
        let b = n.bounds;
        if len == 0 {
            return Some(Rect::new(b.x0, b.y0, b.x0, b.y1));
        }
        #[allow(
            clippy::cast_precision_loss,
            reason = "Character counts in test documents are far below f64 precision limits."
        )]
        let advance = b.width() / len as f64;
        let (start, end) = (start.min(len), end.min(len).max(start.min(len)));
        #[allow(
            clippy::cast_precision_loss,
            reason = "Character counts in test documents are far below f64 precision limits."
        )]
        let (x0, x1) = (
            b.x0 + advance * start as f64,
            b.x0 + advance * end as f64,
        );
        Some(Rect::new(x0, b.y0, x1, b.y1))
    }

    /// Deepest element under `pt`, preferring later siblings (drawn on top).
    ///
    /// Only attached nodes are considered; text nodes are never returned.
    pub fn hit_test_point(&self, pt: Point) -> Option<NodeId> {
        self.hit_recursive(self.root, pt)
    }

    fn hit_recursive(&self, id: NodeId, pt: Point) -> Option<NodeId> {
        let n = self.get(id)?;
        if n.kind != NodeKind::Element {
            return None;
        }
        for &child in n.children.iter().rev() {
            if let Some(hit) = self.hit_recursive(child, pt) {
                return Some(hit);
            }
        }
        n.bounds.contains(pt).then_some(id)
    }

    /// Nearest inclusive ancestor of `id` carrying all of `kinds`.
    pub fn listening_ancestor(&self, id: NodeId, kinds: ListenerKinds) -> Option<NodeId> {
        let mut cur = Some(id);
        while let Some(c) = cur {
            if self.listeners(c).contains(kinds) {
                return Some(c);
            }
            cur = self.parent(c);
        }
        None
    }

    fn get(&self, id: NodeId) -> Option<&Node> {
        let n = self.nodes.get(id.idx())?.as_ref()?;
        (n.generation == id.1).then_some(n)
    }

    fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.idx()].as_ref().expect("dangling NodeId")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.idx()].as_mut().expect("dangling NodeId")
    }

    fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }
}
