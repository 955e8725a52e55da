// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Adapter for Understory Doc Tree.
//!
//! ## Feature
//!
//! Enable with `doc_tree_adapter`.
//!
//! ## Notes
//!
//! [`Document`] implements every host trait of this crate:
//!
//! - Pointer listeners map to [`ListenerKinds::POINTER`], value listeners to
//!   [`ListenerKinds::VALUE_COMMIT`].
//! - Geometry uses the document's layout boxes. A node whose box was never set is
//!   treated as not rendered, so spans anchored there get no rectangle.
//! - Mutation records are converted with [`drain_mutations`]; value commits are read
//!   directly with [`Document::take_value_commits`].

use alloc::vec::Vec;

use kurbo::Rect;
use understory_doc_tree::{Document, ListenerKinds, Mutation, NodeId, NodeKind, RecordKinds};

use crate::rect::SpanGeometry;
use crate::span::Anchor;
use crate::types::{
    DocumentTree, EventTargets, Geometry, MutationKinds, MutationOptions, MutationRecord,
    MutationSource,
};

impl DocumentTree for Document {
    type Node = NodeId;

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        Self::parent(self, node)
    }

    fn first_child(&self, node: NodeId) -> Option<NodeId> {
        Self::first_child(self, node)
    }

    fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        Self::next_sibling(self, node)
    }

    fn is_element(&self, node: NodeId) -> bool {
        self.kind(node) == Some(NodeKind::Element)
    }
}

impl EventTargets<NodeId> for Document {
    fn attach_pointer_listeners(&mut self, target: NodeId) {
        self.add_listeners(target, ListenerKinds::POINTER);
    }

    fn detach_pointer_listeners(&mut self, target: NodeId) {
        self.remove_listeners(target, ListenerKinds::POINTER);
    }

    fn attach_value_listener(&mut self, node: NodeId) {
        self.add_listeners(node, ListenerKinds::VALUE_COMMIT);
    }

    fn detach_value_listener(&mut self, node: NodeId) {
        self.remove_listeners(node, ListenerKinds::VALUE_COMMIT);
    }
}

impl MutationSource<NodeId> for Document {
    fn observe_mutations(&mut self, root: NodeId, options: &MutationOptions) {
        let mut kinds = RecordKinds::empty();
        if options.wants(MutationKinds::ATTRIBUTES) {
            kinds |= RecordKinds::ATTRIBUTES;
        }
        if options.wants(MutationKinds::CHARACTER_DATA) {
            kinds |= RecordKinds::CHARACTER_DATA;
        }
        if options.wants(MutationKinds::CHILD_LIST) {
            kinds |= RecordKinds::CHILD_LIST;
        }
        let filter = options
            .wants(MutationKinds::ATTRIBUTES)
            .then(|| options.attribute_filter.clone());
        self.observe(root, kinds, options.subtree, filter);
    }

    fn disconnect_mutations(&mut self) {
        self.disconnect();
    }
}

impl Geometry<NodeId> for Document {
    fn measure(&self, start: Anchor<NodeId>, end: Anchor<NodeId>) -> Option<SpanGeometry> {
        let start_caret = caret(self, start, Edge::Leading)?;
        let end_caret = caret(self, end, Edge::Trailing)?;
        let bounds = if start.node == end.node {
            match (start.offset, end.offset) {
                (Some(s), Some(e)) if self.kind(start.node) == Some(NodeKind::Text) => {
                    self.text_range_rect(start.node, s, e)?
                }
                _ => rendered_bounds(self, start.node)?,
            }
        } else {
            let head = part(self, start, Edge::Leading)?;
            let tail = part(self, end, Edge::Trailing)?;
            head.union(tail)
        };
        Some(SpanGeometry {
            bounds,
            start_caret,
            end_caret,
        })
    }
}

impl From<Mutation> for MutationRecord<NodeId> {
    fn from(m: Mutation) -> Self {
        match m {
            Mutation::Attributes { target, name } => Self::Attributes { target, name },
            Mutation::CharacterData { target } => Self::CharacterData { target },
            Mutation::ChildList {
                target,
                added,
                removed,
            } => Self::ChildList {
                target,
                added,
                removed,
            },
        }
    }
}

/// Drain the document's queued mutations as records for the observer.
pub fn drain_mutations(doc: &mut Document) -> Vec<MutationRecord<NodeId>> {
    doc.take_mutations().into_iter().map(Into::into).collect()
}

/// Value-like predicate for form controls: `input`, `select`, and `textarea`.
pub fn is_form_control(doc: &Document, node: NodeId) -> bool {
    doc.tag(node).is_some_and(|tag| {
        ["input", "select", "textarea"]
            .iter()
            .any(|t| tag.eq_ignore_ascii_case(t))
    })
}

#[derive(Copy, Clone)]
enum Edge {
    Leading,
    Trailing,
}

fn rendered_bounds(doc: &Document, node: NodeId) -> Option<Rect> {
    doc.bounds(node).filter(|b| *b != Rect::ZERO)
}

fn text_len(doc: &Document, node: NodeId) -> usize {
    doc.text(node).map_or(0, |t| t.chars().count())
}

// Collapsed box at one end of a span.
fn caret(doc: &Document, anchor: Anchor<NodeId>, edge: Edge) -> Option<Rect> {
    let b = rendered_bounds(doc, anchor.node)?;
    match (anchor.offset, doc.kind(anchor.node)) {
        (Some(off), Some(NodeKind::Text)) => doc.text_range_rect(anchor.node, off, off),
        _ => Some(match edge {
            Edge::Leading => Rect::new(b.x0, b.y0, b.x0, b.y1),
            Edge::Trailing => Rect::new(b.x1, b.y0, b.x1, b.y1),
        }),
    }
}

// The share of one anchor node covered by a span running from (or to) it.
fn part(doc: &Document, anchor: Anchor<NodeId>, edge: Edge) -> Option<Rect> {
    let b = rendered_bounds(doc, anchor.node)?;
    match (anchor.offset, doc.kind(anchor.node)) {
        (Some(off), Some(NodeKind::Text)) => match edge {
            Edge::Leading => doc.text_range_rect(anchor.node, off, text_len(doc, anchor.node)),
            Edge::Trailing => doc.text_range_rect(anchor.node, 0, off),
        },
        _ => Some(b),
    }
}
