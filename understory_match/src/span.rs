// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Spans: the matched regions a [`Matcher`](crate::reconcile::Matcher) reports.
//!
//! A [`Span`] is pure identity: two anchors and an opaque context payload.
//! It references host nodes by handle and never owns them. Derived state
//! (the dispatch target and the rectangle cache) lives next to the span inside the
//! [`MatchIndex`](crate::index::MatchIndex), not on the span itself.

/// One end of a span.
///
/// `offset` is only meaningful when `node` is a text leaf; otherwise the span
/// covers the whole node at that end.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Anchor<N> {
    /// The anchoring node.
    pub node: N,
    /// Character offset within a text leaf.
    pub offset: Option<usize>,
}

impl<N> Anchor<N> {
    /// Anchor covering a whole node.
    pub const fn node(node: N) -> Self {
        Self { node, offset: None }
    }

    /// Anchor at `offset` inside a text leaf.
    pub const fn at(node: N, offset: usize) -> Self {
        Self {
            node,
            offset: Some(offset),
        }
    }
}

/// A matched region.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Span<N, C = ()> {
    /// Start anchor.
    pub start: Anchor<N>,
    /// End anchor.
    pub end: Anchor<N>,
    /// Caller payload (for example the parsed phone number).
    pub context: C,
}

impl<N: Copy + Eq, C> Span<N, C> {
    /// Create a span between two anchors.
    pub const fn new(start: Anchor<N>, end: Anchor<N>, context: C) -> Self {
        Self {
            start,
            end,
            context,
        }
    }

    /// Span covering the whole of `node`.
    pub const fn covering(node: N, context: C) -> Self {
        Self::new(Anchor::node(node), Anchor::node(node), context)
    }

    /// Span over the characters `start..end` of a single text leaf.
    pub const fn in_text(node: N, start: usize, end: usize, context: C) -> Self {
        Self::new(Anchor::at(node, start), Anchor::at(node, end), context)
    }

    /// True if both anchors reference the same node.
    pub fn is_single_node(&self) -> bool {
        self.start.node == self.end.node
    }

    /// True if `node` is one of the span's anchors.
    pub fn touches(&self, node: N) -> bool {
        self.start.node == node || self.end.node == node
    }

    /// The distinct anchor nodes, start first.
    pub fn anchor_nodes(&self) -> impl Iterator<Item = N> + '_ {
        let end = (!self.is_single_node()).then_some(self.end.node);
        core::iter::once(self.start.node).chain(end)
    }

    /// True if both spans cover the same region (context is ignored).
    pub fn same_region<D>(&self, other: &Span<N, D>) -> bool {
        self.start == other.start && self.end == other.end
    }
}

/// Handle of an indexed span.
///
/// A slot index plus a generation counter, like the node handles of the host tree.
/// Removing a span frees its slot; reuse bumps the generation, so a stale `SpanId`
/// never aliases a newer span.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct SpanId(pub(crate) u32, pub(crate) u32);

impl SpanId {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Span ids are intentionally 32-bit."
    )]
    pub(crate) const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }

    pub(crate) const fn generation(self) -> u32 {
        self.1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn anchor_nodes_are_distinct() {
        let single: Span<u32> = Span::in_text(7, 2, 5, ());
        assert_eq!(single.anchor_nodes().collect::<Vec<_>>(), [7]);
        let pair: Span<u32> = Span::new(Anchor::at(7, 2), Anchor::node(9), ());
        assert_eq!(pair.anchor_nodes().collect::<Vec<_>>(), [7, 9]);
        assert!(pair.touches(9));
        assert!(!pair.touches(8));
    }

    #[test]
    fn same_region_ignores_context() {
        let a = Span::in_text(1_u32, 0, 3, "a");
        let b = Span::in_text(1_u32, 0, 3, 42);
        let c = Span::in_text(1_u32, 0, 4, "a");
        assert!(a.same_region(&b));
        assert!(!a.same_region(&c));
    }
}
