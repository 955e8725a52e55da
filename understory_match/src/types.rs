// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host boundary: the traits a document must implement, and the mutation records it reports.
//!
//! ## Overview
//!
//! The document is owned and mutated by someone else. This crate only needs to
//! walk it ([`DocumentTree`]), register listeners on it ([`EventTargets`]),
//! subscribe to its change feed ([`MutationSource`]), and measure spans inside it ([`Geometry`]).
//! Mutations arrive back as ordered batches of [`MutationRecord`] values.

use alloc::string::String;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::Hash;

use crate::rect::SpanGeometry;
use crate::span::Anchor;

/// Structural queries over the host document.
///
/// Detached subtrees must stay walkable until the host frees them: the `removed`
/// nodes of a [`MutationRecord::ChildList`] are walked after they left the tree.
pub trait DocumentTree {
    /// Node handle. Cheap to copy, compared by identity.
    type Node: Copy + Eq + Hash + Debug;

    /// Returns the parent of `node`, or `None` for a root or detached node.
    fn parent(&self, node: Self::Node) -> Option<Self::Node>;

    /// Returns the first child of `node`.
    fn first_child(&self, node: Self::Node) -> Option<Self::Node>;

    /// Returns the next sibling of `node`.
    fn next_sibling(&self, node: Self::Node) -> Option<Self::Node>;

    /// Returns true if `node` can receive pointer events (an element, not a text leaf).
    fn is_element(&self, node: Self::Node) -> bool;
}

/// Listener registration on host nodes.
///
/// The index attaches pointer listeners when a target gains its first span and
/// detaches them when it loses its last; value listeners are managed by the reconciler.
pub trait EventTargets<N> {
    /// Start delivering pointer enter, leave, and move for `target`.
    fn attach_pointer_listeners(&mut self, target: N);

    /// Stop delivering pointer events for `target`.
    fn detach_pointer_listeners(&mut self, target: N);

    /// Start delivering "value committed" notifications for `node`.
    fn attach_value_listener(&mut self, node: N);

    /// Stop delivering "value committed" notifications for `node`.
    fn detach_value_listener(&mut self, node: N);
}

/// Subscription to the host's mutation feed.
pub trait MutationSource<N> {
    /// Begin reporting mutations under `root` according to `options`.
    fn observe_mutations(&mut self, root: N, options: &MutationOptions);

    /// Stop reporting mutations.
    fn disconnect_mutations(&mut self);
}

/// Geometry measurement for spans.
///
/// Treated as pure but possibly expensive; it only runs when the pointer enters a target.
pub trait Geometry<N> {
    /// Measure the region between two anchors.
    ///
    /// Returns `None` when the region is not rendered.
    fn measure(&self, start: Anchor<N>, end: Anchor<N>) -> Option<SpanGeometry>;
}

bitflags::bitflags! {
    /// Which record kinds a [`MutationOptions`] subscribes to.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct MutationKinds: u8 {
        /// Attribute changes (only names in the attribute filter).
        const ATTRIBUTES     = 0b0000_0001;
        /// Text content changes on text leaves.
        const CHARACTER_DATA = 0b0000_0010;
        /// Child list changes.
        const CHILD_LIST     = 0b0000_0100;
    }
}

/// Filter passed to [`MutationSource::observe_mutations`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MutationOptions {
    /// Record kinds to report.
    pub kinds: MutationKinds,
    /// Report mutations anywhere under the root, not only on the root itself.
    pub subtree: bool,
    /// Attribute names to report. Empty unless [`MutationKinds::ATTRIBUTES`] is set.
    pub attribute_filter: Vec<String>,
}

impl MutationOptions {
    /// True if a record of `kind` should be reconciled.
    pub fn wants(&self, kind: MutationKinds) -> bool {
        self.kinds.contains(kind)
    }

    /// True if an attribute record for `name` should be reconciled.
    pub fn wants_attribute(&self, name: &str) -> bool {
        self.wants(MutationKinds::ATTRIBUTES) && self.attribute_filter.iter().any(|a| a == name)
    }
}

/// A single mutation record, as delivered by the host feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationRecord<N> {
    /// An attribute named `name` changed on `target`.
    Attributes {
        /// The element whose attribute changed.
        target: N,
        /// Attribute name.
        name: String,
    },
    /// Text content of the leaf `target` changed.
    CharacterData {
        /// The text leaf.
        target: N,
    },
    /// Children of `target` were added and/or removed.
    ChildList {
        /// The parent whose child list changed.
        target: N,
        /// Roots of inserted subtrees.
        added: Vec<N>,
        /// Roots of detached subtrees.
        removed: Vec<N>,
    },
}

impl<N: Copy> MutationRecord<N> {
    /// The node the record is reported against.
    pub fn target(&self) -> N {
        match self {
            Self::Attributes { target, .. }
            | Self::CharacterData { target }
            | Self::ChildList { target, .. } => *target,
        }
    }

    /// The record's kind as a [`MutationKinds`] bit.
    pub fn kind(&self) -> MutationKinds {
        match self {
            Self::Attributes { .. } => MutationKinds::ATTRIBUTES,
            Self::CharacterData { .. } => MutationKinds::CHARACTER_DATA,
            Self::ChildList { .. } => MutationKinds::CHILD_LIST,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use alloc::vec;

    #[test]
    fn attribute_filter_requires_kind_and_name() {
        let mut options = MutationOptions {
            kinds: MutationKinds::CHILD_LIST,
            subtree: true,
            attribute_filter: vec!["href".to_string()],
        };
        assert!(!options.wants_attribute("href"), "kind not enabled");
        options.kinds |= MutationKinds::ATTRIBUTES;
        assert!(options.wants_attribute("href"));
        assert!(!options.wants_attribute("class"));
    }

    #[test]
    fn record_kind_and_target() {
        let r: MutationRecord<u32> = MutationRecord::ChildList {
            target: 4,
            added: vec![5],
            removed: vec![],
        };
        assert_eq!(r.kind(), MutationKinds::CHILD_LIST);
        assert_eq!(r.target(), 4);
        let r: MutationRecord<u32> = MutationRecord::CharacterData { target: 9 };
        assert_eq!(r.kind(), MutationKinds::CHARACTER_DATA);
        assert_eq!(r.target(), 9);
    }
}
