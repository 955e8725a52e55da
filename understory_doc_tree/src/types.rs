// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the document tree: node identifiers, kinds, listener and record flags,
//! and the mutation records produced by [`Document::take_mutations`](crate::Document::take_mutations).

use alloc::string::String;
use alloc::vec::Vec;

/// Identifier for a node in the document.
///
/// A small, copyable handle made of a slot index and a generation counter.
///
/// ## Semantics
///
/// - On creation, a fresh slot is allocated with generation `1`.
/// - On [`free_subtree`](crate::Document::free_subtree), the slot is released and any
///   existing `NodeId` that pointed to it becomes stale.
/// - On reuse of a freed slot, its generation is incremented, producing a new, distinct `NodeId`.
///
/// Detaching a node with [`remove_child`](crate::Document::remove_child) does not free it:
/// the detached subtree stays fully walkable, which is what mutation consumers rely on when
/// they process the `removed` list of a [`Mutation::ChildList`] record.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// The two node kinds the document models.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum NodeKind {
    /// An element with a tag name, attributes, children, and (for form controls) a value.
    Element,
    /// A text leaf.
    Text,
}

bitflags::bitflags! {
    /// Listener registrations on a node.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct ListenerKinds: u8 {
        /// Pointer enter.
        const POINTER_ENTER = 0b0000_0001;
        /// Pointer leave.
        const POINTER_LEAVE = 0b0000_0010;
        /// Pointer move.
        const POINTER_MOVE  = 0b0000_0100;
        /// Form-control value committed.
        const VALUE_COMMIT  = 0b0000_1000;
        /// Enter, leave, and move together.
        const POINTER = Self::POINTER_ENTER.bits()
            | Self::POINTER_LEAVE.bits()
            | Self::POINTER_MOVE.bits();
    }
}

bitflags::bitflags! {
    /// Which kinds of mutation an observation records.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct RecordKinds: u8 {
        /// Attribute set or removed.
        const ATTRIBUTES     = 0b0000_0001;
        /// Text content of a text node replaced.
        const CHARACTER_DATA = 0b0000_0010;
        /// Children added to or removed from an element.
        const CHILD_LIST     = 0b0000_0100;
    }
}

/// A single mutation record.
///
/// Records are queued in the order the mutations happened and drained with
/// [`Document::take_mutations`](crate::Document::take_mutations).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mutation {
    /// An attribute of `target` was set or removed.
    Attributes {
        /// The element whose attribute changed.
        target: NodeId,
        /// Attribute name.
        name: String,
    },
    /// The text of `target` (a text node) changed.
    CharacterData {
        /// The text node.
        target: NodeId,
    },
    /// Children of `target` were added or removed.
    ChildList {
        /// The parent whose child list changed.
        target: NodeId,
        /// Roots of the subtrees that were inserted.
        added: Vec<NodeId>,
        /// Roots of the subtrees that were detached.
        removed: Vec<NodeId>,
    },
}

impl Mutation {
    /// The node the record is reported against.
    pub fn target(&self) -> NodeId {
        match self {
            Self::Attributes { target, .. }
            | Self::CharacterData { target }
            | Self::ChildList { target, .. } => *target,
        }
    }
}
