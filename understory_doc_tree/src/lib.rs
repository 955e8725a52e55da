// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_doc_tree --heading-base-level=0

//! Understory Doc Tree: a small in-memory document that changes under your feet.
//!
//! It models the parts of a live, externally mutated document that incremental consumers
//! (such as `understory_match`) depend on:
//!
//! - Elements and text nodes addressed by generational [`NodeId`] handles.
//! - Attributes, text content, and form-control values. Values change without producing
//!   mutation records, exactly like a real form control.
//! - An observation over a root that queues ordered [`Mutation`] records
//!   (attributes, character data, child list).
//! - Listener registrations per node ([`ListenerKinds`]) and a queue of value commits for
//!   nodes listening for them.
//! - Layout boxes set by the caller, a uniform-advance text model for sub-node ranges,
//!   and a point hit test.
//!
//! It is not a layout engine and not an HTML parser. Callers build the tree, place boxes,
//! and drive mutations; the document only records what happened.
//!
//! ## Minimal usage
//!
//! ```
//! use understory_doc_tree::{Document, Mutation, RecordKinds};
//!
//! let mut doc = Document::new("body");
//! let p = doc.create_element("p");
//! let text = doc.create_text("Call 555-1234 now");
//! doc.append_child(p, text);
//!
//! doc.observe(doc.root(), RecordKinds::all(), true, None);
//! doc.append_child(doc.root(), p);
//! doc.set_text(text, "Call 555-9876 now");
//!
//! let records = doc.take_mutations();
//! assert_eq!(records.len(), 2);
//! assert!(matches!(records[1], Mutation::CharacterData { target } if target == text));
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod document;
mod types;

pub use document::Document;
pub use types::{ListenerKinds, Mutation, NodeId, NodeKind, RecordKinds};
