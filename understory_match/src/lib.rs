// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_match --heading-base-level=0

//! Understory Match: an incremental index of matched spans inside a live document, with hover.
//!
//! ## Overview
//!
//! A caller-supplied [`Matcher`](crate::reconcile::Matcher) finds [`Span`](crate::span::Span)s
//! (for example phone numbers) in a document that someone else owns and keeps mutating.
//! This crate keeps those spans indexed while the document changes, and turns pointer
//! events into at most one hover-in and one hover-out per span entered.
//!
//! - [`resolve`](crate::resolve): each span gets one dispatch target, the nearest element
//!   enclosing both anchors, computed once.
//! - [`MatchIndex`](crate::index::MatchIndex): target → spans and anchor → targets, in
//!   lock-step. Targets are evicted, and lose their pointer listeners, with their last span.
//! - [`Reconciler`](crate::reconcile::Reconciler): applies ordered mutation records by
//!   stripping and re-matching only what changed. Form controls ("value nodes") whose live
//!   value never shows up as a mutation are re-matched on value commits instead.
//! - [`HoverEngine`](crate::hover::HoverEngine): measures spans on pointer enter (never
//!   during indexing), throttles moves per target, and runs the idle / hovering machine.
//! - [`Observer`](crate::observer::Observer): the lifecycle around all of the above.
//!
//! ## Host
//!
//! The document is reached only through the traits in [`types`]: walk it
//! ([`DocumentTree`](crate::types::DocumentTree)), register listeners
//! ([`EventTargets`](crate::types::EventTargets)), subscribe to mutations
//! ([`MutationSource`](crate::types::MutationSource)) and measure spans
//! ([`Geometry`](crate::types::Geometry)). With the `doc_tree_adapter` feature,
//! `understory_doc_tree::Document` implements all of them.
//!
//! ## Minimal example
//!
//! ```
//! use kurbo::{Point, Rect};
//! use understory_match::observer::{HoverCallbacks, Hovered, ObserverBuilder, ObserverConfig};
//! use understory_match::rect::SpanGeometry;
//! use understory_match::span::{Anchor, Span};
//! use understory_match::types::{DocumentTree, EventTargets, Geometry, MutationOptions, MutationSource};
//!
//! // Node 0 is an element; node 1 is its only child, a text leaf "Call 555-1234 now".
//! #[derive(Default)]
//! struct Page { listening: bool }
//!
//! impl DocumentTree for Page {
//!     type Node = u32;
//!     fn parent(&self, n: u32) -> Option<u32> { (n == 1).then_some(0) }
//!     fn first_child(&self, n: u32) -> Option<u32> { (n == 0).then_some(1) }
//!     fn next_sibling(&self, _: u32) -> Option<u32> { None }
//!     fn is_element(&self, n: u32) -> bool { n == 0 }
//! }
//! impl EventTargets<u32> for Page {
//!     fn attach_pointer_listeners(&mut self, _: u32) { self.listening = true; }
//!     fn detach_pointer_listeners(&mut self, _: u32) { self.listening = false; }
//!     fn attach_value_listener(&mut self, _: u32) {}
//!     fn detach_value_listener(&mut self, _: u32) {}
//! }
//! impl MutationSource<u32> for Page {
//!     fn observe_mutations(&mut self, _: u32, _: &MutationOptions) {}
//!     fn disconnect_mutations(&mut self) {}
//! }
//! // Ten units per character on a single line.
//! impl Geometry<u32> for Page {
//!     fn measure(&self, s: Anchor<u32>, e: Anchor<u32>) -> Option<SpanGeometry> {
//!         let x = |a: Anchor<u32>| a.offset.unwrap_or(0) as f64 * 10.0;
//!         Some(SpanGeometry {
//!             bounds: Rect::new(x(s), 0.0, x(e), 20.0),
//!             start_caret: Rect::new(x(s), 0.0, x(s), 20.0),
//!             end_caret: Rect::new(x(e), 0.0, x(e), 20.0),
//!         })
//!     }
//! }
//!
//! let mut page = Page::default();
//! let mut hovered = Vec::new();
//! let mut observer = ObserverBuilder::<Page, _, _>::new()
//!     .matcher(|_: &Page, _: u32, _: bool| vec![Span::in_text(1, 5, 13, "555-1234")])
//!     .hover_handler(HoverCallbacks {
//!         on_in: |h: Hovered<'_, u32, &'static str>| hovered.push(h.span.context),
//!         on_out: |_: u32| {},
//!     })
//!     .config(ObserverConfig::default())
//!     .build()
//!     .unwrap();
//!
//! observer.observe(&mut page, 0).unwrap();
//! assert!(page.listening, "the span's target is the text's parent element");
//! observer.pointer_enter(&page, 0);
//! observer.pointer_move(0, Point::new(60.0, 10.0), 0);
//! observer.pointer_move(0, Point::new(70.0, 10.0), 100);
//! observer.disconnect(&mut page).unwrap();
//! assert!(!page.listening);
//! drop(observer);
//! assert_eq!(hovered, ["555-1234"]);
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod adapters;
pub mod error;
pub mod hover;
pub mod index;
pub mod observer;
pub mod reconcile;
pub mod rect;
pub mod resolve;
pub mod span;
pub mod types;

pub use error::{IndexError, ObserverError};
pub use hover::{HoverEngine, HoverEvent, HoverState};
pub use index::MatchIndex;
pub use observer::{
    HoverCallbacks, HoverHandler, Hovered, Observer, ObserverBuilder, ObserverConfig,
};
pub use reconcile::{Matcher, Reconciled, Reconciler, ValueLike};
pub use rect::{RectCache, SpanGeometry};
pub use span::{Anchor, Span, SpanId};
pub use types::{
    DocumentTree, EventTargets, Geometry, MutationKinds, MutationOptions, MutationRecord,
    MutationSource,
};
