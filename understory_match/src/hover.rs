// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Hover engine: per-target pointer handling over the rectangles of indexed spans.
//!
//! ## Usage
//!
//! 1) Forward pointer enter, move, and leave for indexed targets.
//! 2) Each call returns the [`HoverEvent`] transitions it caused, in order.
//!
//! Hover is a two-state machine, [`HoverState::Idle`] and [`HoverState::Hovering`].
//! Only one span is hovered process-wide, and events are produced only on state change:
//! repeated moves inside the hovered span produce nothing.
//!
//! ## Minimal example
//!
//! ```
//! use kurbo::Point;
//! use understory_match::hover::{HoverEngine, HoverState};
//! use understory_match::index::MatchIndex;
//!
//! let mut index: MatchIndex<u32> = MatchIndex::new();
//! let mut hover = HoverEngine::new(100);
//! // Nothing is indexed under target 7, so the pointer is ignored.
//! assert!(hover.pointer_move(&mut index, 7, Point::new(1.0, 1.0), 0).is_empty());
//! assert_eq!(hover.state(), HoverState::Idle);
//! assert!(hover.pointer_leave(&index, 7).is_empty());
//! ```

use alloc::vec::Vec;
use kurbo::Point;
use tracing::trace;

use crate::index::MatchIndex;
use crate::span::SpanId;
use crate::types::Geometry;

/// Current hover state.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum HoverState<N> {
    /// No span is hovered.
    #[default]
    Idle,
    /// `span`, owned by `target`, is under the pointer.
    Hovering {
        /// Dispatch target of the hovered span.
        target: N,
        /// The hovered span.
        span: SpanId,
    },
}

/// A hover transition.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum HoverEvent<N> {
    /// The pointer entered `span`.
    In {
        /// Dispatch target of the span.
        target: N,
        /// The newly hovered span.
        span: SpanId,
    },
    /// The pointer left the span previously hovered on `target`.
    Out {
        /// Dispatch target of the span that was hovered.
        target: N,
    },
}

/// Pointer handling and hover state.
#[derive(Clone, Debug)]
pub struct HoverEngine<N> {
    state: HoverState<N>,
    move_throttle: u64,
}

impl<N: Copy + Eq + core::hash::Hash + core::fmt::Debug> HoverEngine<N> {
    /// Create an idle engine admitting at most one move per `move_throttle` time units per target.
    pub fn new(move_throttle: u64) -> Self {
        Self {
            state: HoverState::Idle,
            move_throttle,
        }
    }

    /// Current state.
    pub fn state(&self) -> HoverState<N> {
        self.state
    }

    /// Minimum interval between admitted moves on one target.
    pub fn move_throttle(&self) -> u64 {
        self.move_throttle
    }

    /// The pointer entered `target`: (re)build the rectangles of its spans.
    ///
    /// Returns the number of spans that were measured.
    pub fn pointer_enter<C, G: Geometry<N>>(
        &mut self,
        index: &mut MatchIndex<N, C>,
        geometry: &G,
        target: N,
    ) -> usize {
        let built = index.build_rects(geometry, target);
        trace!(?target, built, "pointer enter");
        built
    }

    /// The pointer moved to `pt` over `target` at time `now`.
    ///
    /// Moves inside the throttle window of `target` are dropped. Otherwise the first
    /// span of `target` whose rectangle contains `pt` becomes the hovered span.
    pub fn pointer_move<C>(
        &mut self,
        index: &mut MatchIndex<N, C>,
        target: N,
        pt: Point,
        now: u64,
    ) -> Vec<HoverEvent<N>> {
        let mut out = Vec::new();
        if !index.admit_move(target, now, self.move_throttle) {
            trace!(?target, now, "pointer move dropped");
            return out;
        }
        match (index.hit_test(target, pt), self.state) {
            (Some(span), HoverState::Hovering { span: current, .. }) if span == current => {}
            (Some(span), previous) => {
                if let HoverState::Hovering { target: prev, .. } = previous {
                    out.push(HoverEvent::Out { target: prev });
                }
                self.state = HoverState::Hovering { target, span };
                out.push(HoverEvent::In { target, span });
            }
            (None, HoverState::Hovering { target: prev, .. }) => {
                self.state = HoverState::Idle;
                out.push(HoverEvent::Out { target: prev });
            }
            (None, HoverState::Idle) => {}
        }
        if !out.is_empty() {
            trace!(?target, ?out, "hover transition");
        }
        out
    }

    /// The pointer left `target`: clear any active hover.
    pub fn pointer_leave<C>(&mut self, index: &MatchIndex<N, C>, target: N) -> Vec<HoverEvent<N>> {
        if !index.contains_target(target) {
            return Vec::new();
        }
        self.reset()
    }

    /// Spans were removed from the index; if the hovered one is among them, go idle.
    pub fn forget_spans(&mut self, removed: &[SpanId]) -> Vec<HoverEvent<N>> {
        match self.state {
            HoverState::Hovering { span, .. } if removed.contains(&span) => self.reset(),
            _ => Vec::new(),
        }
    }

    /// Return to idle, emitting hover-out if a span was hovered.
    pub fn reset(&mut self) -> Vec<HoverEvent<N>> {
        match core::mem::take(&mut self.state) {
            HoverState::Hovering { target, .. } => alloc::vec![HoverEvent::Out { target }],
            HoverState::Idle => Vec::new(),
        }
    }
}
