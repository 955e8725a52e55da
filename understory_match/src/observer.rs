// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Observer: the lifecycle that ties reconciliation and hover together.
//!
//! ## Lifecycle
//!
//! 1) Build with [`ObserverBuilder`]; a matcher and a hover handler are required.
//! 2) [`Observer::observe`] subscribes to the host's mutation feed, binds value nodes,
//!    and indexes everything under the root. One root per observer.
//! 3) Forward mutation batches to [`Observer::handle_mutations`], value commits to
//!    [`Observer::value_changed`], and pointer events for indexed targets to
//!    [`Observer::pointer_enter`], [`Observer::pointer_move`] and [`Observer::pointer_leave`].
//! 4) [`Observer::disconnect`] unsubscribes and clears everything. A disconnected
//!    observer cannot observe again; build a new one.
//!
//! Hover transitions are delivered to the [`HoverHandler`] as they happen, including the
//! hover-out caused by stripping the hovered span or by disconnecting.

use alloc::string::String;
use alloc::vec::Vec;
use kurbo::Point;
use tracing::debug;

use crate::error::ObserverError;
use crate::hover::{HoverEngine, HoverEvent, HoverState};
use crate::index::MatchIndex;
use crate::reconcile::{Matcher, Reconciled, Reconciler, ValueLike, subscribed_kinds};
use crate::rect::RectCache;
use crate::span::{Span, SpanId};
use crate::types::{
    DocumentTree, EventTargets, Geometry, MutationOptions, MutationRecord, MutationSource,
};

/// The span handed to [`HoverHandler::hover_in`].
#[derive(Debug)]
pub struct Hovered<'a, N, C> {
    /// Index handle of the span.
    pub id: SpanId,
    /// Dispatch target that owns the span.
    pub target: N,
    /// The span itself, including its context payload.
    pub span: &'a Span<N, C>,
    /// Its cached rectangle.
    pub rect: &'a RectCache,
}

/// Receives hover transitions.
pub trait HoverHandler<N, C> {
    /// The pointer entered a span.
    fn hover_in(&mut self, hovered: Hovered<'_, N, C>);

    /// The pointer left the span hovered on `target`.
    fn hover_out(&mut self, target: N);
}

/// A [`HoverHandler`] made of two closures.
#[derive(Clone, Debug)]
pub struct HoverCallbacks<F, G> {
    /// Called on hover-in.
    pub on_in: F,
    /// Called on hover-out.
    pub on_out: G,
}

impl<N, C, F, G> HoverHandler<N, C> for HoverCallbacks<F, G>
where
    F: FnMut(Hovered<'_, N, C>),
    G: FnMut(N),
{
    fn hover_in(&mut self, hovered: Hovered<'_, N, C>) {
        (self.on_in)(hovered);
    }

    fn hover_out(&mut self, target: N) {
        (self.on_out)(target);
    }
}

/// Observer settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ObserverConfig {
    /// Attribute names to watch. Attribute changes are observed only when this is set.
    pub attribute_filter: Option<Vec<String>>,
    /// Minimum interval between admitted pointer moves on one target.
    pub move_throttle: u64,
    /// How many nodes, starting at the mutated node's parent, are searched for a value node.
    pub value_search_depth: usize,
    /// Observe text content changes.
    pub observe_character_data: bool,
    /// Observe child list changes.
    pub observe_child_list: bool,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            attribute_filter: None,
            move_throttle: 100,
            value_search_depth: 3,
            observe_character_data: true,
            observe_child_list: true,
        }
    }
}

impl ObserverConfig {
    /// The mutation subscription this configuration asks for, always subtree-wide.
    pub fn mutation_options(&self) -> MutationOptions {
        MutationOptions {
            kinds: subscribed_kinds(
                self.observe_character_data,
                self.observe_child_list,
                self.attribute_filter.is_some(),
            ),
            subtree: true,
            attribute_filter: self.attribute_filter.clone().unwrap_or_default(),
        }
    }
}

/// Builder for [`Observer`].
pub struct ObserverBuilder<D: DocumentTree, M, H> {
    matcher: Option<M>,
    hover_handler: Option<H>,
    value_like: Option<ValueLike<D>>,
    config: ObserverConfig,
}

impl<D: DocumentTree, M, H> core::fmt::Debug for ObserverBuilder<D, M, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ObserverBuilder")
            .field("matcher", &self.matcher.is_some())
            .field("hover_handler", &self.hover_handler.is_some())
            .field("value_like", &self.value_like.is_some())
            .field("config", &self.config)
            .finish()
    }
}

impl<D: DocumentTree, M, H> Default for ObserverBuilder<D, M, H> {
    fn default() -> Self {
        Self {
            matcher: None,
            hover_handler: None,
            value_like: None,
            config: ObserverConfig::default(),
        }
    }
}

impl<D: DocumentTree, M, H> ObserverBuilder<D, M, H> {
    /// Start an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the matcher (required).
    pub fn matcher(mut self, matcher: M) -> Self {
        self.matcher = Some(matcher);
        self
    }

    /// Set the hover handler (required).
    pub fn hover_handler(mut self, handler: H) -> Self {
        self.hover_handler = Some(handler);
        self
    }

    /// Set the value-node predicate. Without one, no node is treated as a value node.
    pub fn value_like(mut self, predicate: ValueLike<D>) -> Self {
        self.value_like = Some(predicate);
        self
    }

    /// Replace the configuration.
    pub fn config(mut self, config: ObserverConfig) -> Self {
        self.config = config;
        self
    }

    /// Validate and build.
    pub fn build<C>(self) -> Result<Observer<D, C, M, H>, ObserverError>
    where
        D: EventTargets<D::Node>,
        M: Matcher<D, C>,
        H: HoverHandler<D::Node, C>,
    {
        let matcher = self.matcher.ok_or(ObserverError::MissingMatcher)?;
        let handler = self.hover_handler.ok_or(ObserverError::MissingHoverHandler)?;
        let reconciler = Reconciler::new(
            matcher,
            self.value_like,
            self.config.value_search_depth,
            self.config.mutation_options(),
        );
        Ok(Observer {
            reconciler,
            hover: HoverEngine::new(self.config.move_throttle),
            handler,
            lifecycle: Lifecycle::Ready,
        })
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Lifecycle<N> {
    Ready,
    Observing(N),
    Disconnected,
}

/// Keeps spans for one observed root and drives hover callbacks.
pub struct Observer<D: DocumentTree, C, M, H> {
    reconciler: Reconciler<D, C, M>,
    hover: HoverEngine<D::Node>,
    handler: H,
    lifecycle: Lifecycle<D::Node>,
}

impl<D: DocumentTree, C, M, H> core::fmt::Debug for Observer<D, C, M, H> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Observer")
            .field("reconciler", &self.reconciler)
            .field("hover", &self.hover)
            .field("lifecycle", &self.lifecycle)
            .finish_non_exhaustive()
    }
}

impl<D, C, M, H> Observer<D, C, M, H>
where
    D: DocumentTree + EventTargets<D::Node>,
    M: Matcher<D, C>,
    H: HoverHandler<D::Node, C>,
{
    /// Start observing `root` and index everything under it.
    ///
    /// If indexing fails, nothing stays subscribed or indexed and the observer can be retried.
    pub fn observe(&mut self, doc: &mut D, root: D::Node) -> Result<Reconciled, ObserverError>
    where
        D: MutationSource<D::Node>,
    {
        match self.lifecycle {
            Lifecycle::Ready => {}
            Lifecycle::Observing(_) => return Err(ObserverError::AlreadyObserving),
            Lifecycle::Disconnected => return Err(ObserverError::Disconnected),
        }
        doc.observe_mutations(root, self.reconciler.options());
        let out = match self.reconciler.scan(doc, root) {
            Ok(out) => out,
            Err(err) => {
                doc.disconnect_mutations();
                let removed = self.reconciler.teardown(doc);
                debug!(?root, ?err, rolled_back = removed.len(), "scan failed");
                return Err(err.into());
            }
        };
        self.lifecycle = Lifecycle::Observing(root);
        debug!(?root, spans = out.added.len(), "observing");
        Ok(out)
    }

    /// Apply a batch of mutation records, in order.
    ///
    /// Stops at the first failing record.
    pub fn handle_mutations(
        &mut self,
        doc: &mut D,
        records: &[MutationRecord<D::Node>],
    ) -> Result<Reconciled, ObserverError> {
        self.require_observing()?;
        let mut out = Reconciled::default();
        for record in records {
            let step = match self.reconciler.apply(doc, record) {
                Ok(step) => step,
                Err(err) => {
                    self.forget_dead();
                    return Err(err.into());
                }
            };
            self.forget(&step.removed);
            out.extend(step);
        }
        Ok(out)
    }

    /// A value node committed a new value.
    pub fn value_changed(&mut self, doc: &mut D, node: D::Node) -> Result<Reconciled, ObserverError> {
        self.require_observing()?;
        let out = self
            .reconciler
            .value_changed(doc, node)
            .inspect_err(|_| self.forget_dead())?;
        self.forget(&out.removed);
        Ok(out)
    }

    /// The pointer entered `target`. Returns the number of spans measured.
    pub fn pointer_enter<G: Geometry<D::Node>>(&mut self, geometry: &G, target: D::Node) -> usize {
        self.hover
            .pointer_enter(self.reconciler.index_mut(), geometry, target)
    }

    /// The pointer moved to `pt` over `target` at time `now`.
    pub fn pointer_move(&mut self, target: D::Node, pt: Point, now: u64) {
        let events = self
            .hover
            .pointer_move(self.reconciler.index_mut(), target, pt, now);
        dispatch(self.reconciler.index(), &mut self.handler, events);
    }

    /// The pointer left `target`.
    pub fn pointer_leave(&mut self, target: D::Node) {
        let events = self.hover.pointer_leave(self.reconciler.index(), target);
        dispatch(self.reconciler.index(), &mut self.handler, events);
    }

    /// Stop observing and clear everything. Returns the removed spans.
    pub fn disconnect(&mut self, doc: &mut D) -> Result<Vec<SpanId>, ObserverError>
    where
        D: MutationSource<D::Node>,
    {
        let root = self.require_observing()?;
        doc.disconnect_mutations();
        let removed = self.reconciler.teardown(doc);
        let events = self.hover.reset();
        dispatch(self.reconciler.index(), &mut self.handler, events);
        self.lifecycle = Lifecycle::Disconnected;
        debug!(?root, spans = removed.len(), "disconnected");
        Ok(removed)
    }

    fn require_observing(&self) -> Result<D::Node, ObserverError> {
        match self.lifecycle {
            Lifecycle::Observing(root) => Ok(root),
            Lifecycle::Ready => Err(ObserverError::NotObserving),
            Lifecycle::Disconnected => Err(ObserverError::Disconnected),
        }
    }

    fn forget(&mut self, removed: &[SpanId]) {
        if removed.is_empty() {
            return;
        }
        let events = self.hover.forget_spans(removed);
        dispatch(self.reconciler.index(), &mut self.handler, events);
    }

    // A failed record may have stripped the hovered span without reporting it.
    fn forget_dead(&mut self) {
        if let HoverState::Hovering { span, .. } = self.hover.state()
            && self.reconciler.index().get(span).is_none()
        {
            self.forget(&[span]);
        }
    }
}

impl<D: DocumentTree, C, M, H> Observer<D, C, M, H> {
    /// The observed root, while observing.
    pub fn root(&self) -> Option<D::Node> {
        match self.lifecycle {
            Lifecycle::Observing(root) => Some(root),
            _ => None,
        }
    }

    /// True between [`observe`](Self::observe) and [`disconnect`](Self::disconnect).
    pub fn is_observing(&self) -> bool {
        matches!(self.lifecycle, Lifecycle::Observing(_))
    }

    /// The span index.
    pub fn index(&self) -> &MatchIndex<D::Node, C> {
        self.reconciler.index()
    }

    /// Current hover state.
    pub fn hover_state(&self) -> HoverState<D::Node> {
        self.hover.state()
    }

    /// The hover handler.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Mutable access to the hover handler.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }
}

fn dispatch<N, C, H>(index: &MatchIndex<N, C>, handler: &mut H, events: Vec<HoverEvent<N>>)
where
    N: Copy + Eq + core::hash::Hash + core::fmt::Debug,
    H: HoverHandler<N, C>,
{
    for event in events {
        match event {
            HoverEvent::In { target, span: id } => {
                // Hits always come from spans with a cached rectangle.
                let (Some(span), Some(rect)) = (index.get(id), index.rect(id)) else {
                    continue;
                };
                handler.hover_in(Hovered {
                    id,
                    target,
                    span,
                    rect,
                });
            }
            HoverEvent::Out { target } => handler.hover_out(target),
        }
    }
}
