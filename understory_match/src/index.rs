// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The match index: dispatch target → spans, plus anchor → owning targets.
//!
//! ## Overview
//!
//! Spans live in generational slots addressed by [`SpanId`]. Two maps are kept in
//! lock-step with the slots:
//!
//! - `by_target`: every target with at least one span, with its spans in discovery order
//!   and its pointer-move throttle state. A target whose last span is removed is evicted
//!   immediately and its pointer listeners are detached; no empty entries persist.
//! - `by_anchor`: every node that anchors an indexed span, with the targets owning those
//!   spans. This is what lets [`MatchIndex::strip_subtree`] find the spans touching a
//!   removed subtree without scanning every target.
//!
//! Stripping the observed root takes a bulk path ([`MatchIndex::clear`]) that never walks the tree.
//!
//! ## Duplicates
//!
//! [`MatchIndex::add`] does not deduplicate. Adding a span whose region equals an indexed
//! one yields a second entry; hit testing returns the first in discovery order.

use alloc::vec::Vec;
use indexmap::IndexMap;
use kurbo::Point;
use rustc_hash::FxBuildHasher;
use tracing::{debug, trace};

use crate::error::IndexError;
use crate::rect::RectCache;
use crate::resolve::{descendants, resolve};
use crate::span::{Span, SpanId};
use crate::types::{DocumentTree, EventTargets, Geometry};

type FxIndexMap<K, V> = IndexMap<K, V, FxBuildHasher>;

#[derive(Clone, Debug)]
struct Slot<N, C> {
    generation: u32,
    span: Span<N, C>,
    target: N,
    rect: Option<RectCache>,
}

/// Per-target state.
#[derive(Clone, Debug, Default)]
struct TargetEntry {
    spans: Vec<SpanId>,
    last_move: Option<u64>,
}

/// Incremental index of spans by dispatch target.
pub struct MatchIndex<N, C = ()> {
    slots: Vec<Option<Slot<N, C>>>,
    generations: Vec<u32>, // last generation per slot (persists across frees)
    free_list: Vec<usize>,
    by_target: FxIndexMap<N, TargetEntry>,
    by_anchor: FxIndexMap<N, Vec<N>>,
    root: Option<N>,
}

impl<N: core::fmt::Debug, C> core::fmt::Debug for MatchIndex<N, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MatchIndex")
            .field(
                "spans",
                &self.by_target.values().map(|e| e.spans.len()).sum::<usize>(),
            )
            .field("targets", &self.by_target.len())
            .field("anchors", &self.by_anchor.len())
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl<N, C> Default for MatchIndex<N, C>
where
    N: Copy + Eq + core::hash::Hash + core::fmt::Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<N, C> MatchIndex<N, C>
where
    N: Copy + Eq + core::hash::Hash + core::fmt::Debug,
{
    /// Create an empty index with no observed root.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            by_target: FxIndexMap::default(),
            by_anchor: FxIndexMap::default(),
            root: None,
        }
    }

    /// Set the observed root. Stripping this node takes the bulk-clear path.
    pub fn set_root(&mut self, root: Option<N>) {
        self.root = root;
    }

    /// The observed root, if any.
    pub fn root(&self) -> Option<N> {
        self.root
    }

    /// Number of indexed spans.
    pub fn len(&self) -> usize {
        self.by_target.values().map(|e| e.spans.len()).sum()
    }

    /// True if no span is indexed.
    pub fn is_empty(&self) -> bool {
        self.by_target.is_empty()
    }

    /// Index `span` under its dispatch target.
    ///
    /// Resolves the target (once, for the span's lifetime), appends the span to the
    /// target's list, links both anchors to the target, and attaches pointer listeners
    /// when this is the target's first span.
    pub fn add<D>(&mut self, doc: &mut D, span: Span<N, C>) -> Result<SpanId, IndexError>
    where
        D: DocumentTree<Node = N> + EventTargets<N>,
    {
        let target = resolve(doc, &span)?;
        let anchors: Vec<N> = span.anchor_nodes().collect();
        let id = self.alloc(Slot {
            generation: 0,
            span,
            target,
            rect: None,
        });
        let entry = self.by_target.entry(target).or_default();
        let first = entry.spans.is_empty();
        entry.spans.push(id);
        for anchor in anchors {
            let owners = self.by_anchor.entry(anchor).or_default();
            if !owners.contains(&target) {
                owners.push(target);
            }
        }
        if first {
            trace!(?target, "attaching pointer listeners");
            doc.attach_pointer_listeners(target);
        }
        Ok(id)
    }

    /// Remove one span and return it.
    ///
    /// Anchor links no other span of the same target still needs are cleared; a target
    /// left without spans is evicted together with its listeners and throttle state.
    pub fn remove<D>(&mut self, doc: &mut D, id: SpanId) -> Result<Span<N, C>, IndexError>
    where
        D: EventTargets<N>,
    {
        let slot = self.take(id).ok_or(IndexError::UnknownSpan(id))?;
        let target = slot.target;
        let now_empty = self.by_target.get_mut(&target).is_some_and(|entry| {
            entry.spans.retain(|s| *s != id);
            entry.spans.is_empty()
        });
        for anchor in slot.span.anchor_nodes() {
            if !self.target_still_uses(target, anchor) {
                self.unlink_anchor(anchor, target);
            }
        }
        if now_empty {
            self.by_target.swap_remove(&target);
            trace!(?target, "evicting target");
            doc.detach_pointer_listeners(target);
        }
        Ok(slot.span)
    }

    /// Remove every span with an anchor in the subtree rooted at `node`.
    ///
    /// With `deep` false only `node` itself is considered. Stripping the observed root
    /// deeply is a bulk clear. Returns the ids of the removed spans.
    pub fn strip_subtree<D>(&mut self, doc: &mut D, node: N, deep: bool) -> Vec<SpanId>
    where
        D: DocumentTree<Node = N> + EventTargets<N>,
    {
        if deep && self.root == Some(node) {
            return self.clear(doc);
        }
        let mut removed = Vec::new();
        if deep {
            let nodes: Vec<N> = descendants(doc, node)
                .filter(|n| self.by_anchor.contains_key(n))
                .collect();
            for n in nodes {
                self.strip_anchor(doc, n, &mut removed);
            }
        } else {
            self.strip_anchor(doc, node, &mut removed);
        }
        removed
    }

    fn strip_anchor<D: EventTargets<N>>(&mut self, doc: &mut D, node: N, removed: &mut Vec<SpanId>) {
        let Some(owners) = self.by_anchor.get(&node).cloned() else {
            return;
        };
        for target in owners {
            let touching: Vec<SpanId> = self
                .lookup(target)
                .iter()
                .copied()
                .filter(|id| self.get(*id).is_some_and(|s| s.touches(node)))
                .collect();
            for id in touching {
                if self.remove(doc, id).is_ok() {
                    removed.push(id);
                }
            }
        }
    }

    /// Remove everything, detaching the listeners of every target.
    ///
    /// Returns the ids of the removed spans.
    pub fn clear<D: EventTargets<N>>(&mut self, doc: &mut D) -> Vec<SpanId> {
        debug!(
            targets = self.by_target.len(),
            spans = self.len(),
            "bulk clearing match index"
        );
        for target in self.by_target.keys() {
            doc.detach_pointer_listeners(*target);
        }
        self.by_target.clear();
        self.by_anchor.clear();
        let mut removed = Vec::new();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if let Some(s) = slot.take() {
                removed.push(SpanId::new(i, s.generation));
                self.free_list.push(i);
            }
        }
        removed
    }

    /// Spans owned by `target`, in discovery order; empty if `target` is not indexed.
    pub fn lookup(&self, target: N) -> &[SpanId] {
        self.by_target
            .get(&target)
            .map(|e| e.spans.as_slice())
            .unwrap_or(&[])
    }

    /// True if `target` owns at least one span.
    pub fn contains_target(&self, target: N) -> bool {
        self.by_target.contains_key(&target)
    }

    /// Every indexed target.
    pub fn targets(&self) -> impl Iterator<Item = N> + '_ {
        self.by_target.keys().copied()
    }

    /// Targets owning spans anchored at `anchor`.
    pub fn owners_of(&self, anchor: N) -> &[N] {
        self.by_anchor
            .get(&anchor)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// The span behind `id`.
    pub fn get(&self, id: SpanId) -> Option<&Span<N, C>> {
        self.slot_opt(id).map(|s| &s.span)
    }

    /// The dispatch target of `id`.
    pub fn target_of(&self, id: SpanId) -> Option<N> {
        self.slot_opt(id).map(|s| s.target)
    }

    /// The cached rectangle of `id`, if built.
    pub fn rect(&self, id: SpanId) -> Option<&RectCache> {
        self.slot_opt(id)?.rect.as_ref()
    }

    /// Every indexed span with its id, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SpanId, &Span<N, C>)> + '_ {
        self.slots.iter().enumerate().filter_map(|(i, s)| {
            s.as_ref()
                .map(|s| (SpanId::new(i, s.generation), &s.span))
        })
    }

    /// Measure every span of `target` and cache the result. Returns how many were measured.
    ///
    /// A span the provider cannot measure has its cache cleared.
    pub fn build_rects<G: Geometry<N>>(&mut self, geometry: &G, target: N) -> usize {
        let Some(entry) = self.by_target.get(&target) else {
            return 0;
        };
        let mut built = 0;
        for &id in &entry.spans {
            let Some(Some(slot)) = self.slots.get_mut(id.idx()) else {
                continue;
            };
            slot.rect = geometry
                .measure(slot.span.start, slot.span.end)
                .map(RectCache::from_geometry);
            built += usize::from(slot.rect.is_some());
        }
        built
    }

    /// The first span of `target`, in discovery order, whose cached rectangle contains `pt`.
    pub fn hit_test(&self, target: N, pt: Point) -> Option<SpanId> {
        self.lookup(target)
            .iter()
            .copied()
            .find(|id| self.rect(*id).is_some_and(|r| r.contains(pt)))
    }

    /// Admit a pointer move on `target` at time `now` if at least `interval` has passed
    /// since the last admitted one. Unknown targets are never admitted.
    pub fn admit_move(&mut self, target: N, now: u64, interval: u64) -> bool {
        let Some(entry) = self.by_target.get_mut(&target) else {
            return false;
        };
        if let Some(last) = entry.last_move
            && now.saturating_sub(last) < interval
        {
            return false;
        }
        entry.last_move = Some(now);
        true
    }

    // --- internals ---

    fn target_still_uses(&self, target: N, anchor: N) -> bool {
        self.lookup(target)
            .iter()
            .any(|id| self.get(*id).is_some_and(|s| s.touches(anchor)))
    }

    fn unlink_anchor(&mut self, anchor: N, target: N) {
        if let Some(owners) = self.by_anchor.get_mut(&anchor) {
            owners.retain(|t| *t != target);
            if owners.is_empty() {
                self.by_anchor.swap_remove(&anchor);
            }
        }
    }

    fn alloc(&mut self, mut slot: Slot<N, C>) -> SpanId {
        // A slot whose generation is exhausted is retired, never reused.
        while let Some(idx) = self.free_list.pop() {
            if let Some(generation) = self.generations[idx].checked_add(1) {
                self.generations[idx] = generation;
                slot.generation = generation;
                self.slots[idx] = Some(slot);
                return SpanId::new(idx, generation);
            }
        }
        let generation = 1_u32;
        slot.generation = generation;
        self.slots.push(Some(slot));
        self.generations.push(generation);
        SpanId::new(self.slots.len() - 1, generation)
    }

    fn take(&mut self, id: SpanId) -> Option<Slot<N, C>> {
        self.slot_opt(id)?;
        let slot = self.slots[id.idx()].take();
        self.free_list.push(id.idx());
        slot
    }

    fn slot_opt(&self, id: SpanId) -> Option<&Slot<N, C>> {
        let s = self.slots.get(id.idx())?.as_ref()?;
        (s.generation == id.generation()).then_some(s)
    }
}
