// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Reconciler: keeps the [`MatchIndex`] in step with the document.
//!
//! ## Routing
//!
//! Each [`MutationRecord`] is applied on its own, in order:
//!
//! - Character data on a text leaf: strip the spans touching the leaf, then re-run the
//!   matcher on it.
//! - Attribute change: strip and re-match only the changed node itself; descendants are
//!   left alone.
//! - Child list: unbind value nodes inside every removed subtree and strip its spans,
//!   then bind value nodes inside every added subtree and match it.
//!
//! When the changed node sits under a value node (a form control whose live value is
//! not reflected in the tree) within `value_search_depth` ancestors, the record is routed
//! to [`Reconciler::value_changed`] for that value node instead. For character data and
//! attributes the search starts at the parent of the changed node; for child lists it
//! starts at the record's target. Removed subtrees of a child list are always stripped.
//!
//! Records of kinds that are not subscribed, and attribute records for unfiltered names,
//! are ignored.

use alloc::vec::Vec;
use indexmap::IndexSet;
use rustc_hash::FxBuildHasher;
use tracing::{debug, trace, warn};

use crate::error::IndexError;
use crate::index::MatchIndex;
use crate::resolve::descendants;
use crate::span::{Span, SpanId};
use crate::types::{DocumentTree, EventTargets, MutationKinds, MutationOptions, MutationRecord};

/// Finds spans in a scope of the document.
///
/// Called with the scope node and whether its descendants are included. It runs
/// synchronously inside reconciliation and may be called repeatedly for the same scope.
pub trait Matcher<D: DocumentTree, C> {
    /// Report the spans found in `scope`.
    fn find_matches(
        &mut self,
        doc: &D,
        scope: D::Node,
        include_descendants: bool,
    ) -> Vec<Span<D::Node, C>>;
}

impl<D, C, F> Matcher<D, C> for F
where
    D: DocumentTree,
    F: FnMut(&D, D::Node, bool) -> Vec<Span<D::Node, C>>,
{
    fn find_matches(
        &mut self,
        doc: &D,
        scope: D::Node,
        include_descendants: bool,
    ) -> Vec<Span<D::Node, C>> {
        self(doc, scope, include_descendants)
    }
}

/// Capability predicate for value nodes.
pub type ValueLike<D> = fn(&D, <D as DocumentTree>::Node) -> bool;

/// Spans added and removed by one reconciliation step.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reconciled {
    /// Newly indexed spans, in discovery order.
    pub added: Vec<SpanId>,
    /// Spans removed from the index.
    pub removed: Vec<SpanId>,
}

impl Reconciled {
    /// True if nothing changed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }

    /// Append the changes of a later step.
    pub fn extend(&mut self, other: Self) {
        self.added.extend(other.added);
        self.removed.extend(other.removed);
    }
}

/// Applies mutation records and value changes to a [`MatchIndex`].
pub struct Reconciler<D: DocumentTree, C, M> {
    index: MatchIndex<D::Node, C>,
    matcher: M,
    value_like: Option<ValueLike<D>>,
    value_nodes: IndexSet<D::Node, FxBuildHasher>,
    value_search_depth: usize,
    options: MutationOptions,
}

impl<D: DocumentTree, C, M> core::fmt::Debug for Reconciler<D, C, M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Reconciler")
            .field("index", &self.index)
            .field("value_nodes", &self.value_nodes.len())
            .field("value_search_depth", &self.value_search_depth)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl<D: DocumentTree, C, M> Reconciler<D, C, M> {
    /// The index being maintained.
    pub fn index(&self) -> &MatchIndex<D::Node, C> {
        &self.index
    }

    /// Mutable access to the index, for pointer handling.
    pub fn index_mut(&mut self) -> &mut MatchIndex<D::Node, C> {
        &mut self.index
    }

    /// The mutation filter records are checked against.
    pub fn options(&self) -> &MutationOptions {
        &self.options
    }

    /// True if `node` holds a value listener from this reconciler.
    pub fn is_value_bound(&self, node: D::Node) -> bool {
        self.value_nodes.contains(&node)
    }

    /// Bound value nodes, in binding order.
    pub fn value_nodes(&self) -> impl Iterator<Item = D::Node> + '_ {
        self.value_nodes.iter().copied()
    }
}

impl<D, C, M> Reconciler<D, C, M>
where
    D: DocumentTree + EventTargets<D::Node>,
    M: Matcher<D, C>,
{
    /// Create a reconciler over an empty index.
    ///
    /// With no `value_like` predicate there are no value nodes and every record takes
    /// the plain path.
    pub fn new(
        matcher: M,
        value_like: Option<ValueLike<D>>,
        value_search_depth: usize,
        options: MutationOptions,
    ) -> Self {
        Self {
            index: MatchIndex::new(),
            matcher,
            value_like,
            value_nodes: IndexSet::default(),
            value_search_depth,
            options,
        }
    }

    /// Index everything under `root` and bind its value nodes.
    pub fn scan(&mut self, doc: &mut D, root: D::Node) -> Result<Reconciled, IndexError> {
        self.index.set_root(Some(root));
        self.bind_value_nodes(doc, root);
        let mut out = Reconciled::default();
        self.match_into(doc, root, true, &mut out)?;
        debug!(
            spans = out.added.len(),
            targets = self.index.targets().count(),
            value_nodes = self.value_nodes.len(),
            "initial scan"
        );
        Ok(out)
    }

    /// Attach a value listener to every value node in the subtree rooted at `root`.
    ///
    /// Nodes that are already bound are skipped. Returns the number of new bindings.
    pub fn bind_value_nodes(&mut self, doc: &mut D, root: D::Node) -> usize {
        let Some(is_value) = self.value_like else {
            return 0;
        };
        let view: &D = doc;
        let found: Vec<D::Node> = descendants(view, root)
            .filter(|n| is_value(view, *n) && !self.value_nodes.contains(n))
            .collect();
        for &node in &found {
            self.value_nodes.insert(node);
            doc.attach_value_listener(node);
        }
        found.len()
    }

    /// Detach the value listener of every bound node in the subtree rooted at `root`.
    ///
    /// Returns the number of removed bindings.
    pub fn unbind_value_nodes(&mut self, doc: &mut D, root: D::Node) -> usize {
        if self.value_nodes.is_empty() {
            return 0;
        }
        let found: Vec<D::Node> = descendants(doc, root)
            .filter(|n| self.value_nodes.contains(n))
            .collect();
        for &node in &found {
            self.value_nodes.shift_remove(&node);
            doc.detach_value_listener(node);
        }
        found.len()
    }

    /// The first value node among `start` and its ancestors, looking at most
    /// `value_search_depth` nodes up.
    pub fn find_value_ancestor(&self, doc: &D, start: Option<D::Node>) -> Option<D::Node> {
        let is_value = self.value_like?;
        let mut cur = start;
        for _ in 0..self.value_search_depth {
            let node = cur?;
            if doc.is_element(node) && is_value(doc, node) {
                return Some(node);
            }
            cur = doc.parent(node);
        }
        None
    }

    /// Apply one mutation record.
    pub fn apply(
        &mut self,
        doc: &mut D,
        record: &MutationRecord<D::Node>,
    ) -> Result<Reconciled, IndexError> {
        let mut out = Reconciled::default();
        if !self.options.wants(record.kind()) {
            trace!(kind = ?record.kind(), "ignoring unsubscribed record");
            return Ok(out);
        }
        match record {
            MutationRecord::CharacterData { target } => {
                self.rebuild(doc, *target, true, &mut out)?;
            }
            MutationRecord::Attributes { target, name } => {
                if !self.options.wants_attribute(name) {
                    trace!(?target, name = name.as_str(), "ignoring unfiltered attribute");
                    return Ok(out);
                }
                self.rebuild(doc, *target, false, &mut out)?;
            }
            MutationRecord::ChildList {
                target,
                added,
                removed,
            } => {
                for &node in removed {
                    let unbound = self.unbind_value_nodes(doc, node);
                    let stripped = self.index.strip_subtree(doc, node, true);
                    trace!(?node, unbound, stripped = stripped.len(), "subtree removed");
                    out.removed.extend(stripped);
                }
                if let Some(value_node) = self.find_value_ancestor(doc, Some(*target)) {
                    trace!(?target, ?value_node, "child list routed to value node");
                    out.extend(self.rematch_value(doc, value_node)?);
                } else {
                    for &node in added {
                        let bound = self.bind_value_nodes(doc, node);
                        // An earlier record of the same batch may have matched it already.
                        if descendants(doc, node).any(|n| !self.index.owners_of(n).is_empty()) {
                            trace!(?node, bound, "added subtree already indexed");
                            continue;
                        }
                        trace!(?node, bound, "subtree added");
                        self.match_into(doc, node, true, &mut out)?;
                    }
                }
            }
        }
        Ok(out)
    }

    /// A value node committed a new value: strip its spans and match it again.
    ///
    /// Repeating the call without an intervening change leaves the same span set indexed.
    pub fn value_changed(&mut self, doc: &mut D, node: D::Node) -> Result<Reconciled, IndexError> {
        if !self.value_nodes.contains(&node) {
            warn!(?node, "value change on a node that was never bound");
        }
        self.rematch_value(doc, node)
    }

    /// Clear the index and release every value listener.
    pub fn teardown(&mut self, doc: &mut D) -> Vec<SpanId> {
        let removed = self.index.clear(doc);
        for node in self.value_nodes.drain(..) {
            doc.detach_value_listener(node);
        }
        self.index.set_root(None);
        removed
    }

    // Character data and attribute path.
    fn rebuild(
        &mut self,
        doc: &mut D,
        node: D::Node,
        deep: bool,
        out: &mut Reconciled,
    ) -> Result<(), IndexError> {
        if let Some(value_node) = self.find_value_ancestor(doc, doc.parent(node)) {
            trace!(?node, ?value_node, "routed to value node");
            out.extend(self.rematch_value(doc, value_node)?);
            return Ok(());
        }
        out.removed.extend(self.index.strip_subtree(doc, node, deep));
        self.match_into(doc, node, deep, out)
    }

    fn rematch_value(&mut self, doc: &mut D, node: D::Node) -> Result<Reconciled, IndexError> {
        let mut out = Reconciled {
            removed: self.index.strip_subtree(doc, node, true),
            ..Reconciled::default()
        };
        self.match_into(doc, node, true, &mut out)?;
        trace!(
            ?node,
            removed = out.removed.len(),
            added = out.added.len(),
            "value node rematched"
        );
        Ok(out)
    }

    fn match_into(
        &mut self,
        doc: &mut D,
        scope: D::Node,
        deep: bool,
        out: &mut Reconciled,
    ) -> Result<(), IndexError> {
        let found = self.matcher.find_matches(doc, scope, deep);
        out.added.reserve(found.len());
        for span in found {
            out.added.push(self.index.add(doc, span)?);
        }
        Ok(())
    }
}

/// Record kinds for a subscription.
pub(crate) fn subscribed_kinds(
    character_data: bool,
    child_list: bool,
    attributes: bool,
) -> MutationKinds {
    let mut kinds = MutationKinds::empty();
    kinds.set(MutationKinds::CHARACTER_DATA, character_data);
    kinds.set(MutationKinds::CHILD_LIST, child_list);
    kinds.set(MutationKinds::ATTRIBUTES, attributes);
    kinds
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::adapters::doc_tree::{drain_mutations, is_form_control};
    use alloc::string::{String, ToString};
    use alloc::vec;
    use understory_doc_tree::{Document, ListenerKinds, NodeId, NodeKind};

    /// Finds `ddd-dddd` in text leaves, and in the live value of form controls.
    pub(crate) fn phone_matcher(doc: &Document, scope: NodeId, deep: bool) -> Vec<Span<NodeId, String>> {
        let nodes: Vec<NodeId> = if deep {
            descendants(doc, scope).collect()
        } else {
            vec![scope]
        };
        let mut out = Vec::new();
        for node in nodes {
            match doc.kind(node) {
                Some(NodeKind::Text) => {
                    let text = doc.text(node).unwrap_or_default();
                    for (at, number) in find_numbers(text) {
                        out.push(Span::in_text(node, at, at + number.len(), number));
                    }
                }
                Some(NodeKind::Element) if is_form_control(doc, node) => {
                    let value = doc.value(node).unwrap_or_default();
                    if let Some((_, number)) = find_numbers(value).into_iter().next() {
                        out.push(Span::covering(node, number));
                    }
                }
                _ => {}
            }
        }
        out
    }

    fn find_numbers(text: &str) -> Vec<(usize, String)> {
        let b = text.as_bytes();
        let mut out = Vec::new();
        let mut i = 0;
        while i + 8 <= b.len() {
            let w = &b[i..i + 8];
            let shape = w
                .iter()
                .enumerate()
                .all(|(k, c)| if k == 3 { *c == b'-' } else { c.is_ascii_digit() });
            if shape {
                out.push((i, text[i..i + 8].to_string()));
                i += 8;
            } else {
                i += 1;
            }
        }
        out
    }

    pub(crate) type PhoneFn = fn(&Document, NodeId, bool) -> Vec<Span<NodeId, String>>;
    type PhoneReconciler = Reconciler<Document, String, PhoneFn>;

    fn reconciler(attribute_filter: Vec<String>) -> PhoneReconciler {
        let options = MutationOptions {
            kinds: subscribed_kinds(true, true, !attribute_filter.is_empty()),
            subtree: true,
            attribute_filter,
        };
        Reconciler::new(
            phone_matcher as PhoneFn,
            Some(is_form_control as ValueLike<Document>),
            3,
            options,
        )
    }

    fn observed(doc: &mut Document, r: &PhoneReconciler) {
        let root = doc.root();
        crate::types::MutationSource::observe_mutations(doc, root, r.options());
    }

    fn apply_all(r: &mut PhoneReconciler, doc: &mut Document) -> Reconciled {
        let mut out = Reconciled::default();
        for record in drain_mutations(doc) {
            out.extend(r.apply(doc, &record).unwrap());
        }
        out
    }

    // Sorted: slot reuse does not preserve discovery order across rematches.
    fn contexts(r: &PhoneReconciler) -> Vec<String> {
        let mut found: Vec<String> = r.index().iter().map(|(_, s)| s.context.clone()).collect();
        found.sort();
        found
    }

    #[test]
    fn finds_numbers() {
        assert_eq!(
            find_numbers("Call 555-1234 or 555-98765"),
            vec![(5, "555-1234".to_string()), (17, "555-9876".to_string())]
        );
        assert!(find_numbers("55-1234").is_empty());
    }

    #[test]
    fn scan_indexes_and_binds() {
        let mut doc = Document::new("body");
        let p = doc.create_element("p");
        let t = doc.create_text("Call 555-1234 now");
        let input = doc.create_element("input");
        doc.append_child(doc.root(), p);
        doc.append_child(p, t);
        doc.append_child(doc.root(), input);
        doc.set_value(input, "555-0000");

        let mut r = reconciler(vec![]);
        let root = doc.root();
        let out = r.scan(&mut doc, root).unwrap();
        assert_eq!(out.added.len(), 2);
        assert_eq!(contexts(&r), vec!["555-0000", "555-1234"]);
        assert!(r.is_value_bound(input));
        assert!(doc.listeners(input).contains(ListenerKinds::VALUE_COMMIT));
        assert_eq!(r.bind_value_nodes(&mut doc, root), 0, "binding is idempotent");
    }

    #[test]
    fn text_change_rematches_leaf() {
        let mut doc = Document::new("body");
        let p = doc.create_element("p");
        let t = doc.create_text("Call 555-1234 now");
        doc.append_child(doc.root(), p);
        doc.append_child(p, t);
        let mut r = reconciler(vec![]);
        let root = doc.root();
        r.scan(&mut doc, root).unwrap();
        observed(&mut doc, &r);

        doc.set_text(t, "Call 555-9876 now");
        let out = apply_all(&mut r, &mut doc);
        assert_eq!((out.added.len(), out.removed.len()), (1, 1));
        assert_eq!(contexts(&r), vec!["555-9876"]);

        doc.set_text(t, "no number");
        apply_all(&mut r, &mut doc);
        assert!(r.index().is_empty());
        assert!(doc.listeners(p).is_empty(), "evicted target loses listeners");
    }

    #[test]
    fn removed_subtree_is_stripped() {
        let mut doc = Document::new("body");
        let div = doc.create_element("div");
        let p = doc.create_element("p");
        let t = doc.create_text("555-1234");
        let input = doc.create_element("input");
        doc.append_child(doc.root(), div);
        doc.append_child(div, p);
        doc.append_child(p, t);
        doc.append_child(div, input);
        let mut r = reconciler(vec![]);
        let root = doc.root();
        r.scan(&mut doc, root).unwrap();
        observed(&mut doc, &r);

        doc.remove_child(root, div);
        let out = apply_all(&mut r, &mut doc);
        assert_eq!(out.removed.len(), 1);
        assert!(r.index().lookup(p).is_empty());
        assert!(doc.listeners(p).is_empty());
        assert!(!r.is_value_bound(input));
        assert!(doc.listeners(input).is_empty());
    }

    #[test]
    fn added_subtree_is_matched_and_bound() {
        let mut doc = Document::new("body");
        let mut r = reconciler(vec![]);
        let root = doc.root();
        r.scan(&mut doc, root).unwrap();
        observed(&mut doc, &r);

        let div = doc.create_element("div");
        let t = doc.create_text("x 555-1234");
        let input = doc.create_element("textarea");
        doc.append_child(div, t);
        doc.append_child(div, input);
        doc.append_child(root, div);
        let out = apply_all(&mut r, &mut doc);
        assert_eq!(out.added.len(), 1);
        assert_eq!(r.index().lookup(div).len(), 1);
        assert!(r.is_value_bound(input));
    }

    #[test]
    fn nested_additions_in_one_batch_match_once() {
        let mut doc = Document::new("body");
        let mut r = reconciler(vec![]);
        let root = doc.root();
        r.scan(&mut doc, root).unwrap();
        observed(&mut doc, &r);

        let q = doc.create_element("q");
        let u = doc.create_text("555-1234");
        doc.append_child(root, q);
        doc.append_child(q, u);
        let records = drain_mutations(&mut doc);
        assert_eq!(records.len(), 2);
        let mut out = Reconciled::default();
        for record in &records {
            out.extend(r.apply(&mut doc, record).unwrap());
        }
        assert_eq!(out.added.len(), 1);
        assert_eq!(r.index().lookup(q).len(), 1);
    }

    #[test]
    fn attributes_are_shallow_and_filtered() {
        let mut doc = Document::new("body");
        let p = doc.create_element("p");
        let t = doc.create_text("555-1234");
        doc.append_child(doc.root(), p);
        doc.append_child(p, t);
        let mut r = reconciler(vec!["title".to_string()]);
        let root = doc.root();
        r.scan(&mut doc, root).unwrap();
        observed(&mut doc, &r);

        doc.set_attribute(p, "title", "x");
        let out = apply_all(&mut r, &mut doc);
        assert!(out.is_empty(), "spans anchored below p are left alone");

        r.apply(
            &mut doc,
            &MutationRecord::Attributes {
                target: p,
                name: "class".to_string(),
            },
        )
        .unwrap();
        assert_eq!(r.index().len(), 1);
    }

    #[test]
    fn unsubscribed_kinds_are_ignored() {
        let mut doc = Document::new("body");
        let p = doc.create_element("p");
        let t = doc.create_text("555-1234");
        doc.append_child(doc.root(), p);
        doc.append_child(p, t);
        let options = MutationOptions {
            kinds: MutationKinds::CHILD_LIST,
            subtree: true,
            attribute_filter: vec![],
        };
        let mut r: PhoneReconciler = Reconciler::new(phone_matcher as PhoneFn, None, 3, options);
        let root = doc.root();
        r.scan(&mut doc, root).unwrap();
        let out = r
            .apply(&mut doc, &MutationRecord::CharacterData { target: t })
            .unwrap();
        assert!(out.is_empty());
        assert_eq!(r.index().len(), 1);
    }

    #[test]
    fn changes_under_value_node_take_value_path() {
        let mut doc = Document::new("body");
        let select = doc.create_element("select");
        let option = doc.create_element("option");
        let label = doc.create_text("555-1111");
        doc.append_child(doc.root(), select);
        doc.append_child(select, option);
        doc.append_child(option, label);
        doc.set_value(select, "555-2222");
        let mut r = reconciler(vec![]);
        let root = doc.root();
        r.scan(&mut doc, root).unwrap();
        observed(&mut doc, &r);
        assert_eq!(contexts(&r), vec!["555-1111", "555-2222"]);

        // label → option → select: found within three nodes of the parent.
        doc.set_text(label, "555-3333");
        let out = apply_all(&mut r, &mut doc);
        assert_eq!((out.removed.len(), out.added.len()), (2, 2));
        assert_eq!(contexts(&r), vec!["555-2222", "555-3333"]);

        // Child list on the option also routes to the select.
        let extra = doc.create_text(" 555-4444");
        doc.append_child(option, extra);
        apply_all(&mut r, &mut doc);
        assert_eq!(contexts(&r), vec!["555-2222", "555-3333", "555-4444"]);
    }

    #[test]
    fn value_search_is_depth_limited() {
        let mut doc = Document::new("body");
        let textarea = doc.create_element("textarea");
        let a = doc.create_element("span");
        let b = doc.create_element("span");
        let c = doc.create_element("span");
        let t = doc.create_text("leaf");
        doc.append_child(doc.root(), textarea);
        doc.append_child(textarea, a);
        doc.append_child(a, b);
        doc.append_child(b, c);
        doc.append_child(c, t);
        let r = reconciler(vec![]);
        assert_eq!(r.find_value_ancestor(&doc, Some(a)), Some(textarea));
        assert_eq!(r.find_value_ancestor(&doc, Some(b)), Some(textarea));
        assert_eq!(r.find_value_ancestor(&doc, Some(c)), None, "four nodes up");
        assert_eq!(r.find_value_ancestor(&doc, None), None);
    }

    #[test]
    fn repeated_value_change_is_idempotent() {
        let mut doc = Document::new("body");
        let input = doc.create_element("input");
        doc.append_child(doc.root(), input);
        let mut r = reconciler(vec![]);
        let root = doc.root();
        r.scan(&mut doc, root).unwrap();
        assert!(r.index().is_empty());

        doc.set_value(input, "555-1234");
        assert_eq!(doc.take_value_commits(), vec![input]);
        r.value_changed(&mut doc, input).unwrap();
        let once = contexts(&r);
        r.value_changed(&mut doc, input).unwrap();
        assert_eq!(contexts(&r), once);
        assert_eq!(r.index().lookup(input).len(), 1);
    }

    #[test]
    fn teardown_releases_everything() {
        let mut doc = Document::new("body");
        let p = doc.create_element("p");
        let t = doc.create_text("555-1234");
        let input = doc.create_element("input");
        doc.append_child(doc.root(), p);
        doc.append_child(p, t);
        doc.append_child(doc.root(), input);
        let mut r = reconciler(vec![]);
        let root = doc.root();
        r.scan(&mut doc, root).unwrap();
        assert_eq!(r.teardown(&mut doc).len(), 1);
        assert!(r.index().is_empty());
        assert_eq!(r.value_nodes().count(), 0);
        assert!(doc.listeners(p).is_empty() && doc.listeners(input).is_empty());
        assert_eq!(r.index().root(), None);
    }

    proptest::proptest! {
        #[test]
        fn value_rematch_is_idempotent(value in "[0-9 -]{0,24}") {
            let mut doc = Document::new("body");
            let input = doc.create_element("textarea");
            doc.append_child(doc.root(), input);
            let mut r = reconciler(vec![]);
            let root = doc.root();
            r.scan(&mut doc, root).unwrap();
            doc.set_value(input, &value);
            r.value_changed(&mut doc, input).unwrap();
            let once = contexts(&r);
            let count = r.index().lookup(input).len();
            r.value_changed(&mut doc, input).unwrap();
            proptest::prop_assert_eq!(contexts(&r), once);
            proptest::prop_assert_eq!(r.index().lookup(input).len(), count);
            proptest::prop_assert!(count <= 1);
        }
    }
}
