// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Target resolution and subtree walking.
//!
//! ## Dispatch targets
//!
//! Every span is owned by exactly one dispatch target: the element that receives
//! pointer events on the span's behalf.
//!
//! - Single-node span: the anchor itself, promoted to its nearest element ancestor
//!   when the anchor is a text leaf.
//! - Two-node span: the nearest common ancestor of the anchors, promoted the same way.
//!
//! The common-ancestor walk is the most expensive step of indexing; the
//! [`MatchIndex`](crate::index::MatchIndex) runs it once per span and keeps the result.

use alloc::vec::Vec;

use crate::error::IndexError;
use crate::span::Span;
use crate::types::DocumentTree;

/// Resolve the dispatch target of `span`.
pub fn resolve<D: DocumentTree, C>(doc: &D, span: &Span<D::Node, C>) -> Result<D::Node, IndexError> {
    let container = if span.is_single_node() {
        span.start.node
    } else {
        common_ancestor(doc, span.start.node, span.end.node).ok_or(IndexError::DisjointAnchors)?
    };
    nearest_element(doc, container).ok_or(IndexError::NoElementAncestor)
}

/// The inclusive nearest element ancestor of `node`.
pub fn nearest_element<D: DocumentTree>(doc: &D, node: D::Node) -> Option<D::Node> {
    let mut cur = Some(node);
    while let Some(c) = cur {
        if doc.is_element(c) {
            return Some(c);
        }
        cur = doc.parent(c);
    }
    None
}

/// The nearest common inclusive ancestor of `a` and `b`.
pub fn common_ancestor<D: DocumentTree>(doc: &D, a: D::Node, b: D::Node) -> Option<D::Node> {
    if a == b {
        return Some(a);
    }
    let pa = path_to_root(doc, a);
    let pb = path_to_root(doc, b);
    // Length of the shared root prefix; the last shared entry is the answer.
    let mut lca = 0;
    while lca < pa.len() && lca < pb.len() && pa[lca] == pb[lca] {
        lca += 1;
    }
    lca.checked_sub(1).map(|i| pa[i])
}

/// Root→node path, inclusive of both ends.
pub fn path_to_root<D: DocumentTree>(doc: &D, node: D::Node) -> Vec<D::Node> {
    let mut out = Vec::new();
    let mut cur = node;
    // Collect to root; the host guarantees acyclic ancestry.
    loop {
        out.push(cur);
        match doc.parent(cur) {
            Some(p) => cur = p,
            None => break,
        }
    }
    out.reverse();
    out
}

/// Pre-order walk over `root` and its descendants.
///
/// Works on detached subtrees: the walk never climbs above `root`.
pub fn descendants<D: DocumentTree>(doc: &D, root: D::Node) -> Descendants<'_, D> {
    Descendants {
        doc,
        root,
        next: Some(root),
    }
}

/// Iterator returned by [`descendants`].
pub struct Descendants<'a, D: DocumentTree> {
    doc: &'a D,
    root: D::Node,
    next: Option<D::Node>,
}

impl<D: DocumentTree> core::fmt::Debug for Descendants<'_, D> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Descendants")
            .field("root", &self.root)
            .field("next", &self.next)
            .finish_non_exhaustive()
    }
}

impl<D: DocumentTree> Iterator for Descendants<'_, D> {
    type Item = D::Node;

    fn next(&mut self) -> Option<D::Node> {
        let cur = self.next.take()?;
        self.next = self.successor(cur);
        Some(cur)
    }
}

impl<D: DocumentTree> Descendants<'_, D> {
    fn successor(&self, cur: D::Node) -> Option<D::Node> {
        if let Some(child) = self.doc.first_child(cur) {
            return Some(child);
        }
        let mut up = cur;
        loop {
            if up == self.root {
                return None;
            }
            if let Some(sibling) = self.doc.next_sibling(up) {
                return Some(sibling);
            }
            up = self.doc.parent(up)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Anchor;
    use alloc::vec;
    use understory_doc_tree::{Document, NodeId};

    // body
    // ├── div
    // │   ├── p  ── "alpha"
    // │   └── em ── "beta"
    // └── section ── "gamma"
    struct Fixture {
        doc: Document,
        div: NodeId,
        p: NodeId,
        alpha: NodeId,
        em: NodeId,
        beta: NodeId,
        section: NodeId,
        gamma: NodeId,
    }

    fn fixture() -> Fixture {
        let mut doc = Document::new("body");
        let root = doc.root();
        let div = doc.create_element("div");
        let p = doc.create_element("p");
        let alpha = doc.create_text("alpha");
        let em = doc.create_element("em");
        let beta = doc.create_text("beta");
        let section = doc.create_element("section");
        let gamma = doc.create_text("gamma");
        doc.append_child(root, div);
        doc.append_child(div, p);
        doc.append_child(p, alpha);
        doc.append_child(div, em);
        doc.append_child(em, beta);
        doc.append_child(root, section);
        doc.append_child(section, gamma);
        Fixture {
            doc,
            div,
            p,
            alpha,
            em,
            beta,
            section,
            gamma,
        }
    }

    #[test]
    fn text_leaf_resolves_to_parent_element() {
        let f = fixture();
        let span = Span::in_text(f.alpha, 0, 3, ());
        assert_eq!(resolve(&f.doc, &span), Ok(f.p));
    }

    #[test]
    fn element_anchor_resolves_to_itself() {
        let f = fixture();
        let span = Span::covering(f.em, ());
        assert_eq!(resolve(&f.doc, &span), Ok(f.em));
    }

    #[test]
    fn two_anchors_resolve_to_common_ancestor() {
        let f = fixture();
        let span = Span::new(Anchor::at(f.alpha, 2), Anchor::at(f.beta, 1), ());
        assert_eq!(resolve(&f.doc, &span), Ok(f.div));
        let wide = Span::new(Anchor::at(f.alpha, 0), Anchor::at(f.gamma, 1), ());
        assert_eq!(resolve(&f.doc, &wide), Ok(f.doc.root()));
    }

    #[test]
    fn detached_text_has_no_element() {
        let mut f = fixture();
        let loose = f.doc.create_text("loose");
        let span = Span::in_text(loose, 0, 1, ());
        assert_eq!(resolve(&f.doc, &span), Err(IndexError::NoElementAncestor));
        let across = Span::new(Anchor::at(loose, 0), Anchor::at(f.alpha, 1), ());
        assert_eq!(resolve(&f.doc, &across), Err(IndexError::DisjointAnchors));
    }

    #[test]
    fn preorder_walk_stays_inside_root() {
        let f = fixture();
        let all: Vec<_> = descendants(&f.doc, f.doc.root()).collect();
        assert_eq!(
            all,
            vec![
                f.doc.root(),
                f.div,
                f.p,
                f.alpha,
                f.em,
                f.beta,
                f.section,
                f.gamma
            ]
        );
        let sub: Vec<_> = descendants(&f.doc, f.p).collect();
        assert_eq!(sub, vec![f.p, f.alpha], "must not escape to `em`");
        let leaf: Vec<_> = descendants(&f.doc, f.beta).collect();
        assert_eq!(leaf, vec![f.beta]);
    }

    #[test]
    fn walk_covers_detached_subtree() {
        let mut f = fixture();
        f.doc.remove_child(f.div, f.em);
        let sub: Vec<_> = descendants(&f.doc, f.em).collect();
        assert_eq!(sub, vec![f.em, f.beta]);
    }
}
