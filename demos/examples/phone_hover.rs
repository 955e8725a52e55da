// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Phone number hover.
//!
//! Index phone numbers in a paragraph, route pointer positions to the listening
//! target the way a host would, and watch hover-in and hover-out fire once each. Then
//! edit the text and remove the paragraph.
//!
//! Run:
//! - `cargo run -p understory_demos --example phone_hover`

use std::cell::RefCell;

use kurbo::{Point, Rect};
use understory_doc_tree::{Document, ListenerKinds, NodeId, NodeKind};
use understory_match::adapters::doc_tree::drain_mutations;
use understory_match::resolve::descendants;
use understory_match::{HoverCallbacks, Hovered, ObserverBuilder, ObserverConfig, Span};

// `ddd-dddd` in every text leaf of the scope.
fn phones(doc: &Document, scope: NodeId, deep: bool) -> Vec<Span<NodeId, String>> {
    let nodes: Vec<NodeId> = if deep {
        descendants(doc, scope).collect()
    } else {
        vec![scope]
    };
    let mut out = Vec::new();
    for node in nodes {
        if doc.kind(node) != Some(NodeKind::Text) {
            continue;
        }
        let text = doc.text(node).unwrap_or_default();
        let bytes = text.as_bytes();
        for start in 0..bytes.len().saturating_sub(7) {
            let w = &bytes[start..start + 8];
            let digits = w
                .iter()
                .enumerate()
                .all(|(i, c)| if i == 3 { *c == b'-' } else { c.is_ascii_digit() });
            if digits {
                out.push(Span::in_text(
                    node,
                    start,
                    start + 8,
                    text[start..start + 8].to_string(),
                ));
            }
        }
    }
    out
}

fn main() {
    let mut doc = Document::new("body");
    let root = doc.root();
    let p = doc.create_element("p");
    let text = doc.create_text("Call 555-1234 now");
    doc.append_child(root, p);
    doc.append_child(p, text);
    doc.set_bounds(root, Rect::new(0.0, 0.0, 400.0, 200.0));
    doc.set_bounds(p, Rect::new(0.0, 0.0, 170.0, 20.0));
    doc.set_bounds(text, Rect::new(0.0, 0.0, 170.0, 20.0));

    let log: RefCell<Vec<String>> = RefCell::new(Vec::new());
    let mut observer = ObserverBuilder::<Document, _, _>::new()
        .matcher(phones as fn(&Document, NodeId, bool) -> Vec<Span<NodeId, String>>)
        .hover_handler(HoverCallbacks {
            on_in: |h: Hovered<'_, NodeId, String>| {
                println!("hover in  {:?} over {:?}", h.span.context, h.rect.bounds);
                log.borrow_mut().push(format!("in {}", h.span.context));
            },
            on_out: |target: NodeId| {
                println!("hover out {target:?}");
                log.borrow_mut().push("out".to_string());
            },
        })
        .config(ObserverConfig::default())
        .build()
        .unwrap();

    let scanned = observer.observe(&mut doc, root).unwrap();
    println!("indexed {} span(s)", scanned.added.len());
    assert!(doc.listeners(p).contains(ListenerKinds::POINTER));

    // Host side: find the element under the pointer, then its listening ancestor.
    let target_at = |doc: &Document, pt: Point| {
        let hit = doc.hit_test_point(pt)?;
        doc.listening_ancestor(hit, ListenerKinds::POINTER)
    };

    let target = target_at(&doc, Point::new(60.0, 10.0)).unwrap();
    assert_eq!(target, p);
    observer.pointer_enter(&doc, target);
    for (i, x) in [60.0, 70.0, 80.0, 150.0, 160.0].into_iter().enumerate() {
        let now = i as u64 * 100;
        observer.pointer_move(target, Point::new(x, 10.0), now);
    }
    observer.pointer_leave(target);

    // Editing the text replaces the span.
    doc.set_text(text, "Call 555-9876 now");
    let records = drain_mutations(&mut doc);
    let step = observer.handle_mutations(&mut doc, &records).unwrap();
    println!("edit: +{} -{}", step.added.len(), step.removed.len());
    let span = observer.index().lookup(p)[0];
    assert_eq!(observer.index().get(span).unwrap().context, "555-9876");

    // Removing the paragraph evicts its target.
    doc.remove_child(root, p);
    let records = drain_mutations(&mut doc);
    observer.handle_mutations(&mut doc, &records).unwrap();
    assert!(observer.index().lookup(p).is_empty());
    assert!(doc.listeners(p).is_empty());

    observer.disconnect(&mut doc).unwrap();
    drop(observer);
    assert_eq!(log.into_inner(), ["in 555-1234", "out"]);
}
