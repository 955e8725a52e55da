// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Value nodes.
//!
//! A form control's live value changes without any tree mutation. The observer binds a
//! value listener to each control and re-matches it on commit; edits to markup nested
//! inside a control are routed to the same path.
//!
//! Run:
//! - `cargo run -p understory_demos --example value_nodes`

use understory_doc_tree::{Document, ListenerKinds, NodeId, NodeKind};
use understory_match::adapters::doc_tree::{drain_mutations, is_form_control};
use understory_match::resolve::descendants;
use understory_match::{HoverCallbacks, Hovered, ObserverBuilder, Span};

// Any control whose value contains an `@` is an address; so is any text leaf that does.
fn addresses(doc: &Document, scope: NodeId, deep: bool) -> Vec<Span<NodeId, String>> {
    let nodes: Vec<NodeId> = if deep {
        descendants(doc, scope).collect()
    } else {
        vec![scope]
    };
    nodes
        .into_iter()
        .filter_map(|node| match doc.kind(node)? {
            NodeKind::Text => {
                let text = doc.text(node)?;
                text.contains('@')
                    .then(|| Span::in_text(node, 0, text.chars().count(), text.to_string()))
            }
            NodeKind::Element if is_form_control(doc, node) => {
                let value = doc.value(node)?;
                value
                    .contains('@')
                    .then(|| Span::covering(node, value.to_string()))
            }
            NodeKind::Element => None,
        })
        .collect()
}

fn sorted(found: impl Iterator<Item = String>) -> Vec<String> {
    let mut v: Vec<String> = found.collect();
    v.sort();
    v
}

fn main() {
    let mut doc = Document::new("form");
    let root = doc.root();
    let email = doc.create_element("input");
    let notes = doc.create_element("textarea");
    let draft = doc.create_text("ping ops@example.com");
    doc.append_child(root, email);
    doc.append_child(root, notes);
    doc.append_child(notes, draft);
    doc.set_value(email, "me@example.com");

    let mut observer = ObserverBuilder::<Document, _, _>::new()
        .matcher(addresses as fn(&Document, NodeId, bool) -> Vec<Span<NodeId, String>>)
        .hover_handler(HoverCallbacks {
            on_in: |_: Hovered<'_, NodeId, String>| {},
            on_out: |_: NodeId| {},
        })
        .value_like(is_form_control)
        .build()
        .unwrap();
    observer.observe(&mut doc, root).unwrap();
    assert!(doc.listeners(email).contains(ListenerKinds::VALUE_COMMIT));
    assert!(doc.listeners(notes).contains(ListenerKinds::VALUE_COMMIT));
    let spans = |o: &understory_match::MatchIndex<NodeId, String>| {
        sorted(o.iter().map(|(_, s)| s.context.clone()))
    };
    println!("initial: {:?}", spans(observer.index()));
    assert_eq!(
        spans(observer.index()),
        ["me@example.com", "ping ops@example.com"]
    );

    // The user types into the input: no mutation record, only a value commit.
    doc.set_value(email, "you@example.org");
    assert!(drain_mutations(&mut doc).is_empty());
    for node in doc.take_value_commits() {
        observer.value_changed(&mut doc, node).unwrap();
    }
    // A second commit with no change leaves the index as it was.
    observer.value_changed(&mut doc, email).unwrap();
    println!("after commit: {:?}", spans(observer.index()));
    assert_eq!(
        spans(observer.index()),
        ["ping ops@example.com", "you@example.org"]
    );

    // Markup inside the textarea changes: routed to the textarea as a whole.
    doc.set_text(draft, "nothing to see");
    let records = drain_mutations(&mut doc);
    let step = observer.handle_mutations(&mut doc, &records).unwrap();
    println!("textarea edit: +{} -{}", step.added.len(), step.removed.len());
    assert_eq!(spans(observer.index()), ["you@example.org"]);

    // Removing a control releases its value listener.
    doc.remove_child(root, email);
    let records = drain_mutations(&mut doc);
    observer.handle_mutations(&mut doc, &records).unwrap();
    assert!(doc.listeners(email).is_empty());
    assert!(observer.index().is_empty());

    observer.disconnect(&mut doc).unwrap();
    assert!(doc.listeners(notes).is_empty());
}
