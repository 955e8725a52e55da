// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{Point, Rect};
use understory_doc_tree::{Document, NodeId, NodeKind};
use understory_match::adapters::doc_tree::{drain_mutations, is_form_control};
use understory_match::resolve::descendants;
use understory_match::{
    HoverEngine, MutationKinds, MutationOptions, MutationSource, Reconciler, Span, ValueLike,
};

type PhoneFn = fn(&Document, NodeId, bool) -> Vec<Span<NodeId, u32>>;
type Bench = Reconciler<Document, u32, PhoneFn>;

#[derive(Clone)]
struct Rng(u64);

impl Rng {
    fn new(seed: u64) -> Self {
        Self(seed)
    }
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }
}

// Every `ddd-dddd` in the text leaves of the scope; context is the first three digits.
fn phones(doc: &Document, scope: NodeId, deep: bool) -> Vec<Span<NodeId, u32>> {
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
        let b = doc.text(node).unwrap_or_default().as_bytes();
        let mut i = 0;
        while i + 8 <= b.len() {
            let w = &b[i..i + 8];
            if w[3] == b'-' && w.iter().enumerate().all(|(k, c)| k == 3 || c.is_ascii_digit()) {
                let area = w[..3].iter().fold(0, |acc, c| acc * 10 + u32::from(c - b'0'));
                out.push(Span::in_text(node, i, i + 8, area));
                i += 8;
            } else {
                i += 1;
            }
        }
    }
    out
}

// `sections` sections of `per_section` paragraphs; each paragraph holds two numbers,
// and every fourth section also holds an input.
fn gen_document(sections: usize, per_section: usize) -> (Document, Vec<NodeId>, Vec<NodeId>) {
    let mut doc = Document::new("body");
    let root = doc.root();
    let mut rng = Rng::new(0xCAFE_F00D_DEAD_BEEF);
    let mut section_ids = Vec::with_capacity(sections);
    let mut texts = Vec::with_capacity(sections * per_section);
    for s in 0..sections {
        let section = doc.create_element("section");
        doc.append_child(root, section);
        for k in 0..per_section {
            let p = doc.create_element("p");
            let a = rng.next_u64() % 900 + 100;
            let b = rng.next_u64() % 900 + 100;
            let t = doc.create_text(&format!("Call {a}-1234 or {b}-5678 today"));
            doc.append_child(section, p);
            doc.append_child(p, t);
            let y = ((s * per_section + k) * 20) as f64;
            doc.set_bounds(t, Rect::new(0.0, y, 310.0, y + 20.0));
            texts.push(t);
        }
        if s % 4 == 0 {
            let input = doc.create_element("input");
            doc.append_child(section, input);
        }
        section_ids.push(section);
    }
    (doc, section_ids, texts)
}

fn options() -> MutationOptions {
    MutationOptions {
        kinds: MutationKinds::CHARACTER_DATA | MutationKinds::CHILD_LIST,
        subtree: true,
        attribute_filter: Vec::new(),
    }
}

fn reconciler() -> Bench {
    let value_like: ValueLike<Document> = is_form_control;
    Reconciler::new(phones as PhoneFn, Some(value_like), 3, options())
}

fn scanned(sections: usize, per_section: usize) -> (Document, Bench, Vec<NodeId>, Vec<NodeId>) {
    let (mut doc, section_ids, texts) = gen_document(sections, per_section);
    let mut r = reconciler();
    let root = doc.root();
    r.scan(&mut doc, root).unwrap();
    doc.observe_mutations(root, r.options());
    (doc, r, section_ids, texts)
}

fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("initial_scan");
    for &n in &[16usize, 64, 256] {
        group.throughput(Throughput::Elements((n * 8 * 2) as u64));
        group.bench_function(format!("sections_{n}"), |b| {
            b.iter_batched(
                || gen_document(n, 8).0,
                |mut doc| {
                    let mut r = reconciler();
                    let root = doc.root();
                    let out = r.scan(&mut doc, root).unwrap();
                    black_box(out.added.len());
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_text_edit(c: &mut Criterion) {
    let mut group = c.benchmark_group("text_edit");
    for &n in &[64usize, 256] {
        group.bench_function(format!("sections_{n}"), |b| {
            b.iter_batched(
                || scanned(n, 8),
                |(mut doc, mut r, _, texts)| {
                    let t = texts[texts.len() / 2];
                    doc.set_text(t, "Call 555-0000 instead");
                    for record in drain_mutations(&mut doc) {
                        black_box(r.apply(&mut doc, &record).unwrap());
                    }
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

fn bench_subtree_remove(c: &mut Criterion) {
    let mut group = c.benchmark_group("subtree_remove");
    for &n in &[64usize, 256] {
        group.bench_function(format!("section_of_{n}"), |b| {
            b.iter_batched(
                || scanned(n, 8),
                |(mut doc, mut r, sections, _)| {
                    let root = doc.root();
                    doc.remove_child(root, sections[0]);
                    for record in drain_mutations(&mut doc) {
                        black_box(r.apply(&mut doc, &record).unwrap());
                    }
                },
                BatchSize::SmallInput,
            )
        });
    }
    group.finish();
}

// Bulk clear of the observed root against stripping every node one by one.
fn bench_root_strip(c: &mut Criterion) {
    let mut group = c.benchmark_group("root_strip");
    let n = 256;
    group.bench_function("bulk", |b| {
        b.iter_batched(
            || scanned(n, 8),
            |(mut doc, mut r, _, _)| {
                let root = doc.root();
                black_box(r.index_mut().strip_subtree(&mut doc, root, true).len());
            },
            BatchSize::SmallInput,
        )
    });
    group.bench_function("walk", |b| {
        b.iter_batched(
            || scanned(n, 8),
            |(mut doc, mut r, _, _)| {
                let root = doc.root();
                let nodes: Vec<NodeId> = descendants(&doc, root).collect();
                let mut removed = 0;
                for node in nodes {
                    removed += r.index_mut().strip_subtree(&mut doc, node, false).len();
                }
                black_box(removed);
            },
            BatchSize::SmallInput,
        )
    });
    group.finish();
}

fn bench_pointer_move(c: &mut Criterion) {
    let mut group = c.benchmark_group("pointer_move");
    let (doc, mut r, _, texts) = scanned(16, 8);
    let target = doc.parent(texts[0]).unwrap();
    let mut hover = HoverEngine::new(0);
    hover.pointer_enter(r.index_mut(), &doc, target);
    group.bench_function("hit_and_miss", |b| {
        let mut now = 0;
        b.iter(|| {
            now += 1;
            let x = if now % 2 == 0 { 80.0 } else { 150.0 };
            black_box(hover.pointer_move(r.index_mut(), target, Point::new(x, 10.0), now));
        })
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_scan,
    bench_text_edit,
    bench_subtree_remove,
    bench_root_strip,
    bench_pointer_move
);
criterion_main!(benches);
