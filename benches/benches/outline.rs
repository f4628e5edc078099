// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::collections::BTreeSet;
use std::rc::Rc;

use criterion::{
    BatchSize, BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main,
};
use understory_outline::{
    FlatRow, FnRecycle, RecordPool, RowPool, RowSchema, SourceNode, TreeViewCache, flatten,
};

type Node = SourceNode<u32, u32>;

/// A complete tree with `fanout` children per branch, `depth` levels deep.
fn build_tree(fanout: u32, depth: u32) -> (Vec<Rc<Node>>, BTreeSet<u32>) {
    fn make(next: &mut u32, fanout: u32, depth: u32, branches: &mut BTreeSet<u32>) -> Node {
        let key = *next;
        *next += 1;
        let node = SourceNode::new(key, key);
        if depth == 0 {
            return node;
        }
        branches.insert(key);
        let children: Vec<Node> = (0..fanout)
            .map(|_| make(next, fanout, depth - 1, branches))
            .collect();
        node.with_children(children)
    }

    let mut next = 0;
    let mut branches = BTreeSet::new();
    let roots = (0..fanout)
        .map(|_| make(&mut next, fanout, depth, &mut branches).into_rc())
        .collect();
    (roots, branches)
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("outline/build_cache");

    for (fanout, depth) in [(8_u32, 2_u32), (10, 3), (16, 3)] {
        let (roots, expanded) = build_tree(fanout, depth);
        let visible = flatten(&roots, &expanded, 1, None).len();
        group.throughput(Throughput::Elements(visible as u64));

        group.bench_with_input(
            BenchmarkId::new("fully_expanded", visible),
            &(roots, expanded),
            |b, (roots, expanded)| {
                let mut view = TreeViewCache::new();
                b.iter(|| {
                    black_box(view.build_cache(roots, expanded));
                });
            },
        );
    }

    group.finish();
}

fn bench_toggle(c: &mut Criterion) {
    let mut group = c.benchmark_group("outline/toggle");

    // Collapse then re-expand the first root. With the subtree cache warm,
    // re-expansion replays the memoized rows.
    for (fanout, depth) in [(10_u32, 3_u32), (16, 3)] {
        let (roots, expanded) = build_tree(fanout, depth);
        let first = roots[0].key;
        let mut collapsed = expanded.clone();
        collapsed.remove(&first);

        group.bench_function(BenchmarkId::new("collapse_expand_warm", fanout), |b| {
            let mut view = TreeViewCache::new();
            view.build_cache(&roots, &expanded);
            b.iter(|| {
                black_box(view.update_node_expansion(first, false, &collapsed));
                black_box(view.update_node_expansion(first, true, &expanded));
            });
        });

        group.bench_function(BenchmarkId::new("collapse_expand_cold", fanout), |b| {
            let mut view = TreeViewCache::new();
            view.build_cache(&roots, &expanded);
            b.iter(|| {
                view.clear_subtree_cache();
                black_box(view.update_node_expansion(first, false, &collapsed));
                black_box(view.update_node_expansion(first, true, &expanded));
            });
        });
    }

    group.finish();
}

fn bench_pool(c: &mut Criterion) {
    let mut group = c.benchmark_group("outline/pool");

    // Models a virtualized window of rows being re-materialized every frame.
    for window in [32_usize, 128, 512] {
        group.throughput(Throughput::Elements(window as u64));

        group.bench_with_input(BenchmarkId::new("row_pool_churn", window), &window, |b, &n| {
            let mut pool = RowPool::new(FnRecycle::new(Vec::<u32>::new, Vec::clear), n);
            b.iter(|| {
                let handles: Vec<_> = (0..n).map(|_| pool.acquire()).collect();
                black_box(pool.release_all(handles));
            });
        });

        group.bench_with_input(BenchmarkId::new("fresh_alloc", window), &window, |b, &n| {
            b.iter(|| {
                let rows: Vec<Vec<u32>> = (0..n).map(|_| Vec::with_capacity(4)).collect();
                black_box(rows);
            });
        });

        let (roots, expanded) = build_tree(8, 2);
        let rows: Vec<FlatRow<u32, ()>> = flatten(&roots, &expanded, 1, None)
            .into_iter()
            .map(|row| FlatRow {
                key: row.key,
                data: (),
                meta: row.meta,
            })
            .collect();
        group.bench_with_input(
            BenchmarkId::new("record_pool_window", window),
            &window,
            |b, &n| {
                let mut pool = RecordPool::new(RowSchema::All, n);
                b.iter_batched(
                    Vec::new,
                    |mut handles| {
                        handles.extend(rows.iter().cycle().take(n).map(|row| pool.acquire_for_row(row)));
                        black_box(pool.release_all(handles));
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_build, bench_toggle, bench_pool);
criterion_main!(benches);
