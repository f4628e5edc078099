// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pre-order flattening of a source tree into rows.

use alloc::rc::Rc;
use alloc::vec::Vec;

use crate::expansion::ExpansionSet;
use crate::node::SourceNode;
use crate::row::{FlatRow, TreeMeta};

/// Flattens `nodes` into an ordered sequence of rows.
///
/// Rows are emitted in pre-order: each node is followed by the rows of its
/// children when it is expanded, and only by them, before the next sibling.
/// A node is expanded when it [has children](SourceNode::has_children) and its
/// key is in `expanded`.
///
/// `level` is the depth assigned to `nodes` and `parent_key` their parent.
/// Deeper levels saturate at `u32::MAX`.
/// [`TreeMeta::local_index`] counts from zero within this call, and restarts at
/// zero within the rows contributed by every expanded child list.
///
/// ```rust
/// use understory_outline::{SourceNode, flatten};
///
/// let roots = [
///     SourceNode::new("a", ())
///         .with_children([SourceNode::new("a1", ()), SourceNode::new("a2", ())])
///         .into_rc(),
///     SourceNode::new("b", ()).into_rc(),
/// ];
///
/// let rows = flatten(&roots, &["a"], 1, None);
/// let keys: Vec<_> = rows.iter().map(|r| r.key).collect();
/// assert_eq!(keys, ["a", "a1", "a2", "b"]);
/// assert_eq!(rows[3].meta.local_index, 3);
/// assert_eq!(rows[2].meta.local_index, 1);
/// ```
#[must_use]
pub fn flatten<K, D, S>(
    nodes: &[Rc<SourceNode<K, D>>],
    expanded: &S,
    level: u32,
    parent_key: Option<K>,
) -> Vec<FlatRow<K, D>>
where
    K: Copy,
    D: Clone,
    S: ExpansionSet<K> + ?Sized,
{
    let mut out = Vec::new();
    flatten_into(&mut out, nodes, expanded, level, parent_key);
    out
}

/// Appends the flattened rows of `nodes` to `out`.
///
/// This is [`flatten`] writing into caller-provided storage, so a single
/// buffer can be reused across rebuilds. Existing contents of `out` are kept
/// and do not affect [`TreeMeta::local_index`].
pub fn flatten_into<K, D, S>(
    out: &mut Vec<FlatRow<K, D>>,
    nodes: &[Rc<SourceNode<K, D>>],
    expanded: &S,
    level: u32,
    parent_key: Option<K>,
) where
    K: Copy,
    D: Clone,
    S: ExpansionSet<K> + ?Sized,
{
    walk(out, nodes, expanded, level, parent_key, &mut |_, _| {});
}

/// Flattens like [`flatten_into`], calling `visit` for every emitted node with
/// its parent key.
pub(crate) fn walk<K, D, S, F>(
    out: &mut Vec<FlatRow<K, D>>,
    nodes: &[Rc<SourceNode<K, D>>],
    expanded: &S,
    level: u32,
    parent_key: Option<K>,
    visit: &mut F,
) where
    K: Copy,
    D: Clone,
    S: ExpansionSet<K> + ?Sized,
    F: FnMut(&Rc<SourceNode<K, D>>, Option<K>),
{
    let start = out.len();
    let set_size = nodes.len();
    for (idx, node) in nodes.iter().enumerate() {
        visit(node, parent_key);

        let has_children = node.has_children();
        let is_expanded = has_children && expanded.is_expanded(&node.key);
        let local_index = out.len() - start;
        out.push(FlatRow {
            key: node.key,
            data: node.data.clone(),
            meta: TreeMeta {
                level,
                pos_in_set: idx + 1,
                set_size,
                has_children,
                children_count: node.children.len(),
                is_expanded,
                local_index,
                parent_key,
            },
        });

        if is_expanded {
            walk(
                out,
                &node.children,
                expanded,
                level.saturating_add(1),
                Some(node.key),
                visit,
            );
        }
    }
}
