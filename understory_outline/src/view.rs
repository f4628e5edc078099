// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The flat-row cache that hosts talk to.

use alloc::rc::{Rc, Weak};
use alloc::vec;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::Hash;

use hashbrown::HashMap;

use crate::expansion::ExpansionSet;
use crate::flatten::{flatten, walk};
use crate::node::SourceNode;
use crate::row::FlatRow;
use crate::subtree::{SubtreeCache, SubtreeStats};

/// Snapshot of a [`TreeViewCache`] after an operation.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CacheState {
    /// Number of rows in the flat sequence.
    pub total_count: usize,
    /// `true` until the next successful rebuild or toggle after
    /// [`TreeViewCache::mark_dirty`] or [`TreeViewCache::clear`].
    pub is_dirty: bool,
    /// Bumped every time the flat sequence changes.
    pub revision: u64,
}

/// Why a toggle left the rows untouched.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Skip {
    /// The key is not in the node index, or its node has been dropped.
    NotIndexed,
    /// The key is indexed but has no row in the flat sequence.
    NotVisible,
    /// The row is already in the requested state, or cannot expand because
    /// it has no children.
    Unchanged,
}

/// What a toggle did to the flat sequence.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RowChange {
    /// `len` rows were inserted starting at index `at`.
    Inserted {
        /// Index of the first inserted row.
        at: usize,
        /// Number of inserted rows.
        len: usize,
    },
    /// `len` rows were removed starting at index `at`.
    Removed {
        /// Index the first removed row occupied.
        at: usize,
        /// Number of removed rows.
        len: usize,
    },
    /// Nothing changed.
    Skipped(Skip),
}

impl RowChange {
    /// Returns `true` for [`RowChange::Skipped`].
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }
}

/// Result of [`TreeViewCache::update_node_expansion`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExpansionUpdate {
    /// The edit applied to the flat sequence.
    pub change: RowChange,
    /// State after the edit.
    pub state: CacheState,
}

/// Incrementally maintained flat projection of a tree.
///
/// The cache owns the flat row sequence, an index from key to (weakly held)
/// source node, an index from key to parent key, and a [`SubtreeCache`].
///
/// - [`build_cache`](Self::build_cache) flattens the whole tree.
/// - [`update_node_expansion`](Self::update_node_expansion) applies a single
///   expand/collapse by splicing the child rows in, or removing the run of
///   descendant rows.
///
/// Both indexes always contain exactly the nodes that have a row. Toggles on
/// unknown or hidden keys are reported as [`RowChange::Skipped`] and logged at
/// `debug` level; nothing in this type returns an error.
///
/// ```rust
/// use understory_outline::{RowChange, SourceNode, TreeViewCache};
///
/// let roots = [
///     SourceNode::new("a", ())
///         .with_children([SourceNode::new("a1", ()), SourceNode::new("a2", ())])
///         .into_rc(),
///     SourceNode::new("b", ()).into_rc(),
/// ];
///
/// let mut view = TreeViewCache::new();
/// view.build_cache(&roots, &["a"]);
/// assert_eq!(view.len(), 4);
///
/// let update = view.update_node_expansion("a", false, &[] as &[&str]);
/// assert_eq!(update.change, RowChange::Removed { at: 1, len: 2 });
/// assert_eq!(update.state.total_count, 2);
/// ```
#[derive(Debug)]
pub struct TreeViewCache<K, D> {
    rows: Vec<FlatRow<K, D>>,
    nodes: HashMap<K, Weak<SourceNode<K, D>>>,
    parents: HashMap<K, Option<K>>,
    subtrees: SubtreeCache<K, D>,
    start_level: u32,
    dirty: bool,
    revision: u64,
}

impl<K, D> Default for TreeViewCache<K, D> {
    fn default() -> Self {
        Self {
            rows: Vec::new(),
            nodes: HashMap::new(),
            parents: HashMap::new(),
            subtrees: SubtreeCache::default(),
            start_level: 1,
            dirty: true,
            revision: 0,
        }
    }
}

impl<K, D> TreeViewCache<K, D> {
    /// Creates an empty cache whose root rows are at level 1.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty cache whose root rows are at `level`.
    ///
    /// Levels saturate at `u32::MAX`, so rows that would be deeper than that
    /// share its level and no longer nest.
    #[must_use]
    pub fn with_start_level(level: u32) -> Self {
        Self {
            start_level: level,
            ..Self::default()
        }
    }

    /// Level assigned to root rows.
    #[must_use]
    pub fn start_level(&self) -> u32 {
        self.start_level
    }

    /// All rows, in display order.
    #[must_use]
    pub fn rows(&self) -> &[FlatRow<K, D>] {
        &self.rows
    }

    /// Rows `start..end`, clamped to the sequence.
    #[must_use]
    pub fn slice(&self, start: usize, end: usize) -> &[FlatRow<K, D>] {
        let end = end.min(self.rows.len());
        let start = start.min(end);
        &self.rows[start..end]
    }

    /// Row at `index`.
    #[must_use]
    pub fn row(&self, index: usize) -> Option<&FlatRow<K, D>> {
        self.rows.get(index)
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if there are no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Flags the rows as stale, for example because the host knows its data
    /// changed and a rebuild is pending.
    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Returns `true` if the rows are flagged stale.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Current state snapshot.
    #[must_use]
    pub fn state(&self) -> CacheState {
        CacheState {
            total_count: self.rows.len(),
            is_dirty: self.dirty,
            revision: self.revision,
        }
    }

    /// Subtree cache counters.
    #[must_use]
    pub fn subtree_stats(&self) -> SubtreeStats {
        self.subtrees.stats()
    }

    /// Drops memoized subtrees; rows and indexes are kept.
    pub fn clear_subtree_cache(&mut self) {
        self.subtrees.clear();
    }

    /// Drops rows, indexes and memoized subtrees, and marks the cache dirty.
    pub fn clear(&mut self) {
        if !self.rows.is_empty() {
            self.bump_revision();
        }
        self.rows.clear();
        self.nodes.clear();
        self.parents.clear();
        self.subtrees.clear();
        self.dirty = true;
    }

    fn bump_revision(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    fn skipped(&self, reason: Skip) -> ExpansionUpdate {
        ExpansionUpdate {
            change: RowChange::Skipped(reason),
            state: self.state(),
        }
    }
}

impl<K, D> TreeViewCache<K, D>
where
    K: Copy + Ord + Hash + Debug,
    D: Clone,
{
    /// Replaces the rows with a full flattening of `roots`.
    ///
    /// Indexes are rebuilt from scratch. Memoized subtrees are kept, except
    /// those built from nodes that have since been dropped. Cost is
    /// proportional to the number of visible rows.
    pub fn build_cache<S>(&mut self, roots: &[Rc<SourceNode<K, D>>], expanded: &S) -> CacheState
    where
        S: ExpansionSet<K> + ?Sized,
    {
        self.rows.clear();
        self.nodes.clear();
        self.parents.clear();
        self.subtrees.prune();

        let nodes = &mut self.nodes;
        let parents = &mut self.parents;
        walk(
            &mut self.rows,
            roots,
            expanded,
            self.start_level,
            None,
            &mut |node, parent| {
                nodes.insert(node.key, Rc::downgrade(node));
                parents.insert(node.key, parent);
            },
        );

        self.dirty = false;
        self.bump_revision();
        log::debug!("outline rebuilt with {} rows", self.rows.len());
        self.state()
    }

    /// Expands or collapses the row for `key`.
    ///
    /// `expanded` must already reflect the toggle; it decides which of the
    /// newly visible descendants are open themselves.
    ///
    /// - Expanding inserts the flattened children right after the row, using
    ///   the subtree cache when the same branch was flattened before under
    ///   the same expansion set.
    /// - Collapsing removes the contiguous run of rows deeper than the row,
    ///   and drops them from both indexes.
    pub fn update_node_expansion<S>(
        &mut self,
        key: K,
        is_expanded: bool,
        expanded: &S,
    ) -> ExpansionUpdate
    where
        S: ExpansionSet<K> + ?Sized,
    {
        let Some(node) = self.nodes.get(&key).and_then(Weak::upgrade) else {
            log::debug!("expansion toggle for unindexed key {key:?} ignored");
            return self.skipped(Skip::NotIndexed);
        };
        let Some(at) = self.position_of(&key) else {
            log::debug!("expansion toggle for hidden key {key:?} ignored");
            return self.skipped(Skip::NotVisible);
        };

        let row = &self.rows[at];
        let target = is_expanded && row.meta.has_children;
        if row.meta.is_expanded == target {
            log::debug!("expansion toggle for {key:?} does not change its row");
            return self.skipped(Skip::Unchanged);
        }
        let level = row.meta.level;
        let toggled = row.with_expanded(target);
        self.rows[at] = toggled;

        let change = if target {
            let inserted = self.subtrees.get_or_build(
                &node.children,
                expanded,
                level.saturating_add(1),
                Some(key),
                flatten,
            );
            let len = inserted.len();
            self.rows
                .splice(at + 1..at + 1, inserted.iter().cloned());
            self.index_rows(&node.children, &inserted);
            RowChange::Inserted { at: at + 1, len }
        } else {
            let start = at + 1;
            let end = self.rows[start..]
                .iter()
                .position(|row| row.meta.level <= level)
                .map_or(self.rows.len(), |offset| start + offset);
            for row in self.rows.drain(start..end) {
                self.nodes.remove(&row.key);
                self.parents.remove(&row.key);
            }
            RowChange::Removed {
                at: start,
                len: end - start,
            }
        };

        self.dirty = false;
        self.bump_revision();
        ExpansionUpdate {
            change,
            state: self.state(),
        }
    }

    /// Adds `rows`, the flattening of `children`, to both indexes.
    ///
    /// Each row is matched back to its source node by walking down from
    /// `children` along the rows' levels and sibling positions, so the indexes
    /// only ever hold keys that have a row.
    fn index_rows(&mut self, children: &[Rc<SourceNode<K, D>>], rows: &[FlatRow<K, D>]) {
        let Some(base) = rows.first().map(|row| row.meta.level) else {
            return;
        };
        // `groups[d]` holds the sibling group rows at depth `d` are drawn from.
        let mut groups: Vec<&[Rc<SourceNode<K, D>>]> = vec![children];
        for row in rows {
            let depth = (row.meta.level - base) as usize;
            groups.truncate(depth + 1);
            let source = groups
                .get(depth)
                .and_then(|group| group.get(row.meta.pos_in_set - 1))
                .filter(|node| node.key == row.key);

            self.parents.insert(row.key, row.meta.parent_key);
            match source {
                Some(node) => {
                    self.nodes.insert(row.key, Rc::downgrade(node));
                    groups.push(&node.children);
                }
                None => {
                    log::debug!("row {:?} has no matching source node", row.key);
                    groups.push(&[]);
                }
            }
        }
    }
}

impl<K, D> TreeViewCache<K, D>
where
    K: Eq + Hash,
{
    /// Source node for `key`, if it has a row and the caller still holds it.
    #[must_use]
    pub fn node(&self, key: &K) -> Option<Rc<SourceNode<K, D>>> {
        self.nodes.get(key).and_then(Weak::upgrade)
    }

    /// Parent key of `key`. `None` for root rows and unknown keys.
    #[must_use]
    pub fn parent_of(&self, key: &K) -> Option<&K> {
        self.parents.get(key).and_then(Option::as_ref)
    }

    /// Returns `true` if `key` currently has a row.
    #[must_use]
    pub fn contains_node(&self, key: &K) -> bool {
        self.nodes.contains_key(key)
    }

    /// Index of the row for `key`, found by a linear scan.
    #[must_use]
    pub fn position_of(&self, key: &K) -> Option<usize> {
        self.rows.iter().position(|row| &row.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Node = SourceNode<&'static str, u32>;

    // A(A1(A1a), A2), B, C(C1)
    fn tree() -> Vec<Rc<Node>> {
        vec![
            SourceNode::new("A", 1)
                .with_children([
                    SourceNode::new("A1", 11).with_children([SourceNode::new("A1a", 111)]),
                    SourceNode::new("A2", 12),
                ])
                .into_rc(),
            SourceNode::new("B", 2).into_rc(),
            SourceNode::new("C", 3)
                .with_children([SourceNode::new("C1", 31)])
                .into_rc(),
        ]
    }

    fn keys(view: &TreeViewCache<&'static str, u32>) -> Vec<&'static str> {
        view.rows().iter().map(|r| r.key).collect()
    }

    #[test]
    fn build_indexes_visible_nodes_only() {
        let roots = tree();
        let mut view = TreeViewCache::new();
        let state = view.build_cache(&roots, &["A"]);

        assert_eq!(keys(&view), ["A", "A1", "A2", "B", "C"]);
        assert_eq!(state.total_count, 5);
        assert!(!state.is_dirty);
        assert!(view.contains_node(&"A1"));
        assert!(!view.contains_node(&"A1a"));
        assert!(!view.contains_node(&"C1"));
        assert_eq!(view.parent_of(&"A2"), Some(&"A"));
        assert_eq!(view.parent_of(&"A"), None);
        assert_eq!(view.node(&"B").map(|n| n.data), Some(2));
    }

    #[test]
    fn expand_splices_children_after_the_row() {
        let roots = tree();
        let mut view = TreeViewCache::new();
        view.build_cache(&roots, &["A"]);

        let update = view.update_node_expansion("A1", true, &["A", "A1"]);
        assert_eq!(update.change, RowChange::Inserted { at: 2, len: 1 });
        assert_eq!(keys(&view), ["A", "A1", "A1a", "A2", "B", "C"]);
        assert!(view.rows()[1].is_expanded());
        assert_eq!(view.rows()[2].level(), 3);
        assert_eq!(view.parent_of(&"A1a"), Some(&"A1"));
    }

    #[test]
    fn collapse_removes_descendants_and_prunes_indexes() {
        let roots = tree();
        let mut view = TreeViewCache::new();
        view.build_cache(&roots, &["A", "A1"]);
        assert_eq!(view.len(), 6);

        let update = view.update_node_expansion("A", false, &["A1"]);
        assert_eq!(update.change, RowChange::Removed { at: 1, len: 3 });
        assert_eq!(keys(&view), ["A", "B", "C"]);
        assert!(!view.rows()[0].is_expanded());
        assert!(!view.contains_node(&"A1a"));
        assert_eq!(view.parent_of(&"A2"), None);
    }

    #[test]
    fn collapse_of_the_last_row_runs_to_the_end() {
        let roots = tree();
        let mut view = TreeViewCache::new();
        view.build_cache(&roots, &["C"]);

        let update = view.update_node_expansion("C", false, &[] as &[&str]);
        assert_eq!(update.change, RowChange::Removed { at: 3, len: 1 });
        assert_eq!(keys(&view), ["A", "B", "C"]);
    }

    #[test]
    fn unknown_and_hidden_keys_are_skipped() {
        let roots = tree();
        let mut view = TreeViewCache::new();
        let before = view.build_cache(&roots, &["A"]);

        let update = view.update_node_expansion("nope", true, &["A", "nope"]);
        assert_eq!(update.change, RowChange::Skipped(Skip::NotIndexed));
        assert_eq!(update.state, before);

        // "A1a" is not visible, so it is not indexed either.
        let update = view.update_node_expansion("A1a", true, &["A", "A1a"]);
        assert_eq!(update.change, RowChange::Skipped(Skip::NotIndexed));
        assert_eq!(keys(&view), ["A", "A1", "A2", "B", "C"]);
    }

    #[test]
    fn redundant_toggles_are_skipped() {
        let roots = tree();
        let mut view = TreeViewCache::new();
        view.build_cache(&roots, &["A"]);

        let update = view.update_node_expansion("A", true, &["A"]);
        assert_eq!(update.change, RowChange::Skipped(Skip::Unchanged));

        let update = view.update_node_expansion("B", true, &["A", "B"]);
        assert_eq!(update.change, RowChange::Skipped(Skip::Unchanged));
        assert!(!view.rows()[3].is_expanded(), "leaf rows never expand");
        assert_eq!(view.len(), 5);
    }

    #[test]
    fn dropped_source_tree_is_not_indexed() {
        let mut view = TreeViewCache::new();
        {
            let roots = tree();
            view.build_cache(&roots, &[] as &[&str]);
        }
        assert!(view.node(&"A").is_none());
        let update = view.update_node_expansion("A", true, &["A"]);
        assert_eq!(update.change, RowChange::Skipped(Skip::NotIndexed));
    }

    #[test]
    fn re_expanding_hits_the_subtree_cache() {
        let roots = tree();
        let mut view = TreeViewCache::new();
        view.build_cache(&roots, &[] as &[&str]);

        view.update_node_expansion("C", true, &["C"]);
        view.update_node_expansion("C", false, &[] as &[&str]);
        view.update_node_expansion("C", true, &["C"]);

        let stats = view.subtree_stats();
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hits, 1);
        assert_eq!(keys(&view), ["A", "B", "C", "C1"]);
        assert!(view.contains_node(&"C1"));
    }

    #[test]
    fn dirty_flag_and_revision() {
        let roots = tree();
        let mut view = TreeViewCache::<&'static str, u32>::new();
        assert!(view.is_dirty());

        let built = view.build_cache(&roots, &[] as &[&str]);
        assert!(!built.is_dirty);

        view.mark_dirty();
        assert!(view.state().is_dirty);

        let update = view.update_node_expansion("A", true, &["A"]);
        assert!(!update.state.is_dirty);
        assert!(update.state.revision > built.revision);

        let skipped = view.update_node_expansion("A", true, &["A"]);
        assert_eq!(skipped.state.revision, update.state.revision);
    }

    #[test]
    fn slice_is_clamped() {
        let roots = tree();
        let mut view = TreeViewCache::new();
        view.build_cache(&roots, &["A"]);

        assert_eq!(view.slice(1, 3).len(), 2);
        assert_eq!(view.slice(3, 100).len(), 2);
        assert!(view.slice(50, 100).is_empty());
        assert!(view.slice(4, 2).is_empty());
    }

    #[test]
    fn start_level_applies_to_roots_and_toggles() {
        let roots = tree();
        let mut view = TreeViewCache::with_start_level(0);
        view.build_cache(&roots, &[] as &[&str]);
        assert_eq!(view.rows()[0].level(), 0);

        view.update_node_expansion("A", true, &["A"]);
        assert_eq!(view.rows()[1].level(), 1);
    }

    #[test]
    fn clear_resets_everything() {
        let roots = tree();
        let mut view = TreeViewCache::new();
        view.build_cache(&roots, &["A"]);
        view.update_node_expansion("C", true, &["A", "C"]);

        view.clear();
        assert!(view.is_empty());
        assert!(view.is_dirty());
        assert!(!view.contains_node(&"A"));
        assert_eq!(view.subtree_stats().entries, 0);
    }

    #[test]
    fn rebuilt_tree_under_the_same_keys_is_not_replayed() {
        let v1 = [SourceNode::new("A", 1)
            .with_children([SourceNode::new("X", 2).with_children([SourceNode::new("x1", 3)])])
            .into_rc()];
        let mut view = TreeViewCache::new();
        view.build_cache(&v1, &[] as &[&str]);
        view.update_node_expansion("A", true, &["A", "X"]);

        let v2 = [SourceNode::new("A", 100)
            .with_children([SourceNode::new("X", 200)
                .with_children([SourceNode::new("x1", 300), SourceNode::new("x2", 400)])])
            .into_rc()];
        view.build_cache(&v2, &[] as &[&str]);
        view.update_node_expansion("A", true, &["A", "X"]);

        let mut fresh = TreeViewCache::new();
        fresh.build_cache(&v2, &["A", "X"]);
        let rows: Vec<_> = view
            .rows()
            .iter()
            .map(|r| (r.key, r.data, r.meta.children_count))
            .collect();
        assert_eq!(
            rows,
            [("A", 100, 1), ("X", 200, 2), ("x1", 300, 0), ("x2", 400, 0)]
        );
        assert_eq!(keys(&view), keys(&fresh));
        for key in ["A", "X", "x1", "x2"] {
            assert!(view.contains_node(&key), "{key} has a row but is not indexed");
            assert_eq!(view.node(&key).map(|n| n.data), fresh.node(&key).map(|n| n.data));
            assert_eq!(view.parent_of(&key), fresh.parent_of(&key));
        }
    }

    #[test]
    fn rebuild_prunes_subtrees_of_dropped_nodes() {
        let mut view = TreeViewCache::new();
        {
            let old = tree();
            view.build_cache(&old, &[] as &[&str]);
            view.update_node_expansion("A", true, &["A"]);
        }
        assert_eq!(view.subtree_stats().entries, 1);

        let roots = tree();
        view.build_cache(&roots, &[] as &[&str]);
        assert_eq!(view.subtree_stats().entries, 0);
    }

    #[test]
    fn toggles_at_the_deepest_level_do_not_overflow() {
        let roots = tree();
        let mut view = TreeViewCache::with_start_level(u32::MAX);
        view.build_cache(&roots, &[] as &[&str]);

        let update = view.update_node_expansion("A", true, &["A"]);
        assert_eq!(update.change, RowChange::Inserted { at: 1, len: 2 });
        assert_eq!(view.rows()[1].level(), u32::MAX);
        assert_eq!(view.parent_of(&"A1"), Some(&"A"));
    }
}
