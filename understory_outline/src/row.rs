// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Flat rows and their positional metadata.

/// Tree metadata attached to every visible row.
///
/// These values are always computed by the flattening pass and never copied
/// from the source node.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TreeMeta<K> {
    /// 1-based depth; root rows carry the cache's starting level.
    pub level: u32,
    /// 1-based position among the immediate siblings.
    pub pos_in_set: usize,
    /// Number of immediate siblings, including this row.
    pub set_size: usize,
    /// The node has children or is forced to be a branch.
    pub has_children: bool,
    /// Number of children currently present on the source node.
    pub children_count: usize,
    /// The node is expanded. Always `false` when `has_children` is `false`.
    pub is_expanded: bool,
    /// Position within the flattening call that produced this row.
    ///
    /// This is *not* a global index: every call (including nested calls for
    /// expanded children) counts from zero.
    pub local_index: usize,
    /// Key of the parent row, or `None` at the top level.
    pub parent_key: Option<K>,
}

impl<K> Default for TreeMeta<K> {
    fn default() -> Self {
        Self {
            level: 1,
            pos_in_set: 1,
            set_size: 1,
            has_children: false,
            children_count: 0,
            is_expanded: false,
            local_index: 0,
            parent_key: None,
        }
    }
}

/// A render-ready row in the flat sequence.
#[derive(Clone, Debug, PartialEq)]
pub struct FlatRow<K, D> {
    /// Key of the source node.
    pub key: K,
    /// Clone of the source node's payload.
    pub data: D,
    /// Positional metadata.
    pub meta: TreeMeta<K>,
}

impl<K, D> FlatRow<K, D> {
    /// Depth of the row.
    #[inline]
    #[must_use]
    pub fn level(&self) -> u32 {
        self.meta.level
    }

    /// Whether the row is currently expanded.
    #[inline]
    #[must_use]
    pub fn is_expanded(&self) -> bool {
        self.meta.is_expanded
    }
}

impl<K: Copy, D: Clone> FlatRow<K, D> {
    /// Returns a copy of this row with a different expansion flag.
    ///
    /// All other fields are preserved. A row without children never reports
    /// itself as expanded.
    #[must_use]
    pub fn with_expanded(&self, is_expanded: bool) -> Self {
        let mut row = self.clone();
        row.meta.is_expanded = is_expanded && row.meta.has_children;
        row
    }
}
