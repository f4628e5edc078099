// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Content-addressed memoization of flattened child lists.
//!
//! Re-expanding the same branch under the same expansion set produces the same
//! rows, so the result of a flattening pass can be kept and replayed. Entries
//! are keyed by a [`Fingerprint`] built from the identities of the children
//! being flattened and a canonical copy of the expansion set.
//!
//! Child identity is the node allocation, not just its key. Source nodes are
//! immutable once shared, so a tree rebuilt under the same keys gets new
//! allocations and misses the cache instead of replaying old rows. A
//! fingerprint holds [`Weak`] references to the children it was built from,
//! which keeps their addresses from being reused while the entry exists.
//!
//! There is no size bound. [`SubtreeCache::prune`] drops entries whose
//! children are gone, and [`SubtreeCache::clear`] drops everything.

use alloc::rc::{Rc, Weak};
use alloc::vec::Vec;
use core::fmt;
use core::hash::{Hash, Hasher};

use hashbrown::HashMap;
use smallvec::SmallVec;

use crate::expansion::{ExpansionSet, canonical_keys};
use crate::node::SourceNode;
use crate::row::FlatRow;

/// Inline capacity for the children of a fingerprint.
///
/// Most branches in outline views have a handful of children.
const CHILD_INLINE: usize = 8;

/// One child of a fingerprint: its key and the allocation it lives in.
struct ChildId<K, D> {
    key: K,
    node: Weak<SourceNode<K, D>>,
}

impl<K: PartialEq, D> PartialEq for ChildId<K, D> {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && Weak::ptr_eq(&self.node, &other.node)
    }
}

impl<K: Eq, D> Eq for ChildId<K, D> {}

impl<K: Hash, D> Hash for ChildId<K, D> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
        Weak::as_ptr(&self.node).hash(state);
    }
}

impl<K: fmt::Debug, D> fmt::Debug for ChildId<K, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}@{:p}", self.key, Weak::as_ptr(&self.node))
    }
}

/// Identity of one flattening request.
///
/// Two requests with equal fingerprints flatten the very same child nodes
/// under the same expansion set, level, and parent, and so produce equal rows.
pub struct Fingerprint<K, D> {
    children: SmallVec<[ChildId<K, D>; CHILD_INLINE]>,
    expanded: Vec<K>,
    level: u32,
    parent: Option<K>,
}

impl<K, D> Fingerprint<K, D>
where
    K: Copy + Ord,
{
    /// Builds the fingerprint of flattening `children` at `level` under `parent`.
    ///
    /// The expansion set is copied and sorted; `expanded` itself is not touched.
    #[must_use]
    pub fn new<S>(
        children: &[Rc<SourceNode<K, D>>],
        expanded: &S,
        level: u32,
        parent: Option<K>,
    ) -> Self
    where
        S: ExpansionSet<K> + ?Sized,
    {
        Self {
            children: children
                .iter()
                .map(|c| ChildId {
                    key: c.key,
                    node: Rc::downgrade(c),
                })
                .collect(),
            expanded: canonical_keys(expanded),
            level,
            parent,
        }
    }

    /// Keys of the children, in order.
    pub fn child_keys(&self) -> impl Iterator<Item = K> + '_ {
        self.children.iter().map(|c| c.key)
    }

    /// Canonical (sorted, unique) expansion keys.
    #[must_use]
    pub fn expanded(&self) -> &[K] {
        &self.expanded
    }
}

impl<K, D> Fingerprint<K, D> {
    /// Returns `true` while every child this fingerprint was built from is
    /// still alive.
    ///
    /// Once a child is dropped no live tree can produce this fingerprint again.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.children.iter().all(|c| c.node.strong_count() > 0)
    }
}

impl<K: PartialEq, D> PartialEq for Fingerprint<K, D> {
    fn eq(&self, other: &Self) -> bool {
        self.level == other.level
            && self.parent == other.parent
            && self.expanded == other.expanded
            && self.children == other.children
    }
}

impl<K: Eq, D> Eq for Fingerprint<K, D> {}

impl<K: Hash, D> Hash for Fingerprint<K, D> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.children.hash(state);
        self.expanded.hash(state);
        self.level.hash(state);
        self.parent.hash(state);
    }
}

impl<K: fmt::Debug, D> fmt::Debug for Fingerprint<K, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Fingerprint")
            .field("children", &self.children)
            .field("expanded", &self.expanded)
            .field("level", &self.level)
            .field("parent", &self.parent)
            .finish()
    }
}

/// Hit/miss counters and size of a [`SubtreeCache`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SubtreeStats {
    /// Number of stored entries.
    pub entries: usize,
    /// Lookups answered from the cache.
    pub hits: u64,
    /// Lookups that had to build.
    pub misses: u64,
}

/// Memoizes flattened child lists by [`Fingerprint`].
///
/// Cached rows are shared behind an [`Rc`] and are immutable; a hit hands out
/// the same allocation every time.
#[derive(Debug)]
pub struct SubtreeCache<K, D> {
    entries: HashMap<Fingerprint<K, D>, Rc<[FlatRow<K, D>]>>,
    hits: u64,
    misses: u64,
}

impl<K, D> Default for SubtreeCache<K, D> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            hits: 0,
            misses: 0,
        }
    }
}

impl<K, D> SubtreeCache<K, D>
where
    K: Copy + Ord + Hash,
{
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the rows for flattening `children`, building them on a miss.
    ///
    /// `build` receives the same arguments and is expected to be
    /// [`flatten`](crate::flatten) or an equivalent.
    pub fn get_or_build<S, F>(
        &mut self,
        children: &[Rc<SourceNode<K, D>>],
        expanded: &S,
        level: u32,
        parent: Option<K>,
        build: F,
    ) -> Rc<[FlatRow<K, D>]>
    where
        S: ExpansionSet<K> + ?Sized,
        F: FnOnce(&[Rc<SourceNode<K, D>>], &S, u32, Option<K>) -> Vec<FlatRow<K, D>>,
    {
        let fingerprint = Fingerprint::new(children, expanded, level, parent);
        if let Some(rows) = self.entries.get(&fingerprint) {
            self.hits += 1;
            log::trace!("subtree cache hit ({} rows)", rows.len());
            return Rc::clone(rows);
        }

        self.misses += 1;
        let rows: Rc<[FlatRow<K, D>]> = build(children, expanded, level, parent).into();
        log::trace!("subtree cache miss, stored {} rows", rows.len());
        self.entries.insert(fingerprint, Rc::clone(&rows));
        rows
    }

    /// Returns `true` if a result for `fingerprint` is stored.
    #[must_use]
    pub fn contains(&self, fingerprint: &Fingerprint<K, D>) -> bool {
        self.entries.contains_key(fingerprint)
    }
}

impl<K, D> SubtreeCache<K, D> {
    /// Number of stored entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry count and hit/miss counters.
    #[must_use]
    pub fn stats(&self) -> SubtreeStats {
        SubtreeStats {
            entries: self.entries.len(),
            hits: self.hits,
            misses: self.misses,
        }
    }

    /// Drops every entry. Counters are kept.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drops entries built from children that no longer exist, returning how
    /// many were removed.
    pub fn prune(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|fingerprint, _| fingerprint.is_live());
        let pruned = before - self.entries.len();
        if pruned > 0 {
            log::trace!("pruned {pruned} subtree cache entries for dropped nodes");
        }
        pruned
    }
}
