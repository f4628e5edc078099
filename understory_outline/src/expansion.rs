// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Read-only view over the caller's set of expanded keys.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;
use core::hash::{BuildHasher, Hash};

/// The set of node keys that are currently toggled open.
///
/// The set is owned and mutated by the caller. The outline only reads it: it
/// asks whether a key is expanded while flattening, and copies the keys when it
/// needs a canonical form for a [`Fingerprint`](crate::Fingerprint).
///
/// Implementations are provided for `hashbrown::HashSet`, [`BTreeSet`], slices,
/// arrays and `Vec` (linear lookup), and `std::collections::HashSet` with the
/// `std` feature.
pub trait ExpansionSet<K> {
    /// Returns `true` if `key` is in the set.
    fn is_expanded(&self, key: &K) -> bool;

    /// Iterates the keys in the set, in any order.
    fn keys<'a>(&'a self) -> impl Iterator<Item = &'a K>
    where
        K: 'a;
}

/// Returns a sorted, de-duplicated copy of the keys in `set`.
pub(crate) fn canonical_keys<K, S>(set: &S) -> Vec<K>
where
    K: Copy + Ord,
    S: ExpansionSet<K> + ?Sized,
{
    let mut keys: Vec<K> = set.keys().copied().collect();
    keys.sort_unstable();
    keys.dedup();
    keys
}

impl<K, H> ExpansionSet<K> for hashbrown::HashSet<K, H>
where
    K: Eq + Hash,
    H: BuildHasher,
{
    fn is_expanded(&self, key: &K) -> bool {
        self.contains(key)
    }

    fn keys<'a>(&'a self) -> impl Iterator<Item = &'a K>
    where
        K: 'a,
    {
        self.iter()
    }
}

#[cfg(feature = "std")]
impl<K, H> ExpansionSet<K> for std::collections::HashSet<K, H>
where
    K: Eq + Hash,
    H: BuildHasher,
{
    fn is_expanded(&self, key: &K) -> bool {
        self.contains(key)
    }

    fn keys<'a>(&'a self) -> impl Iterator<Item = &'a K>
    where
        K: 'a,
    {
        self.iter()
    }
}

impl<K: Ord> ExpansionSet<K> for BTreeSet<K> {
    fn is_expanded(&self, key: &K) -> bool {
        self.contains(key)
    }

    fn keys<'a>(&'a self) -> impl Iterator<Item = &'a K>
    where
        K: 'a,
    {
        self.iter()
    }
}

impl<K: PartialEq> ExpansionSet<K> for [K] {
    fn is_expanded(&self, key: &K) -> bool {
        self.contains(key)
    }

    fn keys<'a>(&'a self) -> impl Iterator<Item = &'a K>
    where
        K: 'a,
    {
        self.iter()
    }
}

impl<K: PartialEq, const N: usize> ExpansionSet<K> for [K; N] {
    fn is_expanded(&self, key: &K) -> bool {
        self.contains(key)
    }

    fn keys<'a>(&'a self) -> impl Iterator<Item = &'a K>
    where
        K: 'a,
    {
        self.iter()
    }
}

impl<K: PartialEq> ExpansionSet<K> for Vec<K> {
    fn is_expanded(&self, key: &K) -> bool {
        self.contains(key)
    }

    fn keys<'a>(&'a self) -> impl Iterator<Item = &'a K>
    where
        K: 'a,
    {
        self.iter()
    }
}
