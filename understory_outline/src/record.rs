// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pooled row records with a fixed field schema.
//!
//! A [`Record`] is a render-ready container: the row key, a set of named
//! domain fields copied out of the source, and [`TreeMeta`]. The set of fields
//! is decided by a [`RowSchema`] chosen when the [`RecordPool`] is created; the
//! only way to change it is [`RecordPool::update_field_names`], which drops
//! every pooled record made for the old schema.
//!
//! Metadata is not a domain field. The names in [`RESERVED_FIELDS`] are never
//! copied from a source, so metadata overrides always win.

use alloc::collections::BTreeMap;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;
use core::hash::BuildHasher;
use core::marker::PhantomData;

use crate::node::SourceNode;
use crate::pool::{PoolHandle, PoolStats, Recycle, RowPool};
use crate::row::{FlatRow, TreeMeta};

/// Field names that belong to the tree metadata and are never stored as
/// domain fields.
pub const RESERVED_FIELDS: [&str; 9] = [
    "key",
    "level",
    "pos_in_set",
    "set_size",
    "has_children",
    "children_count",
    "is_expanded",
    "local_index",
    "parent_key",
];

/// Returns `true` if `name` is one of [`RESERVED_FIELDS`].
#[must_use]
pub fn is_reserved(name: &str) -> bool {
    RESERVED_FIELDS.contains(&name)
}

/// Named field access into a source payload.
pub trait FieldSource {
    /// Field value type.
    type Value: Clone;

    /// Value of the field `name`, if present.
    fn field(&self, name: &str) -> Option<&Self::Value>;

    /// Calls `f` for every field present.
    fn for_each_field(&self, f: &mut dyn FnMut(&str, &Self::Value));
}

impl FieldSource for () {
    type Value = ();

    fn field(&self, _name: &str) -> Option<&()> {
        None
    }

    fn for_each_field(&self, _f: &mut dyn FnMut(&str, &())) {}
}

impl<V: Clone> FieldSource for BTreeMap<String, V> {
    type Value = V;

    fn field(&self, name: &str) -> Option<&V> {
        self.get(name)
    }

    fn for_each_field(&self, f: &mut dyn FnMut(&str, &V)) {
        for (name, value) in self {
            f(name, value);
        }
    }
}

impl<V: Clone, H: BuildHasher> FieldSource for hashbrown::HashMap<String, V, H> {
    type Value = V;

    fn field(&self, name: &str) -> Option<&V> {
        self.get(name)
    }

    fn for_each_field(&self, f: &mut dyn FnMut(&str, &V)) {
        for (name, value) in self {
            f(name, value);
        }
    }
}

/// Which domain fields a record carries.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum RowSchema {
    /// Copy every field the source exposes.
    #[default]
    All,
    /// Exactly these fields, in this order.
    Fields(Rc<[Rc<str>]>),
}

impl RowSchema {
    /// A schema with an explicit field list.
    ///
    /// Duplicates and [reserved](RESERVED_FIELDS) names are dropped.
    pub fn fields<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut kept: Vec<Rc<str>> = Vec::new();
        for name in names {
            let name = name.as_ref();
            if is_reserved(name) {
                log::debug!("field `{name}` is reserved for tree metadata, dropped from schema");
                continue;
            }
            if !kept.iter().any(|k| &**k == name) {
                kept.push(Rc::from(name));
            }
        }
        Self::Fields(kept.into())
    }

    /// The explicit field list, or `None` for [`RowSchema::All`].
    #[must_use]
    pub fn field_names(&self) -> Option<&[Rc<str>]> {
        match self {
            Self::All => None,
            Self::Fields(names) => Some(&names[..]),
        }
    }
}

/// Partial [`TreeMeta`] applied on top of a populated record.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MetaOverrides<K> {
    /// See [`TreeMeta::level`].
    pub level: Option<u32>,
    /// See [`TreeMeta::pos_in_set`].
    pub pos_in_set: Option<usize>,
    /// See [`TreeMeta::set_size`].
    pub set_size: Option<usize>,
    /// See [`TreeMeta::has_children`].
    pub has_children: Option<bool>,
    /// See [`TreeMeta::children_count`].
    pub children_count: Option<usize>,
    /// See [`TreeMeta::is_expanded`].
    pub is_expanded: Option<bool>,
    /// See [`TreeMeta::local_index`].
    pub local_index: Option<usize>,
    /// See [`TreeMeta::parent_key`].
    pub parent_key: Option<Option<K>>,
}

impl<K> Default for MetaOverrides<K> {
    fn default() -> Self {
        Self {
            level: None,
            pos_in_set: None,
            set_size: None,
            has_children: None,
            children_count: None,
            is_expanded: None,
            local_index: None,
            parent_key: None,
        }
    }
}

impl<K> MetaOverrides<K> {
    /// Writes every set override into `meta`.
    pub fn apply(self, meta: &mut TreeMeta<K>) {
        if let Some(level) = self.level {
            meta.level = level;
        }
        if let Some(pos) = self.pos_in_set {
            meta.pos_in_set = pos;
        }
        if let Some(size) = self.set_size {
            meta.set_size = size;
        }
        if let Some(has_children) = self.has_children {
            meta.has_children = has_children;
        }
        if let Some(count) = self.children_count {
            meta.children_count = count;
        }
        if let Some(is_expanded) = self.is_expanded {
            meta.is_expanded = is_expanded;
        }
        if let Some(index) = self.local_index {
            meta.local_index = index;
        }
        if let Some(parent) = self.parent_key {
            meta.parent_key = parent;
        }
    }
}

impl<K> From<TreeMeta<K>> for MetaOverrides<K> {
    fn from(meta: TreeMeta<K>) -> Self {
        Self {
            level: Some(meta.level),
            pos_in_set: Some(meta.pos_in_set),
            set_size: Some(meta.set_size),
            has_children: Some(meta.has_children),
            children_count: Some(meta.children_count),
            is_expanded: Some(meta.is_expanded),
            local_index: Some(meta.local_index),
            parent_key: Some(meta.parent_key),
        }
    }
}

/// A pooled, render-ready row.
#[derive(Clone, Debug, PartialEq)]
pub struct Record<K, V> {
    key: Option<K>,
    fields: Vec<(Rc<str>, Option<V>)>,
    meta: TreeMeta<K>,
}

impl<K, V> Record<K, V> {
    /// Key of the populated row; `None` for a fresh or reset record.
    #[must_use]
    pub fn key(&self) -> Option<&K> {
        self.key.as_ref()
    }

    /// Value of `name`, if the record carries it and it was populated.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&V> {
        self.fields
            .iter()
            .find(|(field, _)| &**field == name)
            .and_then(|(_, value)| value.as_ref())
    }

    /// Returns `true` if the record has a slot named `name`, populated or not.
    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(field, _)| &**field == name)
    }

    /// All field slots, in schema order.
    pub fn fields(&self) -> impl Iterator<Item = (&str, Option<&V>)> {
        self.fields
            .iter()
            .map(|(name, value)| (&**name, value.as_ref()))
    }

    /// Tree metadata.
    #[must_use]
    pub fn meta(&self) -> &TreeMeta<K> {
        &self.meta
    }
}

/// Builds and resets records for one [`RowSchema`].
#[derive(Clone, Debug)]
pub(crate) struct RecordRecycler<K, V> {
    schema: RowSchema,
    marker: PhantomData<fn() -> (K, V)>,
}

impl<K, V> RecordRecycler<K, V> {
    fn new(schema: RowSchema) -> Self {
        Self {
            schema,
            marker: PhantomData,
        }
    }
}

impl<K, V> Recycle for RecordRecycler<K, V> {
    type Item = Record<K, V>;

    fn create(&mut self) -> Record<K, V> {
        let fields = match &self.schema {
            RowSchema::All => Vec::new(),
            RowSchema::Fields(names) => names.iter().map(|n| (Rc::clone(n), None)).collect(),
        };
        Record {
            key: None,
            fields,
            meta: TreeMeta::default(),
        }
    }

    fn reset(&mut self, record: &mut Record<K, V>) {
        record.key = None;
        record.meta = TreeMeta::default();
        match self.schema {
            RowSchema::All => record.fields.clear(),
            RowSchema::Fields(_) => {
                for (_, value) in &mut record.fields {
                    *value = None;
                }
            }
        }
    }
}

/// A [`RowPool`] of [`Record`]s for a fixed [`RowSchema`].
///
/// ```rust
/// use std::collections::BTreeMap;
/// use understory_outline::{MetaOverrides, RecordPool, RowSchema, SourceNode};
///
/// let data: BTreeMap<String, &str> =
///     [("title".into(), "Ship it"), ("owner".into(), "kim")].into_iter().collect();
/// let node = SourceNode::new(7_u32, data);
///
/// let mut pool = RecordPool::new(RowSchema::fields(["title"]), 4);
/// let overrides = MetaOverrides { level: Some(2), ..MetaOverrides::default() };
/// let handle = pool.acquire_and_populate(&node, overrides);
///
/// let record = pool.get(handle).unwrap();
/// assert_eq!(record.key(), Some(&7));
/// assert_eq!(record.get("title"), Some(&"Ship it"));
/// assert!(!record.has_field("owner"));
/// assert_eq!(record.meta().level, 2);
/// ```
#[derive(Debug)]
pub struct RecordPool<K, V> {
    pool: RowPool<RecordRecycler<K, V>>,
}

impl<K, V> RecordPool<K, V> {
    /// Creates a pool for `schema` with `initial_size` records preallocated.
    #[must_use]
    pub fn new(schema: RowSchema, initial_size: usize) -> Self {
        Self {
            pool: RowPool::new(RecordRecycler::new(schema), initial_size),
        }
    }

    /// The current schema.
    #[must_use]
    pub fn schema(&self) -> &RowSchema {
        &self.pool.recycler().schema
    }

    /// Lends out a record in its default state.
    pub fn acquire(&mut self) -> PoolHandle {
        self.pool.acquire()
    }

    /// Record behind a live handle.
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&Record<K, V>> {
        self.pool.get(handle)
    }

    /// Resets the record and returns it to the pool; `false` if not lent out.
    pub fn release(&mut self, handle: PoolHandle) -> bool {
        self.pool.release(handle)
    }

    /// Releases each handle independently and returns how many were live.
    pub fn release_all<I>(&mut self, handles: I) -> usize
    where
        I: IntoIterator<Item = PoolHandle>,
    {
        self.pool.release_all(handles)
    }

    /// Current occupancy.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Drops every pooled record; outstanding handles become stale.
    pub fn clear(&mut self) {
        self.pool.clear();
    }

    /// Switches to `schema`.
    ///
    /// Every pooled record was shaped for the old schema, so the pool is
    /// cleared and outstanding handles become stale.
    pub fn update_field_names(&mut self, schema: RowSchema) {
        self.pool.reprovision(RecordRecycler::new(schema));
    }
}

impl<K, V> RecordPool<K, V>
where
    K: Copy,
    V: Clone,
{
    /// Lends out a record populated from `source`.
    ///
    /// Fields in the schema that `source` lacks stay empty. `overrides` are
    /// applied on top of the default metadata.
    pub fn acquire_and_populate<D>(
        &mut self,
        source: &SourceNode<K, D>,
        overrides: MetaOverrides<K>,
    ) -> PoolHandle
    where
        D: FieldSource<Value = V>,
    {
        self.populate(source.key, &source.data, overrides)
    }

    /// Lends out a record materializing `row`, with its metadata.
    pub fn acquire_for_row<D>(&mut self, row: &FlatRow<K, D>) -> PoolHandle
    where
        D: FieldSource<Value = V>,
    {
        self.populate(row.key, &row.data, row.meta.into())
    }

    fn populate<D>(&mut self, key: K, data: &D, overrides: MetaOverrides<K>) -> PoolHandle
    where
        D: FieldSource<Value = V>,
    {
        let copy_all = matches!(self.schema(), RowSchema::All);
        let handle = self.pool.acquire();
        if let Some(record) = self.pool.get_mut(handle) {
            record.key = Some(key);
            if copy_all {
                let fields = &mut record.fields;
                data.for_each_field(&mut |name, value| {
                    if !is_reserved(name) {
                        fields.push((Rc::from(name), Some(value.clone())));
                    }
                });
            } else {
                for (name, value) in &mut record.fields {
                    *value = data.field(name).cloned();
                }
            }
            overrides.apply(&mut record.meta);
        }
        handle
    }
}
