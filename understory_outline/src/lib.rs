// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_outline --heading-base-level=0

//! Understory Outline: hierarchical visible-row projection and expansion state.
//!
//! This crate turns a tree plus a set of expanded keys into the flat, ordered
//! list of rows an outline or tree view actually displays, and keeps that list
//! up to date as single rows are expanded and collapsed. It is meant to sit
//! between your domain model and a virtualized list such as
//! `understory_virtual_list`: the list only ever sees dense row indices.
//!
//! The core pieces are:
//!
//! - [`SourceNode`]: your tree, shared through `Rc`. The outline only keeps
//!   weak references into it.
//! - [`ExpansionSet`]: read-only view of the keys you consider open. You own
//!   and mutate it; the outline never does.
//! - [`flatten`]: the pure pre-order flattening pass producing [`FlatRow`]s
//!   with [`TreeMeta`] (level, position among siblings, expansion flag, ...).
//! - [`SubtreeCache`]: memoizes flattened child lists by [`Fingerprint`], so
//!   repeatedly expanding and collapsing the same branch is cheap.
//! - [`TreeViewCache`]: owns the flat rows plus key→node and key→parent
//!   indexes, and exposes [`TreeViewCache::build_cache`] (full rebuild) and
//!   [`TreeViewCache::update_node_expansion`] (incremental toggle).
//! - [`RowPool`] and [`RecordPool`]: allocation reuse for render-ready row
//!   containers with a fixed [`RowSchema`].
//!
//! This crate deliberately does **not** decide which nodes are expanded,
//! render anything, or schedule repaints. Every operation is synchronous and
//! runs to completion.
//!
//! ## Minimal example
//!
//! ```rust
//! use understory_outline::{RowChange, SourceNode, TreeViewCache};
//!
//! let roots = [
//!     SourceNode::new("A", "Project")
//!         .with_children([SourceNode::new("A1", "Design"), SourceNode::new("A2", "Build")])
//!         .into_rc(),
//!     SourceNode::new("B", "Archive").into_rc(),
//! ];
//!
//! let mut expanded = vec!["A"];
//! let mut view = TreeViewCache::new();
//! view.build_cache(&roots, &expanded);
//!
//! let keys: Vec<_> = view.rows().iter().map(|r| r.key).collect();
//! assert_eq!(keys, ["A", "A1", "A2", "B"]);
//! assert_eq!(view.rows()[2].meta.pos_in_set, 2);
//!
//! // The host owns the expansion set: update it, then tell the view.
//! expanded.retain(|k| *k != "A");
//! let update = view.update_node_expansion("A", false, &expanded);
//! assert_eq!(update.change, RowChange::Removed { at: 1, len: 2 });
//! assert_eq!(view.len(), 2);
//! ```
//!
//! ## Invariants
//!
//! After every operation on a [`TreeViewCache`]:
//!
//! - Rows form a pre-order traversal: a row is followed by its expanded
//!   descendants, and only by them, before its next sibling.
//! - A child row's level is its parent's level plus one.
//! - A row without children is never expanded.
//! - `pos_in_set` and `set_size` describe the immediate sibling group.
//! - The node and parent indexes hold exactly the keys that have a row.
//!
//! Applying toggles one at a time yields the same rows as a fresh
//! [`TreeViewCache::build_cache`] with the updated expansion set, except for
//! [`TreeMeta::local_index`]: it counts within the flattening call that
//! produced a row, so rows after a splice point keep their earlier value.
//!
//! ## Diagnostics
//!
//! Nothing in this crate returns an error. Toggles on unknown, hidden, or
//! already-toggled keys come back as [`RowChange::Skipped`] with a [`Skip`]
//! reason, and releasing a handle a pool does not consider lent out returns
//! `false`. These paths are also reported through the `log` facade.
//!
//! ## Subtree cache
//!
//! The [`SubtreeCache`] is keyed by the identity of the child nodes being
//! flattened, not only their keys. Source nodes are immutable once shared, so
//! handing [`TreeViewCache::build_cache`] a rebuilt tree under the same keys
//! never replays rows of the old one. Entries for dropped nodes are pruned on
//! every rebuild; [`TreeViewCache::clear_subtree_cache`] drops the rest.
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

mod expansion;
mod flatten;
mod node;
mod pool;
mod record;
mod row;
mod subtree;
mod view;

pub use expansion::ExpansionSet;
pub use flatten::{flatten, flatten_into};
pub use node::SourceNode;
pub use pool::{FnRecycle, PoolHandle, PoolStats, Recycle, RowPool};
pub use record::{
    FieldSource, MetaOverrides, RESERVED_FIELDS, Record, RecordPool, RowSchema, is_reserved,
};
pub use row::{FlatRow, TreeMeta};
pub use subtree::{Fingerprint, SubtreeCache, SubtreeStats};
pub use view::{CacheState, ExpansionUpdate, RowChange, Skip, TreeViewCache};
