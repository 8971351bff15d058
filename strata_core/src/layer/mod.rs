// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer tree data model.
//!
//! A *layer* is a node in a paint tree that may be promoted to a composited
//! surface. Each layer has:
//!
//! - An identity ([`LayerId`]) — a generational handle that becomes stale when
//!   the layer is destroyed, preventing use-after-free bugs at the API level.
//! - Topology — parent, first-child, and sibling links forming an ordered
//!   tree, plus a [`ZOrder`] bucket that places it in its parent's paint order.
//! - **Inputs** set by the caller: [`bounds`](LayerTree::set_bounds),
//!   [`compositing reasons`](LayerTree::set_compositing_reasons),
//!   [`ancestry`](LayerTree::set_ancestry), [`flags`](LayerTree::set_flags),
//!   and the properties that can prevent squashing.
//! - **Assignment state** written by the [`Assigner`](crate::Assigner): the
//!   layer's own [`Backing`], or the squashing backing it paints into.
//!
//! Layers are stored in struct-of-arrays layout with index-based handles.
//! Backings live in a generational arena owned by the same [`LayerTree`].
//!
//! # Dirty tracking
//!
//! Input mutations automatically mark the corresponding dirty channel (see
//! [`dirty`](crate::dirty)). [`LayerTree::take_changes`] drains them so a
//! driver can tell whether an assignment pass is needed.

mod backing;
mod changes;
mod clip;
mod id;
mod store;
mod traverse;

pub use backing::{Backing, CompositingStateTransition, SquashedLayer};
pub use changes::CompositingChanges;
pub use clip::ClipShape;
pub use id::{BackingId, INVALID, LayerId};
pub use store::{
    BlendMode, CompositingState, ContentKind, LayerAncestry, LayerFlags, LayerTree, ZOrder,
};
pub use traverse::Children;
