// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dirty-tracking channel constants.
//!
//! Strata uses multi-channel dirty tracking (via [`understory_dirty`]) to
//! record which layers had compositing-relevant inputs changed since the
//! last assignment pass. Each channel represents an independent category of
//! change.
//!
//! # Propagation semantics
//!
//! - **Propagating** — [`ANCESTRY`] uses
//!   [`EagerPolicy`](understory_dirty::EagerPolicy) along child-to-parent
//!   dependency edges. Ancestor pointers (opacity, transform, filter,
//!   clipping container, ...) are inherited, so a change on a layer can
//!   change what every descendant is compatible with.
//!
//! - **Local-only** — [`GEOMETRY`] and [`REASONS`] are marked with the
//!   default policy. Bounds and compositing reasons are per-layer inputs.
//!
//! - **Structural** — [`TOPOLOGY`] is marked on topology mutations
//!   (add/remove child, create/destroy layer, z-order changes).
//!
//! # Consumption
//!
//! [`LayerTree::take_changes`](crate::layer::LayerTree::take_changes)
//! drains every channel into a
//! [`CompositingChanges`](crate::layer::CompositingChanges). A driver that
//! sees an empty record can skip the assignment pass entirely.

use understory_dirty::Channel;

/// Bounding box or clip shape changed.
pub const GEOMETRY: Channel = Channel::new(0);

/// Compositing reasons, flags, content kind, transform, or blend mode changed.
pub const REASONS: Channel = Channel::new(1);

/// Ancestor or container pointers changed; propagates to descendants.
pub const ANCESTRY: Channel = Channel::new(2);

/// Tree topology or paint order changed.
pub const TOPOLOGY: Channel = Channel::new(3);
