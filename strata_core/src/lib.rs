// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Layer-to-backing assignment with squashing for compositing layer trees.
//!
//! `strata_core` decides which layers of a paint tree get a composited
//! surface of their own, which share a "squashing" surface with earlier
//! layers, and which simply paint into their ancestors. It is `no_std`
//! compatible (with `alloc`) and uses array-based struct-of-arrays storage
//! with index handles.
//!
//! # Architecture
//!
//! An update cycle turns upstream compositing requirements into backing
//! changes:
//!
//! ```text
//!   Requirements stage (reasons, bounds, ancestry)
//!       │
//!       ▼
//!   LayerTree setters ──► LayerTree::take_changes() ──► CompositingChanges
//!                                                             │
//!                 ┌───────────────────────────────────────────┘
//!                 ▼
//!   Assigner::assign() ──► BackingFactory::allocate_or_clear()
//!       │
//!       ▼
//!   AssignmentOutcome ──► LayerTree::update_backing_geometry()
//! ```
//!
//! **[`layer`]** — Struct-of-arrays layer tree with generational handles,
//! paint-order traversal, and the backings (with their squashed members)
//! that assignment creates.
//!
//! **[`dirty`]** — Multi-channel dirty tracking via `understory_dirty`.
//! Input mutations automatically mark the appropriate channel. ANCESTRY
//! propagates to descendants; GEOMETRY and REASONS are local-only.
//!
//! **[`reasons`]** — Bit sets for why a layer is composited and why it could
//! not be squashed.
//!
//! **[`assign`]** — The paint-order traversal that decides and applies each
//! layer's [`CompositingStateTransition`](layer::CompositingStateTransition).
//!
//! **[`oracle`]** — Pure squashing eligibility checks, including the
//! sparsity limit.
//!
//! **[`squashing`]** — The accumulator for the squashing backing that is
//! currently accepting layers.
//!
//! **[`factory`]** — The [`BackingFactory`](factory::BackingFactory) trait
//! through which backings are created and destroyed.
//!
//! **[`config`]** — [`AssignerConfig`](config::AssignerConfig) presets.
//!
//! **[`transform`]** — 3D transform type used to classify layer transforms.
//!
//! **[`trace`]** — [`TraceSink`](trace::TraceSink) trait and event types for
//! assignment instrumentation, with zero-overhead [`Tracer`](trace::Tracer)
//! wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Enables `Tracer` method bodies (one branch
//!   per call site).
//! - `trace-rich` (disabled by default, implies `trace`): Gates per-layer
//!   squash-bounds events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod assign;
pub mod config;
pub mod dirty;
pub mod factory;
pub mod layer;
pub mod oracle;
pub mod reasons;
pub mod squashing;
pub mod trace;
pub mod transform;

pub use assign::{Assigner, AssignmentOutcome};
