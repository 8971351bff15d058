// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for assignment passes.
//!
//! This module provides a [`TraceSink`] trait with per-event methods that the
//! [`Assigner`](crate::Assigner) calls as it walks the tree. All method bodies
//! default to no-ops, so implementing only the events you care about is fine.
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing (zero overhead). When
//! **on**, each method performs a single `Option` branch before dispatching.
//!
//! [`AssignSummaryBuilder`] tallies transitions during a pass and produces an
//! [`AssignSummary`] at the end.
//!
//! # Crate features
//!
//! - `trace` — enables the `Tracer` method bodies (one branch per call).
//! - `trace-rich` (implies `trace`) — gates [`SquashBoundsEvent`] and the
//!   corresponding `TraceSink` method, emitted once per squashed layer.

use crate::layer::{BackingId, CompositingStateTransition, LayerId};
use crate::reasons::SquashingDisallowedReasons;

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when an assignment pass starts.
#[derive(Clone, Copy, Debug)]
pub struct AssignBeginEvent {
    /// Monotonic pass counter of the assigner.
    pub pass: u64,
    /// Root of the traversal.
    pub root: LayerId,
    /// Whether squashing is enabled for this pass.
    pub squashing_enabled: bool,
}

/// Emitted for every layer whose transition changes its backing or
/// squashing membership.
///
/// A [`PutInSquashingLayer`](CompositingStateTransition::PutInSquashingLayer)
/// that leaves the layer at the slot it already held is not reported.
#[derive(Clone, Copy, Debug)]
pub struct TransitionEvent {
    /// Pass counter.
    pub pass: u64,
    /// The layer.
    pub layer: LayerId,
    /// What was decided.
    pub transition: CompositingStateTransition,
    /// Whether the layer's own backing was created or destroyed.
    pub backing_changed: bool,
}

/// Emitted when a squashing candidate is rejected.
#[derive(Clone, Copy, Debug)]
pub struct SquashingDisallowedEvent {
    /// Pass counter.
    pub pass: u64,
    /// The rejected candidate.
    pub layer: LayerId,
    /// Owner of the backing the candidate tried to join, if any.
    pub owner: Option<LayerId>,
    /// Why it was rejected.
    pub reasons: SquashingDisallowedReasons,
}

/// Emitted when a squashing backing stops accepting layers.
#[derive(Clone, Copy, Debug)]
pub struct SquashingFinishedEvent {
    /// Pass counter.
    pub pass: u64,
    /// The finished backing.
    pub backing: BackingId,
    /// Its owner.
    pub owner: LayerId,
    /// Number of layers squashed into it this pass.
    pub member_count: usize,
}

/// Emitted for every layer squashed this pass (requires `trace-rich` feature).
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct SquashBoundsEvent {
    /// Pass counter.
    pub pass: u64,
    /// The backing being accumulated.
    pub backing: BackingId,
    /// Index the layer occupies.
    pub index: usize,
    /// Union of member bounds so far, including this layer.
    pub bounding_rect: kurbo::Rect,
    /// Sum of member areas so far, including this layer.
    pub total_area: f64,
}

/// Per-pass summary produced by [`AssignSummaryBuilder`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AssignSummary {
    /// Pass counter.
    pub pass: u64,
    /// Layers visited, including reflections.
    pub visited: usize,
    /// Own backings allocated.
    pub allocated: usize,
    /// Own backings removed.
    pub removed: usize,
    /// Layers newly placed into a squashing backing.
    pub squashed: usize,
    /// Layers taken out of a squashing backing.
    pub unsquashed: usize,
    /// Squashing candidates rejected.
    pub disallowed: usize,
    /// Layers queued for paint invalidation.
    pub invalidations: usize,
    /// Whether the composited layer structure changed.
    pub layers_changed: bool,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from assignment.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a pass starts.
    fn on_assign_begin(&mut self, e: &AssignBeginEvent) {
        _ = e;
    }

    /// Called for every layer whose transition took effect.
    fn on_transition(&mut self, e: &TransitionEvent) {
        _ = e;
    }

    /// Called when a squashing candidate is rejected.
    fn on_squashing_disallowed(&mut self, e: &SquashingDisallowedEvent) {
        _ = e;
    }

    /// Called when a squashing backing stops accepting layers.
    fn on_squashing_finished(&mut self, e: &SquashingFinishedEvent) {
        _ = e;
    }

    /// Called with the per-pass summary when a pass ends.
    fn on_assign_end(&mut self, s: &AssignSummary) {
        _ = s;
    }

    /// Called for every squashed layer (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    fn on_squash_bounds(&mut self, e: &SquashBoundsEvent) {
        _ = e;
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Emits an [`AssignBeginEvent`].
    #[inline]
    pub fn assign_begin(&mut self, e: &AssignBeginEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_assign_begin(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`TransitionEvent`].
    #[inline]
    pub fn transition(&mut self, e: &TransitionEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_transition(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`SquashingDisallowedEvent`].
    #[inline]
    pub fn squashing_disallowed(&mut self, e: &SquashingDisallowedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_squashing_disallowed(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits a [`SquashingFinishedEvent`].
    #[inline]
    pub fn squashing_finished(&mut self, e: &SquashingFinishedEvent) {
        #[cfg(feature = "trace")]
        if let Some(s) = &mut self.sink {
            s.on_squashing_finished(e);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = e;
        }
    }

    /// Emits an [`AssignSummary`].
    #[inline]
    pub fn assign_end(&mut self, s: &AssignSummary) {
        #[cfg(feature = "trace")]
        if let Some(sink) = &mut self.sink {
            sink.on_assign_end(s);
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = s;
        }
    }

    /// Emits a [`SquashBoundsEvent`] (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn squash_bounds(&mut self, e: &SquashBoundsEvent) {
        if let Some(s) = &mut self.sink {
            s.on_squash_bounds(e);
        }
    }
}

// ---------------------------------------------------------------------------
// AssignSummaryBuilder
// ---------------------------------------------------------------------------

/// Tallies transitions during a pass and produces an [`AssignSummary`].
#[derive(Debug)]
pub struct AssignSummaryBuilder {
    summary: AssignSummary,
}

impl AssignSummaryBuilder {
    /// Starts a summary for the given pass.
    #[must_use]
    pub fn new(pass: u64) -> Self {
        Self {
            summary: AssignSummary {
                pass,
                ..AssignSummary::default()
            },
        }
    }

    /// Records that a layer was visited.
    pub fn visit(&mut self) {
        self.summary.visited += 1;
    }

    /// Records a transition that took effect.
    pub fn transition(&mut self, transition: CompositingStateTransition) {
        let s = &mut self.summary;
        match transition {
            CompositingStateTransition::NoChange => {}
            CompositingStateTransition::AllocateOwnBacking => s.allocated += 1,
            CompositingStateTransition::RemoveOwnBacking => s.removed += 1,
            CompositingStateTransition::PutInSquashingLayer => s.squashed += 1,
            CompositingStateTransition::RemoveFromSquashingLayer => s.unsquashed += 1,
        }
    }

    /// Records a rejected squashing candidate.
    pub fn disallowed(&mut self) {
        self.summary.disallowed += 1;
    }

    /// Consumes the builder and produces the final [`AssignSummary`].
    #[must_use]
    pub fn finish(self, layers_changed: bool, invalidations: usize) -> AssignSummary {
        AssignSummary {
            layers_changed,
            invalidations,
            ..self.summary
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
