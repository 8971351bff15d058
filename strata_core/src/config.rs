// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Assignment configuration.

/// Controls when a rejected squashing candidate is moved to its own backing.
///
/// Passed to the [`Assigner`](crate::Assigner) via
/// [`AssignerConfig::rejection_feedback`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RejectionFeedback {
    /// Check squashing eligibility before deciding the transition, so a
    /// rejected candidate gets its own backing in the same pass.
    ///
    /// A single pass reaches a stable assignment.
    #[default]
    SamePass,
    /// Decide the transition from the layer's current reasons first, then
    /// record the rejection and mark the layer's reasons dirty.
    ///
    /// The rejected layer keeps its old state until the next pass. Drivers
    /// loop while [`LayerTree::take_changes`](crate::layer::LayerTree::take_changes)
    /// reports reason changes.
    NextPass,
}

/// Configuration for the [`Assigner`](crate::Assigner).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AssignerConfig {
    /// Whether layers that only need separation may share squashing backings.
    ///
    /// When `false`, every layer that requires squashing gets its own backing.
    pub squashing_enabled: bool,
    /// Maximum ratio between the area of a squashing surface and the area
    /// its members actually cover.
    pub sparsity_tolerance: f64,
    /// When rejected candidates take effect.
    pub rejection_feedback: RejectionFeedback,
}

impl AssignerConfig {
    /// Squashing on, with the standard sparsity tolerance of 6.
    pub const DEFAULT: Self = Self {
        squashing_enabled: true,
        sparsity_tolerance: 6.0,
        rejection_feedback: RejectionFeedback::SamePass,
    };

    /// Every composited layer gets its own backing.
    #[must_use]
    pub const fn no_squashing() -> Self {
        Self {
            squashing_enabled: false,
            ..Self::DEFAULT
        }
    }

    /// Returns this configuration with a different rejection policy.
    #[must_use]
    pub const fn with_rejection_feedback(mut self, rejection_feedback: RejectionFeedback) -> Self {
        self.rejection_feedback = rejection_feedback;
        self
    }
}

impl Default for AssignerConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}
