// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Bit sets describing why a layer is (or cannot be) composited.
//!
//! [`CompositingReasons`] are inputs: the upstream style/overlap stages say
//! why a layer wants a composited surface. A subset of them
//! ([`CompositingReasons::SQUASHABLE`]) only asks for the layer to be
//! separated from whatever paints beneath it, which a shared squashing
//! backing satisfies just as well as a dedicated one.
//!
//! [`SquashingDisallowedReasons`] are diagnostics written by assignment
//! when a layer that asked to be squashed could not be.

use core::fmt;

use bitflags::bitflags;

bitflags! {
    /// Reasons a layer needs to be composited.
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
    pub struct CompositingReasons: u64 {
        /// The root layer of a tree that is in compositing mode.
        const ROOT = 1 << 0;
        /// A 3-D or perspective transform.
        const TRANSFORM_3D = 1 << 1;
        /// Video content.
        const VIDEO = 1 << 2;
        /// Accelerated canvas content.
        const CANVAS = 1 << 3;
        /// Plugin content.
        const PLUGIN = 1 << 4;
        /// Nested browsing context content.
        const IFRAME = 1 << 5;
        /// `backface-visibility: hidden`.
        const BACKFACE_VISIBILITY_HIDDEN = 1 << 6;
        /// A compositor-driven animation is running.
        const ACTIVE_ANIMATION = 1 << 7;
        /// An explicit compositing hint such as `will-change: transform`.
        const WILL_CHANGE_COMPOSITING_HINT = 1 << 8;
        /// Fixed-position content that must move independently on scroll.
        const FIXED_POSITION = 1 << 9;
        /// A scroller that scrolls on the compositor.
        const OVERFLOW_SCROLLING = 1 << 10;
        /// Reflection of a composited layer.
        const REFLECTION_OF_COMPOSITED_PARENT = 1 << 11;
        /// Has composited descendants that need an isolated group.
        const ISOLATE_COMPOSITED_DESCENDANTS = 1 << 12;

        /// Overlaps a composited layer earlier in paint order.
        const OVERLAP = 1 << 32;
        /// Might overlap a composited layer whose bounds are unknown (e.g. animating).
        const ASSUMED_OVERLAP = 1 << 33;
        /// Paints after a composited scroller it is not contained by.
        const OVERFLOW_SCROLLING_PARENT = 1 << 34;

        /// Wanted squashing, but assignment rejected it.
        const SQUASHING_DISALLOWED = 1 << 40;

        /// Reasons that can be satisfied by a shared squashing backing.
        const SQUASHABLE = Self::OVERLAP.bits()
            | Self::ASSUMED_OVERLAP.bits()
            | Self::OVERFLOW_SCROLLING_PARENT.bits();
    }
}

impl CompositingReasons {
    /// Returns `true` if any reason demands a dedicated backing.
    #[inline]
    #[must_use]
    pub const fn requires_compositing(self) -> bool {
        !self.difference(Self::SQUASHABLE).is_empty()
    }

    /// Returns `true` if the layer only wants to be separated from content
    /// beneath it, so it may share a squashing backing.
    #[inline]
    #[must_use]
    pub const fn requires_squashing(self) -> bool {
        !self.requires_compositing() && self.intersects(Self::SQUASHABLE)
    }
}

bitflags! {
    /// Why a squashing candidate was kept out of the current squashing backing.
    ///
    /// The bits are listed in the order the checks run.
    #[derive(Clone, Copy, Default, Debug, PartialEq, Eq, Hash)]
    pub struct SquashingDisallowedReasons: u32 {
        /// The squashing owner's subtree has not been fully assigned yet, so
        /// joining it could paint the candidate before content it must cover.
        const WOULD_BREAK_PAINT_ORDER = 1 << 0;
        /// Video cannot share a surface.
        const VIDEO = 1 << 1;
        /// Plugins and nested browsing contexts cannot share a surface.
        const LAYOUT_PART = 1 << 2;
        /// The candidate has a reflection.
        const REFLECTION = 1 << 3;
        /// The shared surface would be too sparse.
        const SPARSITY_EXCEEDED = 1 << 4;
        /// The candidate blends with content beneath it.
        const BLENDING = 1 << 5;
        /// The candidate is clipped by a container the surface does not share.
        const CLIPPING_CONTAINER_MISMATCH = 1 << 6;
        /// The candidate clips composited descendants.
        const CLIPS_COMPOSITING_DESCENDANTS = 1 << 7;
        /// The candidate scrolls relative to the squashing owner.
        const SCROLLS_WITH_RESPECT_TO_SQUASHING_LAYER = 1 << 8;
        /// The candidate is a scroll child with composited descendants.
        const SCROLL_CHILD_WITH_COMPOSITED_DESCENDANTS = 1 << 9;
        /// Different opacity ancestor than the squashing owner.
        const OPACITY_ANCESTOR_MISMATCH = 1 << 10;
        /// Different transform ancestor than the squashing owner.
        const TRANSFORM_ANCESTOR_MISMATCH = 1 << 11;
        /// Different filter ancestor, or the candidate itself has a filter.
        const FILTER_MISMATCH = 1 << 12;
        /// The candidate's transform is not a 2-D translation.
        const NON_TRANSLATION_TRANSFORM = 1 << 13;
        /// Different 3-D rendering context root.
        const RENDERING_CONTEXT_MISMATCH = 1 << 14;
        /// Different nearest fixed-position ancestor.
        const NEAREST_FIXED_POSITION_MISMATCH = 1 << 15;
        /// The squashing owner is animating on the compositor.
        const SQUASHING_LAYER_IS_ANIMATING = 1 << 16;
        /// The candidate is inside a fragmentation context.
        const FRAGMENTED_CONTENT = 1 << 17;
    }
}

fn write_flag_names<'a>(
    f: &mut fmt::Formatter<'_>,
    names: impl Iterator<Item = &'a str>,
) -> fmt::Result {
    let mut first = true;
    for name in names {
        if !first {
            write!(f, " | ")?;
        }
        write!(f, "{name}")?;
        first = false;
    }
    if first {
        write!(f, "None")?;
    }
    Ok(())
}

impl fmt::Display for CompositingReasons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // `SQUASHABLE` is a combination; print only the single-bit names.
        write_flag_names(
            f,
            self.iter_names()
                .filter(|(_, flag)| flag.bits().is_power_of_two())
                .map(|(name, _)| name),
        )
    }
}

impl fmt::Display for SquashingDisallowedReasons {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_flag_names(f, self.iter_names().map(|(name, _)| name))
    }
}
