// Copyright 2026 the Strata Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Clip shape types for layers that clip their descendants.

use kurbo::Rect;

/// A shape a layer uses to clip its descendants, in absolute coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ClipShape {
    /// An axis-aligned rectangle.
    Rect(Rect),
    /// A rectangle with rounded corners.
    RoundedRect(kurbo::RoundedRect),
}

impl ClipShape {
    /// Returns the axis-aligned bounds of the clip.
    ///
    /// Squashed layers clip in software against a rectangle, so rounded
    /// corners are approximated by their bounding rect.
    #[must_use]
    pub fn bounding_rect(&self) -> Rect {
        match self {
            Self::Rect(rect) => *rect,
            Self::RoundedRect(rounded) => rounded.rect(),
        }
    }
}
