// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Rectangle cache for spans.
//!
//! Geometry is measured by the host ([`Geometry`](crate::types::Geometry)) and cached
//! per span. The cache is built when the pointer enters the span's target and is never
//! refreshed implicitly; a later enter rebuilds it.

use kurbo::{Point, Rect};

/// What a [`Geometry`](crate::types::Geometry) provider reports for a span.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SpanGeometry {
    /// Bounding box of the whole span.
    pub bounds: Rect,
    /// Box of the collapsed point at the span's start.
    pub start_caret: Rect,
    /// Box of the collapsed point at the span's end.
    pub end_caret: Rect,
}

/// Cached geometry of an indexed span.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RectCache {
    /// Bounding box of the span.
    pub bounds: Rect,
    /// Line height at the span's start, for aligning overlays to the text baseline.
    pub start_line_height: f64,
    /// Line height at the span's end.
    pub end_line_height: f64,
}

impl RectCache {
    /// Build a cache entry from measured geometry.
    pub fn from_geometry(geometry: SpanGeometry) -> Self {
        Self {
            bounds: geometry.bounds,
            start_line_height: geometry.start_caret.height(),
            end_line_height: geometry.end_caret.height(),
        }
    }

    /// Left edge.
    pub fn left(&self) -> f64 {
        self.bounds.x0
    }

    /// Top edge.
    pub fn top(&self) -> f64 {
        self.bounds.y0
    }

    /// Right edge.
    pub fn right(&self) -> f64 {
        self.bounds.x1
    }

    /// Bottom edge.
    pub fn bottom(&self) -> f64 {
        self.bounds.y1
    }

    /// Width of the bounds.
    pub fn width(&self) -> f64 {
        self.bounds.width()
    }

    /// Height of the bounds.
    pub fn height(&self) -> f64 {
        self.bounds.height()
    }

    /// True if `pt` lies inside the bounds, edges included.
    ///
    /// Unlike [`Rect::contains`], the right and bottom edges count as inside.
    pub fn contains(&self, pt: Point) -> bool {
        self.left() <= pt.x && pt.x <= self.right() && self.top() <= pt.y && pt.y <= self.bottom()
    }
}
