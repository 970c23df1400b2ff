// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Provides the axis-aligned rectangle used for viewports, scissors, culling
//! and texture frames.

use super::vector::Vec2;
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in y-down space.
///
/// `(x, y)` is the top-left corner. A rectangle with a non-positive width or
/// height is empty and intersects nothing.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Left edge.
    pub x: f32,
    /// Top edge.
    pub y: f32,
    /// Horizontal size.
    pub width: f32,
    /// Vertical size.
    pub height: f32,
}

impl Rect {
    /// Creates a new rectangle from its top-left corner and size.
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Computes the smallest rectangle enclosing all `points`.
    ///
    /// Returns an empty rectangle at the origin if `points` is empty.
    pub fn from_points(points: &[Vec2]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };
        let (mut min, mut max) = (*first, *first);
        for p in &points[1..] {
            min = Vec2::new(min.x.min(p.x), min.y.min(p.y));
            max = Vec2::new(max.x.max(p.x), max.y.max(p.y));
        }
        Self::new(min.x, min.y, max.x - min.x, max.y - min.y)
    }

    /// The right edge.
    #[inline]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// The bottom edge.
    #[inline]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Returns `true` if the rectangle has no area.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Returns `true` if `point` lies inside the rectangle (edges inclusive).
    #[inline]
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.x && point.x <= self.right() && point.y >= self.y && point.y <= self.bottom()
    }

    /// Returns `true` if the two rectangles overlap.
    ///
    /// Touching edges count as overlapping so that sprites sitting exactly on
    /// the camera border are still drawn.
    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x <= other.right()
            && other.x <= self.right()
            && self.y <= other.bottom()
            && other.y <= self.bottom()
    }

    /// Returns the overlapping region, or `None` if the rectangles do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        let r = Rect::new(x, y, right - x, bottom - y);
        (!r.is_empty()).then_some(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_points() {
        let r = Rect::from_points(&[
            Vec2::new(10.0, 5.0),
            Vec2::new(-2.0, 8.0),
            Vec2::new(4.0, -1.0),
        ]);
        assert_eq!(r, Rect::new(-2.0, -1.0, 12.0, 9.0));
        assert_eq!(Rect::from_points(&[]), Rect::default());
    }

    #[test]
    fn test_intersects() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.intersects(&Rect::new(5.0, 5.0, 10.0, 10.0)));
        assert!(a.intersects(&Rect::new(10.0, 0.0, 5.0, 5.0)));
        assert!(!a.intersects(&Rect::new(11.0, 0.0, 5.0, 5.0)));
        assert!(!a.intersects(&Rect::new(2.0, 2.0, 0.0, 5.0)));
    }

    #[test]
    fn test_intersection() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, -5.0, 10.0, 10.0);
        assert_eq!(a.intersection(&b), Some(Rect::new(5.0, 0.0, 5.0, 5.0)));
        assert_eq!(a.intersection(&Rect::new(20.0, 20.0, 1.0, 1.0)), None);
    }

    #[test]
    fn test_contains() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!(a.contains(Vec2::new(10.0, 0.0)));
        assert!(!a.contains(Vec2::new(10.5, 0.0)));
    }
}
