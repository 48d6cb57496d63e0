//! Cell-space geometry: points, sizes and rectangles.
//!
//! Coordinates are signed so that callers can describe partially off-screen
//! areas and degenerate (negative-sized) requests without wrapping.

use std::ops::{Add, Sub};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ZERO: Self = Self { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Number of cells covered; zero for degenerate sizes.
    pub fn area(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            self.width as usize * self.height as usize
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn from_parts(location: Point, size: Size) -> Self {
        Self::new(location.x, location.y, size.width, size.height)
    }

    pub fn location(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn right(&self) -> i32 {
        self.x.saturating_add(self.width)
    }

    pub fn bottom(&self) -> i32 {
        self.y.saturating_add(self.height)
    }

    pub fn contains(&self, p: Point) -> bool {
        if self.is_empty() {
            return false;
        }
        p.x >= self.x && p.x < self.right() && p.y >= self.y && p.y < self.bottom()
    }

    pub fn offset(self, by: Point) -> Rect {
        Rect::new(self.x + by.x, self.y + by.y, self.width, self.height)
    }

    /// Shrinks the rectangle by `n` cells on every side; never below zero size.
    pub fn deflate(self, n: i32) -> Rect {
        Rect::new(
            self.x + n,
            self.y + n,
            (self.width - 2 * n).max(0),
            (self.height - 2 * n).max(0),
        )
    }

    pub fn intersect(self, other: Rect) -> Rect {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        Rect::new(x1, y1, (x2 - x1).max(0), (y2 - y1).max(0))
    }
}

#[cfg(test)]
mod tests {
    use super::{Point, Rect, Size};

    #[test]
    fn contains_is_half_open() {
        let r = Rect::new(2, 3, 4, 2);
        assert!(r.contains(Point::new(2, 3)));
        assert!(r.contains(Point::new(5, 4)));
        assert!(!r.contains(Point::new(6, 4)));
        assert!(!r.contains(Point::new(5, 5)));
        assert!(!Rect::new(0, 0, 0, 5).contains(Point::ZERO));
    }

    #[test]
    fn deflate_clamps_to_zero() {
        assert_eq!(Rect::new(5, 5, 10, 10).deflate(1), Rect::new(6, 6, 8, 8));
        assert_eq!(Rect::new(0, 0, 1, 1).deflate(1), Rect::new(1, 1, 0, 0));
    }

    #[test]
    fn intersect_disjoint_is_empty() {
        let a = Rect::new(0, 0, 3, 3);
        let b = Rect::new(5, 5, 2, 2);
        assert!(a.intersect(b).is_empty());
        assert_eq!(
            Rect::new(0, 0, 10, 10).intersect(Rect::new(-2, 4, 5, 20)),
            Rect::new(0, 4, 3, 6)
        );
    }

    #[test]
    fn negative_sizes_have_no_area() {
        assert_eq!(Size::new(-1, 4).area(), 0);
        assert_eq!(Size::new(3, 4).area(), 12);
    }
}
