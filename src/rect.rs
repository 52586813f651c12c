use glam::{vec2, Affine2, Vec2};

/// A rectangle.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct Rect {
    /// The position of the top-left corner
    /// of this rectangle.
    pub pos: Vec2,
    /// The side lengths of this rectangle.
    pub size: Vec2,
}

impl Rect {
    pub fn new(pos: Vec2, size: Vec2) -> Self {
        Self { pos, size }
    }

    /// Creates a rectangle from left/top/right/bottom edges.
    ///
    /// Negative extents collapse to zero size.
    pub fn from_ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self {
            pos: vec2(left, top),
            size: vec2((right - left).max(0.), (bottom - top).max(0.)),
        }
    }

    pub fn from_ltwh(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            pos: vec2(left, top),
            size: vec2(width.max(0.), height.max(0.)),
        }
    }

    pub fn left(self) -> f32 {
        self.pos.x
    }

    pub fn top(self) -> f32 {
        self.pos.y
    }

    pub fn right(self) -> f32 {
        self.pos.x + self.size.x
    }

    pub fn bottom(self) -> f32 {
        self.pos.y + self.size.y
    }

    pub fn is_empty(self) -> bool {
        self.size.x <= 0. || self.size.y <= 0.
    }

    pub fn offset(self, offset: Vec2) -> Self {
        Self {
            pos: self.pos + offset,
            size: self.size,
        }
    }

    pub fn contains(self, pos: Vec2) -> bool {
        pos.x >= self.pos.x
            && pos.y >= self.pos.y
            && pos.x < (self.pos.x + self.size.x)
            && pos.y < (self.pos.y + self.size.y)
    }

    /// Intersection of two rectangles. An empty intersection
    /// yields a zero-sized rectangle at the overlap position.
    pub fn intersect(self, other: Self) -> Self {
        let left = self.left().max(other.left());
        let top = self.top().max(other.top());
        let right = self.right().min(other.right());
        let bottom = self.bottom().min(other.bottom());
        Self::from_ltrb(left, top, right.max(left), bottom.max(top))
    }

    /// Smallest rectangle containing both inputs.
    ///
    /// Empty rectangles do not contribute.
    pub fn union(self, other: Self) -> Self {
        if self.is_empty() {
            return other;
        }
        if other.is_empty() {
            return self;
        }
        let left = self.left().min(other.left());
        let top = self.top().min(other.top());
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Self::from_ltrb(left, top, right, bottom)
    }

    pub fn transformed(self, transform: Affine2) -> Self {
        Self {
            pos: transform.transform_point2(self.pos),
            size: transform.transform_vector2(self.size),
        }
    }

    /// Axis-aligned bounding box of this rectangle under `transform`.
    pub fn bbox_transformed(self, transform: Affine2) -> Self {
        let points = [
            self.pos,
            self.pos + vec2(0., self.size.y),
            self.pos + vec2(self.size.x, 0.),
            self.pos + self.size,
        ]
        .map(|p| transform.transform_point2(p));

        let mut min = Vec2::splat(f32::INFINITY);
        let mut max = Vec2::splat(-f32::INFINITY);
        for point in points {
            min = min.min(point);
            max = max.max(point);
        }

        Self {
            pos: min,
            size: max - min,
        }
    }
}
