use glam::Vec2;

use crate::{types::CornerRadii, Rect};

/// A shape the backend can rasterize directly, without
/// a path representation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Primitive {
    Rectangle {
        rect: Rect,
        radii: CornerRadii,
    },
    /// An ellipse inscribed in `bounds`.
    Oval {
        bounds: Rect,
    },
    Circle {
        center: Vec2,
        radius: f32,
    },
    /// An elliptical arc inscribed in `bounds`. Angles are in degrees,
    /// measured clockwise from the positive X axis. When `use_center`
    /// is set the arc closes through the center (a pie wedge).
    Arc {
        bounds: Rect,
        start_degrees: f32,
        sweep_degrees: f32,
        use_center: bool,
    },
}

impl Primitive {
    pub fn rect(rect: Rect) -> Self {
        Primitive::Rectangle {
            rect,
            radii: CornerRadii::default(),
        }
    }

    pub fn rounded_rect(rect: Rect, radii: CornerRadii) -> Self {
        Primitive::Rectangle { rect, radii }
    }
}

impl From<Rect> for Primitive {
    fn from(rect: Rect) -> Self {
        Primitive::rect(rect)
    }
}
