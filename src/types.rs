use glam::Vec2;
use palette::Srgba;

/// Which paint slot(s) a draw call uses.
///
/// Wire encoding: 0 = fill, 1 = stroke, 2 = both.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FillStyle {
    Fill,
    Stroke,
    FillAndStroke,
}

impl FillStyle {
    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(FillStyle::Fill),
            1 => Some(FillStyle::Stroke),
            2 => Some(FillStyle::FillAndStroke),
            _ => None,
        }
    }

    pub fn fills(self) -> bool {
        matches!(self, FillStyle::Fill | FillStyle::FillAndStroke)
    }

    pub fn strokes(self) -> bool {
        matches!(self, FillStyle::Stroke | FillStyle::FillAndStroke)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum LineCap {
    #[default]
    Butt,
    Round,
    Square,
}

impl LineCap {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "butt" => Some(LineCap::Butt),
            "round" => Some(LineCap::Round),
            "square" => Some(LineCap::Square),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum LineJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

impl LineJoin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "miter" => Some(LineJoin::Miter),
            "round" => Some(LineJoin::Round),
            "bevel" => Some(LineJoin::Bevel),
            _ => None,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum TextAlign {
    #[default]
    Left,
    Center,
    Right,
}

impl TextAlign {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "left" => Some(TextAlign::Left),
            "center" => Some(TextAlign::Center),
            "right" => Some(TextAlign::Right),
            _ => None,
        }
    }
}

/// How to stroke a shape.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StrokeSettings {
    pub width: f32,
    pub line_cap: LineCap,
    pub line_join: LineJoin,
}

impl Default for StrokeSettings {
    fn default() -> Self {
        Self {
            width: 1.,
            line_cap: LineCap::default(),
            line_join: LineJoin::default(),
        }
    }
}

/// A drop shadow applied to fills, strokes and text.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Shadow {
    pub radius: f32,
    pub offset: Vec2,
    pub color: Srgba<u8>,
}

/// Resolved paint carried by a draw command. The canvas bakes the
/// active color (with global alpha applied) and shadow in here, so
/// the backend never needs canvas state.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Paint {
    pub color: Srgba<u8>,
    pub shadow: Option<Shadow>,
}

/// Corner radii of a rounded rectangle, clockwise from top-left.
#[derive(Copy, Clone, Debug, PartialEq, Default)]
pub struct CornerRadii {
    pub top_left: f32,
    pub top_right: f32,
    pub bottom_right: f32,
    pub bottom_left: f32,
}

impl CornerRadii {
    pub fn uniform(radius: f32) -> Self {
        Self {
            top_left: radius,
            top_right: radius,
            bottom_right: radius,
            bottom_left: radius,
        }
    }

    pub fn is_zero(self) -> bool {
        self.top_left == 0.
            && self.top_right == 0.
            && self.bottom_right == 0.
            && self.bottom_left == 0.
    }
}

/// Per-edge stretchable regions of a loaded image, in pixel
/// positions along each border (nine-patch style).
#[derive(Clone, Debug, PartialEq, Default)]
pub struct StretchInsets {
    pub left: Vec<i32>,
    pub top: Vec<i32>,
    pub right: Vec<i32>,
    pub bottom: Vec<i32>,
}
