use glam::{Affine2, Vec2};
use palette::Srgba;

use crate::{
    backend::{Backend, LayerId},
    color,
    command::{Clip, Command, CommandBuffer},
    primitive::Primitive,
    types::{CornerRadii, FillStyle, LineCap, LineJoin, Paint, Shadow, StrokeSettings, TextAlign},
    Rect, SmartString,
};

/// What a canvas is bound to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CanvasKind {
    /// Frame-scoped canvas locked against a surface. The layer
    /// belongs to the surface and survives the canvas.
    Locked { surface: u32 },
    /// Persistent offscreen canvas. Owns its layer.
    Offscreen,
}

/// Live paint attributes of a canvas. Colors are kept per style
/// slot; `global_alpha` multiplies into every resolved paint.
#[derive(Clone, Debug, PartialEq)]
struct PaintState {
    fill_color: Srgba<u8>,
    stroke_color: Srgba<u8>,
    stroke: StrokeSettings,
    shadow: Option<Shadow>,
    font_size: f32,
    font: SmartString,
    text_align: TextAlign,
    global_alpha: f32,
}

impl Default for PaintState {
    fn default() -> Self {
        Self {
            fill_color: Srgba::new(0, 0, 0, 255),
            stroke_color: Srgba::new(0, 0, 0, 255),
            stroke: StrokeSettings::default(),
            shadow: None,
            font_size: 12.,
            font: SmartString::new(),
            text_align: TextAlign::default(),
            global_alpha: 1.,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
struct State {
    transform: Affine2,
    clip: Option<Clip>,
    paint: PaintState,
}

impl Default for State {
    fn default() -> Self {
        Self {
            transform: Affine2::IDENTITY,
            clip: None,
            paint: PaintState::default(),
        }
    }
}

/// A drawing target with retained transform, clip and paint state
/// and a save/restore stack.
///
/// Draw calls record resolved [`Command`]s; nothing touches pixels
/// until [`flush`](Canvas::flush) hands the stream to the backend.
pub struct Canvas {
    layer: LayerId,
    kind: CanvasKind,
    commands: CommandBuffer,
    state: State,
    state_stack: Vec<State>,
}

impl Canvas {
    pub fn new(layer: LayerId, kind: CanvasKind) -> Self {
        Self {
            layer,
            kind,
            commands: CommandBuffer::new(),
            state: State::default(),
            state_stack: Vec::new(),
        }
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn kind(&self) -> CanvasKind {
        self.kind
    }

    /// Whether this canvas owns its backing layer (offscreen) or
    /// borrows it from a surface (locked).
    pub fn owns_layer(&self) -> bool {
        self.kind == CanvasKind::Offscreen
    }

    pub fn transform(&self) -> Affine2 {
        self.state.transform
    }

    pub fn clip(&self) -> Option<Clip> {
        self.state.clip
    }

    pub fn save_depth(&self) -> usize {
        self.state_stack.len()
    }
}

/// Transform and clip.
impl Canvas {
    pub fn translate(&mut self, translation: Vec2) -> &mut Self {
        self.state.transform = self.state.transform * Affine2::from_translation(translation);
        self.emit_transform();
        self
    }

    pub fn scale(&mut self, scale: Vec2) -> &mut Self {
        self.state.transform = self.state.transform * Affine2::from_scale(scale);
        self.emit_transform();
        self
    }

    /// Rotates the canvas clockwise by the given angle in degrees
    /// (wire convention).
    pub fn rotate_degrees(&mut self, degrees: f32) -> &mut Self {
        self.state.transform = self.state.transform * Affine2::from_angle(degrees.to_radians());
        self.emit_transform();
        self
    }

    /// Concatenates a full affine matrix onto the current transform.
    pub fn concat(&mut self, matrix: Affine2) -> &mut Self {
        self.state.transform = self.state.transform * matrix;
        self.emit_transform();
        self
    }

    /// Pushes a deep copy of {transform, clip, paint} onto the stack.
    pub fn save(&mut self) -> &mut Self {
        self.state_stack.push(self.state.clone());
        self
    }

    /// Pops the save stack. An unbalanced restore is a warning,
    /// never fatal.
    pub fn restore(&mut self) -> &mut Self {
        let Some(prev) = self.state_stack.pop() else {
            log::warn!("restore() without a matching save(), ignoring");
            return self;
        };
        let clip_changed = prev.clip != self.state.clip;
        self.state = prev;
        self.emit_transform();
        if clip_changed {
            self.emit_clip();
        }
        self
    }

    /// Intersects the clip with `rect`, given in the current
    /// transformed space.
    pub fn clip_rect(&mut self, rect: Rect) -> &mut Self {
        self.intersect_clip(rect, CornerRadii::default());
        self
    }

    /// Intersects the clip with a rounded rectangle. The latest
    /// corner radii win; the rectangular intersection accumulates.
    pub fn clip_round_rect(&mut self, rect: Rect, radii: CornerRadii) -> &mut Self {
        self.intersect_clip(rect, radii);
        self
    }

    fn intersect_clip(&mut self, rect: Rect, radii: CornerRadii) {
        let device = rect.bbox_transformed(self.state.transform);
        let region = match self.state.clip {
            Some(clip) => clip.region.intersect(device),
            None => device,
        };
        self.state.clip = Some(Clip { region, radii });
        self.emit_clip();
    }
}

/// Paint attributes.
impl Canvas {
    /// Sets the color of the slot(s) selected by `style`.
    pub fn set_color(&mut self, color: Srgba<u8>, style: FillStyle) -> &mut Self {
        if style.fills() {
            self.state.paint.fill_color = color;
        }
        if style.strokes() {
            self.state.paint.stroke_color = color;
        }
        self
    }

    pub fn set_line_width(&mut self, width: f32) -> &mut Self {
        self.state.paint.stroke.width = width;
        self
    }

    pub fn set_line_cap(&mut self, cap: LineCap) -> &mut Self {
        self.state.paint.stroke.line_cap = cap;
        self
    }

    pub fn set_line_join(&mut self, join: LineJoin) -> &mut Self {
        self.state.paint.stroke.line_join = join;
        self
    }

    /// A non-positive radius disables the shadow.
    pub fn set_shadow(&mut self, shadow: Shadow) -> &mut Self {
        self.state.paint.shadow = (shadow.radius > 0.).then_some(shadow);
        self
    }

    pub fn set_font_size(&mut self, size: f32) -> &mut Self {
        self.state.paint.font_size = size;
        self
    }

    pub fn set_font(&mut self, font: SmartString) -> &mut Self {
        self.state.paint.font = font;
        self
    }

    pub fn set_text_align(&mut self, align: TextAlign) -> &mut Self {
        self.state.paint.text_align = align;
        self
    }

    pub fn set_global_alpha(&mut self, alpha: f32) -> &mut Self {
        self.state.paint.global_alpha = alpha.clamp(0., 1.);
        self
    }

    /// Composes multiplicatively with the current global alpha.
    pub fn multiply_global_alpha(&mut self, alpha: f32) -> &mut Self {
        let current = self.state.paint.global_alpha;
        self.state.paint.global_alpha = (current * alpha).clamp(0., 1.);
        self
    }

    pub fn global_alpha(&self) -> f32 {
        self.state.paint.global_alpha
    }
}

/// Draw operations.
impl Canvas {
    pub fn draw_rect(&mut self, rect: Rect, style: FillStyle) -> &mut Self {
        self.emit_shape(Primitive::rect(rect), style);
        self
    }

    pub fn draw_round_rect(&mut self, rect: Rect, radii: CornerRadii, style: FillStyle) -> &mut Self {
        self.emit_shape(Primitive::rounded_rect(rect, radii), style);
        self
    }

    pub fn draw_oval(&mut self, bounds: Rect, style: FillStyle) -> &mut Self {
        self.emit_shape(Primitive::Oval { bounds }, style);
        self
    }

    pub fn draw_circle(&mut self, center: Vec2, radius: f32, style: FillStyle) -> &mut Self {
        self.emit_shape(Primitive::Circle { center, radius }, style);
        self
    }

    pub fn draw_arc(
        &mut self,
        bounds: Rect,
        start_degrees: f32,
        sweep_degrees: f32,
        use_center: bool,
        style: FillStyle,
    ) -> &mut Self {
        self.emit_shape(
            Primitive::Arc {
                bounds,
                start_degrees,
                sweep_degrees,
                use_center,
            },
            style,
        );
        self
    }

    pub fn draw_text(&mut self, text: SmartString, pos: Vec2, style: FillStyle) -> &mut Self {
        // Text is filled unless the caller asked for stroke only.
        let color = if style.strokes() && !style.fills() {
            self.state.paint.stroke_color
        } else {
            self.state.paint.fill_color
        };
        let paint = self.resolve_paint(color);
        let command = Command::DrawText {
            text,
            pos,
            size: self.state.paint.font_size,
            font: self.state.paint.font.clone(),
            align: self.state.paint.text_align,
            paint,
        };
        self.cmd(command);
        self
    }

    /// Floods the layer with `color` through the current global alpha.
    pub fn draw_color(&mut self, color: Srgba<u8>) -> &mut Self {
        let color = color::scale_alpha(color, self.state.paint.global_alpha);
        self.cmd(Command::Flood(color));
        self
    }

    /// Resets the layer to transparent.
    pub fn clear_color(&mut self) -> &mut Self {
        self.cmd(Command::Clear);
        self
    }

    /// Composites another layer onto this canvas. Used for both
    /// canvas-to-canvas and image draws; the bridge resolves the
    /// source handle to a layer and a destination rectangle.
    pub fn draw_layer(&mut self, source: LayerId, src: Option<Rect>, dst: Rect) -> &mut Self {
        let alpha = self.state.paint.global_alpha;
        self.cmd(Command::Blit {
            source,
            src,
            dst,
            alpha,
        });
        self
    }

    /// Blits a layer in device coordinates, bypassing the current
    /// transform and clip. Used by the overlay composite step.
    pub(crate) fn blit_device(&mut self, source: LayerId, dst: Rect) {
        self.cmd(Command::ClearClip)
            .cmd(Command::SetTransform(Affine2::IDENTITY))
            .cmd(Command::Blit {
                source,
                src: None,
                dst,
                alpha: 1.,
            });
        self.emit_transform();
        self.emit_clip();
    }

    fn emit_shape(&mut self, primitive: Primitive, style: FillStyle) {
        if style.fills() {
            let paint = self.resolve_paint(self.state.paint.fill_color);
            self.cmd(Command::FillPrimitive { primitive, paint });
        }
        if style.strokes() {
            let paint = self.resolve_paint(self.state.paint.stroke_color);
            let stroke = self.state.paint.stroke;
            self.cmd(Command::StrokePrimitive {
                primitive,
                paint,
                stroke,
            });
        }
    }

    fn resolve_paint(&self, color: Srgba<u8>) -> Paint {
        Paint {
            color: color::scale_alpha(color, self.state.paint.global_alpha),
            shadow: self.state.paint.shadow,
        }
    }
}

/// Command plumbing.
impl Canvas {
    pub fn has_commands(&self) -> bool {
        !self.commands.is_empty()
    }

    /// Renders the accumulated commands onto the backing layer and
    /// clears the buffer. The canvas state survives; the next buffer
    /// is primed with the current transform and clip since backend
    /// stream state resets per call.
    pub fn flush(&mut self, backend: &mut impl Backend) {
        if self.commands.is_empty() {
            return;
        }
        backend.render_to_layer(self.layer, self.commands.to_stream());
        self.commands.clear();
        if self.state.transform != Affine2::IDENTITY {
            self.emit_transform();
        }
        if self.state.clip.is_some() {
            self.emit_clip();
        }
    }

    fn emit_transform(&mut self) {
        let transform = self.state.transform;
        self.cmd(Command::SetTransform(transform));
    }

    fn emit_clip(&mut self) {
        match self.state.clip {
            Some(clip) => self.cmd(Command::SetClip(clip)),
            None => self.cmd(Command::ClearClip),
        };
    }

    fn cmd(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    #[cfg(test)]
    fn take_commands(&mut self) -> Vec<Command> {
        let commands = self.commands.to_stream().cloned().collect();
        self.commands.clear();
        commands
    }
}
