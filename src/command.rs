use std::slice;

use glam::{Affine2, Vec2};
use palette::Srgba;

use crate::{
    backend::LayerId,
    primitive::Primitive,
    types::{CornerRadii, Paint, StrokeSettings, TextAlign},
    Rect, SmartString,
};

/// A clip region in device space: a rectangle with optional
/// corner rounding.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Clip {
    pub region: Rect,
    pub radii: CornerRadii,
}

/// A low-level command given to the backend renderer.
///
/// A draw operation involves a stream of `Command`s. Commands are
/// fully resolved: they carry the final transform, clip and paint,
/// so a backend can execute a stream with no knowledge of canvas
/// state. `SetTransform`/`SetClip` are stream state; everything else
/// is one atomic draw.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Sets the transform applied to subsequent draws.
    SetTransform(Affine2),
    /// Sets the clip applied to subsequent draws. The clip is already
    /// in device space and is not affected by `SetTransform`.
    SetClip(Clip),
    ClearClip,

    /// Floods the whole layer with a color, ignoring transform
    /// but honoring the clip.
    Flood(Srgba<u8>),
    /// Resets the whole layer to transparent.
    Clear,

    FillPrimitive {
        primitive: Primitive,
        paint: Paint,
    },
    StrokePrimitive {
        primitive: Primitive,
        paint: Paint,
        stroke: StrokeSettings,
    },
    DrawText {
        text: SmartString,
        pos: Vec2,
        size: f32,
        font: SmartString,
        align: TextAlign,
        paint: Paint,
    },
    /// Copies a region of another layer onto this one.
    /// `src` of `None` means the whole source layer.
    Blit {
        source: LayerId,
        src: Option<Rect>,
        dst: Rect,
        alpha: f32,
    },
}

/// An immutable stream of `Command`s.
#[derive(Debug, Clone)]
pub struct CommandStream<'a> {
    commands: slice::Iter<'a, Command>,
}

impl<'a> Iterator for CommandStream<'a> {
    type Item = &'a Command;

    fn next(&mut self) -> Option<Self::Item> {
        self.commands.next()
    }
}

/// A buffer of `Command`s.
#[derive(Debug, Default)]
pub(crate) struct CommandBuffer {
    commands: Vec<Command>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, command: Command) -> &mut Self {
        self.commands.push(command);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn to_stream(&self) -> CommandStream {
        CommandStream {
            commands: self.commands.iter(),
        }
    }

    pub fn clear(&mut self) {
        self.commands.clear()
    }
}
