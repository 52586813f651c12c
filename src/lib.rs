//! A bridge between an asynchronous scripting control plane and a
//! rendering thread. Scripts submit batched drawing commands over a
//! compact text protocol; the bridge coalesces them per animation
//! frame and executes them against handle-addressed surfaces,
//! canvases and images on a pluggable [`Backend`].

mod backend;
mod bridge;
mod canvas;
pub mod color;
mod command;
mod dispatch;
mod host;
mod image;
mod notify;
mod overlay;
mod primitive;
mod rect;
mod registry;
mod surface;
mod types;
pub mod wire;

pub use backend::{Backend, LayerId, TextMeasurer};
pub use bridge::{Bridge, BridgeHandle};
pub use canvas::{Canvas, CanvasKind};
pub use command::{Clip, Command, CommandStream};
pub use dispatch::{BatchDispatcher, BatchQueue};
pub use host::Host;
pub use image::{DecodedImage, Image, ImageEvent, ImageLoadError, LoadedImage};
pub use notify::Notifier;
pub use overlay::{OverlayBounds, OverlayCapture};
pub use primitive::Primitive;
pub use rect::Rect;
pub use registry::Registry;
use smartstring::LazyCompact;
pub use surface::Surface;
pub use types::{
    CornerRadii, FillStyle, LineCap, LineJoin, Paint, Shadow, StretchInsets, StrokeSettings,
    TextAlign,
};
pub use wire::{Batch, DecodeError, Op, Opcode};

pub use glam;
pub use palette::Srgba;

pub type SmartString = smartstring::SmartString<LazyCompact>;
