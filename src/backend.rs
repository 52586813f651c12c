//! The rasterization seam.
//!
//! The bridge owns all drawing state but never touches pixels;
//! a [`Backend`] implementation owns the pixel layers and executes
//! resolved [`CommandStream`](crate::CommandStream)s onto them.

use slotmap::new_key_type;

use crate::{command::CommandStream, Rect};

new_key_type! {
    /// Key of a pixel layer owned by the backend.
    pub struct LayerId;
}

/// A drawing backend.
///
/// Layers back surfaces, offscreen canvases, decoded images and
/// transient overlay captures alike; the bridge only distinguishes
/// them by who holds the `LayerId`.
pub trait Backend: 'static {
    /// Creates a transparent layer of the given size in pixels.
    fn create_layer(&mut self, width: u32, height: u32) -> LayerId;

    /// Creates a layer initialized with RGBA8 pixel data
    /// (`width * height * 4` bytes, row-major).
    fn upload_layer(&mut self, width: u32, height: u32, rgba: &[u8]) -> LayerId;

    /// Releases a layer. Releasing an already-released id is a no-op.
    fn destroy_layer(&mut self, layer: LayerId);

    fn layer_size(&self, layer: LayerId) -> Option<(u32, u32)>;

    /// Executes a command stream onto a layer. Stream state
    /// (transform, clip) starts at identity/unclipped for every call.
    fn render_to_layer(&mut self, layer: LayerId, commands: CommandStream);

    /// Reads back a region of a layer as packed 0xAARRGGBB pixels,
    /// row-major. Out-of-bounds parts of `region` are clamped away.
    fn read_pixels(&self, layer: LayerId, region: Rect) -> Vec<u32>;
}

/// Shared scratch state for synchronous text-width queries.
///
/// `measure_text` may be called from any thread while the rendering
/// thread is busy, so the bridge guards the measurer with a mutex
/// rather than routing the query through the batch path.
pub trait TextMeasurer: Send {
    fn set_size(&mut self, size: f32);
    fn measure(&mut self, text: &str) -> f32;
}
