use crate::{backend::LayerId, Rect};

/// An on-screen drawable region.
///
/// Bounds are in host coordinate space; the backing layer matches the
/// bound size in pixels. At most one canvas is locked against a
/// surface at a time, and only for the duration of one frame's
/// drawing (see the lock/unlock-and-post protocol on the bridge).
#[derive(Debug)]
pub struct Surface {
    bounds: Rect,
    layer: LayerId,
    locked: Option<u32>,
}

impl Surface {
    pub fn new(bounds: Rect, layer: LayerId) -> Self {
        Self {
            bounds,
            layer,
            locked: None,
        }
    }

    pub fn bounds(&self) -> Rect {
        self.bounds
    }

    pub fn layer(&self) -> LayerId {
        self.layer
    }

    pub fn locked_canvas(&self) -> Option<u32> {
        self.locked
    }

    pub(crate) fn set_bounds(&mut self, bounds: Rect, layer: LayerId) {
        self.bounds = bounds;
        self.layer = layer;
    }

    /// Associates a locked canvas for the current frame. Locking
    /// twice without an unlock overrides the prior association.
    pub(crate) fn lock(&mut self, canvas: u32) {
        if let Some(prior) = self.locked.replace(canvas) {
            log::warn!("surface already locked by canvas {prior}, overriding for this frame");
        }
    }

    pub(crate) fn unlock(&mut self) {
        self.locked = None;
    }

    /// Pixel dimensions for the backing layer, clamped to at least 1.
    pub(crate) fn layer_extent(bounds: Rect) -> (u32, u32) {
        (
            (bounds.size.x.max(1.)).ceil() as u32,
            (bounds.size.y.max(1.)).ceil() as u32,
        )
    }
}
