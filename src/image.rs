//! Asynchronously loaded pixel resources.
//!
//! The bridge never decodes or fetches anything itself: the host's
//! loader delivers decoded RGBA through a channel, and the rendering
//! thread drains it once per tick.

use crate::{backend::LayerId, types::StretchInsets, SmartString};

/// Load state of an image handle.
#[derive(Debug)]
pub enum Image {
    /// Created (or load requested) but nothing delivered yet.
    Pending,
    Loaded(LoadedImage),
    /// The loader reported a failure. Sticky until recycled.
    Error,
}

impl Image {
    pub fn loaded(&self) -> Option<&LoadedImage> {
        match self {
            Image::Loaded(loaded) => Some(loaded),
            _ => None,
        }
    }

    /// The backing layer, if any, for teardown.
    pub fn layer(&self) -> Option<LayerId> {
        self.loaded().map(|loaded| loaded.layer)
    }
}

#[derive(Debug)]
pub struct LoadedImage {
    pub layer: LayerId,
    pub width: u32,
    pub height: u32,
    pub insets: Option<StretchInsets>,
}

/// Decoded pixels delivered by the host-side loader.
#[derive(Debug, Clone)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major, `width * height * 4` bytes.
    pub rgba: Vec<u8>,
    pub insets: Option<StretchInsets>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum ImageLoadError {
    #[error("failed to fetch image from {0}")]
    Fetch(SmartString),
    #[error("failed to decode image from {0}")]
    Decode(SmartString),
}

/// One completed load attempt, sent from the loader to the
/// rendering thread.
#[derive(Debug)]
pub struct ImageEvent {
    pub image: u32,
    pub result: Result<DecodedImage, ImageLoadError>,
}
