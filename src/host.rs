use flume::Sender;

use crate::{image::ImageEvent, overlay::OverlayCapture, Rect};

/// The embedding host of a bridge.
///
/// The bridge holds a non-owning reference and checks liveness
/// before each use; a dropped host silently swallows egress.
pub trait Host: Send + Sync + 'static {
    /// Executes a textual invocation in the scripting environment.
    /// Implementations must marshal the call onto the UI execution
    /// context if invoked from elsewhere.
    fn eval_script(&self, script: &str);

    /// Schedules one [`Bridge::tick`](crate::Bridge::tick) at the
    /// next animation-frame opportunity on the rendering thread.
    /// The bridge coalesces its requests; the host may assume at
    /// most one outstanding request.
    fn request_frame(&self);

    /// Captures the host-rendered content covering `region` (host
    /// coordinate space) as RGBA pixels, or `None` when there is
    /// nothing to capture.
    fn capture_overlay(&self, region: Rect) -> Option<OverlayCapture>;

    /// Starts fetching and decoding an image source. The result is
    /// delivered through `events`; the bridge drains the channel on
    /// the rendering thread once per tick.
    fn load_image(&self, image: u32, src: &str, events: Sender<ImageEvent>);
}
