//! Outbound notifications to the scripting side.
//!
//! Fire and forget: notifications are formatted as textual
//! invocations and handed to the host for evaluation. There is no
//! reply path and no error path; a dead host drops them.

use std::fmt::Display;
use std::sync::Weak;

use crate::{host::Host, types::StretchInsets};

/// Formats and sends egress invocations through a weak host
/// back-reference.
pub struct Notifier {
    host: Weak<dyn Host>,
}

impl Notifier {
    pub fn new(host: Weak<dyn Host>) -> Self {
        Self { host }
    }

    fn send(&self, script: String) {
        if let Some(host) = self.host.upgrade() {
            host.eval_script(&script);
        }
    }

    pub fn surface_ready(&self, surface: u32) {
        self.send(format!("easel.native.Surface.notifyReady({surface});"));
    }

    pub fn image_load_finish(
        &self,
        image: u32,
        width: u32,
        height: u32,
        insets: Option<&StretchInsets>,
    ) {
        let script = match insets {
            None => format!("easel.native.Image.notifyLoadFinish({image}, {width}, {height});"),
            Some(insets) => format!(
                "easel.native.Image.notifyLoadFinish({image}, {width}, {height}, {}, {}, {}, {});",
                fmt_array(&insets.left),
                fmt_array(&insets.top),
                fmt_array(&insets.right),
                fmt_array(&insets.bottom),
            ),
        };
        self.send(script);
    }

    pub fn image_load_error(&self, image: u32) {
        self.send(format!("easel.native.Image.notifyLoadError({image});"));
    }

    /// Pixel read-back result as a flat 0xAARRGGBB array.
    pub fn image_pixels(&self, image: u32, callback: u32, pixels: &[u32]) {
        self.send(format!(
            "easel.native.Image.notifyGetPixels({image}, {callback}, {});",
            fmt_array(pixels)
        ));
    }

    /// Navigation-history position change of a host-managed view.
    pub fn history_change(&self, view: u32, index: usize, size: usize) {
        self.send(format!(
            "easel.native.View.notifyHistoryChange({view}, {index}, {size});"
        ));
    }

    /// Baseline text-measurement state is (re-)established; sent after
    /// a full runtime reset.
    pub fn text_measure_ready(&self) {
        self.send("easel.native.TextMeasure.ready();".to_owned());
    }
}

fn fmt_array<T: Display>(items: &[T]) -> String {
    let mut out = String::with_capacity(2 + items.len() * 4);
    out.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&item.to_string());
    }
    out.push(']');
    out
}
