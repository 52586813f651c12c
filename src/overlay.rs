use ahash::AHashMap;

use crate::Rect;

/// Regions of host-rendered content that must be captured into the
/// canvas composite on the next unlock-and-post.
///
/// Keyed by an opaque view identifier. The union of all active
/// regions bounds a single capture of the host's visible content,
/// which is blitted once rather than per region.
#[derive(Debug, Default)]
pub struct OverlayBounds {
    bounds: AHashMap<u32, Rect>,
}

impl OverlayBounds {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or moves an overlay region.
    pub fn show(&mut self, id: u32, rect: Rect) {
        self.bounds.insert(id, rect);
    }

    pub fn hide(&mut self, id: u32) {
        self.bounds.remove(&id);
    }

    pub fn is_empty(&self) -> bool {
        self.bounds.is_empty()
    }

    /// Bounding union of all active regions, or `None` when there is
    /// nothing to capture.
    pub fn union(&self) -> Option<Rect> {
        let mut union = Rect::default();
        for &rect in self.bounds.values() {
            union = union.union(rect);
        }
        (!union.is_empty()).then_some(union)
    }

    pub fn clear(&mut self) {
        self.bounds.clear();
    }
}

/// Host-captured pixels for the overlay union region.
#[derive(Debug, Clone)]
pub struct OverlayCapture {
    pub width: u32,
    pub height: u32,
    /// RGBA8, row-major.
    pub rgba: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn show_upserts() {
        let mut overlays = OverlayBounds::new();
        overlays.show(1, Rect::from_ltwh(0., 0., 10., 10.));
        overlays.show(1, Rect::from_ltwh(5., 5., 10., 10.));
        assert_eq!(overlays.union(), Some(Rect::from_ltwh(5., 5., 10., 10.)));
    }

    #[test]
    fn union_spans_all_regions() {
        let mut overlays = OverlayBounds::new();
        overlays.show(1, Rect::from_ltwh(0., 0., 10., 10.));
        overlays.show(2, Rect::from_ltwh(20., 0., 10., 30.));
        assert_eq!(overlays.union(), Some(Rect::from_ltrb(0., 0., 30., 30.)));
        overlays.hide(2);
        assert_eq!(overlays.union(), Some(Rect::from_ltwh(0., 0., 10., 10.)));
    }

    #[test]
    fn empty_after_hide_all() {
        let mut overlays = OverlayBounds::new();
        overlays.show(3, Rect::from_ltwh(0., 0., 1., 1.));
        overlays.hide(3);
        assert!(overlays.is_empty());
        assert_eq!(overlays.union(), None);
    }
}
