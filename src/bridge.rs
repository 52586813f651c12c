//! The composition root: owns the registries, the dispatcher and the
//! backend, and executes decoded operations on the rendering thread.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Weak,
};

use flume::{Receiver, Sender};
use parking_lot::Mutex;

use crate::{
    backend::{Backend, LayerId, TextMeasurer},
    canvas::{Canvas, CanvasKind},
    dispatch::{BatchDispatcher, BatchQueue},
    host::Host,
    image::{Image, ImageEvent, LoadedImage},
    notify::Notifier,
    overlay::OverlayBounds,
    registry::Registry,
    surface::Surface,
    wire::{self, Op},
    Rect,
};

/// Bridges an asynchronous scripting control plane to one rendering
/// execution context.
///
/// All mutation happens on the rendering thread through
/// [`tick`](Bridge::tick) and the other `&mut self` entry points.
/// Producers interact through a [`BridgeHandle`], which is the only
/// surface that is safe to use from any thread.
pub struct Bridge<B: Backend> {
    backend: B,
    host: Weak<dyn Host>,
    notifier: Notifier,
    dispatcher: BatchDispatcher,
    generation: Arc<AtomicU64>,
    measurer: Arc<Mutex<Box<dyn TextMeasurer>>>,
    surfaces: Registry<Surface>,
    canvases: Registry<Canvas>,
    images: Registry<Image>,
    overlays: OverlayBounds,
    image_events: Sender<ImageEvent>,
    image_results: Receiver<ImageEvent>,
}

impl<B: Backend> Bridge<B> {
    pub fn new(backend: B, measurer: Box<dyn TextMeasurer>, host: Weak<dyn Host>) -> Self {
        let (image_events, image_results) = flume::unbounded();
        Self {
            backend,
            notifier: Notifier::new(host.clone()),
            host,
            dispatcher: BatchDispatcher::new(),
            generation: Arc::new(AtomicU64::new(0)),
            measurer: Arc::new(Mutex::new(measurer)),
            surfaces: Registry::new("surface"),
            canvases: Registry::new("canvas"),
            images: Registry::new("image"),
            overlays: OverlayBounds::new(),
            image_events,
            image_results,
        }
    }

    /// Creates a clonable producer-side handle.
    pub fn handle(&self) -> BridgeHandle {
        BridgeHandle {
            queue: Arc::clone(self.dispatcher.queue()),
            generation: Arc::clone(&self.generation),
            measurer: Arc::clone(&self.measurer),
            host: self.host.clone(),
        }
    }

    /// Runs one scheduling tick: drains image-load results, selects a
    /// batch per the coalescing policy and executes it. Call from the
    /// rendering thread when the host services a frame request.
    pub fn tick(&mut self) {
        self.pump_image_events();

        let generation = self.generation.load(Ordering::Acquire);
        if let Some(batch) = self.dispatcher.next_batch(generation) {
            for op in &batch.ops {
                self.run_op(op);
            }
        }

        // Drain may have stopped at a cannot-skip batch; keep the
        // leftovers moving without waiting for a new submission.
        if self.dispatcher.has_pending() && self.dispatcher.queue().request_tick() {
            if let Some(host) = self.host.upgrade() {
                host.request_frame();
            }
        }
    }

    /// Full reset: atomically invalidates every outstanding handle,
    /// releases all resources and re-establishes baseline shared
    /// state. Must run on the rendering thread.
    pub fn init_runtime(&mut self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.dispatcher.reset();
        self.overlays.clear();

        let Self {
            backend,
            surfaces,
            canvases,
            images,
            ..
        } = self;
        for (_, surface) in surfaces.drain() {
            backend.destroy_layer(surface.layer());
        }
        for (_, canvas) in canvases.drain() {
            if canvas.owns_layer() {
                backend.destroy_layer(canvas.layer());
            }
        }
        for (_, image) in images.drain() {
            if let Some(layer) = image.layer() {
                backend.destroy_layer(layer);
            }
        }

        self.notifier.text_measure_ready();
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn surface(&self, surface: u32) -> Option<&Surface> {
        self.surfaces.get(surface)
    }

    pub fn canvas(&self, canvas: u32) -> Option<&Canvas> {
        self.canvases.get(canvas)
    }

    pub fn image(&self, image: u32) -> Option<&Image> {
        self.images.get(image)
    }

    /// Registers or moves a host-overlay region captured into the
    /// composite on the next unlock-and-post.
    pub fn show_overlay_bound(&mut self, id: u32, rect: Rect) {
        self.overlays.show(id, rect);
    }

    pub fn hide_overlay_bound(&mut self, id: u32) {
        self.overlays.hide(id);
    }
}

/// Operation execution. One decoded command at a time; a missing
/// handle aborts that command only, never the batch.
impl<B: Backend> Bridge<B> {
    fn run_op(&mut self, op: &Op) {
        match op {
            Op::CreateSurface { surface, bounds } => self.create_surface(*surface, *bounds),
            Op::SurfaceBoundChange { surface, bounds } => self.surface_bound_change(*surface, *bounds),
            Op::LockCanvas {
                surface,
                canvas,
                region,
            } => self.lock_canvas(*surface, *canvas, *region),
            Op::UnlockCanvas { surface, canvas } => self.unlock_canvas(*surface, *canvas),
            Op::CreateCanvas {
                canvas,
                width,
                height,
            } => self.create_canvas(*canvas, *width, *height),
            Op::RecycleCanvas { canvas } => self.recycle_canvas(*canvas),

            Op::Translate {
                canvas,
                translation,
            } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "translate") {
                    canvas.translate(*translation);
                }
            }
            Op::Scale { canvas, scale } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "scale") {
                    canvas.scale(*scale);
                }
            }
            Op::Rotate { canvas, degrees } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "rotate") {
                    canvas.rotate_degrees(*degrees);
                }
            }
            Op::Concat { canvas, matrix } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "concat") {
                    canvas.concat(*matrix);
                }
            }
            Op::Save { canvas } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "save") {
                    canvas.save();
                }
            }
            Op::Restore { canvas } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "restore") {
                    canvas.restore();
                }
            }
            Op::ClipRect { canvas, rect } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "clipRect") {
                    canvas.clip_rect(*rect);
                }
            }
            Op::ClipRoundRect {
                canvas,
                rect,
                radii,
            } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "clipRoundRect") {
                    canvas.clip_round_rect(*rect, *radii);
                }
            }

            Op::SetFillColor {
                canvas,
                color,
                style,
            } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "setFillColor") {
                    canvas.set_color(*color, *style);
                }
            }
            Op::MultiplyGlobalAlpha { canvas, alpha } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "multiplyGlobalAlpha") {
                    canvas.multiply_global_alpha(*alpha);
                }
            }
            Op::SetGlobalAlpha { canvas, alpha } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "setGlobalAlpha") {
                    canvas.set_global_alpha(*alpha);
                }
            }
            Op::SetTextAlign { canvas, align } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "setTextAlign") {
                    canvas.set_text_align(*align);
                }
            }
            Op::SetLineWidth { canvas, width } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "setLineWidth") {
                    canvas.set_line_width(*width);
                }
            }
            Op::SetLineCap { canvas, cap } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "setLineCap") {
                    canvas.set_line_cap(*cap);
                }
            }
            Op::SetLineJoin { canvas, join } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "setLineJoin") {
                    canvas.set_line_join(*join);
                }
            }
            Op::SetShadow { canvas, shadow } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "setShadow") {
                    canvas.set_shadow(*shadow);
                }
            }
            Op::SetFontSize { canvas, size } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "setFontSize") {
                    canvas.set_font_size(*size);
                }
            }
            Op::SetFont { canvas, font } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "setFont") {
                    canvas.set_font(font.clone());
                }
            }

            Op::DrawColor { canvas, color } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "drawColor") {
                    canvas.draw_color(*color);
                }
            }
            Op::ClearColor { canvas } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "clearColor") {
                    canvas.clear_color();
                }
            }
            Op::DrawRect {
                canvas,
                rect,
                style,
            } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "drawRect") {
                    canvas.draw_rect(*rect, *style);
                }
            }
            Op::DrawRoundRect {
                canvas,
                rect,
                radii,
                style,
            } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "drawRoundRect") {
                    canvas.draw_round_rect(*rect, *radii, *style);
                }
            }
            Op::DrawOval {
                canvas,
                bounds,
                style,
            } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "drawOval") {
                    canvas.draw_oval(*bounds, *style);
                }
            }
            Op::DrawCircle {
                canvas,
                center,
                radius,
                style,
            } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "drawCircle") {
                    canvas.draw_circle(*center, *radius, *style);
                }
            }
            Op::DrawArc {
                canvas,
                bounds,
                start_degrees,
                sweep_degrees,
                use_center,
                style,
            } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "drawArc") {
                    canvas.draw_arc(*bounds, *start_degrees, *sweep_degrees, *use_center, *style);
                }
            }
            Op::DrawText {
                canvas,
                text,
                pos,
                style,
            } => {
                if let Some(canvas) = self.canvas_mut(*canvas, "drawText") {
                    canvas.draw_text(text.clone(), *pos, *style);
                }
            }
            Op::DrawCanvas {
                canvas,
                source,
                offset,
            } => self.draw_canvas(*canvas, *source, *offset),

            Op::DrawImage { canvas, image, pos } => {
                if let Some((layer, width, height)) = self.loaded_image(*image, "drawImage") {
                    let dst = Rect::from_ltwh(pos.x, pos.y, width as f32, height as f32);
                    if let Some(canvas) = self.canvas_mut(*canvas, "drawImage") {
                        canvas.draw_layer(layer, None, dst);
                    }
                }
            }
            Op::DrawImageDst { canvas, image, dst } => {
                if let Some((layer, _, _)) = self.loaded_image(*image, "drawImage") {
                    if let Some(canvas) = self.canvas_mut(*canvas, "drawImage") {
                        canvas.draw_layer(layer, None, *dst);
                    }
                }
            }
            Op::DrawImageSrcDst {
                canvas,
                image,
                src,
                dst,
            } => {
                if let Some((layer, _, _)) = self.loaded_image(*image, "drawImage") {
                    if let Some(canvas) = self.canvas_mut(*canvas, "drawImage") {
                        canvas.draw_layer(layer, Some(*src), *dst);
                    }
                }
            }

            Op::CreateImage { image } => self.create_image(*image),
            Op::LoadImage { image, src } => self.load_image(*image, src),
            Op::RecycleImage { image } => self.recycle_image(*image),
            Op::GetPixels {
                image,
                callback,
                region,
            } => self.get_pixels(*image, *callback, *region),
        }
    }

    fn canvas_mut(&mut self, canvas: u32, op_name: &str) -> Option<&mut Canvas> {
        let found = self.canvases.get_mut(canvas);
        if found.is_none() {
            log::warn!("canvas {canvas} not found ({op_name})");
        }
        found
    }

    fn loaded_image(&self, image: u32, op_name: &str) -> Option<(LayerId, u32, u32)> {
        let Some(entry) = self.images.get(image) else {
            log::warn!("image {image} not found ({op_name})");
            return None;
        };
        let Some(loaded) = entry.loaded() else {
            log::debug!("image {image} not loaded yet ({op_name})");
            return None;
        };
        Some((loaded.layer, loaded.width, loaded.height))
    }
}

/// Surface lifecycle.
impl<B: Backend> Bridge<B> {
    fn create_surface(&mut self, surface: u32, bounds: Rect) {
        let (width, height) = Surface::layer_extent(bounds);
        let layer = self.backend.create_layer(width, height);
        if let Some(old) = self.surfaces.put(surface, Surface::new(bounds, layer)) {
            self.backend.destroy_layer(old.layer());
        }
        self.notifier.surface_ready(surface);
    }

    fn surface_bound_change(&mut self, surface: u32, bounds: Rect) {
        let Self {
            backend, surfaces, ..
        } = self;
        // A stale bound change arriving after teardown must not take
        // down the rendering thread.
        let Some(entry) = surfaces.get_mut(surface) else {
            log::warn!("surface {surface} not found (onSurfaceBoundChange)");
            return;
        };
        let new_extent = Surface::layer_extent(bounds);
        if new_extent != Surface::layer_extent(entry.bounds()) {
            backend.destroy_layer(entry.layer());
            let layer = backend.create_layer(new_extent.0, new_extent.1);
            entry.set_bounds(bounds, layer);
        } else {
            let layer = entry.layer();
            entry.set_bounds(bounds, layer);
        }
    }

    fn lock_canvas(&mut self, surface: u32, canvas: u32, region: Rect) {
        let Some(entry) = self.surfaces.get_mut(surface) else {
            log::warn!("surface {surface} not found (lockCanvas)");
            return;
        };
        let mut locked = Canvas::new(entry.layer(), CanvasKind::Locked { surface });
        if !region.is_empty() {
            locked.clip_rect(region);
        }
        entry.lock(canvas);
        if let Some(old) = self.canvases.put(canvas, locked) {
            self.release_canvas(old);
        }
    }

    fn unlock_canvas(&mut self, surface: u32, canvas: u32) {
        let unlocked = self.canvases.remove(canvas);

        if let Some(entry) = self.surfaces.get_mut(surface) {
            entry.unlock();
        } else {
            log::warn!("surface {surface} not found (unlockCanvasAndPost)");
        }

        let Some(mut unlocked) = unlocked else {
            log::warn!("canvas {canvas} not found (unlockCanvasAndPost)");
            return;
        };

        let overlay_layer = self.stage_overlay_composite(&mut unlocked);
        unlocked.flush(&mut self.backend);
        if let Some(layer) = overlay_layer {
            self.backend.destroy_layer(layer);
        }
        self.release_canvas(unlocked);
    }

    /// Captures the union of active overlay bounds through the host
    /// and queues a device-space blit at the end of the canvas's
    /// stream. Returns the transient capture layer for teardown
    /// after the flush.
    fn stage_overlay_composite(&mut self, canvas: &mut Canvas) -> Option<LayerId> {
        let region = self.overlays.union()?;
        let host = self.host.upgrade()?;
        let capture = host.capture_overlay(region)?;
        let layer = self
            .backend
            .upload_layer(capture.width, capture.height, &capture.rgba);
        canvas.blit_device(layer, region);
        Some(layer)
    }
}

/// Offscreen canvases.
impl<B: Backend> Bridge<B> {
    fn create_canvas(&mut self, canvas: u32, width: f32, height: f32) {
        let layer = self
            .backend
            .create_layer(width.max(1.) as u32, height.max(1.) as u32);
        if let Some(old) = self.canvases.put(canvas, Canvas::new(layer, CanvasKind::Offscreen)) {
            self.release_canvas(old);
        }
    }

    fn recycle_canvas(&mut self, canvas: u32) {
        match self.canvases.remove(canvas) {
            Some(old) => self.release_canvas(old),
            None => log::warn!("canvas {canvas} not found (recycleCanvas)"),
        }
    }

    fn release_canvas(&mut self, canvas: Canvas) {
        if canvas.owns_layer() {
            self.backend.destroy_layer(canvas.layer());
        }
    }

    fn draw_canvas(&mut self, canvas: u32, source: u32, offset: glam::Vec2) {
        // Flush the source so its pixels are current, then composite
        // its layer. Taking it out of the registry sidesteps aliasing
        // when source == canvas.
        let Some(mut src) = self.canvases.remove(source) else {
            log::warn!("canvas {source} not found (drawCanvas source)");
            return;
        };
        src.flush(&mut self.backend);
        let src_layer = src.layer();
        let size = self.backend.layer_size(src_layer);
        self.canvases.restore(source, src);

        let Some((width, height)) = size else {
            log::warn!("canvas {source} has no backing layer (drawCanvas)");
            return;
        };
        let dst = Rect::from_ltwh(offset.x, offset.y, width as f32, height as f32);
        if let Some(dst_canvas) = self.canvas_mut(canvas, "drawCanvas") {
            dst_canvas.draw_layer(src_layer, None, dst);
        }
    }
}

/// Images.
impl<B: Backend> Bridge<B> {
    fn create_image(&mut self, image: u32) {
        if let Some(old) = self.images.put(image, Image::Pending) {
            if let Some(layer) = old.layer() {
                self.backend.destroy_layer(layer);
            }
        }
    }

    fn load_image(&mut self, image: u32, src: &str) {
        let Some(entry) = self.images.get_mut(image) else {
            log::warn!("image {image} not found (loadImage)");
            return;
        };
        // A reload releases the previous layer up front.
        if let Some(layer) = entry.layer() {
            self.backend.destroy_layer(layer);
        }
        *entry = Image::Pending;
        if let Some(host) = self.host.upgrade() {
            host.load_image(image, src, self.image_events.clone());
        }
    }

    fn recycle_image(&mut self, image: u32) {
        match self.images.remove(image) {
            Some(old) => {
                if let Some(layer) = old.layer() {
                    self.backend.destroy_layer(layer);
                }
            }
            None => log::warn!("image {image} not found (recycleImage)"),
        }
    }

    fn get_pixels(&self, image: u32, callback: u32, region: Rect) {
        let Some(entry) = self.images.get(image) else {
            log::warn!("image {image} not found (getPixels)");
            return;
        };
        // A pending or failed load reports an empty result rather
        // than blocking or erroring.
        let pixels = match entry.loaded() {
            Some(loaded) => {
                let bounds = Rect::from_ltwh(0., 0., loaded.width as f32, loaded.height as f32);
                self.backend.read_pixels(loaded.layer, region.intersect(bounds))
            }
            None => Vec::new(),
        };
        self.notifier.image_pixels(image, callback, &pixels);
    }

    fn pump_image_events(&mut self) {
        let events: Vec<ImageEvent> = self.image_results.try_iter().collect();
        for event in events {
            self.finish_image_load(event);
        }
    }

    fn finish_image_load(&mut self, event: ImageEvent) {
        let Self {
            backend,
            images,
            notifier,
            ..
        } = self;
        let Some(entry) = images.get_mut(event.image) else {
            // Recycled (or reset) while the load was in flight.
            log::debug!("dropping load result for unknown image {}", event.image);
            return;
        };
        match event.result {
            Ok(decoded) => {
                if let Some(old) = entry.layer() {
                    backend.destroy_layer(old);
                }
                let layer = backend.upload_layer(decoded.width, decoded.height, &decoded.rgba);
                notifier.image_load_finish(
                    event.image,
                    decoded.width,
                    decoded.height,
                    decoded.insets.as_ref(),
                );
                *entry = Image::Loaded(LoadedImage {
                    layer,
                    width: decoded.width,
                    height: decoded.height,
                    insets: decoded.insets,
                });
            }
            Err(err) => {
                log::warn!("image {} load failed: {err}", event.image);
                *entry = Image::Error;
                notifier.image_load_error(event.image);
            }
        }
    }
}

/// The producer-side handle: the only part of the bridge that may be
/// used from arbitrary threads. Cloning is cheap.
#[derive(Clone)]
pub struct BridgeHandle {
    queue: Arc<BatchQueue>,
    generation: Arc<AtomicU64>,
    measurer: Arc<Mutex<Box<dyn TextMeasurer>>>,
    host: Weak<dyn Host>,
}

impl BridgeHandle {
    /// Decodes and enqueues one command batch, then requests a
    /// scheduling tick unless one is already outstanding. Never
    /// blocks on the rendering thread.
    pub fn submit_batch(&self, text: &str) {
        let generation = self.generation.load(Ordering::Acquire);
        let batch = wire::decode_batch(text, generation);
        if self.queue.submit(batch) {
            if let Some(host) = self.host.upgrade() {
                host.request_frame();
            }
        }
    }

    /// Synchronous text-width query. Safe to call from any thread;
    /// the shared scratch state is mutex-guarded so it cannot race
    /// the rendering thread.
    pub fn measure_text(&self, text: &str, size: f32) -> f32 {
        let mut measurer = self.measurer.lock();
        measurer.set_size(size);
        measurer.measure(text)
    }
}
