//! End-to-end tests driving a bridge through the wire protocol with a
//! recording backend and host.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Weak,
};

use easel::{
    Backend, Bridge, Command, CommandStream, DecodedImage, Host, ImageEvent, LayerId,
    OverlayCapture, Rect, TextMeasurer,
};
use parking_lot::Mutex;
use slotmap::SlotMap;

struct LayerData {
    width: u32,
    height: u32,
}

/// Records every layer operation and rendered command stream.
#[derive(Default)]
struct TestBackend {
    layers: SlotMap<LayerId, LayerData>,
    rendered: Vec<(LayerId, Vec<Command>)>,
}

impl Backend for TestBackend {
    fn create_layer(&mut self, width: u32, height: u32) -> LayerId {
        self.layers.insert(LayerData { width, height })
    }

    fn upload_layer(&mut self, width: u32, height: u32, rgba: &[u8]) -> LayerId {
        assert_eq!(rgba.len(), (width * height * 4) as usize);
        self.layers.insert(LayerData { width, height })
    }

    fn destroy_layer(&mut self, layer: LayerId) {
        self.layers.remove(layer);
    }

    fn layer_size(&self, layer: LayerId) -> Option<(u32, u32)> {
        self.layers.get(layer).map(|data| (data.width, data.height))
    }

    fn render_to_layer(&mut self, layer: LayerId, commands: CommandStream) {
        self.rendered.push((layer, commands.cloned().collect()));
    }

    fn read_pixels(&self, _layer: LayerId, region: Rect) -> Vec<u32> {
        let pixels = (region.size.x as usize) * (region.size.y as usize);
        vec![0xFF112233; pixels]
    }
}

#[derive(Default)]
struct TestHost {
    scripts: Mutex<Vec<String>>,
    frame_requests: AtomicUsize,
    overlay_pixels: bool,
    loads: Mutex<Vec<(u32, String, flume::Sender<ImageEvent>)>>,
}

impl Host for TestHost {
    fn eval_script(&self, script: &str) {
        self.scripts.lock().push(script.to_owned());
    }

    fn request_frame(&self) {
        self.frame_requests.fetch_add(1, Ordering::SeqCst);
    }

    fn capture_overlay(&self, region: Rect) -> Option<OverlayCapture> {
        self.overlay_pixels.then(|| {
            let width = region.size.x as u32;
            let height = region.size.y as u32;
            OverlayCapture {
                width,
                height,
                rgba: vec![0xAB; (width * height * 4) as usize],
            }
        })
    }

    fn load_image(&self, image: u32, src: &str, events: flume::Sender<ImageEvent>) {
        self.loads.lock().push((image, src.to_owned(), events));
    }
}

impl TestHost {
    fn frame_requests(&self) -> usize {
        self.frame_requests.load(Ordering::SeqCst)
    }

    fn scripts(&self) -> Vec<String> {
        self.scripts.lock().clone()
    }
}

/// Width = character count * size / 10, deterministic.
struct TestMeasurer {
    size: f32,
}

impl TextMeasurer for TestMeasurer {
    fn set_size(&mut self, size: f32) {
        self.size = size;
    }

    fn measure(&mut self, text: &str) -> f32 {
        text.chars().count() as f32 * self.size / 10.
    }
}

fn setup(host: &Arc<TestHost>) -> Bridge<TestBackend> {
    let _ = simple_logger::SimpleLogger::new().init();
    Bridge::new(
        TestBackend::default(),
        Box::new(TestMeasurer { size: 0. }),
        Arc::downgrade(host) as Weak<dyn Host>,
    )
}

fn record(fields: &[&str]) -> String {
    fields.join("\u{1F}")
}

fn batch(records: &[String]) -> String {
    records.join("\n")
}

#[test]
fn lock_draw_unlock_round_trip() {
    let host = Arc::new(TestHost::default());
    let mut bridge = setup(&host);
    let handle = bridge.handle();

    handle.submit_batch(&batch(&[
        record(&["10", "1", "0", "0", "100", "50"]),
        record(&["31", "1", "2", "0", "0", "100", "50"]),
        record(&["49", "2", "-65536", "0"]),
        record(&["41", "2", "10", "10", "20", "20", "0"]),
        record(&["32", "1", "2"]),
    ]));
    assert_eq!(host.frame_requests(), 1);

    bridge.tick();

    assert_eq!(host.scripts(), vec!["easel.native.Surface.notifyReady(1);"]);

    let surface = bridge.surface(1).expect("surface registered");
    assert_eq!(surface.locked_canvas(), None);
    assert!(bridge.canvas(2).is_none(), "locked canvas is frame-scoped");

    // The flush rendered onto the surface's layer and included the
    // resolved fill.
    let (layer, commands) = &bridge.backend().rendered[0];
    assert_eq!(*layer, surface.layer());
    assert!(commands
        .iter()
        .any(|command| matches!(command, Command::FillPrimitive { .. })));
}

#[test]
fn coalescing_drops_skippable_batches_and_keeps_structural_ones() {
    let host = Arc::new(TestHost::default());
    let mut bridge = setup(&host);
    let handle = bridge.handle();

    handle.submit_batch(&record(&["33", "5", "64", "64"]));
    bridge.tick();
    assert!(bridge.canvas(5).is_some());

    // Three batches pile up before the next tick: skippable, then a
    // structural createCanvas, then skippable again.
    handle.submit_batch(&record(&["35", "5", "1", "1"]));
    handle.submit_batch(&record(&["33", "6", "32", "32"]));
    handle.submit_batch(&record(&["35", "5", "2", "2"]));
    let before = host.frame_requests();

    bridge.tick();
    // The drain stopped at the structural batch; the trailing batch is
    // still pending and a follow-up frame was requested for it.
    assert!(bridge.canvas(6).is_some());
    assert_eq!(host.frame_requests(), before + 1);

    bridge.tick();
    let translated = bridge.canvas(5).expect("canvas kept");
    assert_eq!(
        translated.transform().translation,
        easel::glam::vec2(2., 2.),
        "only the last skippable translate ran",
    );
}

#[test]
fn rerun_of_cached_batch_on_empty_tick() {
    let host = Arc::new(TestHost::default());
    let mut bridge = setup(&host);
    let handle = bridge.handle();

    handle.submit_batch(&record(&["33", "5", "64", "64"]));
    bridge.tick();
    handle.submit_batch(&record(&["35", "5", "3", "0"]));
    bridge.tick();
    // No new input: the same batch re-runs and the translate applies
    // again on the retained canvas state.
    bridge.tick();

    let canvas = bridge.canvas(5).expect("canvas kept");
    assert_eq!(canvas.transform().translation, easel::glam::vec2(6., 0.));
}

#[test]
fn runtime_reset_discards_stale_batches_and_handles() {
    let host = Arc::new(TestHost::default());
    let mut bridge = setup(&host);
    let handle = bridge.handle();

    handle.submit_batch(&record(&["33", "5", "64", "64"]));
    bridge.tick();
    assert!(bridge.canvas(5).is_some());

    // Queued before the reset, executed (or rather not) after it.
    handle.submit_batch(&record(&["33", "7", "64", "64"]));
    bridge.init_runtime();
    bridge.tick();

    assert!(bridge.canvas(5).is_none());
    assert!(bridge.canvas(7).is_none(), "stale-generation batch discarded");
    assert!(bridge.backend().layers.is_empty(), "all layers released");
    assert!(host
        .scripts()
        .contains(&"easel.native.TextMeasure.ready();".to_owned()));
}

#[test]
fn image_lifecycle_load_draw_and_read_back() {
    let host = Arc::new(TestHost::default());
    let mut bridge = setup(&host);
    let handle = bridge.handle();

    handle.submit_batch(&batch(&[
        record(&["33", "5", "64", "64"]),
        record(&["80", "3"]),
        record(&["81", "3", "https://example.com/a.png"]),
    ]));
    bridge.tick();

    let (image, src, events) = {
        let loads = host.loads.lock();
        let (image, src, events) = &loads[0];
        (*image, src.clone(), events.clone())
    };
    assert_eq!((image, src.as_str()), (3, "https://example.com/a.png"));

    // Pending: read-back reports an empty pixel array instead of
    // blocking on the load.
    handle.submit_batch(&record(&["83", "3", "9", "0", "0", "2", "2"]));
    bridge.tick();
    assert!(host
        .scripts()
        .contains(&"easel.native.Image.notifyGetPixels(3, 9, []);".to_owned()));

    events
        .send(ImageEvent {
            image: 3,
            result: Ok(DecodedImage {
                width: 2,
                height: 2,
                rgba: vec![0xFF; 16],
                insets: None,
            }),
        })
        .unwrap();
    bridge.tick();
    assert!(host
        .scripts()
        .contains(&"easel.native.Image.notifyLoadFinish(3, 2, 2);".to_owned()));
    let loaded = bridge.image(3).and_then(|image| image.loaded());
    assert_eq!(loaded.map(|l| (l.width, l.height)), Some((2, 2)));

    // Now loaded: a point draw composites at the image's natural size.
    handle.submit_batch(&record(&["70", "5", "3", "8", "8"]));
    bridge.tick();
    let canvas = bridge.canvas(5).expect("canvas kept");
    assert!(canvas.has_commands());

    // And read-back goes through the backend.
    handle.submit_batch(&record(&["83", "3", "9", "0", "0", "2", "1"]));
    bridge.tick();
    assert!(host.scripts().contains(
        &"easel.native.Image.notifyGetPixels(3, 9, [4279312947,4279312947]);".to_owned()
    ));
}

#[test]
fn failed_image_load_reports_error() {
    let host = Arc::new(TestHost::default());
    let mut bridge = setup(&host);
    let handle = bridge.handle();

    handle.submit_batch(&batch(&[
        record(&["80", "4"]),
        record(&["81", "4", "bad://source"]),
    ]));
    bridge.tick();

    let events = host.loads.lock()[0].2.clone();
    events
        .send(ImageEvent {
            image: 4,
            result: Err(easel::ImageLoadError::Fetch("bad://source".into())),
        })
        .unwrap();
    bridge.tick();

    assert!(host
        .scripts()
        .contains(&"easel.native.Image.notifyLoadError(4);".to_owned()));
    assert!(bridge.image(4).is_some_and(|image| image.loaded().is_none()));
}

#[test]
fn unlock_composites_overlay_capture() {
    let host = Arc::new(TestHost {
        overlay_pixels: true,
        ..Default::default()
    });
    let mut bridge = setup(&host);
    let handle = bridge.handle();

    bridge.show_overlay_bound(1, Rect::from_ltwh(0., 0., 10., 10.));
    bridge.show_overlay_bound(2, Rect::from_ltwh(20., 20., 10., 10.));

    handle.submit_batch(&batch(&[
        record(&["10", "1", "0", "0", "100", "100"]),
        record(&["31", "1", "2", "0", "0", "100", "100"]),
        record(&["39", "2", "-1"]),
        record(&["32", "1", "2"]),
    ]));
    bridge.tick();

    let (_, commands) = bridge.backend().rendered.last().expect("flushed");
    let blit = commands
        .iter()
        .find_map(|command| match command {
            Command::Blit { dst, .. } => Some(*dst),
            _ => None,
        })
        .expect("overlay blit present");
    assert_eq!(blit, Rect::from_ltrb(0., 0., 30., 30.));

    // The transient capture layer is destroyed after the flush; only
    // the surface layer remains.
    assert_eq!(bridge.backend().layers.len(), 1);
}

#[test]
fn measure_text_is_synchronous_and_thread_safe() {
    let host = Arc::new(TestHost::default());
    let bridge = setup(&host);
    let handle = bridge.handle();

    assert_eq!(handle.measure_text("hello", 20.), 10.);

    let from_elsewhere = {
        let handle = handle.clone();
        std::thread::spawn(move || handle.measure_text("hi", 10.))
    };
    assert_eq!(from_elsewhere.join().unwrap(), 2.);
}

#[test]
fn missing_handles_abort_single_commands_only() {
    let host = Arc::new(TestHost::default());
    let mut bridge = setup(&host);
    let handle = bridge.handle();

    // Draws against unknown handles are dropped; the createCanvas in
    // the same batch still runs.
    handle.submit_batch(&batch(&[
        record(&["41", "99", "0", "0", "10", "10", "0"]),
        record(&["33", "5", "64", "64"]),
        record(&["35", "98", "1", "1"]),
    ]));
    bridge.tick();
    assert!(bridge.canvas(5).is_some());
}

#[test]
fn surface_bound_change_reallocates_on_resize_only() {
    let host = Arc::new(TestHost::default());
    let mut bridge = setup(&host);
    let handle = bridge.handle();

    handle.submit_batch(&record(&["10", "1", "0", "0", "100", "50"]));
    bridge.tick();
    let original = bridge.surface(1).map(|surface| surface.layer()).unwrap();

    // Pure move: same extent, layer kept.
    handle.submit_batch(&record(&["11", "1", "10", "10", "110", "60"]));
    bridge.tick();
    assert_eq!(bridge.surface(1).map(|surface| surface.layer()), Some(original));

    // Resize: layer reallocated.
    handle.submit_batch(&record(&["11", "1", "0", "0", "200", "50"]));
    bridge.tick();
    let resized = bridge.surface(1).map(|surface| surface.layer()).unwrap();
    assert_ne!(resized, original);
    assert_eq!(bridge.backend().layer_size(resized), Some((200, 50)));
    assert_eq!(bridge.backend().layers.len(), 1);
}
