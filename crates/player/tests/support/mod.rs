#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, Receiver, Sender};
use player::{
    DrawStatus, EffectEngine, EvalCallback, OffscreenPlayer, PixelBuffer, PixelFormat,
    PlayerTuning, ProcessCallback, ProcessedFrame, RenderTarget, Rotation,
};

/// Call log shared by the mock engine and target so tests can assert the
/// global order the worker executed things in.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn snapshot(events: &EventLog) -> Vec<String> {
    events.lock().unwrap().clone()
}

/// Polls the log until an entry containing `needle` shows up.
pub fn wait_for_event(events: &EventLog, needle: &str, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if snapshot(events).iter().any(|event| event.contains(needle)) {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

pub struct MockEngine {
    events: EventLog,
    hold_draw: Arc<AtomicBool>,
    load_gate: Option<Receiver<()>>,
}

impl MockEngine {
    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl EffectEngine for MockEngine {
    fn surface_created(&self, width: u32, height: u32) {
        self.record(format!("engine.surface_created {width}x{height}"));
    }

    fn surface_changed(&self, width: u32, height: u32) {
        self.record(format!("engine.surface_changed {width}x{height}"));
    }

    fn surface_destroyed(&self) {
        self.record("engine.surface_destroyed".to_string());
    }

    fn push_frame(&self, image: PixelBuffer, rotation: Rotation, mirror: bool) {
        self.record(format!(
            "engine.push {}x{} rot={} mirror={}",
            image.width(),
            image.height(),
            rotation.degrees(),
            mirror
        ));
    }

    fn draw(&self) -> DrawStatus {
        // Pending retries are not logged; a held draw would flood the log.
        if self.hold_draw.load(Ordering::Acquire) {
            DrawStatus::Pending
        } else {
            self.record("engine.draw".to_string());
            DrawStatus::Ready
        }
    }

    fn pause(&self) {
        self.record("engine.pause".to_string());
    }

    fn resume(&self) {
        self.record("engine.resume".to_string());
    }

    fn stop(&self) {
        self.record("engine.stop".to_string());
    }

    fn load_effect(&self, path: &str) {
        self.record(format!("engine.load_effect {path}"));
        if let Some(gate) = &self.load_gate {
            let _ = gate.recv_timeout(Duration::from_secs(5));
        }
    }

    fn call_script(&self, method: &str, param: &str) {
        self.record(format!("engine.call_script {method} {param}"));
    }

    fn eval_script(&self, code: &str, callback: Option<EvalCallback>) {
        self.record(format!("engine.eval_script {code}"));
        if let Some(callback) = callback {
            callback(format!("ok:{code}"));
        }
    }
}

pub struct MockTarget {
    events: EventLog,
    fail_init: bool,
    size: Mutex<(u32, u32)>,
    /// Name of the thread `init` ran on, for thread-affinity assertions.
    pub init_thread: Mutex<Option<String>>,
}

impl MockTarget {
    fn record(&self, event: String) {
        self.events.lock().unwrap().push(event);
    }
}

impl RenderTarget for MockTarget {
    fn init(&self, width: u32, height: u32) -> anyhow::Result<()> {
        *self.init_thread.lock().unwrap() = thread::current().name().map(str::to_string);
        if self.fail_init {
            anyhow::bail!("no GL context available");
        }
        *self.size.lock().unwrap() = (width, height);
        self.record(format!("target.init {width}x{height}"));
        Ok(())
    }

    fn deinit(&self) {
        self.record("target.deinit".to_string());
    }

    fn activate_context(&self) {
        self.record("target.activate".to_string());
    }

    fn deactivate_context(&self) {
        self.record("target.deactivate".to_string());
    }

    fn prepare_rendering(&self) {
        self.record("target.prepare".to_string());
    }

    fn surface_changed(&self, width: u32, height: u32) {
        self.record(format!("target.surface_changed {width}x{height}"));
    }

    fn orient_image(&self, rotation: Rotation) {
        self.record(format!("target.orient {}", rotation.degrees()));
    }

    fn read_pixels(&self, format: PixelFormat) -> anyhow::Result<PixelBuffer> {
        let (width, height) = *self.size.lock().unwrap();
        match format {
            PixelFormat::Rgba8 => {
                let data = vec![0x3c; format.buffer_len(width, height)];
                PixelBuffer::new(width, height, format, data)
            }
            other => anyhow::bail!("mock target cannot read back {other:?}"),
        }
    }

    fn texture_id(&self) -> Option<u32> {
        Some(7)
    }
}

pub struct MockKit {
    pub engine: Arc<MockEngine>,
    pub target: Arc<MockTarget>,
    pub events: EventLog,
    /// While set, `draw` reports `Pending`, keeping the worker in its wait.
    pub hold_draw: Arc<AtomicBool>,
}

fn build(load_gate: Option<Receiver<()>>, fail_init: bool) -> MockKit {
    let events: EventLog = Arc::new(Mutex::new(Vec::new()));
    let hold_draw = Arc::new(AtomicBool::new(false));
    let engine = Arc::new(MockEngine {
        events: events.clone(),
        hold_draw: hold_draw.clone(),
        load_gate,
    });
    let target = Arc::new(MockTarget {
        events: events.clone(),
        fail_init,
        size: Mutex::new((0, 0)),
        init_thread: Mutex::new(None),
    });
    MockKit {
        engine,
        target,
        events,
        hold_draw,
    }
}

pub fn kit() -> MockKit {
    build(None, false)
}

/// Kit whose `load_effect` blocks until a token arrives, so tests can park
/// the worker behind a queued command while they stack up submissions.
pub fn kit_with_blocking_load() -> (MockKit, Sender<()>) {
    let (release, gate) = bounded(16);
    (build(Some(gate), false), release)
}

pub fn kit_with_failing_init() -> MockKit {
    build(None, true)
}

/// Default tuning with a short draw backoff to keep tests fast.
pub fn tuning() -> PlayerTuning {
    PlayerTuning {
        draw_backoff: Duration::from_millis(1),
        ..PlayerTuning::default()
    }
}

pub fn rgba_frame(width: u32, height: u32) -> PixelBuffer {
    let data = vec![0x80; PixelFormat::Rgba8.buffer_len(width, height)];
    PixelBuffer::new(width, height, PixelFormat::Rgba8, data).expect("valid frame")
}

/// Callback plus the channel its outcome arrives on.
pub fn callback_channel() -> (
    ProcessCallback,
    Receiver<Option<Arc<ProcessedFrame>>>,
) {
    let (tx, rx) = bounded(1);
    let callback: ProcessCallback = Box::new(move |frame| {
        let _ = tx.send(frame);
    });
    (callback, rx)
}

/// Blocks until everything enqueued before this call has executed, by
/// round-tripping an `eval_script` through the worker.
pub fn drain_worker(player: &OffscreenPlayer) {
    let (tx, rx) = bounded(1);
    player.eval_script(
        "sync",
        Some(Box::new(move |_reply| {
            let _ = tx.send(());
        })),
    );
    rx.recv_timeout(Duration::from_secs(5))
        .expect("worker drained");
}
