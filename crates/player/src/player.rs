use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use scheduler::{RenderScheduler, SchedulerError};
use tracing::{debug, warn};

use crate::config::PlayerTuning;
use crate::engine::{EffectEngine, EvalCallback, ProcessCallback, RenderTarget};
use crate::frame::ProcessedFrame;
use crate::types::{DrawStatus, PixelBuffer, Rotation, RunState};

#[derive(Debug, thiserror::Error)]
pub enum PlayerError {
    /// The worker-side setup task failed; the player is unusable.
    #[error("failed to initialise the offscreen player")]
    Init {
        #[source]
        source: SchedulerError,
    },
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// State shared between caller threads and the render worker.
///
/// The frame slot is only ever mutated on the worker; the counter, run state
/// and destruction flag are touched from arbitrary caller threads and use
/// acquire/release atomics.
struct PlayerShared {
    engine: Arc<dyn EffectEngine>,
    target: Arc<dyn RenderTarget>,
    frame: Arc<ProcessedFrame>,
    pending_frames: AtomicUsize,
    run_state: AtomicU8,
    destroying: AtomicBool,
    tuning: PlayerTuning,
}

impl PlayerShared {
    fn run_state(&self) -> RunState {
        RunState::from_u8(self.run_state.load(Ordering::Acquire))
    }

    fn set_run_state(&self, state: RunState) {
        self.run_state.store(state.as_u8(), Ordering::Release);
    }

    fn destroying(&self) -> bool {
        self.destroying.load(Ordering::Acquire)
    }
}

/// Request-driven front end for an external effect engine.
///
/// The player owns one render worker thread; every operation that touches
/// the context executes there, in submission order. Callers on any thread
/// submit frames and commands; completion travels through per-request
/// callbacks. Construction and [`OffscreenPlayer::shutdown`] are the only
/// blocking calls.
pub struct OffscreenPlayer {
    shared: Arc<PlayerShared>,
    scheduler: Option<RenderScheduler>,
}

impl std::fmt::Debug for OffscreenPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OffscreenPlayer").finish_non_exhaustive()
    }
}

impl OffscreenPlayer {
    /// Brings the surface up at `width` x `height` and blocks until the
    /// worker-side initialisation finished, so context setup failures
    /// surface here rather than on the first frame.
    pub fn new(
        engine: Arc<dyn EffectEngine>,
        target: Arc<dyn RenderTarget>,
        width: u32,
        height: u32,
        tuning: PlayerTuning,
    ) -> Result<Self, PlayerError> {
        let scheduler = RenderScheduler::spawn(&tuning.worker_thread_name)
            .map_err(|source| PlayerError::Init { source })?;

        let frame = ProcessedFrame::new(Arc::clone(&target));
        let shared = Arc::new(PlayerShared {
            engine,
            target,
            frame,
            pending_frames: AtomicUsize::new(0),
            run_state: AtomicU8::new(RunState::Running.as_u8()),
            destroying: AtomicBool::new(false),
            tuning,
        });

        // The context has thread affinity: the surface must come up on the
        // worker thread.
        let init_shared = Arc::clone(&shared);
        let handle = scheduler
            .enqueue(move || {
                init_shared.target.init(width, height)?;
                init_shared.target.activate_context();
                init_shared.engine.surface_created(width, height);
                init_shared.target.deactivate_context();
                Ok(())
            })
            .map_err(|source| PlayerError::Init { source })?;
        handle.wait().map_err(|source| PlayerError::Init { source })?;
        debug!(width, height, "offscreen player initialised");

        Ok(Self {
            shared,
            scheduler: Some(scheduler),
        })
    }

    /// Submits an image for effect processing.
    ///
    /// Returns `false` and invokes `callback` with `None` on the calling
    /// thread when the request is rejected outright: teardown has begun, or
    /// the number of in-flight requests reached the configured ceiling.
    /// Otherwise the request is queued and `callback` fires on the worker
    /// once the frame is rendered (`Some`) or dropped (`None`). A missing
    /// `target_orientation` means no rotation of the result.
    pub fn process_frame(
        &self,
        image: PixelBuffer,
        input_rotation: Rotation,
        mirror: bool,
        callback: Option<ProcessCallback>,
        target_orientation: Option<Rotation>,
    ) -> bool {
        if self.shared.destroying() {
            deliver(callback, None);
            return false;
        }

        // Ceiling check and increment in one atomic step, so a caller burst
        // can never admit more than the ceiling.
        let ceiling = self.shared.tuning.max_pending_frames;
        let admitted = self
            .shared
            .pending_frames
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |pending| {
                (pending < ceiling).then_some(pending + 1)
            })
            .is_ok();
        if !admitted {
            debug!(ceiling, "frame rejected: processing queue is full");
            deliver(callback, None);
            return false;
        }

        let Some(scheduler) = self.scheduler.as_ref() else {
            self.shared.pending_frames.fetch_sub(1, Ordering::AcqRel);
            deliver(callback, None);
            return false;
        };

        let orientation = target_orientation.unwrap_or_default();
        let shared = Arc::clone(&self.shared);
        let enqueued = scheduler.enqueue(move || {
            process_on_worker(&shared, image, input_rotation, mirror, orientation, callback);
            Ok(())
        });
        match enqueued {
            Ok(_handle) => true,
            Err(err) => {
                self.shared.pending_frames.fetch_sub(1, Ordering::AcqRel);
                warn!(%err, "frame rejected: render worker unavailable");
                false
            }
        }
    }

    /// Propagates a new surface size to the engine and target, in order with
    /// all other queued commands.
    pub fn surface_changed(&self, width: u32, height: u32) {
        self.submit_command("surface_changed", move |shared| {
            shared.target.activate_context();
            shared.engine.surface_changed(width, height);
            shared.target.surface_changed(width, height);
            shared.target.deactivate_context();
        });
    }

    /// Loads the effect at `path` on the worker thread.
    pub fn load_effect(&self, path: &str) {
        let path = path.to_string();
        self.submit_command("load_effect", move |shared| {
            shared.target.activate_context();
            shared.engine.load_effect(&path);
            shared.target.deactivate_context();
        });
    }

    /// Unloads the active effect (an empty path at the engine boundary).
    pub fn unload_effect(&self) {
        self.load_effect("");
    }

    /// Invokes a method on the loaded effect's script.
    pub fn call_script(&self, method: &str, param: &str) {
        let method = method.to_string();
        let param = param.to_string();
        self.submit_command("call_script", move |shared| {
            shared.target.activate_context();
            shared.engine.call_script(&method, &param);
            shared.target.deactivate_context();
        });
    }

    /// Evaluates a script snippet on the worker thread; the engine replies
    /// through `callback` if one is given.
    pub fn eval_script(&self, code: &str, callback: Option<EvalCallback>) {
        let code = code.to_string();
        self.submit_command("eval_script", move |shared| {
            shared.target.activate_context();
            shared.engine.eval_script(&code, callback);
            shared.target.deactivate_context();
        });
    }

    /// Pauses processing. Applies immediately on this thread (never queued)
    /// so an in-progress draw wait observes it without delay; an active
    /// frame resolves to "no result" at its next checkpoint.
    pub fn pause(&self) {
        self.shared.set_run_state(RunState::Paused);
        self.shared.engine.pause();
    }

    /// Resumes processing after [`OffscreenPlayer::pause`].
    pub fn resume(&self) {
        self.shared.set_run_state(RunState::Running);
        self.shared.engine.resume();
    }

    /// Stops processing. Like pause, takes effect immediately; already
    /// queued frames resolve to "no result".
    pub fn stop(&self) {
        self.shared.set_run_state(RunState::Stopped);
        self.shared.engine.stop();
    }

    /// Current run state as new submissions will observe it.
    pub fn run_state(&self) -> RunState {
        self.shared.run_state()
    }

    /// Tears the player down: rejects new submissions, runs the worker-side
    /// teardown (signal surface destroyed, deinitialise the target), then
    /// joins the worker thread. Idempotent; also invoked from `Drop`. After
    /// this returns no further worker-side context call occurs.
    pub fn shutdown(&mut self) -> Result<(), PlayerError> {
        let Some(scheduler) = self.scheduler.take() else {
            return Ok(());
        };

        // Flag first: submissions racing the teardown are rejected without
        // touching the worker.
        self.shared.destroying.store(true, Ordering::Release);

        let shared = Arc::clone(&self.shared);
        let teardown = scheduler.enqueue(move || {
            shared.target.activate_context();
            shared.engine.surface_destroyed();
            shared.target.deinit();
            Ok(())
        })?;
        teardown.wait()?;
        scheduler.shutdown()?;
        debug!("offscreen player shut down");
        Ok(())
    }

    fn submit_command<F>(&self, label: &'static str, run: F)
    where
        F: FnOnce(&PlayerShared) + Send + 'static,
    {
        if self.shared.destroying() {
            debug!(command = label, "command dropped: player is shutting down");
            return;
        }
        let Some(scheduler) = self.scheduler.as_ref() else {
            return;
        };
        let shared = Arc::clone(&self.shared);
        let enqueued = scheduler.enqueue(move || {
            run(&shared);
            Ok(())
        });
        if let Err(err) = enqueued {
            warn!(command = label, %err, "command dropped: render worker unavailable");
        }
    }
}

impl Drop for OffscreenPlayer {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            warn!(%err, "offscreen player did not shut down cleanly");
        }
    }
}

/// Worker-side body of one processing request.
///
/// Exactly one of the paths below runs, each ends in the callback firing
/// once, and the in-flight counter is decremented exactly once regardless of
/// path.
fn process_on_worker(
    shared: &PlayerShared,
    image: PixelBuffer,
    input_rotation: Rotation,
    mirror: bool,
    target_orientation: Rotation,
    callback: Option<ProcessCallback>,
) {
    let frame = &shared.frame;
    if frame.is_locked() {
        // A previous pass is unexpectedly still holding the result slot.
        warn!("previous frame result is still locked; dropping this frame");
        deliver(callback, None);
    } else if shared.pending_frames.load(Ordering::Acquire) == 1
        && shared.run_state() == RunState::Running
    {
        frame.lock();
        shared.target.activate_context();
        shared.target.prepare_rendering();
        shared.engine.push_frame(image, input_rotation, mirror);
        while shared.engine.draw() == DrawStatus::Pending
            && shared.run_state() == RunState::Running
        {
            thread::yield_now();
            thread::sleep(shared.tuning.draw_backoff);
        }
        if shared.run_state() == RunState::Running {
            shared.target.orient_image(target_orientation);
            deliver(callback, Some(Arc::clone(frame)));
        } else {
            deliver(callback, None);
        }
        frame.unlock();
    } else {
        // Superseded: newer requests are queued behind this one, or the
        // player is paused/stopped. Skip without touching the engine; the
        // newest viable frame wins.
        deliver(callback, None);
    }
    shared.pending_frames.fetch_sub(1, Ordering::AcqRel);
}

fn deliver(callback: Option<ProcessCallback>, frame: Option<Arc<ProcessedFrame>>) {
    if let Some(callback) = callback {
        callback(frame);
    }
}
