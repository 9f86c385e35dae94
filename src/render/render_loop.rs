//! Per-refresh retargeting loop
//!
//! Each tick: poll for a finished tracking initialization, run the tracking
//! stage (frame gate, landmark detection, pose and expression retargeting)
//! inside an error boundary, then render. Rendering happens every tick no
//! matter what the tracking stage did.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tokio::sync::oneshot;

use crate::error::{FacerigError, TrackingError};
use crate::retarget::{FrameUpdate, RetargetState};
use crate::tracking::TrackingSession;

use super::renderer::{Camera, Renderer};
use super::scheduler::Scheduler;

/// Pending tracking initialization, completed off the render thread
pub type PendingTracking = oneshot::Receiver<Result<TrackingSession, FacerigError>>;

/// Observable loop state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No tracking capability; the avatar renders at rest
    Idle,
    /// Tracking attached; frames are retargeted
    Tracking,
}

enum LoopPhase {
    Idle,
    Tracking(TrackingSession),
}

/// Where in the tracking stage a tick failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickStage {
    /// Reading the stream state or current frame
    Capture,
    /// Landmark inference
    Detect,
    /// Applying the result to the avatar
    Retarget,
}

impl fmt::Display for TickStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TickStage::Capture => write!(f, "capture"),
            TickStage::Detect => write!(f, "detect"),
            TickStage::Retarget => write!(f, "retarget"),
        }
    }
}

/// A contained per-tick failure
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed (frame timestamp: {timestamp_ms:?}): {source}")]
pub struct TickError {
    pub stage: TickStage,
    pub timestamp_ms: Option<f64>,
    #[source]
    pub source: TrackingError,
}

/// Stage and frame the tracking step has reached, kept outside the unwind
/// boundary so a panic can still be attributed.
#[derive(Debug, Clone, Copy)]
struct StageMarker {
    stage: TickStage,
    timestamp_ms: Option<f64>,
}

impl StageMarker {
    fn new() -> Self {
        Self {
            stage: TickStage::Capture,
            timestamp_ms: None,
        }
    }

    fn fail(&self, source: TrackingError) -> TickError {
        TickError {
            stage: self.stage,
            timestamp_ms: self.timestamp_ms,
            source,
        }
    }
}

/// What the tracking stage did on one tick
#[derive(Debug)]
pub enum TickOutcome {
    /// No tracking capability yet
    Idle,
    /// Stream has no frame at the current position
    Waiting,
    /// Frame already processed
    Duplicate,
    /// New frame processed
    Applied(FrameUpdate),
    /// Tracking stage failed; state left as it was
    Failed(TickError),
}

/// The render loop. Owns the retargeting state, the renderer and, once
/// initialized, the tracking session.
pub struct RenderLoop<R: Renderer> {
    state: RetargetState,
    renderer: R,
    camera: Camera,
    phase: LoopPhase,
    pending: Option<PendingTracking>,
    ticks: u64,
}

impl<R: Renderer> RenderLoop<R> {
    pub fn new(state: RetargetState, renderer: R, camera: Camera) -> Self {
        Self {
            state,
            renderer,
            camera,
            phase: LoopPhase::Idle,
            pending: None,
            ticks: 0,
        }
    }

    pub fn phase(&self) -> Phase {
        match self.phase {
            LoopPhase::Idle => Phase::Idle,
            LoopPhase::Tracking(_) => Phase::Tracking,
        }
    }

    pub fn state(&self) -> &RetargetState {
        &self.state
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Attach an initialized tracking session (IDLE → TRACKING).
    ///
    /// The transition happens once; a second session is dropped.
    pub fn attach_tracking(&mut self, session: TrackingSession) {
        match self.phase {
            LoopPhase::Idle => {
                tracing::info!("Tracking attached after {} ticks", self.ticks);
                self.phase = LoopPhase::Tracking(session);
            }
            LoopPhase::Tracking(_) => {
                tracing::warn!("Tracking already attached, ignoring new session");
            }
        }
    }

    /// Register an initialization running elsewhere. Polled once per tick.
    pub fn await_tracking(&mut self, pending: PendingTracking) {
        self.pending = Some(pending);
    }

    /// Viewport resized: update camera aspect and renderer size.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.camera.set_aspect(width, height);
        self.renderer.set_size(width, height);
    }

    /// Run until the scheduler stops.
    pub fn run<S: Scheduler>(&mut self, scheduler: &mut S) {
        while scheduler.next_tick() {
            self.tick();
        }
        tracing::info!("Render loop stopped after {} ticks", self.ticks);
    }

    /// One refresh.
    pub fn tick(&mut self) -> TickOutcome {
        self.ticks += 1;
        self.poll_pending();

        let outcome = match &mut self.phase {
            LoopPhase::Idle => TickOutcome::Idle,
            LoopPhase::Tracking(session) => {
                let state = &mut self.state;
                let mut marker = StageMarker::new();
                let caught = panic::catch_unwind(AssertUnwindSafe(|| {
                    track_frame(session, state, &mut marker)
                }));
                match caught {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => TickOutcome::Failed(e),
                    Err(payload) => TickOutcome::Failed(
                        marker.fail(TrackingError::Panicked(panic_message(payload.as_ref()))),
                    ),
                }
            }
        };

        if let TickOutcome::Failed(e) = &outcome {
            tracing::warn!(
                tick = self.ticks,
                stage = %e.stage,
                timestamp_ms = ?e.timestamp_ms,
                "Tracking failed this tick: {}",
                e.source
            );
        }

        if let Err(e) = self.renderer.render(&self.state, &self.camera) {
            tracing::error!(tick = self.ticks, "Render failed: {}", e);
        }

        outcome
    }

    fn poll_pending(&mut self) {
        let Some(rx) = self.pending.as_mut() else {
            return;
        };

        match rx.try_recv() {
            Err(oneshot::error::TryRecvError::Empty) => {}
            Err(oneshot::error::TryRecvError::Closed) => {
                tracing::error!("Tracking initialization abandoned; staying idle");
                self.pending = None;
            }
            Ok(Ok(session)) => {
                self.pending = None;
                self.attach_tracking(session);
            }
            Ok(Err(e)) => {
                self.pending = None;
                tracing::error!("Face tracking unavailable: {}; staying idle", e);
            }
        }
    }
}

fn track_frame(
    session: &mut TrackingSession,
    state: &mut RetargetState,
    marker: &mut StageMarker,
) -> Result<TickOutcome, TickError> {
    marker.stage = TickStage::Capture;
    let ready = session.video.ready_state().map_err(|e| marker.fail(e))?;
    if !ready.has_current_data() {
        return Ok(TickOutcome::Waiting);
    }

    let frame = session.video.current_frame().map_err(|e| marker.fail(e))?;
    let timestamp_ms = frame.timestamp_ms;
    marker.timestamp_ms = Some(timestamp_ms);

    if !state.gate_mut().should_process(timestamp_ms) {
        return Ok(TickOutcome::Duplicate);
    }

    marker.stage = TickStage::Detect;
    let result = session
        .landmarker
        .detect(&frame, timestamp_ms)
        .map_err(|e| marker.fail(e))?;

    marker.stage = TickStage::Retarget;
    Ok(TickOutcome::Applied(state.apply(&result)))
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::avatar::{AvatarScene, MeshNode, MorphTargets, SceneNode};
    use crate::config::RenderConfig;
    use crate::error::RenderError;
    use crate::retarget::{EulerRotation, PoseMatrix};
    use crate::tracking::{
        Category, FrameHandle, LandmarkSource, ReadyState, TrackingResult, VideoFrame,
        VideoSource,
    };
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct CountingRenderer {
        frames: usize,
        size: Option<(u32, u32)>,
        fail: bool,
    }

    impl Renderer for CountingRenderer {
        fn render(&mut self, _: &RetargetState, _: &Camera) -> Result<(), RenderError> {
            self.frames += 1;
            if self.fail {
                return Err(RenderError::Frame("lost device".into()));
            }
            Ok(())
        }

        fn set_size(&mut self, width: u32, height: u32) {
            self.size = Some((width, height));
        }
    }

    /// Video that reports a fixed sequence of timestamps, one per tick
    struct ScriptedVideo {
        timestamps: VecDeque<Option<f64>>,
        current: Option<f64>,
    }

    impl ScriptedVideo {
        fn new(timestamps: &[Option<f64>]) -> Self {
            Self {
                timestamps: timestamps.iter().copied().collect(),
                current: None,
            }
        }
    }

    impl VideoSource for ScriptedVideo {
        fn ready_state(&mut self) -> Result<ReadyState, TrackingError> {
            self.current = self.timestamps.pop_front().flatten();
            Ok(match self.current {
                Some(_) => ReadyState::HaveEnoughData,
                None => ReadyState::HaveMetadata,
            })
        }

        fn current_frame(&mut self) -> Result<VideoFrame, TrackingError> {
            self.current
                .map(|ts| VideoFrame::new(ts, FrameHandle(0)))
                .ok_or_else(|| TrackingError::Receiver("no frame".into()))
        }
    }

    enum Scripted {
        Result(TrackingResult),
        Fail,
        Panic,
    }

    struct ScriptedLandmarker {
        script: VecDeque<Scripted>,
        calls: Arc<Mutex<usize>>,
    }

    impl LandmarkSource for ScriptedLandmarker {
        fn detect(&mut self, _: &VideoFrame, ts: f64) -> Result<TrackingResult, TrackingError> {
            *self.calls.lock().unwrap() += 1;
            match self.script.pop_front() {
                Some(Scripted::Result(r)) => Ok(r),
                Some(Scripted::Fail) => Err(TrackingError::Detect(format!("no model at {}", ts))),
                Some(Scripted::Panic) => panic!("inference crashed"),
                None => Ok(TrackingResult::default()),
            }
        }
    }

    fn smile_state() -> RetargetState {
        let face = SceneNode::new("head").with_mesh(MeshNode {
            name: "Face".into(),
            bounds: None,
            morph_targets: Some(MorphTargets::from_names(["mouthSmile", "mouthSmile_right"])),
        });
        RetargetState::new(AvatarScene::new("head", vec![face]))
    }

    fn new_loop() -> RenderLoop<CountingRenderer> {
        RenderLoop::new(
            smile_state(),
            CountingRenderer::default(),
            Camera::from_config(&RenderConfig::default()),
        )
    }

    fn session(
        timestamps: &[Option<f64>],
        script: Vec<Scripted>,
    ) -> (TrackingSession, Arc<Mutex<usize>>) {
        let calls = Arc::new(Mutex::new(0));
        let landmarker = ScriptedLandmarker {
            script: script.into(),
            calls: Arc::clone(&calls),
        };
        (
            TrackingSession::new(Box::new(ScriptedVideo::new(timestamps)), Box::new(landmarker)),
            calls,
        )
    }

    fn smile(score: f32) -> Scripted {
        Scripted::Result(TrackingResult {
            pose: Some(PoseMatrix::IDENTITY),
            expressions: Some(vec![Category::new("mouthSmile", score)]),
        })
    }

    fn influences(l: &RenderLoop<CountingRenderer>) -> Vec<f32> {
        l.state().meshes().get("Face").unwrap().influences().to_vec()
    }

    #[test]
    fn test_idle_still_renders() {
        let mut l = new_loop();
        assert_eq!(l.phase(), Phase::Idle);
        assert!(matches!(l.tick(), TickOutcome::Idle));
        assert!(matches!(l.tick(), TickOutcome::Idle));
        assert_eq!(l.renderer().frames, 2);
    }

    #[test]
    fn test_end_to_end_duplicate_frame() {
        let mut l = new_loop();
        let (s, calls) = session(&[Some(100.0), Some(100.0)], vec![smile(0.2)]);
        l.attach_tracking(s);
        assert_eq!(l.phase(), Phase::Tracking);

        assert!(matches!(l.tick(), TickOutcome::Applied(_)));
        assert_eq!(influences(&l), vec![0.2, 0.0]);
        assert_eq!(l.state().head_rotation(), EulerRotation::ZERO);
        assert_eq!(l.renderer().frames, 1);

        let before = l.state().clone();
        assert!(matches!(l.tick(), TickOutcome::Duplicate));
        assert_eq!(l.state(), &before);
        assert_eq!(*calls.lock().unwrap(), 1);
        assert_eq!(l.renderer().frames, 2);
    }

    #[test]
    fn test_waiting_for_frame() {
        let mut l = new_loop();
        let (s, calls) = session(&[None, Some(5.0)], vec![smile(0.7)]);
        l.attach_tracking(s);

        assert!(matches!(l.tick(), TickOutcome::Waiting));
        assert_eq!(*calls.lock().unwrap(), 0);
        assert!(matches!(l.tick(), TickOutcome::Applied(_)));
        assert_eq!(influences(&l), vec![0.7, 0.0]);
    }

    #[test]
    fn test_no_face_leaves_state() {
        let mut l = new_loop();
        let (s, _) = session(
            &[Some(1.0), Some(2.0)],
            vec![smile(0.5), Scripted::Result(TrackingResult::default())],
        );
        l.attach_tracking(s);
        l.tick();
        let before = influences(&l);

        match l.tick() {
            TickOutcome::Applied(update) => assert_eq!(update, FrameUpdate::default()),
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(influences(&l), before);
        assert_eq!(l.state().last_processed_timestamp(), Some(2.0));
    }

    #[test]
    fn test_detect_failure_is_contained() {
        let mut l = new_loop();
        let (s, _) = session(&[Some(1.0), Some(2.0)], vec![Scripted::Fail, smile(0.3)]);
        l.attach_tracking(s);

        match l.tick() {
            TickOutcome::Failed(e) => {
                assert_eq!(e.stage, TickStage::Detect);
                assert_eq!(e.timestamp_ms, Some(1.0));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(l.renderer().frames, 1);
        assert_eq!(l.phase(), Phase::Tracking);

        assert!(matches!(l.tick(), TickOutcome::Applied(_)));
        assert_eq!(influences(&l), vec![0.3, 0.0]);
    }

    #[test]
    fn test_panic_is_contained() {
        let mut l = new_loop();
        let (s, _) = session(&[Some(1.0), Some(2.0)], vec![Scripted::Panic, smile(0.9)]);
        l.attach_tracking(s);

        match l.tick() {
            TickOutcome::Failed(e) => {
                assert_eq!(e.stage, TickStage::Detect);
                assert_eq!(e.timestamp_ms, Some(1.0));
                assert!(matches!(e.source, TrackingError::Panicked(_)));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(l.renderer().frames, 1);
        assert!(matches!(l.tick(), TickOutcome::Applied(_)));
        assert_eq!(influences(&l), vec![0.9, 0.0]);
    }

    struct PanickingVideo;

    impl VideoSource for PanickingVideo {
        fn ready_state(&mut self) -> Result<ReadyState, TrackingError> {
            panic!("camera unplugged")
        }

        fn current_frame(&mut self) -> Result<VideoFrame, TrackingError> {
            unreachable!()
        }
    }

    #[test]
    fn test_capture_panic_has_no_timestamp() {
        let mut l = new_loop();
        let calls = Arc::new(Mutex::new(0));
        let landmarker = ScriptedLandmarker {
            script: VecDeque::new(),
            calls: Arc::clone(&calls),
        };
        l.attach_tracking(TrackingSession::new(Box::new(PanickingVideo), Box::new(landmarker)));

        match l.tick() {
            TickOutcome::Failed(e) => {
                assert_eq!(e.stage, TickStage::Capture);
                assert_eq!(e.timestamp_ms, None);
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(l.renderer().frames, 1);
    }

    #[test]
    fn test_render_failure_keeps_looping() {
        let mut l = new_loop();
        l.renderer.fail = true;
        l.tick();
        l.tick();
        assert_eq!(l.ticks(), 2);
        assert_eq!(l.renderer().frames, 2);
    }

    #[test]
    fn test_pending_initialization() {
        let mut l = new_loop();
        let (tx, rx) = oneshot::channel();
        l.await_tracking(rx);

        assert!(matches!(l.tick(), TickOutcome::Idle));
        let (s, _) = session(&[Some(1.0)], vec![smile(0.4)]);
        assert!(tx.send(Ok(s)).is_ok());

        assert!(matches!(l.tick(), TickOutcome::Applied(_)));
        assert_eq!(l.phase(), Phase::Tracking);
    }

    #[test]
    fn test_failed_initialization_stays_idle() {
        let mut l = new_loop();
        let (tx, rx) = oneshot::channel();
        l.await_tracking(rx);
        assert!(tx
            .send(Err(TrackingError::Subprocess("camera denied".into()).into()))
            .is_ok());

        for _ in 0..3 {
            assert!(matches!(l.tick(), TickOutcome::Idle));
        }
        assert_eq!(l.phase(), Phase::Idle);
        assert_eq!(l.renderer().frames, 3);
    }

    #[test]
    fn test_attach_is_one_way() {
        let mut l = new_loop();
        let (first, first_calls) = session(&[Some(1.0)], vec![smile(0.1)]);
        let (second, second_calls) = session(&[Some(1.0)], vec![smile(0.8)]);
        l.attach_tracking(first);
        l.attach_tracking(second);

        l.tick();
        assert_eq!(*first_calls.lock().unwrap(), 1);
        assert_eq!(*second_calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_resize_relay() {
        let mut l = new_loop();
        l.resize(600, 300);
        assert!((l.camera().aspect - 2.0).abs() < 1e-6);
        assert_eq!(l.renderer().size, Some((600, 300)));
    }

    #[test]
    fn test_run_with_step_scheduler() {
        let mut l = new_loop();
        l.run(&mut crate::render::scheduler::StepScheduler::new(5));
        assert_eq!(l.ticks(), 5);
        assert_eq!(l.renderer().frames, 5);
    }
}
