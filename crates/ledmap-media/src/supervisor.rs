//! Playback supervision
//!
//! Exactly one playback session drives the transmitter at a time. Each
//! session runs its pacing loop on a dedicated thread; the supervisor owns
//! the handle and is the only place sessions are started or stopped.
//!
//! Stopping is two-phase: the running flag is cleared and the session is
//! deregistered from the transmitter before the thread is joined, so a
//! frame still in flight cannot reach the wire after the next session has
//! started.

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use ledmap_control::{ArtNetTransmitter, FrameSource as Origin, Priority, SessionId, Worker};
use ledmap_core::{ColorCorrector, FrameRenderer, PlaybackConfig, PointLayout};

use crate::pacer::FramePacer;
use crate::source::{FrameSource, SourceFrame};
use crate::{MediaError, Result};

/// Poll period while paused
const PAUSE_POLL: Duration = Duration::from_millis(10);
/// Longest uninterrupted sleep inside the pacing loop
const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// What a session plays
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionKind {
    Video,
    Generator,
    Replay,
}

/// Supervisor state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Running,
    Stopping,
}

/// Session lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Started { id: SessionId, name: String },
    /// The session ended on its own after its last pass
    Completed { id: SessionId, name: String, loops: u32 },
    /// The session was stopped or replaced
    Stopped { id: SessionId, name: String },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    /// Pacing rate; falls back to the source rate, then the transmitter rate
    pub fps_limit: Option<f32>,
    pub speed: f32,
    /// Passes over the source, 0 for unbounded
    pub max_loops: u32,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&PlaybackConfig::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &PlaybackConfig) -> Self {
        Self {
            fps_limit: None,
            speed: config.speed,
            max_loops: config.max_loops,
        }
    }
}

/// A unit of playback handed to [`PlaybackSupervisor::start`]
pub struct PlaybackSession {
    pub name: String,
    pub kind: SessionKind,
    pub source: Box<dyn FrameSource>,
    pub settings: SessionSettings,
}

impl PlaybackSession {
    pub fn new(name: impl Into<String>, kind: SessionKind, source: Box<dyn FrameSource>) -> Self {
        Self {
            name: name.into(),
            kind,
            source,
            settings: SessionSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: SessionSettings) -> Self {
        self.settings = settings;
        self
    }
}

/// Snapshot of the active session
#[derive(Debug, Clone, PartialEq)]
pub struct SessionInfo {
    pub id: SessionId,
    pub name: String,
    pub kind: SessionKind,
    pub paused: bool,
    pub speed: f32,
    pub loops: u32,
    pub frames_sent: u64,
    pub frames_rejected: u64,
}

/// State shared between the supervisor and one session thread
#[derive(Debug)]
struct SessionControl {
    running: AtomicBool,
    paused: AtomicBool,
    speed: AtomicU32,
    loops: AtomicU32,
    frames_sent: AtomicU64,
    frames_rejected: AtomicU64,
}

impl SessionControl {
    fn new(speed: f32) -> Self {
        Self {
            running: AtomicBool::new(true),
            paused: AtomicBool::new(false),
            speed: AtomicU32::new(speed.to_bits()),
            loops: AtomicU32::new(0),
            frames_sent: AtomicU64::new(0),
            frames_rejected: AtomicU64::new(0),
        }
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    fn speed(&self) -> f32 {
        f32::from_bits(self.speed.load(Ordering::Relaxed))
    }
}

struct SessionHandle {
    id: SessionId,
    name: String,
    kind: SessionKind,
    control: Arc<SessionControl>,
    worker: Worker,
}

/// Everything the session thread owns
struct SessionContext {
    id: SessionId,
    name: String,
    kind: SessionKind,
    source: Box<dyn FrameSource>,
    settings: SessionSettings,
    control: Arc<SessionControl>,
    renderer: FrameRenderer,
    transmitter: Arc<ArtNetTransmitter>,
    active_id: Arc<AtomicU64>,
    state: Arc<Mutex<SessionState>>,
    events: Sender<PlaybackEvent>,
}

impl SessionContext {
    fn is_active(&self) -> bool {
        self.control.is_running() && self.active_id.load(Ordering::Acquire) == self.id
    }

    fn run(mut self) {
        let origin = match self.kind {
            SessionKind::Replay => Origin::Replay,
            SessionKind::Video | SessionKind::Generator => Origin::Video,
        };
        // Without an explicit or source rate the session follows the
        // transmitter, which can be retuned while playing
        let fixed_fps = self.settings.fps_limit.or_else(|| self.source.fps());
        let fps = self.current_fps(fixed_fps);
        let mut pacer = FramePacer::new(fps, self.control.speed(), Instant::now());
        let mut loops = 0u32;
        let mut frames_in_pass = 0u64;
        info!(
            "Session {} '{}' pacing at {:.2} fps x {}",
            self.id,
            self.name,
            fps,
            self.control.speed()
        );

        while self.control.is_running() {
            if self.control.paused.load(Ordering::Acquire) {
                thread::sleep(PAUSE_POLL);
                pacer.restart(Instant::now());
                continue;
            }
            pacer.set_rate(self.current_fps(fixed_fps), self.control.speed());

            let frame = match self.source.next_frame() {
                Some(frame) => frame,
                None => {
                    loops += 1;
                    self.control.loops.store(loops, Ordering::Relaxed);
                    let limit_reached = self.settings.max_loops > 0 && loops >= self.settings.max_loops;
                    if limit_reached || frames_in_pass == 0 || !self.source.rewind() {
                        self.complete(loops);
                        return;
                    }
                    debug!("Session {} starting pass {}", self.id, loops + 1);
                    frames_in_pass = 0;
                    continue;
                }
            };
            frames_in_pass += 1;

            if !self.is_active() {
                break;
            }
            let accepted = match &frame {
                SourceFrame::Rgb(rgb) => {
                    let dmx = self.renderer.render(rgb);
                    self.transmitter.send_session_frame(self.id, dmx, origin)
                }
                SourceFrame::Dmx(dmx) => self.transmitter.send_session_frame(self.id, dmx, origin),
            };
            if !self.is_active() {
                break;
            }
            let counter = if accepted {
                &self.control.frames_sent
            } else {
                &self.control.frames_rejected
            };
            counter.fetch_add(1, Ordering::Relaxed);

            let wait = pacer.advance(Instant::now());
            self.sleep(wait);
        }
        debug!("Session {} '{}' loop exited", self.id, self.name);
    }

    fn current_fps(&self, fixed_fps: Option<f32>) -> f32 {
        fixed_fps.unwrap_or_else(|| self.transmitter.get_fps() as f32)
    }

    /// Sleep in slices so a stop request is seen promptly
    fn sleep(&self, wait: Duration) {
        let until = Instant::now() + wait;
        loop {
            let now = Instant::now();
            if now >= until || !self.control.is_running() {
                return;
            }
            thread::sleep((until - now).min(SLEEP_SLICE));
        }
    }

    /// Deregister after the last pass, unless a newer session took over
    fn complete(&self, loops: u32) {
        let deregistered = {
            let mut state = self.state.lock();
            let won = self
                .active_id
                .compare_exchange(self.id, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_ok();
            if won {
                *state = SessionState::Idle;
            }
            won
        };
        if !deregistered {
            return;
        }

        self.transmitter.deactivate_session(self.id);
        if self.kind == SessionKind::Replay && self.transmitter.active_priority() == Priority::Replay {
            self.transmitter.resume_video_mode();
        }
        info!(
            "Session {} '{}' completed after {} passes",
            self.id, self.name, loops
        );
        let _ = self.events.send(PlaybackEvent::Completed {
            id: self.id,
            name: self.name.clone(),
            loops,
        });
    }
}

/// Owns the one active playback session
pub struct PlaybackSupervisor {
    transmitter: Arc<ArtNetTransmitter>,
    layout: Arc<PointLayout>,
    corrector: ColorCorrector,
    join_timeout: Duration,
    active: Mutex<Option<SessionHandle>>,
    active_id: Arc<AtomicU64>,
    state: Arc<Mutex<SessionState>>,
    next_id: AtomicU64,
    events_tx: Sender<PlaybackEvent>,
    events_rx: Receiver<PlaybackEvent>,
}

impl PlaybackSupervisor {
    pub fn new(
        transmitter: Arc<ArtNetTransmitter>,
        layout: Arc<PointLayout>,
        corrector: ColorCorrector,
        join_timeout: Duration,
    ) -> Self {
        let (events_tx, events_rx) = unbounded();
        Self {
            transmitter,
            layout,
            corrector,
            join_timeout,
            active: Mutex::new(None),
            active_id: Arc::new(AtomicU64::new(0)),
            state: Arc::new(Mutex::new(SessionState::Idle)),
            next_id: AtomicU64::new(1),
            events_tx,
            events_rx,
        }
    }

    pub fn transmitter(&self) -> &Arc<ArtNetTransmitter> {
        &self.transmitter
    }

    /// Replace whatever is playing with `session`
    pub fn start(&self, session: PlaybackSession) -> Result<SessionId> {
        let PlaybackSession {
            name,
            kind,
            source,
            settings,
        } = session;
        validate_speed(settings.speed)?;

        let mut active = self.active.lock();

        // Deregister first so the old thread's activity checks fail at once
        let registered = self.active_id.swap(0, Ordering::AcqRel);
        if let Some(previous) = active.take() {
            if previous.id == registered {
                self.set_state(SessionState::Stopping);
                self.stop_handle(previous);
            } else {
                previous.worker.join_timeout(self.join_timeout);
            }
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        // Held until the session is fully registered, so the thread cannot
        // report completion before `Started` is out
        let mut state = self.state.lock();
        *state = SessionState::Starting;
        self.active_id.store(id, Ordering::Release);
        self.transmitter.activate_session(id);
        self.transmitter.resume_video_mode();
        if kind == SessionKind::Replay && !self.transmitter.enter_replay_mode() {
            warn!("Replay session {} started while a test pattern holds the wire", id);
        }

        let control = Arc::new(SessionControl::new(settings.speed));
        let context = SessionContext {
            id,
            name: name.clone(),
            kind,
            source,
            settings,
            control: control.clone(),
            renderer: FrameRenderer::new(self.layout.clone(), self.corrector.clone()),
            transmitter: self.transmitter.clone(),
            active_id: self.active_id.clone(),
            state: self.state.clone(),
            events: self.events_tx.clone(),
        };

        let worker = match Worker::spawn(format!("playback-{}", id), move || context.run()) {
            Ok(worker) => worker,
            Err(e) => {
                self.active_id.store(0, Ordering::Release);
                self.transmitter.deactivate_session(id);
                *state = SessionState::Idle;
                return Err(e.into());
            }
        };

        info!("Started {:?} session {} '{}'", kind, id, name);
        *active = Some(SessionHandle {
            id,
            name: name.clone(),
            kind,
            control,
            worker,
        });
        *state = SessionState::Running;
        let _ = self.events_tx.send(PlaybackEvent::Started { id, name });
        Ok(id)
    }

    /// Stop the active session. Returns `false` if nothing was playing.
    pub fn stop(&self) -> bool {
        let mut active = self.active.lock();
        let Some(handle) = active.take() else {
            return false;
        };
        let was_active = self
            .active_id
            .compare_exchange(handle.id, 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok();
        if !was_active {
            // Completed on its own; only the thread is left to reap
            handle.worker.join_timeout(self.join_timeout);
            return false;
        }

        self.set_state(SessionState::Stopping);
        let kind = handle.kind;
        self.stop_handle(handle);
        if kind == SessionKind::Replay && self.transmitter.active_priority() == Priority::Replay {
            self.transmitter.resume_video_mode();
        }
        self.set_state(SessionState::Idle);
        true
    }

    pub fn pause(&self) -> bool {
        self.with_active(|handle| {
            handle.control.paused.store(true, Ordering::Release);
            info!("Paused session {}", handle.id);
        })
    }

    pub fn resume(&self) -> bool {
        self.with_active(|handle| {
            handle.control.paused.store(false, Ordering::Release);
            info!("Resumed session {}", handle.id);
        })
    }

    /// Change the speed multiplier of the active session
    pub fn set_speed(&self, speed: f32) -> Result<bool> {
        validate_speed(speed)?;
        Ok(self.with_active(|handle| {
            handle.control.speed.store(speed.to_bits(), Ordering::Relaxed);
            debug!("Session {} speed set to {}", handle.id, speed);
        }))
    }

    pub fn state(&self) -> SessionState {
        *self.state.lock()
    }

    pub fn active_session(&self) -> Option<SessionInfo> {
        let active = self.active.lock();
        let handle = active.as_ref()?;
        if self.active_id.load(Ordering::Acquire) != handle.id {
            return None;
        }
        let control = &handle.control;
        Some(SessionInfo {
            id: handle.id,
            name: handle.name.clone(),
            kind: handle.kind,
            paused: control.paused.load(Ordering::Acquire),
            speed: control.speed(),
            loops: control.loops.load(Ordering::Relaxed),
            frames_sent: control.frames_sent.load(Ordering::Relaxed),
            frames_rejected: control.frames_rejected.load(Ordering::Relaxed),
        })
    }

    /// Lifecycle events of every session
    pub fn events(&self) -> Receiver<PlaybackEvent> {
        self.events_rx.clone()
    }

    /// Stop playback and shut the transmitter down
    pub fn shutdown(&self) {
        self.stop();
        self.transmitter.shutdown();
        info!("Playback supervisor shut down");
    }

    fn with_active(&self, f: impl FnOnce(&SessionHandle)) -> bool {
        let active = self.active.lock();
        match active.as_ref() {
            Some(handle) if self.active_id.load(Ordering::Acquire) == handle.id => {
                f(handle);
                true
            }
            _ => false,
        }
    }

    fn set_state(&self, state: SessionState) {
        *self.state.lock() = state;
    }

    /// Second phase of a stop; the id is already deregistered
    fn stop_handle(&self, handle: SessionHandle) {
        handle.control.running.store(false, Ordering::Release);
        self.transmitter.deactivate_session(handle.id);
        handle.worker.join_timeout(self.join_timeout);
        info!("Stopped session {} '{}'", handle.id, handle.name);
        let _ = self.events_tx.send(PlaybackEvent::Stopped {
            id: handle.id,
            name: handle.name,
        });
    }
}

impl Drop for PlaybackSupervisor {
    fn drop(&mut self) {
        self.stop();
    }
}

fn validate_speed(speed: f32) -> Result<()> {
    if speed.is_finite() && speed > 0.0 {
        Ok(())
    } else {
        Err(MediaError::InvalidParameter(format!(
            "speed must be positive, got {}",
            speed
        )))
    }
}
