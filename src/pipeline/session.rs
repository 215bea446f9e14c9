use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::state::{Action, RecordingState, StateMachine, PAUSE_STEP_MS};
use crate::audio::{
    AudioFrame, Classification, MicrophoneBackend, SegmentAssembler, SpectrumAnalyser,
};
use crate::config::CaptureSettings;
use crate::transcribe::{Dispatcher, TranscriptResult};

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Everything that can mutate the recording state funnels through this queue.
/// The two periodic producers (level monitor, pause ticker) and the user
/// intents only ever enqueue; the actor task applies transitions one at a
/// time, so no tick can observe a half-applied transition.
#[derive(Debug)]
pub enum PipelineEvent {
    StartIntent,
    StopIntent,
    Classified(Classification),
    PauseTick,
}

/// Read-only snapshot for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineStatus {
    pub session_id: String,
    pub state: RecordingState,
    pub in_flight: usize,
    pub segments_recorded: usize,
    pub results: usize,
    pub device_error: bool,
    pub duration_secs: u64,
}

struct PipelineShared {
    session_id: String,
    state: RwLock<RecordingState>,
    segments_recorded: AtomicUsize,
    device_error: AtomicBool,
}

/// Cloneable handle to a running capture session.
#[derive(Clone)]
pub struct PipelineHandle {
    events: mpsc::Sender<PipelineEvent>,
    shared: Arc<PipelineShared>,
    dispatcher: Dispatcher,
    cancel: CancellationToken,
    duration_secs: u64,
}

impl PipelineHandle {
    /// User pressed start.
    pub async fn start_intent(&self) {
        self.send(PipelineEvent::StartIntent).await;
    }

    /// User pressed stop. Safe to call on an already-idle pipeline.
    pub async fn stop_intent(&self) {
        self.send(PipelineEvent::StopIntent).await;
    }

    async fn send(&self, event: PipelineEvent) {
        if self.device_error() {
            debug!("Pipeline never started; dropping {:?}", event);
            return;
        }
        if self.events.send(event).await.is_err() {
            debug!("Pipeline actor gone; event dropped");
        }
    }

    pub fn device_error(&self) -> bool {
        self.shared.device_error.load(Ordering::SeqCst)
    }

    pub async fn state(&self) -> RecordingState {
        *self.shared.state.read().await
    }

    pub async fn status(&self) -> PipelineStatus {
        PipelineStatus {
            session_id: self.shared.session_id.clone(),
            state: *self.shared.state.read().await,
            in_flight: self.dispatcher.in_flight(),
            segments_recorded: self.shared.segments_recorded.load(Ordering::SeqCst),
            results: self.dispatcher.result_count().await,
            device_error: self.device_error(),
            duration_secs: self.duration_secs,
        }
    }

    /// Transcript results ordered by segment identity ascending.
    pub async fn results(&self) -> Vec<TranscriptResult> {
        self.dispatcher.results().await
    }

    pub async fn result(&self, id: crate::audio::SegmentId) -> Option<TranscriptResult> {
        self.dispatcher.result(id).await
    }

    /// Tear the whole pipeline down: aborts in-flight dispatches, the level
    /// monitor, the pause ticker and the actor. Idempotent.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

/// Capture pipeline launcher.
pub struct Pipeline;

impl Pipeline {
    /// Start a capture session: microphone backend, level monitor, state
    /// machine actor. On microphone failure the session never starts; the
    /// returned handle carries a persistent device-error flag and all
    /// intents become no-ops.
    pub async fn launch(
        settings: CaptureSettings,
        mut backend: Box<dyn MicrophoneBackend>,
        dispatcher: Dispatcher,
        cancel: CancellationToken,
    ) -> PipelineHandle {
        let session_id = format!("session-{}", uuid::Uuid::new_v4());

        let shared = Arc::new(PipelineShared {
            session_id: session_id.clone(),
            state: RwLock::new(RecordingState::Idle),
            segments_recorded: AtomicUsize::new(0),
            device_error: AtomicBool::new(false),
        });

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let handle = PipelineHandle {
            events: events_tx.clone(),
            shared: Arc::clone(&shared),
            dispatcher: dispatcher.clone(),
            cancel: cancel.clone(),
            duration_secs: settings.duration_secs,
        };

        let frame_rx = match backend.start().await {
            Ok(rx) => rx,
            Err(e) => {
                error!("Microphone unavailable, pipeline not started: {:#}", e);
                shared.device_error.store(true, Ordering::SeqCst);
                return handle;
            }
        };

        let analyser = SpectrumAnalyser::new(settings.fft_size, settings.min_decibels);
        let (latest_tx, latest_rx) = watch::channel(None::<AudioFrame>);

        spawn_monitor(
            analyser,
            latest_rx,
            events_tx.clone(),
            cancel.child_token(),
            settings.monitor_interval_ms,
        );

        let actor = Actor {
            machine: StateMachine::new(settings.max_pause_ms),
            assembler: SegmentAssembler::new(16000, 1),
            dispatcher,
            shared,
            events_tx,
            cancel: cancel.clone(),
            ticker: None,
            auto_segments: 0,
            max_auto_segments: settings.max_auto_segments,
        };

        tokio::spawn(run_actor(actor, backend, frame_rx, events_rx, latest_tx));

        info!("Capture session {} started", session_id);

        handle
    }
}

/// Pause counter: a fixed-interval ticker that only ever enqueues events.
/// Cancelling twice is safe; the token is a no-op once triggered and the
/// slot is empty after the first take.
struct PauseTicker {
    cancel: CancellationToken,
}

impl PauseTicker {
    fn cancel(self) {
        self.cancel.cancel();
    }
}

fn spawn_pause_ticker(
    events: mpsc::Sender<PipelineEvent>,
    parent: &CancellationToken,
) -> PauseTicker {
    let cancel = parent.child_token();
    let token = cancel.clone();

    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(PAUSE_STEP_MS));
        // The first interval tick completes immediately; the counter must
        // only start accumulating one step from now.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = interval.tick() => {
                    if events.send(PipelineEvent::PauseTick).await.is_err() {
                        break;
                    }
                }
            }
        }
    });

    PauseTicker { cancel }
}

/// Level monitor: classifies the most recent frame on a ~60 Hz cadence and
/// feeds the verdicts into the event queue. Runs for the life of the
/// pipeline; a cancelled monitor is not restartable.
fn spawn_monitor(
    analyser: SpectrumAnalyser,
    latest: watch::Receiver<Option<AudioFrame>>,
    events: mpsc::Sender<PipelineEvent>,
    token: CancellationToken,
    interval_ms: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_millis(interval_ms.max(1)));

        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                _ = ticker.tick() => {
                    let classification = {
                        let frame = latest.borrow();
                        match frame.as_ref() {
                            Some(f) => analyser.classify(&f.samples, f.channels),
                            None => Classification { sound_detected: false },
                        }
                    };

                    if events.send(PipelineEvent::Classified(classification)).await.is_err() {
                        break;
                    }
                }
            }
        }

        debug!("Level monitor stopped");
    })
}

struct Actor {
    machine: StateMachine,
    assembler: SegmentAssembler,
    dispatcher: Dispatcher,
    shared: Arc<PipelineShared>,
    events_tx: mpsc::Sender<PipelineEvent>,
    cancel: CancellationToken,
    ticker: Option<PauseTicker>,
    auto_segments: u32,
    max_auto_segments: u32,
}

async fn run_actor(
    mut actor: Actor,
    mut backend: Box<dyn MicrophoneBackend>,
    mut frame_rx: mpsc::Receiver<AudioFrame>,
    mut events_rx: mpsc::Receiver<PipelineEvent>,
    latest_tx: watch::Sender<Option<AudioFrame>>,
) {
    let cancel = actor.cancel.clone();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,

            maybe_frame = frame_rx.recv() => match maybe_frame {
                Some(frame) => {
                    if actor.machine.recorder_active() {
                        actor.assembler.on_chunk(frame.clone());
                    }
                    let _ = latest_tx.send(Some(frame));
                }
                None => {
                    warn!("Audio stream ended; closing capture session");
                    actor.handle_event(PipelineEvent::StopIntent).await;
                    break;
                }
            },

            maybe_event = events_rx.recv() => match maybe_event {
                Some(event) => actor.handle_event(event).await,
                None => break,
            },
        }
    }

    if let Some(ticker) = actor.ticker.take() {
        ticker.cancel();
    }

    // Recorder control errors during teardown are non-fatal.
    if let Err(e) = backend.stop().await {
        debug!("Recorder stop during teardown: {:#}", e);
    }

    info!("Capture session {} closed", actor.shared.session_id);
}

impl Actor {
    async fn handle_event(&mut self, event: PipelineEvent) {
        let (actions, auto_flush) = match event {
            PipelineEvent::StartIntent => {
                self.auto_segments = 0;
                (self.machine.on_start_intent(), false)
            }
            PipelineEvent::StopIntent => {
                self.auto_segments = 0;
                (self.machine.on_stop_intent(), false)
            }
            PipelineEvent::Classified(c) => (self.machine.on_classification(c.sound_detected), false),
            PipelineEvent::PauseTick => (self.machine.on_pause_tick(), true),
        };

        self.apply(actions, auto_flush);

        let state = self.machine.state();
        *self.shared.state.write().await = state;
    }

    fn apply(&mut self, actions: Vec<Action>, auto_flush: bool) {
        for action in actions {
            match action {
                Action::StartRecorder => {
                    info!("Utterance started");
                }
                Action::StopRecorder => {
                    self.flush_segment(auto_flush);
                }
                Action::StartPauseTicker => {
                    if let Some(old) = self.ticker.take() {
                        old.cancel();
                    }
                    self.ticker = Some(spawn_pause_ticker(self.events_tx.clone(), &self.cancel));
                }
                Action::CancelPauseTicker => {
                    if let Some(ticker) = self.ticker.take() {
                        ticker.cancel();
                    }
                }
            }
        }
    }

    /// Package the pending buffer into a segment and hand it off. When the
    /// flush was automatic (pause expiry) the consecutive-segment cap
    /// applies; the cap is this actor's job, not the state machine's.
    fn flush_segment(&mut self, auto_flush: bool) {
        match self.assembler.on_recorder_stop() {
            Ok(segment) => {
                self.shared.segments_recorded.fetch_add(1, Ordering::SeqCst);
                info!("Utterance {} cut ({} bytes)", segment.id, segment.wav.len());
                self.dispatcher.dispatch(segment);
            }
            Err(e) => {
                error!("Failed to package segment: {:#}", e);
            }
        }

        if auto_flush {
            self.auto_segments += 1;
            if self.auto_segments >= self.max_auto_segments {
                warn!(
                    "Reached {} consecutive automatic segments; stopping",
                    self.max_auto_segments
                );
                self.auto_segments = 0;

                // The machine is Armed after an automatic flush, so this
                // yields at most a ticker cancel, never a second segment.
                for action in self.machine.on_stop_intent() {
                    debug_assert_ne!(action, Action::StopRecorder);
                    if action == Action::CancelPauseTicker {
                        if let Some(ticker) = self.ticker.take() {
                            ticker.cancel();
                        }
                    }
                }
            }
        }
    }
}
