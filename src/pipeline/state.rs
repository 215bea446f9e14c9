// Recording state machine
//
// Pure value type: consumes user intents, sound/silence classifications and
// pause-counter ticks, and emits the actions the session actor must execute.
// Keeping it synchronous and side-effect free makes every transition in the
// table directly testable.

use serde::Serialize;

/// Recording pipeline state. Exactly one is active at a time.
///
/// Invariant: the recorder is actively capturing iff the state is
/// `Recording` or `CountingDown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordingState {
    /// Not listening; classifications are ignored.
    Idle,
    /// User started the session; waiting for the first sound.
    Armed,
    /// Sound detected; frames are accumulating.
    Recording,
    /// Silence while recording; the pause counter is running.
    CountingDown,
}

/// Side effects the session actor must carry out after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    StartRecorder,
    StopRecorder,
    StartPauseTicker,
    CancelPauseTicker,
}

/// How much silence each pause tick represents.
pub const PAUSE_STEP_MS: u64 = 100;

pub struct StateMachine {
    state: RecordingState,
    pause_ms: u64,
    max_pause_ms: u64,
}

impl StateMachine {
    pub fn new(max_pause_ms: u64) -> Self {
        Self {
            state: RecordingState::Idle,
            pause_ms: 0,
            max_pause_ms,
        }
    }

    pub fn state(&self) -> RecordingState {
        self.state
    }

    pub fn pause_ms(&self) -> u64 {
        self.pause_ms
    }

    /// True iff the recorder should currently be capturing.
    pub fn recorder_active(&self) -> bool {
        matches!(
            self.state,
            RecordingState::Recording | RecordingState::CountingDown
        )
    }

    /// User pressed start. Only meaningful from Idle.
    pub fn on_start_intent(&mut self) -> Vec<Action> {
        match self.state {
            RecordingState::Idle => {
                self.state = RecordingState::Armed;
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    /// User pressed stop. Idempotent from Idle; flushes the recorder if it
    /// was running.
    pub fn on_stop_intent(&mut self) -> Vec<Action> {
        match self.state {
            RecordingState::Idle => Vec::new(),
            RecordingState::Armed => {
                self.state = RecordingState::Idle;
                self.pause_ms = 0;
                vec![Action::CancelPauseTicker]
            }
            RecordingState::Recording | RecordingState::CountingDown => {
                self.state = RecordingState::Idle;
                self.pause_ms = 0;
                vec![Action::CancelPauseTicker, Action::StopRecorder]
            }
        }
    }

    /// One sound/silence classification from the level monitor.
    pub fn on_classification(&mut self, sound_detected: bool) -> Vec<Action> {
        match (self.state, sound_detected) {
            // Idle ignores all classifications.
            (RecordingState::Idle, _) => Vec::new(),

            (RecordingState::Armed, true) => {
                self.state = RecordingState::Recording;
                self.pause_ms = 0;
                vec![Action::StartRecorder]
            }
            (RecordingState::Armed, false) => Vec::new(),

            (RecordingState::Recording, true) => Vec::new(),
            (RecordingState::Recording, false) => {
                self.state = RecordingState::CountingDown;
                self.pause_ms = 0;
                vec![Action::StartPauseTicker]
            }

            (RecordingState::CountingDown, true) => {
                self.state = RecordingState::Recording;
                self.pause_ms = 0;
                vec![Action::CancelPauseTicker]
            }
            (RecordingState::CountingDown, false) => Vec::new(),
        }
    }

    /// One pause-counter tick. Ticks arriving in any state other than
    /// CountingDown are stale (a cancel already happened) and are ignored.
    pub fn on_pause_tick(&mut self) -> Vec<Action> {
        if self.state != RecordingState::CountingDown {
            return Vec::new();
        }

        self.pause_ms += PAUSE_STEP_MS;

        if self.pause_ms >= self.max_pause_ms {
            self.state = RecordingState::Armed;
            self.pause_ms = 0;
            vec![Action::CancelPauseTicker, Action::StopRecorder]
        } else {
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn armed_machine() -> StateMachine {
        let mut machine = StateMachine::new(3000);
        machine.on_start_intent();
        machine
    }

    #[test]
    fn starts_idle_and_arms_on_start() {
        let mut machine = StateMachine::new(3000);
        assert_eq!(machine.state(), RecordingState::Idle);

        let actions = machine.on_start_intent();
        assert_eq!(machine.state(), RecordingState::Armed);
        assert!(actions.is_empty());
    }

    #[test]
    fn idle_ignores_classifications() {
        let mut machine = StateMachine::new(3000);
        assert!(machine.on_classification(true).is_empty());
        assert!(machine.on_classification(false).is_empty());
        assert_eq!(machine.state(), RecordingState::Idle);
    }

    #[test]
    fn sound_while_armed_starts_recorder() {
        let mut machine = armed_machine();
        let actions = machine.on_classification(true);
        assert_eq!(machine.state(), RecordingState::Recording);
        assert_eq!(actions, vec![Action::StartRecorder]);
        assert!(machine.recorder_active());
    }

    #[test]
    fn silence_while_armed_keeps_waiting() {
        let mut machine = armed_machine();
        assert!(machine.on_classification(false).is_empty());
        assert_eq!(machine.state(), RecordingState::Armed);
        assert!(!machine.recorder_active());
    }

    #[test]
    fn silence_while_recording_starts_countdown() {
        let mut machine = armed_machine();
        machine.on_classification(true);

        let actions = machine.on_classification(false);
        assert_eq!(machine.state(), RecordingState::CountingDown);
        assert_eq!(actions, vec![Action::StartPauseTicker]);
        assert!(machine.recorder_active(), "countdown still captures");
    }

    #[test]
    fn sound_during_countdown_resets_pause_counter() {
        let mut machine = armed_machine();
        machine.on_classification(true);
        machine.on_classification(false);
        machine.on_pause_tick();
        machine.on_pause_tick();
        assert_eq!(machine.pause_ms(), 200);

        let actions = machine.on_classification(true);
        assert_eq!(machine.state(), RecordingState::Recording);
        assert_eq!(actions, vec![Action::CancelPauseTicker]);
        assert_eq!(machine.pause_ms(), 0, "counter resets to zero");
    }

    #[test]
    fn pause_expiry_flushes_back_to_armed() {
        let mut machine = armed_machine();
        machine.on_classification(true);
        machine.on_classification(false);

        // 3000ms of pause at 100ms per tick.
        let mut actions = Vec::new();
        for _ in 0..30 {
            actions = machine.on_pause_tick();
        }

        assert_eq!(machine.state(), RecordingState::Armed);
        assert_eq!(
            actions,
            vec![Action::CancelPauseTicker, Action::StopRecorder]
        );
        assert!(!machine.recorder_active());
    }

    #[test]
    fn countdown_never_skips_to_idle() {
        let mut machine = armed_machine();
        machine.on_classification(true);
        machine.on_classification(false);

        for _ in 0..100 {
            machine.on_pause_tick();
            assert_ne!(machine.state(), RecordingState::Idle);
        }
    }

    #[test]
    fn stop_while_recording_flushes_once() {
        let mut machine = armed_machine();
        machine.on_classification(true);

        let actions = machine.on_stop_intent();
        assert_eq!(machine.state(), RecordingState::Idle);
        assert_eq!(
            actions
                .iter()
                .filter(|a| **a == Action::StopRecorder)
                .count(),
            1
        );
    }

    #[test]
    fn stop_while_armed_flushes_nothing() {
        let mut machine = armed_machine();
        let actions = machine.on_stop_intent();
        assert_eq!(machine.state(), RecordingState::Idle);
        assert!(!actions.contains(&Action::StopRecorder));
    }

    #[test]
    fn stop_while_idle_is_a_no_op() {
        let mut machine = StateMachine::new(3000);
        assert!(machine.on_stop_intent().is_empty());
        assert_eq!(machine.state(), RecordingState::Idle);
    }

    #[test]
    fn stale_pause_ticks_are_ignored() {
        let mut machine = armed_machine();
        machine.on_classification(true);
        // Tick arrives after the countdown was cancelled.
        assert!(machine.on_pause_tick().is_empty());
        assert_eq!(machine.pause_ms(), 0);
    }

    #[test]
    fn recorder_active_tracks_state_for_any_sequence() {
        let mut machine = StateMachine::new(300);
        let inputs = [true, false, true, true, false, false, false, true, false];

        machine.on_start_intent();
        for &sound in &inputs {
            machine.on_classification(sound);
            machine.on_pause_tick();
            let active = matches!(
                machine.state(),
                RecordingState::Recording | RecordingState::CountingDown
            );
            assert_eq!(machine.recorder_active(), active);
        }
    }
}
