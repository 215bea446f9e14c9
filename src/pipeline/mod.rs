//! Capture session management
//!
//! This module owns the recording state machine and the session actor that
//! drives it. Two independent periodic sources, the ~60 Hz level monitor and
//! the 100 ms pause ticker, plus the user's start/stop intents all funnel
//! through one serialized event queue; the actor is the only thing that
//! touches recording state, the recorder gate and the pending segment buffer.

pub mod session;
pub mod state;

pub use session::{Pipeline, PipelineEvent, PipelineHandle, PipelineStatus};
pub use state::{Action, RecordingState, StateMachine, PAUSE_STEP_MS};
