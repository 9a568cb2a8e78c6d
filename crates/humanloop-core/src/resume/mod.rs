//! Resume protocol: the engine callback contract and the coordinator that
//! drives a pause through submission to completion or the next pause.

pub mod callback;
pub mod coordinator;

pub use callback::{
    CallbackError, NextPause, ResumeCallback, ResumeOutcome, ResumePayload, ResumeResponse,
};
pub use coordinator::{
    ExecutionSummary, InputStatusView, PauseRequest, ResumeCoordinator, SubmitInput,
    SubmitOutcome,
};
