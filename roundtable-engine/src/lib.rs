//! Roundtable Engine - Workflow orchestration for parallel analyst interviews
//!
//! This crate drives the report pipeline on top of the capability seams
//! defined in roundtable-core:
//!
//! - Analyst roster generation with an operator confirmation pause
//! - Fan-out of one interview branch per analyst, joined before finalization
//! - Concurrent introduction / body / conclusion writers
//! - Deterministic report assembly
//! - Durable, resumable run state through a checkpoint store
//!
//! ## Architecture
//!
//! The engine follows a clear separation between:
//! - **Capabilities** (roundtable-core): text generation, search, storage
//! - **Orchestration** (this crate): state machines, fan-out/fan-in, resume
//! - **Adapters** (callers): concrete backends plugged in behind the traits

pub mod assembler;
pub mod checkpoint;
pub mod engine;
pub mod interview;
pub mod prompts;
pub mod state;

pub use assembler::assemble_report;
pub use checkpoint::{FileCheckpointStore, MemoryCheckpointStore};
pub use engine::ReportEngine;
pub use interview::{BranchEvent, InterviewContext, TERMINATION_PHRASE};
pub use state::{
    AdvanceOutcome, InterviewStage, InterviewState, PausePoint, RunPhase, RunSnapshot, RunState,
};

/// Engine-level error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Run not found: {run_id}")]
    RunNotFound { run_id: String },

    #[error("Run aborted: {run_id}")]
    Aborted { run_id: String },

    #[error("Core error: {0}")]
    Core(#[from] roundtable_core::RoundtableError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;

impl EngineError {
    /// Create an invalid-input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create an invalid-state error
    pub fn invalid_state<S: Into<String>>(message: S) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }
}
