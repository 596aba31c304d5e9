//! Typed state machine for runs and interview branches
//!
//! The original graph-execution model with implicit state-merge reducers is
//! replaced here by explicit, serializable state trees: every step reads and
//! writes named fields, and the whole tree is what a checkpoint persists.

use roundtable_core::{Analyst, EvidenceSnippet, ReportDocument, Section, Turn};
use serde::{Deserialize, Serialize};

/// Top-level phase of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunPhase {
    /// Analyst roster is being (re)generated
    AwaitingAnalysts,
    /// Suspended, awaiting operator confirmation or feedback on the roster
    PausedForConfirmation,
    /// Interview branches are executing in parallel
    Interviewing,
    /// Finalization writers and report assembly
    Assembling,
    /// Final document produced
    Done,
    /// Every interview branch failed; the run is terminal but inspectable
    Failed,
}

impl RunPhase {
    /// Step name recorded on checkpoints taken in this phase
    pub fn step_name(&self) -> &'static str {
        match self {
            RunPhase::AwaitingAnalysts => "create_analysts",
            RunPhase::PausedForConfirmation => "confirm_analysts",
            RunPhase::Interviewing => "conduct_interviews",
            RunPhase::Assembling => "finalize_report",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        }
    }

    /// Terminal phases reject further `advance` calls
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Done | RunPhase::Failed)
    }
}

/// Stage of one interview branch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterviewStage {
    /// Generate the next interviewer question
    Ask,
    /// Derive a search query and fan out to all providers
    Retrieve,
    /// Generate the expert answer over accumulated evidence
    Answer,
    /// Linearize the transcript
    Save,
    /// Write the final section for this branch
    WriteSection,
    Done,
    Failed,
}

/// One parallel interview branch owned by a run
///
/// Each branch owns its transcript and evidence exclusively while executing;
/// the engine only sees the state the branch sends back by value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterviewState {
    pub analyst: Analyst,
    pub stage: InterviewStage,
    /// Strictly ordered transcript of turns
    pub turns: Vec<Turn>,
    /// Accumulated evidence snippets, append-only
    pub evidence: Vec<EvidenceSnippet>,
    /// Expert answers produced so far; the seeded opener is not counted
    pub expert_turns: usize,
    /// Linearized transcript, set once when the conversation ends
    pub transcript: Option<String>,
    /// Section text, set exactly once at termination
    pub section: Option<String>,
    /// Set on the first transition into `Done` or `Failed`
    pub terminal: bool,
    /// Failure reason when the branch could not complete
    pub failure: Option<String>,
}

impl InterviewState {
    /// Create a fresh branch for one analyst, seeding the conversation with
    /// the expert's opening line.
    pub fn new(analyst: Analyst, topic: &str) -> Self {
        Self {
            analyst,
            stage: InterviewStage::Ask,
            turns: vec![Turn::expert(format!(
                "So you said you were writing an article on {}?",
                topic
            ))],
            evidence: Vec::new(),
            expert_turns: 0,
            transcript: None,
            section: None,
            terminal: false,
            failure: None,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.terminal
    }
}

/// Full state tree of one run; serialized whole into every checkpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunState {
    pub run_id: String,
    pub topic: String,
    /// Requested roster size
    pub analyst_count: usize,
    pub phase: RunPhase,
    pub analysts: Vec<Analyst>,
    /// Operator feedback attached while paused. Consumed by the next
    /// `advance`: empty means accept, non-empty steers roster regeneration.
    pub analyst_feedback: Option<String>,
    pub interviews: Vec<InterviewState>,
    pub report: ReportDocument,
}

impl RunState {
    pub fn new(run_id: String, topic: impl Into<String>, analyst_count: usize) -> Self {
        Self {
            run_id,
            topic: topic.into(),
            analyst_count,
            phase: RunPhase::AwaitingAnalysts,
            analysts: Vec::new(),
            analyst_feedback: None,
            interviews: Vec::new(),
            report: ReportDocument::default(),
        }
    }

    /// Sections from completed branches, in branch order
    pub fn sections(&self) -> Vec<Section> {
        self.interviews
            .iter()
            .enumerate()
            .filter_map(|(interview, state)| {
                state.section.as_ref().map(|text| Section {
                    interview,
                    text: text.clone(),
                })
            })
            .collect()
    }

    /// Branches recorded as failed
    pub fn failed_interviews(&self) -> usize {
        self.interviews
            .iter()
            .filter(|i| i.stage == InterviewStage::Failed)
            .count()
    }
}

/// Data surfaced to the external operator at the confirmation pause
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PausePoint {
    pub run_id: String,
    /// Name of the step the run is paused at
    pub step: String,
    pub message: String,
    /// The generated roster awaiting confirmation
    pub analysts: Vec<Analyst>,
}

/// Read-only view of a run returned by `advance`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSnapshot {
    pub run_id: String,
    pub topic: String,
    pub phase: RunPhase,
    pub version: u64,
    pub analysts: Vec<Analyst>,
    pub completed_sections: usize,
    pub failed_interviews: usize,
    pub final_report: Option<String>,
}

/// Result of driving a run forward
#[derive(Debug, Clone)]
pub enum AdvanceOutcome {
    /// The run suspended at a pause step awaiting external input
    Paused(PausePoint),
    /// The run reached a terminal phase
    Completed(RunSnapshot),
}
