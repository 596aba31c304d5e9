//! Core data model shared by the engine and its capability adapters

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A generated analyst persona
///
/// Immutable once the roster is confirmed; interviews reference analysts by
/// roster position, not by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Analyst {
    /// Name of the analyst
    pub name: String,
    /// Role of the analyst in the context of the topic
    pub role: String,
    /// Primary affiliation of the analyst
    pub affiliation: String,
    /// Description of the analyst focus, concerns and motives
    pub description: String,
}

impl Analyst {
    /// Render the persona block injected into generation prompts
    pub fn persona(&self) -> String {
        format!(
            "Name: {}\nRole: {}\nAffiliation: {}\nDescription: {}\n",
            self.name, self.role, self.affiliation, self.description
        )
    }
}

/// Speaker tag for one transcript turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Speaker {
    Interviewer,
    Expert,
}

impl std::fmt::Display for Speaker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Speaker::Interviewer => write!(f, "Interviewer"),
            Speaker::Expert => write!(f, "Expert"),
        }
    }
}

/// One turn of an interview transcript
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

impl Turn {
    pub fn interviewer(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Interviewer,
            text: text.into(),
        }
    }

    pub fn expert(text: impl Into<String>) -> Self {
        Self {
            speaker: Speaker::Expert,
            text: text.into(),
        }
    }
}

/// A retrieved block of text with its provenance tag
///
/// Append-only; never mutated after insertion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceSnippet {
    /// Retrieved document content
    pub content: String,
    /// Source identifier: URL or document title
    pub source: String,
}

/// A ranked document returned by a search provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchDocument {
    pub content: String,
    pub source_identifier: String,
}

/// A block of written text attributed to one interview branch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    /// Index of the interview branch that produced this section
    pub interview: usize,
    pub text: String,
}

/// The report under assembly
///
/// All fields optional until populated; the final text is only produced once
/// introduction, body and conclusion are all present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub introduction: Option<String>,
    pub body: Option<String>,
    pub conclusion: Option<String>,
    pub final_text: Option<String>,
}

impl ReportDocument {
    /// All three inputs of final assembly are present
    pub fn is_ready(&self) -> bool {
        self.introduction.is_some() && self.body.is_some() && self.conclusion.is_some()
    }
}

/// An immutable snapshot of a run's full state tree
///
/// Tagged with a monotonically increasing version and the name of the step
/// the run is paused at; self-contained, with no cross-run references.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint<S> {
    /// Monotonically increasing snapshot version
    pub version: u64,
    /// Name of the step the run is paused at
    pub step: String,
    /// When the snapshot was taken
    pub created_at: DateTime<Utc>,
    /// The full state tree
    pub state: S,
}

impl<S> Checkpoint<S> {
    pub fn new(version: u64, step: impl Into<String>, state: S) -> Self {
        Self {
            version,
            step: step.into(),
            created_at: Utc::now(),
            state,
        }
    }
}
