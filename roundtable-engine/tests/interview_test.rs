//! Interview branch tests: termination, ordering, and failure isolation

use async_trait::async_trait;
use roundtable_core::{
    Analyst, RetryConfig, RoundtableError, RoundtableResult, SearchDocument, SearchProvider,
    TextGenerator,
};
use roundtable_engine::interview::drive_interview;
use roundtable_engine::{
    BranchEvent, InterviewContext, InterviewStage, InterviewState, TERMINATION_PHRASE,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Generator with a scripted question sequence
struct ScriptedGenerator {
    questions: Vec<String>,
    asked: AtomicUsize,
    fail_answers: bool,
}

impl ScriptedGenerator {
    fn new(questions: Vec<&str>) -> Self {
        Self {
            questions: questions.into_iter().map(String::from).collect(),
            asked: AtomicUsize::new(0),
            fail_answers: false,
        }
    }

    fn failing_answers() -> Self {
        Self {
            fail_answers: true,
            ..Self::new(vec![])
        }
    }
}

#[async_trait]
impl TextGenerator for ScriptedGenerator {
    async fn generate(&self, prompt: &str) -> RoundtableResult<String> {
        if prompt.contains("You are an expert being interviewed") {
            if self.fail_answers {
                return Err(RoundtableError::service_unavailable(
                    "expert backend down",
                    "generator",
                ));
            }
            return Ok("Based on the sources, quite a lot [1].".to_string());
        }
        if prompt.contains("interviewing an expert") {
            let n = self.asked.fetch_add(1, Ordering::SeqCst);
            return Ok(self
                .questions
                .get(n)
                .cloned()
                .unwrap_or_else(|| "What else should readers know?".to_string()));
        }
        Ok("## Memo\nSection text [1].".to_string())
    }

    async fn generate_structured(&self, _prompt: &str, _schema: &Value) -> RoundtableResult<Value> {
        Ok(json!({ "search_query": "scripted query" }))
    }
}

struct FixedProvider {
    name: String,
    documents: Vec<SearchDocument>,
}

#[async_trait]
impl SearchProvider for FixedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn search(&self, _query: &str) -> RoundtableResult<Vec<SearchDocument>> {
        Ok(self.documents.clone())
    }
}

struct FailingProvider {
    calls: AtomicUsize,
}

#[async_trait]
impl SearchProvider for FailingProvider {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn search(&self, _query: &str) -> RoundtableResult<Vec<SearchDocument>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(RoundtableError::service_unavailable(
            "search backend down",
            "flaky",
        ))
    }
}

fn doc(content: &str, source: &str) -> SearchDocument {
    SearchDocument {
        content: content.to_string(),
        source_identifier: source.to_string(),
    }
}

fn two_providers() -> Vec<Arc<dyn SearchProvider>> {
    vec![
        Arc::new(FixedProvider {
            name: "alpha".to_string(),
            documents: vec![doc("a1", "https://alpha/1"), doc("a2", "https://alpha/2")],
        }),
        Arc::new(FixedProvider {
            name: "beta".to_string(),
            documents: vec![doc("b1", "beta:Entry")],
        }),
    ]
}

fn context(
    generator: Arc<dyn TextGenerator>,
    providers: Vec<Arc<dyn SearchProvider>>,
    max_turns: usize,
) -> Arc<InterviewContext> {
    Arc::new(InterviewContext {
        generator,
        providers,
        retry: RetryConfig::no_retry(),
        max_turns,
    })
}

fn analyst() -> Analyst {
    Analyst {
        name: "Ada".to_string(),
        role: "Historian".to_string(),
        affiliation: "Archive".to_string(),
        description: "Origins and evolution".to_string(),
    }
}

/// Run one branch to settlement, returning all events and the final state
async fn run_branch(ctx: Arc<InterviewContext>) -> (Vec<BranchEvent>, InterviewState) {
    let (tx, mut rx) = mpsc::channel(256);
    let state = InterviewState::new(analyst(), "the history of version control");
    drive_interview(ctx, 0, state, tx).await;

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    let last = events.last().cloned().expect("branch emitted no events");
    let state = match last {
        BranchEvent::Settled { state, .. } => state,
        other => panic!("branch did not settle: {:?}", other),
    };
    (events, state)
}

#[tokio::test]
async fn turn_cap_bounds_the_conversation() {
    let generator = Arc::new(ScriptedGenerator::new(vec![]));
    let ctx = context(generator, two_providers(), 3);

    let (_, state) = run_branch(ctx).await;
    assert_eq!(state.stage, InterviewStage::Done);
    assert!(state.terminal);
    assert_eq!(state.expert_turns, 3);
    // Seed turn plus one question/answer pair per round.
    assert_eq!(state.turns.len(), 7);
    assert!(state.transcript.is_some());
    assert!(state.section.is_some());
}

#[tokio::test]
async fn termination_phrase_ends_the_interview_early() {
    let closing = format!("{}! This has been great.", TERMINATION_PHRASE);
    let generator = Arc::new(ScriptedGenerator::new(vec!["Tell me more?", &closing]));
    let ctx = context(generator, two_providers(), 5);

    let (_, state) = run_branch(ctx).await;
    assert_eq!(state.stage, InterviewStage::Done);
    assert_eq!(state.expert_turns, 2);
}

#[tokio::test]
async fn evidence_preserves_provider_then_rank_order() {
    let generator = Arc::new(ScriptedGenerator::new(vec![]));
    let ctx = context(generator, two_providers(), 1);

    let (_, state) = run_branch(ctx).await;
    let sources: Vec<&str> = state.evidence.iter().map(|e| e.source.as_str()).collect();
    assert_eq!(sources, vec!["https://alpha/1", "https://alpha/2", "beta:Entry"]);

    // Within the round, the question precedes the evidence-backed answer.
    assert_eq!(state.turns.len(), 3);
    assert_eq!(
        state.turns[0].text,
        "So you said you were writing an article on the history of version control?"
    );
    assert_eq!(state.turns[1].text, "What else should readers know?");
}

#[tokio::test]
async fn generator_failure_settles_the_branch_as_failed() {
    let generator = Arc::new(ScriptedGenerator::failing_answers());
    let ctx = context(generator, two_providers(), 2);

    let (events, state) = run_branch(ctx).await;
    assert_eq!(state.stage, InterviewStage::Failed);
    assert!(state.terminal);
    assert!(state.failure.is_some());
    assert!(state.section.is_none());

    // Question and retrieval completed before the failing answer step.
    let progressed = events
        .iter()
        .filter(|e| matches!(e, BranchEvent::Progress { .. }))
        .count();
    assert_eq!(progressed, 2);
}

#[tokio::test]
async fn provider_failure_fails_the_branch_after_retries() {
    let provider = Arc::new(FailingProvider {
        calls: AtomicUsize::new(0),
    });
    let generator = Arc::new(ScriptedGenerator::new(vec![]));
    let ctx = Arc::new(InterviewContext {
        generator,
        providers: vec![provider.clone()],
        retry: RetryConfig {
            max_attempts: 2,
            initial_delay_ms: 1,
            max_delay_ms: 2,
            backoff_multiplier: 1.0,
            jitter: false,
        },
        max_turns: 2,
    });

    let (_, state) = run_branch(ctx).await;
    assert_eq!(state.stage, InterviewStage::Failed);
    assert!(state.failure.is_some());
    assert_eq!(provider.calls.load(Ordering::SeqCst), 2);
}
