//! Orchestration engine
//!
//! Executes the top-level report pipeline: analyst generation, the
//! confirmation pause, parallel interviews, parallel finalization writers,
//! and deterministic assembly. Every step transition is checkpointed, and
//! `advance` calls for the same run are serialized while unrelated runs
//! proceed fully in parallel.

use crate::assembler;
use crate::interview::{self, BranchEvent, InterviewContext};
use crate::prompts;
use crate::state::{
    AdvanceOutcome, InterviewStage, InterviewState, PausePoint, RunPhase, RunSnapshot, RunState,
};
use crate::{EngineError, EngineResult};
use chrono::Utc;
use roundtable_core::{
    retry_async, Checkpoint, CheckpointStore, RoundtableConfig, RoundtableError, SearchProvider,
    TextGenerator,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex, Notify, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// The report orchestration engine
pub struct ReportEngine {
    generator: Arc<dyn TextGenerator>,
    providers: Vec<Arc<dyn SearchProvider>>,
    store: Arc<dyn CheckpointStore<RunState>>,
    config: RoundtableConfig,
    /// Per-run advance serialization; unrelated runs are independent
    run_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
    /// Per-run abort signals observed by the interview join loop
    abort_signals: RwLock<HashMap<String, Arc<Notify>>>,
}

impl ReportEngine {
    pub fn new(
        generator: Arc<dyn TextGenerator>,
        providers: Vec<Arc<dyn SearchProvider>>,
        store: Arc<dyn CheckpointStore<RunState>>,
        config: RoundtableConfig,
    ) -> Self {
        Self {
            generator,
            providers,
            store,
            config,
            run_locks: RwLock::new(HashMap::new()),
            abort_signals: RwLock::new(HashMap::new()),
        }
    }

    /// Create a run and persist its initial checkpoint
    pub async fn submit(&self, topic: &str, analyst_count: usize) -> EngineResult<String> {
        if analyst_count == 0 {
            return Err(EngineError::invalid_input(
                "analyst_count must be at least 1",
            ));
        }
        if topic.trim().is_empty() {
            return Err(EngineError::invalid_input("topic must not be empty"));
        }

        let run_id = Uuid::new_v4().to_string();
        let state = RunState::new(run_id.clone(), topic, analyst_count);
        let checkpoint = Checkpoint::new(1, RunPhase::AwaitingAnalysts.step_name(), state);
        self.store.save(&run_id, &checkpoint).await?;

        info!(run_id, topic, analyst_count, "Run submitted");
        Ok(run_id)
    }

    /// Drive a run until it pauses for external input or reaches a terminal
    /// phase
    ///
    /// `external_input` is shorthand for `provide_feedback` followed by
    /// `advance`, valid only while the run is paused at the confirmation
    /// step. Resuming never re-executes a step whose output is already
    /// recorded in the checkpoint.
    pub async fn advance(
        &self,
        run_id: &str,
        external_input: Option<&str>,
    ) -> EngineResult<AdvanceOutcome> {
        let lock = self.run_lock(run_id).await;
        let _guard = lock.lock().await;

        let mut checkpoint = self.load(run_id).await?;

        if checkpoint.state.phase.is_terminal() {
            return Err(EngineError::invalid_state(format!(
                "run {} is already at step '{}'",
                run_id,
                checkpoint.state.phase.step_name()
            )));
        }

        if let Some(input) = external_input {
            if checkpoint.state.phase != RunPhase::PausedForConfirmation {
                return Err(EngineError::invalid_state(
                    "external input is only accepted at the confirmation pause",
                ));
            }
            checkpoint.state.analyst_feedback = Some(input.to_string());
        }

        loop {
            match checkpoint.state.phase {
                RunPhase::AwaitingAnalysts => {
                    self.create_analysts(run_id, &mut checkpoint).await?;
                }
                RunPhase::PausedForConfirmation => {
                    match checkpoint.state.analyst_feedback.take() {
                        None => {
                            return Ok(AdvanceOutcome::Paused(pause_point(&checkpoint.state)));
                        }
                        Some(feedback) if feedback.trim().is_empty() => {
                            // Accepted: fan out one interview per analyst.
                            let topic = checkpoint.state.topic.clone();
                            checkpoint.state.interviews = checkpoint
                                .state
                                .analysts
                                .iter()
                                .cloned()
                                .map(|analyst| InterviewState::new(analyst, &topic))
                                .collect();
                            checkpoint.state.phase = RunPhase::Interviewing;
                            self.persist(run_id, &mut checkpoint).await?;
                        }
                        Some(feedback) => {
                            // Rejected: discard the roster and regenerate
                            // with the feedback folded into the prompt.
                            info!(run_id, "Roster rejected, regenerating with feedback");
                            checkpoint.state.analysts.clear();
                            checkpoint.state.analyst_feedback = Some(feedback);
                            checkpoint.state.phase = RunPhase::AwaitingAnalysts;
                            self.persist(run_id, &mut checkpoint).await?;
                        }
                    }
                }
                RunPhase::Interviewing => {
                    self.run_interviews(run_id, &mut checkpoint).await?;
                    if checkpoint.state.phase == RunPhase::Failed {
                        return Ok(AdvanceOutcome::Completed(snapshot(&checkpoint)));
                    }
                }
                RunPhase::Assembling => {
                    self.finalize_report(run_id, &mut checkpoint).await?;
                    return Ok(AdvanceOutcome::Completed(snapshot(&checkpoint)));
                }
                RunPhase::Done | RunPhase::Failed => {
                    return Ok(AdvanceOutcome::Completed(snapshot(&checkpoint)));
                }
            }
        }
    }

    /// Attach operator feedback to a run paused at the confirmation step
    ///
    /// Empty feedback means "accept and continue"; non-empty feedback
    /// discards the roster and steers regeneration on the next `advance`.
    pub async fn provide_feedback(&self, run_id: &str, feedback: &str) -> EngineResult<()> {
        let lock = self.run_lock(run_id).await;
        let _guard = lock.lock().await;

        let mut checkpoint = self.load(run_id).await?;
        if checkpoint.state.phase != RunPhase::PausedForConfirmation {
            return Err(EngineError::invalid_state(format!(
                "run {} is not paused for confirmation",
                run_id
            )));
        }

        checkpoint.state.analyst_feedback = Some(feedback.to_string());
        self.persist(run_id, &mut checkpoint).await?;
        Ok(())
    }

    /// Inspect a run through its last persisted checkpoint
    pub async fn snapshot(&self, run_id: &str) -> EngineResult<RunSnapshot> {
        let checkpoint = self.load(run_id).await?;
        Ok(snapshot(&checkpoint))
    }

    /// Cancel the outstanding branch tasks of an in-flight `advance`
    ///
    /// The last durable checkpoint is left untouched; the run can be
    /// resumed or discarded afterwards.
    pub async fn abort(&self, run_id: &str) {
        let signals = self.abort_signals.read().await;
        if let Some(signal) = signals.get(run_id) {
            signal.notify_waiters();
            info!(run_id, "Abort requested");
        }
    }

    /// Remove a run's checkpoint and bookkeeping
    pub async fn discard(&self, run_id: &str) -> EngineResult<()> {
        self.store.delete(run_id).await?;
        self.run_locks.write().await.remove(run_id);
        self.abort_signals.write().await.remove(run_id);
        info!(run_id, "Run discarded");
        Ok(())
    }

    /// Generate the analyst roster and pause for confirmation
    async fn create_analysts(
        &self,
        run_id: &str,
        checkpoint: &mut Checkpoint<RunState>,
    ) -> EngineResult<()> {
        let state = &mut checkpoint.state;
        let prompt = prompts::analyst_instructions(
            &state.topic,
            state.analyst_feedback.as_deref(),
            state.analyst_count,
        );
        let schema = prompts::analyst_schema();

        let value = retry_async(
            || self.generator.generate_structured(&prompt, &schema),
            &self.config.retry,
            "create_analysts",
        )
        .await?;

        state.analysts = prompts::parse_analyst_roster(&value, state.analyst_count)?;
        state.analyst_feedback = None;
        state.phase = RunPhase::PausedForConfirmation;

        info!(run_id, analysts = state.analysts.len(), "Roster generated");
        self.persist(run_id, checkpoint).await
    }

    /// Execute all unfinished interview branches concurrently and join
    ///
    /// Branches own their state and report transitions over a channel; the
    /// engine merges them into the run state, checkpoints each one, and
    /// counts a branch as settled exactly once.
    async fn run_interviews(
        &self,
        run_id: &str,
        checkpoint: &mut Checkpoint<RunState>,
    ) -> EngineResult<()> {
        let abort = self.abort_signal(run_id).await;
        let aborted = abort.notified();
        tokio::pin!(aborted);

        let ctx = Arc::new(InterviewContext {
            generator: self.generator.clone(),
            providers: self.providers.clone(),
            retry: self.config.retry.clone(),
            max_turns: self.config.interview.max_turns,
        });

        let (tx, mut rx) = mpsc::channel::<BranchEvent>(64);
        let mut tasks = JoinSet::new();
        let mut outstanding = 0usize;

        for (index, branch) in checkpoint.state.interviews.iter().enumerate() {
            if branch.is_settled() {
                continue;
            }
            outstanding += 1;
            let ctx = ctx.clone();
            let state = branch.clone();
            let events = tx.clone();
            tasks.spawn(async move {
                interview::drive_interview(ctx, index, state, events).await;
            });
        }
        drop(tx);

        info!(run_id, branches = outstanding, "Interviews fanned out");

        while outstanding > 0 {
            tokio::select! {
                _ = &mut aborted => {
                    tasks.abort_all();
                    warn!(run_id, outstanding, "Run aborted during interviews");
                    return Err(EngineError::Aborted {
                        run_id: run_id.to_string(),
                    });
                }
                event = rx.recv() => {
                    let Some(event) = event else { break };
                    match event {
                        BranchEvent::Progress { index, state } => {
                            checkpoint.state.interviews[index] = state;
                            self.persist(run_id, checkpoint).await?;
                        }
                        BranchEvent::Settled { index, state } => {
                            // Decrement exactly once per branch, even if a
                            // terminal event is ever delivered twice.
                            if !checkpoint.state.interviews[index].is_settled() {
                                checkpoint.state.interviews[index] = state;
                                outstanding -= 1;
                            }
                            self.persist(run_id, checkpoint).await?;
                        }
                    }
                }
            }
        }

        // A branch task that died without a terminal event (panic) leaves
        // its slot unsettled; record it as failed so the join stays sound.
        for branch in checkpoint.state.interviews.iter_mut() {
            if !branch.is_settled() {
                branch.stage = InterviewStage::Failed;
                branch.terminal = true;
                branch.failure = Some("interview task terminated unexpectedly".to_string());
            }
        }

        let completed = checkpoint.state.sections().len();
        let failed = checkpoint.state.failed_interviews();
        info!(run_id, completed, failed, "Interviews joined");

        // Partial-failure policy: proceed with the surviving sections; the
        // run only fails when no branch produced a section.
        checkpoint.state.phase = if completed == 0 {
            RunPhase::Failed
        } else {
            RunPhase::Assembling
        };
        self.persist(run_id, checkpoint).await
    }

    /// Run the three finalization writers concurrently, then assemble
    ///
    /// Writers whose output is already recorded in the checkpoint are
    /// skipped, so a resumed run never repeats a completed call.
    async fn finalize_report(
        &self,
        run_id: &str,
        checkpoint: &mut Checkpoint<RunState>,
    ) -> EngineResult<()> {
        let topic = checkpoint.state.topic.clone();
        let sections = checkpoint.state.sections();
        let formatted = sections
            .iter()
            .map(|s| s.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");

        let report = &checkpoint.state.report;
        let need_body = report.body.is_none();
        let need_intro = report.introduction.is_none();
        let need_conclusion = report.conclusion.is_none();

        let body = async {
            if !need_body {
                return Ok(None);
            }
            let prompt = format!(
                "{}\n\nWrite a report based upon these memos.",
                prompts::report_writer_instructions(&topic, &formatted)
            );
            retry_async(
                || self.generator.generate(&prompt),
                &self.config.retry,
                "write_report",
            )
            .await
            .map(Some)
        };
        let introduction = async {
            if !need_intro {
                return Ok(None);
            }
            let prompt = format!(
                "{}\n\nWrite the report introduction.",
                prompts::intro_conclusion_instructions(&topic, &formatted)
            );
            retry_async(
                || self.generator.generate(&prompt),
                &self.config.retry,
                "write_introduction",
            )
            .await
            .map(Some)
        };
        let conclusion = async {
            if !need_conclusion {
                return Ok(None);
            }
            let prompt = format!(
                "{}\n\nWrite the report conclusion.",
                prompts::intro_conclusion_instructions(&topic, &formatted)
            );
            retry_async(
                || self.generator.generate(&prompt),
                &self.config.retry,
                "write_conclusion",
            )
            .await
            .map(Some)
        };

        let (body, introduction, conclusion) = tokio::join!(body, introduction, conclusion);

        // Record whatever succeeded before surfacing a writer failure, so a
        // retried advance only repeats the missing writers.
        let mut first_error: Option<RoundtableError> = None;
        match body {
            Ok(Some(text)) => checkpoint.state.report.body = Some(text),
            Ok(None) => {}
            Err(e) => first_error = first_error.or(Some(e)),
        }
        match introduction {
            Ok(Some(text)) => checkpoint.state.report.introduction = Some(text),
            Ok(None) => {}
            Err(e) => first_error = first_error.or(Some(e)),
        }
        match conclusion {
            Ok(Some(text)) => checkpoint.state.report.conclusion = Some(text),
            Ok(None) => {}
            Err(e) => first_error = first_error.or(Some(e)),
        }

        self.persist(run_id, checkpoint).await?;
        if let Some(err) = first_error {
            return Err(err.into());
        }

        debug_assert!(checkpoint.state.report.is_ready());
        let report = &checkpoint.state.report;
        let final_text = assembler::assemble_report(
            report.introduction.as_deref().unwrap_or_default(),
            report.body.as_deref().unwrap_or_default(),
            report.conclusion.as_deref().unwrap_or_default(),
        );

        checkpoint.state.report.final_text = Some(final_text);
        checkpoint.state.phase = RunPhase::Done;
        info!(run_id, "Report assembled");
        self.persist(run_id, checkpoint).await
    }

    /// Persist the next checkpoint version for this run
    ///
    /// A failed write is fatal to the calling `advance`; state is never
    /// silently dropped.
    async fn persist(
        &self,
        run_id: &str,
        checkpoint: &mut Checkpoint<RunState>,
    ) -> EngineResult<()> {
        checkpoint.version += 1;
        checkpoint.step = checkpoint.state.phase.step_name().to_string();
        checkpoint.created_at = Utc::now();
        self.store.save(run_id, checkpoint).await?;
        debug!(
            run_id,
            version = checkpoint.version,
            step = %checkpoint.step,
            "Checkpoint persisted"
        );
        Ok(())
    }

    async fn load(&self, run_id: &str) -> EngineResult<Checkpoint<RunState>> {
        self.store.load(run_id).await.map_err(|e| match e {
            RoundtableError::NotFound { .. } => EngineError::RunNotFound {
                run_id: run_id.to_string(),
            },
            other => EngineError::Core(other),
        })
    }

    async fn run_lock(&self, run_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.run_locks.write().await;
        locks
            .entry(run_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn abort_signal(&self, run_id: &str) -> Arc<Notify> {
        let mut signals = self.abort_signals.write().await;
        signals
            .entry(run_id.to_string())
            .or_insert_with(|| Arc::new(Notify::new()))
            .clone()
    }
}

fn pause_point(state: &RunState) -> PausePoint {
    PausePoint {
        run_id: state.run_id.clone(),
        step: state.phase.step_name().to_string(),
        message: "Here is the list of generated analysts. Confirm with empty feedback, or \
                  provide feedback to regenerate."
            .to_string(),
        analysts: state.analysts.clone(),
    }
}

fn snapshot(checkpoint: &Checkpoint<RunState>) -> RunSnapshot {
    let state = &checkpoint.state;
    RunSnapshot {
        run_id: state.run_id.clone(),
        topic: state.topic.clone(),
        phase: state.phase,
        version: checkpoint.version,
        analysts: state.analysts.clone(),
        completed_sections: state.sections().len(),
        failed_interviews: state.failed_interviews(),
        final_report: state.report.final_text.clone(),
    }
}
