//! Interview sub-workflow
//!
//! One branch per analyst: a bounded question / retrieve / answer loop that
//! terminates into a written section. Each branch runs as its own task,
//! owns its `InterviewState` exclusively, and reports every step transition
//! back to the engine's join loop over a channel.

use crate::prompts;
use crate::state::{InterviewStage, InterviewState};
use crate::EngineResult;
use roundtable_core::{
    retry_async, EvidenceSnippet, RetryConfig, RoundtableError, SearchProvider, TextGenerator,
    Turn,
};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Phrase the interviewer uses to wrap up early
pub const TERMINATION_PHRASE: &str = "Thank you so much for your help";

/// Shared capabilities and limits for one fan-out of branches
pub struct InterviewContext {
    pub generator: Arc<dyn TextGenerator>,
    pub providers: Vec<Arc<dyn SearchProvider>>,
    pub retry: RetryConfig,
    pub max_turns: usize,
}

/// Event sent from a branch task back to the engine's join loop
#[derive(Debug, Clone)]
pub enum BranchEvent {
    /// The branch completed one step transition; carries the full state
    Progress { index: usize, state: InterviewState },
    /// The branch reached a terminal stage (`Done` or `Failed`)
    Settled { index: usize, state: InterviewState },
}

/// Routing decision after an expert answer
///
/// The turn cap is checked before the content sniff; the sniff looks at the
/// turn before the most recent one, i.e. the interviewer's last question.
pub fn route_after_answer(state: &InterviewState, max_turns: usize) -> InterviewStage {
    if state.expert_turns >= max_turns {
        return InterviewStage::Save;
    }

    let question = state
        .turns
        .len()
        .checked_sub(2)
        .and_then(|i| state.turns.get(i));
    if let Some(turn) = question {
        if turn.text.contains(TERMINATION_PHRASE) {
            return InterviewStage::Save;
        }
    }

    InterviewStage::Ask
}

/// Drive one branch to a terminal stage, emitting an event per transition
///
/// A step failure marks the branch failed rather than propagating: one
/// branch's exhausted retries must not abort its siblings.
pub async fn drive_interview(
    ctx: Arc<InterviewContext>,
    index: usize,
    mut state: InterviewState,
    events: mpsc::Sender<BranchEvent>,
) {
    while !state.terminal {
        if let Err(err) = run_step(&ctx, &mut state).await {
            warn!(index, error = %err, "Interview branch failed");
            state.stage = InterviewStage::Failed;
            state.terminal = true;
            state.failure = Some(err.to_string());
        }

        let event = if state.terminal {
            BranchEvent::Settled {
                index,
                state: state.clone(),
            }
        } else {
            BranchEvent::Progress {
                index,
                state: state.clone(),
            }
        };

        if events.send(event).await.is_err() {
            // Join loop is gone; the run was aborted.
            return;
        }
    }
}

/// Execute the branch's current stage and advance it by one transition
async fn run_step(ctx: &InterviewContext, state: &mut InterviewState) -> EngineResult<()> {
    match state.stage {
        InterviewStage::Ask => {
            ask_question(ctx, state).await?;
            state.stage = InterviewStage::Retrieve;
        }
        InterviewStage::Retrieve => {
            retrieve_evidence(ctx, state).await?;
            state.stage = InterviewStage::Answer;
        }
        InterviewStage::Answer => {
            answer_question(ctx, state).await?;
            state.stage = route_after_answer(state, ctx.max_turns);
        }
        InterviewStage::Save => {
            state.transcript = Some(prompts::render_transcript(&state.turns));
            state.stage = InterviewStage::WriteSection;
        }
        InterviewStage::WriteSection => {
            write_section(ctx, state).await?;
            state.stage = InterviewStage::Done;
            state.terminal = true;
        }
        InterviewStage::Done | InterviewStage::Failed => {
            state.terminal = true;
        }
    }
    Ok(())
}

async fn ask_question(ctx: &InterviewContext, state: &mut InterviewState) -> EngineResult<()> {
    let prompt = format!(
        "{}\n\nConversation so far:\n{}",
        prompts::question_instructions(&state.analyst.persona()),
        prompts::render_transcript(&state.turns)
    );

    let question = retry_async(
        || ctx.generator.generate(&prompt),
        &ctx.retry,
        "generate_question",
    )
    .await?;

    state.turns.push(Turn::interviewer(question));
    Ok(())
}

/// Derive one query from the conversation and fan it out to every provider
///
/// Providers run concurrently; the branch blocks until all return. Results
/// are appended in fixed provider order, documents in returned rank order.
async fn retrieve_evidence(ctx: &InterviewContext, state: &mut InterviewState) -> EngineResult<()> {
    let prompt = format!(
        "{}\n\nConversation:\n{}",
        prompts::search_instructions(),
        prompts::render_transcript(&state.turns)
    );
    let schema = prompts::search_query_schema();

    let value = retry_async(
        || ctx.generator.generate_structured(&prompt, &schema),
        &ctx.retry,
        "generate_search_query",
    )
    .await?;

    let query = value
        .get("search_query")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            RoundtableError::invalid_schema("response is missing 'search_query'", "interview")
        })?
        .to_string();

    let searches = ctx.providers.iter().map(|provider| {
        let query = query.clone();
        async move { retry_async(|| provider.search(&query), &ctx.retry, provider.name()).await }
    });
    let batches = futures::future::join_all(searches).await;

    for (provider, batch) in ctx.providers.iter().zip(batches) {
        let documents = batch?;
        debug!(
            provider = provider.name(),
            documents = documents.len(),
            "Search results retrieved"
        );
        for document in documents {
            state.evidence.push(EvidenceSnippet {
                content: document.content,
                source: document.source_identifier,
            });
        }
    }

    Ok(())
}

async fn answer_question(ctx: &InterviewContext, state: &mut InterviewState) -> EngineResult<()> {
    let prompt = format!(
        "{}\n\nConversation so far:\n{}",
        prompts::answer_instructions(
            &state.analyst.persona(),
            &prompts::format_evidence(&state.evidence)
        ),
        prompts::render_transcript(&state.turns)
    );

    let answer = retry_async(
        || ctx.generator.generate(&prompt),
        &ctx.retry,
        "generate_answer",
    )
    .await?;

    state.turns.push(Turn::expert(answer));
    state.expert_turns += 1;
    Ok(())
}

async fn write_section(ctx: &InterviewContext, state: &mut InterviewState) -> EngineResult<()> {
    let prompt = format!(
        "{}\n\nUse this source to write your section:\n{}",
        prompts::section_writer_instructions(&state.analyst.description),
        prompts::format_evidence(&state.evidence)
    );

    let section = retry_async(
        || ctx.generator.generate(&prompt),
        &ctx.retry,
        "write_section",
    )
    .await?;

    state.section = Some(section);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use roundtable_core::Analyst;

    fn analyst() -> Analyst {
        Analyst {
            name: "Ada".to_string(),
            role: "Historian".to_string(),
            affiliation: "Archive".to_string(),
            description: "Origins and evolution".to_string(),
        }
    }

    fn state_with_turns(expert_turns: usize, question: &str) -> InterviewState {
        let mut state = InterviewState::new(analyst(), "test topic");
        state.turns.push(Turn::interviewer(question));
        state.turns.push(Turn::expert("An answer [1]."));
        state.expert_turns = expert_turns;
        state
    }

    #[test]
    fn cap_forces_save() {
        let state = state_with_turns(2, "Anything else?");
        assert_eq!(route_after_answer(&state, 2), InterviewStage::Save);
    }

    #[test]
    fn termination_phrase_in_last_question_forces_save() {
        let state = state_with_turns(1, "Thank you so much for your help!");
        assert_eq!(route_after_answer(&state, 5), InterviewStage::Save);
    }

    #[test]
    fn conversation_continues_otherwise() {
        let state = state_with_turns(1, "Could you expand on that?");
        assert_eq!(route_after_answer(&state, 5), InterviewStage::Ask);
    }

    #[test]
    fn cap_takes_precedence_over_phrase() {
        let state = state_with_turns(3, "Thank you so much for your help!");
        assert_eq!(route_after_answer(&state, 3), InterviewStage::Save);
    }
}
