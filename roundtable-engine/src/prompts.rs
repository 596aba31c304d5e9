//! Prompt builders for every generation step
//!
//! Free functions returning the full prompt text; the engine owns when and
//! how they are sent. Structured steps pair a builder with a JSON schema.

use roundtable_core::{Analyst, EvidenceSnippet, RoundtableError, RoundtableResult, Turn};
use serde_json::{json, Value};

/// Instructions for generating the analyst roster
pub fn analyst_instructions(topic: &str, feedback: Option<&str>, count: usize) -> String {
    let feedback = feedback.unwrap_or("");
    format!(
        r#"You are tasked with creating a set of AI analyst personas. Follow these instructions carefully:

1. First, review the research topic: {topic}

2. Examine any editorial feedback that has been optionally provided to guide creation of the analysts: {feedback}

3. Determine the most interesting themes based upon the topic and feedback above.

4. Pick the top {count} themes.

5. Assign one analyst to each theme. Each analyst needs a name, a role, a primary affiliation, and a description of their focus, concerns and motives.

Generate the set of analysts."#
    )
}

/// Output schema for the analyst roster
pub fn analyst_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "analysts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string" },
                        "role": { "type": "string" },
                        "affiliation": { "type": "string" },
                        "description": { "type": "string" }
                    },
                    "required": ["name", "role", "affiliation", "description"]
                }
            }
        },
        "required": ["analysts"]
    })
}

/// Parse the structured roster response, capping it at the requested size
pub fn parse_analyst_roster(value: &Value, count: usize) -> RoundtableResult<Vec<Analyst>> {
    let analysts = value.get("analysts").ok_or_else(|| {
        RoundtableError::invalid_schema("roster response is missing 'analysts'", "prompts")
    })?;

    let mut roster: Vec<Analyst> = serde_json::from_value(analysts.clone()).map_err(|e| {
        RoundtableError::invalid_schema(format!("malformed analyst roster: {}", e), "prompts")
    })?;

    if roster.is_empty() {
        return Err(RoundtableError::invalid_schema(
            "roster response contains no analysts",
            "prompts",
        ));
    }

    roster.truncate(count);
    Ok(roster)
}

/// Instructions for the interviewer's next question
pub fn question_instructions(persona: &str) -> String {
    format!(
        r#"You are an analyst tasked with interviewing an expert to learn about a specific topic.

Your goal is to boil down to interesting and specific insights related to your topic.

1. Interesting: insights that people will find surprising or non-obvious.
2. Specific: insights that avoid generalities and include specific examples from the expert.

Here is your topic of focus and set of goals:
{persona}
Begin by introducing yourself using a name that fits your persona, and then ask your question.

Continue to ask questions to drill down and refine your understanding of the topic.

When you are satisfied with your understanding, complete the interview with: "Thank you so much for your help!"

Remember to stay in character throughout your response, reflecting the persona and goals provided to you."#
    )
}

/// Instructions for converting the conversation into a search query
pub fn search_instructions() -> &'static str {
    r#"You will be given a conversation between an analyst and an expert.

Your goal is to generate a well-structured query for use in retrieval and / or web-search related to the conversation.

First, analyze the full conversation. Pay particular attention to the final question posed by the analyst.

Convert this final question into a well-structured web search query."#
}

/// Output schema for the search query
pub fn search_query_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "search_query": { "type": "string" }
        },
        "required": ["search_query"]
    })
}

/// Instructions for the expert's answer over retrieved evidence
pub fn answer_instructions(persona: &str, context: &str) -> String {
    format!(
        r#"You are an expert being interviewed by an analyst.

Here is the analyst's area of focus:
{persona}
Your goal is to answer a question posed by the interviewer.

To answer the question, use this context:
{context}

When answering questions, follow these guidelines:

1. Use only the information provided in the context.
2. Do not introduce external information or make assumptions beyond what is explicitly stated in the context.
3. The context contains sources on the topic of each individual document.
4. Include these sources in your answer next to any relevant statements, numbered in order of use (e.g. [1], [2]).
5. List your sources in order at the bottom of your answer."#
    )
}

/// Instructions for writing one report section from an interview
pub fn section_writer_instructions(focus: &str) -> String {
    format!(
        r#"You are an expert technical writer.

Your task is to create a short, easily digestible section of a report based on a set of source documents.

1. Analyze the content of the source documents carefully.
2. Create a report structure using markdown formatting:
   - Use ## for the section title
   - Use ### for sub-section headers
3. Make your title engaging based upon the focus area of the analyst: {focus}
4. For the summary, set up the background and then emphasize what is novel, interesting, or surprising about the insights gathered from the interview.
5. Create a numbered list of the source documents used, under a ### Sources header, and do not mention the names of interviewers or experts in your report."#
    )
}

/// Instructions for consolidating all sections into the report body
pub fn report_writer_instructions(topic: &str, context: &str) -> String {
    format!(
        r#"You are a technical writer creating a report on this overall topic:

{topic}

You have a team of analysts. Each analyst has done two things:

1. They conducted an interview with an expert on a specific sub-topic.
2. They wrote up their finding into a memo.

Your task:

1. You will be given a collection of memos from your analysts.
2. Think carefully about the insights from each memo.
3. Consolidate these into a crisp overall summary that ties together the central ideas from all of the memos.
4. Summarize the central points in each memo into a cohesive single narrative.

To format your report:

1. Use markdown formatting.
2. Include no pre-amble for the report.
3. Use no sub-heading.
4. Start your report with a single title header: ## Insights
5. Preserve any citations in the memos, which will be annotated in brackets, for example [1] or [2].
6. Create a final, consolidated list of sources and add to a Sources section with the ## Sources header.
7. List your sources in order and do not repeat.

Here are the memos from your analysts to build your report from:

{context}"#
    )
}

/// Shared instructions for the introduction and conclusion writers
pub fn intro_conclusion_instructions(topic: &str, sections: &str) -> String {
    format!(
        r#"You are a technical writer finishing a report on {topic}

You will be given all of the sections of the report.

Your job is to write a crisp and compelling introduction or conclusion section.

The user will instruct you whether to write the introduction or conclusion.

Include no pre-amble for either section.

Target around 100 words, crisply previewing (for introduction) or recapping (for conclusion) all of the sections of the report.

Use markdown formatting:

- For your introduction, create a compelling title and use the # header for the title.
- For your introduction, use ## Introduction as the section header.
- For your conclusion, use ## Conclusion as the section header.

Here are the sections to reflect on for writing:

{sections}"#
    )
}

/// Render a transcript as speaker-labeled lines
pub fn render_transcript(turns: &[Turn]) -> String {
    turns
        .iter()
        .map(|turn| format!("{}: {}", turn.speaker, turn.text))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render evidence snippets as tagged document blocks
pub fn format_evidence(evidence: &[EvidenceSnippet]) -> String {
    evidence
        .iter()
        .map(|snippet| {
            format!(
                "<Document source=\"{}\"/>\n{}\n</Document>",
                snippet.source, snippet.content
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}
