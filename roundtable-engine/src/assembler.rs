//! Deterministic assembly of the final report document
//!
//! Pure text post-processing: no external calls, fully determined by the
//! three writer outputs.

const INSIGHTS_HEADING: &str = "## Insights";
const SOURCES_SPLIT: &str = "\n## Sources\n";
const SECTION_SEPARATOR: &str = "\n\n---\n\n";

/// Remove a leading "## Insights" heading from the body, if present
pub fn strip_insights_heading(body: &str) -> &str {
    match body.strip_prefix(INSIGHTS_HEADING) {
        Some(rest) => rest.trim_start_matches('\n'),
        None => body,
    }
}

/// Split the body into content and an optional sources block
///
/// The split pattern must match exactly; otherwise sources are treated as
/// absent rather than failing.
pub fn split_sources(body: &str) -> (&str, Option<&str>) {
    match body.split_once(SOURCES_SPLIT) {
        Some((content, sources)) => (content, Some(sources)),
        None => (body, None),
    }
}

/// Merge introduction, body and conclusion into the final document
///
/// The body is edited first (insights heading stripped, sources block split
/// off), then the three parts are joined with fixed separators and the
/// sources block, when present, is appended at the end.
pub fn assemble_report(introduction: &str, body: &str, conclusion: &str) -> String {
    let body = strip_insights_heading(body);
    let (content, sources) = split_sources(body);

    let mut report = format!(
        "{introduction}{SECTION_SEPARATOR}{content}{SECTION_SEPARATOR}{conclusion}"
    );
    if let Some(sources) = sources {
        report.push_str("\n\n## Sources\n");
        report.push_str(sources);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_body_round_trip() {
        let output = assemble_report("I", "## Insights\nB\n## Sources\nS", "C");
        assert_eq!(output, "I\n\n---\n\nB\n\n---\n\nC\n\n## Sources\nS");
    }

    #[test]
    fn body_without_sources_marker_is_not_split() {
        let output = assemble_report("I", "B", "C");
        assert_eq!(output, "I\n\n---\n\nB\n\n---\n\nC");
        assert!(!output.contains("## Sources"));
    }

    #[test]
    fn inexact_sources_pattern_is_treated_as_absent() {
        // Marker at the very start lacks the leading newline of the pattern.
        let body = "## Sources\nS";
        let (content, sources) = split_sources(body);
        assert_eq!(content, body);
        assert!(sources.is_none());
    }

    #[test]
    fn insights_heading_is_only_stripped_from_the_front() {
        assert_eq!(strip_insights_heading("## Insights\nB"), "B");
        assert_eq!(strip_insights_heading("B\n## Insights"), "B\n## Insights");
    }

    #[test]
    fn multiline_sections_survive_assembly() {
        let body = "## Insights\nfirst\nsecond\n## Sources\n[1] a\n[2] b";
        let output = assemble_report("intro", body, "outro");
        assert_eq!(
            output,
            "intro\n\n---\n\nfirst\nsecond\n\n---\n\noutro\n\n## Sources\n[1] a\n[2] b"
        );
    }
}
