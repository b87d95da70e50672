//! Plain-text rendering of a finished session for chat surfaces.
//!
//! Output uses `*bold*` markers, which Markdown-capable chat clients render and
//! terminals show as-is.

use crate::records::{DialogueEntry, Solution};

/// Render the agent dialogue, one block per entry.
pub fn format_dialogue(entries: &[DialogueEntry]) -> String {
    let mut out = String::from("🤖 *Agent dialogue:*\n\n");
    for entry in entries {
        out.push_str(&format!("*{}:*\n{}\n\n", entry.agent, entry.message));
    }
    out
}

/// Render a solution with numbered steps.
pub fn format_solution(solution: &Solution) -> String {
    let mut out = format!(
        "🎯 *Final solution:*\n\n*Solution:* {}\n\n*Implementation steps:*",
        solution.solution
    );
    for (i, step) in solution.steps.iter().enumerate() {
        out.push_str(&format!("\n{}. {}", i + 1, step));
    }
    out
}

/// Numbered step list used inside dialogue entries.
pub(crate) fn numbered_steps(steps: &[String]) -> String {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| format!("{}. {}", i + 1, step))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split `text` into pieces of at most `max_chars` characters, preferring to
/// break on a newline. Chat transports cap message length.
pub fn split_for_delivery(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut parts = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        let hard_limit = rest
            .char_indices()
            .nth(max_chars)
            .map(|(idx, _)| idx)
            .unwrap_or(rest.len());
        let cut = match rest[..hard_limit].rfind('\n') {
            Some(idx) if idx > 0 => idx + 1,
            _ => hard_limit,
        };
        parts.push(rest[..cut].to_string());
        rest = &rest[cut..];
    }

    if !rest.is_empty() {
        parts.push(rest.to_string());
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialogue_has_bold_speakers() {
        let entries = vec![
            DialogueEntry::new("Analyst", "Problem: focus"),
            DialogueEntry::new("Solver", "Solution: timers"),
        ];
        let text = format_dialogue(&entries);
        assert!(text.starts_with("🤖 *Agent dialogue:*"));
        assert!(text.contains("*Analyst:*\nProblem: focus\n\n"));
        assert!(text.contains("*Solver:*\nSolution: timers"));
    }

    #[test]
    fn empty_dialogue_is_just_the_header() {
        assert_eq!(format_dialogue(&[]), "🤖 *Agent dialogue:*\n\n");
    }

    #[test]
    fn solution_steps_are_numbered() {
        let solution = Solution {
            solution: "Work in focused blocks".into(),
            steps: vec!["Pick a task".into(), "Set a timer".into()],
        };
        let text = format_solution(&solution);
        assert!(text.contains("*Solution:* Work in focused blocks"));
        assert!(text.ends_with("\n1. Pick a task\n2. Set a timer"));
    }

    #[test]
    fn split_prefers_newlines() {
        let text = "aaaa\nbbbb\ncccc";
        let parts = split_for_delivery(text, 10);
        assert_eq!(parts, vec!["aaaa\nbbbb\n", "cccc"]);
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn split_handles_long_lines_and_multibyte() {
        let text = "é".repeat(25);
        let parts = split_for_delivery(&text, 10);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.chars().count() <= 10));
        assert_eq!(parts.concat(), text);
    }

    #[test]
    fn short_text_is_one_part() {
        assert_eq!(split_for_delivery("hi", 4000), vec!["hi"]);
        assert!(split_for_delivery("", 4000).is_empty());
    }
}
