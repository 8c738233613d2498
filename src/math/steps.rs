//! Heuristics over worked solutions: common-mistake detection and answer
//! extraction. Scoring itself lives in `services::step_service`.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Largest number of new tokens one step may introduce before it counts as
/// a skipped step.
const MAX_NEW_TOKENS_PER_STEP: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepIssue {
    ModelNotLoaded,
    EvaluationError,
    SignError,
    MissingStep,
}

fn sign_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[+\-]\s*[+\-]").unwrap())
}

fn token_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[\w+\-*/=]+").unwrap())
}

pub fn detect_issues(problem_text: &str, workings: &[String]) -> Vec<StepIssue> {
    let mut issues = Vec::new();

    let text = format!("{} {}", problem_text, workings.join(" "));
    if sign_pattern().is_match(&text) {
        issues.push(StepIssue::SignError);
    }

    if workings.len() > 2 {
        let largest_jump = workings
            .windows(2)
            .map(|pair| {
                let previous: HashSet<&str> = token_pattern()
                    .find_iter(&pair[0])
                    .map(|m| m.as_str())
                    .collect();
                token_pattern()
                    .find_iter(&pair[1])
                    .map(|m| m.as_str())
                    .collect::<HashSet<_>>()
                    .difference(&previous)
                    .count()
            })
            .max()
            .unwrap_or(0);
        if largest_jump > MAX_NEW_TOKENS_PER_STEP {
            issues.push(StepIssue::MissingStep);
        }
    }

    issues
}

/// Text after the last `=` of the problem statement, or empty.
pub fn expected_answer(problem_text: &str) -> String {
    problem_text
        .rsplit_once('=')
        .map(|(_, answer)| answer.trim().to_string())
        .unwrap_or_default()
}

/// Text after the last `=` of the final working line.
pub fn final_answer(workings: &[String]) -> Option<String> {
    let last = workings.last()?;
    let answer = last.rsplit('=').next().unwrap_or(last).trim();
    (!answer.is_empty()).then(|| answer.to_string())
}
