//! Coordinator agent: writes the cross-judge summary during synthesis

use crate::backend::SharedBackend;
use crate::types::WorkerFailure;
use crate::workforce::narrative::{gap_line, GAPS_HEADING};

use super::EvaluatorAgent;

pub const COORDINATOR_LABEL: &str = "Coordinator";

pub fn build_coordinator(workforce_name: &str, backend: SharedBackend) -> EvaluatorAgent {
    let instructions = format!(
        "You coordinate the workforce \"{}\". You receive the verdicts of several judges, \
         each with a name, a score and a comment. Write one summary paragraph of their \
         opinions. Do not change any score, do not add judgments of your own, and do not \
         restate the scores in x/4 form. If some workers gave no verdict, name them and say \
         the summary does not include their view.",
        workforce_name
    );
    EvaluatorAgent::new(COORDINATOR_LABEL, "Workforce Coordinator", instructions, backend)
}

/// Prompt asking for the summary of the collected verdicts
///
/// Workers that produced nothing are listed after the verdicts.
pub fn summary_prompt(task_content: &str, sections: &str, failures: &[WorkerFailure]) -> String {
    let mut prompt = format!(
        "Overall task: {}\n\nJudge verdicts:\n\n{}",
        task_content.trim(),
        sections
    );
    if !failures.is_empty() {
        prompt.push_str(GAPS_HEADING);
        prompt.push('\n');
        for failure in failures {
            prompt.push_str(&gap_line(failure));
            prompt.push('\n');
        }
        prompt.push('\n');
    }
    prompt.push_str("Write the final summary of these opinions.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_prompt_names_missing_workers() {
        let failure = WorkerFailure {
            worker: "Critical John".to_string(),
            subtask_id: "0.2".to_string(),
            code: "E300".to_string(),
            message: "rate limited".to_string(),
        };
        let prompt = summary_prompt("Evaluate it.", "### A\nScore: 3/4\nok\n\n", &[failure]);
        assert!(prompt.contains(GAPS_HEADING));
        assert!(prompt.contains("- Critical John (subtask 0.2): no verdict recorded"));
        assert!(prompt.ends_with("Write the final summary of these opinions."));

        let prompt = summary_prompt("Evaluate it.", "### A\nScore: 3/4\nok\n\n", &[]);
        assert!(!prompt.contains(GAPS_HEADING));
    }
}
