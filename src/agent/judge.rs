//! Judge factory

use crate::backend::SharedBackend;
use crate::persona::JudgePersona;

use super::EvaluatorAgent;

/// Opening line of every judge's system instructions
pub const JUDGE_PREAMBLE: &str = "You are a judge in a hackathon.";

/// Role name shown to the model
pub const JUDGE_ROLE: &str = "Hackathon Judge";

/// System instructions embedding the persona, example and rubric verbatim
pub fn judge_instructions(persona: &str, example_feedback: &str, rubric: &str) -> String {
    format!(
        "{preamble}\n\
         This is your persona that you MUST act with: {persona}\n\
         Here is an example feedback that you might give with your persona, you MUST try your best to align with this:\n\
         {example_feedback}\n\
         When evaluating projects, you must use the following criteria:\n\
         {rubric}\n\
         You also need to give scores based on these criteria, from 1-4. The score given should be like 3/4, 2/4, etc.\n",
        preamble = JUDGE_PREAMBLE,
        persona = persona,
        example_feedback = example_feedback,
        rubric = rubric,
    )
}

/// Build a tool-less judge agent
///
/// Deterministic for identical inputs and performs no I/O. `label` is the
/// judge's display name, which the agent reports as its identity.
pub fn build_judge(
    label: &str,
    persona: &str,
    example_feedback: &str,
    rubric: &str,
    backend: SharedBackend,
) -> EvaluatorAgent {
    EvaluatorAgent::new(
        label,
        JUDGE_ROLE,
        judge_instructions(persona, example_feedback, rubric),
        backend,
    )
}

/// Build a judge from a validated persona record
pub fn judge_from_persona(persona: &JudgePersona, backend: SharedBackend) -> EvaluatorAgent {
    build_judge(
        &persona.name,
        &persona.persona,
        &persona.example_feedback,
        &persona.rubric,
        backend,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::persona::bundled_judges;
    use std::sync::Arc;

    #[test]
    fn test_instructions_embed_inputs_verbatim() {
        let persona = "You are a venture capitalist who loves \"unicorns\".";
        let example = "Wow, this is disruptive!\nSynergy everywhere.";
        let rubric = "### **Applicability (1-4 points)**\n- **4**: Great.\n- **1**: Poor.";

        let text = judge_instructions(persona, example, rubric);
        assert!(text.starts_with(JUDGE_PREAMBLE));
        assert!(text.contains(persona));
        assert!(text.contains(example));
        assert!(text.contains(rubric));
        assert!(text.contains("like 3/4, 2/4"));
    }

    #[test]
    fn test_build_judge_is_deterministic_and_toolless() {
        let backend = Arc::new(MockBackend::new());
        let a = build_judge("Critical John", "p", "e", "r (1-4 points)", backend.clone());
        let b = build_judge("Critical John", "p", "e", "r (1-4 points)", backend);
        assert_eq!(a.system_instructions(), b.system_instructions());
        assert_eq!(a.role(), JUDGE_ROLE);
        assert!(!a.has_tools());
    }

    #[test]
    fn test_bundled_personas_embedded_verbatim() {
        let backend = Arc::new(MockBackend::new());
        for persona in bundled_judges().unwrap() {
            let agent = judge_from_persona(&persona, backend.clone());
            let text = agent.system_instructions();
            assert_eq!(agent.label(), persona.name);
            assert!(text.contains(&persona.persona));
            assert!(text.contains(&persona.example_feedback));
            assert!(text.contains(&persona.rubric));
        }
    }
}
