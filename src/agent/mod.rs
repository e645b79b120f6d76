//! Evaluator agents
//!
//! An agent wraps a model backend with fixed system instructions and,
//! optionally, a set of tools. Judges, the researcher and the workforce
//! coordinator are all plain `EvaluatorAgent`s built by the factories here.

mod coordinator;
mod evaluator;
mod judge;
mod research;

pub use coordinator::{build_coordinator, summary_prompt};
pub use evaluator::EvaluatorAgent;
#[cfg(test)]
pub use judge::build_judge;
pub use judge::{judge_from_persona, JUDGE_PREAMBLE};
pub use research::build_researcher;
