//! Workforce: worker registration, task orchestration and narrative synthesis

pub mod narrative;
mod orchestrator;
mod state;
mod worker;

pub use orchestrator::{scored_judges, Workforce, WorkforceOptions};
pub use state::Subtask;
