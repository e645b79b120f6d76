//! Persona system: the judges and researcher that make up the panel.
//!
//! Personas are TOML files. The default panel is bundled into the binary and
//! can be exported, edited and loaded back from a directory.

pub mod manager;
pub mod registry;
pub mod types;

pub use manager::{Panel, PersonaManager};
#[cfg(test)]
pub use registry::{bundled_judges, bundled_researcher};
pub use types::{JudgePersona, ResearcherPersona};
