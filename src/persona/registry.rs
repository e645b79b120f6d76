//! Bundled persona registry: the default panel compiled into the binary.

use crate::error::{Error, Result};

use super::types::{JudgePersona, PersonaConfig, PersonaKind, ResearcherPersona};

/// Bundled persona files as (slug, TOML) pairs.
const BUNDLED: &[(&str, &str)] = &[
    (
        "visionary-veronica",
        include_str!("../../config/personas/visionary-veronica.toml"),
    ),
    (
        "critical-john",
        include_str!("../../config/personas/critical-john.toml"),
    ),
    (
        "innovator-iris",
        include_str!("../../config/personas/innovator-iris.toml"),
    ),
    (
        "friendly-frankie",
        include_str!("../../config/personas/friendly-frankie.toml"),
    ),
    (
        "researcher-rachel",
        include_str!("../../config/personas/researcher-rachel.toml"),
    ),
];

/// Registry of the bundled persona files.
pub struct PersonaRegistry;

impl PersonaRegistry {
    pub fn new() -> Self {
        Self
    }

    /// Slugs of every bundled persona, in panel order.
    pub fn slugs(&self) -> Vec<&'static str> {
        BUNDLED.iter().map(|(slug, _)| *slug).collect()
    }

    /// Get the bundled TOML for a slug.
    pub fn get_bundled_config(&self, slug: &str) -> Option<&'static str> {
        BUNDLED
            .iter()
            .find(|(s, _)| *s == slug)
            .map(|(_, content)| *content)
    }

    /// Parse every bundled persona.
    pub fn load_all(&self) -> Result<Vec<PersonaConfig>> {
        BUNDLED
            .iter()
            .map(|(slug, content)| PersonaConfig::parse(slug, content))
            .collect()
    }

    /// List all bundled personas.
    pub fn list_available(&self) -> Result<Vec<PersonaListing>> {
        Ok(self
            .load_all()?
            .iter()
            .map(|config| PersonaListing::from_config(config, true))
            .collect())
    }
}

impl Default for PersonaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of an available persona.
#[derive(Debug, Clone)]
pub struct PersonaListing {
    pub slug: String,
    pub kind: PersonaKind,
    pub role_description: String,
    pub bundled: bool,
}

impl PersonaListing {
    pub fn from_config(config: &PersonaConfig, bundled: bool) -> Self {
        Self {
            slug: config.slug().to_string(),
            kind: config.kind(),
            role_description: config.role_description(),
            bundled,
        }
    }
}

/// The bundled judges in panel order.
#[cfg(test)]
pub fn bundled_judges() -> Result<Vec<JudgePersona>> {
    let mut judges: Vec<JudgePersona> = PersonaRegistry::new()
        .load_all()?
        .into_iter()
        .filter_map(|config| match config {
            PersonaConfig::Judge(judge) => Some(judge),
            PersonaConfig::Researcher(_) => None,
        })
        .collect();
    judges.sort_by_key(|j| j.order);
    Ok(judges)
}

/// The bundled researcher.
pub fn bundled_researcher() -> Result<ResearcherPersona> {
    PersonaRegistry::new()
        .load_all()?
        .into_iter()
        .find_map(|config| match config {
            PersonaConfig::Researcher(researcher) => Some(researcher),
            PersonaConfig::Judge(_) => None,
        })
        .ok_or_else(|| Error::PersonaNotFound {
            name: "researcher".to_string(),
        })
}
