//! Core types for the persona system.
//!
//! A persona file describes one member of the panel: a judge with its voice,
//! example feedback and rubric, or the researcher that supports the judges.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Persona Kind
// ─────────────────────────────────────────────────────────────────

/// The two roles a persona can fill on the panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersonaKind {
    /// Scores the project against its rubric.
    Judge,
    /// Searches the web for context on the project.
    Researcher,
}

impl PersonaKind {
    pub fn slug(&self) -> &'static str {
        match self {
            PersonaKind::Judge => "judge",
            PersonaKind::Researcher => "researcher",
        }
    }

    /// Marker used in workforce role descriptions.
    pub fn marker(&self) -> &'static str {
        match self {
            PersonaKind::Judge => "Judge",
            PersonaKind::Researcher => "Helper",
        }
    }
}

impl fmt::Display for PersonaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.slug())
    }
}

impl FromStr for PersonaKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "judge" => Ok(PersonaKind::Judge),
            "researcher" | "helper" => Ok(PersonaKind::Researcher),
            _ => Err(format!("Unknown persona kind '{}'. Valid: judge, researcher", s)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Persona Records (loaded from TOML)
// ─────────────────────────────────────────────────────────────────

/// A judge persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JudgePersona {
    /// File stem the persona was loaded from (e.g. "critical-john").
    #[serde(skip)]
    pub slug: String,

    /// Display name; becomes the agent label and the `judge_name` of its opinion.
    pub name: String,

    /// Short description following the name in the role description.
    pub title: String,

    /// Registration position on the panel (ascending).
    #[serde(default)]
    pub order: u32,

    /// Voice the judge must adopt.
    pub persona: String,

    /// Sample feedback in that voice.
    pub example_feedback: String,

    /// Scoring rubric, embedded verbatim in the instructions.
    pub rubric: String,
}

/// The researcher persona.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResearcherPersona {
    #[serde(skip)]
    pub slug: String,

    pub name: String,

    pub title: String,

    /// System instructions of the research agent.
    pub instructions: String,
}

/// One persona file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum PersonaConfig {
    Judge(JudgePersona),
    Researcher(ResearcherPersona),
}

fn require(slug: &str, field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::persona_invalid(slug, format!("'{}' must not be empty", field)));
    }
    Ok(())
}

impl JudgePersona {
    /// Check that every text field is present and the rubric scores on 1-4.
    pub fn validate(&self) -> Result<()> {
        require(&self.slug, "name", &self.name)?;
        require(&self.slug, "title", &self.title)?;
        require(&self.slug, "persona", &self.persona)?;
        require(&self.slug, "example_feedback", &self.example_feedback)?;
        require(&self.slug, "rubric", &self.rubric)?;
        if self.name.contains('(') || self.name.contains(',') {
            return Err(Error::persona_invalid(
                &self.slug,
                "'name' must not contain '(' or ','",
            ));
        }
        if !self.rubric.contains("1-4") {
            return Err(Error::persona_invalid(
                &self.slug,
                "rubric must describe a 1-4 point scale",
            ));
        }
        Ok(())
    }

    /// Role description used to register the judge with the workforce.
    pub fn role_description(&self) -> String {
        role_description(&self.name, PersonaKind::Judge, &self.title)
    }
}

impl ResearcherPersona {
    pub fn validate(&self) -> Result<()> {
        require(&self.slug, "name", &self.name)?;
        require(&self.slug, "title", &self.title)?;
        require(&self.slug, "instructions", &self.instructions)?;
        if self.name.contains('(') || self.name.contains(',') {
            return Err(Error::persona_invalid(
                &self.slug,
                "'name' must not contain '(' or ','",
            ));
        }
        Ok(())
    }

    pub fn role_description(&self) -> String {
        role_description(&self.name, PersonaKind::Researcher, &self.title)
    }
}

fn role_description(name: &str, kind: PersonaKind, title: &str) -> String {
    format!("{} ({}), {}", name.trim(), kind.marker(), title.trim())
}

impl PersonaConfig {
    /// Parse a persona file; `slug` is its file stem.
    pub fn parse(slug: &str, content: &str) -> Result<Self> {
        let mut config: PersonaConfig = toml::from_str(content).map_err(|e| {
            Error::persona_invalid(slug, format!("Failed to parse TOML: {}", e))
        })?;
        match &mut config {
            PersonaConfig::Judge(judge) => judge.slug = slug.to_string(),
            PersonaConfig::Researcher(researcher) => researcher.slug = slug.to_string(),
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            PersonaConfig::Judge(judge) => judge.validate(),
            PersonaConfig::Researcher(researcher) => researcher.validate(),
        }
    }

    pub fn kind(&self) -> PersonaKind {
        match self {
            PersonaConfig::Judge(_) => PersonaKind::Judge,
            PersonaConfig::Researcher(_) => PersonaKind::Researcher,
        }
    }

    pub fn slug(&self) -> &str {
        match self {
            PersonaConfig::Judge(judge) => &judge.slug,
            PersonaConfig::Researcher(researcher) => &researcher.slug,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            PersonaConfig::Judge(judge) => &judge.name,
            PersonaConfig::Researcher(researcher) => &researcher.name,
        }
    }

    pub fn role_description(&self) -> String {
        match self {
            PersonaConfig::Judge(judge) => judge.role_description(),
            PersonaConfig::Researcher(researcher) => researcher.role_description(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    const JUDGE: &str = r####"
kind = "judge"
name = "Plain Paula"
title = "a product critic."
order = 7
persona = "You are a product critic."
example_feedback = "Fine, I guess."
rubric = "### Polish (1-4 points)"
"####;

    #[test]
    fn test_parse_judge() {
        let config = PersonaConfig::parse("plain-paula", JUDGE).unwrap();
        assert_eq!(config.kind(), PersonaKind::Judge);
        assert_eq!(config.slug(), "plain-paula");
        let PersonaConfig::Judge(judge) = config else {
            panic!("expected a judge");
        };
        assert_eq!(judge.order, 7);
        assert_eq!(judge.role_description(), "Plain Paula (Judge), a product critic.");
    }

    #[test]
    fn test_parse_researcher() {
        let content = r#"
kind = "researcher"
name = "Scout Sam"
title = "a web researcher."
instructions = "You research things."
"#;
        let config = PersonaConfig::parse("scout-sam", content).unwrap();
        assert_eq!(config.kind(), PersonaKind::Researcher);
        assert_eq!(config.role_description(), "Scout Sam (Helper), a web researcher.");
    }

    #[test]
    fn test_empty_field_rejected() {
        let content = JUDGE.replace("Fine, I guess.", "  ");
        let err = PersonaConfig::parse("plain-paula", &content).unwrap_err();
        assert!(err.to_string().contains("example_feedback"));
    }

    #[test]
    fn test_rubric_without_scale_rejected() {
        let content = JUDGE.replace("(1-4 points)", "(out of ten)");
        assert!(PersonaConfig::parse("plain-paula", &content).is_err());
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let content = JUDGE.replace("kind = \"judge\"", "kind = \"mentor\"");
        assert!(PersonaConfig::parse("plain-paula", &content).is_err());
    }

    #[test]
    fn test_persona_kind_from_str() {
        assert_eq!("judge".parse::<PersonaKind>().unwrap(), PersonaKind::Judge);
        assert_eq!("Helper".parse::<PersonaKind>().unwrap(), PersonaKind::Researcher);
        assert!("mentor".parse::<PersonaKind>().is_err());
    }
}
