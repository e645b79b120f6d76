//! Persona manager: load the panel from the bundled set or a directory,
//! and export the bundled files for editing.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Error, Result};

use super::registry::{PersonaListing, PersonaRegistry};
use super::types::{JudgePersona, PersonaConfig, ResearcherPersona};

// ─────────────────────────────────────────────────────────────────
// Panel
// ─────────────────────────────────────────────────────────────────

/// The judges and researcher of one evaluation, judges in registration order.
#[derive(Debug, Clone)]
pub struct Panel {
    pub judges: Vec<JudgePersona>,
    pub researcher: ResearcherPersona,
}

impl Panel {
    pub fn judge_names(&self) -> Vec<&str> {
        self.judges.iter().map(|j| j.name.as_str()).collect()
    }
}

// ─────────────────────────────────────────────────────────────────
// Persona Manager
// ─────────────────────────────────────────────────────────────────

/// Manages persona sources.
pub struct PersonaManager {
    /// Directory of persona TOML files; `None` uses the bundled panel.
    persona_dir: Option<PathBuf>,

    registry: PersonaRegistry,
}

impl PersonaManager {
    pub fn new(persona_dir: Option<PathBuf>) -> Self {
        Self {
            persona_dir,
            registry: PersonaRegistry::new(),
        }
    }

    pub fn persona_dir(&self) -> Option<&Path> {
        self.persona_dir.as_deref()
    }

    // ─────────────────────────────────────────────────────────────
    // Load
    // ─────────────────────────────────────────────────────────────

    /// Every persona from the active source.
    pub fn load_all(&self) -> Result<Vec<PersonaConfig>> {
        match &self.persona_dir {
            None => self.registry.load_all(),
            Some(dir) => load_dir(dir),
        }
    }

    /// Assemble the panel
    ///
    /// Judges are ordered by `order`, then slug. A directory without a
    /// researcher file falls back to the bundled researcher.
    pub fn load_panel(&self) -> Result<Panel> {
        let mut judges = Vec::new();
        let mut researcher: Option<ResearcherPersona> = None;

        for config in self.load_all()? {
            match config {
                PersonaConfig::Judge(judge) => judges.push(judge),
                PersonaConfig::Researcher(r) => {
                    if let Some(existing) = &researcher {
                        return Err(Error::persona_invalid(
                            &r.slug,
                            format!("second researcher; '{}' is already defined", existing.slug),
                        ));
                    }
                    researcher = Some(r);
                }
            }
        }

        let source = self.source_label();
        if judges.is_empty() {
            return Err(Error::persona_invalid(source, "no judge personas found"));
        }
        judges.sort_by(|a, b| a.order.cmp(&b.order).then_with(|| a.slug.cmp(&b.slug)));

        let mut seen = HashSet::new();
        for judge in &judges {
            if !seen.insert(judge.name.to_lowercase()) {
                return Err(Error::persona_invalid(
                    &judge.slug,
                    format!("duplicate judge name '{}'", judge.name),
                ));
            }
        }

        let researcher = match researcher {
            Some(r) => r,
            None => super::registry::bundled_researcher()?,
        };

        let panel = Panel { judges, researcher };
        debug!(
            source = %source,
            judges = ?panel.judge_names(),
            researcher = %panel.researcher.name,
            "Panel loaded"
        );
        Ok(panel)
    }

    /// List personas from the active source.
    ///
    /// Directory personas are flagged `bundled` when they shadow a bundled slug.
    pub fn list(&self) -> Result<Vec<PersonaListing>> {
        let Some(dir) = &self.persona_dir else {
            return self.registry.list_available();
        };
        Ok(load_dir(dir)?
            .iter()
            .map(|config| {
                let bundled = self.registry.get_bundled_config(config.slug()).is_some();
                PersonaListing::from_config(config, bundled)
            })
            .collect())
    }

    /// Find one persona by slug or display name (case-insensitive).
    pub fn show(&self, key: &str) -> Result<PersonaConfig> {
        let key = key.trim().to_lowercase();
        self.load_all()?
            .into_iter()
            .find(|c| c.slug().to_lowercase() == key || c.name().to_lowercase() == key)
            .ok_or(Error::PersonaNotFound { name: key })
    }

    // ─────────────────────────────────────────────────────────────
    // Export
    // ─────────────────────────────────────────────────────────────

    /// Write the bundled persona files into `dest`.
    pub fn export(&self, dest: &Path, force: bool) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dest).map_err(|e| Error::IoWrite {
            path: dest.to_path_buf(),
            source: e,
        })?;

        let mut written = Vec::new();
        for slug in self.registry.slugs() {
            let Some(content) = self.registry.get_bundled_config(slug) else {
                continue;
            };
            let path = dest.join(format!("{}.toml", slug));
            if path.exists() && !force {
                return Err(Error::Config(format!(
                    "Persona file already exists: {}. Use --force to overwrite.",
                    path.display()
                )));
            }
            fs::write(&path, content).map_err(|e| Error::IoWrite {
                path: path.clone(),
                source: e,
            })?;
            written.push(path);
        }

        info!(dir = %dest.display(), count = written.len(), "Personas exported");
        Ok(written)
    }

    fn source_label(&self) -> String {
        match &self.persona_dir {
            Some(dir) => dir.display().to_string(),
            None => "bundled".to_string(),
        }
    }
}

/// Parse every `*.toml` file in `dir`, sorted by file name.
fn load_dir(dir: &Path) -> Result<Vec<PersonaConfig>> {
    if !dir.is_dir() {
        return Err(Error::PersonaNotFound {
            name: dir.display().to_string(),
        });
    }

    let entries = fs::read_dir(dir).map_err(|e| Error::IoRead {
        path: dir.to_path_buf(),
        source: e,
    })?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().map_or(false, |ext| ext == "toml"))
        .collect();
    paths.sort();

    paths
        .iter()
        .map(|path| {
            let slug = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_default();
            let content = fs::read_to_string(path).map_err(|e| Error::IoRead {
                path: path.clone(),
                source: e,
            })?;
            PersonaConfig::parse(&slug, &content)
        })
        .collect()
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn judge_toml(name: &str, order: u32) -> String {
        format!(
            "kind = \"judge\"\nname = \"{}\"\ntitle = \"a critic.\"\norder = {}\n\
             persona = \"You are a critic.\"\nexample_feedback = \"Meh.\"\n\
             rubric = \"### Taste (1-4 points)\"\n",
            name, order
        )
    }

    #[test]
    fn test_bundled_panel() {
        let panel = PersonaManager::new(None).load_panel().unwrap();
        assert_eq!(panel.judges.len(), 4);
        assert_eq!(panel.judge_names()[0], "Visionary Veronica");
        assert_eq!(panel.researcher.name, "Researcher Rachel");
    }

    #[test]
    fn test_directory_panel_order_and_researcher_fallback() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("a-zed.toml"), judge_toml("Zed", 2)).unwrap();
        fs::write(tmp.path().join("b-amy.toml"), judge_toml("Amy", 1)).unwrap();
        fs::write(tmp.path().join("notes.txt"), "ignored").unwrap();

        let panel = PersonaManager::new(Some(tmp.path().to_path_buf()))
            .load_panel()
            .unwrap();
        assert_eq!(panel.judge_names(), vec!["Amy", "Zed"]);
        assert_eq!(panel.researcher.name, "Researcher Rachel");
    }

    #[test]
    fn test_directory_without_judges_rejected() {
        let tmp = TempDir::new().unwrap();
        let err = PersonaManager::new(Some(tmp.path().to_path_buf()))
            .load_panel()
            .unwrap_err();
        assert!(matches!(err, Error::PersonaInvalid { .. }));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("one.toml"), judge_toml("Amy", 1)).unwrap();
        fs::write(tmp.path().join("two.toml"), judge_toml("amy", 2)).unwrap();
        let err = PersonaManager::new(Some(tmp.path().to_path_buf()))
            .load_panel()
            .unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn test_missing_directory() {
        let err = PersonaManager::new(Some(PathBuf::from("/nonexistent/personas")))
            .load_panel()
            .unwrap_err();
        assert!(matches!(err, Error::PersonaNotFound { .. }));
    }

    #[test]
    fn test_export_then_load() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("personas");
        let written = PersonaManager::new(None).export(&dest, false).unwrap();
        assert_eq!(written.len(), 5);

        // Second export refuses to overwrite without force
        assert!(PersonaManager::new(None).export(&dest, false).is_err());
        assert!(PersonaManager::new(None).export(&dest, true).is_ok());

        let from_dir = PersonaManager::new(Some(dest)).load_panel().unwrap();
        let bundled = PersonaManager::new(None).load_panel().unwrap();
        assert_eq!(from_dir.judges, bundled.judges);
    }

    #[test]
    fn test_list_flags_bundled_slugs() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("critical-john.toml"), judge_toml("Critical John", 1)).unwrap();
        fs::write(tmp.path().join("amy.toml"), judge_toml("Amy", 2)).unwrap();

        let listed = PersonaManager::new(Some(tmp.path().to_path_buf())).list().unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].slug, "amy");
        assert!(!listed[0].bundled);
        assert!(listed[1].bundled);

        let bundled = PersonaManager::new(None).list().unwrap();
        assert_eq!(bundled.len(), 5);
        assert!(bundled.iter().all(|l| l.bundled));
    }

    #[test]
    fn test_show_by_slug_or_name() {
        let manager = PersonaManager::new(None);
        assert_eq!(manager.show("critical-john").unwrap().name(), "Critical John");
        assert_eq!(manager.show("innovator iris").unwrap().slug(), "innovator-iris");
        assert!(matches!(
            manager.show("nobody").unwrap_err(),
            Error::PersonaNotFound { .. }
        ));
    }
}
