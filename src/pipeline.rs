//! End-to-end evaluation: panel → task → workforce → extraction → artifact

use std::path::PathBuf;
use std::time::Instant;

use chrono::Utc;
use tracing::{info, warn};

use crate::agent::{build_coordinator, build_researcher, judge_from_persona};
use crate::backend::{BackendFactory, SharedBackend};
use crate::config::EvalConfig;
use crate::error::Result;
use crate::extract::StructuredExtractor;
use crate::output::{self, RunReport};
use crate::persona::{Panel, PersonaManager};
use crate::search::{providers_from_settings, SharedSearchProvider};
use crate::types::{Feedback, Task};
use crate::workforce::{scored_judges, Workforce, WorkforceOptions};

/// Instruction of the evaluation task
pub const EVALUATION_TASK: &str = "Evaluate the hackathon project. First, do some research on \
the information related to the project, then each judge should give a score accordingly. \
Finally, list the opinions from each judge while preserving the judge's unique identity, \
along with the score and judge name, and also give a final summary of the opinions.";

/// Id of the single task processed per run
pub const TASK_ID: &str = "0";

/// Everything a completed run produced
#[derive(Debug)]
pub struct EvaluationOutcome {
    pub feedback: Feedback,
    pub artifact: PathBuf,
    pub report: Option<PathBuf>,
    pub task: Task,
}

/// Register the panel with a new workforce
pub fn build_workforce(
    config: &EvalConfig,
    panel: &Panel,
    backend: SharedBackend,
    providers: &[SharedSearchProvider],
) -> Workforce {
    let name = &config.workforce.name;
    let mut workforce = Workforce::new(name.clone(), build_coordinator(name, backend.clone()))
        .with_options(WorkforceOptions::from(&config.workforce));

    for judge in &panel.judges {
        workforce.register(judge.role_description(), judge_from_persona(judge, backend.clone()));
    }
    workforce.register(
        panel.researcher.role_description(),
        build_researcher(
            &panel.researcher,
            providers,
            config.search.max_results,
            config.workforce.max_tool_rounds,
            backend,
        ),
    );
    workforce
}

/// Run one evaluation and persist its Feedback artifact
pub async fn run_evaluation(config: &EvalConfig, project_id: &str, description: &str) -> Result<EvaluationOutcome> {
    output::validate_project_id(project_id)?;
    let started_at = Utc::now();
    let started = Instant::now();

    let panel = PersonaManager::new(config.persona_dir()).load_panel()?;
    let kind = config.backend_kind();
    let agent_backend = BackendFactory::create(kind, &config.model, &config.model.model)?;
    let extraction_backend = BackendFactory::create(kind, &config.model, &config.model.extraction_model)?;
    let providers = providers_from_settings(&config.search)?;
    if providers.is_empty() {
        warn!("No search providers enabled, research runs without tools");
    }

    let mut workforce = build_workforce(config, &panel, agent_backend, &providers);
    info!(
        project_id,
        backend = %kind,
        workers = workforce.registrations().len(),
        judges = ?workforce.judge_names(),
        providers = providers.len(),
        "Starting evaluation"
    );

    let mut task = Task::new(TASK_ID, EVALUATION_TASK, description);
    let processed = workforce.process(&mut task).await;

    let extracted = match processed {
        Ok(()) => {
            let narrative = task.result.clone().unwrap_or_default();
            let expected = scored_judges(&task);
            StructuredExtractor::new(extraction_backend)
                .extract(&narrative, &expected)
                .await
        }
        Err(e) => Err(e),
    };

    let report = if config.output.write_report {
        let run_report = RunReport::new(
            project_id,
            workforce.name(),
            &task,
            extracted.as_ref().ok(),
            started_at,
        );
        match output::write_run_report(&config.output_dir(), &run_report, config.output.create_dir) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "Run report not written");
                None
            }
        }
    } else {
        None
    };

    let feedback = extracted?;
    let artifact = output::write_feedback(&config.output_dir(), project_id, &feedback, config.output.create_dir)?;

    info!(
        project_id,
        judges = feedback.opinions.len(),
        failures = task.failures.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Evaluation complete"
    );

    Ok(EvaluationOutcome {
        feedback,
        artifact,
        report,
        task,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::output::read_feedback;
    use tempfile::TempDir;

    fn offline_config(dir: &TempDir) -> EvalConfig {
        let mut config = EvalConfig::default();
        config.model.backend = "mock".to_string();
        config.search.enable_google = false;
        config.search.enable_duckduckgo = false;
        config.output.dir = dir.path().join("output").display().to_string();
        config
    }

    #[tokio::test]
    async fn test_run_evaluation_writes_artifact() {
        let tmp = TempDir::new().unwrap();
        let mut config = offline_config(&tmp);
        config.output.write_report = true;

        let outcome = run_evaluation(&config, "goodheart", "WasteNot Market\nSurplus food.")
            .await
            .unwrap();

        assert_eq!(outcome.artifact, tmp.path().join("output").join("goodheart.json"));
        assert_eq!(read_feedback(&outcome.artifact).unwrap(), outcome.feedback);
        assert_eq!(
            outcome.feedback.judge_names(),
            vec!["Visionary Veronica", "Critical John", "Innovator Iris", "Friendly Frankie"]
        );
        assert!(outcome.feedback.summary.contains("4 judges weighed in"));
        assert!(outcome.report.unwrap().exists());
    }

    #[tokio::test]
    async fn test_failed_judge_is_left_out_of_feedback() {
        let tmp = TempDir::new().unwrap();
        let mut config = offline_config(&tmp);
        config.model.mock.fail_agents = vec!["Critical John".to_string()];

        let outcome = run_evaluation(&config, "p1", "A project").await.unwrap();
        assert_eq!(outcome.feedback.opinions.len(), 3);
        assert!(!outcome.feedback.judge_names().contains(&"Critical John"));
        assert_eq!(outcome.task.failures.len(), 1);
        assert!(outcome.feedback.summary.contains("No verdict was recorded for Critical John"));
        assert!(outcome.report.is_none());
    }

    #[tokio::test]
    async fn test_invalid_project_id_rejected_before_any_call() {
        let tmp = TempDir::new().unwrap();
        let config = offline_config(&tmp);
        let err = run_evaluation(&config, "../p", "A project").await.unwrap_err();
        assert!(matches!(err, Error::InvalidProjectId { .. }));
        assert!(!tmp.path().join("output").exists());
    }

    #[tokio::test]
    async fn test_failed_run_writes_report_but_no_artifact() {
        let tmp = TempDir::new().unwrap();
        let mut config = offline_config(&tmp);
        config.output.write_report = true;
        config.model.mock.fail_agents = vec!["Coordinator".to_string()];

        let err = run_evaluation(&config, "p1", "A project").await.unwrap_err();
        assert!(matches!(err, Error::Synthesis { .. }));

        let out = tmp.path().join("output");
        assert!(out.join("p1.run.json").exists());
        assert!(!out.join("p1.json").exists());
    }
}
