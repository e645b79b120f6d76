//! Workforce orchestrator
//!
//! Owns the worker registration table and drives one task through
//! decompose → dispatch → collect → synthesize. Research runs first so its
//! findings can be handed to every judge; judges then run independently of
//! each other (no judge sees another's verdict) with bounded concurrency, and
//! their verdicts are collected in registration order.

use std::future::Future;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use tracing::{debug, error, info, warn};

use crate::agent::{summary_prompt, EvaluatorAgent};
use crate::config::WorkforceSettings;
use crate::error::{Error, Result};
use crate::types::{Task, TaskPhase, WorkerFailure};

use super::narrative::{self, JudgeVerdict};
use super::state::{Subtask, SubtaskKind, SubtaskState};
use super::worker::{Worker, WorkerKind, WorkerRegistration};

/// Findings text handed to judges when no research output exists
pub const NO_FINDINGS: &str = "No research findings were available.";

// ─────────────────────────────────────────────────────────────────
// Options
// ─────────────────────────────────────────────────────────────────

/// Execution limits of a workforce
#[derive(Debug, Clone)]
pub struct WorkforceOptions {
    /// Time budget of each subtask, including its tool rounds
    pub subtask_timeout: Duration,

    /// Judge subtasks in flight at once
    pub max_concurrent_judges: usize,
}

impl Default for WorkforceOptions {
    fn default() -> Self {
        Self {
            subtask_timeout: Duration::from_secs(300),
            max_concurrent_judges: 4,
        }
    }
}

impl From<&WorkforceSettings> for WorkforceOptions {
    fn from(settings: &WorkforceSettings) -> Self {
        Self {
            subtask_timeout: Duration::from_secs(settings.subtask_timeout_secs),
            max_concurrent_judges: settings.max_concurrent_judges.max(1),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Plan
// ─────────────────────────────────────────────────────────────────

/// Decomposition result: (worker index, subtask index) pairs per phase
#[derive(Debug, Default)]
struct Plan {
    research: Vec<(usize, usize)>,
    judges: Vec<(usize, usize)>,
}

/// Outcome of one judge subtask, tagged with the subtask's slot on the task
struct JudgeOutcome {
    slot: usize,
    worker: String,
    subtask: Subtask,
    result: Result<String>,
}

// ─────────────────────────────────────────────────────────────────
// Workforce
// ─────────────────────────────────────────────────────────────────

pub struct Workforce {
    name: String,
    workers: Vec<Worker>,
    coordinator: EvaluatorAgent,
    options: WorkforceOptions,
}

impl Workforce {
    /// Create an empty workforce; `coordinator` writes the synthesis summary
    pub fn new(name: impl Into<String>, coordinator: EvaluatorAgent) -> Self {
        Self {
            name: name.into(),
            workers: Vec::new(),
            coordinator,
            options: WorkforceOptions::default(),
        }
    }

    pub fn with_options(mut self, options: WorkforceOptions) -> Self {
        self.options = options;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Register a worker under its role description
    ///
    /// Idempotent per role description: a repeated description keeps the
    /// first registration. A different description that resolves to an
    /// already registered display name is ignored as well, since names
    /// identify judges in the narrative.
    pub fn register(&mut self, role_description: impl Into<String>, agent: EvaluatorAgent) -> &mut Self {
        let role_description = role_description.into();
        let worker = Worker::new(role_description, agent);

        if let Some(existing) = self.workers.iter().find(|w| {
            w.registration.role_description == worker.registration.role_description
                || w.name() == worker.name()
        }) {
            warn!(
                workforce = %self.name,
                worker = %worker.name(),
                existing = %existing.registration.role_description,
                "Worker already registered, keeping the first registration"
            );
            return self;
        }

        info!(
            workforce = %self.name,
            worker = %worker.name(),
            kind = %worker.kind(),
            "Worker registered"
        );
        self.workers.push(worker);
        self
    }

    /// Registrations in registration order
    pub fn registrations(&self) -> Vec<&WorkerRegistration> {
        self.workers.iter().map(|w| &w.registration).collect()
    }

    /// Display names of the registered judges, in registration order
    pub fn judge_names(&self) -> Vec<&str> {
        self.workers
            .iter()
            .filter(|w| w.kind() == WorkerKind::Judge)
            .map(|w| w.name())
            .collect()
    }

    // ─────────────────────────────────────────────────────────────
    // Processing
    // ─────────────────────────────────────────────────────────────

    /// Process `task` to a terminal phase
    ///
    /// On success the task is `Synthesized` with its narrative in `result`.
    /// Individual worker failures are recorded in `task.failures` and do not
    /// fail the task; decomposition and synthesis errors do, and are also
    /// returned.
    pub async fn process(&mut self, task: &mut Task) -> Result<()> {
        if task.phase != TaskPhase::Pending {
            return Err(Error::Decomposition {
                task_id: task.id.clone(),
                message: format!("task is already {}", task.phase),
            });
        }

        let started = Instant::now();
        info!(task_id = %task.id, workforce = %self.name, workers = self.workers.len(), "Processing task");

        match self.run_phases(task).await {
            Ok(()) => {
                info!(
                    task_id = %task.id,
                    phase = %task.phase,
                    failures = task.failures.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Task synthesized"
                );
                Ok(())
            }
            Err(e) => {
                error!(
                    task_id = %task.id,
                    phase = %task.phase,
                    error = %e,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Task failed"
                );
                task.fail(e.to_string());
                Err(e)
            }
        }
    }

    async fn run_phases(&mut self, task: &mut Task) -> Result<()> {
        let plan = self.decompose(task)?;
        task.advance(TaskPhase::Decomposed)?;
        debug!(
            task_id = %task.id,
            phase = %task.phase,
            subtasks = task.subtasks.len(),
            "Task decomposed"
        );

        task.advance(TaskPhase::Dispatched)?;
        let findings = self.run_research(task, &plan).await;
        let verdicts = self.run_judges(task, &plan, &findings).await;

        self.synthesize(task, &verdicts).await
    }

    /// Split the task into one research subtask per helper and one
    /// evaluation subtask per judge
    fn decompose(&self, task: &mut Task) -> Result<Plan> {
        if task.content.trim().is_empty() {
            return Err(Error::Decomposition {
                task_id: task.id.clone(),
                message: "task content is empty".to_string(),
            });
        }
        if task.additional_info.trim().is_empty() {
            return Err(Error::Decomposition {
                task_id: task.id.clone(),
                message: "no project description attached".to_string(),
            });
        }
        if !self.workers.iter().any(|w| w.kind() == WorkerKind::Judge) {
            return Err(Error::Decomposition {
                task_id: task.id.clone(),
                message: "no judge workers registered".to_string(),
            });
        }

        let mut plan = Plan::default();
        let mut subtasks = Vec::new();

        for kind in [WorkerKind::Helper, WorkerKind::Judge] {
            for (index, worker) in self.workers.iter().enumerate() {
                if worker.kind() != kind {
                    continue;
                }
                let slot = subtasks.len();
                let subtask = match kind {
                    WorkerKind::Helper => {
                        plan.research.push((index, slot));
                        Subtask::new(
                            &task.id,
                            slot,
                            SubtaskKind::Research,
                            worker.name(),
                            research_instruction(task),
                        )
                    }
                    WorkerKind::Judge => {
                        plan.judges.push((index, slot));
                        Subtask::new(
                            &task.id,
                            slot,
                            SubtaskKind::Evaluate,
                            worker.name(),
                            judge_instruction(task, worker.name()),
                        )
                    }
                };
                subtasks.push(subtask);
            }
        }

        task.subtasks = subtasks;
        Ok(plan)
    }

    /// Run the research subtasks in order; failures are recorded and the
    /// remaining findings are returned
    async fn run_research(&mut self, task: &mut Task, plan: &Plan) -> String {
        let timeout = self.options.subtask_timeout;
        let mut findings = Vec::new();

        for &(index, slot) in &plan.research {
            let worker = &mut self.workers[index];
            let subtask = &mut task.subtasks[slot];

            worker.agent.reset_history();
            subtask.mark_running();
            debug!(task_id = %task.id, subtask_id = %subtask.id, worker = %worker.name(), "Research dispatched");

            let prompt = subtask.content.clone();
            let outcome = with_timeout(&subtask.id, timeout, worker.agent.respond(&prompt)).await;
            match outcome {
                Ok(text) => {
                    subtask.mark_completed(text.clone());
                    info!(
                        task_id = %task.id,
                        subtask_id = %subtask.id,
                        worker = %worker.name(),
                        elapsed_ms = subtask.execution_time_ms(),
                        "Research completed"
                    );
                    if !text.trim().is_empty() {
                        findings.push(text);
                    }
                }
                Err(e) => {
                    subtask.mark_failed(e.to_string());
                    warn!(
                        task_id = %task.id,
                        subtask_id = %subtask.id,
                        worker = %worker.name(),
                        error = %e,
                        "Research failed, judges continue without it"
                    );
                    task.failures
                        .push(WorkerFailure::from_error(worker.name(), &subtask.id, &e));
                }
            }
        }

        if findings.is_empty() {
            NO_FINDINGS.to_string()
        } else {
            findings.join("\n\n")
        }
    }

    /// Run every judge subtask and collect scored verdicts in registration order
    async fn run_judges(&mut self, task: &mut Task, plan: &Plan, findings: &str) -> Vec<JudgeVerdict> {
        let timeout = self.options.subtask_timeout;
        let max_concurrent = self.options.max_concurrent_judges.max(1);
        let task_id = task.id.clone();

        let mut jobs: Vec<(usize, usize, Subtask)> = plan
            .judges
            .iter()
            .map(|&(index, slot)| (index, slot, task.subtasks[slot].clone()))
            .collect();
        jobs.reverse();

        // Judge indices ascend with registration order, so each worker is
        // matched to its job by a single forward pass
        let runs = self
            .workers
            .iter_mut()
            .enumerate()
            .filter_map(|(index, worker)| {
                if jobs.last().map(|(i, _, _)| *i) != Some(index) {
                    return None;
                }
                let (_, slot, subtask) = jobs.pop()?;
                Some(run_judge(worker, slot, subtask, findings, timeout))
            })
            .collect::<Vec<_>>();

        // `buffered` yields in input order regardless of completion order
        let outcomes: Vec<JudgeOutcome> = stream::iter(runs).buffered(max_concurrent).collect().await;

        let mut verdicts = Vec::new();
        for outcome in outcomes {
            let JudgeOutcome {
                slot,
                worker,
                mut subtask,
                result,
            } = outcome;

            let result = result.and_then(|text| match narrative::find_score(&text) {
                Some(score) => Ok((score, text)),
                None => Err(Error::UnscoredVerdict {
                    worker: worker.clone(),
                }),
            });

            match result {
                Ok((score, text)) => {
                    subtask.mark_completed(text.clone());
                    info!(
                        task_id = %task_id,
                        subtask_id = %subtask.id,
                        worker = %worker,
                        score,
                        elapsed_ms = subtask.execution_time_ms(),
                        "Verdict collected"
                    );
                    verdicts.push(JudgeVerdict {
                        judge_name: worker,
                        score,
                        text,
                    });
                }
                Err(e) => {
                    // Keep the raw answer for diagnosis when there was one
                    if subtask.state != SubtaskState::Completed {
                        subtask.mark_failed(e.to_string());
                    } else {
                        subtask.state = SubtaskState::Failed;
                        subtask.error = Some(e.to_string());
                    }
                    warn!(
                        task_id = %task_id,
                        subtask_id = %subtask.id,
                        worker = %worker,
                        error = %e,
                        "Judge produced no verdict"
                    );
                    task.failures
                        .push(WorkerFailure::from_error(&worker, &subtask.id, &e));
                }
            }
            task.subtasks[slot] = subtask;
        }

        verdicts
    }

    /// Merge the verdicts into the narrative and commit it to the task
    async fn synthesize(&mut self, task: &mut Task, verdicts: &[JudgeVerdict]) -> Result<()> {
        if verdicts.is_empty() {
            return Err(Error::Synthesis {
                task_id: task.id.clone(),
                message: "no judge produced a scored verdict".to_string(),
            });
        }

        let sections = narrative::judge_sections(verdicts);
        self.coordinator.reset_history();
        let prompt = summary_prompt(&task.content, &sections, &task.failures);
        let summary = with_timeout(
            &format!("{}.summary", task.id),
            self.options.subtask_timeout,
            self.coordinator.respond(&prompt),
        )
        .await
        .map_err(|e| Error::Synthesis {
            task_id: task.id.clone(),
            message: format!("summary failed: {}", e),
        })?;

        if summary.trim().is_empty() {
            return Err(Error::Synthesis {
                task_id: task.id.clone(),
                message: "coordinator returned an empty summary".to_string(),
            });
        }

        let title = format!("{} verdicts for task {}", self.name, task.id);
        let text = narrative::render(&title, verdicts, &task.failures, &summary);
        task.complete(text)?;
        debug!(task_id = %task.id, phase = %task.phase, judges = verdicts.len(), "Narrative committed");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────
// Subtask execution
// ─────────────────────────────────────────────────────────────────

async fn run_judge(
    worker: &mut Worker,
    slot: usize,
    mut subtask: Subtask,
    findings: &str,
    timeout: Duration,
) -> JudgeOutcome {
    worker.agent.reset_history();
    subtask.mark_running();
    debug!(subtask_id = %subtask.id, worker = %worker.name(), "Judge dispatched");

    let prompt = format!("{}\n\nResearch findings:\n{}", subtask.content, findings.trim());
    let result = with_timeout(&subtask.id, timeout, worker.agent.respond(&prompt)).await;
    if let Ok(text) = &result {
        subtask.mark_completed(text.clone());
    }

    JudgeOutcome {
        slot,
        worker: worker.name().to_string(),
        subtask,
        result,
    }
}

async fn with_timeout<F>(subtask_id: &str, timeout: Duration, fut: F) -> Result<String>
where
    F: Future<Output = Result<String>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result,
        Err(_) => Err(Error::SubtaskTimeout {
            subtask_id: subtask_id.to_string(),
            timeout_secs: timeout.as_secs(),
        }),
    }
}

fn research_instruction(task: &Task) -> String {
    format!(
        "{}\n\nResearch the project described above for this task: {}\n\
         Look for related projects, prior art and current trends that help judge its \
         novelty and real-world relevance. Report what you found with sources.",
        task.additional_info.trim(),
        task.content.trim()
    )
}

fn judge_instruction(task: &Task, judge_name: &str) -> String {
    format!(
        "{}\n\nYou are {}. Evaluate the project below strictly by your own criteria, \
         in your own voice, and state your score as x/4.\n\nProject description:\n{}",
        task.content.trim(),
        judge_name,
        task.additional_info.trim()
    )
}

/// Judges whose verdict was collected, in registration order
pub fn scored_judges(task: &Task) -> Vec<&str> {
    task.subtasks
        .iter()
        .filter(|s| s.kind == SubtaskKind::Evaluate && s.state == SubtaskState::Completed)
        .map(|s| s.assignee.as_str())
        .collect()
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
