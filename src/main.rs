//! judge-panel - Multi-agent hackathon project evaluation
//!
//! This is the main entry point for the judge-panel binary. A workforce of
//! persona-conditioned judges and a research agent evaluates one project
//! description; the narrative is reduced to a structured Feedback record and
//! written to `<output dir>/<project_id>.json`.

mod agent;
mod backend;
mod cli;
mod config;
mod error;
mod extract;
mod logging;
mod output;
mod persona;
mod pipeline;
mod search;
mod tools;
mod types;
mod version;
mod workforce;

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::{debug, info};

use crate::cli::{Cli, Commands, ConfigSubcommand, EvaluateArgs, PersonaSubcommand};
use crate::config::EvalConfig;
use crate::error::{Error, Result};
use crate::persona::PersonaManager;

fn main() {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    if let Commands::Version = cli.command {
        version::print_version();
        return Ok(());
    }
    if let Commands::Config {
        subcommand: ConfigSubcommand::Init { ref path, force },
    } = cli.command
    {
        let written = config::init_config(path.as_deref(), force)?;
        println!("Configuration written to {}", written.display());
        return Ok(());
    }

    let mut config = EvalConfig::load(cli.config.as_deref())?;
    if let Commands::Evaluate(ref args) = cli.command {
        apply_cli_overrides(&mut config, args)?;
    }

    // The guards must be kept alive for the lifetime of the program
    let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let build = version::build_info();
    debug!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting judge-panel"
    );

    match cli.command {
        Commands::Evaluate(args) => evaluate(&config, &args),
        Commands::Config { subcommand } => handle_config_command(&config, subcommand),
        Commands::Persona { subcommand } => handle_persona_command(&config, subcommand),
        // Handled before configuration loading
        Commands::Version => Ok(()),
    }
}

/// CLI flags take precedence over environment and file settings
fn apply_cli_overrides(config: &mut EvalConfig, args: &EvaluateArgs) -> Result<()> {
    if let Some(ref dir) = args.output_dir {
        config.output.dir = dir.clone();
    }
    if let Some(ref dir) = args.persona_dir {
        config.panel.persona_dir = Some(dir.clone());
    }
    if args.report {
        config.output.write_report = true;
    }
    config.validate()
}

/// Run one evaluation on a multi-threaded runtime
fn evaluate(config: &EvalConfig, args: &EvaluateArgs) -> Result<()> {
    let description = match (&args.description, &args.description_file) {
        (Some(text), _) => text.clone(),
        (None, Some(path)) => read_description(Path::new(path))?,
        (None, None) => {
            return Err(Error::Config(
                "either --description or --description-file is required".to_string(),
            ))
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .worker_threads(num_cpus::get().clamp(1, 8))
        .thread_name("judge-panel")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    let outcome = runtime.block_on(pipeline::run_evaluation(config, &args.project_id, &description))?;

    if let Some(ref report) = outcome.report {
        info!(path = %report.display(), "Run report written");
    }
    for failure in &outcome.task.failures {
        eprintln!(
            "Warning: {} produced no output for subtask {} [{}]: {}",
            failure.worker, failure.subtask_id, failure.code, failure.message
        );
    }
    println!("{}", outcome.artifact.display());
    Ok(())
}

fn read_description(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::IoRead {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Handle configuration subcommands
fn handle_config_command(config: &EvalConfig, subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show => {
            println!("{}", toml::to_string_pretty(&redacted(config))?);
        }
        ConfigSubcommand::Validate => {
            // Loading already validated; also make sure the panel resolves
            let panel = PersonaManager::new(config.persona_dir()).load_panel()?;
            println!(
                "Configuration is valid ({} backend, {} judges).",
                config.backend_kind(),
                panel.judges.len()
            );
        }
        // Handled before configuration loading
        ConfigSubcommand::Init { .. } => {}
    }

    Ok(())
}

/// Copy of the configuration with credentials masked
fn redacted(config: &EvalConfig) -> EvalConfig {
    const MASK: &str = "********";
    let mut shown = config.clone();
    for secret in [&mut shown.model.api_key, &mut shown.search.google_api_key] {
        if !secret.is_empty() {
            *secret = MASK.to_string();
        }
    }
    shown
}

/// Handle persona subcommands
fn handle_persona_command(config: &EvalConfig, subcommand: PersonaSubcommand) -> Result<()> {
    let manager = PersonaManager::new(config.persona_dir());

    match subcommand {
        PersonaSubcommand::List => {
            let source = match manager.persona_dir() {
                Some(dir) => dir.display().to_string(),
                None => "bundled".to_string(),
            };
            println!("Personas ({}):", source);
            for listing in manager.list()? {
                let origin = if listing.bundled { "bundled" } else { "custom" };
                println!(
                    "  {:<22} {:<11} {:<8} {}",
                    listing.slug,
                    listing.kind.to_string(),
                    origin,
                    listing.role_description
                );
            }
        }
        PersonaSubcommand::Show { persona } => {
            let found = manager.show(&persona)?;
            println!("# {}\n", found.role_description());
            println!("{}", toml::to_string_pretty(&found)?);
        }
        PersonaSubcommand::Export { dir, force } => {
            let dest = PathBuf::from(shellexpand::tilde(&dir).into_owned());
            let written = manager.export(&dest, force)?;
            for path in &written {
                println!("{}", path.display());
            }
        }
    }

    Ok(())
}
