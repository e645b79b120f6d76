//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for judge-panel.

use clap::{Args, Parser, Subcommand};

/// judge-panel - Multi-agent hackathon project evaluation
///
/// A panel of persona-conditioned judges, helped by a web research agent,
/// scores a project description and writes the structured feedback to
/// `<output dir>/<project_id>.json`.
#[derive(Parser, Debug)]
#[command(name = "judge-panel")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "JUDGE_PANEL_CONFIG", global = true)]
    pub config: Option<String>,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Evaluate one project and write its feedback artifact
    Evaluate(EvaluateArgs),

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Judge and researcher personas
    Persona {
        #[command(subcommand)]
        subcommand: PersonaSubcommand,
    },
}

/// Arguments of `evaluate`
#[derive(Args, Debug, Clone)]
pub struct EvaluateArgs {
    /// Project identifier, used as the artifact file name
    pub project_id: String,

    /// Project description text
    #[arg(short, long, conflicts_with = "description_file", required_unless_present = "description_file")]
    pub description: Option<String>,

    /// File holding the project description
    #[arg(short = 'f', long)]
    pub description_file: Option<String>,

    /// Override the output directory
    #[arg(short, long)]
    pub output_dir: Option<String>,

    /// Override the persona directory
    #[arg(long)]
    pub persona_dir: Option<String>,

    /// Also write `<project_id>.run.json`
    #[arg(long)]
    pub report: bool,
}

/// Persona subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum PersonaSubcommand {
    /// List the personas of the active panel
    List,

    /// Show one persona by slug or name
    Show {
        /// Slug (e.g. critical-john) or display name
        persona: String,
    },

    /// Write the bundled persona files into a directory for editing
    Export {
        /// Destination directory
        dir: String,

        /// Overwrite existing files
        #[arg(long)]
        force: bool,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show,

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration
    Validate,
}
