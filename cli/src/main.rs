use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::PathBuf;

mod commands;
mod context;
mod logging;
mod utils;

use commands::{batch, check, evaluate, seed, subject, validate};

/// provctl - provision template-driven groups and folders
#[derive(Parser)]
#[command(name = "provctl")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

/// Options shared by every command
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Provisioner settings file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Definitions file or directory
    #[arg(long, global = true)]
    pub definitions: Option<PathBuf>,

    /// SQLite group store
    #[arg(long, global = true)]
    pub database: Option<PathBuf>,

    /// Use an in-memory store seeded with the preexisting definitions
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Also write daily log files to this directory
    #[arg(long, global = true, env = "PROVISIONER_LOG_DIR")]
    pub log_dir: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum SeedKind {
    Folder,
    Group,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the definitions and report what they describe
    Validate {
        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Evaluate a template against positional values
    Evaluate {
        /// Template, e.g. "org:root:%ETAB%:%CLASSE%"
        template: String,

        /// Values by element position
        values: Vec<String>,
    },

    /// Verify preexisting resources and create the constant empty groups
    Check {
        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Add a subject to the groups its definitions call for
    Add {
        /// YAML subject description
        subject_file: PathBuf,
    },

    /// Reconcile a subject's managed memberships
    Update {
        /// YAML subject description
        subject_file: PathBuf,
    },

    /// Remove a subject from its groups
    Remove {
        subject_id: String,

        /// Only memberships made by the provisioner
        #[arg(long)]
        managed_only: bool,
    },

    /// Run a YAML list of jobs
    Batch {
        file: PathBuf,

        /// Output format (json, text)
        #[arg(short, long, default_value = "text")]
        format: String,
    },

    /// Register an externally managed resource in the store
    Seed {
        /// Full path of the resource
        path: String,

        #[arg(short, long, value_enum, default_value = "folder")]
        kind: SeedKind,
    },
}

async fn run(command: Commands, global: &GlobalArgs) -> Result<()> {
    match command {
        Commands::Validate { format } => validate::execute(global, format),
        Commands::Evaluate { template, values } => evaluate::execute(&template, &values),
        Commands::Check { format } => check::execute(global, format).await,
        Commands::Add { subject_file } => subject::add(global, &subject_file).await,
        Commands::Update { subject_file } => subject::update(global, &subject_file).await,
        Commands::Remove {
            subject_id,
            managed_only,
        } => subject::remove(global, &subject_id, managed_only).await,
        Commands::Batch { file, format } => batch::execute(global, &file, format).await,
        Commands::Seed { path, kind } => seed::execute(global, &path, kind).await,
    }
}

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    let guard = match logging::init_logging(cli.global.verbose, cli.global.log_dir.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    };

    let code = match run(cli.command, &cli.global).await {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            1
        }
    };

    // Flush buffered log lines before exiting
    drop(guard);
    std::process::exit(code);
}
