//! Main CLI application

use crate::cli::report::{Reporter, Verbosity};
use crate::config::{parse_config_auto, parse_config_file, validate_config};
use crate::engine::{TaskContext, Workflow, WorkflowState};
use crate::runner::WorkflowFactory;
use crate::tasks::{PendingPrompt, PromptQueue};
use anyhow::{Context as _, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::*;
use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Exit status of a completed workflow
pub const EXIT_COMPLETED: i32 = 0;
/// Exit status of a failed workflow
pub const EXIT_FAILED: i32 = 1;
/// Exit status of a cancelled workflow
pub const EXIT_CANCELLED: i32 = 2;

#[derive(Debug, Parser)]
#[command(name = "taskflow", version, about = "Run task workflows defined in taskflow.yml")]
pub struct Cli {
    /// Path to taskflow.yml config file
    #[arg(short, long, value_name = "FILE", global = true)]
    pub file: Option<PathBuf>,

    /// Only print failures and errors
    #[arg(short, long, global = true, conflicts_with_all = ["silent", "verbose"])]
    pub quiet: bool,

    /// Print no output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub silent: bool,

    /// Print verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the available workflows
    List,

    /// Run a workflow
    Run {
        /// Name of the workflow to run
        workflow: String,

        /// Seed a context variable
        #[arg(long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        vars: Vec<(String, String)>,

        /// Answer a prompt ahead of time
        #[arg(long = "answer", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        answers: Vec<(String, String)>,

        /// Load variables from a .env style file
        #[arg(long = "env-file", value_name = "FILE")]
        env_files: Vec<PathBuf>,
    },

    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Get verbosity level from the global flags
    pub fn verbosity(&self) -> Verbosity {
        if self.silent {
            Verbosity::Silent
        } else if self.quiet {
            Verbosity::Quiet
        } else if self.verbose {
            Verbosity::Verbose
        } else {
            Verbosity::Normal
        }
    }
}

/// A reply read from the terminal
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Value(String),
    Skip,
    Cancel,
}

/// Parse a `key=value` pair
pub fn parse_key_value(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty key in '{}'", s));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Run the CLI application with the process arguments
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbosity());
    execute(cli, &mut io::stdin().lock())
}

/// Execute parsed arguments, reading prompt answers from `input`
pub fn execute(cli: Cli, input: &mut impl BufRead) -> Result<i32> {
    let verbosity = cli.verbosity();

    let (workflow, vars, answers, env_files) = match cli.command {
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            clap_complete::generate(shell, &mut cmd, name, &mut io::stdout());
            return Ok(EXIT_COMPLETED);
        }
        Commands::List => {
            let factory = load(cli.file.as_deref())?.0;
            list(&factory, verbosity);
            return Ok(EXIT_COMPLETED);
        }
        Commands::Run {
            workflow,
            vars,
            answers,
            env_files,
        } => (workflow, vars, answers, env_files),
    };

    let (factory, config_path) = load(cli.file.as_deref())?;
    let ctx = TaskContext::new();

    let default_env = config_path.with_file_name(".env");
    if default_env.is_file() {
        load_env_file(&ctx, &default_env)?;
    }
    for path in &env_files {
        load_env_file(&ctx, path)?;
    }
    for (key, value) in vars {
        ctx.set_var(key, value);
    }

    let flow = factory.build(&workflow)?;
    flow.add_listener(Reporter::new(&workflow, verbosity));
    flow.start(&ctx)?;

    let mut answers: HashMap<String, String> = answers.into_iter().collect();
    answer_prompts(&flow, factory.prompts(), &mut answers, input)?;

    Ok(exit_code(flow.state()))
}

/// Load and validate the configuration, returning where it was found
fn load(file: Option<&Path>) -> Result<(WorkflowFactory, PathBuf)> {
    let (config, path) = match file {
        Some(path) => {
            let config = parse_config_file(path)
                .with_context(|| format!("failed to load {}", path.display()))?;
            (config, path.to_path_buf())
        }
        None => parse_config_auto()?,
    };
    validate_config(&config)?;
    tracing::debug!(path = %path.display(), workflows = config.workflows.len(), "config loaded");
    Ok((WorkflowFactory::new(config), path))
}

fn load_env_file(ctx: &TaskContext, path: &Path) -> Result<()> {
    let entries = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to read env file {}", path.display()))?;
    for entry in entries {
        let (key, value) = entry?;
        ctx.set_var(key, value);
    }
    tracing::debug!(path = %path.display(), "env file loaded");
    Ok(())
}

fn list(factory: &WorkflowFactory, verbosity: Verbosity) {
    if verbosity == Verbosity::Silent {
        return;
    }
    if let Some(usage) = &factory.config().usage {
        println!("{}\n", usage);
    }
    println!("{}", "Workflows:".bold());
    for (name, def) in factory.listed() {
        match &def.usage {
            Some(usage) => println!("  {:<20} {}", name.green(), usage),
            None => println!("  {}", name.green()),
        }
    }
}

/// Resume the workflow until it stops waiting on prompts
///
/// Prompts answered with `--answer` are resolved first; the rest are read
/// from `input`. A workflow suspended on anything other than a prompt cannot
/// be resumed from here and is cancelled.
fn answer_prompts(
    workflow: &Workflow,
    prompts: &PromptQueue,
    answers: &mut HashMap<String, String>,
    input: &mut impl BufRead,
) -> Result<()> {
    while workflow.state() == WorkflowState::Running {
        let Some(prompt) = prompts.pop() else {
            tracing::warn!(awaiting = ?workflow.awaiting(), "workflow suspended with no prompt to answer");
            workflow.cancel()?;
            break;
        };
        if let Some(value) = answers.remove(prompt.key()) {
            prompt.answer(value);
            continue;
        }
        ask(prompt, input)?;
    }
    Ok(())
}

fn ask(prompt: PendingPrompt, input: &mut impl BufRead) -> io::Result<()> {
    let label = if prompt.skip_allowed() {
        format!("{} (blank to skip): ", prompt.message())
    } else {
        format!("{}: ", prompt.message())
    };
    loop {
        match read_answer(&label, input)? {
            Answer::Value(value) => {
                prompt.answer(value);
                return Ok(());
            }
            Answer::Skip if prompt.skip_allowed() => {
                prompt.skip();
                return Ok(());
            }
            Answer::Skip => eprintln!("{}", "A value is required".yellow()),
            Answer::Cancel => {
                prompt.cancel();
                return Ok(());
            }
        }
    }
}

/// Print `label` and read one answer from `input`
///
/// A blank line means skip; `:cancel` or end of input means cancel.
pub fn read_answer(label: &str, input: &mut impl BufRead) -> io::Result<Answer> {
    let mut stderr = io::stderr();
    write!(stderr, "{}", label)?;
    stderr.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(Answer::Cancel);
    }
    let line = line.trim_end_matches(['\r', '\n']);
    Ok(match line.trim() {
        "" => Answer::Skip,
        ":cancel" => Answer::Cancel,
        _ => Answer::Value(line.to_string()),
    })
}

/// Map a final workflow state to the process exit status
pub fn exit_code(state: WorkflowState) -> i32 {
    match state {
        WorkflowState::Completed => EXIT_COMPLETED,
        WorkflowState::Failed => EXIT_FAILED,
        _ => EXIT_CANCELLED,
    }
}

/// Initialize tracing from the verbosity flags, unless `RUST_LOG` is set
fn init_tracing(verbosity: Verbosity) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(verbosity.log_filter()));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(verbosity >= Verbosity::Verbose)
        .try_init();
}
