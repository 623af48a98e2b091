//! autoauth - automatic answers for ssh and git authentication prompts

mod askpass;
mod commands;

use clap::{error::ErrorKind, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "autoauth")]
#[command(author, version, about = "Automatic answers for ssh and git authentication prompts", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $AUTOAUTH_CONFIG or ~/.config/autoauth/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer one prompt on stdout (SSH_ASKPASS / GIT_ASKPASS protocol)
    Askpass {
        /// Connection path to match against the pattern table
        #[arg(long)]
        path: Option<String>,
        /// Prompt text
        #[arg(trailing_var_arg = true)]
        prompt: Vec<String>,
    },

    /// Show the pattern table entry a connection path matches
    Lookup {
        /// Connection path, e.g. root@10.0.5.3
        path: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Run a command with autoauth answering its ssh/git prompts
    Exec {
        /// Connection path to use for every prompt. Defaults to the destination
        /// of an ssh/scp/sftp command, otherwise it is taken from each prompt.
        #[arg(long)]
        path: Option<String>,
        /// Command to run
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        cmd: Vec<String>,
    },

    /// Show or edit configuration
    Config {
        /// Open config in editor
        #[arg(short, long)]
        edit: bool,
    },

    /// Manage the pattern table
    Pattern {
        #[command(subcommand)]
        action: PatternAction,
    },
}

#[derive(Subcommand)]
enum PatternAction {
    /// List patterns in match order
    List,

    /// Add a pattern with its credential query
    Add {
        /// Regex matched against connection paths
        pattern: String,
        /// Credential query fields, e.g. host=Funny-Machines user=root
        fields: Vec<String>,
        /// Position in the table (0 is checked first); appended by default
        #[arg(long)]
        at: Option<usize>,
    },

    /// Remove a pattern
    Remove {
        /// Pattern text exactly as listed
        pattern: String,
    },

    /// Move a pattern to a new position
    Move {
        /// Pattern text exactly as listed
        pattern: String,
        /// New position (0 is checked first)
        index: usize,
    },
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

fn run() -> anyhow::Result<i32> {
    // `$AUTOAUTH_ASKPASS` is inherited by everything below `autoauth exec`, so
    // a command line that parses is still run as a command
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if std::env::var_os(askpass::ASKPASS_ENV).is_some() && !is_informational(&e) => {
            // Started by ssh/git as their askpass program: every argument is prompt text
            init_logging(false, "warn");
            let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
            return commands::askpass(None, &prompt, None);
        }
        Err(e) => e.exit(),
    };

    let default_level = match cli.command {
        Commands::Askpass { .. } => "warn",
        _ => "info",
    };
    init_logging(cli.verbose, default_level);

    let config = cli.config.as_deref();
    match cli.command {
        Commands::Askpass { path, prompt } => commands::askpass(config, &prompt.join(" "), path),
        Commands::Lookup { path, json } => commands::lookup(config, &path, json),
        Commands::Exec { path, cmd } => commands::exec(config, path, cmd),
        Commands::Config { edit } => {
            commands::config(config, edit)?;
            Ok(0)
        }
        Commands::Pattern { action } => {
            match action {
                PatternAction::List => commands::pattern_list(config)?,
                PatternAction::Add { pattern, fields, at } => {
                    commands::pattern_add(config, &pattern, &fields, at)?
                }
                PatternAction::Remove { pattern } => commands::pattern_remove(config, &pattern)?,
                PatternAction::Move { pattern, index } => {
                    commands::pattern_move(config, &pattern, index)?
                }
            }
            Ok(0)
        }
    }
}

fn is_informational(e: &clap::Error) -> bool {
    matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion)
}

/// Log to stderr; stdout carries askpass answers
fn init_logging(verbose: bool, default_level: &str) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_env("AUTOAUTH_LOG").unwrap_or_else(|_| EnvFilter::new(default_level))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
