//! distkv CLI: runs JSON-lines scenario scripts against an embedded manager.
//!
//! - `distkv run script.jsonl`: execute a script file, one JSON result per line
//! - `distkv run` (or `run -`): read the script from stdin
//! - `distkv config`: print the effective configuration as TOML
//!
//! Exit status is 1 when the script is malformed or an `expect` fails.

mod config;

use std::io::Read;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use distkv_engine::KvManager;
use distkv_executor::{run_script, Session};
use tracing::{info, Level};

use config::ConfigFlags;

#[derive(Debug, Parser)]
#[command(name = "distkv", version, about = "Run distkv scenario scripts")]
struct Cli {
    /// Directory for store snapshots (in-memory when omitted)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Bundle name the manager is created for
    #[arg(long, global = true)]
    bundle: Option<String>,

    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Action,
}

#[derive(Debug, Subcommand)]
enum Action {
    /// Execute a script, one invocation per line
    Run {
        /// Script path; `-` or omitted reads stdin
        script: Option<PathBuf>,
    },
    /// Print the effective configuration
    Config,
}

fn read_script(path: Option<&PathBuf>) -> Result<String> {
    match path {
        Some(p) if p.as_os_str() != "-" => {
            std::fs::read_to_string(p).with_context(|| format!("failed to read {}", p.display()))
        }
        _ => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read stdin")?;
            Ok(text)
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let flags = ConfigFlags {
        config: cli.config,
        bundle: cli.bundle,
        data_dir: cli.data_dir,
    };
    let config = config::resolve(&flags)?;

    match cli.command {
        Action::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(0)
        }
        Action::Run { script } => {
            let text = read_script(script.as_ref())?;
            let bundle = config.bundle_name.clone();
            let mut session = Session::new(KvManager::new(config)?);
            let report = run_script(&mut session, &text).await?;
            for step in &report.steps {
                println!("{}", step.result);
            }
            for step in report.failures() {
                if let Some(reason) = &step.failure {
                    eprintln!("line {}: {}", step.line, reason);
                }
            }
            info!(%bundle, steps = report.steps.len(), passed = report.passed(), "script finished");
            Ok(if report.passed() { 0 } else { 1 })
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {:#}", e);
            process::exit(1);
        }
    }
}
