//! CLI module for Inkloom
//!
//! Provides commands:
//! - `plan`: Show the execution plan for a backend count
//! - `backends`: List configured backends with live statistics
//! - `run`: Run a pipeline against the configured backends

use clap::{Parser, Subcommand};
use inkloom_core::AgentRole;
use inkloom_llm::SelectionStrategy;
use std::path::PathBuf;

pub mod backends;
pub mod plan;
pub mod run;

/// Inkloom CLI
#[derive(Parser, Debug)]
#[command(name = "inkloom")]
#[command(about = "Multi-backend agent pipeline runner")]
#[command(version)]
pub struct Cli {
    /// Configuration file (defaults to ./inkloom.toml)
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the execution plan
    Plan {
        /// Plan for this many usable backends instead of the configured ones
        #[arg(long, short)]
        backends: Option<usize>,
        /// Roles to plan (comma separated, default: all)
        #[arg(long, value_delimiter = ',', value_parser = parse_role)]
        roles: Vec<AgentRole>,
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// List configured backends
    Backends {
        /// Print JSON
        #[arg(long)]
        json: bool,
    },
    /// Run a pipeline
    Run {
        /// Prompt sent to every role
        #[arg(long, short)]
        prompt: String,
        /// Roles to run (comma separated, default: all)
        #[arg(long, value_delimiter = ',', value_parser = parse_role)]
        roles: Vec<AgentRole>,
        /// Backend ranking objective
        #[arg(long, short, value_parser = parse_strategy)]
        strategy: Option<SelectionStrategy>,
        /// Abort the run after this many seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Print the JSON summary
        #[arg(long)]
        json: bool,
    },
}

fn parse_role(value: &str) -> Result<AgentRole, String> {
    value.parse().map_err(|e: inkloom_core::Error| e.to_string())
}

fn parse_strategy(value: &str) -> Result<SelectionStrategy, String> {
    value.parse().map_err(|e: inkloom_llm::Error| e.to_string())
}

fn roles_or_all(roles: Vec<AgentRole>) -> Vec<AgentRole> {
    if roles.is_empty() {
        AgentRole::ALL.to_vec()
    } else {
        roles
    }
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = cli.config.as_deref();
    match cli.command {
        Some(Commands::Plan {
            backends,
            roles,
            json,
        }) => plan::run(config, backends, roles_or_all(roles), json).await,
        Some(Commands::Backends { json }) => backends::run(config, json).await,
        Some(Commands::Run {
            prompt,
            roles,
            strategy,
            timeout,
            json,
        }) => {
            let options = run::RunOptions {
                prompt,
                roles: roles_or_all(roles),
                strategy,
                timeout: timeout.map(std::time::Duration::from_secs),
                json,
            };
            run::run(config, options).await
        }
        None => {
            let mut cmd = <Cli as clap::CommandFactory>::command();
            cmd.print_help()?;
            println!();
            Ok(())
        }
    }
}

/// Load configuration and build a runtime backed by the HTTP adapter
pub(crate) fn load_runtime(config: Option<&std::path::Path>) -> anyhow::Result<inkloom_core::Runtime> {
    let pipeline_config = inkloom_core::PipelineConfig::load(config)
        .map_err(|e| anyhow::anyhow!(inkloom_core::format_error_for_cli(&e)))?;
    let adapter = inkloom_llm::HttpAdapter::new()?;
    inkloom_core::Runtime::from_config(pipeline_config, std::sync::Arc::new(adapter))
        .map_err(|e| anyhow::anyhow!(inkloom_core::format_error_for_cli(&e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_command() {
        let cli = Cli::try_parse_from([
            "inkloom",
            "run",
            "--prompt",
            "a ghost story",
            "--roles",
            "reader,writer",
            "--strategy",
            "minimize-cost",
        ])
        .unwrap();
        match cli.command {
            Some(Commands::Run {
                roles, strategy, ..
            }) => {
                assert_eq!(roles, vec![AgentRole::Reader, AgentRole::Writer]);
                assert_eq!(strategy, Some(SelectionStrategy::MinimizeCost));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_role_rejected() {
        assert!(Cli::try_parse_from(["inkloom", "plan", "--roles", "poet"]).is_err());
    }

    #[test]
    fn test_empty_roles_means_all() {
        assert_eq!(roles_or_all(Vec::new()).len(), AgentRole::ALL.len());
    }
}
