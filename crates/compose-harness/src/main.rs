use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::StackArgs;
use commands::up::UpArgs;

#[derive(Parser)]
#[command(name = "compose-harness")]
#[command(about = "Compose Harness - bring compose stacks up and down around test runs")]
#[command(version)]
struct Cli {
    /// Compose file, repeatable and merged in order
    #[arg(short = 'f', long = "file", global = true)]
    files: Vec<PathBuf>,

    /// Project name (defaults to the current directory name)
    #[arg(short = 'p', long, global = true)]
    project_name: Option<String>,

    /// Environment variable used for interpolation, as KEY=VALUE
    #[arg(short = 'e', long = "env", global = true, value_parser = parse_key_val)]
    env: Vec<(String, String)>,

    /// Inherit the process environment for interpolation
    #[arg(long, global = true)]
    os_env: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and start services
    Up(UpArgs),

    /// Stop and remove the stack
    Down {
        /// Remove containers for services not in the compose files
        #[arg(long)]
        remove_orphans: bool,

        /// Remove images used by services
        #[arg(long, value_enum)]
        rmi: Option<Rmi>,
    },

    /// List the services of the compiled project
    Services,

    /// Print the container id of a service
    Container {
        /// Service name
        service: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Rmi {
    /// Every image used by the stack
    All,
    /// Only images without a custom tag
    Local,
}

/// Parse a `KEY=VALUE` pair
fn parse_key_val(s: &str) -> std::result::Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("invalid KEY=VALUE: no `=` found in `{}`", s))?;
    if key.is_empty() {
        return Err(format!("invalid KEY=VALUE: empty key in `{}`", s));
    }
    Ok((key.to_string(), value.to_string()))
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    smol::block_on(async {
        let cli = Cli::parse();
        let stack = StackArgs {
            files: cli.files,
            project_name: cli.project_name,
            env: cli.env,
            os_env: cli.os_env,
        };

        match cli.command {
            Commands::Up(args) => commands::up::run(&stack, args).await,
            Commands::Down {
                remove_orphans,
                rmi,
            } => {
                let rmi = rmi.map(|rmi| match rmi {
                    Rmi::All => compose_stack::RemoveImages::All,
                    Rmi::Local => compose_stack::RemoveImages::Local,
                });
                commands::down::run(&stack, remove_orphans, rmi).await
            }
            Commands::Services => commands::services::run(&stack).await,
            Commands::Container { service } => commands::container::run(&stack, &service).await,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_val() {
        assert_eq!(
            parse_key_val("TAG=1.0=rc"),
            Ok(("TAG".to_string(), "1.0=rc".to_string()))
        );
        assert_eq!(parse_key_val("EMPTY="), Ok(("EMPTY".to_string(), String::new())));
        assert!(parse_key_val("NOVALUE").is_err());
        assert!(parse_key_val("=value").is_err());
    }

    #[test]
    fn test_cli_parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "compose-harness",
            "up",
            "api",
            "-f",
            "a.yml",
            "-f",
            "b.yml",
            "-e",
            "TAG=1",
            "--wait-log",
            "db=ready",
        ])
        .unwrap();

        assert_eq!(cli.files, vec![PathBuf::from("a.yml"), PathBuf::from("b.yml")]);
        assert_eq!(cli.env, vec![("TAG".to_string(), "1".to_string())]);
        match cli.command {
            Commands::Up(args) => {
                assert_eq!(args.services, vec!["api"]);
                assert_eq!(args.wait_log, vec![("db".to_string(), "ready".to_string())]);
            }
            _ => panic!("Expected up command"),
        }
    }
}
