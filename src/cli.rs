//! CLI argument parsing with subcommand architecture.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "detach", version, about = "Run a workload as a detached daemon")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the workload (default when no subcommand is given)
    Run(RunArgs),
    /// Print the effective configuration as YAML
    Config(ConfigArgs),
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Path to config file
    #[arg(short, long, default_value = "config.yaml", env = "DETACH_CONFIG")]
    pub config: String,

    /// Log level (overrides config)
    #[arg(long, env = "DETACH_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Directory for log files (overrides config)
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Detach from the terminal and run in the background (unix only)
    #[arg(long)]
    pub daemon: bool,

    /// Keep the current stdin/stdout/stderr instead of redirecting them to
    /// the null device
    #[arg(long)]
    pub no_close: bool,

    /// How long the workload runs, in seconds (overrides config)
    #[arg(long)]
    pub duration: Option<u64>,

    /// Write a JSON snapshot of the process state here once running
    #[arg(long)]
    pub report: Option<PathBuf>,
}

impl Default for RunArgs {
    fn default() -> Self {
        Self {
            config: "config.yaml".to_string(),
            log_level: None,
            log_dir: None,
            daemon: false,
            no_close: false,
            duration: None,
            report: None,
        }
    }
}

#[derive(Parser, Debug)]
pub struct ConfigArgs {
    /// Path to config file
    #[arg(short, long, default_value = "config.yaml", env = "DETACH_CONFIG")]
    pub config: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_flags() {
        let cli = Cli::try_parse_from([
            "detach",
            "run",
            "--daemon",
            "--no-close",
            "--duration",
            "0",
            "--report",
            "/tmp/report.json",
        ])
        .unwrap();
        let Some(Command::Run(args)) = cli.command else {
            panic!("expected run");
        };
        assert!(args.daemon);
        assert!(args.no_close);
        assert_eq!(args.duration, Some(0));
        assert_eq!(args.report, Some(PathBuf::from("/tmp/report.json")));
    }

    #[test]
    fn test_no_subcommand() {
        let cli = Cli::try_parse_from(["detach"]).unwrap();
        assert!(cli.command.is_none());
    }
}
