// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `assetdag`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "assetdag",
    version,
    about = "Build, watch and serve frontend assets from a task graph.",
    long_about = None
)]
pub struct CliArgs {
    /// Task to run (`default`, `build`, `scss`, `build-js`, ...).
    #[arg(value_name = "TASK", default_value = "default")]
    pub task: String,

    /// Path to the config file (TOML).
    ///
    /// The file is optional: when it does not exist the built-in defaults
    /// are used and the current directory is the project root.
    #[arg(long, value_name = "PATH", default_value = "Assetdag.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `ASSETDAG_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve the task into an execution plan and print it without running.
    #[arg(long)]
    pub dry_run: bool,

    /// Print all registered tasks and exit.
    #[arg(long)]
    pub list: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_defaults_to_default_entry_point() {
        let args = CliArgs::parse_from(["assetdag"]);
        assert_eq!(args.task, "default");
        assert_eq!(args.config, "Assetdag.toml");
        assert!(!args.dry_run);
    }

    #[test]
    fn positional_task_and_flags_are_parsed() {
        let args = CliArgs::parse_from([
            "assetdag",
            "build",
            "--config",
            "site/Assetdag.toml",
            "--log-level",
            "debug",
            "--dry-run",
        ]);
        assert_eq!(args.task, "build");
        assert_eq!(args.config, "site/Assetdag.toml");
        assert!(matches!(args.log_level, Some(LogLevel::Debug)));
        assert!(args.dry_run);
    }
}
