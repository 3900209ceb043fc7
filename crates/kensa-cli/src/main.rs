//! Kensa CLI - command-line interface for the Kensa analyzer
//!
//! Finds null dereferences, type errors on nully values and constant
//! conditions in JavaScript/TypeScript by exploring every path of every
//! function.

mod commands;
mod logging;
mod output;

use std::path::PathBuf;

use clap::Parser;
use commands::Commands;
use logging::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "kensa",
    author,
    version,
    about = "Path-sensitive null and constant-condition analyzer for JavaScript/TypeScript",
    long_about = "Kensa explores every path through each function of a JavaScript or TypeScript\n\
                  file and reports values that are null or undefined where they are used,\n\
                  and conditions that always evaluate the same way."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value = "warn",
        help = "Set the log level (RUST_LOG overrides it)"
    )]
    pub log_level: LogLevel,

    #[arg(long, global = true, help = "Write logs to the specified file")]
    pub log_file: Option<PathBuf>,

    #[arg(long, global = true, help = "Output logs in JSON format")]
    pub log_json: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let _guard = logging::init_logging(&cli);

    match cli.command {
        Commands::Check(args) => args.run(),
        Commands::Init(args) => args.run(),
        Commands::Explain(args) => args.run(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::OutputFormat;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_check_command() {
        let cli = Cli::try_parse_from(["kensa", "check", "./src"]).unwrap();
        match cli.command {
            Commands::Check(args) => {
                assert_eq!(args.path.to_str().unwrap(), "./src");
                assert_eq!(args.format, OutputFormat::Pretty);
            }
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn cli_check_defaults_to_current_directory() {
        let cli = Cli::try_parse_from(["kensa", "check"]).unwrap();
        match cli.command {
            Commands::Check(args) => assert_eq!(args.path, PathBuf::from(".")),
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn cli_parses_check_with_format() {
        let cli = Cli::try_parse_from(["kensa", "check", "./src", "--format", "json"]).unwrap();
        match cli.command {
            Commands::Check(args) => assert_eq!(args.format, OutputFormat::Json),
            _ => panic!("Expected Check command"),
        }
    }

    #[test]
    fn cli_rejects_unknown_format() {
        assert!(Cli::try_parse_from(["kensa", "check", ".", "--format", "xml"]).is_err());
    }

    #[test]
    fn cli_parses_init_with_force() {
        let cli = Cli::try_parse_from(["kensa", "init", "--force"]).unwrap();
        match cli.command {
            Commands::Init(args) => assert!(args.force),
            _ => panic!("Expected Init command"),
        }
    }

    #[test]
    fn cli_parses_explain_command() {
        let cli = Cli::try_parse_from(["kensa", "explain", "null-dereference"]).unwrap();
        match cli.command {
            Commands::Explain(args) => assert_eq!(args.rule_id, "null-dereference"),
            _ => panic!("Expected Explain command"),
        }
    }

    #[test]
    fn logging_flags_are_global() {
        let cli = Cli::try_parse_from([
            "kensa",
            "check",
            ".",
            "--log-level",
            "debug",
            "--log-json",
        ])
        .unwrap();

        assert_eq!(cli.log_level, LogLevel::Debug);
        assert!(cli.log_json);
        assert!(cli.log_file.is_none());
    }

    #[test]
    fn default_log_level_is_warn() {
        let cli = Cli::try_parse_from(["kensa", "init"]).unwrap();
        assert_eq!(cli.log_level, LogLevel::Warn);
    }

    #[test]
    fn cli_version_is_set() {
        let cmd = Cli::command();
        assert_eq!(cmd.get_version(), Some("0.1.0"));
    }

    #[test]
    fn cli_help_contains_commands() {
        let mut cmd = Cli::command();
        let help = cmd.render_help().to_string();
        assert!(help.contains("check"));
        assert!(help.contains("init"));
        assert!(help.contains("explain"));
    }

    #[test]
    fn check_help_shows_options() {
        let mut cmd = Cli::command();
        let check_cmd = cmd
            .get_subcommands_mut()
            .find(|c| c.get_name() == "check")
            .unwrap();
        let help = check_cmd.render_help().to_string();
        assert!(help.contains("PATH"));
        assert!(help.contains("--format"));
        assert!(help.contains("--fail-on-warnings"));
    }
}
