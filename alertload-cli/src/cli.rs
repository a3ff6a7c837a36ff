//! CLI argument parsing definitions

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about = "Alerting load benchmarks on Elastic Cloud", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// ecctl config name, resolved by ecctl as `$HOME/.ecctl/<name>.json`
    #[arg(short = 'C', long, value_name = "NAME", global = true)]
    pub ecctl_config: Option<String>,

    /// Set the log level (trace, debug, info, warn, error)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// YAML file with additional suites; ids shadow the built-in ones
    #[arg(long, value_name = "PATH", global = true)]
    pub suites: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a suite: provision, load, sample, collect logs, tear down
    Run {
        /// Suite id, see `ls`
        suite: String,

        /// Stack version of every deployment
        #[arg(long, value_name = "VERSION")]
        stack: Option<String>,

        /// Minutes to run the rules before collecting logs
        #[arg(long, value_name = "N")]
        minutes: Option<u64>,

        /// Percentage of rules that fire, 0 to 100
        #[arg(long, value_name = "P", allow_negative_numbers = true)]
        percent_firing: Option<i32>,

        /// Deployment template id
        #[arg(long, value_name = "ID")]
        template: Option<String>,
    },

    /// List suites and their scenarios
    Ls,

    /// List deployments left over from earlier runs
    Lsd,

    /// Delete every deployment left over from earlier runs
    Rmdall,

    /// Print a sample configuration file
    SampleConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_with_overrides() {
        let cli = Cli::try_parse_from([
            "alertload",
            "-C",
            "staging",
            "run",
            "tm-max-workers-100",
            "--minutes",
            "5",
            "--percent-firing",
            "25",
            "--stack",
            "7.13.3",
        ])
        .unwrap();

        assert_eq!(cli.ecctl_config.as_deref(), Some("staging"));
        match cli.command {
            Commands::Run {
                suite,
                stack,
                minutes,
                percent_firing,
                template,
            } => {
                assert_eq!(suite, "tm-max-workers-100");
                assert_eq!(stack.as_deref(), Some("7.13.3"));
                assert_eq!(minutes, Some(5));
                assert_eq!(percent_firing, Some(25));
                assert!(template.is_none());
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["alertload", "lsd", "--log-level", "debug"]).unwrap();
        assert!(matches!(cli.command, Commands::Lsd));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_run_requires_suite() {
        assert!(Cli::try_parse_from(["alertload", "run"]).is_err());
        assert!(Cli::try_parse_from(["alertload"]).is_err());
    }

    #[test]
    fn test_negative_percent_reaches_validation() {
        let cli =
            Cli::try_parse_from(["alertload", "run", "number-of-alerts", "--percent-firing", "-5"])
                .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Run {
                percent_firing: Some(-5),
                ..
            }
        ));
    }
}
