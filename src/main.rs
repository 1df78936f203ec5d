//! argbind - typed argument binding for shell scripts.

use anyhow::{Context, Result};
use argbind::{
    generate_error_output, generate_help, generate_help_output, generate_output, generate_version,
    tokenize, Config, Program,
};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Typed argument binding for shell scripts.
#[derive(Parser, Debug)]
#[command(name = "argbind", version, about, disable_help_subcommand = true)]
struct Cli {
    /// Log level when RUST_LOG is not set (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "warn", env = "ARGBIND_LOG_LEVEL")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse script arguments and print the path of a sourceable file
    Parse {
        /// JSON configuration for the target script
        #[arg(long)]
        config: String,

        /// Variable prefix (overrides config)
        #[arg(long)]
        prefix: Option<String>,

        /// Parse a single quoted command line instead of separate arguments
        #[arg(long, conflicts_with = "args")]
        line: Option<String>,

        /// Arguments to parse for the target script
        #[arg(last = true)]
        args: Vec<String>,
    },

    /// Print help text for the target script
    Help {
        /// JSON configuration for the target script
        #[arg(long)]
        config: String,

        /// Show help for this verb
        #[arg(long)]
        verb: Option<String>,
    },

    /// Print version of the target script
    Version {
        /// JSON configuration for the target script
        #[arg(long)]
        config: String,
    },

    /// Split a command line into tokens and print them as a JSON array
    Tokenize {
        line: String,
    },
}

fn setup_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn load(config: &str) -> Result<(Config, Program)> {
    let cfg = Config::from_json(config).context("failed to parse config JSON")?;
    let program = Program::compile(&cfg).context("invalid config")?;
    Ok((cfg, program))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(&cli.log_level);

    match cli.command {
        Commands::Parse {
            config,
            prefix,
            line,
            args,
        } => {
            let (cfg, program) = load(&config)?;
            let effective_prefix = prefix.as_deref().unwrap_or_else(|| cfg.effective_prefix());

            let parsed = match line {
                Some(line) => program.parse_line(&line),
                None => program.parse(&args),
            };
            let path = match parsed {
                Ok(invocation) => {
                    debug!(verb = ?invocation.verb, values = invocation.values.len(), "parsed");
                    generate_output(&invocation, effective_prefix)
                }
                Err(errors) if errors.is_help_requested() => {
                    generate_help_output(&generate_help(&cfg, errors.verb()))
                }
                Err(errors) => {
                    let name = match errors.verb() {
                        Some(verb) => format!("{} {}", cfg.display_name(), verb),
                        None => cfg.display_name().to_string(),
                    };
                    let messages: Vec<String> =
                        errors.into_iter().map(|e| e.message().to_string()).collect();
                    generate_error_output(&name, &messages)
                }
            }
            .context("failed to generate output file")?;

            println!("{}", path.display());
        }
        Commands::Help { config, verb } => {
            let (cfg, _) = load(&config)?;
            print!("{}", generate_help(&cfg, verb.as_deref()));
        }
        Commands::Version { config } => {
            let cfg = Config::from_json(&config).context("failed to parse config JSON")?;
            print!("{}", generate_version(&cfg));
        }
        Commands::Tokenize { line } => {
            let tokens: Vec<String> = tokenize(&line).collect();
            println!(
                "{}",
                serde_json::to_string(&tokens).context("failed to encode tokens")?
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_parse_subcommand_parses_config() {
        let cli = Cli::try_parse_from(["argbind", "parse", "--config", r#"{"name":"test"}"#, "--"])
            .unwrap();

        match cli.command {
            Commands::Parse {
                config,
                prefix,
                line,
                args,
            } => {
                assert_eq!(config, r#"{"name":"test"}"#);
                assert!(prefix.is_none());
                assert!(line.is_none());
                assert!(args.is_empty());
            }
            _ => panic!("Expected Parse command"),
        }
        assert_eq!(cli.log_level, "warn");
    }

    #[test]
    fn test_parse_subcommand_parses_args() {
        let cli = Cli::try_parse_from([
            "argbind",
            "parse",
            "--config",
            r#"{"name":"test"}"#,
            "--prefix",
            "MYAPP_",
            "--",
            "-v",
            "--output",
            "file.txt",
            "input.txt",
        ])
        .unwrap();

        match cli.command {
            Commands::Parse { prefix, args, .. } => {
                assert_eq!(prefix, Some("MYAPP_".to_string()));
                assert_eq!(args, vec!["-v", "--output", "file.txt", "input.txt"]);
            }
            _ => panic!("Expected Parse command"),
        }
    }

    #[test]
    fn test_parse_subcommand_parses_line() {
        let cli = Cli::try_parse_from([
            "argbind",
            "parse",
            "--config",
            "{}",
            "--line",
            "up 'my service'",
        ])
        .unwrap();

        match cli.command {
            Commands::Parse { line, .. } => {
                assert_eq!(line.as_deref(), Some("up 'my service'"));
            }
            _ => panic!("Expected Parse command"),
        }
    }

    #[test]
    fn test_line_conflicts_with_args() {
        let result = Cli::try_parse_from([
            "argbind", "parse", "--config", "{}", "--line", "a", "--", "b",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_subcommand_requires_config() {
        let result = Cli::try_parse_from(["argbind", "parse", "--"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_help_subcommand_with_verb() {
        let cli = Cli::try_parse_from([
            "argbind",
            "help",
            "--config",
            r#"{"name":"test"}"#,
            "--verb",
            "up",
        ])
        .unwrap();

        match cli.command {
            Commands::Help { config, verb } => {
                assert_eq!(config, r#"{"name":"test"}"#);
                assert_eq!(verb.as_deref(), Some("up"));
            }
            _ => panic!("Expected Help command"),
        }
    }

    #[test]
    fn test_version_subcommand() {
        let cli = Cli::try_parse_from([
            "argbind",
            "version",
            "--config",
            r#"{"name":"test","version":"1.0.0"}"#,
        ])
        .unwrap();

        assert!(matches!(cli.command, Commands::Version { .. }));
    }

    #[test]
    fn test_tokenize_subcommand_and_global_log_level() {
        let cli =
            Cli::try_parse_from(["argbind", "tokenize", "a 'b c'", "--log-level", "debug"]).unwrap();

        match cli.command {
            Commands::Tokenize { line } => assert_eq!(line, "a 'b c'"),
            _ => panic!("Expected Tokenize command"),
        }
        assert_eq!(cli.log_level, "debug");
    }

    #[test]
    fn test_cli_requires_subcommand() {
        let result = Cli::try_parse_from(["argbind"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_help() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_load_reports_invalid_config() {
        let err = load(r#"{"args": [{"name": "x", "type": "value"}]}"#)
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "invalid config");
        assert!(format!("{:#}", err).contains("has no help text"));

        assert!(load("not json").is_err());
    }
}
