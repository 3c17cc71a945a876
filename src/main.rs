use anyhow::Context as _;
use clap::Parser;
use issuelog::config::Config;
use issuelog::error::ConfigError;
use issuelog::events::{ErrorEvent, Severity};
use issuelog::tracker::{AxosoftClient, InMemoryTicketClient, TicketClient};
use issuelog::{Submission, TicketLogger};
use log::{error, info, warn};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Command-line arguments for the ticket logger
#[derive(Parser)]
#[command(
    name = "issuelog",
    about = "Turn application errors into deduplicated issue tracker tickets",
    long_about = "Reads log events and submits them to an Axosoft-compatible issue tracker. \
                  Repeated errors are appended to the existing open ticket instead of \
                  creating duplicates, and identical errors are throttled."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    /// Use an in-memory tracker
    #[arg(
        long,
        help = "Submit to an in-memory tracker instead of the configured API"
    )]
    dry_run: bool,

    /// Severity for --message
    #[arg(short, long, value_name = "LEVEL", default_value = "error")]
    severity: Severity,

    /// Submit a single message instead of reading JSON lines from stdin
    #[arg(short, long, value_name = "TEXT")]
    message: Option<String>,
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            // Missing files fall back to defaults in load_config
            if config_path.exists() {
                if !config_path.is_file() {
                    return Err(format!(
                        "Configuration path is not a file: {}",
                        config_path.display()
                    ));
                }

                if let Some(extension) = config_path.extension() {
                    if extension != "toml" {
                        warn!(
                            "Configuration file does not have .toml extension: {}",
                            config_path.display()
                        );
                    }
                }
            }
        }

        if let Some(ref message) = self.message {
            if message.trim().is_empty() {
                return Err("--message must not be empty".to_string());
            }
        }

        Ok(())
    }
}

/// Load configuration from file or use defaults
///
/// A missing or unreadable file falls back to defaults with a warning;
/// a file that exists but is invalid is an error.
fn load_config(config_path: Option<&std::path::Path>) -> Result<Config, ConfigError> {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            match Config::from_file(path) {
                Ok(config) => Ok(config),
                Err(ConfigError::ReadError(e)) => {
                    warn!("Configuration file not readable ({}), using defaults", e);
                    default_config()
                }
                Err(e) => Err(e),
            }
        }
        None => {
            info!("Using default configuration");
            default_config()
        }
    }
}

fn default_config() -> Result<Config, ConfigError> {
    let mut config = Config::default();
    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
}

/// Build the tracker client selected by the arguments
fn build_client(config: &Config, dry_run: bool) -> Result<Box<dyn TicketClient>, ConfigError> {
    if dry_run {
        info!("Dry run: tickets are kept in memory");
        return Ok(Box::new(InMemoryTicketClient::new()));
    }

    Ok(Box::new(AxosoftClient::new(&config.tracker)?))
}

/// Parse one stdin line into an event
fn parse_event_line(line: &str) -> anyhow::Result<ErrorEvent> {
    serde_json::from_str(line).context("Invalid event JSON")
}

/// Submit one event and print its outcome as a JSON line
fn submit(
    logger: &mut TicketLogger,
    event: &ErrorEvent,
    out: &mut impl Write,
) -> anyhow::Result<Submission> {
    let submission = logger
        .log_event(event)
        .with_context(|| format!("Failed to submit '{}'", event.message))?;

    writeln!(out, "{}", serde_json::to_string(&submission)?)?;
    Ok(submission)
}

/// Process every event; returns the number of failed events
fn run(
    logger: &mut TicketLogger,
    cli: &Cli,
    input: impl BufRead,
    out: &mut impl Write,
    shutdown: &AtomicBool,
) -> anyhow::Result<usize> {
    if let Some(ref message) = cli.message {
        let event = ErrorEvent::new(cli.severity, message.clone());
        return Ok(match submit(logger, &event, out) {
            Ok(_) => 0,
            Err(e) => {
                error!("{:#}", e);
                1
            }
        });
    }

    let mut failures = 0;
    for (index, line) in input.lines().enumerate() {
        if shutdown.load(Ordering::SeqCst) {
            info!("Shutdown requested, stopping after {} line(s)", index);
            break;
        }

        let line = line.context("Failed to read stdin")?;
        if line.trim().is_empty() {
            continue;
        }

        let event = match parse_event_line(&line) {
            Ok(event) => event,
            Err(e) => {
                error!("Line {}: {:#}", index + 1, e);
                failures += 1;
                continue;
            }
        };

        if let Err(e) = submit(logger, &event, out) {
            error!("Line {}: {:#}", index + 1, e);
            failures += 1;
        }
    }

    Ok(failures)
}

fn main() {
    // Parse command-line arguments
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    let client = match build_client(&config, cli.dry_run) {
        Ok(client) => client,
        Err(e) => {
            error!("Failed to initialize tracker client: {}", e);
            std::process::exit(1);
        }
    };

    let mut logger = match TicketLogger::new(client, config.logger) {
        Ok(logger) => logger,
        Err(e) => {
            error!("Failed to initialize ticket logger: {}", e);
            std::process::exit(1);
        }
    };

    // Stop between events on Ctrl+C
    let shutdown = Arc::new(AtomicBool::new(false));
    let handler_flag = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received interrupt signal (SIGINT), finishing current event...");
        handler_flag.store(true, Ordering::SeqCst);
    }) {
        warn!("Could not install SIGINT handler: {}", e);
    }

    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match run(&mut logger, &cli, stdin.lock(), &mut out, &shutdown) {
        Ok(0) => info!("All events submitted"),
        Ok(failures) => {
            error!("{} event(s) could not be submitted", failures);
            std::process::exit(1);
        }
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use issuelog::config::LoggerOptions;

    fn cli(message: Option<&str>) -> Cli {
        Cli {
            config: None,
            verbose: false,
            dry_run: true,
            severity: Severity::Error,
            message: message.map(str::to_string),
        }
    }

    fn dry_run_logger() -> (TicketLogger, InMemoryTicketClient) {
        let tracker = InMemoryTicketClient::new();
        let logger = TicketLogger::new(Box::new(tracker.clone()), LoggerOptions::default()).unwrap();
        (logger, tracker)
    }

    #[test]
    fn test_cli_validation_with_existing_file() {
        let temp_file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        std::fs::write(temp_file.path(), "[logger]\nproject_id = 1").unwrap();

        let mut cli = cli(None);
        cli.config = Some(temp_file.path().to_path_buf());
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_cli_validation_with_missing_file() {
        let mut cli = cli(None);
        cli.config = Some(PathBuf::from("/nonexistent/config.toml"));

        // Should not fail - missing files are handled gracefully
        assert!(cli.validate().is_ok());
    }

    #[test]
    fn test_cli_validation_with_directory() {
        let dir = tempfile::tempdir().unwrap();
        let mut cli = cli(None);
        cli.config = Some(dir.path().to_path_buf());

        assert!(cli.validate().is_err());
    }

    #[test]
    fn test_cli_validation_rejects_blank_message() {
        assert!(cli(Some("   ")).validate().is_err());
        assert!(cli(Some("Null pointer in Foo")).validate().is_ok());
    }

    #[test]
    fn test_cli_parses_severity() {
        let cli = Cli::try_parse_from(["issuelog", "--dry-run", "-s", "critical", "-m", "boom"])
            .unwrap();
        assert_eq!(cli.severity, Severity::Critical);
        assert_eq!(cli.message.as_deref(), Some("boom"));
        assert!(cli.dry_run);

        assert!(Cli::try_parse_from(["issuelog", "-s", "fatal"]).is_err());
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let config = load_config(Some(std::path::Path::new("/nonexistent/config.toml"))).unwrap();
        assert_eq!(config.logger, LoggerOptions::default());
    }

    #[test]
    fn test_load_config_invalid_file_is_error() {
        let temp_file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(temp_file.path(), "[logger]\nline_break = \"\"").unwrap();

        assert!(load_config(Some(temp_file.path())).is_err());
    }

    #[test]
    fn test_build_client_requires_tracker_unless_dry_run() {
        let config = Config::default();
        assert!(build_client(&config, true).is_ok());
        assert!(build_client(&config, false).is_err());
    }

    #[test]
    fn test_run_single_message() {
        let (mut logger, tracker) = dry_run_logger();
        let mut out = Vec::new();

        let failures = run(
            &mut logger,
            &cli(Some("Null pointer in Foo")),
            std::io::empty(),
            &mut out,
            &AtomicBool::new(false),
        )
        .unwrap();

        assert_eq!(failures, 0);
        assert_eq!(tracker.tickets().len(), 1);
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("\"outcome\":\"created\""));
    }

    #[test]
    fn test_run_json_lines() {
        let (mut logger, tracker) = dry_run_logger();
        let input = concat!(
            r#"{"severity": "error", "message": "Null pointer in Foo", "context": {"file": "a.php", "line": 10}}"#,
            "\n\n",
            r#"{"severity": "error", "message": "Null pointer in Foo"}"#,
            "\n",
            "not json\n",
        );
        let mut out = Vec::new();

        let failures = run(
            &mut logger,
            &cli(None),
            input.as_bytes(),
            &mut out,
            &AtomicBool::new(false),
        )
        .unwrap();

        assert_eq!(failures, 1);
        assert_eq!(tracker.create_calls(), 1);
        // The second event finds the first ticket and comments on it
        assert_eq!(tracker.comment_calls(), 1);

        let printed = String::from_utf8(out).unwrap();
        assert_eq!(printed.lines().count(), 2);
    }

    #[test]
    fn test_run_stops_on_shutdown() {
        let (mut logger, tracker) = dry_run_logger();
        let input = r#"{"severity": "error", "message": "A"}"#;
        let mut out = Vec::new();

        let failures = run(
            &mut logger,
            &cli(None),
            input.as_bytes(),
            &mut out,
            &AtomicBool::new(true),
        )
        .unwrap();

        assert_eq!(failures, 0);
        assert_eq!(tracker.search_calls(), 0);
    }
}
