mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_appender::non_blocking::WorkerGuard;

#[derive(Parser)]
#[command(name = "shopiditor")]
#[command(about = "Run code snippets through sandboxed language runtimes")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML); built-in defaults when omitted
    #[arg(short, long, env = "SHOPIDITOR_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Execute snippets and print each response as JSON
    Run {
        /// Language identifier or alias (e.g. js, python, c#)
        #[arg(short, long)]
        language: String,

        /// Timeout per snippet in milliseconds
        #[arg(short, long, default_value_t = shopiditor_exec::DEFAULT_TIMEOUT_MS)]
        timeout_ms: u64,

        /// Inline code to execute instead of reading files
        #[arg(long, conflicts_with = "files")]
        code: Option<String>,

        /// Source files, executed concurrently
        #[arg(required_unless_present = "code")]
        files: Vec<PathBuf>,

        /// Arguments handed to every snippet
        #[arg(last = true)]
        args: Vec<String>,
    },
    /// List supported languages
    Languages,
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let _guard = init_logging(cli.verbose, cli.log_file.as_deref())?;

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run {
            language,
            timeout_ms,
            code,
            files,
            args,
        } => {
            let snippets = match code {
                Some(code) => vec![code],
                None => commands::read_sources(&files).await?,
            };
            commands::execute_run(&config, language, timeout_ms, snippets, args).await
        }
        Commands::Languages => commands::execute_languages(&config),
        Commands::Config => commands::execute_config(&config),
    }
}

/// Console logging on stderr plus an optional plain-text file layer
fn init_logging(verbose: bool, log_file: Option<&std::path::Path>) -> Result<Option<WorkerGuard>> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let log_level = if verbose { "debug" } else { "info" };

    let (file_layer, guard) = match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            let name = path
                .file_name()
                .ok_or_else(|| anyhow::anyhow!("Invalid log file path: {}", path.display()))?;
            let file_appender = tracing_appender::rolling::never(dir, name);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_ansi(true),
        )
        .with(file_layer)
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                tracing_subscriber::EnvFilter::new(format!(
                    "shopiditor={},shopiditor_exec={}",
                    log_level, log_level
                ))
            }),
        )
        .init();

    Ok(guard)
}
