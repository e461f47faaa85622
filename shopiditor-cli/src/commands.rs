//! CLI command implementations

use anyhow::{Context, Result};
use futures::future::join_all;
use shopiditor_exec::{ExecConfig, ExecutionRequest, ExecutionStatus};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};

/// Load the configuration file, or the built-in defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<ExecConfig> {
    match path {
        Some(path) => ExecConfig::load(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => {
            debug!("No configuration file given, using defaults");
            Ok(ExecConfig::default())
        }
    }
}

pub async fn read_sources(files: &[PathBuf]) -> Result<Vec<String>> {
    let mut sources = Vec::with_capacity(files.len());
    for file in files {
        let source = tokio::fs::read_to_string(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        sources.push(source);
    }
    Ok(sources)
}

/// Execute every snippet concurrently and print one JSON document per snippet
///
/// Exits non-zero unless every snippet succeeded.
pub async fn execute_run(
    config: &ExecConfig,
    language: String,
    timeout_ms: u64,
    snippets: Vec<String>,
    args: Vec<String>,
) -> Result<ExitCode> {
    let service = config.build_service()?;
    info!(snippets = snippets.len(), language = %language, "Running snippets");

    let runs = snippets.into_iter().map(|code| {
        let request = ExecutionRequest::new(code, language.clone())
            .with_timeout_ms(timeout_ms)
            .with_args(args.clone());
        service.execute(request)
    });

    let mut all_succeeded = true;
    for outcome in join_all(runs).await {
        let document = match outcome {
            Ok(response) => {
                all_succeeded &= response.status() == ExecutionStatus::Success;
                serde_json::to_value(&response)?
            }
            Err(e) => {
                all_succeeded = false;
                serde_json::json!({ "error": e.to_string() })
            }
        };
        println!("{}", serde_json::to_string_pretty(&document)?);
    }

    Ok(if all_succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

pub fn execute_languages(config: &ExecConfig) -> Result<ExitCode> {
    let selector = config.build_selector()?;
    for language in selector.supported_languages() {
        println!("{}", language);
    }
    Ok(ExitCode::SUCCESS)
}

pub fn execute_config(config: &ExecConfig) -> Result<ExitCode> {
    print!("{}", config.to_toml_string()?);
    Ok(ExitCode::SUCCESS)
}
