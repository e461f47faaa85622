//! Common test utilities shared across integration tests

use async_trait::async_trait;
use shopiditor_exec::{
    Deadline, ExecConfig, ExecutionRequest, ExecutionResponse, ExecutionService, LanguageSpec,
    ProcessLanguage, Runtime,
};
use std::path::Path;
use std::time::Duration;

/// Setup logging for tests
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init();
}

/// Service with only the shell runtime, writing sources into `work_dir`
pub fn shell_service(work_dir: &Path) -> ExecutionService {
    let mut config = ExecConfig::with_process_languages(vec![ProcessLanguage::shell()]);
    config.v8.enabled = false;
    config.execution.work_dir = Some(work_dir.to_path_buf());
    config
        .build_service()
        .expect("shell-only configuration is valid")
}

/// Files left behind in `dir`
pub fn leftovers(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .expect("work dir is readable")
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect()
}

/// Runtime answering with a fixed tag after an optional delay
pub struct StubRuntime {
    pub tag: &'static str,
    pub language: LanguageSpec,
    pub delay: Duration,
}

impl StubRuntime {
    pub fn new(tag: &'static str, id: &str, aliases: &[&str]) -> Self {
        Self {
            tag,
            language: LanguageSpec::new(id).with_aliases(aliases.iter().copied()),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Runtime for StubRuntime {
    async fn execute(&self, _request: &ExecutionRequest, deadline: Deadline) -> ExecutionResponse {
        match deadline.race(tokio::time::sleep(self.delay)).await {
            Some(()) => ExecutionResponse::success(self.tag, deadline.elapsed_ms()),
            None => ExecutionResponse::timed_out(deadline.elapsed_ms()),
        }
    }

    fn language(&self) -> &LanguageSpec {
        &self.language
    }

    fn name(&self) -> &str {
        self.tag
    }
}
