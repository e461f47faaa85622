//! Process-based runtime

use crate::config::DEFAULT_MAX_OUTPUT_BYTES;
use crate::deadline::{Deadline, DEFAULT_CLEANUP_GRACE};
use crate::language::{LanguageSpec, ProcessLanguage};
use crate::types::{ExecutionRequest, ExecutionResponse};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

const TRUNCATION_MARKER: &str = "[output truncated]\n";

const STREAM_LEFT_OPEN: &str =
    "Output stream still open after exit; a background process may still be running\n";

const READ_CHUNK_BYTES: usize = 8 * 1024;

/// Process-based runtime - writes the snippet to a temporary file and runs it
/// with the language's program
pub struct ProcessRuntime {
    language: ProcessLanguage,
    work_dir: Option<PathBuf>,
    max_output_bytes: usize,
    cleanup_grace: Duration,
}

impl ProcessRuntime {
    pub fn new(language: ProcessLanguage) -> Self {
        Self {
            language,
            work_dir: None,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            cleanup_grace: DEFAULT_CLEANUP_GRACE,
        }
    }

    /// Directory for temporary source files (system temp dir by default)
    pub fn with_work_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(dir.into());
        self
    }

    pub fn with_max_output_bytes(mut self, bytes: usize) -> Self {
        self.max_output_bytes = bytes;
        self
    }

    pub fn with_cleanup_grace(mut self, grace: Duration) -> Self {
        self.cleanup_grace = grace;
        self
    }

    pub fn program(&self) -> &str {
        &self.language.program
    }

    fn write_source(&self, code: &str) -> Result<NamedTempFile> {
        let suffix = self.language.suffix();
        let mut builder = tempfile::Builder::new();
        builder.prefix("shopiditor_").suffix(&suffix);

        let mut file = match &self.work_dir {
            Some(dir) => builder.tempfile_in(dir),
            None => builder.tempfile(),
        }
        .context("Failed to create temporary source file")?;

        file.write_all(code.as_bytes())
            .context("Failed to write temporary source file")?;
        file.flush()?;
        Ok(file)
    }

    async fn run(
        &self,
        request: &ExecutionRequest,
        deadline: Deadline,
    ) -> Result<ExecutionResponse> {
        // Removed when dropped, on every return path
        let source = self.write_source(&request.code)?;

        let mut child = Command::new(&self.language.program)
            .args(&self.language.args)
            .arg(source.path())
            .args(&request.arguments)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn process '{}'", self.language.program))?;

        debug!(pid = ?child.id(), source = %source.path().display(), "Spawned process");

        // Drain both pipes while waiting so a chatty child never blocks on a full buffer
        let stdout = StreamReader::spawn(child.stdout.take(), self.max_output_bytes);
        let stderr = StreamReader::spawn(child.stderr.take(), self.max_output_bytes);

        match deadline.race(child.wait()).await {
            None => {
                let elapsed_ms = deadline.elapsed_ms();
                warn!(
                    program = %self.language.program,
                    timeout_ms = deadline.budget().as_millis() as u64,
                    "Process exceeded deadline, killing"
                );
                self.terminate(&mut child).await;
                stdout.abort();
                stderr.abort();
                Ok(ExecutionResponse::timed_out(elapsed_ms))
            }
            Some(status) => {
                let status = status.context("Failed to wait for process")?;
                let (stdout, stderr) = tokio::join!(
                    stdout.collect(self.cleanup_grace, "stdout"),
                    stderr.collect(self.cleanup_grace, "stderr")
                );
                let (output, stdout_open) = stdout;
                let (mut diagnostics, stderr_open) = stderr;
                let elapsed_ms = deadline.elapsed_ms();

                if stdout_open || stderr_open {
                    diagnostics.push_str(STREAM_LEFT_OPEN);
                }

                if diagnostics.is_empty() && !status.success() {
                    let message = match status.code() {
                        Some(code) => format!("Process exited with code {}", code),
                        None => format!("Process terminated ({})", status),
                    };
                    return Ok(ExecutionResponse::failure(output, message, elapsed_ms));
                }

                Ok(ExecutionResponse::from_streams(output, diagnostics, elapsed_ms))
            }
        }
    }

    /// Kill a runaway child and reap it; failures are logged, never raised
    async fn terminate(&self, child: &mut Child) {
        if let Err(e) = child.start_kill() {
            error!(error = %e, "Error killing process after timeout");
        }

        match tokio::time::timeout(self.cleanup_grace, child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "Killed process reaped"),
            Ok(Err(e)) => warn!(error = %e, "Failed to reap killed process"),
            Err(_) => warn!(
                grace_ms = self.cleanup_grace.as_millis() as u64,
                "Killed process did not exit within cleanup grace"
            ),
        }
    }
}

#[async_trait]
impl super::Runtime for ProcessRuntime {
    async fn execute(&self, request: &ExecutionRequest, deadline: Deadline) -> ExecutionResponse {
        info!(
            language = %self.language.language.id,
            program = %self.language.program,
            code_len = request.code.len(),
            "Executing code in subprocess"
        );

        match self.run(request, deadline).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %format!("{:#}", e), "Error executing code in subprocess");
                ExecutionResponse::error(format!("Execution error: {:#}", e), deadline.elapsed_ms())
            }
        }
    }

    fn language(&self) -> &LanguageSpec {
        &self.language.language
    }

    fn name(&self) -> &str {
        "process"
    }
}

/// Raw byte capture with a cap; bytes past the cap are read and dropped
struct CapturedOutput {
    bytes: Vec<u8>,
    limit: usize,
    truncated: bool,
}

impl CapturedOutput {
    fn new(limit: usize) -> Self {
        Self {
            bytes: Vec::new(),
            limit,
            truncated: false,
        }
    }

    fn push(&mut self, chunk: &[u8]) {
        if self.truncated {
            return;
        }
        let room = self.limit.saturating_sub(self.bytes.len());
        if chunk.len() > room {
            self.bytes.extend_from_slice(&chunk[..room]);
            self.truncated = true;
        } else {
            self.bytes.extend_from_slice(chunk);
        }
    }

    fn text(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.bytes).into_owned();
        if self.truncated {
            text.push_str(TRUNCATION_MARKER);
        }
        text
    }
}

/// Background drain of one pipe into a shared capture
struct StreamReader {
    capture: Arc<Mutex<CapturedOutput>>,
    task: JoinHandle<()>,
}

impl StreamReader {
    fn spawn<R>(stream: Option<R>, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let capture = Arc::new(Mutex::new(CapturedOutput::new(limit)));
        let sink = capture.clone();
        let task = tokio::spawn(async move {
            let Some(mut stream) = stream else {
                return;
            };
            let mut chunk = [0u8; READ_CHUNK_BYTES];
            // Keep reading past the cap so the child never stalls
            loop {
                match stream.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => lock(&sink).push(&chunk[..n]),
                    Err(e) => {
                        debug!(error = %e, "Output pipe read failed");
                        break;
                    }
                }
            }
        });
        Self { capture, task }
    }

    fn abort(&self) {
        self.task.abort();
    }

    /// Captured text, and whether the pipe was still open when the grace ran out
    async fn collect(mut self, grace: Duration, stream: &str) -> (String, bool) {
        let still_open = match tokio::time::timeout(grace, &mut self.task).await {
            Ok(Ok(())) => false,
            Ok(Err(e)) => {
                warn!(stream, error = %e, "Output reader failed");
                false
            }
            Err(_) => {
                // A background child may still hold the pipe open
                self.task.abort();
                warn!(stream, "Output pipe still open after cleanup grace");
                true
            }
        };
        let text = lock(&self.capture).text();
        (text, still_open)
    }
}

fn lock(capture: &Mutex<CapturedOutput>) -> std::sync::MutexGuard<'_, CapturedOutput> {
    capture.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
