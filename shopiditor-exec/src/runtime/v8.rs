//! V8 JavaScript runtime using deno_core
//!
//! Each execution gets a fresh isolate on a blocking worker thread. The
//! deadline is enforced from the async side: the cancellation token is
//! cancelled and the isolate's thread-safe handle terminates whatever script
//! is running.

use crate::deadline::{Deadline, DEFAULT_CLEANUP_GRACE};
use crate::language::LanguageSpec;
use crate::types::{ExecutionRequest, ExecutionResponse};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use deno_core::{v8, JsRuntime, PollEventLoopOptions, RuntimeOptions};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Installs a capturing console and the `args` global.
///
/// Everything the capture path needs is bound here, so snippets that replace
/// `JSON` or array methods cannot break the read-back.
const PRELUDE: &str = r#"
((globalThis, argv) => {
  const stringify = JSON.stringify;
  const toText = String;
  const stdout = [];
  const stderr = [];
  const concat = (parts, separator) => {
    let text = "";
    for (let i = 0; i < parts.length; i++) {
      text += (i > 0 ? separator : "") + parts[i];
    }
    return text;
  };
  const render = (value) => {
    if (typeof value === "string") return value;
    if (value instanceof Error) return value.stack ?? toText(value);
    if (value === undefined || typeof value === "function" ||
        typeof value === "symbol" || typeof value === "bigint") {
      return toText(value);
    }
    try {
      return stringify(value) ?? toText(value);
    } catch (_) {
      return toText(value);
    }
  };
  const line = (values) => {
    const rendered = [];
    for (let i = 0; i < values.length; i++) rendered[i] = render(values[i]);
    return concat(rendered, " ") + "\n";
  };
  const out = (...values) => { stdout[stdout.length] = line(values); };
  const err = (...values) => { stderr[stderr.length] = line(values); };
  globalThis.console = {
    log: out,
    info: out,
    debug: out,
    trace: out,
    warn: err,
    error: err,
  };
  globalThis.args = Object.freeze(argv);
  Object.defineProperty(globalThis, "__shopiditorCapture", {
    value: () => stringify([concat(stdout, ""), concat(stderr, "")]),
    enumerable: false,
  });
})(globalThis, __ARGUMENTS__);
"#;

const CAPTURE: &str = "globalThis.__shopiditorCapture()";

/// Heap cap applied to the initial heap size
const MAX_INITIAL_HEAP_BYTES: usize = 10 * 1024 * 1024;

/// V8 JavaScript runtime
pub struct V8Runtime {
    language: LanguageSpec,

    /// Optional V8 heap limit in bytes
    max_heap_bytes: Option<usize>,

    cleanup_grace: Duration,
}

impl V8Runtime {
    /// JavaScript runtime answering to "javascript" and "js"
    pub fn new() -> Self {
        Self::with_language(LanguageSpec::new("javascript").with_aliases(["js"]))
    }

    pub fn with_language(language: LanguageSpec) -> Self {
        Self {
            language,
            max_heap_bytes: None,
            cleanup_grace: DEFAULT_CLEANUP_GRACE,
        }
    }

    pub fn with_max_heap_bytes(mut self, bytes: usize) -> Self {
        self.max_heap_bytes = Some(bytes);
        self
    }

    pub fn with_cleanup_grace(mut self, grace: Duration) -> Self {
        self.cleanup_grace = grace;
        self
    }

    /// Cancel the token and terminate the isolate once its handle is known
    async fn cancel(
        &self,
        token: &CancellationToken,
        handle_rx: oneshot::Receiver<v8::IsolateHandle>,
    ) {
        token.cancel();
        match tokio::time::timeout(self.cleanup_grace, handle_rx).await {
            Ok(Ok(handle)) => {
                handle.terminate_execution();
            }
            // Worker finished or failed before creating the isolate
            Ok(Err(_)) => {}
            Err(_) => warn!(
                "Isolate was not ready within cleanup grace; worker will observe cancellation"
            ),
        }
    }

    async fn reap(&self, worker: JoinHandle<Result<Evaluation>>) {
        match tokio::time::timeout(self.cleanup_grace, worker).await {
            Ok(_) => debug!("Isolate worker stopped after termination"),
            Err(_) => error!(
                grace_ms = self.cleanup_grace.as_millis() as u64,
                "Isolate worker still running after termination"
            ),
        }
    }
}

impl Default for V8Runtime {
    fn default() -> Self {
        Self::new()
    }
}

/// What the isolate thread reports back
#[derive(Debug)]
enum Evaluation {
    Completed { output: String, diagnostics: String },
    Failed { output: String, message: String },
    Cancelled,
}

impl Evaluation {
    fn into_response(self, elapsed_ms: u64) -> ExecutionResponse {
        match self {
            Evaluation::Completed {
                output,
                diagnostics,
            } => ExecutionResponse::from_streams(output, diagnostics, elapsed_ms),
            Evaluation::Failed { output, message } => {
                ExecutionResponse::failure(output, message, elapsed_ms)
            }
            // Only produced once the deadline has fired
            Evaluation::Cancelled => ExecutionResponse::timed_out(elapsed_ms),
        }
    }
}

struct Job {
    code: String,
    arguments: Vec<String>,
    max_heap_bytes: Option<usize>,
    token: CancellationToken,
    handle_tx: oneshot::Sender<v8::IsolateHandle>,
}

/// Blocking entry point of the isolate thread
fn evaluate(job: Job) -> Result<Evaluation> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to build isolate event loop")?;
    runtime.block_on(evaluate_in_isolate(job))
}

async fn evaluate_in_isolate(job: Job) -> Result<Evaluation> {
    let Job {
        code,
        arguments,
        max_heap_bytes,
        token,
        handle_tx,
    } = job;

    let mut options = RuntimeOptions::default();
    if let Some(max_bytes) = max_heap_bytes {
        let initial_bytes = (max_bytes / 10).min(MAX_INITIAL_HEAP_BYTES);
        options.create_params =
            Some(v8::CreateParams::default().heap_limits(initial_bytes, max_bytes));
    }

    let mut runtime = JsRuntime::new(options);
    let isolate_handle = runtime.v8_isolate().thread_safe_handle();

    let heap_exhausted = Arc::new(AtomicBool::new(false));
    if max_heap_bytes.is_some() {
        let handle = isolate_handle.clone();
        let exhausted = heap_exhausted.clone();
        runtime.add_near_heap_limit_callback(move |current, _initial| {
            exhausted.store(true, Ordering::SeqCst);
            handle.terminate_execution();
            // Headroom for the termination to unwind
            current * 2
        });
    }

    let _ = handle_tx.send(isolate_handle);
    if token.is_cancelled() {
        return Ok(Evaluation::Cancelled);
    }

    let prelude = PRELUDE.replace("__ARGUMENTS__", &serde_json::to_string(&arguments)?);
    runtime
        .execute_script("<prelude>", prelude)
        .map_err(|e| anyhow!("Failed to install console capture: {}", e))?;

    let outcome = match runtime.execute_script("<snippet>", code) {
        Ok(_) => runtime
            .run_event_loop(PollEventLoopOptions::default())
            .await
            .map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    if token.is_cancelled() {
        return Ok(Evaluation::Cancelled);
    }

    if heap_exhausted.load(Ordering::SeqCst) {
        return Ok(Evaluation::Failed {
            output: String::new(),
            message: "Runtime error: JavaScript heap limit exceeded".to_string(),
        });
    }

    let (output, diagnostics) = read_capture(&mut runtime)?;

    Ok(match outcome {
        Ok(()) => Evaluation::Completed {
            output,
            diagnostics,
        },
        Err(message) => Evaluation::Failed {
            output,
            message: describe_failure(&message, &diagnostics),
        },
    })
}

fn read_capture(runtime: &mut JsRuntime) -> Result<(String, String)> {
    let value = runtime
        .execute_script("<capture>", CAPTURE.to_string())
        .map_err(|e| anyhow!("Failed to read captured console output: {}", e))?;

    let scope = &mut runtime.handle_scope();
    let local = v8::Local::new(scope, value);
    let json = local.to_rust_string_lossy(scope);
    serde_json::from_str(&json).context("Captured console output was not valid JSON")
}

/// Separate static failures from runtime failures and keep console.error text
fn describe_failure(message: &str, diagnostics: &str) -> String {
    let kind = if message.contains("SyntaxError") {
        "Compilation error"
    } else {
        "Runtime error"
    };
    let mut described = format!("{}: {}", kind, message.trim_end());
    if !diagnostics.is_empty() {
        described.push('\n');
        described.push_str(diagnostics);
    }
    described
}

#[async_trait]
impl super::Runtime for V8Runtime {
    async fn execute(&self, request: &ExecutionRequest, deadline: Deadline) -> ExecutionResponse {
        info!(
            language = %self.language.id,
            code_len = request.code.len(),
            "Executing code in V8 isolate"
        );

        let token = CancellationToken::new();
        let (handle_tx, handle_rx) = oneshot::channel();
        let job = Job {
            code: request.code.clone(),
            arguments: request.arguments.clone(),
            max_heap_bytes: self.max_heap_bytes,
            token: token.clone(),
            handle_tx,
        };

        let mut worker = tokio::task::spawn_blocking(move || evaluate(job));

        match deadline.race(&mut worker).await {
            Some(Ok(Ok(evaluation))) => evaluation.into_response(deadline.elapsed_ms()),
            Some(Ok(Err(e))) => {
                error!(error = %format!("{:#}", e), "Error executing JavaScript");
                ExecutionResponse::error(format!("Execution error: {:#}", e), deadline.elapsed_ms())
            }
            Some(Err(join_err)) => {
                error!(error = %join_err, "Isolate worker panicked");
                ExecutionResponse::error(
                    format!("Execution error: isolate worker failed: {}", join_err),
                    deadline.elapsed_ms(),
                )
            }
            None => {
                let elapsed_ms = deadline.elapsed_ms();
                warn!(
                    timeout_ms = deadline.budget().as_millis() as u64,
                    "JavaScript exceeded deadline, terminating isolate"
                );
                self.cancel(&token, handle_rx).await;
                self.reap(worker).await;
                ExecutionResponse::timed_out(elapsed_ms)
            }
        }
    }

    fn language(&self) -> &LanguageSpec {
        &self.language
    }

    fn name(&self) -> &str {
        "v8"
    }
}
