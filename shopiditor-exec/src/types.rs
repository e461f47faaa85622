//! Core types for code execution

use crate::error::RequestError;
use crate::execution::ExecutionId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timeout applied when a request does not carry one
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Error text reported for executions that overran their deadline
pub const TIMEOUT_MESSAGE: &str = "Execution timed out";

const GENERIC_ERROR_MESSAGE: &str = "Execution failed";

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

/// Request to execute a snippet of code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    /// The code to execute
    pub code: String,

    /// Language identifier, matched case-insensitively
    pub language: String,

    /// Timeout in milliseconds, measured from the start of execution
    #[serde(default = "default_timeout_ms", alias = "timeout")]
    pub timeout_ms: u64,

    /// Arguments handed to the snippet
    #[serde(default)]
    pub arguments: Vec<String>,
}

impl ExecutionRequest {
    /// Create a request with the default timeout and no arguments
    pub fn new(code: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            language: language.into(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            arguments: Vec::new(),
        }
    }

    /// Set timeout in milliseconds
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    /// Append an argument
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.arguments.push(arg.into());
        self
    }

    /// Replace the argument list
    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.arguments = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Reject requests that must never reach a runtime
    pub fn validate(&self) -> Result<(), RequestError> {
        if self.code.trim().is_empty() {
            return Err(RequestError::EmptyCode);
        }
        if self.language.trim().is_empty() {
            return Err(RequestError::EmptyLanguage);
        }
        if self.timeout_ms == 0 {
            return Err(RequestError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Outcome classification of an execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionStatus {
    Success,
    Error,
    Timeout,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ExecutionStatus::Success => "Success",
            ExecutionStatus::Error => "Error",
            ExecutionStatus::Timeout => "Timeout",
        };
        write!(f, "{}", s)
    }
}

/// Result of one execution attempt.
///
/// Responses are immutable. The constructors uphold the invariant that
/// `Success` carries an empty `error` and every other status a non-empty one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResponse {
    output: String,
    error: String,
    status: ExecutionStatus,
    execution_time_ms: u64,
    execution_id: ExecutionId,
}

impl ExecutionResponse {
    fn build(
        output: String,
        error: String,
        status: ExecutionStatus,
        execution_time_ms: u64,
    ) -> Self {
        Self {
            output,
            error,
            status,
            execution_time_ms,
            execution_id: ExecutionId::new(),
        }
    }

    /// Completed without any diagnostics
    pub fn success(output: impl Into<String>, execution_time_ms: u64) -> Self {
        Self::build(
            output.into(),
            String::new(),
            ExecutionStatus::Success,
            execution_time_ms,
        )
    }

    /// Failed with a message and no meaningful output
    pub fn error(message: impl Into<String>, execution_time_ms: u64) -> Self {
        Self::failure(String::new(), message, execution_time_ms)
    }

    /// Failed after producing some output
    pub fn failure(
        output: impl Into<String>,
        message: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        let mut message = message.into();
        if message.is_empty() {
            message = GENERIC_ERROR_MESSAGE.to_string();
        }
        Self::build(
            output.into(),
            message,
            ExecutionStatus::Error,
            execution_time_ms,
        )
    }

    /// Deadline fired before the work finished
    pub fn timed_out(execution_time_ms: u64) -> Self {
        Self::build(
            String::new(),
            TIMEOUT_MESSAGE.to_string(),
            ExecutionStatus::Timeout,
            execution_time_ms,
        )
    }

    /// Classify captured streams: any diagnostic text turns the run into an error
    pub fn from_streams(
        output: impl Into<String>,
        diagnostics: impl Into<String>,
        execution_time_ms: u64,
    ) -> Self {
        let diagnostics = diagnostics.into();
        if diagnostics.is_empty() {
            Self::success(output, execution_time_ms)
        } else {
            Self::failure(output, diagnostics, execution_time_ms)
        }
    }

    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn error_message(&self) -> &str {
        &self.error
    }

    pub fn status(&self) -> ExecutionStatus {
        self.status
    }

    pub fn execution_time_ms(&self) -> u64 {
        self.execution_time_ms
    }

    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    pub fn is_success(&self) -> bool {
        self.status == ExecutionStatus::Success
    }
}
