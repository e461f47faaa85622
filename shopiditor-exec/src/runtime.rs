//! Runtime trait and implementations

#[cfg(feature = "process")]
mod process;
#[cfg(feature = "v8")]
mod v8;

use crate::deadline::Deadline;
use crate::language::LanguageSpec;
use crate::types::{ExecutionRequest, ExecutionResponse};
use async_trait::async_trait;

#[cfg(feature = "process")]
pub use process::ProcessRuntime;
#[cfg(feature = "v8")]
pub use v8::V8Runtime;

/// Runtime abstraction for executing code in one language.
///
/// Implementations hold only immutable configuration, so a single instance
/// may serve any number of concurrent executions. `execute` never returns an
/// error: every failure mode is reported through the response status.
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Run one snippet, finishing no later than `deadline` plus cleanup grace
    async fn execute(&self, request: &ExecutionRequest, deadline: Deadline) -> ExecutionResponse;

    /// Language this runtime executes
    fn language(&self) -> &LanguageSpec;

    /// Get runtime name
    fn name(&self) -> &str;

    /// Whether `language` names this runtime's language or one of its aliases
    fn supports(&self, language: &str) -> bool {
        self.language().matches(language)
    }
}
