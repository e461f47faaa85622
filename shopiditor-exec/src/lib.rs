//! Shopiditor execution core
//!
//! Accepts a snippet of source code plus a language identifier, dispatches it
//! to the first runtime that supports the language, enforces a per-request
//! deadline and keeps every response in a bounded result cache.
//! Runtimes run JavaScript in an embedded V8 isolate or launch external
//! interpreters as subprocesses.

mod cache;
mod config;
mod deadline;
mod error;
mod execution;
mod language;
mod runtime;
mod selector;
mod service;
mod types;

pub use cache::{CacheConfig, ResultCache};
pub use config::{ExecConfig, ExecutionSection, V8Section, DEFAULT_MAX_OUTPUT_BYTES};
pub use deadline::{Deadline, DEFAULT_CLEANUP_GRACE};
pub use error::{ConfigError, ConfigResult, RequestError};
pub use execution::ExecutionId;
pub use language::{LanguageSpec, ProcessLanguage};
pub use runtime::Runtime;
#[cfg(feature = "process")]
pub use runtime::ProcessRuntime;
#[cfg(feature = "v8")]
pub use runtime::V8Runtime;
pub use selector::{RuntimeSelector, SelectionError};
pub use service::ExecutionService;
pub use types::{
    ExecutionRequest, ExecutionResponse, ExecutionStatus, DEFAULT_TIMEOUT_MS, TIMEOUT_MESSAGE,
};
