//! Execution service - main entry point

use crate::cache::ResultCache;
use crate::deadline::Deadline;
use crate::error::RequestError;
use crate::execution::ExecutionId;
use crate::selector::RuntimeSelector;
use crate::types::{ExecutionRequest, ExecutionResponse};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Validates requests, dispatches them to a runtime under a deadline and
/// records every response in the result cache
#[derive(Debug, Clone)]
pub struct ExecutionService {
    selector: Arc<RuntimeSelector>,
    cache: Arc<ResultCache>,
}

impl ExecutionService {
    pub fn new(selector: RuntimeSelector, cache: Arc<ResultCache>) -> Self {
        Self {
            selector: Arc::new(selector),
            cache,
        }
    }

    /// Run one request to completion.
    ///
    /// Client errors are returned before any runtime is touched. Everything
    /// that happens after dispatch, including a panicking runtime, comes back
    /// as a response and is cached.
    pub async fn execute(
        &self,
        request: ExecutionRequest,
    ) -> Result<ExecutionResponse, RequestError> {
        request.validate()?;
        let runtime = self.selector.select(&request.language)?;

        info!(
            language = %request.language,
            runtime = runtime.name(),
            timeout_ms = request.timeout_ms,
            code_len = request.code.len(),
            "Executing code"
        );

        let deadline = Deadline::from_millis(request.timeout_ms);
        // Caching happens inside the task so the result survives a dropped caller
        let task = {
            let runtime = runtime.clone();
            let cache = self.cache.clone();
            tokio::spawn(async move {
                let response = runtime.execute(&request, deadline).await;
                log_finished(&response, runtime.name());
                cache.store(response.clone()).await;
                response
            })
        };

        let response = match task.await {
            Ok(response) => response,
            Err(e) => {
                error!(runtime = runtime.name(), error = %e, "Runtime task failed");
                let response = ExecutionResponse::error(
                    format!("Internal error: {}", e),
                    deadline.elapsed_ms(),
                );
                log_finished(&response, runtime.name());
                self.cache.store(response.clone()).await;
                response
            }
        };

        Ok(response)
    }

    /// Look up a cached response by its textual id; malformed ids are misses
    pub async fn result(&self, id: &str) -> Option<ExecutionResponse> {
        match id.parse::<ExecutionId>() {
            Ok(id) => self.cache.get(&id).await,
            Err(e) => {
                warn!(id, error = %e, "Malformed execution id");
                None
            }
        }
    }

    pub fn supported_languages(&self) -> Vec<String> {
        self.selector.supported_languages()
    }

    pub fn cache(&self) -> &Arc<ResultCache> {
        &self.cache
    }

    pub fn selector(&self) -> &RuntimeSelector {
        &self.selector
    }
}

fn log_finished(response: &ExecutionResponse, runtime: &str) {
    info!(
        execution_id = %response.execution_id(),
        runtime,
        status = %response.status(),
        elapsed_ms = response.execution_time_ms(),
        "Execution finished"
    );
}
