//! Runtime selection by language identifier

use crate::runtime::Runtime;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors during runtime selection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
}

/// Ordered set of runtimes with first-match selection.
///
/// Registration order decides which runtime wins when several accept the
/// same identifier.
#[derive(Clone, Default)]
pub struct RuntimeSelector {
    runtimes: Vec<Arc<dyn Runtime>>,
}

impl RuntimeSelector {
    /// Create an empty selector
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style registration
    pub fn with_runtime(mut self, runtime: impl Runtime + 'static) -> Self {
        self.register(runtime);
        self
    }

    /// Append a runtime after every runtime registered so far
    pub fn register(&mut self, runtime: impl Runtime + 'static) {
        self.register_arc(Arc::new(runtime));
    }

    pub fn register_arc(&mut self, runtime: Arc<dyn Runtime>) {
        debug!(
            runtime = runtime.name(),
            language = %runtime.language().id,
            position = self.runtimes.len(),
            "Registered runtime"
        );
        self.runtimes.push(runtime);
    }

    /// First registered runtime supporting `language`
    pub fn select(&self, language: &str) -> Result<Arc<dyn Runtime>, SelectionError> {
        self.runtimes
            .iter()
            .find(|runtime| runtime.supports(language))
            .cloned()
            .ok_or_else(|| SelectionError::UnsupportedLanguage(language.to_string()))
    }

    /// Canonical identifiers of all runtimes, deduplicated, in registration order
    pub fn supported_languages(&self) -> Vec<String> {
        let mut languages: Vec<String> = Vec::new();
        for runtime in &self.runtimes {
            let id = &runtime.language().id;
            if !languages.iter().any(|known| known.eq_ignore_ascii_case(id)) {
                languages.push(id.clone());
            }
        }
        languages
    }

    pub fn runtimes(&self) -> &[Arc<dyn Runtime>] {
        &self.runtimes
    }

    pub fn len(&self) -> usize {
        self.runtimes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runtimes.is_empty()
    }
}

impl std::fmt::Debug for RuntimeSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(
                self.runtimes
                    .iter()
                    .map(|runtime| format!("{}:{}", runtime.name(), runtime.language().id)),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deadline::Deadline;
    use crate::language::LanguageSpec;
    use crate::types::{ExecutionRequest, ExecutionResponse};
    use async_trait::async_trait;

    /// Echoes a fixed tag so tests can tell runtimes apart
    struct TaggedRuntime {
        tag: &'static str,
        language: LanguageSpec,
    }

    impl TaggedRuntime {
        fn new(tag: &'static str, id: &str, aliases: &[&str]) -> Self {
            Self {
                tag,
                language: LanguageSpec::new(id).with_aliases(aliases.iter().copied()),
            }
        }
    }

    #[async_trait]
    impl Runtime for TaggedRuntime {
        async fn execute(
            &self,
            _request: &ExecutionRequest,
            _deadline: Deadline,
        ) -> ExecutionResponse {
            ExecutionResponse::success(self.tag, 0)
        }

        fn language(&self) -> &LanguageSpec {
            &self.language
        }

        fn name(&self) -> &str {
            self.tag
        }
    }

    fn selector() -> RuntimeSelector {
        RuntimeSelector::new()
            .with_runtime(TaggedRuntime::new("first", "javascript", &["js"]))
            .with_runtime(TaggedRuntime::new("second", "javascript", &["js", "node"]))
            .with_runtime(TaggedRuntime::new("third", "csharp", &["c#"]))
    }

    #[test]
    fn test_first_match_wins() {
        let selector = selector();
        assert_eq!(selector.select("javascript").unwrap().name(), "first");
        assert_eq!(selector.select("JS").unwrap().name(), "first");
        // Only the second runtime knows this alias
        assert_eq!(selector.select("node").unwrap().name(), "second");
        assert_eq!(selector.select("C#").unwrap().name(), "third");
    }

    #[test]
    fn test_every_supported_alias_selects_a_supporting_runtime() {
        let selector = selector();
        for runtime in selector.runtimes() {
            let language = runtime.language();
            for name in std::iter::once(&language.id).chain(language.aliases.iter()) {
                let selected = selector.select(name).unwrap();
                assert!(selected.supports(name));
                let first = selector
                    .runtimes()
                    .iter()
                    .position(|r| r.supports(name))
                    .unwrap();
                assert!(Arc::ptr_eq(&selected, &selector.runtimes()[first]));
            }
        }
    }

    #[test]
    fn test_unsupported_language() {
        let selector = selector();
        let err = selector.select("no-such-lang").err().unwrap();
        assert_eq!(err, SelectionError::UnsupportedLanguage("no-such-lang".into()));
        assert_eq!(err.to_string(), "Unsupported language: no-such-lang");
        assert!(RuntimeSelector::new().select("js").is_err());
    }

    #[test]
    fn test_supported_languages_are_deduplicated_in_order() {
        let selector = selector();
        assert_eq!(selector.supported_languages(), vec!["javascript", "csharp"]);
        assert_eq!(selector.len(), 3);
        assert!(!selector.is_empty());
    }

    #[tokio::test]
    async fn test_selected_runtime_executes() {
        let selector = selector();
        let runtime = selector.select("c#").unwrap();
        let request = ExecutionRequest::new("Console.WriteLine(1);", "c#");
        let response = runtime.execute(&request, Deadline::from_millis(100)).await;
        assert_eq!(response.output(), "third");
    }
}
