//! Configuration for runtimes, deadlines and the result cache

use crate::cache::{CacheConfig, ResultCache};
use crate::deadline::DEFAULT_CLEANUP_GRACE;
use crate::error::{ConfigError, ConfigResult};
use crate::language::{LanguageSpec, ProcessLanguage};
use crate::selector::RuntimeSelector;
use crate::service::ExecutionService;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Per-stream capture limit applied to subprocess output
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1024 * 1024;

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecConfig {
    /// Limits shared by all runtimes
    #[serde(default)]
    pub execution: ExecutionSection,
    /// Result cache thresholds
    #[serde(default)]
    pub cache: CacheConfig,
    /// In-process JavaScript runtime
    #[serde(default)]
    pub v8: V8Section,
    /// Subprocess languages, registered after the V8 runtime in this order
    #[serde(default = "default_process_languages")]
    pub process: Vec<ProcessLanguage>,
}

/// Limits shared by all runtimes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionSection {
    /// Time a runtime may spend reaping resources after a deadline or exit
    #[serde(with = "humantime_serde")]
    pub cleanup_grace: Duration,
    /// Per-stream capture limit for subprocess output
    pub max_output_bytes: usize,
    /// Directory for temporary source files (system temp dir when unset)
    pub work_dir: Option<PathBuf>,
}

impl Default for ExecutionSection {
    fn default() -> Self {
        Self {
            cleanup_grace: DEFAULT_CLEANUP_GRACE,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
            work_dir: None,
        }
    }
}

/// In-process JavaScript runtime
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct V8Section {
    pub enabled: bool,
    /// Heap ceiling for each isolate; unlimited when unset
    pub max_heap_bytes: Option<usize>,
    pub language: LanguageSpec,
}

impl Default for V8Section {
    fn default() -> Self {
        Self {
            enabled: cfg!(feature = "v8"),
            max_heap_bytes: None,
            language: LanguageSpec::new("javascript").with_aliases(["js"]),
        }
    }
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            execution: ExecutionSection::default(),
            cache: CacheConfig::default(),
            v8: V8Section::default(),
            process: default_process_languages(),
        }
    }
}

fn default_process_languages() -> Vec<ProcessLanguage> {
    if cfg!(feature = "process") {
        ProcessLanguage::presets()
    } else {
        Vec::new()
    }
}

impl ExecConfig {
    /// Built-in defaults with an explicit process list
    pub fn with_process_languages(languages: Vec<ProcessLanguage>) -> Self {
        Self {
            process: languages,
            ..Self::default()
        }
    }

    /// Read and validate a TOML file
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&content)?;
        info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parse and validate TOML text
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: ExecConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> ConfigResult<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Write configuration to file, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> ConfigResult<()> {
        let path = path.as_ref();
        let content = self.to_toml_string()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        self.cache.validate().map_err(ConfigError::Invalid)?;

        if self.execution.max_output_bytes == 0 {
            return Err(ConfigError::Invalid(
                "execution.max_output_bytes must be greater than zero".to_string(),
            ));
        }

        if self.v8.enabled {
            validate_language(&self.v8.language, "v8.language")?;
        }

        for (index, entry) in self.process.iter().enumerate() {
            let context = format!("process[{}]", index);
            validate_language(&entry.language, &context)?;
            if entry.program.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "{} ({}) has no program",
                    context, entry.language.id
                )));
            }
        }

        Ok(())
    }

    /// Register runtimes in precedence order: V8 first, then each process
    /// language as listed
    pub fn build_selector(&self) -> ConfigResult<RuntimeSelector> {
        let mut selector = RuntimeSelector::new();
        self.register_v8(&mut selector)?;
        self.register_processes(&mut selector)?;
        info!(runtimes = ?selector, "Built runtime selector");
        Ok(selector)
    }

    /// Selector plus a fresh result cache
    pub fn build_service(&self) -> ConfigResult<ExecutionService> {
        self.validate()?;
        let selector = self.build_selector()?;
        let cache = Arc::new(ResultCache::with_config(self.cache));
        Ok(ExecutionService::new(selector, cache))
    }

    #[cfg(feature = "v8")]
    fn register_v8(&self, selector: &mut RuntimeSelector) -> ConfigResult<()> {
        if !self.v8.enabled {
            return Ok(());
        }
        let mut runtime = crate::runtime::V8Runtime::with_language(self.v8.language.clone())
            .with_cleanup_grace(self.execution.cleanup_grace);
        if let Some(bytes) = self.v8.max_heap_bytes {
            runtime = runtime.with_max_heap_bytes(bytes);
        }
        selector.register(runtime);
        Ok(())
    }

    #[cfg(not(feature = "v8"))]
    fn register_v8(&self, _selector: &mut RuntimeSelector) -> ConfigResult<()> {
        if self.v8.enabled {
            return Err(ConfigError::RuntimeUnavailable("v8".to_string()));
        }
        Ok(())
    }

    #[cfg(feature = "process")]
    fn register_processes(&self, selector: &mut RuntimeSelector) -> ConfigResult<()> {
        for entry in &self.process {
            let mut runtime = crate::runtime::ProcessRuntime::new(entry.clone())
                .with_max_output_bytes(self.execution.max_output_bytes)
                .with_cleanup_grace(self.execution.cleanup_grace);
            if let Some(dir) = &self.execution.work_dir {
                runtime = runtime.with_work_dir(dir);
            }
            selector.register(runtime);
        }
        Ok(())
    }

    #[cfg(not(feature = "process"))]
    fn register_processes(&self, _selector: &mut RuntimeSelector) -> ConfigResult<()> {
        if !self.process.is_empty() {
            return Err(ConfigError::RuntimeUnavailable("process".to_string()));
        }
        Ok(())
    }
}

fn validate_language(language: &LanguageSpec, context: &str) -> ConfigResult<()> {
    if language.id.trim().is_empty() {
        return Err(ConfigError::Invalid(format!("{} has an empty id", context)));
    }
    if language.aliases.iter().any(|alias| alias.trim().is_empty()) {
        return Err(ConfigError::Invalid(format!(
            "{} ({}) has an empty alias",
            context, language.id
        )));
    }
    Ok(())
}
