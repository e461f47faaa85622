//! Language identifiers and launch descriptions

use serde::{Deserialize, Serialize};

/// Canonical language identifier plus the aliases a runtime answers to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageSpec {
    /// Canonical identifier advertised to callers
    pub id: String,

    /// Additional identifiers, e.g. "js" for "javascript"
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl LanguageSpec {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases(mut self, aliases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.aliases = aliases.into_iter().map(Into::into).collect();
        self
    }

    /// Case-insensitive match against the id or any alias
    pub fn matches(&self, language: &str) -> bool {
        let language = language.trim();
        if language.is_empty() {
            return false;
        }
        std::iter::once(&self.id)
            .chain(self.aliases.iter())
            .any(|name| name.eq_ignore_ascii_case(language))
    }
}

/// How to run source files of one language through an external program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessLanguage {
    #[serde(flatten)]
    pub language: LanguageSpec,

    /// Interpreter or launcher to spawn
    pub program: String,

    /// Arguments placed before the source file path
    #[serde(default)]
    pub args: Vec<String>,

    /// Extension given to the temporary source file
    pub extension: String,
}

impl ProcessLanguage {
    pub fn new(
        id: impl Into<String>,
        program: impl Into<String>,
        extension: impl Into<String>,
    ) -> Self {
        Self {
            language: LanguageSpec::new(id),
            program: program.into(),
            args: Vec::new(),
            extension: extension.into(),
        }
    }

    pub fn with_aliases(mut self, aliases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.language = self.language.with_aliases(aliases);
        self
    }

    pub fn with_args(mut self, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// JavaScript through Node.js
    pub fn javascript() -> Self {
        Self::new("javascript", "node", "js").with_aliases(["js", "node", "nodejs"])
    }

    pub fn python() -> Self {
        Self::new("python", "python3", "py").with_aliases(["py", "python3"])
    }

    /// POSIX shell scripts
    pub fn shell() -> Self {
        Self::new("shell", "sh", "sh").with_aliases(["sh"])
    }

    /// C# scripts through dotnet-script
    pub fn csharp() -> Self {
        Self::new("csharp", "dotnet-script", "csx").with_aliases(["c#", "cs"])
    }

    /// Presets registered when no configuration overrides them
    pub fn presets() -> Vec<Self> {
        vec![
            Self::javascript(),
            Self::python(),
            Self::shell(),
            Self::csharp(),
        ]
    }

    /// File name suffix for temporary sources, e.g. ".py"
    pub(crate) fn suffix(&self) -> String {
        let extension = self.extension.trim_start_matches('.');
        if extension.is_empty() {
            String::new()
        } else {
            format!(".{}", extension)
        }
    }
}
