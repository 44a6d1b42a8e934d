//! Configuration file and backend factory.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use tutorgrade_core::engine::ExamConfig;
use tutorgrade_core::grading::CallPolicy;
use tutorgrade_core::model::{Difficulty, DEFAULT_QUESTION_COUNT};
use tutorgrade_core::traits::GradingClient;

use crate::gemini::GeminiClient;
use crate::mock::MockClient;
use crate::ollama::OllamaClient;
use crate::openai::{self, OpenAiClient};

/// Environment variable holding the DashScope (Qwen) API key.
pub const QWEN_KEY_VAR: &str = "DASHSCOPE_API_KEY";
/// Environment variable holding the Google (Gemini) API key.
pub const GEMINI_KEY_VAR: &str = "GOOGLE_API_KEY";

/// Configuration for a single grading backend.
///
/// Note: Custom Debug impl masks API keys to prevent accidental exposure in logs.
#[derive(Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Any OpenAI-compatible chat completions endpoint.
    OpenAI {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Gemini {
        api_key: String,
        #[serde(default)]
        base_url: Option<String>,
        #[serde(default)]
        model: Option<String>,
    },
    Ollama {
        #[serde(default = "default_ollama_url")]
        base_url: String,
        #[serde(default)]
        model: Option<String>,
    },
    Mock {
        /// Prompt substring → reply.
        #[serde(default)]
        responses: BTreeMap<String, String>,
        /// Replies served in order before any rule is consulted.
        #[serde(default)]
        sequence: Vec<String>,
        #[serde(default)]
        default_response: Option<String>,
    },
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendConfig::OpenAI {
                api_key: _,
                base_url,
                model,
            } => f
                .debug_struct("OpenAI")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
            BackendConfig::Gemini {
                api_key: _,
                base_url,
                model,
            } => f
                .debug_struct("Gemini")
                .field("api_key", &"***")
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
            BackendConfig::Ollama { base_url, model } => f
                .debug_struct("Ollama")
                .field("base_url", base_url)
                .field("model", model)
                .finish(),
            BackendConfig::Mock {
                responses,
                sequence,
                default_response,
            } => f
                .debug_struct("Mock")
                .field("responses", &responses.len())
                .field("sequence", &sequence.len())
                .field("default_response", &default_response.is_some())
                .finish(),
        }
    }
}

impl BackendConfig {
    /// The `type` tag of this backend.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::OpenAI { .. } => "openai",
            BackendConfig::Gemini { .. } => "gemini",
            BackendConfig::Ollama { .. } => "ollama",
            BackendConfig::Mock { .. } => "mock",
        }
    }

    /// Whether an API key is present; `None` for backends that need none.
    pub fn has_api_key(&self) -> Option<bool> {
        match self {
            BackendConfig::OpenAI { api_key, .. } | BackendConfig::Gemini { api_key, .. } => {
                Some(!api_key.trim().is_empty())
            }
            BackendConfig::Ollama { .. } | BackendConfig::Mock { .. } => None,
        }
    }

    /// The model requests will use.
    pub fn model(&self) -> &str {
        match self {
            BackendConfig::OpenAI { model, .. } => {
                model.as_deref().unwrap_or(openai::DEFAULT_MODEL)
            }
            BackendConfig::Gemini { model, .. } => {
                model.as_deref().unwrap_or(crate::gemini::DEFAULT_MODEL)
            }
            BackendConfig::Ollama { model, .. } => {
                model.as_deref().unwrap_or(crate::ollama::DEFAULT_MODEL)
            }
            BackendConfig::Mock { .. } => "mock-model",
        }
    }

    fn qwen(api_key: String) -> Self {
        BackendConfig::OpenAI {
            api_key,
            base_url: Some(openai::DEFAULT_BASE_URL.to_string()),
            model: Some(openai::DEFAULT_MODEL.to_string()),
        }
    }

    fn gemini(api_key: String) -> Self {
        BackendConfig::Gemini {
            api_key,
            base_url: None,
            model: None,
        }
    }
}

fn default_ollama_url() -> String {
    crate::ollama::DEFAULT_BASE_URL.to_string()
}

/// `[exam]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamSettings {
    #[serde(default = "default_question_count")]
    pub question_count: u32,
    #[serde(default)]
    pub difficulty: Option<Difficulty>,
}

impl Default for ExamSettings {
    fn default() -> Self {
        Self {
            question_count: default_question_count(),
            difficulty: None,
        }
    }
}

/// `[grading]` section: per-call timeout and retry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingSettings {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_retry_once")]
    pub retry_once: bool,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for GradingSettings {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            retry_once: default_retry_once(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl GradingSettings {
    pub fn call_policy(&self) -> CallPolicy {
        CallPolicy {
            timeout: Duration::from_secs(self.timeout_secs),
            retry_once: self.retry_once,
            retry_delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

/// Top-level tutorgrade configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TutorConfig {
    /// SQLite database file.
    #[serde(default = "default_database")]
    pub database: PathBuf,
    /// Backend used when none is named on the command line.
    #[serde(default = "default_backend")]
    pub default_backend: String,
    /// Backend configurations keyed by name.
    #[serde(default)]
    pub providers: HashMap<String, BackendConfig>,
    /// Sampling temperature for every backend.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    #[serde(default)]
    pub exam: ExamSettings,
    #[serde(default)]
    pub grading: GradingSettings,
    /// Directory saved reports are written to.
    #[serde(default = "default_report_dir")]
    pub report_dir: PathBuf,
}

fn default_database() -> PathBuf {
    PathBuf::from("tutorgrade.db")
}
fn default_backend() -> String {
    "qwen".to_string()
}
fn default_temperature() -> f64 {
    0.7
}
fn default_question_count() -> u32 {
    DEFAULT_QUESTION_COUNT
}
fn default_timeout_secs() -> u64 {
    60
}
fn default_retry_once() -> bool {
    true
}
fn default_retry_delay() -> u64 {
    1000
}
fn default_report_dir() -> PathBuf {
    PathBuf::from("./reports")
}

impl Default for TutorConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            default_backend: default_backend(),
            providers: HashMap::new(),
            temperature: default_temperature(),
            exam: ExamSettings::default(),
            grading: GradingSettings::default(),
            report_dir: default_report_dir(),
        }
    }
}

impl TutorConfig {
    /// Orchestrator settings derived from `[exam]` and `[grading]`.
    pub fn exam_config(&self) -> ExamConfig {
        ExamConfig {
            question_count: self.exam.question_count,
            difficulty: self.exam.difficulty,
            call_policy: self.grading.call_policy(),
        }
    }

    /// Look up a backend by name, falling back to `default_backend`.
    pub fn backend(&self, name: Option<&str>) -> Result<(&str, &BackendConfig)> {
        let name = name.unwrap_or(&self.default_backend);
        let (name, config) = self.providers.get_key_value(name).ok_or_else(|| {
            let mut known: Vec<&str> = self.providers.keys().map(String::as_str).collect();
            known.sort_unstable();
            anyhow::anyhow!(
                "backend '{name}' is not configured (known: {}); set {QWEN_KEY_VAR} or {GEMINI_KEY_VAR}, or add it to tutorgrade.toml",
                if known.is_empty() { "none".to_string() } else { known.join(", ") }
            )
        })?;
        Ok((name.as_str(), config))
    }

    /// Build the client for a backend by name, falling back to `default_backend`.
    pub fn client(&self, name: Option<&str>) -> Result<Box<dyn GradingClient>> {
        let (name, config) = self.backend(name)?;
        create_client(name, config, self.temperature, self.grading.timeout_secs)
    }

    /// Configured backends sorted by name.
    pub fn backends(&self) -> Vec<(&str, &BackendConfig)> {
        let mut list: Vec<_> = self
            .providers
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        list.sort_by(|a, b| a.0.cmp(b.0));
        list
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        if let Some(end) = result[start..].find('}') {
            let var_name = &result[start + 2..start + end];
            let value = std::env::var(var_name).unwrap_or_default();
            result = format!(
                "{}{}{}",
                &result[..start],
                value,
                &result[start + end + 1..]
            );
        } else {
            break;
        }
    }
    result
}

fn resolve_option(s: &Option<String>) -> Option<String> {
    s.as_deref().map(resolve_env_vars)
}

/// Resolve env vars in a backend config.
fn resolve_backend_config(config: &BackendConfig) -> BackendConfig {
    match config {
        BackendConfig::OpenAI {
            api_key,
            base_url,
            model,
        } => BackendConfig::OpenAI {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_option(base_url),
            model: resolve_option(model),
        },
        BackendConfig::Gemini {
            api_key,
            base_url,
            model,
        } => BackendConfig::Gemini {
            api_key: resolve_env_vars(api_key),
            base_url: resolve_option(base_url),
            model: resolve_option(model),
        },
        BackendConfig::Ollama { base_url, model } => BackendConfig::Ollama {
            base_url: resolve_env_vars(base_url),
            model: resolve_option(model),
        },
        BackendConfig::Mock { .. } => config.clone(),
    }
}

/// Register or override the `qwen` and `gemini` backends from API key variables.
///
/// A key only replaces the key of an existing backend of the matching type.
pub fn apply_key_overrides(config: &mut TutorConfig, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(key) = lookup(QWEN_KEY_VAR).filter(|k| !k.trim().is_empty()) {
        let entry = config
            .providers
            .entry("qwen".into())
            .or_insert_with(|| BackendConfig::qwen(String::new()));
        if let BackendConfig::OpenAI { api_key, .. } = entry {
            *api_key = key;
        }
    }

    if let Some(key) = lookup(GEMINI_KEY_VAR).filter(|k| !k.trim().is_empty()) {
        let entry = config
            .providers
            .entry("gemini".into())
            .or_insert_with(|| BackendConfig::gemini(String::new()));
        if let BackendConfig::Gemini { api_key, .. } = entry {
            *api_key = key;
        }
    }
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `tutorgrade.toml` in the current directory
/// 2. `~/.config/tutorgrade/config.toml`
///
/// Environment variable overrides: `DASHSCOPE_API_KEY`, `GOOGLE_API_KEY`.
pub fn load_config() -> Result<TutorConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<TutorConfig> {
    let config_path = if let Some(p) = path {
        if p.exists() {
            Some(p.to_path_buf())
        } else {
            anyhow::bail!("config file not found: {}", p.display());
        }
    } else {
        let local = PathBuf::from("tutorgrade.toml");
        if local.exists() {
            Some(local)
        } else {
            dirs_path()
                .map(|home| home.join("config.toml"))
                .filter(|global| global.exists())
        }
    };

    let mut config = match &config_path {
        Some(path) => parse_config_file(path)?,
        None => TutorConfig::default(),
    };

    apply_key_overrides(&mut config, |var| std::env::var(var).ok());

    config.providers = config
        .providers
        .iter()
        .map(|(k, v)| (k.clone(), resolve_backend_config(v)))
        .collect();

    tracing::debug!(
        path = ?config_path,
        backends = config.providers.len(),
        "configuration loaded"
    );
    Ok(config)
}

fn parse_config_file(path: &Path) -> Result<TutorConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config: {}", path.display()))?;
    let mut config = toml::from_str::<TutorConfig>(&content)
        .with_context(|| format!("failed to parse config: {}", path.display()))?;

    // Relative database and report paths are relative to the config file.
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        if config.database.is_relative() {
            config.database = dir.join(&config.database);
        }
        if config.report_dir.is_relative() {
            config.report_dir = dir.join(&config.report_dir);
        }
    }
    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("tutorgrade"))
}

/// Create a grading client from its configuration.
pub fn create_client(
    name: &str,
    config: &BackendConfig,
    temperature: f64,
    timeout_secs: u64,
) -> Result<Box<dyn GradingClient>> {
    if config.has_api_key() == Some(false) {
        anyhow::bail!(
            "backend '{name}' has no API key (set {} or api_key in tutorgrade.toml)",
            match config {
                BackendConfig::Gemini { .. } => GEMINI_KEY_VAR,
                _ => QWEN_KEY_VAR,
            }
        );
    }

    match config {
        BackendConfig::OpenAI {
            api_key,
            base_url,
            model,
        } => Ok(Box::new(OpenAiClient::new(
            name,
            api_key,
            base_url.clone(),
            model.clone(),
            temperature,
        )
        .with_timeout(timeout_secs))),
        BackendConfig::Gemini {
            api_key,
            base_url,
            model,
        } => Ok(Box::new(GeminiClient::new(
            name,
            api_key,
            base_url.clone(),
            model.clone(),
            temperature,
        )
        .with_timeout(timeout_secs))),
        BackendConfig::Ollama { base_url, model } => Ok(Box::new(OllamaClient::new(
            name,
            base_url,
            model.clone(),
            temperature,
        )
        .with_timeout(timeout_secs))),
        BackendConfig::Mock {
            responses,
            sequence,
            default_response,
        } => Ok(Box::new(
            MockClient::new(responses.clone(), sequence.clone(), default_response.clone())
                .named(name),
        )),
    }
}

/// Starter configuration written by `tutorgrade init`.
pub const STARTER_CONFIG: &str = r#"# tutorgrade configuration

database = "tutorgrade.db"
default_backend = "qwen"
temperature = 0.7
report_dir = "reports"

[exam]
question_count = 5

[grading]
timeout_secs = 60
retry_once = true
retry_delay_ms = 1000

# Qwen through DashScope's OpenAI-compatible endpoint.
[providers.qwen]
type = "openai"
api_key = "${DASHSCOPE_API_KEY}"
base_url = "https://dashscope.aliyuncs.com/compatible-mode/v1"
model = "qwen-turbo"

[providers.gemini]
type = "gemini"
api_key = "${GOOGLE_API_KEY}"
model = "gemini-pro"

[providers.local]
type = "ollama"
base_url = "http://localhost:11434"
model = "qwen2.5"
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_env_vars_basic() {
        std::env::set_var("_TUTORGRADE_TEST_VAR", "hello");
        assert_eq!(resolve_env_vars("${_TUTORGRADE_TEST_VAR}"), "hello");
        assert_eq!(
            resolve_env_vars("prefix_${_TUTORGRADE_TEST_VAR}_suffix"),
            "prefix_hello_suffix"
        );
        std::env::remove_var("_TUTORGRADE_TEST_VAR");
    }

    #[test]
    fn unterminated_reference_is_left_alone() {
        assert_eq!(resolve_env_vars("${OPEN"), "${OPEN");
    }

    #[test]
    fn default_config() {
        let config = TutorConfig::default();
        assert_eq!(config.default_backend, "qwen");
        assert_eq!(config.temperature, 0.7);
        assert_eq!(config.exam.question_count, 5);
        assert_eq!(config.grading.timeout_secs, 60);
        assert!(config.grading.retry_once);
        assert_eq!(config.report_dir, PathBuf::from("./reports"));
    }

    #[test]
    fn parse_backend_config() {
        let toml_str = r#"
default_backend = "qwen"

[exam]
question_count = 3
difficulty = "easy"

[providers.qwen]
type = "openai"
api_key = "sk-test"

[providers.gemini]
type = "gemini"
api_key = "g-test"

[providers.local]
type = "ollama"

[providers.offline]
type = "mock"
default_response = "{\"score\": 10}"
"#;
        let config: TutorConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.providers.len(), 4);
        assert!(matches!(
            config.providers.get("qwen"),
            Some(BackendConfig::OpenAI { .. })
        ));
        assert_eq!(config.providers["qwen"].model(), "qwen-turbo");
        assert_eq!(config.providers["local"].has_api_key(), None);
        assert_eq!(config.exam_config().question_count, 3);
        assert_eq!(config.exam_config().difficulty, Some(Difficulty::Easy));
    }

    #[test]
    fn starter_config_parses() {
        let config: TutorConfig = toml::from_str(STARTER_CONFIG).unwrap();
        assert_eq!(config.backends().len(), 3);
        assert_eq!(config.backends()[0].0, "gemini");
    }

    #[test]
    fn debug_masks_keys() {
        let config = BackendConfig::qwen("sk-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("***"));
    }

    #[test]
    fn key_overrides_register_backends() {
        let mut config = TutorConfig::default();
        apply_key_overrides(&mut config, |var| match var {
            QWEN_KEY_VAR => Some("sk-qwen".into()),
            GEMINI_KEY_VAR => Some("g-key".into()),
            _ => None,
        });

        match &config.providers["qwen"] {
            BackendConfig::OpenAI {
                api_key, base_url, ..
            } => {
                assert_eq!(api_key, "sk-qwen");
                assert_eq!(base_url.as_deref(), Some(openai::DEFAULT_BASE_URL));
            }
            other => panic!("unexpected backend: {other:?}"),
        }
        assert_eq!(config.providers["gemini"].kind(), "gemini");
    }

    #[test]
    fn key_override_keeps_configured_url() {
        let mut config = TutorConfig::default();
        config.providers.insert(
            "qwen".into(),
            BackendConfig::OpenAI {
                api_key: String::new(),
                base_url: Some("http://proxy".into()),
                model: Some("qwen-max".into()),
            },
        );
        apply_key_overrides(&mut config, |var| {
            (var == QWEN_KEY_VAR).then(|| "sk-new".to_string())
        });

        let BackendConfig::OpenAI {
            api_key,
            base_url,
            model,
        } = &config.providers["qwen"]
        else {
            panic!("qwen must stay an openai backend");
        };
        assert_eq!(api_key, "sk-new");
        assert_eq!(base_url.as_deref(), Some("http://proxy"));
        assert_eq!(model.as_deref(), Some("qwen-max"));
    }

    #[test]
    fn missing_key_is_rejected() {
        let err = create_client("qwen", &BackendConfig::qwen(String::new()), 0.7, 60)
            .err()
            .unwrap();
        assert!(err.to_string().contains(QWEN_KEY_VAR));
    }

    #[test]
    fn unknown_backend_lists_known_ones() {
        let mut config = TutorConfig::default();
        config.providers.insert(
            "offline".into(),
            BackendConfig::Mock {
                responses: BTreeMap::new(),
                sequence: Vec::new(),
                default_response: Some("ok".into()),
            },
        );
        let err = config.backend(Some("claude")).err().unwrap();
        assert!(err.to_string().contains("offline"));

        let client = config.client(Some("offline")).unwrap();
        assert_eq!(client.name(), "offline");
    }

    #[test]
    fn relative_paths_follow_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tutorgrade.toml");
        std::fs::write(&path, "database = \"data.db\"\n").unwrap();

        let config = load_config_from(Some(&path)).unwrap();
        assert_eq!(config.database, dir.path().join("data.db"));
        assert_eq!(config.report_dir, dir.path().join("./reports"));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        assert!(load_config_from(Some(Path::new("/nonexistent/tutorgrade.toml"))).is_err());
    }
}
