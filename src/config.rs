use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TaskscopeConfig {
    pub retrieval: RetrievalConfig,
    pub context: ContextConfig,
}

/// Ranking-engine knobs.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Result cap when a search does not specify its own limit.
    pub default_limit: usize,
    /// Lexical retriever weight in score fusion.
    pub text_weight: f64,
    /// Vector retriever weight in score fusion.
    pub vector_weight: f64,
    /// Coordination bonus weight for body term coverage.
    pub body_coordination_weight: f64,
    /// Coordination bonus weight for title term coverage.
    pub title_coordination_weight: f64,
}

/// Context-assembly knobs.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ContextConfig {
    /// Relational hop depth when a request does not specify one (1–3).
    pub default_depth: u8,
    /// Token ceiling for an assembled context bundle.
    pub default_max_tokens: usize,
    /// Total recent-activity entries surfaced by the temporal overlay.
    pub activity_limit: usize,
    /// Gap that ends a same-actor session run. A deliberate approximation —
    /// the operation log carries no real session identifiers.
    pub session_gap_minutes: i64,
    /// Per-direction cap on resolved cross-references.
    pub crossref_limit: usize,
    /// Entity results surfaced by semantic enrichment.
    pub semantic_entity_limit: usize,
    /// Resource results surfaced by semantic enrichment.
    pub semantic_resource_limit: usize,
}

/// Hard ceiling on relational hop depth.
pub const MAX_DEPTH: u8 = 3;

impl Default for TaskscopeConfig {
    fn default() -> Self {
        Self {
            retrieval: RetrievalConfig::default(),
            context: ContextConfig::default(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            text_weight: 0.7,
            vector_weight: 0.3,
            body_coordination_weight: 0.5,
            title_coordination_weight: 0.3,
        }
    }
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            default_depth: 1,
            default_max_tokens: 8000,
            activity_limit: 20,
            session_gap_minutes: 30,
            crossref_limit: 10,
            semantic_entity_limit: 5,
            semantic_resource_limit: 5,
        }
    }
}

/// Returns `~/.taskscope/`
pub fn default_taskscope_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".taskscope")
}

/// Returns the default config file path: `~/.taskscope/config.toml`
pub fn default_config_path() -> PathBuf {
    default_taskscope_dir().join("config.toml")
}

impl TaskscopeConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            TaskscopeConfig::default()
        };

        config.apply_env_overrides();
        config.clamp();
        Ok(config)
    }

    /// Apply environment variable overrides (TASKSCOPE_MAX_TOKENS,
    /// TASKSCOPE_DEPTH, TASKSCOPE_SEARCH_LIMIT).
    fn apply_env_overrides(&mut self) {
        if let Some(val) = env_parse("TASKSCOPE_MAX_TOKENS") {
            self.context.default_max_tokens = val;
        }
        if let Some(val) = env_parse::<u8>("TASKSCOPE_DEPTH") {
            self.context.default_depth = val;
        }
        if let Some(val) = env_parse("TASKSCOPE_SEARCH_LIMIT") {
            self.retrieval.default_limit = val;
        }
    }

    /// Keep depth inside the supported 1–3 range.
    fn clamp(&mut self) {
        self.context.default_depth = self.context.default_depth.clamp(1, MAX_DEPTH);
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = TaskscopeConfig::default();
        assert_eq!(config.retrieval.default_limit, 20);
        assert_eq!(config.retrieval.text_weight, 0.7);
        assert_eq!(config.context.default_depth, 1);
        assert_eq!(config.context.session_gap_minutes, 30);
        assert_eq!(config.context.crossref_limit, 10);
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[retrieval]
default_limit = 10
vector_weight = 0.5

[context]
default_depth = 2
default_max_tokens = 2000
"#;
        let config: TaskscopeConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.retrieval.default_limit, 10);
        assert_eq!(config.retrieval.vector_weight, 0.5);
        assert_eq!(config.context.default_depth, 2);
        assert_eq!(config.context.default_max_tokens, 2000);
        // defaults still apply for unset fields
        assert_eq!(config.retrieval.text_weight, 0.7);
        assert_eq!(config.context.activity_limit, 20);
    }

    #[test]
    fn load_from_file_and_env() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[context]\ndefault_depth = 9\n").unwrap();

        std::env::set_var("TASKSCOPE_MAX_TOKENS", "1234");
        let config = TaskscopeConfig::load_from(&path).unwrap();
        std::env::remove_var("TASKSCOPE_MAX_TOKENS");

        assert_eq!(config.context.default_max_tokens, 1234);
        // out-of-range depth is clamped
        assert_eq!(config.context.default_depth, MAX_DEPTH);
    }

    #[test]
    fn missing_file_uses_defaults() {
        let config = TaskscopeConfig::load_from("/nonexistent/taskscope.toml").unwrap();
        assert_eq!(config.retrieval.default_limit, 20);
    }
}
