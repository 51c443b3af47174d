//! Layered configuration: built-in defaults, overridden by an optional
//! `daybook.toml` project file, overridden by environment variables.
//!
//! Modeled on the discovery/builder/validation split used elsewhere in this
//! family of tools: a `ConfigBuilder` assembles a `Config` once at process
//! startup, validates it, and the result is threaded through explicitly
//! rather than re-read from `std::env` at each call site.

use camino::Utf8PathBuf;
use serde::Deserialize;

use crate::error::{DaybookError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmMode {
    DryRun,
    Real,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub llm_mode: LlmMode,
    pub llm_provider_default: Option<String>,
    pub openai_api_key: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub llm_min_delay_ms: u64,
    pub llm_max_usd_per_run: Option<f64>,
    pub llm_max_usd_per_day: Option<f64>,
    pub log_format: LogFormat,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            database_url: "postgres://localhost/daybook".to_string(),
            llm_mode: LlmMode::DryRun,
            llm_provider_default: None,
            openai_api_key: None,
            anthropic_api_key: None,
            llm_min_delay_ms: 250,
            llm_max_usd_per_run: None,
            llm_max_usd_per_day: None,
            log_format: LogFormat::Pretty,
        }
    }
}

/// The subset of `Config` that may come from a TOML overlay file. Every
/// field is optional since the file itself is optional and may be partial.
#[derive(Debug, Default, Deserialize)]
struct FileOverlay {
    database_url: Option<String>,
    llm_min_delay_ms: Option<u64>,
    llm_max_usd_per_run: Option<f64>,
    llm_max_usd_per_day: Option<f64>,
    log_format: Option<String>,
}

pub struct ConfigBuilder {
    overlay_path: Option<Utf8PathBuf>,
    env: Vec<(String, String)>,
}

impl ConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        ConfigBuilder {
            overlay_path: None,
            env: std::env::vars().collect(),
        }
    }

    #[must_use]
    pub fn with_overlay_path(mut self, path: Utf8PathBuf) -> Self {
        self.overlay_path = Some(path);
        self
    }

    /// Test seam: inject an explicit environment snapshot instead of the
    /// process environment.
    #[must_use]
    pub fn with_env(mut self, env: Vec<(String, String)>) -> Self {
        self.env = env;
        self
    }

    fn env_get(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn build(self) -> Result<Config> {
        let mut config = Config::default();

        let overlay_path = self
            .overlay_path
            .clone()
            .unwrap_or_else(|| Utf8PathBuf::from("daybook.toml"));
        if overlay_path.exists() {
            let contents = std::fs::read_to_string(&overlay_path).map_err(|e| {
                DaybookError::Configuration {
                    message: format!("failed to read {overlay_path}: {e}"),
                }
            })?;
            let overlay: FileOverlay =
                toml::from_str(&contents).map_err(|e| DaybookError::Configuration {
                    message: format!("invalid TOML in {overlay_path}: {e}"),
                })?;
            if let Some(v) = overlay.database_url {
                config.database_url = v;
            }
            if let Some(v) = overlay.llm_min_delay_ms {
                config.llm_min_delay_ms = v;
            }
            if let Some(v) = overlay.llm_max_usd_per_run {
                config.llm_max_usd_per_run = Some(v);
            }
            if let Some(v) = overlay.llm_max_usd_per_day {
                config.llm_max_usd_per_day = Some(v);
            }
            if let Some(v) = overlay.log_format {
                config.log_format = parse_log_format(&v).unwrap_or(LogFormat::Pretty);
            }
        }

        if let Some(v) = self.env_get("LLM_MODE") {
            config.llm_mode = if v.eq_ignore_ascii_case("real") {
                LlmMode::Real
            } else {
                LlmMode::DryRun
            };
        }
        if let Some(v) = self.env_get("LLM_PROVIDER_DEFAULT") {
            let lower = v.to_ascii_lowercase();
            config.llm_provider_default = matches!(lower.as_str(), "openai" | "anthropic")
                .then_some(lower);
        }
        if let Some(v) = self.env_get("OPENAI_API_KEY") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                config.openai_api_key = Some(trimmed.to_string());
            }
        }
        if let Some(v) = self.env_get("ANTHROPIC_API_KEY") {
            let trimmed = v.trim();
            if !trimmed.is_empty() {
                config.anthropic_api_key = Some(trimmed.to_string());
            }
        }
        if let Some(v) = self.env_get("LLM_MIN_DELAY_MS") {
            if let Ok(parsed) = v.parse::<u64>() {
                config.llm_min_delay_ms = parsed;
            }
        }
        if let Some(v) = self.env_get("LLM_MAX_USD_PER_RUN") {
            if let Ok(parsed) = v.parse::<f64>() {
                if parsed > 0.0 {
                    config.llm_max_usd_per_run = Some(parsed);
                }
            }
        }
        if let Some(v) = self.env_get("LLM_MAX_USD_PER_DAY") {
            if let Ok(parsed) = v.parse::<f64>() {
                if parsed > 0.0 {
                    config.llm_max_usd_per_day = Some(parsed);
                }
            }
        }
        if let Some(v) = self.env_get("DAYBOOK_DATABASE_URL") {
            config.database_url = v.to_string();
        }
        if let Some(v) = self.env_get("DAYBOOK_LOG_FORMAT") {
            if let Some(parsed) = parse_log_format(v) {
                config.log_format = parsed;
            }
        }

        Ok(config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_log_format(s: &str) -> Option<LogFormat> {
    match s.to_ascii_lowercase().as_str() {
        "json" => Some(LogFormat::Json),
        "pretty" => Some(LogFormat::Pretty),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_dry_run_with_no_keys() {
        let config = ConfigBuilder::new().with_env(vec![]).build().unwrap();
        assert_eq!(config.llm_mode, LlmMode::DryRun);
        assert!(config.openai_api_key.is_none());
        assert_eq!(config.llm_min_delay_ms, 250);
    }

    #[test]
    fn env_enables_real_mode_and_trims_keys() {
        let config = ConfigBuilder::new()
            .with_env(vec![
                ("LLM_MODE".to_string(), "real".to_string()),
                ("OPENAI_API_KEY".to_string(), "  sk-test  ".to_string()),
            ])
            .build()
            .unwrap();
        assert_eq!(config.llm_mode, LlmMode::Real);
        assert_eq!(config.openai_api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn negative_or_non_numeric_budget_is_ignored() {
        let config = ConfigBuilder::new()
            .with_env(vec![
                ("LLM_MAX_USD_PER_RUN".to_string(), "-5".to_string()),
                ("LLM_MAX_USD_PER_DAY".to_string(), "not-a-number".to_string()),
            ])
            .build()
            .unwrap();
        assert!(config.llm_max_usd_per_run.is_none());
        assert!(config.llm_max_usd_per_day.is_none());
    }

    #[test]
    fn invalid_min_delay_falls_back_to_default() {
        let config = ConfigBuilder::new()
            .with_env(vec![("LLM_MIN_DELAY_MS".to_string(), "-1".to_string())])
            .build()
            .unwrap();
        assert_eq!(config.llm_min_delay_ms, 250);
    }
}
