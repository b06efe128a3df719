//! Configuration management for wagate
//!
//! Configuration is loaded from `~/.wagate/config.json` (or an explicit path)
//! with environment variable overrides of the form `WAGATE_<SECTION>_<KEY>`.
//! The variable names used by earlier deployments (`WHATSAPP_TOKEN`,
//! `WHATSAPP_NUMBER`, `GEMINI_API_KEY`) are honoured as well.

mod types;
pub mod validate;

pub use types::*;

use std::path::{Path, PathBuf};

use crate::error::{GatewayError, Result};

impl Config {
    /// Returns the wagate configuration directory path (~/.wagate)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".wagate")
    }

    /// Returns the path to the config file (~/.wagate/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content).map_err(|e| {
                GatewayError::Config(format!("{}: {}", path.display(), e))
            })?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Save configuration as pretty JSON, creating parent directories.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Prefixed variables win over the legacy names.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        // Legacy names first so WAGATE_* can override them
        if let Some(val) = lookup("WHATSAPP_TOKEN") {
            self.whatsapp.access_token = val;
        }
        if let Some(val) = lookup("WHATSAPP_NUMBER") {
            self.whatsapp.phone_number_id = val;
        }
        if let Some(val) = lookup("GEMINI_API_KEY") {
            self.model.api_key = val;
        }

        // WhatsApp
        if let Some(val) = lookup("WAGATE_WHATSAPP_ACCESS_TOKEN") {
            self.whatsapp.access_token = val;
        }
        if let Some(val) = lookup("WAGATE_WHATSAPP_PHONE_NUMBER_ID") {
            self.whatsapp.phone_number_id = val;
        }
        if let Some(val) = lookup("WAGATE_WHATSAPP_VERIFY_TOKEN") {
            self.whatsapp.verify_token = val;
        }
        if let Some(val) = lookup("WAGATE_WHATSAPP_API_BASE") {
            self.whatsapp.api_base = val;
        }
        if let Some(v) = parsed(&lookup, "WAGATE_WHATSAPP_TIMEOUT_SECS") {
            self.whatsapp.timeout_secs = v;
        }

        // Model
        if let Some(val) = lookup("WAGATE_MODEL_API_KEY") {
            self.model.api_key = val;
        }
        if let Some(val) = lookup("WAGATE_MODEL_MODEL") {
            self.model.model = val;
        }
        if let Some(val) = lookup("WAGATE_MODEL_API_BASE") {
            self.model.api_base = val;
        }
        if let Some(v) = parsed(&lookup, "WAGATE_MODEL_TEMPERATURE") {
            self.model.temperature = v;
        }
        if let Some(v) = parsed(&lookup, "WAGATE_MODEL_MAX_TOKENS") {
            self.model.max_tokens = v;
        }
        if let Some(v) = parsed(&lookup, "WAGATE_MODEL_TIMEOUT_SECS") {
            self.model.timeout_secs = v;
        }
        if let Some(v) = parsed(&lookup, "WAGATE_MODEL_MAX_RETRIES") {
            self.model.max_retries = v;
        }

        // Gateway
        if let Some(val) = lookup("WAGATE_GATEWAY_HOST") {
            self.gateway.host = val;
        }
        if let Some(v) = parsed(&lookup, "WAGATE_GATEWAY_PORT") {
            self.gateway.port = v;
        }
        if let Some(val) = lookup("WAGATE_GATEWAY_PATH") {
            self.gateway.path = val;
        }
        if let Some(v) = parsed(&lookup, "WAGATE_GATEWAY_WORKERS") {
            self.gateway.workers = v;
        }
        if let Some(v) = parsed(&lookup, "WAGATE_GATEWAY_DEDUP_ENABLED") {
            self.gateway.dedup_enabled = v;
        }

        // Storage
        if let Some(val) = lookup("WAGATE_STORAGE_DB_PATH") {
            self.storage.db_path = val;
        }
        if let Some(val) = lookup("WAGATE_STORAGE_MEDIA_ROOT") {
            self.storage.media_root = val;
        }

        // Agent
        if let Some(val) = lookup("WAGATE_AGENT_SYSTEM_PROMPT") {
            self.agent.system_prompt = val;
        }
        if let Some(val) = lookup("WAGATE_AGENT_END_MARKER") {
            self.agent.end_marker = val;
        }
        if let Some(v) = parsed(&lookup, "WAGATE_AGENT_MAX_TOOL_ITERATIONS") {
            self.agent.max_tool_iterations = v;
        }
        if let Some(v) = parsed(&lookup, "WAGATE_AGENT_TOOL_TIMEOUT_SECS") {
            self.agent.tool_timeout_secs = v;
        }

        // Tools
        if let Some(val) = lookup("WAGATE_TOOLS_CATALOG_PATH") {
            self.tools.catalog_path = Some(val);
        }

        // Logging
        if let Some(val) = lookup("WAGATE_LOGGING_LEVEL") {
            self.logging.level = val;
        }
        if let Some(val) = lookup("WAGATE_LOGGING_FORMAT") {
            match val.to_ascii_lowercase().as_str() {
                "pretty" => self.logging.format = LogFormat::Pretty,
                "component" => self.logging.format = LogFormat::Component,
                "json" => self.logging.format = LogFormat::Json,
                _ => {}
            }
        }
        if let Some(val) = lookup("WAGATE_LOGGING_FILE") {
            self.logging.file = Some(val);
        }
    }

    /// Check that everything the gateway needs to serve traffic is present.
    pub fn validate(&self) -> Result<()> {
        let mut missing = Vec::new();
        if self.whatsapp.access_token.trim().is_empty() {
            missing.push("whatsapp.access_token (WHATSAPP_TOKEN)");
        }
        if self.whatsapp.phone_number_id.trim().is_empty() {
            missing.push("whatsapp.phone_number_id (WHATSAPP_NUMBER)");
        }
        if self.whatsapp.verify_token.trim().is_empty() {
            missing.push("whatsapp.verify_token (WAGATE_WHATSAPP_VERIFY_TOKEN)");
        }
        if self.model.api_key.trim().is_empty() {
            missing.push("model.api_key (GEMINI_API_KEY)");
        }
        if !missing.is_empty() {
            return Err(GatewayError::Config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }
        if !self.gateway.path.starts_with('/') {
            return Err(GatewayError::Config(format!(
                "gateway.path must start with '/': {}",
                self.gateway.path
            )));
        }
        if self.gateway.workers == 0 {
            return Err(GatewayError::Config(
                "gateway.workers must be at least 1".to_string(),
            ));
        }
        if self.agent.max_tool_iterations == 0 {
            return Err(GatewayError::Config(
                "agent.max_tool_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Database path with `~` expanded.
    pub fn db_path(&self) -> PathBuf {
        expand_home(&self.storage.db_path)
    }

    /// Media directory with `~` expanded.
    pub fn media_root(&self) -> PathBuf {
        expand_home(&self.storage.media_root)
    }

    /// Catalog path with `~` expanded, if configured.
    pub fn catalog_path(&self) -> Option<PathBuf> {
        self.tools.catalog_path.as_deref().map(expand_home)
    }
}

fn parsed<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.trim().parse().ok())
}

/// Expand ~ to home directory in a path string
pub fn expand_home(path: &str) -> PathBuf {
    if path.is_empty() {
        return PathBuf::from(path);
    }

    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            if let Some(stripped) = rest.strip_prefix('/') {
                return home.join(stripped);
            }
            if rest.is_empty() {
                return home;
            }
        }
    }

    PathBuf::from(path)
}

/// Redact a secret for display, keeping a short prefix.
pub fn redact(secret: &str) -> String {
    if secret.is_empty() {
        return "(unset)".to_string();
    }
    let prefix: String = secret.chars().take(4).collect();
    format!("{}****", prefix)
}
