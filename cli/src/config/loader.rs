//! CLI configuration loader for tytux
//!
//! Implements single-source priority loading with flag overrides:
//! 1. --config file/dir (highest priority)
//! 2. Current working directory: ./tytux.json or ./.tytux/config.json
//! 3. Git repository root: <repo_root>/.tytux/config.json
//! 4. XDG config: $XDG_CONFIG_HOME/tytux/config.json or ~/.config/tytux/config.json
//! 5. Environment variables only (no files)
//!
//! Fields missing from a file fall back to the environment.

use anyhow::{anyhow, Context, Result};
use tytux_core::config::DEFAULT_ENDPOINT;
use tytux_core::{ExecutorBinding, ModelParams, Protocol, ResolvedExecutorConfig, ResolvedLlmConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const GEMINI_API_KEY: &str = "GEMINI_API_KEY";
pub const OPENAI_API_KEY: &str = "OPENAI_API_KEY";
pub const NEW_RELIC_USER_API_KEY: &str = "NEW_RELIC_USER_API_KEY";
pub const NEW_RELIC_API_ENDPOINT: &str = "NEW_RELIC_API_ENDPOINT";
pub const NEW_RELIC_ACCOUNT_ID: &str = "NEW_RELIC_ACCOUNT_ID";
pub const TYTUX_PROTOCOL: &str = "TYTUX_PROTOCOL";
pub const TYTUX_MODEL: &str = "TYTUX_MODEL";
pub const TYTUX_EXECUTOR: &str = "TYTUX_EXECUTOR";

/// Raw configuration file format
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawConfig {
    /// Protocol to use
    pub protocol: Option<String>,
    /// API key (can be "env:VAR_NAME" for environment variable)
    pub api_key: Option<String>,
    /// Base URL (optional, uses protocol default if not specified)
    pub base_url: Option<String>,
    /// Model name
    pub model: Option<String>,
    /// Model parameters (optional)
    #[serde(default)]
    pub params: ModelParams,
    /// Additional headers (optional)
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Model HTTP timeout
    pub timeout_secs: Option<u64>,
    /// Instruction sent ahead of every conversation
    pub system_prompt: Option<String>,
    /// Analytics API settings
    #[serde(default)]
    pub executor: RawExecutorConfig,
}

/// The `executor` section of a config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawExecutorConfig {
    pub endpoint: Option<String>,
    /// Can be "env:VAR_NAME"
    pub api_key: Option<String>,
    pub account_id: Option<String>,
    #[serde(default)]
    pub allow_mutations: bool,
    pub timeout_secs: Option<u64>,
    pub binding: Option<ExecutorBinding>,
}

/// Everything the commands need to connect
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub llm: ResolvedLlmConfig,
    pub executor: ResolvedExecutorConfig,
    pub system_prompt: Option<String>,
}

/// CLI configuration loader
#[derive(Default)]
pub struct CliConfigLoader {
    /// Override config file/directory path
    config_override: Option<PathBuf>,
    /// Flag overrides
    protocol_override: Option<String>,
    api_key_override: Option<String>,
    base_url_override: Option<String>,
    model_override: Option<String>,
    executor_override: Option<String>,
}

impl CliConfigLoader {
    /// Create a new loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Set config file/directory override
    pub fn with_config_override(mut self, path: PathBuf) -> Self {
        self.config_override = Some(path);
        self
    }

    /// Set protocol override
    pub fn with_protocol_override(mut self, protocol: String) -> Self {
        self.protocol_override = Some(protocol);
        self
    }

    /// Set API key override
    pub fn with_api_key_override(mut self, api_key: String) -> Self {
        self.api_key_override = Some(api_key);
        self
    }

    /// Set base URL override
    pub fn with_base_url_override(mut self, base_url: String) -> Self {
        self.base_url_override = Some(base_url);
        self
    }

    /// Set model override
    pub fn with_model_override(mut self, model: String) -> Self {
        self.model_override = Some(model);
        self
    }

    /// Set executor binding override ("subprocess" or "direct")
    pub fn with_executor_override(mut self, executor: String) -> Self {
        self.executor_override = Some(executor);
        self
    }

    /// Load and resolve configuration
    pub async fn load(&self) -> Result<LoadedConfig> {
        let config = self.load_raw().await?;

        // Step 3: Resolve to final configs
        let llm = self.resolve_llm(&config)?;
        let executor = self.resolve_executor(&config.executor)?;

        Ok(LoadedConfig {
            llm,
            executor,
            system_prompt: config.system_prompt,
        })
    }

    /// Resolve only the analytics API settings; no model key is needed
    pub async fn load_executor(&self) -> Result<ResolvedExecutorConfig> {
        let config = self.load_raw().await?;
        self.resolve_executor(&config.executor)
    }

    async fn load_raw(&self) -> Result<RawConfig> {
        // Step 1: Find and load base configuration
        let mut config = if let Some(override_path) = &self.config_override {
            self.load_from_path(override_path).await.with_context(|| {
                format!(
                    "Failed to load config from override path: {}",
                    override_path.display()
                )
            })?
        } else {
            self.search_and_load().await?
        };

        // Step 2: Apply flag overrides
        if let Some(protocol) = &self.protocol_override {
            config.protocol = Some(protocol.clone());
        }
        if let Some(api_key) = &self.api_key_override {
            config.api_key = Some(api_key.clone());
        }
        if let Some(base_url) = &self.base_url_override {
            config.base_url = Some(base_url.clone());
        }
        if let Some(model) = &self.model_override {
            config.model = Some(model.clone());
        }

        Ok(config)
    }

    /// Search for config in priority order
    async fn search_and_load(&self) -> Result<RawConfig> {
        if let Some(config) = self.try_load_cwd().await? {
            return Ok(config);
        }

        if let Some(config) = self.try_load_git_root().await? {
            return Ok(config);
        }

        if let Some(config) = self.try_load_xdg().await? {
            return Ok(config);
        }

        Ok(RawConfig::default())
    }

    /// Try loading from current working directory
    async fn try_load_cwd(&self) -> Result<Option<RawConfig>> {
        let cwd = std::env::current_dir()?;

        let tytux_json = cwd.join("tytux.json");
        if tytux_json.exists() {
            return Ok(Some(self.load_file(&tytux_json).await?));
        }

        let tytux_dir_config = cwd.join(".tytux").join("config.json");
        if tytux_dir_config.exists() {
            return Ok(Some(self.load_file(&tytux_dir_config).await?));
        }

        Ok(None)
    }

    /// Try loading from git repository root
    async fn try_load_git_root(&self) -> Result<Option<RawConfig>> {
        if let Some(git_root) = find_git_root()? {
            let config_path = git_root.join(".tytux").join("config.json");
            if config_path.exists() {
                return Ok(Some(self.load_file(&config_path).await?));
            }
        }
        Ok(None)
    }

    /// Try loading from XDG config directory
    async fn try_load_xdg(&self) -> Result<Option<RawConfig>> {
        if let Some(config_dir) = xdg_config_dir() {
            let config_path = config_dir.join("tytux").join("config.json");
            if config_path.exists() {
                return Ok(Some(self.load_file(&config_path).await?));
            }
        }
        Ok(None)
    }

    /// Load configuration from a specific path (file or directory)
    async fn load_from_path(&self, path: &Path) -> Result<RawConfig> {
        let expanded = shellexpand::tilde(&path.to_string_lossy()).into_owned();
        let path = PathBuf::from(expanded);

        if path.is_file() {
            self.load_file(&path).await
        } else if path.is_dir() {
            let config_file = path.join("config.json");
            if config_file.exists() {
                self.load_file(&config_file).await
            } else {
                Err(anyhow!(
                    "No config.json found in directory: {}",
                    path.display()
                ))
            }
        } else {
            Err(anyhow!("Config path does not exist: {}", path.display()))
        }
    }

    /// Load a single config file
    async fn load_file(&self, path: &Path) -> Result<RawConfig> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    fn resolve_llm(&self, config: &RawConfig) -> Result<ResolvedLlmConfig> {
        let protocol_name = config
            .protocol
            .clone()
            .or_else(|| env_var(TYTUX_PROTOCOL));

        let protocol = match protocol_name {
            Some(name) => Protocol::parse(&name).ok_or_else(|| {
                anyhow!(
                    "Unknown protocol '{}'. Use google_ai, openai or azure_openai",
                    name
                )
            })?,
            None => detect_protocol(config.api_key.is_some())?,
        };

        let api_key = match &config.api_key {
            Some(value) => resolve_secret(value)?,
            None => env_var(protocol.api_key_env()).ok_or_else(|| {
                anyhow!(
                    "No API key for {}. Set {} or add api_key to tytux.json",
                    protocol,
                    protocol.api_key_env()
                )
            })?,
        };

        let base_url = match &config.base_url {
            Some(url) => url.clone(),
            None => protocol
                .default_base_url()
                .map(str::to_string)
                .ok_or_else(|| anyhow!("Protocol {} requires a base_url", protocol))?,
        };

        let model = config
            .model
            .clone()
            .or_else(|| env_var(TYTUX_MODEL))
            .unwrap_or_else(|| protocol.default_model().to_string());

        let mut resolved = ResolvedLlmConfig::new(protocol, base_url, api_key, model)
            .with_params(config.params.clone());
        for (key, value) in &config.headers {
            resolved = resolved.with_header(key.clone(), value.clone());
        }
        if let Some(timeout) = config.timeout_secs {
            resolved = resolved.with_timeout_secs(timeout);
        }

        resolved
            .validate()
            .map_err(|e| anyhow!("Configuration validation failed: {}", e))?;

        Ok(resolved)
    }

    fn resolve_executor(&self, raw: &RawExecutorConfig) -> Result<ResolvedExecutorConfig> {
        let endpoint = raw
            .endpoint
            .clone()
            .or_else(|| env_var(NEW_RELIC_API_ENDPOINT))
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let api_key = match &raw.api_key {
            Some(value) => resolve_secret(value)?,
            None => env_var(NEW_RELIC_USER_API_KEY).ok_or_else(|| {
                anyhow!("{} is not set. Run `tytux check-env` to see what is missing", NEW_RELIC_USER_API_KEY)
            })?,
        };

        let account_id = raw
            .account_id
            .clone()
            .or_else(|| env_var(NEW_RELIC_ACCOUNT_ID))
            .ok_or_else(|| {
                anyhow!("{} is not set. Run `tytux check-env` to see what is missing", NEW_RELIC_ACCOUNT_ID)
            })?;

        let binding_name = self
            .executor_override
            .clone()
            .or_else(|| env_var(TYTUX_EXECUTOR));
        let binding = match binding_name.as_deref() {
            Some("direct") => ExecutorBinding::Direct,
            Some("subprocess") | Some("mcp") => match &raw.binding {
                Some(binding @ ExecutorBinding::Subprocess { .. }) => binding.clone(),
                _ => ExecutorBinding::default_subprocess(),
            },
            Some(other) => {
                return Err(anyhow!(
                    "Unknown executor '{}'. Use subprocess or direct",
                    other
                ))
            }
            None => raw.binding.clone().unwrap_or_default(),
        };

        let mut resolved = ResolvedExecutorConfig::new(endpoint, api_key, account_id)
            .with_binding(binding)
            .with_allow_mutations(raw.allow_mutations);
        if let Some(timeout) = raw.timeout_secs {
            resolved = resolved.with_timeout_secs(timeout);
        }

        resolved
            .validate()
            .map_err(|e| anyhow!("Executor configuration validation failed: {}", e))?;

        Ok(resolved)
    }
}

/// Pick a protocol from whichever model key is present
fn detect_protocol(has_explicit_key: bool) -> Result<Protocol> {
    let available: Vec<Protocol> = [Protocol::GoogleAI, Protocol::OpenAICompat]
        .into_iter()
        .filter(|p| env_var(p.api_key_env()).is_some())
        .collect();

    match available.as_slice() {
        [] if has_explicit_key => Ok(Protocol::GoogleAI),
        [] => Err(anyhow!(
            "No configuration found. Please create a tytux.json file or set {} or {}",
            GEMINI_API_KEY,
            OPENAI_API_KEY
        )),
        [only] => Ok(*only),
        // Gemini is the primary backend
        _ => Ok(Protocol::GoogleAI),
    }
}

/// Resolve "env:VAR" indirection
fn resolve_secret(value: &str) -> Result<String> {
    match value.strip_prefix("env:") {
        Some(var_name) => std::env::var(var_name)
            .with_context(|| format!("Environment variable not found: {}", var_name)),
        None => Ok(value.to_string()),
    }
}

/// A set, non-empty environment variable
fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn find_git_root() -> Result<Option<PathBuf>> {
    let mut current = std::env::current_dir()?;

    loop {
        if current.join(".git").exists() {
            return Ok(Some(current));
        }

        match current.parent() {
            Some(parent) => current = parent.to_path_buf(),
            None => return Ok(None),
        }
    }
}

fn xdg_config_dir() -> Option<PathBuf> {
    match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg_config) if !xdg_config.is_empty() => Some(PathBuf::from(xdg_config)),
        _ => dirs::config_dir(),
    }
}
