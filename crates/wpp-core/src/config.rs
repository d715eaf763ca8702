//! Configuration management
//!
//! Settings are resolved in this order:
//! 1. Environment variables
//! 2. `wpp-gateway.toml` config file
//! 3. Default values
//!
//! `${VAR_NAME}` inside the config file is expanded from the environment.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::storage::RedrivePolicy;

/// Default config file looked up by [`Config::load`]
pub const CONFIG_FILE: &str = "wpp-gateway.toml";

/// Main configuration for wpp-gateway
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Deployment environment (used to build parameter names)
    pub environment: String,

    /// HTTP API configuration
    pub api: ApiConfig,

    /// Storage configuration
    pub storage: StorageConfig,

    /// Secret storage configuration
    pub secrets: SecretsConfig,

    /// WhatsApp Cloud API configuration
    pub meta: MetaConfig,

    /// Agent runtime configuration
    pub agent: AgentConfig,

    /// Workflow runtime configuration
    pub workflow: WorkflowConfig,

    /// Parameter store values, keyed by full parameter name
    pub parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Port for HTTP API server
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            port: default_api_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to SQLite database file
    pub db_path: String,

    /// Table holding inbound chat messages
    pub messages_table: String,

    /// Table holding data exposed to the agent action groups
    pub agents_data_table: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            messages_table: "wpp-chatbot-messages".to_string(),
            agents_data_table: "wpp-agents-data".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Name of the JSON secret holding the chatbot credentials
    pub secret_name: String,

    /// Path of the local secrets file
    pub path: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            secret_name: "wpp-chatbot-secret".to_string(),
            path: "secrets.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetaConfig {
    /// Graph API base endpoint (with trailing slash)
    pub endpoint: String,

    /// Graph API version segment
    pub api_version: String,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://graph.facebook.com/".to_string(),
            api_version: "v20.0".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base URL of the agent runtime
    pub runtime_url: String,

    /// Session id sent with every invocation
    pub session_id: String,

    /// User whose data the action groups read (`USER#<id>`)
    pub user_id: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            runtime_url: "http://localhost:8081".to_string(),
            session_id: "TempSessionBedrock".to_string(),
            user_id: "user@example.com".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Finished executions kept queryable; older ones are evicted
    pub execution_history: usize,

    /// Deliveries per change stream record before it is dropped
    pub stream_max_attempts: u32,

    /// Delay before the first redelivery, in milliseconds
    pub stream_retry_backoff_ms: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            execution_history: 1000,
            stream_max_attempts: 3,
            stream_retry_backoff_ms: 1000,
        }
    }
}

impl WorkflowConfig {
    pub fn redrive_policy(&self) -> RedrivePolicy {
        RedrivePolicy {
            max_attempts: self.stream_max_attempts.max(1),
            backoff: Duration::from_millis(self.stream_retry_backoff_ms),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: default_environment(),
            api: ApiConfig::default(),
            storage: StorageConfig::default(),
            secrets: SecretsConfig::default(),
            meta: MetaConfig::default(),
            agent: AgentConfig::default(),
            workflow: WorkflowConfig::default(),
            parameters: HashMap::new(),
        }
    }
}

fn default_environment() -> String {
    "dev".to_string()
}

fn default_api_port() -> u16 {
    3000
}

fn default_db_path() -> String {
    "data/wpp-gateway.db".to_string()
}

impl Config {
    /// Load configuration from environment variables only
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_toml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path)
            .map_err(|e| CoreError::Config(format!("Failed to read config file: {}", e)))?;

        let mut config = Self::from_toml_str(&content)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from TOML text (with `${VAR}` expansion)
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let expanded = expand_env_vars(content);
        toml::from_str(&expanded)
            .map_err(|e| CoreError::Config(format!("Failed to parse TOML: {}", e)))
    }

    /// Load `wpp-gateway.toml` from the working directory if present,
    /// environment variables otherwise
    pub fn load() -> Result<Self> {
        if Path::new(CONFIG_FILE).exists() {
            return Self::from_toml_file(CONFIG_FILE);
        }
        Self::from_env()
    }

    /// Parameter holding the agent id
    pub fn agent_id_parameter(&self) -> String {
        format!("/{}/aws-wpp/bedrock-agent-id", self.environment)
    }

    /// Parameter holding the full agent alias string (`<...>|<alias-id>`)
    pub fn agent_alias_parameter(&self) -> String {
        format!(
            "/{}/aws-wpp/bedrock-agent-alias-id-full-string",
            self.environment
        )
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(environment) = non_empty_var("ENVIRONMENT") {
            self.environment = environment;
        }

        if let Some(port) = non_empty_var("API_PORT") {
            self.api.port = port
                .parse()
                .map_err(|_| CoreError::Config(format!("Invalid API_PORT: {}", port)))?;
        }

        if let Some(path) = non_empty_var("DB_PATH") {
            self.storage.db_path = path;
        }
        if let Some(table) = non_empty_var("DYNAMODB_TABLE") {
            self.storage.messages_table = table;
        }
        if let Some(table) = non_empty_var("TABLE_NAME") {
            self.storage.agents_data_table = table;
        }

        if let Some(name) = non_empty_var("SECRET_NAME") {
            self.secrets.secret_name = name;
        }
        if let Some(path) = non_empty_var("SECRETS_PATH") {
            self.secrets.path = path;
        }

        if let Some(endpoint) = non_empty_var("META_ENDPOINT") {
            self.meta.endpoint = endpoint;
        }
        if let Some(version) = non_empty_var("META_API_VERSION") {
            self.meta.api_version = version;
        }

        if let Some(url) = non_empty_var("AGENT_RUNTIME_URL") {
            self.agent.runtime_url = url;
        }
        if let Some(session_id) = non_empty_var("AGENT_SESSION_ID") {
            self.agent.session_id = session_id;
        }
        if let Some(user_id) = non_empty_var("AGENT_USER_ID") {
            self.agent.user_id = user_id;
        }

        if let Some(history) = non_empty_var("EXECUTION_HISTORY") {
            self.workflow.execution_history = history.parse().map_err(|_| {
                CoreError::Config(format!("Invalid EXECUTION_HISTORY: {}", history))
            })?;
        }
        if let Some(attempts) = non_empty_var("STREAM_MAX_ATTEMPTS") {
            self.workflow.stream_max_attempts = attempts.parse().map_err(|_| {
                CoreError::Config(format!("Invalid STREAM_MAX_ATTEMPTS: {}", attempts))
            })?;
        }

        // Seed the agent parameters under the resolved environment's names
        if let Some(agent_id) = non_empty_var("AGENT_ID") {
            self.parameters.insert(self.agent_id_parameter(), agent_id);
        }
        if let Some(alias_id) = non_empty_var("AGENT_ALIAS_ID") {
            self.parameters.insert(self.agent_alias_parameter(), alias_id);
        }

        Ok(())
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// Replace `${VAR_NAME}` with the environment value (empty when unset)
fn expand_env_vars(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut chars = value.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next();

            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }

            if let Ok(env_value) = std::env::var(&var_name) {
                result.push_str(&env_value);
            }
        } else {
            result.push(c);
        }
    }

    result
}
