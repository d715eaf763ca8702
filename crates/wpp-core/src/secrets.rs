//! Secret retrieval
//!
//! Secrets are JSON objects stored under a name. [`SecretsHelper`] reads one
//! key out of a named secret, fetching the secret on every call.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use tokio::sync::RwLock;
use tracing::{debug, error, info};

use crate::error::{CoreError, Result};

/// Source of named secret strings
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Get the raw secret string stored under `secret_name`
    async fn get_secret_string(&self, secret_name: &str) -> Result<String>;
}

/// File-backed secret store
///
/// The file holds a JSON object mapping secret names to secret objects:
/// `{"wpp-chatbot-secret": {"META_TOKEN": "...", ...}}`. It is re-read on
/// every lookup so rotated values are picked up without a restart.
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    path: PathBuf,
}

impl FileSecretStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get_secret_string(&self, secret_name: &str) -> Result<String> {
        let content = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            CoreError::Secret(format!(
                "Failed to read secrets file {}: {}",
                self.path.display(),
                e
            ))
        })?;

        let secrets: Map<String, JsonValue> = serde_json::from_str(&content)?;
        match secrets.get(secret_name) {
            Some(JsonValue::String(s)) => Ok(s.clone()),
            Some(value) => Ok(value.to_string()),
            None => Err(CoreError::Secret(format!("Secret not found: {}", secret_name))),
        }
    }
}

/// In-memory secret store
#[derive(Debug, Default, Clone)]
pub struct InMemorySecretStore {
    secrets: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a secret object under a name
    pub async fn insert(&self, secret_name: &str, secret: &JsonValue) {
        let mut secrets = self.secrets.write().await;
        secrets.insert(secret_name.to_string(), secret.to_string());
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn get_secret_string(&self, secret_name: &str) -> Result<String> {
        let secrets = self.secrets.read().await;
        secrets
            .get(secret_name)
            .cloned()
            .ok_or_else(|| CoreError::Secret(format!("Secret not found: {}", secret_name)))
    }
}

/// Helper for reading keys out of one named JSON secret
#[derive(Clone)]
pub struct SecretsHelper {
    secret_name: String,
    store: Arc<dyn SecretStore>,
}

impl SecretsHelper {
    pub fn new(secret_name: impl Into<String>, store: Arc<dyn SecretStore>) -> Self {
        Self {
            secret_name: secret_name.into(),
            store,
        }
    }

    pub fn secret_name(&self) -> &str {
        &self.secret_name
    }

    /// Fetch and parse the whole secret
    pub async fn get_secret_json(&self) -> Result<Map<String, JsonValue>> {
        let secret_string = self
            .store
            .get_secret_string(&self.secret_name)
            .await
            .inspect_err(|e| error!("Error in pulling the secret: {}: {}", self.secret_name, e))?;
        info!("Successfully retrieved the secret: {}", self.secret_name);

        let secret: Map<String, JsonValue> = serde_json::from_str(&secret_string)?;
        debug!("Successfully obtained the secret string value.");
        Ok(secret)
    }

    /// Obtain one key of the secret; a missing key is an error
    pub async fn get_secret_value(&self, key_name: &str) -> Result<String> {
        let secret = self.get_secret_json().await?;
        match secret.get(key_name) {
            Some(JsonValue::String(s)) => Ok(s.clone()),
            Some(value) => Ok(value.to_string()),
            None => Err(CoreError::SecretKeyNotFound {
                secret: self.secret_name.clone(),
                key: key_name.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_secret_value() {
        let store = InMemorySecretStore::new();
        store
            .insert("chatbot", &json!({"META_TOKEN": "token-123", "RETRIES": 3}))
            .await;

        let helper = SecretsHelper::new("chatbot", Arc::new(store));
        assert_eq!(helper.get_secret_value("META_TOKEN").await.unwrap(), "token-123");
        assert_eq!(helper.get_secret_value("RETRIES").await.unwrap(), "3");
    }

    #[tokio::test]
    async fn test_missing_key_is_error() {
        let store = InMemorySecretStore::new();
        store.insert("chatbot", &json!({"META_TOKEN": "x"})).await;

        let helper = SecretsHelper::new("chatbot", Arc::new(store));
        let err = helper.get_secret_value("AWS_API_KEY_TOKEN").await.unwrap_err();
        assert!(matches!(err, CoreError::SecretKeyNotFound { .. }));
    }

    #[tokio::test]
    async fn test_missing_secret_is_error() {
        let helper = SecretsHelper::new("nope", Arc::new(InMemorySecretStore::new()));
        assert!(matches!(
            helper.get_secret_value("META_TOKEN").await,
            Err(CoreError::Secret(_))
        ));
    }

    #[tokio::test]
    async fn test_file_secret_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secrets.json");
        std::fs::write(
            &path,
            r#"{"chatbot": {"AWS_API_KEY_TOKEN": "verify-me"}, "plain": "{\"A\": \"b\"}"}"#,
        )
        .unwrap();

        let store = Arc::new(FileSecretStore::new(&path));
        let helper = SecretsHelper::new("chatbot", store.clone());
        assert_eq!(
            helper.get_secret_value("AWS_API_KEY_TOKEN").await.unwrap(),
            "verify-me"
        );

        let plain = SecretsHelper::new("plain", store);
        assert_eq!(plain.get_secret_value("A").await.unwrap(), "b");
    }
}
