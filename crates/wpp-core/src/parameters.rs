//! Parameter store

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{CoreError, Result};

/// Source of named configuration parameters, resolved at call time
#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn get_parameter(&self, name: &str) -> Result<String>;
}

/// Parameter store backed by an in-process map, seeded from configuration
#[derive(Debug, Default, Clone)]
pub struct LocalParameterStore {
    values: Arc<RwLock<HashMap<String, String>>>,
}

impl LocalParameterStore {
    pub fn new(values: HashMap<String, String>) -> Self {
        Self {
            values: Arc::new(RwLock::new(values)),
        }
    }

    /// Set or replace a parameter
    pub async fn put_parameter(&self, name: &str, value: &str) {
        let mut values = self.values.write().await;
        values.insert(name.to_string(), value.to_string());
    }
}

#[async_trait]
impl ParameterStore for LocalParameterStore {
    async fn get_parameter(&self, name: &str) -> Result<String> {
        debug!("Fetching parameter {}", name);
        let values = self.values.read().await;
        values
            .get(name)
            .cloned()
            .ok_or_else(|| CoreError::ParameterNotFound(name.to_string()))
    }
}
