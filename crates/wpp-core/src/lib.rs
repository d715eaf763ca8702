//! wpp-core: WhatsApp chatbot core library
//!
//! Configuration, error types, the message model, key-value table storage
//! with its change stream, and the secret and parameter stores shared by the
//! other wpp-* crates.

pub mod config;
pub mod error;
pub mod models;
pub mod parameters;
pub mod secrets;
pub mod storage;

pub use config::{
    AgentConfig, ApiConfig, Config, MetaConfig, SecretsConfig, StorageConfig,
    WorkflowConfig,
};
pub use error::{CoreError, Result};
pub use models::{prefix, MessageContent, MessageItem, MessageType, NewMessage};
pub use parameters::{LocalParameterStore, ParameterStore};
pub use secrets::{FileSecretStore, InMemorySecretStore, SecretStore, SecretsHelper};
pub use storage::{
    AttributeValue, Item, PrimaryKey, SqliteTableStore, StreamRecord, TableStore,
};
