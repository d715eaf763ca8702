//! Seed data loading
//!
//! Writes a JSON array of plain items (`{"PK": "...", "SK": "...", ...}`) to
//! a table.

use std::path::Path;

use anyhow::Context;
use serde_json::Value as JsonValue;
use tracing::info;

use wpp_core::storage::item_from_json;
use wpp_core::TableStore;

/// Load every item of `path` into `store`, returning how many were written
pub async fn load_data(store: &dyn TableStore, path: &Path) -> anyhow::Result<usize> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let value: JsonValue = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;
    let rows = value
        .as_array()
        .ok_or_else(|| anyhow::anyhow!("{} must hold a JSON array of items", path.display()))?;

    for (index, row) in rows.iter().enumerate() {
        let item = item_from_json(row).with_context(|| format!("Invalid item at index {}", index))?;
        store.put_item(item).await?;
    }

    info!("Loaded {} items into {}", rows.len(), store.table_name());
    Ok(rows.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wpp_core::SqliteTableStore;

    fn data_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[tokio::test]
    async fn test_load_todos_and_contacts() {
        let store = SqliteTableStore::in_memory("wpp-agents-data").unwrap();
        let file = data_file(
            r#"[
                {"PK": "USER#san99tiago@gmail.com", "SK": "TODO#1", "todo_details": "Buy milk"},
                {"PK": "USER#san99tiago@gmail.com", "SK": "TODO#2", "todo_details": "Call mom"},
                {"PK": "USER#san99tiago@gmail.com", "SK": "CONTACT#1", "contact_details": "Ana"},
                {"PK": "USER#san99tiago@gmail.com", "SK": "DATE#2024-06-01", "events": ["gym"]}
            ]"#,
        );

        assert_eq!(load_data(&store, file.path()).await.unwrap(), 4);
        let todos = store
            .query_by_pk_and_sk_begins_with("USER#san99tiago@gmail.com", "TODO#")
            .await
            .unwrap();
        assert_eq!(todos.len(), 2);
    }

    #[tokio::test]
    async fn test_rejects_non_array() {
        let store = SqliteTableStore::in_memory("wpp-agents-data").unwrap();
        let file = data_file(r#"{"PK": "USER#x", "SK": "TODO#1"}"#);
        assert!(load_data(&store, file.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_item_without_key() {
        let store = SqliteTableStore::in_memory("wpp-agents-data").unwrap();
        let file = data_file(r#"[{"todo_details": "no key"}]"#);
        let err = load_data(&store, file.path()).await.unwrap_err();
        assert!(err.to_string().contains("index 0"));
    }
}
