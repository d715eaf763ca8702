//! Table store trait

use async_trait::async_trait;
use tracing::info;

use crate::error::Result;
use crate::storage::item::{Item, PrimaryKey};

/// Page size used when paginating prefix queries
pub const QUERY_PAGE_LIMIT: usize = 50;

/// One page of query results
#[derive(Debug, Clone, Default)]
pub struct QueryPage {
    pub items: Vec<Item>,
    /// Set when more results may follow; pass it back as the exclusive start key
    pub last_evaluated_key: Option<PrimaryKey>,
}

/// Key-value table with a composite (`PK`, `SK`) primary key
#[async_trait]
pub trait TableStore: Send + Sync {
    /// Name of the table
    fn table_name(&self) -> &str;

    /// Write a single item, replacing any item with the same key
    async fn put_item(&self, item: Item) -> Result<()>;

    /// Get a single item by its primary key
    async fn get_item_by_pk_and_sk(&self, partition_key: &str, sort_key: &str)
        -> Result<Option<Item>>;

    /// Query one page of items under a partition key whose sort key starts
    /// with `sort_key_portion`, in ascending sort-key order
    async fn query_page(
        &self,
        partition_key: &str,
        sort_key_portion: &str,
        limit: usize,
        exclusive_start_key: Option<&PrimaryKey>,
    ) -> Result<QueryPage>;

    /// Query every item under a partition key with a sort-key prefix,
    /// following pagination until the last page
    async fn query_by_pk_and_sk_begins_with(
        &self,
        partition_key: &str,
        sort_key_portion: &str,
    ) -> Result<Vec<Item>> {
        info!(
            "Starting query_by_pk_and_sk_begins_with with pk: ({}) and sk: ({})",
            partition_key, sort_key_portion
        );

        let mut all_items = Vec::new();
        let mut page = self
            .query_page(partition_key, sort_key_portion, QUERY_PAGE_LIMIT, None)
            .await?;
        all_items.append(&mut page.items);

        while let Some(start_key) = page.last_evaluated_key.take() {
            page = self
                .query_page(
                    partition_key,
                    sort_key_portion,
                    QUERY_PAGE_LIMIT,
                    Some(&start_key),
                )
                .await?;
            all_items.append(&mut page.items);
        }

        Ok(all_items)
    }
}
