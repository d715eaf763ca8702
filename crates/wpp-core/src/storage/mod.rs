//! Key-value table storage
//!
//! Provides the single-table item model, the [`TableStore`] trait, a SQLite
//! implementation and the change stream emitted on writes.

mod item;
mod sqlite;
mod store;
mod stream;

pub use item::{
    item_from_json, require_string_attr, string_attr, AttributeValue, Item, PrimaryKey, PK, SK,
};
pub use sqlite::SqliteTableStore;
pub use store::{QueryPage, TableStore, QUERY_PAGE_LIMIT};
pub use stream::{
    change_stream, Delivery, RedrivePolicy, StreamConsumer, StreamData, StreamEventName,
    StreamReceiver, StreamRecord, StreamSender,
};
