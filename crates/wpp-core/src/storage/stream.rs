//! Change stream records
//!
//! Every successful write to a streaming table emits one [`StreamRecord`]
//! carrying the new image of the row. A [`StreamConsumer`] reads the stream
//! and redelivers records its handler rejected, up to a [`RedrivePolicy`].

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{error, warn};

use crate::error::Result;
use crate::storage::item::{string_attr, Item, PrimaryKey};

/// Sending half of a change stream
pub type StreamSender = mpsc::UnboundedSender<StreamRecord>;
/// Receiving half of a change stream
pub type StreamReceiver = mpsc::UnboundedReceiver<StreamRecord>;

/// Create a new change stream channel
pub fn change_stream() -> (StreamSender, StreamReceiver) {
    mpsc::unbounded_channel()
}

/// Kind of change that produced a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamEventName {
    Insert,
    Modify,
    Remove,
}

/// Change data of a record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamData {
    #[serde(rename = "ApproximateCreationDateTime")]
    pub approximate_creation_date_time: i64,

    #[serde(rename = "Keys")]
    pub keys: Item,

    #[serde(rename = "NewImage", default)]
    pub new_image: Item,

    #[serde(rename = "SequenceNumber")]
    pub sequence_number: String,

    #[serde(rename = "StreamViewType")]
    pub stream_view_type: String,
}

/// One change stream record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamRecord {
    #[serde(rename = "eventID")]
    pub event_id: String,

    #[serde(rename = "eventName")]
    pub event_name: StreamEventName,

    #[serde(rename = "eventSource")]
    pub event_source: String,

    #[serde(rename = "eventSourceARN")]
    pub event_source_arn: String,

    pub dynamodb: StreamData,
}

impl StreamRecord {
    /// Build a NEW_IMAGE record for a written item
    pub fn new_image(
        table_name: &str,
        event_name: StreamEventName,
        key: &PrimaryKey,
        new_image: Item,
        sequence_number: u64,
    ) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().simple().to_string(),
            event_name,
            event_source: "wpp:table".to_string(),
            event_source_arn: format!("table/{}/stream", table_name),
            dynamodb: StreamData {
                approximate_creation_date_time: chrono::Utc::now().timestamp(),
                keys: key.to_item(),
                new_image,
                sequence_number: format!("{:021}", sequence_number),
                stream_view_type: "NEW_IMAGE".to_string(),
            },
        }
    }

    /// String attribute of the new image
    pub fn new_image_string(&self, name: &str) -> Option<&str> {
        string_attr(&self.dynamodb.new_image, name)
    }

    /// The raw JSON form handed to workflow executions
    pub fn to_raw_event(&self) -> Result<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Redelivery limits for rejected records
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedrivePolicy {
    /// Deliveries per record, the first one included
    pub max_attempts: u32,
    /// Delay before the first redelivery; doubles on each further attempt
    pub backoff: Duration,
}

impl Default for RedrivePolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

impl RedrivePolicy {
    fn delay(&self, attempt: u32) -> Duration {
        self.backoff
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
    }
}

/// One delivery of a record
#[derive(Debug, Clone)]
pub struct Delivery {
    pub record: StreamRecord,
    /// 1 on first delivery
    pub attempt: u32,
}

/// Reads a change stream, redelivering rejected records
///
/// Rejected records are redelivered before newer ones, so a failing record
/// holds back the rest of the stream until it succeeds or is dropped.
pub struct StreamConsumer {
    receiver: StreamReceiver,
    policy: RedrivePolicy,
    pending: VecDeque<(Instant, Delivery)>,
}

impl StreamConsumer {
    pub fn new(receiver: StreamReceiver, policy: RedrivePolicy) -> Self {
        Self {
            receiver,
            policy,
            pending: VecDeque::new(),
        }
    }

    /// Next delivery; `None` once the stream is closed and nothing is pending
    pub async fn next(&mut self) -> Option<Delivery> {
        if let Some((ready_at, delivery)) = self.pending.pop_front() {
            tokio::time::sleep_until(ready_at).await;
            return Some(delivery);
        }

        let record = self.receiver.recv().await?;
        Some(Delivery { record, attempt: 1 })
    }

    /// Hand a rejected delivery back to the stream
    ///
    /// Returns false when the record has used up its attempts and is dropped.
    pub fn redeliver(&mut self, delivery: Delivery) -> bool {
        if delivery.attempt >= self.policy.max_attempts {
            error!(
                "Dropping stream record {} after {} attempts",
                delivery.record.event_id, delivery.attempt
            );
            return false;
        }

        let delay = self.policy.delay(delivery.attempt);
        warn!(
            "Redelivering stream record {} in {:?} (attempt {} of {})",
            delivery.record.event_id,
            delay,
            delivery.attempt + 1,
            self.policy.max_attempts
        );
        self.pending.push_back((
            Instant::now() + delay,
            Delivery {
                record: delivery.record,
                attempt: delivery.attempt + 1,
            },
        ));
        true
    }

    /// Records waiting for redelivery
    pub fn pending(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::item::AttributeValue;

    fn record() -> StreamRecord {
        let key = PrimaryKey::new("NUMBER#12345678987", "MESSAGE#2024-06-19T03:41:42Z");
        StreamRecord::new_image("messages", StreamEventName::Insert, &key, key.to_item(), 1)
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RedrivePolicy {
            max_attempts: 4,
            backoff: Duration::from_millis(100),
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_consumer_redelivers_until_limit() {
        let (tx, rx) = change_stream();
        let mut consumer = StreamConsumer::new(
            rx,
            RedrivePolicy {
                max_attempts: 3,
                backoff: Duration::ZERO,
            },
        );
        let sent = record();
        tx.send(sent.clone()).unwrap();
        drop(tx);

        let mut attempts = Vec::new();
        while let Some(delivery) = consumer.next().await {
            assert_eq!(delivery.record, sent);
            attempts.push(delivery.attempt);
            consumer.redeliver(delivery);
        }

        assert_eq!(attempts, vec![1, 2, 3]);
        assert_eq!(consumer.pending(), 0);
    }

    #[tokio::test]
    async fn test_redelivery_precedes_newer_records() {
        let (tx, rx) = change_stream();
        let mut consumer = StreamConsumer::new(
            rx,
            RedrivePolicy {
                max_attempts: 2,
                backoff: Duration::ZERO,
            },
        );
        let first = record();
        let second = record();
        tx.send(first.clone()).unwrap();
        tx.send(second.clone()).unwrap();

        let delivery = consumer.next().await.unwrap();
        assert!(consumer.redeliver(delivery));

        let again = consumer.next().await.unwrap();
        assert_eq!(again.record.event_id, first.event_id);
        assert_eq!(again.attempt, 2);
        assert!(!consumer.redeliver(again));

        let next = consumer.next().await.unwrap();
        assert_eq!(next.record.event_id, second.event_id);
        assert_eq!(next.attempt, 1);
    }

    #[test]
    fn test_raw_event_shape() {
        let key = PrimaryKey::new("NUMBER#12345678987", "MESSAGE#2024-06-19T03:41:42Z");
        let mut image = key.to_item();
        image.insert("type".to_string(), AttributeValue::s("text"));

        let record = StreamRecord::new_image("messages", StreamEventName::Insert, &key, image, 7);
        let raw = record.to_raw_event().unwrap();

        assert_eq!(raw["eventName"], "INSERT");
        assert_eq!(raw["dynamodb"]["NewImage"]["type"]["S"], "text");
        assert_eq!(raw["dynamodb"]["Keys"]["PK"]["S"], "NUMBER#12345678987");
        assert_eq!(raw["dynamodb"]["StreamViewType"], "NEW_IMAGE");
        assert_eq!(raw["dynamodb"]["SequenceNumber"], "000000000000000000007");
        assert_eq!(record.new_image_string("type"), Some("text"));
    }
}
