//! Announcing freshly ingested records on a topic.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use tracing::{info, warn};

use crate::record::WeatherSeries;

/// Records announced per ingest run.
pub const ANNOUNCE_LIMIT: usize = 24;

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, message: Bytes) -> Result<()>;
}

/// Publishes to an SNS topic; `topic` is the topic ARN.
pub struct SnsPublisher {
    client: aws_sdk_sns::Client,
}

impl SnsPublisher {
    pub fn new(client: aws_sdk_sns::Client) -> Self {
        Self { client }
    }

    pub async fn from_env() -> Self {
        let config = aws_config::load_from_env().await;
        Self::new(aws_sdk_sns::Client::new(&config))
    }
}

#[async_trait]
impl Publisher for SnsPublisher {
    async fn publish(&self, topic: &str, message: Bytes) -> Result<()> {
        let text = String::from_utf8(message.to_vec()).context("SNS messages must be UTF-8")?;
        self.client
            .publish()
            .topic_arn(topic)
            .message(text)
            .send()
            .await
            .with_context(|| format!("SNS Publish failed for {topic}"))?;
        Ok(())
    }
}

/// Writes messages to the log instead of a broker.
pub struct LogPublisher;

#[async_trait]
impl Publisher for LogPublisher {
    async fn publish(&self, topic: &str, message: Bytes) -> Result<()> {
        info!(topic, message = %String::from_utf8_lossy(&message), "Published");
        Ok(())
    }
}

/// Message text for the record at `index` in the fetched response.
pub fn event_message(index: usize, temperature: Option<f64>) -> String {
    let temp = temperature.map_or_else(|| "nan".to_string(), |t| format!("{t:?}"));
    format!("Weather event {index}: Temp {temp}C")
}

/// Publishes one message for each of the first [`ANNOUNCE_LIMIT`] records.
///
/// `source_index` holds each record's position in the fetched response (see
/// [`crate::normalize::normalize_indexed`]) and numbers the messages.
/// Best effort: the first failure is logged, the remaining messages are
/// skipped and the error is not returned. Returns the number published.
#[tracing::instrument(skip(publisher, series, source_index), fields(records = series.len()))]
pub async fn announce(
    publisher: &dyn Publisher,
    topic: &str,
    series: &WeatherSeries,
    source_index: &[usize],
) -> usize {
    let mut published = 0;

    for (record, &i) in series.iter().zip(source_index).take(ANNOUNCE_LIMIT) {
        let msg = event_message(i, record.temperature_2m);
        if let Err(e) = publisher.publish(topic, Bytes::from(msg)).await {
            warn!(error = %e, published, "Skipping remaining publish messages");
            return published;
        }
        published += 1;
    }

    info!(published, "Records announced");
    published
}
