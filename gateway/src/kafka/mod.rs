/// Job queue client
///
/// One logical producer and one logical consumer for the process lifetime,
/// built once in `main` and injected where needed. Publishing is forced
/// through a single writer; consuming uses manual commits so a message is
/// only acknowledged after downstream processing succeeded.
use anyhow::{anyhow, Context, Result};
use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::ClientConfig;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::config::KafkaConfig;
use crate::models::ProcessingJob;

/// Base reconnect delay, multiplied by the backoff factor.
const CONNECT_BASE_DELAY_SECS: u64 = 1;

/// Once the backoff factor exceeds this, the connection attempt is abandoned
/// and the failure is fatal: the gateway cannot run without its queue.
const CONNECT_BACKOFF_LIMIT: u64 = 64;

const METADATA_PROBE_TIMEOUT: Duration = Duration::from_secs(5);
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// The reconnect schedule: 1s, 2s, 4s, ... capped at the backoff limit.
/// Exhausting this iterator means giving up.
fn connect_backoff_delays() -> impl Iterator<Item = Duration> {
    std::iter::successors(Some(1u64), |factor| factor.checked_mul(2))
        .take_while(|factor| *factor <= CONNECT_BACKOFF_LIMIT)
        .map(|factor| Duration::from_secs(CONNECT_BASE_DELAY_SECS * factor))
}

/// Connection to the message broker, covering publish and consume.
pub struct JobQueue {
    // The producer does not tolerate interleaved writers from concurrent
    // request handlers; every publish goes through this mutex.
    producer: Mutex<FutureProducer>,
    config: KafkaConfig,
}

impl JobQueue {
    /// Connect to the broker with exponential backoff, then assert that the
    /// job topic exists. Failure past the backoff limit propagates up and
    /// aborts startup.
    pub async fn connect(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("message.timeout.ms", "5000")
            .create()
            .context("Failed to create Kafka producer")?;

        Self::probe_with_backoff(&producer, &config.brokers).await?;
        Self::ensure_topic(config, &config.job_topic).await?;

        info!(brokers = %config.brokers, topic = %config.job_topic, "Job queue connected");

        Ok(Self {
            producer: Mutex::new(producer),
            config: config.clone(),
        })
    }

    /// Probe broker metadata until it answers, waiting `1s × factor` between
    /// attempts with the factor doubling from 1; past 64 the error is final.
    async fn probe_with_backoff(producer: &FutureProducer, brokers: &str) -> Result<()> {
        let mut delays = connect_backoff_delays();
        loop {
            let probe = producer.clone();
            let result = tokio::task::spawn_blocking(move || {
                probe
                    .client()
                    .fetch_metadata(None, METADATA_PROBE_TIMEOUT)
                    .map(|_| ())
            })
            .await
            .context("Metadata probe task panicked")?;

            match result {
                Ok(()) => return Ok(()),
                Err(e) => match delays.next() {
                    Some(delay) => {
                        warn!(
                            brokers = %brokers,
                            error = %e,
                            "Broker unreachable, retrying in {}s",
                            delay.as_secs()
                        );
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        return Err(anyhow!(e))
                            .context("Gave up connecting to the message broker");
                    }
                },
            }
        }
    }

    /// Idempotent topic declare: creating a topic that already exists is fine.
    async fn ensure_topic(config: &KafkaConfig, topic: &str) -> Result<()> {
        let admin: AdminClient<DefaultClientContext> = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .create()
            .context("Failed to create Kafka admin client")?;

        let results = admin
            .create_topics(
                &[NewTopic::new(topic, 1, TopicReplication::Fixed(1))],
                &AdminOptions::new(),
            )
            .await
            .context("Topic creation request failed")?;

        for result in results {
            match result {
                Ok(_) => {}
                Err((_, RDKafkaErrorCode::TopicAlreadyExists)) => {}
                Err((name, code)) => {
                    return Err(anyhow!("Failed to create topic '{}': {}", name, code));
                }
            }
        }

        Ok(())
    }

    /// Publish one processing job, keyed by reference. Single-writer: callers
    /// queue on the internal mutex.
    pub async fn publish_job(&self, job: &ProcessingJob) -> Result<()> {
        let payload =
            serde_json::to_string(job).context("Failed to serialize processing job")?;

        let record = FutureRecord::to(&self.config.job_topic)
            .key(&job.reference)
            .payload(&payload);

        let producer = self.producer.lock().await;
        producer
            .send(record, PUBLISH_TIMEOUT)
            .await
            .map_err(|(err, _)| anyhow!("Failed to publish processing job: {}", err))?;

        Ok(())
    }

    /// One durable subscription on the completion topic, with auto-commit off:
    /// the completion handler commits each message only after it was applied.
    pub fn completion_consumer(&self) -> Result<StreamConsumer> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &self.config.brokers)
            .set("group.id", &self.config.group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", "earliest")
            .set("session.timeout.ms", "45000")
            .set("max.poll.interval.ms", "300000")
            .create()
            .context("Failed to create Kafka consumer")?;

        consumer
            .subscribe(&[&self.config.completion_topic])
            .context("Failed to subscribe to completion topic")?;

        Ok(consumer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_schedule() {
        let delays: Vec<u64> = connect_backoff_delays().map(|d| d.as_secs()).collect();
        assert_eq!(delays, vec![1, 2, 4, 8, 16, 32, 64]);
    }

    #[test]
    fn test_backoff_cumulative_wait() {
        // N failures wait 1 + 2 + ... + 2^(N-1) seconds in total.
        let total: u64 = connect_backoff_delays().map(|d| d.as_secs()).sum();
        assert_eq!(total, 127);
    }

    #[test]
    fn test_backoff_gives_up_past_limit() {
        // The factor after 64 would be 128; the schedule must stop before it.
        let last = connect_backoff_delays().last().unwrap();
        assert_eq!(last.as_secs(), CONNECT_BACKOFF_LIMIT);
        assert_eq!(connect_backoff_delays().count(), 7);
    }
}
