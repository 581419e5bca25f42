//! The producing node.

use std::sync::Arc;

use bytes::Bytes;
use diffsync_cache::ProducerCache;
use diffsync_core::{Codec, DataMsg, Document, EntryKey};
use diffsync_stream::{
    shared_producer, Broadcast, CorrelationId, PubSubMsg, RequestServer, Responder, SharedProducer,
};
use serde_json::Value;
use tokio::sync::{watch, Mutex};

use crate::config::NodeConfig;
use crate::error::Result;
use crate::stats::UtilizationStats;

/// Owns the authoritative cache and both producer-side channels.
///
/// Writes go out on the shared topic with an empty correlation id.
/// Retransmission requests are served by [`serve_retransmissions`], usually
/// on its own task:
///
/// ```rust,no_run
/// # use std::sync::Arc;
/// # use diffsync::{NodeConfig, Publisher};
/// # use diffsync::stream::MemoryBus;
/// # async fn example() -> diffsync::Result<()> {
/// let bus = MemoryBus::new();
/// let publisher = Arc::new(Publisher::new(
///     bus.publisher(),
///     bus.request_server().await?,
///     NodeConfig::default(),
/// ));
///
/// let (shutdown, rx) = tokio::sync::watch::channel(false);
/// let serving = Arc::clone(&publisher);
/// tokio::spawn(async move { serving.serve_retransmissions(rx).await });
///
/// publisher.update(serde_json::json!({"key": 1, "a": 1})).await?;
/// let _ = shutdown.send(true);
/// # Ok(())
/// # }
/// ```
///
/// [`serve_retransmissions`]: Publisher::serve_retransmissions
pub struct Publisher<B: Broadcast, S: RequestServer> {
    producer: SharedProducer,
    broadcast: Arc<B>,
    responder: Responder<B, S>,
    topic: String,
    codec: Codec,
    stats: Mutex<UtilizationStats>,
}

impl<B: Broadcast, S: RequestServer> Publisher<B, S> {
    pub fn new(broadcast: B, server: S, config: NodeConfig) -> Self {
        let producer = shared_producer(ProducerCache::new(config.cache));
        let broadcast = Arc::new(broadcast);
        let responder = Responder::new(
            Arc::clone(&producer),
            Arc::clone(&broadcast),
            server,
            config.codec,
        );

        Self {
            producer,
            broadcast,
            responder,
            topic: config.topic,
            codec: config.codec,
            stats: Mutex::new(UtilizationStats::new(config.stats)),
        }
    }

    /// The producer cache, shared with the responder.
    pub fn producer(&self) -> &SharedProducer {
        &self.producer
    }

    /// Store a full document and broadcast the change.
    pub async fn update(&self, document: impl Into<Document>) -> Result<DataMsg> {
        let document = document.into();
        // Held across publish so a retransmission cannot overtake the diff.
        let mut producer = self.producer.lock().await;
        let msg = producer.update(Arc::clone(&document))?;
        self.publish(&msg, Some(document.as_ref())).await?;
        Ok(msg)
    }

    /// Remove a key and broadcast the removal.
    pub async fn delete(&self, key: &EntryKey) -> Result<DataMsg> {
        let mut producer = self.producer.lock().await;
        let msg = producer.delete(key)?;
        self.publish(&msg, None).await?;
        Ok(msg)
    }

    /// Answer retransmission requests until `shutdown` fires.
    pub async fn serve_retransmissions(&self, shutdown: watch::Receiver<bool>) -> Result<()> {
        tracing::info!(topic = %self.topic, "serving retransmissions");
        self.responder.run(shutdown).await?;
        Ok(())
    }

    /// A copy of the utilization figures.
    pub async fn stats(&self) -> UtilizationStats {
        self.stats.lock().await.clone()
    }

    async fn publish(&self, msg: &DataMsg, original: Option<&Value>) -> Result<()> {
        let payload = self.codec.encode(msg)?;
        let sent = payload.len();

        let broadcast = PubSubMsg::new(self.topic.as_str(), CorrelationId::empty(), Bytes::from(payload));
        self.broadcast.publish(broadcast.to_frames()).await?;
        tracing::debug!(%msg, bytes = sent, "published");

        self.stats
            .lock()
            .await
            .transmitted(sent, original, msg.cmd, &msg.key);
        Ok(())
    }
}
