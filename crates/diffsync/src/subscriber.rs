//! The consuming node.

use std::collections::HashMap;
use std::time::Duration;

use diffsync_cache::{Applied, ApplyError, ConsumerCache};
use diffsync_core::{Codec, Command, EntryKey, ProtocolError};
use diffsync_stream::{
    CorrelationId, PubSubMsg, RequestClient, Requester, RequesterId, Subscription,
};
use tokio::sync::watch;

use crate::config::NodeConfig;
use crate::error::Result;

/// What processing one broadcast led to.
#[derive(Debug)]
pub enum Outcome {
    /// The envelope was applied.
    Applied(Applied),
    /// The mirror diverged; a retransmission was requested.
    ///
    /// `correlation_id` is `None` when the request was rejected or timed
    /// out. The next update for the key will fault again and retry.
    Resync {
        fault: ApplyError,
        correlation_id: Option<CorrelationId>,
    },
    /// The envelope was refused without affecting the mirror.
    Skipped(ApplyError),
    /// The broadcast could not be decoded.
    Undecodable(ProtocolError),
}

/// Owns a mirror cache and the consumer-side channels.
///
/// Subscribes to the shared topic and to its own requester id, which is
/// where retransmissions for it arrive.
pub struct Subscriber<S: Subscription, C: RequestClient> {
    consumer: ConsumerCache,
    subscription: S,
    requester: Requester<C>,
    codec: Codec,
    /// Outstanding retransmissions by correlation id.
    pending: HashMap<CorrelationId, EntryKey>,
}

impl<S: Subscription, C: RequestClient> Subscriber<S, C> {
    /// Create a subscriber with a fresh requester id and subscribe it.
    pub async fn connect(subscription: S, client: C, config: NodeConfig) -> Result<Self> {
        let requester_id = RequesterId::random();
        subscription.subscribe(&config.topic).await?;
        subscription.subscribe(requester_id.as_str()).await?;
        tracing::info!(topic = %config.topic, requester = %requester_id, "subscribed");

        Ok(Self {
            consumer: ConsumerCache::new(config.cache),
            subscription,
            requester: Requester::new(client, requester_id, config.retransmit),
            codec: config.codec,
            pending: HashMap::new(),
        })
    }

    pub fn requester_id(&self) -> &RequesterId {
        self.requester.requester_id()
    }

    /// The mirror.
    pub fn consumer(&self) -> &ConsumerCache {
        &self.consumer
    }

    /// Keys with a retransmission requested but not yet received.
    pub fn pending(&self) -> impl Iterator<Item = &EntryKey> {
        self.pending.values()
    }

    /// Decode and apply one broadcast.
    ///
    /// Desync faults trigger a retransmission request for the key. Only
    /// transport failures are returned as errors.
    pub async fn process(&mut self, msg: &PubSubMsg) -> Result<Outcome> {
        let data = match self.codec.decode(&msg.payload) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(topic = %msg.topic, error = %e, "dropping undecodable broadcast");
                return Ok(Outcome::Undecodable(e));
            }
        };

        if !msg.correlation_id.is_empty() && self.pending.remove(&msg.correlation_id).is_none() {
            tracing::debug!(cid = %msg.correlation_id, "unsolicited retransmission");
        }
        // A full document or a removal settles any repair still waiting.
        if matches!(data.cmd, Command::New | Command::Retran | Command::Delete) {
            self.forget(&data.key);
        }

        let fault = match self.consumer.apply(&data) {
            Ok(applied) => return Ok(Outcome::Applied(applied)),
            Err(fault) => fault,
        };

        if !fault.is_desync() {
            if fault.is_benign() {
                tracing::debug!(%fault, "nothing to apply");
            } else {
                tracing::warn!(%fault, "envelope refused");
            }
            return Ok(Outcome::Skipped(fault));
        }

        let key = data.key.clone();
        self.forget(&key);
        match self.requester.request(&key).await {
            Ok(correlation_id) => {
                self.pending.insert(correlation_id.clone(), key);
                Ok(Outcome::Resync {
                    fault,
                    correlation_id: Some(correlation_id),
                })
            }
            Err(e) if e.is_transient() => {
                tracing::warn!(key = %key, error = %e, "retransmission request failed");
                Ok(Outcome::Resync {
                    fault,
                    correlation_id: None,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Receive and process the next broadcast, waiting at most `timeout`.
    pub async fn poll(&mut self, timeout: Duration) -> Result<Option<Outcome>> {
        match self.subscription.recv_timeout(timeout).await? {
            Some(frames) => self.process_frames(&frames).await.map(Some),
            None => Ok(None),
        }
    }

    /// Process broadcasts until `shutdown` turns true or its sender is
    /// dropped.
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                frames = self.subscription.recv() => {
                    let frames = frames?;
                    self.process_frames(&frames).await?;
                }
            }
        }
        tracing::debug!(requester = %self.requester_id(), "subscriber stopped");
        Ok(())
    }

    /// Drop outstanding retransmissions for `key`.
    fn forget(&mut self, key: &EntryKey) {
        self.pending.retain(|_, pending| pending != key);
    }

    async fn process_frames(&mut self, frames: &[bytes::Bytes]) -> Result<Outcome> {
        match PubSubMsg::from_frames(frames) {
            Ok(msg) => self.process(&msg).await,
            Err(e) => {
                tracing::warn!(error = %e, "dropping malformed broadcast");
                Ok(Outcome::Undecodable(e))
            }
        }
    }
}
