//! Retransmission handshake.
//!
//! The [`Requester`] runs on the consumer side and asks for a key; the
//! [`Responder`] runs beside the producer, answers `ACK`/`NACK` and
//! broadcasts the full document on the requester's private topic.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use diffsync_cache::ProducerCache;
use diffsync_core::{Codec, Command, EntryKey};
use tokio::sync::{watch, Mutex};

use crate::error::{Result, StreamError};
use crate::messages::{CorrelationId, Frames, PubSubMsg, ReqResMsg, RequesterId};
use crate::transport::{Broadcast, RequestClient, RequestServer};

/// Producer cache shared by the publishing path and the responder.
pub type SharedProducer = Arc<Mutex<ProducerCache>>;

/// Wrap a producer cache for sharing.
pub fn shared_producer(producer: ProducerCache) -> SharedProducer {
    Arc::new(Mutex::new(producer))
}

/// Configuration for retransmission requests.
#[derive(Debug, Clone)]
pub struct RetransmitConfig {
    /// How long to wait for `ACK`/`NACK`.
    pub request_timeout: Duration,
}

impl Default for RetransmitConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// Consumer side of the handshake.
pub struct Requester<C: RequestClient> {
    client: C,
    requester_id: RequesterId,
    config: RetransmitConfig,
}

impl<C: RequestClient> Requester<C> {
    pub fn new(client: C, requester_id: RequesterId, config: RetransmitConfig) -> Self {
        Self {
            client,
            requester_id,
            config,
        }
    }

    /// The id whose private topic receives retransmissions.
    pub fn requester_id(&self) -> &RequesterId {
        &self.requester_id
    }

    /// Ask for a full re-send of `key`.
    ///
    /// Returns the correlation id the retransmitted broadcast will carry.
    /// The document itself arrives later on the private topic.
    pub async fn request(&self, key: &EntryKey) -> Result<CorrelationId> {
        let request = ReqResMsg::retran(&self.requester_id, key);
        tracing::debug!(%request, "requesting retransmission");

        let reply = tokio::time::timeout(
            self.config.request_timeout,
            self.client.request(request.to_frames()),
        )
        .await
        .map_err(|_| {
            StreamError::Timeout(format!(
                "no reply to retransmission request for {key} after {:?}",
                self.config.request_timeout
            ))
        })??;
        let reply = ReqResMsg::from_frames(&reply)?;

        let correlation_id = request.correlation_id;
        match reply.cmd {
            Command::Ack if reply.correlation_id == correlation_id => Ok(correlation_id),
            Command::Nack if reply.correlation_id == correlation_id => Err(StreamError::Rejected {
                correlation_id: reply.correlation_id.to_string(),
            }),
            got => Err(StreamError::UnexpectedReply {
                got,
                correlation_id: reply.correlation_id.to_string(),
            }),
        }
    }
}

/// Producer side of the handshake.
pub struct Responder<B: Broadcast, S: RequestServer> {
    producer: SharedProducer,
    broadcast: Arc<B>,
    server: S,
    codec: Codec,
}

impl<B: Broadcast, S: RequestServer> Responder<B, S> {
    pub fn new(producer: SharedProducer, broadcast: Arc<B>, server: S, codec: Codec) -> Self {
        Self {
            producer,
            broadcast,
            server,
            codec,
        }
    }

    /// Take one request and handle it.
    pub async fn serve_one(&self) -> Result<Option<PubSubMsg>> {
        let frames = self.server.recv_request().await?;
        self.handle(frames).await
    }

    /// Answer one request, then broadcast the retransmission if it was
    /// accepted.
    ///
    /// Anything other than a well-formed `RETRAN` is answered with `NACK`.
    /// A `RETRAN` is acknowledged before the producer is consulted, so a key
    /// the producer no longer holds gets `ACK` and no broadcast.
    ///
    /// A reply the requester is no longer waiting for is dropped with a
    /// warning, and nothing is broadcast for it.
    pub async fn handle(&self, frames: Frames) -> Result<Option<PubSubMsg>> {
        let request = match ReqResMsg::from_frames(&frames) {
            Ok(request) if request.cmd == Command::Retran => request,
            Ok(request) => {
                tracing::warn!(%request, "rejecting control message");
                self.reply(ReqResMsg::nack(request.correlation_id)).await;
                return Ok(None);
            }
            Err(e) => {
                tracing::warn!(error = %e, "rejecting undecodable request");
                let correlation_id = frames
                    .get(3)
                    .map(|cid| CorrelationId::from(String::from_utf8_lossy(cid).into_owned()))
                    .unwrap_or_default();
                self.reply(ReqResMsg::nack(correlation_id)).await;
                return Ok(None);
            }
        };

        if !self.reply(ReqResMsg::ack(request.correlation_id.clone())).await {
            return Ok(None);
        }
        tracing::info!(key = %request.key, cid = %request.correlation_id, "retransmission accepted");

        let retransmission = self
            .producer
            .lock()
            .await
            .retransmit_raw(request.key.as_bytes());
        let msg = match retransmission {
            Ok(msg) => msg,
            Err(e) => {
                tracing::warn!(%request, error = %e, "nothing to retransmit");
                return Ok(None);
            }
        };

        let payload = Bytes::from(self.codec.encode(&msg)?);
        let broadcast = PubSubMsg::new(
            request.requester_id.as_str(),
            request.correlation_id,
            payload,
        );
        self.broadcast.publish(broadcast.to_frames()).await?;
        tracing::debug!(key = %msg.key, topic = %broadcast.topic, "retransmitted");
        Ok(Some(broadcast))
    }

    /// Serve requests until `shutdown` turns true or its sender is dropped.
    ///
    /// A failure while handling one request is logged and the loop goes on.
    /// Only a closed request channel ends it early.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
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
                frames = self.server.recv_request() => {
                    if let Err(e) = self.handle(frames?).await {
                        tracing::warn!(error = %e, "retransmission failed");
                    }
                }
            }
        }
        tracing::debug!("retransmission responder stopped");
        Ok(())
    }

    /// Send `reply`, reporting whether it was delivered.
    async fn reply(&self, reply: ReqResMsg) -> bool {
        match self.server.send_reply(reply.to_frames()).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(%reply, error = %e, "reply not delivered");
                false
            }
        }
    }
}
