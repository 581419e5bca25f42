//! Transport abstraction for the diff stream.
//!
//! Two channel shapes carry the protocol: a publish/subscribe fan-out for
//! broadcast envelopes and a request/response pair for control envelopes.
//! Both move raw multipart [`Frames`]; encoding lives in [`crate::messages`].

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::messages::Frames;

/// Sending side of the publish/subscribe channel.
///
/// The first frame is the topic.
#[async_trait]
pub trait Broadcast: Send + Sync {
    /// Deliver `frames` to every subscriber whose filter matches the topic.
    async fn publish(&self, frames: Frames) -> Result<()>;
}

/// Receiving side of the publish/subscribe channel.
#[async_trait]
pub trait Subscription: Send + Sync {
    /// Add a topic filter. A filter matches every topic it is a prefix of.
    async fn subscribe(&self, topic: &str) -> Result<()>;

    /// Receive the next matching message.
    async fn recv(&self) -> Result<Frames>;

    /// Receive with timeout.
    ///
    /// Returns None if timeout expires before a message arrives.
    async fn recv_timeout(&self, timeout: Duration) -> Result<Option<Frames>>;
}

/// Requesting side of the control channel.
#[async_trait]
pub trait RequestClient: Send + Sync {
    /// Send a request and wait for its reply.
    async fn request(&self, frames: Frames) -> Result<Frames>;
}

/// Replying side of the control channel.
///
/// Requests and replies strictly alternate: every [`recv_request`] must be
/// answered by one [`send_reply`] before the next request is taken.
///
/// [`recv_request`]: RequestServer::recv_request
/// [`send_reply`]: RequestServer::send_reply
#[async_trait]
pub trait RequestServer: Send + Sync {
    /// Wait for the next request.
    async fn recv_request(&self) -> Result<Frames>;

    /// Answer the pending request.
    async fn send_reply(&self, frames: Frames) -> Result<()>;
}

/// A simple in-memory bus for testing.
///
/// Uses channels to simulate both sockets inside one process.
pub mod memory {
    use super::*;
    use std::sync::Arc;

    use tokio::sync::{mpsc, oneshot, Mutex, RwLock};

    use crate::error::StreamError;

    /// A request waiting for its reply.
    type Pending = (Frames, oneshot::Sender<Frames>);

    struct SubscriberSlot {
        filters: Arc<RwLock<Vec<String>>>,
        sender: mpsc::Sender<Frames>,
    }

    /// Shared state for the in-memory bus.
    pub struct MemoryBus {
        /// Registered subscribers.
        subscribers: RwLock<Vec<SubscriberSlot>>,
        /// Entry to the control channel.
        requests: mpsc::Sender<Pending>,
        /// Exit of the control channel, taken by the single server.
        server_side: Mutex<Option<mpsc::Receiver<Pending>>>,
    }

    impl MemoryBus {
        /// Create a new bus.
        pub fn new() -> Arc<Self> {
            let (requests, rx) = mpsc::channel(64);
            Arc::new(Self {
                subscribers: RwLock::new(Vec::new()),
                requests,
                server_side: Mutex::new(Some(rx)),
            })
        }

        /// Create a publisher on this bus.
        pub fn publisher(self: &Arc<Self>) -> MemoryPublisher {
            MemoryPublisher {
                bus: Arc::clone(self),
            }
        }

        /// Create a subscriber with no filters.
        ///
        /// Only messages published after this call are seen.
        pub async fn subscriber(self: &Arc<Self>) -> MemorySubscriber {
            let (tx, rx) = mpsc::channel(1000);
            let filters = Arc::new(RwLock::new(Vec::new()));

            self.subscribers.write().await.push(SubscriberSlot {
                filters: Arc::clone(&filters),
                sender: tx,
            });

            MemorySubscriber {
                filters,
                receiver: Mutex::new(rx),
            }
        }

        /// Create a request client on this bus.
        pub fn request_client(self: &Arc<Self>) -> MemoryRequestClient {
            MemoryRequestClient {
                requests: self.requests.clone(),
                in_flight: Mutex::new(()),
            }
        }

        /// Bind the request server. Only one server may bind.
        pub async fn request_server(self: &Arc<Self>) -> Result<MemoryRequestServer> {
            let receiver = self
                .server_side
                .lock()
                .await
                .take()
                .ok_or_else(|| StreamError::Transport("request server already bound".into()))?;
            Ok(MemoryRequestServer {
                receiver: Mutex::new(receiver),
                pending: Mutex::new(None),
            })
        }
    }

    /// Publishing half of the bus.
    pub struct MemoryPublisher {
        bus: Arc<MemoryBus>,
    }

    #[async_trait]
    impl Broadcast for MemoryPublisher {
        async fn publish(&self, frames: Frames) -> Result<()> {
            let topic = frames
                .first()
                .cloned()
                .ok_or_else(|| StreamError::Transport("message has no topic frame".into()))?;

            let subscribers = self.bus.subscribers.read().await;
            for slot in subscribers.iter() {
                let matched = slot
                    .filters
                    .read()
                    .await
                    .iter()
                    .any(|filter| topic.starts_with(filter.as_bytes()));
                if matched {
                    // Ignore errors for broadcast (subscribers may have gone away)
                    let _ = slot.sender.send(frames.clone()).await;
                }
            }
            Ok(())
        }
    }

    /// Subscribing half of the bus.
    pub struct MemorySubscriber {
        filters: Arc<RwLock<Vec<String>>>,
        receiver: Mutex<mpsc::Receiver<Frames>>,
    }

    #[async_trait]
    impl Subscription for MemorySubscriber {
        async fn subscribe(&self, topic: &str) -> Result<()> {
            let mut filters = self.filters.write().await;
            if !filters.iter().any(|f| f == topic) {
                filters.push(topic.to_owned());
            }
            Ok(())
        }

        async fn recv(&self) -> Result<Frames> {
            let mut rx = self.receiver.lock().await;
            rx.recv()
                .await
                .ok_or_else(|| StreamError::Transport("channel closed".into()))
        }

        async fn recv_timeout(&self, timeout: Duration) -> Result<Option<Frames>> {
            let mut rx = self.receiver.lock().await;
            match tokio::time::timeout(timeout, rx.recv()).await {
                Ok(Some(frames)) => Ok(Some(frames)),
                Ok(None) => Err(StreamError::Transport("channel closed".into())),
                Err(_) => Ok(None), // Timeout
            }
        }
    }

    /// Requesting half of the control channel.
    pub struct MemoryRequestClient {
        requests: mpsc::Sender<Pending>,
        /// One request in flight at a time.
        in_flight: Mutex<()>,
    }

    #[async_trait]
    impl RequestClient for MemoryRequestClient {
        async fn request(&self, frames: Frames) -> Result<Frames> {
            let _guard = self.in_flight.lock().await;
            let (tx, rx) = oneshot::channel();
            self.requests
                .send((frames, tx))
                .await
                .map_err(|_| StreamError::Transport("request server gone".into()))?;
            rx.await
                .map_err(|_| StreamError::Transport("request dropped without reply".into()))
        }
    }

    /// Replying half of the control channel.
    pub struct MemoryRequestServer {
        receiver: Mutex<mpsc::Receiver<Pending>>,
        pending: Mutex<Option<oneshot::Sender<Frames>>>,
    }

    #[async_trait]
    impl RequestServer for MemoryRequestServer {
        async fn recv_request(&self) -> Result<Frames> {
            if self.pending.lock().await.is_some() {
                return Err(StreamError::Transport(
                    "previous request not answered".into(),
                ));
            }
            let mut rx = self.receiver.lock().await;
            let (frames, reply) = rx
                .recv()
                .await
                .ok_or_else(|| StreamError::Transport("channel closed".into()))?;
            *self.pending.lock().await = Some(reply);
            Ok(frames)
        }

        async fn send_reply(&self, frames: Frames) -> Result<()> {
            let reply = self
                .pending
                .lock()
                .await
                .take()
                .ok_or_else(|| StreamError::Transport("no request to answer".into()))?;
            reply
                .send(frames)
                .map_err(|_| StreamError::Transport("requester disconnected".into()))
        }
    }
}
