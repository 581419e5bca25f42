//! # Diffsync Stream
//!
//! Delivery and repair for a diff stream: the broadcast envelope, the
//! retransmission control envelope, the transport seams, and the two sides
//! of the retransmission handshake.
//!
//! ## Overview
//!
//! Change envelopes fan out over a publish/subscribe channel. Every consumer
//! subscribes to the shared topic plus a private topic equal to its own
//! [`RequesterId`]. When a consumer detects a desync fault it sends a
//! `RETRAN` request over a request/response channel; the producer side
//! acknowledges, then broadcasts the full document on the requester's
//! private topic.
//!
//! ## Message Flow
//!
//! ```text
//! Requester                             Responder
//!   |-------- RETRAN(uid, key, cid) ------->|
//!   |<------- ACK(cid) ---------------------|
//!   |                                       |  producer.retransmit(key)
//!   |<======= PubSub(topic=uid, cid) =======|
//!   |  consumer.apply(RETRAN)               |
//! ```
//!
//! The control round-trip only admits the request. Bulk data always flows
//! through the broadcast channel.

pub mod error;
pub mod messages;
pub mod protocol;
pub mod transport;

pub use error::{Result, StreamError};
pub use messages::{CorrelationId, Frames, PubSubMsg, ReqResMsg, RequesterId};
pub use protocol::{shared_producer, Requester, Responder, RetransmitConfig, SharedProducer};
pub use transport::{
    memory::{MemoryBus, MemoryPublisher, MemoryRequestClient, MemoryRequestServer, MemorySubscriber},
    Broadcast, RequestClient, RequestServer, Subscription,
};
