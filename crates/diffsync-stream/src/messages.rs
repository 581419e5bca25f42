//! Broadcast and control envelopes, plus the ids they carry.
//!
//! Both envelopes travel as multipart frames: the broadcast envelope as
//! `[topic, correlation_id, payload]` and the control envelope as
//! `[cmd, requester_id, key, correlation_id]`.

use std::fmt;

use bytes::Bytes;
use diffsync_core::{Command, EntryKey, ProtocolError};
use rand::Rng;

/// A multipart message.
pub type Frames = Vec<Bytes>;

/// Frames in a broadcast envelope.
pub const PUBSUB_FRAMES: usize = 3;

/// Frames in a control envelope.
pub const REQRES_FRAMES: usize = 4;

fn random_hex() -> String {
    let bytes: [u8; 16] = rand::thread_rng().gen();
    hex::encode(bytes)
}

/// At most the first six characters.
fn short(text: &str) -> &str {
    match text.char_indices().nth(6) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

fn frame_text(frames: &[Bytes], index: usize) -> Result<String, ProtocolError> {
    let frame = frames.get(index).ok_or(ProtocolError::MalformedFrame {
        expected: index + 1,
        got: frames.len(),
    })?;
    String::from_utf8(frame.to_vec())
        .map_err(|e| ProtocolError::Decode(format!("frame {index} is not utf-8: {e}")))
}

fn check_len(frames: &[Bytes], expected: usize) -> Result<(), ProtocolError> {
    if frames.len() != expected {
        return Err(ProtocolError::MalformedFrame {
            expected,
            got: frames.len(),
        });
    }
    Ok(())
}

/// Identity of a consumer, doubling as its private topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct RequesterId(String);

impl RequesterId {
    /// Generate a random id (32 hex characters).
    pub fn random() -> Self {
        Self(random_hex())
    }

    /// The id as text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether the id is empty, as in a reply.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for RequesterId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for RequesterId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Ties a request to its reply and to the retransmitted broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a random id (32 hex characters).
    pub fn random() -> Self {
        Self(random_hex())
    }

    /// The empty id carried by broadcasts on the shared topic.
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for CorrelationId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for CorrelationId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Control envelope for the retransmission handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReqResMsg {
    pub cmd: Command,
    /// Empty in replies.
    pub requester_id: RequesterId,
    /// Key in its textual wire form. Empty in replies.
    pub key: String,
    pub correlation_id: CorrelationId,
}

impl ReqResMsg {
    /// A retransmission request with a fresh correlation id.
    pub fn retran(requester_id: &RequesterId, key: &EntryKey) -> Self {
        Self {
            cmd: Command::Retran,
            requester_id: requester_id.clone(),
            key: key.to_string(),
            correlation_id: CorrelationId::random(),
        }
    }

    /// Positive reply to the request with `correlation_id`.
    pub fn ack(correlation_id: CorrelationId) -> Self {
        Self::reply(Command::Ack, correlation_id)
    }

    /// Negative reply to the request with `correlation_id`.
    pub fn nack(correlation_id: CorrelationId) -> Self {
        Self::reply(Command::Nack, correlation_id)
    }

    fn reply(cmd: Command, correlation_id: CorrelationId) -> Self {
        Self {
            cmd,
            requester_id: RequesterId::default(),
            key: String::new(),
            correlation_id,
        }
    }

    /// Encode as `[cmd, requester_id, key, correlation_id]`.
    pub fn to_frames(&self) -> Frames {
        vec![
            Bytes::from_static(self.cmd.code().as_bytes()),
            Bytes::from(self.requester_id.as_str().to_owned()),
            Bytes::from(self.key.clone()),
            Bytes::from(self.correlation_id.as_str().to_owned()),
        ]
    }

    /// Decode from four frames.
    pub fn from_frames(frames: &[Bytes]) -> Result<Self, ProtocolError> {
        check_len(frames, REQRES_FRAMES)?;
        Ok(Self {
            cmd: Command::from_code(&frame_text(frames, 0)?)?,
            requester_id: RequesterId(frame_text(frames, 1)?),
            key: frame_text(frames, 2)?,
            correlation_id: CorrelationId(frame_text(frames, 3)?),
        })
    }
}

impl fmt::Display for ReqResMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Cmd {} uid:0x{} key:0x{} cid:0x{}",
            self.cmd.name(),
            short(self.requester_id.as_str()),
            short(&self.key),
            short(self.correlation_id.as_str()),
        )
    }
}

/// Broadcast envelope: a serialized change envelope addressed to a topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PubSubMsg {
    pub topic: String,
    pub correlation_id: CorrelationId,
    pub payload: Bytes,
}

impl PubSubMsg {
    pub fn new(topic: impl Into<String>, correlation_id: CorrelationId, payload: Bytes) -> Self {
        Self {
            topic: topic.into(),
            correlation_id,
            payload,
        }
    }

    /// Encode as `[topic, correlation_id, payload]`.
    pub fn to_frames(&self) -> Frames {
        vec![
            Bytes::from(self.topic.clone()),
            Bytes::from(self.correlation_id.as_str().to_owned()),
            self.payload.clone(),
        ]
    }

    /// Decode from three frames.
    pub fn from_frames(frames: &[Bytes]) -> Result<Self, ProtocolError> {
        check_len(frames, PUBSUB_FRAMES)?;
        Ok(Self {
            topic: frame_text(frames, 0)?,
            correlation_id: CorrelationId(frame_text(frames, 1)?),
            payload: frames[2].clone(),
        })
    }
}

impl fmt::Display for PubSubMsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PubSubMsg top:0x{} cid:0x{} pay:{}",
            short(&self.topic),
            short(self.correlation_id.as_str()),
            String::from_utf8_lossy(&self.payload),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_random_ids() {
        let a = RequesterId::random();
        let b = RequesterId::random();
        assert_eq!(a.as_str().len(), 32);
        assert!(a.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
        assert_ne!(CorrelationId::random(), CorrelationId::random());
        assert!(CorrelationId::empty().is_empty());
    }

    #[test]
    fn test_reqres_frames() {
        let uid = RequesterId::from("feedface");
        let msg = ReqResMsg::retran(&uid, &EntryKey::Int(42));
        let frames = msg.to_frames();

        assert_eq!(frames.len(), REQRES_FRAMES);
        assert_eq!(&frames[0][..], b"r");
        assert_eq!(&frames[1][..], b"feedface");
        assert_eq!(&frames[2][..], b"42");
        assert_eq!(ReqResMsg::from_frames(&frames).unwrap(), msg);
    }

    #[test]
    fn test_reply_frames() {
        let cid = CorrelationId::from("abc");
        let ack = ReqResMsg::ack(cid.clone());
        let decoded = ReqResMsg::from_frames(&ack.to_frames()).unwrap();
        assert_eq!(decoded.cmd, Command::Ack);
        assert!(decoded.requester_id.is_empty());
        assert!(decoded.key.is_empty());
        assert_eq!(decoded.correlation_id, cid);

        assert_eq!(ReqResMsg::nack(cid).cmd, Command::Nack);
    }

    #[test]
    fn test_reqres_bad_frames() {
        let short = vec![Bytes::from_static(b"r")];
        assert!(matches!(
            ReqResMsg::from_frames(&short),
            Err(ProtocolError::MalformedFrame { expected: 4, got: 1 })
        ));

        let unknown = vec![
            Bytes::from_static(b"x"),
            Bytes::new(),
            Bytes::new(),
            Bytes::new(),
        ];
        assert!(matches!(
            ReqResMsg::from_frames(&unknown),
            Err(ProtocolError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_pubsub_frames() {
        let msg = PubSubMsg::new("_ATOP_", CorrelationId::empty(), Bytes::from_static(b"[]"));
        let frames = msg.to_frames();
        assert_eq!(frames.len(), PUBSUB_FRAMES);
        assert!(frames[1].is_empty());
        assert_eq!(PubSubMsg::from_frames(&frames).unwrap(), msg);

        assert!(PubSubMsg::from_frames(&frames[..2]).is_err());
    }

    #[test]
    fn test_reply_display() {
        let msg = ReqResMsg::nack(CorrelationId::from("_cid_"));
        assert_eq!(msg.to_string(), "Cmd NACK uid:0x key:0x cid:0x_cid_");
    }

    #[test]
    fn test_display_truncates() {
        let msg = ReqResMsg {
            cmd: Command::Retran,
            requester_id: RequesterId::from("0123456789"),
            key: "0123456789".into(),
            correlation_id: CorrelationId::from("0123456789"),
        };
        assert_eq!(
            msg.to_string(),
            "Cmd RETRAN uid:0x012345 key:0x012345 cid:0x012345"
        );

        let pubsub = PubSubMsg::new(
            "0123456789",
            CorrelationId::from("0123456789"),
            Bytes::from_static(b"0123456789"),
        );
        assert_eq!(
            pubsub.to_string(),
            "PubSubMsg top:0x012345 cid:0x012345 pay:0123456789"
        );
    }
}
