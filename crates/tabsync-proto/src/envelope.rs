//! Envelope framing: `sender_node_id (16) | tag (u16 + UTF-8) | payload`.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{read_utf, write_utf, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::NodeId;

/// Envelope header plus the still-encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub sender: NodeId,
    pub tag: String,
    pub payload: Bytes,
}

impl Envelope {
    /// Frame an already-encoded payload.
    pub fn new(sender: NodeId, tag: impl Into<String>, payload: Bytes) -> Self {
        Self {
            sender,
            tag: tag.into(),
            payload,
        }
    }

    /// Frame a message, encoding it in place after the header.
    pub fn encode_message<M: ProtoEncode>(sender: NodeId, tag: &str, message: &M) -> Bytes {
        let mut buf = BytesMut::with_capacity(16 + 2 + tag.len() + 32);
        sender.proto_encode(&mut buf);
        write_utf(&mut buf, tag);
        message.proto_encode(&mut buf);
        buf.freeze()
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(16 + 2 + self.tag.len() + self.payload.len());
        self.sender.proto_encode(&mut buf);
        write_utf(&mut buf, &self.tag);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    /// Read only the sender id, leaving the rest untouched.
    pub fn peek_sender(data: &[u8]) -> Result<NodeId, ProtoError> {
        NodeId::proto_decode(&mut &data[..])
    }

    /// Split a received buffer into header and payload without copying the
    /// payload.
    pub fn decode(mut data: Bytes) -> Result<Self, ProtoError> {
        let sender = NodeId::proto_decode(&mut data)?;
        let tag = read_utf(&mut data)?;
        Ok(Self {
            sender,
            tag,
            payload: data,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::ServerSwitch;
    use crate::types::Uuid;

    #[test]
    fn header_layout() {
        let sender = NodeId(Uuid::new(0x1111, 0x2222));
        let env = Envelope::new(sender, "quit", Bytes::from_static(&[9, 9]));
        let data = env.encode();
        assert_eq!(data.len(), 16 + 2 + 4 + 2);
        assert_eq!(&data[16..18], &[0, 4]);
        assert_eq!(&data[18..22], b"quit");
        assert_eq!(Envelope::decode(data).unwrap(), env);
    }

    #[test]
    fn encode_message_matches_manual_framing() {
        let sender = NodeId::random();
        let msg = ServerSwitch {
            tablist_id: Uuid::new(1, 2),
            server: "lobby".into(),
        };
        let framed = Envelope::encode_message(sender, "server", &msg);
        let manual = Envelope::new(sender, "server", crate::codec::encode_to_bytes(&msg)).encode();
        assert_eq!(framed, manual);
        assert_eq!(Envelope::peek_sender(&framed).unwrap(), sender);
    }

    #[test]
    fn truncated_header_is_error() {
        assert!(Envelope::decode(Bytes::from_static(&[0; 10])).is_err());
        let mut data = vec![0u8; 16];
        data.extend_from_slice(&[0, 5, b'a']);
        assert!(Envelope::decode(Bytes::from(data)).is_err());
    }

    #[test]
    fn empty_payload_allowed() {
        let env = Envelope::new(NodeId::random(), "loadrequest", Bytes::new());
        let decoded = Envelope::decode(env.encode()).unwrap();
        assert!(decoded.payload.is_empty());
        assert_eq!(decoded.tag, "loadrequest");
    }
}
