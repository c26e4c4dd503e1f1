//! PlayerQuit: a player left the sending node.

use bytes::{Buf, BufMut};

use crate::codec::{ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerQuit {
    pub tablist_id: Uuid,
}

impl ProtoEncode for PlayerQuit {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        self.tablist_id.proto_encode(buf);
    }
}

impl ProtoDecode for PlayerQuit {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            tablist_id: Uuid::proto_decode(buf)?,
        })
    }
}
