//! ServerSwitch: a player moved to another backend server.

use bytes::{Buf, BufMut};

use crate::codec::{read_utf, write_utf, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSwitch {
    pub tablist_id: Uuid,
    /// Name of the server the player switched to.
    pub server: String,
}

impl ProtoEncode for ServerSwitch {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        self.tablist_id.proto_encode(buf);
        write_utf(buf, &self.server);
    }
}

impl ProtoDecode for ServerSwitch {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            tablist_id: Uuid::proto_decode(buf)?,
            server: read_utf(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_exact, encode_to_bytes};

    #[test]
    fn roundtrip() {
        let msg = ServerSwitch {
            tablist_id: Uuid::new(7, 8),
            server: "survival-2".into(),
        };
        assert_eq!(
            decode_exact::<ServerSwitch>(&encode_to_bytes(&msg)).unwrap(),
            msg
        );
    }
}
