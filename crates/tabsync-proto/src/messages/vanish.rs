//! UpdateVanishStatus: a player's vanish flag flipped.

use bytes::{Buf, BufMut};

use crate::codec::{read_bool, write_bool, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateVanishStatus {
    pub tablist_id: Uuid,
    pub vanished: bool,
}

impl ProtoEncode for UpdateVanishStatus {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        self.tablist_id.proto_encode(buf);
        write_bool(buf, self.vanished);
    }
}

impl ProtoDecode for UpdateVanishStatus {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            tablist_id: Uuid::proto_decode(buf)?,
            vanished: read_bool(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_exact, encode_to_bytes};

    #[test]
    fn roundtrip_both_flags() {
        for vanished in [true, false] {
            let msg = UpdateVanishStatus {
                tablist_id: Uuid::new(1, 1),
                vanished,
            };
            let data = encode_to_bytes(&msg);
            assert_eq!(data[16], vanished as u8);
            assert_eq!(decode_exact::<UpdateVanishStatus>(&data).unwrap(), msg);
        }
    }
}
