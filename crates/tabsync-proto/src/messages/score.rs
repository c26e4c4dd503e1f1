//! ScoreUpdate: a scoreboard number shown next to a player.
//!
//! Shared by the belowname and playerlist objectives; the envelope tag tells
//! them apart.

use bytes::{Buf, BufMut};

use crate::codec::{read_i32, read_utf, write_utf, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoreUpdate {
    pub tablist_id: Uuid,
    /// Plain number for clients without number formats.
    pub value: i32,
    /// Formatted number for clients that support it; empty when unset.
    pub fancy_value: String,
}

impl ProtoEncode for ScoreUpdate {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        self.tablist_id.proto_encode(buf);
        buf.put_i32(self.value);
        write_utf(buf, &self.fancy_value);
    }
}

impl ProtoDecode for ScoreUpdate {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            tablist_id: Uuid::proto_decode(buf)?,
            value: read_i32(buf)?,
            fancy_value: read_utf(buf)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_exact, encode_to_bytes};

    #[test]
    fn roundtrip_negative_value() {
        let msg = ScoreUpdate {
            tablist_id: Uuid::new(9, 9),
            value: -20,
            fancy_value: "§c-20 ❤".into(),
        };
        let data = encode_to_bytes(&msg);
        assert_eq!(&data[16..20], &(-20i32).to_be_bytes());
        assert_eq!(decode_exact::<ScoreUpdate>(&data).unwrap(), msg);
    }
}
