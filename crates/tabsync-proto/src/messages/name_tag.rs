//! NameTagUpdate: team name, prefix, suffix and visibility of a player.

use bytes::{Buf, BufMut};

use crate::codec::{read_u8, read_utf, write_utf, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::types::{NameVisibility, Uuid};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTagUpdate {
    pub tablist_id: Uuid,
    pub team_name: String,
    pub prefix: String,
    pub suffix: String,
    pub name_visibility: NameVisibility,
}

impl ProtoEncode for NameTagUpdate {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        self.tablist_id.proto_encode(buf);
        write_utf(buf, &self.team_name);
        write_utf(buf, &self.prefix);
        write_utf(buf, &self.suffix);
        buf.put_u8(self.name_visibility.to_byte());
    }
}

impl ProtoDecode for NameTagUpdate {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(Self {
            tablist_id: Uuid::proto_decode(buf)?,
            team_name: read_utf(buf)?,
            prefix: read_utf(buf)?,
            suffix: read_utf(buf)?,
            name_visibility: NameVisibility::from_byte(read_u8(buf)?)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_exact, encode_to_bytes};

    #[test]
    fn roundtrip() {
        let msg = NameTagUpdate {
            tablist_id: Uuid::new(5, 6),
            team_name: "0001Steve".into(),
            prefix: "&c[Admin] ".into(),
            suffix: String::new(),
            name_visibility: NameVisibility::HideForOtherTeams,
        };
        assert_eq!(
            decode_exact::<NameTagUpdate>(&encode_to_bytes(&msg)).unwrap(),
            msg
        );
    }

    #[test]
    fn unknown_visibility_is_error() {
        let msg = NameTagUpdate {
            tablist_id: Uuid::ZERO,
            team_name: "t".into(),
            prefix: "".into(),
            suffix: "".into(),
            name_visibility: NameVisibility::Always,
        };
        let mut data = encode_to_bytes(&msg).to_vec();
        *data.last_mut().unwrap() = 42;
        assert!(matches!(
            decode_exact::<NameTagUpdate>(&data),
            Err(ProtoError::InvalidData(_))
        ));
    }
}
