//! LoadRequest / Load: the resync handshake used by a node that comes
//! online after others.

use bytes::{Buf, BufMut};

use crate::codec::{read_u16, ProtoDecode, ProtoEncode};
use crate::error::ProtoError;
use crate::messages::PlayerJoin;

/// Asks every other node to re-broadcast its local state. No payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoadRequest;

impl ProtoEncode for LoadRequest {
    fn proto_encode(&self, _buf: &mut impl BufMut) {}
}

impl ProtoDecode for LoadRequest {
    fn proto_decode(_buf: &mut impl Buf) -> Result<Self, ProtoError> {
        Ok(LoadRequest)
    }
}

/// Snapshot of every player connected to the sending node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Load {
    pub players: Vec<PlayerJoin>,
}

impl Load {
    /// Players beyond this count are not included in one snapshot.
    pub const MAX_PLAYERS: usize = u16::MAX as usize;
}

impl ProtoEncode for Load {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        let players = &self.players[..self.players.len().min(Self::MAX_PLAYERS)];
        buf.put_u16(players.len() as u16);
        for player in players {
            player.proto_encode(buf);
        }
    }
}

impl ProtoDecode for Load {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let count = read_u16(buf)? as usize;
        let mut players = Vec::with_capacity(count.min(256));
        for _ in 0..count {
            players.push(PlayerJoin::proto_decode(buf)?);
        }
        Ok(Self { players })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{decode_exact, encode_to_bytes};
    use crate::types::Uuid;

    fn player(n: u64, name: &str) -> PlayerJoin {
        PlayerJoin {
            unique_id: Uuid::new(n, 0),
            tablist_id: Uuid::new(n, 1),
            name: name.into(),
            server: "lobby".into(),
            vanished: false,
            staff: false,
            skin: None,
        }
    }

    #[test]
    fn load_request_is_empty() {
        assert!(encode_to_bytes(&LoadRequest).is_empty());
        assert_eq!(decode_exact::<LoadRequest>(&[]).unwrap(), LoadRequest);
    }

    #[test]
    fn load_roundtrip() {
        let msg = Load {
            players: vec![player(1, "Steve"), player(2, "Alex")],
        };
        assert_eq!(decode_exact::<Load>(&encode_to_bytes(&msg)).unwrap(), msg);
    }

    #[test]
    fn empty_load() {
        let data = encode_to_bytes(&Load::default());
        assert_eq!(&data[..], &[0, 0]);
        assert!(decode_exact::<Load>(&data).unwrap().players.is_empty());
    }

    #[test]
    fn count_larger_than_payload_is_error() {
        let mut data = encode_to_bytes(&Load {
            players: vec![player(1, "Steve")],
        })
        .to_vec();
        data[1] = 2;
        assert!(decode_exact::<Load>(&data).is_err());
    }
}
