//! PlayerJoin: a player connected to the sending node.

use bytes::{Buf, BufMut};

use crate::codec::{
    read_bool, read_optional_utf, read_utf, write_bool, write_optional_utf, write_utf,
    ProtoDecode, ProtoEncode,
};
use crate::error::ProtoError;
use crate::types::Uuid;

/// Skin texture reference (base64 texture value plus optional signature).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skin {
    pub value: String,
    pub signature: Option<String>,
}

/// PlayerJoin message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerJoin {
    /// Real (stable) UUID of the player.
    pub unique_id: Uuid,
    /// UUID the player is shown under in the tab list.
    pub tablist_id: Uuid,
    pub name: String,
    pub server: String,
    pub vanished: bool,
    pub staff: bool,
    /// Sent once with the join; skin changes are not replicated.
    pub skin: Option<Skin>,
}

impl ProtoEncode for PlayerJoin {
    fn proto_encode(&self, buf: &mut impl BufMut) {
        self.unique_id.proto_encode(buf);
        self.tablist_id.proto_encode(buf);
        write_utf(buf, &self.name);
        write_utf(buf, &self.server);
        write_bool(buf, self.vanished);
        write_bool(buf, self.staff);
        write_bool(buf, self.skin.is_some());
        if let Some(skin) = &self.skin {
            write_utf(buf, &skin.value);
            write_optional_utf(buf, skin.signature.as_deref());
        }
    }
}

impl ProtoDecode for PlayerJoin {
    fn proto_decode(buf: &mut impl Buf) -> Result<Self, ProtoError> {
        let unique_id = Uuid::proto_decode(buf)?;
        let tablist_id = Uuid::proto_decode(buf)?;
        let name = read_utf(buf)?;
        let server = read_utf(buf)?;
        let vanished = read_bool(buf)?;
        let staff = read_bool(buf)?;
        let skin = if read_bool(buf)? {
            Some(Skin {
                value: read_utf(buf)?,
                signature: read_optional_utf(buf)?,
            })
        } else {
            None
        };
        Ok(Self {
            unique_id,
            tablist_id,
            name,
            server,
            vanished,
            staff,
            skin,
        })
    }
}
