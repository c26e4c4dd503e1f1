//! Message tags, decoders and envelope dispatch.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tabsync_executor::TaskQueue;
use tabsync_proto::codec::{decode_exact, ProtoDecode};
use tabsync_proto::envelope::Envelope;
use tabsync_proto::error::ProtoError;
use tabsync_proto::types::NodeId;

use crate::error::DispatchError;
use crate::sync::ProxySync;

/// Envelope tags of the built-in and feature messages.
pub mod tag {
    pub const JOIN: &str = "join";
    pub const QUIT: &str = "quit";
    pub const SERVER: &str = "server";
    pub const VANISH: &str = "vanish";
    pub const LOAD_REQUEST: &str = "loadrequest";
    pub const LOAD: &str = "load";
    pub const TEAMS: &str = "teams";
    pub const BELOWNAME: &str = "belowname";
    pub const YELLOW_NUMBER: &str = "yellow-number";
}

/// A decoded inbound message ready to be applied.
pub trait SyncMessage: Send + 'static {
    /// Queue this message must be processed on. `None` processes it inline
    /// on the dispatching queue.
    fn affinity(&self) -> Option<TaskQueue> {
        None
    }

    fn process(self: Box<Self>, sync: &ProxySync, sender: NodeId);
}

type Decoder = Box<dyn Fn(Bytes) -> Result<Box<dyn SyncMessage>, ProtoError> + Send + Sync>;

/// Tag to decoder table, plus the reverse wire type to tag lookup used when
/// sending.
#[derive(Default)]
pub struct MessageRegistry {
    decoders: HashMap<String, Decoder>,
    tags: HashMap<TypeId, String>,
}

impl MessageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register wire type `M` under `tag`. `wrap` turns a decoded value into
    /// its handler.
    ///
    /// When several tags share one wire type, the first registration owns the
    /// type lookup; the others must be sent with an explicit tag.
    pub fn register<M, F>(&mut self, tag: &str, wrap: F)
    where
        M: ProtoDecode + 'static,
        F: Fn(M) -> Box<dyn SyncMessage> + Send + Sync + 'static,
    {
        let decoder: Decoder = Box::new(
            move |payload: Bytes| -> Result<Box<dyn SyncMessage>, ProtoError> {
                Ok(wrap(decode_exact::<M>(&payload)?))
            },
        );
        self.decoders.insert(tag.to_string(), decoder);
        self.tags
            .entry(TypeId::of::<M>())
            .or_insert_with(|| tag.to_string());
    }

    /// Register a wire type that is its own handler.
    pub fn register_message<M>(&mut self, tag: &str)
    where
        M: ProtoDecode + SyncMessage,
    {
        self.register::<M, _>(tag, |m| Box::new(m));
    }

    pub fn tag_of<M: 'static>(&self) -> Option<&str> {
        self.tags.get(&TypeId::of::<M>()).map(String::as_str)
    }

    pub fn is_registered(&self, tag: &str) -> bool {
        self.decoders.contains_key(tag)
    }

    fn decode(&self, tag: &str, payload: Bytes) -> Result<Box<dyn SyncMessage>, DispatchError> {
        let decoder = self
            .decoders
            .get(tag)
            .ok_or_else(|| DispatchError::UnknownMessageType(tag.to_string()))?;
        decoder(payload).map_err(|source| DispatchError::Decode {
            tag: tag.to_string(),
            source,
        })
    }
}

/// Turns received envelopes into handlers, dropping the node's own messages.
pub struct Dispatcher {
    node_id: NodeId,
    registry: Arc<MessageRegistry>,
}

impl Dispatcher {
    pub fn new(node_id: NodeId, registry: Arc<MessageRegistry>) -> Self {
        Self { node_id, registry }
    }

    pub fn registry(&self) -> &MessageRegistry {
        &self.registry
    }

    /// `Ok(None)` for envelopes this node sent itself.
    pub fn decode(
        &self,
        data: Bytes,
    ) -> Result<Option<(NodeId, Box<dyn SyncMessage>)>, DispatchError> {
        let sender = Envelope::peek_sender(&data).map_err(DispatchError::Envelope)?;
        if sender == self.node_id {
            return Ok(None);
        }
        let envelope = Envelope::decode(data).map_err(DispatchError::Envelope)?;
        let message = self.registry.decode(&envelope.tag, envelope.payload)?;
        Ok(Some((sender, message)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tabsync_proto::messages::{PlayerQuit, ScoreUpdate};
    use tabsync_proto::types::Uuid;

    struct Noop;

    impl SyncMessage for Noop {
        fn process(self: Box<Self>, _: &ProxySync, _: NodeId) {}
    }

    fn counting_registry(decoded: Arc<AtomicUsize>) -> Arc<MessageRegistry> {
        let mut registry = MessageRegistry::new();
        registry.register::<PlayerQuit, _>(tag::QUIT, move |_| {
            decoded.fetch_add(1, Ordering::SeqCst);
            Box::new(Noop)
        });
        registry.register::<ScoreUpdate, _>(tag::BELOWNAME, |_| Box::new(Noop));
        registry.register::<ScoreUpdate, _>(tag::YELLOW_NUMBER, |_| Box::new(Noop));
        Arc::new(registry)
    }

    fn registry() -> Arc<MessageRegistry> {
        counting_registry(Arc::new(AtomicUsize::new(0)))
    }

    fn quit() -> PlayerQuit {
        PlayerQuit {
            tablist_id: Uuid::new(1, 2),
        }
    }

    #[test]
    fn first_registration_owns_type_tag() {
        let registry = registry();
        assert_eq!(registry.tag_of::<ScoreUpdate>(), Some(tag::BELOWNAME));
        assert!(registry.is_registered(tag::YELLOW_NUMBER));
        assert_eq!(registry.tag_of::<String>(), None);
    }

    #[test]
    fn own_envelopes_are_not_decoded() {
        let me = NodeId::random();
        let decoded = Arc::new(AtomicUsize::new(0));
        let dispatcher = Dispatcher::new(me, counting_registry(decoded.clone()));
        let data = Envelope::encode_message(me, tag::QUIT, &quit());
        assert!(dispatcher.decode(data).unwrap().is_none());
        assert_eq!(decoded.load(Ordering::SeqCst), 0);

        let data = Envelope::encode_message(NodeId::random(), tag::QUIT, &quit());
        assert!(dispatcher.decode(data).unwrap().is_some());
        assert_eq!(decoded.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn foreign_envelope_is_decoded() {
        let dispatcher = Dispatcher::new(NodeId::random(), registry());
        let other = NodeId::random();
        let data = Envelope::encode_message(other, tag::QUIT, &quit());
        let (sender, _) = dispatcher.decode(data).unwrap().unwrap();
        assert_eq!(sender, other);
    }

    #[test]
    fn unknown_tag_is_reported() {
        let dispatcher = Dispatcher::new(NodeId::random(), registry());
        let data = Envelope::encode_message(NodeId::random(), "bogus", &quit());
        assert!(matches!(
            dispatcher.decode(data),
            Err(DispatchError::UnknownMessageType(t)) if t == "bogus"
        ));
    }

    #[test]
    fn truncated_payload_is_reported() {
        let dispatcher = Dispatcher::new(NodeId::random(), registry());
        let data = Envelope::encode_message(NodeId::random(), tag::QUIT, &quit());
        let truncated = data.slice(..data.len() - 3);
        assert!(matches!(
            dispatcher.decode(truncated),
            Err(DispatchError::Decode { tag: t, .. }) if t == tag::QUIT
        ));
    }

    #[test]
    fn short_envelope_is_reported() {
        let dispatcher = Dispatcher::new(NodeId::random(), registry());
        assert!(matches!(
            dispatcher.decode(Bytes::from_static(&[1, 2, 3])),
            Err(DispatchError::Envelope(_))
        ));
    }
}
