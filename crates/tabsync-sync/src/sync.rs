//! The replication context: local player lifecycle, inbound dispatch and the
//! feature fan-out.

use std::any::type_name;
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use tabsync_executor::{TaskQueue, DEFAULT_SHUTDOWN_GRACE};
use tabsync_proto::codec::ProtoEncode;
use tabsync_proto::envelope::Envelope;
use tabsync_proto::messages::{
    LoadRequest, PlayerJoin, PlayerQuit, ServerSwitch, UpdateVanishStatus,
};
use tabsync_proto::types::{NodeId, Uuid};
use tracing::{debug, error, info, trace, warn};

use crate::directory::{ConnectionState, RemoteEntity, RemoteNodeDirectory};
use crate::error::DispatchError;
use crate::handlers;
use crate::player::LocalPlayer;
use crate::registry::{Dispatcher, MessageRegistry};
use crate::transport::{InboundHandler, Outbound, Transport};

/// A replicated feature: registers its messages and reacts to lifecycle
/// events. Every hook defaults to doing nothing.
pub trait SyncFeature: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn register_messages(self: Arc<Self>, _registry: &mut MessageRegistry) {}

    /// The feature's own sequential queue, drained on flush and shut down on
    /// unload.
    fn queue(&self) -> Option<&TaskQueue> {
        None
    }

    /// A player connected to this node.
    fn on_join(&self, _sync: &ProxySync, _player: &Arc<LocalPlayer>) {}

    /// A player left this node. It is no longer in the online map.
    fn on_quit(&self, _sync: &ProxySync, _player: &LocalPlayer) {}

    fn on_remote_join(&self, _sync: &ProxySync, _entity: &RemoteEntity) {}

    fn on_remote_quit(&self, _sync: &ProxySync, _entity: &RemoteEntity) {}

    fn on_remote_server_switch(&self, _sync: &ProxySync, _entity: &RemoteEntity) {}

    /// Re-broadcast per-player state, on load and when another node asks.
    fn on_load_request(&self, _sync: &ProxySync) {}

    fn on_nickname_change(&self, _sync: &ProxySync, _tablist_id: Uuid, _old_nickname: &str) {}
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

pub struct ProxySyncBuilder {
    node_id: NodeId,
    transport: Arc<dyn Transport>,
    features: Vec<Arc<dyn SyncFeature>>,
    shutdown_grace: Duration,
}

impl ProxySyncBuilder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            node_id: NodeId::random(),
            transport,
            features: Vec::new(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn node_id(mut self, node_id: NodeId) -> Self {
        self.node_id = node_id;
        self
    }

    pub fn feature(mut self, feature: Arc<dyn SyncFeature>) -> Self {
        self.features.push(feature);
        self
    }

    pub fn shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Arc<ProxySync> {
        let mut registry = MessageRegistry::new();
        handlers::register_core(&mut registry);
        for feature in &self.features {
            feature.clone().register_messages(&mut registry);
        }
        let dispatcher = Dispatcher::new(self.node_id, Arc::new(registry));
        info!(
            "Replication node {} started with features [{}]",
            self.node_id,
            self.features
                .iter()
                .map(|f| f.name())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Arc::new_cyclic(|this| ProxySync {
            node_id: self.node_id,
            this: this.clone(),
            dispatcher,
            directory: RemoteNodeDirectory::new(),
            online: DashMap::new(),
            processing: TaskQueue::spawn("replication-processing"),
            outbound: Outbound::spawn(self.transport),
            features: self.features,
            shutdown_grace: self.shutdown_grace,
        })
    }
}

// ---------------------------------------------------------------------------
// ProxySync
// ---------------------------------------------------------------------------

pub struct ProxySync {
    node_id: NodeId,
    this: Weak<ProxySync>,
    dispatcher: Dispatcher,
    directory: RemoteNodeDirectory,
    /// Local players by tab-list id.
    online: DashMap<Uuid, Arc<LocalPlayer>>,
    processing: TaskQueue,
    outbound: Outbound,
    features: Vec<Arc<dyn SyncFeature>>,
    shutdown_grace: Duration,
}

impl ProxySync {
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn directory(&self) -> &RemoteNodeDirectory {
        &self.directory
    }

    pub fn registry(&self) -> &MessageRegistry {
        self.dispatcher.registry()
    }

    /// The queue inbound messages are decoded and processed on.
    pub fn processing(&self) -> &TaskQueue {
        &self.processing
    }

    pub fn handle(&self) -> Weak<ProxySync> {
        self.this.clone()
    }

    pub fn local_player(&self, tablist_id: &Uuid) -> Option<Arc<LocalPlayer>> {
        self.online.get(tablist_id).map(|p| p.value().clone())
    }

    pub fn local_player_by_connection(&self, id: Uuid) -> Option<Arc<LocalPlayer>> {
        self.online
            .iter()
            .find(|p| p.connection().id() == id)
            .map(|p| p.value().clone())
    }

    pub fn local_players(&self) -> Vec<Arc<LocalPlayer>> {
        self.online.iter().map(|p| p.value().clone()).collect()
    }

    /// Whether the real player is connected to this node.
    pub fn is_connected_locally(&self, unique_id: Uuid) -> bool {
        self.online.iter().any(|p| p.unique_id() == unique_id)
    }

    pub(crate) fn each_feature(&self, f: impl Fn(&dyn SyncFeature)) {
        for feature in &self.features {
            f(feature.as_ref());
        }
    }

    // -----------------------------------------------------------------------
    // Sending
    // -----------------------------------------------------------------------

    /// Broadcast a message under the tag its type was registered with.
    pub fn send<M: ProtoEncode + 'static>(&self, message: &M) {
        match self.registry().tag_of::<M>() {
            Some(tag) => self.send_tagged(tag, message),
            None => error!("No message tag registered for {}", type_name::<M>()),
        }
    }

    /// Broadcast a message under an explicit tag.
    pub fn send_tagged<M: ProtoEncode>(&self, tag: &str, message: &M) {
        let payload = Envelope::encode_message(self.node_id, tag, message);
        self.outbound.send(tag, payload);
    }

    // -----------------------------------------------------------------------
    // Local lifecycle
    // -----------------------------------------------------------------------

    /// Announce every local player, let features broadcast their state and
    /// ask the other nodes for theirs.
    pub fn load(&self) {
        let players = self.local_players();
        for player in &players {
            self.send(&player.to_join());
        }
        self.each_feature(|f| f.on_load_request(self));
        self.send(&LoadRequest);
        info!("Replication loaded with {} local players", players.len());
    }

    /// Announce every local player as gone, forget remote players and stop
    /// the queues.
    pub async fn unload(&self) {
        for player in self.local_players() {
            self.send(&PlayerQuit {
                tablist_id: player.tablist_id(),
            });
        }
        self.directory.clear();
        self.outbound.flush().await;

        self.processing.shutdown(self.shutdown_grace).await;
        for feature in &self.features {
            if let Some(queue) = feature.queue() {
                queue.shutdown(self.shutdown_grace).await;
            }
        }
        self.outbound.close().await;
        info!("Replication unloaded");
    }

    pub fn player_joined(&self, player: LocalPlayer) -> Arc<LocalPlayer> {
        let player = Arc::new(player);
        if self
            .online
            .insert(player.tablist_id(), player.clone())
            .is_some()
        {
            warn!("Replacing already online player {}", player.name());
        }
        debug!("{} joined server {}", player.name(), player.server());
        self.send(&player.to_join());
        self.each_feature(|f| f.on_join(self, &player));
        player
    }

    pub fn player_quit(&self, tablist_id: &Uuid) -> Option<Arc<LocalPlayer>> {
        let (_, player) = self.online.remove(tablist_id)?;
        debug!("{} left", player.name());
        self.each_feature(|f| f.on_quit(self, &player));
        self.send(&PlayerQuit {
            tablist_id: *tablist_id,
        });

        if !self.is_connected_locally(player.unique_id()) {
            for id in self.directory.queued_for(&player.unique_id()) {
                let promoted = self.directory.update(&id, |e| {
                    e.state = ConnectionState::Connected;
                    e.clone()
                });
                if let Some(entity) = promoted {
                    debug!("Promoting queued {} from server {}", entity.name, entity.server);
                    self.each_feature(|f| f.on_remote_join(self, &entity));
                }
            }
        }
        Some(player)
    }

    pub fn server_switched(&self, tablist_id: &Uuid, server: &str) -> bool {
        let Some(player) = self.local_player(tablist_id) else {
            return false;
        };
        player.set_server(server);
        self.send(&ServerSwitch {
            tablist_id: *tablist_id,
            server: server.to_string(),
        });
        true
    }

    pub fn vanish_changed(&self, tablist_id: &Uuid, vanished: bool) -> bool {
        let Some(player) = self.local_player(tablist_id) else {
            return false;
        };
        if player.set_vanished(vanished) != vanished {
            self.send(&UpdateVanishStatus {
                tablist_id: *tablist_id,
                vanished,
            });
        }
        true
    }

    /// A tab-list add for `id` carrying `name` is about to reach `receiver`.
    ///
    /// Nickname plugins rename players through this packet. For a local
    /// player the change is only taken from the packet sent to that player
    /// itself; for a remote entity any differing name is taken.
    pub fn on_entry_add(&self, receiver: &LocalPlayer, id: Uuid, name: &str) {
        if let Some(local) = self.local_player(&id) {
            if std::ptr::eq(local.as_ref(), receiver) && local.nickname() != name {
                let old = local.set_nickname(name);
                debug!("Nickname of {} changed from {old} to {name}", local.name());
                self.each_feature(|f| f.on_nickname_change(self, id, &old));
            }
            return;
        }
        let changed = self.directory.update(&id, |e| {
            (e.nickname != name).then(|| std::mem::replace(&mut e.nickname, name.to_string()))
        });
        if let Some(Some(old)) = changed {
            debug!("Nickname of remote {old} changed to {name}");
            self.each_feature(|f| f.on_nickname_change(self, id, &old));
        }
    }

    // -----------------------------------------------------------------------
    // Remote joins
    // -----------------------------------------------------------------------

    /// Apply a join. With `refresh`, an already connected entity gets its
    /// mutable fields overwritten instead of being ignored.
    pub(crate) fn apply_join(&self, join: &PlayerJoin, sender: NodeId, refresh: bool) {
        if let Some(existing) = self.directory.get(&join.tablist_id) {
            match existing.state {
                ConnectionState::Connected => {
                    if refresh {
                        self.refresh_entity(join, sender, &existing);
                    }
                    return;
                }
                ConnectionState::Queued if self.is_connected_locally(join.unique_id) => {
                    self.directory.update(&join.tablist_id, |e| {
                        e.server = join.server.clone();
                        e.vanished = join.vanished;
                        e.origin = sender;
                    });
                    return;
                }
                _ => {}
            }
        }

        let mut entity = RemoteEntity::from_join(join, sender);
        if self.is_connected_locally(join.unique_id) {
            entity.state = ConnectionState::Queued;
            debug!("Queueing {} until the local connection closes", join.name);
            self.directory.insert(entity);
            return;
        }
        entity.state = ConnectionState::Connected;
        self.directory.insert(entity.clone());
        debug!("Remote player {} joined server {}", entity.name, entity.server);
        self.each_feature(|f| f.on_remote_join(self, &entity));
    }

    fn refresh_entity(&self, join: &PlayerJoin, sender: NodeId, existing: &RemoteEntity) {
        let updated = self.directory.update(&join.tablist_id, |e| {
            e.name = join.name.clone();
            e.server = join.server.clone();
            e.vanished = join.vanished;
            e.staff = join.staff;
            e.origin = sender;
            e.clone()
        });
        if let Some(entity) = updated {
            if entity.server != existing.server {
                self.each_feature(|f| f.on_remote_server_switch(self, &entity));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Online counters
    // -----------------------------------------------------------------------

    fn count_visible(&self, filter: impl Fn(&str, bool) -> bool) -> usize {
        let local = self
            .online
            .iter()
            .filter(|p| !p.is_vanished() && filter(&p.server(), p.is_staff()))
            .count();
        let remote = self
            .directory
            .connected()
            .iter()
            .filter(|e| !e.vanished && filter(&e.server, e.staff))
            .count();
        local + remote
    }

    /// Non-vanished players across the cluster.
    pub fn online_count(&self) -> usize {
        self.count_visible(|_, _| true)
    }

    pub fn staff_online_count(&self) -> usize {
        self.count_visible(|_, staff| staff)
    }

    pub fn server_online_count(&self, server: &str) -> usize {
        self.count_visible(|s, _| s == server)
    }

    // -----------------------------------------------------------------------
    // Inbound
    // -----------------------------------------------------------------------

    /// Decode and apply one envelope. Runs on the processing queue.
    pub fn dispatch(&self, data: Bytes) {
        match self.dispatcher.decode(data) {
            Ok(None) => trace!("Ignoring own message"),
            Ok(Some((sender, message))) => match message.affinity() {
                Some(queue) => {
                    let Some(sync) = self.this.upgrade() else {
                        return;
                    };
                    queue.submit(move || message.process(&sync, sender));
                }
                None => message.process(self, sender),
            },
            Err(DispatchError::UnknownMessageType(tag)) => {
                warn!("Ignoring message with unknown type {tag}")
            }
            Err(e) => warn!("Dropping message: {e}"),
        }
    }

    /// Wait until inbound work queued so far is applied and outbound
    /// messages reached the transport.
    pub async fn flush(&self) {
        self.processing.drained().await;
        for feature in &self.features {
            if let Some(queue) = feature.queue() {
                queue.drained().await;
            }
        }
        self.outbound.flush().await;
    }
}

impl InboundHandler for ProxySync {
    fn on_receive(&self, payload: Bytes) {
        let Some(sync) = self.this.upgrade() else {
            return;
        };
        if !self.processing.submit(move || sync.dispatch(payload)) {
            trace!("Dropping inbound message after shutdown");
        }
    }
}
