//! Handlers of the built-in replication messages.

use std::collections::HashSet;

use tabsync_proto::messages::{
    Load, LoadRequest, PlayerJoin, PlayerQuit, ServerSwitch, UpdateVanishStatus,
};
use tabsync_proto::types::{NodeId, Uuid};
use tracing::debug;

use crate::registry::{tag, MessageRegistry, SyncMessage};
use crate::sync::ProxySync;

pub(crate) fn register_core(registry: &mut MessageRegistry) {
    registry.register_message::<PlayerJoin>(tag::JOIN);
    registry.register_message::<PlayerQuit>(tag::QUIT);
    registry.register_message::<ServerSwitch>(tag::SERVER);
    registry.register_message::<UpdateVanishStatus>(tag::VANISH);
    registry.register_message::<LoadRequest>(tag::LOAD_REQUEST);
    registry.register_message::<Load>(tag::LOAD);
}

impl SyncMessage for PlayerJoin {
    fn process(self: Box<Self>, sync: &ProxySync, sender: NodeId) {
        sync.apply_join(&self, sender, false);
    }
}

impl SyncMessage for PlayerQuit {
    fn process(self: Box<Self>, sync: &ProxySync, _sender: NodeId) {
        let Some(entity) = sync.directory().remove(&self.tablist_id) else {
            return;
        };
        debug!("Remote player {} left server {}", entity.name, entity.server);
        // Queued entities were never announced.
        if entity.is_connected() {
            sync.each_feature(|f| f.on_remote_quit(sync, &entity));
        }
    }
}

impl SyncMessage for ServerSwitch {
    fn process(self: Box<Self>, sync: &ProxySync, _sender: NodeId) {
        let updated = sync.directory().update(&self.tablist_id, |e| {
            e.server = self.server.clone();
            e.clone()
        });
        if let Some(entity) = updated {
            if entity.is_connected() {
                sync.each_feature(|f| f.on_remote_server_switch(sync, &entity));
            }
        }
    }
}

impl SyncMessage for UpdateVanishStatus {
    fn process(self: Box<Self>, sync: &ProxySync, _sender: NodeId) {
        sync.directory()
            .update(&self.tablist_id, |e| e.vanished = self.vanished);
    }
}

impl SyncMessage for LoadRequest {
    fn process(self: Box<Self>, sync: &ProxySync, sender: NodeId) {
        debug!("Node {sender} requested a resync");
        let players = sync.local_players().iter().map(|p| p.to_join()).collect();
        sync.send(&Load { players });
        sync.each_feature(|f| f.on_load_request(sync));
    }
}

impl SyncMessage for Load {
    fn process(self: Box<Self>, sync: &ProxySync, sender: NodeId) {
        let keep: HashSet<Uuid> = self.players.iter().map(|p| p.tablist_id).collect();
        for stale in sync.directory().remove_stale(sender, &keep) {
            debug!("Dropping stale remote player {} of node {sender}", stale.name);
            if stale.is_connected() {
                sync.each_feature(|f| f.on_remote_quit(sync, &stale));
            }
        }
        for join in &self.players {
            sync.apply_join(join, sender, true);
        }
    }
}
