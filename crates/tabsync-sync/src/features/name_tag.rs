//! Nametag replication: team name, prefix, suffix and visibility of every
//! player, rendered as one scoreboard team per player.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tabsync_executor::TaskQueue;
use tabsync_proto::messages::NameTagUpdate;
use tabsync_proto::packets::TeamParameters;
use tabsync_proto::types::{NameVisibility, NodeId, Uuid};
use tracing::{debug, error};

use crate::directory::RemoteEntity;
use crate::player::LocalPlayer;
use crate::registry::{tag, MessageRegistry, SyncMessage};
use crate::sync::{ProxySync, SyncFeature};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameTag {
    pub team_name: String,
    pub prefix: String,
    pub suffix: String,
    pub visibility: NameVisibility,
}

impl NameTag {
    fn parameters(&self) -> TeamParameters {
        TeamParameters {
            display_name: self.team_name.clone(),
            prefix: self.prefix.clone(),
            suffix: self.suffix.clone(),
            visibility: self.visibility,
            ..TeamParameters::default()
        }
    }

    fn from_entity(entity: &RemoteEntity) -> Option<Self> {
        Some(Self {
            team_name: entity.team_name.clone()?,
            prefix: entity.tag_prefix.clone().unwrap_or_default(),
            suffix: entity.tag_suffix.clone().unwrap_or_default(),
            visibility: entity.name_visibility.unwrap_or_default(),
        })
    }
}

/// Replicates nametags. Every team change, local or remote, runs on the
/// feature's own queue so renders and removals never interleave.
pub struct NameTagSync {
    this: Weak<NameTagSync>,
    queue: TaskQueue,
    anti_override: bool,
    /// Tags of local players by tab-list id.
    local: DashMap<Uuid, NameTag>,
}

impl NameTagSync {
    /// Must be called inside a tokio runtime.
    pub fn new(anti_override: bool) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            this: this.clone(),
            queue: TaskQueue::spawn("nametag"),
            anti_override,
            local: DashMap::new(),
        })
    }

    pub fn tag_of(&self, tablist_id: &Uuid) -> Option<NameTag> {
        self.local.get(tablist_id).map(|t| t.value().clone())
    }

    /// Set a local player's tag, render it to every local viewer and
    /// broadcast it. Returns `false` when the player is not online here.
    ///
    /// The change is applied on the feature queue.
    pub fn set_tag(&self, sync: &ProxySync, tablist_id: Uuid, tag: NameTag) -> bool {
        if sync.local_player(&tablist_id).is_none() {
            return false;
        }
        self.run(sync, move |this, sync| {
            // The player may have left before the queue got here.
            let Some(player) = sync.local_player(&tablist_id) else {
                return;
            };
            let previous = this.local.insert(tablist_id, tag.clone());
            if let Some(previous) = previous.filter(|p| p.team_name != tag.team_name) {
                unregister_everywhere(sync, &previous.team_name);
            }
            render_everywhere(sync, &tag, &player.nickname());
            sync.send(&to_update(tablist_id, &tag));
        })
    }

    /// Queue `task` on the feature queue. `false` when the feature or the
    /// context is gone or the queue is stopped.
    fn run(
        &self,
        sync: &ProxySync,
        task: impl FnOnce(&NameTagSync, &ProxySync) + Send + 'static,
    ) -> bool {
        let (Some(this), Some(sync)) = (self.this.upgrade(), sync.handle().upgrade()) else {
            return false;
        };
        self.queue.submit(move || task(&*this, &*sync))
    }

    fn apply_remote(&self, sync: &ProxySync, update: NameTagUpdate) {
        let changed = sync.directory().update(&update.tablist_id, |e| {
            let previous = e.team_name.replace(update.team_name.clone());
            e.tag_prefix = Some(update.prefix.clone());
            e.tag_suffix = Some(update.suffix.clone());
            e.name_visibility = Some(update.name_visibility);
            (previous, e.clone())
        });
        let Some((previous, entity)) = changed else {
            return;
        };
        if !entity.is_connected() {
            return;
        }
        if let Some(previous) = previous.filter(|p| *p != update.team_name) {
            unregister_everywhere(sync, &previous);
        }
        if let Some(tag) = NameTag::from_entity(&entity) {
            render_everywhere(sync, &tag, &entity.nickname);
        }
    }

    /// Render every known tag to one viewer.
    fn render_all_to(&self, sync: &ProxySync, viewer: &LocalPlayer) {
        for entry in self.local.iter() {
            if let Some(owner) = sync.local_player(entry.key()) {
                render(viewer, entry.value(), &owner.nickname());
            }
        }
        for entity in sync.directory().connected() {
            if let Some(tag) = NameTag::from_entity(&entity) {
                render(viewer, &tag, &entity.nickname);
            }
        }
    }
}

fn to_update(tablist_id: Uuid, tag: &NameTag) -> NameTagUpdate {
    NameTagUpdate {
        tablist_id,
        team_name: tag.team_name.clone(),
        prefix: tag.prefix.clone(),
        suffix: tag.suffix.clone(),
        name_visibility: tag.visibility,
    }
}

fn render(viewer: &LocalPlayer, tag: &NameTag, nickname: &str) {
    viewer
        .connection()
        .upsert_team(&tag.team_name, tag.parameters(), vec![nickname.to_string()]);
}

fn render_everywhere(sync: &ProxySync, tag: &NameTag, nickname: &str) {
    for viewer in sync.local_players() {
        render(&viewer, tag, nickname);
    }
}

fn unregister_everywhere(sync: &ProxySync, team_name: &str) {
    for viewer in sync.local_players() {
        viewer.connection().unregister_team(team_name);
    }
}

struct NameTagMessage {
    update: NameTagUpdate,
    feature: Arc<NameTagSync>,
}

impl SyncMessage for NameTagMessage {
    fn affinity(&self) -> Option<TaskQueue> {
        Some(self.feature.queue.clone())
    }

    fn process(self: Box<Self>, sync: &ProxySync, _sender: NodeId) {
        self.feature.apply_remote(sync, self.update);
    }
}

impl SyncFeature for NameTagSync {
    fn name(&self) -> &str {
        "nametags"
    }

    fn register_messages(self: Arc<Self>, registry: &mut MessageRegistry) {
        registry.register::<NameTagUpdate, _>(tag::TEAMS, move |update| {
            Box::new(NameTagMessage {
                update,
                feature: self.clone(),
            })
        });
    }

    fn queue(&self) -> Option<&TaskQueue> {
        Some(&self.queue)
    }

    fn on_join(&self, sync: &ProxySync, player: &Arc<LocalPlayer>) {
        player.connection().set_anti_override_teams(self.anti_override);
        let player = player.clone();
        self.run(sync, move |this, sync| {
            if sync.local_player(&player.tablist_id()).is_some() {
                this.render_all_to(sync, &player);
            }
        });
    }

    fn on_quit(&self, sync: &ProxySync, player: &LocalPlayer) {
        let tablist_id = player.tablist_id();
        self.run(sync, move |this, sync| {
            if let Some((_, tag)) = this.local.remove(&tablist_id) {
                unregister_everywhere(sync, &tag.team_name);
            }
        });
    }

    fn on_remote_join(&self, sync: &ProxySync, entity: &RemoteEntity) {
        let tablist_id = entity.tablist_id;
        self.run(sync, move |_, sync| {
            // A promoted entity may already carry a tag.
            let current = sync
                .directory()
                .get(&tablist_id)
                .filter(RemoteEntity::is_connected);
            if let Some(entity) = current {
                if let Some(tag) = NameTag::from_entity(&entity) {
                    render_everywhere(sync, &tag, &entity.nickname);
                }
            }
        });
    }

    fn on_remote_quit(&self, sync: &ProxySync, entity: &RemoteEntity) {
        let Some(team_name) = entity.team_name.clone() else {
            error!(
                "Unable to unregister team of remote player {} on server {} because team is null",
                entity.name, entity.server
            );
            return;
        };
        self.run(sync, move |_, sync| unregister_everywhere(sync, &team_name));
    }

    fn on_load_request(&self, sync: &ProxySync) {
        self.run(sync, |this, sync| {
            for entry in this.local.iter() {
                sync.send(&to_update(*entry.key(), entry.value()));
            }
        });
    }

    fn on_nickname_change(&self, sync: &ProxySync, tablist_id: Uuid, old_nickname: &str) {
        let old_nickname = old_nickname.to_string();
        self.run(sync, move |this, sync| {
            let rendered = match sync.local_player(&tablist_id) {
                Some(player) => this.tag_of(&tablist_id).map(|t| (t, player.nickname())),
                None => sync
                    .directory()
                    .get(&tablist_id)
                    .filter(RemoteEntity::is_connected)
                    .and_then(|e| NameTag::from_entity(&e).map(|t| (t, e.nickname))),
            };
            if let Some((tag, nickname)) = rendered {
                debug!("Moving team {} from {old_nickname} to {nickname}", tag.team_name);
                render_everywhere(sync, &tag, &nickname);
            }
        });
    }
}
