//! Number replication for the belowname and playerlist objectives.

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tabsync_proto::messages::ScoreUpdate;
use tabsync_proto::packets::{DisplaySlot, ObjectiveAction, RenderType, SetObjective};
use tabsync_proto::types::{NodeId, Uuid};
use tabsync_scoreboard::{Category, EnforcementMode, PlayerConnection, ScoreboardObserver};
use tracing::debug;

use crate::directory::{RemoteEntity, ScoreValue};
use crate::player::LocalPlayer;
use crate::registry::{tag, MessageRegistry, SyncMessage};
use crate::sync::{ProxySync, SyncFeature};

/// Which objective a [`ScoreSync`] drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreKind {
    /// Number under the nametag.
    BelowName,
    /// Yellow number in the tab list.
    PlayerList,
}

impl ScoreKind {
    pub fn tag(self) -> &'static str {
        match self {
            Self::BelowName => tag::BELOWNAME,
            Self::PlayerList => tag::YELLOW_NUMBER,
        }
    }

    pub fn objective(self) -> &'static str {
        match self {
            Self::BelowName => "TAB-BelowName",
            Self::PlayerList => "TAB-YellowNumber",
        }
    }

    pub fn slot(self) -> DisplaySlot {
        match self {
            Self::BelowName => DisplaySlot::BelowName,
            Self::PlayerList => DisplaySlot::PlayerList,
        }
    }

    pub fn value_of(self, entity: &RemoteEntity) -> &ScoreValue {
        match self {
            Self::BelowName => &entity.belowname,
            Self::PlayerList => &entity.playerlist,
        }
    }

    fn value_mut(self, entity: &mut RemoteEntity) -> &mut ScoreValue {
        match self {
            Self::BelowName => &mut entity.belowname,
            Self::PlayerList => &mut entity.playerlist,
        }
    }
}

pub struct ScoreSync {
    kind: ScoreKind,
    title: String,
    anti_override: bool,
    /// Values of local players by tab-list id.
    local: DashMap<Uuid, ScoreValue>,
}

impl ScoreSync {
    pub fn new(kind: ScoreKind, title: impl Into<String>, anti_override: bool) -> Arc<Self> {
        Arc::new(Self {
            kind,
            title: title.into(),
            anti_override,
            local: DashMap::new(),
        })
    }

    pub fn kind(&self) -> ScoreKind {
        self.kind
    }

    pub fn value_of(&self, tablist_id: &Uuid) -> Option<ScoreValue> {
        self.local.get(tablist_id).map(|v| v.value().clone())
    }

    /// Set a local player's value, show it to every local viewer and
    /// broadcast it. Returns `false` when the player is not online here.
    pub fn set_value(&self, sync: &ProxySync, tablist_id: Uuid, value: ScoreValue) -> bool {
        let Some(player) = sync.local_player(&tablist_id) else {
            return false;
        };
        self.local.insert(tablist_id, value.clone());
        self.show_everywhere(sync, &player.nickname(), &value);
        sync.send_tagged(self.kind.tag(), &to_update(tablist_id, &value));
        true
    }

    fn apply_remote(&self, sync: &ProxySync, update: ScoreUpdate) {
        let kind = self.kind;
        let updated = sync.directory().update(&update.tablist_id, |e| {
            *kind.value_mut(e) = ScoreValue::new(update.value, update.fancy_value.as_str());
            e.clone()
        });
        let Some(entity) = updated.filter(RemoteEntity::is_connected) else {
            return;
        };
        self.show_everywhere(sync, &entity.nickname, kind.value_of(&entity));
    }

    fn show(&self, viewer: &LocalPlayer, holder: &str, value: &ScoreValue) {
        viewer.connection().set_score(
            self.kind.objective(),
            holder,
            value.value,
            value.fancy.clone(),
        );
    }

    fn show_everywhere(&self, sync: &ProxySync, holder: &str, value: &ScoreValue) {
        for viewer in sync.local_players() {
            self.show(&viewer, holder, value);
        }
    }

    fn hide_everywhere(&self, sync: &ProxySync, holder: &str) {
        for viewer in sync.local_players() {
            viewer.connection().remove_score(self.kind.objective(), holder);
        }
    }

    fn show_all_to(&self, sync: &ProxySync, viewer: &LocalPlayer) {
        for entry in self.local.iter() {
            if let Some(owner) = sync.local_player(entry.key()) {
                self.show(viewer, &owner.nickname(), entry.value());
            }
        }
        for entity in sync.directory().connected() {
            self.show(viewer, &entity.nickname, self.kind.value_of(&entity));
        }
    }
}

fn to_update(tablist_id: Uuid, value: &ScoreValue) -> ScoreUpdate {
    ScoreUpdate {
        tablist_id,
        value: value.value,
        fancy_value: value.fancy_or_empty().to_string(),
    }
}

struct ScoreMessage {
    update: ScoreUpdate,
    feature: Arc<ScoreSync>,
}

impl SyncMessage for ScoreMessage {
    fn process(self: Box<Self>, sync: &ProxySync, _sender: NodeId) {
        self.feature.apply_remote(sync, self.update);
    }
}

/// Puts the objective back when another plugin takes its slot or
/// unregisters it.
struct ReassertGuard {
    kind: ScoreKind,
    sync: Weak<ProxySync>,
}

impl ReassertGuard {
    fn schedule(&self, connection: &PlayerConnection) {
        let Some(sync) = self.sync.upgrade() else {
            return;
        };
        let Some(player) = sync.local_player_by_connection(connection.id()) else {
            return;
        };
        debug!(
            "{} was overridden for {}, re-asserting",
            self.kind.objective(),
            connection.name()
        );
        // Runs after the foreign packet went out.
        sync.processing().submit(move || {
            player.connection().reassert_overridden();
        });
    }
}

impl ScoreboardObserver for ReassertGuard {
    fn on_display_objective(&self, connection: &PlayerConnection, slot: DisplaySlot, objective: &str) {
        if slot == self.kind.slot()
            && objective != self.kind.objective()
            && connection.mode(Category::DisplaySlot) == EnforcementMode::Enforcing
        {
            self.schedule(connection);
        }
    }

    fn on_objective(&self, connection: &PlayerConnection, packet: &SetObjective) {
        if packet.name == self.kind.objective()
            && packet.action == ObjectiveAction::Unregister
            && connection.mode(Category::Objective) == EnforcementMode::Enforcing
        {
            self.schedule(connection);
        }
    }
}

impl SyncFeature for ScoreSync {
    fn name(&self) -> &str {
        self.kind.objective()
    }

    fn register_messages(self: Arc<Self>, registry: &mut MessageRegistry) {
        registry.register::<ScoreUpdate, _>(self.kind.tag(), move |update| {
            Box::new(ScoreMessage {
                update,
                feature: self.clone(),
            })
        });
    }

    fn on_join(&self, sync: &ProxySync, player: &Arc<LocalPlayer>) {
        let connection = player.connection();
        connection.set_anti_override_scoreboard(self.anti_override);
        connection.add_observer(Arc::new(ReassertGuard {
            kind: self.kind,
            sync: sync.handle(),
        }));
        connection.register_objective(self.kind.objective(), &self.title, RenderType::Integer, None);
        connection.set_display_slot(self.kind.slot(), self.kind.objective());
        self.show_all_to(sync, player);
    }

    fn on_quit(&self, sync: &ProxySync, player: &LocalPlayer) {
        self.local.remove(&player.tablist_id());
        self.hide_everywhere(sync, &player.nickname());
    }

    fn on_remote_join(&self, sync: &ProxySync, entity: &RemoteEntity) {
        self.show_everywhere(sync, &entity.nickname, self.kind.value_of(entity));
    }

    fn on_remote_quit(&self, sync: &ProxySync, entity: &RemoteEntity) {
        self.hide_everywhere(sync, &entity.nickname);
    }

    fn on_load_request(&self, sync: &ProxySync) {
        for entry in self.local.iter() {
            sync.send_tagged(self.kind.tag(), &to_update(*entry.key(), entry.value()));
        }
    }

    fn on_nickname_change(&self, sync: &ProxySync, tablist_id: Uuid, old_nickname: &str) {
        let current = match sync.local_player(&tablist_id) {
            Some(player) => Some((player.nickname(), self.value_of(&tablist_id).unwrap_or_default())),
            None => sync
                .directory()
                .get(&tablist_id)
                .filter(RemoteEntity::is_connected)
                .map(|e| (e.nickname.clone(), self.kind.value_of(&e).clone())),
        };
        if let Some((nickname, value)) = current {
            self.hide_everywhere(sync, old_nickname);
            self.show_everywhere(sync, &nickname, &value);
        }
    }
}
