//! Players connected to this node.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tabsync_proto::messages::{PlayerJoin, Skin};
use tabsync_proto::types::Uuid;
use tabsync_scoreboard::PlayerConnection;

pub struct LocalPlayer {
    unique_id: Uuid,
    tablist_id: Uuid,
    name: String,
    nickname: RwLock<String>,
    server: RwLock<String>,
    vanished: AtomicBool,
    staff: bool,
    skin: Option<Skin>,
    connection: Arc<PlayerConnection>,
}

impl std::fmt::Debug for LocalPlayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalPlayer")
            .field("name", &self.name)
            .field("tablist_id", &self.tablist_id)
            .field("server", &*self.server.read())
            .finish()
    }
}

impl LocalPlayer {
    /// The tab-list id defaults to the connection's id.
    pub fn new(server: impl Into<String>, connection: Arc<PlayerConnection>) -> Self {
        let name = connection.name().to_string();
        Self {
            unique_id: connection.id(),
            tablist_id: connection.id(),
            nickname: RwLock::new(name.clone()),
            name,
            server: RwLock::new(server.into()),
            vanished: AtomicBool::new(false),
            staff: false,
            skin: None,
            connection,
        }
    }

    pub fn with_tablist_id(mut self, tablist_id: Uuid) -> Self {
        self.tablist_id = tablist_id;
        self
    }

    pub fn with_staff(mut self, staff: bool) -> Self {
        self.staff = staff;
        self
    }

    pub fn with_skin(mut self, skin: Skin) -> Self {
        self.skin = Some(skin);
        self
    }

    pub fn with_vanished(self, vanished: bool) -> Self {
        self.vanished.store(vanished, Ordering::Relaxed);
        self
    }

    pub fn unique_id(&self) -> Uuid {
        self.unique_id
    }

    pub fn tablist_id(&self) -> Uuid {
        self.tablist_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nickname(&self) -> String {
        self.nickname.read().clone()
    }

    /// Returns the previous nickname.
    pub fn set_nickname(&self, nickname: &str) -> String {
        std::mem::replace(&mut *self.nickname.write(), nickname.to_string())
    }

    pub fn server(&self) -> String {
        self.server.read().clone()
    }

    pub(crate) fn set_server(&self, server: &str) {
        *self.server.write() = server.to_string();
    }

    pub fn is_vanished(&self) -> bool {
        self.vanished.load(Ordering::Relaxed)
    }

    pub(crate) fn set_vanished(&self, vanished: bool) -> bool {
        self.vanished.swap(vanished, Ordering::Relaxed)
    }

    pub fn is_staff(&self) -> bool {
        self.staff
    }

    pub fn skin(&self) -> Option<&Skin> {
        self.skin.as_ref()
    }

    pub fn connection(&self) -> &Arc<PlayerConnection> {
        &self.connection
    }

    /// Join message announcing this player.
    pub fn to_join(&self) -> PlayerJoin {
        PlayerJoin {
            unique_id: self.unique_id,
            tablist_id: self.tablist_id,
            name: self.name.clone(),
            server: self.server(),
            vanished: self.is_vanished(),
            staff: self.staff,
            skin: self.skin.clone(),
        }
    }
}
