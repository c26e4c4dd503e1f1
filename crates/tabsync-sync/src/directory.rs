//! Players known through other nodes.

use std::collections::HashSet;

use dashmap::DashMap;
use tabsync_proto::messages::{PlayerJoin, Skin};
use tabsync_proto::types::{NameVisibility, NodeId, Uuid};

/// Lifecycle of a remote entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// The same real player is still connected to this node, so the entity
    /// is held back until the local player leaves.
    Queued,
    Connected,
    Disconnected,
}

/// A scoreboard number with optional pre-formatted display text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScoreValue {
    pub value: i32,
    pub fancy: Option<String>,
}

impl ScoreValue {
    pub fn new(value: i32, fancy: impl Into<String>) -> Self {
        let fancy = fancy.into();
        Self {
            value,
            fancy: (!fancy.is_empty()).then_some(fancy),
        }
    }

    /// Wire form of the fancy text; empty when absent.
    pub fn fancy_or_empty(&self) -> &str {
        self.fancy.as_deref().unwrap_or("")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntity {
    pub unique_id: Uuid,
    pub tablist_id: Uuid,
    pub name: String,
    pub nickname: String,
    pub server: String,
    pub vanished: bool,
    pub staff: bool,
    pub skin: Option<Skin>,
    pub team_name: Option<String>,
    pub tag_prefix: Option<String>,
    pub tag_suffix: Option<String>,
    pub name_visibility: Option<NameVisibility>,
    pub belowname: ScoreValue,
    pub playerlist: ScoreValue,
    pub state: ConnectionState,
    /// Node this entity was learned from.
    pub origin: NodeId,
}

impl RemoteEntity {
    pub fn from_join(join: &PlayerJoin, origin: NodeId) -> Self {
        Self {
            unique_id: join.unique_id,
            tablist_id: join.tablist_id,
            name: join.name.clone(),
            nickname: join.name.clone(),
            server: join.server.clone(),
            vanished: join.vanished,
            staff: join.staff,
            skin: join.skin.clone(),
            team_name: None,
            tag_prefix: None,
            tag_suffix: None,
            name_visibility: None,
            belowname: ScoreValue::default(),
            playerlist: ScoreValue::default(),
            state: ConnectionState::Disconnected,
            origin,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// Concurrent map of remote entities keyed by tab-list id.
///
/// Reads return clones. Closures passed to [`update`](Self::update) run under
/// the entry's shard lock and must not call back into the directory.
#[derive(Debug, Default)]
pub struct RemoteNodeDirectory {
    entities: DashMap<Uuid, RemoteEntity>,
}

impl RemoteNodeDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, tablist_id: &Uuid) -> Option<RemoteEntity> {
        self.entities.get(tablist_id).map(|e| e.value().clone())
    }

    pub fn contains(&self, tablist_id: &Uuid) -> bool {
        self.entities.contains_key(tablist_id)
    }

    /// Insert or replace, returning the previous entity.
    pub fn insert(&self, entity: RemoteEntity) -> Option<RemoteEntity> {
        self.entities.insert(entity.tablist_id, entity)
    }

    pub fn remove(&self, tablist_id: &Uuid) -> Option<RemoteEntity> {
        self.entities.remove(tablist_id).map(|(_, e)| e)
    }

    /// Mutate an entity in place. `None` when it is absent.
    pub fn update<R>(&self, tablist_id: &Uuid, f: impl FnOnce(&mut RemoteEntity) -> R) -> Option<R> {
        self.entities.get_mut(tablist_id).map(|mut e| f(e.value_mut()))
    }

    pub fn snapshot(&self) -> Vec<RemoteEntity> {
        self.entities.iter().map(|e| e.value().clone()).collect()
    }

    /// Connected entities only.
    pub fn connected(&self) -> Vec<RemoteEntity> {
        self.entities
            .iter()
            .filter(|e| e.is_connected())
            .map(|e| e.value().clone())
            .collect()
    }

    /// Tab-list ids of entities queued behind the given real player.
    pub fn queued_for(&self, unique_id: &Uuid) -> Vec<Uuid> {
        self.entities
            .iter()
            .filter(|e| e.state == ConnectionState::Queued && e.unique_id == *unique_id)
            .map(|e| *e.key())
            .collect()
    }

    /// Remove every entity learned from `origin` whose id is not in `keep`.
    pub fn remove_stale(&self, origin: NodeId, keep: &HashSet<Uuid>) -> Vec<RemoteEntity> {
        let stale: Vec<Uuid> = self
            .entities
            .iter()
            .filter(|e| e.origin == origin && !keep.contains(e.key()))
            .map(|e| *e.key())
            .collect();
        stale.iter().filter_map(|id| self.remove(id)).collect()
    }

    pub fn clear(&self) {
        self.entities.clear();
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn entity(id: u64, origin: NodeId) -> RemoteEntity {
        let join = PlayerJoin {
            unique_id: Uuid::new(id, id),
            tablist_id: Uuid::new(id, id),
            name: format!("player{id}"),
            server: "lobby".into(),
            vanished: false,
            staff: false,
            skin: None,
        };
        RemoteEntity::from_join(&join, origin)
    }

    #[test]
    fn from_join_defaults() {
        let e = entity(1, NodeId::random());
        assert_eq!(e.nickname, e.name);
        assert_eq!(e.team_name, None);
        assert_eq!(e.state, ConnectionState::Disconnected);
    }

    #[test]
    fn update_absent_is_none() {
        let dir = RemoteNodeDirectory::new();
        assert_eq!(dir.update(&Uuid::new(1, 1), |e| e.vanished = true), None);
    }

    #[test]
    fn remove_stale_only_touches_origin() {
        let dir = RemoteNodeDirectory::new();
        let a = NodeId::random();
        let b = NodeId::random();
        dir.insert(entity(1, a));
        dir.insert(entity(2, a));
        dir.insert(entity(3, b));

        let keep: HashSet<Uuid> = [Uuid::new(1, 1)].into_iter().collect();
        let removed = dir.remove_stale(a, &keep);
        assert_eq!(removed.len(), 1);
        assert_eq!(removed[0].tablist_id, Uuid::new(2, 2));
        assert!(dir.contains(&Uuid::new(1, 1)));
        assert!(dir.contains(&Uuid::new(3, 3)));
    }

    #[test]
    fn score_value_empty_fancy() {
        assert_eq!(ScoreValue::new(3, "").fancy, None);
        assert_eq!(ScoreValue::new(3, "3❤").fancy_or_empty(), "3❤");
    }

    #[test]
    fn concurrent_updates_are_not_lost() {
        let dir = Arc::new(RemoteNodeDirectory::new());
        let origin = NodeId::random();
        let id = Uuid::new(7, 7);
        let mut e = entity(7, origin);
        e.state = ConnectionState::Connected;
        dir.insert(e);

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let dir = dir.clone();
                thread::spawn(move || {
                    for i in 0..1000 {
                        dir.update(&id, |e| {
                            e.belowname.value += 1;
                            e.nickname = format!("t{t}-{i}");
                            e.server = format!("t{t}-{i}");
                        });
                        if let Some(seen) = dir.get(&id) {
                            // Both fields are written under one lock.
                            assert_eq!(seen.nickname, seen.server);
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(dir.get(&id).unwrap().belowname.value, 8000);
    }
}
