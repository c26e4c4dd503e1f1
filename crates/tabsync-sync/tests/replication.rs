mod common;

use bytes::Bytes;
use tabsync_proto::envelope::Envelope;
use tabsync_proto::messages::{Load, LoadRequest, NameTagUpdate};
use tabsync_proto::types::{NameVisibility, NodeId};
use tabsync_sync::{ConnectionState, LocalBus};

use common::{settle, uuid, Node};

#[tokio::test]
async fn late_node_learns_existing_players() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    a.join("Steve", 1, "lobby");
    settle(&[&a]).await;

    let b = Node::start(&bus);
    b.sync.load();
    settle(&[&a, &b]).await;

    let steve = b.sync.directory().get(&uuid(1)).unwrap();
    assert_eq!(steve.name, "Steve");
    assert_eq!(steve.nickname, "Steve");
    assert_eq!(steve.server, "lobby");
    assert_eq!(steve.origin, a.sync.node_id());
    assert_eq!(steve.state, ConnectionState::Connected);
    assert_eq!(b.remote_joins(), 1);
}

#[tokio::test]
async fn own_messages_are_ignored() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    a.join("Steve", 1, "lobby");
    a.sync.load();
    settle(&[&a]).await;

    assert!(a.sync.directory().is_empty());
    assert_eq!(a.remote_joins(), 0);
}

#[tokio::test]
async fn repeated_join_is_announced_once() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    let b = Node::start(&bus);
    let (steve, _) = a.join("Steve", 1, "lobby");
    a.sync.send(&steve.to_join());
    a.sync.send(&steve.to_join());
    settle(&[&a, &b]).await;

    assert_eq!(b.sync.directory().len(), 1);
    assert_eq!(b.remote_joins(), 1);
}

#[tokio::test]
async fn quit_is_final() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    let b = Node::start(&bus);
    b.join("Alex", 2, "lobby");
    a.join("Steve", 1, "lobby");
    settle(&[&a, &b]).await;
    assert!(b.sync.directory().contains(&uuid(1)));

    a.sync.player_quit(&uuid(1));
    settle(&[&a, &b]).await;
    assert!(!b.sync.directory().contains(&uuid(1)));
    assert_eq!(b.remote_quits(), 1);

    // A late update for the departed player does not resurrect it.
    a.sync.send(&NameTagUpdate {
        tablist_id: uuid(1),
        team_name: "late".into(),
        prefix: String::new(),
        suffix: String::new(),
        name_visibility: NameVisibility::Always,
    });
    settle(&[&a, &b]).await;
    assert!(b.sync.directory().is_empty());
}

#[tokio::test]
async fn switch_from_other_node_is_queued_until_local_quit() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    let b = Node::start(&bus);
    a.join("Steve", 1, "lobby");
    settle(&[&a, &b]).await;

    // Steve reconnects through B before A saw the disconnect.
    b.join("Steve", 1, "survival");
    settle(&[&a, &b]).await;

    let queued = a.sync.directory().get(&uuid(1)).unwrap();
    assert_eq!(queued.state, ConnectionState::Queued);
    assert_eq!(a.remote_joins(), 0);
    assert_eq!(a.sync.online_count(), 1);

    a.sync.player_quit(&uuid(1));
    let promoted = a.sync.directory().get(&uuid(1)).unwrap();
    assert_eq!(promoted.state, ConnectionState::Connected);
    assert_eq!(promoted.server, "survival");
    assert_eq!(promoted.origin, b.sync.node_id());
    assert_eq!(a.remote_joins(), 1);
}

#[tokio::test]
async fn load_replaces_sender_players() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    let b = Node::start(&bus);
    a.join("Steve", 1, "lobby");
    let (alex, _) = a.join("Alex", 2, "lobby");
    settle(&[&a, &b]).await;
    assert_eq!(b.sync.directory().len(), 2);

    let mut join = alex.to_join();
    join.server = "arena".into();
    a.sync.send(&Load {
        players: vec![join],
    });
    settle(&[&a, &b]).await;

    assert!(!b.sync.directory().contains(&uuid(1)));
    assert_eq!(b.sync.directory().get(&uuid(2)).unwrap().server, "arena");
    assert_eq!(b.remote_quits(), 1);
    assert_eq!(*b.recorder.switches.lock(), vec!["arena".to_string()]);
}

#[tokio::test]
async fn server_switch_is_replicated() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    let b = Node::start(&bus);
    a.join("Steve", 1, "lobby");
    settle(&[&a, &b]).await;

    assert!(a.sync.server_switched(&uuid(1), "arena"));
    assert!(!a.sync.server_switched(&uuid(9), "arena"));
    settle(&[&a, &b]).await;

    assert_eq!(b.sync.directory().get(&uuid(1)).unwrap().server, "arena");
    assert_eq!(*b.recorder.switches.lock(), vec!["arena".to_string()]);
    assert_eq!(b.sync.server_online_count("arena"), 1);
    assert_eq!(b.sync.server_online_count("lobby"), 0);
}

#[tokio::test]
async fn counters_skip_vanished_players() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    let b = Node::start(&bus);
    let (steve, _) = a.join("Steve", 1, "lobby");
    b.join("Alex", 2, "lobby");
    settle(&[&a, &b]).await;
    assert_eq!(a.sync.online_count(), 2);
    assert_eq!(b.sync.online_count(), 2);
    assert_eq!(b.sync.staff_online_count(), 0);

    a.sync.vanish_changed(&steve.tablist_id(), true);
    settle(&[&a, &b]).await;
    assert!(b.sync.directory().get(&uuid(1)).unwrap().vanished);
    assert_eq!(a.sync.online_count(), 1);
    assert_eq!(b.sync.online_count(), 1);
    assert_eq!(b.sync.server_online_count("lobby"), 1);
}

#[tokio::test]
async fn malformed_and_unknown_messages_are_dropped() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    a.join("Steve", 1, "lobby");

    a.sync.dispatch(Bytes::from_static(&[0x01, 0x02]));
    a.sync
        .dispatch(Envelope::encode_message(NodeId::random(), "unknown", &LoadRequest));
    settle(&[&a]).await;

    assert!(a.sync.directory().is_empty());
    assert_eq!(a.sync.online_count(), 1);
}

#[tokio::test]
async fn unload_announces_quits() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    let b = Node::start(&bus);
    a.join("Steve", 1, "lobby");
    a.join("Alex", 2, "lobby");
    settle(&[&a, &b]).await;
    assert_eq!(b.sync.directory().len(), 2);

    a.sync.unload().await;
    b.sync.flush().await;

    assert!(b.sync.directory().is_empty());
    assert_eq!(b.remote_quits(), 2);
}
