mod common;

use std::sync::Arc;
use std::time::Duration;

use tabsync_proto::packets::{
    DisplaySlot, PacketKind, RawPacket, ScoreAction, SetDisplayObjective, TeamAction,
};
use tabsync_proto::types::NameVisibility;
use tabsync_scoreboard::{PacketSink, PlayerConnection, RecordingSink};
use tabsync_sync::features::NameTag;
use tabsync_sync::{LocalBus, LocalPlayer, ScoreValue};

use common::{scores, settle, teams, uuid, Node, SHAPE};

fn red() -> NameTag {
    NameTag {
        team_name: "red".into(),
        prefix: "[R] ".into(),
        suffix: String::new(),
        visibility: NameVisibility::Always,
    }
}

#[tokio::test]
async fn nametag_reaches_remote_viewers() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    let b = Node::start(&bus);
    a.join("Steve", 1, "lobby");
    let (_, alex_sink) = b.join("Alex", 2, "lobby");
    settle(&[&a, &b]).await;
    alex_sink.take();

    assert!(a.nametags.set_tag(&a.sync, uuid(1), red()));
    settle(&[&a, &b]).await;

    let sent = teams(&alex_sink.take());
    let create = sent.iter().find(|t| t.name == "red").unwrap();
    assert_eq!(create.action, TeamAction::Create);
    assert_eq!(create.entries, vec!["Steve".to_string()]);
    assert_eq!(create.parameters.as_ref().unwrap().prefix, "[R] ");

    let entity = b.sync.directory().get(&uuid(1)).unwrap();
    assert_eq!(entity.team_name.as_deref(), Some("red"));
}

#[tokio::test]
async fn late_viewer_receives_existing_tags() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    a.join("Steve", 1, "lobby");
    a.nametags.set_tag(&a.sync, uuid(1), red());
    settle(&[&a]).await;

    let b = Node::start(&bus);
    let (_, alex_sink) = b.join("Alex", 2, "lobby");
    b.sync.load();
    settle(&[&a, &b]).await;

    let sent = teams(&alex_sink.take());
    assert!(sent
        .iter()
        .any(|t| t.name == "red" && t.entries == vec!["Steve".to_string()]));
}

#[tokio::test]
async fn remote_quit_unregisters_team() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    let b = Node::start(&bus);
    a.join("Steve", 1, "lobby");
    let (_, alex_sink) = b.join("Alex", 2, "lobby");
    a.nametags.set_tag(&a.sync, uuid(1), red());
    settle(&[&a, &b]).await;
    alex_sink.take();

    a.sync.player_quit(&uuid(1));
    settle(&[&a, &b]).await;

    let sent = teams(&alex_sink.take());
    assert!(sent
        .iter()
        .any(|t| t.name == "red" && t.action == TeamAction::Remove));
}

/// Sink that takes a while per packet, so rendering overlaps the next event.
struct SlowSink(RecordingSink);

impl PacketSink for SlowSink {
    fn send_packet(&self, packet: RawPacket) {
        std::thread::sleep(Duration::from_millis(5));
        self.0.send_packet(packet);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn quit_right_after_retag_leaves_no_team_behind() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    let b = Node::start(&bus);
    a.join("Steve", 1, "lobby");
    let viewers: Vec<_> = (10..16)
        .map(|id| {
            let sink = Arc::new(SlowSink(RecordingSink::new()));
            let name = format!("Viewer{id}");
            let connection = Arc::new(PlayerConnection::new(&name, uuid(id), SHAPE, sink));
            b.sync.player_joined(LocalPlayer::new("lobby", connection))
        })
        .collect();
    a.nametags.set_tag(&a.sync, uuid(1), red());
    settle(&[&a, &b]).await;

    // B gets the retag and the quit back to back while still rendering.
    let blue = NameTag {
        team_name: "blue".into(),
        ..red()
    };
    assert!(a.nametags.set_tag(&a.sync, uuid(1), blue));
    a.sync.flush().await;
    a.sync.player_quit(&uuid(1));
    settle(&[&a, &b]).await;

    for viewer in &viewers {
        viewer.connection().with_state(|s| {
            assert!(s.team("red").is_none());
            assert!(s.team("blue").is_none());
        });
    }
    assert!(b.sync.directory().get(&uuid(1)).is_none());
    assert!(a.nametags.tag_of(&uuid(1)).is_none());
}

#[tokio::test]
async fn remote_quit_without_tag_is_harmless() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    let b = Node::start(&bus);
    a.join("Steve", 1, "lobby");
    let (_, alex_sink) = b.join("Alex", 2, "lobby");
    settle(&[&a, &b]).await;
    alex_sink.take();

    a.sync.player_quit(&uuid(1));
    settle(&[&a, &b]).await;

    assert!(teams(&alex_sink.take()).is_empty());
    assert_eq!(b.remote_quits(), 1);
}

#[tokio::test]
async fn belowname_value_reaches_remote_viewers() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    let b = Node::start(&bus);
    a.join("Steve", 1, "lobby");
    let (_, alex_sink) = b.join("Alex", 2, "lobby");
    settle(&[&a, &b]).await;
    alex_sink.take();

    assert!(a.belowname.set_value(&a.sync, uuid(1), ScoreValue::new(20, "")));
    assert!(!a.belowname.set_value(&a.sync, uuid(7), ScoreValue::new(1, "")));
    settle(&[&a, &b]).await;

    let sent = scores(&alex_sink.take());
    let score = sent.iter().find(|s| s.holder == "Steve").unwrap();
    assert_eq!(score.action, ScoreAction::Change);
    assert_eq!(score.objective, "TAB-BelowName");
    assert_eq!(score.value, 20);
    assert_eq!(b.sync.directory().get(&uuid(1)).unwrap().belowname.value, 20);
}

#[tokio::test]
async fn remote_nickname_change_moves_team_entry() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    let b = Node::start(&bus);
    a.join("Steve", 1, "lobby");
    let (alex, alex_sink) = b.join("Alex", 2, "lobby");
    a.nametags.set_tag(&a.sync, uuid(1), red());
    settle(&[&a, &b]).await;
    alex_sink.take();

    b.sync.on_entry_add(&alex, uuid(1), "Notch");
    assert_eq!(b.sync.directory().get(&uuid(1)).unwrap().nickname, "Notch");
    b.sync.flush().await;

    let sent = teams(&alex_sink.take());
    assert!(sent
        .iter()
        .any(|t| t.action == TeamAction::AddEntries && t.entries == vec!["Notch".to_string()]));
    assert!(sent
        .iter()
        .any(|t| t.action == TeamAction::RemoveEntries && t.entries == vec!["Steve".to_string()]));
}

#[tokio::test]
async fn local_nickname_only_changes_from_own_packet() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    let (alex, _) = a.join("Alex", 2, "lobby");
    let (bob, _) = a.join("Bob", 3, "lobby");

    a.sync.on_entry_add(&bob, alex.tablist_id(), "Other");
    assert_eq!(alex.nickname(), "Alex");

    a.sync.on_entry_add(&alex, alex.tablist_id(), "Other");
    assert_eq!(alex.nickname(), "Other");
}

#[tokio::test]
async fn taken_display_slot_is_reasserted() {
    let bus = LocalBus::new();
    let a = Node::start(&bus);
    let (alex, alex_sink) = a.join("Alex", 2, "lobby");
    alex_sink.take();

    let foreign = SHAPE.encode(&SetDisplayObjective::new(DisplaySlot::BelowName, "other"));
    let forwarded = alex.connection().on_outbound(foreign.clone());
    assert_eq!(forwarded, foreign);
    a.sync.flush().await;

    let display_id = SHAPE.packet_id(PacketKind::SetDisplayObjective);
    let restored: Vec<SetDisplayObjective> = alex_sink
        .take()
        .iter()
        .filter(|p| p.id == display_id)
        .map(|p| SHAPE.decode(p).unwrap())
        .collect();
    assert_eq!(
        restored,
        vec![SetDisplayObjective::new(DisplaySlot::BelowName, "TAB-BelowName")]
    );
}
