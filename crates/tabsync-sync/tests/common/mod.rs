#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tabsync_proto::packets::{PacketKind, RawPacket, SetPlayerTeam, SetScore, WireShape};
use tabsync_proto::types::Uuid;
use tabsync_scoreboard::{PlayerConnection, RecordingSink};
use tabsync_sync::features::{NameTagSync, ScoreKind, ScoreSync};
use tabsync_sync::{
    InboundHandler, LocalBus, LocalPlayer, ProxySync, ProxySyncBuilder, RemoteEntity, SyncFeature,
};

pub const SHAPE: WireShape = WireShape::Modern;

/// Counts remote lifecycle events.
#[derive(Default)]
pub struct Recorder {
    pub remote_joins: AtomicUsize,
    pub remote_quits: AtomicUsize,
    pub switches: Mutex<Vec<String>>,
}

impl SyncFeature for Recorder {
    fn name(&self) -> &str {
        "recorder"
    }

    fn on_remote_join(&self, _: &ProxySync, _: &RemoteEntity) {
        self.remote_joins.fetch_add(1, Ordering::SeqCst);
    }

    fn on_remote_quit(&self, _: &ProxySync, _: &RemoteEntity) {
        self.remote_quits.fetch_add(1, Ordering::SeqCst);
    }

    fn on_remote_server_switch(&self, _: &ProxySync, entity: &RemoteEntity) {
        self.switches.lock().push(entity.server.clone());
    }
}

pub struct Node {
    pub sync: Arc<ProxySync>,
    pub nametags: Arc<NameTagSync>,
    pub belowname: Arc<ScoreSync>,
    pub recorder: Arc<Recorder>,
}

impl Node {
    pub fn start(bus: &LocalBus) -> Self {
        let nametags = NameTagSync::new(true);
        let belowname = ScoreSync::new(ScoreKind::BelowName, "Health", true);
        let recorder = Arc::new(Recorder::default());
        let sync = ProxySyncBuilder::new(bus.transport())
            .feature(nametags.clone())
            .feature(belowname.clone())
            .feature(recorder.clone())
            .build();
        let handler: Weak<dyn InboundHandler> = Arc::downgrade(&sync) as Weak<dyn InboundHandler>;
        bus.connect(handler);
        Self {
            sync,
            nametags,
            belowname,
            recorder,
        }
    }

    pub fn join(&self, name: &str, id: u64, server: &str) -> (Arc<LocalPlayer>, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let connection = Arc::new(PlayerConnection::new(name, uuid(id), SHAPE, sink.clone()));
        let player = self.sync.player_joined(LocalPlayer::new(server, connection));
        (player, sink)
    }

    pub fn remote_joins(&self) -> usize {
        self.recorder.remote_joins.load(Ordering::SeqCst)
    }

    pub fn remote_quits(&self) -> usize {
        self.recorder.remote_quits.load(Ordering::SeqCst)
    }
}

pub fn uuid(id: u64) -> Uuid {
    Uuid::new(id, id)
}

/// Let every node process what the others sent, a few rounds deep.
pub async fn settle(nodes: &[&Node]) {
    for _ in 0..4 {
        for node in nodes {
            node.sync.flush().await;
        }
    }
}

pub fn teams(packets: &[RawPacket]) -> Vec<SetPlayerTeam> {
    let id = SHAPE.packet_id(PacketKind::SetPlayerTeam);
    packets
        .iter()
        .filter(|p| p.id == id)
        .map(|p| SHAPE.decode(p).unwrap())
        .collect()
}

pub fn scores(packets: &[RawPacket]) -> Vec<SetScore> {
    let id = SHAPE.packet_id(PacketKind::SetScore);
    packets
        .iter()
        .filter(|p| p.id == id)
        .map(|p| SHAPE.decode(p).unwrap())
        .collect()
}
