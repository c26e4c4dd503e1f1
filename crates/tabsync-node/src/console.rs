//! Console commands for driving a node by hand.

use std::sync::Arc;

use tabsync_proto::packets::{
    DisplaySlot, RawPacket, SetDisplayObjective, SetObjective, SetPlayerTeam, TeamParameters,
    WireShape,
};
use tabsync_proto::types::{NameVisibility, Uuid};
use tabsync_scoreboard::PlayerConnection;
use tabsync_sync::features::{NameTag, NameTagSync, ScoreSync};
use tabsync_sync::{ConnectionState, LocalPlayer, ProxySync, ScoreValue};

use crate::sink::LoggingSink;

const HELP: &[(&str, &str)] = &[
    ("help", "List available commands"),
    ("list", "Show local and remote players"),
    ("join <name> [server]", "Connect a simulated player"),
    ("quit <name>", "Disconnect a player"),
    ("server <name> <server>", "Move a player to another backend server"),
    ("vanish <name> <on|off>", "Change vanish status"),
    ("tag <name> <team> [prefix] [suffix] [visibility]", "Set a nametag"),
    ("below <name> <value> [fancy]", "Set the belowname number"),
    ("number <name> <value> [fancy]", "Set the tab list number"),
    ("nick <name> <nickname>", "Rename a player as a nickname plugin would"),
    (
        "inject <name> team <create|remove|add|leave> <team> [entries]",
        "Send a team packet from another plugin through the player's scoreboard filter",
    ),
    (
        "inject <name> display <list|sidebar|belowname> [objective]",
        "Send a display slot packet from another plugin",
    ),
    ("inject <name> unregister <objective>", "Unregister an objective as another plugin"),
    ("stop", "Stop the node"),
];

/// Result of one console command.
pub struct CommandResult {
    pub success: bool,
    pub messages: Vec<String>,
    /// If true, the node should shut down.
    pub should_stop: bool,
}

impl CommandResult {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            messages: vec![message.into()],
            should_stop: false,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            success: false,
            messages: vec![message.into()],
            should_stop: false,
        }
    }
}

pub struct Console {
    sync: Arc<ProxySync>,
    shape: WireShape,
    default_server: String,
    nametags: Option<Arc<NameTagSync>>,
    belowname: Option<Arc<ScoreSync>>,
    playerlist: Option<Arc<ScoreSync>>,
}

impl Console {
    pub fn new(sync: Arc<ProxySync>, shape: WireShape, default_server: impl Into<String>) -> Self {
        Self {
            sync,
            shape,
            default_server: default_server.into(),
            nametags: None,
            belowname: None,
            playerlist: None,
        }
    }

    pub fn with_nametags(mut self, feature: Arc<NameTagSync>) -> Self {
        self.nametags = Some(feature);
        self
    }

    pub fn with_belowname(mut self, feature: Arc<ScoreSync>) -> Self {
        self.belowname = Some(feature);
        self
    }

    pub fn with_playerlist(mut self, feature: Arc<ScoreSync>) -> Self {
        self.playerlist = Some(feature);
        self
    }

    pub fn handle(&self, line: &str) -> CommandResult {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let Some((command, args)) = parts.split_first() else {
            return CommandResult::err("Empty command");
        };
        match command.to_lowercase().as_str() {
            "help" => CommandResult {
                success: true,
                messages: HELP
                    .iter()
                    .map(|(usage, description)| format!("{usage} - {description}"))
                    .collect(),
                should_stop: false,
            },
            "list" => self.list(),
            "join" => self.join(args),
            "quit" => self.quit(args),
            "server" => self.switch(args),
            "vanish" => self.vanish(args),
            "tag" => self.tag(args),
            "below" => self.score(args, self.belowname.as_ref(), "belowname"),
            "number" => self.score(args, self.playerlist.as_ref(), "playerlist"),
            "nick" => self.nick(args),
            "inject" => self.inject(args),
            "stop" => CommandResult {
                should_stop: true,
                ..CommandResult::ok("Stopping node...")
            },
            other => CommandResult::err(format!(
                "Unknown command: {other}. Type 'help' for a list of commands."
            )),
        }
    }

    fn player(&self, name: &str) -> Option<Arc<LocalPlayer>> {
        self.sync
            .local_players()
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(name))
    }

    fn list(&self) -> CommandResult {
        let locals = self.sync.local_players();
        let remotes = self.sync.directory().snapshot();
        let mut messages = vec![format!(
            "{} players online ({} local, {} remote)",
            self.sync.online_count(),
            locals.len(),
            remotes.len()
        )];
        for p in &locals {
            let vanished = if p.is_vanished() { " [vanished]" } else { "" };
            messages.push(format!("  {} ({}) local{vanished}", p.nickname(), p.server()));
        }
        for e in &remotes {
            let state = match e.state {
                ConnectionState::Queued => " [queued]",
                ConnectionState::Disconnected => " [disconnected]",
                ConnectionState::Connected => "",
            };
            let vanished = if e.vanished { " [vanished]" } else { "" };
            messages.push(format!(
                "  {} ({}) via {}{state}{vanished}",
                e.nickname, e.server, e.origin
            ));
        }
        CommandResult {
            success: true,
            messages,
            should_stop: false,
        }
    }

    fn join(&self, args: &[&str]) -> CommandResult {
        let Some(name) = args.first() else {
            return CommandResult::err("Usage: join <name> [server]");
        };
        if self.player(name).is_some() {
            return CommandResult::err(format!("{name} is already online"));
        }
        let server = args.get(1).copied().unwrap_or(self.default_server.as_str());
        let connection = Arc::new(PlayerConnection::new(
            *name,
            Uuid::random(),
            self.shape,
            Arc::new(LoggingSink::new(*name)),
        ));
        let player = self.sync.player_joined(LocalPlayer::new(server, connection));
        CommandResult::ok(format!("{} joined {server} as {}", player.name(), player.tablist_id()))
    }

    fn quit(&self, args: &[&str]) -> CommandResult {
        let Some(player) = args.first().and_then(|n| self.player(n)) else {
            return CommandResult::err("Usage: quit <online player>");
        };
        self.sync.player_quit(&player.tablist_id());
        CommandResult::ok(format!("{} left", player.name()))
    }

    fn switch(&self, args: &[&str]) -> CommandResult {
        let (Some(player), Some(server)) = (args.first().and_then(|n| self.player(n)), args.get(1))
        else {
            return CommandResult::err("Usage: server <online player> <server>");
        };
        self.sync.server_switched(&player.tablist_id(), server);
        CommandResult::ok(format!("{} moved to {server}", player.name()))
    }

    fn vanish(&self, args: &[&str]) -> CommandResult {
        let player = args.first().and_then(|n| self.player(n));
        let vanished = match args.get(1).copied() {
            Some("on") => true,
            Some("off") => false,
            _ => return CommandResult::err("Usage: vanish <online player> <on|off>"),
        };
        let Some(player) = player else {
            return CommandResult::err("Usage: vanish <online player> <on|off>");
        };
        self.sync.vanish_changed(&player.tablist_id(), vanished);
        CommandResult::ok(format!("{} vanished: {vanished}", player.name()))
    }

    fn tag(&self, args: &[&str]) -> CommandResult {
        let Some(feature) = &self.nametags else {
            return CommandResult::err("Nametags are disabled");
        };
        let (Some(player), Some(team)) = (args.first().and_then(|n| self.player(n)), args.get(1))
        else {
            return CommandResult::err("Usage: tag <online player> <team> [prefix] [suffix] [visibility]");
        };
        let visibility = match args.get(4) {
            Some(v) => match NameVisibility::from_name(v) {
                Ok(v) => v,
                Err(e) => return CommandResult::err(e.to_string()),
            },
            None => NameVisibility::Always,
        };
        let tag = NameTag {
            team_name: team.to_string(),
            prefix: args.get(2).unwrap_or(&"").to_string(),
            suffix: args.get(3).unwrap_or(&"").to_string(),
            visibility,
        };
        feature.set_tag(&self.sync, player.tablist_id(), tag);
        CommandResult::ok(format!("{} is now in team {team}", player.name()))
    }

    fn score(&self, args: &[&str], feature: Option<&Arc<ScoreSync>>, label: &str) -> CommandResult {
        let Some(feature) = feature else {
            return CommandResult::err(format!("The {label} number is disabled"));
        };
        let player = args.first().and_then(|n| self.player(n));
        let value = args.get(1).and_then(|v| v.parse::<i32>().ok());
        let (Some(player), Some(value)) = (player, value) else {
            return CommandResult::err("Usage: <online player> <value> [fancy]");
        };
        let fancy = args.get(2).copied().unwrap_or("");
        feature.set_value(&self.sync, player.tablist_id(), ScoreValue::new(value, fancy));
        CommandResult::ok(format!("{label} of {} set to {value}", player.name()))
    }

    fn nick(&self, args: &[&str]) -> CommandResult {
        let (Some(player), Some(nickname)) = (args.first().and_then(|n| self.player(n)), args.get(1))
        else {
            return CommandResult::err("Usage: nick <online player> <nickname>");
        };
        self.sync.on_entry_add(&player, player.tablist_id(), nickname);
        CommandResult::ok(format!("{} is now shown as {}", player.name(), player.nickname()))
    }

    /// Push a packet some other plugin might send through the player's
    /// outbound filter and report what reaches the client.
    fn inject(&self, args: &[&str]) -> CommandResult {
        const USAGE: &str = "Usage: inject <online player> <team|display|unregister> ...";
        let (Some(player), Some(kind)) = (args.first().and_then(|n| self.player(n)), args.get(1))
        else {
            return CommandResult::err(USAGE);
        };
        let packet = match (*kind, &args[2..]) {
            ("team", [action, team, entries @ ..]) => {
                let entries = entries.iter().map(|e| e.to_string()).collect();
                let team = match *action {
                    "create" => SetPlayerTeam::create(*team, TeamParameters::default(), entries),
                    "remove" => SetPlayerTeam::remove(*team),
                    "add" => SetPlayerTeam::add_entries(*team, entries),
                    "leave" => SetPlayerTeam::remove_entries(*team, entries),
                    other => return CommandResult::err(format!("Unknown team action: {other}")),
                };
                self.shape.encode(&team)
            }
            ("display", [slot, objective @ ..]) => {
                let Some(slot) = parse_slot(slot) else {
                    return CommandResult::err(format!("Unknown display slot: {slot}"));
                };
                let assignment = match objective.first() {
                    Some(objective) => SetDisplayObjective::new(slot, *objective),
                    None => SetDisplayObjective::clear(slot),
                };
                self.shape.encode(&assignment)
            }
            ("unregister", [objective]) => self.shape.encode(&SetObjective::unregister(*objective)),
            _ => return CommandResult::err(USAGE),
        };
        let delivered = player.connection().on_outbound(packet.clone());
        if delivered == packet {
            return CommandResult::ok(format!("Packet for {} passed unchanged", player.name()));
        }
        match self.shape.decode::<SetPlayerTeam>(&delivered) {
            Ok(team) => CommandResult::ok(format!(
                "Packet for {} rewritten: team {} keeps [{}]",
                player.name(),
                team.name,
                team.entries.join(", ")
            )),
            Err(_) => CommandResult::ok(format!("Packet for {} rewritten", player.name())),
        }
    }
}

fn parse_slot(name: &str) -> Option<DisplaySlot> {
    match name.to_lowercase().as_str() {
        "list" => Some(DisplaySlot::PlayerList),
        "sidebar" => Some(DisplaySlot::Sidebar),
        "belowname" => Some(DisplaySlot::BelowName),
        _ => None,
    }
}
