//! A local player's connection: canonical scoreboard operations and the
//! outbound packet interceptor.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tabsync_proto::error::ProtoError;
use tabsync_proto::packets::{
    DisplaySlot, ObjectiveAction, ObjectiveDisplay, PacketClass, RawPacket, RenderType,
    SetDisplayObjective, SetObjective, SetPlayerTeam, SetScore, ShapedPacket, TeamAction,
    TeamParameters, WireShape,
};
use tabsync_proto::types::Uuid;
use tracing::{debug, error, trace};

use crate::sink::PacketSink;
use crate::state::{Category, EnforcementMode, Overridden, ScoreboardState};

/// Callbacks for scoreboard packets that pass through the interceptor.
///
/// Invoked after the connection's state lock is released.
pub trait ScoreboardObserver: Send + Sync {
    fn on_display_objective(
        &self,
        _connection: &PlayerConnection,
        _slot: DisplaySlot,
        _objective: &str,
    ) {
    }

    fn on_objective(&self, _connection: &PlayerConnection, _packet: &SetObjective) {}
}

pub struct PlayerConnection {
    name: String,
    id: Uuid,
    shape: WireShape,
    state: Mutex<ScoreboardState>,
    sink: Arc<dyn PacketSink>,
    observers: RwLock<Vec<Arc<dyn ScoreboardObserver>>>,
}

impl std::fmt::Debug for PlayerConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlayerConnection")
            .field("name", &self.name)
            .field("id", &self.id)
            .field("shape", &self.shape)
            .finish()
    }
}

enum Observed {
    Display(SetDisplayObjective),
    Objective(SetObjective),
}

impl PlayerConnection {
    pub fn new(
        name: impl Into<String>,
        id: Uuid,
        shape: WireShape,
        sink: Arc<dyn PacketSink>,
    ) -> Self {
        Self {
            name: name.into(),
            id,
            shape,
            state: Mutex::new(ScoreboardState::new()),
            sink,
            observers: RwLock::new(Vec::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn shape(&self) -> WireShape {
        self.shape
    }

    pub fn add_observer(&self, observer: Arc<dyn ScoreboardObserver>) {
        self.observers.write().push(observer);
    }

    /// Run `f` against the canonical state.
    pub fn with_state<R>(&self, f: impl FnOnce(&ScoreboardState) -> R) -> R {
        f(&self.state.lock())
    }

    fn emit<P: ShapedPacket>(&self, packet: &P) {
        self.sink.send_packet(self.shape.encode(packet));
    }

    // -----------------------------------------------------------------------
    // Enforcement toggles
    // -----------------------------------------------------------------------

    pub fn set_anti_override_scoreboard(&self, enabled: bool) {
        let mode = mode_for(enabled);
        let mut state = self.state.lock();
        state.set_mode(Category::Objective, mode);
        state.set_mode(Category::DisplaySlot, mode);
    }

    pub fn set_anti_override_teams(&self, enabled: bool) {
        self.state.lock().set_mode(Category::Team, mode_for(enabled));
    }

    pub fn mode(&self, category: Category) -> EnforcementMode {
        self.state.lock().mode(category)
    }

    // -----------------------------------------------------------------------
    // Teams
    // -----------------------------------------------------------------------

    /// Create a team, replacing an existing one of the same name.
    pub fn register_team(&self, name: &str, parameters: TeamParameters, entries: Vec<String>) {
        let (existed, packet) = {
            let mut state = self.state.lock();
            let existed = state.remove_team(name).is_some();
            state.put_team(name, parameters.clone(), entries);
            let entries = state.team(name).map(|t| t.entries.clone()).unwrap_or_default();
            (existed, SetPlayerTeam::create(name, parameters, entries))
        };
        if existed {
            self.emit(&SetPlayerTeam::remove(name));
        }
        self.emit(&packet);
    }

    /// Create the team, or update its parameters and membership in place.
    pub fn upsert_team(&self, name: &str, parameters: TeamParameters, entries: Vec<String>) {
        let (update, added, removed) = {
            let mut state = self.state.lock();
            let Some(current) = state.team(name).cloned() else {
                drop(state);
                self.register_team(name, parameters, entries);
                return;
            };
            let added: Vec<String> = entries
                .iter()
                .filter(|e| !current.entries.contains(e))
                .cloned()
                .collect();
            let removed: Vec<String> = current
                .entries
                .iter()
                .filter(|e| !entries.contains(e))
                .cloned()
                .collect();
            let update = (current.parameters != parameters)
                .then(|| SetPlayerTeam::update(name, parameters.clone()));
            state.put_team(name, parameters, entries);
            (update, added, removed)
        };
        if let Some(update) = update {
            self.emit(&update);
        }
        if !removed.is_empty() {
            self.emit(&SetPlayerTeam::remove_entries(name, removed));
        }
        if !added.is_empty() {
            self.emit(&SetPlayerTeam::add_entries(name, added));
        }
    }

    pub fn update_team(&self, name: &str, parameters: TeamParameters) -> bool {
        if !self.state.lock().update_team(name, parameters.clone()) {
            debug!("Not updating unknown team {name} for {}", self.name);
            return false;
        }
        self.emit(&SetPlayerTeam::update(name, parameters));
        true
    }

    pub fn unregister_team(&self, name: &str) -> bool {
        if self.state.lock().remove_team(name).is_none() {
            return false;
        }
        self.emit(&SetPlayerTeam::remove(name));
        true
    }

    // -----------------------------------------------------------------------
    // Objectives, scores and display slots
    // -----------------------------------------------------------------------

    pub fn register_objective(
        &self,
        name: &str,
        title: &str,
        render_type: RenderType,
        number_format: Option<String>,
    ) {
        let display = ObjectiveDisplay {
            title: title.to_string(),
            render_type,
            number_format,
        };
        let existed = self.state.lock().put_objective(name, display.clone());
        let packet = SetObjective {
            name: name.to_string(),
            action: if existed {
                ObjectiveAction::Update
            } else {
                ObjectiveAction::Register
            },
            display: Some(display),
        };
        self.emit(&packet);
    }

    pub fn unregister_objective(&self, name: &str) -> bool {
        if self.state.lock().remove_objective(name).is_none() {
            return false;
        }
        self.emit(&SetObjective::unregister(name));
        true
    }

    pub fn set_display_slot(&self, slot: DisplaySlot, objective: &str) {
        self.state.lock().put_display_slot(slot, objective);
        self.emit(&SetDisplayObjective::new(slot, objective));
    }

    /// Set a holder's score. Ignored for unregistered objectives.
    pub fn set_score(&self, objective: &str, holder: &str, value: i32, fancy: Option<String>) {
        if !self
            .state
            .lock()
            .put_score(objective, holder, value, fancy.clone())
        {
            trace!("Dropping score of {holder} for unknown objective {objective}");
            return;
        }
        let mut packet = SetScore::change(holder, objective, value);
        packet.number_format = fancy;
        self.emit(&packet);
    }

    pub fn remove_score(&self, objective: &str, holder: &str) {
        if self.state.lock().remove_score(objective, holder) {
            self.emit(&SetScore::remove(holder, objective));
        }
    }

    /// Re-send managed display slots and objectives that foreign packets
    /// displaced. Returns what was re-sent.
    pub fn reassert_overridden(&self) -> Overridden {
        let (overridden, objectives) = {
            let mut state = self.state.lock();
            let mut overridden = state.take_overridden();
            let objectives: Vec<_> = overridden
                .objectives
                .iter()
                .filter_map(|name| state.objective(name).map(|o| (name.clone(), o.clone())))
                .collect();
            // A re-registered objective needs its slots back too.
            for (name, _) in &objectives {
                for slot in state.slots_of(name) {
                    if !overridden.slots.iter().any(|(s, _)| *s == slot) {
                        overridden.slots.push((slot, name.clone()));
                    }
                }
            }
            for (slot, objective) in &overridden.slots {
                state.put_display_slot(*slot, objective);
            }
            (overridden, objectives)
        };

        for (name, objective) in &objectives {
            debug!("Re-registering objective {name} for {}", self.name);
            self.emit(&SetObjective {
                name: name.clone(),
                action: ObjectiveAction::Register,
                display: Some(objective.display.clone()),
            });
            for (holder, (value, fancy)) in &objective.scores {
                let mut score = SetScore::change(holder.as_str(), name.as_str(), *value);
                score.number_format = fancy.clone();
                self.emit(&score);
            }
        }
        for (slot, objective) in &overridden.slots {
            debug!("Re-asserting {slot:?} = {objective} for {}", self.name);
            self.emit(&SetDisplayObjective::new(*slot, objective.as_str()));
        }
        overridden
    }

    // -----------------------------------------------------------------------
    // Interception
    // -----------------------------------------------------------------------

    /// Filter one outbound packet.
    ///
    /// Never fails: on any error or panic the original packet is returned.
    /// Packets that need no rewrite are returned as the original bytes.
    pub fn on_outbound(&self, packet: RawPacket) -> RawPacket {
        let id = packet.id;
        let result = panic::catch_unwind(AssertUnwindSafe(|| self.intercept(&packet)));
        match result {
            Ok(Ok(Some(rewritten))) => rewritten,
            Ok(Ok(None)) => packet,
            Ok(Err(e)) => {
                error!(
                    "Failed to process outbound packet 0x{id:02X} for {}: {e}",
                    self.name
                );
                packet
            }
            Err(_) => {
                error!(
                    "Panic while processing outbound packet 0x{id:02X} for {}",
                    self.name
                );
                packet
            }
        }
    }

    fn intercept(&self, packet: &RawPacket) -> Result<Option<RawPacket>, ProtoError> {
        let observed = match self.shape.classify(packet)? {
            PacketClass::None | PacketClass::Score => return Ok(None),
            PacketClass::Team(TeamAction::Update) => return Ok(None),
            PacketClass::Team(_) => return self.enforce_team(packet),
            PacketClass::DisplaySlot => {
                let assignment: SetDisplayObjective = self.shape.decode(packet)?;
                if self.state.lock().observe_display(&assignment) {
                    debug!(
                        "Display slot {:?} of {} taken over by {}",
                        assignment.slot, self.name, assignment.objective_name
                    );
                }
                Observed::Display(assignment)
            }
            PacketClass::Objective => {
                let objective: SetObjective = self.shape.decode(packet)?;
                if self.state.lock().observe_objective(&objective) {
                    debug!("Managed objective {} of {} was unregistered", objective.name, self.name);
                }
                Observed::Objective(objective)
            }
        };

        let observers = self.observers.read().clone();
        for observer in observers {
            match &observed {
                Observed::Display(d) => {
                    observer.on_display_objective(self, d.slot, &d.objective_name)
                }
                Observed::Objective(o) => observer.on_objective(self, o),
            }
        }
        Ok(None)
    }

    fn enforce_team(&self, packet: &RawPacket) -> Result<Option<RawPacket>, ProtoError> {
        if !self.state.lock().is_enforcing(Category::Team) {
            return Ok(None);
        }
        let mut team: SetPlayerTeam = self.shape.decode(packet)?;
        let original = team.entries.len();
        if !self.state.lock().enforce_team(&mut team) {
            return Ok(None);
        }
        debug!(
            "Rewrote {:?} of team {} for {}: {original} -> {} entries",
            team.action,
            team.name,
            self.name,
            team.entries.len()
        );
        Ok(Some(self.shape.encode(&team)))
    }
}

fn mode_for(enabled: bool) -> EnforcementMode {
    if enabled {
        EnforcementMode::Enforcing
    } else {
        EnforcementMode::Passive
    }
}
