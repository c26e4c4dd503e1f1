//! Canonical scoreboard state of one connection.
//!
//! This is the state the node wants the client to see. The interceptor
//! compares outbound packets from other sources against it.

use std::collections::{HashMap, HashSet};

use tabsync_proto::packets::{
    DisplaySlot, ObjectiveAction, ObjectiveDisplay, SetDisplayObjective, SetObjective,
    SetPlayerTeam, TeamAction, TeamParameters,
};

/// Packet categories with independent enforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Objective,
    DisplaySlot,
    Team,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EnforcementMode {
    Enforcing,
    #[default]
    Passive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalTeam {
    pub parameters: TeamParameters,
    pub entries: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalObjective {
    pub display: ObjectiveDisplay,
    /// holder -> (value, fancy value)
    pub scores: HashMap<String, (i32, Option<String>)>,
}

/// Managed state that foreign packets displaced since the last re-assert.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overridden {
    pub slots: Vec<(DisplaySlot, String)>,
    pub objectives: Vec<String>,
}

impl Overridden {
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty() && self.objectives.is_empty()
    }
}

#[derive(Debug, Default)]
pub struct ScoreboardState {
    objective_mode: EnforcementMode,
    display_mode: EnforcementMode,
    team_mode: EnforcementMode,

    teams: HashMap<String, CanonicalTeam>,
    /// entry -> owning canonical team
    entry_owner: HashMap<String, String>,
    objectives: HashMap<String, CanonicalObjective>,
    display_slots: HashMap<DisplaySlot, String>,

    /// Last objective seen going out per slot, managed or not.
    shown_slots: HashMap<DisplaySlot, String>,
    overridden_slots: HashSet<DisplaySlot>,
    removed_objectives: HashSet<String>,
}

impl ScoreboardState {
    pub fn new() -> Self {
        Self::default()
    }

    // -----------------------------------------------------------------------
    // Enforcement modes
    // -----------------------------------------------------------------------

    pub fn mode(&self, category: Category) -> EnforcementMode {
        match category {
            Category::Objective => self.objective_mode,
            Category::DisplaySlot => self.display_mode,
            Category::Team => self.team_mode,
        }
    }

    pub fn set_mode(&mut self, category: Category, mode: EnforcementMode) {
        match category {
            Category::Objective => self.objective_mode = mode,
            Category::DisplaySlot => self.display_mode = mode,
            Category::Team => self.team_mode = mode,
        }
    }

    pub fn is_enforcing(&self, category: Category) -> bool {
        self.mode(category) == EnforcementMode::Enforcing
    }

    // -----------------------------------------------------------------------
    // Teams
    // -----------------------------------------------------------------------

    pub fn team(&self, name: &str) -> Option<&CanonicalTeam> {
        self.teams.get(name)
    }

    pub fn team_of(&self, entry: &str) -> Option<&str> {
        self.entry_owner.get(entry).map(String::as_str)
    }

    /// Insert or replace a team. Entries owned by other teams move here, the
    /// way the client moves them.
    pub fn put_team(&mut self, name: &str, parameters: TeamParameters, entries: Vec<String>) {
        if let Some(old) = self.teams.remove(name) {
            for entry in old.entries {
                self.entry_owner.remove(&entry);
            }
        }
        let mut unique = Vec::with_capacity(entries.len());
        for entry in entries {
            if unique.contains(&entry) {
                continue;
            }
            if let Some(previous) = self.entry_owner.insert(entry.clone(), name.to_string()) {
                if let Some(team) = self.teams.get_mut(&previous) {
                    team.entries.retain(|e| *e != entry);
                }
            }
            unique.push(entry);
        }
        self.teams.insert(
            name.to_string(),
            CanonicalTeam {
                parameters,
                entries: unique,
            },
        );
    }

    /// Replace a team's display parameters. Returns `false` for unknown teams.
    pub fn update_team(&mut self, name: &str, parameters: TeamParameters) -> bool {
        match self.teams.get_mut(name) {
            Some(team) => {
                team.parameters = parameters;
                true
            }
            None => false,
        }
    }

    pub fn remove_team(&mut self, name: &str) -> Option<CanonicalTeam> {
        let team = self.teams.remove(name)?;
        for entry in &team.entries {
            self.entry_owner.remove(entry);
        }
        Some(team)
    }

    /// Rewrite a team packet against canonical membership.
    ///
    /// Returns `true` when the entry list changed. `Update` packets carry no
    /// entries and are never touched.
    pub fn enforce_team(&self, packet: &mut SetPlayerTeam) -> bool {
        let before = packet.entries.len();
        match packet.action {
            TeamAction::Update => return false,
            TeamAction::Create | TeamAction::Remove => {
                if let Some(team) = self.teams.get(&packet.name) {
                    if packet.entries == team.entries {
                        return false;
                    }
                    packet.entries = team.entries.clone();
                    return true;
                }
                self.retain_unowned(packet);
            }
            TeamAction::AddEntries => self.retain_unowned(packet),
            TeamAction::RemoveEntries => {
                let name = &packet.name;
                let owner = &self.entry_owner;
                packet
                    .entries
                    .retain(|entry| owner.get(entry) != Some(name));
            }
        }
        packet.entries.len() != before
    }

    /// Drop entries that a canonical team other than the packet's own owns.
    fn retain_unowned(&self, packet: &mut SetPlayerTeam) {
        let name = &packet.name;
        let owner = &self.entry_owner;
        packet
            .entries
            .retain(|entry| owner.get(entry).map_or(true, |team| team == name));
    }

    // -----------------------------------------------------------------------
    // Objectives and scores
    // -----------------------------------------------------------------------

    pub fn objective(&self, name: &str) -> Option<&CanonicalObjective> {
        self.objectives.get(name)
    }

    /// Insert or replace an objective's display. Returns `true` when it was
    /// already registered, keeping its scores.
    pub fn put_objective(&mut self, name: &str, display: ObjectiveDisplay) -> bool {
        self.removed_objectives.remove(name);
        match self.objectives.get_mut(name) {
            Some(objective) => {
                objective.display = display;
                true
            }
            None => {
                self.objectives.insert(
                    name.to_string(),
                    CanonicalObjective {
                        display,
                        scores: HashMap::new(),
                    },
                );
                false
            }
        }
    }

    pub fn remove_objective(&mut self, name: &str) -> Option<CanonicalObjective> {
        self.removed_objectives.remove(name);
        self.display_slots.retain(|_, objective| objective != name);
        self.objectives.remove(name)
    }

    /// Record a score. Returns `false` when the objective is unknown.
    pub fn put_score(
        &mut self,
        objective: &str,
        holder: &str,
        value: i32,
        fancy: Option<String>,
    ) -> bool {
        match self.objectives.get_mut(objective) {
            Some(obj) => {
                obj.scores.insert(holder.to_string(), (value, fancy));
                true
            }
            None => false,
        }
    }

    pub fn remove_score(&mut self, objective: &str, holder: &str) -> bool {
        self.objectives
            .get_mut(objective)
            .is_some_and(|obj| obj.scores.remove(holder).is_some())
    }

    // -----------------------------------------------------------------------
    // Display slots
    // -----------------------------------------------------------------------

    pub fn display_slot(&self, slot: DisplaySlot) -> Option<&str> {
        self.display_slots.get(&slot).map(String::as_str)
    }

    pub fn put_display_slot(&mut self, slot: DisplaySlot, objective: &str) {
        self.display_slots.insert(slot, objective.to_string());
        self.shown_slots.insert(slot, objective.to_string());
        self.overridden_slots.remove(&slot);
    }

    /// Managed slots assigned to `objective`, in slot order.
    pub fn slots_of(&self, objective: &str) -> Vec<DisplaySlot> {
        let mut slots: Vec<_> = self
            .display_slots
            .iter()
            .filter(|(_, name)| *name == objective)
            .map(|(slot, _)| *slot)
            .collect();
        slots.sort_by_key(|slot| slot.to_id());
        slots
    }

    /// What the client most recently got told for `slot`.
    pub fn shown_in(&self, slot: DisplaySlot) -> Option<&str> {
        self.shown_slots.get(&slot).map(String::as_str)
    }

    // -----------------------------------------------------------------------
    // Observation of outbound traffic
    // -----------------------------------------------------------------------

    /// Record a display assignment seen on the wire. Returns `true` when it
    /// displaced a managed assignment.
    pub fn observe_display(&mut self, packet: &SetDisplayObjective) -> bool {
        self.shown_slots
            .insert(packet.slot, packet.objective_name.clone());
        let Some(canonical) = self.display_slots.get(&packet.slot) else {
            return false;
        };
        if *canonical == packet.objective_name {
            self.overridden_slots.remove(&packet.slot);
            return false;
        }
        if self.is_enforcing(Category::DisplaySlot) {
            self.overridden_slots.insert(packet.slot);
            return true;
        }
        false
    }

    /// Record an objective packet seen on the wire. Returns `true` when it
    /// unregistered a managed objective.
    pub fn observe_objective(&mut self, packet: &SetObjective) -> bool {
        if !self.objectives.contains_key(&packet.name) {
            return false;
        }
        match packet.action {
            ObjectiveAction::Register => {
                self.removed_objectives.remove(&packet.name);
                false
            }
            ObjectiveAction::Unregister if self.is_enforcing(Category::Objective) => {
                self.removed_objectives.insert(packet.name.clone());
                true
            }
            _ => false,
        }
    }

    /// Drain what needs re-asserting.
    pub fn take_overridden(&mut self) -> Overridden {
        let mut overridden = Overridden::default();
        for slot in self.overridden_slots.drain() {
            if let Some(objective) = self.display_slots.get(&slot) {
                overridden.slots.push((slot, objective.clone()));
            }
        }
        overridden.objectives = self.removed_objectives.drain().collect();
        overridden.objectives.sort();
        overridden.slots.sort_by_key(|(slot, _)| slot.to_id());
        overridden
    }
}
