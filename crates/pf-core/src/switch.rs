//! Switch model
//!
//! Switches are named inputs with two states. The bank keeps the current
//! state of every configured switch plus the time of its last transition,
//! which the rules use for "recently hit" checks and the router uses to
//! validate duration events.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{PfError, PfResult, Timestamp};

/// Switch state, also used as the transition that led into it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchState {
    Active,
    #[default]
    Inactive,
}

impl SwitchState {
    #[inline]
    pub fn is_active(self) -> bool {
        self == Self::Active
    }

    #[inline]
    pub fn opposite(self) -> Self {
        match self {
            Self::Active => Self::Inactive,
            Self::Inactive => Self::Active,
        }
    }

    /// Canonical name used in event keys
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }

    /// Parse a state word. `closed`/`open` are accepted as aliases.
    pub fn parse(word: &str) -> Option<Self> {
        match word {
            "active" | "closed" => Some(Self::Active),
            "inactive" | "open" => Some(Self::Inactive),
            _ => None,
        }
    }
}

impl std::fmt::Display for SwitchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A switch transition reported by the hardware layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchEvent {
    pub name: String,
    pub state: SwitchState,
    pub timestamp: Timestamp,
}

impl SwitchEvent {
    pub fn new(name: impl Into<String>, state: SwitchState, timestamp: Timestamp) -> Self {
        Self {
            name: name.into(),
            state,
            timestamp,
        }
    }
}

/// Current state of one switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SwitchInfo {
    pub state: SwitchState,
    /// Time of the last transition, `None` until the first one
    pub changed_at: Option<Timestamp>,
}

/// State of every configured switch
#[derive(Debug, Clone, Default)]
pub struct SwitchBank {
    switches: HashMap<String, SwitchInfo>,
}

impl SwitchBank {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            switches: names
                .into_iter()
                .map(|name| (name.into(), SwitchInfo::default()))
                .collect(),
        }
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.switches.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.switches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.switches.is_empty()
    }

    pub fn info(&self, name: &str) -> Option<SwitchInfo> {
        self.switches.get(name).copied()
    }

    /// Apply a transition. Returns `Ok(false)` when the switch was already
    /// in the reported state.
    pub fn apply(&mut self, event: &SwitchEvent) -> PfResult<bool> {
        let info = self
            .switches
            .get_mut(&event.name)
            .ok_or_else(|| PfError::UnknownSwitch(event.name.clone()))?;
        if info.state == event.state && info.changed_at.is_some() {
            return Ok(false);
        }
        if info.state == event.state && event.state == SwitchState::Inactive {
            // Switches power up inactive; a first "inactive" report is not a change.
            info.changed_at = Some(event.timestamp);
            return Ok(false);
        }
        info.state = event.state;
        info.changed_at = Some(event.timestamp);
        Ok(true)
    }

    /// Unknown switches read as inactive.
    pub fn is_active(&self, name: &str) -> bool {
        self.switches
            .get(name)
            .map(|info| info.state.is_active())
            .unwrap_or(false)
    }

    pub fn is_inactive(&self, name: &str) -> bool {
        !self.is_active(name)
    }

    /// True if the switch has been active for at least `ms` at `now`
    pub fn is_active_for(&self, name: &str, ms: u64, now: Timestamp) -> bool {
        self.held_for(name, SwitchState::Active, ms, now)
    }

    /// True if the switch has been inactive for at least `ms` at `now`
    pub fn is_inactive_for(&self, name: &str, ms: u64, now: Timestamp) -> bool {
        self.held_for(name, SwitchState::Inactive, ms, now)
    }

    fn held_for(&self, name: &str, state: SwitchState, ms: u64, now: Timestamp) -> bool {
        match self.switches.get(name) {
            Some(info) if info.state == state => match info.changed_at {
                Some(at) => now.since(at) >= ms,
                // Never changed since power-on: held for the whole session.
                None => true,
            },
            _ => false,
        }
    }

    /// Milliseconds since the last transition, `None` if it never changed
    pub fn time_since_change(&self, name: &str, now: Timestamp) -> Option<u64> {
        self.switches
            .get(name)
            .and_then(|info| info.changed_at)
            .map(|at| now.since(at))
    }

    /// True if the switch changed within the last `ms`
    pub fn changed_within(&self, name: &str, ms: u64, now: Timestamp) -> bool {
        self.time_since_change(name, now)
            .map(|elapsed| elapsed < ms)
            .unwrap_or(false)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.switches.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> SwitchBank {
        SwitchBank::new(["shooterR", "popperL"])
    }

    #[test]
    fn test_state_parse_aliases() {
        assert_eq!(SwitchState::parse("closed"), Some(SwitchState::Active));
        assert_eq!(SwitchState::parse("open"), Some(SwitchState::Inactive));
        assert_eq!(SwitchState::parse("pressed"), None);
    }

    #[test]
    fn test_apply_ignores_repeats() {
        let mut bank = bank();
        let ev = SwitchEvent::new("shooterR", SwitchState::Active, Timestamp(10));
        assert!(bank.apply(&ev).unwrap());
        assert!(!bank.apply(&ev).unwrap());
        assert!(bank.is_active("shooterR"));
    }

    #[test]
    fn test_apply_unknown_switch() {
        let mut bank = bank();
        let ev = SwitchEvent::new("nope", SwitchState::Active, Timestamp(0));
        assert!(matches!(bank.apply(&ev), Err(PfError::UnknownSwitch(_))));
    }

    #[test]
    fn test_held_and_since_change() {
        let mut bank = bank();
        bank.apply(&SwitchEvent::new("popperL", SwitchState::Active, Timestamp(100)))
            .unwrap();
        assert!(!bank.is_active_for("popperL", 200, Timestamp(250)));
        assert!(bank.is_active_for("popperL", 200, Timestamp(300)));
        assert_eq!(bank.time_since_change("popperL", Timestamp(400)), Some(300));
        assert!(bank.changed_within("popperL", 1000, Timestamp(400)));
        assert_eq!(bank.time_since_change("shooterR", Timestamp(400)), None);
        assert!(bank.is_inactive_for("shooterR", 5000, Timestamp(400)));
    }
}
