//! Event keys and handler tables
//!
//! Every mode declares, once at registration, which events it reacts to.
//! Switch events are keyed by switch, state and an optional hold duration;
//! everything else is a named event (`evt_ball_started`, ...). Lookup
//! misses mean "this mode does not care" and dispatch moves on.
//!
//! Event names follow the machine's naming scheme:
//!
//! ```text
//! sw_shooterR_active              primary transition
//! sw_shooterR_closed              alias of active
//! sw_popperL_active_for_200ms     held for 200 ms
//! sw_shooterR_inactive_for_1s     held for 1 s
//! evt_ball_started                named event
//! ```

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use pf_core::{PfError, PfResult, SwitchState, Timestamp};

use crate::ModeCx;

/// Propagation decision returned by every handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Flow {
    /// Let lower-priority modes see the event
    #[default]
    Continue,
    /// Stop propagation
    Stop,
}

impl Flow {
    #[inline]
    pub fn is_stop(self) -> bool {
        self == Flow::Stop
    }

    /// `Stop` if `stop` is true
    #[inline]
    pub fn stop_if(stop: bool) -> Self {
        if stop { Flow::Stop } else { Flow::Continue }
    }
}

/// Handler outcome
pub type HandlerResult = PfResult<Flow>;

// ═══════════════════════════════════════════════════════════════════════════════
// EVENT KEYS
// ═══════════════════════════════════════════════════════════════════════════════

/// Identifies an event a mode can handle
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKey {
    Switch {
        switch: String,
        state: SwitchState,
        /// Held duration in ms, `None` for the transition itself
        held_ms: Option<u64>,
    },
    Named(String),
}

impl EventKey {
    pub fn switch(switch: impl Into<String>, state: SwitchState) -> Self {
        Self::Switch {
            switch: switch.into(),
            state,
            held_ms: None,
        }
    }

    pub fn held(switch: impl Into<String>, state: SwitchState, ms: u64) -> Self {
        Self::Switch {
            switch: switch.into(),
            state,
            held_ms: Some(ms),
        }
    }

    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Switch name for switch keys
    pub fn switch_name(&self) -> Option<&str> {
        match self {
            Self::Switch { switch, .. } => Some(switch),
            Self::Named(_) => None,
        }
    }

    #[inline]
    pub fn is_switch(&self) -> bool {
        matches!(self, Self::Switch { .. })
    }

    /// Parse `sw_<name>_<state>[_for_<N>ms|_for_<N>s]`; anything not
    /// starting with `sw_` is a named event.
    pub fn parse(text: &str) -> PfResult<Self> {
        let invalid = || PfError::InvalidEvent(text.to_string());
        let Some(body) = text.strip_prefix("sw_") else {
            if text.is_empty() {
                return Err(invalid());
            }
            return Ok(Self::Named(text.to_string()));
        };

        let (head, held_ms) = match body.rsplit_once("_for_") {
            Some((head, duration)) => (head, Some(parse_duration(duration).ok_or_else(invalid)?)),
            None => (body, None),
        };
        let (switch, state) = head.rsplit_once('_').ok_or_else(invalid)?;
        let state = SwitchState::parse(state).ok_or_else(invalid)?;
        if switch.is_empty() {
            return Err(invalid());
        }
        Ok(Self::Switch {
            switch: switch.to_string(),
            state,
            held_ms,
        })
    }
}

/// `300ms`, `1s`, `1.5s`
fn parse_duration(text: &str) -> Option<u64> {
    if let Some(ms) = text.strip_suffix("ms") {
        return ms.parse().ok();
    }
    let secs: f64 = text.strip_suffix('s')?.parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some((secs * 1000.0).round() as u64)
    } else {
        None
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Switch {
                switch,
                state,
                held_ms: None,
            } => write!(f, "sw_{}_{}", switch, state),
            Self::Switch {
                switch,
                state,
                held_ms: Some(ms),
            } => write!(f, "sw_{}_{}_for_{}ms", switch, state, ms),
            Self::Named(name) => f.write_str(name),
        }
    }
}

impl FromStr for EventKey {
    type Err = PfError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// An event being dispatched
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub key: EventKey,
    pub timestamp: Timestamp,
}

impl Event {
    pub fn new(key: EventKey, timestamp: Timestamp) -> Self {
        Self { key, timestamp }
    }

    pub fn named(name: impl Into<String>, timestamp: Timestamp) -> Self {
        Self::new(EventKey::named(name), timestamp)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HANDLER TABLE
// ═══════════════════════════════════════════════════════════════════════════════

/// Handler bound to a mode type
pub type Handler<M> = fn(&mut M, &mut ModeCx<'_, M>, &Event) -> HandlerResult;

/// Event → handler map for one mode, built once at registration.
///
/// Builder methods never fail; malformed names and duplicates are collected
/// and reported by [`HandlerTable::check`] when the mode is registered.
pub struct HandlerTable<M> {
    handlers: HashMap<EventKey, Handler<M>>,
    errors: Vec<PfError>,
}

impl<M> Default for HandlerTable<M> {
    fn default() -> Self {
        Self {
            handlers: HashMap::new(),
            errors: Vec::new(),
        }
    }
}

impl<M> fmt::Debug for HandlerTable<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<String> = self.handlers.keys().map(ToString::to_string).collect();
        keys.sort();
        f.debug_struct("HandlerTable")
            .field("keys", &keys)
            .field("errors", &self.errors.len())
            .finish()
    }
}

impl<M> HandlerTable<M> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register by event name, e.g. `"sw_popperL_active_for_200ms"`
    pub fn on(self, name: &str, handler: Handler<M>) -> Self {
        match EventKey::parse(name) {
            Ok(key) => self.on_key(key, handler),
            Err(err) => {
                let mut table = self;
                table.errors.push(err);
                table
            }
        }
    }

    pub fn on_switch(self, switch: &str, state: SwitchState, handler: Handler<M>) -> Self {
        self.on_key(EventKey::switch(switch, state), handler)
    }

    pub fn on_held(self, switch: &str, state: SwitchState, ms: u64, handler: Handler<M>) -> Self {
        self.on_key(EventKey::held(switch, state, ms), handler)
    }

    pub fn on_event(self, name: &str, handler: Handler<M>) -> Self {
        self.on_key(EventKey::named(name), handler)
    }

    pub fn on_key(mut self, key: EventKey, handler: Handler<M>) -> Self {
        if self.handlers.contains_key(&key) {
            self.errors.push(PfError::DuplicateHandler(key.to_string()));
        } else {
            self.handlers.insert(key, handler);
        }
        self
    }

    /// Lookup; `None` means the mode ignores the event
    #[inline]
    pub fn get(&self, key: &EventKey) -> Option<Handler<M>> {
        self.handlers.get(key).copied()
    }

    #[inline]
    pub fn contains(&self, key: &EventKey) -> bool {
        self.handlers.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &EventKey> {
        self.handlers.keys()
    }

    /// Switch names referenced by the table
    pub fn switches(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().filter_map(EventKey::switch_name)
    }

    /// (switch, state, ms) for every held-duration key
    pub fn held_checks(&self) -> Vec<(String, SwitchState, u64)> {
        self.handlers
            .keys()
            .filter_map(|key| match key {
                EventKey::Switch {
                    switch,
                    state,
                    held_ms: Some(ms),
                } => Some((switch.clone(), *state, *ms)),
                _ => None,
            })
            .collect()
    }

    /// First construction error, if any
    pub fn check(&mut self) -> PfResult<()> {
        match self.errors.drain(..).next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}
