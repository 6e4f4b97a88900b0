//! Switch router
//!
//! Turns raw switch transitions into dispatchable events. The transition
//! itself is dispatched at once; each watched hold duration schedules a
//! check at `T + N`. Any later transition of the same switch drops its
//! pending checks, and a check that comes due re-verifies that the switch
//! has not moved since it was scheduled.

use std::collections::HashMap;

use pf_core::{SwitchBank, SwitchEvent, SwitchState, Timestamp};

use crate::EventKey;

/// A scheduled "still held?" check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeldCheck {
    pub switch: String,
    pub state: SwitchState,
    pub held_ms: u64,
    /// Transition time the check belongs to
    pub since: Timestamp,
    pub fire_at: Timestamp,
    pub seq: u64,
}

impl HeldCheck {
    #[inline]
    pub fn is_due(&self, now: Timestamp, watermark: u64) -> bool {
        self.fire_at <= now && self.seq < watermark
    }

    /// True if the switch is still in the same state since the same transition
    pub fn still_held(&self, switches: &SwitchBank) -> bool {
        switches
            .info(&self.switch)
            .map(|info| info.state == self.state && info.changed_at == Some(self.since))
            .unwrap_or(false)
    }

    pub fn key(&self) -> EventKey {
        EventKey::held(self.switch.clone(), self.state, self.held_ms)
    }
}

#[derive(Debug, Default)]
pub struct SwitchRouter {
    /// switch → (state, ms) durations some mode listens for
    watched: HashMap<String, Vec<(SwitchState, u64)>>,
    pending: Vec<HeldCheck>,
}

impl SwitchRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Listen for `switch` held in `state` for `ms`
    pub fn watch(&mut self, switch: &str, state: SwitchState, ms: u64) {
        let durations = self.watched.entry(switch.to_string()).or_default();
        if !durations.contains(&(state, ms)) {
            durations.push((state, ms));
        }
    }

    pub fn is_watched(&self, switch: &str) -> bool {
        self.watched.contains_key(switch)
    }

    /// Reschedule hold checks for a transition. `seq` is the machine-wide
    /// insertion counter.
    pub fn on_transition(&mut self, event: &SwitchEvent, seq: &mut u64) -> usize {
        self.pending.retain(|check| check.switch != event.name);
        let Some(durations) = self.watched.get(&event.name) else {
            return 0;
        };
        let mut scheduled = 0;
        for (state, ms) in durations {
            if *state != event.state {
                continue;
            }
            self.pending.push(HeldCheck {
                switch: event.name.clone(),
                state: *state,
                held_ms: *ms,
                since: event.timestamp,
                fire_at: event.timestamp + *ms,
                seq: *seq,
            });
            *seq += 1;
            scheduled += 1;
        }
        scheduled
    }

    pub fn next_due(&self, now: Timestamp, watermark: u64) -> Option<(Timestamp, u64)> {
        self.pending
            .iter()
            .filter(|check| check.is_due(now, watermark))
            .map(|check| (check.fire_at, check.seq))
            .min()
    }

    pub fn pop_due(&mut self, now: Timestamp, watermark: u64) -> Option<HeldCheck> {
        let (fire_at, seq) = self.next_due(now, watermark)?;
        let index = self
            .pending
            .iter()
            .position(|check| check.fire_at == fire_at && check.seq == seq)?;
        Some(self.pending.swap_remove(index))
    }

    pub fn pending(&self) -> &[HeldCheck] {
        &self.pending
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn transition(bank: &mut SwitchBank, state: SwitchState, at: u64) -> SwitchEvent {
        let event = SwitchEvent::new("shooterR", state, Timestamp(at));
        bank.apply(&event).unwrap();
        event
    }

    #[test]
    fn test_opposing_transition_cancels() {
        let mut bank = SwitchBank::new(["shooterR"]);
        let mut router = SwitchRouter::new();
        let mut seq = 0;
        router.watch("shooterR", SwitchState::Active, 300);

        let event = transition(&mut bank, SwitchState::Active, 0);
        assert_eq!(router.on_transition(&event, &mut seq), 1);
        let event = transition(&mut bank, SwitchState::Inactive, 150);
        assert_eq!(router.on_transition(&event, &mut seq), 0);
        assert!(router.pending().is_empty());

        let event = transition(&mut bank, SwitchState::Active, 160);
        router.on_transition(&event, &mut seq);
        assert!(router.pop_due(Timestamp(300), seq).is_none());
        let check = router.pop_due(Timestamp(460), seq).unwrap();
        assert_eq!(check.fire_at, Timestamp(460));
        assert!(check.still_held(&bank));
    }

    #[test]
    fn test_stale_check_fails_verification() {
        let mut bank = SwitchBank::new(["shooterR"]);
        let check = HeldCheck {
            switch: "shooterR".into(),
            state: SwitchState::Active,
            held_ms: 300,
            since: Timestamp(0),
            fire_at: Timestamp(300),
            seq: 0,
        };
        transition(&mut bank, SwitchState::Active, 50);
        assert!(!check.still_held(&bank));
    }

    #[test]
    fn test_multiple_durations() {
        let mut bank = SwitchBank::new(["shooterR"]);
        let mut router = SwitchRouter::new();
        let mut seq = 10;
        router.watch("shooterR", SwitchState::Active, 300);
        router.watch("shooterR", SwitchState::Active, 1000);
        router.watch("shooterR", SwitchState::Active, 300);
        router.watch("shooterR", SwitchState::Inactive, 1000);

        let event = transition(&mut bank, SwitchState::Active, 0);
        assert_eq!(router.on_transition(&event, &mut seq), 2);
        assert_eq!(seq, 12);
        assert_eq!(router.next_due(Timestamp(2000), seq), Some((Timestamp(300), 10)));
    }
}
