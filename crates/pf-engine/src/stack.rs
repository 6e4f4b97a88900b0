//! Mode stack
//!
//! Registered modes live in an arena of slots indexed by [`ModeId`]. The
//! active set is a priority-ordered list of ids. While a mode runs, its slot
//! is taken out of the arena; lifecycle work requested for a mode whose slot
//! is out is queued and applied once the slot is back.

use pf_core::{PfError, PfResult};
use pf_dmd::Layer;

use crate::mode::ModeObject;
use crate::{Lifecycle, ModeId};

/// Lifecycle hook waiting for a busy slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StackOp {
    Start,
    /// Callbacks scheduled before `before_seq` belong to the stopped run
    Stop { before_seq: u64 },
}

/// Facts about a registered mode that stay readable while its slot is out
#[derive(Debug, Clone)]
pub(crate) struct ModeMeta {
    pub name: String,
    pub priority: i32,
    pub lifecycle: Lifecycle,
}

#[derive(Default)]
pub(crate) struct ModeStack {
    slots: Vec<Option<Box<dyn ModeObject>>>,
    meta: Vec<ModeMeta>,
    /// Descending priority; equal priorities keep activation order
    active: Vec<ModeId>,
    pending: Vec<(ModeId, StackOp)>,
}

impl ModeStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, slot: Box<dyn ModeObject>) -> ModeId {
        let id = ModeId(self.slots.len());
        let settings = slot.settings();
        self.meta.push(ModeMeta {
            name: settings.name.clone(),
            priority: settings.priority,
            lifecycle: settings.lifecycle,
        });
        self.slots.push(Some(slot));
        id
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn meta(&self, id: ModeId) -> PfResult<&ModeMeta> {
        self.meta.get(id.0).ok_or(PfError::UnknownMode(id.0))
    }

    pub fn name(&self, id: ModeId) -> &str {
        self.meta.get(id.0).map(|m| m.name.as_str()).unwrap_or("?")
    }

    #[inline]
    pub fn is_active(&self, id: ModeId) -> bool {
        self.active.contains(&id)
    }

    pub fn active(&self) -> &[ModeId] {
        &self.active
    }

    /// Copy of the active set for one dispatch pass
    pub fn snapshot(&self) -> Vec<ModeId> {
        self.active.clone()
    }

    /// Insert into the active set; false if already active
    pub fn activate(&mut self, id: ModeId) -> bool {
        if self.is_active(id) {
            return false;
        }
        let priority = self.meta[id.0].priority;
        let index = self
            .active
            .iter()
            .position(|other| self.meta[other.0].priority < priority)
            .unwrap_or(self.active.len());
        self.active.insert(index, id);
        true
    }

    /// Remove from the active set; false if not active
    pub fn deactivate(&mut self, id: ModeId) -> bool {
        match self.active.iter().position(|other| *other == id) {
            Some(index) => {
                self.active.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn with_lifecycle(&self, lifecycle: Lifecycle) -> Vec<ModeId> {
        (0..self.meta.len())
            .filter(|index| self.meta[*index].lifecycle == lifecycle)
            .map(ModeId)
            .collect()
    }

    /// Active modes with the given lifecycle, lowest priority first
    pub fn active_with_lifecycle(&self, lifecycle: Lifecycle) -> Vec<ModeId> {
        self.active
            .iter()
            .rev()
            .copied()
            .filter(|id| self.meta[id.0].lifecycle == lifecycle)
            .collect()
    }

    // ─── slots ───────────────────────────────────────────────────────────────

    /// True while the mode's own code is running
    #[inline]
    pub fn is_busy(&self, id: ModeId) -> bool {
        matches!(self.slots.get(id.0), Some(None))
    }

    pub fn take(&mut self, id: ModeId) -> Option<Box<dyn ModeObject>> {
        self.slots.get_mut(id.0).and_then(Option::take)
    }

    pub fn restore(&mut self, id: ModeId, slot: Box<dyn ModeObject>) {
        if let Some(place) = self.slots.get_mut(id.0) {
            *place = Some(slot);
        }
    }

    pub fn slot(&self, id: ModeId) -> Option<&dyn ModeObject> {
        self.slots.get(id.0).and_then(|slot| slot.as_deref())
    }

    pub fn slot_mut(&mut self, id: ModeId) -> Option<&mut (dyn ModeObject + 'static)> {
        self.slots.get_mut(id.0).and_then(|slot| slot.as_deref_mut())
    }

    /// Layers of the active modes, highest priority first
    pub fn layers_top_down(&mut self) -> Vec<&mut Layer> {
        let mut slots: Vec<Option<&mut Box<dyn ModeObject>>> =
            self.slots.iter_mut().map(Option::as_mut).collect();
        let mut layers = Vec::new();
        for id in &self.active {
            let Some(slot) = slots.get_mut(id.0).and_then(Option::take) else {
                continue;
            };
            if let Some(layer) = slot.layer() {
                layers.push(layer);
            }
        }
        layers
    }

    // ─── deferred hooks ──────────────────────────────────────────────────────

    pub fn defer(&mut self, id: ModeId, op: StackOp) {
        self.pending.push((id, op));
    }

    /// Oldest queued hook whose slot is back in the arena
    pub fn next_ready(&mut self) -> Option<(ModeId, StackOp)> {
        let index = self
            .pending
            .iter()
            .position(|(id, _)| !self.is_busy(*id))?;
        Some(self.pending.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mode::Slot;
    use crate::{Mode, ModeSettings};

    struct Idle;

    impl Mode for Idle {}

    fn stack_with(priorities: &[i32]) -> (ModeStack, Vec<ModeId>) {
        let mut stack = ModeStack::new();
        let ids = priorities
            .iter()
            .enumerate()
            .map(|(index, priority)| {
                let settings = ModeSettings::new(format!("m{}", index), *priority);
                stack.register(Box::new(Slot::new(settings, Idle)))
            })
            .collect();
        (stack, ids)
    }

    #[test]
    fn test_activate_orders_by_priority() {
        let (mut stack, ids) = stack_with(&[5, 20, 10, 20]);
        for id in &ids {
            assert!(stack.activate(*id));
        }
        assert_eq!(stack.active(), &[ids[1], ids[3], ids[2], ids[0]]);
        assert!(!stack.activate(ids[2]));
        assert_eq!(stack.active().len(), 4);
    }

    #[test]
    fn test_deactivate_twice() {
        let (mut stack, ids) = stack_with(&[1]);
        stack.activate(ids[0]);
        assert!(stack.deactivate(ids[0]));
        assert!(!stack.deactivate(ids[0]));
    }

    #[test]
    fn test_pending_waits_for_slot() {
        let (mut stack, ids) = stack_with(&[1, 2]);
        let slot = stack.take(ids[0]).unwrap();
        assert!(stack.is_busy(ids[0]));
        stack.defer(ids[0], StackOp::Stop { before_seq: 7 });
        stack.defer(ids[1], StackOp::Start);
        assert_eq!(stack.next_ready(), Some((ids[1], StackOp::Start)));
        assert_eq!(stack.next_ready(), None);
        stack.restore(ids[0], slot);
        assert_eq!(stack.next_ready(), Some((ids[0], StackOp::Stop { before_seq: 7 })));
        assert_eq!(stack.next_ready(), None);
    }

    #[test]
    fn test_unknown_mode_meta() {
        let (stack, _) = stack_with(&[]);
        assert!(matches!(stack.meta(ModeId(3)), Err(PfError::UnknownMode(3))));
    }
}
