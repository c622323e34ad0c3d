//! Priority engine for commandable outputs.
//!
//! Each Analog-Output and Binary-Output owns a fixed array of 16
//! command slots, indexed 1 (highest priority) through 16 (lowest).
//! A slot holds either `Null` or a value of the object's class. The
//! effective Present-Value is the first non-Null slot scanning from
//! priority 1; when every slot is Null the relinquish-default wins.

use crate::object::ObjectValue;

/// Number of command slots per output.
pub const PRIORITY_SLOTS: usize = 16;

/// A validated command priority in 1..=16.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority(u8);

impl Priority {
    /// Priority used when the peer omits the optional operand.
    pub const LOWEST: Priority = Priority(16);

    /// Accepts 1..=16, the only priorities that exist on the wire.
    pub fn new(value: u32) -> Option<Self> {
        (1..=PRIORITY_SLOTS as u32).contains(&value).then_some(Priority(value as u8))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    fn index(self) -> usize {
        usize::from(self.0) - 1
    }
}

/// The 16-slot command buffer backing a commandable Present-Value.
#[derive(Debug, Clone)]
pub struct PriorityArray {
    slots: [ObjectValue; PRIORITY_SLOTS],
    relinquish_default: ObjectValue,
}

impl PriorityArray {
    /// All slots start Null; the default backs the empty array.
    pub fn new(relinquish_default: ObjectValue) -> Self {
        Self {
            slots: core::array::from_fn(|_| ObjectValue::Null),
            relinquish_default,
        }
    }

    /// Store a value at a priority. Writing `Null` relinquishes the slot.
    pub fn set(&mut self, priority: Priority, value: ObjectValue) {
        self.slots[priority.index()] = value;
    }

    /// The value currently held at a priority (`Null` when relinquished).
    pub fn slot(&self, priority: Priority) -> &ObjectValue {
        &self.slots[priority.index()]
    }

    /// All 16 slots in priority order.
    pub fn slots(&self) -> &[ObjectValue; PRIORITY_SLOTS] {
        &self.slots
    }

    pub fn relinquish_default(&self) -> &ObjectValue {
        &self.relinquish_default
    }

    pub fn set_relinquish_default(&mut self, value: ObjectValue) {
        self.relinquish_default = value;
    }

    /// Effective value: the first occupied slot from priority 1 down,
    /// falling back to the relinquish-default.
    pub fn resolve(&self) -> &ObjectValue {
        self.slots
            .iter()
            .find(|slot| !matches!(slot, ObjectValue::Null))
            .unwrap_or(&self.relinquish_default)
    }

    /// Priority of the winning slot, if any slot is occupied.
    pub fn active_priority(&self) -> Option<Priority> {
        self.slots
            .iter()
            .position(|slot| !matches!(slot, ObjectValue::Null))
            .map(|index| Priority(index as u8 + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn priority(value: u32) -> Priority {
        Priority::new(value).unwrap()
    }

    #[test]
    fn priority_range_is_enforced() {
        assert!(Priority::new(0).is_none());
        assert!(Priority::new(17).is_none());
        assert_eq!(Priority::new(1).unwrap().get(), 1);
        assert_eq!(Priority::LOWEST.get(), 16);
    }

    #[test]
    fn lowest_index_wins() {
        let mut array = PriorityArray::new(ObjectValue::Enumerated(0));

        array.set(priority(8), ObjectValue::Enumerated(1));
        assert_eq!(array.resolve(), &ObjectValue::Enumerated(1));
        assert_eq!(array.active_priority(), Some(priority(8)));

        array.set(priority(3), ObjectValue::Enumerated(0));
        assert_eq!(array.resolve(), &ObjectValue::Enumerated(0));
        assert_eq!(array.active_priority(), Some(priority(3)));

        array.set(priority(3), ObjectValue::Null);
        assert_eq!(array.resolve(), &ObjectValue::Enumerated(1));
        assert_eq!(array.active_priority(), Some(priority(8)));
    }

    #[test]
    fn empty_array_resolves_to_relinquish_default() {
        let mut array = PriorityArray::new(ObjectValue::Real(20.0));
        assert_eq!(array.resolve(), &ObjectValue::Real(20.0));
        assert_eq!(array.active_priority(), None);

        array.set(priority(10), ObjectValue::Real(42.5));
        array.set(priority(10), ObjectValue::Null);
        assert_eq!(array.resolve(), &ObjectValue::Real(20.0));
    }

    #[test]
    fn relinquish_default_replacement_leaves_slots_alone() {
        let mut array = PriorityArray::new(ObjectValue::Enumerated(0));
        array.set(priority(8), ObjectValue::Enumerated(1));
        array.set_relinquish_default(ObjectValue::Enumerated(1));
        assert_eq!(array.slot(priority(8)), &ObjectValue::Enumerated(1));
        assert_eq!(array.resolve(), &ObjectValue::Enumerated(1));

        array.set(priority(8), ObjectValue::Null);
        assert_eq!(array.resolve(), &ObjectValue::Enumerated(1));
    }
}
