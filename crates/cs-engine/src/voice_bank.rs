//! VoiceBank: per-backend voice slot allocation.

use heapless::Vec;

/// Largest bank (OPL3 channels).
pub const MAX_SLOTS: usize = 9;

/// Identifier for a voice slot within one bank.
pub type SlotId = usize;

/// One hardware voice.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoiceSlot {
    /// Note currently sounding, `None` when free.
    pub occupant: Option<u8>,
    /// Skipped by the allocator; reachable only by fixed assignment.
    pub reserved: bool,
}

/// Fixed-size set of voices for one backend.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoiceBank {
    slots: Vec<VoiceSlot, MAX_SLOTS>,
}

impl VoiceBank {
    /// Create a bank of `count` free slots (at most [`MAX_SLOTS`]).
    pub fn new(count: usize) -> Self {
        let mut slots = Vec::new();
        slots.extend(core::iter::repeat(VoiceSlot::default()).take(count.min(MAX_SLOTS)));
        Self { slots }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Claim the first free, unreserved slot for `note`.
    /// Returns `None` when every slot is busy.
    pub fn allocate(&mut self, note: u8) -> Option<SlotId> {
        let id = self
            .slots
            .iter()
            .position(|s| !s.reserved && s.occupant.is_none())?;
        self.slots[id].occupant = Some(note);
        Some(id)
    }

    /// Free the first slot sounding `note`. `None` if no slot holds it.
    pub fn release(&mut self, note: u8) -> Option<SlotId> {
        let id = self.slots.iter().position(|s| s.occupant == Some(note))?;
        self.slots[id].occupant = None;
        Some(id)
    }

    /// Put `note` in `slot` directly, bypassing the scan (rhythm voices).
    pub fn assign(&mut self, slot: SlotId, note: u8) -> Option<SlotId> {
        let s = self.slots.get_mut(slot)?;
        s.occupant = Some(note);
        Some(slot)
    }

    /// Free `slot` directly, returning the note it held.
    pub fn clear(&mut self, slot: SlotId) -> Option<u8> {
        self.slots.get_mut(slot)?.occupant.take()
    }

    pub fn reserve(&mut self, slot: SlotId) {
        if let Some(s) = self.slots.get_mut(slot) {
            s.reserved = true;
        }
    }

    pub fn unreserve(&mut self, slot: SlotId) {
        if let Some(s) = self.slots.get_mut(slot) {
            s.reserved = false;
        }
    }

    pub fn get(&self, slot: SlotId) -> Option<&VoiceSlot> {
        self.slots.get(slot)
    }

    /// Count of occupied slots.
    pub fn active_count(&self) -> usize {
        self.slots.iter().filter(|s| s.occupant.is_some()).count()
    }

    /// Free every slot; reservations are kept.
    pub fn release_all(&mut self) {
        for s in &mut self.slots {
            s.occupant = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // === Allocation tests ===

    #[test]
    fn bank_new_is_empty() {
        let bank = VoiceBank::new(6);
        assert_eq!(bank.capacity(), 6);
        assert_eq!(bank.active_count(), 0);
    }

    #[test]
    fn bank_capacity_is_capped() {
        assert_eq!(VoiceBank::new(40).capacity(), MAX_SLOTS);
        assert_eq!(VoiceBank::new(MAX_SLOTS).capacity(), MAX_SLOTS);
        assert_eq!(VoiceBank::new(0).capacity(), 0);
    }

    #[test]
    fn allocate_takes_lowest_free_slot() {
        let mut bank = VoiceBank::new(3);
        assert_eq!(bank.allocate(60), Some(0));
        assert_eq!(bank.allocate(64), Some(1));
        bank.release(60);
        assert_eq!(bank.allocate(67), Some(0));
    }

    #[test]
    fn allocate_fails_when_full() {
        let mut bank = VoiceBank::new(2);
        bank.allocate(1);
        bank.allocate(2);
        assert_eq!(bank.allocate(3), None);
        assert_eq!(bank.active_count(), 2);
    }

    #[test]
    fn reserved_slots_are_skipped() {
        let mut bank = VoiceBank::new(3);
        bank.reserve(0);
        assert_eq!(bank.allocate(60), Some(1));
        bank.unreserve(0);
        assert_eq!(bank.allocate(61), Some(0));
    }

    // === Release tests ===

    #[test]
    fn release_unknown_note_is_noop() {
        let mut bank = VoiceBank::new(3);
        bank.allocate(60);
        assert_eq!(bank.release(61), None);
        assert_eq!(bank.active_count(), 1);
    }

    #[test]
    fn release_frees_first_duplicate() {
        let mut bank = VoiceBank::new(3);
        bank.allocate(60);
        bank.allocate(60);
        assert_eq!(bank.release(60), Some(0));
        assert_eq!(bank.get(1).unwrap().occupant, Some(60));
    }

    #[test]
    fn symmetric_sequence_returns_to_empty() {
        let mut bank = VoiceBank::new(6);
        let notes = [60u8, 62, 64, 65, 67, 69];
        for &n in &notes {
            assert!(bank.allocate(n).is_some());
        }
        assert_eq!(bank.allocate(71), None);
        for &n in notes.iter().rev() {
            assert!(bank.release(n).is_some());
        }
        assert_eq!(bank.active_count(), 0);
    }

    // === Fixed assignment ===

    #[test]
    fn assign_bypasses_reservation() {
        let mut bank = VoiceBank::new(3);
        bank.reserve(2);
        assert_eq!(bank.assign(2, 36), Some(2));
        assert_eq!(bank.clear(2), Some(36));
        assert_eq!(bank.assign(5, 36), None);
    }

    #[test]
    fn release_all_keeps_reservations() {
        let mut bank = VoiceBank::new(3);
        bank.reserve(1);
        bank.allocate(60);
        bank.release_all();
        assert_eq!(bank.active_count(), 0);
        assert!(bank.get(1).unwrap().reserved);
    }
}
