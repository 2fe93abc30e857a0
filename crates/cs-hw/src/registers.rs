//! Memory-mapped register access.

use tracing::trace;

/// Byte-wide access to the I/O page.
///
/// On hardware this is a volatile read/write at the given address; hosts
/// and tests substitute a recording or logging bus.
pub trait Registers {
    fn peek(&mut self, addr: u16) -> u8;
    fn poke(&mut self, addr: u16, value: u8);
}

impl<R: Registers + ?Sized> Registers for &mut R {
    fn peek(&mut self, addr: u16) -> u8 {
        (**self).peek(addr)
    }

    fn poke(&mut self, addr: u16, value: u8) {
        (**self).poke(addr, value)
    }
}

impl<R: Registers + ?Sized> Registers for Box<R> {
    fn peek(&mut self, addr: u16) -> u8 {
        (**self).peek(addr)
    }

    fn poke(&mut self, addr: u16, value: u8) {
        (**self).poke(addr, value)
    }
}

/// One register write, in issue order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RegWrite {
    pub addr: u16,
    pub value: u8,
}

/// A 64 KiB I/O image that logs every write.
///
/// Used for offline rendering and tests; reads return the last value written.
#[derive(Clone, Debug)]
pub struct RecordingBus {
    memory: Vec<u8>,
    writes: Vec<RegWrite>,
    capture: bool,
}

impl RecordingBus {
    pub fn new() -> Self {
        Self {
            memory: vec![0; 0x1_0000],
            writes: Vec::new(),
            capture: true,
        }
    }

    /// Bus that keeps the memory image but no write log.
    pub fn without_log() -> Self {
        Self {
            capture: false,
            ..Self::new()
        }
    }

    /// Preset a location without logging (e.g. a machine ID register).
    pub fn preset(&mut self, addr: u16, value: u8) {
        self.memory[addr as usize] = value;
    }

    pub fn writes(&self) -> &[RegWrite] {
        &self.writes
    }

    pub fn take_writes(&mut self) -> Vec<RegWrite> {
        std::mem::take(&mut self.writes)
    }

    /// Writes that hit `addr`, in order.
    pub fn writes_to(&self, addr: u16) -> impl Iterator<Item = u8> + '_ {
        self.writes.iter().filter(move |w| w.addr == addr).map(|w| w.value)
    }

    pub fn clear_log(&mut self) {
        self.writes.clear();
    }
}

impl Default for RecordingBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Registers for RecordingBus {
    fn peek(&mut self, addr: u16) -> u8 {
        self.memory[addr as usize]
    }

    fn poke(&mut self, addr: u16, value: u8) {
        self.memory[addr as usize] = value;
        if self.capture {
            self.writes.push(RegWrite { addr, value });
        }
    }
}

/// Bus that only traces writes. Stands in for hardware on a desktop host.
#[derive(Clone, Debug, Default)]
pub struct TraceBus {
    writes: u64,
}

impl TraceBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_count(&self) -> u64 {
        self.writes
    }
}

impl Registers for TraceBus {
    fn peek(&mut self, _addr: u16) -> u8 {
        0
    }

    fn poke(&mut self, addr: u16, value: u8) {
        self.writes += 1;
        trace!(addr = format_args!("{:#06x}", addr), value = format_args!("{:#04x}", value), "poke");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_bus_logs_in_order_and_remembers_values() {
        let mut bus = RecordingBus::new();
        bus.poke(0xD400, 1);
        bus.poke(0xD401, 2);
        bus.poke(0xD400, 3);
        assert_eq!(bus.peek(0xD400), 3);
        assert_eq!(bus.writes_to(0xD400).collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(bus.writes().len(), 3);
    }

    #[test]
    fn preset_is_not_logged() {
        let mut bus = RecordingBus::new();
        bus.preset(0xD6A7, 0x12);
        assert_eq!(bus.peek(0xD6A7), 0x12);
        assert!(bus.writes().is_empty());
    }

    #[test]
    fn forwarding_through_mut_ref() {
        fn poke_via<R: Registers>(mut r: R) {
            r.poke(0x10, 0x20);
        }
        let mut bus = RecordingBus::without_log();
        poke_via(&mut bus);
        assert_eq!(bus.peek(0x10), 0x20);
        assert!(bus.writes().is_empty());
    }
}
