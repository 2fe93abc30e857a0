//! Startup capability probe.

use cs_ir::Backend;
use tracing::debug;

use crate::map::VKY_MID;
use crate::registers::Registers;

/// A backend was requested that this machine does not have.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DeviceError {
    #[error("{0} backend is not present on this machine")]
    Unavailable(Backend),
}

/// Which sound backends the running machine provides.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Capabilities {
    pub machine_id: u8,
    pub sid: bool,
    pub psg: bool,
    pub opl3: bool,
    pub midi: bool,
}

impl Capabilities {
    /// Every backend present; used on hosts that emulate the I/O page.
    pub const fn all() -> Self {
        Self {
            machine_id: 0,
            sid: true,
            psg: true,
            opl3: true,
            midi: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            machine_id: 0,
            sid: false,
            psg: false,
            opl3: false,
            midi: false,
        }
    }

    pub fn has(&self, backend: Backend) -> bool {
        match backend {
            Backend::Midi => self.midi,
            Backend::Sid => self.sid,
            Backend::Psg => self.psg,
            Backend::Opl3 => self.opl3,
        }
    }

    pub fn require(&self, backend: Backend) -> Result<(), DeviceError> {
        if self.has(backend) {
            Ok(())
        } else {
            Err(DeviceError::Unavailable(backend))
        }
    }
}

/// F256 K-family machine (K, K2, Jr2 variants).
pub fn is_k_family(machine_id: u8) -> bool {
    (0x10..=0x16).contains(&(machine_id & 0x1F))
}

pub fn is_k2(machine_id: u8) -> bool {
    machine_id & 0x1F == 0x11
}

/// Wave2 expansion carrying the MIDI synth.
pub fn has_wave2(machine_id: u8) -> bool {
    matches!(machine_id & 0x3F, 0x22 | 0x11)
}

fn is_jr(machine_id: u8) -> bool {
    machine_id & 0x1F == 0x02
}

/// Read the machine ID register and derive the backends present.
pub fn probe<R: Registers>(regs: &mut R) -> Capabilities {
    let machine_id = regs.peek(VKY_MID);
    let f256 = is_k_family(machine_id) || is_jr(machine_id);
    let caps = Capabilities {
        machine_id,
        sid: f256,
        psg: f256,
        opl3: f256,
        midi: has_wave2(machine_id),
    };
    debug!(machine_id, ?caps, "probed machine");
    caps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::RecordingBus;

    fn probe_id(id: u8) -> Capabilities {
        let mut bus = RecordingBus::new();
        bus.preset(VKY_MID, id);
        probe(&mut bus)
    }

    #[test]
    fn k2_with_wave2_has_everything() {
        let caps = probe_id(0x11);
        assert!(is_k2(caps.machine_id));
        assert!(caps.has(Backend::Midi));
        assert!(caps.has(Backend::Opl3));
    }

    #[test]
    fn plain_k_has_no_midi() {
        let caps = probe_id(0x12);
        assert!(caps.sid && caps.psg && caps.opl3);
        assert_eq!(caps.require(Backend::Midi), Err(DeviceError::Unavailable(Backend::Midi)));
    }

    #[test]
    fn unknown_machine_has_nothing() {
        let caps = probe_id(0x00);
        for backend in Backend::ALL {
            assert!(!caps.has(backend));
        }
    }
}
