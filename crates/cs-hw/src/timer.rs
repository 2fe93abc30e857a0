//! Countdown timers with a bounded comparator.

use std::time::{Duration, Instant};

use cs_ir::{TimerConfig, TIMER_MAX_RELOAD};

use crate::map::*;
use crate::registers::Registers;

/// A one-shot timer that fires after at most [`max_reload`](Self::max_reload) units.
pub trait HardwareTimer {
    /// Largest value [`load`](Self::load) accepts.
    fn max_reload(&self) -> u32;
    /// Program the comparator with `units` and start counting.
    fn load(&mut self, units: u32);
    /// Whether the programmed interval has elapsed.
    fn is_pending(&mut self) -> bool;
    /// Clear the pending flag.
    fn acknowledge(&mut self);
}

impl<T: HardwareTimer + ?Sized> HardwareTimer for &mut T {
    fn max_reload(&self) -> u32 {
        (**self).max_reload()
    }

    fn load(&mut self, units: u32) {
        (**self).load(units)
    }

    fn is_pending(&mut self) -> bool {
        (**self).is_pending()
    }

    fn acknowledge(&mut self) {
        (**self).acknowledge()
    }
}

/// Timer 0 on the F256, counting up to a 24-bit compare value.
pub struct RegisterTimer<R: Registers> {
    regs: R,
}

impl<R: Registers> RegisterTimer<R> {
    pub fn new(regs: R) -> Self {
        Self { regs }
    }

    pub fn into_inner(self) -> R {
        self.regs
    }
}

impl<R: Registers> HardwareTimer for RegisterTimer<R> {
    fn max_reload(&self) -> u32 {
        TIMER_MAX_RELOAD
    }

    fn load(&mut self, units: u32) {
        let units = units.min(TIMER_MAX_RELOAD);
        self.regs.poke(TM0_CTRL, TM_CTRL_CLEAR);
        self.regs.poke(TM0_CMP_L, (units & 0xFF) as u8);
        self.regs.poke(TM0_CMP_M, ((units >> 8) & 0xFF) as u8);
        self.regs.poke(TM0_CMP_H, ((units >> 16) & 0xFF) as u8);
        self.regs.poke(TM0_CMP_CTRL, 0);
        self.regs.poke(TM0_CTRL, TM_CTRL_CLEAR);
        self.regs.poke(TM0_CTRL, TM_CTRL_INTEN | TM_CTRL_UP_DOWN | TM_CTRL_ENABLE);
    }

    fn is_pending(&mut self) -> bool {
        self.regs.peek(INT_PEND_0) & INT_TIMER_0 != 0
    }

    fn acknowledge(&mut self) {
        // write-one-to-clear
        self.regs.poke(INT_PEND_0, INT_TIMER_0);
    }
}

/// Wall-clock timer for desktop hosts. Never fires early.
pub struct HostTimer {
    config: TimerConfig,
    deadline: Option<Instant>,
    pending: bool,
}

impl HostTimer {
    pub fn new(config: TimerConfig) -> Self {
        Self {
            config,
            deadline: None,
            pending: false,
        }
    }
}

impl Default for HostTimer {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}

impl HardwareTimer for HostTimer {
    fn max_reload(&self) -> u32 {
        self.config.max_reload
    }

    fn load(&mut self, units: u32) {
        let nanos = units as u128 * 1_000_000_000 / self.config.units_per_second.max(1) as u128;
        self.deadline = Some(Instant::now() + Duration::from_nanos(nanos as u64));
        self.pending = false;
    }

    fn is_pending(&mut self) -> bool {
        if let Some(deadline) = self.deadline {
            let now = Instant::now();
            if now < deadline {
                std::thread::sleep(deadline - now);
            }
            self.deadline = None;
            self.pending = true;
        }
        self.pending
    }

    fn acknowledge(&mut self) {
        self.pending = false;
    }
}

/// Timer that fires immediately and accounts the units it was asked to wait.
///
/// Used for offline rendering and tests. Keeps only counters so it can run
/// inside allocation-free sections.
#[derive(Clone, Debug)]
pub struct VirtualTimer {
    max_reload: u32,
    armed: Option<u32>,
    pending: bool,
    elapsed: u64,
    reloads: u64,
    largest_load: u32,
}

impl VirtualTimer {
    pub fn new() -> Self {
        Self::with_max_reload(TIMER_MAX_RELOAD)
    }

    pub fn with_max_reload(max_reload: u32) -> Self {
        Self {
            max_reload,
            armed: None,
            pending: false,
            elapsed: 0,
            reloads: 0,
            largest_load: 0,
        }
    }

    /// Units waited so far.
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    pub fn reloads(&self) -> u64 {
        self.reloads
    }

    pub fn largest_load(&self) -> u32 {
        self.largest_load
    }
}

impl Default for VirtualTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl HardwareTimer for VirtualTimer {
    fn max_reload(&self) -> u32 {
        self.max_reload
    }

    fn load(&mut self, units: u32) {
        self.armed = Some(units);
        self.pending = false;
        self.reloads += 1;
        self.largest_load = self.largest_load.max(units);
    }

    fn is_pending(&mut self) -> bool {
        if let Some(units) = self.armed.take() {
            self.elapsed += units as u64;
            self.pending = true;
        }
        self.pending
    }

    fn acknowledge(&mut self) {
        self.pending = false;
    }
}
