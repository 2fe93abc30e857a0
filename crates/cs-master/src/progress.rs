use std::sync::atomic::{AtomicU64, Ordering};

use cs_hw::HardwareTimer;

/// Timer wrapper that publishes the units waited so far.
///
/// Every comparator load is added to a shared counter, so another thread can
/// follow playback without touching engine state.
pub struct ProgressTimer<'a, T: HardwareTimer + ?Sized> {
    inner: &'a mut T,
    elapsed: &'a AtomicU64,
}

impl<'a, T: HardwareTimer + ?Sized> ProgressTimer<'a, T> {
    pub fn new(inner: &'a mut T, elapsed: &'a AtomicU64) -> Self {
        Self { inner, elapsed }
    }
}

impl<T: HardwareTimer + ?Sized> HardwareTimer for ProgressTimer<'_, T> {
    fn max_reload(&self) -> u32 {
        self.inner.max_reload()
    }

    fn load(&mut self, units: u32) {
        self.elapsed.fetch_add(units as u64, Ordering::Relaxed);
        self.inner.load(units);
    }

    fn is_pending(&mut self) -> bool {
        self.inner.is_pending()
    }

    fn acknowledge(&mut self) {
        self.inner.acknowledge()
    }
}
