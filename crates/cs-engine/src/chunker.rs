//! Waits longer than one comparator period.

use cs_hw::HardwareTimer;

/// Block for exactly `units` timer units, reloading the comparator as often
/// as its width requires. Returns the number of reloads performed.
///
/// Zero waits return immediately without touching the timer. The wait is not
/// interruptible; cancellation happens between waits.
pub fn wait<T: HardwareTimer + ?Sized>(timer: &mut T, units: u64) -> u64 {
    let max = timer.max_reload().max(1) as u64;
    let mut remaining = units;
    let mut reloads = 0;
    while remaining > 0 {
        let chunk = remaining.min(max);
        timer.load(chunk as u32);
        while !timer.is_pending() {
            core::hint::spin_loop();
        }
        timer.acknowledge();
        remaining -= chunk;
        reloads += 1;
    }
    reloads
}
