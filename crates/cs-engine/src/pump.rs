//! Cooperative cancellation between playback steps.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// What the playback loop should do next.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

/// Serviced by the playback loops before every step, standing in for the
/// host's keyboard and frame handling.
pub trait EventPump {
    fn poll(&mut self) -> Flow;
}

impl<P: EventPump + ?Sized> EventPump for &mut P {
    fn poll(&mut self) -> Flow {
        (**self).poll()
    }
}

/// Pump that never stops playback.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPump;

impl EventPump for NoPump {
    fn poll(&mut self) -> Flow {
        Flow::Continue
    }
}

/// Pump backed by a shared stop flag.
#[derive(Clone, Debug, Default)]
pub struct StopFlag {
    flag: Arc<AtomicBool>,
}

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_arc(flag: Arc<AtomicBool>) -> Self {
        Self { flag }
    }

    pub fn request_stop(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

impl EventPump for StopFlag {
    fn poll(&mut self) -> Flow {
        if self.is_stopped() {
            Flow::Stop
        } else {
            Flow::Continue
        }
    }
}

/// Stops after a fixed number of polls. Handy for bounding offline runs.
#[derive(Clone, Copy, Debug)]
pub struct StepLimit {
    remaining: u64,
}

impl StepLimit {
    pub fn new(steps: u64) -> Self {
        Self { remaining: steps }
    }
}

impl EventPump for StepLimit {
    fn poll(&mut self) -> Flow {
        if self.remaining == 0 {
            return Flow::Stop;
        }
        self.remaining -= 1;
        Flow::Continue
    }
}
