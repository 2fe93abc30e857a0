//! Hardware interface for chipseq.
//!
//! Register access, the 24-bit countdown timer, sound chip drivers and the
//! machine capability probe. Everything talks to the machine through the
//! [`Registers`] trait so the same drivers run against real I/O, a
//! recording bus, or a tracing stand-in.

pub mod chips;
pub mod map;
mod probe;
mod registers;
mod timer;

pub use probe::{has_wave2, is_k2, is_k_family, probe, Capabilities, DeviceError};
pub use registers::{RecordingBus, RegWrite, Registers, TraceBus};
pub use timer::{HardwareTimer, HostTimer, RegisterTimer, VirtualTimer};
