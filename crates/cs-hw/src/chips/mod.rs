//! Sound chip drivers.
//!
//! Each driver is a set of free functions over [`Registers`](crate::Registers)
//! with the chip's pitch tables. Pitch lookups return `None` outside a
//! table's range and the note functions then write nothing.

pub mod midi;
pub mod opl3;
pub mod psg;
pub mod sid;
