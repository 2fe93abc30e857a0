//! Register-command streams (VGM).

use alloc::vec::Vec;

/// FM chip mode a stream was recorded for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FmMode {
    /// YM3812: OPL3 new-mode bit cleared.
    Opl2,
    /// YMF262: OPL3 new-mode bit set.
    #[default]
    Opl3,
}

/// Header fields the player needs, offsets already made absolute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StreamHeader {
    /// BCD version, e.g. 0x0151.
    pub version: u32,
    pub total_samples: u32,
    pub loop_samples: u32,
    /// Absolute file offset of the command data.
    pub data_start: usize,
    /// Absolute file offset of the GD3 tag, if any.
    pub gd3_start: Option<usize>,
    /// Absolute file offset of the loop point, if any.
    pub loop_start: Option<usize>,
    pub ym3812_clock: u32,
    pub ymf262_clock: u32,
}

impl StreamHeader {
    pub fn fm_mode(&self) -> FmMode {
        if self.ymf262_clock == 0 && self.ym3812_clock != 0 {
            FmMode::Opl2
        } else {
            FmMode::Opl3
        }
    }
}

/// Command bytes of one stream plus loop/end positions relative to them.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegisterStream {
    pub header: StreamHeader,
    pub commands: Vec<u8>,
    /// Offset into `commands` to resume at when looping.
    pub loop_offset: Option<usize>,
}

impl RegisterStream {
    /// Stream with no header data, for building command lists by hand.
    pub fn from_commands(commands: Vec<u8>, loop_offset: Option<usize>) -> Self {
        Self {
            header: StreamHeader::default(),
            commands,
            loop_offset,
        }
    }

    pub fn fm_mode(&self) -> FmMode {
        self.header.fm_mode()
    }

    /// Duration in seconds according to the header sample count.
    pub fn duration_seconds(&self) -> f64 {
        self.header.total_samples as f64 / crate::timing::STREAM_SAMPLE_RATE as f64
    }
}
