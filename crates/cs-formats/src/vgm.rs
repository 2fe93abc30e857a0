//! VGM register-stream files.

use std::io::Cursor;

use binrw::BinRead;
use cs_ir::{RegisterStream, StreamHeader};
use tracing::{debug, warn};

use crate::FormatError;

/// Versions before 1.50 have no data offset field; data starts here.
const LEGACY_DATA_START: usize = 0x40;
const FM_CLOCKS_AT: usize = 0x50;

/// Fixed part of the header, 0x00..0x40.
#[derive(BinRead, Debug)]
#[br(little, magic = b"Vgm ")]
struct VgmHeader {
    _eof_offset: u32,
    version: u32,
    _sn76489_clock: u32,
    _ym2413_clock: u32,
    gd3_offset: u32,
    total_samples: u32,
    loop_offset: u32,
    loop_samples: u32,
    _rate: u32,
    #[br(pad_before = 12, pad_after = 8)]
    data_offset: u32,
}

/// YM3812, YM3526, Y8950 and YMF262 clocks at 0x50 (v1.51+).
#[derive(BinRead, Debug, Default)]
#[br(little)]
struct FmClocks {
    ym3812: u32,
    _ym3526: u32,
    _y8950: u32,
    ymf262: u32,
}

/// Field at `at` holding an offset relative to its own position.
fn relative(at: usize, offset: u32) -> Option<usize> {
    (offset != 0).then(|| at + offset as usize)
}

/// Parse a VGM file into its header and command bytes.
pub fn load_vgm(buffer: &[u8]) -> Result<RegisterStream, FormatError> {
    let raw = VgmHeader::read(&mut Cursor::new(buffer)).map_err(FormatError::from_header)?;
    if raw.version < 0x100 {
        return Err(FormatError::UnsupportedVersion(raw.version));
    }

    let data_start = if raw.version >= 0x150 {
        relative(0x34, raw.data_offset).unwrap_or(LEGACY_DATA_START)
    } else {
        LEGACY_DATA_START
    };
    if data_start > buffer.len() {
        return Err(FormatError::UnexpectedEof);
    }

    let clocks = if data_start >= FM_CLOCKS_AT + 0x10 {
        FmClocks::read(&mut Cursor::new(&buffer[FM_CLOCKS_AT..])).map_err(FormatError::from_header)?
    } else {
        FmClocks::default()
    };

    let header = StreamHeader {
        version: raw.version,
        total_samples: raw.total_samples,
        loop_samples: raw.loop_samples,
        data_start,
        gd3_start: relative(0x14, raw.gd3_offset),
        loop_start: relative(0x1C, raw.loop_offset),
        ym3812_clock: clocks.ym3812,
        ymf262_clock: clocks.ymf262,
    };

    let end = match header.gd3_start {
        Some(gd3) if gd3 > data_start && gd3 <= buffer.len() => gd3,
        _ => buffer.len(),
    };
    let commands = buffer[data_start..end].to_vec();

    let loop_offset = header.loop_start.and_then(|start| {
        if (data_start..end).contains(&start) {
            Some(start - data_start)
        } else {
            warn!(start, data_start, end, "loop point outside command data");
            None
        }
    });

    debug!(
        version = header.version,
        bytes = commands.len(),
        looped = loop_offset.is_some(),
        mode = ?header.fm_mode(),
        "loaded register stream"
    );

    Ok(RegisterStream {
        header,
        commands,
        loop_offset,
    })
}
