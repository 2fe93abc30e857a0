//! File decoders for chipseq.
//!
//! Standard MIDI Files become a [`Sequence`](cs_ir::Sequence) of packed
//! track tables, VGM files become a [`RegisterStream`](cs_ir::RegisterStream),
//! and digests are sequences saved already decoded.

use thiserror::Error;

mod digest;
mod smf;
mod vgm;

pub use digest::{digest_bytes, read_digest, write_digest};
pub use smf::{
    decode_track, load_smf, load_smf_with, locate_header, read_structure, Pass, SmfStructure, TrackChunk,
    TrackDecoder, TrackItem, TrackSummary,
};
pub use vgm::load_vgm;

/// Error type for format parsing.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    #[error("invalid file header or magic bytes")]
    InvalidHeader,
    #[error("unexpected end of data")]
    UnexpectedEof,
    #[error("unsupported format version {0:#x}")]
    UnsupportedVersion(u32),
    #[error("data byte at offset {offset:#x} with no running status")]
    MissingRunningStatus { offset: usize },
    #[error("unknown status byte {status:#04x} at offset {offset:#x}")]
    UnknownStatus { status: u8, offset: usize },
    #[error("sequence too large for a digest file")]
    DigestOverflow,
}

impl FormatError {
    /// Map a `binrw` failure on a fixed header.
    pub(crate) fn from_header(err: binrw::Error) -> Self {
        if err.is_eof() {
            FormatError::UnexpectedEof
        } else {
            FormatError::InvalidHeader
        }
    }
}

/// What kind of file a buffer holds, judged by its magic bytes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileKind {
    NoteTrack,
    RegisterStream,
    Digest,
}

/// Guess the file kind. Anything without a known magic is assumed to be a
/// digest, which has none.
pub fn sniff(buffer: &[u8]) -> FileKind {
    if buffer.starts_with(b"Vgm ") {
        FileKind::RegisterStream
    } else if locate_header(buffer).is_ok() {
        FileKind::NoteTrack
    } else {
        FileKind::Digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniff_by_magic() {
        assert_eq!(sniff(b"Vgm \x00\x00"), FileKind::RegisterStream);
        assert_eq!(sniff(b"RIFF....MThd"), FileKind::NoteTrack);
        assert_eq!(sniff(&[1, 0, 0, 0]), FileKind::Digest);
    }
}
