//! Packed track event records.

/// Size in bytes of one packed record in the event arena.
pub const RECORD_SIZE: usize = 8;

/// One decoded channel-voice message with its delay.
///
/// Packed layout: `delta` (u32 LE), `byte_count` (u8), `message` (3 bytes).
/// Two-byte messages leave the last message byte zero.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TrackEventRecord {
    /// Hardware timer units since the previous event in the same track.
    pub delta: u32,
    /// Number of meaningful bytes in `message` (2 or 3, 0 for a rest).
    pub byte_count: u8,
    /// Raw message bytes, status first.
    pub message: [u8; 3],
}

impl TrackEventRecord {
    /// Build a two-byte record (program change, channel pressure).
    pub const fn short(delta: u32, status: u8, data: u8) -> Self {
        Self {
            delta,
            byte_count: 2,
            message: [status, data, 0],
        }
    }

    /// Build a three-byte record.
    pub const fn long(delta: u32, status: u8, data1: u8, data2: u8) -> Self {
        Self {
            delta,
            byte_count: 3,
            message: [status, data1, data2],
        }
    }

    /// Build a record that only waits. Gaps wider than one `delta` are
    /// carried by rests ahead of the real event.
    pub const fn rest(delta: u32) -> Self {
        Self {
            delta,
            byte_count: 0,
            message: [0; 3],
        }
    }

    pub const fn is_rest(&self) -> bool {
        self.byte_count == 0
    }

    /// Status byte of the message.
    pub const fn status(&self) -> u8 {
        self.message[0]
    }

    /// MIDI channel (low nibble of the status byte).
    pub const fn channel(&self) -> u8 {
        self.message[0] & 0x0F
    }

    /// Meaningful message bytes.
    pub fn bytes(&self) -> &[u8] {
        let len = (self.byte_count as usize).min(self.message.len());
        &self.message[..len]
    }

    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let d = self.delta.to_le_bytes();
        [
            d[0],
            d[1],
            d[2],
            d[3],
            self.byte_count,
            self.message[0],
            self.message[1],
            self.message[2],
        ]
    }

    pub fn from_bytes(bytes: &[u8; RECORD_SIZE]) -> Self {
        Self {
            delta: u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            byte_count: bytes[4],
            message: [bytes[5], bytes[6], bytes[7]],
        }
    }
}
