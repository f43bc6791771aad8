//! Record header layout.

/// Status byte of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordStatus {
    /// Current revision of a document.
    Active = 0,
    /// Tombstoned revision.
    Deleted = 1,
}

impl RecordStatus {
    /// Parses a status byte. Unknown values return `None`.
    #[must_use]
    pub const fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Active),
            1 => Some(Self::Deleted),
            _ => None,
        }
    }

    /// Returns the raw byte value.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Fixed-size header in front of every record payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Raw status byte, kept raw so that unknown values can be reported.
    pub status: u8,
    /// Payload length in bytes.
    pub len: u32,
}

impl RecordHeader {
    /// Header size: status (1) + len (4) = 5
    pub const SIZE: usize = 5;

    /// Header for a new active record.
    #[must_use]
    pub const fn active(len: u32) -> Self {
        Self {
            status: RecordStatus::Active.as_byte(),
            len,
        }
    }

    /// Parsed status, if the byte is a known one.
    #[must_use]
    pub const fn status(&self) -> Option<RecordStatus> {
        RecordStatus::from_byte(self.status)
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0] = self.status;
        buf[1..].copy_from_slice(&self.len.to_le_bytes());
        buf
    }

    /// Decodes a header from the first five bytes of `data`.
    ///
    /// Returns `None` if fewer than five bytes are given.
    #[must_use]
    pub fn decode(data: &[u8]) -> Option<Self> {
        let bytes: [u8; Self::SIZE] = data.get(..Self::SIZE)?.try_into().ok()?;
        Some(Self {
            status: bytes[0],
            len: u32::from_le_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]),
        })
    }

    /// Total record size, header included.
    #[must_use]
    pub const fn record_size(&self) -> u64 {
        Self::SIZE as u64 + self.len as u64
    }
}
