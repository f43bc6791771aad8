//! Index file format.
//!
//! ```text
//! | magic "DKIX" (4) | version (1) | kind (1) | CBOR array of entries |
//! ```
//!
//! Primary entries are `[key, offset]`, secondary entries are
//! `[value, [offset, ...]]`.

use crate::error::{CoreError, CoreResult};
use docket_codec::{from_cbor, to_cbor};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use tracing::warn;

/// Magic bytes for index files: "DKIX"
const INDEX_MAGIC: [u8; 4] = *b"DKIX";

/// Current index file format version.
const INDEX_VERSION: u8 = 1;

const HEADER_SIZE: usize = 6;

/// Index kind codes.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexKind {
    /// Key to single offset.
    Primary = 0,
    /// Field value to offset set.
    Secondary = 1,
}

impl TryFrom<u8> for IndexKind {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(IndexKind::Primary),
            1 => Ok(IndexKind::Secondary),
            _ => Err(CoreError::invalid_format(format!(
                "unknown index kind: {value}"
            ))),
        }
    }
}

/// Serializes entries into a complete index file image.
pub(crate) fn encode<T: Serialize + ?Sized>(kind: IndexKind, entries: &T) -> CoreResult<Vec<u8>> {
    let body = to_cbor(entries)?;
    let mut buf = Vec::with_capacity(HEADER_SIZE + body.len());
    buf.extend_from_slice(&INDEX_MAGIC);
    buf.push(INDEX_VERSION);
    buf.push(kind as u8);
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Parses an index file image, checking magic, version and kind.
pub(crate) fn decode<T: DeserializeOwned>(kind: IndexKind, data: &[u8]) -> CoreResult<T> {
    if data.len() < HEADER_SIZE {
        return Err(CoreError::invalid_format("index file too small"));
    }
    if data[0..4] != INDEX_MAGIC {
        return Err(CoreError::invalid_format("invalid index magic"));
    }
    if data[4] != INDEX_VERSION {
        return Err(CoreError::invalid_format(format!(
            "unsupported index version: {}",
            data[4]
        )));
    }
    let found = IndexKind::try_from(data[5])?;
    if found != kind {
        return Err(CoreError::invalid_format(format!(
            "expected {kind:?} index, found {found:?}"
        )));
    }
    Ok(from_cbor(&data[HEADER_SIZE..])?)
}

/// Loads entries from `path`, falling back to empty on a missing or corrupt
/// file.
pub(crate) fn load_or_default<T: DeserializeOwned + Default>(kind: IndexKind, path: &Path) -> T {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => return T::default(),
        Err(err) => {
            warn!(path = %path.display(), error = %err, "cannot read index file, starting empty");
            return T::default();
        }
    };
    match decode(kind, &data) {
        Ok(entries) => entries,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "corrupt index file, starting empty");
            T::default()
        }
    }
}

/// Replaces the file at `path` with the given entries.
pub(crate) fn save<T: Serialize + ?Sized>(kind: IndexKind, path: &Path, entries: &T) -> CoreResult<()> {
    fs::write(path, encode(kind, entries)?)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_codec::Value;
    use tempfile::tempdir;

    #[test]
    fn header_layout() {
        let bytes = encode(IndexKind::Secondary, &Vec::<(Value, Vec<u64>)>::new()).unwrap();
        assert_eq!(&bytes[..6], b"DKIX\x01\x01");
    }

    #[test]
    fn kind_mismatch_is_rejected() {
        let bytes = encode(IndexKind::Primary, &vec![(Value::from("a"), 1u64)]).unwrap();
        let result: CoreResult<Vec<(Value, Vec<u64>)>> = decode(IndexKind::Secondary, &bytes);
        assert!(matches!(result, Err(CoreError::InvalidFormat { .. })));
    }

    #[test]
    fn bad_magic_and_version_are_rejected() {
        let mut bytes = encode(IndexKind::Primary, &Vec::<(Value, u64)>::new()).unwrap();
        bytes[4] = 9;
        assert!(decode::<Vec<(Value, u64)>>(IndexKind::Primary, &bytes).is_err());
        bytes[0] = b'X';
        assert!(decode::<Vec<(Value, u64)>>(IndexKind::Primary, &bytes).is_err());
        assert!(decode::<Vec<(Value, u64)>>(IndexKind::Primary, b"DK").is_err());
    }

    #[test]
    fn missing_or_corrupt_file_loads_empty() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pk.idx");

        let empty: Vec<(Value, u64)> = load_or_default(IndexKind::Primary, &path);
        assert!(empty.is_empty());

        std::fs::write(&path, b"DKIX\x01\x00\xff\xff").unwrap();
        let empty: Vec<(Value, u64)> = load_or_default(IndexKind::Primary, &path);
        assert!(empty.is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("pk.idx");
        let entries = vec![(Value::from("P1"), 0u64), (Value::Integer(2), 40)];

        save(IndexKind::Primary, &path, &entries).unwrap();
        let loaded: Vec<(Value, u64)> = load_or_default(IndexKind::Primary, &path);
        assert_eq!(loaded, entries);
    }
}
