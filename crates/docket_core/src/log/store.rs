//! Record log over a storage backend.

use crate::error::{CoreError, CoreResult};
use crate::log::record::{RecordHeader, RecordStatus};
use docket_codec::{decode_document, encode_document, Document};
use docket_storage::StorageBackend;
use parking_lot::RwLock;
use tracing::debug;

/// One record found by [`RecordLog::scan`].
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Offset of the record header.
    pub offset: u64,
    /// Parsed status, `None` for an unknown status byte.
    pub status: Option<RecordStatus>,
    /// Payload length from the header.
    pub len: u32,
    /// Decoded document, present only for active records that decode.
    pub document: Option<Document>,
}

impl LogEntry {
    /// Returns true for an active record whose payload decoded.
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.status == Some(RecordStatus::Active) && self.document.is_some()
    }
}

/// Append-only store of document revisions addressed by byte offset.
///
/// Reads never fail: short headers, payloads running past the end, deleted
/// records, unknown status bytes and undecodable payloads all read as
/// absent. Tombstoning is best-effort.
///
/// A tombstone is a single-byte overwrite and is not atomic with respect to
/// a concurrent read of the same offset; the log lock serializes them within
/// one process.
pub struct RecordLog {
    backend: RwLock<Box<dyn StorageBackend>>,
    sync_writes: bool,
}

impl RecordLog {
    /// Creates a record log over a backend.
    pub fn new(backend: Box<dyn StorageBackend>) -> Self {
        Self::with_sync(backend, false)
    }

    /// Creates a record log that optionally syncs after every write.
    pub fn with_sync(backend: Box<dyn StorageBackend>, sync_writes: bool) -> Self {
        Self {
            backend: RwLock::new(backend),
            sync_writes,
        }
    }

    /// Appends `doc` as a new active record and returns its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be encoded or the backend
    /// write fails.
    pub fn write(&self, doc: &Document) -> CoreResult<u64> {
        self.append(&Self::encode(doc)?)
    }

    /// Encodes `doc` as a complete active record, header included.
    ///
    /// Callers that must not touch anything else before knowing the
    /// document is storable encode first and [`append`](Self::append)
    /// later.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be encoded, e.g. it holds a
    /// non-finite float, or is larger than a record can describe.
    pub fn encode(doc: &Document) -> CoreResult<Vec<u8>> {
        let payload = encode_document(doc)?;
        let len = u32::try_from(payload.len()).map_err(|_| {
            CoreError::invalid_operation(format!(
                "document of {} bytes exceeds the record size limit",
                payload.len()
            ))
        })?;

        let mut buf = Vec::with_capacity(RecordHeader::SIZE + payload.len());
        buf.extend_from_slice(&RecordHeader::active(len).encode());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Appends a record produced by [`encode`](Self::encode) and returns
    /// its offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn append(&self, record: &[u8]) -> CoreResult<u64> {
        let mut backend = self.backend.write();
        let offset = backend.append(record)?;
        if self.sync_writes {
            backend.sync()?;
        } else {
            backend.flush()?;
        }
        Ok(offset)
    }

    /// Reads the document at `offset`, or `None` if there is no active,
    /// decodable record there.
    pub fn read(&self, offset: u64) -> Option<Document> {
        let backend = self.backend.read();
        let header = RecordHeader::decode(&backend.read_at(offset, RecordHeader::SIZE).ok()?)?;
        if header.status() != Some(RecordStatus::Active) {
            return None;
        }
        let payload = backend
            .read_at(offset + RecordHeader::SIZE as u64, header.len as usize)
            .ok()?;
        decode_document(&payload).ok()
    }

    /// Marks the record at `offset` deleted. Idempotent; failures are only
    /// logged.
    pub fn tombstone(&self, offset: u64) {
        let mut backend = self.backend.write();
        let result = backend
            .write_at(offset, &[RecordStatus::Deleted.as_byte()])
            .and_then(|()| backend.flush());
        if let Err(err) = result {
            debug!(offset, error = %err, "tombstone write failed, ignoring");
        }
    }

    /// Walks every complete record from the start of the log.
    ///
    /// Stops at the first header or payload that runs past the end, so a
    /// torn tail is skipped silently.
    ///
    /// # Errors
    ///
    /// Returns an error only if the backend fails to read bytes within its
    /// reported size.
    pub fn scan(&self) -> CoreResult<Vec<LogEntry>> {
        let backend = self.backend.read();
        let size = backend.size()?;

        let mut entries = Vec::new();
        let mut offset = 0u64;

        while offset + RecordHeader::SIZE as u64 <= size {
            let Some(header) = RecordHeader::decode(&backend.read_at(offset, RecordHeader::SIZE)?)
            else {
                break;
            };
            if offset + header.record_size() > size {
                break;
            }

            let status = header.status();
            let document = if status == Some(RecordStatus::Active) {
                let payload =
                    backend.read_at(offset + RecordHeader::SIZE as u64, header.len as usize)?;
                decode_document(&payload).ok()
            } else {
                None
            };

            entries.push(LogEntry {
                offset,
                status,
                len: header.len,
                document,
            });
            offset += header.record_size();
        }

        Ok(entries)
    }

    /// Current log size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot report its size.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.read().size()?)
    }

    /// Forces written records to stable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend sync fails.
    pub fn sync(&self) -> CoreResult<()> {
        self.backend.write().sync()?;
        Ok(())
    }
}

impl std::fmt::Debug for RecordLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordLog")
            .field("size", &self.size().ok())
            .field("sync_writes", &self.sync_writes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docket_codec::{doc, Value};
    use docket_storage::InMemoryBackend;

    fn create_log() -> RecordLog {
        RecordLog::new(Box::new(InMemoryBackend::new()))
    }

    #[test]
    fn write_and_read() {
        let log = create_log();
        let first = log.write(&doc! { "id" => "a", "n" => 1 }).unwrap();
        let second = log.write(&doc! { "id" => "b" }).unwrap();

        assert_eq!(first, 0);
        assert!(second > first);
        assert_eq!(log.read(first).unwrap().get("n"), Some(&Value::Integer(1)));
        assert_eq!(log.read(second).unwrap().get("id"), Some(&Value::from("b")));
    }

    #[test]
    fn non_finite_floats_are_not_written() {
        let log = create_log();
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                log.write(&doc! { "x" => bad }),
                Err(CoreError::Codec(_))
            ));
        }
        assert_eq!(log.size().unwrap(), 0);
    }

    #[test]
    fn encode_then_append_matches_write() {
        let log = create_log();
        let doc = doc! { "id" => "a" };
        let record = RecordLog::encode(&doc).unwrap();
        assert_eq!(record.len(), RecordHeader::SIZE + br#"{"id":"a"}"#.len());

        let offset = log.append(&record).unwrap();
        assert_eq!(log.read(offset), Some(doc));
    }

    #[test]
    fn on_disk_bytes_match_format() {
        let backend = InMemoryBackend::new();
        let mut log = RecordLog::new(Box::new(backend));
        log.write(&doc! { "a" => 1 }).unwrap();

        let bytes = {
            let backend = log.backend.get_mut();
            backend.read_at(0, backend.size().unwrap() as usize).unwrap()
        };
        assert_eq!(&bytes[..5], &[0, 7, 0, 0, 0]);
        assert_eq!(&bytes[5..], br#"{"a":1}"#);
    }

    #[test]
    fn tombstone_hides_record_and_is_idempotent() {
        let log = create_log();
        let offset = log.write(&doc! { "id" => "a" }).unwrap();
        let size = log.size().unwrap();

        log.tombstone(offset);
        log.tombstone(offset);

        assert!(log.read(offset).is_none());
        assert_eq!(log.size().unwrap(), size);
    }

    #[test]
    fn tombstone_past_end_is_swallowed() {
        let log = create_log();
        log.tombstone(1000);
        assert_eq!(log.size().unwrap(), 0);
    }

    #[test]
    fn short_header_reads_absent() {
        let log = RecordLog::new(Box::new(InMemoryBackend::with_data(vec![0, 3, 0])));
        assert!(log.read(0).is_none());
        assert!(log.read(99).is_none());
    }

    #[test]
    fn payload_past_end_reads_absent() {
        let mut data = vec![0, 50, 0, 0, 0];
        data.extend_from_slice(b"{}");
        let log = RecordLog::new(Box::new(InMemoryBackend::with_data(data)));
        assert!(log.read(0).is_none());
    }

    #[test]
    fn undecodable_or_unknown_status_reads_absent() {
        let mut data = vec![0, 3, 0, 0, 0];
        data.extend_from_slice(b"{x}");
        data.extend_from_slice(&[9, 2, 0, 0, 0]);
        data.extend_from_slice(b"{}");
        let log = RecordLog::new(Box::new(InMemoryBackend::with_data(data)));

        assert!(log.read(0).is_none());
        assert!(log.read(8).is_none());
    }

    #[test]
    fn scan_reports_every_complete_record() {
        let log = create_log();
        let a = log.write(&doc! { "id" => "a" }).unwrap();
        let b = log.write(&doc! { "id" => "b" }).unwrap();
        log.tombstone(a);

        let entries = log.scan().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].status, Some(RecordStatus::Deleted));
        assert!(!entries[0].is_live());
        assert_eq!(entries[1].offset, b);
        assert!(entries[1].is_live());
    }

    #[test]
    fn scan_stops_at_torn_tail() {
        let mut data = vec![0, 2, 0, 0, 0];
        data.extend_from_slice(b"{}");
        data.extend_from_slice(&[0, 40, 0, 0, 0, b'{']);
        let log = RecordLog::new(Box::new(InMemoryBackend::with_data(data)));

        let entries = log.scan().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].document, Some(Document::new()));
    }
}
