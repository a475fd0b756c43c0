use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;

use rkyv::{AlignedVec, Deserialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{Record, Timestamp};
use crate::store::{StoreAdapter, TimeIndex};

// Length prefix of every frame.
const FRAME_HEADER: u64 = 4;

/// Append-only file of length-prefixed rkyv frames.
#[derive(Debug)]
pub struct Segment {
    file: File,
    strict: bool,
    current_offset: u64,
}

impl Segment {
    pub fn new(path: &Path, strict: bool) -> io::Result<Self> {
        let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;

        let metadata = file.metadata()?;
        let current_offset = metadata.len();

        Ok(Self {
           file,
           strict,
           current_offset,
        })
    }

    pub fn append(&mut self, record: &Record) -> Result<u64> {
        let bytes = rkyv::to_bytes::<_, 4096>(record)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

        let start = self.current_offset;

        // [Length (4b)][Data (N bytes)]
        let len = bytes.len() as u32;
        self.file.seek(SeekFrom::End(0))?;
        self.file.write_all(&len.to_le_bytes())?;
        self.file.write_all(&bytes)?;
        if self.strict {
            self.file.sync_data()?;
        }

        self.current_offset += FRAME_HEADER + bytes.len() as u64;
        Ok(start)
    }

    pub fn read(&self, offset: u64) -> Result<Record> {
        self.read_frame(offset).map(|(record, _)| record)
    }

    /// Reads the frame at `offset`, returning the record and the offset of
    /// the frame after it.
    fn read_frame(&self, offset: u64) -> Result<(Record, u64)> {
        // Clone file handle for the read so the writer is not seeked
        let mut file = self.file.try_clone()?;
        file.seek(SeekFrom::Start(offset))?;

        let mut len_buf = [0u8; 4];
        file.read_exact(&mut len_buf)?;
        let len = u32::from_le_bytes(len_buf) as usize;
        if offset + FRAME_HEADER + len as u64 > self.current_offset {
            return Err(Error::Corrupt { offset, reason: format!("frame of {} bytes runs past end of segment", len) });
        }

        let mut bytes = AlignedVec::with_capacity(len);
        bytes.resize(len, 0);
        file.read_exact(&mut bytes)?;

        let archived = rkyv::check_archived_root::<Record>(&bytes)
        .map_err(|e| Error::Corrupt { offset, reason: e.to_string() })?;
        let record: Record = archived.deserialize(&mut rkyv::Infallible)
        .map_err(|e| Error::Corrupt { offset, reason: format!("{:?}", e) })?;
        Ok((record, offset + FRAME_HEADER + len as u64))
    }

    /// Walks every frame from the start, yielding `(offset, record)` and the
    /// offset just past the last good frame. Stops at the first frame that
    /// cannot be read.
    pub fn scan(&self) -> (Vec<(u64, Record)>, u64) {
        let mut frames = Vec::new();
        let mut offset = 0;
        while offset < self.current_offset {
            match self.read_frame(offset) {
                Ok((record, next)) => {
                    frames.push((offset, record));
                    offset = next;
                }
                Err(e) => {
                    warn!("stopping segment scan at {}: {}", offset, e);
                    break;
                }
            }
        }
        (frames, offset)
    }

    /// Cuts the file back to `len` bytes so later appends follow the last
    /// good frame.
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.file.set_len(len)?;
        if self.strict {
            self.file.sync_data()?;
        }
        self.current_offset = len;
        Ok(())
    }

    pub fn len(&self) -> u64 {
        self.current_offset
    }
}

/// A `StoreAdapter` over a `Segment` file. Appending a record whose key was
/// seen before supersedes the earlier version.
#[derive(Debug)]
pub struct SegmentStore {
    segment: Segment,
    index: TimeIndex<u64>,
    latest: HashMap<u128, u64>,
}

impl SegmentStore {
    pub fn open(path: &Path, strict: bool) -> Result<Self> {
        let segment = Segment::new(path, strict)?;
        let mut store = Self { segment, index: TimeIndex::default(), latest: HashMap::new() };

        let (frames, good_len) = store.segment.scan();
        if good_len < store.segment.len() {
            warn!(
                path = %path.display(),
                dropped = store.segment.len() - good_len,
                "truncating damaged segment tail at {}", good_len
            );
            store.segment.truncate(good_len)?;
        }
        let count = frames.len();
        for (offset, record) in frames {
            store.index_record(&record, offset)?;
        }
        info!(path = %path.display(), frames = count, live = store.len(), "opened segment store");
        Ok(store)
    }

    /// Persists `record`, which must carry a key.
    pub fn append(&mut self, record: &Record) -> Result<u64> {
        assert!(record.key.is_some(), "only saved records go to the store");
        let offset = self.segment.append(record)?;
        self.index_record(record, offset)?;
        Ok(offset)
    }

    pub fn get(&self, id: Uuid) -> Result<Option<Record>> {
        match self.latest.get(&id.as_u128()) {
            Some(offset) => self.segment.read(*offset).map(Some),
            None => Ok(None),
        }
    }

    /// Number of live (latest-version) records.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn index_record(&mut self, record: &Record, offset: u64) -> Result<()> {
        if let Some(key) = record.key {
            if let Some(prev) = self.latest.insert(key, offset) {
                let old = self.segment.read(prev)?;
                self.index.remove(&old, prev);
            }
        }
        self.index.insert(record, offset);
        Ok(())
    }
}

impl StoreAdapter for SegmentStore {
    fn fetch_next(&self, after: Timestamp) -> Result<Option<Record>> {
        self.index.next_after(after).map(|offset| self.segment.read(offset)).transpose()
    }

    fn fetch_prev(&self, before: Timestamp) -> Result<Option<Record>> {
        self.index.prev_before(before).map(|offset| self.segment.read(offset)).transpose()
    }
}
