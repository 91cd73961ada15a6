//! Append-only commit log.
//!
//! Frame layout:
//! ```text
//! ┌────────────┬────────────┬──────────────────────────────┐
//! │ len (u32)  │ crc (u32)  │ payload (bincode CommitRecord)│
//! │ LE         │ LE         │ `len` bytes                   │
//! └────────────┴────────────┴──────────────────────────────┘
//! ```
//!
//! A crash mid-append leaves a short or mismatching last frame. That tail is
//! dropped on open with a warning. A bad frame followed by good ones means
//! the file was damaged some other way and opening fails.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::feed::CommitRecord;

/// Bytes before each payload.
pub const FRAME_HEADER: usize = 8;

/// FNV-1a folded over little-endian words of the payload.
pub fn checksum(payload: &[u8]) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    hash ^= payload.len() as u32;
    hash = hash.wrapping_mul(0x0100_0193);
    for chunk in payload.chunks(4) {
        let mut word = [0u8; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        hash ^= u32::from_le_bytes(word);
        hash = hash.wrapping_mul(0x0100_0193);
    }
    hash
}

/// Encode one record as a complete frame.
pub fn encode_frame(record: &CommitRecord) -> Result<Vec<u8>, StoreError> {
    let payload = record.encode()?;
    let mut frame = Vec::with_capacity(FRAME_HEADER + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    frame.extend_from_slice(&checksum(&payload).to_le_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Result of scanning a log.
#[derive(Debug, Default)]
pub struct WalReadout {
    pub records: Vec<CommitRecord>,
    /// Length of the intact prefix.
    pub valid_len: u64,
    /// Whether bytes past `valid_len` were discarded.
    pub torn_tail: bool,
}

/// Decode every intact frame in `bytes`.
pub fn read_frames(bytes: &[u8]) -> Result<WalReadout, StoreError> {
    let mut out = WalReadout::default();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        if rest.len() < FRAME_HEADER {
            out.torn_tail = true;
            break;
        }
        let len = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]) as usize;
        let crc = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]);
        let end = FRAME_HEADER + len;
        if rest.len() < end {
            out.torn_tail = true;
            break;
        }

        let payload = &rest[FRAME_HEADER..end];
        let is_last = offset + end == bytes.len();
        let next_sequence = out.records.last().map_or(0, |r| r.version) + 1;

        if checksum(payload) != crc {
            if is_last {
                out.torn_tail = true;
                break;
            }
            return Err(StoreError::Corrupt {
                sequence: next_sequence,
                reason: "checksum mismatch".into(),
            });
        }

        let record = CommitRecord::decode(payload).map_err(|e| StoreError::Corrupt {
            sequence: next_sequence,
            reason: e.to_string(),
        })?;
        out.records.push(record);
        offset += end;
        out.valid_len = offset as u64;
    }

    Ok(out)
}

/// The on-disk log file.
pub struct WriteAheadLog {
    file: File,
    path: PathBuf,
    records: usize,
    bytes: u64,
    sync_writes: bool,
}

impl WriteAheadLog {
    /// Open (or create) the log, returning it with whatever it already held.
    /// A torn tail is cut off here so the next append starts on a frame
    /// boundary.
    pub fn open(path: impl AsRef<Path>, sync_writes: bool) -> Result<(Self, WalReadout), StoreError> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        let readout = read_frames(&bytes)?;

        if readout.torn_tail {
            log::warn!(
                "Discarding {} byte(s) of torn log tail in {}",
                bytes.len() as u64 - readout.valid_len,
                path.display()
            );
            file.set_len(readout.valid_len)?;
        }
        file.seek(SeekFrom::Start(readout.valid_len))?;

        let wal = Self {
            file,
            path,
            records: readout.records.len(),
            bytes: readout.valid_len,
            sync_writes,
        };
        Ok((wal, readout))
    }

    /// Append one frame. On failure the file is cut back to the last whole
    /// frame, so later appends never land behind a partial one.
    pub fn append(&mut self, record: &CommitRecord) -> Result<(), StoreError> {
        let frame = encode_frame(record)?;
        if let Err(e) = self.write_frame(&frame) {
            self.rollback();
            return Err(e);
        }
        self.records += 1;
        self.bytes += frame.len() as u64;
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8]) -> Result<(), StoreError> {
        self.file.write_all(frame)?;
        if self.sync_writes {
            self.file.sync_data()?;
        }
        Ok(())
    }

    fn rollback(&mut self) {
        let result = self
            .file
            .set_len(self.bytes)
            .and_then(|()| self.file.seek(SeekFrom::Start(self.bytes)));
        if let Err(e) = result {
            log::error!(
                "Could not cut {} back to {} byte(s): {e}",
                self.path.display(),
                self.bytes
            );
        }
    }

    /// Drop every record (after they were folded into a snapshot).
    pub fn reset(&mut self) -> Result<(), StoreError> {
        self.file.set_len(0)?;
        self.file.seek(SeekFrom::Start(0))?;
        if self.sync_writes {
            self.file.sync_data()?;
        }
        self.records = 0;
        self.bytes = 0;
        Ok(())
    }

    pub fn sync(&mut self) -> Result<(), StoreError> {
        self.file.flush()?;
        self.file.sync_data()?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    pub fn size_bytes(&self) -> u64 {
        self.bytes
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
