//! File backend: commit log plus periodic LZ4 snapshot.
//!
//! ```text
//! <path>/strokes.snapshot   LZ4(bincode{version, strokes})   base state
//! <path>/strokes.wal        framed CommitRecords             since base
//! ```
//!
//! Every commit is appended to the log. Once the log holds
//! `compaction_threshold` records, or right after a clear, the current state
//! is written as a new snapshot (temp file + rename) and the log is emptied.
//! If a crash lands between the rename and the truncate, the leftover records
//! are at or below the snapshot version and are skipped on recovery.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use drawx_core::{Stroke, StrokeOp};

use crate::backend::wal::{WalReadout, WriteAheadLog};
use crate::backend::{Backend, Recovered};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::feed::CommitRecord;
use crate::snapshot::StrokeSnapshot;

const SNAPSHOT_FILE: &str = "strokes.snapshot";
const WAL_FILE: &str = "strokes.wal";

#[derive(Serialize, Deserialize)]
struct SnapshotFile {
    version: u64,
    strokes: Vec<Stroke>,
}

pub struct FileBackend {
    dir: PathBuf,
    wal: WriteAheadLog,
    /// Log contents read at open, handed out once by `recover()`.
    pending: Option<WalReadout>,
    compaction_threshold: usize,
    sync_writes: bool,
    compactions: u64,
}

impl FileBackend {
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        fs::create_dir_all(&config.path)?;
        let (wal, readout) = WriteAheadLog::open(config.path.join(WAL_FILE), config.sync_writes)?;
        log::debug!(
            "Opened stroke log {} ({} record(s))",
            wal.path().display(),
            readout.records.len()
        );
        Ok(Self {
            dir: config.path.clone(),
            wal,
            pending: Some(readout),
            compaction_threshold: config.compaction_threshold.max(1),
            sync_writes: config.sync_writes,
            compactions: 0,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Records in the log since the last snapshot.
    pub fn log_len(&self) -> usize {
        self.wal.len()
    }

    /// Snapshots written since open.
    pub fn compactions(&self) -> u64 {
        self.compactions
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    fn load_snapshot(&self) -> Result<Option<SnapshotFile>, StoreError> {
        let path = self.snapshot_path();
        let compressed = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let raw = lz4_flex::decompress_size_prepended(&compressed)
            .map_err(|e| StoreError::Compression(e.to_string()))?;
        let (snapshot, _): (SnapshotFile, _) =
            bincode::serde::decode_from_slice(&raw, bincode::config::standard())?;
        Ok(Some(snapshot))
    }

    fn write_snapshot(&mut self, state: &StrokeSnapshot) -> Result<(), StoreError> {
        let file = SnapshotFile {
            version: state.version(),
            strokes: state.to_vec(),
        };
        let raw = bincode::serde::encode_to_vec(&file, bincode::config::standard())?;
        let compressed = lz4_flex::compress_prepend_size(&raw);

        let path = self.snapshot_path();
        let tmp = path.with_extension("snapshot.tmp");
        {
            let mut f = fs::File::create(&tmp)?;
            f.write_all(&compressed)?;
            if self.sync_writes {
                f.sync_all()?;
            }
        }
        fs::rename(&tmp, &path)?;
        self.wal.reset()?;
        self.compactions += 1;

        log::debug!(
            "Compacted {} stroke(s) at version {} ({} → {} bytes)",
            file.strokes.len(),
            file.version,
            raw.len(),
            compressed.len()
        );
        Ok(())
    }
}

impl Backend for FileBackend {
    fn name(&self) -> &'static str {
        "file"
    }

    fn recover(&mut self) -> Result<Recovered, StoreError> {
        let (base_version, strokes) = match self.load_snapshot()? {
            Some(s) => (s.version, s.strokes),
            None => (0, Vec::new()),
        };
        let readout = self.pending.take().unwrap_or_default();
        let log: Vec<CommitRecord> = readout
            .records
            .into_iter()
            .filter(|r| r.version > base_version)
            .collect();

        log::info!(
            "Recovered {} stroke(s) at version {base_version}, {} commit(s) to replay",
            strokes.len(),
            log.len()
        );
        Ok(Recovered {
            base_version,
            strokes,
            log,
        })
    }

    fn persist(&mut self, record: &CommitRecord, state: &StrokeSnapshot) -> Result<(), StoreError> {
        self.wal.append(record)?;

        // The record is durable from here on. A failed compaction leaves the
        // log intact and is retried on the next commit.
        let cleared = record.ops.iter().any(|op| matches!(op, StrokeOp::Clear));
        if cleared || self.wal.len() >= self.compaction_threshold {
            if let Err(e) = self.write_snapshot(state) {
                log::warn!(
                    "Compaction at version {} failed, keeping the log: {e}",
                    record.version
                );
            }
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.wal.sync()
    }
}
