//! RocksDB backend.
//!
//! Column families:
//! - `strokes`: LZ4(bincode Stroke), keyed by a big-endian insertion ordinal
//!   so a forward scan yields strokes in stored order
//! - `meta`: `version` and `next_ordinal`, both u64 BE
//!
//! Each commit rewrites the strokes it touched plus the meta keys in one
//! `WriteBatch`, so the database never holds half a commit. There is no
//! separate log: the database is always at the last persisted version.

use rocksdb::{
    BlockBasedOptions, ColumnFamily, ColumnFamilyDescriptor, DBCompressionType, DBWithThreadMode,
    IteratorMode, Options, SingleThreaded, WriteBatch, WriteOptions,
};
use std::collections::HashMap;

use drawx_core::{Stroke, StrokeId, StrokeOp};

use crate::backend::{Backend, Recovered};
use crate::config::StoreConfig;
use crate::error::StoreError;
use crate::feed::CommitRecord;
use crate::snapshot::StrokeSnapshot;

const CF_STROKES: &str = "strokes";
const CF_META: &str = "meta";
const COLUMN_FAMILIES: &[&str] = &[CF_STROKES, CF_META];

const KEY_VERSION: &[u8] = b"version";
const KEY_NEXT_ORDINAL: &[u8] = b"next_ordinal";

type Db = DBWithThreadMode<SingleThreaded>;

pub struct RocksBackend {
    db: Db,
    /// Stroke id → ordinal key of its row.
    ordinals: HashMap<StrokeId, u64>,
    next_ordinal: u64,
    sync_writes: bool,
}

fn cf<'a>(db: &'a Db, name: &str) -> Result<&'a ColumnFamily, StoreError> {
    db.cf_handle(name).ok_or_else(|| StoreError::Corrupt {
        sequence: 0,
        reason: format!("missing column family '{name}'"),
    })
}

fn read_u64(db: &Db, key: &[u8]) -> Result<u64, StoreError> {
    let meta = cf(db, CF_META)?;
    Ok(match db.get_cf(meta, key)? {
        Some(bytes) if bytes.len() == 8 => {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&bytes);
            u64::from_be_bytes(buf)
        }
        _ => 0,
    })
}

fn encode_stroke(stroke: &Stroke) -> Result<Vec<u8>, StoreError> {
    let raw = bincode::serde::encode_to_vec(stroke, bincode::config::standard())?;
    Ok(lz4_flex::compress_prepend_size(&raw))
}

fn decode_stroke(bytes: &[u8]) -> Result<Stroke, StoreError> {
    let raw = lz4_flex::decompress_size_prepended(bytes)
        .map_err(|e| StoreError::Compression(e.to_string()))?;
    let (stroke, _) = bincode::serde::decode_from_slice(&raw, bincode::config::standard())?;
    Ok(stroke)
}

impl RocksBackend {
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_max_open_files(64);
        db_opts.set_keep_log_file_num(5);

        let descriptors: Vec<ColumnFamilyDescriptor> = COLUMN_FAMILIES
            .iter()
            .map(|name| ColumnFamilyDescriptor::new(*name, Self::cf_options(name)))
            .collect();

        let db = Db::open_cf_descriptors(&db_opts, &config.path, descriptors)?;
        let next_ordinal = read_u64(&db, KEY_NEXT_ORDINAL)?;

        log::debug!("Opened RocksDB stroke store at {}", config.path.display());
        Ok(Self {
            db,
            ordinals: HashMap::new(),
            next_ordinal,
            sync_writes: config.sync_writes,
        })
    }

    fn cf_options(name: &str) -> Options {
        let mut opts = Options::default();
        let mut block_opts = BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false);
        opts.set_block_based_table_factory(&block_opts);

        match name {
            // Values are already LZ4 framed.
            CF_STROKES => opts.set_compression_type(DBCompressionType::None),
            _ => opts.set_compression_type(DBCompressionType::Lz4),
        }
        opts
    }

    /// Rows currently stored.
    pub fn stroke_rows(&self) -> usize {
        self.ordinals.len()
    }
}

impl Backend for RocksBackend {
    fn name(&self) -> &'static str {
        "rocksdb"
    }

    fn recover(&mut self) -> Result<Recovered, StoreError> {
        let version = read_u64(&self.db, KEY_VERSION)?;
        let strokes_cf = cf(&self.db, CF_STROKES)?;

        self.ordinals.clear();
        let mut strokes = Vec::new();
        for item in self.db.iterator_cf(strokes_cf, IteratorMode::Start) {
            let (key, value) = item?;
            if key.len() != 8 {
                log::warn!("Skipping stroke row with malformed key ({} bytes)", key.len());
                continue;
            }
            let mut buf = [0u8; 8];
            buf.copy_from_slice(&key);
            let stroke = decode_stroke(&value)?;
            self.ordinals.insert(stroke.id, u64::from_be_bytes(buf));
            strokes.push(stroke);
        }

        log::info!(
            "Recovered {} stroke(s) at version {version} from RocksDB",
            strokes.len()
        );
        Ok(Recovered {
            base_version: version,
            strokes,
            log: Vec::new(),
        })
    }

    fn persist(&mut self, record: &CommitRecord, state: &StrokeSnapshot) -> Result<(), StoreError> {
        let strokes_cf = cf(&self.db, CF_STROKES)?;
        let meta_cf = cf(&self.db, CF_META)?;
        let mut batch = WriteBatch::default();

        // Row bookkeeping is staged and only applied once the batch is written.
        let cleared = record.ops.iter().any(|op| matches!(op, StrokeOp::Clear));
        if cleared {
            for ordinal in self.ordinals.values() {
                batch.delete_cf(strokes_cf, ordinal.to_be_bytes());
            }
        }
        let mut next_ordinal = self.next_ordinal;
        let mut assigned: Vec<(StrokeId, u64)> = Vec::new();

        let mut touched: Vec<StrokeId> = Vec::new();
        for id in record.ops.iter().filter_map(StrokeOp::stroke_id) {
            if !touched.contains(&id) {
                touched.push(id);
            }
        }
        for id in touched {
            // Created and cleared within the same commit.
            let Some(stroke) = state.get(&id) else { continue };
            let existing = if cleared { None } else { self.ordinals.get(&id).copied() };
            let ordinal = match existing {
                Some(o) => o,
                None => {
                    let o = next_ordinal;
                    next_ordinal += 1;
                    assigned.push((id, o));
                    o
                }
            };
            batch.put_cf(strokes_cf, ordinal.to_be_bytes(), encode_stroke(stroke)?);
        }

        batch.put_cf(meta_cf, KEY_VERSION, record.version.to_be_bytes());
        batch.put_cf(meta_cf, KEY_NEXT_ORDINAL, next_ordinal.to_be_bytes());

        let mut write_opts = WriteOptions::default();
        write_opts.set_sync(self.sync_writes);
        self.db.write_opt(batch, &write_opts)?;

        if cleared {
            self.ordinals.clear();
        }
        self.ordinals.extend(assigned);
        self.next_ordinal = next_ordinal;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.db.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::BackendKind;
    use crate::feed::CommitOrigin;
    use drawx_core::Point;
    use uuid::Uuid;

    fn config(path: &std::path::Path) -> StoreConfig {
        StoreConfig {
            backend: BackendKind::RocksDb,
            ..StoreConfig::for_testing(path)
        }
    }

    fn commit(state: &mut StrokeSnapshot, ops: Vec<StrokeOp>) -> CommitRecord {
        for op in &ops {
            state.apply(op).unwrap();
        }
        let version = state.version() + 1;
        state.set_version(version);
        CommitRecord {
            version,
            origin: CommitOrigin::Local,
            ops,
        }
    }

    #[test]
    fn test_persist_and_recover_order() {
        let dir = tempfile::tempdir().unwrap();
        let ids: Vec<_> = (0..3).map(|_| Uuid::new_v4()).collect();
        {
            let mut backend = RocksBackend::open(&config(dir.path())).unwrap();
            let mut state = StrokeSnapshot::new();
            for id in &ids {
                let rec = commit(
                    &mut state,
                    vec![StrokeOp::Create {
                        id: *id,
                        color: "Rust".into(),
                        point: Point::new(1.0, 2.0),
                    }],
                );
                backend.persist(&rec, &state).unwrap();
            }
            let rec = commit(&mut state, vec![StrokeOp::Complete { id: ids[1] }]);
            backend.persist(&rec, &state).unwrap();
            backend.flush().unwrap();
        }

        let mut backend = RocksBackend::open(&config(dir.path())).unwrap();
        let recovered = backend.recover().unwrap();
        assert_eq!(recovered.base_version, 4);
        assert!(recovered.log.is_empty());
        let got: Vec<_> = recovered.strokes.iter().map(|s| s.id).collect();
        assert_eq!(got, ids);
        assert!(recovered.strokes[1].completed);
        assert_eq!(backend.stroke_rows(), 3);
    }

    #[test]
    fn test_clear_removes_rows() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = RocksBackend::open(&config(dir.path())).unwrap();
        let mut state = StrokeSnapshot::new();
        let rec = commit(
            &mut state,
            vec![StrokeOp::Create {
                id: Uuid::new_v4(),
                color: "Charcoal".into(),
                point: Point::new(0.0, 0.0),
            }],
        );
        backend.persist(&rec, &state).unwrap();
        let rec = commit(&mut state, vec![StrokeOp::Clear]);
        backend.persist(&rec, &state).unwrap();
        drop(backend);

        let mut backend = RocksBackend::open(&config(dir.path())).unwrap();
        let recovered = backend.recover().unwrap();
        assert_eq!(recovered.base_version, 2);
        assert!(recovered.strokes.is_empty());
    }

    #[test]
    fn test_rows_follow_written_batches() {
        let dir = tempfile::tempdir().unwrap();
        let mut backend = RocksBackend::open(&config(dir.path())).unwrap();
        let mut state = StrokeSnapshot::new();
        let old = Uuid::new_v4();
        let new = Uuid::new_v4();
        let rec = commit(
            &mut state,
            vec![StrokeOp::Create {
                id: old,
                color: "Dove".into(),
                point: Point::new(0.0, 0.0),
            }],
        );
        backend.persist(&rec, &state).unwrap();
        assert_eq!(backend.stroke_rows(), 1);

        let rec = commit(
            &mut state,
            vec![
                StrokeOp::Clear,
                StrokeOp::Create {
                    id: new,
                    color: "Melon".into(),
                    point: Point::new(1.0, 1.0),
                },
            ],
        );
        backend.persist(&rec, &state).unwrap();
        assert_eq!(backend.stroke_rows(), 1);
        assert_eq!(backend.next_ordinal, 2);
        drop(backend);

        let mut backend = RocksBackend::open(&config(dir.path())).unwrap();
        let recovered = backend.recover().unwrap();
        let ids: Vec<_> = recovered.strokes.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![new]);
        assert_eq!(backend.stroke_rows(), 1);
    }
}
