use std::path::Path;

use rocksdb::{Direction, ErrorKind, IteratorMode, Options, TransactionDB, TransactionDBOptions};
use serde::{Deserialize, Serialize};

use crate::contracts::{SequenceDefinition, SequenceId, SequenceStore, StoreError};
use crate::storage::retry::env_or;

/// Key prefix for sequence records
const SEQUENCE_PREFIX: &str = "seq";
/// Key of the last assigned sequence id
const NEXT_ID_KEY: &str = "meta:next_id";

/// Tuning for the RocksDB-backed store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RocksDbConfig {
    /// How long a transaction waits for a row lock before timing out.
    pub lock_timeout_ms: i64,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: 1000,
        }
    }
}

impl RocksDbConfig {
    /// Reads `NUMSEQ_LOCK_TIMEOUT_MS` (default: 1000).
    pub fn from_env() -> Self {
        Self {
            lock_timeout_ms: env_or("NUMSEQ_LOCK_TIMEOUT_MS", Self::default().lock_timeout_ms),
        }
    }
}

/// On-disk value under `seq:{name}`.
#[derive(Debug, Serialize, Deserialize)]
struct StoredRecord {
    id: u64,
    definition: SequenceDefinition,
}

/// Durable sequence store on a RocksDB `TransactionDB`.
///
/// Creates and compare-and-sets run in pessimistic transactions that lock
/// the record key with `get_for_update`, so the check and the write commit
/// together. Lock waits longer than the configured timeout surface as
/// `StoreError::Timeout`.
pub struct RocksDbSequenceStore {
    db: TransactionDB,
    config: RocksDbConfig,
}

impl RocksDbSequenceStore {
    /// Opens or creates a store at the given path with default settings.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::open_with_config(path, RocksDbConfig::default())
    }

    pub fn open_with_config(
        path: impl AsRef<Path>,
        config: RocksDbConfig,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);

        let mut txn_opts = TransactionDBOptions::default();
        txn_opts.set_txn_lock_timeout(config.lock_timeout_ms);

        let db = TransactionDB::open(&opts, &txn_opts, path)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        tracing::info!(
            path = %path.display(),
            lock_timeout_ms = config.lock_timeout_ms,
            "Opened RocksDB sequence store"
        );

        Ok(Self { db, config })
    }

    pub fn config(&self) -> &RocksDbConfig {
        &self.config
    }

    /// Creates a record key.
    fn sequence_key(name: &str) -> String {
        format!("{}:{}", SEQUENCE_PREFIX, name)
    }

    fn serialize_record(record: &StoredRecord) -> Result<Vec<u8>, StoreError> {
        bincode::serialize(record).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    fn deserialize_record(bytes: &[u8]) -> Result<StoredRecord, StoreError> {
        bincode::deserialize(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Parses a u64 from big-endian bytes.
    #[inline]
    fn parse_u64_be(bytes: &[u8]) -> Result<u64, StoreError> {
        bytes
            .try_into()
            .map(u64::from_be_bytes)
            .map_err(|_| StoreError::Serialization("Invalid u64 bytes".into()))
    }

    /// Maps a RocksDB status onto the store's error kinds.
    fn classify(name: &str, err: rocksdb::Error) -> StoreError {
        match err.kind() {
            ErrorKind::TimedOut => StoreError::Timeout(format!("{}: {}", name, err)),
            ErrorKind::Busy | ErrorKind::TryAgain => StoreError::Conflict(name.to_string()),
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

impl SequenceStore for RocksDbSequenceStore {
    fn find_by_name(&self, name: &str) -> Result<Option<SequenceDefinition>, StoreError> {
        match self.db.get(Self::sequence_key(name).as_bytes()) {
            Ok(Some(bytes)) => Ok(Some(Self::deserialize_record(&bytes)?.definition)),
            Ok(None) => Ok(None),
            Err(e) => Err(Self::classify(name, e)),
        }
    }

    fn create_if_absent(&self, definition: SequenceDefinition) -> Result<SequenceId, StoreError> {
        let name = definition.name.clone();
        let key = Self::sequence_key(&name);
        let txn = self.db.transaction();

        if txn
            .get_for_update(key.as_bytes(), true)
            .map_err(|e| Self::classify(&name, e))?
            .is_some()
        {
            return Err(StoreError::DuplicateName(name));
        }

        // Lock order is always record key, then id counter.
        let id = match txn
            .get_for_update(NEXT_ID_KEY.as_bytes(), true)
            .map_err(|e| Self::classify(&name, e))?
        {
            Some(bytes) => Self::parse_u64_be(&bytes)? + 1,
            None => 1,
        };

        let bytes = Self::serialize_record(&StoredRecord { id, definition })?;
        txn.put(NEXT_ID_KEY.as_bytes(), id.to_be_bytes())
            .map_err(|e| Self::classify(&name, e))?;
        txn.put(key.as_bytes(), bytes)
            .map_err(|e| Self::classify(&name, e))?;
        txn.commit().map_err(|e| Self::classify(&name, e))?;

        tracing::debug!(sequence = %name, id, "Stored new sequence");
        Ok(SequenceId(id))
    }

    fn compare_and_set_value(
        &self,
        name: &str,
        expected: &str,
        new_value: &str,
    ) -> Result<(), StoreError> {
        let key = Self::sequence_key(name);
        let txn = self.db.transaction();

        let bytes = txn
            .get_for_update(key.as_bytes(), true)
            .map_err(|e| Self::classify(name, e))?
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        let mut record = Self::deserialize_record(&bytes)?;

        if record.definition.current_value != expected {
            return Err(StoreError::Conflict(name.to_string()));
        }
        record.definition.current_value = new_value.to_string();

        txn.put(key.as_bytes(), Self::serialize_record(&record)?)
            .map_err(|e| Self::classify(name, e))?;
        txn.commit().map_err(|e| Self::classify(name, e))
    }

    fn list_names(&self) -> Result<Vec<String>, StoreError> {
        let prefix = format!("{}:", SEQUENCE_PREFIX);
        let mut names = Vec::new();
        for item in self
            .db
            .iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward))
        {
            let (key, _) = item.map_err(|e| StoreError::Unavailable(e.to_string()))?;
            let Some(name) = key.strip_prefix(prefix.as_bytes()) else {
                break;
            };
            names.push(String::from_utf8_lossy(name).into_owned());
        }
        Ok(names)
    }
}
