//! Durable element store.
//!
//! One LMDB environment per data directory with a single named database
//! mapping session identifier to the JSON-encoded session record. A committed
//! write transaction is the durability point: a mutation is acknowledged only
//! after its record has been committed here.

use std::fs;
use std::path::Path;

use heed3::types::{Bytes, Str};
use heed3::{Database, Env, EnvOpenOptions};

use crate::config::policy;
use crate::error::{StoreError, StoreResult};
use crate::model::SessionRecord;

const DB_SESSIONS: &str = "sessions";

/// Embedded ordered key/value store for session records.
///
/// Cheap to share: `Env` is internally reference-counted and `Database` is
/// `Copy`. Concurrent puts on different keys are independent at the LMDB
/// level.
pub struct ElementStore {
    env: Env,
    sessions: Database<Str, Bytes>,
}

impl ElementStore {
    /// Open (or create) the store under the given data directory.
    // LMDB requires the caller to vouch for the mapping's soundness.
    #[allow(unsafe_code)]
    pub fn open(path: &Path) -> StoreResult<Self> {
        fs::create_dir_all(path)?;

        let env = unsafe {
            EnvOpenOptions::new().map_size(policy::STORE_MAP_SIZE).max_dbs(4).open(path)?
        };

        let mut wtxn = env.write_txn()?;
        let sessions =
            env.database_options().types::<Str, Bytes>().name(DB_SESSIONS).create(&mut wtxn)?;
        wtxn.commit()?;

        Ok(Self { env, sessions })
    }

    /// Durably write a session record, replacing any prior value.
    pub fn put(&self, record: &SessionRecord) -> StoreResult<()> {
        let bytes = serde_json::to_vec(record).map_err(StoreError::Encode)?;
        let mut wtxn = self.env.write_txn()?;
        self.sessions.put(&mut wtxn, &record.id, &bytes)?;
        wtxn.commit()?;
        Ok(())
    }

    /// Read a session record by identifier.
    pub fn get(&self, id: &str) -> StoreResult<Option<SessionRecord>> {
        let rtxn = self.env.read_txn()?;
        match self.sessions.get(&rtxn, id)? {
            Some(bytes) => {
                serde_json::from_slice(bytes).map(Some).map_err(|e| StoreError::decode(id, e))
            }
            None => Ok(None),
        }
    }

    /// Whether a record exists for the identifier.
    pub fn contains(&self, id: &str) -> StoreResult<bool> {
        let rtxn = self.env.read_txn()?;
        Ok(self.sessions.get(&rtxn, id)?.is_some())
    }

    /// Enumerate all persisted session identifiers, in key order.
    pub fn session_ids(&self) -> StoreResult<Vec<String>> {
        let rtxn = self.env.read_txn()?;
        let mut ids = Vec::new();
        for entry in self.sessions.iter(&rtxn)? {
            let (id, _) = entry?;
            ids.push(id.to_string());
        }
        Ok(ids)
    }
}

impl std::fmt::Debug for ElementStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ElementStore").finish()
    }
}
