//! redb-backed persistence for dusk.
//!
//! Holds two tables: the local instance registry and the postponement
//! tokens. Every mutation runs in one write transaction. redb serializes
//! write transactions, which is what makes [`StateStore::take_token`] an
//! atomic read-and-delete and [`StateStore::update_instance`] a
//! compare-and-set.

use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use dusk_core::PostponementToken;

use crate::error::{StateError, StateResult};
use crate::record::InstanceRecord;
use crate::tables::{self, INSTANCES};

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
    token_table: Arc<str>,
}

impl StateStore {
    /// Open (or create) a persistent store at `path`, keeping tokens in the
    /// table named `token_table`.
    pub fn open(path: &Path, token_table: &str) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            token_table: Arc::from(token_table),
        };
        store.ensure_tables()?;
        debug!(?path, token_table, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory(token_table: &str) -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self {
            db: Arc::new(db),
            token_table: Arc::from(token_table),
        };
        store.ensure_tables()?;
        debug!(token_table, "in-memory state store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        txn.open_table(INSTANCES).map_err(map_err!(Storage))?;
        txn.open_table(tables::tokens(&self.token_table))
            .map_err(map_err!(Storage))?;
        txn.commit().map_err(map_err!(Storage))?;
        Ok(())
    }

    pub fn token_table(&self) -> &str {
        &self.token_table
    }

    // ── Instances ──────────────────────────────────────────────────

    /// Insert or replace an instance record.
    pub fn put_instance(&self, record: &InstanceRecord) -> StateResult<()> {
        let mut record = record.clone();
        record.updated_at = epoch_secs();
        let value = serde_json::to_vec(&record).map_err(map_err!(Codec))?;
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        {
            let mut table = txn.open_table(INSTANCES).map_err(map_err!(Storage))?;
            table
                .insert(record.id.as_str(), value.as_slice())
                .map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Storage))?;
        debug!(instance_id = %record.id, status = %record.status, "instance stored");
        Ok(())
    }

    /// Get an instance record by id.
    pub fn get_instance(&self, id: &str) -> StateResult<Option<InstanceRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let table = txn.open_table(INSTANCES).map_err(map_err!(Storage))?;
        match table.get(id).map_err(map_err!(Storage))? {
            Some(guard) => {
                let record: InstanceRecord =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Codec))?;
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    /// List every instance record.
    pub fn list_instances(&self) -> StateResult<Vec<InstanceRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let table = txn.open_table(INSTANCES).map_err(map_err!(Storage))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Storage))? {
            let (_, value) = entry.map_err(map_err!(Storage))?;
            let record: InstanceRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Codec))?;
            results.push(record);
        }
        Ok(results)
    }

    /// Delete an instance record. Returns true if it existed.
    pub fn delete_instance(&self, id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        let existed;
        {
            let mut table = txn.open_table(INSTANCES).map_err(map_err!(Storage))?;
            existed = table.remove(id).map_err(map_err!(Storage))?.is_some();
        }
        txn.commit().map_err(map_err!(Storage))?;
        debug!(instance_id = %id, existed, "instance deleted");
        Ok(existed)
    }

    /// Read-modify-write one record inside a single write transaction.
    ///
    /// `mutate` returns whether it changed anything; when it returns `false`
    /// the transaction is aborted. Returns `None` if the instance does not
    /// exist, otherwise `Some(changed)` along with the record as it stands.
    pub fn update_instance<F>(
        &self,
        id: &str,
        mutate: F,
    ) -> StateResult<Option<(bool, InstanceRecord)>>
    where
        F: FnOnce(&mut InstanceRecord) -> bool,
    {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        let outcome = {
            let mut table = txn.open_table(INSTANCES).map_err(map_err!(Storage))?;
            let current = table
                .get(id)
                .map_err(map_err!(Storage))?
                .map(|guard| serde_json::from_slice::<InstanceRecord>(guard.value()))
                .transpose()
                .map_err(map_err!(Codec))?;

            match current {
                None => None,
                Some(mut record) => {
                    let changed = mutate(&mut record);
                    if changed {
                        record.updated_at = epoch_secs();
                        let value = serde_json::to_vec(&record).map_err(map_err!(Codec))?;
                        table
                            .insert(id, value.as_slice())
                            .map_err(map_err!(Storage))?;
                    }
                    Some((changed, record))
                }
            }
        };

        match outcome {
            Some((true, _)) => txn.commit().map_err(map_err!(Storage))?,
            _ => txn.abort().map_err(map_err!(Storage))?,
        }
        Ok(outcome)
    }

    // ── Tokens ─────────────────────────────────────────────────────

    /// Insert or replace a token.
    pub fn put_token(&self, token: &PostponementToken) -> StateResult<()> {
        let value = serde_json::to_vec(token).map_err(map_err!(Codec))?;
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        {
            let mut table = txn
                .open_table(tables::tokens(&self.token_table))
                .map_err(map_err!(Storage))?;
            table
                .insert(token.token.as_str(), value.as_slice())
                .map_err(map_err!(Storage))?;
        }
        txn.commit().map_err(map_err!(Storage))?;
        debug!(instance_id = %token.instance_id, expires_at = token.expires_at, "token stored");
        Ok(())
    }

    /// Read a token without consuming it. Expired tokens read as absent.
    pub fn get_token(&self, token: &str, now_epoch: i64) -> StateResult<Option<PostponementToken>> {
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let table = txn
            .open_table(tables::tokens(&self.token_table))
            .map_err(map_err!(Storage))?;
        match table.get(token).map_err(map_err!(Storage))? {
            Some(guard) => {
                let record: PostponementToken =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Codec))?;
                Ok((!record.is_expired(now_epoch)).then_some(record))
            }
            None => Ok(None),
        }
    }

    /// Remove a token and return it if it was still live.
    ///
    /// The removal and the read happen in the same write transaction, so
    /// of two concurrent callers only one can see the record.
    pub fn take_token(
        &self,
        token: &str,
        now_epoch: i64,
    ) -> StateResult<Option<PostponementToken>> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        let removed = {
            let mut table = txn
                .open_table(tables::tokens(&self.token_table))
                .map_err(map_err!(Storage))?;
            let guard = table.remove(token).map_err(map_err!(Storage))?;
            guard
                .map(|g| serde_json::from_slice::<PostponementToken>(g.value()))
                .transpose()
                .map_err(map_err!(Codec))?
        };
        txn.commit().map_err(map_err!(Storage))?;

        match removed {
            Some(record) if record.is_expired(now_epoch) => {
                debug!(instance_id = %record.instance_id, "expired token discarded");
                Ok(None)
            }
            other => Ok(other),
        }
    }

    /// Delete a token. Returns true if it existed.
    pub fn remove_token(&self, token: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        let existed;
        {
            let mut table = txn
                .open_table(tables::tokens(&self.token_table))
                .map_err(map_err!(Storage))?;
            existed = table.remove(token).map_err(map_err!(Storage))?.is_some();
        }
        txn.commit().map_err(map_err!(Storage))?;
        Ok(existed)
    }

    /// Delete all tokens expired at `now_epoch`. Unreadable entries go too.
    pub fn purge_expired_tokens(&self, now_epoch: i64) -> StateResult<u32> {
        let txn = self.db.begin_write().map_err(map_err!(Storage))?;
        let count;
        {
            let mut table = txn
                .open_table(tables::tokens(&self.token_table))
                .map_err(map_err!(Storage))?;
            let expired: Vec<String> = table
                .iter()
                .map_err(map_err!(Storage))?
                .filter_map(|entry| {
                    let (key, value) = entry.ok()?;
                    let live = serde_json::from_slice::<PostponementToken>(value.value())
                        .is_ok_and(|t| !t.is_expired(now_epoch));
                    (!live).then(|| key.value().to_string())
                })
                .collect();
            for key in &expired {
                table.remove(key.as_str()).map_err(map_err!(Storage))?;
            }
            count = expired.len() as u32;
        }
        txn.commit().map_err(map_err!(Storage))?;
        if count > 0 {
            debug!(count, "expired tokens purged");
        }
        Ok(count)
    }

    /// Number of stored tokens, live or not.
    pub fn token_count(&self) -> StateResult<u64> {
        let txn = self.db.begin_read().map_err(map_err!(Storage))?;
        let table = txn
            .open_table(tables::tokens(&self.token_table))
            .map_err(map_err!(Storage))?;
        let mut count = 0;
        for entry in table.iter().map_err(map_err!(Storage))? {
            entry.map_err(map_err!(Storage))?;
            count += 1;
        }
        Ok(count)
    }
}

pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
