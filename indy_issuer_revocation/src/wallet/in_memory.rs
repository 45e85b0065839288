use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use async_trait::async_trait;

use crate::{
    errors::error::{err_msg, RevocationErrorKind, RevocationResult},
    wallet::{
        base_wallet::{RecordWallet, VersionedRecord, WalletTransaction},
        record::Record,
        record_category::RecordCategory,
        record_tags::RecordTags,
        tag_filter::TagFilter,
    },
};

#[derive(Debug, Clone)]
struct StoredRecord {
    record: Record,
    version: u64,
}

type Store = HashMap<(RecordCategory, String), StoredRecord>;

/// In-memory [`RecordWallet`] used by tests and embedders without a durable
/// backend. Versions increment on every write so optimistic conflicts are
/// observable across concurrent tasks.
#[derive(Debug, Default)]
pub struct InMemoryWallet {
    store: Arc<RwLock<Store>>,
}

impl InMemoryWallet {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_store(&self) -> RevocationResult<RwLockReadGuard<'_, Store>> {
        lock_read(&self.store)
    }

    fn write_store(&self) -> RevocationResult<RwLockWriteGuard<'_, Store>> {
        lock_write(&self.store)
    }
}

fn lock_read(store: &RwLock<Store>) -> RevocationResult<RwLockReadGuard<'_, Store>> {
    store.read().map_err(|err| {
        error!("Unable to read-lock record store: {:?}", err);
        err_msg(
            RevocationErrorKind::LockError,
            format!("Unable to read-lock record store: {:?}", err),
        )
    })
}

fn lock_write(store: &RwLock<Store>) -> RevocationResult<RwLockWriteGuard<'_, Store>> {
    store.write().map_err(|err| {
        error!("Unable to write-lock record store: {:?}", err);
        err_msg(
            RevocationErrorKind::LockError,
            format!("Unable to write-lock record store: {:?}", err),
        )
    })
}

fn not_found(category: RecordCategory, name: &str) -> crate::errors::error::RevocationError {
    err_msg(
        RevocationErrorKind::WalletRecordNotFound,
        format!("Record not found, category: {}, name: {}", category, name),
    )
}

#[async_trait]
impl RecordWallet for InMemoryWallet {
    async fn add_record(&self, record: Record) -> RevocationResult<()> {
        let mut store = self.write_store()?;
        let key = (record.category(), record.name().to_string());
        if store.contains_key(&key) {
            return Err(err_msg(
                RevocationErrorKind::DuplicateWalletRecord,
                format!(
                    "Record already exists, category: {}, name: {}",
                    key.0, key.1
                ),
            ));
        }
        store.insert(key, StoredRecord { record, version: 1 });
        Ok(())
    }

    async fn get_record(&self, category: RecordCategory, name: &str) -> RevocationResult<Record> {
        let store = self.read_store()?;
        store
            .get(&(category, name.to_string()))
            .map(|stored| stored.record.clone())
            .ok_or_else(|| not_found(category, name))
    }

    async fn update_record_value(
        &self,
        category: RecordCategory,
        name: &str,
        new_value: &str,
    ) -> RevocationResult<()> {
        let mut store = self.write_store()?;
        let stored = store
            .get_mut(&(category, name.to_string()))
            .ok_or_else(|| not_found(category, name))?;
        stored.record.set_value(new_value);
        stored.version += 1;
        Ok(())
    }

    async fn update_record_tags(
        &self,
        category: RecordCategory,
        name: &str,
        new_tags: RecordTags,
    ) -> RevocationResult<()> {
        let mut store = self.write_store()?;
        let stored = store
            .get_mut(&(category, name.to_string()))
            .ok_or_else(|| not_found(category, name))?;
        stored.record.set_tags(new_tags);
        stored.version += 1;
        Ok(())
    }

    async fn delete_record(&self, category: RecordCategory, name: &str) -> RevocationResult<()> {
        let mut store = self.write_store()?;
        store
            .remove(&(category, name.to_string()))
            .map(|_| ())
            .ok_or_else(|| not_found(category, name))
    }

    async fn search_record(
        &self,
        category: RecordCategory,
        filter: Option<&TagFilter>,
    ) -> RevocationResult<Vec<Record>> {
        let store = self.read_store()?;
        let mut records: Vec<Record> = store
            .values()
            .filter(|stored| stored.record.category() == category)
            .filter(|stored| {
                filter
                    .map(|f| f.matches(stored.record.tags()))
                    .unwrap_or(true)
            })
            .map(|stored| stored.record.clone())
            .collect();
        records.sort_by(|a, b| a.name().cmp(b.name()));
        Ok(records)
    }

    async fn get_record_for_update(
        &self,
        category: RecordCategory,
        name: &str,
    ) -> RevocationResult<VersionedRecord> {
        let store = self.read_store()?;
        store
            .get(&(category, name.to_string()))
            .map(|stored| VersionedRecord {
                record: stored.record.clone(),
                version: stored.version,
            })
            .ok_or_else(|| not_found(category, name))
    }

    async fn transaction(&self) -> RevocationResult<Box<dyn WalletTransaction>> {
        Ok(Box::new(InMemoryTransaction {
            store: Arc::clone(&self.store),
            ops: vec![],
        }))
    }
}

enum TxOp {
    Add(Record),
    Put(Record),
    PutExpecting(Record, u64),
    Delete(RecordCategory, String),
}

struct InMemoryTransaction {
    store: Arc<RwLock<Store>>,
    ops: Vec<TxOp>,
}

#[async_trait]
impl WalletTransaction for InMemoryTransaction {
    fn add(&mut self, record: Record) {
        self.ops.push(TxOp::Add(record));
    }

    fn put(&mut self, record: Record) {
        self.ops.push(TxOp::Put(record));
    }

    fn put_expecting(&mut self, record: Record, expected_version: u64) {
        self.ops.push(TxOp::PutExpecting(record, expected_version));
    }

    fn delete(&mut self, category: RecordCategory, name: &str) {
        self.ops.push(TxOp::Delete(category, name.to_string()));
    }

    async fn commit(self: Box<Self>) -> RevocationResult<()> {
        let mut store = lock_write(&self.store)?;

        // Validate every staged operation against the live store before
        // mutating anything, so a failed commit leaves no partial state.
        for op in self.ops.iter() {
            match op {
                TxOp::Add(record) => {
                    let key = (record.category(), record.name().to_string());
                    if store.contains_key(&key) {
                        return Err(err_msg(
                            RevocationErrorKind::DuplicateWalletRecord,
                            format!(
                                "Transaction add collides with existing record, category: {}, \
                                 name: {}",
                                key.0, key.1
                            ),
                        ));
                    }
                }
                TxOp::PutExpecting(record, expected_version) => {
                    let key = (record.category(), record.name().to_string());
                    let current = store.get(&key).map(|stored| stored.version).unwrap_or(0);
                    if current != *expected_version {
                        return Err(err_msg(
                            RevocationErrorKind::ConflictDetected,
                            format!(
                                "Concurrent update detected, category: {}, name: {}, read \
                                 version: {}, stored version: {}",
                                key.0, key.1, expected_version, current
                            ),
                        ));
                    }
                }
                TxOp::Put(_) => {}
                TxOp::Delete(category, name) => {
                    if !store.contains_key(&(*category, name.clone())) {
                        return Err(not_found(*category, name));
                    }
                }
            }
        }

        for op in self.ops {
            match op {
                TxOp::Add(record) => {
                    let key = (record.category(), record.name().to_string());
                    store.insert(key, StoredRecord { record, version: 1 });
                }
                TxOp::Put(record) | TxOp::PutExpecting(record, _) => {
                    let key = (record.category(), record.name().to_string());
                    let version = store.get(&key).map(|stored| stored.version).unwrap_or(0);
                    store.insert(
                        key,
                        StoredRecord {
                            record,
                            version: version + 1,
                        },
                    );
                }
                TxOp::Delete(category, name) => {
                    store.remove(&(category, name));
                }
            }
        }
        Ok(())
    }
}
