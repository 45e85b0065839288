use std::fmt::Debug;

use async_trait::async_trait;

use crate::{
    errors::error::{RevocationErrorKind, RevocationResult},
    wallet::{
        record::Record, record_category::RecordCategory, record_tags::RecordTags,
        tag_filter::TagFilter,
    },
};

/// A record together with the store's version token at read time, for
/// optimistic update-in-place.
#[derive(Debug, Clone)]
pub struct VersionedRecord {
    pub record: Record,
    pub version: u64,
}

/// Tag-queryable record storage.
///
/// Implementations must guarantee that a committed [`WalletTransaction`] is
/// applied atomically, and that version tokens handed out by
/// `get_record_for_update` detect conflicting writers at commit time.
#[async_trait]
pub trait RecordWallet: Send + Sync + Debug {
    async fn add_record(&self, record: Record) -> RevocationResult<()>;

    async fn get_record(&self, category: RecordCategory, name: &str) -> RevocationResult<Record>;

    async fn update_record_value(
        &self,
        category: RecordCategory,
        name: &str,
        new_value: &str,
    ) -> RevocationResult<()>;

    async fn update_record_tags(
        &self,
        category: RecordCategory,
        name: &str,
        new_tags: RecordTags,
    ) -> RevocationResult<()>;

    async fn delete_record(&self, category: RecordCategory, name: &str) -> RevocationResult<()>;

    async fn search_record(
        &self,
        category: RecordCategory,
        filter: Option<&TagFilter>,
    ) -> RevocationResult<Vec<Record>>;

    /// Snapshot read for a subsequent conditional update through a
    /// transaction's `put_expecting`.
    async fn get_record_for_update(
        &self,
        category: RecordCategory,
        name: &str,
    ) -> RevocationResult<VersionedRecord>;

    /// Opens a staged transaction; dropping it without commit discards all
    /// staged operations.
    async fn transaction(&self) -> RevocationResult<Box<dyn WalletTransaction>>;

    /// Writes the record, inserting or replacing as needed.
    async fn upsert_record(&self, record: Record) -> RevocationResult<()> {
        match self.get_record(record.category(), record.name()).await {
            Ok(_) => {
                self.update_record_value(record.category(), record.name(), record.value())
                    .await?;
                self.update_record_tags(record.category(), record.name(), record.tags().clone())
                    .await
            }
            Err(err) if err.kind() == RevocationErrorKind::WalletRecordNotFound => {
                self.add_record(record).await
            }
            Err(err) => Err(err),
        }
    }
}

/// A set of staged record operations applied all-or-nothing.
#[async_trait]
pub trait WalletTransaction: Send {
    /// Stages an insert; commit fails with `DuplicateWalletRecord` if the
    /// record already exists.
    fn add(&mut self, record: Record);

    /// Stages an insert-or-replace.
    fn put(&mut self, record: Record);

    /// Stages a replace that commits only if the stored version still equals
    /// `expected_version`; otherwise the whole transaction fails with
    /// `ConflictDetected`.
    fn put_expecting(&mut self, record: Record, expected_version: u64);

    fn delete(&mut self, category: RecordCategory, name: &str);

    /// Applies every staged operation atomically.
    async fn commit(self: Box<Self>) -> RevocationResult<()>;
}
