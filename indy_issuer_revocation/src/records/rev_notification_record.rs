use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    errors::error::RevocationResult,
    primitives::identifiers::RevocationRegistryId,
    wallet::{
        base_wallet::RecordWallet, find_unique_record, record::Record,
        record_category::RecordCategory, record_tags::RecordTags, tag_filter::TagFilter,
        RecordLookup,
    },
};

/// Intent to notify a holder that their credential was revoked. Created when
/// a revocation is requested with `notify` set; consumed by the notification
/// protocol handler once the revocation is actually published.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevNotificationRecord {
    pub record_id: String,
    pub rev_reg_id: RevocationRegistryId,
    pub cred_rev_id: String,
    pub thread_id: String,
    pub connection_id: Option<String>,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl RevNotificationRecord {
    pub fn new(
        rev_reg_id: RevocationRegistryId,
        cred_rev_id: impl Into<String>,
        thread_id: Option<String>,
        connection_id: Option<String>,
        comment: Option<String>,
    ) -> Self {
        let cred_rev_id = cred_rev_id.into();
        let thread_id = thread_id
            .unwrap_or_else(|| Self::default_thread_id(&rev_reg_id, &cred_rev_id));
        Self {
            record_id: Uuid::new_v4().to_string(),
            rev_reg_id,
            cred_rev_id,
            thread_id,
            connection_id,
            comment,
            created_at: Utc::now(),
        }
    }

    /// Deterministic thread id used when the caller does not supply one.
    pub fn default_thread_id(rev_reg_id: &RevocationRegistryId, cred_rev_id: &str) -> String {
        format!("indy::{}::{}", rev_reg_id, cred_rev_id)
    }

    pub async fn save(&self, wallet: &dyn RecordWallet) -> RevocationResult<()> {
        wallet.upsert_record(self.to_record()?).await
    }

    pub fn to_record(&self) -> RevocationResult<Record> {
        let mut tags = RecordTags::default();
        tags.add("rev_reg_id", self.rev_reg_id.to_string());
        tags.add("cred_rev_id", self.cred_rev_id.clone());
        tags.add("thread_id", self.thread_id.clone());
        Ok(Record::builder()
            .category(RecordCategory::RevNotification)
            .name(self.record_id.clone())
            .value(serde_json::to_string(self)?)
            .tags(tags)
            .build())
    }

    pub fn from_record(record: &Record) -> RevocationResult<Self> {
        Ok(serde_json::from_str(record.value())?)
    }

    pub async fn find_by_thread_id(
        wallet: &dyn RecordWallet,
        thread_id: &str,
    ) -> RevocationResult<RecordLookup<Self>> {
        let filter = TagFilter::eq("thread_id", thread_id);
        let lookup = find_unique_record(wallet, RecordCategory::RevNotification, &filter).await?;
        Ok(match lookup {
            RecordLookup::Found(record) => RecordLookup::Found(Self::from_record(&record)?),
            RecordLookup::NotFound => RecordLookup::NotFound,
            RecordLookup::Duplicate => RecordLookup::Duplicate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_thread_id_is_deterministic() {
        let rev_reg_id = RevocationRegistryId::from("did:4:cd:CL_ACCUM:0");
        let record = RevNotificationRecord::new(rev_reg_id.clone(), "5", None, None, None);
        assert_eq!(record.thread_id, "indy::did:4:cd:CL_ACCUM:0::5");
        assert_eq!(
            record.thread_id,
            RevNotificationRecord::default_thread_id(&rev_reg_id, "5")
        );
    }
}
