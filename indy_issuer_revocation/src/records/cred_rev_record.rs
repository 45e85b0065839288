use std::fmt;

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

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuerCredRevState {
    Issued,
    Revoked,
}

impl fmt::Display for IssuerCredRevState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssuerCredRevState::Issued => f.write_str("issued"),
            IssuerCredRevState::Revoked => f.write_str("revoked"),
        }
    }
}

/// Revocation status of one issued credential, keyed by its slot in the
/// owning registry. Pendingness lives on the registry record, not here: this
/// record flips to `revoked` only when the revocation is actually published.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IssuerCredRevRecord {
    pub record_id: String,
    pub rev_reg_id: RevocationRegistryId,
    pub cred_rev_id: String,
    pub cred_ex_id: String,
    pub cred_ex_version: Option<String>,
    pub state: IssuerCredRevState,
    /// Audit note for the most recent state change.
    pub state_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IssuerCredRevRecord {
    pub fn new(
        rev_reg_id: RevocationRegistryId,
        cred_rev_id: impl Into<String>,
        cred_ex_id: impl Into<String>,
        cred_ex_version: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            record_id: Uuid::new_v4().to_string(),
            rev_reg_id,
            cred_rev_id: cred_rev_id.into(),
            cred_ex_id: cred_ex_id.into(),
            cred_ex_version,
            state: IssuerCredRevState::Issued,
            state_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Persists a state transition together with an audit reason.
    pub async fn set_state(
        &mut self,
        wallet: &dyn RecordWallet,
        new_state: IssuerCredRevState,
        reason: Option<&str>,
    ) -> RevocationResult<()> {
        debug!(
            "set_state >>> cred rev record {} ({}): {} -> {}, reason: {:?}",
            self.record_id, self.cred_rev_id, self.state, new_state, reason
        );
        self.state = new_state;
        self.state_reason = reason.map(str::to_string);
        self.save(wallet).await
    }

    pub async fn save(&mut self, wallet: &dyn RecordWallet) -> RevocationResult<()> {
        self.updated_at = Utc::now();
        wallet.upsert_record(self.to_record()?).await
    }

    pub fn to_record(&self) -> RevocationResult<Record> {
        Ok(Record::builder()
            .category(RecordCategory::IssuerCredRev)
            .name(self.record_id.clone())
            .value(serde_json::to_string(self)?)
            .tags(self.tags())
            .build())
    }

    pub fn from_record(record: &Record) -> RevocationResult<Self> {
        Ok(serde_json::from_str(record.value())?)
    }

    fn tags(&self) -> RecordTags {
        let mut tags = RecordTags::default();
        tags.add("rev_reg_id", self.rev_reg_id.to_string());
        tags.add("cred_rev_id", self.cred_rev_id.clone());
        tags.add("cred_ex_id", self.cred_ex_id.clone());
        tags.add("state", self.state.to_string());
        tags
    }

    /// Unique lookup by (registry id, credential revocation index). A
    /// duplicate match means the uniqueness invariant of the pair is broken.
    pub async fn find_by_ids(
        wallet: &dyn RecordWallet,
        rev_reg_id: &RevocationRegistryId,
        cred_rev_id: &str,
    ) -> RevocationResult<RecordLookup<Self>> {
        let filter = TagFilter::and(vec![
            TagFilter::eq("rev_reg_id", rev_reg_id.to_string()),
            TagFilter::eq("cred_rev_id", cred_rev_id),
        ]);
        lookup_one(wallet, &filter).await
    }

    /// Unique lookup by the issuance protocol's exchange id.
    pub async fn find_by_cred_ex_id(
        wallet: &dyn RecordWallet,
        cred_ex_id: &str,
    ) -> RevocationResult<RecordLookup<Self>> {
        let filter = TagFilter::eq("cred_ex_id", cred_ex_id);
        lookup_one(wallet, &filter).await
    }

    /// Bulk query by registry and/or state.
    pub async fn query(
        wallet: &dyn RecordWallet,
        rev_reg_id: Option<&RevocationRegistryId>,
        state: Option<IssuerCredRevState>,
    ) -> RevocationResult<Vec<Self>> {
        let mut filters = vec![];
        if let Some(rev_reg_id) = rev_reg_id {
            filters.push(TagFilter::eq("rev_reg_id", rev_reg_id.to_string()));
        }
        if let Some(state) = state {
            filters.push(TagFilter::eq("state", state.to_string()));
        }
        let filter = TagFilter::and(filters);
        let records = wallet
            .search_record(RecordCategory::IssuerCredRev, Some(&filter))
            .await?;
        records.iter().map(Self::from_record).collect()
    }
}

async fn lookup_one(
    wallet: &dyn RecordWallet,
    filter: &TagFilter,
) -> RevocationResult<RecordLookup<IssuerCredRevRecord>> {
    let lookup = find_unique_record(wallet, RecordCategory::IssuerCredRev, filter).await?;
    Ok(match lookup {
        RecordLookup::Found(record) => {
            RecordLookup::Found(IssuerCredRevRecord::from_record(&record)?)
        }
        RecordLookup::NotFound => RecordLookup::NotFound,
        RecordLookup::Duplicate => RecordLookup::Duplicate,
    })
}
