use std::{
    fmt,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use url::Url;
use uuid::Uuid;

use crate::{
    anoncreds::base_anoncreds::IssuerAnonCreds,
    errors::error::{err_msg, RevocationErrorKind, RevocationResult},
    ledger::{
        base_ledger::AnoncredsLedgerWrite,
        error::{LedgerError, RejectReason},
    },
    primitives::{
        identifiers::{CredentialDefinitionId, RevocationRegistryId},
        rev_reg_def::{RegistryType, RevocationRegistryDefinition},
        rev_reg_delta::RevocationRegistryDelta,
    },
    utils::{with_retry, RetryPolicy},
    wallet::{
        base_wallet::RecordWallet, find_unique_record, record::Record,
        record_category::RecordCategory, record_tags::RecordTags, tag_filter::TagFilter,
        RecordLookup,
    },
};

/// Lifecycle state of an issuer revocation registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuerRevRegState {
    Init,
    Generated,
    Posted,
    Active,
    Full,
    Decommissioned,
}

impl IssuerRevRegState {
    /// Legal forward edges; states never move backward.
    pub fn can_transition_to(self, next: IssuerRevRegState) -> bool {
        use IssuerRevRegState::*;
        matches!(
            (self, next),
            (Init, Generated)
                | (Generated, Posted)
                | (Posted, Active)
                | (Active, Active)
                | (Active, Full)
                | (Full, Decommissioned)
        )
    }
}

impl fmt::Display for IssuerRevRegState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IssuerRevRegState::Init => "init",
            IssuerRevRegState::Generated => "generated",
            IssuerRevRegState::Posted => "posted",
            IssuerRevRegState::Active => "active",
            IssuerRevRegState::Full => "full",
            IssuerRevRegState::Decommissioned => "decommissioned",
        };
        f.write_str(name)
    }
}

/// One accumulator-backed revocation registry owned by the issuer.
///
/// Registries are never deleted; a registry that fills up is marked `full`,
/// decommissioned and superseded by a fresh one for the same credential
/// definition.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IssuerRevRegRecord {
    pub record_id: String,
    pub state: IssuerRevRegState,
    pub cred_def_id: CredentialDefinitionId,
    pub issuer_did: String,
    pub rev_reg_id: Option<RevocationRegistryId>,
    pub revoc_def_type: RegistryType,
    pub tag: Option<String>,
    pub max_cred_num: u32,
    pub rev_reg_def: Option<RevocationRegistryDefinition>,
    pub rev_reg_entry: Option<RevocationRegistryDelta>,
    pub tails_local_path: Option<PathBuf>,
    pub tails_public_uri: Option<String>,
    /// Credential revocation indices marked revoked locally but not yet
    /// published to the ledger. Sorted numerically, no duplicates.
    pub pending_pub: Vec<String>,
    /// Last publication failure, kept for audit.
    pub error_msg: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl IssuerRevRegRecord {
    pub fn new(
        cred_def_id: CredentialDefinitionId,
        issuer_did: impl Into<String>,
        max_cred_num: u32,
    ) -> Self {
        let now = Utc::now();
        Self {
            record_id: Uuid::new_v4().to_string(),
            state: IssuerRevRegState::Init,
            cred_def_id,
            issuer_did: issuer_did.into(),
            rev_reg_id: None,
            revoc_def_type: RegistryType::ClAccum,
            tag: None,
            max_cred_num,
            rev_reg_def: None,
            rev_reg_entry: None,
            tails_local_path: None,
            tails_public_uri: None,
            pending_pub: vec![],
            error_msg: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Produces the registry key pair and tails file. Requires state `init`
    /// and a revocation-capable credential definition.
    pub async fn generate(
        &mut self,
        wallet: &dyn RecordWallet,
        anoncreds: &dyn IssuerAnonCreds,
        tails_dir: &Path,
    ) -> RevocationResult<()> {
        trace!(
            "generate >>> record_id: {}, cred_def_id: {}, max_cred_num: {}",
            self.record_id,
            self.cred_def_id,
            self.max_cred_num
        );
        if self.state != IssuerRevRegState::Init {
            return Err(err_msg(
                RevocationErrorKind::InvalidState,
                format!(
                    "Revocation registry {} must be in state init to generate, found {}",
                    self.record_id, self.state
                ),
            ));
        }
        if !anoncreds
            .cred_def_supports_revocation(wallet, &self.cred_def_id)
            .await?
        {
            return Err(err_msg(
                RevocationErrorKind::InvalidConfiguration,
                format!(
                    "Credential definition {} does not support revocation",
                    self.cred_def_id
                ),
            ));
        }

        // The tag is baked into the derived registry id, so it must be fixed
        // before key generation.
        if self.tag.is_none() {
            self.tag = Some(self.record_id.clone());
        }
        let tag = self.tag.clone().expect("tag was just set");

        let (rev_reg_id, rev_reg_def, rev_reg_entry) = anoncreds
            .create_and_store_rev_reg(
                wallet,
                &self.issuer_did,
                &self.cred_def_id,
                tails_dir,
                self.max_cred_num,
                &tag,
            )
            .await?;

        self.tails_local_path = Some(tails_dir.join(&rev_reg_def.value.tails_hash));
        self.rev_reg_id = Some(rev_reg_id);
        self.rev_reg_def = Some(rev_reg_def);
        self.rev_reg_entry = Some(rev_reg_entry);
        self.state = IssuerRevRegState::Generated;
        self.save(wallet).await
    }

    /// Records where holders can fetch the tails file. The URI must carry a
    /// scheme, a host and a path; a registry definition must exist so the
    /// location can be embedded in it.
    pub async fn set_tails_public_uri(
        &mut self,
        wallet: &dyn RecordWallet,
        uri: &str,
    ) -> RevocationResult<()> {
        let rev_reg_def = self.rev_reg_def.as_mut().ok_or_else(|| {
            err_msg(
                RevocationErrorKind::InvalidState,
                format!(
                    "Revocation registry {} has no definition; generate it before setting the \
                     tails file location",
                    self.record_id
                ),
            )
        })?;
        let parsed = Url::parse(uri)?;
        if parsed.host().is_none() || parsed.path().trim_matches('/').is_empty() {
            return Err(err_msg(
                RevocationErrorKind::InvalidUrl,
                format!("Tails uri must include scheme, host and path: {}", uri),
            ));
        }
        rev_reg_def.value.tails_location = uri.to_string();
        self.tails_public_uri = Some(uri.to_string());
        self.save(wallet).await
    }

    /// Publishes the registry definition. Requires state `generated` and a
    /// holder-reachable tails location.
    pub async fn send_def(
        &mut self,
        wallet: &dyn RecordWallet,
        ledger_write: &dyn AnoncredsLedgerWrite,
        retry: &RetryPolicy,
    ) -> RevocationResult<()> {
        trace!("send_def >>> record_id: {}", self.record_id);
        if self.state != IssuerRevRegState::Generated {
            return Err(err_msg(
                RevocationErrorKind::InvalidState,
                format!(
                    "Revocation registry {} must be in state generated to publish its \
                     definition, found {}",
                    self.record_id, self.state
                ),
            ));
        }
        if self.tails_public_uri.is_none() {
            return Err(err_msg(
                RevocationErrorKind::InvalidConfiguration,
                format!(
                    "Revocation registry {} has no public tails file URI; holders could not \
                     fetch proof data",
                    self.record_id
                ),
            ));
        }
        let rev_reg_def = self
            .rev_reg_def
            .as_ref()
            .expect("definition exists in state generated");

        with_retry(
            retry,
            "publish_rev_reg_def",
            || ledger_write.publish_rev_reg_def(rev_reg_def, &self.issuer_did),
            |err| matches!(err, LedgerError::Transport(_)),
        )
        .await?;

        self.state = IssuerRevRegState::Posted;
        self.save(wallet).await
    }

    /// Publishes the current accumulator entry. The first successful entry
    /// moves the registry `posted -> active`; later calls are delta updates.
    ///
    /// Rejections flagged as invalid client requests are not surfaced here:
    /// the caller (see `manager::recovery`) repairs the ledger and retries.
    pub async fn send_entry(
        &mut self,
        wallet: &dyn RecordWallet,
        ledger_write: &dyn AnoncredsLedgerWrite,
        retry: &RetryPolicy,
    ) -> RevocationResult<String> {
        trace!("send_entry >>> record_id: {}", self.record_id);
        if !matches!(
            self.state,
            IssuerRevRegState::Posted | IssuerRevRegState::Active | IssuerRevRegState::Full
        ) {
            return Err(err_msg(
                RevocationErrorKind::InvalidState,
                format!(
                    "Revocation registry {} must be posted before entries can be published, \
                     found state {}",
                    self.record_id, self.state
                ),
            ));
        }
        let rev_reg_id = self.rev_reg_id.clone().expect("id exists once posted");
        let entry = self.rev_reg_entry.clone().ok_or_else(|| {
            err_msg(
                RevocationErrorKind::InvalidState,
                format!("Revocation registry {} has no entry to publish", self.record_id),
            )
        })?;

        let result = with_retry(
            retry,
            "publish_rev_reg_entry",
            || {
                ledger_write.publish_rev_reg_entry(
                    &rev_reg_id,
                    self.revoc_def_type,
                    &entry,
                    &self.issuer_did,
                )
            },
            |err| matches!(err, LedgerError::Transport(_)),
        )
        .await;

        match result {
            Ok(response) => {
                self.error_msg = None;
                if self.state == IssuerRevRegState::Posted {
                    self.state = IssuerRevRegState::Active;
                }
                self.save(wallet).await?;
                Ok(response)
            }
            Err(err) => {
                if err.reject_reason() == Some(RejectReason::TaaAcceptanceRequired) {
                    return Err(err_msg(
                        RevocationErrorKind::TaaRequired,
                        format!(
                            "Ledger requires transaction author agreement acceptance before \
                             publishing entries for {}: {}",
                            rev_reg_id, err
                        ),
                    ));
                }
                if err.reject_reason() != Some(RejectReason::InvalidClientRequest) {
                    error!(
                        "send_entry >>> ledger refused entry for {}: {}",
                        rev_reg_id, err
                    );
                }
                self.error_msg = Some(err.to_string());
                self.save(wallet).await?;
                Err(err.into())
            }
        }
    }

    /// Queues a credential revocation index for a later batched publication.
    /// Adding an index twice is a no-op. Mutates only the in-memory record;
    /// the caller must persist it under a versioned update. Returns whether
    /// the queue changed.
    pub fn mark_pending(&mut self, cred_rev_id: &str) -> RevocationResult<bool> {
        if !matches!(
            self.state,
            IssuerRevRegState::Posted | IssuerRevRegState::Active | IssuerRevRegState::Full
        ) {
            return Err(err_msg(
                RevocationErrorKind::InvalidState,
                format!(
                    "Cannot mark revocations pending on registry {} in state {}",
                    self.record_id, self.state
                ),
            ));
        }
        self.validate_index(cred_rev_id)?;
        if self.pending_pub.iter().any(|pending| pending == cred_rev_id) {
            return Ok(false);
        }
        self.pending_pub.push(cred_rev_id.to_string());
        sort_indices(&mut self.pending_pub);
        Ok(true)
    }

    /// Drops the given indices (or all of them) from the pending set. Mutates
    /// only the in-memory record; returns whether anything changed.
    pub fn clear_pending(&mut self, cred_rev_ids: Option<&[String]>) -> bool {
        let before = self.pending_pub.len();
        match cred_rev_ids {
            None => self.pending_pub.clear(),
            Some([]) => self.pending_pub.clear(),
            Some(ids) => self.pending_pub.retain(|pending| !ids.contains(pending)),
        }
        self.pending_pub.len() != before
    }

    /// Applies a validated state transition and persists it.
    pub async fn set_state(
        &mut self,
        wallet: &dyn RecordWallet,
        new_state: IssuerRevRegState,
    ) -> RevocationResult<()> {
        if !self.state.can_transition_to(new_state) {
            return Err(err_msg(
                RevocationErrorKind::InvalidState,
                format!(
                    "Illegal revocation registry state transition {} -> {} for {}",
                    self.state, new_state, self.record_id
                ),
            ));
        }
        debug!(
            "set_state >>> registry {}: {} -> {}",
            self.record_id, self.state, new_state
        );
        self.state = new_state;
        self.save(wallet).await
    }

    pub fn pending_as_indices(&self) -> Vec<u32> {
        self.pending_pub
            .iter()
            .filter_map(|id| id.parse::<u32>().ok())
            .collect()
    }

    fn validate_index(&self, cred_rev_id: &str) -> RevocationResult<()> {
        let index: u32 = cred_rev_id.parse().map_err(|_| {
            err_msg(
                RevocationErrorKind::InvalidRevocationIndex,
                format!("Credential revocation index is not numeric: {}", cred_rev_id),
            )
        })?;
        if index < 1 || index > self.max_cred_num {
            return Err(err_msg(
                RevocationErrorKind::InvalidRevocationIndex,
                format!(
                    "Credential revocation index {} outside registry capacity [1, {}]",
                    index, self.max_cred_num
                ),
            ));
        }
        Ok(())
    }

    pub async fn save(&mut self, wallet: &dyn RecordWallet) -> RevocationResult<()> {
        self.updated_at = Utc::now();
        wallet.upsert_record(self.to_record()?).await
    }

    pub fn to_record(&self) -> RevocationResult<Record> {
        Ok(Record::builder()
            .category(RecordCategory::IssuerRevReg)
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
        tags.add("cred_def_id", self.cred_def_id.to_string());
        tags.add("state", self.state.to_string());
        tags.add(
            "has_pending",
            if self.pending_pub.is_empty() { "false" } else { "true" },
        );
        if let Some(rev_reg_id) = &self.rev_reg_id {
            tags.add("rev_reg_id", rev_reg_id.to_string());
        }
        tags
    }

    pub async fn load(
        wallet: &dyn RecordWallet,
        record_id: &str,
    ) -> RevocationResult<Self> {
        let record = wallet
            .get_record(RecordCategory::IssuerRevReg, record_id)
            .await?;
        Self::from_record(&record)
    }

    /// Unique lookup by the ledger-assigned registry id.
    pub async fn find_by_rev_reg_id(
        wallet: &dyn RecordWallet,
        rev_reg_id: &RevocationRegistryId,
    ) -> RevocationResult<RecordLookup<Self>> {
        let filter = TagFilter::eq("rev_reg_id", rev_reg_id.to_string());
        let lookup = find_unique_record(wallet, RecordCategory::IssuerRevReg, &filter).await?;
        Ok(match lookup {
            RecordLookup::Found(record) => RecordLookup::Found(Self::from_record(&record)?),
            RecordLookup::NotFound => RecordLookup::NotFound,
            RecordLookup::Duplicate => RecordLookup::Duplicate,
        })
    }

    pub async fn find_by_cred_def_id(
        wallet: &dyn RecordWallet,
        cred_def_id: &CredentialDefinitionId,
        state: Option<IssuerRevRegState>,
    ) -> RevocationResult<Vec<Self>> {
        let mut filters = vec![TagFilter::eq("cred_def_id", cred_def_id.to_string())];
        if let Some(state) = state {
            filters.push(TagFilter::eq("state", state.to_string()));
        }
        let records = wallet
            .search_record(RecordCategory::IssuerRevReg, Some(&TagFilter::and(filters)))
            .await?;
        records.iter().map(Self::from_record).collect()
    }

    /// All registries with revocations waiting to be published.
    pub async fn find_with_pending(wallet: &dyn RecordWallet) -> RevocationResult<Vec<Self>> {
        let filter = TagFilter::eq("has_pending", "true");
        let records = wallet
            .search_record(RecordCategory::IssuerRevReg, Some(&filter))
            .await?;
        records.iter().map(Self::from_record).collect()
    }
}

fn sort_indices(indices: &mut [String]) {
    indices.sort_by_key(|id| id.parse::<u32>().unwrap_or(u32::MAX));
}
