pub mod cred_ex;
pub mod recovery;

use std::{
    collections::HashMap,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::Utc;

use crate::{
    anoncreds::base_anoncreds::{IssuerAnonCreds, RevRegInfo},
    errors::error::{err_msg, RevocationErrorKind, RevocationResult},
    events::{EventSink, LogEventSink, RevocationEvent},
    ledger::base_ledger::{AnoncredsLedgerRead, AnoncredsLedgerWrite},
    manager::cred_ex::{default_cred_ex_lookups, CredExLookup},
    primitives::identifiers::{CredentialDefinitionId, RevocationRegistryId},
    records::{
        cred_rev_record::{IssuerCredRevRecord, IssuerCredRevState},
        rev_notification_record::RevNotificationRecord,
        rev_reg_record::{IssuerRevRegRecord, IssuerRevRegState},
    },
    tails::TailsClient,
    utils::{with_retry, RetryPolicy},
    wallet::{base_wallet::RecordWallet, record_category::RecordCategory, RecordLookup},
};

/// Caller preferences for notifying the holder of a revocation.
#[derive(Debug, Default, Clone)]
pub struct NotifyOptions {
    pub thread_id: Option<String>,
    pub connection_id: Option<String>,
    pub comment: Option<String>,
}

/// Per-registry index selection for batch operations. `None` means every
/// pending index of that registry, an empty list explicitly means none.
pub type RegistrySelection = HashMap<String, Option<Vec<String>>>;

/// Orchestrates revocation across registries: immediate and batched revokes,
/// pending publication and clearing, and ledger repair.
#[derive(Debug)]
pub struct RevocationManager<W, A, R, L>
where
    W: RecordWallet,
    A: IssuerAnonCreds,
    R: AnoncredsLedgerRead,
    L: AnoncredsLedgerWrite,
{
    wallet: Arc<W>,
    anoncreds: Arc<A>,
    ledger_read: Arc<R>,
    ledger_write: Arc<L>,
    tails_client: Arc<dyn TailsClient>,
    event_sink: Arc<dyn EventSink>,
    cred_ex_lookups: Vec<Box<dyn CredExLookup>>,
    issuer_did: String,
    tails_dir: PathBuf,
    retry: RetryPolicy,
    /// Active registry per credential definition, rebuilt lazily and
    /// invalidated on registry state transitions.
    active_registries: Mutex<HashMap<String, RevocationRegistryId>>,
    /// Serializes accumulator updates per registry record within this
    /// manager; cross-process writers are caught by the wallet's optimistic
    /// version check.
    registry_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl<W, A, R, L> RevocationManager<W, A, R, L>
where
    W: RecordWallet,
    A: IssuerAnonCreds,
    R: AnoncredsLedgerRead,
    L: AnoncredsLedgerWrite,
{
    pub fn new(
        wallet: Arc<W>,
        anoncreds: Arc<A>,
        ledger_read: Arc<R>,
        ledger_write: Arc<L>,
        tails_client: Arc<dyn TailsClient>,
        issuer_did: impl Into<String>,
        tails_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            wallet,
            anoncreds,
            ledger_read,
            ledger_write,
            tails_client,
            event_sink: Arc::new(LogEventSink),
            cred_ex_lookups: default_cred_ex_lookups(),
            issuer_did: issuer_did.into(),
            tails_dir: tails_dir.into(),
            retry: RetryPolicy::default(),
            active_registries: Mutex::new(HashMap::new()),
            registry_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_event_sink(mut self, event_sink: Arc<dyn EventSink>) -> Self {
        self.event_sink = event_sink;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    fn wallet(&self) -> &dyn RecordWallet {
        &*self.wallet
    }

    // ------------------------------------------------------------------
    // Registry lifecycle

    /// Allocates a new registry record in state `init`.
    pub async fn create_registry(
        &self,
        cred_def_id: &CredentialDefinitionId,
        max_cred_num: u32,
    ) -> RevocationResult<IssuerRevRegRecord> {
        if max_cred_num == 0 {
            return Err(err_msg(
                RevocationErrorKind::InvalidInput,
                "Revocation registry capacity must be at least 1",
            ));
        }
        let mut record =
            IssuerRevRegRecord::new(cred_def_id.clone(), self.issuer_did.clone(), max_cred_num);
        record.save(self.wallet()).await?;
        info!(
            "create_registry >>> created registry record {} for {}",
            record.record_id, cred_def_id
        );
        Ok(record)
    }

    /// Produces registry keys and the tails file for an `init` registry.
    pub async fn generate_registry(
        &self,
        record_id: &str,
    ) -> RevocationResult<IssuerRevRegRecord> {
        let mut record = IssuerRevRegRecord::load(self.wallet(), record_id).await?;
        record
            .generate(self.wallet(), &*self.anoncreds, &self.tails_dir)
            .await?;
        Ok(record)
    }

    /// Uploads the generated tails file and records its public location.
    pub async fn upload_tails_file(&self, record_id: &str) -> RevocationResult<String> {
        let mut record = IssuerRevRegRecord::load(self.wallet(), record_id).await?;
        let local_path = record.tails_local_path.clone().ok_or_else(|| {
            err_msg(
                RevocationErrorKind::InvalidState,
                format!("Registry {} has no local tails file to upload", record_id),
            )
        })?;
        let uri = with_retry(
            &self.retry,
            "tails_upload",
            || self.tails_client.upload(&local_path),
            |err| err.kind().is_retryable(),
        )
        .await?;
        record.set_tails_public_uri(self.wallet(), &uri).await?;
        Ok(uri)
    }

    /// Operator override for the tails file location.
    pub async fn update_tails_file_uri(
        &self,
        record_id: &str,
        uri: &str,
    ) -> RevocationResult<()> {
        let mut record = IssuerRevRegRecord::load(self.wallet(), record_id).await?;
        record.set_tails_public_uri(self.wallet(), uri).await
    }

    /// Publishes the registry definition to the ledger.
    pub async fn publish_registry_definition(&self, record_id: &str) -> RevocationResult<()> {
        let mut record = IssuerRevRegRecord::load(self.wallet(), record_id).await?;
        record
            .send_def(self.wallet(), &*self.ledger_write, &self.retry)
            .await
    }

    /// Publishes the current accumulator entry, reconciling and retrying once
    /// if the ledger flags the request as invalid.
    pub async fn publish_registry_entry(&self, record_id: &str) -> RevocationResult<String> {
        let mut record = IssuerRevRegRecord::load(self.wallet(), record_id).await?;
        self.send_entry_with_recovery(&mut record).await
    }

    /// Applies an operator-driven state transition (e.g. `full`,
    /// `decommissioned`) and drops the registry from the active cache.
    pub async fn update_registry_state(
        &self,
        record_id: &str,
        state: IssuerRevRegState,
    ) -> RevocationResult<IssuerRevRegRecord> {
        let mut record = IssuerRevRegRecord::load(self.wallet(), record_id).await?;
        record.set_state(self.wallet(), state).await?;
        self.invalidate_active_registry(&record.cred_def_id)?;
        Ok(record)
    }

    /// The registry currently accepting issuance for a credential definition.
    pub async fn get_active_registry(
        &self,
        cred_def_id: &CredentialDefinitionId,
    ) -> RevocationResult<Option<IssuerRevRegRecord>> {
        let cached = lock_table(&self.active_registries, "active registry cache")?
            .get(cred_def_id.as_str())
            .cloned();
        if let Some(rev_reg_id) = cached {
            if let Some(record) =
                IssuerRevRegRecord::find_by_rev_reg_id(self.wallet(), &rev_reg_id)
                    .await?
                    .found()
            {
                if record.state == IssuerRevRegState::Active {
                    return Ok(Some(record));
                }
            }
            self.invalidate_active_registry(cred_def_id)?;
        }

        let mut candidates = IssuerRevRegRecord::find_by_cred_def_id(
            self.wallet(),
            cred_def_id,
            Some(IssuerRevRegState::Active),
        )
        .await?;
        candidates.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        let record = candidates.into_iter().next();
        if let Some(record) = &record {
            if let Some(rev_reg_id) = &record.rev_reg_id {
                lock_table(&self.active_registries, "active registry cache")?
                    .insert(cred_def_id.to_string(), rev_reg_id.clone());
            }
        }
        Ok(record)
    }

    fn invalidate_active_registry(
        &self,
        cred_def_id: &CredentialDefinitionId,
    ) -> RevocationResult<()> {
        lock_table(&self.active_registries, "active registry cache")?
            .remove(cred_def_id.as_str());
        Ok(())
    }

    // ------------------------------------------------------------------
    // Issuance bookkeeping

    /// Assigns the next free credential revocation index for the registry and
    /// creates the credential's revocation record. The index counter update
    /// and the record insert commit together; a concurrent assignment against
    /// the same registry is detected and retried, so an index can never be
    /// handed out twice.
    pub async fn register_issued_credential(
        &self,
        rev_reg_id: &RevocationRegistryId,
        cred_ex_id: &str,
        cred_ex_version: Option<String>,
    ) -> RevocationResult<IssuerCredRevRecord> {
        let registry = IssuerRevRegRecord::find_by_rev_reg_id(self.wallet(), rev_reg_id)
            .await?
            .require(RevocationErrorKind::RevRegNotFound, "revocation registry")?;

        for attempt in 1..=self.retry.max_attempts.max(1) {
            let versioned = self
                .wallet()
                .get_record_for_update(RecordCategory::RevRegInfo, rev_reg_id.as_str())
                .await?;
            let mut info: RevRegInfo = serde_json::from_str(versioned.record.value())?;

            if info.curr_id >= registry.max_cred_num {
                return Err(err_msg(
                    RevocationErrorKind::RevRegFull,
                    format!(
                        "Revocation registry {} is full ({} slots)",
                        rev_reg_id, registry.max_cred_num
                    ),
                ));
            }
            info.curr_id += 1;
            info.used_ids.insert(info.curr_id);

            let mut cred_rev_record = IssuerCredRevRecord::new(
                rev_reg_id.clone(),
                info.curr_id.to_string(),
                cred_ex_id,
                cred_ex_version.clone(),
            );

            let mut info_record = versioned.record.clone();
            info_record.set_value(serde_json::to_string(&info)?);

            let mut tx = self.wallet().transaction().await?;
            tx.put_expecting(info_record, versioned.version);
            tx.add(cred_rev_record.to_record()?);
            match tx.commit().await {
                Ok(()) => {
                    cred_rev_record.updated_at = Utc::now();
                    return Ok(cred_rev_record);
                }
                Err(err) if err.kind() == RevocationErrorKind::ConflictDetected => {
                    debug!(
                        "register_issued_credential >>> index assignment conflict on {} \
                         (attempt {}), retrying",
                        rev_reg_id, attempt
                    );
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        Err(err_msg(
            RevocationErrorKind::RetriesExhausted,
            format!(
                "Could not assign a revocation index on {} after {} attempts",
                rev_reg_id, self.retry.max_attempts
            ),
        ))
    }

    // ------------------------------------------------------------------
    // Revocation

    /// Revokes one credential by registry id and index. With `publish` unset
    /// the index is only queued on the registry; the credential's own record
    /// flips to `revoked` when the entry is actually published.
    pub async fn revoke_credential(
        &self,
        rev_reg_id: &RevocationRegistryId,
        cred_rev_id: &str,
        publish: bool,
        notify: Option<NotifyOptions>,
    ) -> RevocationResult<()> {
        trace!(
            "revoke_credential >>> rev_reg_id: {}, cred_rev_id: {}, publish: {}",
            rev_reg_id,
            cred_rev_id,
            publish
        );
        let registry = IssuerRevRegRecord::find_by_rev_reg_id(self.wallet(), rev_reg_id)
            .await?
            .require(RevocationErrorKind::RevRegNotFound, "revocation registry")?;

        if let Some(options) = notify {
            let notification = RevNotificationRecord::new(
                rev_reg_id.clone(),
                cred_rev_id,
                options.thread_id,
                options.connection_id,
                options.comment,
            );
            notification.save(self.wallet()).await?;
        }

        if !publish {
            let pending_id = cred_rev_id.to_string();
            self.update_registry_record(&registry.record_id, move |record| {
                record.mark_pending(&pending_id)
            })
            .await?;
            return Ok(());
        }

        let requested = cred_rev_id.to_string();
        let published = self
            .publish_registry_updates(&registry.record_id, move |record| {
                let mut targets = record.pending_pub.clone();
                if !targets.contains(&requested) {
                    targets.push(requested.clone());
                }
                targets
            })
            .await?;
        if !published.iter().any(|id| id == cred_rev_id) {
            return Err(err_msg(
                RevocationErrorKind::AlreadyRevoked,
                format!(
                    "Credential revocation index {} on {} could not be revoked (already revoked, \
                     out of range, or never issued)",
                    cred_rev_id, rev_reg_id
                ),
            ));
        }
        Ok(())
    }

    /// Revokes by the issuance protocol's exchange id.
    pub async fn revoke_credential_by_cred_ex_id(
        &self,
        cred_ex_id: &str,
        publish: bool,
        notify: Option<NotifyOptions>,
    ) -> RevocationResult<()> {
        let cred_rev_record = IssuerCredRevRecord::find_by_cred_ex_id(self.wallet(), cred_ex_id)
            .await?
            .require(
                RevocationErrorKind::CredRevRecordNotFound,
                &format!("credential revocation record for exchange {}", cred_ex_id),
            )?;
        self.revoke_credential(
            &cred_rev_record.rev_reg_id,
            &cred_rev_record.cred_rev_id,
            publish,
            notify,
        )
        .await
    }

    /// Publishes queued revocations, optionally restricted per registry.
    ///
    /// Returns registry id to the indices actually published; registries
    /// where nothing was published are omitted. One registry's failure does
    /// not abort the rest of the batch.
    pub async fn publish_pending_revocations(
        &self,
        selection: Option<&RegistrySelection>,
    ) -> RevocationResult<HashMap<String, Vec<String>>> {
        let mut result = HashMap::new();
        for registry in IssuerRevRegRecord::find_with_pending(self.wallet()).await? {
            let Some(rev_reg_id) = registry.rev_reg_id.clone() else {
                continue;
            };
            let rrid = rev_reg_id.to_string();
            let subset: Option<Vec<String>> = match selection {
                None => None,
                Some(map) => match map.get(&rrid) {
                    None => continue, // not selected
                    Some(None) => None,
                    Some(Some(ids)) if ids.is_empty() => continue, // explicit none
                    Some(Some(ids)) => Some(ids.clone()),
                },
            };
            let published = self
                .publish_registry_updates(&registry.record_id, move |record| match &subset {
                    None => record.pending_pub.clone(),
                    Some(ids) => record
                        .pending_pub
                        .iter()
                        .filter(|pending| ids.contains(pending))
                        .cloned()
                        .collect(),
                })
                .await;
            match published {
                Ok(ids) if ids.is_empty() => {}
                Ok(ids) => {
                    result.insert(rrid, ids);
                }
                Err(err) => {
                    warn!(
                        "publish_pending_revocations >>> publishing for {} failed, continuing \
                         with remaining registries: {}",
                        rrid, err
                    );
                }
            }
        }
        Ok(result)
    }

    /// Discards queued revocations. For each registry with pending entries,
    /// the indices named in `purge` are dropped; a registry absent from
    /// `purge` (or mapped to an empty list, or `purge` not given at all) has
    /// its whole queue dropped. Returns what remains pending per registry;
    /// registries left with nothing pending are omitted.
    pub async fn clear_pending_revocations(
        &self,
        purge: Option<&RegistrySelection>,
    ) -> RevocationResult<HashMap<String, Vec<String>>> {
        let mut remaining = HashMap::new();
        for registry in IssuerRevRegRecord::find_with_pending(self.wallet()).await? {
            let Some(rev_reg_id) = registry.rev_reg_id.clone() else {
                continue;
            };
            let rrid = rev_reg_id.to_string();
            let ids: Option<Vec<String>> =
                purge.and_then(|map| map.get(&rrid).cloned()).flatten();
            let (registry, changed) = self
                .update_registry_record(&registry.record_id, move |record| {
                    Ok(record.clear_pending(ids.as_deref()))
                })
                .await?;
            if changed {
                self.event_sink
                    .emit(RevocationEvent::PendingCleared {
                        rev_reg_id: rrid.clone(),
                    })
                    .await;
            }
            if !registry.pending_pub.is_empty() {
                remaining.insert(rrid, registry.pending_pub.clone());
            }
        }
        Ok(remaining)
    }

    /// Best-effort bulk flip of credential revocation records (and their
    /// credential exchange records, across protocol versions) to `revoked`.
    /// A missing record never aborts the batch.
    pub async fn set_revoked_state(
        &self,
        rev_reg_id: &RevocationRegistryId,
        cred_rev_ids: &[String],
    ) -> RevocationResult<()> {
        for cred_rev_id in cred_rev_ids {
            let lookup =
                IssuerCredRevRecord::find_by_ids(self.wallet(), rev_reg_id, cred_rev_id).await;
            let mut cred_rev_record = match lookup {
                Ok(RecordLookup::Found(record)) => record,
                Ok(_) | Err(_) => {
                    warn!(
                        "set_revoked_state >>> no usable revocation record for {} index {}, \
                         skipping",
                        rev_reg_id, cred_rev_id
                    );
                    continue;
                }
            };
            if let Err(err) = cred_rev_record
                .set_state(
                    self.wallet(),
                    IssuerCredRevState::Revoked,
                    Some("revocation published"),
                )
                .await
            {
                warn!(
                    "set_revoked_state >>> failed to update revocation record for {} index {}: {}",
                    rev_reg_id, cred_rev_id, err
                );
                continue;
            }
            self.mark_cred_ex_revoked(&cred_rev_record.cred_ex_id).await;
        }
        Ok(())
    }

    async fn mark_cred_ex_revoked(&self, cred_ex_id: &str) {
        for lookup in &self.cred_ex_lookups {
            match lookup.try_find(self.wallet(), cred_ex_id).await {
                Ok(Some(handle)) => {
                    if let Err(err) = handle.mark_revoked(self.wallet()).await {
                        warn!(
                            "mark_cred_ex_revoked >>> failed to update exchange record {}: {}",
                            cred_ex_id, err
                        );
                    }
                    return;
                }
                Ok(None) => continue,
                Err(err) => {
                    warn!(
                        "mark_cred_ex_revoked >>> lookup failed for exchange record {}: {}",
                        cred_ex_id, err
                    );
                    return;
                }
            }
        }
        warn!(
            "mark_cred_ex_revoked >>> no exchange record found for {} in any protocol version",
            cred_ex_id
        );
    }

    /// Revocation status of a credential by its exchange id.
    pub async fn get_credential_revocation_status(
        &self,
        cred_ex_id: &str,
    ) -> RevocationResult<IssuerCredRevRecord> {
        IssuerCredRevRecord::find_by_cred_ex_id(self.wallet(), cred_ex_id)
            .await?
            .require(
                RevocationErrorKind::CredRevRecordNotFound,
                &format!("credential revocation record for exchange {}", cred_ex_id),
            )
    }

    /// Operator-triggered ledger reconciliation for one registry.
    pub async fn fix_ledger_entry(
        &self,
        rev_reg_id: &RevocationRegistryId,
        apply_ledger_update: bool,
    ) -> RevocationResult<recovery::LedgerRecoveryResult> {
        let record = IssuerRevRegRecord::find_by_rev_reg_id(self.wallet(), rev_reg_id)
            .await?
            .require(RevocationErrorKind::RevRegNotFound, "revocation registry")?;
        recovery::fix_ledger_entry(
            self.wallet(),
            &*self.anoncreds,
            &*self.ledger_read,
            &*self.ledger_write,
            &record,
            apply_ledger_update,
        )
        .await
    }

    // ------------------------------------------------------------------
    // Internals

    fn registry_lock(&self, record_id: &str) -> RevocationResult<Arc<tokio::sync::Mutex<()>>> {
        Ok(lock_table(&self.registry_locks, "registry lock table")?
            .entry(record_id.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone())
    }

    /// Applies a mutation to the registry record under the per-registry lock,
    /// persisting through the wallet's version check with the same bounded
    /// conflict retry as the publish path. `mutate` reports whether anything
    /// changed; unchanged records are not written. Returns the record as
    /// committed (or as read, when unchanged) and the change flag.
    async fn update_registry_record(
        &self,
        record_id: &str,
        mutate: impl Fn(&mut IssuerRevRegRecord) -> RevocationResult<bool>,
    ) -> RevocationResult<(IssuerRevRegRecord, bool)> {
        let lock = self.registry_lock(record_id)?;
        let _guard = lock.lock().await;

        let attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=attempts {
            let versioned = self
                .wallet()
                .get_record_for_update(RecordCategory::IssuerRevReg, record_id)
                .await?;
            let mut registry = IssuerRevRegRecord::from_record(&versioned.record)?;
            if !mutate(&mut registry)? {
                return Ok((registry, false));
            }
            registry.updated_at = Utc::now();

            let mut tx = self.wallet().transaction().await?;
            tx.put_expecting(registry.to_record()?, versioned.version);
            match tx.commit().await {
                Ok(()) => return Ok((registry, true)),
                Err(err) if err.kind() == RevocationErrorKind::ConflictDetected => {
                    debug!(
                        "update_registry_record >>> conflicting writer on {} (attempt {}), \
                         re-reading",
                        record_id, attempt
                    );
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        Err(err_msg(
            RevocationErrorKind::RetriesExhausted,
            format!(
                "Registry {} kept changing underneath the update after {} attempts",
                record_id, attempts
            ),
        ))
    }

    /// The accumulator-update critical section: recompute the index set from
    /// the freshly read registry, fold it into the accumulator, then commit
    /// the new entry, the trimmed pending queue and the credential record
    /// flips in one transaction. The ledger publish happens after commit;
    /// divergence it may leave behind is what `fix_ledger_entry` repairs.
    async fn publish_registry_updates(
        &self,
        record_id: &str,
        compute: impl Fn(&IssuerRevRegRecord) -> Vec<String>,
    ) -> RevocationResult<Vec<String>> {
        let lock = self.registry_lock(record_id)?;
        let _guard = lock.lock().await;

        let attempts = self.retry.max_attempts.max(1);
        for attempt in 1..=attempts {
            let versioned = self
                .wallet()
                .get_record_for_update(RecordCategory::IssuerRevReg, record_id)
                .await?;
            let mut registry = IssuerRevRegRecord::from_record(&versioned.record)?;
            let rev_reg_id = registry.rev_reg_id.clone().ok_or_else(|| {
                err_msg(
                    RevocationErrorKind::InvalidState,
                    format!("Registry {} has not been generated yet", record_id),
                )
            })?;

            let attempted: Vec<String> = compute(&registry);
            let mut indices: Vec<u32> = attempted
                .iter()
                .filter_map(|id| id.parse::<u32>().ok())
                .collect();
            indices.sort_unstable();
            indices.dedup();
            if indices.is_empty() {
                return Ok(vec![]);
            }

            self.ensure_tails_local(&mut registry).await?;

            let update = self
                .anoncreds
                .revoke_credentials(self.wallet(), &rev_reg_id, &indices)
                .await?;
            if !update.failed.is_empty() {
                warn!(
                    "publish_registry_updates >>> {} indices on {} were not revocable: {:?}",
                    update.failed.len(),
                    rev_reg_id,
                    update.failed
                );
            }

            registry
                .pending_pub
                .retain(|pending| !attempted.contains(pending));
            if !update.revoked.is_empty() {
                registry.rev_reg_entry = Some(update.delta.clone());
            }
            registry.updated_at = Utc::now();

            let mut tx = self.wallet().transaction().await?;
            tx.put_expecting(registry.to_record()?, versioned.version);

            let mut revoked_ids = Vec::with_capacity(update.revoked.len());
            for index in &update.revoked {
                let cred_rev_id = index.to_string();
                match IssuerCredRevRecord::find_by_ids(self.wallet(), &rev_reg_id, &cred_rev_id)
                    .await?
                {
                    RecordLookup::Found(mut record) => {
                        record.state = IssuerCredRevState::Revoked;
                        record.state_reason = Some("revocation published".to_string());
                        record.updated_at = Utc::now();
                        tx.put(record.to_record()?);
                    }
                    RecordLookup::NotFound => {
                        warn!(
                            "publish_registry_updates >>> no revocation record for {} index {}",
                            rev_reg_id, cred_rev_id
                        );
                    }
                    RecordLookup::Duplicate => {
                        warn!(
                            "publish_registry_updates >>> duplicate revocation records for {} \
                             index {}",
                            rev_reg_id, cred_rev_id
                        );
                    }
                }
                revoked_ids.push(cred_rev_id);
            }

            match tx.commit().await {
                Ok(()) => {
                    if update.revoked.is_empty() {
                        return Ok(vec![]);
                    }
                    self.send_entry_with_recovery(&mut registry).await?;
                    self.event_sink
                        .emit(RevocationEvent::RevocationPublished {
                            rev_reg_id: rev_reg_id.to_string(),
                            cred_rev_ids: revoked_ids.clone(),
                        })
                        .await;
                    return Ok(revoked_ids);
                }
                Err(err) if err.kind() == RevocationErrorKind::ConflictDetected => {
                    debug!(
                        "publish_registry_updates >>> conflicting writer on {} (attempt {}), \
                         recomputing",
                        record_id, attempt
                    );
                    continue;
                }
                Err(err) => return Err(err),
            }
        }
        Err(err_msg(
            RevocationErrorKind::RetriesExhausted,
            format!(
                "Registry {} kept changing underneath the update after {} attempts",
                record_id, attempts
            ),
        ))
    }

    /// Makes sure the tails file is on disk, lazily downloading it from the
    /// public location when only that is known.
    async fn ensure_tails_local(
        &self,
        registry: &mut IssuerRevRegRecord,
    ) -> RevocationResult<()> {
        if let Some(path) = &registry.tails_local_path {
            if path.exists() {
                return Ok(());
            }
        }
        let uri = registry.tails_public_uri.clone().ok_or_else(|| {
            err_msg(
                RevocationErrorKind::InvalidConfiguration,
                format!(
                    "Registry {} has neither a local tails file nor a public URI to fetch it from",
                    registry.record_id
                ),
            )
        })?;
        let path = with_retry(
            &self.retry,
            "tails_download",
            || self.tails_client.download(&uri, &self.tails_dir),
            |err| err.kind().is_retryable(),
        )
        .await?;
        registry.tails_local_path = Some(path);
        Ok(())
    }

    async fn send_entry_with_recovery(
        &self,
        registry: &mut IssuerRevRegRecord,
    ) -> RevocationResult<String> {
        match registry
            .send_entry(self.wallet(), &*self.ledger_write, &self.retry)
            .await
        {
            Err(err) if err.kind() == RevocationErrorKind::InvalidRevocationEntry => {
                warn!(
                    "send_entry_with_recovery >>> ledger flagged entry for {} as invalid, \
                     reconciling from wallet state: {}",
                    registry.record_id, err
                );
                recovery::fix_ledger_entry(
                    self.wallet(),
                    &*self.anoncreds,
                    &*self.ledger_read,
                    &*self.ledger_write,
                    registry,
                    true,
                )
                .await?;
                registry
                    .send_entry(self.wallet(), &*self.ledger_write, &self.retry)
                    .await
            }
            other => other,
        }
    }
}

fn lock_table<'a, T>(table: &'a Mutex<T>, what: &str) -> RevocationResult<MutexGuard<'a, T>> {
    table.lock().map_err(|err| {
        error!("Unable to lock {}: {:?}", what, err);
        err_msg(
            RevocationErrorKind::LockError,
            format!("Unable to lock {}: {:?}", what, err),
        )
    })
}
