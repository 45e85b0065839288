#![allow(dead_code)]

use std::{
    collections::{BTreeSet, HashMap, VecDeque},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

use indy_issuer_revocation::{
    anoncreds::base_anoncreds::{IssuerAnonCreds, RegistryUpdate, RevRegInfo},
    errors::error::{err_msg, RevocationErrorKind, RevocationResult},
    events::{EventSink, RevocationEvent},
    ledger::{
        base_ledger::{AnoncredsLedgerRead, AnoncredsLedgerWrite},
        error::{LedgerError, LedgerResult, RejectReason},
    },
    manager::RevocationManager,
    primitives::{
        identifiers::{CredentialDefinitionId, RevocationRegistryId},
        rev_reg_def::{
            RegistryType, RevocationRegistryDefinition, RevocationRegistryDefinitionPrivate,
            RevocationRegistryDefinitionValue,
        },
        rev_reg_delta::{RevocationRegistryDelta, RevocationRegistryDeltaValue},
    },
    records::{cred_rev_record::IssuerCredRevRecord, rev_reg_record::IssuerRevRegRecord},
    tails::TailsClient,
    utils::RetryPolicy,
    wallet::{
        base_wallet::RecordWallet, in_memory::InMemoryWallet, record::Record,
        record_category::RecordCategory,
    },
};

pub const ISSUER_DID: &str = "55GkHamhTU1ZbTbV2ab9DE";
pub const CRED_DEF_ID: &str = "55GkHamhTU1ZbTbV2ab9DE:3:CL:123:tag1";

pub fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ---------------------------------------------------------------------------
// Simulated anoncreds signer
//
// Stands in for the CL accumulator math with a transparent model: the
// "accumulator" is a deterministic rendering of the revoked index set, so
// tests can predict and compare accumulator values across wallet and ledger.

#[derive(Debug, Serialize, Deserialize)]
struct SimRegistryState {
    max_cred_num: u32,
    revoked: BTreeSet<u32>,
}

pub fn accum_of(revoked: &BTreeSet<u32>) -> String {
    if revoked.is_empty() {
        "acc()".to_string()
    } else {
        let parts: Vec<String> = revoked.iter().map(u32::to_string).collect();
        format!("acc({})", parts.join(","))
    }
}

#[derive(Debug, Default)]
pub struct SimulatedAnonCreds;

impl SimulatedAnonCreds {
    /// Seeds the credential definition record the signer consults when a
    /// registry is generated.
    pub async fn seed_cred_def(
        wallet: &dyn RecordWallet,
        cred_def_id: &str,
        support_revocation: bool,
    ) -> RevocationResult<()> {
        let record = Record::builder()
            .category(RecordCategory::CredDef)
            .name(cred_def_id.to_string())
            .value(json!({ "support_revocation": support_revocation }).to_string())
            .build();
        wallet.add_record(record).await
    }

    async fn load_state(
        &self,
        wallet: &dyn RecordWallet,
        rev_reg_id: &RevocationRegistryId,
    ) -> RevocationResult<SimRegistryState> {
        let record = wallet
            .get_record(RecordCategory::RevReg, rev_reg_id.as_str())
            .await?;
        Ok(serde_json::from_str(record.value())?)
    }

    async fn store_state(
        &self,
        wallet: &dyn RecordWallet,
        rev_reg_id: &RevocationRegistryId,
        state: &SimRegistryState,
    ) -> RevocationResult<()> {
        wallet
            .update_record_value(
                RecordCategory::RevReg,
                rev_reg_id.as_str(),
                &serde_json::to_string(state)?,
            )
            .await
    }
}

#[async_trait]
impl IssuerAnonCreds for SimulatedAnonCreds {
    async fn cred_def_supports_revocation(
        &self,
        wallet: &dyn RecordWallet,
        cred_def_id: &CredentialDefinitionId,
    ) -> RevocationResult<bool> {
        match wallet
            .get_record(RecordCategory::CredDef, cred_def_id.as_str())
            .await
        {
            Ok(record) => {
                let value: serde_json::Value = serde_json::from_str(record.value())?;
                Ok(value["support_revocation"].as_bool().unwrap_or(false))
            }
            Err(err) if err.kind() == RevocationErrorKind::WalletRecordNotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn create_and_store_rev_reg(
        &self,
        wallet: &dyn RecordWallet,
        issuer_did: &str,
        cred_def_id: &CredentialDefinitionId,
        tails_dir: &Path,
        max_cred_num: u32,
        tag: &str,
    ) -> RevocationResult<(
        RevocationRegistryId,
        RevocationRegistryDefinition,
        RevocationRegistryDelta,
    )> {
        let rev_reg_id =
            RevocationRegistryId::build(issuer_did, cred_def_id, RegistryType::ClAccum, tag);
        let tails_hash = format!("tails-{}", tag);
        std::fs::create_dir_all(tails_dir)?;
        std::fs::write(tails_dir.join(&tails_hash), format!("tails:{}", rev_reg_id))?;

        let def = RevocationRegistryDefinition {
            id: rev_reg_id.clone(),
            revoc_def_type: RegistryType::ClAccum,
            tag: tag.to_string(),
            cred_def_id: cred_def_id.clone(),
            value: RevocationRegistryDefinitionValue {
                max_cred_num,
                public_keys: json!({ "accumKey": { "z": format!("pk-{}", tag) } }),
                tails_hash,
                tails_location: String::new(),
            },
        };

        let state = SimRegistryState {
            max_cred_num,
            revoked: BTreeSet::new(),
        };
        wallet
            .add_record(
                Record::builder()
                    .category(RecordCategory::RevReg)
                    .name(rev_reg_id.as_str().to_string())
                    .value(serde_json::to_string(&state)?)
                    .build(),
            )
            .await?;
        wallet
            .add_record(
                Record::builder()
                    .category(RecordCategory::RevRegDefPriv)
                    .name(rev_reg_id.as_str().to_string())
                    .value(serde_json::to_string(&RevocationRegistryDefinitionPrivate(
                        json!({ "gamma": format!("priv-{}", tag) }),
                    ))?)
                    .build(),
            )
            .await?;
        wallet
            .add_record(
                Record::builder()
                    .category(RecordCategory::RevRegInfo)
                    .name(rev_reg_id.as_str().to_string())
                    .value(serde_json::to_string(&RevRegInfo::default())?)
                    .build(),
            )
            .await?;

        let initial_entry = RevocationRegistryDelta {
            value: RevocationRegistryDeltaValue {
                prev_accum: None,
                accum: accum_of(&BTreeSet::new()),
                issued: vec![],
                revoked: vec![],
            },
        };
        Ok((rev_reg_id, def, initial_entry))
    }

    async fn revoke_credentials(
        &self,
        wallet: &dyn RecordWallet,
        rev_reg_id: &RevocationRegistryId,
        cred_rev_ids: &[u32],
    ) -> RevocationResult<RegistryUpdate> {
        let mut state = self.load_state(wallet, rev_reg_id).await?;
        let info_record = wallet
            .get_record(RecordCategory::RevRegInfo, rev_reg_id.as_str())
            .await?;
        let info: RevRegInfo = serde_json::from_str(info_record.value())?;

        let mut revoked = vec![];
        let mut failed = vec![];
        for &index in cred_rev_ids {
            let out_of_range = index == 0 || index > state.max_cred_num;
            let never_issued = index > info.curr_id;
            if out_of_range || never_issued || state.revoked.contains(&index) {
                failed.push(index);
            } else {
                revoked.push(index);
            }
        }

        let prev_accum = accum_of(&state.revoked);
        let delta = if revoked.is_empty() {
            RevocationRegistryDelta {
                value: RevocationRegistryDeltaValue {
                    prev_accum: None,
                    accum: prev_accum,
                    issued: vec![],
                    revoked: vec![],
                },
            }
        } else {
            state.revoked.extend(revoked.iter().copied());
            self.store_state(wallet, rev_reg_id, &state).await?;
            RevocationRegistryDelta {
                value: RevocationRegistryDeltaValue {
                    prev_accum: Some(prev_accum),
                    accum: accum_of(&state.revoked),
                    issued: vec![],
                    revoked: revoked.clone(),
                },
            }
        };
        Ok(RegistryUpdate {
            delta,
            revoked,
            failed,
        })
    }

    async fn create_recovery_delta(
        &self,
        wallet: &dyn RecordWallet,
        rev_reg_id: &RevocationRegistryId,
        revoked: &[u32],
    ) -> RevocationResult<RevocationRegistryDelta> {
        // Registry must exist, but the stored state is left untouched.
        self.load_state(wallet, rev_reg_id).await?;
        let set: BTreeSet<u32> = revoked.iter().copied().collect();
        Ok(RevocationRegistryDelta {
            value: RevocationRegistryDeltaValue {
                prev_accum: None,
                accum: accum_of(&set),
                issued: vec![],
                revoked: set.into_iter().collect(),
            },
        })
    }
}

// ---------------------------------------------------------------------------
// In-memory ledger with failure injection

#[derive(Debug, Clone)]
pub enum InjectedFailure {
    Reject(RejectReason),
    Transport,
}

impl InjectedFailure {
    fn into_error(self) -> LedgerError {
        match self {
            InjectedFailure::Reject(reason) => LedgerError::Rejected {
                reason,
                message: "injected rejection".to_string(),
            },
            InjectedFailure::Transport => {
                LedgerError::Transport("injected transport failure".to_string())
            }
        }
    }
}

#[derive(Debug)]
struct LedgerRegistry {
    def: RevocationRegistryDefinition,
    accum: Option<String>,
    revoked: BTreeSet<u32>,
}

/// Ledger double tracking per-registry accumulator state, with ACA-Py-style
/// REQNACK behavior: an entry whose previous accumulator does not match the
/// ledger's current one is rejected as an invalid client request, unless it
/// is a byte-identical re-send.
#[derive(Debug, Default)]
pub struct TestLedger {
    registries: Mutex<HashMap<String, LedgerRegistry>>,
    injections: Mutex<HashMap<String, VecDeque<InjectedFailure>>>,
    txn_counter: AtomicU64,
}

impl TestLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a failure for the next entry publication against the registry.
    pub fn inject_entry_failure(
        &self,
        rev_reg_id: &RevocationRegistryId,
        failure: InjectedFailure,
    ) {
        self.injections
            .lock()
            .unwrap()
            .entry(rev_reg_id.as_str().to_string())
            .or_default()
            .push_back(failure);
    }

    pub fn accum(&self, rev_reg_id: &RevocationRegistryId) -> Option<String> {
        self.registries
            .lock()
            .unwrap()
            .get(rev_reg_id.as_str())
            .and_then(|reg| reg.accum.clone())
    }

    /// Total transactions written, definitions and entries combined.
    pub fn txn_count(&self) -> u64 {
        self.txn_counter.load(Ordering::SeqCst)
    }

    pub fn revoked(&self, rev_reg_id: &RevocationRegistryId) -> Vec<u32> {
        self.registries
            .lock()
            .unwrap()
            .get(rev_reg_id.as_str())
            .map(|reg| reg.revoked.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Rewinds a registry's published state, simulating an entry write that
    /// was lost or never confirmed.
    pub fn rollback_entry(
        &self,
        rev_reg_id: &RevocationRegistryId,
        accum: &str,
        revoked: &[u32],
    ) {
        let mut registries = self.registries.lock().unwrap();
        let reg = registries
            .get_mut(rev_reg_id.as_str())
            .expect("registry must be on the ledger to roll back");
        reg.accum = Some(accum.to_string());
        reg.revoked = revoked.iter().copied().collect();
    }

    fn take_injection(&self, rev_reg_id: &str) -> Option<InjectedFailure> {
        self.injections
            .lock()
            .unwrap()
            .get_mut(rev_reg_id)
            .and_then(VecDeque::pop_front)
    }
}

#[async_trait]
impl AnoncredsLedgerWrite for TestLedger {
    async fn publish_rev_reg_def(
        &self,
        rev_reg_def: &RevocationRegistryDefinition,
        _submitter_did: &str,
    ) -> LedgerResult<String> {
        let mut registries = self.registries.lock().unwrap();
        registries.insert(
            rev_reg_def.id.as_str().to_string(),
            LedgerRegistry {
                def: rev_reg_def.clone(),
                accum: None,
                revoked: BTreeSet::new(),
            },
        );
        Ok(format!(
            "def-txn-{}",
            self.txn_counter.fetch_add(1, Ordering::SeqCst)
        ))
    }

    async fn publish_rev_reg_entry(
        &self,
        rev_reg_id: &RevocationRegistryId,
        _revoc_def_type: RegistryType,
        entry: &RevocationRegistryDelta,
        _submitter_did: &str,
    ) -> LedgerResult<String> {
        if let Some(failure) = self.take_injection(rev_reg_id.as_str()) {
            return Err(failure.into_error());
        }
        let mut registries = self.registries.lock().unwrap();
        let reg = registries
            .get_mut(rev_reg_id.as_str())
            .ok_or_else(|| LedgerError::ItemNotFound(rev_reg_id.to_string()))?;

        let value = &entry.value;
        if let (Some(prev), Some(current)) = (&value.prev_accum, &reg.accum) {
            if prev != current && &value.accum != current {
                return Err(LedgerError::Rejected {
                    reason: RejectReason::InvalidClientRequest,
                    message: format!(
                        "previous accumulator {} does not match ledger state {}",
                        prev, current
                    ),
                });
            }
        }
        reg.accum = Some(value.accum.clone());
        reg.revoked.extend(value.revoked.iter().copied());
        Ok(format!(
            "entry-txn-{}",
            self.txn_counter.fetch_add(1, Ordering::SeqCst)
        ))
    }
}

#[async_trait]
impl AnoncredsLedgerRead for TestLedger {
    async fn get_rev_reg_def(
        &self,
        rev_reg_id: &RevocationRegistryId,
    ) -> LedgerResult<RevocationRegistryDefinition> {
        let registries = self.registries.lock().unwrap();
        registries
            .get(rev_reg_id.as_str())
            .map(|reg| reg.def.clone())
            .ok_or_else(|| LedgerError::ItemNotFound(rev_reg_id.to_string()))
    }

    async fn get_rev_reg_delta(
        &self,
        rev_reg_id: &RevocationRegistryId,
        _from: Option<u64>,
        _to: Option<u64>,
    ) -> LedgerResult<(RevocationRegistryDelta, u64)> {
        let registries = self.registries.lock().unwrap();
        let reg = registries
            .get(rev_reg_id.as_str())
            .ok_or_else(|| LedgerError::ItemNotFound(rev_reg_id.to_string()))?;
        let accum = reg
            .accum
            .clone()
            .ok_or_else(|| LedgerError::ItemNotFound(format!("no entry for {}", rev_reg_id)))?;
        let delta = RevocationRegistryDelta {
            value: RevocationRegistryDeltaValue {
                prev_accum: None,
                accum,
                issued: vec![],
                revoked: reg.revoked.iter().copied().collect(),
            },
        };
        Ok((delta, 1_700_000_000))
    }
}

// ---------------------------------------------------------------------------
// Tails client doubles

/// Serves uploads back under stable http URIs so the scheme-host-path
/// validation on the public location passes.
#[derive(Debug)]
pub struct HttpStubTailsClient {
    store: PathBuf,
}

impl HttpStubTailsClient {
    pub fn new(store: impl Into<PathBuf>) -> Self {
        Self {
            store: store.into(),
        }
    }
}

#[async_trait]
impl TailsClient for HttpStubTailsClient {
    async fn upload(&self, local_path: &Path) -> RevocationResult<String> {
        let file_name = local_path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| {
                err_msg(
                    RevocationErrorKind::InvalidInput,
                    format!("tails path has no file name: {:?}", local_path),
                )
            })?;
        std::fs::create_dir_all(&self.store)?;
        std::fs::copy(local_path, self.store.join(file_name))?;
        Ok(format!("http://tails.example.org/{}", file_name))
    }

    async fn download(&self, uri: &str, dest_dir: &Path) -> RevocationResult<PathBuf> {
        let file_name = uri.rsplit('/').next().ok_or_else(|| {
            err_msg(
                RevocationErrorKind::InvalidUrl,
                format!("tails uri has no file name: {}", uri),
            )
        })?;
        std::fs::create_dir_all(dest_dir)?;
        let target = dest_dir.join(file_name);
        std::fs::copy(self.store.join(file_name), &target)?;
        Ok(target)
    }
}

mockall::mock! {
    pub TailsServer {}

    #[async_trait]
    impl TailsClient for TailsServer {
        async fn upload(&self, local_path: &Path) -> RevocationResult<String>;
        async fn download(&self, uri: &str, dest_dir: &Path) -> RevocationResult<PathBuf>;
    }
}

impl std::fmt::Debug for MockTailsServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("MockTailsServer")
    }
}

// ---------------------------------------------------------------------------
// Event sink double

#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<RevocationEvent>>,
}

#[async_trait]
impl EventSink for CollectingEventSink {
    async fn emit(&self, event: RevocationEvent) {
        self.events.lock().unwrap().push(event);
    }
}

impl CollectingEventSink {
    pub fn take(&self) -> Vec<RevocationEvent> {
        std::mem::take(&mut self.events.lock().unwrap())
    }
}

// ---------------------------------------------------------------------------
// Harness

pub type TestManager =
    RevocationManager<InMemoryWallet, SimulatedAnonCreds, TestLedger, TestLedger>;

pub struct TestHarness {
    pub wallet: Arc<InMemoryWallet>,
    pub ledger: Arc<TestLedger>,
    pub events: Arc<CollectingEventSink>,
    pub manager: TestManager,
    pub workdir: PathBuf,
}

impl TestHarness {
    pub async fn new() -> Self {
        let workdir = std::env::temp_dir().join(format!("issuer-rev-{}", Uuid::new_v4()));
        let tails_client = Arc::new(HttpStubTailsClient::new(workdir.join("tails-server")));
        Self::with_tails_client(workdir, tails_client).await
    }

    pub async fn with_tails_client(
        workdir: PathBuf,
        tails_client: Arc<dyn TailsClient>,
    ) -> Self {
        init_test_logging();
        let wallet = Arc::new(InMemoryWallet::new());
        let anoncreds = Arc::new(SimulatedAnonCreds);
        let ledger = Arc::new(TestLedger::new());
        let events = Arc::new(CollectingEventSink::default());

        SimulatedAnonCreds::seed_cred_def(&*wallet, CRED_DEF_ID, true)
            .await
            .unwrap();

        let manager = RevocationManager::new(
            wallet.clone(),
            anoncreds,
            ledger.clone(),
            ledger.clone(),
            tails_client,
            ISSUER_DID,
            workdir.join("tails"),
        )
        .with_event_sink(events.clone())
        .with_retry_policy(RetryPolicy::no_wait(3));

        Self {
            wallet,
            ledger,
            events,
            manager,
            workdir,
        }
    }

    pub fn cred_def_id(&self) -> CredentialDefinitionId {
        CredentialDefinitionId::new(CRED_DEF_ID)
    }

    /// Walks a registry through the full happy-path lifecycle up to `active`.
    pub async fn active_registry(&self, max_cred_num: u32) -> IssuerRevRegRecord {
        let record = self
            .manager
            .create_registry(&self.cred_def_id(), max_cred_num)
            .await
            .unwrap();
        let record = self
            .manager
            .generate_registry(&record.record_id)
            .await
            .unwrap();
        self.manager
            .upload_tails_file(&record.record_id)
            .await
            .unwrap();
        self.manager
            .publish_registry_definition(&record.record_id)
            .await
            .unwrap();
        self.manager
            .publish_registry_entry(&record.record_id)
            .await
            .unwrap();
        IssuerRevRegRecord::load(&*self.wallet, &record.record_id)
            .await
            .unwrap()
    }

    /// Registers an issued credential and returns its revocation record.
    pub async fn issue(
        &self,
        rev_reg_id: &RevocationRegistryId,
        cred_ex_id: &str,
    ) -> IssuerCredRevRecord {
        self.manager
            .register_issued_credential(rev_reg_id, cred_ex_id, Some("1".to_string()))
            .await
            .unwrap()
    }
}
