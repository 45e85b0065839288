use std::fmt::Debug;

use async_trait::async_trait;

use crate::{
    errors::error::{RevocationErrorKind, RevocationResult},
    wallet::{base_wallet::RecordWallet, record::Record, record_category::RecordCategory},
};

/// Terminal state written onto a credential exchange record whose credential
/// has been revoked.
const STATE_CREDENTIAL_REVOKED: &str = "credential_revoked";

/// Handle onto a credential exchange record found by one of the protocol
/// version strategies. The record body is opaque apart from its `state`
/// field.
#[derive(Debug)]
pub struct CredExHandle {
    record: Record,
}

impl CredExHandle {
    pub fn category(&self) -> RecordCategory {
        self.record.category()
    }

    pub async fn mark_revoked(&self, wallet: &dyn RecordWallet) -> RevocationResult<()> {
        let mut value: serde_json::Value = serde_json::from_str(self.record.value())?;
        value["state"] = json!(STATE_CREDENTIAL_REVOKED);
        wallet
            .update_record_value(
                self.record.category(),
                self.record.name(),
                &serde_json::to_string(&value)?,
            )
            .await
    }
}

/// One strategy for resolving a credential exchange id to its record;
/// strategies are tried in order so new protocol versions just append here.
#[async_trait]
pub trait CredExLookup: Debug + Send + Sync {
    async fn try_find(
        &self,
        wallet: &dyn RecordWallet,
        cred_ex_id: &str,
    ) -> RevocationResult<Option<CredExHandle>>;
}

#[derive(Debug)]
struct CategoryCredExLookup {
    category: RecordCategory,
}

#[async_trait]
impl CredExLookup for CategoryCredExLookup {
    async fn try_find(
        &self,
        wallet: &dyn RecordWallet,
        cred_ex_id: &str,
    ) -> RevocationResult<Option<CredExHandle>> {
        match wallet.get_record(self.category, cred_ex_id).await {
            Ok(record) => Ok(Some(CredExHandle { record })),
            Err(err) if err.kind() == RevocationErrorKind::WalletRecordNotFound => Ok(None),
            Err(err) => Err(err),
        }
    }
}

/// V1 first, then V2 — the order the issuance protocols were deployed in.
pub fn default_cred_ex_lookups() -> Vec<Box<dyn CredExLookup>> {
    vec![
        Box::new(CategoryCredExLookup {
            category: RecordCategory::CredExV1,
        }),
        Box::new(CategoryCredExLookup {
            category: RecordCategory::CredExV2,
        }),
    ]
}
