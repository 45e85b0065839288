use std::fmt::Debug;

use async_trait::async_trait;

use crate::{
    ledger::error::LedgerResult,
    primitives::{
        identifiers::RevocationRegistryId,
        rev_reg_def::{RegistryType, RevocationRegistryDefinition},
        rev_reg_delta::RevocationRegistryDelta,
    },
};

#[async_trait]
pub trait AnoncredsLedgerRead: Debug + Send + Sync {
    async fn get_rev_reg_def(
        &self,
        rev_reg_id: &RevocationRegistryId,
    ) -> LedgerResult<RevocationRegistryDefinition>;

    /// Returns the accumulated delta between the two timestamps (whole
    /// history when both are `None`) and the ledger timestamp of the newest
    /// transaction folded into it.
    async fn get_rev_reg_delta(
        &self,
        rev_reg_id: &RevocationRegistryId,
        from: Option<u64>,
        to: Option<u64>,
    ) -> LedgerResult<(RevocationRegistryDelta, u64)>;
}

#[async_trait]
pub trait AnoncredsLedgerWrite: Debug + Send + Sync {
    async fn publish_rev_reg_def(
        &self,
        rev_reg_def: &RevocationRegistryDefinition,
        submitter_did: &str,
    ) -> LedgerResult<String>;

    async fn publish_rev_reg_entry(
        &self,
        rev_reg_id: &RevocationRegistryId,
        revoc_def_type: RegistryType,
        entry: &RevocationRegistryDelta,
        submitter_did: &str,
    ) -> LedgerResult<String>;
}
