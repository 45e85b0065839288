use std::{collections::BTreeSet, fmt::Debug, path::Path};

use async_trait::async_trait;

use crate::{
    errors::error::RevocationResult,
    primitives::{
        identifiers::{CredentialDefinitionId, RevocationRegistryId},
        rev_reg_def::RevocationRegistryDefinition,
        rev_reg_delta::RevocationRegistryDelta,
    },
    wallet::base_wallet::RecordWallet,
};

/// Issuance bookkeeping stored under the `rev_reg_info` category, keyed by
/// registry id. `curr_id` is the highest revocation index handed out so far;
/// the counter is advanced under an optimistic transaction so an index is
/// never assigned twice.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevRegInfo {
    pub curr_id: u32,
    #[serde(default)]
    pub used_ids: BTreeSet<u32>,
}

/// Result of applying a set of revocations to the accumulator.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistryUpdate {
    /// Delta covering exactly the indices in `revoked`.
    pub delta: RevocationRegistryDelta,
    /// Indices actually folded into the accumulator.
    pub revoked: Vec<u32>,
    /// Indices the signer refused: out of range, never issued, or already
    /// revoked. Reported back to the caller rather than failing the batch.
    pub failed: Vec<u32>,
}

/// Issuer-side revocation capabilities of the anoncreds signer.
///
/// The signer owns the accumulator math and the crypto-material wallet
/// categories (`rev_reg`, `rev_reg_def`, `rev_reg_def_priv`, `rev_reg_info`);
/// this crate only orchestrates around them.
#[async_trait]
pub trait IssuerAnonCreds: Debug + Send + Sync {
    /// Whether the credential definition was created with revocation support.
    async fn cred_def_supports_revocation(
        &self,
        wallet: &dyn RecordWallet,
        cred_def_id: &CredentialDefinitionId,
    ) -> RevocationResult<bool>;

    /// Generates registry keys and the tails file (of size `max_cred_num`,
    /// written under `tails_dir`), stores the private material in the wallet
    /// and returns the derived id, public definition and initial entry.
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
    )>;

    /// Folds the given credential revocation indices into the accumulator and
    /// returns the resulting delta, along with any indices that could not be
    /// revoked.
    async fn revoke_credentials(
        &self,
        wallet: &dyn RecordWallet,
        rev_reg_id: &RevocationRegistryId,
        cred_rev_ids: &[u32],
    ) -> RevocationResult<RegistryUpdate>;

    /// Recomputes an accumulator state covering the full `revoked` set from
    /// the wallet-held private material, for ledger repair. Unlike
    /// [`Self::revoke_credentials`] this does not advance the stored registry
    /// state.
    async fn create_recovery_delta(
        &self,
        wallet: &dyn RecordWallet,
        rev_reg_id: &RevocationRegistryId,
        revoked: &[u32],
    ) -> RevocationResult<RevocationRegistryDelta>;
}
