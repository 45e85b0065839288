use std::fmt;

use crate::primitives::identifiers::{CredentialDefinitionId, RevocationRegistryId};

/// Accumulator scheme of a revocation registry. Only `CL_ACCUM` is defined by
/// the Indy ledger today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RegistryType {
    #[serde(rename = "CL_ACCUM")]
    ClAccum,
}

impl Default for RegistryType {
    fn default() -> Self {
        RegistryType::ClAccum
    }
}

impl fmt::Display for RegistryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryType::ClAccum => f.write_str("CL_ACCUM"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevocationRegistryDefinitionValue {
    pub max_cred_num: u32,
    pub public_keys: serde_json::Value,
    pub tails_hash: String,
    pub tails_location: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RevocationRegistryDefinition {
    pub id: RevocationRegistryId,
    #[serde(rename = "revocDefType")]
    pub revoc_def_type: RegistryType,
    pub tag: String,
    #[serde(rename = "credDefId")]
    pub cred_def_id: CredentialDefinitionId,
    pub value: RevocationRegistryDefinitionValue,
}

/// Issuer-private registry key material. Opaque to this crate; produced and
/// consumed only by the anoncreds signer, stored under its own wallet
/// category and never embedded in lifecycle records.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevocationRegistryDefinitionPrivate(pub serde_json::Value);
