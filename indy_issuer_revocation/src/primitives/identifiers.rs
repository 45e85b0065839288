use std::fmt;

use crate::primitives::rev_reg_def::RegistryType;

/// Ledger-assigned revocation registry identifier, in the form
/// `<issuer_did>:4:<cred_def_id>:<registry_type>:<tag>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RevocationRegistryId(String);

impl RevocationRegistryId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the registry id embedded tag and all, the way the signer does
    /// when it creates the registry.
    pub fn build(
        issuer_did: &str,
        cred_def_id: &CredentialDefinitionId,
        revoc_def_type: RegistryType,
        tag: &str,
    ) -> Self {
        Self(format!(
            "{}:4:{}:{}:{}",
            issuer_did, cred_def_id, revoc_def_type, tag
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn issuer_did(&self) -> Option<&str> {
        self.0.split(':').next().filter(|part| !part.is_empty())
    }
}

impl fmt::Display for RevocationRegistryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RevocationRegistryId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialDefinitionId(String);

impl CredentialDefinitionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialDefinitionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CredentialDefinitionId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_registry_id_from_parts() {
        let id = RevocationRegistryId::build(
            "55GkHamhTU1ZbTbV2ab9DE",
            &CredentialDefinitionId::new("55GkHamhTU1ZbTbV2ab9DE:3:CL:123:tag1"),
            RegistryType::ClAccum,
            "0",
        );
        assert_eq!(
            id.as_str(),
            "55GkHamhTU1ZbTbV2ab9DE:4:55GkHamhTU1ZbTbV2ab9DE:3:CL:123:tag1:CL_ACCUM:0"
        );
        assert_eq!(id.issuer_did(), Some("55GkHamhTU1ZbTbV2ab9DE"));
    }
}
