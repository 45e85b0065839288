use std::{error::Error, fmt};

use thiserror;

pub mod prelude {
    pub use super::{err_msg, RevocationError, RevocationErrorKind, RevocationResult};
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, thiserror::Error)]
pub enum RevocationErrorKind {
    // Common
    #[error("Object is in invalid state for requested operation")]
    InvalidState,
    #[error("Invalid Configuration")]
    InvalidConfiguration,
    #[error("Invalid JSON string")]
    InvalidJson,
    #[error("Invalid input parameter")]
    InvalidInput,
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("IO Error")]
    IOError,

    // Revocation registry
    #[error("No revocation registry found")]
    RevRegNotFound,
    #[error("Revocation registry is full")]
    RevRegFull,
    #[error("Credential revocation index is invalid for this registry")]
    InvalidRevocationIndex,
    #[error("Credential is already revoked")]
    AlreadyRevoked,
    #[error("No revocation record found for credential")]
    CredRevRecordNotFound,
    #[error("Unable to update revocation registry entry on the ledger")]
    InvalidRevocationEntry,

    // Ledger
    #[error("Ledger rejected submitted request")]
    LedgerRejection,
    #[error("Invalid response from ledger")]
    InvalidLedgerResponse,
    #[error("Transaction author agreement has not been accepted")]
    TaaRequired,
    #[error("Ledger item not found")]
    LedgerItemNotFound,
    #[error("Failed to submit message to the ledger")]
    LedgerTransport,

    // Wallet
    #[error("Wallet record not found")]
    WalletRecordNotFound,
    #[error("Record already exists in the wallet")]
    DuplicateWalletRecord,
    #[error("Unable to lock wallet store")]
    LockError,
    #[error("Conflicting concurrent update detected")]
    ConflictDetected,
    #[error("Retries exhausted without success")]
    RetriesExhausted,

    // Signer
    #[error("Anoncreds signer error")]
    AnoncredsError,
}

impl RevocationErrorKind {
    /// Transient failures worth another attempt under a bounded retry policy.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::LedgerTransport | Self::IOError)
    }
}

#[derive(thiserror::Error)]
pub struct RevocationError {
    msg: String,
    kind: RevocationErrorKind,
}

fn format_error(err: &RevocationError, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    writeln!(f, "Error: {}", err.msg())?;
    let mut current = err.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n{}", cause)?;
        current = cause.source();
    }
    Ok(())
}

impl fmt::Display for RevocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_error(self, f)
    }
}

impl fmt::Debug for RevocationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_error(self, f)
    }
}

impl RevocationError {
    fn new(kind: RevocationErrorKind, msg: String) -> Self {
        RevocationError { msg, kind }
    }

    pub fn from_msg<D>(kind: RevocationErrorKind, msg: D) -> RevocationError
    where
        D: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::new(kind, msg.to_string())
    }

    pub fn kind(&self) -> RevocationErrorKind {
        self.kind
    }

    pub fn msg(&self) -> &str {
        &self.msg
    }

    pub fn extend<D>(self, msg: D) -> RevocationError
    where
        D: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::new(self.kind, format!("{}\n{}", self.msg, msg))
    }

    pub fn map<D>(self, kind: RevocationErrorKind, msg: D) -> RevocationError
    where
        D: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        Self::new(kind, msg.to_string())
    }
}

pub fn err_msg<D>(kind: RevocationErrorKind, msg: D) -> RevocationError
where
    D: fmt::Display + fmt::Debug + Send + Sync + 'static,
{
    RevocationError::from_msg(kind, msg)
}

pub type RevocationResult<T> = Result<T, RevocationError>;
