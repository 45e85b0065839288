use thiserror::Error as ThisError;

pub type LedgerResult<T> = Result<T, LedgerError>;

/// Machine-readable cause of a ledger REQNACK/REJECT, parsed by the client
/// from the node's reason string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The node considered the client request invalid or stale, e.g. a
    /// revocation entry whose previous accumulator no longer matches. The
    /// caller may be able to repair its state and retry.
    InvalidClientRequest,
    /// The transaction author agreement has not been accepted by the
    /// submitter. Retrying cannot help.
    TaaAcceptanceRequired,
    Other,
}

#[derive(Debug, ThisError)]
pub enum LedgerError {
    #[error("Ledger rejected request ({reason:?}): {message}")]
    Rejected {
        reason: RejectReason,
        message: String,
    },
    #[error("Ledger transport failure: {0}")]
    Transport(String),
    #[error("Ledger item not found: {0}")]
    ItemNotFound(String),
    #[error("Invalid ledger response: {0}")]
    InvalidResponse(String),
}

impl LedgerError {
    pub fn reject_reason(&self) -> Option<RejectReason> {
        match self {
            LedgerError::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }
}
