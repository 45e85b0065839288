use crate::{
    errors::error::{RevocationError, RevocationErrorKind},
    ledger::error::{LedgerError, RejectReason},
};

impl From<LedgerError> for RevocationError {
    fn from(err: LedgerError) -> Self {
        let kind = match &err {
            LedgerError::Rejected { reason, .. } => match reason {
                RejectReason::TaaAcceptanceRequired => RevocationErrorKind::TaaRequired,
                // Stale/invalid client requests are repairable by
                // reconciliation; give them a kind of their own.
                RejectReason::InvalidClientRequest => RevocationErrorKind::InvalidRevocationEntry,
                RejectReason::Other => RevocationErrorKind::LedgerRejection,
            },
            LedgerError::Transport(_) => RevocationErrorKind::LedgerTransport,
            LedgerError::ItemNotFound(_) => RevocationErrorKind::LedgerItemNotFound,
            LedgerError::InvalidResponse(_) => RevocationErrorKind::InvalidLedgerResponse,
        };
        RevocationError::from_msg(kind, err)
    }
}
