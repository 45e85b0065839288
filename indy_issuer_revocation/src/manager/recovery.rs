use crate::{
    anoncreds::base_anoncreds::IssuerAnonCreds,
    errors::error::{err_msg, RevocationErrorKind, RevocationResult},
    ledger::base_ledger::{AnoncredsLedgerRead, AnoncredsLedgerWrite},
    primitives::rev_reg_delta::RevocationRegistryDelta,
    records::{
        cred_rev_record::{IssuerCredRevRecord, IssuerCredRevState},
        rev_reg_record::IssuerRevRegRecord,
    },
    wallet::base_wallet::RecordWallet,
};

/// Outcome of a ledger reconciliation pass.
#[derive(Debug, Default)]
pub struct LedgerRecoveryResult {
    /// Wallet-revoked indices the ledger did not reflect.
    pub discrepancy_count: usize,
    /// Whether the locally stored accumulator differed from the ledger's.
    /// Detection only; no repair decision is made on this signal.
    pub accum_mismatch: bool,
    /// The delta observed on the ledger, when a repair was warranted.
    pub ledger_delta: Option<RevocationRegistryDelta>,
    /// Corrective transaction covering the full locally-revoked set.
    pub recovery_txn: Option<RevocationRegistryDelta>,
    /// Ledger response if the recovery transaction was submitted.
    pub applied: Option<String>,
}

/// Detects divergence between the wallet's revocation truth and the ledger's
/// published accumulator state and, when asked, repairs it.
///
/// The wallet is authoritative: any credential the wallet holds as revoked
/// that is missing from the ledger's revoked set is a discrepancy. The
/// constructed repair covers the *entire* locally-revoked set, making the
/// ledger a consistent superset, so running this twice without new
/// discrepancies is a no-op.
pub async fn fix_ledger_entry(
    wallet: &dyn RecordWallet,
    anoncreds: &dyn IssuerAnonCreds,
    ledger_read: &dyn AnoncredsLedgerRead,
    ledger_write: &dyn AnoncredsLedgerWrite,
    rev_reg_record: &IssuerRevRegRecord,
    apply_ledger_update: bool,
) -> RevocationResult<LedgerRecoveryResult> {
    let rev_reg_id = rev_reg_record.rev_reg_id.clone().ok_or_else(|| {
        err_msg(
            RevocationErrorKind::InvalidState,
            format!(
                "Revocation registry {} has no ledger id; nothing to reconcile",
                rev_reg_record.record_id
            ),
        )
    })?;
    trace!(
        "fix_ledger_entry >>> rev_reg_id: {}, apply_ledger_update: {}",
        rev_reg_id,
        apply_ledger_update
    );

    let (ledger_delta, _timestamp) = ledger_read
        .get_rev_reg_delta(&rev_reg_id, None, None)
        .await?;

    let locally_revoked: Vec<u32> = {
        let mut indices: Vec<u32> =
            IssuerCredRevRecord::query(wallet, Some(&rev_reg_id), Some(IssuerCredRevState::Revoked))
                .await?
                .iter()
                .filter_map(|record| record.cred_rev_id.parse::<u32>().ok())
                .collect();
        indices.sort_unstable();
        indices.dedup();
        indices
    };

    let discrepancy_count = locally_revoked
        .iter()
        .filter(|index| !ledger_delta.revoked().contains(index))
        .count();

    if discrepancy_count == 0 {
        info!(
            "fix_ledger_entry >>> ledger is consistent with wallet for {}",
            rev_reg_id
        );
        return Ok(LedgerRecoveryResult::default());
    }

    let accum_mismatch = rev_reg_record
        .rev_reg_entry
        .as_ref()
        .map(|entry| entry.accum() != ledger_delta.accum())
        .unwrap_or(false);
    if accum_mismatch {
        warn!(
            "fix_ledger_entry >>> accumulator mismatch for {}: wallet and ledger disagree on \
             accumulator value as well as revoked set",
            rev_reg_id
        );
    }
    info!(
        "fix_ledger_entry >>> {} wallet-revoked credentials missing from ledger for {}, building \
         recovery transaction over {} indices",
        discrepancy_count,
        rev_reg_id,
        locally_revoked.len()
    );

    let recovery_txn = anoncreds
        .create_recovery_delta(wallet, &rev_reg_id, &locally_revoked)
        .await?;

    let applied = if apply_ledger_update {
        let response = ledger_write
            .publish_rev_reg_entry(
                &rev_reg_id,
                rev_reg_record.revoc_def_type,
                &recovery_txn,
                &rev_reg_record.issuer_did,
            )
            .await?;
        Some(response)
    } else {
        None
    };

    Ok(LedgerRecoveryResult {
        discrepancy_count,
        accum_mismatch,
        ledger_delta: Some(ledger_delta),
        recovery_txn: Some(recovery_txn),
        applied,
    })
}
