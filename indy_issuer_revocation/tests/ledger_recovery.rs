pub mod utils;

use indy_issuer_revocation::records::cred_rev_record::IssuerCredRevState;

use crate::utils::TestHarness;

#[tokio::test]
async fn reconciliation_is_a_noop_when_consistent() {
    let harness = TestHarness::new().await;
    let registry = harness.active_registry(10).await;
    let rev_reg_id = registry.rev_reg_id.clone().unwrap();
    harness.issue(&rev_reg_id, "ex-1").await;
    harness
        .manager
        .revoke_credential(&rev_reg_id, "1", true, None)
        .await
        .unwrap();

    let result = harness
        .manager
        .fix_ledger_entry(&rev_reg_id, true)
        .await
        .unwrap();
    assert_eq!(result.discrepancy_count, 0);
    assert!(result.recovery_txn.is_none());
    assert!(result.applied.is_none());
    assert_eq!(harness.ledger.revoked(&rev_reg_id), vec![1]);
}

#[tokio::test]
async fn detects_and_repairs_lost_entries() {
    let harness = TestHarness::new().await;
    let registry = harness.active_registry(10).await;
    let rev_reg_id = registry.rev_reg_id.clone().unwrap();
    for cred_ex_id in ["ex-1", "ex-2", "ex-3"] {
        harness.issue(&rev_reg_id, cred_ex_id).await;
    }
    for cred_rev_id in ["1", "2", "3"] {
        harness
            .manager
            .revoke_credential(&rev_reg_id, cred_rev_id, true, None)
            .await
            .unwrap();
    }
    assert_eq!(harness.ledger.revoked(&rev_reg_id), vec![1, 2, 3]);

    // two of the three entry writes vanish from the ledger
    harness.ledger.rollback_entry(&rev_reg_id, "acc(1)", &[1]);

    // dry run: report only
    let result = harness
        .manager
        .fix_ledger_entry(&rev_reg_id, false)
        .await
        .unwrap();
    assert_eq!(result.discrepancy_count, 2);
    let recovery = result.recovery_txn.expect("recovery txn should be built");
    assert_eq!(recovery.revoked(), &[1, 2, 3]);
    assert!(result.applied.is_none());
    assert_eq!(harness.ledger.revoked(&rev_reg_id), vec![1]);

    // repair run
    let result = harness
        .manager
        .fix_ledger_entry(&rev_reg_id, true)
        .await
        .unwrap();
    assert_eq!(result.discrepancy_count, 2);
    assert!(result.applied.is_some());
    assert_eq!(harness.ledger.revoked(&rev_reg_id), vec![1, 2, 3]);
    assert_eq!(
        harness.ledger.accum(&rev_reg_id).as_deref(),
        Some("acc(1,2,3)")
    );

    // repairing a repaired ledger changes nothing
    let result = harness
        .manager
        .fix_ledger_entry(&rev_reg_id, true)
        .await
        .unwrap();
    assert_eq!(result.discrepancy_count, 0);
    assert!(result.recovery_txn.is_none());
}

#[tokio::test]
async fn accumulator_mismatch_is_flagged_but_not_fatal() {
    let harness = TestHarness::new().await;
    let registry = harness.active_registry(10).await;
    let rev_reg_id = registry.rev_reg_id.clone().unwrap();
    harness.issue(&rev_reg_id, "ex-1").await;
    harness
        .manager
        .revoke_credential(&rev_reg_id, "1", true, None)
        .await
        .unwrap();

    harness
        .ledger
        .rollback_entry(&rev_reg_id, "acc(bogus)", &[]);

    let result = harness
        .manager
        .fix_ledger_entry(&rev_reg_id, true)
        .await
        .unwrap();
    assert_eq!(result.discrepancy_count, 1);
    assert!(result.accum_mismatch);
    assert!(result.applied.is_some());
    assert_eq!(harness.ledger.revoked(&rev_reg_id), vec![1]);
}

#[tokio::test]
async fn stale_entry_triggers_automatic_recovery() {
    let harness = TestHarness::new().await;
    let registry = harness.active_registry(10).await;
    let rev_reg_id = registry.rev_reg_id.clone().unwrap();
    harness.issue(&rev_reg_id, "ex-1").await;
    harness.issue(&rev_reg_id, "ex-2").await;
    harness
        .manager
        .revoke_credential(&rev_reg_id, "1", true, None)
        .await
        .unwrap();

    // the ledger loses the first revocation, so the next delta's previous
    // accumulator no longer matches and the write gets rejected
    harness.ledger.rollback_entry(&rev_reg_id, "acc()", &[]);

    harness
        .manager
        .revoke_credential(&rev_reg_id, "2", true, None)
        .await
        .unwrap();

    assert_eq!(harness.ledger.revoked(&rev_reg_id), vec![1, 2]);
    assert_eq!(
        harness.ledger.accum(&rev_reg_id).as_deref(),
        Some("acc(1,2)")
    );
    for cred_ex_id in ["ex-1", "ex-2"] {
        let status = harness
            .manager
            .get_credential_revocation_status(cred_ex_id)
            .await
            .unwrap();
        assert_eq!(status.state, IssuerCredRevState::Revoked);
    }
}
