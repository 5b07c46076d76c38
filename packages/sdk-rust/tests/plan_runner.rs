mod common;

use common::{client, StubConnection, ADMIN};
use pool_master_sdk::{ErrorKind, Operation, Plan, StepOutcome};

#[tokio::test]
async fn rebalance_halts_when_the_burn_fails() {
    let c = client(StubConnection::new().revert(Operation::BurnPosition, "position not found"));

    let report = Plan::rebalance().run(&c).await;

    assert!(report.halted);
    assert_eq!((report.succeeded(), report.failed(), report.skipped()), (0, 1, 1));
    assert!(matches!(
        report.steps[0].outcome,
        StepOutcome::Failed { kind: ErrorKind::Execution, .. }
    ));
    assert_eq!(report.steps[1].operation, Operation::MintPosition);
    assert!(matches!(report.steps[1].outcome, StepOutcome::Skipped));
    assert!(c.connection().submissions().is_empty());
}

#[tokio::test]
async fn rebalance_confirms_burn_before_minting() {
    let c = client(StubConnection::new());

    let report = Plan::rebalance().run(&c).await;

    assert!(report.is_success());
    let ops: Vec<_> = c.connection().submissions().iter().map(|s| s.operation).collect();
    assert_eq!(ops, [Operation::BurnPosition, Operation::MintPosition]);
    assert!(c.connection().submissions().iter().all(|s| s.signer.address == ADMIN));
    // One receipt poll per write, each finished before the next began.
    assert_eq!(c.connection().receipt_polls(), 2);
}

#[tokio::test]
async fn failure_is_logged_and_the_run_continues() {
    let c = client(StubConnection::new().revert(Operation::DecreaseLiquidity, "insufficient"));
    let plan = Plan::from_json(
        r#"{
            "steps": [
                { "op": "decreaseLiquidity", "token_id": 9, "liquidity": 1, "amount0_min": 0, "amount1_min": 0 },
                { "op": "getDynamicInfo", "token_id": 9 },
                { "op": "collectPoolAllFees" }
            ]
        }"#,
    )
    .unwrap();

    let report = plan.run(&c).await;

    assert!(!report.halted);
    assert!(!report.is_success());
    assert_eq!((report.succeeded(), report.failed(), report.skipped()), (2, 1, 0));
    match &report.steps[1].outcome {
        StepOutcome::Succeeded(done) => {
            assert!(done.tx_hash.is_none());
            assert!(done.summary.starts_with("price=0 currentTick=0"));
        }
        other => panic!("read step should succeed, got {other:?}"),
    }
    match &report.steps[2].outcome {
        StepOutcome::Succeeded(done) => {
            let issued = c.connection().submissions();
            assert_eq!(done.tx_hash, Some(issued[0].tx_hash));
        }
        other => panic!("collect step should succeed, got {other:?}"),
    }
}

#[tokio::test]
async fn invalid_step_arguments_fail_only_that_step() {
    let c = client(StubConnection::new());
    let plan = Plan::from_json(
        r#"{
            "steps": [
                { "op": "mintPosition", "tick_lower": 9000000, "tick_upper": 0, "amount0_max": 1, "amount1_max": 1 },
                { "op": "swapExactInputSingle", "amount_in": "0x3e8", "min_amount_out": 1, "zero_for_one": true }
            ]
        }"#,
    )
    .unwrap();

    let report = plan.run(&c).await;

    assert!(matches!(
        report.steps[0].outcome,
        StepOutcome::Failed { kind: ErrorKind::Validation, .. }
    ));
    let swaps = c.connection().submissions();
    assert_eq!(swaps.len(), 1);
    assert_eq!(swaps[0].operation, Operation::SwapExactInputSingle);
    assert_eq!(report.steps[1].operation, Operation::SwapExactInputSingle);
    assert_eq!(swaps[0].request.input.len(), 4 + 3 * 32);
}

#[tokio::test]
async fn empty_plan_succeeds_trivially() {
    let c      = client(StubConnection::new());
    let report = Plan::from_json(r#"{ "halt_on_failure": true, "steps": [] }"#)
        .unwrap()
        .run(&c)
        .await;
    assert!(report.is_success());
    assert!(report.steps.is_empty());
}

#[test]
fn shipped_plan_files_parse() {
    let rebalance = Plan::from_json(include_str!("../../../plans/rebalance.json")).unwrap();
    assert!(rebalance.halt_on_failure);
    assert_eq!(rebalance.steps.len(), 3);

    let maintenance = Plan::from_json(include_str!("../../../plans/maintenance.json")).unwrap();
    assert!(!maintenance.halt_on_failure);
    assert_eq!(maintenance.steps[0].operation(), Operation::CollectPoolAllFees);
}
