//! Operation invoker against a recording stub connection.

mod common;

use std::time::Duration;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{I256, U256};
use common::{client, Mining, StubConnection, ADMIN, USER};
use pool_master_sdk::{
    policy, BurnParams, CollectFeesParams, ContractCall, DecreaseLiquidityParams, Error,
    ErrorKind, IncreaseLiquidityParams, MintParams, MintedPosition, Operation, Role, SwapParams,
    TxStatus,
};

fn e18(n: u64) -> U256 {
    U256::from(n) * U256::from(10u64).pow(U256::from(18u64))
}

fn mint_params() -> MintParams {
    MintParams {
        tick_lower:  31_920,
        tick_upper:  39_060,
        amount0_max: e18(5_000),
        amount1_max: e18(5_000),
    }
}

fn uint(v: u64) -> DynSolValue {
    DynSolValue::Uint(U256::from(v), 256)
}

// ─── Signer routing ───────────────────────────────────────────────────────────

#[tokio::test]
async fn every_write_is_signed_by_its_routed_identity() {
    let c = client(StubConnection::new());

    c.swap_exact_input_single(SwapParams {
        amount_in:      U256::from(1_000u64),
        min_amount_out: U256::ZERO,
        zero_for_one:   true,
        value:          U256::ZERO,
    })
    .await
    .unwrap();
    c.collect_pool_all_fees().await.unwrap();
    c.mint_position(mint_params()).await.unwrap();
    c.burn_position(BurnParams {
        token_id:    U256::from(2107u64),
        amount0_min: U256::ZERO,
        amount1_min: U256::ZERO,
    })
    .await
    .unwrap();
    c.increase_liquidity(IncreaseLiquidityParams {
        token_id:    U256::from(7u64),
        amount0_max: 10,
        amount1_max: 10,
    })
    .await
    .unwrap();
    c.decrease_liquidity(DecreaseLiquidityParams {
        token_id:    U256::from(7u64),
        liquidity:   5,
        amount0_min: U256::ZERO,
        amount1_min: U256::ZERO,
    })
    .await
    .unwrap();

    let submissions = c.connection().submissions();
    assert_eq!(submissions.len(), 6);
    for s in &submissions {
        let expected = match policy::required_role(s.operation) {
            Some(Role::Admin) => ADMIN,
            Some(Role::User)  => USER,
            None              => panic!("{} is a read", s.operation),
        };
        assert_eq!(s.signer.address, expected, "{} signed by wrong identity", s.operation);
        assert_eq!(s.request.to, c.descriptor().address());
    }

    // Each simulation ran from the same account that later signed.
    let simulated_from: Vec<_> = c.connection().calls().iter().map(|(_, r)| r.from).collect();
    let signed_by: Vec<_> = submissions.iter().map(|s| Some(s.signer.address)).collect();
    assert_eq!(simulated_from, signed_by);
}

#[tokio::test]
async fn wrong_signer_is_refused_before_any_network_call() {
    let c    = client(StubConnection::new());
    let user = c.identities().user;

    let err = c.submit_as(&mint_params(), &user).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Policy);
    assert!(matches!(
        err,
        Error::RoleMismatch { required: Role::Admin, actual: Role::User, .. }
    ));
    assert!(c.connection().calls().is_empty());
    assert!(c.connection().submissions().is_empty());
}

// ─── Reads ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn dynamic_info_decodes_in_order_without_a_signer() {
    let stub = StubConnection::new().respond(
        Operation::GetDynamicInfo,
        vec![
            uint(1_234_567),
            DynSolValue::Int(I256::unchecked_from(-35_000i64), 24),
            uint(11),
            uint(22),
        ],
    );
    let c    = client(stub);
    let info = c.get_dynamic_info(U256::from(2107u64)).await.unwrap();

    assert_eq!(info.price, U256::from(1_234_567u64));
    assert_eq!(info.current_tick, -35_000);
    assert_eq!(info.amount0, U256::from(11u64));
    assert_eq!(info.amount1, U256::from(22u64));

    let calls = c.connection().calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].1.from, None);
    assert!(c.connection().submissions().is_empty());
}

#[tokio::test]
async fn writes_cannot_go_through_the_read_path() {
    let c   = client(StubConnection::new());
    let err = c.read(&mint_params()).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(c.connection().calls().is_empty());
}

// ─── Validation ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn out_of_range_tick_is_rejected_before_any_network_call() {
    let c = client(StubConnection::new());
    let err = c
        .mint_position(MintParams { tick_lower: 1 << 23, ..mint_params() })
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(c.connection().calls().is_empty());
}

/// `collectPoolAllFees` with a native value attached.
struct PaidCollect;

impl ContractCall for PaidCollect {
    const OPERATION: Operation = Operation::CollectPoolAllFees;
    type Output = ();

    fn args(&self) -> Vec<DynSolValue> {
        Vec::new()
    }

    fn value(&self) -> U256 {
        U256::from(1u64)
    }
}

#[tokio::test]
async fn value_on_non_payable_function_is_rejected() {
    let c   = client(StubConnection::new());
    let err = c.write(&PaidCollect).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(c.connection().calls().is_empty());

    // The payable swap accepts it.
    c.swap_exact_input_single(SwapParams {
        amount_in:      U256::from(1u64),
        min_amount_out: U256::ZERO,
        zero_for_one:   false,
        value:          U256::from(1u64),
    })
    .await
    .unwrap();
    assert_eq!(c.connection().submissions()[0].request.value, U256::from(1u64));
}

// ─── Lifecycle ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn write_is_pending_after_submission_then_confirmed() {
    let c = client(StubConnection::new().mining(Mining::After { polls: 3, success: true }));

    let mut pending = c.submit(&CollectFeesParams).await.unwrap();
    assert_eq!(pending.status(), TxStatus::Pending);
    assert_eq!(c.connection().receipt_polls(), 0);

    let receipt = c.confirm(&mut pending).await.unwrap();
    assert!(receipt.success);
    assert_eq!(pending.status(), TxStatus::Confirmed);
    assert_eq!(c.connection().receipt_polls(), 4);
    assert_eq!(
        pending.lifecycle().history(),
        [TxStatus::Built, TxStatus::Submitted, TxStatus::Pending, TxStatus::Confirmed]
    );

    // A confirmed write cannot be confirmed again.
    let err = c.confirm(&mut pending).await.unwrap_err();
    assert!(matches!(err, Error::IllegalTransition { from: "confirmed", .. }));
}

#[tokio::test]
async fn reverted_receipt_ends_failed() {
    let c = client(StubConnection::new().mining(Mining::After { polls: 0, success: false }));

    let mut pending = c.submit(&CollectFeesParams).await.unwrap();
    let tx_hash = pending.tx_hash;
    let err = c.confirm(&mut pending).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Execution);
    assert!(matches!(err, Error::Reverted { tx_hash: Some(h), .. } if h == tx_hash));
    assert_eq!(pending.status(), TxStatus::Failed);
    let terminal = pending.lifecycle().history().iter().filter(|s| s.is_terminal()).count();
    assert_eq!(terminal, 1);
}

#[tokio::test]
async fn unmined_write_times_out_as_network_error() {
    let c = client(StubConnection::new().mining(Mining::Never))
        .with_receipt_timeout(Some(Duration::from_millis(20)));

    let mut pending = c.submit(&CollectFeesParams).await.unwrap();
    let err = c.confirm(&mut pending).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(matches!(err, Error::ConfirmationTimeout { .. }));
    assert_eq!(pending.status(), TxStatus::Failed);
    assert!(c.connection().receipt_polls() >= 1);
}

#[tokio::test]
async fn failed_receipt_lookup_keeps_polling_until_mined() {
    let c = client(StubConnection::new().receipt_failures(1));

    let outcome = c.collect_pool_all_fees().await.unwrap();

    assert_eq!(c.connection().receipt_polls(), 2);
    assert_eq!(c.connection().submissions().len(), 1);
    assert_eq!(outcome.lifecycle.status(), TxStatus::Confirmed);
}

#[tokio::test]
async fn persistent_receipt_failures_end_at_the_timeout() {
    let c = client(StubConnection::new().receipt_failures(usize::MAX))
        .with_receipt_timeout(Some(Duration::from_millis(20)));

    let mut pending = c.submit(&CollectFeesParams).await.unwrap();
    let err = c.confirm(&mut pending).await.unwrap_err();

    assert!(matches!(err, Error::ConfirmationTimeout { .. }));
    assert_eq!(pending.status(), TxStatus::Failed);
    assert!(c.connection().receipt_polls() > 1);
}

#[tokio::test]
async fn reverting_simulation_never_submits() {
    let c = client(StubConnection::new().revert(Operation::BurnPosition, "not owner"));
    let err = c
        .burn_position(BurnParams {
            token_id:    U256::from(2107u64),
            amount0_min: U256::ZERO,
            amount1_min: U256::ZERO,
        })
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Execution);
    assert_eq!(err.to_string(), "burnPosition reverted: not owner");
    assert!(c.connection().submissions().is_empty());
}

#[tokio::test]
async fn unreachable_node_on_submit_is_a_network_error() {
    let c   = client(StubConnection::new().submissions_unreachable());
    let err = c.collect_pool_all_fees().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Network);
    assert!(matches!(err, Error::Rpc(_)));
    assert_eq!(c.connection().submissions().len(), 0);
    assert_eq!(c.connection().receipt_polls(), 0);
}

// ─── End to end ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn mint_returns_the_contract_tuple_and_a_confirmed_receipt() {
    let liquidity: u128 = 987_654_321_000;
    let amount0 = e18(4_999);
    let amount1 = e18(1_234);
    let stub = StubConnection::new().respond(
        Operation::MintPosition,
        vec![
            uint(2107),
            DynSolValue::Uint(U256::from(liquidity), 128),
            DynSolValue::Uint(amount0, 256),
            DynSolValue::Uint(amount1, 256),
        ],
    );
    let c = client(stub);

    let outcome = c.mint_position(mint_params()).await.unwrap();

    assert_eq!(
        outcome.output,
        MintedPosition { token_id: U256::from(2107u64), liquidity, amount0, amount1 }
    );
    let issued = c.connection().submissions();
    assert_eq!(issued.len(), 1);
    assert_eq!(outcome.tx_hash, issued[0].tx_hash);
    assert_eq!(outcome.receipt.tx_hash, issued[0].tx_hash);
    assert!(outcome.receipt.success);
    assert_eq!(outcome.signer.address, ADMIN);
    assert_eq!(outcome.lifecycle.status(), TxStatus::Confirmed);

    // Calldata is the selector followed by the four encoded arguments.
    let input = &issued[0].request.input;
    assert_eq!(&input[..4], c.descriptor().function(Operation::MintPosition).selector.as_slice());
    assert_eq!(input.len(), 4 + 4 * 32);
}
