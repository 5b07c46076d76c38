//! [`PositionManagerClient`]: the operation invoker.
//!
//! Reads go out as a bare `eth_call`. Writes are routed to the signer the
//! role table names, simulated from that signer to capture the function's
//! return values, submitted, then polled until a receipt arrives.

use std::time::Duration;

use alloy::primitives::{TxHash, U256};
use tokio::time::Instant;

use crate::config::Settings;
use crate::connection::{CallRequest, Connection, ReceiptSummary, RpcConnection};
use crate::descriptor::ContractDescriptor;
use crate::error::{Error, Result};
use crate::identity::{Identities, Identity};
use crate::lifecycle::{TxLifecycle, TxStatus};
use crate::policy::{self, Operation, Role};
use crate::types::{
    BurnParams, CollectFeesParams, ContractCall, DecodeOutputs, DecreaseLiquidityParams,
    DynamicInfo, DynamicInfoParams, IncreaseLiquidityParams, LiquidityDecrease,
    LiquidityIncrease, MintParams, MintedPosition, SwapParams, WriteOutcome,
};

// ─── Client ───────────────────────────────────────────────────────────────────

/// Async client for the position-manager contract.
///
/// ```rust,no_run
/// # use pool_master_sdk::{PositionManagerClient, Settings, MintParams};
/// # use alloy::primitives::U256;
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = PositionManagerClient::connect(&Settings::from_env()?)?;
/// let info   = client.get_dynamic_info(U256::from(2107u64)).await?;
/// println!("tick {}", info.current_tick);
///
/// let minted = client.mint_position(MintParams {
///     tick_lower:  31_920,
///     tick_upper:  39_060,
///     amount0_max: U256::from(5_000u64) * U256::from(10u64).pow(U256::from(18u64)),
///     amount1_max: U256::from(5_000u64) * U256::from(10u64).pow(U256::from(18u64)),
/// }).await?;
/// println!("new position {} in {}", minted.output.token_id, minted.tx_hash);
/// # Ok(())
/// # }
/// ```
pub struct PositionManagerClient<C: Connection = RpcConnection> {
    conn:            C,
    descriptor:      ContractDescriptor,
    identities:      Identities,
    poll_interval:   Duration,
    receipt_timeout: Option<Duration>,
}

impl PositionManagerClient<RpcConnection> {
    /// Connect over JSON-RPC using validated settings.
    pub fn connect(settings: &Settings) -> Result<Self> {
        let (conn, identities) = RpcConnection::connect(settings)?;
        let mut descriptor = ContractDescriptor::position_manager()?;
        if let Some(address) = settings.contract() {
            descriptor = descriptor.at(address);
        }
        Ok(Self::new(conn, identities, descriptor)
            .with_poll_interval(settings.poll_interval())
            .with_receipt_timeout(settings.receipt_timeout()))
    }
}

impl<C: Connection> PositionManagerClient<C> {
    pub fn new(conn: C, identities: Identities, descriptor: ContractDescriptor) -> Self {
        Self {
            conn,
            descriptor,
            identities,
            poll_interval:   crate::config::DEFAULT_POLL_INTERVAL,
            receipt_timeout: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Bound the confirmation wait. `None` waits for as long as it takes.
    pub fn with_receipt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    pub fn connection(&self) -> &C {
        &self.conn
    }

    pub fn descriptor(&self) -> &ContractDescriptor {
        &self.descriptor
    }

    pub fn identities(&self) -> &Identities {
        &self.identities
    }

    /// The identity the role table routes `operation` to.
    pub fn signer_for(&self, operation: Operation) -> Result<&Identity> {
        policy::required_role(operation)
            .map(|role| self.identities.for_role(role))
            .ok_or_else(|| Error::invalid_call(operation, "read-only operations have no signer"))
    }

    // ── Read operations ───────────────────────────────────────────────────────

    /// Live `{price, currentTick, amount0, amount1}` of a position.
    pub async fn get_dynamic_info(&self, token_id: U256) -> Result<DynamicInfo> {
        self.read(&DynamicInfoParams { token_id }).await
    }

    /// Execute a view function with `eth_call`. No signer, no transaction.
    pub async fn read<Q: ContractCall>(&self, call: &Q) -> Result<Q::Output> {
        let operation = Q::OPERATION;
        let spec      = self.descriptor.function(operation);
        if !spec.mutability.is_read_only() {
            return Err(Error::invalid_call(
                operation,
                "state-changing function must be submitted as a transaction",
            ));
        }
        spec.check_value(call.value())?;
        let input = spec.encode(&call.args())?;

        let raw = self
            .conn
            .call(
                operation,
                CallRequest {
                    from:  None,
                    to:    self.descriptor.address(),
                    input,
                    value: U256::ZERO,
                },
            )
            .await?;
        let output = <Q::Output as DecodeOutputs>::decode_outputs(operation, spec.decode_output(&raw)?)?;

        tracing::info!(%operation, contract = %self.descriptor.address(), "[READ] ok");
        Ok(output)
    }

    // ── Write operations ──────────────────────────────────────────────────────

    /// Swap an exact input amount. Returns the simulated `amountOut`.
    pub async fn swap_exact_input_single(&self, params: SwapParams) -> Result<WriteOutcome<U256>> {
        self.write(&params).await
    }

    /// Sweep every accrued pool fee to the treasury.
    pub async fn collect_pool_all_fees(&self) -> Result<WriteOutcome<()>> {
        self.write(&CollectFeesParams).await
    }

    /// Open a new position between two ticks.
    ///
    /// `output` holds the values simulated just before submission. The mined
    /// transaction can return different ones, for example a later token id
    /// when another mint lands first.
    pub async fn mint_position(&self, params: MintParams) -> Result<WriteOutcome<MintedPosition>> {
        self.write(&params).await
    }

    /// Remove all liquidity from a position and burn its NFT.
    pub async fn burn_position(&self, params: BurnParams) -> Result<WriteOutcome<()>> {
        self.write(&params).await
    }

    pub async fn increase_liquidity(
        &self,
        params: IncreaseLiquidityParams,
    ) -> Result<WriteOutcome<LiquidityIncrease>> {
        self.write(&params).await
    }

    pub async fn decrease_liquidity(
        &self,
        params: DecreaseLiquidityParams,
    ) -> Result<WriteOutcome<LiquidityDecrease>> {
        self.write(&params).await
    }

    /// Submit `call` under its routed signer and block until it is confirmed.
    pub async fn write<Q: ContractCall>(&self, call: &Q) -> Result<WriteOutcome<Q::Output>> {
        let mut pending = self.submit(call).await?;
        let receipt = self.confirm(&mut pending).await?;
        Ok(pending.into_outcome(receipt))
    }

    /// Submit `call` under its routed signer without waiting for a receipt.
    pub async fn submit<Q: ContractCall>(&self, call: &Q) -> Result<PendingWrite<Q::Output>> {
        let signer = *self.signer_for(Q::OPERATION)?;
        self.submit_as(call, &signer).await
    }

    /// Submit `call` signed by `signer`. The role table is enforced here, so a
    /// signer without the required role fails before anything is sent.
    pub async fn submit_as<Q: ContractCall>(
        &self,
        call:   &Q,
        signer: &Identity,
    ) -> Result<PendingWrite<Q::Output>> {
        let operation = Q::OPERATION;
        policy::authorize(operation, signer)?;

        let spec  = self.descriptor.function(operation);
        let value = call.value();
        spec.check_value(value)?;
        let input = spec.encode(&call.args())?;
        let mut lifecycle = TxLifecycle::new();

        let request = CallRequest {
            from: Some(signer.address),
            to:   self.descriptor.address(),
            input,
            value,
        };

        // A reverting simulation never reaches the mempool.
        let raw    = self.conn.call(operation, request.clone()).await?;
        let output = <Q::Output as DecodeOutputs>::decode_outputs(operation, spec.decode_output(&raw)?)?;

        lifecycle.advance(TxStatus::Submitted)?;
        tracing::info!(
            %operation,
            signer = %signer.address,
            "{} submitting",
            label(signer.role)
        );
        let tx_hash = match self
            .conn
            .submit(operation, signer, CallRequest { from: None, ..request })
            .await
        {
            Ok(hash) => hash,
            Err(err) => {
                tracing::warn!(%operation, kind = %err.kind(), error = %err, "submission failed");
                return Err(err);
            }
        };
        lifecycle.advance(TxStatus::Pending)?;
        tracing::info!(%operation, %tx_hash, "transaction pending");

        Ok(PendingWrite { operation, signer: *signer, tx_hash, output, lifecycle })
    }

    /// Poll for the receipt of a pending write. On return the write is
    /// `Confirmed` (Ok) or `Failed` (Err).
    ///
    /// A failed receipt lookup is logged and polled again: the node has
    /// already accepted the transaction, so it may be mined regardless. Only
    /// a reverted receipt or the receipt timeout fails the write.
    pub async fn confirm<T>(&self, pending: &mut PendingWrite<T>) -> Result<ReceiptSummary> {
        if pending.status() != TxStatus::Pending {
            return Err(Error::IllegalTransition {
                from: pending.status().as_str(),
                to:   TxStatus::Confirmed.as_str(),
            });
        }

        let operation = pending.operation;
        let tx_hash   = pending.tx_hash;
        let started   = Instant::now();
        let receipt = loop {
            match self.conn.receipt(tx_hash).await {
                Ok(Some(receipt)) => break receipt,
                Ok(None)          => {}
                Err(err) => {
                    tracing::warn!(%operation, %tx_hash, error = %err, "receipt lookup failed, polling again");
                }
            }
            if let Some(limit) = self.receipt_timeout {
                let waited = started.elapsed();
                if waited >= limit {
                    pending.lifecycle.fail();
                    tracing::warn!(%operation, %tx_hash, ?waited, "gave up waiting for receipt");
                    return Err(Error::ConfirmationTimeout { tx_hash, waited });
                }
            }
            tokio::time::sleep(self.poll_interval).await;
        };

        if !receipt.success {
            pending.lifecycle.fail();
            tracing::warn!(%operation, %tx_hash, block = ?receipt.block_number, "transaction reverted");
            return Err(Error::Reverted {
                operation,
                tx_hash: Some(tx_hash),
                reason:  "receipt status is 0".into(),
            });
        }

        pending.lifecycle.advance(TxStatus::Confirmed)?;
        tracing::info!(
            %operation,
            %tx_hash,
            block    = ?receipt.block_number,
            gas_used = receipt.gas_used,
            "{} confirmed",
            label(pending.signer.role)
        );
        Ok(receipt)
    }
}

// ─── Pending write ────────────────────────────────────────────────────────────

/// A write the node has accepted but that may not be mined yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite<T> {
    pub operation: Operation,
    pub signer:    Identity,
    pub tx_hash:   TxHash,
    /// Return values from the pre-submission simulation.
    pub output:    T,
    lifecycle:     TxLifecycle,
}

impl<T> PendingWrite<T> {
    pub fn status(&self) -> TxStatus {
        self.lifecycle.status()
    }

    pub fn lifecycle(&self) -> &TxLifecycle {
        &self.lifecycle
    }

    fn into_outcome(self, receipt: ReceiptSummary) -> WriteOutcome<T> {
        WriteOutcome {
            operation: self.operation,
            signer:    self.signer,
            tx_hash:   self.tx_hash,
            output:    self.output,
            receipt,
            lifecycle: self.lifecycle,
        }
    }
}

fn label(role: Role) -> &'static str {
    match role {
        Role::Admin => "[ADMIN-WRITE]",
        Role::User  => "[WRITE]",
    }
}
