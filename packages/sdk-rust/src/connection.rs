//! Network connection: reads, signed submissions and receipt lookups.
//!
//! [`Connection`] is the seam between the invoker and the node. The
//! production implementation, [`RpcConnection`], talks JSON-RPC over HTTP and
//! signs with a wallet holding both the admin and user keys; tests substitute
//! a recording stub.

use std::future::Future;

use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::json_rpc::ErrorPayload;
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::transports::{RpcError, TransportError};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::identity::{Identities, Identity, SigningKeys};
use crate::policy::Operation;

// ─── Wire-level types ─────────────────────────────────────────────────────────

/// A call against the target contract, either simulated or submitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRequest {
    /// Caller for simulations. Submissions take the sender from the signer.
    pub from:  Option<Address>,
    pub to:    Address,
    pub input: Bytes,
    pub value: U256,
}

/// The parts of a receipt this client inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub tx_hash:      TxHash,
    pub block_number: Option<u64>,
    pub gas_used:     u64,
    /// `false` when the transaction was mined but reverted.
    pub success:      bool,
}

impl From<TransactionReceipt> for ReceiptSummary {
    fn from(r: TransactionReceipt) -> Self {
        Self {
            tx_hash:      r.transaction_hash,
            block_number: r.block_number,
            gas_used:     r.gas_used,
            success:      r.status(),
        }
    }
}

// ─── Connection trait ─────────────────────────────────────────────────────────

/// Everything the invoker needs from the network.
///
/// Implementations classify failures. Reverts are [`Error::Reverted`] and a
/// node refusing a signed transaction is [`Error::Rejected`]. Everything
/// else, including rate limits and node-side lookup errors, is
/// [`Error::Rpc`].
pub trait Connection: Send + Sync {
    /// `eth_call`: execute without a transaction and return the raw output.
    fn call(
        &self,
        operation: Operation,
        request:   CallRequest,
    ) -> impl Future<Output = Result<Bytes>> + Send;

    /// Sign `request` as `signer` and broadcast it. Resolves as soon as the
    /// node has accepted the transaction; it may not be mined yet.
    fn submit(
        &self,
        operation: Operation,
        signer:    &Identity,
        request:   CallRequest,
    ) -> impl Future<Output = Result<TxHash>> + Send;

    /// `eth_getTransactionReceipt`: `None` while the transaction is pending.
    fn receipt(&self, tx_hash: TxHash) -> impl Future<Output = Result<Option<ReceiptSummary>>> + Send;
}

// ─── JSON-RPC implementation ──────────────────────────────────────────────────

/// HTTP JSON-RPC connection with a wallet holding both signing keys.
///
/// Nonce, gas and chain id are filled in by the provider's recommended
/// fillers; the wallet signs with whichever key matches the `from` address.
#[derive(Clone)]
pub struct RpcConnection {
    provider:   DynProvider,
    identities: Identities,
}

impl RpcConnection {
    /// Build the connection and the two identities from validated settings.
    /// No request is sent until the first operation.
    pub fn connect(settings: &Settings) -> Result<(Self, Identities)> {
        let keys       = SigningKeys::from_settings(settings)?;
        let identities = keys.identities();

        let mut wallet = EthereumWallet::new(keys.admin);
        wallet.register_signer(keys.user);

        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(settings.rpc_url().clone())
            .erased();

        tracing::debug!(
            rpc_url = %settings.rpc_url(),
            admin   = %identities.admin.address,
            user    = %identities.user.address,
            "connection configured"
        );
        Ok((Self { provider, identities }, identities))
    }

    pub fn identities(&self) -> &Identities {
        &self.identities
    }

    /// `eth_chainId` of the connected node.
    pub async fn chain_id(&self) -> Result<u64> {
        self.provider.get_chain_id().await.map_err(Error::Rpc)
    }

    /// Latest block number of the connected node.
    pub async fn block_number(&self) -> Result<u64> {
        self.provider.get_block_number().await.map_err(Error::Rpc)
    }
}

impl Connection for RpcConnection {
    async fn call(&self, operation: Operation, request: CallRequest) -> Result<Bytes> {
        let tx = to_transaction(request);
        self.provider
            .call(tx)
            .await
            .map_err(|e| classify(operation, e, Stage::Call))
    }

    async fn submit(
        &self,
        operation: Operation,
        signer:    &Identity,
        request:   CallRequest,
    ) -> Result<TxHash> {
        let tx = to_transaction(request).with_from(signer.address);
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| classify(operation, e, Stage::Submit))?;
        Ok(*pending.tx_hash())
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<ReceiptSummary>> {
        let receipt = self
            .provider
            .get_transaction_receipt(tx_hash)
            .await
            .map_err(Error::Rpc)?;
        Ok(receipt.map(ReceiptSummary::from))
    }
}

fn to_transaction(request: CallRequest) -> TransactionRequest {
    let tx = TransactionRequest::default()
        .with_to(request.to)
        .with_input(request.input)
        .with_value(request.value);
    match request.from {
        Some(from) => tx.with_from(from),
        None       => tx,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Call,
    Submit,
}

/// Map a transport error onto the crate's taxonomy.
///
/// Only an error response that carries revert data, uses code 3 or says
/// "execution reverted" is a revert. During submission any other error
/// response is a refusal of the transaction, unless it is one of the
/// transient node conditions that [`is_transient`] recognizes.
fn classify(operation: Operation, err: TransportError, stage: Stage) -> Error {
    match &err {
        RpcError::ErrorResp(payload) if is_revert(payload) => Error::Reverted {
            operation,
            tx_hash: None,
            reason:  payload.message.to_string(),
        },
        RpcError::ErrorResp(payload) if stage == Stage::Submit && !is_transient(payload) => {
            Error::Rejected { operation, source: err }
        }
        _ => Error::Rpc(err),
    }
}

fn is_revert(payload: &ErrorPayload) -> bool {
    payload.code == 3
        || payload.as_revert_data().is_some()
        || payload.message.to_ascii_lowercase().starts_with("execution reverted")
}

/// Node conditions worth retrying: rate limits, missing state on a lagging
/// node, internal errors.
fn is_transient(payload: &ErrorPayload) -> bool {
    let message = payload.message.to_ascii_lowercase();
    matches!(payload.code, -32005 | -32603 | 429)
        || message.contains("rate limit")
        || message.contains("header not found")
        || message.contains("timeout")
}
