//! Recording stub for the `Connection` seam.
#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use alloy::dyn_abi::DynSolValue;
use alloy::primitives::{address, Address, Bytes, TxHash, B256};
use alloy::transports::TransportErrorKind;
use pool_master_sdk::{
    CallRequest, Connection, ContractDescriptor, Error, Identities, Identity, Operation,
    PositionManagerClient, ReceiptSummary, Result,
};

pub const ADMIN: Address = address!("0x00000000000000000000000000000000000000ad");
pub const USER:  Address = address!("0x0000000000000000000000000000000000000075");

#[derive(Debug, Clone)]
enum Reply {
    Data(Bytes),
    Revert(String),
}

/// How the stub answers receipt polls for every transaction.
#[derive(Debug, Clone, Copy)]
pub enum Mining {
    /// Receipt appears after `polls` empty answers, with the given status.
    After { polls: usize, success: bool },
    Never,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub operation: Operation,
    pub signer:    Identity,
    pub request:   CallRequest,
    pub tx_hash:   TxHash,
}

struct State {
    replies:       HashMap<Operation, Reply>,
    calls:         Vec<(Operation, CallRequest)>,
    submissions:   Vec<Submission>,
    receipt_polls: usize,
    pending:       HashMap<TxHash, usize>,
    mining:        Mining,
    submit_down:   bool,
    receipt_down:  usize,
}

pub struct StubConnection {
    state: Mutex<State>,
}

impl StubConnection {
    /// Every function answers with all-zero outputs and every transaction is
    /// mined successfully on the first poll.
    pub fn new() -> Self {
        let descriptor = ContractDescriptor::position_manager().unwrap();
        let replies = descriptor
            .functions()
            .map(|f| (f.operation, Reply::Data(Bytes::from(vec![0u8; 32 * f.outputs.len()]))))
            .collect();
        Self {
            state: Mutex::new(State {
                replies,
                calls:         Vec::new(),
                submissions:   Vec::new(),
                receipt_polls: 0,
                pending:       HashMap::new(),
                mining:        Mining::After { polls: 0, success: true },
                submit_down:   false,
                receipt_down:  0,
            }),
        }
    }

    pub fn respond(self, operation: Operation, values: Vec<DynSolValue>) -> Self {
        let data = DynSolValue::Tuple(values).abi_encode_params();
        self.state.lock().unwrap().replies.insert(operation, Reply::Data(data.into()));
        self
    }

    pub fn revert(self, operation: Operation, reason: &str) -> Self {
        self.state.lock().unwrap().replies.insert(operation, Reply::Revert(reason.into()));
        self
    }

    pub fn mining(self, mining: Mining) -> Self {
        self.state.lock().unwrap().mining = mining;
        self
    }

    /// Every submission fails at the transport level.
    pub fn submissions_unreachable(self) -> Self {
        self.state.lock().unwrap().submit_down = true;
        self
    }

    /// The first `polls` receipt lookups fail at the transport level.
    pub fn receipt_failures(self, polls: usize) -> Self {
        self.state.lock().unwrap().receipt_down = polls;
        self
    }

    pub fn calls(&self) -> Vec<(Operation, CallRequest)> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn submissions(&self) -> Vec<Submission> {
        self.state.lock().unwrap().submissions.clone()
    }

    pub fn receipt_polls(&self) -> usize {
        self.state.lock().unwrap().receipt_polls
    }
}

impl Connection for StubConnection {
    async fn call(&self, operation: Operation, request: CallRequest) -> Result<Bytes> {
        let mut state = self.state.lock().unwrap();
        state.calls.push((operation, request));
        match state.replies.get(&operation).cloned() {
            Some(Reply::Data(data))     => Ok(data),
            Some(Reply::Revert(reason)) => Err(Error::Reverted { operation, tx_hash: None, reason }),
            None                        => Ok(Bytes::new()),
        }
    }

    async fn submit(
        &self,
        operation: Operation,
        signer:    &Identity,
        request:   CallRequest,
    ) -> Result<TxHash> {
        let mut state = self.state.lock().unwrap();
        if state.submit_down {
            return Err(Error::Rpc(TransportErrorKind::custom_str("connection refused")));
        }
        let nonce   = state.submissions.len() as u8;
        let tx_hash = B256::with_last_byte(0xa0 + nonce);
        state.submissions.push(Submission { operation, signer: *signer, request, tx_hash });
        state.pending.insert(tx_hash, 0);
        Ok(tx_hash)
    }

    async fn receipt(&self, tx_hash: TxHash) -> Result<Option<ReceiptSummary>> {
        let mut state = self.state.lock().unwrap();
        state.receipt_polls += 1;
        if state.receipt_down > 0 {
            state.receipt_down -= 1;
            return Err(Error::Rpc(TransportErrorKind::custom_str("timeout")));
        }
        let mining = state.mining;
        let seen = state.pending.entry(tx_hash).or_insert(0);
        match mining {
            Mining::Never => Ok(None),
            Mining::After { polls, .. } if *seen < polls => {
                *seen += 1;
                Ok(None)
            }
            Mining::After { success, .. } => Ok(Some(ReceiptSummary {
                tx_hash,
                block_number: Some(1_000),
                gas_used:     150_000,
                success,
            })),
        }
    }
}

pub fn client(stub: StubConnection) -> PositionManagerClient<StubConnection> {
    PositionManagerClient::new(
        stub,
        Identities::new(ADMIN, USER),
        ContractDescriptor::position_manager().unwrap(),
    )
    .with_poll_interval(Duration::from_millis(1))
}
