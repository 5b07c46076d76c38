//! Ordered operation plans and the runner that executes them.
//!
//! A plan is a list of steps executed one at a time; every write is confirmed
//! before the next step starts. A failing step is logged with its error kind
//! and recorded in the [`RunReport`]. The run continues unless the plan sets
//! `halt_on_failure`, in which case the remaining steps are skipped.
//!
//! Plan file format:
//!
//! ```json
//! {
//!   "halt_on_failure": true,
//!   "steps": [
//!     { "op": "burnPosition", "token_id": 2107, "amount0_min": 0, "amount1_min": 0 },
//!     { "op": "mintPosition", "tick_lower": 31920, "tick_upper": 39060,
//!       "amount0_max": "5000000000000000000000", "amount1_max": "5000000000000000000000" }
//!   ]
//! }
//! ```
//!
//! Amounts are JSON integers or decimal/`0x` strings. Anything above
//! `u64::MAX` must be a string, since JSON numbers that large lose precision.

use alloy::primitives::{TxHash, U256};
use serde::Deserialize;

use crate::client::PositionManagerClient;
use crate::connection::Connection;
use crate::error::{Error, ErrorKind, Result};
use crate::identity::Identity;
use crate::policy::Operation;
use crate::types::{
    BurnParams, CollectFeesParams, DecreaseLiquidityParams, DynamicInfoParams,
    IncreaseLiquidityParams, MintParams, SwapParams, WriteOutcome,
};

/// Position the built-in rebalance plan retires.
pub const REBALANCE_TOKEN_ID: u64 = 2107;
/// Tick range the built-in rebalance plan re-mints into.
pub const REBALANCE_TICKS: (i32, i32) = (31_920, 39_060);

// ─── Plan model ───────────────────────────────────────────────────────────────

/// One operation invocation, tagged by its ABI name in plan files.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Step {
    GetDynamicInfo(DynamicInfoParams),
    SwapExactInputSingle(SwapParams),
    CollectPoolAllFees,
    MintPosition(MintParams),
    BurnPosition(BurnParams),
    IncreaseLiquidity(IncreaseLiquidityParams),
    DecreaseLiquidity(DecreaseLiquidityParams),
}

impl Step {
    pub fn operation(&self) -> Operation {
        match self {
            Self::GetDynamicInfo(_)       => Operation::GetDynamicInfo,
            Self::SwapExactInputSingle(_) => Operation::SwapExactInputSingle,
            Self::CollectPoolAllFees      => Operation::CollectPoolAllFees,
            Self::MintPosition(_)         => Operation::MintPosition,
            Self::BurnPosition(_)         => Operation::BurnPosition,
            Self::IncreaseLiquidity(_)    => Operation::IncreaseLiquidity,
            Self::DecreaseLiquidity(_)    => Operation::DecreaseLiquidity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Plan {
    /// Skip the remaining steps after the first failure.
    #[serde(default)]
    pub halt_on_failure: bool,
    pub steps:           Vec<Step>,
}

impl Plan {
    /// Retire position 2107, then mint a replacement over ticks
    /// 31920..39060. Halts if the burn fails so no second position is opened.
    pub fn rebalance() -> Self {
        // 5000 tokens at 18 decimals, per side.
        let amount = U256::from(5_000u64) * U256::from(10u64).pow(U256::from(18u64));
        Self {
            halt_on_failure: true,
            steps: vec![
                Step::BurnPosition(BurnParams {
                    token_id:    U256::from(REBALANCE_TOKEN_ID),
                    amount0_min: U256::ZERO,
                    amount1_min: U256::ZERO,
                }),
                Step::MintPosition(MintParams {
                    tick_lower:  REBALANCE_TICKS.0,
                    tick_upper:  REBALANCE_TICKS.1,
                    amount0_max: amount,
                    amount1_max: amount,
                }),
            ],
        }
    }

    /// Look up a plan that ships with the crate.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "rebalance" => Some(Self::rebalance()),
            _           => None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::InvalidPlan(e.to_string()))
    }

    /// Execute every step in order against `client`.
    pub async fn run<C: Connection>(&self, client: &PositionManagerClient<C>) -> RunReport {
        let total = self.steps.len();
        let mut report = RunReport { steps: Vec::with_capacity(total), halted: false };

        for (index, step) in self.steps.iter().enumerate() {
            let operation = step.operation();
            let number    = index + 1;

            if report.halted {
                tracing::info!(step = number, %operation, "skipped after earlier failure");
                report.steps.push(StepReport { index, operation, outcome: StepOutcome::Skipped });
                continue;
            }

            tracing::info!(step = number, total, %operation, "running step");
            let outcome = match execute(client, step).await {
                Ok(done) => StepOutcome::Succeeded(done),
                Err(err) => {
                    let kind = err.kind();
                    if self.halt_on_failure {
                        tracing::error!(step = number, %operation, %kind, error = %err, "step failed, halting");
                        report.halted = true;
                    } else {
                        tracing::error!(step = number, %operation, %kind, error = %err, "step failed, continuing");
                    }
                    StepOutcome::Failed { kind, detail: err.to_string() }
                }
            };
            report.steps.push(StepReport { index, operation, outcome });
        }
        report
    }
}

// ─── Run report ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub steps:  Vec<StepReport>,
    /// A failure stopped the run early.
    pub halted: bool,
}

impl RunReport {
    pub fn succeeded(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Succeeded(_)))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Failed { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, StepOutcome::Skipped))
    }

    /// Every step ran and succeeded.
    pub fn is_success(&self) -> bool {
        self.succeeded() == self.steps.len()
    }

    fn count(&self, pred: impl Fn(&StepOutcome) -> bool) -> usize {
        self.steps.iter().filter(|s| pred(&s.outcome)).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepReport {
    /// Zero-based position in the plan.
    pub index:     usize,
    pub operation: Operation,
    pub outcome:   StepOutcome,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded(StepSuccess),
    Failed { kind: ErrorKind, detail: String },
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSuccess {
    /// `None` for reads.
    pub tx_hash: Option<TxHash>,
    pub signer:  Option<Identity>,
    /// Decoded return values, one `name=value` pair per output.
    pub summary: String,
}

// ─── Step execution ───────────────────────────────────────────────────────────

async fn execute<C: Connection>(client: &PositionManagerClient<C>, step: &Step) -> Result<StepSuccess> {
    Ok(match step {
        Step::GetDynamicInfo(p) => {
            let info = client.read(p).await?;
            StepSuccess {
                tx_hash: None,
                signer:  None,
                summary: format!(
                    "price={} currentTick={} amount0={} amount1={}",
                    info.price, info.current_tick, info.amount0, info.amount1
                ),
            }
        }
        Step::SwapExactInputSingle(p) => {
            let out = client.write(p).await?;
            let summary = format!("amountOut={}", out.output);
            written(&out, summary)
        }
        Step::CollectPoolAllFees => {
            let out = client.write(&CollectFeesParams).await?;
            written(&out, "fees collected".into())
        }
        Step::MintPosition(p) => {
            let out = client.write(p).await?;
            let m   = &out.output;
            let summary = format!(
                "tokenId={} liquidity={} amount0={} amount1={}",
                m.token_id, m.liquidity, m.amount0, m.amount1
            );
            written(&out, summary)
        }
        Step::BurnPosition(p) => {
            let out = client.write(p).await?;
            written(&out, format!("burned {}", p.token_id))
        }
        Step::IncreaseLiquidity(p) => {
            let out = client.write(p).await?;
            let r   = &out.output;
            let summary =
                format!("liquidity={} amount0={} amount1={}", r.liquidity, r.amount0, r.amount1);
            written(&out, summary)
        }
        Step::DecreaseLiquidity(p) => {
            let out = client.write(p).await?;
            let summary = format!("amount0={} amount1={}", out.output.amount0, out.output.amount1);
            written(&out, summary)
        }
    })
}

fn written<T>(outcome: &WriteOutcome<T>, summary: String) -> StepSuccess {
    StepSuccess {
        tx_hash: Some(outcome.tx_hash),
        signer:  Some(outcome.signer),
        summary,
    }
}
