//! Pool Master Rust SDK
//!
//! Typed client for a liquidity-pool position-manager contract on an
//! Ethereum-compatible network. Two signing identities are configured: an
//! admin that manages positions and a user that swaps and collects fees.
//! Each write is routed to the right one automatically.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use pool_master_sdk::{BurnParams, PositionManagerClient, Settings};
//! use alloy::primitives::U256;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // ARBITRUM_SEPOLIA_RPC_URL, ADMIN_PRIVATE_KEY, USER_PRIVATE_KEY
//!     let client = PositionManagerClient::connect(&Settings::from_env()?)?;
//!
//!     // 1. Read live position state
//!     let info = client.get_dynamic_info(U256::from(2107u64)).await?;
//!     println!("price {}  tick {}", info.price, info.current_tick);
//!
//!     // 2. Burn it (signed by the admin key, waits for the receipt)
//!     let burned = client.burn_position(BurnParams {
//!         token_id:    U256::from(2107u64),
//!         amount0_min: U256::ZERO,
//!         amount1_min: U256::ZERO,
//!     }).await?;
//!     println!("burned in block {:?}", burned.receipt.block_number);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Feature Overview
//!
//! | Method | Signer | Description |
//! |--------|--------|-------------|
//! | [`PositionManagerClient::get_dynamic_info`] | none | Price, tick and token amounts of a position |
//! | [`PositionManagerClient::swap_exact_input_single`] | user | Exact-input swap |
//! | [`PositionManagerClient::collect_pool_all_fees`] | user | Sweep accrued pool fees |
//! | [`PositionManagerClient::mint_position`] | admin | Open a position between two ticks |
//! | [`PositionManagerClient::burn_position`] | admin | Close a position |
//! | [`PositionManagerClient::increase_liquidity`] | admin | Add liquidity to a position |
//! | [`PositionManagerClient::decrease_liquidity`] | admin | Remove liquidity from a position |
//! | [`Plan::run`] | per step | Execute an ordered list of the above |

pub mod client;
pub mod config;
pub mod connection;
pub mod descriptor;
pub mod error;
pub mod identity;
pub mod lifecycle;
pub mod plan;
pub mod policy;
pub mod types;

pub use client::{PendingWrite, PositionManagerClient};
pub use config::Settings;
pub use connection::{CallRequest, Connection, ReceiptSummary, RpcConnection};
pub use descriptor::{ContractDescriptor, DEFAULT_CONTRACT};
pub use error::{Error, ErrorKind, Result};
pub use identity::{Identities, Identity};
pub use lifecycle::{TxLifecycle, TxStatus};
pub use plan::{Plan, RunReport, Step, StepOutcome};
pub use policy::{Operation, Role, ROLE_POLICY};
pub use types::*;
