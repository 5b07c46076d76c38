use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use anyhow::{anyhow, Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use pool_master_sdk::{
    config::{self, parse_address},
    policy, BurnParams, ContractDescriptor, DecreaseLiquidityParams, IncreaseLiquidityParams,
    MintParams, Operation, Plan, PositionManagerClient, Role, RunReport, Settings, StepOutcome,
    SwapParams, WriteOutcome, DEFAULT_CONTRACT,
};
use serde_json::json;
use tracing_subscriber::EnvFilter;

fn print_banner() {
    let ver = env!("CARGO_PKG_VERSION");
    println!();
    println!("  Pool Master  v{ver}  ·  position-manager client");
    println!("  {}", "─".repeat(62));
    println!("  Contract  {DEFAULT_CONTRACT}");
    println!("  Network   Arbitrum Sepolia");
    println!("  Signers   admin (positions)  ·  user (swaps, fees)");
    println!();
}

// ─── CLI definition ───────────────────────────────────────────────────────────

/// Pool Master: drive a liquidity position-manager contract over JSON-RPC.
///
/// Every command supports --json for machine-readable output.
/// Settings are read from the environment or a .env file in the working
/// directory; flags override both.
#[derive(Parser)]
#[command(
    name        = "pool-master",
    version     = env!("CARGO_PKG_VERSION"),
    long_version = concat!(
        env!("CARGO_PKG_VERSION"), "\n",
        "Contract:  0x1efc8d699d20c030b393Ffbf406cf2C317383ddf\n",
        "Network:   Arbitrum Sepolia\n",
        "License:   MIT",
    ),
    about   = "Read and manage liquidity positions on a position-manager contract.",
    after_help = "\
ENVIRONMENT:
  ARBITRUM_SEPOLIA_RPC_URL  JSON-RPC endpoint  (required)
  ADMIN_PRIVATE_KEY         Admin signer, used for mint/burn/increase/decrease  (required)
  USER_PRIVATE_KEY          User signer, used for swap/collect  (required)
  POOL_MASTER_CONTRACT      Contract address  [default: 0x1efc8d699d20c030b393Ffbf406cf2C317383ddf]
  RUST_LOG                  Log filter  [default: info]

QUICK START:
  pool-master describe
  pool-master dynamic-info --token-id 2107
  pool-master burn --token-id 2107
  pool-master mint --tick-lower 31920 --tick-upper 39060 --amount0-max 5000000000000000000000 --amount1-max 5000000000000000000000
  pool-master run"
)]
struct Cli {
    /// JSON-RPC endpoint
    #[arg(long, global = true, value_name = "URL", env = config::RPC_URL_VAR)]
    rpc_url: Option<String>,

    /// Admin private key (hex)
    #[arg(long, global = true, value_name = "HEX", env = config::ADMIN_KEY_VAR, hide_env_values = true)]
    admin_key: Option<String>,

    /// User private key (hex)
    #[arg(long, global = true, value_name = "HEX", env = config::USER_KEY_VAR, hide_env_values = true)]
    user_key: Option<String>,

    /// Position-manager contract address
    #[arg(long, global = true, value_name = "ADDRESS", env = config::CONTRACT_VAR)]
    contract: Option<String>,

    /// Receipt polling interval in milliseconds
    #[arg(long, global = true, value_name = "MS", default_value_t = 1_000)]
    poll_interval_ms: u64,

    /// Give up waiting for a receipt after this many seconds (default: wait forever)
    #[arg(long, global = true, value_name = "SECS")]
    receipt_timeout_secs: Option<u64>,

    /// Output machine-readable JSON instead of human-readable text
    #[arg(long, global = true, default_value_t = false)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// [READ] Live price, tick and token amounts of a position
    #[command(
        name = "dynamic-info",
        after_help = "\
EXAMPLES:
  pool-master dynamic-info --token-id 2107
  pool-master dynamic-info --token-id 2107 --json"
    )]
    DynamicInfo {
        /// Position NFT id
        #[arg(long, value_name = "ID", value_parser = parse_amount)]
        token_id: U256,
    },

    /// [WRITE] Swap an exact input amount (user signer)
    #[command(
        after_help = "\
EXAMPLES:
  # Sell 1 token0 (18 decimals) for token1, accept any output
  pool-master swap --amount-in 1000000000000000000 --zero-for-one

  # Sell token1 for token0 with a floor of 950 units out
  pool-master swap --amount-in 1000 --min-amount-out 950

NOTES:
  The function is payable; --value attaches native currency (wei)."
    )]
    Swap {
        /// Exact input amount (atomic units)
        #[arg(long, value_name = "AMOUNT", value_parser = parse_amount)]
        amount_in: U256,

        /// Revert if the output would be below this (atomic units)
        #[arg(long, value_name = "AMOUNT", value_parser = parse_amount, default_value = "0")]
        min_amount_out: U256,

        /// Sell token0 for token1 (default sells token1 for token0)
        #[arg(long, default_value_t = false)]
        zero_for_one: bool,

        /// Native value to attach, in wei
        #[arg(long, value_name = "WEI", value_parser = parse_amount, default_value = "0")]
        value: U256,
    },

    /// [WRITE] Sweep all accrued pool fees (user signer)
    #[command(
        name = "collect-fees",
        after_help = "\
EXAMPLES:
  pool-master collect-fees
  pool-master collect-fees --json"
    )]
    CollectFees,

    /// [ADMIN-WRITE] Open a new position between two ticks
    #[command(
        after_help = "\
EXAMPLES:
  pool-master mint --tick-lower 31920 --tick-upper 39060 \\
                   --amount0-max 5000000000000000000000 --amount1-max 5000000000000000000000

  # Negative ticks are fine
  pool-master mint --tick-lower -600 --tick-upper 600 --amount0-max 1000 --amount1-max 1000

NOTES:
  Ticks must fit in int24. The contract returns the new token id, liquidity
  and the amounts actually deposited."
    )]
    Mint {
        #[arg(long, value_name = "TICK", allow_hyphen_values = true)]
        tick_lower: i32,

        #[arg(long, value_name = "TICK", allow_hyphen_values = true)]
        tick_upper: i32,

        /// Maximum token0 to deposit (atomic units)
        #[arg(long, value_name = "AMOUNT", value_parser = parse_amount)]
        amount0_max: U256,

        /// Maximum token1 to deposit (atomic units)
        #[arg(long, value_name = "AMOUNT", value_parser = parse_amount)]
        amount1_max: U256,
    },

    /// [ADMIN-WRITE] Close a position and burn its NFT
    #[command(
        after_help = "\
EXAMPLES:
  pool-master burn --token-id 2107
  pool-master burn --token-id 2107 --amount0-min 1000 --amount1-min 1000"
    )]
    Burn {
        #[arg(long, value_name = "ID", value_parser = parse_amount)]
        token_id: U256,

        /// Minimum token0 to receive (slippage guard)
        #[arg(long, value_name = "AMOUNT", value_parser = parse_amount, default_value = "0")]
        amount0_min: U256,

        /// Minimum token1 to receive (slippage guard)
        #[arg(long, value_name = "AMOUNT", value_parser = parse_amount, default_value = "0")]
        amount1_min: U256,
    },

    /// [ADMIN-WRITE] Add liquidity to an existing position
    #[command(
        name = "increase-liquidity",
        after_help = "\
EXAMPLES:
  pool-master increase-liquidity --token-id 2107 --amount0-max 1000000 --amount1-max 1000000"
    )]
    IncreaseLiquidity {
        #[arg(long, value_name = "ID", value_parser = parse_amount)]
        token_id: U256,

        /// Maximum token0 to add (uint128)
        #[arg(long, value_name = "AMOUNT", value_parser = parse_u128)]
        amount0_max: u128,

        /// Maximum token1 to add (uint128)
        #[arg(long, value_name = "AMOUNT", value_parser = parse_u128)]
        amount1_max: u128,
    },

    /// [ADMIN-WRITE] Remove liquidity from a position
    #[command(
        name = "decrease-liquidity",
        after_help = "\
EXAMPLES:
  pool-master decrease-liquidity --token-id 2107 --liquidity 500000
  pool-master decrease-liquidity --token-id 2107 --liquidity 500000 --amount0-min 10 --amount1-min 10"
    )]
    DecreaseLiquidity {
        #[arg(long, value_name = "ID", value_parser = parse_amount)]
        token_id: U256,

        /// Liquidity units to remove (uint128)
        #[arg(long, value_name = "UNITS", value_parser = parse_u128)]
        liquidity: u128,

        #[arg(long, value_name = "AMOUNT", value_parser = parse_amount, default_value = "0")]
        amount0_min: U256,

        #[arg(long, value_name = "AMOUNT", value_parser = parse_amount, default_value = "0")]
        amount1_min: U256,
    },

    /// Execute an ordered plan of operations
    ///
    /// Each step completes (writes are confirmed) before the next starts.
    /// A failed step is reported and the run continues, unless the plan
    /// sets halt_on_failure. Exits non-zero if any step failed.
    #[command(
        after_help = "\
EXAMPLES:
  # Built-in rebalance: burn 2107, then mint 31920..39060
  pool-master run

  # Plan file
  pool-master run --plan plans/rebalance.json

PLAN FILE:
  { \"halt_on_failure\": true,
    \"steps\": [ { \"op\": \"burnPosition\", \"token_id\": 2107, \"amount0_min\": 0, \"amount1_min\": 0 } ] }

  Amounts may be integers or decimal / 0x strings."
    )]
    Run {
        /// JSON plan file
        #[arg(long, value_name = "PATH", conflicts_with = "builtin")]
        plan: Option<PathBuf>,

        /// Name of a built-in plan
        #[arg(long, value_name = "NAME", default_value = "rebalance")]
        builtin: String,

        /// Stop at the first failure even if the plan does not ask to
        #[arg(long, default_value_t = false)]
        halt_on_failure: bool,
    },

    /// Print the contract's function table and signer roles (no network)
    Describe,

    /// Check the endpoint and show the configured identities
    Status,
}

// ─── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    // When invoked with no arguments, show banner + full help and exit cleanly.
    if std::env::args().len() == 1 {
        print_banner();
        Cli::command().print_long_help().ok();
        println!();
        return Ok(());
    }

    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Commands::Describe = cli.command {
        return cmd_describe(cli.contract.as_deref(), cli.json);
    }

    let settings = settings(&cli)?;
    tracing::debug!(?settings, "settings resolved");
    let client   = PositionManagerClient::connect(&settings)
        .context("Cannot set up the JSON-RPC connection")?;

    match cli.command {
        Commands::DynamicInfo { token_id } => {
            cmd_dynamic_info(&client, token_id, cli.json).await?;
        }
        Commands::Swap { amount_in, min_amount_out, zero_for_one, value } => {
            let params = SwapParams { amount_in, min_amount_out, zero_for_one, value };
            let out = client.swap_exact_input_single(params).await.context("swap failed")?;
            print_write("swap", "Swap Executed", &out, vec![
                ("amount_in",      amount_in.to_string()),
                ("amount_out",     out.output.to_string()),
                ("zero_for_one",   zero_for_one.to_string()),
            ], cli.json);
        }
        Commands::CollectFees => {
            let out = client.collect_pool_all_fees().await.context("fee collection failed")?;
            print_write("collect-fees", "Fees Collected", &out, Vec::new(), cli.json);
        }
        Commands::Mint { tick_lower, tick_upper, amount0_max, amount1_max } => {
            let params = MintParams { tick_lower, tick_upper, amount0_max, amount1_max };
            let out = client.mint_position(params).await.context("mint failed")?;
            let m   = out.output;
            print_write("mint", "Position Minted", &out, vec![
                ("token_id",   m.token_id.to_string()),
                ("liquidity",  m.liquidity.to_string()),
                ("amount0",    m.amount0.to_string()),
                ("amount1",    m.amount1.to_string()),
                ("tick_range", format!("{tick_lower}..{tick_upper}")),
            ], cli.json);
        }
        Commands::Burn { token_id, amount0_min, amount1_min } => {
            let params = BurnParams { token_id, amount0_min, amount1_min };
            let out = client.burn_position(params).await.context("burn failed")?;
            print_write("burn", "Position Burned", &out, vec![
                ("token_id", token_id.to_string()),
            ], cli.json);
        }
        Commands::IncreaseLiquidity { token_id, amount0_max, amount1_max } => {
            let params = IncreaseLiquidityParams { token_id, amount0_max, amount1_max };
            let out = client.increase_liquidity(params).await.context("increase-liquidity failed")?;
            let r   = out.output;
            print_write("increase-liquidity", "Liquidity Increased", &out, vec![
                ("token_id",  token_id.to_string()),
                ("liquidity", r.liquidity.to_string()),
                ("amount0",   r.amount0.to_string()),
                ("amount1",   r.amount1.to_string()),
            ], cli.json);
        }
        Commands::DecreaseLiquidity { token_id, liquidity, amount0_min, amount1_min } => {
            let params = DecreaseLiquidityParams { token_id, liquidity, amount0_min, amount1_min };
            let out = client.decrease_liquidity(params).await.context("decrease-liquidity failed")?;
            let r   = out.output;
            print_write("decrease-liquidity", "Liquidity Decreased", &out, vec![
                ("token_id", token_id.to_string()),
                ("amount0",  r.amount0.to_string()),
                ("amount1",  r.amount1.to_string()),
            ], cli.json);
        }
        Commands::Run { plan, builtin, halt_on_failure } => {
            cmd_run(&client, plan, &builtin, halt_on_failure, cli.json).await?;
        }
        Commands::Status => {
            cmd_status(&client, &settings, cli.json).await?;
        }
        Commands::Describe => {
            cmd_describe(cli.contract.as_deref(), cli.json)?;
        }
    }

    Ok(())
}

/// Resolve settings from flags (which clap has already merged with the
/// environment).
fn settings(cli: &Cli) -> Result<Settings> {
    let mut settings = Settings::resolve(
        cli.rpc_url.clone(),
        cli.admin_key.clone(),
        cli.user_key.clone(),
    )?
    .with_poll_interval(Duration::from_millis(cli.poll_interval_ms))
    .with_receipt_timeout(cli.receipt_timeout_secs.map(Duration::from_secs));

    if let Some(raw) = cli.contract.as_deref().filter(|s| !s.trim().is_empty()) {
        settings = settings.with_contract(parse_address(config::CONTRACT_VAR, raw)?);
    }
    Ok(settings)
}

/// Accept decimal or `0x`-prefixed hex amounts up to 2^256 - 1.
fn parse_amount(raw: &str) -> std::result::Result<U256, String> {
    raw.trim()
        .replace('_', "")
        .parse::<U256>()
        .map_err(|e| format!("'{raw}' is not a valid amount: {e}"))
}

fn parse_u128(raw: &str) -> std::result::Result<u128, String> {
    let v = parse_amount(raw)?;
    u128::try_from(v).map_err(|_| format!("'{raw}' does not fit in uint128"))
}

fn label(operation: Operation) -> &'static str {
    match policy::required_role(operation) {
        None              => "[READ]",
        Some(Role::User)  => "[WRITE]",
        Some(Role::Admin) => "[ADMIN-WRITE]",
    }
}

// ─── dynamic-info ────────────────────────────────────────────────────────────

async fn cmd_dynamic_info(
    client:      &PositionManagerClient,
    token_id:    U256,
    json_output: bool,
) -> Result<()> {
    let info = client
        .get_dynamic_info(token_id)
        .await
        .with_context(|| format!("Cannot read position {token_id}"))?;

    if json_output {
        println!("{}", json!({
            "status":       "ok",
            "command":      "dynamic-info",
            "token_id":     token_id.to_string(),
            "price":        info.price.to_string(),
            "current_tick": info.current_tick,
            "amount0":      info.amount0.to_string(),
            "amount1":      info.amount1.to_string(),
        }));
    } else {
        println!("─── {} Position {token_id} ───────────────────────────────────────", label(Operation::GetDynamicInfo));
        println!("  Price          {:>40}", info.price);
        println!("  Current tick   {:>40}", info.current_tick);
        println!("  Amount0        {:>40}", info.amount0);
        println!("  Amount1        {:>40}", info.amount1);
    }
    Ok(())
}

// ─── writes ──────────────────────────────────────────────────────────────────

fn print_write<T>(
    command:     &str,
    title:       &str,
    outcome:     &WriteOutcome<T>,
    fields:      Vec<(&str, String)>,
    json_output: bool,
) {
    if json_output {
        let mut body = json!({
            "status":   "ok",
            "command":  command,
            "signer":   outcome.signer.address.to_string(),
            "role":     outcome.signer.role.to_string(),
            "tx":       outcome.tx_hash.to_string(),
            "block":    outcome.receipt.block_number,
            "gas_used": outcome.receipt.gas_used,
        });
        for (key, value) in fields {
            body[key] = json!(value);
        }
        println!("{body}");
    } else {
        println!("─── {} {title} ───────────────────────────────────────", label(outcome.operation));
        for (key, value) in &fields {
            println!("  {:<14} {value}", pretty(key));
        }
        println!();
        println!("  Signer         {}", outcome.signer);
        println!("  Transaction    {}", outcome.tx_hash);
        if let Some(block) = outcome.receipt.block_number {
            println!("  Block          {block}");
        }
        println!("  Gas used       {}", outcome.receipt.gas_used);
    }
}

/// `amount0_max` → `Amount0 max`.
fn pretty(key: &str) -> String {
    let spaced = key.replace('_', " ");
    let mut chars = spaced.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None        => spaced,
    }
}

// ─── run ─────────────────────────────────────────────────────────────────────

async fn cmd_run(
    client:          &PositionManagerClient,
    plan_path:       Option<PathBuf>,
    builtin:         &str,
    halt_on_failure: bool,
    json_output:     bool,
) -> Result<()> {
    let (name, mut plan) = match plan_path {
        Some(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("Cannot read plan file '{}'", path.display()))?;
            let plan = Plan::from_json(&text)
                .with_context(|| format!("Cannot parse plan file '{}'", path.display()))?;
            (path.display().to_string(), plan)
        }
        None => {
            let plan = Plan::builtin(builtin)
                .ok_or_else(|| anyhow!("Unknown built-in plan '{builtin}'. Available: rebalance"))?;
            (builtin.to_string(), plan)
        }
    };
    plan.halt_on_failure |= halt_on_failure;

    let report = plan.run(client).await;
    print_report(&name, &plan, &report, json_output);

    if report.is_success() {
        Ok(())
    } else {
        Err(anyhow!(
            "plan '{name}': {} of {} step(s) failed, {} skipped",
            report.failed(),
            report.steps.len(),
            report.skipped()
        ))
    }
}

fn print_report(name: &str, plan: &Plan, report: &RunReport, json_output: bool) {
    if json_output {
        let steps: Vec<_> = report
            .steps
            .iter()
            .map(|s| match &s.outcome {
                StepOutcome::Succeeded(done) => json!({
                    "step":      s.index + 1,
                    "op":        s.operation.to_string(),
                    "status":    "ok",
                    "tx":        done.tx_hash.map(|h| h.to_string()),
                    "signer":    done.signer.map(|i| i.address.to_string()),
                    "result":    done.summary,
                }),
                StepOutcome::Failed { kind, detail } => json!({
                    "step":   s.index + 1,
                    "op":     s.operation.to_string(),
                    "status": "failed",
                    "kind":   kind.to_string(),
                    "error":  detail,
                }),
                StepOutcome::Skipped => json!({
                    "step":   s.index + 1,
                    "op":     s.operation.to_string(),
                    "status": "skipped",
                }),
            })
            .collect();
        println!("{}", json!({
            "status":    if report.is_success() { "ok" } else { "failed" },
            "command":   "run",
            "plan":      name,
            "halted":    report.halted,
            "succeeded": report.succeeded(),
            "failed":    report.failed(),
            "skipped":   report.skipped(),
            "steps":     steps,
        }));
        return;
    }

    let halt = if plan.halt_on_failure { ", halt on failure" } else { "" };
    println!("─── Plan: {name} ({} step(s){halt}) ───────────────────────────", plan.steps.len());
    for s in &report.steps {
        let op = format!("{} {}", label(s.operation), s.operation);
        match &s.outcome {
            StepOutcome::Succeeded(done) => {
                println!("  {:>2}  {op:<36} ok       {}", s.index + 1, done.summary);
                if let Some(tx) = done.tx_hash {
                    println!("      {:<36}          tx {tx}", "");
                }
            }
            StepOutcome::Failed { kind, detail } => {
                println!("  {:>2}  {op:<36} FAILED   [{kind}] {detail}", s.index + 1);
            }
            StepOutcome::Skipped => {
                println!("  {:>2}  {op:<36} skipped", s.index + 1);
            }
        }
    }
    println!();
    println!(
        "  Summary  {} ok  ·  {} failed  ·  {} skipped",
        report.succeeded(),
        report.failed(),
        report.skipped()
    );
}

// ─── describe ────────────────────────────────────────────────────────────────

fn cmd_describe(contract: Option<&str>, json_output: bool) -> Result<()> {
    let mut descriptor = ContractDescriptor::position_manager()?;
    if let Some(raw) = contract.filter(|s| !s.trim().is_empty()) {
        let address: Address = parse_address(config::CONTRACT_VAR, raw)?;
        descriptor = descriptor.at(address);
    }

    if json_output {
        let functions: Vec<_> = descriptor
            .functions()
            .map(|f| json!({
                "op":         f.operation.to_string(),
                "signature":  f.signature,
                "selector":   f.selector.to_string(),
                "mutability": f.mutability.as_str(),
                "signer":     policy::required_role(f.operation).map(|r| r.to_string()),
            }))
            .collect();
        println!("{}", json!({
            "status":    "ok",
            "command":   "describe",
            "contract":  descriptor.address().to_string(),
            "functions": functions,
        }));
        return Ok(());
    }

    println!("─── Contract {} ───────────────────────", descriptor.address());
    for f in descriptor.functions() {
        let signer = policy::required_role(f.operation)
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:<15} {}  {:<11} {:<6} {}",
            label(f.operation),
            f.selector,
            f.mutability.as_str(),
            signer,
            f.signature
        );
    }
    Ok(())
}

// ─── status ──────────────────────────────────────────────────────────────────

async fn cmd_status(
    client:      &PositionManagerClient,
    settings:    &Settings,
    json_output: bool,
) -> Result<()> {
    let conn     = client.connection();
    let chain_id = conn.chain_id().await.context("Endpoint did not answer eth_chainId")?;
    let block    = conn.block_number().await.context("Endpoint did not answer eth_blockNumber")?;
    let ids      = client.identities();

    if json_output {
        println!("{}", json!({
            "status":   "ok",
            "command":  "status",
            "rpc_url":  settings.rpc_url().as_str(),
            "chain_id": chain_id,
            "block":    block,
            "contract": client.descriptor().address().to_string(),
            "admin":    ids.admin.address.to_string(),
            "user":     ids.user.address.to_string(),
        }));
    } else {
        println!("─── Status ──────────────────────────────────────────────────────");
        println!("  Endpoint   {}", settings.rpc_url());
        println!("  Chain id   {chain_id}");
        println!("  Block      {block}");
        println!("  Contract   {}", client.descriptor().address());
        println!("  Admin      {}", ids.admin.address);
        println!("  User       {}", ids.user.address);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uint128_flags_take_the_same_forms_as_other_amounts() {
        assert_eq!(parse_u128("1_000_000"), Ok(1_000_000));
        assert_eq!(parse_u128("0x3e8"), Ok(1_000));
        assert!(parse_u128(&U256::MAX.to_string()).unwrap_err().contains("uint128"));

        let cli = Cli::try_parse_from([
            "pool-master",
            "decrease-liquidity",
            "--token-id",
            "2107",
            "--liquidity",
            "0x1f4",
        ])
        .unwrap();
        match cli.command {
            Commands::DecreaseLiquidity { liquidity, .. } => assert_eq!(liquidity, 500),
            _ => panic!("parsed the wrong subcommand"),
        }
    }
}
