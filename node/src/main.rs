//! # Covenant Node
//!
//! Entry point for the `covenant-node` binary. Parses CLI arguments,
//! initializes logging, and runs the requested subcommand:
//!
//! - `demo`    — walk an obligation through create, token change and cancel
//!   on an in-process network of Alice, Bob and an FX oracle
//! - `version` — print build version information

mod cli;
mod logging;

use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use covenant_contracts::{Amount, NovationCommand};
use covenant_workflows::{
    CancelObligation, CreateObligation, FixedRateSource, FlowError, MockNetwork, NovateObligation, OracleService,
    ProgressTracker, Role,
};

use cli::{Commands, CovenantNodeCli, DemoArgs};

/// Days until the demo obligation falls due.
const DEMO_TERM_DAYS: i64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = CovenantNodeCli::parse();
    logging::init_logging(&cli.log, cli.log_format).context("failed to initialize logging")?;

    match cli.command {
        Commands::Demo(args) => {
            let report = run_demo(&args).await?;
            print!("{report}");
            Ok(())
        }
        Commands::Version => {
            print_version();
            Ok(())
        }
    }
}

/// Run one obligation through its lifecycle and return a human-readable
/// report of every committed transaction.
async fn run_demo(args: &DemoArgs) -> Result<String> {
    let limit = Duration::from_secs(args.flow_timeout_secs);
    let amount = Amount::of(args.amount, args.token.clone()).context("invalid demo amount")?;

    let source = FixedRateSource::new().with_rate(&args.token, &args.target, args.rate);
    let mut network = MockNetwork::new();
    let alice = network.create_node("Alice").context("failed to start Alice")?;
    let bob = network.create_node("Bob").context("failed to start Bob")?;
    let oracle = network
        .create_oracle("Oracle", OracleService::new(source))
        .context("failed to start the oracle")?;

    tracing::info!(
        amount = %amount,
        target = %args.target,
        rate = %args.rate,
        anonymous = args.anonymous,
        "starting demo"
    );
    let mut report = String::new();

    let create = CreateObligation {
        amount,
        role: Role::Obligor,
        counterparty: bob.party().clone(),
        due_by: Some(chrono::Utc::now() + chrono::Duration::days(DEMO_TERM_DAYS)),
        anonymous: args.anonymous,
    };
    let created = within(limit, "create", create.run(&alice)).await?;
    let obligation = created
        .outputs()
        .into_iter()
        .next()
        .context("create committed no obligation")?
        .state;
    let id = obligation.linear_id;
    report.push_str(&format!(
        "created   {id}  {}  tx {}\n",
        obligation.face_amount,
        created.id()
    ));

    let change = NovationCommand::UpdateFaceAmountToken {
        old_token: args.token.clone(),
        new_token: args.target.clone(),
        oracle: oracle.party().clone(),
        fx_rate: None,
    };
    let mut tracker = ProgressTracker::new("novate");
    let novated = within(
        limit,
        "novate",
        NovateObligation::new(id, change).run_tracked(&alice, &mut tracker),
    )
    .await?;
    let face_amount = novated
        .outputs()
        .into_iter()
        .next()
        .context("novation committed no obligation")?
        .state
        .face_amount;
    let steps: Vec<String> = tracker.history().iter().map(ToString::to_string).collect();
    report.push_str(&format!(
        "novated   {id}  {face_amount}  tx {}  [{}]\n",
        novated.id(),
        steps.join(" > ")
    ));

    let cancelled = within(limit, "cancel", CancelObligation::new(id).run(&bob)).await?;
    report.push_str(&format!("cancelled {id}  tx {}\n", cancelled.id()));

    let live = alice.vault().unconsumed().len() + bob.vault().unconsumed().len();
    report.push_str(&format!(
        "{} transactions committed, {live} obligations live\n",
        network.committed_count()
    ));
    Ok(report)
}

/// Await `flow`, giving up after `limit`.
async fn within<T, F>(limit: Duration, what: &str, flow: F) -> Result<T>
where
    F: Future<Output = Result<T, FlowError>>,
{
    tokio::time::timeout(limit, flow)
        .await
        .with_context(|| format!("{what} timed out after {}s", limit.as_secs()))?
        .with_context(|| format!("{what} failed"))
}

fn print_version() {
    println!("covenant-node {}", env!("CARGO_PKG_VERSION"));
    println!("protocol      {}", covenant_protocol::config::PROTOCOL_VERSION);
}

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_contracts::TokenType;
    use rust_decimal::Decimal;

    fn demo_args() -> DemoArgs {
        DemoArgs {
            amount: 10_000,
            token: TokenType::USD,
            target: TokenType::EUR,
            rate: Decimal::from(2),
            anonymous: false,
            flow_timeout_secs: 30,
        }
    }

    #[tokio::test]
    async fn demo_runs_the_full_lifecycle() {
        let report = run_demo(&demo_args()).await.unwrap();
        assert!(report.contains("10000.00 USD"), "{report}");
        assert!(report.contains("20000.00 EUR"), "{report}");
        assert!(report.contains("3 transactions committed, 0 obligations live"), "{report}");
    }

    #[tokio::test]
    async fn anonymous_demo_runs() {
        let args = DemoArgs {
            anonymous: true,
            ..demo_args()
        };
        let report = run_demo(&args).await.unwrap();
        assert!(report.contains("0 obligations live"), "{report}");
    }

    #[tokio::test]
    async fn zero_amount_fails_at_create() {
        let args = DemoArgs {
            amount: 0,
            ..demo_args()
        };
        let err = run_demo(&args).await.unwrap_err();
        assert!(err.to_string().contains("create failed"), "{err:#}");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_flows_time_out() {
        let never = std::future::pending::<Result<(), FlowError>>();
        let err = within(Duration::from_secs(5), "stalled", never).await.unwrap_err();
        assert!(err.to_string().contains("timed out after 5s"));
    }
}
