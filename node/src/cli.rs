//! # CLI Interface
//!
//! Command-line arguments for `covenant-node`, via `clap` derive. Every
//! runtime setting has an environment fallback.

use clap::{Args, Parser, Subcommand};
use covenant_contracts::TokenType;
use rust_decimal::Decimal;

use crate::logging::LogFormat;

/// Covenant obligation node.
///
/// Runs the obligation flows (create, novate, cancel) between parties on
/// an in-process network, with an FX rate oracle co-signing token changes.
#[derive(Parser, Debug)]
#[command(
    name = "covenant-node",
    about = "Covenant obligation node",
    version,
    propagate_version = true
)]
pub struct CovenantNodeCli {
    /// Default log filter. `RUST_LOG` takes precedence when set.
    #[arg(long, global = true, env = "COVENANT_LOG", default_value = "covenant_node=info,covenant_workflows=info")]
    pub log: String,

    /// Log output format.
    #[arg(long, global = true, env = "COVENANT_LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run Alice, Bob and an FX oracle through an obligation lifecycle:
    /// create, change the face token, cancel.
    Demo(DemoArgs),
    /// Print version information and exit.
    Version,
}

#[derive(Args, Debug, Clone)]
pub struct DemoArgs {
    /// Face amount, in whole units of `--token`.
    #[arg(long, env = "COVENANT_DEMO_AMOUNT", default_value_t = 10_000)]
    pub amount: u64,

    /// Token the obligation is created in.
    #[arg(long, env = "COVENANT_DEMO_TOKEN", value_parser = parse_token, default_value = "USD")]
    pub token: TokenType,

    /// Token the obligation is novated into.
    #[arg(long, env = "COVENANT_DEMO_TARGET", value_parser = parse_token, default_value = "EUR")]
    pub target: TokenType,

    /// Rate the oracle quotes for `token` → `target`.
    #[arg(long, env = "COVENANT_DEMO_RATE", default_value = "0.92")]
    pub rate: Decimal,

    /// Hide both parties behind fresh pseudonyms.
    #[arg(long, env = "COVENANT_DEMO_ANONYMOUS")]
    pub anonymous: bool,

    /// Per-flow timeout, in seconds.
    #[arg(long, env = "COVENANT_FLOW_TIMEOUT_SECS", default_value_t = 60)]
    pub flow_timeout_secs: u64,
}

/// Accepts the codes of the built-in fiat tokens, case-insensitively.
pub fn parse_token(code: &str) -> Result<TokenType, String> {
    let token = match code.to_ascii_uppercase().as_str() {
        "GBP" => TokenType::GBP,
        "USD" => TokenType::USD,
        "EUR" => TokenType::EUR,
        "JPY" => TokenType::JPY,
        "XRP" => TokenType::XRP,
        other => return Err(format!("unknown token '{other}' (expected GBP, USD, EUR, JPY or XRP)")),
    };
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli_structure() {
        CovenantNodeCli::command().debug_assert();
    }

    #[test]
    fn demo_defaults() {
        let cli = CovenantNodeCli::try_parse_from(["covenant-node", "demo"]).unwrap();
        let Commands::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        assert_eq!(args.token, TokenType::USD);
        assert_eq!(args.target, TokenType::EUR);
        assert_eq!(args.amount, 10_000);
        assert!(!args.anonymous);
    }

    #[test]
    fn demo_flags_override_defaults() {
        let cli = CovenantNodeCli::try_parse_from([
            "covenant-node",
            "--log-format",
            "json",
            "demo",
            "--token",
            "gbp",
            "--rate",
            "1.25",
            "--anonymous",
        ])
        .unwrap();
        assert_eq!(cli.log_format, LogFormat::Json);
        let Commands::Demo(args) = cli.command else {
            panic!("expected demo");
        };
        assert_eq!(args.token, TokenType::GBP);
        assert_eq!(args.rate, Decimal::new(125, 2));
        assert!(args.anonymous);
    }

    #[test]
    fn unknown_token_is_rejected() {
        assert!(parse_token("DOGE").is_err());
        assert!(CovenantNodeCli::try_parse_from(["covenant-node", "demo", "--token", "DOGE"]).is_err());
    }
}
