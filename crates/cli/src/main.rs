use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;
use url::Url;

use tally_common::types::{PriceTimestamp, RawBalances, Valuation};
use tally_common::Chain;
use tally_core::report::format_usd;
use tally_core::{ValuateOptions, Valuator};
use tally_mod_coingecko::{CoinGeckoClient, CoinGeckoTier};
use tally_mod_multicall::{MulticallClient, ProviderRegistry};

#[derive(Parser)]
#[command(name = "tally", about = "Value a multi-chain token portfolio in USD", version)]
struct Cli {
    /// JSON file holding the balances (map or list form)
    input: PathBuf,

    /// Unix timestamp to price at, or "now"
    #[arg(long, default_value = "now", conflicts_with = "date")]
    timestamp: String,

    /// Date to price at (YYYY-MM-DD, midnight UTC)
    #[arg(long)]
    date: Option<String>,

    /// Print the per-symbol breakdown before the result
    #[arg(short, long)]
    verbose: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    output: Output,

    /// Override a chain's RPC endpoint (CHAIN=URL, repeatable)
    #[arg(long = "rpc", value_name = "CHAIN=URL")]
    rpc: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Output {
    Table,
    Json,
    JsonPretty,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let raw = std::fs::read_to_string(&cli.input)
        .with_context(|| format!("reading {}", cli.input.display()))?;
    let balances: RawBalances = serde_json::from_str(&raw)
        .with_context(|| format!("parsing {}", cli.input.display()))?;

    let timestamp = resolve_timestamp(&cli.timestamp, cli.date.as_deref())?;

    let providers = Arc::new(ProviderRegistry::new());
    for spec in &cli.rpc {
        apply_rpc_override(&providers, spec)?;
    }

    let api_key = std::env::var("COINGECKO_API_KEY").ok();
    let tier = if std::env::var("COINGECKO_PRO").is_ok() {
        CoinGeckoTier::Pro
    } else {
        CoinGeckoTier::Demo
    };

    let valuator = Valuator::new(
        Arc::new(MulticallClient::new(providers)),
        Arc::new(CoinGeckoClient::new(api_key, tier)),
    );

    let opts = ValuateOptions {
        timestamp,
        verbose: cli.verbose,
        known_prices: HashMap::new(),
    };
    let valuation = valuator.valuate(balances, &opts).await;

    match cli.output {
        Output::Table => print_table(&valuation),
        Output::Json => println!("{}", serde_json::to_string(&valuation)?),
        Output::JsonPretty => println!("{}", serde_json::to_string_pretty(&valuation)?),
    }

    Ok(())
}

fn resolve_timestamp(timestamp: &str, date: Option<&str>) -> Result<PriceTimestamp> {
    if let Some(date) = date {
        let day = chrono::NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .with_context(|| format!("invalid date '{date}', expected YYYY-MM-DD"))?;
        let ts = day
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("invalid date '{date}'"))?
            .and_utc()
            .timestamp();
        let ts = u64::try_from(ts)
            .map_err(|_| anyhow!("date '{date}' is before 1970, no prices exist for it"))?;
        return Ok(PriceTimestamp::At(ts));
    }
    if timestamp.eq_ignore_ascii_case("now") {
        return Ok(PriceTimestamp::Now);
    }
    let ts: u64 = timestamp
        .parse()
        .with_context(|| format!("invalid timestamp '{timestamp}', expected unix seconds or 'now'"))?;
    Ok(PriceTimestamp::At(ts))
}

fn apply_rpc_override(providers: &ProviderRegistry, spec: &str) -> Result<()> {
    let (name, url) = spec
        .split_once('=')
        .ok_or_else(|| anyhow!("invalid --rpc '{spec}', expected CHAIN=URL"))?;
    let chain: Chain = name.parse().map_err(|e| anyhow!("{e}"))?;
    let url: Url = url
        .parse()
        .with_context(|| format!("invalid RPC URL in '{spec}'"))?;
    providers.set(chain, url);
    Ok(())
}

fn print_table(valuation: &Valuation) {
    let mut rows: Vec<(&String, &f64)> = valuation.usd_token_balances.iter().collect();
    rows.sort_by(|a, b| b.1.total_cmp(a.1));

    for (symbol, usd) in rows {
        println!("{symbol:<25} {}", format_usd(*usd));
    }
    println!("{:<25} {}", "TOTAL", format_usd(valuation.usd_tvl));
}
