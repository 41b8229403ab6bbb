use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use chainwatch_agents::{LlmAnalyst, LlmGate};
use chainwatch_common::{load_watchlist, AppConfig, Company};
use chainwatch_engine::{Command, ConsoleChannel, Monitor, Scheduler};
use chainwatch_sensors::{AlphaVantageSource, GoogleNewsSource, OpenWeatherSource};
use chainwatch_store::EventStore;
use llm_client::{ChatClient, Pacer};

/// Alpha Vantage free tier allows 5 requests per minute.
const MARKET_SPACING: Duration = Duration::from_secs(12);
/// Spacing between chat completions, shared by gate and analyst.
const LLM_SPACING: Duration = Duration::from_millis(2500);

const DEFAULT_INTERVAL_SECS: u64 = 900;
const DEFAULT_WATCHLIST: &str = "watchlist.toml";

/// Workspace crates log under their own targets, so each needs its own
/// directive; a bare `chainwatch=` would match only the binary.
const DEFAULT_LOG_FILTER: &str = "chainwatch=info,chainwatch_engine=info,\
    chainwatch_store=info,chainwatch_sensors=info,chainwatch_agents=info,\
    chainwatch_graph=info,chainwatch_common=info,llm_client=info";

struct CliArgs {
    companies: Vec<String>,
    watchlist: PathBuf,
    interval: Duration,
    once: bool,
}

fn parse_args() -> Result<CliArgs> {
    let mut companies = Vec::new();
    let mut watchlist = PathBuf::from(DEFAULT_WATCHLIST);
    let mut interval = Duration::from_secs(DEFAULT_INTERVAL_SECS);
    let mut once = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--once" => once = true,
            "--interval" => {
                let secs: u64 = args
                    .next()
                    .context("--interval needs a value in seconds")?
                    .parse()
                    .context("--interval must be a whole number of seconds")?;
                if secs == 0 {
                    bail!("--interval must be positive");
                }
                interval = Duration::from_secs(secs);
            }
            "--watchlist" => {
                watchlist = PathBuf::from(args.next().context("--watchlist needs a path")?);
            }
            other if other.starts_with("--") => bail!("Unknown flag: {other}"),
            other => companies.push(other.to_string()),
        }
    }

    Ok(CliArgs {
        companies,
        watchlist,
        interval,
        once,
    })
}

/// Resolve the companies to monitor. A missing watchlist file is fatal
/// unless every company was named on the command line.
fn resolve_companies(args: &CliArgs) -> Result<Vec<Company>> {
    if args.watchlist.exists() {
        let watchlist = load_watchlist(&args.watchlist)?;
        return Ok(watchlist.select(&args.companies));
    }
    if args.companies.is_empty() {
        bail!(
            "Watchlist file '{}' not found and no companies given on the command line",
            args.watchlist.display()
        );
    }
    warn!(
        path = %args.watchlist.display(),
        "watchlist file not found, monitoring ad-hoc companies without topology"
    );
    Ok(args.companies.iter().map(|n| Company::ad_hoc(n)).collect())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    info!("Chainwatch supply-chain monitor starting...");

    let args = parse_args()?;
    let config = AppConfig::from_env()?;
    let companies = resolve_companies(&args)?;
    let company_names: Vec<String> = companies.iter().map(|c| c.name.clone()).collect();
    info!(companies = companies.len(), "monitoring set resolved");

    let store = Arc::new(EventStore::connect(&config.database_url).await?);

    let chat_client = match (&config.llm_api_key, config.offline) {
        (Some(key), false) => {
            let client = ChatClient::new(key, Pacer::new(LLM_SPACING));
            Some(Arc::new(match &config.llm_base_url {
                Some(url) => client.with_base_url(url),
                None => client,
            }))
        }
        _ => {
            warn!("no LLM key or offline mode, gate and analyst run offline");
            None
        }
    };

    let monitor = Monitor::new(
        Box::new(GoogleNewsSource::new(config.offline)),
        Box::new(AlphaVantageSource::new(
            config.alpha_vantage_key.clone(),
            Pacer::new(MARKET_SPACING),
            config.offline,
        )),
        Box::new(OpenWeatherSource::new(
            config.openweather_key.clone(),
            config.offline,
        )),
        Box::new(LlmGate::new(chat_client.clone())),
        Box::new(LlmAnalyst::new(chat_client)),
        store,
        vec![Box::new(ConsoleChannel)],
        companies,
    );

    if args.once {
        let stats = monitor.run_once().await?;
        println!("{stats}");
        return Ok(());
    }

    let (tx, rx) = mpsc::channel(8);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            let _ = tx.send(Command::Stop).await;
        }
    });

    let scheduler = Scheduler::new(
        args.interval,
        config.status_file.clone().map(PathBuf::from),
        company_names,
    );
    scheduler.run(&monitor, rx).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_log_filter_covers_every_workspace_crate() {
        for target in [
            "chainwatch_engine",
            "chainwatch_store",
            "chainwatch_sensors",
            "chainwatch_agents",
            "chainwatch_graph",
            "chainwatch_common",
            "llm_client",
        ] {
            assert!(
                DEFAULT_LOG_FILTER.contains(target),
                "missing directive for {target}"
            );
        }
        assert!(EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }
}
