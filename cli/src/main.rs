//! ballotindex CLI: run the election indexer and query what it built.
//!
//! Usage:
//! ```bash
//! ballotindex run
//! ballotindex status
//! ballotindex reset EventVoteCast
//! ballotindex results <election-id>
//! ```
//!
//! Configuration comes from the environment (`DATABASE_URL`, `PACKAGE_ID`,
//! `SUI_NETWORK`, …); see `ballotindex help`.

mod logging;

use std::env;
use std::process;
use std::sync::Arc;

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, info, warn};

use ballotindex_core::event::EventKind;
use ballotindex_core::indexer::IndexerConfig;
use ballotindex_core::poller::Indexer;
use ballotindex_core::query::ElectionQueries;
use ballotindex_core::registry::TrackerRegistry;
use ballotindex_storage::Stores;
use ballotindex_sui::{SuiClientConfig, SuiRpcClient};

use logging::{init_tracing, LogConfig};

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Run,
    Status,
    Reset(String),
    Elections,
    Election(String),
    Candidates(String),
    Voters(String),
    Votes(String),
    Results(String),
    Health,
    Version,
    Help,
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    let Some(cmd) = args.get(1) else {
        return Err("missing command".into());
    };
    let arg = |name: &str| {
        args.get(2)
            .cloned()
            .ok_or_else(|| format!("`{cmd}` requires <{name}>"))
    };

    Ok(match cmd.as_str() {
        "run" => Command::Run,
        "status" => Command::Status,
        "reset" => Command::Reset(arg("tracker")?),
        "elections" => Command::Elections,
        "election" => Command::Election(arg("election-id")?),
        "candidates" => Command::Candidates(arg("election-id")?),
        "voters" => Command::Voters(arg("election-id")?),
        "votes" => Command::Votes(arg("election-id")?),
        "results" => Command::Results(arg("election-id")?),
        "health" => Command::Health,
        "version" | "--version" | "-V" => Command::Version,
        "help" | "--help" | "-h" => Command::Help,
        other => return Err(format!("Unknown command: {other}")),
    })
}

#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().collect();
    let command = match parse_args(&args) {
        Ok(command) => command,
        Err(msg) => {
            eprintln!("{msg}");
            print_usage();
            process::exit(1);
        }
    };

    match command {
        Command::Version => {
            println!("ballotindex {}", env!("CARGO_PKG_VERSION"));
            return;
        }
        Command::Help => {
            print_usage();
            return;
        }
        _ => {}
    }

    init_tracing(&LogConfig::from_env());

    if let Err(e) = dispatch(command).await {
        eprintln!("error: {e:#}");
        process::exit(1);
    }
}

async fn dispatch(command: Command) -> anyhow::Result<()> {
    match command {
        Command::Run => cmd_run().await,
        Command::Status => cmd_status().await,
        Command::Reset(tracker) => cmd_reset(&tracker).await,
        Command::Health => cmd_health().await,
        query => cmd_query(query).await,
    }
}

fn print_usage() {
    println!("ballotindex {}", env!("CARGO_PKG_VERSION"));
    println!("Event indexer for on-chain elections on Sui\n");
    println!("USAGE:");
    println!("    ballotindex <COMMAND> [ARG]\n");
    println!("COMMANDS:");
    println!("    run                   Start all trackers until Ctrl-C or SIGTERM");
    println!("    status                Show each tracker's saved cursor");
    println!("    reset <tracker>       Forget a tracker's cursor (e.g. EventVoteCast, or `all`)");
    println!("    elections             List elections with counts");
    println!("    election <id>         Show one election");
    println!("    candidates <id>       Candidates with vote counts");
    println!("    voters <id>           Voters and whether they voted");
    println!("    votes <id>            Votes, newest first");
    println!("    results <id>          Tally with percentages");
    println!("    health                Check the store connection");
    println!("    version               Print version");
    println!("    help                  Print this help\n");
    println!("ENVIRONMENT:");
    println!("    DATABASE_URL          sqlite:<path> | postgres://… | memory: (required)");
    println!("    PACKAGE_ID            Package emitting the events (required for `run`)");
    println!("    MODULE_NAME           Module name [default: vote]");
    println!("    SUI_NETWORK           mainnet | testnet | devnet | localnet [default: testnet]");
    println!("    SUI_RPC_URL           Full-node URL [default: public node of SUI_NETWORK]");
    println!("    POLLING_INTERVAL_MS   Delay once caught up [default: 5000]");
    println!("    PAGE_SIZE             Events per query, 1-50 [default: 50]");
    println!("    LOG_LEVEL / LOG_JSON  Logging [default: info / false]");
    println!("    LOG_COMPONENTS        Per-target levels, e.g. sqlx=debug [default: sqlx=warn]");
}

async fn open_stores() -> anyhow::Result<Stores> {
    let url = env::var("DATABASE_URL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .context("missing required environment variable: DATABASE_URL")?;
    Ok(ballotindex_storage::connect(&url).await?)
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ─── run ─────────────────────────────────────────────────────────────────────

async fn cmd_run() -> anyhow::Result<()> {
    let config = IndexerConfig::from_env()?;
    info!(
        network = %config.network,
        rpc_url = %config.rpc_url,
        package = %config.package_id,
        module = %config.module_name,
        "configuration loaded"
    );

    let stores = ballotindex_storage::connect(&config.database_url).await?;
    stores
        .elections
        .health_check()
        .await
        .context("store is not reachable")?;

    let client = SuiRpcClient::new(config.rpc_url.clone(), SuiClientConfig::default())?;
    match client.chain_identifier().await {
        Ok(chain) => info!(chain = %chain, "full node reachable"),
        Err(e) => warn!(error = %e, "full node not reachable yet, trackers will retry"),
    }

    let registry = TrackerRegistry::election(
        &config.package_id,
        &config.module_name,
        stores.elections.clone(),
    );
    let handle = Indexer::new(config, Arc::new(client), stores.cursors.clone(), registry)
        .spawn()
        .await?;
    info!(trackers = ?handle.tracker_ids(), "all trackers started, press Ctrl-C to stop");

    let signal = shutdown_signal().await;
    info!(signal, "shutdown requested, finishing in-flight pages");
    handle.shutdown().await;
    Ok(())
}

/// Resolves on Ctrl-C, or on SIGTERM where the platform has it.
#[cfg(unix)]
async fn shutdown_signal() -> &'static str {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(stream) => stream,
        Err(e) => {
            warn!(error = %e, "cannot listen for SIGTERM, only Ctrl-C will stop the indexer");
            return ctrl_c().await;
        }
    };
    tokio::select! {
        name = ctrl_c() => name,
        _ = terminate.recv() => "SIGTERM",
    }
}

#[cfg(not(unix))]
async fn shutdown_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        // Without a handler the process can only be killed; wait forever
        error!(error = %e, "failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    "Ctrl-C"
}

// ─── status / reset ──────────────────────────────────────────────────────────

async fn cmd_status() -> anyhow::Result<()> {
    let stores = open_stores().await?;
    let saved = stores.cursors.list().await?;

    println!("{:<26} {:<46} {:>5}  UPDATED", "TRACKER", "TX DIGEST", "SEQ");
    for kind in EventKind::ALL {
        match saved.iter().find(|cp| cp.tracker_id == kind.event_name()) {
            Some(cp) => {
                let updated = DateTime::<Utc>::from_timestamp(cp.updated_at, 0)
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| cp.updated_at.to_string());
                println!(
                    "{:<26} {:<46} {:>5}  {updated}",
                    cp.tracker_id, cp.cursor.tx_digest, cp.cursor.event_seq
                );
            }
            None => println!("{:<26} (not started)", kind.event_name()),
        }
    }
    Ok(())
}

async fn cmd_reset(tracker: &str) -> anyhow::Result<()> {
    let targets: Vec<EventKind> = if tracker == "all" {
        EventKind::ALL.to_vec()
    } else {
        match EventKind::from_event_name(tracker) {
            Some(kind) => vec![kind],
            None => {
                let known: Vec<_> = EventKind::ALL.iter().map(|k| k.event_name()).collect();
                bail!("unknown tracker '{tracker}' (expected one of: {}, all)", known.join(", "));
            }
        }
    };

    let stores = open_stores().await?;
    for kind in targets {
        stores.cursors.delete(kind.event_name()).await?;
        info!(
            tracker = kind.event_name(),
            "cursor reset, tracker will re-index from the beginning"
        );
        println!("reset {}", kind.event_name());
    }
    Ok(())
}

// ─── queries ─────────────────────────────────────────────────────────────────

async fn cmd_health() -> anyhow::Result<()> {
    let stores = open_stores().await?;
    let report = ElectionQueries::new(stores.elections).health().await;
    print_json(&report)?;
    if !report.is_healthy() {
        bail!("store is unhealthy");
    }
    Ok(())
}

async fn cmd_query(command: Command) -> anyhow::Result<()> {
    let stores = open_stores().await?;
    let queries = ElectionQueries::new(stores.elections);

    match command {
        Command::Elections => print_json(&queries.list_elections().await?),
        Command::Election(id) => match queries.election(&id).await? {
            Some(detail) => print_json(&detail),
            None => bail!("Election not found"),
        },
        Command::Candidates(id) => print_json(&queries.candidates(&id).await?),
        Command::Voters(id) => print_json(&queries.voters(&id).await?),
        Command::Votes(id) => print_json(&queries.votes(&id).await?),
        Command::Results(id) => print_json(&queries.results(&id).await?),
        other => bail!("not a query command: {other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        std::iter::once("ballotindex")
            .chain(list.iter().copied())
            .map(String::from)
            .collect()
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_args(&args(&["run"])), Ok(Command::Run));
        assert_eq!(
            parse_args(&args(&["results", "0xe1"])),
            Ok(Command::Results("0xe1".into()))
        );
        assert_eq!(
            parse_args(&args(&["reset", "EventVoteCast"])),
            Ok(Command::Reset("EventVoteCast".into()))
        );
        assert_eq!(parse_args(&args(&["-V"])), Ok(Command::Version));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn sigterm_requests_shutdown() {
        let waiting = tokio::spawn(shutdown_signal());
        // Let the task install its handler before the signal arrives
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        let status = std::process::Command::new("kill")
            .args(["-TERM", &process::id().to_string()])
            .status()
            .unwrap();
        assert!(status.success());

        let signal = tokio::time::timeout(std::time::Duration::from_secs(5), waiting)
            .await
            .expect("SIGTERM should resolve the shutdown signal")
            .unwrap();
        assert_eq!(signal, "SIGTERM");
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(&args(&[])).is_err());
        assert!(parse_args(&args(&["votes"])).unwrap_err().contains("election-id"));
        assert!(parse_args(&args(&["serve"])).unwrap_err().contains("Unknown command"));
    }
}
