//! phishsentry: IMAP phishing-detection engine
//!
//! Runs one IMAP account's mailbox through a fixed-order heuristic check
//! pipeline, either continuously via IDLE (`monitor`) or over a bounded
//! range of existing messages (`scan`).
//!
//! # Architecture
//!
//! - [`main`]: CLI entry point, env loading, subcommand dispatch
//! - [`config`]: environment-driven account/engine configuration
//! - [`errors`]: application error model
//! - [`db`]: embedded SQLite connection, schema, migrations
//! - [`store`]: verdict, domain-list, and campaign persistence
//! - [`email`]/[`domain`]/[`mime`]/[`raw_headers`]: message normalization
//! - [`checks`]/[`analyzer`]: the phishing-detection pipeline
//! - [`blacklist_updater`]/[`campaign_updater`]: scheduled external feeds
//! - [`imap_ops`]/[`monitor`]/[`scan`]: IMAP transport, IDLE loop, bulk scan

mod analyzer;
mod blacklist_updater;
mod campaign_updater;
mod checks;
mod config;
mod db;
mod domain;
mod email;
mod errors;
mod imap_ops;
mod mime;
mod models;
mod monitor;
mod raw_headers;
mod safeonweb;
mod scan;
mod store;

use std::sync::Arc;

use clap::{Parser, Subcommand};
use secrecy::SecretString;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{AccountConfig, AuthMethod, Credential, EngineConfig};
use errors::{AppError, AppResult};
use store::{AllowlistStore, BlacklistStore, SafeonwebCampaignStore, TrustedLinkDomainStore, VerdictStore};

#[derive(Parser)]
#[command(name = "phishsentry", about = "IMAP phishing-detection engine")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Connect, IDLE on INBOX, and analyze each new message as it arrives.
    Monitor,
    /// Analyze the last `--count` messages in INBOX (0 = every message).
    Scan {
        #[arg(long, default_value_t = 50)]
        count: u32,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let account = AccountConfig::load_from_env()?;
    let engine = EngineConfig::load_from_env()?;
    let credential = load_credential(&account)?;

    let conn = Arc::new(tokio::sync::Mutex::new(db::open(
        engine.database_path.to_string_lossy().as_ref(),
    )?));

    let allowlist = AllowlistStore::new(conn.clone());
    let blacklist = BlacklistStore::new(conn.clone());
    let trusted_link_domains = TrustedLinkDomainStore::new(conn.clone());
    let campaigns = SafeonwebCampaignStore::new(conn.clone(), engine.campaign_retention_days);
    let verdict_store = VerdictStore::new(conn.clone());

    refresh_feeds_if_due(&blacklist, &campaigns, &engine).await;

    let analyzer = Arc::new(analyzer::PhishingAnalyzer::new(
        allowlist,
        blacklist,
        trusted_link_domains,
        Some(campaigns),
    ));

    match cli.command {
        Command::Monitor => run_monitor(account, credential, analyzer, verdict_store, &engine).await,
        Command::Scan { count } => run_scan(&account, &credential, count, &engine, &analyzer, &verdict_store).await,
    }
}

/// Load the IMAP credential matching `account.auth_method` from the
/// environment: `PHISHSENTRY_IMAP_PASSWORD` for [`AuthMethod::Password`],
/// `PHISHSENTRY_OAUTH_ACCESS_TOKEN` for [`AuthMethod::OAuth2`].
fn load_credential(account: &AccountConfig) -> AppResult<Credential> {
    match account.auth_method {
        AuthMethod::Password => {
            let password = std::env::var("PHISHSENTRY_IMAP_PASSWORD").map_err(|_| {
                AppError::Validation("missing required environment variable PHISHSENTRY_IMAP_PASSWORD".to_owned())
            })?;
            Ok(Credential::Password(SecretString::from(password)))
        }
        AuthMethod::OAuth2 => {
            let token = std::env::var("PHISHSENTRY_OAUTH_ACCESS_TOKEN").map_err(|_| {
                AppError::Validation(
                    "missing required environment variable PHISHSENTRY_OAUTH_ACCESS_TOKEN".to_owned(),
                )
            })?;
            Ok(Credential::OAuth2 {
                email: account.username.clone(),
                access_token: SecretString::from(token),
            })
        }
    }
}

/// Refresh the blacklist and Safeonweb campaign feeds if their configured
/// URLs are set and a refresh is due. Feed URLs are optional: an engine
/// with neither configured runs purely on manually-managed lists.
async fn refresh_feeds_if_due(blacklist: &BlacklistStore, campaigns: &SafeonwebCampaignStore, engine: &EngineConfig) {
    if let Ok(url) = std::env::var("PHISHSENTRY_BLACKLIST_FEED_URL") {
        let updater = blacklist_updater::BlacklistUpdater::new(blacklist.clone(), engine.blacklist_refresh_interval_hours);
        match updater.needs_refresh().await {
            Ok(true) => match updater.refresh(&url).await {
                Ok(n) => info!(domains = n, "blacklist refreshed"),
                Err(e) => warn!(error = %e, "blacklist refresh failed"),
            },
            Ok(false) => {}
            Err(e) => warn!(error = %e, "could not check blacklist refresh state"),
        }
    }

    if let Ok(url) = std::env::var("PHISHSENTRY_CAMPAIGN_FEED_URL") {
        let updater = campaign_updater::CampaignUpdater::new(campaigns.clone());
        match updater.refresh(&url).await {
            Ok(n) => info!(brands = n, "safeonweb campaigns refreshed"),
            Err(e) => warn!(error = %e, "safeonweb campaign refresh failed"),
        }
    }
}

async fn run_monitor(
    account: AccountConfig,
    credential: Credential,
    analyzer: Arc<analyzer::PhishingAnalyzer>,
    verdict_store: VerdictStore,
    engine: &EngineConfig,
) -> Result<(), Box<dyn std::error::Error>> {
    let idle_interval = std::time::Duration::from_secs(engine.idle_interval_seconds);
    let (mut monitor, mut events) = monitor::Monitor::start(account, credential, analyzer, verdict_store, idle_interval).await?;
    info!("monitoring INBOX");

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("shutting down");
                monitor.stop().await;
                return Ok(());
            }
            event = events.recv() => {
                match event {
                    Some(monitor::MonitorEvent::Verdict(verdict)) => {
                        info!(
                            message_id = %verdict.message_id,
                            score = verdict.score,
                            threat_level = ?verdict.threat_level(),
                            "analyzed new message"
                        );
                    }
                    Some(monitor::MonitorEvent::Connected) => info!("connected"),
                    Some(monitor::MonitorEvent::Disconnected) => {
                        info!("disconnected");
                        return Ok(());
                    }
                    Some(monitor::MonitorEvent::Error(e)) => {
                        warn!(error = %e, "monitor error");
                        return Ok(());
                    }
                    None => return Ok(()),
                }
            }
        }
    }
}

async fn run_scan(
    account: &AccountConfig,
    credential: &Credential,
    count: u32,
    engine: &EngineConfig,
    analyzer: &analyzer::PhishingAnalyzer,
    verdict_store: &VerdictStore,
) -> Result<(), Box<dyn std::error::Error>> {
    let report = scan::benchmark_scan(account, credential, count, engine.scan_worker_count, analyzer, verdict_store).await?;
    info!(
        emails = report.email_count,
        skipped_parts = report.skipped_parts,
        phase0_setup_secs = report.phase0_setup_secs,
        phase1_bulk_fetch_secs = report.phase1_bulk_fetch_secs,
        phase_workers_setup_secs = report.phase_workers_setup_secs,
        phase2_body_fetch_secs = report.phase2_body_fetch_secs,
        phase3_headers_fallback_secs = report.phase3_headers_fallback_secs,
        phase4_analysis_secs = report.phase4_analysis_secs,
        phase5_persist_secs = report.phase5_persist_secs,
        phase6_cleanup_secs = report.phase6_cleanup_secs,
        "scan complete"
    );
    Ok(())
}
