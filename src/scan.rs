//! Scan/benchmark subsystem — bulk mailbox analysis on a dedicated
//! connection, undisturbed by the IDLE monitor (spec §4.J)

use std::time::{Duration, Instant};

use async_imap::types::Fetch;
use tokio::task::JoinSet;
use tracing::warn;

use crate::analyzer::PhishingAnalyzer;
use crate::config::{AccountConfig, Credential};
use crate::email::ParsedEmail;
use crate::errors::AppResult;
use crate::imap_ops::{self, ImapSession};
use crate::models::Verdict;
use crate::raw_headers;
use crate::store::VerdictStore;

/// Per-phase timings and counters for one `benchmark_scan` run.
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    pub email_count: usize,
    pub skipped_parts: usize,
    pub phase0_setup_secs: f64,
    pub phase1_bulk_fetch_secs: f64,
    pub phase_workers_setup_secs: f64,
    pub phase2_body_fetch_secs: f64,
    pub phase3_headers_fallback_secs: f64,
    pub phase4_analysis_secs: f64,
    pub phase5_persist_secs: f64,
    pub phase6_cleanup_secs: f64,
}

/// Scan the last `count` messages in `INBOX` (or all of them if `count`
/// is 0), analyze each, and persist its verdict.
pub async fn benchmark_scan(
    account: &AccountConfig,
    credential: &Credential,
    count: u32,
    worker_count: usize,
    analyzer: &PhishingAnalyzer,
    verdict_store: &VerdictStore,
) -> AppResult<ScanReport> {
    let mut report = ScanReport::default();

    // Phase 0 — open, select, determine range.
    let phase0_start = Instant::now();
    let mut scan_session = imap_ops::connect_authenticated(account, credential).await?;
    let mailbox = imap_ops::select_inbox_readonly(&mut scan_session).await?;
    report.phase0_setup_secs = phase0_start.elapsed().as_secs_f64();

    let total = mailbox.exists;
    if total == 0 {
        let _ = imap_ops::logout(&mut scan_session).await;
        return Ok(report);
    }

    let start_seq = if count > 0 { total.saturating_sub(count - 1).max(1) } else { 1 };
    let seq_range = format!("{start_seq}:{total}");

    // Phase 1 — bulk fetch info.
    let phase1_start = Instant::now();
    let bulk: Vec<Fetch> = imap_ops::fetch_bulk_info(&mut scan_session, &seq_range).await?;
    report.phase1_bulk_fetch_secs = phase1_start.elapsed().as_secs_f64();

    // Phase Workers — up to `worker_count` additional connections.
    let phase_workers_start = Instant::now();
    let mut workers: Vec<ImapSession> = Vec::new();
    for _ in 0..worker_count {
        match connect_worker(account, credential).await {
            Ok(session) => workers.push(session),
            Err(e) => warn!(error = %e, "scan worker failed to connect, skipping"),
        }
    }
    report.phase_workers_setup_secs = phase_workers_start.elapsed().as_secs_f64();

    let uids: Vec<Option<u32>> = bulk.iter().map(|f| f.uid).collect();

    // Phase 2 — sharded raw-message fetch across workers, falling back to
    // the scan connection alone if every worker failed to connect.
    let phase2_start = Instant::now();
    let raw_bodies: Vec<Option<Vec<u8>>> = if workers.is_empty() {
        let mut out = Vec::with_capacity(uids.len());
        for uid in &uids {
            out.push(match uid {
                Some(uid) => imap_ops::fetch_raw_message(&mut scan_session, *uid).await.ok(),
                None => None,
            });
        }
        out
    } else {
        fetch_sharded(workers, &uids).await
    };
    report.phase2_body_fetch_secs = phase2_start.elapsed().as_secs_f64();

    // Phase 3 — headers fallback + ParsedEmail construction.
    let phase3_start = Instant::now();
    let mut emails: Vec<(u32, ParsedEmail)> = Vec::with_capacity(bulk.len());
    for ((info, raw), uid) in bulk.iter().zip(raw_bodies.iter()).zip(uids.iter()) {
        let (Some(raw), Some(uid)) = (raw, uid) else { continue };
        let (email, skipped) = parsed_email_from_bulk(info, raw);
        report.skipped_parts += skipped;
        emails.push((*uid, email));
    }
    report.phase3_headers_fallback_secs = phase3_start.elapsed().as_secs_f64();

    // Phase 4 — analysis.
    let phase4_start = Instant::now();
    let mut verdicts: Vec<Verdict> = Vec::with_capacity(emails.len());
    for (uid, email) in &emails {
        let mut verdict = analyzer.analyze(email).await?;
        verdict.imap_uid = Some(*uid);
        verdicts.push(verdict);
    }
    report.phase4_analysis_secs = phase4_start.elapsed().as_secs_f64();

    // Phase 5 — persist.
    let phase5_start = Instant::now();
    for verdict in &verdicts {
        verdict_store.save(verdict).await?;
    }
    report.phase5_persist_secs = phase5_start.elapsed().as_secs_f64();
    report.email_count = verdicts.len();

    // Phase 6 — cleanup.
    let phase6_start = Instant::now();
    let _ = imap_ops::logout(&mut scan_session).await;
    report.phase6_cleanup_secs = phase6_start.elapsed().as_secs_f64();

    Ok(report)
}

async fn connect_worker(account: &AccountConfig, credential: &Credential) -> AppResult<ImapSession> {
    let mut session = imap_ops::connect_authenticated(account, credential).await?;
    imap_ops::select_inbox_readonly(&mut session).await?;
    Ok(session)
}

/// Fetch each UID's raw message, sharded across `workers` by `index %
/// workers.len()`. Preserves input order in the returned `Vec`.
async fn fetch_sharded(workers: Vec<ImapSession>, uids: &[Option<u32>]) -> Vec<Option<Vec<u8>>> {
    let worker_count = workers.len();
    let mut shards: Vec<Vec<(usize, u32)>> = vec![Vec::new(); worker_count];
    for (index, uid) in uids.iter().enumerate() {
        if let Some(uid) = uid {
            shards[index % worker_count].push((index, *uid));
        }
    }

    let mut join_set: JoinSet<Vec<(usize, Option<Vec<u8>>)>> = JoinSet::new();
    for (mut session, shard) in workers.into_iter().zip(shards.into_iter()) {
        join_set.spawn(async move {
            let mut out = Vec::with_capacity(shard.len());
            for (index, uid) in shard {
                let raw = imap_ops::fetch_raw_message(&mut session, uid).await.ok();
                out.push((index, raw));
            }
            let _ = imap_ops::logout(&mut session).await;
            out
        });
    }

    let mut results: Vec<Option<Vec<u8>>> = vec![None; uids.len()];
    while let Some(shard_result) = join_set.join_next().await {
        let Ok(shard_result) = shard_result else { continue };
        for (index, raw) in shard_result {
            results[index] = raw;
        }
    }
    results
}

/// Build a [`ParsedEmail`] from a bulk-fetched envelope/header response
/// plus the raw message bytes fetched for it, returning its skipped-parts
/// count alongside. Mirrors [`crate::monitor::build_parsed_email`]'s
/// header-fallback rule but starting from an already-fetched bulk
/// response instead of a fresh sequence fetch.
fn parsed_email_from_bulk(info: &Fetch, raw: &[u8]) -> (ParsedEmail, usize) {
    let envelope = info.envelope();
    let from = envelope
        .and_then(|e| e.from.as_ref())
        .and_then(|addrs| addrs.first())
        .map(imap_ops::format_address)
        .unwrap_or_default();
    let subject = envelope
        .and_then(|e| e.subject.as_deref())
        .map(|s| String::from_utf8_lossy(s).into_owned());

    let bulk_headers = info.header().map(raw_headers::parse_raw_headers).unwrap_or_default();
    let mut auth_results = raw_headers::find_header(&bulk_headers, "Authentication-Results").map(str::to_owned);
    let mut return_path = raw_headers::find_header(&bulk_headers, "Return-Path").map(str::to_owned);
    let mut headers = bulk_headers;

    if auth_results.is_none() && return_path.is_none() {
        let full_headers = raw_headers::parse_raw_headers(raw);
        auth_results = raw_headers::find_header(&full_headers, "Authentication-Results").map(str::to_owned);
        return_path = raw_headers::find_header(&full_headers, "Return-Path").map(str::to_owned);
        headers = full_headers;
    }

    let message_id_header = raw_headers::find_header(&headers, "Message-ID").map(str::to_owned);
    let bodies = crate::mime::extract_bodies(raw).unwrap_or_default();
    let received_date = info
        .internal_date()
        .map(|d| d.with_timezone(&chrono::Utc))
        .unwrap_or_else(chrono::Utc::now);

    let email = ParsedEmail::new(
        message_id_header,
        from,
        return_path,
        auth_results,
        subject,
        bodies.html_body,
        bodies.text_body,
        received_date,
        headers,
    );
    (email, bodies.skipped_parts)
}

/// Total wall-clock time across every phase.
pub fn total_elapsed(report: &ScanReport) -> Duration {
    Duration::from_secs_f64(
        report.phase0_setup_secs
            + report.phase1_bulk_fetch_secs
            + report.phase_workers_setup_secs
            + report.phase2_body_fetch_secs
            + report.phase3_headers_fallback_secs
            + report.phase4_analysis_secs
            + report.phase5_persist_secs
            + report.phase6_cleanup_secs,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_report_has_zero_counts() {
        let report = ScanReport::default();
        assert_eq!(report.email_count, 0);
        assert_eq!(report.skipped_parts, 0);
        assert_eq!(total_elapsed(&report), Duration::from_secs(0));
    }
}
