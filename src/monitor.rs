//! IMAP Monitor — long-lived IDLE session driving the check pipeline
//! (spec §4.I)
//!
//! `Monitor::start` connects, authenticates, selects `INBOX`, and spawns a
//! background task that issues IDLE and reacts to `EXISTS` events. Results
//! are delivered to the caller as [`MonitorEvent`]s over an
//! `mpsc` channel — this crate's substitute for the cyclic
//! delegate/observer pattern the original system used (spec §9).

use std::sync::Arc;
use std::time::Duration;

use async_imap::extensions::idle::IdleResponse;
use tokio::sync::{mpsc, oneshot, Mutex};
use tracing::{debug, error, info, warn};

use crate::analyzer::PhishingAnalyzer;
use crate::config::{AccountConfig, Credential};
use crate::email::ParsedEmail;
use crate::errors::{AppError, AppResult};
use crate::imap_ops::{self, IdleEvent, ImapSession};
use crate::models::Verdict;
use crate::raw_headers;
use crate::store::VerdictStore;

/// Monitor connection state, transitioned exactly as spec §4.I describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorState {
    Disconnected,
    Connecting,
    Connected,
    Monitoring,
    Error(String),
}

/// Events delivered to the owner of a running [`Monitor`].
#[derive(Debug, Clone)]
pub enum MonitorEvent {
    Connected,
    Disconnected,
    Verdict(Verdict),
    Error(String),
}

/// A running IMAP IDLE monitor. Dropping this without calling [`Monitor::stop`]
/// leaves the background task running; `stop` is the clean shutdown path.
pub struct Monitor {
    state: Arc<Mutex<MonitorState>>,
    stop_tx: Option<oneshot::Sender<()>>,
    task: Option<tokio::task::JoinHandle<()>>,
}

impl Monitor {
    /// `start(credential)` per spec §4.I: requires `Disconnected`, connects
    /// TCP+TLS, authenticates, `SELECT INBOX`, then spawns the IDLE loop.
    pub async fn start(
        account: AccountConfig,
        credential: Credential,
        analyzer: Arc<PhishingAnalyzer>,
        verdict_store: VerdictStore,
        idle_interval: Duration,
    ) -> AppResult<(Monitor, mpsc::Receiver<MonitorEvent>)> {
        let state = Arc::new(Mutex::new(MonitorState::Connecting));
        let (events_tx, events_rx) = mpsc::channel(64);

        let mut session = match imap_ops::connect_authenticated(&account, &credential).await {
            Ok(session) => session,
            Err(e) => {
                *state.lock().await = MonitorState::Error(e.to_string());
                return Err(e);
            }
        };
        *state.lock().await = MonitorState::Connected;

        if let Err(e) = imap_ops::select_inbox_readwrite(&mut session).await {
            *state.lock().await = MonitorState::Error(e.to_string());
            return Err(e);
        }
        *state.lock().await = MonitorState::Monitoring;
        let _ = events_tx.send(MonitorEvent::Connected).await;

        let (stop_tx, stop_rx) = oneshot::channel();
        let task_state = state.clone();
        let task = tokio::spawn(run_idle_loop(session, idle_interval, analyzer, verdict_store, events_tx, stop_rx, task_state));

        Ok((
            Monitor {
                state,
                stop_tx: Some(stop_tx),
                task: Some(task),
            },
            events_rx,
        ))
    }

    pub async fn state(&self) -> MonitorState {
        self.state.lock().await.clone()
    }

    /// Cancel the IDLE loop. Issues `DONE` and closes the session within
    /// [`imap_ops::IDLE_DONE_TIMEOUT`] (spec §5 cancellation contract).
    pub async fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
        *self.state.lock().await = MonitorState::Disconnected;
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_idle_loop(
    session: ImapSession,
    idle_interval: Duration,
    analyzer: Arc<PhishingAnalyzer>,
    verdict_store: VerdictStore,
    events_tx: mpsc::Sender<MonitorEvent>,
    mut stop_rx: oneshot::Receiver<()>,
    state: Arc<Mutex<MonitorState>>,
) {
    let mut handle = match imap_ops::idle_start(session).await {
        Ok(handle) => handle,
        Err(e) => {
            *state.lock().await = MonitorState::Error(e.to_string());
            let _ = events_tx.send(MonitorEvent::Error(e.to_string())).await;
            return;
        }
    };

    loop {
        tokio::select! {
            _ = &mut stop_rx => {
                let _ = imap_ops::idle_done(handle).await;
                let _ = events_tx.send(MonitorEvent::Disconnected).await;
                return;
            }
            result = imap_ops::idle_wait(&mut handle, idle_interval) => {
                match result {
                    Err(e) => {
                        *state.lock().await = MonitorState::Error(e.to_string());
                        let _ = events_tx.send(MonitorEvent::Error(e.to_string())).await;
                        return;
                    }
                    Ok(IdleResponse::Timeout) => {
                        debug!("IDLE heartbeat: DONE -> NOOP -> IDLE");
                        let mut session = match imap_ops::idle_done(handle).await {
                            Ok(session) => session,
                            Err(e) => {
                                let _ = events_tx.send(MonitorEvent::Error(e.to_string())).await;
                                return;
                            }
                        };
                        if let Err(e) = imap_ops::noop(&mut session).await {
                            let _ = events_tx.send(MonitorEvent::Error(e.to_string())).await;
                            return;
                        }
                        handle = match imap_ops::idle_start(session).await {
                            Ok(handle) => handle,
                            Err(e) => {
                                let _ = events_tx.send(MonitorEvent::Error(e.to_string())).await;
                                return;
                            }
                        };
                    }
                    Ok(IdleResponse::ManualInterrupt) => continue,
                    Ok(IdleResponse::NewData(response)) => {
                        use async_imap::imap_proto::{MailboxDatum, Response, Status};
                        let event = match response.parsed() {
                            Response::MailboxData(MailboxDatum::Exists(n)) => IdleEvent::Exists(*n),
                            Response::Expunge(n) => IdleEvent::Expunge(*n),
                            Response::Data { status: Status::Bye, .. } => IdleEvent::Bye,
                            _ => IdleEvent::Other,
                        };
                        match event {
                            IdleEvent::Exists(seq) => {
                                info!(seq, "EXISTS event, fetching new message");
                                let mut session = match imap_ops::idle_done(handle).await {
                                    Ok(session) => session,
                                    Err(e) => {
                                        let _ = events_tx.send(MonitorEvent::Error(e.to_string())).await;
                                        return;
                                    }
                                };
                                match process_new_message(&mut session, seq, &analyzer, &verdict_store).await {
                                    Ok(verdict) => {
                                        let _ = events_tx.send(MonitorEvent::Verdict(verdict)).await;
                                    }
                                    Err(e) => {
                                        warn!(error = %e, "failed to process new message");
                                        let _ = events_tx.send(MonitorEvent::Error(e.to_string())).await;
                                    }
                                }
                                handle = match imap_ops::idle_start(session).await {
                                    Ok(handle) => handle,
                                    Err(e) => {
                                        let _ = events_tx.send(MonitorEvent::Error(e.to_string())).await;
                                        return;
                                    }
                                };
                            }
                            IdleEvent::Bye => {
                                error!("server sent BYE during IDLE");
                                *state.lock().await = MonitorState::Error("server closed connection (BYE)".to_owned());
                                let _ = events_tx.send(MonitorEvent::Error("server closed connection".to_owned())).await;
                                return;
                            }
                            IdleEvent::Expunge(_) | IdleEvent::Other => continue,
                        }
                    }
                }
            }
        }
    }
}

/// Per-new-message pipeline (spec §4.I): fetch info, fetch bodies, fall
/// back to raw headers, build `ParsedEmail`, analyze, save.
async fn process_new_message(
    session: &mut ImapSession,
    seq: u32,
    analyzer: &PhishingAnalyzer,
    verdict_store: &VerdictStore,
) -> AppResult<Verdict> {
    let (uid, email) = build_parsed_email(session, seq).await?;
    let mut verdict = analyzer.analyze(&email).await?;
    verdict.imap_uid = Some(uid);
    verdict_store.save(&verdict).await?;
    Ok(verdict)
}

/// Build a [`ParsedEmail`] for the message at sequence number `seq`,
/// returning its UID alongside it.
pub async fn build_parsed_email(session: &mut ImapSession, seq: u32) -> AppResult<(u32, ParsedEmail)> {
    let info = imap_ops::fetch_message_info(session, seq).await?;
    let uid = info.uid.ok_or_else(|| AppError::Protocol(format!("no UID for sequence {seq}")))?;
    let envelope = info.envelope();

    let from = envelope
        .and_then(|e| e.from.as_ref())
        .and_then(|addrs| addrs.first())
        .map(imap_ops::format_address)
        .unwrap_or_default();
    let subject = envelope
        .and_then(|e| e.subject.as_deref())
        .map(|s| String::from_utf8_lossy(s).into_owned());

    let bulk_headers = info
        .header()
        .map(raw_headers::parse_raw_headers)
        .unwrap_or_default();
    let mut auth_results = raw_headers::find_header(&bulk_headers, "Authentication-Results").map(str::to_owned);
    let mut return_path = raw_headers::find_header(&bulk_headers, "Return-Path").map(str::to_owned);
    let mut headers = bulk_headers;

    let raw = imap_ops::fetch_raw_message(session, uid).await?;
    if auth_results.is_none() && return_path.is_none() {
        let full_headers = raw_headers::parse_raw_headers(&raw);
        auth_results = raw_headers::find_header(&full_headers, "Authentication-Results").map(str::to_owned);
        return_path = raw_headers::find_header(&full_headers, "Return-Path").map(str::to_owned);
        headers = full_headers;
    }

    let message_id_header = raw_headers::find_header(&headers, "Message-ID").map(str::to_owned);
    let bodies = crate::mime::extract_bodies(&raw).unwrap_or_default();
    let received_date = info
        .internal_date()
        .map(|d| d.with_timezone(&chrono::Utc))
        .unwrap_or_else(chrono::Utc::now);

    Ok((
        uid,
        ParsedEmail::new(
            message_id_header,
            from,
            return_path,
            auth_results,
            subject,
            bodies.html_body,
            bodies.text_body,
            received_date,
            headers,
        ),
    ))
}

/// Action operations on an already-connected session (spec §4.I).
pub async fn move_to_junk(session: &mut ImapSession, uid: u32) -> AppResult<()> {
    imap_ops::uid_move(session, uid, "Junk").await
}

pub async fn flag_message(session: &mut ImapSession, uid: u32) -> AppResult<()> {
    imap_ops::uid_store(session, uid, "+FLAGS (\\Flagged)").await
}

pub async fn delete_email(session: &mut ImapSession, uid: u32) -> AppResult<()> {
    imap_ops::uid_move(session, uid, "Trash").await
}

/// Establish a fresh session solely to move a message to Trash, for when
/// no persistent session is available (spec §4.I `connectAndDelete`).
pub async fn connect_and_delete(account: &AccountConfig, credential: &Credential, uid: u32) -> AppResult<()> {
    let mut session = imap_ops::connect_authenticated(account, credential).await?;
    imap_ops::select_inbox_readwrite(&mut session).await?;
    imap_ops::uid_move(&mut session, uid, "Trash").await?;
    imap_ops::logout(&mut session).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monitor_state_error_variant_carries_message() {
        let state = MonitorState::Error("boom".to_owned());
        assert!(matches!(state, MonitorState::Error(msg) if msg == "boom"));
    }
}
