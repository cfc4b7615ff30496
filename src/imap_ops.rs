//! IMAP transport and session operations
//!
//! Generalizes the teacher's timeout-wrapped `async-imap` operation
//! functions to this crate's `AppError` model, and adds the IDLE and
//! XOAUTH2 primitives the MCP transport never needed (spec §4.I).

use std::sync::Arc;
use std::time::Duration;

use async_imap::extensions::idle::{Handle, IdleResponse};
use async_imap::types::{Fetch, Mailbox};
use async_imap::{Authenticator, Client, Session};
use futures::TryStreamExt;
use rustls::ClientConfig;
use rustls::RootCertStore;
use rustls_pki_types::ServerName;
use secrecy::{ExposeSecret, SecretString};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;

use crate::config::{AccountConfig, Credential};
use crate::errors::{AppError, AppResult};

/// Authenticated IMAP session over TLS.
pub type ImapSession = Session<tokio_rustls::client::TlsStream<TcpStream>>;

/// An IDLE session mid-flight, between `init()` and `done()`.
pub type IdleHandle = Handle<tokio_rustls::client::TlsStream<TcpStream>>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const GREETING_TIMEOUT: Duration = Duration::from_secs(10);
const SOCKET_TIMEOUT: Duration = Duration::from_secs(30);
/// Upper bound on waiting for the tagged response to `DONE` when tearing
/// down an IDLE session (spec §5 cancellation contract).
pub const IDLE_DONE_TIMEOUT: Duration = Duration::from_secs(5);

/// `SASL XOAUTH2` initial-response authenticator.
///
/// `async-imap`'s `authenticate` always does a challenge-response
/// handshake (it never appends an initial response to the `AUTHENTICATE`
/// command line itself), so there is no separate SASL-IR code path to
/// take here — the same blob answers whatever challenge the server sends,
/// which is what SASL-IR would have sent up front anyway.
struct XOAuth2Authenticator {
    user: String,
    access_token: SecretString,
}

impl Authenticator for XOAuth2Authenticator {
    type Response = String;

    fn process(&mut self, _challenge: &[u8]) -> Self::Response {
        format!(
            "user={}\x01auth=Bearer {}\x01\x01",
            self.user,
            self.access_token.expose_secret()
        )
    }
}

/// Connect, establish TLS, and authenticate per `credential`.
///
/// Rejects `use_tls = false` outright (spec §7 Validation: insecure IMAP
/// is not supported — password/token exposure risk).
pub async fn connect_authenticated(
    account: &AccountConfig,
    credential: &Credential,
) -> AppResult<ImapSession> {
    if !account.use_tls {
        return Err(AppError::Validation(
            "insecure IMAP is not supported; set PHISHSENTRY_IMAP_TLS=true".to_owned(),
        ));
    }

    let tcp = timeout(
        CONNECT_TIMEOUT,
        TcpStream::connect((account.imap_server.as_str(), account.imap_port)),
    )
    .await
    .map_err(|_| AppError::Timeout("tcp connect timeout".to_owned()))
    .and_then(|r| r.map_err(|e| AppError::Network(format!("tcp connect failed: {e}"))))?;

    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let tls_config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(tls_config));

    let server_name = ServerName::try_from(account.imap_server.clone())
        .map_err(|_| AppError::Validation("invalid IMAP host for TLS SNI".to_owned()))?;
    let tls_stream = timeout(GREETING_TIMEOUT, connector.connect(server_name, tcp))
        .await
        .map_err(|_| AppError::Timeout("TLS handshake timeout".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Network(format!("TLS handshake failed: {e}"))))?;

    let mut client = Client::new(tls_stream);
    let greeting = timeout(GREETING_TIMEOUT, client.read_response())
        .await
        .map_err(|_| AppError::Timeout("IMAP greeting timeout".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Network(format!("IMAP greeting failed: {e}"))))?;

    if greeting.is_none() {
        return Err(AppError::Network(
            "IMAP server closed connection before greeting".to_owned(),
        ));
    }

    match credential {
        Credential::Password(password) => {
            timeout(
                GREETING_TIMEOUT,
                client.login(account.username.as_str(), password.expose_secret()),
            )
            .await
            .map_err(|_| AppError::Timeout("IMAP login timeout".to_owned()))
            .and_then(|r| r.map_err(|(e, _)| classify_auth_error(e)))
        }
        Credential::OAuth2 { email, access_token } => {
            let authenticator = XOAuth2Authenticator {
                user: email.clone(),
                access_token: access_token.clone(),
            };
            timeout(GREETING_TIMEOUT, client.authenticate("XOAUTH2", authenticator))
                .await
                .map_err(|_| AppError::Timeout("XOAUTH2 timeout".to_owned()))
                .and_then(|r| r.map_err(|(e, _)| classify_auth_error(e)))
        }
    }
}

fn classify_auth_error(err: async_imap::error::Error) -> AppError {
    let msg = err.to_string();
    if msg.to_ascii_lowercase().contains("auth") || msg.contains("LOGIN") || msg.contains("XOAUTH2") {
        AppError::Authentication(msg)
    } else {
        AppError::Protocol(msg)
    }
}

pub async fn select_inbox_readwrite(session: &mut ImapSession) -> AppResult<Mailbox> {
    timeout(SOCKET_TIMEOUT, session.select("INBOX"))
        .await
        .map_err(|_| AppError::Timeout("SELECT INBOX timed out".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Protocol(format!("SELECT INBOX failed: {e}"))))
}

/// `EXAMINE INBOX` — selects read-only so scanning never marks messages
/// `\Seen` (spec §4.J phase 0).
pub async fn select_inbox_readonly(session: &mut ImapSession) -> AppResult<Mailbox> {
    timeout(SOCKET_TIMEOUT, session.examine("INBOX"))
        .await
        .map_err(|_| AppError::Timeout("EXAMINE INBOX timed out".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Protocol(format!("EXAMINE INBOX failed: {e}"))))
}

pub async fn capabilities(session: &mut ImapSession) -> AppResult<async_imap::types::Capabilities> {
    timeout(SOCKET_TIMEOUT, session.capabilities())
        .await
        .map_err(|_| AppError::Timeout("CAPABILITY timed out".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Protocol(format!("CAPABILITY failed: {e}"))))
}

/// `FETCH` a single sequence number for envelope, flags, UID, internal
/// date, and body structure (spec §4.I step 1).
pub async fn fetch_message_info(session: &mut ImapSession, seq: u32) -> AppResult<Fetch> {
    let stream = timeout(
        SOCKET_TIMEOUT,
        session.fetch(
            seq.to_string(),
            "(ENVELOPE UID INTERNALDATE FLAGS BODYSTRUCTURE BODY.PEEK[HEADER.FIELDS (AUTHENTICATION-RESULTS RETURN-PATH)])",
        ),
    )
    .await
    .map_err(|_| AppError::Timeout("FETCH timed out".to_owned()))
    .and_then(|r| r.map_err(|e| AppError::Protocol(format!("FETCH failed: {e}"))))?;

    let fetches: Vec<Fetch> = timeout(SOCKET_TIMEOUT, stream.try_collect())
        .await
        .map_err(|_| AppError::Timeout("FETCH stream timed out".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Protocol(format!("FETCH stream failed: {e}"))))?;

    fetches
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Protocol(format!("no FETCH response for sequence {seq}")))
}

/// Bulk `FETCH` over a sequence range (spec §4.J phase 1), e.g. `"1:50"`.
pub async fn fetch_bulk_info(session: &mut ImapSession, seq_range: &str) -> AppResult<Vec<Fetch>> {
    if seq_range.is_empty() {
        return Err(AppError::Validation("empty sequence range".to_owned()));
    }
    let stream = timeout(
        SOCKET_TIMEOUT,
        session.fetch(
            seq_range,
            "(ENVELOPE UID INTERNALDATE FLAGS BODYSTRUCTURE BODY.PEEK[HEADER.FIELDS (AUTHENTICATION-RESULTS RETURN-PATH)])",
        ),
    )
    .await
    .map_err(|_| AppError::Timeout("bulk FETCH timed out".to_owned()))
    .and_then(|r| r.map_err(|e| AppError::Protocol(format!("bulk FETCH failed: {e}"))))?;

    timeout(SOCKET_TIMEOUT, stream.try_collect())
        .await
        .map_err(|_| AppError::Timeout("bulk FETCH stream timed out".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Protocol(format!("bulk FETCH stream failed: {e}"))))
}

/// Fetch the full RFC822 message source by UID.
pub async fn fetch_raw_message(session: &mut ImapSession, uid: u32) -> AppResult<Vec<u8>> {
    let stream = timeout(SOCKET_TIMEOUT, session.uid_fetch(uid.to_string(), "UID RFC822"))
        .await
        .map_err(|_| AppError::Timeout("UID FETCH timed out".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Protocol(format!("uid fetch failed: {e}"))))?;
    let fetches: Vec<Fetch> = timeout(SOCKET_TIMEOUT, stream.try_collect())
        .await
        .map_err(|_| AppError::Timeout("UID FETCH stream timed out".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Protocol(format!("uid fetch stream failed: {e}"))))?;

    let fetch = fetches
        .into_iter()
        .next()
        .ok_or_else(|| AppError::Protocol(format!("message uid {uid} not found")))?;
    let body = fetch
        .body()
        .ok_or_else(|| AppError::Protocol("message has no RFC822 body".to_owned()))?;
    Ok(body.to_vec())
}

/// Begin an IDLE session, consuming the authenticated `session`.
pub async fn idle_start(session: ImapSession) -> AppResult<IdleHandle> {
    let mut handle = session.idle();
    timeout(SOCKET_TIMEOUT, handle.init())
        .await
        .map_err(|_| AppError::Timeout("IDLE init timed out".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Protocol(format!("IDLE init failed: {e}"))))?;
    Ok(handle)
}

/// Wait for the next server event (or the heartbeat timeout) on an
/// active IDLE handle.
pub async fn idle_wait(handle: &mut IdleHandle, heartbeat: Duration) -> AppResult<IdleResponse> {
    let (fut, _stop) = handle.wait_with_timeout(heartbeat);
    fut.await
        .map_err(|e| AppError::Network(format!("IDLE stream error: {e}")))
}

/// Send `DONE` and return the session to non-IDLE state, bounded by
/// [`IDLE_DONE_TIMEOUT`] so cancellation never blocks indefinitely.
pub async fn idle_done(handle: IdleHandle) -> AppResult<ImapSession> {
    timeout(IDLE_DONE_TIMEOUT, handle.done())
        .await
        .map_err(|_| AppError::Timeout("IDLE DONE timed out".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Protocol(format!("IDLE DONE failed: {e}"))))
}

/// Move a message to another mailbox via `UID MOVE` (RFC 6851).
pub async fn uid_move(session: &mut ImapSession, uid: u32, mailbox: &str) -> AppResult<()> {
    timeout(SOCKET_TIMEOUT, session.uid_mv(uid.to_string(), mailbox))
        .await
        .map_err(|_| AppError::Timeout("UID MOVE timed out".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Protocol(format!("UID MOVE failed: {e}"))))
}

/// Set flags on a message via `UID STORE`, e.g. `"+FLAGS (\\Flagged)"`.
pub async fn uid_store(session: &mut ImapSession, uid: u32, query: &str) -> AppResult<()> {
    let stream = timeout(SOCKET_TIMEOUT, session.uid_store(uid.to_string(), query))
        .await
        .map_err(|_| AppError::Timeout("UID STORE timed out".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Protocol(format!("UID STORE failed: {e}"))))?;
    let _: Vec<Fetch> = timeout(SOCKET_TIMEOUT, stream.try_collect())
        .await
        .map_err(|_| AppError::Timeout("UID STORE stream timed out".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Protocol(format!("UID STORE stream failed: {e}"))))?;
    Ok(())
}

pub async fn logout(session: &mut ImapSession) -> AppResult<()> {
    timeout(SOCKET_TIMEOUT, session.logout())
        .await
        .map_err(|_| AppError::Timeout("LOGOUT timed out".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Network(format!("LOGOUT failed: {e}"))))
}

pub async fn noop(session: &mut ImapSession) -> AppResult<()> {
    timeout(SOCKET_TIMEOUT, session.noop())
        .await
        .map_err(|_| AppError::Timeout("NOOP timed out".to_owned()))
        .and_then(|r| r.map_err(|e| AppError::Network(format!("NOOP failed: {e}"))))
}

/// Render an envelope `Address` as a `"Name" <mailbox@host>` string, the
/// form [`crate::domain::extract_domain`] and
/// [`crate::models::sender_name_from`] both expect.
pub fn format_address(addr: &async_imap::imap_proto::types::Address<'_>) -> String {
    let mailbox = addr.mailbox.as_deref().map(|b| String::from_utf8_lossy(b).into_owned()).unwrap_or_default();
    let host = addr.host.as_deref().map(|b| String::from_utf8_lossy(b).into_owned()).unwrap_or_default();
    let address = if host.is_empty() { mailbox.clone() } else { format!("{mailbox}@{host}") };

    match addr.name.as_deref().map(|b| String::from_utf8_lossy(b).into_owned()) {
        Some(name) if !name.is_empty() => format!("\"{name}\" <{address}>"),
        _ => address,
    }
}

/// Simplified view of the events an IDLE session can deliver, reduced
/// from `imap_proto`'s full response grammar to the ones the monitor acts
/// on (spec §4.I: react to EXISTS, ignore everything else for now).
///
/// `async-imap`'s `IdleResponse::NewData` wraps a type that is not
/// nameable outside its own crate, so this can't take that value as a
/// typed parameter — callers classify inline where they receive it (see
/// [`crate::monitor::run_idle_loop`]) and just share this result enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdleEvent {
    Exists(u32),
    Expunge(u32),
    Bye,
    Other,
}
