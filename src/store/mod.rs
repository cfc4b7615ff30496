//! Persistent storage: verdicts, domain lists, and Safeonweb campaigns
//!
//! Every store shares a single [`SharedConnection`] (spec §5): all writers
//! are serialized through the `tokio::sync::Mutex`, and IMAP session state
//! never crosses this boundary.

pub mod campaign;
pub mod domain_set;
pub mod verdict;

use std::sync::Arc;

use rusqlite::Connection;
use tokio::sync::Mutex;

/// A database connection shared by every store, guarded by an async mutex
/// so concurrent monitor/scan/CLI tasks serialize their writes.
pub type SharedConnection = Arc<Mutex<Connection>>;

pub use campaign::SafeonwebCampaignStore;
pub use domain_set::{AllowlistStore, BlacklistStore, TrustedLinkDomainStore};
pub use verdict::VerdictStore;
