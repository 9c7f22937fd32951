//! rocsun-core - client core for the rocsun user administration console.
//!
//! Everything here runs on a single owning task. Network calls and the
//! session expiry timer run as spawned tasks that report back over channels;
//! the owner drains them with the controllers' `poll_*` / `next_*` methods.

pub mod api;
pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod mutation;
pub mod notify;
pub mod query;
pub mod utils;

#[cfg(test)]
mod testing;

pub use api::{ApiClient, ApiError, UserGateway};
pub use auth::{CredentialStore, GuardDecision, SessionController};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, CredentialBackend};
pub use error::ConsoleError;
pub use mutation::{MutationController, MutationOutcome, OperationKind, PendingOperation};
pub use notify::{Notice, NoticeLevel, Notifier};
pub use query::{FetchOutcome, QueryController, UserSearch};
