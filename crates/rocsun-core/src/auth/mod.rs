//! Authentication module for managing operator sessions.
//!
//! This module provides:
//! - `SessionController`: token-based session with a 30 minute validity
//!   window and a single-shot auto-logout timer
//! - `CredentialStore`: durable mirror of the session (file, OS keychain or memory)
//! - `guard`: route gating for protected views
//! - `sign_in` / `register`: credential exchange through the gateway

pub mod credentials;
pub mod guard;
pub mod login;
pub mod session;

pub use credentials::{
    CredentialStore, FileCredentialStore, KeyringCredentialStore, MemoryCredentialStore,
    StoredSession,
};
pub use guard::{guard, resume_target, GuardDecision};
pub use login::{login_failure_message, register, sign_in};
pub use session::{SessionController, SessionData, SessionEvent, SESSION_EXPIRED_MESSAGE};
