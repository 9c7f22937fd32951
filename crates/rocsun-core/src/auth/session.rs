use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::credentials::{CredentialStore, StoredSession};
use crate::api::ApiError;
use crate::clock::Clock;
use crate::models::Profile;
use crate::notify::Notifier;

/// Notification shown when a session ends because its validity window ran out
/// or the backend revoked the token.
pub const SESSION_EXPIRED_MESSAGE: &str = "Session expired, please log in again";

#[derive(Debug, Clone, PartialEq)]
pub struct SessionData {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub profile: Profile,
}

impl SessionData {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> Duration {
        self.expires_at - now
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        self.time_until_expiry(now).num_minutes().max(0)
    }

    fn to_stored(&self) -> StoredSession {
        StoredSession {
            token: self.token.clone(),
            expires_at: self.expires_at,
            profile: self.profile.clone(),
        }
    }
}

impl From<StoredSession> for SessionData {
    fn from(stored: StoredSession) -> Self {
        Self {
            token: stored.token,
            expires_at: stored.expires_at,
            profile: stored.profile,
        }
    }
}

/// Messages delivered back to the controller by its own timer task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    /// The expiry timer armed for login cycle `cycle` fired.
    Expired { cycle: u64 },
}

/// Owns authentication state, its durable mirror and the auto-logout timer.
///
/// All state changes happen on the owning task. The expiry timer runs as a
/// spawned task that only sends a [`SessionEvent`]; the owner applies it via
/// [`SessionController::poll_events`] or [`SessionController::next_event`].
///
/// The timer needs a Tokio runtime. Outside one, `login` and
/// `restore_from_store` still work and expiry is only caught by
/// [`SessionController::is_authenticated`].
pub struct SessionController {
    store: Arc<dyn CredentialStore>,
    clock: Arc<dyn Clock>,
    notifier: Notifier,
    ttl: Duration,
    data: Option<SessionData>,
    /// Incremented on every login/restore; timer events from older cycles are ignored.
    cycle: u64,
    timer: Option<JoinHandle<()>>,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionController {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        clock: Arc<dyn Clock>,
        notifier: Notifier,
        ttl: Duration,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            store,
            clock,
            notifier,
            ttl,
            data: None,
            cycle: 0,
            timer: None,
            events_tx,
            events_rx,
        }
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start a session for a credential the caller has already exchanged.
    pub fn login(&mut self, token: String, profile: Profile) {
        let expires_at = self.clock.now() + self.ttl;
        let data = SessionData {
            token,
            expires_at,
            profile,
        };

        if let Err(e) = self.store.save(&data.to_stored()) {
            warn!(error = %e, "Failed to persist session");
        }

        info!(username = %data.profile.username, %expires_at, "Session started");
        self.data = Some(data);
        self.cycle += 1;
        self.arm_timer();
    }

    /// End the session. Safe to call when already logged out.
    pub fn logout(&mut self) {
        self.disarm_timer();
        if let Some(data) = self.data.take() {
            info!(username = %data.profile.username, "Session ended");
        }
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "Failed to clear persisted session");
        }
    }

    /// Restore a persisted session at startup. Returns whether a session is live.
    ///
    /// An expired, missing or unreadable record is cleaned up through `logout`.
    pub fn restore_from_store(&mut self) -> bool {
        let stored = match self.store.load() {
            Ok(stored) => stored,
            Err(e) => {
                warn!(error = %e, "Failed to load persisted session, discarding it");
                None
            }
        };

        match stored {
            Some(stored) if self.clock.now() < stored.expires_at => {
                let data = SessionData::from(stored);
                debug!(
                    minutes_left = data.minutes_until_expiry(self.clock.now()),
                    "Restored session"
                );
                self.data = Some(data);
                self.cycle += 1;
                self.arm_timer();
                true
            }
            Some(_) => {
                debug!("Persisted session has expired");
                self.logout();
                false
            }
            None => {
                self.logout();
                false
            }
        }
    }

    /// Whether a live session exists, reconciled against the clock.
    ///
    /// A session found past its expiry is ended here, with the same
    /// notification the timer would have produced.
    pub fn is_authenticated(&mut self) -> bool {
        let expired = match &self.data {
            Some(data) => data.is_expired_at(self.clock.now()),
            None => return false,
        };
        if expired {
            self.expire();
            return false;
        }
        true
    }

    /// Non-reconciling check for read-only callers.
    pub fn is_valid(&self) -> bool {
        self.data
            .as_ref()
            .map(|d| !d.is_expired_at(self.clock.now()))
            .unwrap_or(false)
    }

    /// Route a gateway failure through the session. A 401 means the backend
    /// revoked the token early, which ends the session like an expiry.
    /// Returns true if the session was ended.
    pub fn handle_api_error(&mut self, error: &ApiError) -> bool {
        if error.is_unauthorized() && self.data.is_some() {
            warn!("Backend rejected session token");
            self.expire();
            true
        } else {
            false
        }
    }

    fn expire(&mut self) {
        if self.data.is_none() {
            return;
        }
        self.logout();
        self.notifier.warning(SESSION_EXPIRED_MESSAGE);
    }

    // =========================================================================
    // Expiry timer
    // =========================================================================

    /// Schedule the single-shot expiry callback for the current session,
    /// replacing any previously armed one.
    fn arm_timer(&mut self) {
        self.disarm_timer();
        let Some(data) = &self.data else {
            return;
        };

        let remaining = data
            .time_until_expiry(self.clock.now())
            .to_std()
            .unwrap_or_default();
        let deadline = tokio::time::Instant::now() + remaining;
        let cycle = self.cycle;
        let tx = self.events_tx.clone();

        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("No Tokio runtime, expiry will only be detected on read");
            return;
        };

        debug!(cycle, remaining_secs = remaining.as_secs(), "Arming expiry timer");
        self.timer = Some(runtime.spawn(async move {
            tokio::time::sleep_until(deadline).await;
            if tx.send(SessionEvent::Expired { cycle }).is_err() {
                debug!("Expiry fired after controller was dropped");
            }
        }));
    }

    fn disarm_timer(&mut self) {
        if let Some(handle) = self.timer.take() {
            handle.abort();
        }
    }

    pub fn timer_armed(&self) -> bool {
        self.timer.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Expired { cycle } if cycle == self.cycle => {
                debug!(cycle, "Expiry timer fired");
                self.timer = None;
                self.expire();
            }
            SessionEvent::Expired { cycle } => {
                debug!(cycle, current = self.cycle, "Ignoring timer from an earlier session");
            }
        }
    }

    /// Apply any timer events that have already arrived. Returns how many.
    pub fn poll_events(&mut self) -> usize {
        let mut events = Vec::new();
        while let Ok(event) = self.events_rx.try_recv() {
            events.push(event);
        }
        let count = events.len();
        for event in events {
            self.handle_event(event);
        }
        count
    }

    /// Wait for the next timer event and apply it.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        let event = self.events_rx.recv().await?;
        self.handle_event(event);
        Some(event)
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn data(&self) -> Option<&SessionData> {
        self.data.as_ref()
    }

    pub fn token(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.token.as_str())
    }

    pub fn profile(&self) -> Option<&Profile> {
        self.data.as_ref().map(|d| &d.profile)
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.data.as_ref().map(|d| d.expires_at)
    }

    pub fn minutes_until_expiry(&self) -> Option<i64> {
        self.data
            .as_ref()
            .map(|d| d.minutes_until_expiry(self.clock.now()))
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.disarm_timer();
    }
}
