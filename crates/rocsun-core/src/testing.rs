//! In-memory gateway used by the controller tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::StatusCode;
use tokio::sync::oneshot;

use crate::api::{ApiError, UserGateway};
use crate::models::{LoginData, PageData, RegisterRequest, Role, User, UserDraft, UserPage};
use crate::query::PageRequest;

struct Account {
    password: String,
    token: String,
    nickname: Option<String>,
}

#[derive(Default)]
struct State {
    accounts: HashMap<String, Account>,
    users: Vec<User>,
    registrations: Vec<RegisterRequest>,
    page_requests: Vec<serde_json::Value>,
    updates: Vec<serde_json::Value>,
    gates: HashMap<u32, oneshot::Receiver<()>>,
    fail_next: Option<u16>,
}

/// Scriptable [`UserGateway`] backed by a vector of users.
///
/// Paging mirrors the backend: filters narrow the set, and a page beyond the
/// last one is clamped to the last page.
#[derive(Default)]
pub struct FakeGateway {
    state: Mutex<State>,
    calls: AtomicUsize,
}

fn seeded_user(id: i64) -> User {
    User {
        id,
        username: format!("user{:02}", id),
        email: format!("user{:02}@example.com", id),
        phone: Some(format!("1380000{:04}", id)),
        nickname: None,
        avatar: None,
        status: id % 5 != 0,
        role: if id % 3 == 0 { Role::Admin } else { Role::User },
        last_login_at: None,
        created_at: Some("2024-01-01T08:00:00".to_string()),
        modified_at: None,
    }
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(
        username: &str,
        password: &str,
        token: &str,
        nickname: Option<&str>,
    ) -> Self {
        let gateway = Self::new();
        gateway.lock().accounts.insert(
            username.to_string(),
            Account {
                password: password.to_string(),
                token: token.to_string(),
                nickname: nickname.map(str::to_string),
            },
        );
        gateway
    }

    /// Users with ids `1..=count`; every third is an admin.
    pub fn seeded(count: usize) -> Self {
        let gateway = Self::new();
        gateway.lock().users = (1..=count as i64).map(seeded_user).collect();
        gateway
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().expect("fake gateway state poisoned")
    }

    /// Fail the next call of any kind with this HTTP status.
    pub fn fail_next(&self, status: u16) {
        self.lock().fail_next = Some(status);
    }

    /// Hold replies for requests of `page` until the returned sender fires.
    pub fn gate_page(&self, page: u32) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.lock().gates.insert(page, rx);
        tx
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn registrations(&self) -> Vec<RegisterRequest> {
        self.lock().registrations.clone()
    }

    /// Page request bodies exactly as they would go over the wire.
    pub fn page_requests(&self) -> Vec<serde_json::Value> {
        self.lock().page_requests.clone()
    }

    pub fn updates(&self) -> Vec<serde_json::Value> {
        self.lock().updates.clone()
    }

    fn begin_call(&self) -> Result<(), ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.lock().fail_next.take() {
            Some(code) => {
                let status = StatusCode::from_u16(code).expect("valid status code");
                Err(ApiError::from_status(status, ""))
            }
            None => Ok(()),
        }
    }
}

fn matches_filters(user: &User, request: &serde_json::Value) -> bool {
    if let Some(name) = request.get("username").and_then(|v| v.as_str()) {
        if !user.username.contains(name) {
            return false;
        }
    }
    if let Some(status) = request.get("status").and_then(|v| v.as_bool()) {
        if user.status != status {
            return false;
        }
    }
    if let Some(role) = request.get("role").and_then(|v| v.as_str()) {
        if user.role.as_str() != role {
            return false;
        }
    }
    true
}

#[async_trait]
impl UserGateway for FakeGateway {
    async fn login(&self, username: &str, password: &str) -> Result<LoginData, ApiError> {
        self.begin_call()?;
        let state = self.lock();
        match state.accounts.get(username) {
            Some(account) if account.password == password => Ok(LoginData {
                token: account.token.clone(),
                username: username.to_string(),
                nickname: account.nickname.clone(),
            }),
            _ => Err(ApiError::Rejected("Invalid username or password".to_string())),
        }
    }

    async fn register(&self, request: &RegisterRequest) -> Result<(), ApiError> {
        self.begin_call()?;
        let mut state = self.lock();
        if state.accounts.contains_key(&request.username) {
            return Err(ApiError::Rejected("Username already exists".to_string()));
        }
        state.accounts.insert(
            request.username.clone(),
            Account {
                password: request.password.clone(),
                token: format!("token-{}", request.username),
                nickname: request.nickname.clone(),
            },
        );
        state.registrations.push(request.clone());
        Ok(())
    }

    async fn page(&self, request: &PageRequest) -> Result<UserPage, ApiError> {
        self.begin_call()?;
        let body = serde_json::to_value(request).expect("page request serializes");
        let gate = {
            let mut state = self.lock();
            state.page_requests.push(body.clone());
            state.gates.remove(&request.current)
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        let state = self.lock();
        let matching: Vec<&User> = state
            .users
            .iter()
            .filter(|u| matches_filters(u, &body))
            .collect();
        let size = request.page_size.max(1);
        let total = matching.len() as u64;
        let last_page = total.div_ceil(u64::from(size)).max(1) as u32;
        let current = request.current.clamp(1, last_page);
        let start = ((current - 1) * size) as usize;
        let records = matching
            .into_iter()
            .skip(start)
            .take(size as usize)
            .cloned()
            .collect();

        Ok(PageData {
            records,
            current,
            size,
            total,
        })
    }

    async fn fetch_user(&self, id: i64) -> Result<User, ApiError> {
        self.begin_call()?;
        self.lock()
            .users
            .iter()
            .find(|u| u.id == id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("user {}", id)))
    }

    async fn create_user(&self, draft: &UserDraft) -> Result<(), ApiError> {
        self.begin_call()?;
        let mut state = self.lock();
        let id = state.users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        let mut user = seeded_user(id);
        user.apply_draft(draft);
        state.users.push(user);
        Ok(())
    }

    async fn update_user(&self, draft: &UserDraft) -> Result<(), ApiError> {
        self.begin_call()?;
        let mut state = self.lock();
        state
            .updates
            .push(serde_json::to_value(draft).expect("draft serializes"));
        let id = draft.id.unwrap_or_default();
        match state.users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.apply_draft(draft);
                Ok(())
            }
            None => Err(ApiError::NotFound(format!("user {}", id))),
        }
    }

    async fn logic_delete(&self, id: i64) -> Result<(), ApiError> {
        self.begin_call()?;
        let mut state = self.lock();
        let before = state.users.len();
        state.users.retain(|u| u.id != id);
        if state.users.len() == before {
            return Err(ApiError::NotFound(format!("user {}", id)));
        }
        Ok(())
    }
}
