use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use super::filters::{Filters, PageRequest, UserSearch};
use crate::api::{ApiError, UserGateway};
use crate::error::ConsoleError;
use crate::models::{User, UserDraft, UserPage};
use crate::notify::Notifier;

/// Page size used until the table asks for something else.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Parameters governing the displayed list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    pub page: u32,
    pub page_size: u32,
    pub filters: Filters,
    /// Id of the most recently dispatched fetch.
    pub request_id: u64,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            filters: Filters::new(),
            request_id: 0,
        }
    }
}

impl QueryState {
    fn to_request(&self) -> PageRequest {
        PageRequest {
            current: self.page,
            page_size: self.page_size,
            filters: self.filters.clone(),
        }
    }
}

/// Snapshot of one page. Replaced wholesale by each applied fetch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceCollection {
    pub records: Vec<User>,
    pub total: u64,
}

/// A completed fetch travelling back from its task.
#[derive(Debug)]
struct FetchResult {
    request_id: u64,
    result: Result<UserPage, ApiError>,
}

/// What applying a completed fetch did.
#[derive(Debug)]
pub enum FetchOutcome {
    /// The reply was current and is now displayed.
    Applied,
    /// A newer fetch was dispatched after this one; the reply was dropped.
    Superseded { request_id: u64 },
    /// The current fetch failed; the previous page stays displayed.
    Failed(ConsoleError),
}

/// Owns the paginated, filtered user list.
///
/// Every fetch gets a fresh `request_id` and runs as a spawned task that
/// reports back over a channel. Only the reply carrying the latest id is ever
/// applied, which keeps out-of-order replies from overwriting newer state.
pub struct QueryController {
    gateway: Arc<dyn UserGateway>,
    notifier: Notifier,
    state: QueryState,
    collection: ResourceCollection,
    loading: bool,
    results_tx: mpsc::UnboundedSender<FetchResult>,
    results_rx: mpsc::UnboundedReceiver<FetchResult>,
}

impl QueryController {
    pub fn new(gateway: Arc<dyn UserGateway>, notifier: Notifier) -> Self {
        Self::with_page_size(gateway, notifier, DEFAULT_PAGE_SIZE)
    }

    pub fn with_page_size(
        gateway: Arc<dyn UserGateway>,
        notifier: Notifier,
        page_size: u32,
    ) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        Self {
            gateway,
            notifier,
            state: QueryState {
                page_size: page_size.max(1),
                ..QueryState::default()
            },
            collection: ResourceCollection::default(),
            loading: false,
            results_tx,
            results_rx,
        }
    }

    // =========================================================================
    // Commands
    // =========================================================================

    /// Replace the filters, go back to page 1 and fetch.
    pub fn search(&mut self, search: UserSearch) -> u64 {
        self.search_filters(Filters::from(search))
    }

    pub fn search_filters(&mut self, filters: Filters) -> u64 {
        self.state.filters = filters;
        self.state.page = 1;
        self.dispatch()
    }

    /// Move to another page or page size, keeping the filters.
    pub fn change_page(&mut self, page: u32, page_size: u32) -> u64 {
        self.state.page = page.max(1);
        self.state.page_size = page_size.max(1);
        self.dispatch()
    }

    /// Fetch again with the current parameters.
    pub fn refresh(&mut self) -> u64 {
        self.dispatch()
    }

    fn dispatch(&mut self) -> u64 {
        self.state.request_id += 1;
        self.loading = true;

        let request_id = self.state.request_id;
        let request = self.state.to_request();
        let gateway = Arc::clone(&self.gateway);
        let tx = self.results_tx.clone();

        debug!(
            request_id,
            page = request.current,
            page_size = request.page_size,
            "Dispatching user page fetch"
        );
        tokio::spawn(async move {
            let result = gateway.page(&request).await;
            if tx.send(FetchResult { request_id, result }).is_err() {
                debug!(request_id, "Fetch finished after controller was dropped");
            }
        });
        request_id
    }

    // =========================================================================
    // Completion
    // =========================================================================

    fn apply(&mut self, fetch: FetchResult) -> FetchOutcome {
        if fetch.request_id != self.state.request_id {
            debug!(
                request_id = fetch.request_id,
                latest = self.state.request_id,
                "Discarding superseded page reply"
            );
            return FetchOutcome::Superseded {
                request_id: fetch.request_id,
            };
        }

        self.loading = false;
        match fetch.result {
            Ok(page) => {
                // Server is authoritative for page, size and total.
                self.state.page = page.current.max(1);
                self.state.page_size = page.size.max(1);
                self.collection = ResourceCollection {
                    records: page.records,
                    total: page.total,
                };
                FetchOutcome::Applied
            }
            Err(e) => {
                warn!(error = %e, request_id = fetch.request_id, "Failed to load users");
                self.notifier
                    .error(format!("Failed to load users: {}", e.user_message()));
                FetchOutcome::Failed(e.into())
            }
        }
    }

    /// Apply every completed fetch without waiting.
    pub fn poll_results(&mut self) -> Vec<FetchOutcome> {
        let mut fetched = Vec::new();
        while let Ok(fetch) = self.results_rx.try_recv() {
            fetched.push(fetch);
        }
        fetched.into_iter().map(|f| self.apply(f)).collect()
    }

    /// Wait for the next completed fetch and apply it.
    pub async fn next_result(&mut self) -> Option<FetchOutcome> {
        let fetch = self.results_rx.recv().await?;
        Some(self.apply(fetch))
    }

    /// Wait until the latest dispatched fetch has been applied or failed,
    /// dropping superseded replies on the way.
    pub async fn settle(&mut self) -> Option<FetchOutcome> {
        while self.loading {
            match self.next_result().await? {
                FetchOutcome::Superseded { .. } => continue,
                outcome => return Some(outcome),
            }
        }
        None
    }

    // =========================================================================
    // Local patches from the mutation controller
    // =========================================================================

    /// Overwrite the displayed record with the given id in place.
    pub(crate) fn patch_record(&mut self, draft: &UserDraft) -> bool {
        let Some(id) = draft.id else {
            return false;
        };
        match self.collection.records.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.apply_draft(draft);
                true
            }
            None => false,
        }
    }

    /// Drop the record with the given id and count it out of the total.
    pub(crate) fn remove_record(&mut self, id: i64) -> bool {
        let before = self.collection.records.len();
        self.collection.records.retain(|u| u.id != id);
        let removed = self.collection.records.len() != before;
        if removed {
            self.collection.total = self.collection.total.saturating_sub(1);
        }
        removed
    }

    // =========================================================================
    // Reads
    // =========================================================================

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn collection(&self) -> &ResourceCollection {
        &self.collection
    }

    pub fn records(&self) -> &[User] {
        &self.collection.records
    }

    pub fn total(&self) -> u64 {
        self.collection.total
    }

    pub fn loading(&self) -> bool {
        self.loading
    }

    pub fn find(&self, id: i64) -> Option<&User> {
        self.collection.records.iter().find(|u| u.id == id)
    }

    pub fn total_pages(&self) -> u64 {
        let size = u64::from(self.state.page_size.max(1));
        self.collection.total.div_ceil(size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use serde_json::json;

    use crate::models::Role;
    use crate::notify::{self, NoticeLevel};
    use crate::testing::FakeGateway;

    fn controller(
        gateway: &Arc<FakeGateway>,
    ) -> (QueryController, tokio::sync::mpsc::UnboundedReceiver<crate::notify::Notice>) {
        let (notifier, notices) = Notifier::channel();
        let gateway: Arc<dyn UserGateway> = gateway.clone();
        (QueryController::new(gateway, notifier), notices)
    }

    #[tokio::test]
    async fn test_initial_state_defaults() {
        let gateway = Arc::new(FakeGateway::new());
        let (query, _notices) = controller(&gateway);
        assert_eq!(query.state().page, 1);
        assert_eq!(query.state().page_size, 10);
        assert!(query.state().filters.is_empty());
        assert_eq!(query.state().request_id, 0);
        assert!(!query.loading());
        assert_eq!(query.total(), 0);
    }

    #[tokio::test]
    async fn test_refresh_loads_first_page() {
        let gateway = Arc::new(FakeGateway::seeded(25));
        let (mut query, _notices) = controller(&gateway);

        let id = query.refresh();
        assert_eq!(id, 1);
        assert!(query.loading());

        assert_matches!(query.settle().await, Some(FetchOutcome::Applied));
        assert!(!query.loading());
        assert_eq!(query.records().len(), 10);
        assert_eq!(query.total(), 25);
        assert_eq!(query.total_pages(), 3);
        assert_eq!(query.records()[0].id, 1);
    }

    #[tokio::test]
    async fn test_search_omits_empty_filters_and_resets_page() {
        let gateway = Arc::new(FakeGateway::seeded(25));
        let (mut query, _notices) = controller(&gateway);

        query.change_page(3, 10);
        query.settle().await;
        assert_eq!(query.state().page, 3);

        query.search(UserSearch {
            username: Some(String::new()),
            status: None,
            role: None,
        });
        assert_eq!(query.state().page, 1);
        query.settle().await;

        let sent = gateway.page_requests();
        assert_eq!(sent.last(), Some(&json!({"current": 1, "pageSize": 10})));
    }

    #[tokio::test]
    async fn test_search_sends_only_present_filters() {
        let gateway = Arc::new(FakeGateway::seeded(25));
        let (mut query, _notices) = controller(&gateway);

        query.search(UserSearch {
            username: None,
            status: None,
            role: Some(Role::Admin),
        });
        query.settle().await;

        let sent = gateway.page_requests();
        assert_eq!(
            sent.last(),
            Some(&json!({"current": 1, "pageSize": 10, "role": "admin"}))
        );
        assert!(query.records().iter().all(|u| u.role == Role::Admin));
    }

    #[tokio::test]
    async fn test_change_page_keeps_filters() {
        let gateway = Arc::new(FakeGateway::seeded(25));
        let (mut query, _notices) = controller(&gateway);

        query.search(UserSearch {
            username: Some("user".to_string()),
            ..Default::default()
        });
        query.settle().await;
        query.change_page(2, 5);
        query.settle().await;

        let sent = gateway.page_requests();
        assert_eq!(
            sent.last(),
            Some(&json!({"current": 2, "pageSize": 5, "username": "user"}))
        );
        assert_eq!(query.state().page_size, 5);
    }

    #[tokio::test]
    async fn test_out_of_order_replies_keep_latest_page() {
        let gateway = Arc::new(FakeGateway::seeded(25));
        let release_page1 = gateway.gate_page(1);
        let release_page2 = gateway.gate_page(2);
        let (mut query, _notices) = controller(&gateway);

        let first = query.change_page(1, 10);
        let second = query.change_page(2, 10);
        assert!(second > first);

        // Page 2 answers first.
        release_page2.send(()).unwrap();
        assert_matches!(query.next_result().await, Some(FetchOutcome::Applied));
        assert_eq!(query.state().page, 2);
        assert_eq!(query.records()[0].id, 11);

        // Page 1 arrives late and must be dropped.
        release_page1.send(()).unwrap();
        assert_matches!(
            query.next_result().await,
            Some(FetchOutcome::Superseded { request_id }) if request_id == first
        );
        assert_eq!(query.state().page, 2);
        assert_eq!(query.records()[0].id, 11);
        assert!(!query.loading());
    }

    #[tokio::test]
    async fn test_stale_reply_does_not_clear_loading() {
        let gateway = Arc::new(FakeGateway::seeded(25));
        let release_page1 = gateway.gate_page(1);
        let release_page2 = gateway.gate_page(2);
        let (mut query, _notices) = controller(&gateway);

        query.change_page(1, 10);
        query.change_page(2, 10);

        release_page1.send(()).unwrap();
        assert_matches!(query.next_result().await, Some(FetchOutcome::Superseded { .. }));
        assert!(query.loading());
        assert!(query.records().is_empty());

        release_page2.send(()).unwrap();
        assert_matches!(query.next_result().await, Some(FetchOutcome::Applied));
        assert!(!query.loading());
    }

    #[tokio::test]
    async fn test_server_reconciles_page_beyond_range() {
        let gateway = Arc::new(FakeGateway::seeded(25));
        let (mut query, _notices) = controller(&gateway);

        query.change_page(9, 10);
        query.settle().await;
        assert_eq!(query.state().page, 3);
        assert_eq!(query.records().len(), 5);
    }

    #[tokio::test]
    async fn test_failure_keeps_previous_page() {
        let gateway = Arc::new(FakeGateway::seeded(25));
        let (mut query, mut notices) = controller(&gateway);

        query.refresh();
        query.settle().await;
        let before = query.collection().clone();

        gateway.fail_next(500);
        query.change_page(2, 10);
        assert_matches!(
            query.settle().await,
            Some(FetchOutcome::Failed(ConsoleError::Network(ApiError::ServerError(_))))
        );

        assert!(!query.loading());
        assert_eq!(query.collection(), &before);
        let notices = notify::drain(&mut notices);
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Error);
    }

    #[tokio::test]
    async fn test_unauthorized_failure_is_distinguishable() {
        let gateway = Arc::new(FakeGateway::seeded(3));
        let (mut query, _notices) = controller(&gateway);

        gateway.fail_next(401);
        query.refresh();
        let outcome = query.settle().await;
        assert_matches!(outcome, Some(FetchOutcome::Failed(ref e)) if e.is_unauthorized());
    }

    #[tokio::test]
    async fn test_poll_results_applies_completed() {
        let gateway = Arc::new(FakeGateway::seeded(5));
        let (mut query, _notices) = controller(&gateway);

        query.refresh();
        let mut outcomes = Vec::new();
        while outcomes.is_empty() {
            tokio::task::yield_now().await;
            outcomes = query.poll_results();
        }
        assert_matches!(outcomes.as_slice(), [FetchOutcome::Applied]);
        assert_eq!(query.total(), 5);
    }

    #[tokio::test]
    async fn test_remove_and_patch_records() {
        let gateway = Arc::new(FakeGateway::seeded(12));
        let (mut query, _notices) = controller(&gateway);
        query.refresh();
        query.settle().await;

        assert!(query.remove_record(3));
        assert_eq!(query.total(), 11);
        assert!(!query.remove_record(3));
        assert_eq!(query.total(), 11);

        let mut draft = query.find(4).unwrap().to_draft();
        draft.nickname = Some("Renamed".to_string());
        assert!(query.patch_record(&draft));
        assert_eq!(query.find(4).unwrap().nickname.as_deref(), Some("Renamed"));
    }
}
