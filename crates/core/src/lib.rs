pub mod api;
pub mod cache;
pub mod config;
pub mod errors;
pub mod models;
pub mod services;

use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use tokio::sync::broadcast;

use api::traits::PortfolioApi;
use cache::fetcher::fetch_query;
use cache::key::QueryKey;
use cache::query_cache::{CacheEvent, QueryCache, QueryStatus};
use cache::store::CacheStore;
use config::ClientConfig;
use errors::CoreError;
use models::{
    draft::{AddHoldingDraft, EditDraft},
    holding::Holding,
    portfolio::Portfolio,
    requests::BulkDeleteRequest,
    sort::{SortConfig, SortKey},
    view::{DashboardView, HoldingRow, HoldingsStatus, HoldingsView, Notification},
};
use services::{
    add_holding_service::AddHoldingForm,
    analytics_service::AnalyticsService,
    edit_service::EditSession,
    error_boundary::{Boundary, ErrorBoundary},
    portfolio_service::{rename_target, validate_portfolio_name, PortfolioSelector},
    selection_service::SelectionSet,
    sort_service::sort_holdings,
    upload_service::UploadPicker,
};

/// Main entry point of the dashboard client core.
///
/// Owns the API client, the query cache and all view state. The data flow
/// is: selector picks a portfolio → its holdings key is mounted in the cache
/// → polling fetches it through the API → views render from the cache.
/// Mutations go straight to the API and, on success only, invalidate the
/// affected keys and refetch.
///
/// Single owner: every method takes `&mut self`, so reads never race a
/// write. Callers pass `now` explicitly.
#[must_use]
pub struct PortfolioDashboard {
    config: ClientConfig,
    api: Box<dyn PortfolioApi>,
    store: Box<dyn CacheStore>,
    cache: QueryCache,
    selector: PortfolioSelector,
    mounted_holdings: Option<QueryKey>,
    analytics: AnalyticsService,
    sort: SortConfig,
    edit: EditSession,
    selection: SelectionSet,
    add_form: AddHoldingForm,
    upload: UploadPicker,
    boundary: ErrorBoundary,
    notifications: Vec<Notification>,
}

impl std::fmt::Debug for PortfolioDashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PortfolioDashboard")
            .field("base_url", &self.config.base_url)
            .field("cached_queries", &self.cache.len())
            .field("selected", &self.selector.selected_id())
            .field("editing", &self.edit.editing_id())
            .field("selection", &self.selection.len())
            .field("boundary_tripped", &self.boundary.has_error())
            .finish()
    }
}

impl PortfolioDashboard {
    /// Build a dashboard, restoring whatever the store holds from a previous session.
    pub fn new(
        config: ClientConfig,
        api: Box<dyn PortfolioApi>,
        store: Box<dyn CacheStore>,
        now: DateTime<Utc>,
    ) -> Result<Self, CoreError> {
        config.validate()?;
        let cache = QueryCache::restore(&config, store.as_ref(), now);
        let mut dashboard = Self {
            config,
            api,
            store,
            cache,
            selector: PortfolioSelector::new(),
            mounted_holdings: None,
            analytics: AnalyticsService::new(),
            sort: SortConfig::default(),
            edit: EditSession::new(),
            selection: SelectionSet::new(),
            add_form: AddHoldingForm::new(),
            upload: UploadPicker::new(),
            boundary: ErrorBoundary::new(),
            notifications: Vec::new(),
        };
        dashboard.cache.mount(&QueryKey::Portfolios);
        dashboard.sync_selection();
        Ok(dashboard)
    }

    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    #[must_use]
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    /// Change notifications for every cache key.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheEvent> {
        self.cache.subscribe()
    }

    // ── Fetching & polling ──────────────────────────────────────────

    /// Cached portfolio list in server order (empty until the first fetch).
    #[must_use]
    pub fn portfolios(&self) -> &[Portfolio] {
        self.cache.portfolios().unwrap_or(&[])
    }

    /// Fetch the portfolio list and apply the default selection.
    pub async fn load_portfolios(&mut self, now: DateTime<Utc>) -> Result<Vec<Portfolio>, CoreError> {
        self.fetch_key(QueryKey::Portfolios, now).await?;
        Ok(self.portfolios().to_vec())
    }

    /// Fetch holdings for the active portfolio.
    pub async fn refresh_holdings(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        let key = self
            .mounted_holdings
            .clone()
            .ok_or(CoreError::NoPortfolioSelected)?;
        self.fetch_key(key, now).await
    }

    /// Fetch every mounted key that is due. Failures land in the cache as
    /// error states. Returns the number of fetches issued.
    pub async fn poll(&mut self, now: DateTime<Utc>) -> usize {
        let due = self.cache.due_keys(now);
        let count = due.len();
        for key in due {
            if let Err(e) = self.fetch_key(key.clone(), now).await {
                debug!("Poll of {key} failed: {e}");
            }
        }
        count
    }

    /// When [`poll`](Self::poll) next has work to do.
    #[must_use]
    pub fn next_poll_at(&self) -> Option<DateTime<Utc>> {
        self.cache.next_due_at()
    }

    /// Poll on the cache's schedule until `shutdown` fires. The interval is
    /// re-read after every round, so it follows the market state.
    #[cfg(not(target_arch = "wasm32"))]
    pub async fn run_polling(&mut self, mut shutdown: tokio::sync::oneshot::Receiver<()>) {
        info!("Polling started");
        loop {
            self.poll(Utc::now()).await;
            let wait = self
                .next_poll_at()
                .map(|at| (at - Utc::now()).to_std().unwrap_or_default())
                .unwrap_or(self.config.closed_market_poll_interval);
            tokio::select! {
                _ = tokio::time::sleep(wait) => {}
                _ = &mut shutdown => {
                    info!("Polling stopped");
                    return;
                }
            }
        }
    }

    /// Write the cache to the store, evicting expired entries first.
    pub fn persist(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        self.cache.gc(now);
        self.cache.persist(self.store.as_ref(), &self.config, now)
    }

    // ── Portfolios ──────────────────────────────────────────────────

    #[must_use]
    pub fn selected_portfolio_id(&self) -> Option<&str> {
        self.selector.selected_id()
    }

    pub fn select_portfolio(&mut self, id: &str) -> Result<(), CoreError> {
        if !self.portfolios().iter().any(|p| p.id == id) {
            return Err(CoreError::NotFound(format!("portfolio {id}")));
        }
        self.selector.select(id);
        self.remount_holdings();
        Ok(())
    }

    /// Create a portfolio and make it the active one.
    pub async fn create_portfolio(
        &mut self,
        name: &str,
        now: DateTime<Utc>,
    ) -> Result<Portfolio, CoreError> {
        let name = validate_portfolio_name(name).map_err(|e| self.mutation_failed("Create portfolio", e))?;
        let created = match self.api.create_portfolio(&name).await {
            Ok(p) => p,
            Err(e) => return Err(self.mutation_failed("Create portfolio", e)),
        };
        info!("Created portfolio {} ({})", created.name, created.id);
        self.selector.select(created.id.clone());
        self.remount_holdings();
        self.cache.invalidate(&QueryKey::Portfolios);
        self.poll(now).await;
        Ok(created)
    }

    /// Rename a portfolio. `None`, a blank name or the current name is a
    /// no-op and returns `Ok(false)` without a request.
    pub async fn rename_portfolio(
        &mut self,
        id: &str,
        new_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<bool, CoreError> {
        let current = self
            .portfolios()
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("portfolio {id}")))?;
        let Some(name) = rename_target(&current, new_name) else {
            return Ok(false);
        };
        if let Err(e) = self.api.rename_portfolio(id, &name).await {
            return Err(self.mutation_failed("Rename portfolio", e));
        }
        self.cache.invalidate(&QueryKey::Portfolios);
        self.poll(now).await;
        Ok(true)
    }

    // ── Sorting ─────────────────────────────────────────────────────

    #[must_use]
    pub fn sort(&self) -> SortConfig {
        self.sort
    }

    pub fn request_sort(&mut self, key: SortKey) {
        self.sort.request(key);
    }

    // ── Inline editing ──────────────────────────────────────────────

    #[must_use]
    pub fn editing_id(&self) -> Option<&str> {
        self.edit.editing_id()
    }

    pub fn begin_edit(&mut self, isin: &str) -> Result<(), CoreError> {
        let holding = self
            .current_holdings()
            .iter()
            .find(|h| h.isin == isin)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("holding {isin}")))?;
        self.edit.begin(&holding);
        Ok(())
    }

    pub fn edit_draft_mut(&mut self) -> Option<&mut EditDraft> {
        self.edit.draft_mut()
    }

    pub fn cancel_edit(&mut self) {
        self.edit.cancel();
    }

    /// Submit the draft. On failure the row stays in edit mode with the draft intact.
    pub async fn save_edit(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        let key = self.holdings_key()?;
        let update = self
            .edit
            .submission(self.active_portfolio_id()?)
            .map_err(|e| self.mutation_failed("Save", e))?;
        if let Err(e) = self.api.update_settings(&update).await {
            return Err(self.mutation_failed("Save", e));
        }
        self.edit.finish();
        self.cache.invalidate(&key);
        self.poll(now).await;
        Ok(())
    }

    // ── Selection & bulk delete ─────────────────────────────────────

    pub fn toggle_selection(&mut self, isin: &str) -> bool {
        self.selection.toggle(isin)
    }

    pub fn toggle_select_all(&mut self) {
        let holdings = self.current_holdings().to_vec();
        self.selection.toggle_all(&holdings);
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    #[must_use]
    pub fn selection(&self) -> &SelectionSet {
        &self.selection
    }

    /// Delete every selected holding in one request. The selection survives a failure.
    pub async fn delete_selected(&mut self, now: DateTime<Utc>) -> Result<usize, CoreError> {
        let key = self.holdings_key()?;
        if self.selection.is_empty() {
            return Err(self.mutation_failed(
                "Delete",
                CoreError::ValidationError("No holdings selected".into()),
            ));
        }
        let request = BulkDeleteRequest {
            portfolio_id: self.active_portfolio_id()?.to_string(),
            isins: self.selection.isins(),
        };
        if let Err(e) = self.api.delete_holdings(&request).await {
            return Err(self.mutation_failed("Delete", e));
        }
        let deleted = request.isins.len();
        info!("Deleted {deleted} holdings from {}", request.portfolio_id);
        self.selection.clear();
        self.cache.invalidate(&key);
        self.poll(now).await;
        Ok(deleted)
    }

    // ── Add holding ─────────────────────────────────────────────────

    pub fn open_add_form(&mut self) {
        self.add_form.open();
    }

    pub fn close_add_form(&mut self) {
        self.add_form.close();
    }

    pub fn add_form_mut(&mut self) -> Option<&mut AddHoldingDraft> {
        self.add_form.draft_mut()
    }

    /// Submit the add-holding modal. On failure it stays open with its draft.
    pub async fn submit_add_form(&mut self, now: DateTime<Utc>) -> Result<(), CoreError> {
        let key = self.holdings_key()?;
        let request = self
            .add_form
            .submission(self.active_portfolio_id()?)
            .map_err(|e| self.mutation_failed("Add holding", e))?;
        if let Err(e) = self.api.add_holding(&request).await {
            return Err(self.mutation_failed("Add holding", e));
        }
        self.add_form.close();
        self.cache.invalidate(&key);
        self.poll(now).await;
        Ok(())
    }

    // ── Upload & auto-discovery ─────────────────────────────────────

    /// Upload a picked spreadsheet right away.
    pub async fn upload_file(
        &mut self,
        file_name: &str,
        bytes: Vec<u8>,
        now: DateTime<Utc>,
    ) -> Result<(), CoreError> {
        let file = self
            .upload
            .pick(file_name, bytes)
            .map_err(|e| self.mutation_failed("Upload", e))?;
        self.upload.set_pending(true);
        let result = self.api.upload(&file).await;
        self.upload.set_pending(false);
        if let Err(e) = result {
            return Err(self.mutation_failed("Upload", e));
        }
        self.notifications
            .push(Notification::info("Portfolio updated successfully!"));
        self.cache.invalidate_where(QueryKey::is_holdings);
        self.poll(now).await;
        Ok(())
    }

    /// Ask the backend to look up missing tickers. Returns how many were updated.
    pub async fn auto_discover(&mut self, now: DateTime<Utc>) -> Result<u64, CoreError> {
        let response = match self.api.auto_discover().await {
            Ok(r) => r,
            Err(e) => return Err(self.mutation_failed("Auto-discovery", e)),
        };
        self.notifications.push(Notification::info(format!(
            "Auto-discovery completed! Updated {} tickers.",
            response.updated
        )));
        self.cache.invalidate_where(QueryKey::is_holdings);
        self.poll(now).await;
        Ok(response.updated)
    }

    // ── Notifications ───────────────────────────────────────────────

    /// Drain pending user-facing messages, oldest first.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    // ── Rendering ───────────────────────────────────────────────────

    /// Produce the current view. Render failures trip the error boundary,
    /// after which this keeps returning the fallback until [`reload`](Self::reload).
    pub fn render(&mut self) -> DashboardView {
        // Take the boundary out so the render closure can borrow `self`.
        let mut boundary = std::mem::take(&mut self.boundary);
        let outcome = boundary.render(|| self.build_view());
        self.boundary = boundary;

        match outcome {
            Boundary::Rendered(view) => view,
            Boundary::Fallback { message } => DashboardView::Fallback { message },
        }
    }

    /// The recovery screen's reload: drop all session state and start
    /// again from the persisted cache.
    pub fn reload(&mut self, now: DateTime<Utc>) {
        info!("Reloading dashboard");
        self.cache = QueryCache::restore(&self.config, self.store.as_ref(), now);
        self.selector = PortfolioSelector::new();
        self.mounted_holdings = None;
        self.sort = SortConfig::default();
        self.edit = EditSession::new();
        self.selection = SelectionSet::new();
        self.add_form = AddHoldingForm::new();
        self.upload = UploadPicker::new();
        self.boundary = ErrorBoundary::new();
        self.notifications.clear();
        self.cache.mount(&QueryKey::Portfolios);
        self.sync_selection();
    }

    fn build_view(&self) -> Result<DashboardView, CoreError> {
        let portfolios_state = self.cache.get(&QueryKey::Portfolios);
        let portfolios = self.portfolios();

        let Some(selected) = self.selector.selected_in(portfolios) else {
            return Ok(DashboardView::Placeholder {
                loading: portfolios_state.map_or(true, |s| {
                    s.is_fetching || s.status() == QueryStatus::Loading
                }),
                error: portfolios_state.and_then(|s| s.error.clone()),
            });
        };

        Ok(DashboardView::Ready {
            portfolios: portfolios.to_vec(),
            selected: selected.clone(),
            holdings: self.build_holdings_view(&selected.id)?,
        })
    }

    fn build_holdings_view(&self, portfolio_id: &str) -> Result<HoldingsView, CoreError> {
        let state = self.cache.get(&QueryKey::holdings(portfolio_id));
        let status = match state {
            Some(s) => match s.status() {
                QueryStatus::Loading => HoldingsStatus::Loading,
                QueryStatus::Error => HoldingsStatus::Error(s.error.clone().unwrap_or_default()),
                QueryStatus::Success => HoldingsStatus::Ready,
            },
            None => HoldingsStatus::Loading,
        };

        let response = match status {
            HoldingsStatus::Ready => state.and_then(|s| s.holdings()),
            _ => None,
        };
        let holdings: &[Holding] = response
            .map(|r| r.holdings.as_slice())
            .unwrap_or_default();
        ensure_unique_isins(holdings)?;

        let editing = self.edit.editing_id();
        let rows = sort_holdings(holdings, &self.sort)
            .into_iter()
            .map(|h| HoldingRow::new(h, editing == Some(h.isin.as_str()), self.selection.contains(&h.isin)))
            .collect();

        Ok(HoldingsView {
            portfolio_id: portfolio_id.to_string(),
            status,
            rows,
            totals: self.analytics.compute_totals(holdings),
            sort: self.sort,
            is_market_open: response.is_some_and(|r| r.is_market_open),
            last_refreshed: state.and_then(|s| s.data_updated_at),
            is_fetching: state.is_some_and(|s| s.is_fetching),
            edit_draft: self.edit.draft().cloned(),
            selected_count: self.selection.len(),
            all_selected: self.selection.is_all(holdings),
            add_form: self.add_form.draft().cloned(),
            upload_pending: self.upload.is_pending(),
        })
    }

    // ── Internal ────────────────────────────────────────────────────

    async fn fetch_key(&mut self, key: QueryKey, now: DateTime<Utc>) -> Result<(), CoreError> {
        let ticket = self.cache.begin_fetch(&key);
        let result = fetch_query(self.api.as_ref(), &key).await;
        let failure = result.as_ref().err().cloned();

        if self.cache.complete_fetch(ticket, result, now) {
            // A failed fetch keeps the last data; reconciling against it
            // would undo selections made since.
            if failure.is_none() {
                self.after_fetch(&key);
            }
            if let Err(e) = self.persist(now) {
                warn!("Could not persist cache: {e}");
            }
        }
        failure.map_or(Ok(()), Err)
    }

    fn after_fetch(&mut self, key: &QueryKey) {
        match key {
            QueryKey::Portfolios => self.sync_selection(),
            QueryKey::Holdings { .. } if self.mounted_holdings.as_ref() == Some(key) => {
                let holdings = self.current_holdings().to_vec();
                let dropped = self.selection.retain_existing(&holdings);
                if dropped > 0 {
                    debug!("Dropped {dropped} selected holdings that no longer exist");
                }
                if let Some(isin) = self.edit.editing_id() {
                    if !holdings.iter().any(|h| h.isin == isin) {
                        debug!("Holding {isin} disappeared while being edited");
                        self.edit.cancel();
                    }
                }
            }
            QueryKey::Holdings { .. } => {}
        }
    }

    fn sync_selection(&mut self) {
        let portfolios = self.portfolios().to_vec();
        if let Some(id) = self.selector.reconcile(&portfolios) {
            debug!("Active portfolio is now {id}");
        }
        self.remount_holdings();
    }

    /// Point the holdings observer at the selected portfolio. Per-portfolio
    /// view state is dropped when the portfolio changes.
    fn remount_holdings(&mut self) {
        let wanted = self.selector.selected_id().map(QueryKey::holdings);
        if wanted == self.mounted_holdings {
            return;
        }
        if let Some(old) = self.mounted_holdings.take() {
            self.cache.unmount(&old);
        }
        self.edit.cancel();
        self.selection.clear();
        self.add_form.close();
        if let Some(key) = &wanted {
            self.cache.mount(key);
        }
        self.mounted_holdings = wanted;
    }

    fn holdings_key(&self) -> Result<QueryKey, CoreError> {
        self.mounted_holdings
            .clone()
            .ok_or(CoreError::NoPortfolioSelected)
    }

    fn active_portfolio_id(&self) -> Result<&str, CoreError> {
        self.selector.selected_id().ok_or(CoreError::NoPortfolioSelected)
    }

    fn current_holdings(&self) -> &[Holding] {
        self.selector
            .selected_id()
            .and_then(|id| self.cache.holdings(id))
            .map(|r| r.holdings.as_slice())
            .unwrap_or_default()
    }

    /// Record a failed mutation for the user and hand the error back.
    fn mutation_failed(&mut self, action: &str, error: CoreError) -> CoreError {
        warn!("{action} failed: {error}");
        self.notifications.push(Notification::error(format!(
            "{action} failed: {}",
            error.user_detail()
        )));
        error
    }
}

fn ensure_unique_isins(holdings: &[Holding]) -> Result<(), CoreError> {
    let mut seen = std::collections::HashSet::with_capacity(holdings.len());
    for h in holdings {
        if !seen.insert(h.isin.as_str()) {
            return Err(CoreError::Render(format!("duplicate ISIN {} in holdings", h.isin)));
        }
    }
    Ok(())
}
