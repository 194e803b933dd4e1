use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use portfolio_dashboard_core::api::traits::PortfolioApi;
use portfolio_dashboard_core::cache::key::QueryKey;
use portfolio_dashboard_core::cache::query_cache::{CacheEvent, CacheEventKind};
use portfolio_dashboard_core::cache::store::{FileStore, MemoryStore};
use portfolio_dashboard_core::config::ClientConfig;
use portfolio_dashboard_core::errors::CoreError;
use portfolio_dashboard_core::models::holding::{Holding, HoldingsResponse};
use portfolio_dashboard_core::models::portfolio::Portfolio;
use portfolio_dashboard_core::models::requests::{
    Ack, AddHoldingRequest, BulkDeleteRequest, DiscoverResponse, SettingsUpdate, UploadFile,
};
use portfolio_dashboard_core::models::sort::{SortDirection, SortKey};
use portfolio_dashboard_core::models::view::{
    DashboardView, HoldingsStatus, HoldingsView, Notification, NotificationLevel,
};
use portfolio_dashboard_core::PortfolioDashboard;
use tokio::sync::broadcast;

// ═══════════════════════════════════════════════════════════════════
// Mock API (in-memory backend with call log and injectable failures)
// ═══════════════════════════════════════════════════════════════════

#[derive(Default)]
struct MockState {
    portfolios: Vec<Portfolio>,
    holdings: HashMap<String, HoldingsResponse>,
    calls: Vec<String>,
    failing: HashSet<&'static str>,
    fail_detail: Option<String>,
    next_id: u32,
    last_settings: Option<SettingsUpdate>,
    last_add: Option<AddHoldingRequest>,
    last_delete: Option<BulkDeleteRequest>,
    last_upload: Option<UploadFile>,
}

/// Cloneable handle: the test keeps one, the dashboard owns another.
#[derive(Clone, Default)]
struct MockApi {
    state: Arc<Mutex<MockState>>,
}

impl MockApi {
    fn with_portfolio(id: &str, name: &str, holdings: Vec<Holding>, market_open: bool) -> Self {
        let api = Self::default();
        api.add_portfolio(id, name, holdings, market_open);
        api
    }

    fn add_portfolio(&self, id: &str, name: &str, holdings: Vec<Holding>, market_open: bool) {
        let mut s = self.state.lock().unwrap();
        s.portfolios.push(Portfolio::new(id, name));
        s.holdings.insert(
            id.to_string(),
            HoldingsResponse {
                holdings,
                is_market_open: market_open,
            },
        );
    }

    fn set_holdings(&self, id: &str, holdings: Vec<Holding>, market_open: bool) {
        self.state.lock().unwrap().holdings.insert(
            id.to_string(),
            HoldingsResponse {
                holdings,
                is_market_open: market_open,
            },
        );
    }

    fn fail(&self, method: &'static str) {
        self.state.lock().unwrap().failing.insert(method);
    }

    fn fail_with_detail(&self, method: &'static str, detail: &str) {
        let mut s = self.state.lock().unwrap();
        s.failing.insert(method);
        s.fail_detail = Some(detail.to_string());
    }

    fn calls(&self) -> Vec<String> {
        self.state.lock().unwrap().calls.clone()
    }

    fn count(&self, method: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == method).count()
    }

    fn record(&self, method: &'static str) -> Result<std::sync::MutexGuard<'_, MockState>, CoreError> {
        let mut s = self.state.lock().unwrap();
        s.calls.push(method.to_string());
        if s.failing.contains(method) {
            return Err(CoreError::Api {
                status: 500,
                detail: Some(s.fail_detail.clone().unwrap_or_else(|| "Server exploded".into())),
            });
        }
        Ok(s)
    }
}

fn ok_ack() -> Ack {
    Ack {
        success: Some(true),
        ..Ack::default()
    }
}

#[async_trait]
impl PortfolioApi for MockApi {
    async fn list_portfolios(&self) -> Result<Vec<Portfolio>, CoreError> {
        Ok(self.record("list_portfolios")?.portfolios.clone())
    }

    async fn create_portfolio(&self, name: &str) -> Result<Portfolio, CoreError> {
        let mut s = self.record("create_portfolio")?;
        s.next_id += 1;
        let portfolio = Portfolio::new(format!("new-{}", s.next_id), name);
        s.portfolios.push(portfolio.clone());
        Ok(portfolio)
    }

    async fn rename_portfolio(&self, id: &str, name: &str) -> Result<Ack, CoreError> {
        let mut s = self.record("rename_portfolio")?;
        if let Some(p) = s.portfolios.iter_mut().find(|p| p.id == id) {
            p.name = name.to_string();
        }
        Ok(ok_ack())
    }

    async fn delete_portfolio(&self, id: &str) -> Result<Ack, CoreError> {
        let mut s = self.record("delete_portfolio")?;
        s.portfolios.retain(|p| p.id != id);
        Ok(ok_ack())
    }

    async fn get_holdings(&self, portfolio_id: &str) -> Result<HoldingsResponse, CoreError> {
        let s = self.record("get_holdings")?;
        Ok(s.holdings.get(portfolio_id).cloned().unwrap_or_default())
    }

    async fn add_holding(&self, request: &AddHoldingRequest) -> Result<Ack, CoreError> {
        let mut s = self.record("add_holding")?;
        s.last_add = Some(request.clone());
        let mut holding = Holding::new(
            &request.isin,
            &request.stock_name,
            request.quantity as f64,
            request.average_buy_price,
        );
        holding.ticker = request.ticker.clone();
        if let Some(response) = s.holdings.get_mut(&request.portfolio_id) {
            response.holdings.push(holding);
        }
        Ok(ok_ack())
    }

    async fn delete_holdings(&self, request: &BulkDeleteRequest) -> Result<Ack, CoreError> {
        let mut s = self.record("delete_holdings")?;
        s.last_delete = Some(request.clone());
        if let Some(response) = s.holdings.get_mut(&request.portfolio_id) {
            response.holdings.retain(|h| !request.isins.contains(&h.isin));
        }
        Ok(ok_ack())
    }

    async fn update_settings(&self, update: &SettingsUpdate) -> Result<Ack, CoreError> {
        let mut s = self.record("update_settings")?;
        s.last_settings = Some(update.clone());
        if let Some(h) = s
            .holdings
            .get_mut(&update.portfolio_id)
            .and_then(|r| r.holdings.iter_mut().find(|h| h.isin == update.isin))
        {
            h.target = update.target;
            h.stop_loss = update.stop_loss;
        }
        Ok(ok_ack())
    }

    async fn auto_discover(&self) -> Result<DiscoverResponse, CoreError> {
        self.record("auto_discover")?;
        Ok(DiscoverResponse { updated: 3 })
    }

    async fn upload(&self, file: &UploadFile) -> Result<Ack, CoreError> {
        let mut s = self.record("upload")?;
        s.last_upload = Some(file.clone());
        Ok(ok_ack())
    }
}

// ═══════════════════════════════════════════════════════════════════
// Helpers
// ═══════════════════════════════════════════════════════════════════

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
}

fn holding(isin: &str, name: &str, price: Option<f64>, total_return: Option<f64>) -> Holding {
    let mut h = Holding::new(isin, name, 10.0, 100.0);
    h.current_price = price;
    h.total_return_percent = total_return;
    h
}

fn sample_holdings() -> Vec<Holding> {
    vec![
        holding("A", "Alpha", Some(110.0), Some(10.0)),
        holding("B", "Beta", Some(150.0), Some(50.0)),
        holding("C", "Gamma", None, None),
    ]
}

fn dashboard_for(api: &MockApi) -> PortfolioDashboard {
    PortfolioDashboard::new(
        ClientConfig::default(),
        Box::new(api.clone()),
        Box::new(MemoryStore::new()),
        t0(),
    )
    .unwrap()
}

/// Dashboard with portfolios and the default portfolio's holdings loaded.
async fn loaded(api: &MockApi) -> PortfolioDashboard {
    let mut dashboard = dashboard_for(api);
    dashboard.load_portfolios(t0()).await.unwrap();
    dashboard.refresh_holdings(t0()).await.unwrap();
    dashboard
}

fn holdings_view(view: DashboardView) -> HoldingsView {
    match view {
        DashboardView::Ready { holdings, .. } => holdings,
        other => panic!("expected ready view, got {other:?}"),
    }
}

fn drain(rx: &mut broadcast::Receiver<CacheEvent>) -> Vec<CacheEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn error_messages(notifications: &[Notification]) -> Vec<&str> {
    notifications
        .iter()
        .filter(|n| n.level == NotificationLevel::Error)
        .map(|n| n.message.as_str())
        .collect()
}

// ═══════════════════════════════════════════════════════════════════
// Portfolio selection
// ═══════════════════════════════════════════════════════════════════

mod portfolio_selection {
    use super::*;

    #[tokio::test]
    async fn first_portfolio_selected_by_default() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        api.add_portfolio("p2", "Growth", vec![], false);
        let mut dashboard = dashboard_for(&api);

        let list = dashboard.load_portfolios(t0()).await.unwrap();

        assert_eq!(list.len(), 2);
        assert_eq!(dashboard.selected_portfolio_id(), Some("p1"));
    }

    #[tokio::test]
    async fn placeholder_while_portfolios_load() {
        let api = MockApi::with_portfolio("p1", "Core", vec![], false);
        let mut dashboard = dashboard_for(&api);

        assert_eq!(
            dashboard.render(),
            DashboardView::Placeholder {
                loading: true,
                error: None
            }
        );
    }

    #[tokio::test]
    async fn empty_portfolio_list_renders_placeholder() {
        let api = MockApi::default();
        let mut dashboard = dashboard_for(&api);
        dashboard.load_portfolios(t0()).await.unwrap();

        assert_eq!(dashboard.selected_portfolio_id(), None);
        assert_eq!(
            dashboard.render(),
            DashboardView::Placeholder {
                loading: false,
                error: None
            }
        );
    }

    #[tokio::test]
    async fn failed_portfolio_fetch_shows_error_in_placeholder() {
        let api = MockApi::default();
        api.fail("list_portfolios");
        let mut dashboard = dashboard_for(&api);

        let result = dashboard.load_portfolios(t0()).await;

        assert!(matches!(result, Err(CoreError::Api { status: 500, .. })));
        match dashboard.render() {
            DashboardView::Placeholder { loading, error } => {
                assert!(!loading);
                assert!(error.unwrap().contains("Server exploded"));
            }
            other => panic!("expected placeholder, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn switching_portfolio_moves_holdings_observer() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        api.add_portfolio("p2", "Growth", vec![holding("Z", "Zeta", Some(1.0), None)], false);
        let mut dashboard = loaded(&api).await;
        dashboard.toggle_selection("A");

        dashboard.select_portfolio("p2").unwrap();
        dashboard.refresh_holdings(t0()).await.unwrap();

        let cache = dashboard.cache();
        assert_eq!(cache.get(&QueryKey::holdings("p1")).unwrap().observers(), 0);
        assert_eq!(cache.get(&QueryKey::holdings("p2")).unwrap().observers(), 1);
        assert!(dashboard.selection().is_empty());

        let view = holdings_view(dashboard.render());
        assert_eq!(view.portfolio_id, "p2");
        assert_eq!(view.rows.len(), 1);
    }

    #[tokio::test]
    async fn selecting_unknown_portfolio_is_not_found() {
        let api = MockApi::with_portfolio("p1", "Core", vec![], false);
        let mut dashboard = loaded(&api).await;

        let result = dashboard.select_portfolio("nope");

        assert!(matches!(result, Err(CoreError::NotFound(_))));
        assert_eq!(dashboard.selected_portfolio_id(), Some("p1"));
    }

    #[tokio::test]
    async fn create_portfolio_selects_and_lists_it() {
        let api = MockApi::with_portfolio("p1", "Core", vec![], false);
        let mut dashboard = loaded(&api).await;

        let created = dashboard.create_portfolio("  Dividends ", t0()).await.unwrap();

        assert_eq!(created.name, "Dividends");
        assert_eq!(dashboard.selected_portfolio_id(), Some(created.id.as_str()));
        assert!(dashboard.portfolios().iter().any(|p| p.id == created.id));
    }

    #[tokio::test]
    async fn created_portfolio_stays_active_when_list_refetch_fails() {
        let api = MockApi::with_portfolio("p1", "Core", vec![], false);
        let mut dashboard = loaded(&api).await;
        api.fail("list_portfolios");

        let created = dashboard.create_portfolio("Growth", t0()).await.unwrap();

        assert_eq!(dashboard.selected_portfolio_id(), Some(created.id.as_str()));
        assert_eq!(
            dashboard.cache().get(&QueryKey::holdings(&created.id)).unwrap().observers(),
            1
        );

        api.state.lock().unwrap().failing.remove("list_portfolios");
        dashboard.load_portfolios(t0()).await.unwrap();

        assert_eq!(dashboard.selected_portfolio_id(), Some(created.id.as_str()));
    }

    #[tokio::test]
    async fn blank_portfolio_name_never_reaches_the_server() {
        let api = MockApi::with_portfolio("p1", "Core", vec![], false);
        let mut dashboard = loaded(&api).await;

        let result = dashboard.create_portfolio("   ", t0()).await;

        assert!(matches!(result, Err(CoreError::ValidationError(_))));
        assert_eq!(api.count("create_portfolio"), 0);
        assert_eq!(error_messages(&dashboard.take_notifications()).len(), 1);
    }

    #[tokio::test]
    async fn rename_to_same_name_is_a_no_op() {
        let api = MockApi::with_portfolio("p1", "Core", vec![], false);
        let mut dashboard = loaded(&api).await;

        assert!(!dashboard.rename_portfolio("p1", Some(" Core "), t0()).await.unwrap());
        assert!(!dashboard.rename_portfolio("p1", None, t0()).await.unwrap());
        assert_eq!(api.count("rename_portfolio"), 0);
    }

    #[tokio::test]
    async fn rename_refetches_portfolio_list() {
        let api = MockApi::with_portfolio("p1", "Core", vec![], false);
        let mut dashboard = loaded(&api).await;

        assert!(dashboard.rename_portfolio("p1", Some("Main"), t0()).await.unwrap());

        assert_eq!(dashboard.portfolios()[0].name, "Main");
    }
}

// ═══════════════════════════════════════════════════════════════════
// Holdings view
// ═══════════════════════════════════════════════════════════════════

mod holdings_view {
    use super::*;

    #[tokio::test]
    async fn rows_sorted_by_total_return_desc_by_default() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;

        let view = holdings_view(dashboard.render());

        assert_eq!(view.status, HoldingsStatus::Ready);
        let order: Vec<&str> = view.rows.iter().map(|r| r.holding.isin.as_str()).collect();
        assert_eq!(order, vec!["B", "A", "C"]);
        assert!(view.rows[0].highlight);
        assert_eq!(view.rows[2].current_value, None);
    }

    #[tokio::test]
    async fn totals_treat_unknown_price_as_zero() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;

        let totals = holdings_view(dashboard.render()).totals;

        assert_eq!(totals.total_stocks, 3);
        assert_eq!(totals.total_value, 2600.0);
        assert_eq!(totals.total_investment, 3000.0);
        assert_eq!(totals.total_return_amount, -400.0);
    }

    #[tokio::test]
    async fn request_sort_reorders_rows() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;

        dashboard.request_sort(SortKey::StockName);
        let asc = holdings_view(dashboard.render());
        dashboard.request_sort(SortKey::StockName);
        let desc = holdings_view(dashboard.render());

        assert_eq!(asc.sort.direction, SortDirection::Asc);
        assert_eq!(asc.rows[0].holding.stock_name, "Alpha");
        assert_eq!(desc.sort.direction, SortDirection::Desc);
        assert_eq!(desc.rows[0].holding.stock_name, "Gamma");
    }

    #[tokio::test]
    async fn failed_holdings_fetch_shows_error_in_place_of_data() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        api.fail("get_holdings");
        let mut dashboard = dashboard_for(&api);
        dashboard.load_portfolios(t0()).await.unwrap();

        assert!(dashboard.refresh_holdings(t0()).await.is_err());

        let view = holdings_view(dashboard.render());
        assert!(matches!(view.status, HoldingsStatus::Error(ref m) if m.contains("Server exploded")));
        assert!(view.rows.is_empty());
        // The portfolio list is untouched by the holdings failure.
        assert_eq!(dashboard.portfolios().len(), 1);
    }

    #[tokio::test]
    async fn refresh_without_portfolio_is_an_error() {
        let api = MockApi::default();
        let mut dashboard = dashboard_for(&api);

        let result = dashboard.refresh_holdings(t0()).await;

        assert_eq!(result, Err(CoreError::NoPortfolioSelected));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Polling
// ═══════════════════════════════════════════════════════════════════

mod polling {
    use super::*;

    #[tokio::test]
    async fn interval_follows_market_state() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), true);
        let mut dashboard = loaded(&api).await;

        assert_eq!(dashboard.next_poll_at(), Some(t0() + Duration::seconds(2)));

        api.set_holdings("p1", sample_holdings(), false);
        let tick = t0() + Duration::seconds(2);
        assert_eq!(dashboard.poll(tick).await, 1);

        assert_eq!(dashboard.next_poll_at(), Some(tick + Duration::seconds(600)));
    }

    #[tokio::test]
    async fn nothing_due_before_interval() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;
        let before = api.count("get_holdings");

        assert_eq!(dashboard.poll(t0() + Duration::seconds(599)).await, 0);
        assert_eq!(api.count("get_holdings"), before);
    }

    #[tokio::test]
    async fn first_poll_loads_portfolios_then_holdings() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = dashboard_for(&api);

        dashboard.poll(t0()).await;
        dashboard.poll(t0()).await;

        assert_eq!(api.calls(), vec!["list_portfolios", "get_holdings"]);
        assert_eq!(holdings_view(dashboard.render()).rows.len(), 3);
    }

    #[tokio::test]
    async fn refetch_drops_vanished_selection() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;
        dashboard.toggle_selection("A");
        dashboard.toggle_selection("B");

        api.set_holdings("p1", vec![holding("B", "Beta", Some(150.0), Some(50.0))], false);
        dashboard.refresh_holdings(t0()).await.unwrap();

        assert_eq!(dashboard.selection().isins(), vec!["B".to_string()]);
        assert!(holdings_view(dashboard.render()).all_selected);
    }

    #[tokio::test]
    async fn run_polling_stops_on_shutdown() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = dashboard_for(&api);
        let (tx, rx) = tokio::sync::oneshot::channel();
        tx.send(()).unwrap();

        dashboard.run_polling(rx).await;

        assert!(api.count("list_portfolios") >= 1);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Inline editing
// ═══════════════════════════════════════════════════════════════════

mod inline_edit {
    use super::*;

    #[tokio::test]
    async fn switching_rows_discards_previous_draft() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;

        dashboard.begin_edit("A").unwrap();
        dashboard.edit_draft_mut().unwrap().target = "999".into();
        dashboard.begin_edit("B").unwrap();

        assert_eq!(dashboard.editing_id(), Some("B"));
        assert_eq!(dashboard.edit_draft_mut().unwrap().target, "");
        assert_eq!(api.count("update_settings"), 0);
    }

    #[tokio::test]
    async fn save_sends_draft_and_returns_to_idle() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;
        let fetches_before = api.count("get_holdings");

        dashboard.begin_edit("A").unwrap();
        {
            let draft = dashboard.edit_draft_mut().unwrap();
            draft.target = "130".into();
            draft.stop_loss = "".into();
        }
        dashboard.save_edit(t0()).await.unwrap();

        let sent = api.state.lock().unwrap().last_settings.clone().unwrap();
        assert_eq!(sent.portfolio_id, "p1");
        assert_eq!(sent.isin, "A");
        assert_eq!(sent.target, Some(130.0));
        assert_eq!(sent.stop_loss, None);
        assert_eq!(dashboard.editing_id(), None);
        assert_eq!(api.count("get_holdings"), fetches_before + 1);

        let view = holdings_view(dashboard.render());
        let row = view.rows.iter().find(|r| r.holding.isin == "A").unwrap();
        assert_eq!(row.holding.target, Some(130.0));
    }

    #[tokio::test]
    async fn failed_save_keeps_editing_state() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;
        api.fail("update_settings");
        let mut events = dashboard.subscribe();

        dashboard.begin_edit("A").unwrap();
        dashboard.edit_draft_mut().unwrap().target = "130".into();
        let result = dashboard.save_edit(t0()).await;

        assert!(result.is_err());
        assert_eq!(dashboard.editing_id(), Some("A"));
        assert_eq!(dashboard.edit_draft_mut().unwrap().target, "130");
        assert!(drain(&mut events).is_empty());
        assert_eq!(
            error_messages(&dashboard.take_notifications()),
            vec!["Save failed: Server exploded"]
        );
    }

    #[tokio::test]
    async fn unparsable_number_rejected_before_request() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;

        dashboard.begin_edit("A").unwrap();
        dashboard.edit_draft_mut().unwrap().stop_loss = "ten".into();
        let result = dashboard.save_edit(t0()).await;

        assert!(matches!(result, Err(CoreError::ValidationError(_))));
        assert_eq!(api.count("update_settings"), 0);
        assert_eq!(dashboard.editing_id(), Some("A"));
    }

    #[tokio::test]
    async fn cancel_discards_draft() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;

        dashboard.begin_edit("A").unwrap();
        dashboard.cancel_edit();

        assert_eq!(dashboard.editing_id(), None);
        assert!(dashboard.edit_draft_mut().is_none());
        assert!(holdings_view(dashboard.render()).rows.iter().all(|r| !r.editing));
    }

    #[tokio::test]
    async fn begin_edit_unknown_row_is_not_found() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;

        assert!(matches!(dashboard.begin_edit("Q"), Err(CoreError::NotFound(_))));
    }
}

// ═══════════════════════════════════════════════════════════════════
// Bulk delete
// ═══════════════════════════════════════════════════════════════════

mod bulk_delete {
    use super::*;

    #[tokio::test]
    async fn success_invalidates_once_and_clears_selection() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;
        dashboard.toggle_selection("A");
        dashboard.toggle_selection("B");
        let mut events = dashboard.subscribe();

        let deleted = dashboard.delete_selected(t0()).await.unwrap();

        assert_eq!(deleted, 2);
        let invalidations: Vec<CacheEvent> = drain(&mut events)
            .into_iter()
            .filter(|e| e.kind == CacheEventKind::Invalidated)
            .collect();
        assert_eq!(invalidations.len(), 1);
        assert_eq!(invalidations[0].key, QueryKey::holdings("p1"));
        assert!(dashboard.selection().is_empty());

        let sent = api.state.lock().unwrap().last_delete.clone().unwrap();
        assert_eq!(sent.isins, vec!["A".to_string(), "B".to_string()]);
        assert_eq!(holdings_view(dashboard.render()).rows.len(), 1);
    }

    #[tokio::test]
    async fn failure_preserves_selection() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;
        api.fail("delete_holdings");
        dashboard.toggle_selection("A");

        assert!(dashboard.delete_selected(t0()).await.is_err());

        assert!(dashboard.selection().contains("A"));
        assert_eq!(
            error_messages(&dashboard.take_notifications()),
            vec!["Delete failed: Server exploded"]
        );
    }

    #[tokio::test]
    async fn empty_selection_sends_nothing() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;

        let result = dashboard.delete_selected(t0()).await;

        assert!(matches!(result, Err(CoreError::ValidationError(_))));
        assert_eq!(api.count("delete_holdings"), 0);
    }

    #[tokio::test]
    async fn select_all_then_deselect_one() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;

        dashboard.toggle_select_all();
        dashboard.toggle_selection("B");

        let view = holdings_view(dashboard.render());
        assert_eq!(view.selected_count, 2);
        assert!(!view.all_selected);
        assert!(!view.rows.iter().find(|r| r.holding.isin == "B").unwrap().selected);

        dashboard.toggle_selection("B");
        dashboard.toggle_select_all();
        assert!(dashboard.selection().is_empty());
    }
}

// ═══════════════════════════════════════════════════════════════════
// Add holding
// ═══════════════════════════════════════════════════════════════════

mod add_holding {
    use super::*;

    fn fill(dashboard: &mut PortfolioDashboard) {
        dashboard.open_add_form();
        let draft = dashboard.add_form_mut().unwrap();
        draft.isin = "INE000X".into();
        draft.stock_name = "Xylo".into();
        draft.quantity = "12".into();
        draft.average_buy_price = "45.5".into();
    }

    #[tokio::test]
    async fn success_closes_modal_and_shows_new_row() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;
        fill(&mut dashboard);

        dashboard.submit_add_form(t0()).await.unwrap();

        let sent = api.state.lock().unwrap().last_add.clone().unwrap();
        assert_eq!(sent.quantity, 12);
        assert_eq!(sent.average_buy_price, 45.5);
        assert_eq!(sent.ticker, None);
        let view = holdings_view(dashboard.render());
        assert!(view.add_form.is_none());
        assert!(view.rows.iter().any(|r| r.holding.isin == "INE000X"));
    }

    #[tokio::test]
    async fn failure_keeps_modal_and_draft() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;
        api.fail("add_holding");
        fill(&mut dashboard);

        assert!(dashboard.submit_add_form(t0()).await.is_err());

        let view = holdings_view(dashboard.render());
        assert_eq!(view.add_form.unwrap().stock_name, "Xylo");
    }

    #[tokio::test]
    async fn missing_required_field_sends_nothing() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;
        fill(&mut dashboard);
        dashboard.add_form_mut().unwrap().isin.clear();

        let result = dashboard.submit_add_form(t0()).await;

        assert!(matches!(result, Err(CoreError::ValidationError(ref m)) if m.contains("isin")));
        assert_eq!(api.count("add_holding"), 0);
    }

    #[tokio::test]
    async fn close_discards_draft() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;
        fill(&mut dashboard);

        dashboard.close_add_form();
        dashboard.open_add_form();

        assert_eq!(dashboard.add_form_mut().unwrap().isin, "");
    }
}

// ═══════════════════════════════════════════════════════════════════
// Upload & auto-discovery
// ═══════════════════════════════════════════════════════════════════

mod upload_and_discover {
    use super::*;

    #[tokio::test]
    async fn upload_success_notifies_and_refetches() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;
        let fetches_before = api.count("get_holdings");

        dashboard
            .upload_file("Holdings.XLSX", vec![1, 2, 3], t0())
            .await
            .unwrap();

        assert_eq!(
            api.state.lock().unwrap().last_upload.clone().unwrap().file_name,
            "Holdings.XLSX"
        );
        assert_eq!(api.count("get_holdings"), fetches_before + 1);
        assert_eq!(
            dashboard.take_notifications(),
            vec![Notification::info("Portfolio updated successfully!")]
        );
        assert!(!holdings_view(dashboard.render()).upload_pending);
    }

    #[tokio::test]
    async fn upload_rejects_non_spreadsheet_locally() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;

        let result = dashboard.upload_file("notes.csv", vec![], t0()).await;

        assert!(matches!(result, Err(CoreError::InvalidFileFormat(_))));
        assert_eq!(api.count("upload"), 0);
        let messages = dashboard.take_notifications();
        assert!(messages[0].message.starts_with("Upload failed: "));
    }

    #[tokio::test]
    async fn upload_failure_shows_server_detail() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;
        api.fail_with_detail("upload", "Missing column: ISIN");

        assert!(dashboard.upload_file("h.xls", vec![0], t0()).await.is_err());

        assert_eq!(
            error_messages(&dashboard.take_notifications()),
            vec!["Upload failed: Missing column: ISIN"]
        );
    }

    #[tokio::test]
    async fn same_file_can_be_uploaded_twice() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;

        dashboard.upload_file("h.xlsx", vec![1], t0()).await.unwrap();
        dashboard.upload_file("h.xlsx", vec![1], t0()).await.unwrap();

        assert_eq!(api.count("upload"), 2);
    }

    #[tokio::test]
    async fn auto_discover_reports_updated_count() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;

        let updated = dashboard.auto_discover(t0()).await.unwrap();

        assert_eq!(updated, 3);
        assert_eq!(
            dashboard.take_notifications(),
            vec![Notification::info("Auto-discovery completed! Updated 3 tickers.")]
        );
        assert!(dashboard.take_notifications().is_empty());
    }

    #[tokio::test]
    async fn failed_discover_leaves_cache_alone() {
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        let mut dashboard = loaded(&api).await;
        api.fail("auto_discover");
        let mut events = dashboard.subscribe();

        assert!(dashboard.auto_discover(t0()).await.is_err());

        assert!(drain(&mut events).is_empty());
        assert!(!dashboard.cache().get(&QueryKey::holdings("p1")).unwrap().invalidated);
    }
}

// ═══════════════════════════════════════════════════════════════════
// Error boundary & persistence
// ═══════════════════════════════════════════════════════════════════

mod boundary_and_persistence {
    use super::*;

    #[tokio::test]
    async fn duplicate_isins_trip_boundary_until_reload() {
        let duplicated = vec![
            holding("A", "Alpha", Some(1.0), None),
            holding("A", "Alpha again", Some(2.0), None),
        ];
        let api = MockApi::with_portfolio("p1", "Core", duplicated, false);
        let mut dashboard = loaded(&api).await;

        assert!(matches!(dashboard.render(), DashboardView::Fallback { .. }));

        // A fixed backend alone does not clear the boundary.
        api.set_holdings("p1", sample_holdings(), false);
        dashboard.refresh_holdings(t0()).await.unwrap();
        assert!(matches!(dashboard.render(), DashboardView::Fallback { .. }));

        dashboard.reload(t0());
        dashboard.poll(t0()).await;
        assert_eq!(holdings_view(dashboard.render()).rows.len(), 3);
    }

    #[tokio::test]
    async fn restored_cache_renders_before_any_fetch() {
        let dir = tempfile::tempdir().unwrap();
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        {
            let mut dashboard = PortfolioDashboard::new(
                ClientConfig::default(),
                Box::new(api.clone()),
                Box::new(FileStore::new(dir.path())),
                t0(),
            )
            .unwrap();
            dashboard.load_portfolios(t0()).await.unwrap();
            dashboard.refresh_holdings(t0()).await.unwrap();
        }

        let later = t0() + Duration::hours(1);
        let mut restored = PortfolioDashboard::new(
            ClientConfig::default(),
            Box::new(api.clone()),
            Box::new(FileStore::new(dir.path())),
            later,
        )
        .unwrap();

        let view = holdings_view(restored.render());
        assert_eq!(view.rows.len(), 3);
        assert_eq!(view.last_refreshed, Some(t0()));
        // Restored data is stale; both keys revalidate on the next poll.
        assert_eq!(restored.poll(later).await, 2);
        assert_eq!(restored.poll(later).await, 0);
    }

    #[tokio::test]
    async fn expired_snapshot_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let api = MockApi::with_portfolio("p1", "Core", sample_holdings(), false);
        {
            let mut dashboard = PortfolioDashboard::new(
                ClientConfig::default(),
                Box::new(api.clone()),
                Box::new(FileStore::new(dir.path())),
                t0(),
            )
            .unwrap();
            dashboard.load_portfolios(t0()).await.unwrap();
        }

        let mut restored = PortfolioDashboard::new(
            ClientConfig::default(),
            Box::new(api.clone()),
            Box::new(FileStore::new(dir.path())),
            t0() + Duration::hours(25),
        )
        .unwrap();

        assert!(restored.portfolios().is_empty());
        assert!(matches!(restored.render(), DashboardView::Placeholder { loading: true, .. }));
    }

    #[test]
    fn invalid_config_rejected() {
        let config = ClientConfig {
            base_url: String::new(),
            ..ClientConfig::default()
        };
        let result = PortfolioDashboard::new(
            config,
            Box::new(MockApi::default()),
            Box::new(MemoryStore::new()),
            t0(),
        );
        assert!(matches!(result, Err(CoreError::ValidationError(_))));
    }
}
