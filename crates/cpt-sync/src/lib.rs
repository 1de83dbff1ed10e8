//! Session engine: the in-memory row set and the operations that mutate it.
//!
//! One `Session` holds everything the dashboard shows: the full fetched
//! row set plus the current search results. Mutations go to the backend
//! first and are echoed into the matching in-memory row on success, so
//! views re-render without a refetch. No retries, no conflict detection:
//! one gateway call per user action.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use cpt_core::{CandidateRow, RowKey, RowPatch, ViewKind};
use cpt_gateway::{DataGateway, GatewayError};
use cpt_views::{
    project, CheckinWindow, Classifier, Projection, SearchState, StatusList, StatusLists,
};
use serde::Deserialize;
use tracing::info;

pub const CRATE_NAME: &str = "cpt-sync";

/// Rows fetched per page during a full refresh.
pub const PAGE_SIZE: usize = 1000;

/// Everything the dashboard needs beyond credentials. Loaded from
/// `cpt.yaml`; every field defaults to the stock pipeline configuration
/// so a fresh deployment works with no file at all.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Backend column holding the next follow-up date. Configurable
    /// because the column has been renamed before.
    pub snooze_field: String,
    pub active_statuses: Vec<String>,
    pub review_statuses: Vec<String>,
    pub checkin_statuses: Vec<String>,
    pub tenure_statuses: Vec<String>,
    pub checkin_window_days: u32,
    /// `YYYY-MM` override pinning the check-in view to one calendar month.
    pub checkin_debug_month: Option<String>,
    /// Ceiling on the total rows a full refresh will pull.
    pub row_limit: usize,
    /// Choices offered by the status dropdown.
    pub status_options: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            snooze_field: "check_in".to_string(),
            active_statuses: [
                "connecting",
                "connected",
                "developing",
                "interviewing",
                "work trial",
                "closing",
            ]
            .map(String::from)
            .to_vec(),
            review_statuses: vec!["backburner".to_string(), "cold".to_string()],
            checkin_statuses: vec!["backburner".to_string(), "cold".to_string()],
            tenure_statuses: vec!["backburner".to_string(), "cold".to_string()],
            checkin_window_days: 30,
            checkin_debug_month: None,
            row_limit: 5000,
            status_options: [
                "cold",
                "connecting",
                "connected",
                "developing",
                "interviewing",
                "closing",
                "work trial",
                "backburner",
                "veto",
                "done",
            ]
            .map(String::from)
            .to_vec(),
        }
    }
}

impl SessionConfig {
    /// `cpt.yaml` in the working directory, overridable via `CPT_CONFIG`.
    /// A missing file is not an error; the defaults stand in.
    pub fn load() -> anyhow::Result<Self> {
        let path = PathBuf::from(
            std::env::var("CPT_CONFIG").unwrap_or_else(|_| "cpt.yaml".to_string()),
        );
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn status_lists(&self) -> StatusLists {
        StatusLists {
            active: StatusList::new(&self.active_statuses),
            review: StatusList::new(&self.review_statuses),
            checkin: StatusList::new(&self.checkin_statuses),
            tenure: StatusList::new(&self.tenure_statuses),
        }
    }

    pub fn checkin_window(&self) -> CheckinWindow {
        CheckinWindow::from_config(self.checkin_window_days, self.checkin_debug_month.as_deref())
    }

    /// A classifier pinned to the current local day; built per render so a
    /// long-lived process rolls over at midnight.
    pub fn classifier_for_today(&self) -> Classifier {
        Classifier::for_today(
            self.status_lists(),
            self.snooze_field.clone(),
            self.checkin_window(),
        )
    }
}

pub struct Session {
    config: SessionConfig,
    gateway: Arc<dyn DataGateway>,
    rows: Vec<CandidateRow>,
    search: SearchState,
}

impl Session {
    pub fn new(config: SessionConfig, gateway: Arc<dyn DataGateway>) -> Self {
        Self {
            config,
            gateway,
            rows: Vec::new(),
            search: SearchState::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn rows(&self) -> &[CandidateRow] {
        &self.rows
    }

    pub fn search_state(&self) -> &SearchState {
        &self.search
    }

    /// Refetch the whole table: sequential pages until an empty page, a
    /// short page, or the configured ceiling. The in-memory set is only
    /// replaced once every page has arrived, so a failed refresh leaves
    /// the previous rows untouched.
    pub async fn refresh(&mut self) -> Result<usize, GatewayError> {
        let mut fetched: Vec<CandidateRow> = Vec::new();
        let mut offset = 0;
        while offset < self.config.row_limit {
            let page = self.gateway.fetch_page(offset, PAGE_SIZE).await?;
            let page_len = page.len();
            if page_len == 0 {
                break;
            }
            fetched.extend(page);
            if page_len < PAGE_SIZE {
                break;
            }
            offset += PAGE_SIZE;
        }
        // newest first when the backend stamps creation times; RFC 3339
        // stamps in one timezone order lexicographically
        if fetched.first().map(|r| r.created_at.is_some()).unwrap_or(false) {
            fetched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        let count = fetched.len();
        self.rows = fetched;
        info!(rows = count, "refreshed row set");
        Ok(count)
    }

    /// One gateway update, then an in-place echo into whichever in-memory
    /// copies (main set and current search hits) the key resolves to. A
    /// gateway failure leaves local state untouched.
    pub async fn apply(&mut self, key: &RowKey, patch: RowPatch) -> Result<(), GatewayError> {
        self.gateway.update(key, &patch).await?;
        if let Some(row) = self.rows.iter_mut().find(|row| row.matches_key(key)) {
            row.apply_patch(&patch);
        }
        if let Some(row) = self.search.rows.iter_mut().find(|row| row.matches_key(key)) {
            row.apply_patch(&patch);
        }
        Ok(())
    }

    pub async fn snooze(&mut self, key: &RowKey, date: &str) -> Result<(), GatewayError> {
        let patch = RowPatch::new(self.config.snooze_field.clone(), date);
        self.apply(key, patch).await
    }

    pub async fn set_status(&mut self, key: &RowKey, status: &str) -> Result<(), GatewayError> {
        self.apply(key, RowPatch::new("status", status)).await
    }

    pub async fn set_notes(&mut self, key: &RowKey, notes: &str) -> Result<(), GatewayError> {
        self.apply(key, RowPatch::new("notes", notes)).await
    }

    /// Lowercase and tokenize the term, then delegate to the backend's
    /// name search. An empty term clears the results instead of searching.
    pub async fn search(&mut self, term: &str) -> Result<usize, GatewayError> {
        let term = term.trim().to_lowercase();
        if term.is_empty() {
            self.search.clear();
            return Ok(0);
        }
        let tokens = search_tokens(&term);
        let rows = self.gateway.search_names(&tokens).await?;
        let count = rows.len();
        self.search = SearchState { term, rows };
        Ok(count)
    }

    /// Assemble one view from current state.
    pub fn project(&self, view: ViewKind) -> Projection<'_> {
        let classifier = self.config.classifier_for_today();
        project(&self.rows, &self.search, view, &classifier)
    }

    /// Row count per view, for the tab strip.
    pub fn view_counts(&self) -> [(ViewKind, usize); 5] {
        ViewKind::ALL.map(|view| (view, self.project(view).rows.len()))
    }
}

/// Whitespace-separated search tokens with commas dropped before the
/// split, the shape the backend's disjunctive filter expects.
pub fn search_tokens(term: &str) -> Vec<String> {
    term.replace(',', "")
        .split_whitespace()
        .map(ToString::to_string)
        .collect()
}
