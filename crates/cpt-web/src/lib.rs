//! Axum + Askama dashboard over the session engine.
//!
//! Server-rendered: every handler projects the in-memory session into one
//! of the five tabs and returns full HTML or a table partial. Mutations
//! are plain form posts answered with a redirect carrying a transient
//! flash message; a process started without usable credentials renders a
//! persistent banner instead of reaching for the network.

use std::path::PathBuf;
use std::sync::Arc;

use askama::Template;
use axum::{
    extract::{Path as AxumPath, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use chrono::{Local, Months};
use cpt_core::{CandidateRow, RowKey, ViewKind};
use cpt_gateway::{GatewayConfig, RestGateway, UnconfiguredGateway};
use cpt_sync::{Session, SessionConfig};
use cpt_views::{active_groups, normalize_status, parse_flexible_date};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::RwLock;
use tracing::warn;

pub const CRATE_NAME: &str = "cpt-web";

pub struct AppState {
    pub session: RwLock<Session>,
    pub prefs: PrefStore,
    /// Set when the process started without usable credentials. Rendered
    /// as a persistent banner; never cleared at runtime.
    pub config_error: Option<String>,
    pub assets_dir: PathBuf,
}

impl AppState {
    pub fn new(session: Session, prefs: PrefStore, config_error: Option<String>) -> Self {
        Self {
            session: RwLock::new(session),
            prefs,
            config_error,
            assets_dir: PathBuf::from("assets"),
        }
    }

    /// Wire the live gateway from the environment. Bad credentials still
    /// produce a working app: every view renders empty behind the banner.
    pub fn from_env(config: SessionConfig) -> Self {
        match RestGateway::new(GatewayConfig::from_env()) {
            Ok(gateway) => Self::new(
                Session::new(config, Arc::new(gateway)),
                PrefStore::from_env(),
                None,
            ),
            Err(err) => {
                let message = err.to_string();
                Self::new(
                    Session::new(config, Arc::new(UnconfiguredGateway::new(message.clone()))),
                    PrefStore::from_env(),
                    Some(message),
                )
            }
        }
    }
}

/// Persists tiny UI preferences (currently just the selected tab) as a
/// JSON document, written through a temp file + rename so an interrupted
/// write never truncates the store. Row data never lands here.
#[derive(Debug, Clone)]
pub struct PrefStore {
    path: PathBuf,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct Prefs {
    #[serde(default)]
    selected_tab: Option<String>,
}

impl PrefStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_env() -> Self {
        let dir = std::env::var("CPT_STATE_DIR").unwrap_or_else(|_| "./state".to_string());
        Self::new(PathBuf::from(dir).join("prefs.json"))
    }

    async fn read(&self) -> Prefs {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => serde_json::from_str(&text).unwrap_or_default(),
            Err(_) => Prefs::default(),
        }
    }

    pub async fn selected_tab(&self) -> Option<ViewKind> {
        self.read()
            .await
            .selected_tab
            .as_deref()
            .and_then(ViewKind::parse)
    }

    pub async fn set_selected_tab(&self, tab: ViewKind) -> anyhow::Result<()> {
        let mut prefs = self.read().await;
        prefs.selected_tab = Some(tab.as_str().to_string());
        let bytes = serde_json::to_vec_pretty(&prefs)?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let temp = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp, &bytes).await?;
        tokio::fs::rename(&temp, &self.path).await?;
        Ok(())
    }
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/view/{tab}", get(view_handler))
        .route("/view/{tab}/table", get(table_partial_handler))
        .route("/rows/status", post(status_handler))
        .route("/rows/snooze", post(snooze_handler))
        .route("/rows/notes", post(notes_handler))
        .route("/refresh", post(refresh_handler))
        .route("/search", get(search_handler))
        .route("/assets/static/app.css", get(app_css_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("CPT_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let config = SessionConfig::load()?;
    let state = AppState::from_env(config);
    if state.config_error.is_none() {
        if let Err(err) = state.session.write().await.refresh().await {
            warn!(error = %err, "initial refresh failed; starting with an empty row set");
        }
    }
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    axum::serve(listener, app(state)).await?;
    Ok(())
}

#[derive(Debug, Deserialize, Default)]
struct FlashQuery {
    msg: Option<String>,
    err: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RowForm {
    #[serde(default)]
    id: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    notes: String,
    #[serde(default)]
    tab: String,
}

impl RowForm {
    fn key(&self) -> Option<RowKey> {
        RowKey::from_parts(&self.id, &self.link, &self.name)
    }

    fn tab(&self) -> &str {
        match ViewKind::parse(&self.tab) {
            Some(view) => view.as_str(),
            None => ViewKind::Active.as_str(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct SearchQuery {
    #[serde(default)]
    q: String,
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    let tab = state
        .prefs
        .selected_tab()
        .await
        .unwrap_or(ViewKind::Active);
    Redirect::to(&format!("/view/{}", tab.as_str())).into_response()
}

async fn view_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(tab): AxumPath<String>,
    Query(flash): Query<FlashQuery>,
) -> Response {
    let Some(view) = ViewKind::parse(&tab) else {
        return (StatusCode::NOT_FOUND, Html("Unknown view".to_string())).into_response();
    };
    if let Err(err) = state.prefs.set_selected_tab(view).await {
        warn!(error = %err, "failed to persist tab selection");
    }
    let session = state.session.read().await;
    render_html(build_view_template(&state, &session, view, flash))
}

async fn table_partial_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(tab): AxumPath<String>,
) -> Response {
    let Some(view) = ViewKind::parse(&tab) else {
        return (StatusCode::NOT_FOUND, Html("Unknown view".to_string())).into_response();
    };
    let session = state.session.read().await;
    let mut resp = render_html(TablePartialTemplate {
        table: build_table(&session, view),
    });
    resp.headers_mut().insert(
        header::HeaderName::from_static("hx-trigger"),
        header::HeaderValue::from_static("viewTableLoaded"),
    );
    resp
}

async fn status_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RowForm>,
) -> Response {
    let tab = form.tab();
    let Some(key) = form.key() else {
        return redirect_to_view(tab, Err("Missing candidate identifiers".to_string()));
    };
    let mut session = state.session.write().await;
    match session.set_status(&key, &form.status).await {
        Ok(()) => redirect_to_view(tab, Ok("Status updated")),
        Err(err) => redirect_to_view(tab, Err(err.to_string())),
    }
}

async fn snooze_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RowForm>,
) -> Response {
    let tab = form.tab();
    let Some(key) = form.key() else {
        return redirect_to_view(tab, Err("Missing candidate identifiers".to_string()));
    };
    if form.date.is_empty() {
        return redirect_to_view(tab, Err("Pick a snooze date".to_string()));
    }
    let mut session = state.session.write().await;
    match session.snooze(&key, &form.date).await {
        Ok(()) => redirect_to_view(tab, Ok("Snoozed")),
        Err(err) => redirect_to_view(tab, Err(err.to_string())),
    }
}

async fn notes_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RowForm>,
) -> Response {
    let tab = form.tab();
    let Some(key) = form.key() else {
        return redirect_to_view(tab, Err("Missing candidate identifiers".to_string()));
    };
    let mut session = state.session.write().await;
    match session.set_notes(&key, &form.notes).await {
        Ok(()) => redirect_to_view(tab, Ok("Notes saved")),
        Err(err) => redirect_to_view(tab, Err(err.to_string())),
    }
}

async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RowForm>,
) -> Response {
    let tab = form.tab();
    let mut session = state.session.write().await;
    match session.refresh().await {
        Ok(_) => redirect_to_view(tab, Ok("Synced")),
        Err(err) => redirect_to_view(tab, Err(err.to_string())),
    }
}

async fn search_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let mut session = state.session.write().await;
    match session.search(&query.q).await {
        Ok(_) => Redirect::to("/view/search").into_response(),
        Err(err) => redirect_to_view(ViewKind::Search.as_str(), Err(err.to_string())),
    }
}

async fn app_css_handler(State(state): State<Arc<AppState>>) -> Response {
    let css_path = state.assets_dir.join("static/app.css");
    match tokio::fs::read_to_string(&css_path).await {
        Ok(css) => ([(header::CONTENT_TYPE, "text/css; charset=utf-8")], css).into_response(),
        Err(_) => (
            StatusCode::NOT_FOUND,
            Html("/* missing app.css */".to_string()),
        )
            .into_response(),
    }
}

#[derive(Template)]
#[template(path = "view.html")]
struct ViewTemplate {
    tabs: Vec<TabLink>,
    tab: String,
    count_label: String,
    is_search: bool,
    search_term: String,
    flash: Option<String>,
    error: Option<String>,
    config_error: Option<String>,
    table: TableData,
}

#[derive(Template)]
#[template(path = "table_partial.html")]
struct TablePartialTemplate {
    table: TableData,
}

struct TabLink {
    href: String,
    label: &'static str,
    active: bool,
    count: usize,
}

struct TableData {
    tab: String,
    columns: Vec<String>,
    grouped: bool,
    groups: Vec<GroupRows>,
    rows: Vec<RowCells>,
}

struct GroupRows {
    title: String,
    count: usize,
    rows: Vec<RowCells>,
}

struct RowCells {
    id: String,
    link: String,
    name: String,
    cells: Vec<Cell>,
    snooze_value: String,
}

struct Cell {
    kind: &'static str,
    text: String,
    options: Vec<StatusOption>,
}

struct StatusOption {
    value: String,
    selected: bool,
}

fn build_view_template(
    state: &AppState,
    session: &Session,
    view: ViewKind,
    flash: FlashQuery,
) -> ViewTemplate {
    let counts = session.view_counts();
    let tabs = counts
        .iter()
        .map(|(kind, count)| TabLink {
            href: format!("/view/{}", kind.as_str()),
            label: kind.label(),
            active: *kind == view,
            count: *count,
        })
        .collect();
    let count = counts
        .iter()
        .find(|(kind, _)| *kind == view)
        .map(|(_, count)| *count)
        .unwrap_or(0);
    let count_label = match view {
        ViewKind::Search => format!("{count} results"),
        other => format!("{count} {}", other.label().to_lowercase()),
    };
    ViewTemplate {
        tabs,
        tab: view.as_str().to_string(),
        count_label,
        is_search: view == ViewKind::Search,
        search_term: session.search_state().term.clone(),
        flash: flash.msg,
        error: flash.err,
        config_error: state.config_error.clone(),
        table: build_table(session, view),
    }
}

fn build_table(session: &Session, view: ViewKind) -> TableData {
    let config = session.config();
    let projection = session.project(view);
    let default_snooze = default_snooze_date();
    let build_row = |row: &CandidateRow| -> RowCells {
        RowCells {
            id: row.id.clone().unwrap_or_default(),
            link: row.link.clone(),
            name: row.name.clone(),
            cells: projection
                .columns
                .iter()
                .map(|column| cell_for(column, row, &config.status_options))
                .collect(),
            snooze_value: snooze_input_value(row, &config.snooze_field, &default_snooze),
        }
    };

    if view == ViewKind::Active {
        let active_list = config.status_lists().active;
        let groups = active_groups(&projection.rows, &active_list)
            .into_iter()
            .map(|(status, members)| GroupRows {
                title: title_case(&status),
                count: members.len(),
                rows: members.into_iter().map(build_row).collect(),
            })
            .collect();
        return TableData {
            tab: view.as_str().to_string(),
            columns: projection.columns.clone(),
            grouped: true,
            groups,
            rows: Vec::new(),
        };
    }

    TableData {
        tab: view.as_str().to_string(),
        columns: projection.columns.clone(),
        grouped: false,
        groups: Vec::new(),
        rows: projection.rows.iter().copied().map(build_row).collect(),
    }
}

fn cell_for(column: &str, row: &CandidateRow, status_options: &[String]) -> Cell {
    if column == "status" {
        let current = normalize_status(&row.status);
        return Cell {
            kind: "status",
            text: String::new(),
            options: status_options
                .iter()
                .map(|option| StatusOption {
                    selected: normalize_status(option) == current,
                    value: option.clone(),
                })
                .collect(),
        };
    }
    if column == "notes" {
        let text = row
            .column_value("notes")
            .as_ref()
            .map(display_text)
            .unwrap_or_default();
        return Cell {
            kind: "notes",
            text,
            options: Vec::new(),
        };
    }
    if column == "link" {
        let url = row.link.trim();
        if url.is_empty() {
            return empty_cell();
        }
        let lowered = url.to_ascii_lowercase();
        let kind = if lowered.starts_with("http://") || lowered.starts_with("https://") {
            "link"
        } else {
            "text"
        };
        return Cell {
            kind,
            text: url.to_string(),
            options: Vec::new(),
        };
    }
    match row.column_value(column) {
        None | Some(Value::Null) => empty_cell(),
        Some(Value::String(s)) if s.is_empty() => empty_cell(),
        Some(value) => Cell {
            kind: "text",
            text: display_text(&value),
            options: Vec::new(),
        },
    }
}

fn empty_cell() -> Cell {
    Cell {
        kind: "empty",
        text: String::new(),
        options: Vec::new(),
    }
}

/// Passthrough values render as plain text: arrays joined, objects as
/// their JSON, strings unquoted.
fn display_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(display_text)
            .collect::<Vec<_>>()
            .join(", "),
        other => other.to_string(),
    }
}

/// Prefill for the snooze date input: the row's own check-in date when it
/// parses, else today + 3 months.
fn snooze_input_value(row: &CandidateRow, snooze_field: &str, default: &str) -> String {
    row.snooze_value(snooze_field)
        .and_then(|v| v.as_str())
        .and_then(parse_flexible_date)
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| default.to_string())
}

fn default_snooze_date() -> String {
    let today = Local::now().date_naive();
    today
        .checked_add_months(Months::new(3))
        .unwrap_or(today)
        .format("%Y-%m-%d")
        .to_string()
}

fn title_case(status: &str) -> String {
    status
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn redirect_to_view(tab: &str, outcome: Result<&str, String>) -> Response {
    let target = match outcome {
        Ok(message) => format!("/view/{tab}?msg={}", urlencode(message)),
        Err(message) => format!("/view/{tab}?err={}", urlencode(&message)),
    };
    Redirect::to(&target).into_response()
}

fn urlencode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            b' ' => out.push('+'),
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}

fn render_html<T: Template>(tpl: T) -> Response {
    match tpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(err) => server_error(anyhow::anyhow!(err.to_string())),
    }
}

fn server_error(err: anyhow::Error) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Html(format!("Server error: {}", err)),
    )
        .into_response()
}
