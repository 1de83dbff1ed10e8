//! Hosted-table client: the one place CPT talks to the backend.
//!
//! The backend is a PostgREST-style HTTP API over a single table. Nothing
//! above this crate sees HTTP; the rest of the system works against the
//! `DataGateway` trait, which also keeps the session engine testable with
//! an in-memory double.

use std::time::Duration;

use async_trait::async_trait;
use cpt_core::{CandidateRow, RowKey, RowPatch};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;
use tracing::info_span;
use uuid::Uuid;

pub const CRATE_NAME: &str = "cpt-gateway";

/// Server-side cap on name-search results.
pub const SEARCH_LIMIT: usize = 100;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or placeholder credentials, caught before any network call.
    #[error("configuration: {0}")]
    Config(String),
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("backend status {status}: {message}")]
    Backend { status: u16, message: String },
    #[error("decoding backend response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Connection settings for the hosted table API.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Bare project ref or a full `http(s)://` base URL.
    pub project_ref: String,
    pub api_key: String,
    pub table: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self {
            project_ref: std::env::var("CPT_PROJECT_REF").unwrap_or_default(),
            api_key: std::env::var("CPT_API_KEY").unwrap_or_default(),
            table: std::env::var("CPT_TABLE").unwrap_or_else(|_| "crm".to_string()),
            timeout: Duration::from_secs(
                std::env::var("CPT_HTTP_TIMEOUT_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(20),
            ),
        }
    }

    /// A bare project ref becomes `https://<ref>.supabase.co`; an explicit
    /// `http(s)://` URL passes through. Trailing slashes are trimmed.
    pub fn base_url(&self) -> String {
        let trimmed = self.project_ref.trim().trim_end_matches('/');
        let lowered = trimmed.to_ascii_lowercase();
        if lowered.starts_with("http://") || lowered.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}.supabase.co")
        }
    }

    /// Configuration errors halt all further action; nothing below here
    /// touches the network before this passes.
    pub fn validate(&self) -> Result<(), GatewayError> {
        let project_ref = self.project_ref.trim();
        if project_ref.is_empty() || project_ref == "PROJECT REF" {
            return Err(GatewayError::Config(
                "set CPT_PROJECT_REF to the backend project ref or base URL".into(),
            ));
        }
        let api_key = self.api_key.trim();
        if api_key.is_empty() || api_key == "your-anon-key" || api_key == "PROJECT ANON" {
            return Err(GatewayError::Config("set CPT_API_KEY to the backend API key".into()));
        }
        if self.table.trim().is_empty() {
            return Err(GatewayError::Config("set CPT_TABLE to the candidate table name".into()));
        }
        Ok(())
    }
}

/// What any backend collaborator must provide.
#[async_trait]
pub trait DataGateway: Send + Sync {
    /// One page of the full row set. Callers stop paging on an empty or
    /// short page.
    async fn fetch_page(&self, offset: usize, limit: usize)
        -> Result<Vec<CandidateRow>, GatewayError>;

    /// Apply a single-column patch to the row the key resolves to.
    async fn update(&self, key: &RowKey, patch: &RowPatch) -> Result<(), GatewayError>;

    /// Rows whose name contains any of the tokens, capped at
    /// [`SEARCH_LIMIT`] server-side.
    async fn search_names(&self, tokens: &[String]) -> Result<Vec<CandidateRow>, GatewayError>;
}

#[derive(Debug)]
pub struct RestGateway {
    client: reqwest::Client,
    config: GatewayConfig,
}

impl RestGateway {
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        config.validate()?;
        let client = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout)
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.config.base_url(), self.config.table)
    }

    fn request(&self, method: Method) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.table_url())
            .header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }
}

#[async_trait]
impl DataGateway for RestGateway {
    async fn fetch_page(
        &self,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<CandidateRow>, GatewayError> {
        let op_id = Uuid::new_v4();
        let span = info_span!("fetch_page", %op_id, table = %self.config.table, offset, limit);
        let _guard = span.enter();

        let offset = offset.to_string();
        let limit = limit.to_string();
        let response = self
            .request(Method::GET)
            .query(&[
                ("select", "*"),
                ("offset", offset.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;
        let response = ok_or_backend_error(response).await?;
        Ok(response.json().await?)
    }

    async fn update(&self, key: &RowKey, patch: &RowPatch) -> Result<(), GatewayError> {
        let op_id = Uuid::new_v4();
        let span = info_span!("update_row", %op_id, table = %self.config.table, column = %patch.column);
        let _guard = span.enter();

        let response = self
            .request(Method::PATCH)
            .query(&key_criteria(key))
            .header("Prefer", "return=minimal")
            .json(&patch.to_object())
            .send()
            .await?;
        ok_or_backend_error(response).await?;
        Ok(())
    }

    async fn search_names(&self, tokens: &[String]) -> Result<Vec<CandidateRow>, GatewayError> {
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let op_id = Uuid::new_v4();
        let span = info_span!("search_names", %op_id, table = %self.config.table, tokens = tokens.len());
        let _guard = span.enter();

        let filter = name_search_filter(tokens);
        let limit = SEARCH_LIMIT.to_string();
        let response = self
            .request(Method::GET)
            .query(&[
                ("select", "*"),
                ("or", filter.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await?;
        let response = ok_or_backend_error(response).await?;
        Ok(response.json().await?)
    }
}

/// Stand-in gateway for a process started without usable credentials.
/// Every operation reports the configuration error, so the UI can keep
/// rendering (empty) views with a persistent banner and no network calls.
#[derive(Debug, Clone)]
pub struct UnconfiguredGateway {
    message: String,
}

impl UnconfiguredGateway {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    fn error(&self) -> GatewayError {
        GatewayError::Config(self.message.clone())
    }
}

#[async_trait]
impl DataGateway for UnconfiguredGateway {
    async fn fetch_page(
        &self,
        _offset: usize,
        _limit: usize,
    ) -> Result<Vec<CandidateRow>, GatewayError> {
        Err(self.error())
    }

    async fn update(&self, _key: &RowKey, _patch: &RowPatch) -> Result<(), GatewayError> {
        Err(self.error())
    }

    async fn search_names(&self, _tokens: &[String]) -> Result<Vec<CandidateRow>, GatewayError> {
        Err(self.error())
    }
}

/// Equality filters addressing exactly the row the key denotes: `id` when
/// present, the `(link, name)` pair otherwise. Every lookup applies the
/// same precedence, so both paths converge on one record.
fn key_criteria(key: &RowKey) -> Vec<(String, String)> {
    match key {
        RowKey::Id(id) => vec![("id".to_string(), format!("eq.{id}"))],
        RowKey::LinkName { link, name } => vec![
            ("link".to_string(), format!("eq.{link}")),
            ("name".to_string(), format!("eq.{name}")),
        ],
    }
}

/// The backend's disjunctive name-contains filter:
/// `(name.ilike.*a*,name.ilike.*b*)`.
fn name_search_filter(tokens: &[String]) -> String {
    let parts: Vec<String> = tokens
        .iter()
        .map(|token| format!("name.ilike.*{token}*"))
        .collect();
    format!("({})", parts.join(","))
}

async fn ok_or_backend_error(
    response: reqwest::Response,
) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = backend_message(status, response.text().await.unwrap_or_default());
    Err(GatewayError::Backend {
        status: status.as_u16(),
        message,
    })
}

fn backend_message(status: StatusCode, body: String) -> String {
    serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("message")
                .and_then(|m| m.as_str())
                .map(ToString::to_string)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                status.to_string()
            } else {
                body
            }
        })
}
