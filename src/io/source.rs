//! Occurrence event source - authenticated, paginated fetch from the tracking API
//!
//! The API is a token-authenticated REST endpoint returning pages of
//! occurrence records. Page 0 reports the total page count; the remaining
//! pages are fetched with a bounded concurrent fan-out, which is safe
//! because the downstream reduction is order-independent.
//!
//! Error policy per page: transient failures (429/5xx, transport) retry with
//! linear backoff and, once exhausted, drop the page with a warning; an
//! unparseable body counts as an empty page; a rejected token triggers
//! exactly one re-authentication for the whole run, and a second rejection
//! is fatal.

use crate::domain::status::code_filter;
use crate::domain::types::{parse_occurrence_ts, OccurrenceEvent};
use crate::infra::config::Config;
use anyhow::Context;
use reqwest::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const API_DATE_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Authentication failed, or the API rejected a freshly issued token.
    /// Fatal to the run.
    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("page {page} returned http {status}")]
    Status { page: u32, status: u16 },
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    resposta: Option<LoginBody>,
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    token: Option<String>,
}

/// A value the API serves either as a JSON string or a bare number.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Stringy {
    Text(String),
    Int(i64),
}

impl Stringy {
    fn into_string(self) -> String {
        match self {
            Stringy::Text(s) => s,
            Stringy::Int(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct OccurrencePage {
    #[serde(rename = "totalPages", default)]
    total_pages: u32,
    #[serde(rename = "respostas", default)]
    items: Vec<RawOccurrence>,
}

#[derive(Debug, Deserialize)]
struct RawOccurrence {
    #[serde(rename = "embarque")]
    shipment: Option<RawShipment>,
    #[serde(rename = "tipoOcorrencia")]
    kind: Option<RawKind>,
    #[serde(rename = "data")]
    occurred_at: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct RawShipment {
    #[serde(rename = "chave")]
    key: Option<String>,
    #[serde(rename = "numero")]
    number: Option<Stringy>,
    #[serde(rename = "serie")]
    series: Option<Stringy>,
    #[serde(rename = "transportadora")]
    carrier: Option<RawCarrier>,
}

#[derive(Debug, Deserialize)]
struct RawCarrier {
    #[serde(rename = "nome")]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawKind {
    #[serde(rename = "codigo")]
    code: Option<Stringy>,
}

impl RawOccurrence {
    fn into_event(self) -> OccurrenceEvent {
        let shipment = self.shipment.unwrap_or_default();
        OccurrenceEvent {
            invoice_key: shipment.key.filter(|k| !k.trim().is_empty()),
            invoice_number: shipment.number.map(Stringy::into_string).unwrap_or_default(),
            series: shipment.series.map(Stringy::into_string).unwrap_or_default(),
            carrier: shipment.carrier.and_then(|c| c.name).unwrap_or_default(),
            code: self.kind.and_then(|k| k.code).map(Stringy::into_string).unwrap_or_default(),
            occurred_at: self.occurred_at.as_deref().and_then(parse_occurrence_ts),
        }
    }
}

pub struct OccurrenceClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    password: String,
    client_id: u32,
    product_id: u32,
    page_size: u32,
    series_filter: String,
    max_retries: u32,
    backoff_secs: u64,
    max_concurrency: usize,
    token: RwLock<Option<String>>,
    /// Serializes mid-run re-authentication; true once the run's single
    /// token refresh has been spent.
    reauth: Mutex<bool>,
}

/// What to do about a 401/403, given the token the request carried and the
/// client's current token state.
#[derive(Debug, PartialEq)]
enum AuthRecovery {
    /// Another request already refreshed the token; retry with the current one.
    RetryWithCurrent,
    /// First rejection of this run's token: refresh once and retry.
    Refresh,
    /// The refreshed token was rejected too.
    Fatal,
}

fn classify_auth_failure(current: Option<&str>, used: &str, already_refreshed: bool) -> AuthRecovery {
    match current {
        // Concurrent requests all observe the expiry of the same token; only
        // the request still holding the stale one needs anything done.
        Some(active) if active != used => AuthRecovery::RetryWithCurrent,
        _ if already_refreshed => AuthRecovery::Fatal,
        _ => AuthRecovery::Refresh,
    }
}

impl OccurrenceClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.api_timeout_secs()))
            .build()
            .context("building http client")?;

        Ok(Self {
            http,
            base_url: config.api_base_url().trim_end_matches('/').to_string(),
            email: config.api_email().to_string(),
            password: config.api_password().to_string(),
            client_id: config.api_client_id(),
            product_id: config.api_product_id(),
            page_size: config.api_page_size(),
            series_filter: config.api_series_filter().to_string(),
            max_retries: config.api_max_retries(),
            backoff_secs: config.api_backoff_secs(),
            max_concurrency: config.api_max_concurrency(),
            token: RwLock::new(None),
            reauth: Mutex::new(false),
        })
    }

    /// Fetch every occurrence event in the window. Page 0 failure is fatal;
    /// later pages degrade to warn-and-drop.
    pub async fn fetch_window(
        self: Arc<Self>,
        start: chrono::NaiveDateTime,
        end: chrono::NaiveDateTime,
    ) -> anyhow::Result<Vec<OccurrenceEvent>> {
        let first = self
            .fetch_page_retrying(start, end, 0)
            .await
            .context("fetching first occurrence page")?;
        let total_pages = first.total_pages;
        let mut events: Vec<OccurrenceEvent> =
            first.items.into_iter().map(RawOccurrence::into_event).collect();
        info!(total_pages, first_page_events = events.len(), "occurrence_fetch_started");

        let mut outcomes: Vec<(u32, Result<OccurrencePage, SourceError>)> = Vec::new();
        let mut tasks: JoinSet<(u32, Result<OccurrencePage, SourceError>)> = JoinSet::new();
        for page in 1..total_pages {
            while tasks.len() >= self.max_concurrency {
                if let Some(joined) = tasks.join_next().await {
                    outcomes.push(joined.context("page fetch task failed")?);
                }
            }
            let client = Arc::clone(&self);
            tasks.spawn(async move { (page, client.fetch_page_retrying(start, end, page).await) });
        }
        while let Some(joined) = tasks.join_next().await {
            outcomes.push(joined.context("page fetch task failed")?);
        }

        let mut dropped_pages = 0usize;
        for (page, outcome) in outcomes {
            match outcome {
                Ok(body) => events.extend(body.items.into_iter().map(RawOccurrence::into_event)),
                Err(fatal @ SourceError::Auth(_)) => return Err(fatal.into()),
                Err(e) => {
                    dropped_pages += 1;
                    warn!(page, error = %e, "occurrence_page_dropped");
                }
            }
        }

        info!(events = events.len(), dropped_pages, "occurrence_fetch_complete");
        Ok(events)
    }

    /// Fetch one page with retries, backoff, and the one-shot
    /// re-authentication path.
    async fn fetch_page_retrying(
        &self,
        start: chrono::NaiveDateTime,
        end: chrono::NaiveDateTime,
        page: u32,
    ) -> Result<OccurrencePage, SourceError> {
        let url = format!("{}/filter/ocorrencia", self.base_url);
        // The window end always covers its full final day.
        let end_of_day = end
            .date()
            .and_hms_opt(23, 59, 59)
            .unwrap_or(end);
        let params = [
            ("page", page.to_string()),
            ("size", self.page_size.to_string()),
            ("serie", self.series_filter.clone()),
            ("de", start.format(API_DATE_FORMAT).to_string()),
            ("ate", end_of_day.format(API_DATE_FORMAT).to_string()),
            ("codigoOcorrencia", code_filter()),
            ("tipoData", "OCORRENCIA".to_string()),
        ];

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let token = self.ensure_token().await?;
            let sent = self
                .http
                .get(&url)
                .header("Authorization", token.as_str())
                .header("accept", "application/json")
                .query(&params)
                .send()
                .await;

            let retryable: SourceError = match sent {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        match resp.json::<OccurrencePage>().await {
                            Ok(body) => {
                                debug!(page, items = body.items.len(), "occurrence_page_fetched");
                                return Ok(body);
                            }
                            Err(e) => {
                                // Malformed body counts as an empty page.
                                warn!(page, error = %e, "occurrence_page_unparseable");
                                return Ok(OccurrencePage::default());
                            }
                        }
                    } else if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
                    {
                        self.recover_auth(&token, page).await?;
                        continue;
                    } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                        SourceError::Status { page, status: status.as_u16() }
                    } else {
                        return Err(SourceError::Status { page, status: status.as_u16() });
                    }
                }
                Err(e) => SourceError::Http(e),
            };

            if attempt > self.max_retries {
                return Err(retryable);
            }
            warn!(page, attempt, error = %retryable, "occurrence_page_retrying");
            tokio::time::sleep(Duration::from_secs(self.backoff_secs * attempt as u64)).await;
        }
    }

    /// Handle a 401/403 for a request that carried `used_token`. Holds the
    /// re-auth lock so concurrent rejections of the same stale token line up
    /// behind one refresh instead of each spending the one-shot budget.
    async fn recover_auth(&self, used_token: &str, page: u32) -> Result<(), SourceError> {
        let mut refreshed = self.reauth.lock().await;
        let current = self.token.read().await.clone();
        match classify_auth_failure(current.as_deref(), used_token, *refreshed) {
            AuthRecovery::RetryWithCurrent => Ok(()),
            AuthRecovery::Refresh => {
                warn!(page, "token_rejected_reauthenticating");
                *refreshed = true;
                self.refresh_token().await.map(|_| ())
            }
            AuthRecovery::Fatal => Err(SourceError::Auth(format!(
                "token rejected after refresh on page {}",
                page
            ))),
        }
    }

    async fn ensure_token(&self) -> Result<String, SourceError> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.refresh_token().await
    }

    async fn refresh_token(&self) -> Result<String, SourceError> {
        let token = self.authenticate().await?;
        *self.token.write().await = Some(token.clone());
        Ok(token)
    }

    async fn authenticate(&self) -> Result<String, SourceError> {
        let url = format!("{}/login/login", self.base_url);
        let payload = serde_json::json!({
            "email": self.email,
            "senha": self.password,
            "idcliente": self.client_id,
            "idproduto": self.product_id,
        });

        let resp = self.http.post(&url).json(&payload).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Auth(format!("login returned http {}", status.as_u16())));
        }
        let body: LoginResponse = resp
            .json()
            .await
            .map_err(|e| SourceError::Auth(format!("login body unparseable: {}", e)))?;
        match body.resposta.and_then(|b| b.token).filter(|t| !t.is_empty()) {
            Some(token) => {
                info!("api_authenticated");
                Ok(token)
            }
            None => Err(SourceError::Auth("login response carried no token".to_string())),
        }
    }
}
