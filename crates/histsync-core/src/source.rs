//! Remote source of issuer, company, and history pages.
//!
//! [`RemoteSource`] is the contract the sync pipeline fetches through;
//! [`MseSource`] implements it against the Macedonian Stock Exchange website.
//!
//! Every HTTP attempt holds one [`RateLimiter`] permit for the duration of the
//! request. Backoff sleeps between retries hold none.

use std::collections::HashSet;
use std::fmt::{Display, Formatter};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::domain::{format_query_date, CompanyProfile, FetchWindow, IssuerCode, RawRow};
use crate::extract;
use crate::http_client::{HttpClient, HttpError, HttpRequest};
use crate::rate_limit::RateLimiter;
use crate::retry::RetryConfig;

pub const DEFAULT_BASE_URL: &str = "https://www.mse.mk";

/// Codes listed on the schedule page that are not listed equities.
const EXCLUDED_ISSUERS: [&str; 3] = ["CKB", "SNBTO", "TTK"];

/// Source-level error classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceErrorKind {
    Unavailable,
    MalformedPage,
    InvalidRequest,
    Internal,
}

/// Structured error returned by remote fetches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceError {
    kind: SourceErrorKind,
    message: String,
    retryable: bool,
}

impl SourceError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Unavailable,
            message: message.into(),
            retryable: true,
        }
    }

    pub fn malformed_page(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::MalformedPage,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::InvalidRequest,
            message: message.into(),
            retryable: false,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self {
            kind: SourceErrorKind::Internal,
            message: message.into(),
            retryable: false,
        }
    }

    pub const fn kind(&self) -> SourceErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub const fn retryable(&self) -> bool {
        self.retryable
    }

    pub const fn code(&self) -> &'static str {
        match self.kind {
            SourceErrorKind::Unavailable => "source.unavailable",
            SourceErrorKind::MalformedPage => "source.malformed_page",
            SourceErrorKind::InvalidRequest => "source.invalid_request",
            SourceErrorKind::Internal => "source.internal",
        }
    }
}

impl Display for SourceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.code())
    }
}

impl std::error::Error for SourceError {}

impl From<HttpError> for SourceError {
    fn from(error: HttpError) -> Self {
        if error.retryable() {
            Self::unavailable(error.message())
        } else {
            Self::invalid_request(error.message())
        }
    }
}

/// Contract for fetching exchange data.
pub trait RemoteSource: Send + Sync {
    /// Issuer codes currently listed, in page order, without duplicates.
    fn fetch_issuer_list<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<IssuerCode>, SourceError>> + Send + 'a>>;

    /// Company profile for an issuer. Never fails: an unreachable or
    /// unrecognized page yields [`CompanyProfile::code_only`].
    fn fetch_company_profile<'a>(
        &'a self,
        code: &'a IssuerCode,
    ) -> Pin<Box<dyn Future<Output = CompanyProfile> + Send + 'a>>;

    /// Raw table rows of one history window.
    fn fetch_history_window<'a>(
        &'a self,
        window: &'a FetchWindow,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawRow>, SourceError>> + Send + 'a>>;
}

/// Remote source backed by the exchange website.
#[derive(Clone)]
pub struct MseSource {
    http_client: Arc<dyn HttpClient>,
    limiter: RateLimiter,
    retry: RetryConfig,
    base_url: String,
    timeout_ms: u64,
}

impl MseSource {
    pub fn new(http_client: Arc<dyn HttpClient>, limiter: RateLimiter) -> Self {
        Self {
            http_client,
            limiter,
            retry: RetryConfig::default(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_ms: 30_000,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn issuer_list_url(&self) -> String {
        format!("{}/en/stats/current-schedule", self.base_url)
    }

    pub fn company_url(&self, code: &IssuerCode) -> String {
        format!(
            "{}/en/symbol/{}",
            self.base_url,
            urlencoding::encode(code.as_str())
        )
    }

    pub fn history_url(&self, window: &FetchWindow) -> String {
        format!(
            "{}/mk/stats/symbolhistory/{}?FromDate={}&ToDate={}",
            self.base_url,
            urlencoding::encode(window.code.as_str()),
            format_query_date(window.from),
            format_query_date(window.to),
        )
    }

    /// One rate-limited GET. Non-2xx statuses are retryable failures.
    async fn fetch_once(&self, url: &str) -> Result<String, SourceError> {
        let request = HttpRequest::get(url)
            .with_header("accept", "text/html")
            .with_timeout_ms(self.timeout_ms);

        let permit = self.limiter.acquire().await?;
        let result = self.http_client.execute(request).await;
        drop(permit);

        let response = result?;
        if !response.is_success() {
            return Err(SourceError::unavailable(format!(
                "GET {url} returned status {}",
                response.status
            )));
        }
        Ok(response.body)
    }

    async fn fetch_with_retry(&self, url: &str) -> Result<String, SourceError> {
        self.retry.run(url, |_| self.fetch_once(url)).await
    }
}

impl RemoteSource for MseSource {
    fn fetch_issuer_list<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<IssuerCode>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let body = self.fetch_with_retry(&self.issuer_list_url()).await?;
            let cells = extract::first_column(&body)?;
            Ok(select_issuers(cells))
        })
    }

    fn fetch_company_profile<'a>(
        &'a self,
        code: &'a IssuerCode,
    ) -> Pin<Box<dyn Future<Output = CompanyProfile> + Send + 'a>> {
        Box::pin(async move {
            let parsed = match self.fetch_once(&self.company_url(code)).await {
                Ok(body) => extract::company_profile(&body, code),
                Err(error) => Err(error),
            };

            match parsed {
                Ok(Some(profile)) => profile,
                Ok(None) => {
                    warn!(code = %code, "company page has no title, using code as name");
                    CompanyProfile::code_only(code.clone())
                }
                Err(error) => {
                    warn!(code = %code, error = %error, "company page unavailable, using code as name");
                    CompanyProfile::code_only(code.clone())
                }
            }
        })
    }

    fn fetch_history_window<'a>(
        &'a self,
        window: &'a FetchWindow,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<RawRow>, SourceError>> + Send + 'a>> {
        Box::pin(async move {
            let body = self.fetch_with_retry(&self.history_url(window)).await?;
            let rows = extract::table_rows(&body, extract::TABLE_ROWS)?;
            debug!(
                code = %window.code,
                from = %window.from,
                to = %window.to,
                rows = rows.len(),
                "fetched history window"
            );
            Ok(rows)
        })
    }
}

/// Keep valid, listed equity codes in page order, dropping repeats.
fn select_issuers(cells: Vec<String>) -> Vec<IssuerCode> {
    let mut seen = HashSet::new();
    cells
        .into_iter()
        .filter_map(|cell| match IssuerCode::parse(&cell) {
            Ok(code) => Some(code),
            Err(error) => {
                debug!(cell = %cell, error = %error, "skipping schedule row");
                None
            }
        })
        .filter(|code| !EXCLUDED_ISSUERS.contains(&code.as_str()) && !code.contains_digit())
        .filter(|code| seen.insert(code.clone()))
        .collect()
}
