#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Paginated retriever for planning portal application records.
//!
//! The portal exposes a paged API: the first page reports `TotalPages` and
//! `TotalRecords`, and pages are fetched strictly sequentially with a short
//! delay between requests to respect the portal's rate limits. A failed
//! later page is logged and skipped — partial results beat total failure —
//! while a failed or malformed *first* page fails the whole fetch, since
//! nothing useful has been collected yet.

mod parse;

pub mod cancel;
pub mod progress;
pub mod retry;

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use planning_map_portal_models::{ApplicationKind, ApplicationRecord};

use crate::cancel::CancelToken;
use crate::parse::PortalPage;
use crate::progress::ProgressCallback;
use crate::retry::{RetryError, RetryPolicy};

/// Default portal endpoint (NSW ePlanning `OnlineDA` feed).
pub const DEFAULT_PORTAL_URL: &str = "https://api.apps1.nsw.gov.au/eplanning/data/v0/OnlineDA";

/// Hard cap on the page size the portal accepts.
pub const MAX_PAGE_SIZE: u32 = 2000;

/// Errors from portal fetch operations.
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// The portal was unreachable or kept failing on the first page.
    #[error("portal unavailable: {0}")]
    Upstream(String),

    /// The portal response did not have the expected shape.
    #[error("unexpected portal response format: {0}")]
    InvalidFormat(String),

    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The run was cancelled before the fetch completed.
    #[error("fetch cancelled")]
    Cancelled,
}

impl From<RetryError> for PortalError {
    fn from(value: RetryError) -> Self {
        match value {
            RetryError::Http(e) => Self::Http(e),
            status @ RetryError::Status { .. } => Self::Upstream(status.to_string()),
        }
    }
}

/// Filter criteria serialized into the portal request.
#[derive(Debug, Clone)]
pub struct FetchCriteria {
    /// Council / local government area name.
    pub jurisdiction: String,
    /// Only fetch applications lodged on or after this date.
    pub lodged_since: Option<NaiveDate>,
    /// Restrict to one application kind (e.g. only original DAs).
    pub kind: Option<ApplicationKind>,
}

impl FetchCriteria {
    /// Creates criteria for one jurisdiction with no further filters.
    #[must_use]
    pub fn new(jurisdiction: &str) -> Self {
        Self {
            jurisdiction: jurisdiction.to_owned(),
            lodged_since: None,
            kind: None,
        }
    }

    /// Sets the minimum lodgement date.
    #[must_use]
    pub const fn with_lodged_since(mut self, date: NaiveDate) -> Self {
        self.lodged_since = Some(date);
        self
    }

    /// Restricts the fetch to one application kind.
    #[must_use]
    pub fn with_kind(mut self, kind: ApplicationKind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Serializes the criteria into the portal's `filters` header value.
    #[must_use]
    pub fn to_filters_json(&self) -> serde_json::Value {
        let mut filters = serde_json::Map::new();
        filters.insert(
            "CouncilName".to_owned(),
            serde_json::json!([self.jurisdiction]),
        );
        if let Some(date) = self.lodged_since {
            filters.insert(
                "LodgementDateFrom".to_owned(),
                serde_json::Value::String(date.format("%Y-%m-%d").to_string()),
            );
        }
        if let Some(kind) = &self.kind {
            filters.insert(
                "ApplicationType".to_owned(),
                serde_json::Value::String(String::from(kind.clone())),
            );
        }
        serde_json::json!({ "filters": filters })
    }
}

/// Trait for fetching one page of a paged record feed.
///
/// [`PortalClient`] provides the HTTP implementation; tests drive the page
/// loop with canned pages.
pub trait PageSource: Send + Sync {
    /// Fetches a single page (1-based).
    ///
    /// # Errors
    ///
    /// Returns [`PortalError`] if the request fails after the source's own
    /// retry handling.
    fn fetch_page(
        &self,
        page: u32,
    ) -> impl std::future::Future<Output = Result<serde_json::Value, PortalError>> + Send;
}

/// HTTP client for the paged portal API.
#[derive(Debug, Clone)]
pub struct PortalClient {
    client: reqwest::Client,
    base_url: String,
    page_size: u32,
    page_delay: Duration,
    timeout: Duration,
    retry: RetryPolicy,
}

impl Default for PortalClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PortalClient {
    /// Creates a client for the default portal endpoint.
    ///
    /// Pages are not retried by default: a lost page costs little and the
    /// loop continues with partial data. Use
    /// [`with_retry`](Self::with_retry) to tighten that per deployment.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_PORTAL_URL.to_owned(),
            page_size: 500,
            page_delay: Duration::from_millis(50),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::none(),
        }
    }

    /// Overrides the portal endpoint.
    #[must_use]
    pub fn with_base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_owned();
        self
    }

    /// Sets the page size, capped at [`MAX_PAGE_SIZE`].
    #[must_use]
    pub const fn with_page_size(mut self, size: u32) -> Self {
        self.page_size = if size > MAX_PAGE_SIZE { MAX_PAGE_SIZE } else { size };
        self
    }

    /// Sets the delay between consecutive page requests.
    #[must_use]
    pub const fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the per-page retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Fetches every page of applications matching `criteria`.
    ///
    /// Progress is reported after each page with the running record count.
    ///
    /// # Errors
    ///
    /// Returns [`PortalError`] if the first page fails, the first response
    /// is malformed, or the run is cancelled. Later page failures are
    /// logged and skipped.
    pub async fn fetch_all(
        &self,
        criteria: &FetchCriteria,
        progress: Option<&Arc<dyn ProgressCallback>>,
        cancel: &CancelToken,
    ) -> Result<Vec<ApplicationRecord>, PortalError> {
        let query = PortalQuery {
            client: self,
            criteria,
        };
        fetch_all_pages(
            &query,
            &criteria.jurisdiction,
            self.page_delay,
            progress,
            cancel,
        )
        .await
    }
}

/// A [`PortalClient`] bound to one set of fetch criteria.
struct PortalQuery<'a> {
    client: &'a PortalClient,
    criteria: &'a FetchCriteria,
}

impl PageSource for PortalQuery<'_> {
    async fn fetch_page(&self, page: u32) -> Result<serde_json::Value, PortalError> {
        let client = self.client;
        let filters = self.criteria.to_filters_json().to_string();

        log::debug!("Fetching portal page {page}: {}", client.base_url);

        let body = retry::send_json(client.retry, || {
            client
                .client
                .get(&client.base_url)
                .timeout(client.timeout)
                .header("Accept", "application/json")
                .header("PageSize", client.page_size.to_string())
                .header("PageNumber", page.to_string())
                .header("filters", filters.clone())
        })
        .await?;

        Ok(body)
    }
}

/// Drives the sequential page loop over any [`PageSource`].
///
/// # Errors
///
/// Returns [`PortalError`] on first-page failure, a malformed first
/// response, or cancellation.
pub async fn fetch_all_pages<S: PageSource>(
    source: &S,
    jurisdiction: &str,
    page_delay: Duration,
    progress: Option<&Arc<dyn ProgressCallback>>,
    cancel: &CancelToken,
) -> Result<Vec<ApplicationRecord>, PortalError> {
    if cancel.is_cancelled() {
        return Err(PortalError::Cancelled);
    }

    let first = source
        .fetch_page(1)
        .await
        .map_err(|e| match e {
            err @ (PortalError::Cancelled | PortalError::InvalidFormat(_)) => err,
            err => PortalError::Upstream(err.to_string()),
        })?;

    let page: PortalPage = serde_json::from_value(first)
        .map_err(|e| PortalError::InvalidFormat(e.to_string()))?;
    let Some(applications) = page.applications else {
        return Err(PortalError::InvalidFormat(
            "response missing Application array".to_owned(),
        ));
    };

    let total_pages = page.total_pages.unwrap_or(1).max(1);
    let total_records = page.total_records.unwrap_or(applications.len() as u64);

    let mut records: Vec<ApplicationRecord> = applications
        .into_iter()
        .map(|a| a.into_record(jurisdiction))
        .collect();

    if let Some(p) = progress {
        p.set_total(total_records);
        p.set_position(records.len() as u64);
        p.set_message(format!("page 1/{total_pages}"));
    }

    let mut skipped_pages = 0u32;

    for page_number in 2..=total_pages {
        if cancel.is_cancelled() {
            return Err(PortalError::Cancelled);
        }
        if !page_delay.is_zero() {
            tokio::time::sleep(page_delay).await;
        }

        match source.fetch_page(page_number).await {
            Err(e) => {
                log::warn!("Page {page_number}/{total_pages} failed, skipping: {e}");
                skipped_pages += 1;
            }
            Ok(body) => match serde_json::from_value::<PortalPage>(body) {
                Ok(PortalPage {
                    applications: Some(applications),
                    ..
                }) => {
                    log::debug!(
                        "Page {page_number}/{total_pages}: {} records",
                        applications.len()
                    );
                    records.extend(applications.into_iter().map(|a| a.into_record(jurisdiction)));
                }
                Ok(_) | Err(_) => {
                    log::warn!(
                        "Page {page_number}/{total_pages} malformed, skipping"
                    );
                    skipped_pages += 1;
                }
            },
        }

        if let Some(p) = progress {
            p.set_position(records.len() as u64);
            p.set_message(format!("page {page_number}/{total_pages}"));
        }
    }

    if skipped_pages > 0 {
        log::warn!(
            "Fetched {} applications for {jurisdiction} with {skipped_pages} page(s) skipped",
            records.len()
        );
    } else {
        log::info!("Fetched {} applications for {jurisdiction}", records.len());
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Canned page source: `Ok` pages are served as-is, `Err` pages fail.
    struct StubSource {
        pages: Vec<Result<serde_json::Value, ()>>,
    }

    impl PageSource for StubSource {
        async fn fetch_page(&self, page: u32) -> Result<serde_json::Value, PortalError> {
            match self.pages.get(page as usize - 1) {
                Some(Ok(body)) => Ok(body.clone()),
                Some(Err(())) => Err(PortalError::Upstream("stubbed failure".to_owned())),
                None => Err(PortalError::Upstream(format!("no page {page}"))),
            }
        }
    }

    fn page(total_pages: u32, total_records: u64, count: usize, tag: &str) -> serde_json::Value {
        let applications: Vec<serde_json::Value> = (0..count)
            .map(|i| {
                serde_json::json!({
                    "PlanningPortalApplicationNumber": format!("PAN-{tag}-{i}"),
                    "ApplicationStatus": "Lodged",
                    "ApplicationType": "DA"
                })
            })
            .collect();
        serde_json::json!({
            "TotalRecords": total_records,
            "TotalPages": total_pages,
            "Application": applications
        })
    }

    #[tokio::test]
    async fn collects_every_page() {
        let source = StubSource {
            pages: vec![
                Ok(page(3, 7, 3, "a")),
                Ok(page(3, 7, 3, "b")),
                Ok(page(3, 7, 1, "c")),
            ],
        };
        let records =
            fetch_all_pages(&source, "Test", Duration::ZERO, None, &CancelToken::new())
                .await
                .unwrap();
        assert_eq!(records.len(), 7);
    }

    #[tokio::test]
    async fn skips_failed_later_pages() {
        let source = StubSource {
            pages: vec![Ok(page(3, 9, 3, "a")), Err(()), Ok(page(3, 9, 3, "c"))],
        };
        let records =
            fetch_all_pages(&source, "Test", Duration::ZERO, None, &CancelToken::new())
                .await
                .unwrap();
        assert_eq!(records.len(), 6);
        assert!(records.iter().all(|r| {
            let pan = r.pan.as_deref().unwrap();
            pan.contains("-a-") || pan.contains("-c-")
        }));
    }

    #[tokio::test]
    async fn first_page_failure_is_fatal() {
        let source = StubSource {
            pages: vec![Err(())],
        };
        let result =
            fetch_all_pages(&source, "Test", Duration::ZERO, None, &CancelToken::new()).await;
        assert!(matches!(result, Err(PortalError::Upstream(_))));
    }

    #[tokio::test]
    async fn malformed_first_page_is_invalid_format() {
        let source = StubSource {
            pages: vec![Ok(serde_json::json!({ "TotalPages": 2 }))],
        };
        let result =
            fetch_all_pages(&source, "Test", Duration::ZERO, None, &CancelToken::new()).await;
        assert!(matches!(result, Err(PortalError::InvalidFormat(_))));
    }

    #[tokio::test]
    async fn cancelled_run_stops_fetching() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let source = StubSource {
            pages: vec![Ok(page(1, 1, 1, "a"))],
        };
        let result = fetch_all_pages(&source, "Test", Duration::ZERO, None, &cancel).await;
        assert!(matches!(result, Err(PortalError::Cancelled)));
    }

    #[test]
    fn criteria_serializes_filters() {
        let criteria = FetchCriteria::new("Inner West")
            .with_lodged_since(NaiveDate::from_ymd_opt(2020, 1, 1).unwrap())
            .with_kind(ApplicationKind::Development);
        let filters = criteria.to_filters_json();
        assert_eq!(
            filters["filters"]["CouncilName"],
            serde_json::json!(["Inner West"])
        );
        assert_eq!(filters["filters"]["LodgementDateFrom"], "2020-01-01");
        assert_eq!(filters["filters"]["ApplicationType"], "DA");
    }

    #[test]
    fn page_size_is_capped() {
        let client = PortalClient::new().with_page_size(100_000);
        assert_eq!(client.page_size, MAX_PAGE_SIZE);
    }
}
