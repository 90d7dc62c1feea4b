#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Parcel polygon resolution against the cadastral spatial registry.
//!
//! Applications cite lots as `lot//plan` join keys. The registry answers
//! attribute queries (`lotidstring='…' OR …`) and point-intersects
//! queries, returning `GeoJSON` feature collections. Lot lookups are
//! batched to keep the request body under the registry's limits, run with
//! bounded concurrency so the service is never flooded, and retried on
//! server-side failures — a lost batch silently removes a whole block of
//! geometry from the map, so unlike record pages it is worth retrying.
//! Every failure mode degrades to "this lot produced no polygon"; the
//! resolver never fails a pipeline run.

pub mod boundary;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use planning_map_portal::cancel::CancelToken;
use planning_map_portal::progress::ProgressCallback;
use planning_map_portal::retry::{self, RetryPolicy};

/// Default parcel query endpoint (NSW cadastre).
pub const DEFAULT_REGISTRY_URL: &str =
    "https://maps.six.nsw.gov.au/arcgis/rest/services/public/NSW_Cadastre/MapServer/9/query";

/// Default administrative boundary query endpoint.
pub const DEFAULT_BOUNDARY_URL: &str =
    "https://maps.six.nsw.gov.au/arcgis/rest/services/public/NSW_Administrative_Boundaries/MapServer/1/query";

/// Errors from spatial registry operations.
#[derive(Debug, thiserror::Error)]
pub enum CadastreError {
    /// HTTP transport failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The registry answered but the payload was not usable.
    #[error("registry error: {0}")]
    Registry(String),
}

impl From<retry::RetryError> for CadastreError {
    fn from(value: retry::RetryError) -> Self {
        match value {
            retry::RetryError::Http(e) => Self::Http(e),
            status @ retry::RetryError::Status { .. } => Self::Registry(status.to_string()),
        }
    }
}

/// Outcome of a batched lot resolution.
#[derive(Debug, Default)]
pub struct LotResolution {
    /// Parcel features from every successful batch, in batch order.
    pub features: Vec<geojson::Feature>,
    /// Requested lot ids present in no returned feature. Candidates for
    /// the point-fallback path.
    pub unresolved: Vec<String>,
    /// Batches that exhausted their retries.
    pub failed_batches: usize,
    /// Total batches issued.
    pub batches_total: usize,
}

impl LotResolution {
    /// Returns the `lotidstring` keys present in the resolved features.
    #[must_use]
    pub fn found_lot_ids(&self) -> BTreeSet<String> {
        found_lot_ids(&self.features)
    }
}

/// Client for the cadastral spatial registry.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    client: reqwest::Client,
    endpoint: String,
    boundary_endpoint: String,
    batch_size: usize,
    concurrency: usize,
    group_delay: Duration,
    timeout: Duration,
    retry: RetryPolicy,
}

impl Default for RegistryClient {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistryClient {
    /// Creates a client for the default registry endpoints.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: DEFAULT_REGISTRY_URL.to_owned(),
            boundary_endpoint: DEFAULT_BOUNDARY_URL.to_owned(),
            batch_size: 75,
            concurrency: 3,
            group_delay: Duration::from_millis(100),
            timeout: Duration::from_secs(30),
            retry: RetryPolicy::linear(3, Duration::from_millis(500)),
        }
    }

    /// Overrides the parcel query endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, url: &str) -> Self {
        self.endpoint = url.to_owned();
        self
    }

    /// Overrides the administrative boundary endpoint.
    #[must_use]
    pub fn with_boundary_endpoint(mut self, url: &str) -> Self {
        self.boundary_endpoint = url.to_owned();
        self
    }

    /// Sets how many lot ids go into one batch query. Bounded below by 1.
    #[must_use]
    pub const fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = if size == 0 { 1 } else { size };
        self
    }

    /// Sets how many batch requests may be in flight at once. Bounded
    /// below by 1.
    #[must_use]
    pub const fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = if concurrency == 0 { 1 } else { concurrency };
        self
    }

    /// Sets the delay between concurrency groups.
    #[must_use]
    pub const fn with_group_delay(mut self, delay: Duration) -> Self {
        self.group_delay = delay;
        self
    }

    /// Sets the per-request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the per-batch retry policy.
    #[must_use]
    pub const fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Resolves lot ids to parcel polygon features.
    ///
    /// Ids are deduplicated and chunked into batches; batches run in
    /// concurrency groups, each group awaited in full (with progress
    /// reported) before the next starts. A batch that exhausts its retries
    /// contributes no features and leaves its ids unresolved; the call
    /// itself always succeeds.
    pub async fn resolve_by_lots(
        &self,
        lot_ids: &[String],
        progress: Option<&Arc<dyn ProgressCallback>>,
        cancel: &CancelToken,
    ) -> LotResolution {
        let batches = chunk_batches(lot_ids, self.batch_size);
        let batches_total = batches.len();
        if batches_total == 0 {
            return LotResolution::default();
        }

        log::info!(
            "Resolving {} unique lots in {batches_total} batch(es)",
            batches.iter().map(Vec::len).sum::<usize>()
        );

        if let Some(p) = progress {
            p.set_total(batches_total as u64);
        }

        let mut resolution = LotResolution {
            batches_total,
            ..LotResolution::default()
        };
        let mut completed = 0usize;

        for group in batches.chunks(self.concurrency) {
            if cancel.is_cancelled() {
                log::debug!("Lot resolution cancelled after {completed}/{batches_total} batches");
                break;
            }

            let results =
                futures::future::join_all(group.iter().map(|batch| self.fetch_batch(batch))).await;

            for (batch, result) in group.iter().zip(results) {
                completed += 1;
                match result {
                    Ok(features) => {
                        log::debug!(
                            "Batch {completed}/{batches_total}: {} features",
                            features.len()
                        );
                        resolution.features.extend(features);
                    }
                    Err(e) => {
                        log::warn!(
                            "Batch {completed}/{batches_total} failed ({} lots dropped): {e}",
                            batch.len()
                        );
                        resolution.failed_batches += 1;
                    }
                }
            }

            if let Some(p) = progress {
                p.set_position(completed as u64);
                p.set_message(format!("batch {completed}/{batches_total}"));
            }

            if completed < batches_total && !self.group_delay.is_zero() {
                tokio::time::sleep(self.group_delay).await;
            }
        }

        let found = found_lot_ids(&resolution.features);
        resolution.unresolved = batches
            .into_iter()
            .flatten()
            .filter(|id| !found.contains(id.as_str()))
            .collect();

        log::info!(
            "Lot resolution complete: {} features, {} unresolved, {} failed batch(es)",
            resolution.features.len(),
            resolution.unresolved.len(),
            resolution.failed_batches
        );

        resolution
    }

    /// Resolves one WGS84 point to the first intersecting parcel feature.
    ///
    /// Used per-application, only for applications whose lot lookups found
    /// nothing (or that cite no lots) but which carry a coordinate.
    /// Returns `None` when the query fails or nothing intersects.
    pub async fn resolve_by_point(&self, longitude: f64, latitude: f64) -> Option<geojson::Feature> {
        let params = vec![
            ("geometry".to_owned(), format!("{longitude},{latitude}")),
            ("geometryType".to_owned(), "esriGeometryPoint".to_owned()),
            ("spatialRel".to_owned(), "esriSpatialRelIntersects".to_owned()),
            ("outFields".to_owned(), "*".to_owned()),
            ("returnGeometry".to_owned(), "true".to_owned()),
            ("f".to_owned(), "geojson".to_owned()),
            ("inSR".to_owned(), "4326".to_owned()),
        ];

        let body = retry::send_json(RetryPolicy::none(), || {
            self.client
                .post(&self.endpoint)
                .timeout(self.timeout)
                .form(&params)
        })
        .await;

        match body.map_err(CadastreError::from).and_then(|b| parse_collection(&b)) {
            Ok(collection) => collection.features.into_iter().next(),
            Err(e) => {
                log::warn!("Point query ({longitude}, {latitude}) failed: {e}");
                None
            }
        }
    }

    /// Fetches one batch of lots, retrying per the client policy.
    async fn fetch_batch(&self, batch: &[String]) -> Result<Vec<geojson::Feature>, CadastreError> {
        let params = vec![
            ("where".to_owned(), where_clause(batch)),
            ("outFields".to_owned(), "*".to_owned()),
            ("f".to_owned(), "geojson".to_owned()),
            ("returnGeometry".to_owned(), "true".to_owned()),
            ("spatialRel".to_owned(), "esriSpatialRelIntersects".to_owned()),
        ];

        let body = retry::send_json(self.retry, || {
            self.client
                .post(&self.endpoint)
                .timeout(self.timeout)
                .form(&params)
        })
        .await?;

        Ok(parse_collection(&body)?.features)
    }
}

/// Trims, deduplicates (keeping first occurrence), and chunks lot ids.
fn chunk_batches(lot_ids: &[String], batch_size: usize) -> Vec<Vec<String>> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let unique: Vec<String> = lot_ids
        .iter()
        .map(|id| id.trim())
        .filter(|id| !id.is_empty() && seen.insert(*id))
        .map(str::to_owned)
        .collect();

    unique
        .chunks(batch_size.max(1))
        .map(<[String]>::to_vec)
        .collect()
}

/// Builds the OR-of-equalities predicate for one batch.
fn where_clause(batch: &[String]) -> String {
    batch
        .iter()
        .map(|lot| format!("lotidstring='{}'", escape_quotes(lot)))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// Escapes single quotes for the registry's query language.
fn escape_quotes(value: &str) -> String {
    value.replace('\'', "''")
}

/// Extracts the `lotidstring` attribute of every returned feature.
fn found_lot_ids(features: &[geojson::Feature]) -> BTreeSet<String> {
    features
        .iter()
        .filter_map(|f| {
            f.property("lotidstring")
                .and_then(serde_json::Value::as_str)
                .map(str::to_owned)
        })
        .collect()
}

/// Parses a registry response into a feature collection.
///
/// The registry reports its own failures as HTTP 200 with an `error`
/// object, so that shape is checked before the `GeoJSON` parse.
fn parse_collection(body: &serde_json::Value) -> Result<geojson::FeatureCollection, CadastreError> {
    if let Some(error) = body.get("error") {
        return Err(CadastreError::Registry(error.to_string()));
    }
    serde_json::from_value(body.clone())
        .map_err(|e| CadastreError::Registry(format!("unexpected response shape: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("{i}//DP1000")).collect()
    }

    #[test]
    fn chunks_two_hundred_ids_into_three_batches() {
        let batches = chunk_batches(&ids(200), 75);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[0].len(), 75);
        assert_eq!(batches[1].len(), 75);
        assert_eq!(batches[2].len(), 50);
    }

    #[test]
    fn deduplicates_and_drops_blank_ids() {
        let input = vec![
            "1//DP1".to_owned(),
            " 1//DP1 ".to_owned(),
            String::new(),
            "2//DP1".to_owned(),
        ];
        let batches = chunk_batches(&input, 10);
        assert_eq!(batches, vec![vec!["1//DP1".to_owned(), "2//DP1".to_owned()]]);
    }

    #[test]
    fn where_clause_joins_with_or() {
        let clause = where_clause(&["1//DP1".to_owned(), "2//DP2".to_owned()]);
        assert_eq!(clause, "lotidstring='1//DP1' OR lotidstring='2//DP2'");
    }

    #[test]
    fn where_clause_escapes_quotes() {
        let clause = where_clause(&["1//O'BRIEN".to_owned()]);
        assert_eq!(clause, "lotidstring='1//O''BRIEN'");
    }

    #[test]
    fn found_ids_read_from_properties() {
        let body = serde_json::json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [151.0, -33.0] },
                    "properties": { "lotidstring": "1//DP1" }
                },
                {
                    "type": "Feature",
                    "geometry": { "type": "Point", "coordinates": [151.1, -33.1] },
                    "properties": {}
                }
            ]
        });
        let collection = parse_collection(&body).unwrap();
        let found = found_lot_ids(&collection.features);
        assert!(found.contains("1//DP1"));
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn registry_error_body_is_rejected() {
        let body = serde_json::json!({
            "error": { "code": 400, "message": "Unable to complete operation." }
        });
        assert!(matches!(
            parse_collection(&body),
            Err(CadastreError::Registry(_))
        ));
    }

    #[tokio::test]
    async fn empty_input_issues_no_batches() {
        let client = RegistryClient::new();
        let resolution = client
            .resolve_by_lots(&[], None, &CancelToken::new())
            .await;
        assert_eq!(resolution.batches_total, 0);
        assert!(resolution.features.is_empty());
        assert!(resolution.unresolved.is_empty());
    }
}
