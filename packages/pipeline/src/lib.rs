#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Staged pipeline driver for one jurisdiction.
//!
//! One user-triggered run walks the stages strictly in order — fetch,
//! deduplicate, resolve parcels, dissolve, assemble — awaiting each stage
//! in full before the next starts. Per-item failures inside a stage are
//! absorbed and logged (skipped pages, failed batches, degenerate unions);
//! whole-operation failures (first page, malformed response, validation)
//! surface as [`PipelineError`] for the caller's messaging. A run owns a
//! [`CancelToken`] so a superseding run can discard it cleanly.

pub mod stats;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::NaiveDate;
use geo::Contains as _;
use planning_map_cadastre::boundary::BoundaryCache;
use planning_map_cadastre::RegistryClient;
use planning_map_dedup::{DedupStrategy, deduplicate};
use planning_map_layer::features::{self, PointAssembly};
use planning_map_layer::validate::validate_collection;
use planning_map_layer::{LayerError, LayerHandle, RenderBoundary, StyleDescriptor};
use planning_map_portal::cancel::CancelToken;
use planning_map_portal::progress::ProgressCallback;
use planning_map_portal::{FetchCriteria, PortalClient, PortalError};
use planning_map_portal_models::{ApplicationKind, ApplicationRecord};

use crate::stats::SummaryStats;

/// Errors that end a pipeline run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Record retrieval failed outright.
    #[error(transparent)]
    Portal(#[from] PortalError),

    /// An assembled collection failed validation or the render boundary
    /// rejected a submission.
    #[error(transparent)]
    Layer(#[from] LayerError),

    /// The run was superseded and cancelled.
    #[error("pipeline run cancelled")]
    Cancelled,
}

/// Configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Jurisdiction (local government area) to fetch.
    pub jurisdiction: String,
    /// Only include applications lodged on or after this date.
    pub lodged_since: Option<NaiveDate>,
    /// Restrict the fetch to one application kind.
    pub kind: Option<ApplicationKind>,
    /// Which duplicate-merging strategy to run.
    pub strategy: DedupStrategy,
    /// Drop canonical records whose point falls outside the jurisdiction
    /// boundary polygon.
    pub filter_to_boundary: bool,
}

impl PipelineConfig {
    /// Creates a config with the default strategy and no extra filters.
    #[must_use]
    pub fn new(jurisdiction: &str) -> Self {
        Self {
            jurisdiction: jurisdiction.to_owned(),
            lodged_since: None,
            kind: None,
            strategy: DedupStrategy::IdentifierFirst,
            filter_to_boundary: false,
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

    /// Selects the deduplication strategy.
    #[must_use]
    pub const fn with_strategy(mut self, strategy: DedupStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Enables the jurisdiction boundary filter.
    #[must_use]
    pub const fn with_boundary_filter(mut self) -> Self {
        self.filter_to_boundary = true;
        self
    }
}

/// Progress callbacks for the two long-running stages.
#[derive(Default)]
pub struct ProgressHooks {
    /// Page-by-page retrieval progress.
    pub pages: Option<Arc<dyn ProgressCallback>>,
    /// Parcel batch resolution progress.
    pub batches: Option<Arc<dyn ProgressCallback>>,
}

/// Per-run resolution diagnostics surfaced alongside the output.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunDiagnostics {
    /// Parcel batches that exhausted their retries.
    pub failed_batches: usize,
    /// Lot ids that produced no polygon.
    pub unresolved_lots: usize,
    /// Applications recovered through the point-intersects fallback.
    pub point_fallbacks: usize,
    /// Candidate point features rejected for non-finite coordinates.
    pub rejected_points: usize,
}

/// Everything one run produces.
#[derive(Debug)]
pub struct PipelineOutput {
    /// Canonical (deduplicated) records, including those that never made
    /// it onto the map. This is the tabular/statistical record set.
    pub records: Vec<ApplicationRecord>,
    /// Validated point feature collection.
    pub points: geojson::FeatureCollection,
    /// Validated dissolved-parcel feature collection.
    pub parcels: geojson::FeatureCollection,
    /// Aggregate figures over `records`.
    pub stats: SummaryStats,
    /// Resolution diagnostics.
    pub diagnostics: RunDiagnostics,
}

/// Layer handles returned by [`submit_output`].
#[derive(Debug, Default)]
pub struct SubmittedLayers {
    /// Handle for the point layer, when one was submitted.
    pub points: Option<LayerHandle>,
    /// Handle for the parcel layer, when one was submitted.
    pub parcels: Option<LayerHandle>,
}

/// The pipeline with its two remote collaborators.
pub struct Pipeline {
    portal: PortalClient,
    registry: RegistryClient,
}

impl Pipeline {
    /// Creates a pipeline over the given clients.
    #[must_use]
    pub const fn new(portal: PortalClient, registry: RegistryClient) -> Self {
        Self { portal, registry }
    }

    /// Runs the full pipeline for one jurisdiction.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError`] when retrieval fails outright, an
    /// assembled collection fails validation, or the run is cancelled.
    pub async fn run(
        &self,
        config: &PipelineConfig,
        boundary_cache: &mut BoundaryCache,
        hooks: &ProgressHooks,
        cancel: &CancelToken,
    ) -> Result<PipelineOutput, PipelineError> {
        let mut criteria = FetchCriteria::new(&config.jurisdiction);
        if let Some(date) = config.lodged_since {
            criteria = criteria.with_lodged_since(date);
        }
        if let Some(kind) = &config.kind {
            criteria = criteria.with_kind(kind.clone());
        }

        let raw = self
            .portal
            .fetch_all(&criteria, hooks.pages.as_ref(), cancel)
            .await
            .map_err(|e| match e {
                PortalError::Cancelled => PipelineError::Cancelled,
                other => PipelineError::Portal(other),
            })?;
        if let Some(p) = &hooks.pages {
            p.finish(format!("{} records fetched", raw.len()));
        }

        ensure_live(cancel)?;
        let mut canonical = deduplicate(raw, config.strategy);
        log::info!(
            "{} canonical applications for {}",
            canonical.len(),
            config.jurisdiction
        );

        if config.filter_to_boundary {
            self.filter_to_boundary(&mut canonical, &config.jurisdiction, boundary_cache)
                .await;
        }

        ensure_live(cancel)?;

        // Branch A: direct point features.
        let PointAssembly {
            features: point_features,
            rejected: rejected_points,
        } = features::point_features(&canonical);

        // Branch B: lot resolution, point fallback, dissolve.
        let (lot_ids, primary) = lot_to_primary(&canonical);
        let resolution = self
            .registry
            .resolve_by_lots(&lot_ids, hooks.batches.as_ref(), cancel)
            .await;
        ensure_live(cancel)?;
        if let Some(p) = &hooks.batches {
            p.finish(format!("{} parcels resolved", resolution.features.len()));
        }

        let found = resolution.found_lot_ids();
        let mut diagnostics = RunDiagnostics {
            failed_batches: resolution.failed_batches,
            unresolved_lots: resolution.unresolved.len(),
            point_fallbacks: 0,
            rejected_points,
        };

        let mut parcel_candidates: Vec<geojson::Feature> = Vec::new();
        for feature in resolution.features {
            let Some(lot_id) = feature
                .property("lotidstring")
                .and_then(serde_json::Value::as_str)
            else {
                continue;
            };
            let Some(&idx) = primary.get(lot_id) else {
                continue;
            };
            let Some(geometry) = feature.geometry else {
                continue;
            };
            parcel_candidates.push(features::parcel_feature(&canonical[idx], geometry));
        }

        for record in &canonical {
            ensure_live(cancel)?;
            if !needs_point_fallback(record, &found) {
                continue;
            }
            let Some(location) = record.location else {
                continue;
            };
            if let Some(parcel) = self
                .registry
                .resolve_by_point(location.longitude, location.latitude)
                .await
                && let Some(geometry) = parcel.geometry
            {
                parcel_candidates.push(features::parcel_feature(record, geometry));
                diagnostics.point_fallbacks += 1;
            }
        }
        if diagnostics.point_fallbacks > 0 {
            log::info!(
                "Point fallback recovered {} application(s)",
                diagnostics.point_fallbacks
            );
        }

        let parcel_features: Vec<geojson::Feature> =
            planning_map_geometry::dissolve_by_key(parcel_candidates, dissolve_group_key)
                .into_iter()
                .map(|parcel| geojson::Feature {
                    bbox: None,
                    geometry: Some(parcel.geometry),
                    id: None,
                    properties: parcel.properties,
                    foreign_members: None,
                })
                .collect();

        let points = collection(point_features);
        let parcels = collection(parcel_features);
        validate_collection(&points)?;
        validate_collection(&parcels)?;

        let stats = SummaryStats::from_records(&canonical);

        Ok(PipelineOutput {
            records: canonical,
            points,
            parcels,
            stats,
            diagnostics,
        })
    }

    /// Drops records whose point falls outside the jurisdiction boundary.
    ///
    /// Records without a point are kept — they cannot be tested against
    /// the polygon. Any boundary failure keeps the full record set; the
    /// filter is a refinement, not a gate.
    async fn filter_to_boundary(
        &self,
        records: &mut Vec<ApplicationRecord>,
        jurisdiction: &str,
        cache: &mut BoundaryCache,
    ) {
        let collection = match self.registry.fetch_boundary(jurisdiction, cache).await {
            Ok(collection) => collection,
            Err(e) => {
                log::warn!("Boundary fetch for {jurisdiction} failed, keeping all records: {e}");
                return;
            }
        };

        let Some(boundary) = collection
            .features
            .iter()
            .filter_map(|f| f.geometry.as_ref())
            .find_map(planning_map_geometry::to_multi_polygon)
        else {
            log::warn!("No usable boundary polygon for {jurisdiction}, keeping all records");
            return;
        };

        let before = records.len();
        records.retain(|record| match record.location {
            Some(location) if location.is_finite() => {
                boundary.contains(&geo::Point::new(location.longitude, location.latitude))
            }
            _ => true,
        });
        if before > records.len() {
            log::info!(
                "Boundary filter removed {} record(s) outside {jurisdiction}",
                before - records.len()
            );
        }
    }
}

/// Submits the run's collections to the render boundary with the standard
/// layer names and styles. Empty collections are not submitted.
///
/// # Errors
///
/// Returns [`PipelineError::Layer`] if the boundary rejects a layer.
pub async fn submit_output(
    boundary: &dyn RenderBoundary,
    jurisdiction: &str,
    output: &PipelineOutput,
) -> Result<SubmittedLayers, PipelineError> {
    let date = chrono::Local::now().format("%-d %B %Y");
    let mut submitted = SubmittedLayers::default();

    if !output.points.features.is_empty() {
        let name = format!("DA - {jurisdiction} - {date}");
        submitted.points = Some(
            boundary
                .submit_layer(&name, &output.points, &StyleDescriptor::application_points())
                .await?,
        );
    }

    if !output.parcels.features.is_empty() {
        let name = format!("DA - PARCELS - {jurisdiction} - {date}");
        submitted.parcels = Some(
            boundary
                .submit_layer(&name, &output.parcels, &StyleDescriptor::parcel_fill())
                .await?,
        );
    }

    Ok(submitted)
}

fn ensure_live(cancel: &CancelToken) -> Result<(), PipelineError> {
    if cancel.is_cancelled() {
        Err(PipelineError::Cancelled)
    } else {
        Ok(())
    }
}

fn collection(features: Vec<geojson::Feature>) -> geojson::FeatureCollection {
    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}

/// Extracts every cited lot id and maps each to the first record that
/// cites it. When several applications share a lot the first one claims
/// the parcel's attributes, matching the order of the canonical set.
fn lot_to_primary(records: &[ApplicationRecord]) -> (Vec<String>, BTreeMap<String, usize>) {
    let mut lot_ids = Vec::new();
    let mut primary = BTreeMap::new();

    for (idx, record) in records.iter().enumerate() {
        for lot_id in record.lot_id_strings() {
            if !primary.contains_key(&lot_id) {
                primary.insert(lot_id.clone(), idx);
            }
            lot_ids.push(lot_id);
        }
    }

    (lot_ids, primary)
}

/// Whether a record should try the point-intersects fallback: it carries a
/// usable point, and either cites no lots or cites at least one lot that
/// resolved to nothing.
fn needs_point_fallback(record: &ApplicationRecord, found: &BTreeSet<String>) -> bool {
    if !record.has_point() {
        return false;
    }
    record.lots.is_empty()
        || record
            .lot_id_strings()
            .iter()
            .any(|id| !found.contains(id.as_str()))
}

/// Grouping key for per-application polygon dissolution. PAN when
/// present; otherwise the first stable per-application property, so
/// PAN-less applications never collapse into one another.
fn dissolve_group_key(feature: &geojson::Feature) -> String {
    for key in ["PAN", "Council Reference", "id", "Lots", "Address"] {
        if let Some(value) = feature.property(key).and_then(serde_json::Value::as_str)
            && !value.is_empty()
        {
            return format!("{key}:{value}");
        }
    }
    String::new()
}
