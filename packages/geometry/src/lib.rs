#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Polygon dissolution for multi-lot application sites.
//!
//! A subdivided or multi-lot site resolves to several parcel polygons that
//! all belong to one application. [`dissolve`] unions them pairwise in
//! encounter order into a single boundary; [`dissolve_by_key`] does the
//! same per application key across a whole feature set. Union failures on
//! degenerate registry geometry keep the prior accumulated shape — a
//! slightly incomplete boundary beats losing the application's shape
//! entirely.

use std::collections::BTreeMap;

use geo::{BooleanOps as _, MultiPolygon};

/// One application key mapped to its dissolved boundary.
#[derive(Debug, Clone)]
pub struct DissolvedParcel {
    /// The shared application-level key (PAN) the parcels were grouped by.
    pub key: String,
    /// The dissolved geometry.
    pub geometry: geojson::Geometry,
    /// Properties of the group's first feature, carried for the assembler.
    pub properties: Option<geojson::JsonObject>,
}

/// Parses a `GeoJSON` geometry into a [`MultiPolygon`].
/// Handles both `Polygon` and `MultiPolygon` geometry types.
#[must_use]
pub fn to_multi_polygon(geometry: &geojson::Geometry) -> Option<MultiPolygon<f64>> {
    let geo_geom: geo::Geometry<f64> = geometry.clone().try_into().ok()?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Some(mp),
        geo::Geometry::Polygon(p) => Some(MultiPolygon(vec![p])),
        _ => None,
    }
}

/// Unions the polygon geometries of `features` into a single geometry.
///
/// A single-element input is returned unchanged. For larger inputs the
/// polygons are unioned pairwise in encounter order; a feature whose
/// geometry cannot be read as a polygon, or whose union step fails, is
/// logged and skipped while the accumulated geometry so far is kept.
/// Returns `None` when no feature carries usable geometry.
#[must_use]
pub fn dissolve(features: &[geojson::Feature]) -> Option<geojson::Geometry> {
    if features.len() == 1 {
        return features[0].geometry.clone();
    }

    let mut polygons = features
        .iter()
        .filter_map(|f| f.geometry.as_ref())
        .filter_map(|g| {
            let mp = to_multi_polygon(g);
            if mp.is_none() {
                log::warn!("Skipping non-polygon geometry in dissolve: {:?}", g.value.type_name());
            }
            mp
        });

    let mut dissolved = polygons.next()?;
    for next in polygons {
        match std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| dissolved.union(&next))) {
            Ok(unioned) => dissolved = unioned,
            // The boolean-ops kernel rejects some degenerate registry
            // rings by panicking; keep the shape accumulated so far.
            Err(_) => log::warn!("Polygon union failed, keeping partial boundary"),
        }
    }

    Some(geojson::Geometry::new(geojson::Value::from(&dissolved)))
}

/// Groups `features` by `key_fn` (preserving first-encounter order) and
/// dissolves each group into one [`DissolvedParcel`].
///
/// Groups whose geometry is entirely unusable are dropped.
pub fn dissolve_by_key<F>(features: Vec<geojson::Feature>, key_fn: F) -> Vec<DissolvedParcel>
where
    F: Fn(&geojson::Feature) -> String,
{
    let mut order: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, Vec<geojson::Feature>> = BTreeMap::new();

    for feature in features {
        let key = key_fn(&feature);
        if !groups.contains_key(&key) {
            order.push(key.clone());
        }
        groups.entry(key).or_default().push(feature);
    }

    order
        .into_iter()
        .filter_map(|key| {
            let group = groups.remove(&key)?;
            if group.len() > 1 {
                log::debug!("Dissolving {} parcels for {key}", group.len());
            }
            let properties = group[0].properties.clone();
            let geometry = dissolve(&group)?;
            Some(DissolvedParcel {
                key,
                geometry,
                properties,
            })
        })
        .collect()
}
