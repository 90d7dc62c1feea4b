#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Feature assembly and the external map-render boundary.
//!
//! Joins canonical application attributes onto resolved geometry and emits
//! validated `GeoJSON` feature collections. The map host itself sits behind
//! the [`RenderBoundary`] trait: transform code in this crate only returns
//! data, and a thin adapter performs the actual boundary call, so the core
//! pipeline is testable without any host runtime.

pub mod features;
pub mod validate;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Errors from feature assembly and layer submission.
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    /// The assembled collection failed structural validation; nothing was
    /// sent to the render boundary.
    #[error("feature collection validation failed: {0}")]
    Validation(String),

    /// The render boundary rejected the submission.
    #[error("render boundary error: {0}")]
    Render(String),
}

/// Opaque handle to a submitted layer, as issued by the render boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerHandle(pub String);

/// Display style passed through to the render boundary.
///
/// `paint` is an opaque property bag in the host's styling vocabulary;
/// this crate only builds it, never interprets it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StyleDescriptor {
    /// Layer kind understood by the host (e.g. `"circle"`, `"fill"`).
    pub kind: String,
    /// Paint properties for the host renderer.
    pub paint: serde_json::Value,
}

impl StyleDescriptor {
    /// Point style for application markers: status-coloured circles with a
    /// heavier outline on residential applications.
    #[must_use]
    pub fn application_points() -> Self {
        Self {
            kind: "circle".to_owned(),
            paint: serde_json::json!({
                "circle-radius": ["case", ["get", "isResidential"], 8, 6],
                "circle-color": ["get", "fillColor"],
                "circle-stroke-width": ["case", ["get", "isResidential"], 3, 2],
                "circle-stroke-color": ["get", "outlineColor"]
            }),
        }
    }

    /// Fill style for parcel boundaries: category-coloured,
    /// semi-transparent fill with a bold outline.
    #[must_use]
    pub fn parcel_fill() -> Self {
        Self {
            kind: "fill".to_owned(),
            paint: serde_json::json!({
                "fill-color": ["get", "fillColour"],
                "fill-opacity": 0.3,
                "fill-outline-color": ["get", "outlineColour"]
            }),
        }
    }
}

/// The external map host, reduced to the two calls the pipeline needs.
#[async_trait]
pub trait RenderBoundary: Send + Sync {
    /// Submits a named, validated feature collection with a display style.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::Render`] if the host rejects the layer.
    async fn submit_layer(
        &self,
        name: &str,
        collection: &geojson::FeatureCollection,
        style: &StyleDescriptor,
    ) -> Result<LayerHandle, LayerError>;

    /// Removes a previously submitted layer.
    ///
    /// # Errors
    ///
    /// Returns [`LayerError::Render`] if the host fails the removal.
    async fn remove_layer(&self, handle: &LayerHandle) -> Result<(), LayerError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn style_descriptors_reference_feature_properties() {
        let points = StyleDescriptor::application_points();
        assert_eq!(points.kind, "circle");
        assert_eq!(points.paint["circle-color"], serde_json::json!(["get", "fillColor"]));

        let fill = StyleDescriptor::parcel_fill();
        assert_eq!(fill.kind, "fill");
        assert_eq!(
            fill.paint["fill-outline-color"],
            serde_json::json!(["get", "outlineColour"])
        );
    }
}
