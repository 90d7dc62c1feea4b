//! File-backed render boundary adapter.
//!
//! The real map host lives on the other side of an RPC bridge; this
//! adapter satisfies the same [`RenderBoundary`] contract by writing each
//! submitted layer to a `GeoJSON` file, which keeps the whole pipeline
//! runnable (and inspectable) from the command line.

use std::path::PathBuf;

use async_trait::async_trait;
use planning_map_layer::{LayerError, LayerHandle, RenderBoundary, StyleDescriptor};

/// Writes submitted layers to `<out_dir>/<layer-name>.geojson`.
pub struct FileRenderBoundary {
    out_dir: PathBuf,
}

impl FileRenderBoundary {
    /// Creates an adapter writing into `out_dir` (created on demand).
    #[must_use]
    pub const fn new(out_dir: PathBuf) -> Self {
        Self { out_dir }
    }
}

#[async_trait]
impl RenderBoundary for FileRenderBoundary {
    async fn submit_layer(
        &self,
        name: &str,
        collection: &geojson::FeatureCollection,
        _style: &StyleDescriptor,
    ) -> Result<LayerHandle, LayerError> {
        std::fs::create_dir_all(&self.out_dir)
            .map_err(|e| LayerError::Render(format!("creating {:?}: {e}", self.out_dir)))?;

        let path = self.out_dir.join(format!("{}.geojson", sanitize_name(name)));
        let json = serde_json::to_string_pretty(collection)
            .map_err(|e| LayerError::Render(format!("serializing layer {name}: {e}")))?;
        std::fs::write(&path, json)
            .map_err(|e| LayerError::Render(format!("writing {path:?}: {e}")))?;

        log::info!("Wrote layer {name} to {}", path.display());
        Ok(LayerHandle(path.display().to_string()))
    }

    async fn remove_layer(&self, handle: &LayerHandle) -> Result<(), LayerError> {
        std::fs::remove_file(&handle.0)
            .map_err(|e| LayerError::Render(format!("removing {}: {e}", handle.0)))
    }
}

/// Turns a layer name into a safe file stem.
fn sanitize_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}
