//! Jurisdiction boundary lookup with an injected bounded cache.
//!
//! Boundary polygons are large and change rarely, so repeat lookups for
//! the same jurisdiction are served from a [`BoundaryCache`] owned by the
//! caller and passed in explicitly. The cache is a small LRU with a hard
//! capacity — switching between a handful of jurisdictions stays warm
//! without the process accumulating every boundary it ever fetched.

use std::collections::VecDeque;

use crate::{CadastreError, RegistryClient, escape_quotes, parse_collection};
use planning_map_portal::retry;

/// Default number of boundaries kept in memory.
pub const DEFAULT_CACHE_CAPACITY: usize = 8;

/// Bounded LRU cache of jurisdiction boundary collections.
#[derive(Debug)]
pub struct BoundaryCache {
    capacity: usize,
    /// Most recently used at the front.
    entries: VecDeque<(String, geojson::FeatureCollection)>,
}

impl Default for BoundaryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl BoundaryCache {
    /// Creates a cache holding at most `capacity` boundaries (minimum 1).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            entries: VecDeque::new(),
        }
    }

    /// Returns the cached boundary for `name`, marking it most recently
    /// used.
    pub fn get(&mut self, name: &str) -> Option<geojson::FeatureCollection> {
        let pos = self.entries.iter().position(|(key, _)| key == name)?;
        let entry = self.entries.remove(pos)?;
        let collection = entry.1.clone();
        self.entries.push_front(entry);
        Some(collection)
    }

    /// Inserts a boundary, evicting the least recently used entry when
    /// the cache is full.
    pub fn insert(&mut self, name: &str, collection: geojson::FeatureCollection) {
        if let Some(pos) = self.entries.iter().position(|(key, _)| key == name) {
            self.entries.remove(pos);
        }
        self.entries.push_front((name.to_owned(), collection));
        while self.entries.len() > self.capacity {
            if let Some((evicted, _)) = self.entries.pop_back() {
                log::debug!("Evicting boundary cache entry for {evicted}");
            }
        }
    }

    /// Number of cached boundaries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when the cache is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl RegistryClient {
    /// Fetches the boundary polygon collection for a jurisdiction,
    /// consulting `cache` first.
    ///
    /// The boundary layer is queried by area name; when that matches
    /// nothing the council name is tried as a fallback, since the two
    /// disagree for a handful of jurisdictions.
    ///
    /// # Errors
    ///
    /// Returns [`CadastreError`] if the request fails or the response is
    /// not a feature collection.
    pub async fn fetch_boundary(
        &self,
        name: &str,
        cache: &mut BoundaryCache,
    ) -> Result<geojson::FeatureCollection, CadastreError> {
        if let Some(cached) = cache.get(name) {
            log::debug!("Boundary cache hit for {name}");
            return Ok(cached);
        }

        let collection = self.query_boundary("lganame", name).await?;
        let collection = if collection.features.is_empty() {
            log::debug!("No boundary under lganame='{name}', trying councilname");
            self.query_boundary("councilname", name).await?
        } else {
            collection
        };

        cache.insert(name, collection.clone());
        Ok(collection)
    }

    async fn query_boundary(
        &self,
        field: &str,
        name: &str,
    ) -> Result<geojson::FeatureCollection, CadastreError> {
        let params = vec![
            ("where".to_owned(), format!("{field}='{}'", escape_quotes(name))),
            ("outFields".to_owned(), "lganame,councilname".to_owned()),
            ("returnGeometry".to_owned(), "true".to_owned()),
            ("f".to_owned(), "geojson".to_owned()),
        ];

        let body = retry::send_json(self.retry, || {
            self.client
                .post(&self.boundary_endpoint)
                .timeout(self.timeout)
                .form(&params)
        })
        .await?;

        parse_collection(&body)
    }
}
