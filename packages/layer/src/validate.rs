//! Structural validation of assembled feature collections.
//!
//! Geometry reaching this point may have originated from an external
//! service, so nothing is trusted: every feature must carry a geometry
//! whose coordinate nesting matches its type tag and whose positions are
//! finite 2-arity numbers. A collection that fails any check is reported
//! to the caller and never reaches the render boundary.

use crate::LayerError;

/// Validates a feature collection before submission.
///
/// # Errors
///
/// Returns [`LayerError::Validation`] naming the first offending feature.
pub fn validate_collection(collection: &geojson::FeatureCollection) -> Result<(), LayerError> {
    for (index, feature) in collection.features.iter().enumerate() {
        let Some(geometry) = feature.geometry.as_ref() else {
            return Err(LayerError::Validation(format!(
                "feature {index} has no geometry"
            )));
        };
        validate_geometry(&geometry.value)
            .map_err(|e| LayerError::Validation(format!("feature {index}: {e}")))?;
    }
    Ok(())
}

fn validate_geometry(value: &geojson::Value) -> Result<(), String> {
    match value {
        geojson::Value::Point(position) => validate_position(position),
        geojson::Value::MultiPoint(positions) => {
            positions.iter().try_for_each(|p| validate_position(p))
        }
        geojson::Value::LineString(positions) => {
            if positions.len() < 2 {
                return Err("LineString needs at least 2 positions".to_owned());
            }
            positions.iter().try_for_each(|p| validate_position(p))
        }
        geojson::Value::MultiLineString(lines) => lines.iter().try_for_each(|positions| {
            if positions.len() < 2 {
                return Err("MultiLineString member needs at least 2 positions".to_owned());
            }
            positions.iter().try_for_each(|p| validate_position(p))
        }),
        geojson::Value::Polygon(rings) => validate_rings(rings),
        geojson::Value::MultiPolygon(polygons) => {
            if polygons.is_empty() {
                return Err("MultiPolygon has no members".to_owned());
            }
            polygons.iter().try_for_each(|rings| validate_rings(rings))
        }
        geojson::Value::GeometryCollection(geometries) => geometries
            .iter()
            .try_for_each(|g| validate_geometry(&g.value)),
    }
}

fn validate_rings(rings: &[Vec<Vec<f64>>]) -> Result<(), String> {
    if rings.is_empty() {
        return Err("Polygon has no rings".to_owned());
    }
    for ring in rings {
        if ring.len() < 4 {
            return Err(format!("ring has {} positions, need at least 4", ring.len()));
        }
        ring.iter().try_for_each(|p| validate_position(p))?;
    }
    Ok(())
}

fn validate_position(position: &[f64]) -> Result<(), String> {
    if position.len() < 2 {
        return Err(format!(
            "position has {} coordinates, need at least 2",
            position.len()
        ));
    }
    if position.iter().any(|c| !c.is_finite()) {
        return Err("position has non-finite coordinate".to_owned());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collection(geometry: geojson::Value) -> geojson::FeatureCollection {
        geojson::FeatureCollection {
            bbox: None,
            features: vec![geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geometry)),
                id: None,
                properties: None,
                foreign_members: None,
            }],
            foreign_members: None,
        }
    }

    #[test]
    fn accepts_valid_point_and_polygon() {
        assert!(validate_collection(&collection(geojson::Value::Point(vec![151.0, -33.0]))).is_ok());
        assert!(
            validate_collection(&collection(geojson::Value::Polygon(vec![vec![
                vec![0.0, 0.0],
                vec![1.0, 0.0],
                vec![1.0, 1.0],
                vec![0.0, 0.0],
            ]])))
            .is_ok()
        );
    }

    #[test]
    fn rejects_nan_coordinates() {
        let result = validate_collection(&collection(geojson::Value::Point(vec![f64::NAN, -33.0])));
        assert!(matches!(result, Err(LayerError::Validation(_))));
    }

    #[test]
    fn rejects_short_positions() {
        let result = validate_collection(&collection(geojson::Value::Point(vec![151.0])));
        assert!(matches!(result, Err(LayerError::Validation(_))));
    }

    #[test]
    fn rejects_underfilled_rings() {
        let result = validate_collection(&collection(geojson::Value::Polygon(vec![vec![
            vec![0.0, 0.0],
            vec![1.0, 0.0],
            vec![0.0, 0.0],
        ]])));
        assert!(matches!(result, Err(LayerError::Validation(_))));
    }

    #[test]
    fn rejects_missing_geometry() {
        let collection = geojson::FeatureCollection {
            bbox: None,
            features: vec![geojson::Feature {
                bbox: None,
                geometry: None,
                id: None,
                properties: None,
                foreign_members: None,
            }],
            foreign_members: None,
        };
        assert!(matches!(
            validate_collection(&collection),
            Err(LayerError::Validation(_))
        ));
    }

    #[test]
    fn empty_collection_is_valid() {
        let collection = geojson::FeatureCollection {
            bbox: None,
            features: Vec::new(),
            foreign_members: None,
        };
        assert!(validate_collection(&collection).is_ok());
    }
}
