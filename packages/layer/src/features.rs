//! Feature construction from canonical application records.
//!
//! Every emitted feature carries the same flattened property schema so the
//! host's tables, tooltips, and style expressions can rely on the keys
//! being present. Geometry arriving from the registry is untrusted, so
//! coordinates are checked before a feature is emitted.

use planning_map_development_models::{category_for, clean_development_type};
use planning_map_portal_models::ApplicationRecord;

/// Result of assembling point features: the features plus how many
/// candidate records were rejected for non-finite coordinates.
#[derive(Debug, Default)]
pub struct PointAssembly {
    /// One point feature per record with usable coordinates.
    pub features: Vec<geojson::Feature>,
    /// Records dropped because longitude or latitude was missing or NaN.
    pub rejected: usize,
}

/// Builds one point feature per record that carries finite coordinates.
///
/// Records without a point location are silently omitted (they may still
/// reach the map through parcel resolution); records whose coordinates
/// parse to NaN or infinity are counted in
/// [`rejected`](PointAssembly::rejected) and logged.
#[must_use]
pub fn point_features(records: &[ApplicationRecord]) -> PointAssembly {
    let mut assembly = PointAssembly::default();

    for record in records {
        let Some(location) = record.location else {
            continue;
        };
        if !location.is_finite() {
            log::warn!(
                "Rejecting application {} with non-finite coordinates",
                record.pan.as_deref().unwrap_or("<no PAN>")
            );
            assembly.rejected += 1;
            continue;
        }

        let mut properties = base_properties(record);
        let colour = record.status.colour();
        properties.insert("color".to_owned(), colour.into());
        properties.insert("fillColor".to_owned(), colour.into());
        properties.insert(
            "outlineColor".to_owned(),
            if record.is_residential() { "#000000" } else { "#666666" }.into(),
        );

        assembly.features.push(geojson::Feature {
            bbox: None,
            geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![
                location.longitude,
                location.latitude,
            ]))),
            id: None,
            properties: Some(properties),
            foreign_members: None,
        });
    }

    assembly
}

/// Builds one polygon feature from a record and its resolved (possibly
/// dissolved) geometry.
#[must_use]
pub fn parcel_feature(record: &ApplicationRecord, geometry: geojson::Geometry) -> geojson::Feature {
    let mut properties = base_properties(record);
    let category = category_of(record);
    properties.insert("fillColour".to_owned(), category.fill_colour().into());
    properties.insert("outlineColour".to_owned(), category.outline_colour().into());

    geojson::Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}

/// The fixed property schema shared by point and parcel features.
fn base_properties(record: &ApplicationRecord) -> geojson::JsonObject {
    let clean_type = clean_development_type(&record.development_types);
    let detailed_type = record
        .development_types
        .iter()
        .map(|t| t.raw.as_str())
        .collect::<Vec<_>>()
        .join("; ");
    let lots = record.lot_id_strings().join("; ");
    let status = record.status.to_string();

    let mut properties = geojson::JsonObject::new();
    let mut set = |key: &str, value: serde_json::Value| {
        properties.insert(key.to_owned(), value);
    };

    set(
        "id",
        record
            .pan
            .as_deref()
            .or(record.council_reference.as_deref())
            .unwrap_or_default()
            .into(),
    );
    set("PAN", record.pan.as_deref().unwrap_or_default().into());
    set(
        "Council Reference",
        record.council_reference.as_deref().unwrap_or_default().into(),
    );
    set("Status", status.clone().into());
    set("status", status.into());
    set("description", record.description.as_deref().unwrap_or_default().into());
    set("developmentType", clean_type.clone().into());
    set("Clean Development Type", clean_type.into());
    set("Detailed Development Type", detailed_type.into());
    set(
        "Lodgement Date",
        record
            .lodgement_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
            .into(),
    );
    set(
        "Determination Date",
        record
            .determination_date
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default()
            .into(),
    );
    set("Cost", record.cost.unwrap_or(0.0).into());
    set("Dwellings", record.new_dwellings.unwrap_or(0).into());
    set("Storeys", record.storeys.unwrap_or(0).into());
    set(
        "Address",
        record.address.as_deref().unwrap_or_default().into(),
    );
    set("Lots", lots.into());
    set("Category", category_of(record).to_string().into());
    set("isResidential", record.is_residential().into());

    properties
}

/// Category of a record's leading development type.
fn category_of(record: &ApplicationRecord) -> planning_map_development_models::DevelopmentCategory {
    record
        .development_types
        .first()
        .map_or(planning_map_development_models::DevelopmentCategory::Miscellaneous, |t| {
            category_for(&t.raw)
        })
}
