//! Portal response shapes and their conversion to canonical records.
//!
//! The paged portal API nests location, lot, and development-type data in
//! arrays of wrapper objects, and reports numbers inconsistently (sometimes
//! JSON numbers, sometimes strings). Everything here is defensive: a field
//! that fails to parse becomes `None` rather than failing the page.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use planning_map_development_models::DevelopmentType;
use planning_map_portal_models::{
    ApplicationKind, ApplicationRecord, ApplicationStatus, LotReference, PointLocation,
};
use serde::Deserialize;

/// One page of the portal response.
#[derive(Debug, Deserialize)]
pub(crate) struct PortalPage {
    /// Total records matching the filter, reported on every page.
    #[serde(rename = "TotalRecords")]
    pub total_records: Option<u64>,
    /// Total pages available for the filter.
    #[serde(rename = "TotalPages")]
    pub total_pages: Option<u32>,
    /// The records on this page. Absent on malformed responses.
    #[serde(rename = "Application")]
    pub applications: Option<Vec<PortalApplication>>,
}

/// One application as the portal reports it.
#[derive(Debug, Deserialize)]
pub(crate) struct PortalApplication {
    #[serde(rename = "PlanningPortalApplicationNumber")]
    pan: Option<String>,
    #[serde(rename = "CouncilApplicationNumber")]
    council_reference: Option<String>,
    #[serde(rename = "ApplicationType")]
    application_type: Option<String>,
    #[serde(rename = "ApplicationStatus")]
    status: Option<String>,
    #[serde(rename = "DevelopmentDescription")]
    description: Option<String>,
    #[serde(rename = "LodgementDate")]
    lodgement_date: Option<String>,
    #[serde(rename = "DeterminationDate")]
    determination_date: Option<String>,
    #[serde(rename = "DateLastUpdated")]
    last_updated: Option<String>,
    #[serde(rename = "CostOfDevelopment")]
    cost: Option<serde_json::Value>,
    #[serde(rename = "NumberOfNewDwellings")]
    new_dwellings: Option<serde_json::Value>,
    #[serde(rename = "NumberOfStoreys")]
    storeys: Option<serde_json::Value>,
    #[serde(rename = "DevelopmentType", default)]
    development_types: Vec<PortalDevelopmentType>,
    #[serde(rename = "Location", default)]
    locations: Vec<PortalLocation>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PortalDevelopmentType {
    #[serde(rename = "DevelopmentType")]
    development_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PortalLocation {
    #[serde(rename = "FullAddress")]
    full_address: Option<String>,
    #[serde(rename = "X")]
    x: Option<serde_json::Value>,
    #[serde(rename = "Y")]
    y: Option<serde_json::Value>,
    #[serde(rename = "Lot", default)]
    lots: Vec<PortalLot>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PortalLot {
    #[serde(rename = "Lot")]
    lot: Option<String>,
    #[serde(rename = "PlanLabel")]
    plan_label: Option<String>,
}

impl PortalApplication {
    /// Flattens the portal shape into the canonical record.
    ///
    /// Only the first `Location` entry is used — the portal repeats the
    /// same site for each address alias.
    pub(crate) fn into_record(self, jurisdiction: &str) -> ApplicationRecord {
        let location = self.locations.into_iter().next();

        let (address, point, lots) = location.map_or((None, None, Vec::new()), |loc| {
            let point = match (
                loc.x.as_ref().and_then(parse_f64),
                loc.y.as_ref().and_then(parse_f64),
            ) {
                (Some(longitude), Some(latitude)) => Some(PointLocation { longitude, latitude }),
                _ => None,
            };
            let lots = loc
                .lots
                .into_iter()
                .filter_map(|l| match (non_empty(l.lot), non_empty(l.plan_label)) {
                    (Some(lot), Some(plan_label)) => Some(LotReference { lot, plan_label }),
                    _ => None,
                })
                .collect();
            (non_empty(loc.full_address), point, lots)
        });

        let development_types = self
            .development_types
            .into_iter()
            .filter_map(|t| non_empty(t.development_type))
            .map(|raw| DevelopmentType::from_raw(&raw))
            .collect();

        ApplicationRecord {
            pan: non_empty(self.pan),
            council_reference: non_empty(self.council_reference),
            kind: ApplicationKind::from(self.application_type.unwrap_or_default()),
            jurisdiction: jurisdiction.to_owned(),
            address,
            status: ApplicationStatus::from(self.status.unwrap_or_default()),
            description: non_empty(self.description),
            development_types,
            lodgement_date: self.lodgement_date.as_deref().and_then(parse_date),
            determination_date: self.determination_date.as_deref().and_then(parse_date),
            cost: self.cost.as_ref().and_then(parse_f64).filter(|c| *c >= 0.0),
            new_dwellings: self.new_dwellings.as_ref().and_then(parse_u32),
            storeys: self.storeys.as_ref().and_then(parse_u32),
            location: point,
            lots,
            last_updated: self.last_updated.as_deref().and_then(parse_timestamp),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_owned())
        .filter(|s| !s.is_empty())
}

/// Parses a JSON number or numeric string to `f64`.
fn parse_f64(value: &serde_json::Value) -> Option<f64> {
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
        .filter(|f| f.is_finite())
}

/// Parses a JSON number or numeric string to `u32`.
fn parse_u32(value: &serde_json::Value) -> Option<u32> {
    parse_f64(value)
        .filter(|f| *f >= 0.0)
        .and_then(|f| u32::try_from(f as i64).ok())
}

/// Parses the leading `YYYY-MM-DD` of a portal date string.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.get(..10)?, "%Y-%m-%d").ok()
}

/// Parses a portal timestamp. The portal emits both RFC 3339 and naive
/// `YYYY-MM-DDTHH:MM:SS` forms; bare dates fall back to midnight UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S") {
        return Some(naive.and_utc());
    }
    parse_date(raw).and_then(|d| d.and_hms_opt(0, 0, 0)).map(|n| n.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_page() -> serde_json::Value {
        serde_json::json!({
            "TotalRecords": 2,
            "TotalPages": 1,
            "Application": [
                {
                    "PlanningPortalApplicationNumber": "PAN-100",
                    "CouncilApplicationNumber": "DA2023/001",
                    "ApplicationType": "DA",
                    "ApplicationStatus": "Under Assessment",
                    "DevelopmentDescription": "Two storey dwelling",
                    "LodgementDate": "2023-04-12T00:00:00",
                    "DateLastUpdated": "2023-05-01T09:30:00",
                    "CostOfDevelopment": "850000",
                    "NumberOfNewDwellings": 1,
                    "NumberOfStoreys": "2",
                    "DevelopmentType": [
                        { "DevelopmentType": "Dwelling house" }
                    ],
                    "Location": [
                        {
                            "FullAddress": "123 Smith St, Newtown",
                            "X": "151.179",
                            "Y": -33.897,
                            "Lot": [
                                { "Lot": "12", "PlanLabel": "DP120096" },
                                { "Lot": "", "PlanLabel": "DP1" }
                            ]
                        }
                    ]
                },
                {
                    "ApplicationStatus": "Lodged"
                }
            ]
        })
    }

    #[test]
    fn parses_full_page() {
        let page: PortalPage = serde_json::from_value(sample_page()).unwrap();
        assert_eq!(page.total_records, Some(2));
        assert_eq!(page.total_pages, Some(1));
        assert_eq!(page.applications.as_ref().map(Vec::len), Some(2));
    }

    #[test]
    fn converts_record_fields() {
        let page: PortalPage = serde_json::from_value(sample_page()).unwrap();
        let record = page
            .applications
            .unwrap()
            .into_iter()
            .next()
            .unwrap()
            .into_record("Inner West");

        assert_eq!(record.pan.as_deref(), Some("PAN-100"));
        assert_eq!(record.jurisdiction, "Inner West");
        assert_eq!(record.address.as_deref(), Some("123 Smith St, Newtown"));
        assert_eq!(record.cost, Some(850_000.0));
        assert_eq!(record.new_dwellings, Some(1));
        assert_eq!(record.storeys, Some(2));
        assert_eq!(record.lots.len(), 1, "blank lot entries are dropped");
        assert_eq!(record.lots[0].lot_id_string(), "12//DP120096");

        let point = record.location.unwrap();
        assert!((point.longitude - 151.179).abs() < 1e-9);
        assert!((point.latitude - -33.897).abs() < 1e-9);

        assert_eq!(
            record.lodgement_date,
            NaiveDate::from_ymd_opt(2023, 4, 12)
        );
        assert!(record.last_updated.is_some());
    }

    #[test]
    fn sparse_record_converts_without_panic() {
        let page: PortalPage = serde_json::from_value(sample_page()).unwrap();
        let record = page
            .applications
            .unwrap()
            .into_iter()
            .nth(1)
            .unwrap()
            .into_record("Inner West");

        assert!(record.pan.is_none());
        assert!(record.address.is_none());
        assert!(record.location.is_none());
        assert!(record.lots.is_empty());
        assert!(!record.is_mappable());
    }

    #[test]
    fn missing_application_array_is_detectable() {
        let body = serde_json::json!({ "TotalRecords": 10, "TotalPages": 2 });
        let page: PortalPage = serde_json::from_value(body).unwrap();
        assert!(page.applications.is_none());
    }

    #[test]
    fn parses_timestamp_variants() {
        assert!(parse_timestamp("2023-05-01T09:30:00").is_some());
        assert!(parse_timestamp("2023-05-01T09:30:00+10:00").is_some());
        assert!(parse_timestamp("2023-05-01").is_some());
        assert!(parse_timestamp("not a date").is_none());
    }

    #[test]
    fn negative_cost_is_dropped() {
        let value = serde_json::json!({
            "ApplicationStatus": "Lodged",
            "CostOfDevelopment": -5
        });
        let app: PortalApplication = serde_json::from_value(value).unwrap();
        assert!(app.into_record("X").cost.is_none());
    }
}
