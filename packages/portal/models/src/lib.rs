#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Canonical planning application record types.
//!
//! Every record fetched from a planning portal is normalized into
//! [`ApplicationRecord`] before deduplication, parcel resolution, and map
//! output. The portal's own response shapes live in `planning_map_portal`;
//! this crate only holds the flattened canonical form shared across the
//! pipeline.

use chrono::{DateTime, NaiveDate, Utc};
use planning_map_development_models::DevelopmentType;
use serde::{Deserialize, Serialize};

/// Assessment status of a planning application.
///
/// Portals report a small closed set plus occasional free text; unknown
/// values are preserved verbatim in [`ApplicationStatus::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ApplicationStatus {
    /// Application lodged, assessment not started.
    Lodged,
    /// Under assessment by the consent authority.
    UnderAssessment,
    /// On public exhibition.
    OnExhibition,
    /// Determined (approved or refused).
    Determined,
    /// Withdrawn by the applicant.
    Withdrawn,
    /// Any other status string reported by the portal.
    Other(String),
}

impl ApplicationStatus {
    /// Returns the map display colour for this status.
    #[must_use]
    pub fn colour(&self) -> &'static str {
        match self {
            Self::Lodged => "#FFA500",
            Self::UnderAssessment => "#0000FF",
            Self::OnExhibition => "#800080",
            Self::Determined => "#008000",
            Self::Withdrawn => "#FF0000",
            Self::Other(_) => "#666666",
        }
    }
}

impl From<String> for ApplicationStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Lodged" => Self::Lodged,
            "Under Assessment" => Self::UnderAssessment,
            "On Exhibition" => Self::OnExhibition,
            "Determined" => Self::Determined,
            "Withdrawn" => Self::Withdrawn,
            _ => Self::Other(value),
        }
    }
}

impl From<ApplicationStatus> for String {
    fn from(value: ApplicationStatus) -> Self {
        value.to_string()
    }
}

impl std::fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Lodged => write!(f, "Lodged"),
            Self::UnderAssessment => write!(f, "Under Assessment"),
            Self::OnExhibition => write!(f, "On Exhibition"),
            Self::Determined => write!(f, "Determined"),
            Self::Withdrawn => write!(f, "Withdrawn"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// What kind of application a record represents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum ApplicationKind {
    /// An original development application.
    Development,
    /// A modification of an earlier consent.
    Modification,
    /// A review of a determination.
    Review,
    /// Any other kind string reported by the portal.
    Other(String),
}

impl ApplicationKind {
    /// Returns `true` for modification applications, which deduplication
    /// prefers over the original they modify when they are newer.
    #[must_use]
    pub const fn is_modification(&self) -> bool {
        matches!(self, Self::Modification)
    }
}

impl From<String> for ApplicationKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "DA" => Self::Development,
            "MOD" => Self::Modification,
            "Review" => Self::Review,
            _ => Self::Other(value),
        }
    }
}

impl From<ApplicationKind> for String {
    fn from(value: ApplicationKind) -> Self {
        match value {
            ApplicationKind::Development => "DA".to_owned(),
            ApplicationKind::Modification => "MOD".to_owned(),
            ApplicationKind::Review => "Review".to_owned(),
            ApplicationKind::Other(s) => s,
        }
    }
}

/// A cadastral lot citation: lot number plus plan label.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LotReference {
    /// Lot number within the plan (e.g. `"12"`).
    pub lot: String,
    /// Plan label (e.g. `"DP120096"`).
    pub plan_label: String,
}

impl LotReference {
    /// Returns the `lot//plan` join key used by the parcel registry.
    ///
    /// The same lot may be cited by several applications (subdivisions),
    /// and one application may cite several lots.
    #[must_use]
    pub fn lot_id_string(&self) -> String {
        format!("{}//{}", self.lot, self.plan_label)
    }
}

/// A WGS84 point location.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointLocation {
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Latitude in decimal degrees.
    pub latitude: f64,
}

impl PointLocation {
    /// Returns `true` when both coordinates are finite numbers.
    /// Portal location fields are free text upstream, so NaN can and does
    /// arrive here.
    #[must_use]
    pub fn is_finite(self) -> bool {
        self.longitude.is_finite() && self.latitude.is_finite()
    }
}

/// One planning application, normalized from the portal response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    /// Planning portal application number (PAN). The preferred
    /// deduplication key and the grouping key for polygon dissolution.
    /// Absent on some council-sourced records.
    pub pan: Option<String>,
    /// Council's own reference number.
    pub council_reference: Option<String>,
    /// Application kind (DA / modification / review).
    pub kind: ApplicationKind,
    /// Jurisdiction (local government area) the record belongs to.
    pub jurisdiction: String,
    /// Raw street address as reported.
    pub address: Option<String>,
    /// Assessment status.
    pub status: ApplicationStatus,
    /// Free-text description of the proposed development.
    pub description: Option<String>,
    /// Development types cited on the application, in portal order.
    pub development_types: Vec<DevelopmentType>,
    /// Lodgement date.
    pub lodgement_date: Option<NaiveDate>,
    /// Determination date, when determined.
    pub determination_date: Option<NaiveDate>,
    /// Estimated cost of development in dollars.
    pub cost: Option<f64>,
    /// Number of new dwellings proposed.
    pub new_dwellings: Option<u32>,
    /// Number of storeys proposed.
    pub storeys: Option<u32>,
    /// Point location, when the portal geocoded the site.
    pub location: Option<PointLocation>,
    /// Cadastral lots cited on the application (possibly empty).
    pub lots: Vec<LotReference>,
    /// Timestamp of the portal's last update to this record.
    pub last_updated: Option<DateTime<Utc>>,
}

impl ApplicationRecord {
    /// Returns the lot join keys cited by this application.
    #[must_use]
    pub fn lot_id_strings(&self) -> Vec<String> {
        self.lots.iter().map(LotReference::lot_id_string).collect()
    }

    /// Returns `true` when the record carries a usable point location.
    #[must_use]
    pub fn has_point(&self) -> bool {
        self.location.is_some_and(PointLocation::is_finite)
    }

    /// Returns `true` when the record can appear on the map at all.
    ///
    /// Records with neither an address nor a point location cannot be
    /// deduplicated or spatially resolved; they are kept for tabular
    /// output only.
    #[must_use]
    pub fn is_mappable(&self) -> bool {
        self.address.as_deref().is_some_and(|a| !a.trim().is_empty()) || self.has_point()
    }

    /// Returns `true` if any cited development type is residential.
    #[must_use]
    pub fn is_residential(&self) -> bool {
        self.development_types
            .iter()
            .any(|t| planning_map_development_models::is_residential(&t.raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_parses_known_values() {
        assert_eq!(
            ApplicationStatus::from("Under Assessment".to_owned()),
            ApplicationStatus::UnderAssessment
        );
        assert_eq!(
            ApplicationStatus::from("Lodged".to_owned()),
            ApplicationStatus::Lodged
        );
    }

    #[test]
    fn status_preserves_free_text() {
        let status = ApplicationStatus::from("Deferred Commencement".to_owned());
        assert_eq!(
            status,
            ApplicationStatus::Other("Deferred Commencement".to_owned())
        );
        assert_eq!(status.to_string(), "Deferred Commencement");
    }

    #[test]
    fn status_display_round_trips() {
        for raw in ["Lodged", "Under Assessment", "On Exhibition", "Determined", "Withdrawn"] {
            let status = ApplicationStatus::from(raw.to_owned());
            assert_eq!(status.to_string(), raw);
        }
    }

    #[test]
    fn kind_detects_modifications() {
        assert!(ApplicationKind::from("MOD".to_owned()).is_modification());
        assert!(!ApplicationKind::from("DA".to_owned()).is_modification());
    }

    #[test]
    fn lot_id_string_format() {
        let lot = LotReference {
            lot: "12".to_owned(),
            plan_label: "DP120096".to_owned(),
        };
        assert_eq!(lot.lot_id_string(), "12//DP120096");
    }

    #[test]
    fn nan_location_is_not_a_point() {
        let record = record_with_location(Some(PointLocation {
            longitude: f64::NAN,
            latitude: -33.8,
        }));
        assert!(!record.has_point());
        assert!(!record.is_mappable());
    }

    #[test]
    fn address_only_record_is_mappable() {
        let mut record = record_with_location(None);
        record.address = Some("1 Test St".to_owned());
        assert!(record.is_mappable());
    }

    fn record_with_location(location: Option<PointLocation>) -> ApplicationRecord {
        ApplicationRecord {
            pan: None,
            council_reference: None,
            kind: ApplicationKind::Development,
            jurisdiction: "Test".to_owned(),
            address: None,
            status: ApplicationStatus::Lodged,
            description: None,
            development_types: Vec::new(),
            lodgement_date: None,
            determination_date: None,
            cost: None,
            new_dwellings: None,
            storeys: None,
            location,
            lots: Vec::new(),
            last_updated: None,
        }
    }
}
