//! Summary statistics over the canonical record set.
//!
//! Computed from the deduplicated records (not the map layers), so
//! applications that never resolve to geometry still count.

use std::collections::BTreeMap;

use planning_map_development_models::clean_development_type;
use planning_map_portal_models::ApplicationRecord;

/// Aggregate figures for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SummaryStats {
    /// Canonical application count.
    pub total_applications: usize,
    /// Sum of reported development costs, in dollars.
    pub total_value: f64,
    /// Sum of proposed new dwellings.
    pub total_dwellings: u64,
    /// Application counts per status label.
    pub by_status: BTreeMap<String, usize>,
    /// Application counts per clean development type.
    pub by_type: BTreeMap<String, usize>,
    /// Clean-type counts restricted to residential applications.
    pub by_residential_type: BTreeMap<String, usize>,
}

impl SummaryStats {
    /// Computes stats over a canonical record set.
    #[must_use]
    pub fn from_records(records: &[ApplicationRecord]) -> Self {
        let mut stats = Self {
            total_applications: records.len(),
            ..Self::default()
        };

        for record in records {
            *stats.by_status.entry(record.status.to_string()).or_insert(0) += 1;

            let clean = clean_development_type(&record.development_types);
            *stats.by_type.entry(clean.clone()).or_insert(0) += 1;
            if record.is_residential() {
                *stats.by_residential_type.entry(clean).or_insert(0) += 1;
            }

            if let Some(cost) = record.cost {
                stats.total_value += cost;
            }
            if let Some(dwellings) = record.new_dwellings {
                stats.total_dwellings += u64::from(dwellings);
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use planning_map_development_models::DevelopmentType;
    use planning_map_portal_models::{ApplicationKind, ApplicationStatus};

    fn record(status: &str, dev_type: Option<&str>, cost: Option<f64>, dwellings: Option<u32>) -> ApplicationRecord {
        ApplicationRecord {
            pan: None,
            council_reference: None,
            kind: ApplicationKind::Development,
            jurisdiction: "Test".to_owned(),
            address: None,
            status: ApplicationStatus::from(status.to_owned()),
            description: None,
            development_types: dev_type
                .map(|t| vec![DevelopmentType::from_raw(t)])
                .unwrap_or_default(),
            lodgement_date: None,
            determination_date: None,
            cost,
            new_dwellings: dwellings,
            storeys: None,
            location: None,
            lots: Vec::new(),
            last_updated: None,
        }
    }

    #[test]
    fn aggregates_counts_and_totals() {
        let records = vec![
            record("Lodged", Some("Dwelling house"), Some(500_000.0), Some(1)),
            record("Lodged", Some("Dwelling"), Some(250_000.0), Some(2)),
            record("Determined", Some("Car park"), None, None),
        ];
        let stats = SummaryStats::from_records(&records);

        assert_eq!(stats.total_applications, 3);
        assert!((stats.total_value - 750_000.0).abs() < f64::EPSILON);
        assert_eq!(stats.total_dwellings, 3);
        assert_eq!(stats.by_status.get("Lodged"), Some(&2));
        assert_eq!(stats.by_status.get("Determined"), Some(&1));
        // Both residential records map to the same clean type.
        assert_eq!(stats.by_type.get("Dwelling"), Some(&2));
        assert_eq!(stats.by_residential_type.get("Dwelling"), Some(&2));
        assert!(stats.by_residential_type.get("Car park").is_none());
    }

    #[test]
    fn empty_input_is_all_zeroes() {
        let stats = SummaryStats::from_records(&[]);
        assert_eq!(stats, SummaryStats::default());
    }
}
