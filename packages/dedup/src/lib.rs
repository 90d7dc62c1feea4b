#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Duplicate application record merging.
//!
//! Portals routinely return several records for one real-world case:
//! re-lodgements, modifications of an earlier consent, and council
//! re-submissions with slightly different identifiers. Two strategies are
//! provided, selected by the caller:
//!
//! - [`DedupStrategy::IdentifierFirst`] groups on the portal application
//!   number when present and falls back to address-based grouping.
//!   Preferred for the tabular view, where the identifier is trustworthy.
//! - [`DedupStrategy::SimilarityClustering`] groups strictly on the
//!   normalized address and clusters by matching attributes. Preferred for
//!   map layers built from council feeds that omit the portal number.
//!
//! Both are pure and deterministic given input order, and never grow the
//! record list. Records with neither an identifier nor an address cannot
//! be grouped by either strategy and pass through unchanged.

pub mod address;

use std::collections::BTreeMap;

use planning_map_development_models::{UNKNOWN_TYPE, clean_development_type};
use planning_map_portal_models::ApplicationRecord;

use crate::address::normalize_address;

/// Which duplicate-merging strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupStrategy {
    /// Group by portal application number first, address second.
    IdentifierFirst,
    /// Cluster same-address records by matching attributes.
    SimilarityClustering,
}

/// Merges duplicate records, keeping one authoritative record per
/// real-world case.
///
/// Output preserves the input's relative order (each surviving record
/// occupies the position of its group's first occurrence).
#[must_use]
pub fn deduplicate(records: Vec<ApplicationRecord>, strategy: DedupStrategy) -> Vec<ApplicationRecord> {
    let before = records.len();
    let out = match strategy {
        DedupStrategy::IdentifierFirst => identifier_first(records),
        DedupStrategy::SimilarityClustering => similarity_clustering(records),
    };
    if out.len() < before {
        log::debug!("Deduplication removed {} of {before} records", before - out.len());
    }
    out
}

/// Identifier-first strategy.
///
/// Records sharing a portal application number collapse to the one with
/// the latest `last_updated`. Records without a number group by
/// normalized address: a lone record at an address is kept as-is, while
/// contested addresses fall back to an (address, cost) composite key that
/// keeps the most recently lodged record, preferring a modification over
/// the original it modifies when the modification is at least as new.
fn identifier_first(records: Vec<ApplicationRecord>) -> Vec<ApplicationRecord> {
    // Address population counts cover every record (including those with
    // identifiers) so that a PAN-less record at a shared site is treated
    // as contested.
    let mut address_counts: BTreeMap<String, usize> = BTreeMap::new();
    let normalized: Vec<Option<String>> = records
        .iter()
        .map(|r| {
            let key = r.address.as_deref().map(normalize_address)?;
            if key.is_empty() {
                return None;
            }
            *address_counts.entry(key.clone()).or_insert(0) += 1;
            Some(key)
        })
        .collect();

    let mut out: Vec<ApplicationRecord> = Vec::new();
    let mut by_key: BTreeMap<String, usize> = BTreeMap::new();

    for (record, normalized_address) in records.into_iter().zip(normalized) {
        let key = if let Some(pan) = record.pan.as_deref() {
            format!("pan:{pan}")
        } else if let Some(addr) = normalized_address {
            if address_counts.get(&addr).copied().unwrap_or(0) > 1 {
                format!("addr:{addr}|cost:{}", record.cost.unwrap_or(0.0))
            } else {
                format!("addr:{addr}")
            }
        } else {
            // Nothing to group on: keep verbatim.
            out.push(record);
            continue;
        };

        match by_key.get(&key) {
            None => {
                by_key.insert(key, out.len());
                out.push(record);
            }
            Some(&idx) => {
                let existing = &out[idx];
                let replace = if record.pan.is_some() {
                    record.last_updated > existing.last_updated
                } else if record.kind.is_modification() && !existing.kind.is_modification() {
                    record.lodgement_date >= existing.lodgement_date
                } else {
                    record.lodgement_date > existing.lodgement_date
                };
                if replace {
                    out[idx] = record;
                }
            }
        }
    }

    out
}

/// Similarity-clustering strategy.
///
/// Within each normalized-address group (sorted newest lodgement first),
/// record `j` joins record `i`'s cluster (`i < j`) when any of: clean
/// development type matches and is not the unknown sentinel; cost matches
/// and is non-zero; dwelling count matches and is non-zero. Only the
/// newest member of each cluster survives.
///
/// This is a single-pass nearest-neighbour sweep, not a transitive
/// closure: membership depends on processing order, and two records that
/// each match a middle record may still end up in different clusters.
/// That behaviour is intentional and covered by tests — "fixing" it would
/// change observable output.
fn similarity_clustering(records: Vec<ApplicationRecord>) -> Vec<ApplicationRecord> {
    let mut groups: BTreeMap<String, Vec<(usize, ApplicationRecord)>> = BTreeMap::new();
    let mut passthrough: Vec<(usize, ApplicationRecord)> = Vec::new();

    for (idx, record) in records.into_iter().enumerate() {
        let key = record.address.as_deref().map(normalize_address);
        match key.filter(|k| !k.is_empty()) {
            Some(key) => groups.entry(key).or_default().push((idx, record)),
            // No address, no group: keep verbatim.
            None => passthrough.push((idx, record)),
        }
    }

    let mut survivors: Vec<(usize, ApplicationRecord)> = passthrough;

    for (_, mut group) in groups {
        group.sort_by(|(_, a), (_, b)| b.lodgement_date.cmp(&a.lodgement_date));

        let mut consumed = vec![false; group.len()];
        for i in 0..group.len() {
            if consumed[i] {
                continue;
            }
            for j in (i + 1)..group.len() {
                if !consumed[j] && is_attribute_duplicate(&group[i].1, &group[j].1) {
                    consumed[j] = true;
                }
            }
        }

        for ((idx, record), eaten) in group.into_iter().zip(consumed) {
            if !eaten {
                survivors.push((idx, record));
            }
        }
    }

    survivors.sort_by_key(|(idx, _)| *idx);
    survivors.into_iter().map(|(_, r)| r).collect()
}

/// Attribute comparison for [`similarity_clustering`]. Any one matching
/// non-empty signal makes the pair duplicates.
fn is_attribute_duplicate(a: &ApplicationRecord, b: &ApplicationRecord) -> bool {
    let type_a = clean_development_type(&a.development_types);
    let type_b = clean_development_type(&b.development_types);
    if type_a == type_b && type_a != UNKNOWN_TYPE {
        return true;
    }

    if let (Some(cost_a), Some(cost_b)) = (a.cost, b.cost)
        && cost_a == cost_b
        && cost_a != 0.0
    {
        return true;
    }

    matches!(
        (a.new_dwellings, b.new_dwellings),
        (Some(da), Some(db)) if da == db && da != 0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone as _, Utc};
    use planning_map_development_models::DevelopmentType;
    use planning_map_portal_models::{ApplicationKind, ApplicationStatus};

    fn record(pan: Option<&str>, address: Option<&str>) -> ApplicationRecord {
        ApplicationRecord {
            pan: pan.map(str::to_owned),
            council_reference: None,
            kind: ApplicationKind::Development,
            jurisdiction: "Test".to_owned(),
            address: address.map(str::to_owned),
            status: ApplicationStatus::Lodged,
            description: None,
            development_types: Vec::new(),
            lodgement_date: None,
            determination_date: None,
            cost: None,
            new_dwellings: None,
            storeys: None,
            location: None,
            lots: Vec::new(),
            last_updated: None,
        }
    }

    fn lodged(mut r: ApplicationRecord, year: i32, month: u32, day: u32) -> ApplicationRecord {
        r.lodgement_date = NaiveDate::from_ymd_opt(year, month, day);
        r
    }

    fn updated(mut r: ApplicationRecord, year: i32, month: u32, day: u32) -> ApplicationRecord {
        r.last_updated = Some(Utc.with_ymd_and_hms(year, month, day, 0, 0, 0).unwrap());
        r
    }

    fn typed(mut r: ApplicationRecord, raw: &str) -> ApplicationRecord {
        r.development_types = vec![DevelopmentType::from_raw(raw)];
        r
    }

    fn costed(mut r: ApplicationRecord, cost: f64) -> ApplicationRecord {
        r.cost = Some(cost);
        r
    }

    #[test]
    fn identifier_group_keeps_latest_update() {
        let older = updated(record(Some("PAN-1"), Some("1 A St")), 2023, 1, 1);
        let newer = updated(record(Some("PAN-1"), Some("1 A St")), 2023, 6, 1);
        let newer_clone = newer.clone();

        let out = deduplicate(vec![older, newer], DedupStrategy::IdentifierFirst);
        assert_eq!(out, vec![newer_clone]);
    }

    #[test]
    fn contested_address_keeps_most_recent_lodgement() {
        let a = lodged(costed(record(None, Some("2 B St")), 100_000.0), 2022, 3, 1);
        let b = lodged(costed(record(None, Some("2 B St")), 100_000.0), 2023, 3, 1);
        let b_clone = b.clone();

        let out = deduplicate(vec![a, b], DedupStrategy::IdentifierFirst);
        assert_eq!(out, vec![b_clone]);
    }

    #[test]
    fn newer_modification_beats_original() {
        let original = lodged(costed(record(None, Some("3 C St")), 50_000.0), 2023, 5, 5);
        let mut modification = lodged(costed(record(None, Some("3 C St")), 50_000.0), 2023, 5, 5);
        modification.kind = ApplicationKind::Modification;
        let modification_clone = modification.clone();

        let out = deduplicate(vec![original, modification], DedupStrategy::IdentifierFirst);
        assert_eq!(out, vec![modification_clone]);
    }

    #[test]
    fn lone_address_record_kept_as_is() {
        let only = record(None, Some("4 D St"));
        let out = deduplicate(vec![only.clone()], DedupStrategy::IdentifierFirst);
        assert_eq!(out, vec![only]);
    }

    #[test]
    fn ungroupable_records_pass_through() {
        let ghost = record(None, None);
        for strategy in [DedupStrategy::IdentifierFirst, DedupStrategy::SimilarityClustering] {
            let out = deduplicate(vec![ghost.clone(), ghost.clone()], strategy);
            assert_eq!(out.len(), 2, "{strategy:?} must not touch ungroupable records");
        }
    }

    #[test]
    fn clustering_keeps_newest_of_identical_group() {
        let make = |y| {
            lodged(
                typed(costed(record(None, Some("5 E St")), 900_000.0), "Dwelling house"),
                y,
                1,
                1,
            )
        };
        let newest = make(2024);
        let newest_clone = newest.clone();

        let out = deduplicate(
            vec![make(2022), newest, make(2023)],
            DedupStrategy::SimilarityClustering,
        );
        assert_eq!(out, vec![newest_clone]);
    }

    #[test]
    fn clustering_needs_a_real_signal() {
        // Same address but unknown types, no cost, no dwellings: nothing
        // links the records, so both survive.
        let a = lodged(record(None, Some("6 F St")), 2023, 1, 1);
        let b = lodged(record(None, Some("6 F St")), 2023, 2, 1);
        let out = deduplicate(vec![a, b], DedupStrategy::SimilarityClustering);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn clustering_is_intentionally_non_transitive() {
        // newest: Dwelling house, $100k — matches middle on type only.
        // middle: Dwelling house, $200k — matches oldest on cost only.
        // The sweep consumes middle into newest's cluster before oldest is
        // compared, so oldest survives. A transitive closure would merge
        // all three; that would change observable output.
        let newest = lodged(
            typed(costed(record(None, Some("7 G St")), 100_000.0), "Dwelling house"),
            2024,
            1,
            1,
        );
        let middle = lodged(
            typed(costed(record(None, Some("7 G St")), 200_000.0), "Dwelling house"),
            2023,
            1,
            1,
        );
        let oldest = lodged(
            typed(costed(record(None, Some("7 G St")), 200_000.0), "Car park"),
            2022,
            1,
            1,
        );

        let out = deduplicate(
            vec![newest.clone(), middle, oldest.clone()],
            DedupStrategy::SimilarityClustering,
        );
        assert_eq!(out, vec![newest, oldest]);
    }

    #[test]
    fn never_grows() {
        let records = vec![
            record(Some("PAN-1"), Some("1 A St")),
            record(Some("PAN-1"), Some("1 A St")),
            record(None, Some("2 B St")),
            record(None, None),
        ];
        for strategy in [DedupStrategy::IdentifierFirst, DedupStrategy::SimilarityClustering] {
            let out = deduplicate(records.clone(), strategy);
            assert!(out.len() <= records.len());
        }
    }

    #[test]
    fn five_record_scenario_yields_three() {
        // Two share an identifier (newest update wins), two share
        // address/cost/type with different dates (newest lodgement wins),
        // one is unique.
        let pan_old = updated(record(Some("PAN-9"), Some("1 A St")), 2023, 1, 1);
        let pan_new = updated(record(Some("PAN-9"), Some("1 A St")), 2023, 9, 1);
        let addr_old = lodged(
            typed(costed(record(None, Some("8 H St")), 400_000.0), "Dwelling house"),
            2022,
            6,
            1,
        );
        let addr_new = lodged(
            typed(costed(record(None, Some("8 H St")), 400_000.0), "Dwelling house"),
            2023,
            6,
            1,
        );
        let unique = record(None, Some("9 I St"));

        let out = deduplicate(
            vec![pan_old, pan_new.clone(), addr_old, addr_new.clone(), unique.clone()],
            DedupStrategy::IdentifierFirst,
        );
        assert_eq!(out.len(), 3);
        assert!(out.contains(&pan_new));
        assert!(out.contains(&addr_new));
        assert!(out.contains(&unique));
    }

    #[test]
    fn normalized_addresses_join_across_formats() {
        let a = lodged(
            typed(record(None, Some("Unit 5, 123 Smith St")), "Dwelling house"),
            2023,
            1,
            1,
        );
        let b = lodged(
            typed(record(None, Some("5/123 Smith Street")), "Dwelling house"),
            2024,
            1,
            1,
        );
        let out = deduplicate(vec![a, b], DedupStrategy::SimilarityClustering);
        assert_eq!(out.len(), 1);
    }
}
