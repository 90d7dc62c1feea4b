#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Development type taxonomy for planning applications.
//!
//! Planning portals report free-text development types ("Dwelling house",
//! "Residential flat building", "Take-away food and drink premises", …) with
//! inconsistent spelling across councils. This crate defines the canonical
//! mapping from raw portal types to clean display types, their category
//! groupings, and the display colours used for map styling.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Sentinel clean type used when an application carries no usable
/// development type. Deduplication treats this value as "no signal".
pub const UNKNOWN_TYPE: &str = "Unknown";

/// Top-level category groupings for development types.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
pub enum DevelopmentCategory {
    /// Dwellings, apartments, boarding houses, and other housing.
    #[strum(serialize = "Residential Types")]
    #[serde(rename = "Residential Types")]
    Residential,
    /// Alterations and additions to existing structures.
    #[strum(serialize = "Alterations and Modifications")]
    #[serde(rename = "Alterations and Modifications")]
    Alterations,
    /// Offices, retail, and general business premises.
    #[strum(serialize = "Commercial and Business")]
    #[serde(rename = "Commercial and Business")]
    Commercial,
    /// Restaurants, cafes, pubs, and food premises.
    #[strum(serialize = "Food and Beverage")]
    #[serde(rename = "Food and Beverage")]
    FoodAndBeverage,
    /// Schools and childcare centres.
    #[strum(serialize = "Education and Childcare")]
    #[serde(rename = "Education and Childcare")]
    Education,
    /// Hospitals, medical centres, and care facilities.
    #[strum(serialize = "Health and Medical")]
    #[serde(rename = "Health and Medical")]
    Health,
    /// Indoor and outdoor recreation facilities.
    #[strum(serialize = "Recreation and Entertainment")]
    #[serde(rename = "Recreation and Entertainment")]
    Recreation,
    /// Hotels, motels, and visitor accommodation.
    #[strum(serialize = "Tourism and Accommodation")]
    #[serde(rename = "Tourism and Accommodation")]
    Tourism,
    /// Industrial development and warehousing.
    #[strum(serialize = "Industrial and Warehousing")]
    #[serde(rename = "Industrial and Warehousing")]
    Industrial,
    /// Car parks and vehicle-related premises.
    #[strum(serialize = "Transport and Vehicle Related")]
    #[serde(rename = "Transport and Vehicle Related")]
    Transport,
    /// Marinas, jetties, and water-related structures.
    #[strum(serialize = "Marine and Water Related")]
    #[serde(rename = "Marine and Water Related")]
    Marine,
    /// Roads, utilities, and public infrastructure.
    #[strum(serialize = "Infrastructure and Utilities")]
    #[serde(rename = "Infrastructure and Utilities")]
    Infrastructure,
    /// Subdivision of land and land development.
    #[strum(serialize = "Subdivision and Land Development")]
    #[serde(rename = "Subdivision and Land Development")]
    Subdivision,
    /// Mixed use and development types without a closer grouping.
    #[strum(serialize = "Mixed Use and Other Development Types")]
    #[serde(rename = "Mixed Use and Other Development Types")]
    MixedUse,
    /// Home businesses and home occupations.
    #[strum(serialize = "Home Business and Occupation")]
    #[serde(rename = "Home Business and Occupation")]
    HomeBusiness,
    /// Garages, carports, pools, and other secondary structures.
    #[strum(serialize = "Secondary Structures and Modifications")]
    #[serde(rename = "Secondary Structures and Modifications")]
    SecondaryStructures,
    /// Administrative applications and anything unclassifiable.
    #[strum(serialize = "Miscellaneous and Administrative")]
    #[serde(rename = "Miscellaneous and Administrative")]
    Miscellaneous,
    /// Agricultural buildings and uses.
    #[strum(serialize = "Agriculture")]
    #[serde(rename = "Agriculture")]
    Agriculture,
    /// Quarries, mines, and extractive industries.
    #[strum(serialize = "Mining and Resource Extraction")]
    #[serde(rename = "Mining and Resource Extraction")]
    Mining,
}

impl DevelopmentCategory {
    /// Returns the map fill colour for this category.
    #[must_use]
    pub const fn fill_colour(self) -> &'static str {
        match self {
            Self::Residential => "#FF483B",
            Self::Alterations => "#9333ea",
            Self::Commercial => "#04aae5",
            Self::FoodAndBeverage => "#ea580c",
            Self::Education => "#16a34a",
            Self::Health => "#ef4444",
            Self::Recreation => "#4daf4a",
            Self::Tourism => "#f59e0b",
            Self::Industrial => "#64748b",
            Self::Transport => "#0891b2",
            Self::Marine => "#0ea5e9",
            Self::Infrastructure => "#475569",
            Self::Subdivision => "#330000",
            Self::MixedUse => "#7c3aed",
            Self::HomeBusiness => "#0d9488",
            Self::SecondaryStructures => "#737373",
            Self::Miscellaneous => "#525252",
            Self::Agriculture => "#166534",
            Self::Mining => "#78350f",
        }
    }

    /// Returns the map outline colour for this category.
    #[must_use]
    pub const fn outline_colour(self) -> &'static str {
        match self {
            Self::Residential => "#C13A2E",
            Self::Alterations => "#6D28D9",
            Self::Commercial => "#0377a8",
            Self::FoodAndBeverage => "#b45309",
            Self::Education => "#166534",
            Self::Health => "#991b1b",
            Self::Recreation => "#166534",
            Self::Tourism => "#b45309",
            Self::Industrial => "#374151",
            Self::Transport => "#0e7490",
            Self::Marine => "#0369a1",
            Self::Infrastructure => "#1e293b",
            Self::Subdivision => "#7c2d12",
            Self::MixedUse => "#4c1d95",
            Self::HomeBusiness => "#134e4a",
            Self::SecondaryStructures => "#525252",
            Self::Miscellaneous => "#262626",
            Self::Agriculture => "#065f46",
            Self::Mining => "#92400e",
        }
    }

    /// Returns all variants of this enum.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::Residential,
            Self::Alterations,
            Self::Commercial,
            Self::FoodAndBeverage,
            Self::Education,
            Self::Health,
            Self::Recreation,
            Self::Tourism,
            Self::Industrial,
            Self::Transport,
            Self::Marine,
            Self::Infrastructure,
            Self::Subdivision,
            Self::MixedUse,
            Self::HomeBusiness,
            Self::SecondaryStructures,
            Self::Miscellaneous,
            Self::Agriculture,
            Self::Mining,
        ]
    }
}

/// One development type as reported on an application: the raw portal
/// string plus its derived clean form and secondary-structure flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DevelopmentType {
    /// Raw type string exactly as the portal reported it.
    pub raw: String,
    /// Clean display type after table mapping (raw when unmapped).
    pub clean: String,
    /// Whether this type describes a secondary structure or use
    /// (e.g. "Secondary dwelling") rather than the primary development.
    pub secondary: bool,
}

impl DevelopmentType {
    /// Builds a `DevelopmentType` from a raw portal string, applying the
    /// canonical mapping table.
    #[must_use]
    pub fn from_raw(raw: &str) -> Self {
        let (clean, secondary) = TYPE_TABLE
            .iter()
            .find(|row| row.raw == raw)
            .map_or((raw, false), |row| {
                (if row.clean.is_empty() { raw } else { row.clean }, row.secondary)
            });
        Self {
            raw: raw.to_owned(),
            clean: clean.to_owned(),
            secondary,
        }
    }
}

/// One row of the canonical type mapping table.
struct TypeRow {
    /// Raw portal type string (exact match).
    raw: &'static str,
    /// Clean display type; empty means "use the raw string".
    clean: &'static str,
    /// Whether the type is a secondary structure/use.
    secondary: bool,
    category: DevelopmentCategory,
}

const fn row(
    raw: &'static str,
    clean: &'static str,
    secondary: bool,
    category: DevelopmentCategory,
) -> TypeRow {
    TypeRow {
        raw,
        clean,
        secondary,
        category,
    }
}

/// Canonical mapping from raw portal development types. Spellings vary
/// between councils ("Office premises" / "Office Premises"), so near
/// duplicates are intentional.
static TYPE_TABLE: &[TypeRow] = &[
    // Residential
    row("Dwelling", "Dwelling", false, DevelopmentCategory::Residential),
    row("Dwelling house", "Dwelling", false, DevelopmentCategory::Residential),
    row("Boarding house", "Boarding house", false, DevelopmentCategory::Residential),
    row("Attached dwelling", "", false, DevelopmentCategory::Residential),
    row("Co-living", "", true, DevelopmentCategory::Residential),
    row("Secondary dwelling", "", true, DevelopmentCategory::Residential),
    row("Dual occupancy", "Dual occupancy", false, DevelopmentCategory::Residential),
    row("Non-standard Housing", "", true, DevelopmentCategory::Residential),
    row("Residential flat building", "Apartments", false, DevelopmentCategory::Residential),
    row("Multi-dwelling housing", "Multi-dwelling housing", false, DevelopmentCategory::Residential),
    row("Seniors housing", "", false, DevelopmentCategory::Residential),
    row("Semi-attached dwelling", "", false, DevelopmentCategory::Residential),
    row("Shop top housing", "Shop top housing", false, DevelopmentCategory::Residential),
    // Commercial
    row("Commercial development", "Commercial", false, DevelopmentCategory::Commercial),
    row("Business premises", "Commercial", false, DevelopmentCategory::Commercial),
    row("Registered club", "", false, DevelopmentCategory::Commercial),
    row("Office premises", "Office", false, DevelopmentCategory::Commercial),
    row("Office Premises", "Office", false, DevelopmentCategory::Commercial),
    row("Retail premises", "Retail", false, DevelopmentCategory::Commercial),
    row("Shop", "Shop", false, DevelopmentCategory::Commercial),
    // Food and beverage
    row("Restaurant or cafe", "Food and beverage", false, DevelopmentCategory::FoodAndBeverage),
    row("Food and drink premises", "Food and beverage", false, DevelopmentCategory::FoodAndBeverage),
    row("Small bar", "", false, DevelopmentCategory::FoodAndBeverage),
    row("Pub", "", false, DevelopmentCategory::FoodAndBeverage),
    row("Take-away food and drink premises", "Take-away food and drink", true, DevelopmentCategory::FoodAndBeverage),
    row("Take-away food and drink", "Take-away food and drink", true, DevelopmentCategory::FoodAndBeverage),
    row("Take away food and drink", "Take-away food and drink", true, DevelopmentCategory::FoodAndBeverage),
    row("Artisan food and drink industry", "Artisan food and drink", false, DevelopmentCategory::FoodAndBeverage),
    row("Artisinal food and drink", "Artisan food and drink", false, DevelopmentCategory::FoodAndBeverage),
    // Education
    row("Educational establishment", "Educational establishment", false, DevelopmentCategory::Education),
    row("School", "School", false, DevelopmentCategory::Education),
    row("Centre based childcare", "Childcare", false, DevelopmentCategory::Education),
    // Health
    row("Health services facility", "Health services", false, DevelopmentCategory::Health),
    row("Health services facilities", "", false, DevelopmentCategory::Health),
    row("Medical centre", "Medical centre", false, DevelopmentCategory::Health),
    row("Hospital", "Hospital", false, DevelopmentCategory::Health),
    row("Residential care facility", "", false, DevelopmentCategory::Health),
    // Recreation
    row("Recreation facility (indoor)", "Recreation facility (indoor)", false, DevelopmentCategory::Recreation),
    row("Recreation facility (outdoor)", "Recreation facility (outdoor)", false, DevelopmentCategory::Recreation),
    row("Recreational Uses", "", false, DevelopmentCategory::Recreation),
    // Tourism
    row("Hotel or motel accommodation", "Hotel", false, DevelopmentCategory::Tourism),
    // Industrial
    row("Industrial development", "Industrial", false, DevelopmentCategory::Industrial),
    row("Warehouse or distribution centre", "Warehouse or distribution centre", false, DevelopmentCategory::Industrial),
    // Transport
    row("Car park", "Car park", false, DevelopmentCategory::Transport),
    // Subdivision
    row("Subdivision of land", "Subdivision", true, DevelopmentCategory::Subdivision),
    // Mixed use
    row("Mixed use development", "Mixed use", false, DevelopmentCategory::MixedUse),
];

/// Development types counted as residential for map styling and the
/// residential summary breakdown.
static RESIDENTIAL_TYPES: &[&str] = &[
    "Dwelling",
    "Dwelling house",
    "Secondary dwelling",
    "Dual occupancy",
    "Dual occupancy (attached)",
    "Dual occupancy (detached)",
    "Residential flat building",
    "Multi-dwelling housing",
    "Multi-dwelling housing (terraces)",
    "Semi-attached dwelling",
    "Attached dwelling",
    "Semi-detached dwelling",
    "Shop top housing",
    "Boarding house",
    "Seniors housing",
    "Group homes",
    "Group home",
    "Group home (permanent)",
    "Group home (transitional)",
    "Build-to-rent",
    "Co-living",
    "Co-living housing",
    "Manufactured home",
    "Moveable dwelling",
    "Rural worker's dwelling",
    "Independent living units",
    "Manor house",
    "Manor houses",
    "Medium Density Housing",
    "Non-standard Housing",
    "Residential Accommodation",
];

/// Returns `true` if the raw portal type is a residential development type.
#[must_use]
pub fn is_residential(raw: &str) -> bool {
    RESIDENTIAL_TYPES.contains(&raw)
}

/// Returns the category for a raw or clean development type string,
/// falling back to [`DevelopmentCategory::Miscellaneous`] when unmapped.
#[must_use]
pub fn category_for(development_type: &str) -> DevelopmentCategory {
    TYPE_TABLE
        .iter()
        .find(|r| r.raw == development_type || r.clean == development_type)
        .map_or(DevelopmentCategory::Miscellaneous, |r| r.category)
}

/// Collapses an application's development type list into a single clean
/// display string.
///
/// Primary types take precedence: when at least one non-secondary type is
/// present, secondary types (garages, take-away add-ons, …) are dropped.
/// The surviving clean names are deduplicated in encounter order and
/// comma-joined. Returns [`UNKNOWN_TYPE`] for an empty or all-blank list.
#[must_use]
pub fn clean_development_type(types: &[DevelopmentType]) -> String {
    let usable: Vec<&DevelopmentType> =
        types.iter().filter(|t| !t.clean.trim().is_empty()).collect();

    if usable.is_empty() {
        return UNKNOWN_TYPE.to_owned();
    }

    let primaries: Vec<&DevelopmentType> =
        usable.iter().copied().filter(|t| !t.secondary).collect();
    let display = if primaries.is_empty() { usable } else { primaries };

    let mut seen: Vec<&str> = Vec::new();
    for t in display {
        if !seen.contains(&t.clean.as_str()) {
            seen.push(&t.clean);
        }
    }
    seen.join(", ")
}
