//! Address normalization for duplicate matching.
//!
//! Portal addresses arrive in many shapes for the same site:
//! - Unit prefixes: `"Unit 5, 123 Smith St"`, `"5/123 Smith St"`
//! - Abbreviated street types: `"123 Smith St"` vs `"123 Smith Street"`
//! - Spaced number ranges: `"13 - 17 Boundary Rd"`
//!
//! [`normalize_address`] collapses these into one canonical lower-case
//! form. The normalized address is the primary deduplication join key, so
//! the function is pure, total, and idempotent.

use regex::Regex;
use std::sync::LazyLock;

/// Regex for leading unit/suite/flat/apartment/shop prefixes
/// (e.g. "Unit 5, " or "Flat 2B ").
static UNIT_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:unit|suite|flat|apartment|apt|shop)\s+[0-9a-z]+\s*,?\s+").expect("valid regex")
});

/// Regex for leading unit-slash prefixes (e.g. "5/", "2a/", "n/").
static SLASH_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9a-z]+\s*/\s*").expect("valid regex"));

/// Regex for spaced house-number ranges ("13 - 17").
static RANGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\s*-\s*(\d+)").expect("valid regex"));

/// Regex for punctuation stripped to spaces. Hyphens survive so that
/// consolidated number ranges keep their shape.
static PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9\s-]").expect("valid regex"));

/// Regex for runs of whitespace.
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Street-type abbreviations expanded on word boundaries.
static STREET_TYPES: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        ("st", "street"),
        ("rd", "road"),
        ("ave", "avenue"),
        ("ln", "lane"),
        ("dr", "drive"),
        ("pl", "place"),
        ("hwy", "highway"),
        ("blvd", "boulevard"),
    ]
    .into_iter()
    .map(|(abbrev, full)| {
        (
            Regex::new(&format!(r"\b{abbrev}\b")).expect("valid regex"),
            full,
        )
    })
    .collect()
});

/// Canonicalizes a free-text street address for matching.
///
/// Always returns a string (possibly empty); never fails. Idempotent:
/// `normalize_address(normalize_address(s)) == normalize_address(s)`.
#[must_use]
pub fn normalize_address(raw: &str) -> String {
    let addr = raw.trim().to_lowercase();

    // Leading unit designators: "unit 5, 123 smith st" -> "123 smith st"
    let addr = UNIT_PREFIX_RE.replace(&addr, "");

    // Leading unit-slash: "5/123 smith st" -> "123 smith st"
    let addr = SLASH_PREFIX_RE.replace(&addr, "");

    // "13 - 17" -> "13-17"
    let addr = RANGE_RE.replace_all(&addr, "$1-$2");

    let addr = PUNCT_RE.replace_all(&addr, " ");

    let mut addr = addr.into_owned();
    for (re, full) in STREET_TYPES.iter() {
        addr = re.replace_all(&addr, *full).into_owned();
    }

    WHITESPACE_RE.replace_all(&addr, " ").trim().to_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lowercases_and_expands_street_types() {
        assert_eq!(normalize_address("123 Smith St"), "123 smith street");
        assert_eq!(normalize_address("9 Boundary Rd"), "9 boundary road");
        assert_eq!(normalize_address("4 Park Ave"), "4 park avenue");
        assert_eq!(normalize_address("7 Mill Ln"), "7 mill lane");
        assert_eq!(normalize_address("2 Hilltop Dr"), "2 hilltop drive");
        assert_eq!(normalize_address("6 Garden Pl"), "6 garden place");
        assert_eq!(normalize_address("1 Pacific Hwy"), "1 pacific highway");
        assert_eq!(normalize_address("8 Ocean Blvd"), "8 ocean boulevard");
    }

    #[test]
    fn full_words_are_untouched() {
        assert_eq!(normalize_address("123 Smith Street"), "123 smith street");
    }

    #[test]
    fn strips_unit_prefix() {
        assert_eq!(
            normalize_address("Unit 5, 123 Smith St"),
            "123 smith street"
        );
        assert_eq!(normalize_address("Flat 2B 9 High St"), "9 high street");
        assert_eq!(normalize_address("Shop 3, 45 Mall Rd"), "45 mall road");
    }

    #[test]
    fn strips_slash_prefix() {
        assert_eq!(normalize_address("5/123 Smith St"), "123 smith street");
        assert_eq!(normalize_address("N/123 Smith St"), "123 smith street");
        assert_eq!(normalize_address("2a / 9 High St"), "9 high street");
    }

    #[test]
    fn consolidates_number_ranges() {
        assert_eq!(
            normalize_address("13 - 17 Boundary Rd"),
            "13-17 boundary road"
        );
        assert_eq!(normalize_address("13-17 Boundary Rd"), "13-17 boundary road");
    }

    #[test]
    fn strips_punctuation_and_collapses_whitespace() {
        assert_eq!(
            normalize_address("123  Smith   St,  Newtown."),
            "123 smith street newtown"
        );
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(normalize_address(""), "");
        assert_eq!(normalize_address("   "), "");
    }

    #[test]
    fn idempotent() {
        for raw in [
            "Unit 5, 123 Smith St",
            "5/123 Smith St",
            "13 - 17 Boundary Rd, Peakhurst",
            "123 SMITH STREET",
            "N/4 Pacific Hwy",
            "",
            "weird ~!@# input 22",
        ] {
            let once = normalize_address(raw);
            assert_eq!(normalize_address(&once), once, "not idempotent for {raw:?}");
        }
    }
}
