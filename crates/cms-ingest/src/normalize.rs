//! Column name normalization

use regex::Regex;
use std::sync::LazyLock;

// Both patterns are literals; compilation cannot fail at runtime.
#[allow(clippy::unwrap_used)]
static DISALLOWED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9_\s]").unwrap());

#[allow(clippy::unwrap_used)]
static WHITESPACE_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Map a raw column label to a snake_case identifier
///
/// Lower-cases, drops anything that is not `a-z`, `0-9`, `_` or whitespace,
/// then collapses each whitespace run into one underscore. Underscores in the
/// input survive so that the function is idempotent.
///
/// ```
/// use cms_ingest::normalize_column_name;
///
/// assert_eq!(normalize_column_name("Facility ID"), "facility_id");
/// assert_eq!(normalize_column_name("Phone  Number (Main)"), "phone_number_main");
/// ```
pub fn normalize_column_name(label: &str) -> String {
    let lowered = label.to_lowercase();
    let kept = DISALLOWED.replace_all(&lowered, "");
    WHITESPACE_RUN.replace_all(&kept, "_").into_owned()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_typical_cms_headers() {
        assert_eq!(normalize_column_name("Facility Name"), "facility_name");
        assert_eq!(normalize_column_name("ZIP Code"), "zip_code");
        assert_eq!(
            normalize_column_name("Hospital overall rating footnote"),
            "hospital_overall_rating_footnote"
        );
        assert_eq!(normalize_column_name("Measure_ID"), "measure_id");
        assert_eq!(normalize_column_name("Score (%)"), "score_");
    }

    #[test]
    fn test_whitespace_runs_collapse() {
        assert_eq!(normalize_column_name("a \t\n b"), "a_b");
        assert_eq!(normalize_column_name("  padded "), "_padded_");
        assert_eq!(normalize_column_name(""), "");
    }

    #[test]
    fn test_non_ascii_letters_are_dropped() {
        assert_eq!(normalize_column_name("Año Fiscal"), "ao_fiscal");
        assert_eq!(normalize_column_name("État-Région"), "tatrgion");
    }

    #[test]
    fn test_symbols_only() {
        assert_eq!(normalize_column_name("#%$"), "");
        assert_eq!(normalize_column_name("- -"), "_");
    }

    proptest! {
        #[test]
        fn prop_idempotent(label in any::<String>()) {
            let once = normalize_column_name(&label);
            prop_assert_eq!(normalize_column_name(&once), once);
        }

        #[test]
        fn prop_output_alphabet(label in any::<String>()) {
            let out = normalize_column_name(&label);
            prop_assert!(out
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
        }

        #[test]
        fn prop_one_underscore_per_space_run(label in "[A-Za-z0-9 ]{0,40}") {
            let out = normalize_column_name(&label);
            let runs = label
                .split(|c: char| c != ' ')
                .filter(|piece| !piece.is_empty())
                .count();
            prop_assert_eq!(out.matches('_').count(), runs);
        }
    }
}
