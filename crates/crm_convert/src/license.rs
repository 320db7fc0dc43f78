//! Best-effort correction of `/about/license` fields towards SPDX-recognized identifiers.
//!
//! The original tool ships a bundled copy of the SPDX license database and runs `difflib`
//! fuzzy-matching against it. We don't carry a license database of our own; instead we lean on
//! the `spdx` crate's built-in identifier table for exact/case-insensitive lookups plus the same
//! small hand-maintained patch table and GPL suffix-upgrade heuristic the original uses for its
//! non-fuzzy corrections. A close-but-not-exact license name that isn't covered by one of these
//! rules is reported as unrecognized rather than guessed at.

/// Maps a common mistake (always matched case-insensitively) to its SPDX correction.
const PATCH_TABLE: &[(&str, &str)] = &[
    ("BSD 2-CLAUSE \"SIMPLIFIED\"", "BSD-2-Clause"),
    ("UNLIMITED", "NOASSERTION"),
];

const GPL_ONLY_SUFFIXES: &[&str] = &["-only", ".0-only"];
const GPL_OR_LATER_SUFFIXES: &[&str] = &["-or-later", ".0-or-later"];

/// True for a non-deprecated SPDX identifier, matching the original's filtering of deprecated
/// entries out of its lookup table so that, e.g., `GPL-3.0` is treated as unrecognized and
/// upgraded to `GPL-3.0-only` rather than accepted as-is.
fn is_known_license_id(id: &str) -> bool {
    spdx::identifiers::LICENSES.iter().any(|(candidate_id, _, deprecated)| !deprecated && candidate_id.eq_ignore_ascii_case(id))
}

fn match_gpl_license(sanitized: &str) -> Option<String> {
    let (base, later) = match sanitized.strip_suffix('+') {
        Some(stripped) => (stripped, true),
        None => (sanitized, false),
    };
    let suffixes = if later { GPL_OR_LATER_SUFFIXES } else { GPL_ONLY_SUFFIXES };
    for suffix in suffixes {
        let candidate = format!("{base}{suffix}");
        if is_known_license_id(&candidate) {
            return Some(candidate);
        }
    }
    None
}

/// Returns the closest SPDX identifier for `license_field`, or `None` if no confident correction
/// applies. A compound expression (containing `AND`/`OR`/`WITH`, or a bare comma) is left alone:
/// rewriting a single term inside it risks breaking the expression's structure.
pub fn find_closest_license_match(license_field: &str) -> Option<String> {
    let sanitized = license_field.trim();
    if sanitized.is_empty() {
        return None;
    }

    if spdx::Expression::parse(sanitized).is_ok() && is_known_license_id(sanitized) {
        return Some(sanitized.to_string());
    }

    let upper = sanitized.to_uppercase();
    for (mistake, corrected) in PATCH_TABLE {
        if upper == *mistake {
            return Some(corrected.to_string());
        }
    }

    if let Some(gpl) = match_gpl_license(sanitized) {
        return Some(gpl);
    }

    for op in ["AND", "OR", "WITH"] {
        if sanitized.contains(op) {
            return None;
        }
    }
    if sanitized.contains(',') {
        return None;
    }

    // Case-insensitive exact match against the known identifier table, since recipes commonly
    // differ from the canonical casing only (e.g. `mit` / `Mit` / `MIT`).
    for candidate in spdx::identifiers::LICENSES {
        let (id, name, deprecated) = *candidate;
        if deprecated {
            continue;
        }
        if id.eq_ignore_ascii_case(sanitized) || name.eq_ignore_ascii_case(sanitized) {
            return Some(id.to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_spdx_id_is_returned_unchanged() {
        assert_eq!(find_closest_license_match("MIT"), Some("MIT".to_string()));
    }

    #[test]
    fn case_insensitive_match_is_corrected() {
        assert_eq!(find_closest_license_match("mit"), Some("MIT".to_string()));
    }

    #[test]
    fn patch_table_entry_is_applied() {
        assert_eq!(find_closest_license_match("unlimited"), Some("NOASSERTION".to_string()));
    }

    #[test]
    fn gpl_only_suffix_is_added() {
        assert_eq!(find_closest_license_match("GPL-3.0"), Some("GPL-3.0-only".to_string()));
    }

    #[test]
    fn compound_expressions_are_left_alone() {
        assert_eq!(find_closest_license_match("MIT AND Apache-2.0"), None);
    }
}
