//! Name helpers for kinds and generated instance names.
//!
//! Kind names may be module paths such as `Deploy::BuildCache`. The helpers
//! here turn them into the short or snake-cased forms used for generated
//! instance names and reverse accessors.

use once_cell::sync::Lazy;
use regex::Regex;

static ACRONYM_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Z\d]+)([A-Z][a-z])").expect("static pattern")
});

static WORD_BOUNDARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([a-z\d])([A-Z])").expect("static pattern")
});

/// Separator between module segments of a kind name
pub const PATH_SEPARATOR: &str = "::";

/// Strip the module path from a kind name
///
/// `Deploy::BuildCache` becomes `BuildCache`; names without a path are
/// returned unchanged.
#[must_use]
pub fn demodulize(path: &str) -> &str {
    match path.rfind(PATH_SEPARATOR) {
        Some(i) => &path[i + PATH_SEPARATOR.len()..],
        None => path,
    }
}

/// Convert a camel-cased name into snake case
///
/// Module separators become `/`, dashes become underscores.
#[must_use]
pub fn underscore(camel_cased: &str) -> String {
    let word = camel_cased.replace(PATH_SEPARATOR, "/");
    let word = ACRONYM_BOUNDARY.replace_all(&word, "${1}_${2}");
    let word = WORD_BOUNDARY.replace_all(&word, "${1}_${2}");
    word.replace('-', "_").to_lowercase()
}

/// Build `<base>_<n>`
#[must_use]
pub fn indexed_name(base: &str, n: usize) -> String {
    format!("{}_{}", base, n)
}

/// Find the first `<base>_<n>` for which `taken` returns false, starting at 0
pub fn first_free_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    (0..)
        .map(|n| indexed_name(base, n))
        .find(|candidate| !taken(candidate))
        .unwrap_or_else(|| base.to_string())
}
