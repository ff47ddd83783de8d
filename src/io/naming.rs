//! Versioned output names of the form `<base>_<N>`.

/// Base name for cleaned output targets.
pub const DEFAULT_OUTPUT_BASE_NAME: &str = "Cleaned_Lines";

/// Next free name `<base>_<max + 1>` among `existing`.
///
/// Only names that are exactly `<base>_` followed by digits count towards
/// the maximum. Returns `<base>_1` when none exist.
///
/// # Example
/// ```
/// use despike::io::next_versioned_name;
///
/// let existing = ["Cleaned_Lines_1", "Cleaned_Lines_4", "Roads"];
/// assert_eq!(next_versioned_name(existing, "Cleaned_Lines"), "Cleaned_Lines_5");
/// ```
pub fn next_versioned_name<'a, I>(existing: I, base: &str) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = format!("{}_", base);
    let max = existing
        .into_iter()
        .filter_map(|name| name.strip_prefix(prefix.as_str()))
        .filter(|suffix| !suffix.is_empty() && suffix.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|suffix| suffix.parse::<u64>().ok())
        .max()
        .unwrap_or(0);
    format!("{}{}", prefix, max + 1)
}
