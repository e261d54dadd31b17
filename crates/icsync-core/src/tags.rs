//! Tag normalization.
//!
//! Tags reach the destination in a canonical form: lower-case, restricted to
//! `[a-z0-9-_]`, unique, optionally namespaced, and length-limited.

/// Default maximum tag length, in characters.
pub const DEFAULT_MAX_TAG_LENGTH: usize = 20;

/// Splits a comma-separated tag setting into trimmed, non-empty tags.
pub fn split_tag_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

/// Normalizes a list of raw tags.
///
/// Steps, in order: lower-case; replace every character outside
/// `[a-z0-9-_]` with `-`; drop empties; de-duplicate keeping the first
/// occurrence; prefix with `"{namespace}-"` when a namespace is given;
/// truncate each tag to `max_len` characters.
pub fn normalize_tags<I, S>(tags: I, namespace: Option<&str>, max_len: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: Vec<String> = Vec::new();
    for tag in tags {
        let cleaned: String = tag
            .as_ref()
            .to_lowercase()
            .chars()
            .map(|c| {
                if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_' {
                    c
                } else {
                    '-'
                }
            })
            .collect();

        if cleaned.is_empty() || seen.contains(&cleaned) {
            continue;
        }
        seen.push(cleaned);
    }

    let namespace = namespace.map(str::trim).filter(|ns| !ns.is_empty());
    seen.into_iter()
        .map(|tag| match namespace {
            Some(ns) => format!("{ns}-{tag}"),
            None => tag,
        })
        .map(|tag| tag.chars().take(max_len).collect())
        .collect()
}

/// Appends `additions` to `existing`, skipping tags already present.
///
/// The result never loses a tag from `existing`.
pub fn merge_tags(existing: &[String], additions: &[String]) -> Vec<String> {
    let mut merged = existing.to_vec();
    for tag in additions {
        if !merged.contains(tag) {
            merged.push(tag.clone());
        }
    }
    merged
}
