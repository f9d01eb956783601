//! Path segment sanitisation.
//!
//! Every project name and filename that reaches the filesystem passes through
//! here first. The filter is textual: it lexically normalises the input, then
//! strips `..`, `/` and `\` until none remain. It does not resolve symlinks.

use crate::storage::StorageError;

/// Sequences removed from every segment.
const FORBIDDEN: [&str; 3] = ["..", "/", "\\"];

/// Normalise an untrusted string into a single path segment.
///
/// The output never contains `..`, `/` or `\`. Stripping is repeated until a
/// fixed point so that removals cannot splice a new `..` together
/// (`".\\."` would otherwise become `".."`).
pub fn sanitize_segment(raw: &str) -> String {
    let mut segment = lexical_clean(raw);
    loop {
        let stripped = FORBIDDEN
            .iter()
            .fold(segment.clone(), |acc, pat| acc.replace(pat, ""));
        if stripped == segment {
            return segment;
        }
        segment = stripped;
    }
}

/// Sanitise and refuse segments that would address the storage root itself.
pub fn checked_segment(raw: &str) -> Result<String, StorageError> {
    let segment = sanitize_segment(raw);
    if segment.is_empty() || segment == "." {
        return Err(StorageError::InvalidName(raw.to_string()));
    }
    Ok(segment)
}

/// Purely lexical path cleaning on `/` separators.
///
/// Collapses repeated separators, drops `.` elements and folds `name/..`
/// pairs. Leading `..` elements survive on relative paths and are removed
/// afterwards by [`sanitize_segment`].
fn lexical_clean(raw: &str) -> String {
    if raw.is_empty() {
        return ".".to_string();
    }

    let rooted = raw.starts_with('/');
    let mut parts: Vec<&str> = Vec::new();

    for part in raw.split('/') {
        match part {
            "" | "." => continue,
            ".." => match parts.last() {
                Some(&last) if last != ".." => {
                    parts.pop();
                }
                _ if rooted => {}
                _ => parts.push(".."),
            },
            other => parts.push(other),
        }
    }

    let joined = parts.join("/");
    match (rooted, joined.is_empty()) {
        (true, _) => format!("/{}", joined),
        (false, true) => ".".to_string(),
        (false, false) => joined,
    }
}
