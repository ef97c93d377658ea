//! Identifier and path conventions shared by sources, toolboxes and tool
//! references.

use crate::error::ModelError;

/// `[a-z0-9]+(-[a-z0-9]+)*`
pub fn is_slug(value: &str) -> bool {
    !value.is_empty()
        && value
            .split('-')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()))
}

pub fn validate_slug(what: &str, value: &str) -> Result<(), ModelError> {
    if is_slug(value) {
        Ok(())
    } else {
        Err(ModelError::new(format!(
            "{what} id must match ^[a-z0-9]+(-[a-z0-9]+)*$, got '{value}'"
        )))
    }
}

/// `\d+\.\d+`
pub fn is_catalog_version(value: &str) -> bool {
    match value.split_once('.') {
        Some((major, minor)) => {
            !major.is_empty()
                && !minor.is_empty()
                && major.chars().all(|c| c.is_ascii_digit())
                && minor.chars().all(|c| c.is_ascii_digit())
        }
        None => false,
    }
}

/// Normalize a source-relative tool path: forward slashes, no leading `./`,
/// no trailing or doubled separators.
pub fn normalize_tool_path(raw: &str) -> String {
    raw.replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

/// Reject tool paths that could leave the source root: empty paths,
/// absolute or drive-prefixed paths, and any `..` segment.
pub fn validate_tool_path(raw: &str) -> Result<(), ModelError> {
    let slashed = raw.replace('\\', "/");
    let bytes = slashed.as_bytes();
    if slashed.starts_with('/') {
        return Err(ModelError::new(format!(
            "tool path must be relative to its source, got '{raw}'"
        )));
    }
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        return Err(ModelError::new(format!(
            "tool path must not carry a drive prefix, got '{raw}'"
        )));
    }
    if slashed.split('/').any(|part| part == "..") {
        return Err(ModelError::new(format!(
            "tool path must not contain '..', got '{raw}'"
        )));
    }
    if normalize_tool_path(&slashed).is_empty() {
        return Err(ModelError::new("tool path must not be empty"));
    }
    Ok(())
}

/// Turn a slug into something ArcGIS accepts as a toolbox alias.
pub fn alias_from_slug(slug: &str) -> String {
    let compact: String = slug.chars().filter(|c| c.is_ascii_alphanumeric()).collect();
    match compact.chars().next() {
        Some(first) if first.is_ascii_alphabetic() => compact,
        _ => format!("tb{compact}"),
    }
}
