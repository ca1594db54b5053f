//! Rendering of the injected bootstrap (init) script.
//!
//! Only placeholder substitution is handled here; the script text itself is a
//! resource. Substituted values are script string literals, escaped so that
//! no path can terminate the literal early or be read as an escape sequence.

use crate::{utf8_path, FetchError};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const CLASSPATH_PLACEHOLDER: &str = "$NB_CLASSPATH";
pub const TRANSFER_FILE_PLACEHOLDER: &str = "$NB_TRANSFER_FILE";

const TEMPLATE_RESOURCE: &str = include_str!("../resources/fetch-models.gradle");

fn template() -> &'static str {
    static TEMPLATE: OnceLock<String> = OnceLock::new();
    TEMPLATE.get_or_init(|| TEMPLATE_RESOURCE.replace("\r\n", "\n"))
}

/// Quotes `value` as a single-quoted script string literal.
///
/// Backslashes are doubled and single quotes escaped. A `\u` left after that
/// (i.e. an escaped backslash followed by `u`) is split into two
/// concatenated literals so the script parser never sees a unicode escape.
pub fn pastable_string(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace("\\u", "\\' + 'u");
    format!("'{escaped}'")
}

/// Quotes `path` like [`pastable_string`]. Paths that are not valid UTF-8
/// are rejected rather than pointing the script at a different file.
pub fn pastable_path(path: &Path) -> Result<String, FetchError> {
    Ok(pastable_string(utf8_path(path)?))
}

/// A script list literal of quoted paths, e.g. `['/a.jar', '/b.jar']`.
pub fn pastable_list(paths: &[PathBuf]) -> Result<String, FetchError> {
    let items = paths
        .iter()
        .map(|path| pastable_path(path))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(format!("[{}]", items.join(", ")))
}

/// Renders the bootstrap script for `classpath` and `transfer_file`.
pub fn render(classpath: &[PathBuf], transfer_file: &Path) -> Result<String, FetchError> {
    render_template(template(), classpath, transfer_file)
}

pub(crate) fn render_template(
    template: &str,
    classpath: &[PathBuf],
    transfer_file: &Path,
) -> Result<String, FetchError> {
    Ok(substitute(
        template,
        &[
            (CLASSPATH_PLACEHOLDER, pastable_list(classpath)?),
            (TRANSFER_FILE_PLACEHOLDER, pastable_path(transfer_file)?),
        ],
    ))
}

/// Replaces every placeholder in a single pass, so substituted text is never
/// scanned for placeholders again.
fn substitute(template: &str, values: &[(&str, String)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('$') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match values
            .iter()
            .find(|(placeholder, _)| tail.starts_with(placeholder))
        {
            Some((placeholder, value)) => {
                out.push_str(value);
                rest = &tail[placeholder.len()..];
            }
            None => {
                out.push('$');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}
