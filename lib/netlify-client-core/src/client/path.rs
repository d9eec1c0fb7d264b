use std::sync::LazyLock;

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use regex::Regex;

/// Regular expression for matching path parameters in the format `{param_name}`.
static RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(?<name>\w+)}").expect("a valid regex"));

/// Everything but RFC 3986 unreserved characters.
const PATH_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn encode_path_param_value(value: &str) -> String {
    utf8_percent_encode(value, PATH_VALUE).to_string()
}

/// Names of the `{name}` placeholders of a path template, in order of appearance.
pub(in crate::client) fn placeholders(path: &str) -> impl Iterator<Item = &str> {
    RE.captures_iter(path)
        .filter_map(|caps| caps.name("name"))
        .map(|name| name.as_str())
}

/// Substitutes every placeholder with its percent-encoded value.
///
/// `lookup` is called once per placeholder occurrence. The name of the first
/// placeholder without a value is returned as the error.
pub(in crate::client) fn resolve_path<F>(template: &str, mut lookup: F) -> Result<String, String>
where
    F: FnMut(&str) -> Option<String>,
{
    let mut resolved = String::with_capacity(template.len());
    let mut last = 0;

    for caps in RE.captures_iter(template) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.name("name")) else {
            continue;
        };
        let Some(value) = lookup(name.as_str()) else {
            return Err(name.as_str().to_string());
        };
        resolved.push_str(template.get(last..whole.start()).unwrap_or_default());
        resolved.push_str(&encode_path_param_value(&value));
        last = whole.end();
    }
    resolved.push_str(template.get(last..).unwrap_or_default());

    Ok(resolved)
}
