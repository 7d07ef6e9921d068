//! Utility functions for text normalization and payload shaping

use serde_json::{Map, Value};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Replacement byte for characters outside ISO-8859-1
const LATIN1_REPLACEMENT: u8 = b'?';

/// Strip diacritics from text (`"São Paulo"` → `"Sao Paulo"`)
///
/// Decomposes to NFD and drops combining marks. Characters without a
/// decomposition (e.g. `ß`, `ø`) are kept as-is.
///
/// # Examples
///
/// ```
/// use ar_courier::utils::strip_diacritics;
///
/// assert_eq!(strip_diacritics("Conceição"), "Conceicao");
/// assert_eq!(strip_diacritics("AÇÃO"), "ACAO");
/// ```
#[must_use]
pub fn strip_diacritics(input: &str) -> String {
    input.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Encode text as ISO-8859-1, one byte per character
///
/// Characters above U+00FF become `?`.
pub fn encode_latin1(input: &str) -> Vec<u8> {
    input
        .chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(LATIN1_REPLACEMENT))
        .collect()
}

/// Decode bytes as UTF-8 when valid, otherwise as ISO-8859-1
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Convert `snake_case` or `kebab-case` to `camelCase`
///
/// ```
/// use ar_courier::utils::to_camel_case;
///
/// assert_eq!(to_camel_case("dados_cliente"), "dadosCliente");
/// assert_eq!(to_camel_case("client-code"), "clientCode");
/// ```
pub fn to_camel_case(input: &str) -> String {
    let mut words = input.split(['_', '-']);
    let mut out = words.next().unwrap_or_default().to_string();
    for word in words {
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.extend(first.to_uppercase());
            out.push_str(&chars.as_str().to_lowercase());
        }
    }
    out
}

/// Recursively rename every object key in a JSON value
pub fn convert_keys(value: Value, convert: fn(&str) -> String) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| convert_keys(item, convert))
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (convert(&k), convert_keys(v, convert)))
                .collect::<Map<String, Value>>(),
        ),
        other => other,
    }
}

/// Human-readable byte size (`1536` → `"1.5 KB"`)
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 6] = ["B", "KB", "MB", "GB", "TB", "PB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    let rounded = (size * 100.0).round() / 100.0;
    format!("{} {}", rounded, UNITS[unit])
}
