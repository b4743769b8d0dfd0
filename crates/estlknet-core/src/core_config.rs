//! Core configuration comments
//!
//! CAM post-processors let the user embed free-form comments, so machine
//! setups describe each motion core with a hand-written, loosely formatted
//! object such as:
//!
//! ```text
//! (Core : {Core: A; X-Axis: X; Park: 10; Feed: 500})
//! (Core: B; X-Axis: U; Park: 290)
//! ```
//!
//! Keys and alphabetic values may be left unquoted and pairs may be separated
//! by `;` or `,`. The fragment is normalized into strict JSON before decoding.

use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ConfigError, ConfigResult};

/// Axis letter used by the CAM output for the primary motion core.
pub const CANONICAL_AXIS: char = 'X';

/// Configuration of one physical motion core.
#[derive(Debug, Clone, PartialEq)]
pub struct CoreConfig {
    /// Core identifier, e.g. "A"
    pub id: String,
    /// Letter this core uses in place of `X` (always uppercase)
    pub axis: char,
    /// Coordinate the core is moved to when it is deactivated
    pub park: f64,
    /// Feed rate for the parking move; zero means rapid positioning
    pub feed: f64,
}

impl CoreConfig {
    /// Create a new core configuration
    pub fn new(id: impl Into<String>, axis: char, park: f64, feed: f64) -> Self {
        Self {
            id: id.into(),
            axis: axis.to_ascii_uppercase(),
            park,
            feed,
        }
    }

    /// Whether this core drives the canonical `X` axis
    pub fn is_canonical(&self) -> bool {
        self.axis.eq_ignore_ascii_case(&CANONICAL_AXIS)
    }

    /// Command that moves this core to its park position.
    ///
    /// A non-zero feed rate yields a `G1` feed move, otherwise a `G00` rapid.
    pub fn park_command(&self) -> String {
        if self.feed > 0.0 {
            format!(
                "G1 {}{} F{}",
                self.axis,
                fixed3(self.park),
                fixed3(self.feed)
            )
        } else {
            format!("G00 {}{}", self.axis, fixed3(self.park))
        }
    }
}

/// Three decimals with ties rounded away from zero (`1.0625` -> `1.063`).
///
/// `{:.3}` alone rounds exact ties to even.
fn fixed3(value: f64) -> String {
    format!("{:.3}", (value * 1000.0).round() / 1000.0)
}

#[derive(Debug, Deserialize)]
struct RawCoreConfig {
    #[serde(rename = "Core")]
    core: Option<String>,
    #[serde(rename = "X-Axis")]
    x_axis: Option<String>,
    #[serde(rename = "Park", default)]
    park: f64,
    #[serde(rename = "Feed", default)]
    feed: f64,
}

fn key_regex() -> &'static Regex {
    static KEY_REGEX: OnceLock<Regex> = OnceLock::new();
    KEY_REGEX.get_or_init(|| Regex::new(r"([{,;]\s*)([\w-]+)\s*:").expect("invalid key regex"))
}

fn value_regex() -> &'static Regex {
    static VALUE_REGEX: OnceLock<Regex> = OnceLock::new();
    VALUE_REGEX
        .get_or_init(|| Regex::new(r":\s*([A-Za-z]+)([,;}])").expect("invalid value regex"))
}

/// Normalize a relaxed object fragment into strict JSON.
///
/// Bare keys get quoted, bare alphabetic values get quoted (numbers stay
/// numbers) and `;` separators become `,`.
pub fn sanitize_fragment(fragment: &str) -> String {
    let quoted_keys = key_regex().replace_all(fragment, r#"${1}"${2}":"#);
    let quoted_values = value_regex().replace_all(&quoted_keys, r#": "${1}"${2}"#);
    quoted_values.replace(';', ",")
}

/// Extract the brace-wrapped fragment between the first `(` and the last `)`.
fn extract_fragment(line: &str) -> ConfigResult<String> {
    let line = line.trim();
    match (line.find('('), line.rfind(')')) {
        (Some(start), Some(end)) if end > start => Ok(format!("{{{}}}", &line[start + 1..end])),
        _ => Err(ConfigError::MissingFragment),
    }
}

/// Decode a config comment line.
///
/// Returns `Ok(None)` when the object decodes but carries no `Core` id;
/// such configs are discarded without a warning.
pub fn parse_core_config(line: &str) -> ConfigResult<Option<CoreConfig>> {
    let fragment = extract_fragment(line)?;
    let mut value: Value = serde_json::from_str(&sanitize_fragment(&fragment))?;

    // `(Core : {...})` wraps the real object under the marker key
    if let Some(inner) = value.get_mut("Core").filter(|v| v.is_object()) {
        value = inner.take();
    }

    let raw: RawCoreConfig = serde_json::from_value(value)?;
    let id = match raw.core.map(|c| c.trim().to_string()) {
        Some(id) if !id.is_empty() => id,
        _ => return Ok(None),
    };

    // `X-Axis` is required here even though only `Core` must be present:
    // a config without a single-letter axis is a decode error and is not stored.
    let axis_text = raw
        .x_axis
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .ok_or_else(|| ConfigError::MissingField("X-Axis".to_string()))?;

    let mut chars = axis_text.chars();
    let axis = match (chars.next(), chars.next()) {
        (Some(c), None) if c.is_ascii_alphabetic() => c,
        _ => return Err(ConfigError::InvalidAxis(axis_text)),
    };

    Ok(Some(CoreConfig::new(id, axis, raw.park, raw.feed)))
}
