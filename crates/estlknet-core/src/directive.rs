//! Line classification
//!
//! Every input line falls into exactly one [`Directive`] kind. Prefixes are
//! matched case-insensitively and checked in a fixed order, first match wins.

use std::borrow::Cow;

use crate::core_config::CANONICAL_AXIS;

const SPLIT_BY_TOOL_PREFIX: &str = "(SplitByTool:";
const CORE_PREFIXES: [&str; 2] = ["(Core :", "(Core:"];
const TOOL_CHANGE_PREFIX: &str = "(Tool Change";

/// Kind of an input line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Directive<'a> {
    /// `(SplitByTool: ...)`, with the parsed truthiness
    SplitByTool { enabled: bool },
    /// `(Core : ...)` / `(Core: ...)`
    CoreConfig,
    /// `(Tool Change ... [id] ...)`, with the bracketed id if any
    ToolChange { core: Option<&'a str> },
    /// A line starting with `G`
    Motion,
    /// Anything else
    Other,
}

fn starts_with_ignore_case(line: &str, prefix: &str) -> bool {
    line.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Classify a single line
pub fn classify(line: &str) -> Directive<'_> {
    if starts_with_ignore_case(line, SPLIT_BY_TOOL_PREFIX) {
        let value = &line[SPLIT_BY_TOOL_PREFIX.len()..];
        return Directive::SplitByTool {
            enabled: is_truthy(value),
        };
    }

    if CORE_PREFIXES
        .iter()
        .any(|prefix| starts_with_ignore_case(line, prefix))
    {
        return Directive::CoreConfig;
    }

    if starts_with_ignore_case(line, TOOL_CHANGE_PREFIX) {
        return Directive::ToolChange {
            core: tool_change_target(line),
        };
    }

    if line.starts_with(['G', 'g']) {
        return Directive::Motion;
    }

    Directive::Other
}

/// `true` (any case) or `1` anywhere in the value enables splitting.
fn is_truthy(value: &str) -> bool {
    value.to_ascii_lowercase().contains("true") || value.contains('1')
}

/// Trimmed text between the first `[` and the first `]`, if non-empty.
pub fn tool_change_target(line: &str) -> Option<&str> {
    let open = line.find('[')?;
    let close = line.find(']')?;
    if close <= open {
        return None;
    }
    let id = line[open + 1..close].trim();
    (!id.is_empty()).then_some(id)
}

/// Replace every `X` in a motion line with the active axis letter.
///
/// This is a plain byte replace, not token aware: an `X` inside a trailing
/// comment on the same line is rewritten too. Works on raw bytes so lines
/// that are not valid UTF-8 keep their other bytes untouched.
pub fn remap_axis(line: &[u8], axis: char) -> Cow<'_, [u8]> {
    let canonical = CANONICAL_AXIS as u8;
    if axis.eq_ignore_ascii_case(&CANONICAL_AXIS) || !line.contains(&canonical) {
        return Cow::Borrowed(line);
    }

    let mut buf = [0; 4];
    let replacement = axis.encode_utf8(&mut buf).as_bytes();
    let mut remapped = Vec::with_capacity(line.len());
    for &byte in line {
        if byte == canonical {
            remapped.extend_from_slice(replacement);
        } else {
            remapped.push(byte);
        }
    }
    Cow::Owned(remapped)
}
