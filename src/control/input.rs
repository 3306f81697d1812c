//! Structured command input.
//!
//! The frontend speaks loosely-typed JSON. Instead of letting every
//! command probe field types at runtime, the whole object is parsed
//! once here, at the dispatch boundary: a field that is absent or has
//! the wrong type becomes `None`, and the command sees only explicit
//! options. The single exception to "default, don't reject" is numeric
//! truncation: a target ID that does not fit a player ID is dropped on
//! its own, never silently wrapped.

use serde_json::Value;
use tracing::debug;

/// Every field a built-in command consumes, parsed leniently.
///
/// Field names on the wire follow the frontend's convention (`Text`,
/// `Tag`, `Color`, `Targets`, `ID`, `Reason`, `Quiet`, `Password`). A
/// bare JSON number is accepted as the `ID` (the simple kick form), a
/// bare JSON string as the `Password`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandInput {
    pub text: Option<String>,
    pub tag: Option<String>,
    pub color: Option<String>,
    /// Valid target player IDs; entries that were not positive numbers
    /// fitting a `u32` have been dropped individually.
    pub targets: Option<Vec<u32>>,
    pub id: Option<u32>,
    pub reason: Option<String>,
    pub quiet: Option<bool>,
    pub password: Option<String>,
}

impl CommandInput {
    /// Parse a raw request body. Never fails; anything unusable is
    /// `None`.
    pub fn parse(raw: &Value) -> Self {
        match raw {
            Value::Object(map) => Self {
                text: string_field(map.get("Text")),
                tag: string_field(map.get("Tag")),
                color: string_field(map.get("Color")),
                targets: target_list(map.get("Targets")),
                id: id_field(map.get("ID")),
                reason: string_field(map.get("Reason")),
                quiet: bool_field(map.get("Quiet")),
                password: string_field(map.get("Password")),
            },
            // Bare-number requests are the simple kick form.
            Value::Number(_) => Self {
                id: id_field(Some(raw)),
                ..Self::default()
            },
            // Bare-string requests carry the auth password.
            Value::String(password) => Self {
                password: Some(password.clone()),
                ..Self::default()
            },
            _ => Self::default(),
        }
    }
}

fn string_field(value: Option<&Value>) -> Option<String> {
    match value {
        Some(Value::String(s)) => Some(s.clone()),
        _ => None,
    }
}

fn bool_field(value: Option<&Value>) -> Option<bool> {
    match value {
        Some(Value::Bool(b)) => Some(*b),
        _ => None,
    }
}

/// A player ID: a non-negative integer fitting `u32`. Anything else,
/// including a value that would truncate, is dropped.
fn id_field(value: Option<&Value>) -> Option<u32> {
    let number = value?.as_u64()?;
    match u32::try_from(number) {
        Ok(id) => Some(id),
        Err(_) => {
            debug!(value = number, "Dropping target ID that overflows a player ID");
            None
        }
    }
}

/// Target list: `None` when absent or not an array (broadcast to all);
/// invalid entries are dropped one by one, keeping the rest.
fn target_list(value: Option<&Value>) -> Option<Vec<u32>> {
    match value {
        Some(Value::Array(items)) => Some(
            items
                .iter()
                .filter_map(|item| id_field(Some(item)))
                .collect(),
        ),
        _ => None,
    }
}
