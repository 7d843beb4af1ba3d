//! Transcript - Full conversation text or an explicit unavailable marker

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "text", rename_all = "snake_case")]
pub enum Transcript {
    Text(String),
    Unavailable,
}

impl Transcript {
    /// Flatten a provider transcript payload into text.
    ///
    /// Providers return either a string, a list of turns (strings or objects
    /// with `message`/`text`/`content`), or a single object. Turns with a
    /// `role` are prefixed with it.
    pub fn from_raw(raw: &serde_json::Value) -> Self {
        let text = match raw {
            serde_json::Value::Null => String::new(),
            serde_json::Value::String(s) => s.trim().to_string(),
            serde_json::Value::Array(turns) => turns
                .iter()
                .filter_map(turn_text)
                .collect::<Vec<_>>()
                .join("\n"),
            serde_json::Value::Object(_) => turn_text(raw).unwrap_or_default(),
            other => other.to_string(),
        };

        if text.is_empty() {
            Transcript::Unavailable
        } else {
            Transcript::Text(text)
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Transcript::Text(text) => Some(text),
            Transcript::Unavailable => None,
        }
    }
}

fn turn_text(turn: &serde_json::Value) -> Option<String> {
    match turn {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Object(map) => {
            let body = ["message", "text", "content"]
                .iter()
                .find_map(|key| map.get(*key).and_then(|v| v.as_str()))
                .map(str::trim)
                .filter(|s| !s.is_empty())?;
            match map.get("role").and_then(|r| r.as_str()) {
                Some(role) => Some(format!("{}: {}", role, body)),
                None => Some(body.to_string()),
            }
        }
        _ => None,
    }
}
