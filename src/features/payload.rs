//! Event-log payload produced by the browser capture layer.

use crate::error::{Result, SentinelError};
use serde::{Deserialize, Serialize};

/// Used when a payload carries no `screenResolution` at all.
pub const DEFAULT_SCREEN_RESOLUTION: &str = "1920x1080";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPress {
    pub key: String,
    pub time: i64,
}

/// Click or hover position on the page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub x: i64,
    pub y: i64,
    pub time: i64,
    #[serde(default)]
    pub element: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrollEvent {
    #[serde(rename = "scrollY")]
    pub scroll_y: f64,
    pub time: i64,
}

/// One captured interaction session. Only the lengths of `paste_events` and
/// `autofill_detected` are used, so their entries stay opaque.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EventLogPayload {
    pub keys_pressed: Vec<KeyPress>,
    pub mouse_clicks: Vec<PointerEvent>,
    pub mouse_hovers: Vec<PointerEvent>,
    pub scroll_events: Vec<ScrollEvent>,
    pub paste_events: Vec<serde_json::Value>,
    pub autofill_detected: Vec<serde_json::Value>,
    pub time_spent: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screen_resolution: Option<String>,
}

impl EventLogPayload {
    /// Parse a raw request body. A top-level `metadata` object is unwrapped;
    /// otherwise the object itself is the event log.
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        let data = match value {
            serde_json::Value::Object(mut map) => match map.remove("metadata") {
                Some(inner @ serde_json::Value::Object(_)) => inner,
                Some(other) => {
                    map.insert("metadata".to_string(), other);
                    serde_json::Value::Object(map)
                }
                None => serde_json::Value::Object(map),
            },
            other => {
                return Err(SentinelError::MalformedInput(format!(
                    "payload must be a JSON object, got {}",
                    json_kind(&other)
                )))
            }
        };
        serde_json::from_value(data).map_err(|e| SentinelError::MalformedInput(e.to_string()))
    }

    pub fn from_json_str(s: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(s).map_err(|e| SentinelError::MalformedInput(e.to_string()))?;
        Self::from_value(value)
    }

    /// Screen size in pixels. `"WxH"` with two non-negative integers; anything else
    /// means the capture was corrupt.
    pub fn screen_dimensions(&self) -> Result<(u32, u32)> {
        let raw = self
            .screen_resolution
            .as_deref()
            .unwrap_or(DEFAULT_SCREEN_RESOLUTION);
        let mut parts = raw.split('x');
        let (Some(w), Some(h), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(SentinelError::MalformedInput(format!(
                "screenResolution {raw:?} is not WxH"
            )));
        };
        let parse = |s: &str| {
            s.trim().parse::<u32>().map_err(|_| {
                SentinelError::MalformedInput(format!("screenResolution {raw:?} is not numeric"))
            })
        };
        Ok((parse(w)?, parse(h)?))
    }
}

fn json_kind(v: &serde_json::Value) -> &'static str {
    match v {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}
