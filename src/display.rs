//! # Display Module
//!
//! Formats mirrored state as one line per refresh for the demo CLI.
//!
//! - **text**: `Axes: 0:-12:255: hat value: 0 buttons: X _ _ `
//! - **json**: one JSON object per line (JSONL) with a local timestamp

use chrono::Local;
use serde::Serialize;

use crate::mirror::{JoystickMirror, StateSnapshot};

/// Pressed button marker in text lines.
const PRESSED: &str = "X";
/// Released button marker in text lines.
const RELEASED: &str = "_";

/// State line format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl OutputFormat {
    /// Parses a config/CLI format name; unknown names fall back to text.
    pub fn from_name(name: &str) -> Self {
        match name {
            "json" => Self::Json,
            _ => Self::Text,
        }
    }
}

#[derive(Serialize)]
struct JsonLine<'a> {
    timestamp: String,
    #[serde(flatten)]
    state: &'a StateSnapshot,
}

/// Renders a snapshot as a text state line.
#[must_use]
pub fn render_text(snapshot: &StateSnapshot) -> String {
    let mut line = String::from("Axes: ");
    for value in &snapshot.axes {
        line.push_str(&value.to_string());
        line.push(':');
    }

    line.push_str(" hat value: ");
    line.push_str(&snapshot.hat.to_string());

    line.push_str(" buttons: ");
    for &pressed in &snapshot.buttons {
        line.push_str(if pressed { PRESSED } else { RELEASED });
        line.push(' ');
    }

    line
}

/// Renders a snapshot as a JSON state line.
///
/// # Errors
///
/// Returns the serializer error, which cannot happen for plain snapshots.
pub fn render_json(snapshot: &StateSnapshot) -> serde_json::Result<String> {
    serde_json::to_string(&JsonLine {
        timestamp: Local::now().to_rfc3339(),
        state: snapshot,
    })
}

/// Reads the mirror and renders one state line.
pub fn render(mirror: &JoystickMirror, format: OutputFormat) -> serde_json::Result<String> {
    let snapshot = mirror.snapshot();
    match format {
        OutputFormat::Text => Ok(render_text(&snapshot)),
        OutputFormat::Json => render_json(&snapshot),
    }
}
