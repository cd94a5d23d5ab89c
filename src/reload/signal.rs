//! Signals pushed to connected browsers.

use serde::{Deserialize, Serialize};

/// A reload instruction for the browser.
///
/// Serialized with a `type` tag so the injected client can dispatch on it:
/// `{"type":"reload"}` or `{"type":"inject-css","path":"css/site.css"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ReloadSignal {
    /// Navigate-reload the whole page.
    #[serde(rename = "reload")]
    FullReload,
    /// Swap the stylesheet at `path` (root-relative, `/`-separated) in place.
    #[serde(rename = "inject-css")]
    InjectStyle { path: String },
}

impl ReloadSignal {
    pub fn inject_style(path: impl Into<String>) -> Self {
        Self::InjectStyle { path: path.into() }
    }

    pub fn to_json(&self) -> String {
        // Enum of plain strings; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| r#"{"type":"reload"}"#.to_string())
    }
}
