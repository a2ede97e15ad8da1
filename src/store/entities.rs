use std::fmt::Display;

use serde::Deserialize;
use serde::Serialize;

/// One capture of the user's on-screen state. Written once by the probe and
/// never modified afterwards. `timestamp` doubles as the monitor's dedup key:
/// an observation is "new" iff its timestamp differs from the last one
/// classified.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Observation {
    /// Capture moment formatted with [crate::utils::time::timestamp_slug].
    pub timestamp: String,
    #[serde(default)]
    pub active_window: String,
    #[serde(default)]
    pub focused_text: String,
    #[serde(default)]
    pub clipboard: String,
    #[serde(default)]
    pub ocr_text: String,
}

impl Observation {
    /// True when no capture source produced any text. Blank observations are
    /// classified as unknown without asking the model.
    pub fn is_blank(&self) -> bool {
        self.active_window.trim().is_empty()
            && self.focused_text.trim().is_empty()
            && self.clipboard.trim().is_empty()
            && self.ocr_text.trim().is_empty()
    }
}

/// Coarse activity categories the model is allowed to answer with. Anything
/// it invents outside this list deserializes to [Activity::Unknown].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Activity {
    Coding,
    Researching,
    Browsing,
    Emailing,
    Messaging,
    Gaming,
    Watching,
    Writing,
    Designing,
    Working,
    #[default]
    #[serde(other)]
    Unknown,
}

impl Display for Activity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Activity::Coding => "coding",
            Activity::Researching => "researching",
            Activity::Browsing => "browsing",
            Activity::Emailing => "emailing",
            Activity::Messaging => "messaging",
            Activity::Gaming => "gaming",
            Activity::Watching => "watching",
            Activity::Writing => "writing",
            Activity::Designing => "designing",
            Activity::Working => "working",
            Activity::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

/// The classifier's structured answer for one observation. `timestamp` is
/// always the wall-clock moment of classification, not the observation's
/// capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Verdict {
    #[serde(default)]
    pub activity: Activity,
    #[serde(default)]
    pub confidence: f64,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub data_sources: String,
    #[serde(default)]
    pub timestamp: f64,
    /// Set only in offline analysis mode, naming the snapshot file the
    /// verdict came from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_file: Option<String>,
}

impl Verdict {
    /// Degraded verdict used for every non-success path of the classifier.
    pub fn unknown(description: impl Into<String>) -> Self {
        Self {
            activity: Activity::Unknown,
            confidence: 0.0,
            description: description.into(),
            details: String::new(),
            data_sources: String::new(),
            timestamp: 0.0,
            source_file: None,
        }
    }
}

/// One gesture-triggered interaction record, appended to `hover_output.json`
/// by the hover logger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoverRecord {
    pub timestamp: String,
    pub active_window: String,
    pub foctext: String,
}
