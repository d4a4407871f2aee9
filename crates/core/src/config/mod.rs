use std::{fmt, path::Path};

use serde::{Deserialize, Serialize};

use crate::Result;

/// Unit a timeline and its events count in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    /// Elapsed milliseconds.
    #[default]
    Time,
    /// Elapsed frame count.
    Frame,
}

impl fmt::Display for UnitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Time => f.write_str("time"),
            Self::Frame => f.write_str("frame"),
        }
    }
}

/// Construction options recognised by timelines and events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineOptions {
    #[serde(default)]
    pub is_in_frame: bool,
}

impl TimelineOptions {
    pub fn in_frames() -> Self {
        Self { is_in_frame: true }
    }
}

impl From<TimelineOptions> for UnitKind {
    fn from(options: TimelineOptions) -> Self {
        if options.is_in_frame {
            UnitKind::Frame
        } else {
            UnitKind::Time
        }
    }
}

/// Settings for driving a [`Stage`](crate::Stage) from the command line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageConfig {
    /// Milliseconds the ticker advances on every tick.
    pub frame_interval_ms: f64,
    /// Number of ticks a run emits.
    pub ticks: u32,
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: 1000.0 / 60.0,
            ticks: 60,
        }
    }
}

impl StageConfig {
    /// Reads a JSON document, falling back to defaults for missing fields.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }
}
