use std::fmt::Display;

use serde::{Deserialize, Deserializer};

/// Severity of a record. Ordering is significant: a record is delivered when
/// its level is greater than or equal to the active threshold.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Level {
    #[default]
    Trace,
    Info,
    Warning,
    Error,
    /// Label only. Logging at this level never terminates the process.
    Fatal,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Trace,
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::Fatal,
    ];

    /// Parses a level token case-insensitively, accepting the usual
    /// abbreviations (`t`, `trac`, `w`, `warn`, ...).
    ///
    /// Unrecognized and empty tokens fall back to [`Level::Trace`] instead of
    /// failing.
    pub fn from_token(token: &str) -> Self {
        match token.trim().to_ascii_lowercase().as_str() {
            "t" | "trac" | "trace" => Level::Trace,
            "i" | "info" => Level::Info,
            "w" | "warn" | "warning" => Level::Warning,
            "e" | "error" => Level::Error,
            "f" | "fatal" => Level::Fatal,
            _ => Level::Trace,
        }
    }

    /// One letter tag prefixed to every message, e.g. `[W] disk almost full`.
    pub fn tag(&self) -> &'static str {
        match self {
            Level::Trace => "T",
            Level::Info => "I",
            Level::Warning => "W",
            Level::Error => "E",
            Level::Fatal => "F",
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Level::Trace => write!(f, "Trace"),
            Level::Info => write!(f, "Info"),
            Level::Warning => write!(f, "Warning"),
            Level::Error => write!(f, "Error"),
            Level::Fatal => write!(f, "Fatal"),
        }
    }
}

impl<'de> Deserialize<'de> for Level {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let token = String::deserialize(deserializer)?;
        Ok(Level::from_token(&token))
    }
}

/// One leveled, fully formatted message. Built once per log call and handed
/// to every active engine by shared reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    level: Level,
    text: String,
}

impl Record {
    pub fn new(level: Level, text: impl Into<String>) -> Self {
        Self {
            level,
            text: text.into(),
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}
