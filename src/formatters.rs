use chrono::{DateTime, Local};
use yansi::{Color, Paint, Style};

use crate::{call_site::CallSite, level::Level, Record};

/// Pure text transform applied to the message part of a console line.
pub type Brush = fn(Level, &str) -> String;

pub fn color_brush(level: Level, text: &str) -> String {
    let color = match level {
        Level::Trace => Color::Green,
        Level::Info => Color::Blue,
        Level::Warning => Color::Yellow,
        Level::Error => Color::Red,
        Level::Fatal => Color::White,
    };

    text.paint(Style::new().fg(color).bold()).to_string()
}

pub fn plain_brush(_level: Level, text: &str) -> String {
    text.to_string()
}

pub trait LogFormatter: Sync + Send {
    fn format(&self, record: &Record, now: &DateTime<Local>) -> String;
}

#[derive(Clone)]
pub struct Config {
    pub datetime_format: String,
    pub brush: Brush,
}

impl Config {
    pub fn new() -> Self {
        Self {
            datetime_format: "%Y/%m/%d %H:%M:%S".to_string(),
            brush: plain_brush,
        }
    }

    pub fn with_brush(self, brush: Brush) -> Self {
        Self { brush, ..self }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

/// Renders `<date> <time> <text>` with the configured brush applied to the
/// text. The line terminator is left to the engine.
pub struct DefaultFormatter {
    config: Config,
}

impl DefaultFormatter {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn timestamp(&self, now: &DateTime<Local>) -> String {
        now.format(&self.config.datetime_format).to_string()
    }
}

impl LogFormatter for DefaultFormatter {
    fn format(&self, record: &Record, now: &DateTime<Local>) -> String {
        format!(
            "{} {}",
            self.timestamp(now),
            (self.config.brush)(record.level(), record.text()),
        )
    }
}

/// Builds the record text: optional `[file:line] ` prefix, then the level tag.
pub fn compose_message(level: Level, call_site: Option<&CallSite>, msg: &str) -> String {
    match call_site {
        Some(site) => format!("{} [{}] {}", site, level.tag(), msg),
        None => format!("[{}] {}", level.tag(), msg),
    }
}
