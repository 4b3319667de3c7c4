use std::{
    io::Write,
    sync::{Arc, Mutex},
};

use eyre::Context;
use serde::Deserialize;

use super::{parse_config, Engine};
use crate::{
    clock::{Clock, SystemClock},
    formatters::{color_brush, plain_brush, Brush, Config, DefaultFormatter, LogFormatter},
    level::Level,
    Record,
};

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    pub level: Level,
    pub color: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            level: Level::Trace,
            color: true,
        }
    }
}

/// Writes records to standard output, colored by level.
pub struct ConsoleEngine {
    out: Mutex<Box<dyn Write + Send>>,
    formatter: Box<dyn LogFormatter>,
    clock: Arc<dyn Clock>,
    level: Level,
}

impl ConsoleEngine {
    pub fn new() -> Self {
        Self::with_writer(Box::new(std::io::stdout()), Arc::new(SystemClock))
    }

    /// Sends output to `out` instead of stdout.
    pub fn with_writer(out: Box<dyn Write + Send>, clock: Arc<dyn Clock>) -> Self {
        Self {
            out: Mutex::new(out),
            formatter: Box::new(DefaultFormatter::new(Config::new().with_brush(color_brush))),
            clock,
            level: Level::Trace,
        }
    }

    pub fn level(&self) -> Level {
        self.level
    }
}

impl Default for ConsoleEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for ConsoleEngine {
    fn init(&mut self, config: &str) -> eyre::Result<()> {
        let config: ConsoleConfig = parse_config(config)?;

        let brush: Brush = if config.color {
            color_brush
        } else {
            plain_brush
        };

        self.level = config.level;
        self.formatter = Box::new(DefaultFormatter::new(Config::new().with_brush(brush)));

        Ok(())
    }

    fn write(&self, record: &Record) -> eyre::Result<()> {
        if record.level() < self.level {
            return Ok(());
        }

        let line = self.formatter.format(record, &self.clock.now());
        let mut out = self.out.lock().map_err(|e| eyre::eyre!(e.to_string()))?;

        writeln!(out, "{}", line).context("Can't write to console")
    }

    fn flush(&self) -> eyre::Result<()> {
        let mut out = self.out.lock().map_err(|e| eyre::eyre!(e.to_string()))?;
        out.flush().context("Can't flush console")
    }

    fn destroy(&self) {}
}

#[cfg(test)]
mod tests {
    use chrono::{Local, TimeZone};

    use super::*;
    use crate::clock::ManualClock;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn engine(config: &str) -> (ConsoleEngine, SharedBuf) {
        let buf = SharedBuf::default();
        let clock = ManualClock::new(Local.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap());
        let mut engine = ConsoleEngine::with_writer(Box::new(buf.clone()), Arc::new(clock));
        engine.init(config).unwrap();
        (engine, buf)
    }

    #[test]
    fn empty_config_prints_everything() {
        let (engine, buf) = engine("");
        engine.write(&Record::new(Level::Trace, "[T] hello")).unwrap();

        let out = buf.contents();
        assert!(out.starts_with("2024/03/01 09:00:00 "));
        assert!(out.contains("[T] hello"));
        assert!(out.ends_with('\n'));
    }

    #[test]
    fn own_threshold_filters_records() {
        let (engine, buf) = engine(r#"{"level": "error", "color": false}"#);
        assert_eq!(engine.level(), Level::Error);
        engine.write(&Record::new(Level::Warning, "[W] quiet")).unwrap();
        engine.write(&Record::new(Level::Error, "[E] loud")).unwrap();

        assert_eq!(buf.contents(), "2024/03/01 09:00:00 [E] loud\n");
    }

    #[test]
    fn malformed_config_is_rejected() {
        let buf = Box::new(SharedBuf::default());
        let mut engine = ConsoleEngine::with_writer(buf, Arc::new(SystemClock));

        assert!(engine.init("{level").is_err());
    }
}
