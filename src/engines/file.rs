use std::{
    ffi::OsString,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, RwLock,
    },
};

use chrono::{DateTime, Local, NaiveDate};
use eyre::{bail, Context};
use serde::Deserialize;

use super::{parse_config, Engine};
use crate::{
    clock::{rfc3339_stamp, Clock, SystemClock},
    formatters::{Config, DefaultFormatter, LogFormatter},
    level::Level,
    Record,
};

const MIB: u64 = 1 << 20;

pub const DEFAULT_FILE_NAME: &str = "log/log.log";
pub const DEFAULT_MAX_SIZE_MB: u64 = 30;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitPolicy {
    #[default]
    Size,
    Daily,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub level: Level,
    pub filename: PathBuf,
    /// Size limit of one segment, in MiB.
    pub maxsize: u64,
    pub split: SplitPolicy,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            level: Level::Trace,
            filename: PathBuf::from(DEFAULT_FILE_NAME),
            maxsize: DEFAULT_MAX_SIZE_MB,
            split: SplitPolicy::Size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Suffix {
    None,
    Sequence(u64),
    Stamp(String),
}

impl Suffix {
    fn apply(&self, base: &Path) -> PathBuf {
        let suffix = match self {
            Suffix::None => return base.to_path_buf(),
            Suffix::Sequence(n) => n.to_string(),
            Suffix::Stamp(stamp) => stamp.clone(),
        };

        let mut path = OsString::from(base.as_os_str());
        path.push(".");
        path.push(suffix);
        PathBuf::from(path)
    }
}

#[derive(Debug)]
struct RotationState {
    suffix: Suffix,
    /// Calendar day of the last (re)open, used by the daily policy.
    day: NaiveDate,
}

/// Appends records to a file that is rotated by size or by calendar day.
///
/// The active handle sits behind a `RwLock`: writers share it, rotation and
/// `destroy` take it exclusively. Rotation bookkeeping has its own mutex and
/// is always locked before the handle.
pub struct FileEngine {
    config: FileConfig,
    handle: RwLock<Option<File>>,
    /// Bytes in the active segment. Seeded from its metadata on open, then
    /// advanced by every append made under the handle lock.
    size: AtomicU64,
    state: Mutex<RotationState>,
    formatter: Box<dyn LogFormatter>,
    clock: Arc<dyn Clock>,
}

impl FileEngine {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        let day = clock.now().date_naive();

        Self {
            config: FileConfig::default(),
            handle: RwLock::new(None),
            size: AtomicU64::new(0),
            state: Mutex::new(RotationState {
                suffix: Suffix::None,
                day,
            }),
            formatter: Box::new(DefaultFormatter::new(Config::new())),
            clock,
        }
    }

    pub fn config(&self) -> &FileConfig {
        &self.config
    }

    /// Path of the segment currently appended to.
    pub fn active_path(&self) -> PathBuf {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.suffix.apply(&self.config.filename)
    }

    fn max_size_bytes(&self) -> u64 {
        self.config.maxsize.saturating_mul(MIB)
    }

    fn ensure_open(&self) -> eyre::Result<()> {
        let handle = self.handle.read().map_err(|e| eyre::eyre!(e.to_string()))?;
        if handle.is_none() {
            bail!("file engine for {} is not open", self.config.filename.display());
        }

        Ok(())
    }

    /// Runs the configured rotation check and swaps in a new segment when it
    /// fires. Returns whether a rotation happened.
    ///
    /// When the new segment can't be opened the current one stays active and
    /// the error is returned.
    pub fn rotate_if_needed(&self) -> eyre::Result<bool> {
        self.ensure_open()?;

        let mut state = self.state.lock().map_err(|e| eyre::eyre!(e.to_string()))?;
        let now = self.clock.now();

        let next = match self.config.split {
            SplitPolicy::Size => self.next_size_suffix(&state)?,
            SplitPolicy::Daily => Self::next_daily_suffix(&state, &now),
        };

        let Some(suffix) = next else {
            return Ok(false);
        };

        let path = suffix.apply(&self.config.filename);
        let file = open_append(&path)?;
        let len = segment_len(&file, &path)?;

        {
            let mut handle = self.handle.write().map_err(|e| eyre::eyre!(e.to_string()))?;
            if handle.is_none() {
                bail!("file engine for {} is not open", self.config.filename.display());
            }
            *handle = Some(file);
            self.size.store(len, Ordering::Release);
        }

        state.suffix = suffix;
        state.day = now.date_naive();

        tracing::debug!(target: "fanlog", "rotated log file to {}", path.display());

        Ok(true)
    }

    fn next_size_suffix(&self, state: &RotationState) -> eyre::Result<Option<Suffix>> {
        let limit = self.max_size_bytes();

        if self.size.load(Ordering::Acquire) < limit {
            return Ok(None);
        }

        let mut sequence = match state.suffix {
            Suffix::Sequence(n) => n + 1,
            _ => 2,
        };

        // Segments left behind by an earlier run may already be full.
        while let Ok(md) = fs::metadata(Suffix::Sequence(sequence).apply(&self.config.filename)) {
            if md.is_dir() || md.len() < limit {
                break;
            }
            sequence += 1;
        }

        Ok(Some(Suffix::Sequence(sequence)))
    }

    fn next_daily_suffix(state: &RotationState, now: &DateTime<Local>) -> Option<Suffix> {
        if state.day < now.date_naive() {
            Some(Suffix::Stamp(rfc3339_stamp(now)))
        } else {
            None
        }
    }
}

impl Default for FileEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine for FileEngine {
    fn init(&mut self, config: &str) -> eyre::Result<()> {
        let mut config: FileConfig = parse_config(config)?;

        if config.filename.as_os_str().is_empty() {
            config.filename = PathBuf::from(DEFAULT_FILE_NAME);
        }
        if config.maxsize == 0 {
            bail!("maxsize must be at least 1 (MiB)");
        }

        let file = open_append(&config.filename)?;
        *self.size.get_mut() = segment_len(&file, &config.filename)?;
        self.config = config;

        *self.handle.get_mut().unwrap_or_else(|e| e.into_inner()) = Some(file);
        *self.state.get_mut().unwrap_or_else(|e| e.into_inner()) = RotationState {
            suffix: Suffix::None,
            day: self.clock.now().date_naive(),
        };

        if let Err(err) = self.rotate_if_needed() {
            tracing::warn!(
                target: "fanlog",
                "startup rotation of {} failed, appending to it anyway: {:#}",
                self.config.filename.display(),
                err
            );
        }

        Ok(())
    }

    fn write(&self, record: &Record) -> eyre::Result<()> {
        if record.level() < self.config.level {
            return Ok(());
        }

        self.ensure_open()?;

        if let Err(err) = self.rotate_if_needed() {
            tracing::warn!(
                target: "fanlog",
                "rotation failed, keeping {}: {:#}",
                self.active_path().display(),
                err
            );
        }

        let mut line = self.formatter.format(record, &self.clock.now());
        line.push('\n');

        let appended = {
            let handle = self.handle.read().map_err(|e| eyre::eyre!(e.to_string()))?;
            let Some(file) = handle.as_ref() else {
                bail!("file engine for {} is not open", self.config.filename.display());
            };

            let mut file: &File = file;
            let appended = file.write_all(line.as_bytes());
            if appended.is_ok() {
                self.size.fetch_add(line.len() as u64, Ordering::AcqRel);
            }
            appended
        };

        appended.with_context(|| format!("Failed appending to {}", self.active_path().display()))
    }

    fn flush(&self) -> eyre::Result<()> {
        let handle = self.handle.read().map_err(|e| eyre::eyre!(e.to_string()))?;
        match handle.as_ref() {
            Some(file) => file.sync_all().context("Can't sync log file"),
            None => bail!("file engine for {} is not open", self.config.filename.display()),
        }
    }

    fn destroy(&self) {
        let mut handle = self.handle.write().unwrap_or_else(|e| e.into_inner());
        if handle.take().is_some() {
            tracing::debug!(target: "fanlog", "closed log file {}", self.config.filename.display());
        }
    }
}

fn segment_len(file: &File, path: &Path) -> eyre::Result<u64> {
    let metadata = file
        .metadata()
        .with_context(|| format!("Failed reading size of {}", path.display()))?;

    Ok(metadata.len())
}

fn open_append(path: &Path) -> eyre::Result<File> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() && !dir.exists() {
            fs::create_dir_all(dir)
                .with_context(|| format!("Failed creating log directory {}", dir.display()))?;
        }
    }

    let mut options = OpenOptions::new();
    options.create(true).append(true);

    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o660);
    }

    options
        .open(path)
        .with_context(|| format!("Failed opening or creating log file {}", path.display()))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    use super::*;
    use crate::clock::ManualClock;

    fn clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Local.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        ))
    }

    fn config_for(path: &Path, extra: &str) -> String {
        format!(r#"{{"filename": {:?}{}}}"#, path.to_str().unwrap(), extra)
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = FileConfig::default();

        assert_eq!(config.level, Level::Trace);
        assert_eq!(config.filename, PathBuf::from("log/log.log"));
        assert_eq!(config.maxsize, 30);
        assert_eq!(config.split, SplitPolicy::Size);
    }

    #[test]
    fn suffixes_append_to_the_base_name() {
        let base = Path::new("logs/app.log");

        assert_eq!(Suffix::None.apply(base), PathBuf::from("logs/app.log"));
        assert_eq!(Suffix::Sequence(2).apply(base), PathBuf::from("logs/app.log.2"));
        assert_eq!(
            Suffix::Stamp("2024-03-02T00:00:00+00:00".into()).apply(base),
            PathBuf::from("logs/app.log.2024-03-02T00:00:00+00:00")
        );
    }

    #[test]
    fn init_creates_missing_directories() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/app.log");

        let mut engine = FileEngine::with_clock(clock());
        engine.init(&config_for(&path, "")).unwrap();
        engine.write(&Record::new(Level::Info, "[I] hello")).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "2024/03/01 09:00:00 [I] hello\n");
    }

    #[test]
    fn own_threshold_filters_records() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");

        let mut engine = FileEngine::with_clock(clock());
        engine.init(&config_for(&path, r#", "level": "warn""#)).unwrap();
        assert_eq!(engine.config().level, Level::Warning);
        engine.write(&Record::new(Level::Info, "[I] skipped")).unwrap();
        engine.write(&Record::new(Level::Error, "[E] kept")).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("[E] kept"));
    }

    #[test]
    fn rejects_zero_size_and_unknown_split() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");

        let mut engine = FileEngine::with_clock(clock());
        assert!(engine.init(&config_for(&path, r#", "maxsize": 0"#)).is_err());
        assert!(engine.init(&config_for(&path, r#", "split": "hourly""#)).is_err());
    }

    #[test]
    fn rotates_on_startup_when_reopening_a_full_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, vec![b'x'; MIB as usize]).unwrap();

        let mut engine = FileEngine::with_clock(clock());
        engine.init(&config_for(&path, r#", "maxsize": 1"#)).unwrap();

        assert_eq!(engine.active_path(), dir.path().join("app.log.2"));
    }

    #[test]
    fn skips_segments_that_are_already_full() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, vec![b'x'; MIB as usize]).unwrap();
        fs::write(dir.path().join("app.log.2"), vec![b'x'; MIB as usize]).unwrap();

        let mut engine = FileEngine::with_clock(clock());
        engine.init(&config_for(&path, r#", "maxsize": 1"#)).unwrap();

        assert_eq!(engine.active_path(), dir.path().join("app.log.3"));
    }

    #[test]
    fn daily_policy_rotates_once_per_new_day() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        let clock = clock();

        let mut engine = FileEngine::with_clock(clock.clone());
        engine.init(&config_for(&path, r#", "split": "daily""#)).unwrap();
        assert!(!engine.rotate_if_needed().unwrap());

        clock.advance(Duration::hours(2));
        assert!(!engine.rotate_if_needed().unwrap());

        clock.advance(Duration::days(1));
        assert!(engine.rotate_if_needed().unwrap());
        assert!(!engine.rotate_if_needed().unwrap());

        let expected = Suffix::Stamp(rfc3339_stamp(&clock.now())).apply(&path);
        assert_eq!(engine.active_path(), expected);
    }

    #[test]
    fn failed_rotation_keeps_the_current_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::create_dir(dir.path().join("app.log.2")).unwrap();
        fs::write(&path, vec![b'x'; MIB as usize]).unwrap();

        let mut engine = FileEngine::with_clock(clock());
        engine.init(&config_for(&path, r#", "maxsize": 1"#)).unwrap();
        assert_eq!(engine.active_path(), path);

        assert!(engine.rotate_if_needed().is_err());
        assert_eq!(engine.active_path(), path);

        engine.write(&Record::new(Level::Info, "[I] still here")).unwrap();
        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.ends_with("[I] still here\n"));
    }

    #[test]
    fn size_check_counts_appended_bytes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, vec![b'x'; MIB as usize - 10]).unwrap();

        let mut engine = FileEngine::with_clock(clock());
        engine.init(&config_for(&path, r#", "maxsize": 1"#)).unwrap();
        assert!(!engine.rotate_if_needed().unwrap());

        engine.write(&Record::new(Level::Info, "[I] tips it over")).unwrap();
        assert!(engine.rotate_if_needed().unwrap());
        assert_eq!(engine.active_path(), dir.path().join("app.log.2"));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn append_errors_name_the_active_segment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");
        fs::write(&path, vec![b'x'; MIB as usize]).unwrap();
        std::os::unix::fs::symlink("/dev/full", dir.path().join("app.log.2")).unwrap();

        let mut engine = FileEngine::with_clock(clock());
        engine.init(&config_for(&path, r#", "maxsize": 1"#)).unwrap();
        let err = engine.write(&Record::new(Level::Info, "[I] no space")).unwrap_err();

        assert_eq!(engine.active_path(), dir.path().join("app.log.2"));
        assert!(err.to_string().ends_with("app.log.2"));
    }

    #[test]
    fn writes_after_destroy_fail_cleanly() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");

        let mut engine = FileEngine::with_clock(clock());
        engine.init(&config_for(&path, "")).unwrap();
        engine.flush().unwrap();
        engine.destroy();

        assert!(engine.write(&Record::new(Level::Info, "[I] late")).is_err());
        assert!(engine.flush().is_err());
        assert!(engine.rotate_if_needed().is_err());
        engine.destroy();
    }

    #[test]
    fn concurrent_writers_do_not_interleave_lines() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("app.log");

        let mut engine = FileEngine::with_clock(clock());
        engine.init(&config_for(&path, "")).unwrap();
        let engine = Arc::new(engine);

        let workers: Vec<_> = (0..4)
            .map(|worker| {
                let engine = engine.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let text = format!("[I] worker {} line {}", worker, i);
                        engine.write(&Record::new(Level::Info, text)).unwrap();
                    }
                })
            })
            .collect();

        for worker in workers {
            worker.join().unwrap();
        }

        let contents = fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 400);
        assert!(contents
            .lines()
            .all(|line| line.starts_with("2024/03/01 09:00:00 [I] worker ")));
    }
}
