use std::{
    collections::BTreeMap,
    fmt::{self, Display},
    panic::{self, AssertUnwindSafe, Location},
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        mpsc::{self, Receiver, SyncSender},
        Arc, Mutex, PoisonError, RwLock,
    },
};

use crate::{
    call_site::CallSite,
    engines::Engine,
    error::{LogError, Result},
    formatters::compose_message,
    level::Level,
    registry::Registry,
    Record,
};

pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;

type EngineMap = BTreeMap<String, Arc<dyn Engine>>;

#[derive(Debug, Clone, Copy)]
struct Settings {
    threshold: Level,
    call_site: bool,
    skip_frames: usize,
}

/// Fans every accepted record out to all active engines.
///
/// Records pass through a bounded queue. A log call enqueues its record,
/// blocking while the queue is full, then dequeues and delivers the oldest
/// record while holding the receiving end, so engines observe records in
/// queue admission order.
///
/// ```no_run
/// let logger = fanlog::Logger::new(1000);
/// logger
///     .set_level("warn")
///     .activate_engine("file", r#"{"filename": "logs/app.log", "maxsize": 10}"#)
///     .expect("file engine");
///
/// logger.info("not delivered");
/// fanlog::log_warn!(logger, "disk at {}%", 93);
/// logger.close();
/// ```
pub struct Logger {
    settings: RwLock<Settings>,
    engines: RwLock<EngineMap>,
    registry: Arc<Registry>,
    sender: SyncSender<Record>,
    receiver: Mutex<Receiver<Record>>,
    closed: AtomicBool,
    write_errors: AtomicU64,
}

impl Logger {
    /// Creates a logger backed by the built-in engines with the `console`
    /// engine already active.
    pub fn new(queue_capacity: usize) -> Self {
        Self::with_registry(queue_capacity, Arc::new(Registry::with_builtin_engines()))
    }

    /// Creates a logger resolving engine names through `registry`. A
    /// `console` engine is activated with an empty config when the registry
    /// provides one. A capacity of zero is raised to one.
    pub fn with_registry(queue_capacity: usize, registry: Arc<Registry>) -> Self {
        let (sender, receiver) = mpsc::sync_channel(queue_capacity.max(1));

        let logger = Self {
            settings: RwLock::new(Settings {
                threshold: Level::Trace,
                call_site: false,
                skip_frames: 0,
            }),
            engines: RwLock::new(BTreeMap::new()),
            registry,
            sender,
            receiver: Mutex::new(receiver),
            closed: AtomicBool::new(false),
            write_errors: AtomicU64::new(0),
        };

        if logger.registry.contains("console") {
            if let Err(err) = logger.activate_engine("console", "") {
                tracing::warn!(target: "fanlog", "default console engine unavailable: {}", err);
            }
        }

        logger
    }

    /// Sets the threshold from a level token. See [`Level::from_token`] for
    /// the accepted spellings; anything else selects [`Level::Trace`].
    pub fn set_level(&self, token: &str) -> &Self {
        self.set_threshold(Level::from_token(token))
    }

    pub fn set_threshold(&self, level: Level) -> &Self {
        self.settings_mut().threshold = level;
        self
    }

    pub fn level(&self) -> Level {
        self.settings().threshold
    }

    /// Prefixes every record with `[file:line]` of the log call.
    pub fn set_call_site_tracking(&self, enabled: bool) -> &Self {
        self.settings_mut().call_site = enabled;
        self
    }

    /// Number of frames to skip above the log call when resolving the call
    /// site. Unresolvable frames render as `[???:0]`.
    pub fn set_call_site_skip_frames(&self, frames: usize) -> &Self {
        self.settings_mut().skip_frames = frames;
        self
    }

    /// Builds the engine registered as `name`, initializes it with `config`
    /// and makes it active under that name.
    ///
    /// On failure the set of active engines is left untouched. An engine that
    /// was already active under `name` is replaced without being destroyed;
    /// call [`Logger::deactivate_engine`] first to release it.
    pub fn activate_engine(&self, name: &str, config: &str) -> Result<&Self> {
        if self.is_closed() {
            return Err(LogError::Closed);
        }

        let engine = self.build_engine(name, config).inspect_err(|err| {
            tracing::warn!(target: "fanlog", "activating engine {} failed: {}", name, err);
        })?;

        let mut engines = self.engines_mut();
        if self.is_closed() {
            engine.destroy();
            return Err(LogError::Closed);
        }
        engines.insert(name.to_string(), engine);
        drop(engines);

        tracing::debug!(target: "fanlog", "engine {} activated", name);

        Ok(self)
    }

    fn build_engine(&self, name: &str, config: &str) -> Result<Arc<dyn Engine>> {
        let factory = self
            .registry
            .lookup(name)
            .ok_or_else(|| LogError::UnknownEngine(name.to_string()))?;

        let mut engine = factory();
        engine.init(config).map_err(|reason| LogError::EngineInit {
            name: name.to_string(),
            reason,
        })?;

        Ok(Arc::from(engine))
    }

    /// Destroys the engine active under `name` and removes it.
    pub fn deactivate_engine(&self, name: &str) -> Result<()> {
        let removed = self.engines_mut().remove(name);

        match removed {
            Some(engine) => {
                engine.destroy();
                tracing::debug!(target: "fanlog", "engine {} deactivated", name);
                Ok(())
            }
            None => Err(LogError::EngineNotActive(name.to_string())),
        }
    }

    /// Names of the active engines, sorted.
    pub fn engine_names(&self) -> Vec<String> {
        self.engines().keys().cloned().collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Number of engine writes that failed since the logger was created.
    pub fn write_errors(&self) -> u64 {
        self.write_errors.load(Ordering::Relaxed)
    }

    #[track_caller]
    pub fn log(&self, level: Level, msg: impl Display) {
        self.emit(level, Location::caller(), format_args!("{}", msg));
    }

    #[track_caller]
    pub fn log_fmt(&self, level: Level, args: fmt::Arguments<'_>) {
        self.emit(level, Location::caller(), args);
    }

    #[track_caller]
    pub fn trace(&self, msg: impl Display) {
        self.emit(Level::Trace, Location::caller(), format_args!("{}", msg));
    }

    #[track_caller]
    pub fn trace_fmt(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Trace, Location::caller(), args);
    }

    #[track_caller]
    pub fn info(&self, msg: impl Display) {
        self.emit(Level::Info, Location::caller(), format_args!("{}", msg));
    }

    #[track_caller]
    pub fn info_fmt(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Info, Location::caller(), args);
    }

    #[track_caller]
    pub fn warn(&self, msg: impl Display) {
        self.emit(Level::Warning, Location::caller(), format_args!("{}", msg));
    }

    #[track_caller]
    pub fn warn_fmt(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Warning, Location::caller(), args);
    }

    #[track_caller]
    pub fn error(&self, msg: impl Display) {
        self.emit(Level::Error, Location::caller(), format_args!("{}", msg));
    }

    #[track_caller]
    pub fn error_fmt(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Error, Location::caller(), args);
    }

    /// Logs at [`Level::Fatal`]. This does not terminate the process.
    #[track_caller]
    pub fn fatal(&self, msg: impl Display) {
        self.emit(Level::Fatal, Location::caller(), format_args!("{}", msg));
    }

    #[track_caller]
    pub fn fatal_fmt(&self, args: fmt::Arguments<'_>) {
        self.emit(Level::Fatal, Location::caller(), args);
    }

    fn emit(&self, level: Level, location: &Location<'_>, args: fmt::Arguments<'_>) {
        if self.is_closed() {
            return;
        }

        let settings = self.settings();
        if level < settings.threshold {
            return;
        }

        let call_site = settings
            .call_site
            .then(|| CallSite::resolve(location, settings.skip_frames));
        let text = compose_message(level, call_site.as_ref(), &args.to_string());

        if self.sender.send(Record::new(level, text)).is_err() {
            return;
        }

        self.deliver_next();
    }

    fn deliver_next(&self) {
        let receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);

        // `close` may have drained the queue already.
        if let Ok(record) = receiver.try_recv() {
            let engines = self.engines();
            self.fan_out(&engines, &record);
        }
    }

    fn fan_out(&self, engines: &EngineMap, record: &Record) {
        for (name, engine) in engines {
            let result = panic::catch_unwind(AssertUnwindSafe(|| engine.write(record)));

            let err = match result {
                Ok(Ok(())) => continue,
                Ok(Err(err)) => format!("{:#}", err),
                Err(_) => "engine panicked".to_string(),
            };

            self.write_errors.fetch_add(1, Ordering::Relaxed);
            eprintln!("fanlog: unable to write to engine {}: {}", name, err);
            tracing::warn!(target: "fanlog", "unable to write to engine {}: {}", name, err);
        }
    }

    /// Flushes every active engine without closing it.
    pub fn flush(&self) {
        for (name, engine) in self.engines().iter() {
            if let Err(err) = engine.flush() {
                tracing::warn!(target: "fanlog", "flushing engine {} failed: {:#}", name, err);
            }
        }
    }

    /// Delivers every queued record, then flushes and destroys all engines.
    ///
    /// Afterwards log calls are ignored and [`Logger::activate_engine`]
    /// returns [`LogError::Closed`]. Calling `close` again does nothing.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }

        let receiver = self.receiver.lock().unwrap_or_else(PoisonError::into_inner);
        let engines = std::mem::take(&mut *self.engines_mut());

        while let Ok(record) = receiver.try_recv() {
            self.fan_out(&engines, &record);
        }

        for (name, engine) in engines {
            if let Err(err) = engine.flush() {
                tracing::warn!(target: "fanlog", "flushing engine {} failed: {:#}", name, err);
            }
            engine.destroy();
        }

        tracing::debug!(target: "fanlog", "logger closed");
    }

    fn settings(&self) -> Settings {
        *self.settings.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn settings_mut(&self) -> std::sync::RwLockWriteGuard<'_, Settings> {
        self.settings.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn engines(&self) -> std::sync::RwLockReadGuard<'_, EngineMap> {
        self.engines.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn engines_mut(&self) -> std::sync::RwLockWriteGuard<'_, EngineMap> {
        self.engines.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        self.close();
    }
}
