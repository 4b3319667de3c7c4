mod console;
mod file;

pub use console::{ConsoleConfig, ConsoleEngine};
pub use file::{FileConfig, FileEngine, SplitPolicy};

use crate::Record;

/// A pluggable output backend.
///
/// `init` is called exactly once, before the engine is shared. `write` may be
/// called from several threads at once. `flush` and `destroy` run once at
/// shutdown; after `destroy`, `write` must return an error instead of
/// panicking.
pub trait Engine: Send + Sync {
    /// Configures the engine from an engine specific JSON document. An empty
    /// string selects the defaults.
    fn init(&mut self, config: &str) -> eyre::Result<()>;

    fn write(&self, record: &Record) -> eyre::Result<()>;

    fn flush(&self) -> eyre::Result<()>;

    fn destroy(&self);
}

/// Parses an engine config payload, treating a blank payload as `T::default()`.
pub(crate) fn parse_config<T>(config: &str) -> eyre::Result<T>
where
    T: serde::de::DeserializeOwned + Default,
{
    if config.trim().is_empty() {
        return Ok(T::default());
    }

    serde_json::from_str(config).map_err(|e| eyre::eyre!("malformed engine config: {}", e))
}
