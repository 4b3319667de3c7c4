//! Leveled logging façade that fans each record out to a set of named,
//! independently configured engines (console, rotating file, ...).
//!
//! Engines implement [`engines::Engine`] and are looked up by name in a
//! [`Registry`]. A [`Logger`] holds the active engines, the level threshold
//! and a bounded queue through which every record passes.

pub mod call_site;
pub mod clock;
pub mod config;
pub mod engines;
pub mod error;
pub mod formatters;
pub mod level;
pub mod logger;
mod macros;
pub mod registry;

pub use error::LogError;
pub use level::{Level, Record};
pub use logger::Logger;
pub use registry::Registry;
