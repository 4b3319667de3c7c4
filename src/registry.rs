use std::collections::BTreeMap;

use crate::{
    engines::{ConsoleEngine, Engine, FileEngine},
    error::{LogError, Result},
};

/// Zero-argument engine constructor.
pub type EngineFactory = Box<dyn Fn() -> Box<dyn Engine> + Send + Sync>;

/// Maps engine names to their constructors.
///
/// Built once during start-up and handed to every [`crate::Logger`] that
/// needs it. There is no removal operation.
#[derive(Default)]
pub struct Registry {
    factories: BTreeMap<String, EngineFactory>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding the engines shipped with this crate, `console` and
    /// `file`.
    pub fn with_builtin_engines() -> Self {
        let mut registry = Self::new();
        registry.register("console", || Box::new(ConsoleEngine::new()));
        registry.register("file", || Box::new(FileEngine::new()));
        registry
    }

    /// Registers `factory` under `name`.
    ///
    /// # Panics
    ///
    /// Registering the same name twice is a wiring bug and panics. Use
    /// [`Registry::try_register`] to handle it instead.
    pub fn register<F>(&mut self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> Box<dyn Engine> + Send + Sync + 'static,
    {
        if let Err(err) = self.try_register(name, factory) {
            panic!("fanlog: {}", err);
        }
    }

    pub fn try_register<F>(&mut self, name: impl Into<String>, factory: F) -> Result<()>
    where
        F: Fn() -> Box<dyn Engine> + Send + Sync + 'static,
    {
        let name = name.into();
        if self.factories.contains_key(&name) {
            return Err(LogError::DuplicateEngine(name));
        }

        self.factories.insert(name, Box::new(factory));
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Option<&EngineFactory> {
        self.factories.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}
