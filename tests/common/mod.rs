#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use fanlog::{engines::Engine, Level, Logger, Record, Registry};

/// Everything a [`RecordingEngine`] saw, shared with the test body.
#[derive(Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<String>>>,
    records: Arc<Mutex<Vec<Record>>>,
}

impl Journal {
    pub fn records(&self) -> Vec<Record> {
        self.records.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.records().iter().map(|r| r.text().to_string()).collect()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    fn event(&self, event: impl Into<String>) {
        self.events.lock().unwrap().push(event.into());
    }
}

/// In-memory engine. A config of `"fail-init"` makes `init` fail and
/// `"fail-write"` makes every write fail.
pub struct RecordingEngine {
    name: String,
    journal: Journal,
    fail_writes: bool,
}

impl Engine for RecordingEngine {
    fn init(&mut self, config: &str) -> eyre::Result<()> {
        match config {
            "fail-init" => Err(eyre::eyre!("refusing config")),
            "fail-write" => {
                self.fail_writes = true;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn write(&self, record: &Record) -> eyre::Result<()> {
        if self.fail_writes {
            return Err(eyre::eyre!("disk full"));
        }

        self.journal.records.lock().unwrap().push(record.clone());
        Ok(())
    }

    fn flush(&self) -> eyre::Result<()> {
        self.journal.event(format!("flush {}", self.name));
        Ok(())
    }

    fn destroy(&self) {
        self.journal.event(format!("destroy {}", self.name));
    }
}

/// A registry whose `console`, `memory` and `broken` engines all record into
/// their own journal.
pub struct Harness {
    pub console: Journal,
    pub memory: Journal,
    pub broken: Journal,
    pub registry: Arc<Registry>,
}

impl Harness {
    pub fn new() -> Self {
        let console = Journal::default();
        let memory = Journal::default();
        let broken = Journal::default();

        let mut registry = Registry::new();
        for (name, journal) in [
            ("console", &console),
            ("memory", &memory),
            ("broken", &broken),
        ] {
            let journal = journal.clone();
            registry.register(name, move || {
                Box::new(RecordingEngine {
                    name: name.to_string(),
                    journal: journal.clone(),
                    fail_writes: false,
                })
            });
        }

        Self {
            console,
            memory,
            broken,
            registry: Arc::new(registry),
        }
    }

    pub fn logger(&self, capacity: usize) -> Logger {
        Logger::with_registry(capacity, self.registry.clone())
    }
}

pub fn levels(journal: &Journal) -> Vec<Level> {
    journal.records().iter().map(Record::level).collect()
}
