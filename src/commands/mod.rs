use std::{fmt::Display, path::PathBuf};

use clap::{Parser, Subcommand};
use eyre::Context;
use tracing::level_filters::LevelFilter;

use fanlog::{
    config::{ConfigManager, LocalConfigManager, Settings},
    Level,
};

mod emit;
mod engines;
mod pipe;

#[derive(Subcommand, Debug)]
pub enum FanlogCmd {
    Emit(emit::Cmd),

    Pipe(pipe::Cmd),

    Engines(engines::Cmd),
}

impl Display for FanlogCmd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FanlogCmd::Emit(cmd) => write!(f, "emit {}", cmd.severity),
            FanlogCmd::Pipe(cmd) => write!(f, "pipe {}", cmd.severity),
            FanlogCmd::Engines(_cmd) => write!(f, "engines"),
        }
    }
}

#[derive(Parser)]
#[command(version, long_version = "")]
#[command(about = "Send log lines to the console, rotating files and other engines.", long_about = None, disable_help_subcommand = true)]
pub struct Fanlog {
    #[arg(
        global = true,
        long,
        help = "Settings file. Defaults to $XDG_CONFIG_HOME/fanlog/config.json when present.",
        display_order = 0
    )]
    pub config: Option<PathBuf>,

    #[arg(
        global = true,
        long,
        help = "Threshold level (trace, info, warn, error, fatal). Overrides the settings file.",
        display_order = 0
    )]
    pub level: Option<String>,

    #[arg(
        global = true,
        long = "engine",
        value_name = "NAME[=JSON]",
        help = "Activate an engine, optionally with its JSON config. Can be repeated.",
        display_order = 1
    )]
    pub engines: Vec<String>,

    #[arg(global = true, long, help = "Prefix records with [file:line].", display_order = 1)]
    pub call_site: bool,

    #[arg(global = true, long, help = "Don't write to the console.", display_order = 1)]
    pub no_console: bool,

    #[arg(
        long,
        short = 'v',
        action = clap::ArgAction::Count,
        global = true,
        help = "Write verbose diagnostics to stderr.",
        display_order = 999
    )]
    pub verbose: u8,

    #[command(subcommand)]
    pub cmd: FanlogCmd,
}

impl Fanlog {
    fn log_filter(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::OFF,
            1 => LevelFilter::ERROR,
            2 => LevelFilter::WARN,
            3 => LevelFilter::INFO,
            4 => LevelFilter::DEBUG,
            5_u8..=u8::MAX => LevelFilter::TRACE,
        }
    }

    fn setup_diagnostics(&self) {
        tracing_subscriber::fmt()
            .with_max_level(self.log_filter())
            .with_writer(std::io::stderr)
            .with_target(false)
            .init();
    }

    fn settings(&self) -> eyre::Result<Settings> {
        let mut settings = LocalConfigManager::new(self.config.clone()).load()?;

        if let Some(level) = &self.level {
            settings.level = level.clone();
        }
        if self.call_site {
            settings.call_site = true;
        }
        if self.no_console {
            settings.console = false;
        }

        for arg in &self.engines {
            let (name, config) = parse_engine_arg(arg)?;
            settings.engines.insert(name, config);
        }

        Ok(settings)
    }

    pub fn run(self) -> eyre::Result<()> {
        self.setup_diagnostics();

        tracing::info!(target: "fanlog", "running command {}", &self.cmd);
        tracing::trace!(target: "fanlog", "diagnostics level: {}", self.log_filter());

        if let FanlogCmd::Engines(cmd) = &self.cmd {
            return cmd.run();
        }

        let settings = self.settings()?;
        let logger = settings
            .build_logger()
            .context("Failed setting up the logger")?;

        let result = match &self.cmd {
            FanlogCmd::Emit(emit) => emit.run(&logger),
            FanlogCmd::Pipe(pipe) => pipe.run(&logger),
            FanlogCmd::Engines(_) => Ok(()),
        };

        logger.close();

        if let Err(msg) = &result {
            tracing::error!(target: "fanlog", "failed running command {}, error={} cause={}", &self.cmd, msg, msg.root_cause());
        }

        result
    }
}

/// Splits `name=json` into the engine name and its config document.
fn parse_engine_arg(arg: &str) -> eyre::Result<(String, serde_json::Value)> {
    let (name, config) = match arg.split_once('=') {
        Some((name, config)) => (name.trim(), config.trim()),
        None => (arg.trim(), ""),
    };

    if name.is_empty() {
        return Err(eyre::eyre!("Invalid engine {:?}, name can't be empty", arg));
    }

    let config = if config.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_str(config)
            .with_context(|| format!("Invalid JSON config for engine {}", name))?
    };

    Ok((name.to_string(), config))
}

pub(crate) fn parse_severity(token: &str) -> Level {
    Level::from_token(token)
}
