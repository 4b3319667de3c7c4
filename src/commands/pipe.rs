use std::io::BufRead;

use clap::Args;
use eyre::Context;

use fanlog::Logger;

use super::parse_severity;

#[derive(Args, Debug)]
pub struct Cmd {
    #[arg(
        short,
        long,
        default_value = "info",
        help = "Severity applied to every line read from stdin."
    )]
    pub severity: String,

    #[arg(long, help = "Skip blank lines.")]
    pub skip_empty: bool,
}

impl Cmd {
    pub fn run(&self, logger: &Logger) -> eyre::Result<()> {
        let level = parse_severity(&self.severity);
        let stdin = std::io::stdin();

        let mut count = 0_u64;
        for line in stdin.lock().lines() {
            let line = line.context("Failed reading from stdin")?;
            if self.skip_empty && line.trim().is_empty() {
                continue;
            }

            logger.log(level, line);
            count += 1;
        }

        tracing::info!(target: "fanlog", "piped {} lines at {}", count, level);
        Ok(())
    }
}
