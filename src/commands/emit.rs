use clap::Args;

use fanlog::Logger;

use super::parse_severity;

#[derive(Args, Debug)]
pub struct Cmd {
    #[arg(
        short,
        long,
        default_value = "info",
        help = "Severity of the message (trace, info, warn, error, fatal)."
    )]
    pub severity: String,

    #[arg(required = true, num_args = 1.., help = "Message to log. Words are joined by spaces.")]
    pub message: Vec<String>,
}

impl Cmd {
    pub fn run(&self, logger: &Logger) -> eyre::Result<()> {
        logger.log(parse_severity(&self.severity), self.message.join(" "));
        Ok(())
    }
}
