use clap::Args;

use fanlog::Registry;

#[derive(Args, Debug)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cmd {}

impl Cmd {
    pub fn run(&self) -> eyre::Result<()> {
        let registry = Registry::with_builtin_engines();

        for name in registry.names() {
            println!("{}", name);
        }

        Ok(())
    }
}
