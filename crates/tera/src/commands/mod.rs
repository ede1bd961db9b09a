pub mod dc;

#[derive(clap::Subcommand)]
pub enum Commands {
    /// Handle DataCenter containers
    Dc {
        #[command(subcommand)]
        command: dc::DcCommands,
    },
}

impl Commands {
    pub fn handle(&self) -> miette::Result<()> {
        match self {
            Commands::Dc { command } => command.handle(),
        }
    }
}
