use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "pimsbot")]
#[command(author, version, about = "Telegram bot that pairs PIMS community members for meetings", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the bot in normal mode
    Run {
        /// Register the webhook URL instead of long polling
        #[arg(long)]
        webhook: bool,
    },
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
