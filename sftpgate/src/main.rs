mod commands;
mod config;
mod logging;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use logging::init_logging;

#[derive(clap::Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
pub(crate) struct Cli {
    #[clap(subcommand)]
    command: Commands,

    #[clap(long, short)]
    config: PathBuf,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run the HTTP to SFTP bridge
    Run,
    /// Validate config file
    Check,
    /// Test the connection to an SFTP server
    TestTarget {
        /// sftp://host[:port]/path to stat
        url: String,
        #[clap(long, short)]
        username: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging()?;

    let cli = Cli::parse();

    match &cli.command {
        Commands::Run => crate::commands::run::command(&cli).await,
        Commands::Check => crate::commands::check::command(&cli).await,
        Commands::TestTarget { url, username } => {
            crate::commands::test_target::command(&cli, url, username).await
        }
    }
}
