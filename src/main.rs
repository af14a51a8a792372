//! authsock-pin - SSH agent proxy with per-key sockets

use anyhow::Result;
use clap::Parser;

use authsock_pin::cli::{Cli, Commands};
use authsock_pin::logging;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Run(args) => {
            authsock_pin::cli::commands::run::execute(args, cli.config).await?
        }
        Commands::Config(args) => {
            authsock_pin::cli::commands::config::execute(args, cli.config).await?
        }
        Commands::Version => authsock_pin::cli::commands::version::print_version(cli.verbose),
    }

    Ok(())
}
