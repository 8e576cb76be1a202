mod cli;
mod commands;
mod config;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;

use cli::{ClientCommands, Cli, Commands, ConfigCommands, KeysCommands};
use output::print_error;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        print_error(&format!("{e:#}"));
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();
    observability::init_tracing(&cli.log_level);
    let format = cli.format.unwrap_or_default();

    match &cli.command {
        Commands::Config(args) => match &args.command {
            ConfigCommands::Check => {
                let path = cli
                    .config
                    .as_deref()
                    .ok_or_else(|| anyhow::anyhow!("--config or TOKENWRIGHT_CONFIG is required"))?;
                commands::config::check(path, format)?;
            }
        },
        Commands::Keys(args) => match &args.command {
            KeysCommands::Generate(gen_args) => commands::keys::generate(gen_args, format)?,
        },
        Commands::Client(args) => match &args.command {
            ClientCommands::HashSecret(hash_args) => {
                commands::client::hash_secret(hash_args, format)?;
            }
        },
        Commands::Demo(args) => {
            commands::demo::run(cli.config.as_deref(), args, format).await?;
        }
    }

    Ok(())
}
