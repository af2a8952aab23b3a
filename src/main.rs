//! Logweave CLI entry point.

use clap::Parser;

use logweave::cli::{Cli, Commands};
use logweave::ConfigLoader;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::ShowSettings => logweave::cli::commands::settings::execute(cli.json),
        Commands::Demo(args) => {
            let env = cli.env.unwrap_or_else(|| {
                ConfigLoader::load_settings()
                    .unwrap_or_default()
                    .environment
            });
            logweave::cli::commands::demo::execute(args, cli.config.as_deref(), &env, cli.json)
                .await
        }
    };

    if let Err(err) = result {
        logweave::cli::handle_error(err, cli.json);
    }
}
