use clap::Parser;

mod commands;
mod renderer;

use commands::Commands;

#[derive(Parser)]
#[command(name = "recap")]
#[command(about = "Cached analysis reports for live and archived recordings", long_about = None)]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    recap_utils::logging::init(cli.verbose)
        .map_err(|e| eyre::eyre!("failed to initialize logging: {e}"))?;

    match cli.command {
        // The worker reports through its exit code, not through eyre
        Commands::Worker { args } => {
            let status = commands::worker::execute(args).await;
            std::process::exit(status.code());
        }
        command => {
            color_eyre::install()?;
            recap_utils::init_cleanup_handler();
            command.execute().await?;
            Ok(())
        }
    }
}
