use clap::Parser;
use riskgate::cli::{Cli, Commands};
use riskgate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Warning: Could not load config from {}: {:#}", cli.config, e);
            eprintln!("Using default configuration");
            Config::parse(include_str!("../config.toml.example"))?
        }
    };

    // Held for the lifetime of the process
    let telemetry = riskgate::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Run(args) => {
            tracing::info!(ticks = %args.ticks.display(), "Starting replay");
            args.execute(&config).await?;
        }
        Commands::Serve(args) => {
            if let Some(addr) = telemetry.metrics_addr {
                tracing::info!(%addr, "Metrics available");
            }
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
