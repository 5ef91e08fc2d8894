use anyhow::Context;
use clap::Parser;
use tickwire::cli::{Cli, Commands};
use tickwire::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // A missing file means defaults; a broken one is fatal
    let config = Config::resolve(&cli.config)
        .with_context(|| format!("Invalid configuration from {}", cli.config))?;

    // Initialize telemetry
    let _telemetry = tickwire::telemetry::init_telemetry(&config.telemetry)?;

    match cli.command {
        Commands::Gateway(args) => {
            tracing::info!("Starting gateway");
            args.execute(&config).await?;
        }
        Commands::OrderBook(args) => {
            tracing::info!("Starting order book");
            args.execute(&config).await?;
        }
        Commands::Strategy(args) => {
            tracing::info!("Starting strategy");
            args.execute(&config).await?;
        }
        Commands::OrderManager(args) => {
            tracing::info!("Starting order manager");
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Gateway: prices {} news {}",
                config.network.price_addr(),
                config.network.news_addr()
            );
            println!("  Orders: {}", config.network.order_addr());
            println!(
                "  Protocol: delimiter {:?}, max frame {} bytes",
                config.protocol.delimiter, config.protocol.max_frame_length
            );
            println!(
                "  Cache: dir {}, name {}, symbols {}",
                config.cache.region_dir.display(),
                config.cache.name.as_deref().unwrap_or("<generated>"),
                config.cache.symbols.join(",")
            );
            println!(
                "  Signal: MA {}/{}, thresholds {}/{}, qty {}",
                config.signal.short_window,
                config.signal.long_window,
                config.signal.bearish_threshold,
                config.signal.bullish_threshold,
                config.signal.order_qty
            );
            println!("  Link: backoff {} ms", config.link.backoff_ms);
        }
    }

    Ok(())
}
