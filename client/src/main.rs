use clap::Parser;
use client::bot::{run_bot, BotConfig};
use log::{info, warn};
use tokio::sync::watch;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:8080")]
    server: String,

    /// Number of bots to run
    #[arg(short = 'n', long, default_value = "1")]
    bots: usize,

    /// Shortest time in seconds a bot waits for its move to finish
    #[arg(long, default_value = "1.5")]
    min_travel: f32,

    /// Longest time in seconds a bot waits for its move to finish
    #[arg(long, default_value = "4.5")]
    max_travel: f32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let min_travel = args.min_travel.max(0.0);
    let max_travel = if args.max_travel > min_travel {
        args.max_travel
    } else {
        warn!("--max-travel must exceed --min-travel, using {}", min_travel + 1.0);
        min_travel + 1.0
    };

    let config = BotConfig {
        server: args.server,
        travel_secs: min_travel..max_travel,
        ..BotConfig::default()
    };

    info!("Starting {} bots against {}", args.bots, config.server);
    info!("Press Ctrl+C to stop");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let bots: Vec<_> = (1..=args.bots)
        .map(|bot_id| tokio::spawn(run_bot(bot_id, config.clone(), shutdown_rx.clone())))
        .collect();

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, stopping bots...");
    shutdown_tx.send_replace(true);

    for bot in bots {
        if let Err(e) = bot.await {
            warn!("Bot task failed: {}", e);
        }
    }

    Ok(())
}
