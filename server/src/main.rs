use clap::Parser;
use log::info;
use server::network::{Server, ServerConfig};
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Server IP address to bind to
    #[arg(short = 'H', long, default_value = "127.0.0.1")]
    host: String,

    /// Server port to listen on
    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Simulation tick period in milliseconds
    #[arg(short, long, default_value = "16")]
    tick_ms: u64,

    /// First user id to assign
    #[arg(long, default_value = "1000")]
    first_user_id: u16,

    /// Movement speed used when a client sends none
    #[arg(long, default_value = "100.0")]
    default_speed: f32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = ServerConfig {
        tick_interval: Duration::from_millis(args.tick_ms.max(1)),
        first_user_id: args.first_user_id,
        default_speed: args.default_speed,
    };

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::new(&address, config).await?;
    let handle = server.handle();

    info!("Starting server on {}", server.local_addr()?);
    info!("Press Ctrl+C to stop");

    let server_task = tokio::spawn(server.run());

    tokio::select! {
        result = server_task => {
            result??;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down...");
            handle.stop();
        }
    }

    Ok(())
}
