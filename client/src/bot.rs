//! Load-generating bots.
//!
//! Each bot holds one connection, wanders between random points inside the
//! world bounds, and reconnects after a short pause whenever the connection
//! drops.

use crate::network::{Connection, MessageReader};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{MessageType, Vec2, WORLD_HEIGHT, WORLD_WIDTH};
use std::ops::Range;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

const RECONNECT_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct BotConfig {
    pub server: String,
    pub width: f32,
    pub height: f32,
    /// Seconds a bot waits for its character to arrive
    pub travel_secs: Range<f32>,
    /// Milliseconds a bot idles between moves
    pub rest_ms: Range<u64>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            server: "127.0.0.1:8080".to_string(),
            width: WORLD_WIDTH,
            height: WORLD_HEIGHT,
            travel_secs: 1.5..4.5,
            rest_ms: 1000..2001,
        }
    }
}

/// Picks a uniformly random point inside the world bounds.
pub fn random_point<R: Rng>(rng: &mut R, config: &BotConfig) -> Vec2 {
    Vec2::new(
        rng.gen_range(0.0..config.width.max(f32::EPSILON)),
        rng.gen_range(0.0..config.height.max(f32::EPSILON)),
    )
}

/// Sleeps for `duration` unless shutdown is requested first.
///
/// Returns false when interrupted by shutdown.
async fn pause(duration: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = sleep(duration) => {}
        _ = wait_for_stop(shutdown) => {}
    }
    !*shutdown.borrow()
}

async fn wait_for_stop(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            // Sender gone; nobody can ask us to stop any more.
            std::future::pending::<()>().await;
        }
    }
}

/// Logs everything the server sends until the connection closes.
async fn receive_loop(bot_id: usize, mut reader: MessageReader) {
    loop {
        match reader.recv().await {
            Ok(Some(message)) => match message.kind {
                MessageType::Move => debug!(
                    "Bot {}: user {} moving to ({:.1}, {:.1})",
                    bot_id, message.user_id, message.target.x, message.target.y
                ),
                other => debug!("Bot {}: received {:?}", bot_id, other),
            },
            Ok(None) => {
                info!("Bot {}: server closed the connection", bot_id);
                break;
            }
            Err(e) => {
                warn!("Bot {}: receive error: {}", bot_id, e);
                break;
            }
        }
    }
}

/// Runs one bot until shutdown is requested.
pub async fn run_bot(bot_id: usize, config: BotConfig, mut shutdown: watch::Receiver<bool>) {
    let mut rng = StdRng::from_entropy();
    let mut position = random_point(&mut rng, &config);

    while !*shutdown.borrow() {
        let mut connection = match Connection::connect(&config.server).await {
            Ok(connection) => connection,
            Err(e) => {
                warn!("Bot {}: connect to {} failed: {}", bot_id, config.server, e);
                if !pause(RECONNECT_DELAY, &mut shutdown).await {
                    break;
                }
                continue;
            }
        };

        match connection.handshake().await {
            Ok(welcome) => info!(
                "Bot {}: connected as user {} ({} others online)",
                bot_id,
                welcome.user_id,
                welcome.others.len()
            ),
            Err(e) => {
                warn!("Bot {}: handshake failed: {}", bot_id, e);
                if !pause(RECONNECT_DELAY, &mut shutdown).await {
                    break;
                }
                continue;
            }
        }

        let (reader, mut writer) = connection.into_split();
        let receiver = tokio::spawn(receive_loop(bot_id, reader));

        loop {
            let target = random_point(&mut rng, &config);
            let travel = rng.gen_range(config.travel_secs.clone());
            info!(
                "Bot {}: moving ({:.1}, {:.1}) -> ({:.1}, {:.1}), ~{:.1}s",
                bot_id, position.x, position.y, target.x, target.y, travel
            );

            if let Err(e) = writer.send_move(position, target).await {
                warn!("Bot {}: send failed: {}", bot_id, e);
                break;
            }
            if !pause(Duration::from_secs_f32(travel), &mut shutdown).await {
                break;
            }
            position = target;

            let rest = rng.gen_range(config.rest_ms.clone());
            if !pause(Duration::from_millis(rest), &mut shutdown).await {
                break;
            }
            if receiver.is_finished() {
                break;
            }
        }

        receiver.abort();
        if !*shutdown.borrow() && !pause(RECONNECT_DELAY, &mut shutdown).await {
            break;
        }
    }

    info!("Bot {}: stopped", bot_id);
}
