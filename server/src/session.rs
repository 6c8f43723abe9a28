//! Per-connection session handling.
//!
//! Each accepted connection gets two tasks: a reader running
//! [`handle_connection`] and a writer draining the connection's outbound
//! queue. The reader registers the session, then processes frames strictly
//! in arrival order until EOF, an I/O error or a protocol violation, and
//! finally deregisters the session exactly once.

use crate::character::Character;
use crate::dispatcher::{frame_for, Dispatch};
use crate::registry::{
    ConnectionId, Frame, Registry, Session, SharedCharacter, OUTBOUND_QUEUE_CAPACITY,
};
use log::{debug, info, warn};
use shared::{read_message, write_frame, FrameError, Message, MessageType, UserId, UserInfo};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};

/// Shared server state handed to every session
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub registry: Arc<RwLock<Registry>>,
    pub dispatch: mpsc::UnboundedSender<Dispatch>,
    pub default_speed: f32,
}

/// Drives one connection from registration to cleanup.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    id: ConnectionId,
    user_id: UserId,
    ctx: SessionContext,
) {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {}: {}", addr, e);
    }
    let (mut reader, writer) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_QUEUE_CAPACITY);
    tokio::spawn(run_writer(writer, outbound_rx, id));

    let Some(character) = register(&ctx, id, user_id, addr, outbound_tx).await else {
        // The writer sees its queue close and shuts the socket down.
        warn!(
            "Closing client {} (user {}) from {}: handshake could not be encoded",
            id, user_id, addr
        );
        return;
    };
    info!("Client connected: {} (user {}) from {}", id, user_id, addr);

    match read_loop(&mut reader, id, user_id, &character, &ctx).await {
        Ok(()) => info!("Client disconnected: {} (user {})", id, user_id),
        Err(FrameError::Format(e)) => {
            warn!("Protocol error from client {} (user {}): {}", id, user_id, e)
        }
        Err(FrameError::Io(e)) => {
            info!("Connection error for client {} (user {}): {}", id, user_id, e)
        }
    }

    // Dropping the removed session closes the outbound queue, which ends the
    // writer task; the read half is dropped when this function returns.
    ctx.registry.write().await.remove(&id);
}

/// Queues the handshake frames and inserts the session into the registry.
///
/// Both steps happen under the registry write lock, so UserIdAssignment and
/// AllUsersInfo are always the first two frames the client receives, ahead
/// of any broadcast. The roster lists every other registered character.
///
/// Returns `None`, leaving the registry untouched, when the handshake
/// cannot be framed (a roster larger than the frame limit).
async fn register(
    ctx: &SessionContext,
    id: ConnectionId,
    user_id: UserId,
    addr: SocketAddr,
    outbound: mpsc::Sender<Frame>,
) -> Option<SharedCharacter> {
    let mut registry = ctx.registry.write().await;

    let roster = registry.roster(None).await;
    let (assignment, all_users) = handshake_frames(user_id, roster)?;
    // A fresh queue always has room for both.
    let _ = outbound.try_send(assignment);
    let _ = outbound.try_send(all_users);

    let session = Session::new(
        id,
        user_id,
        addr,
        Character::new(id, user_id, ctx.default_speed),
        outbound,
    );
    let character = Arc::clone(&session.character);
    registry.add(session);
    Some(character)
}

/// Encodes the UserIdAssignment and AllUsersInfo frames for a new client.
fn handshake_frames(user_id: UserId, roster: Vec<UserInfo>) -> Option<(Frame, Frame)> {
    let users = roster.len();
    let assignment = frame_for(&Message::user_id_assignment(user_id))?;
    match frame_for(&Message::all_users_info(roster)) {
        Some(all_users) => Some((assignment, all_users)),
        None => {
            warn!(
                "Roster of {} users does not fit in one frame; user {} cannot join",
                users, user_id
            );
            None
        }
    }
}

async fn read_loop(
    reader: &mut OwnedReadHalf,
    id: ConnectionId,
    user_id: UserId,
    character: &SharedCharacter,
    ctx: &SessionContext,
) -> Result<(), FrameError> {
    while let Some(message) = read_message(reader).await? {
        match message.kind {
            MessageType::Move => {
                let relay = apply_move(&message, id, user_id, character).await;
                if ctx
                    .dispatch
                    .send(Dispatch::Broadcast {
                        message: relay,
                        exclude: Some(id),
                    })
                    .is_err()
                {
                    warn!("Dispatcher is gone; move from user {} not relayed", user_id);
                }
            }
            other => debug!("Ignoring {:?} message from client {}", other, id),
        }
    }
    Ok(())
}

/// Applies a Move intent to the sender's own character and builds the
/// outbound relay.
///
/// Identity and speed in the relay come from the server, never from the
/// client's message. The character keeps moving at its own speed.
pub async fn apply_move(
    message: &Message,
    id: ConnectionId,
    user_id: UserId,
    character: &SharedCharacter,
) -> Message {
    let mut character = character.lock().await;
    let speed = character.speed;
    character.start_movement(message.start, message.target, speed, Instant::now());
    info!(
        "User {} moving from ({:.1}, {:.1}) to ({:.1}, {:.1})",
        user_id, message.start.x, message.start.y, message.target.x, message.target.y
    );

    Message {
        kind: MessageType::Move,
        character_id: id.to_string(),
        user_id,
        start: message.start,
        target: message.target,
        current: character.position,
        speed: character.speed,
        is_moving: character.is_moving,
        all_users: Vec::new(),
    }
}

/// Writes queued frames to the socket until the queue closes or a write
/// fails.
async fn run_writer(
    mut writer: OwnedWriteHalf,
    mut outbound: mpsc::Receiver<Frame>,
    id: ConnectionId,
) {
    while let Some(frame) = outbound.recv().await {
        if let Err(e) = write_frame(&mut writer, &frame).await {
            debug!("Write to client {} failed: {}", id, e);
            break;
        }
    }
    let _ = writer.shutdown().await;
}
