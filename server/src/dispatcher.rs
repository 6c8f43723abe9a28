//! Broadcast dispatcher.
//!
//! Sessions never write to each other's sockets. They push [`Dispatch`]
//! requests onto one channel; a single dispatcher task encodes each message
//! once and queues the resulting frame on every recipient's outbound queue.

use crate::registry::{ConnectionId, Frame, Registry};
use log::{debug, error};
use shared::{encode_frame, Message};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

/// Requests sent from session handlers to the dispatcher task
#[derive(Debug)]
pub enum Dispatch {
    Broadcast {
        message: Message,
        exclude: Option<ConnectionId>,
    },
}

/// Encodes a message into a shareable frame.
pub fn frame_for(message: &Message) -> Option<Frame> {
    match encode_frame(message) {
        Ok(bytes) => Some(Arc::from(bytes)),
        Err(e) => {
            error!("Failed to encode {:?} message: {}", message.kind, e);
            None
        }
    }
}

/// Fans `message` out to every registered session except `exclude`.
///
/// The message is encoded once; all recipients share the same frame.
/// Returns how many sessions it was queued for.
pub fn broadcast(registry: &Registry, message: &Message, exclude: Option<ConnectionId>) -> usize {
    match frame_for(message) {
        Some(frame) => registry.broadcast(&frame, exclude),
        None => 0,
    }
}

/// Runs until every sender of `requests` has been dropped.
pub async fn run_dispatcher(
    registry: Arc<RwLock<Registry>>,
    mut requests: mpsc::UnboundedReceiver<Dispatch>,
) {
    while let Some(request) = requests.recv().await {
        match request {
            Dispatch::Broadcast { message, exclude } => {
                let delivered = broadcast(&*registry.read().await, &message, exclude);
                debug!(
                    "Broadcast {:?} from user {} to {} clients",
                    message.kind, message.user_id, delivered
                );
            }
        }
    }
    debug!("Dispatcher stopped");
}
