//! # Position Server Library
//!
//! This library provides the authoritative server for the multiplayer
//! position-synchronization game. Each client owns one character; the
//! server tracks every character's position and relays movement intents to
//! all other connected clients.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Movement
//! Characters move in straight lines towards a target at constant speed.
//! The server applies each client's Move command to that client's own
//! character and advances all characters on a fixed ~60 Hz tick, so the
//! positions it reports to newly joining clients reflect continuous motion.
//!
//! ### Connection Management
//! Handles the complete lifecycle of a TCP connection:
//! - Connection identity and sequential user id assignment
//! - Handshake: UserIdAssignment followed by an AllUsersInfo roster
//! - Deregistration exactly once when the connection ends, however it ends
//!
//! ### Relaying
//! Move commands are stamped with the sender's server-known identity and
//! fanned out to every other client. Relays are event driven; the tick
//! itself never broadcasts.
//!
//! ## Architecture Design
//!
//! ### Task Layout
//! The server runs on the tokio multi-threaded runtime:
//! - **Accept loop**: accepts connections and spawns one session per client
//! - **Session reader** (per client): reads frames in arrival order
//! - **Session writer** (per client): drains that client's outbound queue
//! - **Dispatcher**: encodes each relay once and queues it for recipients
//! - **Simulation tick**: advances every character on a fixed interval
//!
//! ### Shared State
//! The [`registry::Registry`] is shared as `Arc<RwLock<Registry>>`. Each
//! character sits behind its own mutex, so the session applying a Move and
//! the tick advancing positions never write to it at the same time. No lock
//! is held across socket I/O; a client that stops reading fills only its
//! own bounded queue and then loses frames.
//!
//! ## Module Organization
//!
//! - `character`: movement state machine (idle / moving)
//! - `user_id`: atomic increment-and-wrap user id counter
//! - `registry`: connection identity and the session store
//! - `dispatcher`: broadcast fan-out task
//! - `session`: per-connection handshake, read loop and cleanup
//! - `network`: listener, server handle and simulation tick
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::{Server, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = Server::new("127.0.0.1:8080", ServerConfig::default()).await?;
//!     let handle = server.handle();
//!
//!     tokio::spawn(async move {
//!         let _ = tokio::signal::ctrl_c().await;
//!         handle.stop();
//!     });
//!
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Known Limitations
//!
//! - User ids wrap back to the base after 65535 and are not reclaimed, so a
//!   very long-running server may hand out an id that is still in use.
//! - Idle connections are never timed out.
//! - Stopping the server does not force open sessions closed; each ends on
//!   its next failed read.

pub mod character;
pub mod dispatcher;
pub mod network;
pub mod registry;
pub mod session;
pub mod user_id;
