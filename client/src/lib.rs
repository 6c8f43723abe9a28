//! # Bot Client Library
//!
//! This library provides a headless client for the position server. It is
//! used to exercise a running server with any number of simulated players
//! and doubles as the client side of the workspace integration tests.
//!
//! ## Module Organization
//!
//! ### Network Module (`network`)
//! Manages the TCP connection to the server:
//! - Length-prefixed framing of outgoing Move commands
//! - Reading the UserIdAssignment / AllUsersInfo handshake
//! - Receiving relayed moves from other users
//!
//! ### Bot Module (`bot`)
//! Drives simulated players:
//! - Random targets inside the world bounds
//! - Waiting out travel and rest periods between moves
//! - Reconnecting after a pause when the connection drops
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::Connection;
//! use shared::Vec2;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut connection = Connection::connect("127.0.0.1:8080").await?;
//!     let welcome = connection.handshake().await?;
//!     println!("I am user {}", welcome.user_id);
//!
//!     connection
//!         .send_move(Vec2::new(0.0, 0.0), Vec2::new(300.0, 200.0))
//!         .await?;
//!
//!     while let Some(message) = connection.recv().await? {
//!         println!("user {} -> {:?}", message.user_id, message.target);
//!     }
//!     Ok(())
//! }
//! ```

pub mod bot;
pub mod network;

pub use network::{Connection, MessageReader, MessageWriter, Welcome};
