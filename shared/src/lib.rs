//! Protocol types shared by the position server and its clients.
//!
//! The wire format is a 4-byte little-endian length prefix followed by one
//! encoded [`Message`]. See [`protocol`] for the payload layout and
//! [`framing`] for reading and writing whole frames over a byte stream.

pub mod framing;
pub mod protocol;

use std::ops::{Add, AddAssign, Mul, Sub};

pub use framing::{
    decode_frame, encode_frame, read_frame, read_message, write_frame, FrameError,
};
pub use protocol::{decode, encode, FormatError, Message, MessageType, UserInfo};

/// Server-assigned numeric identifier of a connected user.
pub type UserId = u16;

/// Largest payload a frame may declare (1 MiB).
pub const MAX_FRAME_LEN: usize = 1_048_576;
/// Movement speed in units per second used when a client does not supply one.
pub const DEFAULT_SPEED: f32 = 100.0;
/// First user id handed out, and the value the counter wraps back to.
pub const FIRST_USER_ID: UserId = 1000;

pub const WORLD_WIDTH: f32 = 700.0;
pub const WORLD_HEIGHT: f32 = 400.0;

/// A point or direction on the 2D plane.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the magnitude of the vector.
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn distance(&self, other: Vec2) -> f32 {
        (other - *self).length()
    }

    /// Returns the unit vector pointing the same way, or `None` for a
    /// zero-length vector.
    pub fn normalize(&self) -> Option<Vec2> {
        let len = self.length();
        if len > 0.0 && len.is_finite() {
            Some(Vec2::new(self.x / len, self.y / len))
        } else {
            None
        }
    }
}

impl Add for Vec2 {
    type Output = Vec2;

    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Vec2 {
    fn add_assign(&mut self, rhs: Vec2) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

impl Sub for Vec2 {
    type Output = Vec2;

    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;

    fn mul(self, scalar: f32) -> Vec2 {
        Vec2::new(self.x * scalar, self.y * scalar)
    }
}
