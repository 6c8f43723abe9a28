//! Binary message codec.
//!
//! Every payload carries the same fixed header followed by an optional user
//! roster. All multi-byte values are little-endian:
//!
//! ```text
//! u8   message type (0=Move, 1=Position, 2=UserIdAssignment, 3=AllUsersInfo)
//! i32  character id length, then that many UTF-8 bytes
//! u16  user id
//! f32  start x, start y, target x, target y, current x, current y
//! f32  speed
//! u8   is moving (0/1)
//! i32  user count, then per user:
//!        u16 user id, string character id,
//!        f32 current x, current y, target x, target y, speed,
//!        u8 is moving
//! ```

use crate::{UserId, Vec2, DEFAULT_SPEED};
use thiserror::Error;

/// Smallest possible encoding of one [`UserInfo`] record (empty character id).
const MIN_USER_RECORD_LEN: usize = 2 + 4 + 5 * 4 + 1;

/// Reasons a payload or frame is rejected.
///
/// Any of these leaves the stream framing in an unknown state, so the
/// receiver is expected to drop the connection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("invalid frame length {0}")]
    InvalidFrameLength(i64),
    #[error("unknown message type {0}")]
    UnknownMessageType(u8),
    #[error("negative string length {0}")]
    NegativeStringLength(i32),
    #[error("negative user count {0}")]
    NegativeUserCount(i32),
    #[error("payload ended while reading {0}")]
    Truncated(&'static str),
    #[error("character id is not valid UTF-8")]
    InvalidUtf8,
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageType {
    Move = 0,
    Position = 1,
    UserIdAssignment = 2,
    AllUsersInfo = 3,
}

impl TryFrom<u8> for MessageType {
    type Error = FormatError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(MessageType::Move),
            1 => Ok(MessageType::Position),
            2 => Ok(MessageType::UserIdAssignment),
            3 => Ok(MessageType::AllUsersInfo),
            other => Err(FormatError::UnknownMessageType(other)),
        }
    }
}

/// Per-user record carried by [`MessageType::AllUsersInfo`].
#[derive(Debug, Clone, PartialEq)]
pub struct UserInfo {
    pub user_id: UserId,
    pub character_id: String,
    pub current: Vec2,
    pub target: Vec2,
    pub speed: f32,
    pub is_moving: bool,
}

/// One protocol message. Fields that a message kind does not use are left
/// at their defaults but are still present on the wire.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub kind: MessageType,
    pub character_id: String,
    pub user_id: UserId,
    pub start: Vec2,
    pub target: Vec2,
    pub current: Vec2,
    pub speed: f32,
    pub is_moving: bool,
    pub all_users: Vec<UserInfo>,
}

impl Message {
    pub fn new(kind: MessageType) -> Self {
        Self {
            kind,
            character_id: String::new(),
            user_id: 0,
            start: Vec2::ZERO,
            target: Vec2::ZERO,
            current: Vec2::ZERO,
            speed: DEFAULT_SPEED,
            is_moving: false,
            all_users: Vec::new(),
        }
    }

    /// A client movement intent from `start` towards `target`.
    pub fn move_command(start: Vec2, target: Vec2) -> Self {
        Self {
            start,
            target,
            current: start,
            is_moving: true,
            ..Self::new(MessageType::Move)
        }
    }

    pub fn user_id_assignment(user_id: UserId) -> Self {
        Self {
            user_id,
            ..Self::new(MessageType::UserIdAssignment)
        }
    }

    pub fn all_users_info(all_users: Vec<UserInfo>) -> Self {
        Self {
            all_users,
            ..Self::new(MessageType::AllUsersInfo)
        }
    }

    /// Exact number of bytes [`encode`] produces for this message.
    pub fn encoded_len(&self) -> usize {
        let header = 1 + 4 + self.character_id.len() + 2 + 7 * 4 + 1 + 4;
        let users: usize = self
            .all_users
            .iter()
            .map(|u| MIN_USER_RECORD_LEN + u.character_id.len())
            .sum();
        header + users
    }
}

/// Serializes a message into a payload (without the frame length prefix).
pub fn encode(message: &Message) -> Vec<u8> {
    let mut buf = Vec::with_capacity(message.encoded_len());

    buf.push(message.kind as u8);
    put_string(&mut buf, &message.character_id);
    buf.extend_from_slice(&message.user_id.to_le_bytes());
    for value in [
        message.start.x,
        message.start.y,
        message.target.x,
        message.target.y,
        message.current.x,
        message.current.y,
        message.speed,
    ] {
        buf.extend_from_slice(&value.to_le_bytes());
    }
    buf.push(u8::from(message.is_moving));

    put_len(&mut buf, message.all_users.len());
    for user in &message.all_users {
        buf.extend_from_slice(&user.user_id.to_le_bytes());
        put_string(&mut buf, &user.character_id);
        for value in [
            user.current.x,
            user.current.y,
            user.target.x,
            user.target.y,
            user.speed,
        ] {
            buf.extend_from_slice(&value.to_le_bytes());
        }
        buf.push(u8::from(user.is_moving));
    }

    buf
}

/// Parses one payload. The whole slice must be consumed.
pub fn decode(payload: &[u8]) -> Result<Message, FormatError> {
    let mut reader = PayloadReader::new(payload);

    let kind = MessageType::try_from(reader.u8("message type")?)?;
    let character_id = reader.string("character id")?;
    let user_id = reader.u16("user id")?;
    let start = reader.vec2("start position")?;
    let target = reader.vec2("target position")?;
    let current = reader.vec2("current position")?;
    let speed = reader.f32("speed")?;
    let is_moving = reader.bool("moving flag")?;

    let count = reader.i32("user count")?;
    if count < 0 {
        return Err(FormatError::NegativeUserCount(count));
    }
    let count = count as usize;
    // Reject impossible counts before reserving space for them.
    if count > reader.remaining() / MIN_USER_RECORD_LEN {
        return Err(FormatError::Truncated("user list"));
    }

    let mut all_users = Vec::with_capacity(count);
    for _ in 0..count {
        let user_id = reader.u16("user id")?;
        let character_id = reader.string("character id")?;
        let current = reader.vec2("current position")?;
        let target = reader.vec2("target position")?;
        let speed = reader.f32("speed")?;
        let is_moving = reader.bool("moving flag")?;
        all_users.push(UserInfo {
            user_id,
            character_id,
            current,
            target,
            speed,
            is_moving,
        });
    }

    if reader.remaining() > 0 {
        return Err(FormatError::TrailingBytes(reader.remaining()));
    }

    Ok(Message {
        kind,
        character_id,
        user_id,
        start,
        target,
        current,
        speed,
        is_moving,
        all_users,
    })
}

fn put_len(buf: &mut Vec<u8>, len: usize) {
    // Frames are capped at MAX_FRAME_LEN, so any length we emit fits in i32.
    let len = i32::try_from(len).unwrap_or(i32::MAX);
    buf.extend_from_slice(&len.to_le_bytes());
}

fn put_string(buf: &mut Vec<u8>, value: &str) {
    put_len(buf, value.len());
    buf.extend_from_slice(value.as_bytes());
}

/// Cursor over a payload that never reads past the end of the slice.
struct PayloadReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PayloadReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], FormatError> {
        if n > self.remaining() {
            return Err(FormatError::Truncated(what));
        }
        let bytes = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], FormatError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, FormatError> {
        Ok(self.take(1, what)?[0])
    }

    fn bool(&mut self, what: &'static str) -> Result<bool, FormatError> {
        Ok(self.u8(what)? != 0)
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, FormatError> {
        self.array(what).map(u16::from_le_bytes)
    }

    fn i32(&mut self, what: &'static str) -> Result<i32, FormatError> {
        self.array(what).map(i32::from_le_bytes)
    }

    fn f32(&mut self, what: &'static str) -> Result<f32, FormatError> {
        self.array(what).map(f32::from_le_bytes)
    }

    fn vec2(&mut self, what: &'static str) -> Result<Vec2, FormatError> {
        Ok(Vec2::new(self.f32(what)?, self.f32(what)?))
    }

    fn string(&mut self, what: &'static str) -> Result<String, FormatError> {
        let len = self.i32(what)?;
        if len < 0 {
            return Err(FormatError::NegativeStringLength(len));
        }
        let bytes = self.take(len as usize, what)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| FormatError::InvalidUtf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_user(user_id: UserId, character_id: &str) -> UserInfo {
        UserInfo {
            user_id,
            character_id: character_id.to_string(),
            current: Vec2::new(12.5, 40.0),
            target: Vec2::new(300.0, 220.0),
            speed: 100.0,
            is_moving: true,
        }
    }

    #[test]
    fn test_move_roundtrip() {
        let mut message = Message::move_command(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0));
        message.character_id = "6f1c7e0a-1b2c-4d5e-8f90-a1b2c3d4e5f6".to_string();
        message.user_id = 1001;
        message.current = Vec2::new(2.5, 0.0);
        message.speed = 150.0;

        let encoded = encode(&message);
        assert_eq!(encoded.len(), message.encoded_len());
        assert_eq!(decode(&encoded).unwrap(), message);
    }

    #[test]
    fn test_empty_character_id_and_empty_user_list() {
        let message = Message::move_command(Vec2::ZERO, Vec2::new(1.0, 1.0));
        assert!(message.character_id.is_empty());
        assert!(message.all_users.is_empty());

        let decoded = decode(&encode(&message)).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_all_users_info_roundtrip() {
        let message = Message::all_users_info(vec![
            sample_user(1000, "a"),
            sample_user(1001, ""),
            sample_user(1002, "ümlaut-ok"),
        ]);

        let decoded = decode(&encode(&message)).unwrap();
        assert_eq!(decoded.kind, MessageType::AllUsersInfo);
        assert_eq!(decoded.all_users.len(), 3);
        assert_eq!(decoded, message);
    }

    #[test]
    fn test_header_layout() {
        let mut message = Message::user_id_assignment(0x1234);
        message.character_id = "ab".to_string();
        let encoded = encode(&message);

        assert_eq!(encoded[0], MessageType::UserIdAssignment as u8);
        assert_eq!(&encoded[1..5], &2i32.to_le_bytes());
        assert_eq!(&encoded[5..7], b"ab");
        assert_eq!(&encoded[7..9], &[0x34, 0x12]);
        // speed sits after six position floats
        assert_eq!(&encoded[33..37], &DEFAULT_SPEED.to_le_bytes());
        // user count is the last field of an otherwise empty message
        assert_eq!(&encoded[encoded.len() - 4..], &0i32.to_le_bytes());
    }

    #[test]
    fn test_rejects_unknown_message_type() {
        let mut encoded = encode(&Message::new(MessageType::Position));
        encoded[0] = 9;
        assert_eq!(decode(&encoded), Err(FormatError::UnknownMessageType(9)));
    }

    #[test]
    fn test_rejects_negative_string_length() {
        let mut encoded = encode(&Message::new(MessageType::Move));
        encoded[1..5].copy_from_slice(&(-1i32).to_le_bytes());
        assert_eq!(decode(&encoded), Err(FormatError::NegativeStringLength(-1)));
    }

    #[test]
    fn test_rejects_string_longer_than_payload() {
        let mut encoded = encode(&Message::new(MessageType::Move));
        encoded[1..5].copy_from_slice(&1_000_000i32.to_le_bytes());
        assert_eq!(decode(&encoded), Err(FormatError::Truncated("character id")));
    }

    #[test]
    fn test_rejects_negative_user_count() {
        let mut encoded = encode(&Message::new(MessageType::AllUsersInfo));
        let at = encoded.len() - 4;
        encoded[at..].copy_from_slice(&(-5i32).to_le_bytes());
        assert_eq!(decode(&encoded), Err(FormatError::NegativeUserCount(-5)));
    }

    #[test]
    fn test_rejects_user_count_beyond_payload() {
        let mut encoded = encode(&Message::all_users_info(vec![sample_user(1000, "x")]));
        let count_at = encoded.len() - (MIN_USER_RECORD_LEN + 1) - 4;
        encoded[count_at..count_at + 4].copy_from_slice(&i32::MAX.to_le_bytes());
        assert_eq!(decode(&encoded), Err(FormatError::Truncated("user list")));
    }

    #[test]
    fn test_rejects_truncated_payload() {
        let encoded = encode(&Message::all_users_info(vec![sample_user(1000, "abc")]));
        for cut in [0, 1, 5, 20, encoded.len() - 1] {
            let result = decode(&encoded[..cut]);
            assert!(
                matches!(result, Err(FormatError::Truncated(_))),
                "cut at {} gave {:?}",
                cut,
                result
            );
        }
    }

    #[test]
    fn test_rejects_trailing_bytes() {
        let mut encoded = encode(&Message::move_command(Vec2::ZERO, Vec2::new(1.0, 0.0)));
        encoded.extend_from_slice(&[0, 0, 0]);
        assert_eq!(decode(&encoded), Err(FormatError::TrailingBytes(3)));
    }

    #[test]
    fn test_rejects_invalid_utf8() {
        let mut message = Message::new(MessageType::Move);
        message.character_id = "ab".to_string();
        let mut encoded = encode(&message);
        encoded[5] = 0xFF;
        encoded[6] = 0xFE;
        assert_eq!(decode(&encoded), Err(FormatError::InvalidUtf8));
    }

    #[test]
    fn test_nonzero_moving_byte_is_true() {
        let mut encoded = encode(&Message::new(MessageType::Position));
        // is_moving is the byte right before the user count
        let at = encoded.len() - 5;
        encoded[at] = 7;
        assert!(decode(&encoded).unwrap().is_moving);
    }
}
