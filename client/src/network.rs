use log::debug;
use shared::{
    encode_frame, read_message, write_frame, FrameError, Message, MessageType, UserId, UserInfo,
    Vec2,
};
use std::io;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

/// Details the server sends right after accepting a connection.
#[derive(Debug, Clone)]
pub struct Welcome {
    pub user_id: UserId,
    pub others: Vec<UserInfo>,
}

/// Reading side of a server connection.
pub struct MessageReader {
    inner: OwnedReadHalf,
}

impl MessageReader {
    /// Next message from the server, or `None` once it closes the connection.
    pub async fn recv(&mut self) -> Result<Option<Message>, FrameError> {
        read_message(&mut self.inner).await
    }
}

/// Writing side of a server connection.
pub struct MessageWriter {
    inner: OwnedWriteHalf,
}

impl MessageWriter {
    pub async fn send(&mut self, message: &Message) -> Result<(), FrameError> {
        let frame = encode_frame(message)?;
        write_frame(&mut self.inner, &frame).await?;
        Ok(())
    }

    pub async fn send_move(&mut self, start: Vec2, target: Vec2) -> Result<(), FrameError> {
        self.send(&Message::move_command(start, target)).await
    }

    /// Writes raw bytes without framing them. Lets tests inject malformed
    /// traffic.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> io::Result<()> {
        write_frame(&mut self.inner, bytes).await
    }
}

/// A TCP connection to the position server.
pub struct Connection {
    pub reader: MessageReader,
    pub writer: MessageWriter,
}

impl Connection {
    pub async fn connect(addr: &str) -> io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();
        Ok(Self {
            reader: MessageReader { inner: reader },
            writer: MessageWriter { inner: writer },
        })
    }

    /// Reads the UserIdAssignment and AllUsersInfo messages that open every
    /// session.
    pub async fn handshake(&mut self) -> Result<Welcome, FrameError> {
        let assignment = self.expect(MessageType::UserIdAssignment).await?;
        let roster = self.expect(MessageType::AllUsersInfo).await?;
        debug!(
            "Assigned user {} with {} other users online",
            assignment.user_id,
            roster.all_users.len()
        );
        Ok(Welcome {
            user_id: assignment.user_id,
            others: roster.all_users,
        })
    }

    async fn expect(&mut self, kind: MessageType) -> Result<Message, FrameError> {
        match self.reader.recv().await? {
            Some(message) if message.kind == kind => Ok(message),
            Some(other) => Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("expected {:?}, got {:?}", kind, other.kind),
            )
            .into()),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("server closed before {:?}", kind),
            )
            .into()),
        }
    }

    pub async fn recv(&mut self) -> Result<Option<Message>, FrameError> {
        self.reader.recv().await
    }

    pub async fn send(&mut self, message: &Message) -> Result<(), FrameError> {
        self.writer.send(message).await
    }

    pub async fn send_move(&mut self, start: Vec2, target: Vec2) -> Result<(), FrameError> {
        self.writer.send_move(start, target).await
    }

    pub fn into_split(self) -> (MessageReader, MessageWriter) {
        (self.reader, self.writer)
    }
}
