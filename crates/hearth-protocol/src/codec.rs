//! Frame codec: `[type: 1 byte][length: varint][payload bytes]`.
//!
//! Decoding reads the type tag first and rejects unknown tags before
//! looking at the length, then hands the exact payload slice to the typed
//! decoder for that direction.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use hearth_transport::ConnectionId;

use crate::varint::{MAX_VARINT_LEN, peek_varint, put_varint, varint_len};
use crate::{
    ClientMessage, Direction, ErrorKind, MessageType, Position,
    ProtocolError, RejectReason, RoomId, RosterEntry, ServerMessage,
};

/// Default ceiling on a single payload.
pub const DEFAULT_MAX_FRAME_LEN: usize = 16 * 1024;

/// A message type that can be carried in a frame.
pub trait WireMessage: Sized {
    /// The tag written in the frame header.
    fn message_type(&self) -> MessageType;

    /// Appends the payload (without header) to `buf`.
    fn encode_payload(&self, buf: &mut BytesMut);

    /// Decodes a payload whose tag has already been read.
    fn decode_payload(
        ty: MessageType,
        payload: &mut PayloadReader,
    ) -> Result<Self, ProtocolError>;
}

/// Turns typed messages into frames and back.
pub trait Codec: Send + Sync + 'static {
    /// Encodes one message as a complete frame.
    fn encode<M: WireMessage>(&self, msg: &M) -> Result<Bytes, ProtocolError>;

    /// Decodes exactly one frame. Bytes beyond the frame are an error.
    fn decode<M: WireMessage>(&self, frame: &[u8]) -> Result<M, ProtocolError>;
}

/// The binary frame codec.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_len: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_LEN)
    }
}

impl FrameCodec {
    pub fn new(max_frame_len: usize) -> Self {
        Self { max_frame_len }
    }

    pub fn max_frame_len(&self) -> usize {
        self.max_frame_len
    }

    /// Length of `msg`'s payload once encoded.
    pub fn payload_len<M: WireMessage>(&self, msg: &M) -> usize {
        let mut payload = BytesMut::new();
        msg.encode_payload(&mut payload);
        payload.len()
    }

    /// Returns the payload length of `msg`, or `FrameTooLarge` if it would
    /// not fit in one frame.
    pub fn check_fits<M: WireMessage>(&self, msg: &M) -> Result<usize, ProtocolError> {
        self.check_len(self.payload_len(msg))
    }

    fn check_len(&self, len: usize) -> Result<usize, ProtocolError> {
        if len > self.max_frame_len {
            return Err(ProtocolError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }
        Ok(len)
    }

    /// Packs a roster snapshot into as few `RoomRoster` messages as the
    /// frame limit allows, keeping member order.
    ///
    /// Always yields at least one message, so an empty room still gets an
    /// (empty) roster.
    pub fn roster_frames(&self, room: &RoomId, members: Vec<RosterEntry>) -> Vec<ServerMessage> {
        let room_len = room.as_str().len();
        let header = varint_len(room_len as u32) + room_len + MAX_VARINT_LEN;
        let budget = self.max_frame_len.saturating_sub(header);

        let mut frames = Vec::new();
        let mut chunk = Vec::new();
        let mut used = 0;
        for entry in members {
            let len = roster_entry_len(&entry);
            if !chunk.is_empty() && used + len > budget {
                frames.push(ServerMessage::RoomRoster {
                    room: room.clone(),
                    members: std::mem::take(&mut chunk),
                });
                used = 0;
            }
            used += len;
            chunk.push(entry);
        }
        if !chunk.is_empty() || frames.is_empty() {
            frames.push(ServerMessage::RoomRoster {
                room: room.clone(),
                members: chunk,
            });
        }
        frames
    }

    /// Pulls the next complete frame off the front of a stream buffer.
    ///
    /// Returns `Ok(None)` and leaves `buf` untouched while the frame is
    /// still incomplete.
    pub fn decode_from<M: WireMessage>(
        &self,
        buf: &mut BytesMut,
    ) -> Result<Option<M>, ProtocolError> {
        let Some(&tag) = buf.first() else {
            return Ok(None);
        };
        let ty = MessageType::try_from(tag)?;

        let Some((len, len_bytes)) = peek_varint(&buf[1..])? else {
            return Ok(None);
        };
        let len = len as usize;
        if len > self.max_frame_len {
            return Err(ProtocolError::FrameTooLarge {
                len,
                max: self.max_frame_len,
            });
        }
        let header = 1 + len_bytes;
        if buf.len() < header + len {
            return Ok(None);
        }

        buf.advance(header);
        let mut payload = PayloadReader::new(buf.split_to(len).freeze());
        let msg = M::decode_payload(ty, &mut payload)?;
        payload.finish()?;
        Ok(Some(msg))
    }
}

impl Codec for FrameCodec {
    fn encode<M: WireMessage>(&self, msg: &M) -> Result<Bytes, ProtocolError> {
        let mut payload = BytesMut::new();
        msg.encode_payload(&mut payload);
        self.check_len(payload.len())?;

        let len = payload.len() as u32;
        let mut frame = BytesMut::with_capacity(1 + varint_len(len) + payload.len());
        frame.put_u8(msg.message_type().tag());
        put_varint(&mut frame, len);
        frame.extend_from_slice(&payload);
        Ok(frame.freeze())
    }

    fn decode<M: WireMessage>(&self, frame: &[u8]) -> Result<M, ProtocolError> {
        let mut buf = BytesMut::from(frame);
        let msg = self
            .decode_from(&mut buf)?
            .ok_or(ProtocolError::Truncated("frame"))?;
        if !buf.is_empty() {
            return Err(ProtocolError::TrailingBytes(buf.len()));
        }
        Ok(msg)
    }
}

// ---------------------------------------------------------------------------
// Payload primitives
// ---------------------------------------------------------------------------

/// Cursor over one payload with bounds-checked field readers.
pub struct PayloadReader {
    buf: Bytes,
}

impl PayloadReader {
    fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    fn need(&self, n: usize, what: &'static str) -> Result<(), ProtocolError> {
        if self.buf.remaining() < n {
            Err(ProtocolError::Truncated(what))
        } else {
            Ok(())
        }
    }

    pub fn u8(&mut self, what: &'static str) -> Result<u8, ProtocolError> {
        self.need(1, what)?;
        Ok(self.buf.get_u8())
    }

    pub fn u32(&mut self, what: &'static str) -> Result<u32, ProtocolError> {
        self.need(4, what)?;
        Ok(self.buf.get_u32())
    }

    pub fn i32(&mut self, what: &'static str) -> Result<i32, ProtocolError> {
        self.need(4, what)?;
        Ok(self.buf.get_i32())
    }

    pub fn varint(&mut self, what: &'static str) -> Result<u32, ProtocolError> {
        let (value, n) =
            peek_varint(&self.buf)?.ok_or(ProtocolError::Truncated(what))?;
        self.buf.advance(n);
        Ok(value)
    }

    pub fn string(&mut self, what: &'static str) -> Result<String, ProtocolError> {
        let len = self.varint(what)? as usize;
        self.need(len, what)?;
        let raw = self.buf.split_to(len);
        String::from_utf8(raw.to_vec()).map_err(|_| ProtocolError::InvalidUtf8)
    }

    pub fn bool(&mut self, what: &'static str) -> Result<bool, ProtocolError> {
        match self.u8(what)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolError::InvalidValue {
                field: what,
                value: other as u32,
            }),
        }
    }

    fn connection_id(&mut self, what: &'static str) -> Result<ConnectionId, ProtocolError> {
        self.u32(what).map(ConnectionId::new)
    }

    fn position(&mut self) -> Result<Position, ProtocolError> {
        Ok(Position::new(self.i32("position.x")?, self.i32("position.y")?))
    }

    fn roster_entry(&mut self) -> Result<RosterEntry, ProtocolError> {
        Ok(RosterEntry {
            id: self.connection_id("roster id")?,
            name: self.string("roster name")?,
            position: self.position()?,
        })
    }

    fn finish(self) -> Result<(), ProtocolError> {
        match self.buf.remaining() {
            0 => Ok(()),
            n => Err(ProtocolError::TrailingBytes(n)),
        }
    }
}

fn put_string(buf: &mut BytesMut, s: &str) {
    put_varint(buf, s.len() as u32);
    buf.extend_from_slice(s.as_bytes());
}

fn put_position(buf: &mut BytesMut, p: Position) {
    buf.put_i32(p.x);
    buf.put_i32(p.y);
}

/// Encoded size of one roster entry: id, name, position.
fn roster_entry_len(e: &RosterEntry) -> usize {
    4 + varint_len(e.name.len() as u32) + e.name.len() + 8
}

fn put_roster_entry(buf: &mut BytesMut, e: &RosterEntry) {
    buf.put_u32(e.id.into_inner());
    put_string(buf, &e.name);
    put_position(buf, e.position);
}

// ---------------------------------------------------------------------------
// Typed payloads
// ---------------------------------------------------------------------------

impl WireMessage for ClientMessage {
    fn message_type(&self) -> MessageType {
        ClientMessage::message_type(self)
    }

    fn encode_payload(&self, buf: &mut BytesMut) {
        match self {
            Self::Login { username, password } => {
                put_string(buf, username);
                put_string(buf, password);
            }
            Self::Logout | Self::AddPlayer => {}
            Self::Chat { target, text } => {
                match target {
                    Some(id) => {
                        buf.put_u8(1);
                        buf.put_u32(id.into_inner());
                    }
                    None => buf.put_u8(0),
                }
                put_string(buf, text);
            }
            Self::Move { key } => buf.put_u8(key.to_byte()),
            Self::ChangeRoom { room } => put_string(buf, room.as_str()),
        }
    }

    fn decode_payload(
        ty: MessageType,
        p: &mut PayloadReader,
    ) -> Result<Self, ProtocolError> {
        Ok(match ty {
            MessageType::Login => Self::Login {
                username: p.string("username")?,
                password: p.string("password")?,
            },
            MessageType::Logout => Self::Logout,
            MessageType::AddPlayer => Self::AddPlayer,
            MessageType::Chat => {
                let target = if p.bool("chat target flag")? {
                    Some(p.connection_id("chat target")?)
                } else {
                    None
                };
                Self::Chat {
                    target,
                    text: p.string("chat text")?,
                }
            }
            MessageType::Move => Self::Move {
                key: Direction::from_byte(p.u8("move key")?)?,
            },
            MessageType::ChangeRoom => Self::ChangeRoom {
                room: RoomId::new(p.string("room id")?),
            },
            other => return Err(ProtocolError::WrongDirection(other)),
        })
    }
}

impl WireMessage for ServerMessage {
    fn message_type(&self) -> MessageType {
        ServerMessage::message_type(self)
    }

    fn encode_payload(&self, buf: &mut BytesMut) {
        match self {
            Self::LoginAccepted {
                id,
                name,
                room,
                position,
            } => {
                buf.put_u32(id.into_inner());
                put_string(buf, name);
                put_string(buf, room.as_str());
                put_position(buf, *position);
            }
            Self::LoginRejected { reason } => buf.put_u8(reason.to_byte()),
            Self::PlayerJoined { entry } => put_roster_entry(buf, entry),
            Self::PlayerLeft { id } => buf.put_u32(id.into_inner()),
            Self::PositionUpdate { id, position } => {
                buf.put_u32(id.into_inner());
                put_position(buf, *position);
            }
            Self::RoomRoster { room, members } => {
                put_string(buf, room.as_str());
                put_varint(buf, members.len() as u32);
                for entry in members {
                    put_roster_entry(buf, entry);
                }
            }
            Self::ChatDelivery {
                from,
                name,
                text,
                private,
            } => {
                buf.put_u32(from.into_inner());
                put_string(buf, name);
                put_string(buf, text);
                buf.put_u8(*private as u8);
            }
            Self::Error { kind, detail } => {
                buf.put_u8(kind.to_byte());
                put_string(buf, detail);
            }
            Self::Kick { reason } => put_string(buf, reason),
        }
    }

    fn decode_payload(
        ty: MessageType,
        p: &mut PayloadReader,
    ) -> Result<Self, ProtocolError> {
        Ok(match ty {
            MessageType::LoginAccepted => Self::LoginAccepted {
                id: p.connection_id("player id")?,
                name: p.string("display name")?,
                room: RoomId::new(p.string("room id")?),
                position: p.position()?,
            },
            MessageType::LoginRejected => Self::LoginRejected {
                reason: RejectReason::from_byte(p.u8("reject reason")?)?,
            },
            MessageType::PlayerJoined => Self::PlayerJoined {
                entry: p.roster_entry()?,
            },
            MessageType::PlayerLeft => Self::PlayerLeft {
                id: p.connection_id("player id")?,
            },
            MessageType::PositionUpdate => Self::PositionUpdate {
                id: p.connection_id("player id")?,
                position: p.position()?,
            },
            MessageType::RoomRoster => {
                let room = RoomId::new(p.string("room id")?);
                let count = p.varint("roster length")?;
                // Every entry is at least 13 bytes; a count the payload
                // cannot hold is rejected before allocating.
                if count as usize > p.buf.remaining() / 13 {
                    return Err(ProtocolError::Truncated("roster"));
                }
                let members = (0..count)
                    .map(|_| p.roster_entry())
                    .collect::<Result<Vec<_>, _>>()?;
                Self::RoomRoster { room, members }
            }
            MessageType::ChatDelivery => Self::ChatDelivery {
                from: p.connection_id("sender id")?,
                name: p.string("sender name")?,
                text: p.string("chat text")?,
                private: p.bool("private flag")?,
            },
            MessageType::Error => Self::Error {
                kind: ErrorKind::from_byte(p.u8("error kind")?)?,
                detail: p.string("error detail")?,
            },
            MessageType::Kick => Self::Kick {
                reason: p.string("kick reason")?,
            },
            other => return Err(ProtocolError::WrongDirection(other)),
        })
    }
}
