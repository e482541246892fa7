//! Wire format for peer messages
//!
//! Every message travels as one frame: a big-endian `u32` payload length
//! followed by the payload. Payloads start with a one-byte kind and carry
//! big-endian fixed-width fields:
//!
//! | kind | byte | fields |
//! |------------|---|-------------------------------------------------------------|
//! | CONNECT    | 0 | f32 x, f32 y, f32 angle, u32 count, count × (u8 kind, f32 x, f32 y) |
//! | DISCONNECT | 1 | none |
//! | MOVE       | 2 | u32 ship, f32 x, f32 y |
//! | FIRE       | 3 | u32 ship, f32 x, f32 y |
//!
//! Angles are radians. There is no version field and no checksum.

use crate::components::{ProjectileKind, TurretBuild};
use crate::error::ProtocolError;
use bincode::config::{BigEndian, Configuration, Fixint};
use bincode::de::Decoder;
use bincode::enc::Encoder;
use bincode::error::{AllowedEnumVariants, DecodeError, EncodeError};
use bincode::{Decode, Encode};
use std::io;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload accepted in either direction.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

const FRAME_HEADER_LEN: usize = 4;
const TURRET_RECORD_LEN: usize = 9;

fn wire_config() -> Configuration<BigEndian, Fixint> {
    bincode::config::standard()
        .with_big_endian()
        .with_fixed_int_encoding()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    Connect = 0,
    Disconnect = 1,
    Move = 2,
    Fire = 3,
}

impl MessageKind {
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(MessageKind::Connect),
            1 => Some(MessageKind::Disconnect),
            2 => Some(MessageKind::Move),
            3 => Some(MessageKind::Fire),
            _ => None,
        }
    }
}

/// A command exchanged between the two battle peers.
#[derive(Debug, Clone, PartialEq)]
pub enum PeerMessage {
    /// The sender's ship has entered the battle.
    Connect {
        position: [f32; 2],
        angle: f32,
        turrets: Vec<TurretBuild>,
    },
    Disconnect,
    Move { ship: u32, destination: [f32; 2] },
    Fire { ship: u32, target: [f32; 2] },
}

impl PeerMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            PeerMessage::Connect { .. } => MessageKind::Connect,
            PeerMessage::Disconnect => MessageKind::Disconnect,
            PeerMessage::Move { .. } => MessageKind::Move,
            PeerMessage::Fire { .. } => MessageKind::Fire,
        }
    }
}

impl Encode for PeerMessage {
    fn encode<E: Encoder>(&self, encoder: &mut E) -> Result<(), EncodeError> {
        (self.kind() as u8).encode(encoder)?;
        match self {
            PeerMessage::Connect {
                position,
                angle,
                turrets,
            } => {
                position[0].encode(encoder)?;
                position[1].encode(encoder)?;
                angle.encode(encoder)?;
                let count = u32::try_from(turrets.len())
                    .map_err(|_| EncodeError::Other("too many turrets for one message"))?;
                count.encode(encoder)?;
                for turret in turrets {
                    turret.kind.as_u8().encode(encoder)?;
                    turret.local_position[0].encode(encoder)?;
                    turret.local_position[1].encode(encoder)?;
                }
            }
            PeerMessage::Disconnect => {}
            PeerMessage::Move {
                ship,
                destination: point,
            }
            | PeerMessage::Fire {
                ship,
                target: point,
            } => {
                ship.encode(encoder)?;
                point[0].encode(encoder)?;
                point[1].encode(encoder)?;
            }
        }
        Ok(())
    }
}

static MESSAGE_KINDS: AllowedEnumVariants = AllowedEnumVariants::Range { min: 0, max: 3 };
static PROJECTILE_KINDS: AllowedEnumVariants = AllowedEnumVariants::Range { min: 0, max: 2 };

fn decode_point<D: Decoder>(decoder: &mut D) -> Result<[f32; 2], DecodeError> {
    Ok([f32::decode(decoder)?, f32::decode(decoder)?])
}

impl<Context> Decode<Context> for PeerMessage {
    fn decode<D: Decoder<Context = Context>>(decoder: &mut D) -> Result<Self, DecodeError> {
        let tag = u8::decode(decoder)?;
        let kind = MessageKind::from_u8(tag).ok_or(DecodeError::UnexpectedVariant {
            type_name: "PeerMessage",
            allowed: &MESSAGE_KINDS,
            found: u32::from(tag),
        })?;

        let message = match kind {
            MessageKind::Connect => {
                let position = decode_point(decoder)?;
                let angle = f32::decode(decoder)?;
                let count = u32::decode(decoder)? as usize;
                let mut turrets =
                    Vec::with_capacity(count.min(MAX_FRAME_SIZE / TURRET_RECORD_LEN));
                for _ in 0..count {
                    let tag = u8::decode(decoder)?;
                    let kind =
                        ProjectileKind::from_u8(tag).ok_or(DecodeError::UnexpectedVariant {
                            type_name: "ProjectileKind",
                            allowed: &PROJECTILE_KINDS,
                            found: u32::from(tag),
                        })?;
                    turrets.push(TurretBuild {
                        kind,
                        local_position: decode_point(decoder)?,
                    });
                }
                PeerMessage::Connect {
                    position,
                    angle,
                    turrets,
                }
            }
            MessageKind::Disconnect => PeerMessage::Disconnect,
            MessageKind::Move => PeerMessage::Move {
                ship: u32::decode(decoder)?,
                destination: decode_point(decoder)?,
            },
            MessageKind::Fire => PeerMessage::Fire {
                ship: u32::decode(decoder)?,
                target: decode_point(decoder)?,
            },
        };
        Ok(message)
    }
}

pub fn encode_payload(message: &PeerMessage) -> Result<Vec<u8>, ProtocolError> {
    let payload = bincode::encode_to_vec(message, wire_config())?;
    if payload.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            len: payload.len(),
            max: MAX_FRAME_SIZE,
        });
    }
    Ok(payload)
}

/// Encodes `message` with its length prefix, ready to write to the socket.
pub fn encode_frame(message: &PeerMessage) -> Result<Vec<u8>, ProtocolError> {
    let payload = encode_payload(message)?;
    let mut frame = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
    // Checked against MAX_FRAME_SIZE above, so the length fits.
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Decodes one frame payload. The whole payload must be consumed.
pub fn decode_payload(payload: &[u8]) -> Result<PeerMessage, ProtocolError> {
    if let Some(&tag) = payload.first()
        && MessageKind::from_u8(tag).is_none()
    {
        return Err(ProtocolError::UnknownKind(tag));
    }
    let (message, read) = bincode::decode_from_slice(payload, wire_config())?;
    if read != payload.len() {
        return Err(ProtocolError::TrailingBytes(payload.len() - read));
    }
    Ok(message)
}

/// Reads one frame payload.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly between frames.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> io::Result<Option<Vec<u8>>> {
    let mut header = [0u8; FRAME_HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e),
    }

    let len = u32::from_be_bytes(header) as usize;
    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            ProtocolError::FrameTooLarge {
                len,
                max: MAX_FRAME_SIZE,
            },
        ));
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(Some(payload))
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &PeerMessage,
) -> io::Result<()> {
    let frame = encode_frame(message).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    writer.write_all(&frame).await?;
    writer.flush().await
}
