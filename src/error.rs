//! Error types for the battle core.
//!
//! The simulation itself never fails: commands to missing ships return
//! `false` and ray casts return `None`. These errors cover the edges of the
//! crate (assets, build files, sockets and the wire codec).

use std::{fmt, io};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HullError {
    SizeMismatch {
        width: u32,
        height: u32,
        actual: usize,
    },
    Empty,
}

impl fmt::Display for HullError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SizeMismatch {
                width,
                height,
                actual,
            } => write!(
                f,
                "hull alpha buffer has {actual} bytes, expected {width}x{height}"
            ),
            Self::Empty => write!(f, "hull has zero width or height"),
        }
    }
}

impl std::error::Error for HullError {}

#[derive(Debug)]
pub enum BuildError {
    Read(io::Error),
    Parse(serde_json::Error),
}

impl fmt::Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read(e) => write!(f, "failed to read ship build: {e}"),
            Self::Parse(e) => write!(f, "failed to parse ship build: {e}"),
        }
    }
}

impl std::error::Error for BuildError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Read(e) => Some(e),
            Self::Parse(e) => Some(e),
        }
    }
}

impl From<io::Error> for BuildError {
    fn from(e: io::Error) -> Self {
        Self::Read(e)
    }
}

impl From<serde_json::Error> for BuildError {
    fn from(e: serde_json::Error) -> Self {
        Self::Parse(e)
    }
}

#[derive(Debug)]
pub enum ProtocolError {
    Encode(bincode::error::EncodeError),
    Decode(bincode::error::DecodeError),
    UnknownKind(u8),
    TrailingBytes(usize),
    FrameTooLarge { len: usize, max: usize },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode(e) => write!(f, "failed to encode message: {e}"),
            Self::Decode(e) => write!(f, "failed to decode message: {e}"),
            Self::UnknownKind(kind) => write!(f, "unknown message kind {kind}"),
            Self::TrailingBytes(n) => write!(f, "{n} unread bytes after message"),
            Self::FrameTooLarge { len, max } => {
                write!(f, "frame of {len} bytes exceeds the {max} byte limit")
            }
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Encode(e) => Some(e),
            Self::Decode(e) => Some(e),
            _ => None,
        }
    }
}

impl From<bincode::error::EncodeError> for ProtocolError {
    fn from(e: bincode::error::EncodeError) -> Self {
        Self::Encode(e)
    }
}

impl From<bincode::error::DecodeError> for ProtocolError {
    fn from(e: bincode::error::DecodeError) -> Self {
        Self::Decode(e)
    }
}

#[derive(Debug)]
pub enum NetError {
    Runtime(io::Error),
    Bind(io::Error),
    Accept(io::Error),
    Connect(io::Error),
    Timeout,
    Cancelled,
    NotConnected,
}

impl fmt::Display for NetError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Runtime(e) => write!(f, "failed to start network runtime: {e}"),
            Self::Bind(e) => write!(f, "failed to listen: {e}"),
            Self::Accept(e) => write!(f, "failed to accept peer: {e}"),
            Self::Connect(e) => write!(f, "failed to connect to peer: {e}"),
            Self::Timeout => write!(f, "timed out waiting for peer"),
            Self::Cancelled => write!(f, "connection attempt cancelled"),
            Self::NotConnected => write!(f, "no peer connected"),
        }
    }
}

impl std::error::Error for NetError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Runtime(e) | Self::Bind(e) | Self::Accept(e) | Self::Connect(e) => Some(e),
            _ => None,
        }
    }
}

/// A headless input line that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    Empty,
    UnknownCommand(String),
    BadArguments { command: String, usage: &'static str },
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty command"),
            Self::UnknownCommand(command) => write!(f, "unknown command `{command}`"),
            Self::BadArguments { command, usage } => {
                write!(f, "bad arguments for `{command}`, usage: {usage}")
            }
        }
    }
}

impl std::error::Error for InputError {}
