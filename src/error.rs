use std::io;

use thiserror::Error;

use crate::model::capture::CaptureSource;
use crate::model::ids::PeerId;

/// An error value reported by the networking client, either as the result
/// of a call or inside an error event.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct ClientError {
    pub kind: String,
    pub message: String,
}

impl ClientError {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> ClientError {
        ClientError {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

/// Malformed settings, detected before a session is constructed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("signaling host is empty")]
    EmptyHost,
    #[error("invalid signaling port {0:?}")]
    InvalidPort(String),
    #[error("signaling path {0:?} must start with '/'")]
    InvalidPath(String),
    #[error("invalid relay server address {0:?}, expected host:port")]
    InvalidRelay(String),
    #[error("no relay server at index {0}")]
    RelayIndex(usize),
    #[error("at least one relay server entry is required")]
    LastRelay,
    #[error("settings file: {0}")]
    Io(#[from] io::Error),
    #[error("settings format: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("networking client could not be constructed: {0}")]
    Construct(#[source] ClientError),
    #[error("no open signaling session")]
    NotOpen,
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("no target peer id given")]
    EmptyTarget,
    #[error("no active data connection")]
    NoActiveData,
    #[error("no active media connection")]
    NoActiveMedia,
    #[error("data connection to {0} is not open yet")]
    NotOpen(PeerId),
    #[error("networking client refused the request: {0}")]
    Client(#[source] ClientError),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CaptureError {
    #[error("permission to capture {0} was denied")]
    PermissionDenied(CaptureSource),
    #[error("no {0} capture device available")]
    NoDevice(CaptureSource),
    #[error("{0} capture is not supported")]
    Unsupported(CaptureSource),
}
