//! Seam to the peer networking client
//!
//! The controller drives a signaling client through these traits and learns
//! about its progress only through [`NetEvent`](crate::model::event::NetEvent)s.
//! How the client talks to the rendezvous service and negotiates transports
//! is entirely its own business.

pub mod loopback;

use std::fmt;

use serde::Serialize;

use crate::error::ClientError;
use crate::model::capture::CaptureStream;
use crate::model::ids::{HandleId, PeerId};
use crate::model::payload::Payload;
use crate::model::relay::{self, RelayParam};
use crate::session::SignalingSessionConfig;

/// Construction parameters for one signaling session.
#[derive(Debug, Clone, Serialize)]
pub struct ClientParams {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub secure: bool,
    pub ice_servers: Vec<RelayParam>,
}

impl ClientParams {
    pub fn from_config(config: &SignalingSessionConfig) -> ClientParams {
        ClientParams {
            host: config.host.clone(),
            port: config.port,
            path: config.path.clone(),
            secure: config.use_tls,
            ice_servers: relay::resolve(&config.relay_servers),
        }
    }

    pub fn endpoint_url(&self) -> String {
        let scheme = if self.secure { "wss" } else { "ws" };
        format!("{}://{}:{}{}", scheme, self.host, self.port, self.path)
    }
}

/// Credentials are left out so the rendering can go straight to the log.
impl fmt::Display for ClientParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ice=[", self.endpoint_url())?;
        for (i, server) in self.ice_servers.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            f.write_str(&server.url)?;
            if server.username.is_some() {
                f.write_str(" (auth)")?;
            }
        }
        f.write_str("]")
    }
}

pub trait PeerNetwork {
    type Session: PeerSession;

    /// Constructs a session handle. Readiness is reported later through a
    /// `SessionEvent::Open`.
    fn open(&mut self, params: &ClientParams) -> Result<Self::Session, ClientError>;
}

pub trait PeerSession {
    fn id(&self) -> HandleId;

    fn connect(&mut self, remote: &PeerId) -> Result<Box<dyn DataLink>, ClientError>;

    fn call(
        &mut self,
        remote: &PeerId,
        stream: Option<&CaptureStream>,
    ) -> Result<Box<dyn MediaLink>, ClientError>;

    fn destroy(&mut self);
}

/// Behaviour shared by data and media channel handles.
pub trait Link: fmt::Debug {
    fn id(&self) -> HandleId;

    fn remote(&self) -> &PeerId;

    fn close(&mut self);
}

pub trait DataLink: Link {
    fn send(&mut self, payload: &Payload) -> Result<(), ClientError>;
}

pub trait MediaLink: Link {}

/// An unsolicited media request waiting to be answered.
pub trait IncomingCall: fmt::Debug {
    fn id(&self) -> HandleId;

    fn remote(&self) -> &PeerId;

    /// Answers the request, optionally offering a local stream in return.
    fn answer(self: Box<Self>, stream: Option<&CaptureStream>) -> Box<dyn MediaLink>;
}
