//! Notifications delivered to the controller
//!
//! Everything the networking client and the capture devices report
//! asynchronously arrives as a [`NetEvent`]. Each event names the handle it
//! came from so the controller can drop notifications from superseded
//! handles.

use crate::error::ClientError;
use crate::model::capture::RemoteStream;
use crate::model::ids::{HandleId, PeerId};
use crate::model::payload::Payload;
use crate::net::{DataLink, IncomingCall};

#[derive(Debug)]
pub enum NetEvent {
    /// Lifecycle or inbound request on a signaling session.
    Session(HandleId, SessionEvent),

    /// Activity on a data channel.
    Data(LinkRef, DataEvent),

    /// Activity on a media channel.
    Media(LinkRef, MediaEvent),

    /// The device ended a local capture stream.
    CaptureEnded(HandleId),
}

#[derive(Debug)]
pub enum SessionEvent {
    Open(PeerId),
    Error(ClientError),
    Close,
    Connection(Box<dyn DataLink>),
    Call(Box<dyn IncomingCall>),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DataEvent {
    Open,
    Data(Payload),
    Close,
    Error(ClientError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Stream(RemoteStream),
    Close,
    Error(ClientError),
}

/// Names the channel handle an event belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRef {
    pub id: HandleId,
    pub remote: PeerId,
}

impl LinkRef {
    pub fn new(id: HandleId, remote: PeerId) -> LinkRef {
        LinkRef { id, remote }
    }
}

impl NetEvent {
    /// The handle this event was emitted by.
    pub fn handle_id(&self) -> HandleId {
        match self {
            NetEvent::Session(id, _) | NetEvent::CaptureEnded(id) => *id,
            NetEvent::Data(link, _) | NetEvent::Media(link, _) => link.id,
        }
    }
}
