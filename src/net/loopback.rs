//! In-process loopback networking client
//!
//! Sessions opened through the same [`LoopbackHub`] can reach each other by
//! peer id, which makes the tester usable without a rendezvous service and
//! gives tests a client with realistic event ordering. A built-in `echo`
//! peer sends every data payload straight back and answers calls by
//! mirroring the offered tracks.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use str0m::media::MediaKind;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::ClientError;
use crate::model::capture::{CaptureStream, RemoteStream, TrackInfo};
use crate::model::event::{DataEvent, LinkRef, MediaEvent, NetEvent, SessionEvent};
use crate::model::ids::{HandleId, PeerId};
use crate::model::payload::Payload;
use crate::net::{
    ClientParams, DataLink, IncomingCall, Link, MediaLink, PeerNetwork, PeerSession,
};

/// Peer id of the built-in echo responder.
pub const ECHO_PEER: &str = "echo";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkKind {
    Data,
    Media,
}

#[derive(Debug)]
struct SessionEntry {
    peer: PeerId,
    events: UnboundedSender<NetEvent>,
}

#[derive(Debug)]
struct LinkEntry {
    session: HandleId,
    remote: PeerId,
    kind: LinkKind,
    partner: Option<HandleId>,
    /// Tracks offered by the caller, delivered when an inbound call is answered.
    offered: Option<Vec<TrackInfo>>,
}

#[derive(Debug, Default)]
struct Hub {
    sessions: HashMap<HandleId, SessionEntry>,
    links: HashMap<HandleId, LinkEntry>,
}

impl Hub {
    fn emit(&self, session: HandleId, event: NetEvent) {
        let Some(entry) = self.sessions.get(&session) else {
            debug!("Dropping event for destroyed session {}: {:?}", session, event);
            return;
        };
        // A dropped receiver means the controller is gone.
        let _ = entry.events.send(event);
    }

    fn peer_of(&self, session: HandleId) -> Result<PeerId, ClientError> {
        self.sessions
            .get(&session)
            .map(|s| s.peer.clone())
            .ok_or_else(|| ClientError::new("disconnected", "session has been destroyed"))
    }

    fn session_by_peer(&self, peer: &PeerId) -> Option<HandleId> {
        self.sessions
            .iter()
            .find(|(_, s)| &s.peer == peer)
            .map(|(id, _)| *id)
    }

    fn register_link(
        &mut self,
        session: HandleId,
        remote: PeerId,
        kind: LinkKind,
        partner: Option<HandleId>,
    ) -> HandleId {
        let id = HandleId::next();
        self.links.insert(
            id,
            LinkEntry {
                session,
                remote,
                kind,
                partner,
                offered: None,
            },
        );
        id
    }

    fn closed_event(id: HandleId, entry: &LinkEntry) -> NetEvent {
        let link = LinkRef::new(id, entry.remote.clone());
        match entry.kind {
            LinkKind::Data => NetEvent::Data(link, DataEvent::Close),
            LinkKind::Media => NetEvent::Media(link, MediaEvent::Close),
        }
    }

    /// Closes a link and its partner. Closing an unknown link does nothing.
    fn close_link(&mut self, id: HandleId) {
        let Some(entry) = self.links.remove(&id) else {
            return;
        };
        self.emit(entry.session, Hub::closed_event(id, &entry));
        if let Some(partner) = entry.partner {
            self.close_link(partner);
        }
    }

    fn destroy_session(&mut self, session: HandleId) {
        let owned: Vec<HandleId> = self
            .links
            .iter()
            .filter(|(_, l)| l.session == session)
            .map(|(id, _)| *id)
            .collect();
        for id in owned {
            self.close_link(id);
        }
        self.emit(session, NetEvent::Session(session, SessionEvent::Close));
        self.sessions.remove(&session);
    }
}

/// Shared rendezvous point for loopback sessions.
#[derive(Debug, Clone, Default)]
pub struct LoopbackHub {
    inner: Rc<RefCell<Hub>>,
}

impl LoopbackHub {
    pub fn new() -> LoopbackHub {
        LoopbackHub::default()
    }

    /// A networking client whose sessions report to `events`.
    pub fn network(&self, events: UnboundedSender<NetEvent>) -> LoopbackNetwork {
        LoopbackNetwork {
            hub: self.clone(),
            events,
        }
    }
}

#[derive(Debug)]
pub struct LoopbackNetwork {
    hub: LoopbackHub,
    events: UnboundedSender<NetEvent>,
}

impl LoopbackNetwork {
    pub fn new(events: UnboundedSender<NetEvent>) -> LoopbackNetwork {
        LoopbackHub::new().network(events)
    }
}

impl PeerNetwork for LoopbackNetwork {
    type Session = LoopbackSession;

    fn open(&mut self, params: &ClientParams) -> Result<LoopbackSession, ClientError> {
        let id = HandleId::next();
        let peer = PeerId::new(Uuid::new_v4().to_string());
        info!("Loopback session {} standing in for {}", id, params.endpoint_url());

        let mut hub = self.hub.inner.borrow_mut();
        hub.sessions.insert(
            id,
            SessionEntry {
                peer: peer.clone(),
                events: self.events.clone(),
            },
        );
        hub.emit(id, NetEvent::Session(id, SessionEvent::Open(peer)));

        Ok(LoopbackSession {
            id,
            hub: self.hub.clone(),
        })
    }
}

#[derive(Debug)]
pub struct LoopbackSession {
    id: HandleId,
    hub: LoopbackHub,
}

fn test_pattern() -> Vec<TrackInfo> {
    vec![
        TrackInfo {
            kind: MediaKind::Video,
            label: "echo test pattern".into(),
        },
        TrackInfo {
            kind: MediaKind::Audio,
            label: "echo tone".into(),
        },
    ]
}

fn peer_unavailable(remote: &PeerId) -> ClientError {
    ClientError::new("peer-unavailable", format!("could not connect to peer {remote}"))
}

impl PeerSession for LoopbackSession {
    fn id(&self) -> HandleId {
        self.id
    }

    fn connect(&mut self, remote: &PeerId) -> Result<Box<dyn DataLink>, ClientError> {
        let mut hub = self.hub.inner.borrow_mut();
        let local = hub.peer_of(self.id)?;
        let id = hub.register_link(self.id, remote.clone(), LinkKind::Data, None);
        let link = LinkRef::new(id, remote.clone());

        if remote.as_str() == ECHO_PEER {
            hub.emit(self.id, NetEvent::Data(link, DataEvent::Open));
        } else if let Some(target) = hub.session_by_peer(remote) {
            let inbound = hub.register_link(target, local.clone(), LinkKind::Data, Some(id));
            if let Some(entry) = hub.links.get_mut(&id) {
                entry.partner = Some(inbound);
            }
            let incoming = LoopbackDataLink {
                id: inbound,
                remote: local.clone(),
                hub: self.hub.clone(),
            };
            hub.emit(
                target,
                NetEvent::Session(target, SessionEvent::Connection(Box::new(incoming))),
            );
            hub.emit(self.id, NetEvent::Data(link, DataEvent::Open));
            hub.emit(target, NetEvent::Data(LinkRef::new(inbound, local), DataEvent::Open));
        } else {
            hub.emit(self.id, NetEvent::Data(link, DataEvent::Error(peer_unavailable(remote))));
        }

        Ok(Box::new(LoopbackDataLink {
            id,
            remote: remote.clone(),
            hub: self.hub.clone(),
        }))
    }

    fn call(
        &mut self,
        remote: &PeerId,
        stream: Option<&CaptureStream>,
    ) -> Result<Box<dyn MediaLink>, ClientError> {
        let mut hub = self.hub.inner.borrow_mut();
        let local = hub.peer_of(self.id)?;
        let id = hub.register_link(self.id, remote.clone(), LinkKind::Media, None);
        let link = LinkRef::new(id, remote.clone());
        let offered = stream.map(CaptureStream::track_info);

        if remote.as_str() == ECHO_PEER {
            let tracks = offered.filter(|t| !t.is_empty()).unwrap_or_else(test_pattern);
            let echoed = RemoteStream {
                peer: remote.clone(),
                tracks,
            };
            hub.emit(self.id, NetEvent::Media(link, MediaEvent::Stream(echoed)));
        } else if let Some(target) = hub.session_by_peer(remote) {
            let inbound = hub.register_link(target, local.clone(), LinkKind::Media, Some(id));
            if let Some(entry) = hub.links.get_mut(&inbound) {
                entry.offered = offered;
            }
            if let Some(entry) = hub.links.get_mut(&id) {
                entry.partner = Some(inbound);
            }
            let request = LoopbackCall {
                id: inbound,
                remote: local,
                hub: self.hub.clone(),
            };
            hub.emit(target, NetEvent::Session(target, SessionEvent::Call(Box::new(request))));
        } else {
            hub.emit(self.id, NetEvent::Media(link, MediaEvent::Error(peer_unavailable(remote))));
        }

        Ok(Box::new(LoopbackMediaLink {
            id,
            remote: remote.clone(),
            hub: self.hub.clone(),
        }))
    }

    fn destroy(&mut self) {
        self.hub.inner.borrow_mut().destroy_session(self.id);
    }
}

#[derive(Debug)]
pub struct LoopbackDataLink {
    id: HandleId,
    remote: PeerId,
    hub: LoopbackHub,
}

impl Link for LoopbackDataLink {
    fn id(&self) -> HandleId {
        self.id
    }

    fn remote(&self) -> &PeerId {
        &self.remote
    }

    fn close(&mut self) {
        self.hub.inner.borrow_mut().close_link(self.id);
    }
}

impl DataLink for LoopbackDataLink {
    fn send(&mut self, payload: &Payload) -> Result<(), ClientError> {
        let hub = self.hub.inner.borrow();
        let entry = hub
            .links
            .get(&self.id)
            .ok_or_else(|| ClientError::new("closed", "data connection is closed"))?;

        // Payloads cross the hub in wire form, like they would over a transport.
        let delivered = Payload::from_wire(&payload.to_wire());

        if let Some((partner, far)) = entry
            .partner
            .and_then(|p| hub.links.get(&p).map(|far| (p, far)))
        {
            let link = LinkRef::new(partner, far.remote.clone());
            hub.emit(far.session, NetEvent::Data(link, DataEvent::Data(delivered)));
            Ok(())
        } else if entry.remote.as_str() == ECHO_PEER {
            let link = LinkRef::new(self.id, entry.remote.clone());
            hub.emit(entry.session, NetEvent::Data(link, DataEvent::Data(delivered)));
            Ok(())
        } else {
            Err(ClientError::new("not-open", format!("{} is not reachable", entry.remote)))
        }
    }
}

#[derive(Debug)]
pub struct LoopbackMediaLink {
    id: HandleId,
    remote: PeerId,
    hub: LoopbackHub,
}

impl Link for LoopbackMediaLink {
    fn id(&self) -> HandleId {
        self.id
    }

    fn remote(&self) -> &PeerId {
        &self.remote
    }

    fn close(&mut self) {
        self.hub.inner.borrow_mut().close_link(self.id);
    }
}

impl MediaLink for LoopbackMediaLink {}

#[derive(Debug)]
pub struct LoopbackCall {
    id: HandleId,
    remote: PeerId,
    hub: LoopbackHub,
}

impl IncomingCall for LoopbackCall {
    fn id(&self) -> HandleId {
        self.id
    }

    fn remote(&self) -> &PeerId {
        &self.remote
    }

    fn answer(self: Box<Self>, stream: Option<&CaptureStream>) -> Box<dyn MediaLink> {
        let LoopbackCall { id, remote, hub } = *self;
        {
            let hub = hub.inner.borrow();
            if let Some(entry) = hub.links.get(&id) {
                // The caller's tracks reach the answering side.
                if let Some(tracks) = entry.offered.clone().filter(|t| !t.is_empty()) {
                    let remote_stream = RemoteStream {
                        peer: remote.clone(),
                        tracks,
                    };
                    let link = LinkRef::new(id, remote.clone());
                    hub.emit(entry.session, NetEvent::Media(link, MediaEvent::Stream(remote_stream)));
                }

                // And the answer's tracks, if any, reach the caller.
                let answered = stream.map(CaptureStream::track_info).filter(|t| !t.is_empty());
                if let (Some(tracks), Some(partner)) = (answered, entry.partner) {
                    if let Some(far) = hub.links.get(&partner) {
                        let remote_stream = RemoteStream {
                            peer: far.remote.clone(),
                            tracks,
                        };
                        let link = LinkRef::new(partner, far.remote.clone());
                        hub.emit(far.session, NetEvent::Media(link, MediaEvent::Stream(remote_stream)));
                    }
                }
            }
        }

        Box::new(LoopbackMediaLink { id, remote, hub })
    }
}
