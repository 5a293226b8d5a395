//! Signaling session lifecycle
//!
//! Exactly one session exists at a time. Starting a new one destroys the
//! previous handle before the replacement is constructed, and events from a
//! destroyed handle are ignored.

use tracing::debug;

use crate::error::{ClientError, SessionError};
use crate::model::event::SessionEvent;
use crate::model::ids::{HandleId, PeerId};
use crate::model::relay::RelayServerDescriptor;
use crate::net::{ClientParams, DataLink, IncomingCall, PeerNetwork, PeerSession};
use crate::presenter::{Affordance, Presenter};

/// Validated connection settings, fixed for the lifetime of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalingSessionConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub use_tls: bool,
    pub relay_servers: Vec<RelayServerDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Connecting,
    Open(PeerId),
    Closed,
    Failed(ClientError),
}

/// An unsolicited request forwarded out of the session.
#[derive(Debug)]
pub enum Inbound {
    Data(Box<dyn DataLink>),
    Call(Box<dyn IncomingCall>),
}

#[derive(Debug)]
struct ActiveSession<S> {
    handle: S,
    state: SessionState,
}

#[derive(Debug)]
pub struct SessionManager<S> {
    current: Option<ActiveSession<S>>,
}

impl<S> Default for SessionManager<S> {
    fn default() -> Self {
        SessionManager { current: None }
    }
}

impl<S: PeerSession> SessionManager<S> {
    pub fn new() -> SessionManager<S> {
        SessionManager::default()
    }

    pub fn state(&self) -> Option<&SessionState> {
        self.current.as_ref().map(|s| &s.state)
    }

    pub fn self_id(&self) -> Option<&PeerId> {
        match self.state() {
            Some(SessionState::Open(id)) => Some(id),
            _ => None,
        }
    }

    /// The session handle, if it is open for outbound actions.
    pub fn open_handle(&mut self) -> Option<&mut S> {
        self.current
            .as_mut()
            .filter(|s| matches!(s.state, SessionState::Open(_)))
            .map(|s| &mut s.handle)
    }

    /// Tears down any existing session, then constructs a new one.
    ///
    /// Malformed relay descriptors are rejected before anything is torn down.
    pub fn start<N, P>(
        &mut self,
        network: &mut N,
        config: &SignalingSessionConfig,
        ui: &mut P,
    ) -> Result<HandleId, SessionError>
    where
        N: PeerNetwork<Session = S>,
        P: Presenter,
    {
        if let Some(e) = config
            .relay_servers
            .iter()
            .find_map(|relay| relay.validate().err())
        {
            ui.error(format!("Invalid relay configuration: {e}"));
            return Err(e.into());
        }

        if self.teardown() {
            ui.warn("Existing signaling session destroyed");
            ui.self_id(None);
            ui.affordance(Affordance::Outbound, false);
        }

        let params = ClientParams::from_config(config);
        ui.info(format!("Signaling session settings: {params}"));
        ui.status("Connecting...");

        match network.open(&params) {
            Ok(handle) => {
                let id = handle.id();
                debug!("Session {} constructed, waiting for open", id);
                self.current = Some(ActiveSession {
                    handle,
                    state: SessionState::Connecting,
                });
                Ok(id)
            }
            Err(e) => {
                ui.error(format!("Failed to construct signaling session: {e}"));
                ui.status("Initialization error");
                Err(SessionError::Construct(e))
            }
        }
    }

    /// Destroys the current session. Returns false when there was none.
    pub fn stop<P: Presenter>(&mut self, ui: &mut P) -> bool {
        if !self.teardown() {
            return false;
        }
        ui.warn("Signaling session destroyed");
        ui.status("Disconnected");
        ui.self_id(None);
        ui.affordance(Affordance::Outbound, false);
        true
    }

    fn teardown(&mut self) -> bool {
        match self.current.take() {
            Some(mut session) => {
                session.handle.destroy();
                true
            }
            None => false,
        }
    }

    /// Applies a session event. Inbound requests are handed back unchanged.
    pub fn handle_event<P: Presenter>(
        &mut self,
        id: HandleId,
        event: SessionEvent,
        ui: &mut P,
    ) -> Option<Inbound> {
        let Some(session) = self.current.as_mut().filter(|s| s.handle.id() == id) else {
            debug!("Ignoring event from stale session {}: {:?}", id, event);
            return None;
        };

        match event {
            SessionEvent::Open(peer) => {
                if session.state != SessionState::Connecting {
                    debug!("Session {} open while {:?}", id, session.state);
                    return None;
                }
                ui.info(format!("Connected to signaling server, assigned id {peer}"));
                ui.self_id(Some(&peer));
                ui.status(&format!("Connected (ID: {peer})"));
                ui.affordance(Affordance::Outbound, true);
                session.state = SessionState::Open(peer);
                None
            }
            SessionEvent::Error(e) => {
                if matches!(session.state, SessionState::Closed | SessionState::Failed(_)) {
                    debug!("Session {} error after {:?}: {}", id, session.state, e);
                    return None;
                }
                ui.error(format!("Signaling session error: {e}"));
                ui.status("Connection error");
                ui.affordance(Affordance::Outbound, false);
                session.state = SessionState::Failed(e);
                None
            }
            SessionEvent::Close => {
                if session.state == SessionState::Closed {
                    return None;
                }
                ui.warn("Signaling session closed");
                ui.status("Disconnected");
                ui.self_id(None);
                ui.affordance(Affordance::Outbound, false);
                session.state = SessionState::Closed;
                None
            }
            SessionEvent::Connection(link) => Some(Inbound::Data(link)),
            SessionEvent::Call(call) => Some(Inbound::Call(call)),
        }
    }
}
