//! Connection orchestration
//!
//! The [`Controller`] owns the signaling session, the channel registry and
//! the capture manager, and is the only place where they meet. User actions
//! come in through its methods, client and device notifications through
//! [`Controller::handle_event`].

use tracing::debug;

use crate::capture::{CaptureDevices, CaptureManager};
use crate::error::{CaptureError, ChannelError, SessionError};
use crate::inbound;
use crate::model::capture::CaptureSource;
use crate::model::event::NetEvent;
use crate::model::ids::{HandleId, PeerId};
use crate::model::payload::Payload;
use crate::net::{PeerNetwork, PeerSession};
use crate::presenter::Presenter;
use crate::registry::ConnectionRegistry;
use crate::session::{Inbound, SessionManager, SessionState, SignalingSessionConfig};

pub struct Controller<N: PeerNetwork, D, P> {
    network: N,
    session: SessionManager<N::Session>,
    registry: ConnectionRegistry,
    capture: CaptureManager<D>,
    ui: P,
}

impl<N, D, P> Controller<N, D, P>
where
    N: PeerNetwork,
    D: CaptureDevices,
    P: Presenter,
{
    pub fn new(network: N, devices: D, ui: P) -> Controller<N, D, P> {
        Controller {
            network,
            session: SessionManager::new(),
            registry: ConnectionRegistry::new(),
            capture: CaptureManager::new(devices),
            ui,
        }
    }

    pub fn session_state(&self) -> Option<&SessionState> {
        self.session.state()
    }

    pub fn self_id(&self) -> Option<&PeerId> {
        self.session.self_id()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn capture(&self) -> &CaptureManager<D> {
        &self.capture
    }

    pub fn capture_mut(&mut self) -> &mut CaptureManager<D> {
        &mut self.capture
    }

    pub fn ui(&self) -> &P {
        &self.ui
    }

    pub fn ui_mut(&mut self) -> &mut P {
        &mut self.ui
    }

    pub fn start_session(&mut self, config: &SignalingSessionConfig) -> Result<HandleId, SessionError> {
        self.session.start(&mut self.network, config, &mut self.ui)
    }

    pub fn stop_session(&mut self) -> bool {
        self.session.stop(&mut self.ui)
    }

    pub async fn start_capture(&mut self, source: CaptureSource) -> Result<HandleId, CaptureError> {
        let stream = self.capture.acquire(source, &mut self.ui).await?;
        Ok(stream.id)
    }

    pub fn stop_capture(&mut self) -> bool {
        self.capture.release(&mut self.ui)
    }

    /// Opens an outbound data channel, replacing the active one.
    pub fn connect_data(&mut self, target: &str) -> Result<HandleId, ChannelError> {
        let target = self.outbound_target(target)?;
        let Some(session) = self.session.open_handle() else {
            self.ui.warn("Signaling session is not open, cannot connect");
            return Err(SessionError::NotOpen.into());
        };

        self.ui.info(format!("Opening data connection to {target}"));
        match session.connect(&target) {
            Ok(link) => {
                let id = link.id();
                self.registry.set_active_data(link, &mut self.ui);
                Ok(id)
            }
            Err(e) => {
                self.ui.error(format!("Data connection to {target} refused: {e}"));
                Err(ChannelError::Client(e))
            }
        }
    }

    /// Calls a peer with the held local stream, receive-only without one.
    pub fn connect_media(&mut self, target: &str) -> Result<HandleId, ChannelError> {
        let target = self.outbound_target(target)?;
        let Some(session) = self.session.open_handle() else {
            self.ui.warn("Signaling session is not open, cannot call");
            return Err(SessionError::NotOpen.into());
        };

        let local = self.capture.current();
        if local.is_none() {
            self.ui.warn("No local stream, calling in receive-only mode");
        }
        self.ui.info(format!("Opening media connection to {target}"));
        match session.call(&target, local) {
            Ok(link) => {
                let id = link.id();
                self.registry.set_active_media(link, &mut self.ui);
                Ok(id)
            }
            Err(e) => {
                self.ui.error(format!("Media connection to {target} refused: {e}"));
                Err(ChannelError::Client(e))
            }
        }
    }

    pub fn send(&mut self, payload: Payload) -> Result<(), ChannelError> {
        self.registry.send(payload, &mut self.ui)
    }

    pub fn close_data(&mut self) -> Result<(), ChannelError> {
        self.registry.close_data(&mut self.ui)
    }

    pub fn close_media(&mut self) -> Result<(), ChannelError> {
        self.registry.close_media(&mut self.ui)
    }

    fn outbound_target(&mut self, target: &str) -> Result<PeerId, ChannelError> {
        let target = target.trim();
        if target.is_empty() {
            self.ui.warn("No target peer id given");
            return Err(ChannelError::EmptyTarget);
        }
        Ok(PeerId::new(target))
    }

    /// Applies one notification from the networking client or the devices.
    pub fn handle_event(&mut self, event: NetEvent) {
        debug!("Event from handle {}", event.handle_id());
        match event {
            NetEvent::Session(id, event) => {
                let Some(inbound) = self.session.handle_event(id, event, &mut self.ui) else {
                    return;
                };
                match inbound {
                    Inbound::Data(link) => {
                        inbound::on_inbound_data(link, &mut self.registry, &mut self.ui)
                    }
                    Inbound::Call(call) => inbound::on_inbound_call(
                        call,
                        self.capture.current(),
                        &mut self.registry,
                        &mut self.ui,
                    ),
                }
            }
            NetEvent::Data(link, event) => {
                self.registry.handle_data_event(&link, event, &mut self.ui)
            }
            NetEvent::Media(link, event) => {
                self.registry.handle_media_event(&link, event, &mut self.ui)
            }
            NetEvent::CaptureEnded(id) => {
                debug!("Capture stream {} ended by device", id);
                self.capture.handle_ended(id, &mut self.ui)
            }
        }
    }
}
