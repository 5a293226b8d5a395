//! Single-slot registry for the active data and media channels
//!
//! Installing a handle closes the previously active handle of the same kind
//! first. Events are matched against the active slot by handle id, so
//! notifications from a superseded handle never clobber its replacement.

use tracing::debug;

use crate::error::ChannelError;
use crate::model::event::{DataEvent, LinkRef, MediaEvent};
use crate::model::ids::{HandleId, LinkState, PeerId};
use crate::model::payload::Payload;
use crate::net::{DataLink, Link, MediaLink};
use crate::presenter::{Affordance, Presenter};

#[derive(Debug)]
struct Slot<L: ?Sized> {
    link: Box<L>,
    state: LinkState,
}

impl<L: Link + ?Sized> Slot<L> {
    fn new(link: Box<L>) -> Slot<L> {
        Slot {
            link,
            state: LinkState::Opening,
        }
    }

    fn is(&self, id: HandleId) -> bool {
        self.link.id() == id
    }

    /// Moves to `next`, returning false if the transition is not allowed.
    fn advance(&mut self, next: LinkState) -> bool {
        match self.state.advance(next) {
            Some(state) => {
                self.state = state;
                true
            }
            None => {
                debug!(
                    "Link {} ignoring transition {:?} -> {:?}",
                    self.link.id(),
                    self.state,
                    next
                );
                false
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    data: Option<Slot<dyn DataLink>>,
    media: Option<Slot<dyn MediaLink>>,
}

impl ConnectionRegistry {
    pub fn new() -> ConnectionRegistry {
        ConnectionRegistry::default()
    }

    pub fn active_data(&self) -> Option<(HandleId, LinkState)> {
        self.data.as_ref().map(|s| (s.link.id(), s.state))
    }

    pub fn active_media(&self) -> Option<(HandleId, LinkState)> {
        self.media.as_ref().map(|s| (s.link.id(), s.state))
    }

    pub fn data_peer(&self) -> Option<&PeerId> {
        self.data.as_ref().map(|s| s.link.remote())
    }

    pub fn media_peer(&self) -> Option<&PeerId> {
        self.media.as_ref().map(|s| s.link.remote())
    }

    pub fn set_active_data<P: Presenter>(&mut self, link: Box<dyn DataLink>, ui: &mut P) {
        if let Some(mut previous) = self.data.take() {
            debug!("Data link {} superseded by {}", previous.link.id(), link.id());
            previous.link.close();
            ui.affordance(Affordance::SendData, false);
        }
        self.data = Some(Slot::new(link));
    }

    pub fn set_active_media<P: Presenter>(&mut self, link: Box<dyn MediaLink>, ui: &mut P) {
        if let Some(mut previous) = self.media.take() {
            debug!("Media link {} superseded by {}", previous.link.id(), link.id());
            previous.link.close();
            ui.remote_stream(None);
        }
        self.media = Some(Slot::new(link));
        ui.affordance(Affordance::HangUp, true);
    }

    pub fn handle_data_event<P: Presenter>(&mut self, link: &LinkRef, event: DataEvent, ui: &mut P) {
        let peer = &link.remote;
        let active = self.data.as_mut().filter(|s| s.is(link.id));

        match event {
            DataEvent::Open => {
                let Some(slot) = active else {
                    debug!("Open from inactive data link {}", link.id);
                    return;
                };
                if slot.advance(LinkState::Open) {
                    ui.info(format!("Data connection established (peer: {peer})"));
                    ui.affordance(Affordance::SendData, true);
                }
            }
            DataEvent::Data(payload) => {
                ui.info(format!("Data received (from {peer}): {payload}"));
            }
            DataEvent::Close => {
                ui.warn(format!("Data connection closed (peer: {peer})"));
                if let Some(slot) = active {
                    slot.advance(LinkState::Closed);
                    self.data = None;
                    ui.affordance(Affordance::SendData, false);
                }
            }
            DataEvent::Error(e) => {
                ui.error(format!("Data connection error (peer: {peer}): {e}"));
                if let Some(slot) = active {
                    slot.advance(LinkState::Failed);
                    slot.link.close();
                    self.data = None;
                    ui.affordance(Affordance::SendData, false);
                }
            }
        }
    }

    pub fn handle_media_event<P: Presenter>(
        &mut self,
        link: &LinkRef,
        event: MediaEvent,
        ui: &mut P,
    ) {
        let peer = &link.remote;
        let active = self.media.as_mut().filter(|s| s.is(link.id));

        match event {
            MediaEvent::Stream(stream) => {
                let Some(slot) = active else {
                    debug!("Stream from inactive media link {}", link.id);
                    return;
                };
                if slot.state == LinkState::Opening {
                    slot.advance(LinkState::Open);
                }
                if slot.state == LinkState::Open {
                    ui.info(format!("Remote stream received: {stream}"));
                    ui.remote_stream(Some(&stream));
                }
            }
            MediaEvent::Close => {
                ui.warn(format!("Media connection closed (peer: {peer})"));
                if let Some(slot) = active {
                    slot.advance(LinkState::Closed);
                    self.clear_media(ui);
                }
            }
            MediaEvent::Error(e) => {
                ui.error(format!("Media connection error (peer: {peer}): {e}"));
                if let Some(slot) = active {
                    slot.advance(LinkState::Failed);
                    slot.link.close();
                    self.clear_media(ui);
                }
            }
        }
    }

    fn clear_media<P: Presenter>(&mut self, ui: &mut P) {
        self.media = None;
        ui.remote_stream(None);
        ui.affordance(Affordance::HangUp, false);
    }

    /// Sends on the active data channel, which must be open.
    pub fn send<P: Presenter>(&mut self, payload: Payload, ui: &mut P) -> Result<(), ChannelError> {
        let Some(slot) = self.data.as_mut() else {
            ui.warn("No active data connection, message not sent");
            return Err(ChannelError::NoActiveData);
        };
        let peer = slot.link.remote().clone();
        if slot.state != LinkState::Open {
            ui.warn(format!("Data connection to {peer} is not open yet, message not sent"));
            return Err(ChannelError::NotOpen(peer));
        }

        ui.info(format!("Sending data (to {peer}): {payload}"));
        slot.link.send(&payload).map_err(|e| {
            ui.error(format!("Failed to send data to {peer}: {e}"));
            ChannelError::Client(e)
        })
    }

    pub fn close_data<P: Presenter>(&mut self, ui: &mut P) -> Result<(), ChannelError> {
        let Some(mut slot) = self.data.take() else {
            ui.warn("No active data connection to close");
            return Err(ChannelError::NoActiveData);
        };
        ui.info(format!("Closing data connection (peer: {})", slot.link.remote()));
        slot.link.close();
        ui.affordance(Affordance::SendData, false);
        Ok(())
    }

    pub fn close_media<P: Presenter>(&mut self, ui: &mut P) -> Result<(), ChannelError> {
        let Some(mut slot) = self.media.take() else {
            ui.warn("No active media connection to close");
            return Err(ChannelError::NoActiveMedia);
        };
        ui.info(format!("Closing media connection (peer: {})", slot.link.remote()));
        slot.link.close();
        self.clear_media(ui);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use str0m::media::MediaKind;

    use super::*;
    use crate::error::ClientError;
    use crate::model::capture::{RemoteStream, TrackInfo};
    use crate::model::log::LogLevel;
    use crate::testing::{FakeLink, Journal, RecordingPresenter};

    fn data_link(journal: &Journal, remote: &str) -> (Box<dyn DataLink>, LinkRef) {
        let link = FakeLink::new(remote, journal);
        let link_ref = LinkRef::new(link.id, PeerId::new(remote));
        (Box::new(link), link_ref)
    }

    fn media_link(journal: &Journal, remote: &str) -> (Box<dyn MediaLink>, LinkRef) {
        let link = FakeLink::new(remote, journal);
        let link_ref = LinkRef::new(link.id, PeerId::new(remote));
        (Box::new(link), link_ref)
    }

    fn stream(remote: &str) -> RemoteStream {
        RemoteStream {
            peer: PeerId::new(remote),
            tracks: vec![TrackInfo {
                kind: MediaKind::Video,
                label: "cam".into(),
            }],
        }
    }

    #[test]
    fn replacing_data_closes_previous_exactly_once() {
        let journal = Journal::default();
        let mut ui = RecordingPresenter::default();
        let mut registry = ConnectionRegistry::new();

        let (first, first_ref) = data_link(&journal, "a");
        let (second, second_ref) = data_link(&journal, "b");
        registry.set_active_data(first, &mut ui);
        assert_eq!(journal.entries(), Vec::<String>::new());

        registry.set_active_data(second, &mut ui);
        assert_eq!(journal.count(&format!("close:{}", first_ref.id)), 1);
        assert_eq!(registry.active_data(), Some((second_ref.id, LinkState::Opening)));
    }

    #[test]
    fn stale_close_keeps_newer_handle() {
        let journal = Journal::default();
        let mut ui = RecordingPresenter::default();
        let mut registry = ConnectionRegistry::new();

        let (first, first_ref) = data_link(&journal, "a");
        let (second, second_ref) = data_link(&journal, "b");
        registry.set_active_data(first, &mut ui);
        registry.set_active_data(second, &mut ui);
        registry.handle_data_event(&second_ref, DataEvent::Open, &mut ui);

        registry.handle_data_event(&first_ref, DataEvent::Close, &mut ui);
        registry.handle_data_event(&first_ref, DataEvent::Error(ClientError::new("x", "y")), &mut ui);
        assert_eq!(registry.active_data(), Some((second_ref.id, LinkState::Open)));
        assert!(ui.enabled(Affordance::SendData));
        // The stale handle was closed on replacement, never again.
        assert_eq!(journal.count(&format!("close:{}", first_ref.id)), 1);
    }

    #[test]
    fn stale_open_does_not_reactivate() {
        let journal = Journal::default();
        let mut ui = RecordingPresenter::default();
        let mut registry = ConnectionRegistry::new();

        let (first, first_ref) = data_link(&journal, "a");
        let (second, second_ref) = data_link(&journal, "b");
        registry.set_active_data(first, &mut ui);
        registry.set_active_data(second, &mut ui);

        registry.handle_data_event(&first_ref, DataEvent::Open, &mut ui);
        assert_eq!(registry.active_data(), Some((second_ref.id, LinkState::Opening)));
        assert!(!ui.enabled(Affordance::SendData));
    }

    #[test]
    fn active_close_clears_slot_and_disables_send() {
        let journal = Journal::default();
        let mut ui = RecordingPresenter::default();
        let mut registry = ConnectionRegistry::new();

        let (link, link_ref) = data_link(&journal, "a");
        registry.set_active_data(link, &mut ui);
        registry.handle_data_event(&link_ref, DataEvent::Open, &mut ui);
        assert!(ui.enabled(Affordance::SendData));

        registry.handle_data_event(&link_ref, DataEvent::Close, &mut ui);
        assert_eq!(registry.active_data(), None);
        assert!(!ui.enabled(Affordance::SendData));
    }

    #[test]
    fn received_payloads_are_logged_verbatim() {
        let journal = Journal::default();
        let mut ui = RecordingPresenter::default();
        let mut registry = ConnectionRegistry::new();

        let (link, link_ref) = data_link(&journal, "a");
        registry.set_active_data(link, &mut ui);
        let payload = Payload::Structured(serde_json::json!({"n": 1}));
        registry.handle_data_event(&link_ref, DataEvent::Data(payload), &mut ui);

        let last = ui.entries.last().unwrap();
        assert_eq!(last.level, LogLevel::Info);
        assert_eq!(last.message, r#"Data received (from a): {"n":1}"#);
    }

    #[test]
    fn send_without_active_data_is_rejected_locally() {
        let journal = Journal::default();
        let mut ui = RecordingPresenter::default();
        let mut registry = ConnectionRegistry::new();

        let result = registry.send(Payload::text("hi"), &mut ui);
        assert!(matches!(result, Err(ChannelError::NoActiveData)));
        assert_eq!(ui.count(LogLevel::Warn), 1);
        assert!(journal.entries().is_empty());
    }

    #[test]
    fn send_waits_for_open() {
        let journal = Journal::default();
        let mut ui = RecordingPresenter::default();
        let mut registry = ConnectionRegistry::new();
        let (link, link_ref) = data_link(&journal, "a");
        registry.set_active_data(link, &mut ui);

        let result = registry.send(Payload::text("early"), &mut ui);
        assert!(matches!(result, Err(ChannelError::NotOpen(_))));

        registry.handle_data_event(&link_ref, DataEvent::Open, &mut ui);
        registry.send(Payload::text("hi"), &mut ui).unwrap();
        assert_eq!(journal.entries(), vec![format!("send:{}:hi", link_ref.id)]);
    }

    #[test]
    fn error_on_active_data_fails_and_closes_it() {
        let journal = Journal::default();
        let mut ui = RecordingPresenter::default();
        let mut registry = ConnectionRegistry::new();
        let (link, link_ref) = data_link(&journal, "a");
        registry.set_active_data(link, &mut ui);
        registry.handle_data_event(&link_ref, DataEvent::Open, &mut ui);

        let e = ClientError::new("network", "ice failed");
        registry.handle_data_event(&link_ref, DataEvent::Error(e), &mut ui);
        assert_eq!(registry.active_data(), None);
        assert_eq!(journal.count(&format!("close:{}", link_ref.id)), 1);
        assert!(!ui.enabled(Affordance::SendData));
        assert_eq!(ui.count(LogLevel::Error), 1);
    }

    #[test]
    fn media_replacement_and_stale_close() {
        let journal = Journal::default();
        let mut ui = RecordingPresenter::default();
        let mut registry = ConnectionRegistry::new();

        let (first, first_ref) = media_link(&journal, "a");
        let (second, second_ref) = media_link(&journal, "b");
        registry.set_active_media(first, &mut ui);
        registry.handle_media_event(&first_ref, MediaEvent::Stream(stream("a")), &mut ui);
        assert_eq!(ui.remote, Some(stream("a")));

        registry.set_active_media(second, &mut ui);
        assert_eq!(journal.count(&format!("close:{}", first_ref.id)), 1);
        assert_eq!(ui.remote, None);

        registry.handle_media_event(&second_ref, MediaEvent::Stream(stream("b")), &mut ui);
        registry.handle_media_event(&first_ref, MediaEvent::Close, &mut ui);
        assert_eq!(registry.active_media(), Some((second_ref.id, LinkState::Open)));
        assert_eq!(ui.remote, Some(stream("b")));
        assert!(ui.enabled(Affordance::HangUp));

        registry.handle_media_event(
            &second_ref,
            MediaEvent::Error(ClientError::new("network", "gone")),
            &mut ui,
        );
        assert_eq!(registry.active_media(), None);
        assert_eq!(ui.remote, None);
        assert!(!ui.enabled(Affordance::HangUp));
    }

    #[test]
    fn explicit_close_then_late_close_event() {
        let journal = Journal::default();
        let mut ui = RecordingPresenter::default();
        let mut registry = ConnectionRegistry::new();
        let (link, link_ref) = data_link(&journal, "a");
        registry.set_active_data(link, &mut ui);

        registry.close_data(&mut ui).unwrap();
        assert_eq!(registry.active_data(), None);
        assert!(matches!(registry.close_data(&mut ui), Err(ChannelError::NoActiveData)));

        let (next, next_ref) = data_link(&journal, "b");
        registry.set_active_data(next, &mut ui);
        registry.handle_data_event(&link_ref, DataEvent::Close, &mut ui);
        assert_eq!(registry.active_data(), Some((next_ref.id, LinkState::Opening)));
    }
}
