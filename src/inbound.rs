//! Responses to unsolicited requests from remote peers.
//!
//! There is no authorization step: any peer that knows our id may open a
//! data channel or call us.

use crate::model::capture::CaptureStream;
use crate::net::{DataLink, IncomingCall, Link};
use crate::presenter::Presenter;
use crate::registry::ConnectionRegistry;

/// Accepts an inbound data channel and makes it the active one.
pub fn on_inbound_data<P: Presenter>(
    link: Box<dyn DataLink>,
    registry: &mut ConnectionRegistry,
    ui: &mut P,
) {
    ui.info(format!("Incoming data connection request (peer: {})", link.remote()));
    registry.set_active_data(link, ui);
}

/// Answers an inbound call with the local stream when one is held,
/// receive-only otherwise, and makes it the active media channel.
pub fn on_inbound_call<P: Presenter>(
    call: Box<dyn IncomingCall>,
    local: Option<&CaptureStream>,
    registry: &mut ConnectionRegistry,
    ui: &mut P,
) {
    let peer = call.remote().clone();
    ui.info(format!("Incoming media connection request (peer: {peer})"));

    let link = call.answer(local);
    match local {
        Some(stream) => ui.info(format!(
            "Answered {peer} with local {} stream, waiting for remote stream",
            stream.source
        )),
        None => ui.info(format!(
            "Answered {peer} in receive-only mode, waiting for remote stream"
        )),
    }
    registry.set_active_media(link, ui);
}

#[cfg(test)]
mod tests {
    use str0m::media::MediaKind;

    use super::*;
    use crate::model::capture::{CaptureSource, CaptureTrack};
    use crate::model::ids::LinkState;
    use crate::model::log::LogLevel;
    use crate::testing::{FakeCall, FakeLink, Journal, RecordingPresenter};

    #[test]
    fn inbound_data_becomes_active_immediately() {
        let journal = Journal::default();
        let mut ui = RecordingPresenter::default();
        let mut registry = ConnectionRegistry::new();

        let old = FakeLink::new("old", &journal);
        let old_id = old.id;
        registry.set_active_data(Box::new(old), &mut ui);

        let link = FakeLink::new("remote", &journal);
        let id = link.id;
        on_inbound_data(Box::new(link), &mut registry, &mut ui);

        assert_eq!(registry.active_data(), Some((id, LinkState::Opening)));
        assert_eq!(journal.entries(), vec![format!("close:{old_id}")]);
    }

    #[test]
    fn call_without_capture_is_answered_receive_only() {
        let journal = Journal::default();
        let mut ui = RecordingPresenter::default();
        let mut registry = ConnectionRegistry::new();

        let call = FakeCall::new("remote", &journal);
        let id = call.id;
        on_inbound_call(Box::new(call), None, &mut registry, &mut ui);

        assert_eq!(journal.entries(), vec![format!("answer:{id}:receive-only")]);
        assert_eq!(registry.active_media(), Some((id, LinkState::Opening)));
        assert_eq!(ui.count(LogLevel::Error), 0);
        assert_eq!(ui.count(LogLevel::Warn), 0);
    }

    #[test]
    fn call_is_answered_with_held_stream() {
        let journal = Journal::default();
        let mut ui = RecordingPresenter::default();
        let mut registry = ConnectionRegistry::new();
        let stream = CaptureStream::new(
            CaptureSource::Camera,
            vec![CaptureTrack::new(MediaKind::Video, "cam")],
        );

        let call = FakeCall::new("remote", &journal);
        let id = call.id;
        on_inbound_call(Box::new(call), Some(&stream), &mut registry, &mut ui);

        assert_eq!(journal.entries(), vec![format!("answer:{id}:stream {}", stream.id)]);
        assert_eq!(registry.media_peer().map(|p| p.as_str()), Some("remote"));
    }
}
