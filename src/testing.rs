//! Recording fakes shared by the unit tests.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use str0m::media::MediaKind;

use crate::capture::CaptureDevices;
use crate::error::{CaptureError, ClientError};
use crate::model::capture::{CaptureSource, CaptureStream, CaptureTrack, RemoteStream};
use crate::model::ids::{HandleId, PeerId};
use crate::model::log::{LogEntry, LogLevel};
use crate::model::payload::Payload;
use crate::net::{
    ClientParams, DataLink, IncomingCall, Link, MediaLink, PeerNetwork, PeerSession,
};
use crate::presenter::{Affordance, Presenter};

/// Ordered record of calls made into the fakes.
#[derive(Debug, Clone, Default)]
pub struct Journal(Rc<RefCell<Vec<String>>>);

impl Journal {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.borrow_mut().push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        self.0.borrow().clone()
    }

    pub fn count(&self, entry: &str) -> usize {
        self.0.borrow().iter().filter(|e| *e == entry).count()
    }

    pub fn position(&self, entry: &str) -> Option<usize> {
        self.0.borrow().iter().position(|e| e == entry)
    }

    pub fn clear(&self) {
        self.0.borrow_mut().clear();
    }
}

#[derive(Debug, Default)]
pub struct FakeNetwork {
    pub journal: Journal,
    pub fail_open: Option<ClientError>,
    pub last_params: Option<ClientParams>,
}

impl PeerNetwork for FakeNetwork {
    type Session = FakeSession;

    fn open(&mut self, params: &ClientParams) -> Result<FakeSession, ClientError> {
        self.last_params = Some(params.clone());
        if let Some(e) = self.fail_open.take() {
            self.journal.push("open-failed");
            return Err(e);
        }
        let session = FakeSession {
            id: HandleId::next(),
            journal: self.journal.clone(),
        };
        self.journal.push(format!("open:{}", session.id));
        Ok(session)
    }
}

#[derive(Debug)]
pub struct FakeSession {
    id: HandleId,
    journal: Journal,
}

impl PeerSession for FakeSession {
    fn id(&self) -> HandleId {
        self.id
    }

    fn connect(&mut self, remote: &PeerId) -> Result<Box<dyn DataLink>, ClientError> {
        let link = FakeLink::new(remote.as_str(), &self.journal);
        self.journal.push(format!("connect:{}:{}", remote, link.id));
        Ok(Box::new(link))
    }

    fn call(
        &mut self,
        remote: &PeerId,
        stream: Option<&CaptureStream>,
    ) -> Result<Box<dyn MediaLink>, ClientError> {
        let link = FakeLink::new(remote.as_str(), &self.journal);
        let offered = if stream.is_some() { "stream" } else { "receive-only" };
        self.journal.push(format!("call:{}:{}:{}", remote, offered, link.id));
        Ok(Box::new(link))
    }

    fn destroy(&mut self) {
        self.journal.push(format!("destroy:{}", self.id));
    }
}

/// A channel handle usable as either a data or a media link.
#[derive(Debug)]
pub struct FakeLink {
    pub id: HandleId,
    remote: PeerId,
    journal: Journal,
}

impl FakeLink {
    pub fn new(remote: &str, journal: &Journal) -> FakeLink {
        FakeLink {
            id: HandleId::next(),
            remote: PeerId::new(remote),
            journal: journal.clone(),
        }
    }
}

impl Link for FakeLink {
    fn id(&self) -> HandleId {
        self.id
    }

    fn remote(&self) -> &PeerId {
        &self.remote
    }

    fn close(&mut self) {
        self.journal.push(format!("close:{}", self.id));
    }
}

impl DataLink for FakeLink {
    fn send(&mut self, payload: &Payload) -> Result<(), ClientError> {
        self.journal.push(format!("send:{}:{}", self.id, payload));
        Ok(())
    }
}

impl MediaLink for FakeLink {}

#[derive(Debug)]
pub struct FakeCall {
    pub id: HandleId,
    remote: PeerId,
    journal: Journal,
}

impl FakeCall {
    pub fn new(remote: &str, journal: &Journal) -> FakeCall {
        FakeCall {
            id: HandleId::next(),
            remote: PeerId::new(remote),
            journal: journal.clone(),
        }
    }
}

impl IncomingCall for FakeCall {
    fn id(&self) -> HandleId {
        self.id
    }

    fn remote(&self) -> &PeerId {
        &self.remote
    }

    fn answer(self: Box<Self>, stream: Option<&CaptureStream>) -> Box<dyn MediaLink> {
        let offered = match stream {
            Some(s) => format!("stream {}", s.id),
            None => "receive-only".to_string(),
        };
        self.journal.push(format!("answer:{}:{}", self.id, offered));
        Box::new(FakeLink {
            id: self.id,
            remote: self.remote.clone(),
            journal: self.journal.clone(),
        })
    }
}

#[derive(Debug, Default)]
pub struct FakeDevices {
    pub journal: Journal,
    pub fail: Option<CaptureError>,
}

impl CaptureDevices for FakeDevices {
    async fn open(&mut self, source: CaptureSource) -> Result<CaptureStream, CaptureError> {
        self.journal.push(format!("request:{source}"));
        if let Some(e) = self.fail.take() {
            return Err(e);
        }
        Ok(CaptureStream::new(
            source,
            vec![
                CaptureTrack::new(MediaKind::Video, format!("{source} video")),
                CaptureTrack::new(MediaKind::Audio, format!("{source} audio")),
            ],
        ))
    }

    fn stop(&mut self, stream: &mut CaptureStream) {
        stream.stop_tracks();
        self.journal.push(format!("stop:{}", stream.source));
    }

    fn observe_end(&mut self, stream: &CaptureStream, track: &CaptureTrack) {
        self.journal.push(format!("observe:{}:{}", stream.source, track.label));
    }
}

#[derive(Debug, Default)]
pub struct RecordingPresenter {
    pub entries: Vec<LogEntry>,
    pub statuses: Vec<String>,
    pub affordances: HashMap<Affordance, bool>,
    pub self_id: Option<PeerId>,
    pub preview: Option<HandleId>,
    pub remote: Option<RemoteStream>,
}

impl RecordingPresenter {
    pub fn enabled(&self, affordance: Affordance) -> bool {
        self.affordances.get(&affordance).copied().unwrap_or(false)
    }

    pub fn count(&self, level: LogLevel) -> usize {
        self.entries.iter().filter(|e| e.level == level).count()
    }

    pub fn last_status(&self) -> Option<&str> {
        self.statuses.last().map(String::as_str)
    }
}

impl Presenter for RecordingPresenter {
    fn log(&mut self, entry: LogEntry) {
        self.entries.push(entry);
    }

    fn status(&mut self, text: &str) {
        self.statuses.push(text.to_string());
    }

    fn affordance(&mut self, affordance: Affordance, enabled: bool) {
        self.affordances.insert(affordance, enabled);
    }

    fn self_id(&mut self, id: Option<&PeerId>) {
        self.self_id = id.cloned();
    }

    fn local_preview(&mut self, stream: Option<&CaptureStream>) {
        self.preview = stream.map(|s| s.id);
    }

    fn remote_stream(&mut self, stream: Option<&RemoteStream>) {
        self.remote = stream.cloned();
    }
}
