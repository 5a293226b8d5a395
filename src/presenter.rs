//! Presentation layer callbacks
//!
//! The controller never renders anything itself. Status text, log entries,
//! affordance toggles and stream surfaces are pushed through [`Presenter`].

use std::collections::VecDeque;

use tracing::{error, info, warn};

use crate::model::capture::{CaptureStream, RemoteStream};
use crate::model::ids::PeerId;
use crate::model::log::{LogEntry, LogLevel};

/// User actions that are only possible in some states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affordance {
    /// Connecting data or media channels; needs an open session.
    Outbound,
    /// Sending on the active data channel; needs it to be open.
    SendData,
    /// Hanging up the active media channel.
    HangUp,
}

pub trait Presenter {
    fn log(&mut self, entry: LogEntry);

    fn status(&mut self, text: &str);

    fn affordance(&mut self, affordance: Affordance, enabled: bool);

    fn self_id(&mut self, id: Option<&PeerId>);

    fn local_preview(&mut self, stream: Option<&CaptureStream>);

    fn remote_stream(&mut self, stream: Option<&RemoteStream>);

    fn info(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!("{}", message);
        self.log(LogEntry::new(LogLevel::Info, message));
    }

    fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.log(LogEntry::new(LogLevel::Warn, message));
    }

    fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        error!("{}", message);
        self.log(LogEntry::new(LogLevel::Error, message));
    }
}

const HISTORY_LIMIT: usize = 500;

/// Terminal presenter for the interactive console.
///
/// Log entries are already written by the tracing subscriber, so they are
/// only kept here for the `log` command. State changes are printed as they
/// happen.
#[derive(Debug, Default)]
pub struct ConsolePresenter {
    history: VecDeque<LogEntry>,
    status: String,
    self_id: Option<PeerId>,
}

impl ConsolePresenter {
    pub fn history(&self) -> impl Iterator<Item = &LogEntry> {
        self.history.iter()
    }

    pub fn clear_history(&mut self) {
        self.history.clear();
    }

    pub fn current_status(&self) -> &str {
        &self.status
    }

    pub fn current_self_id(&self) -> Option<&PeerId> {
        self.self_id.as_ref()
    }
}

impl Presenter for ConsolePresenter {
    fn log(&mut self, entry: LogEntry) {
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back(entry);
    }

    fn status(&mut self, text: &str) {
        self.status = text.to_string();
        println!("status: {text}");
    }

    fn affordance(&mut self, affordance: Affordance, enabled: bool) {
        let state = if enabled { "enabled" } else { "disabled" };
        println!("{affordance:?} {state}");
    }

    fn self_id(&mut self, id: Option<&PeerId>) {
        self.self_id = id.cloned();
        match id {
            Some(id) => println!("my id: {id}"),
            None => println!("my id: -"),
        }
    }

    fn local_preview(&mut self, stream: Option<&CaptureStream>) {
        match stream {
            Some(s) => println!("local preview: {} ({} tracks)", s.source, s.tracks.len()),
            None => println!("local preview: -"),
        }
    }

    fn remote_stream(&mut self, stream: Option<&RemoteStream>) {
        match stream {
            Some(s) => println!("remote stream: {s}"),
            None => println!("remote stream: -"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded() {
        let mut presenter = ConsolePresenter::default();
        for i in 0..HISTORY_LIMIT + 5 {
            presenter.info(format!("line {i}"));
        }
        assert_eq!(presenter.history().count(), HISTORY_LIMIT);
        assert_eq!(presenter.history().next().unwrap().message, "line 5");

        presenter.clear_history();
        assert_eq!(presenter.history().count(), 0);
    }
}
