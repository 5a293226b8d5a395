//! Interactive console
//!
//! Reads commands from stdin and applies networking events as they arrive,
//! both on the same task so the controller never needs locking.

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use crate::capture::synthetic::SyntheticDevices;
use crate::config::{ConfigStore, Settings};
use crate::controller::Controller;
use crate::model::capture::CaptureSource;
use crate::model::event::NetEvent;
use crate::model::payload::Payload;
use crate::model::relay::{RelayKind, RelayServerDescriptor};
use crate::net::loopback::LoopbackNetwork;
use crate::presenter::{ConsolePresenter, Presenter};

pub type ConsoleController = Controller<LoopbackNetwork, SyntheticDevices, ConsolePresenter>;

#[derive(Parser, Debug)]
#[command(no_binary_name = true, disable_version_flag = true)]
struct Line {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Start a signaling session with the saved settings
    Start,
    /// Destroy the signaling session
    Stop,
    /// Show or edit the signaling server settings
    Server {
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<String>,
        #[arg(long)]
        path: Option<String>,
        #[arg(long)]
        secure: Option<bool>,
    },
    /// Manage relay and reflection servers
    Relay {
        #[command(subcommand)]
        action: RelayAction,
    },
    /// Acquire a local media stream
    Capture { source: Option<CaptureSource> },
    /// Release the local media stream
    Release,
    /// End the local media stream from the device side
    Revoke,
    /// Open a data connection to a peer
    Connect { peer: Option<String> },
    /// Call a peer
    Call { peer: Option<String> },
    /// Send on the active data connection
    Send {
        /// Send the text as a JSON value
        #[arg(long)]
        json: bool,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Close the active data or media connection
    Close { channel: ChannelKind },
    /// Show session, connection and capture state
    Status,
    /// Show the log history
    Log,
    /// Clear the log history
    Clear,
    /// Leave the console
    #[command(alias = "exit")]
    Quit,
}

#[derive(Subcommand, Debug, PartialEq)]
enum RelayAction {
    List,
    Add {
        kind: RelayKind,
        address: String,
        username: Option<String>,
        secret: Option<String>,
    },
    Remove { index: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ChannelKind {
    Data,
    Media,
}

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

pub struct Console {
    controller: ConsoleController,
    store: ConfigStore,
    settings: Settings,
}

impl Console {
    pub fn new(controller: ConsoleController, store: ConfigStore, settings: Settings) -> Console {
        Console {
            controller,
            store,
            settings,
        }
    }

    /// Runs until `quit` or end of input.
    pub async fn run(mut self, mut events: UnboundedReceiver<NetEvent>) -> Result<()> {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        println!("Type `help` for the list of commands.");

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else {
                        debug!("End of input");
                        break;
                    };
                    if self.execute(&line).await == Flow::Quit {
                        break;
                    }
                },
                Some(event) = events.recv() => {
                    self.controller.handle_event(event);
                },
            }
        }

        self.controller.stop_session();
        info!("Console closed");
        Ok(())
    }

    async fn execute(&mut self, line: &str) -> Flow {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.is_empty() {
            return Flow::Continue;
        }
        match Line::try_parse_from(words) {
            Ok(line) => self.apply(line.command).await,
            Err(e) => {
                println!("{e}");
                Flow::Continue
            }
        }
    }

    async fn apply(&mut self, command: Command) -> Flow {
        // Failures are reported through the presenter by the controller.
        match command {
            Command::Start => self.start(),
            Command::Stop => {
                if !self.controller.stop_session() {
                    self.controller.ui_mut().warn("No signaling session to stop");
                }
            }
            Command::Server {
                host,
                port,
                path,
                secure,
            } => self.edit_server(host, port, path, secure),
            Command::Relay { action } => self.edit_relays(action),
            Command::Capture { source } => {
                let source = source.unwrap_or(self.settings.media_source);
                if source != self.settings.media_source {
                    self.settings.media_source = source;
                    self.save();
                }
                let _ = self.controller.start_capture(source).await;
            }
            Command::Release => {
                self.controller.stop_capture();
            }
            Command::Revoke => {
                if !self.controller.capture_mut().devices_mut().revoke() {
                    self.controller.ui_mut().warn("No local media stream to revoke");
                }
            }
            Command::Connect { peer } => {
                let _ = self.controller.connect_data(peer.as_deref().unwrap_or_default());
            }
            Command::Call { peer } => {
                let _ = self.controller.connect_media(peer.as_deref().unwrap_or_default());
            }
            Command::Send { json, text } => {
                if let Some(payload) = self.payload(json, text.join(" ")) {
                    let _ = self.controller.send(payload);
                }
            }
            Command::Close { channel } => {
                let _ = match channel {
                    ChannelKind::Data => self.controller.close_data(),
                    ChannelKind::Media => self.controller.close_media(),
                };
            }
            Command::Status => self.print_status(),
            Command::Log => {
                for entry in self.controller.ui().history() {
                    println!("{entry}");
                }
            }
            Command::Clear => self.controller.ui_mut().clear_history(),
            Command::Quit => return Flow::Quit,
        }
        Flow::Continue
    }

    /// Validates and saves the settings, then starts a session with them.
    pub fn start(&mut self) {
        let config = match self.settings.session_config() {
            Ok(config) => config,
            Err(e) => {
                self.controller.ui_mut().error(format!("Invalid settings: {e}"));
                return;
            }
        };
        self.save();
        let _ = self.controller.start_session(&config);
    }

    fn edit_server(
        &mut self,
        host: Option<String>,
        port: Option<String>,
        path: Option<String>,
        secure: Option<bool>,
    ) {
        let signaling = &mut self.settings.signaling;
        let edited = host.is_some() || port.is_some() || path.is_some() || secure.is_some();
        if let Some(host) = host {
            signaling.host = host;
        }
        if let Some(port) = port {
            signaling.port = port;
        }
        if let Some(path) = path {
            signaling.path = path;
        }
        if let Some(secure) = secure {
            signaling.secure = secure;
        }
        println!(
            "server: host={} port={} path={} secure={}",
            signaling.host, signaling.port, signaling.path, signaling.secure
        );
        if edited {
            self.save();
        }
    }

    fn edit_relays(&mut self, action: RelayAction) {
        let result = match action {
            RelayAction::List => {
                for (i, relay) in self.settings.relay_servers.descriptors().iter().enumerate() {
                    let auth = if relay.username.is_some() { " (auth)" } else { "" };
                    println!("{i}: {}:{}{auth}", relay.kind, relay.address);
                }
                return;
            }
            RelayAction::Add {
                kind,
                address,
                username,
                secret,
            } => {
                let mut relay = RelayServerDescriptor::new(kind, address);
                relay.username = username;
                relay.secret = secret;
                self.settings.relay_servers.add(relay)
            }
            RelayAction::Remove { index } => self.settings.relay_servers.remove(index).map(|_| ()),
        };

        match result {
            Ok(()) => self.save(),
            Err(e) => self.controller.ui_mut().warn(format!("Relay list unchanged: {e}")),
        }
    }

    fn payload(&mut self, json: bool, text: String) -> Option<Payload> {
        if !json {
            return Some(Payload::Text(text));
        }
        match serde_json::from_str::<Value>(&text) {
            Ok(value) => Some(Payload::Structured(value)),
            Err(e) => {
                self.controller.ui_mut().warn(format!("Not valid JSON, message not sent: {e}"));
                None
            }
        }
    }

    fn save(&mut self) {
        if let Err(e) = self.store.save(&self.settings) {
            self.controller.ui_mut().warn(format!(
                "Could not save settings to {}: {e}",
                self.store.path().display()
            ));
        }
    }

    fn print_status(&self) {
        let ui = self.controller.ui();
        println!("status: {}", ui.current_status());
        match ui.current_self_id() {
            Some(id) => println!("my id: {id}"),
            None => println!("my id: -"),
        }

        let registry = self.controller.registry();
        match (registry.active_data(), registry.data_peer()) {
            (Some((id, state)), Some(peer)) => println!("data: {peer} {id} {state:?}"),
            _ => println!("data: -"),
        }
        match (registry.active_media(), registry.media_peer()) {
            (Some((id, state)), Some(peer)) => println!("media: {peer} {id} {state:?}"),
            _ => println!("media: -"),
        }
        match self.controller.capture().current() {
            Some(stream) => println!("capture: {} {}", stream.source, stream.id),
            None => println!("capture: -"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(line: &str) -> Result<Command, clap::Error> {
        Line::try_parse_from(line.split_whitespace()).map(|l| l.command)
    }

    #[test]
    fn parses_server_edits() {
        assert_eq!(
            parse("server --host localhost --port 9000 --secure false").unwrap(),
            Command::Server {
                host: Some("localhost".into()),
                port: Some("9000".into()),
                path: None,
                secure: Some(false),
            }
        );
    }

    #[test]
    fn parses_relay_kinds_by_scheme_or_name() {
        assert_eq!(
            parse("relay add turns turn.example.com:5349 user pass").unwrap(),
            Command::Relay {
                action: RelayAction::Add {
                    kind: RelayKind::SecureRelay,
                    address: "turn.example.com:5349".into(),
                    username: Some("user".into()),
                    secret: Some("pass".into()),
                }
            }
        );
        assert!(matches!(
            parse("relay add reflection stun.example.com:3478").unwrap(),
            Command::Relay {
                action: RelayAction::Add {
                    kind: RelayKind::Reflection,
                    ..
                }
            }
        ));
    }

    #[test]
    fn send_keeps_every_word() {
        assert_eq!(
            parse("send --json {\"a\": -1}").unwrap(),
            Command::Send {
                json: true,
                text: vec!["{\"a\":".into(), "-1}".into()],
            }
        );
        assert!(parse("send").is_err());
    }

    #[test]
    fn connect_target_is_optional_at_parse_time() {
        assert_eq!(parse("connect").unwrap(), Command::Connect { peer: None });
        assert_eq!(parse("exit").unwrap(), Command::Quit);
    }

    fn console(dir: &tempfile::TempDir) -> (Console, UnboundedReceiver<NetEvent>) {
        let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
        let controller = Controller::new(
            LoopbackNetwork::new(tx.clone()),
            SyntheticDevices::new(tx),
            ConsolePresenter::default(),
        );
        let store = ConfigStore::new(dir.path().join("settings.json"));
        (Console::new(controller, store, Settings::default()), rx)
    }

    #[tokio::test]
    async fn relay_edits_are_saved() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, _rx) = console(&dir);

        console.execute("relay add turn turn.example.com:3478 u p").await;
        console.execute("relay remove 0").await;
        console.execute("relay remove 0").await;

        let saved = console.store.load();
        assert_eq!(saved.relay_servers.descriptors().len(), 1);
        assert_eq!(saved.relay_servers.descriptors()[0].address, "turn.example.com:3478");
        assert!(console.controller.ui().current_status().is_empty());
    }

    #[tokio::test]
    async fn start_reaches_open_through_the_event_queue() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, mut rx) = console(&dir);

        console.execute("server --port 0").await;
        console.execute("start").await;
        assert!(console.controller.session_state().is_none());

        console.execute("server --port 9000").await;
        console.execute("start").await;
        while let Ok(event) = rx.try_recv() {
            console.controller.handle_event(event);
        }
        assert!(console.controller.self_id().is_some());
        assert_eq!(console.store.load().signaling.port, "9000");
    }

    #[tokio::test]
    async fn quit_stops_the_loop() {
        let dir = tempfile::tempdir().unwrap();
        let (mut console, _rx) = console(&dir);
        assert_eq!(console.execute("  ").await, Flow::Continue);
        assert_eq!(console.execute("bogus").await, Flow::Continue);
        assert_eq!(console.execute("quit").await, Flow::Quit);
    }

    #[test]
    fn capture_accepts_legacy_monitor_name() {
        assert_eq!(
            parse("capture monitor").unwrap(),
            Command::Capture {
                source: Some(CaptureSource::Screen)
            }
        );
        assert!(parse("close both").is_err());
    }
}
