//! Local capture streams and the remote streams received over media channels.

use std::fmt;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use str0m::media::MediaKind;

use crate::model::ids::{HandleId, PeerId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CaptureSource {
    /// Display capture. Older settings files call this `monitor`.
    #[default]
    #[serde(alias = "monitor")]
    #[value(alias = "monitor")]
    Screen,
    Camera,
}

impl fmt::Display for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureSource::Screen => f.write_str("screen"),
            CaptureSource::Camera => f.write_str("camera"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureTrack {
    pub kind: MediaKind,
    pub label: String,
    pub live: bool,
}

impl CaptureTrack {
    pub fn new(kind: MediaKind, label: impl Into<String>) -> CaptureTrack {
        CaptureTrack {
            kind,
            label: label.into(),
            live: true,
        }
    }
}

/// The locally acquired audio/video stream offered on media channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureStream {
    pub id: HandleId,
    pub source: CaptureSource,
    pub tracks: Vec<CaptureTrack>,
}

impl CaptureStream {
    pub fn new(source: CaptureSource, tracks: Vec<CaptureTrack>) -> CaptureStream {
        CaptureStream {
            id: HandleId::next(),
            source,
            tracks,
        }
    }

    /// The track whose end marks the end of the whole stream.
    pub fn primary_video(&self) -> Option<&CaptureTrack> {
        self.tracks.iter().find(|t| t.kind == MediaKind::Video)
    }

    pub fn stop_tracks(&mut self) {
        for track in &mut self.tracks {
            track.live = false;
        }
    }

    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(|t| t.live)
    }

    pub fn track_info(&self) -> Vec<TrackInfo> {
        self.tracks
            .iter()
            .filter(|t| t.live)
            .map(|t| TrackInfo {
                kind: t.kind,
                label: t.label.clone(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackInfo {
    pub kind: MediaKind,
    pub label: String,
}

/// A stream received from the remote end of a media channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub peer: PeerId,
    pub tracks: Vec<TrackInfo>,
}

impl fmt::Display for RemoteStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let video = self.tracks.iter().filter(|t| t.kind == MediaKind::Video).count();
        let audio = self.tracks.len() - video;
        write!(f, "{} ({} video, {} audio)", self.peer, video, audio)
    }
}
