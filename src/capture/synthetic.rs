//! Synthetic capture devices for the console build.
//!
//! Each source yields one video and one audio track. The device side ending
//! the observed stream can be triggered by hand with [`SyntheticDevices::revoke`].

use std::collections::HashMap;

use str0m::media::MediaKind;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::capture::CaptureDevices;
use crate::error::CaptureError;
use crate::model::capture::{CaptureSource, CaptureStream, CaptureTrack};
use crate::model::event::NetEvent;
use crate::model::ids::HandleId;

#[derive(Debug)]
pub struct SyntheticDevices {
    events: UnboundedSender<NetEvent>,
    observed: Option<HandleId>,
    failures: HashMap<CaptureSource, CaptureError>,
}

impl SyntheticDevices {
    pub fn new(events: UnboundedSender<NetEvent>) -> SyntheticDevices {
        SyntheticDevices {
            events,
            observed: None,
            failures: HashMap::new(),
        }
    }

    /// Makes later requests for `source` fail as if the user refused.
    pub fn deny(&mut self, source: CaptureSource) {
        self.fail_with(source, CaptureError::PermissionDenied(source));
    }

    /// Makes later requests for `source` fail with `error`.
    pub fn fail_with(&mut self, source: CaptureSource, error: CaptureError) {
        self.failures.insert(source, error);
    }

    /// Ends the observed stream from the device side.
    ///
    /// Returns false when no stream is being observed.
    pub fn revoke(&mut self) -> bool {
        let Some(id) = self.observed.take() else {
            return false;
        };
        debug!("Synthetic device ending stream {}", id);
        let _ = self.events.send(NetEvent::CaptureEnded(id));
        true
    }
}

impl CaptureDevices for SyntheticDevices {
    async fn open(&mut self, source: CaptureSource) -> Result<CaptureStream, CaptureError> {
        // Stands in for the permission prompt.
        tokio::task::yield_now().await;

        if let Some(e) = self.failures.get(&source) {
            return Err(e.clone());
        }

        Ok(CaptureStream::new(
            source,
            vec![
                CaptureTrack::new(MediaKind::Video, format!("synthetic {source} video")),
                CaptureTrack::new(MediaKind::Audio, format!("synthetic {source} audio")),
            ],
        ))
    }

    fn stop(&mut self, stream: &mut CaptureStream) {
        stream.stop_tracks();
        if self.observed == Some(stream.id) {
            self.observed = None;
        }
    }

    fn observe_end(&mut self, stream: &CaptureStream, track: &CaptureTrack) {
        debug!("Observing end of {} on stream {}", track.label, stream.id);
        self.observed = Some(stream.id);
    }
}
