//! Local capture management
//!
//! At most one local stream is held. Acquiring a new one always stops the
//! held stream first, and the device may end the held stream on its own
//! (the user revoking access, for instance), which arrives as a
//! `NetEvent::CaptureEnded`.

pub mod synthetic;

use tracing::debug;

use crate::error::CaptureError;
use crate::model::capture::{CaptureSource, CaptureStream, CaptureTrack};
use crate::model::ids::HandleId;
use crate::presenter::Presenter;

#[allow(async_fn_in_trait)]
pub trait CaptureDevices {
    /// Requests a stream from the device, which may wait on a permission prompt.
    async fn open(&mut self, source: CaptureSource) -> Result<CaptureStream, CaptureError>;

    /// Stops every track of the stream.
    fn stop(&mut self, stream: &mut CaptureStream);

    /// Arranges for a `CaptureEnded` event when the device ends `track`.
    fn observe_end(&mut self, stream: &CaptureStream, track: &CaptureTrack);
}

#[derive(Debug)]
pub struct CaptureManager<D> {
    devices: D,
    held: Option<CaptureStream>,
}

impl<D: CaptureDevices> CaptureManager<D> {
    pub fn new(devices: D) -> CaptureManager<D> {
        CaptureManager {
            devices,
            held: None,
        }
    }

    pub fn current(&self) -> Option<&CaptureStream> {
        self.held.as_ref()
    }

    pub fn devices(&self) -> &D {
        &self.devices
    }

    pub fn devices_mut(&mut self) -> &mut D {
        &mut self.devices
    }

    /// Releases any held stream, then acquires a new one from `source`.
    ///
    /// On failure nothing is held and nothing is retried.
    pub async fn acquire<P: Presenter>(
        &mut self,
        source: CaptureSource,
        ui: &mut P,
    ) -> Result<&CaptureStream, CaptureError> {
        ui.info(format!("Acquiring local media stream (source: {source})"));
        self.release_held(ui);

        let stream = match self.devices.open(source).await {
            Ok(stream) => stream,
            Err(e) => {
                ui.error(format!("Failed to acquire local media stream: {e}"));
                return Err(e);
            }
        };

        ui.info(format!(
            "Local stream acquired (source: {}, tracks: {})",
            stream.source,
            stream.tracks.len()
        ));
        match stream.primary_video() {
            Some(track) => self.devices.observe_end(&stream, track),
            None => debug!("Stream {} has no video track to observe", stream.id),
        }
        ui.local_preview(Some(&stream));

        let held = self.held.insert(stream);
        Ok(&*held)
    }

    /// Stops and drops the held stream. Returns false when nothing was held.
    pub fn release<P: Presenter>(&mut self, ui: &mut P) -> bool {
        let released = self.release_held(ui);
        if !released {
            ui.warn("No local media stream to release");
        }
        released
    }

    fn release_held<P: Presenter>(&mut self, ui: &mut P) -> bool {
        let Some(mut stream) = self.held.take() else {
            return false;
        };
        self.devices.stop(&mut stream);
        ui.local_preview(None);
        ui.info(format!("Local {} stream released", stream.source));
        true
    }

    /// The device ended a stream. Only the held stream is affected.
    pub fn handle_ended<P: Presenter>(&mut self, id: HandleId, ui: &mut P) {
        if self.held.as_ref().map(|s| s.id) != Some(id) {
            debug!("End of stale capture stream {}", id);
            return;
        }
        self.held = None;
        ui.local_preview(None);
        ui.warn("Local media stream was stopped by the device");
    }
}
