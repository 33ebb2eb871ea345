//! # Detection worker
//!
//! [`DetectorHandle`] owns the background thread that runs a [`Detector`] on every frame it
//! receives through a latest-wins [`FrameHandoff`].

use crate::config::DetectorConfig;
use crate::detector::{Detector, EventHandler};
use crate::grid::MacroblockGrid;
use crate::handoff::{FrameHandoff, HandoffStats};
use crate::prelude::v1::*;
use log::*;
use std::sync::Arc;
use std::thread::{Builder, JoinHandle};

/// Totals collected by the worker over its lifetime.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerSummary {
    /// Frames that went through detection.
    pub processed: u64,
    /// Frames that could not be processed.
    pub rejected: u64,
    /// Movement events reported.
    pub events: u64,
}

/// Handle to a running motion detector.
///
/// Dropping the handle stops the worker and waits for it to finish.
pub struct DetectorHandle {
    handoff: Arc<FrameHandoff<FrameBuffer>>,
    handle: Option<JoinHandle<WorkerSummary>>,
    grid: MacroblockGrid,
}

/// Set up a motion detector and start its worker thread.
///
/// All configuration is validated, and the sensitivity map loaded, before the thread is spawned.
///
/// # Arguments
///
/// * `config` - detector configuration.
/// * `handler` - receiver of movement events, called on the worker thread.
pub fn initialize(
    config: &DetectorConfig,
    handler: impl EventHandler + 'static,
) -> Result<DetectorHandle> {
    let detector = Detector::from_config(config, handler)?;
    DetectorHandle::spawn(detector)
}

impl DetectorHandle {
    /// Start a worker thread for an already built detector.
    pub fn spawn(detector: Detector) -> Result<Self> {
        let grid = detector.grid();
        let handoff = Arc::new(FrameHandoff::new());

        let handle = Builder::new()
            .name("mvtrigger-detect".into())
            .spawn({
                let handoff = handoff.clone();
                move || Self::run(detector, &handoff)
            })
            .map_err(Error::Spawn)?;

        let (w, h) = grid.dim();
        info!("Motion detection started on a {}x{} macroblock grid", w, h);

        Ok(Self {
            handoff,
            handle: Some(handle),
            grid,
        })
    }

    fn run(mut detector: Detector, handoff: &FrameHandoff<FrameBuffer>) -> WorkerSummary {
        // Producers must see the worker gone even if an event handler unwinds through here.
        let _close = CloseOnExit(handoff);

        let mut rejected = 0;

        while let Some(frame) = handoff.take_blocking() {
            if let Err(e) = detector.process(&frame) {
                warn!("Dropping frame: {}", e);
                rejected += 1;
            }
        }

        debug!("Motion detection worker exiting");

        WorkerSummary {
            processed: detector.frames(),
            rejected,
            events: detector.events(),
        }
    }

    pub fn grid(&self) -> MacroblockGrid {
        self.grid
    }

    /// Hand a frame of raw encoder vectors to the worker.
    ///
    /// The bytes are copied, so the caller may reuse its buffer right away. A frame that has not
    /// been picked up by the worker yet is dropped in favour of this one.
    pub fn submit_frame(&self, raw: &[u8]) -> Result<()> {
        let frame = FrameBuffer::copy_from_bytes(raw)?;
        self.submit(frame)
    }

    /// Hand an already owned frame to the worker.
    ///
    /// Fails with [`Error::WorkerStopped`] once the worker has exited.
    pub fn submit(&self, frame: FrameBuffer) -> Result<()> {
        if self.handoff.is_closed() {
            return Err(Error::WorkerStopped);
        }

        if self.handoff.publish(frame) {
            trace!("Superseded an unprocessed frame");
        }

        Ok(())
    }

    pub fn stats(&self) -> HandoffStats {
        self.handoff.stats()
    }

    /// Stop the worker and wait for it to exit.
    ///
    /// A frame still waiting in the handoff is dropped. Returns `None` if the worker panicked.
    pub fn stop(mut self) -> Option<WorkerSummary> {
        self.shutdown()
    }

    /// Let the worker pick up the last submitted frame, then stop it.
    pub fn finish(self) -> Option<WorkerSummary> {
        self.handoff.wait_taken();
        self.stop()
    }

    fn shutdown(&mut self) -> Option<WorkerSummary> {
        self.handoff.close();

        let summary = self.handle.take()?.join();

        if summary.is_err() {
            error!("Motion detection worker panicked");
        }

        summary.ok()
    }
}

struct CloseOnExit<'a>(&'a FrameHandoff<FrameBuffer>);

impl Drop for CloseOnExit<'_> {
    fn drop(&mut self) {
        self.0.close();
    }
}

impl Drop for DetectorHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
