//! Motion detection module

use crate::config::DetectorConfig;
use crate::diagnostics::MagnitudeDumper;
use crate::filter::NoiseFilter;
use crate::grid::MacroblockGrid;
use crate::prelude::v1::*;
use log::*;

/// Kind of event reported by the detector.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MovementEvent {
    Movement,
}

/// Receiver of detection events.
///
/// Handlers are invoked synchronously on the detection thread. A slow handler delays processing
/// of the next frame, and frames that arrive in the meantime are dropped.
pub trait EventHandler: Send {
    /// Called whenever the filtered count reaches the threshold.
    ///
    /// # Arguments
    ///
    /// * `count` - filtered number of moving macroblocks.
    /// * `kind` - kind of the event.
    fn on_event(&mut self, count: u32, kind: MovementEvent);
}

impl<F: FnMut(u32, MovementEvent) + Send> EventHandler for F {
    fn on_event(&mut self, count: u32, kind: MovementEvent) {
        self(count, kind)
    }
}

/// Sensitivity map based motion detector.
///
/// Counts macroblocks whose motion vectors are longer than their sensitivity, filters the count
/// against the recent background motion, and reports movement when the filtered value reaches
/// `threshold`.
pub struct Detector {
    map: SensitivityMap,
    filter: NoiseFilter,
    threshold: u32,
    handler: Box<dyn EventHandler>,
    dumper: Option<MagnitudeDumper>,
    frames: u64,
    events: u64,
}

impl Detector {
    /// Create a new detector.
    ///
    /// # Arguments
    ///
    /// * `map` - per-macroblock sensitivity.
    /// * `filter` - noise filter to feed counts through.
    /// * `threshold` - filtered count at which movement is reported.
    /// * `handler` - receiver of movement events.
    pub fn new(
        map: SensitivityMap,
        filter: NoiseFilter,
        threshold: u32,
        handler: impl EventHandler + 'static,
    ) -> Self {
        Self {
            map,
            filter,
            threshold,
            handler: Box::new(handler),
            dumper: None,
            frames: 0,
            events: 0,
        }
    }

    /// Build a detector from configuration.
    ///
    /// Loads the sensitivity map, if any, and sets up magnitude dumps.
    pub fn from_config(
        config: &DetectorConfig,
        handler: impl EventHandler + 'static,
    ) -> Result<Self> {
        config.validate()?;

        let grid = MacroblockGrid::from_pixels(config.pixel_width, config.pixel_height)?;

        let map = match &config.map_path {
            Some(path) => SensitivityMap::build_from_image(path, grid)?,
            None => SensitivityMap::build_uniform(grid, config.sensitivity),
        };

        let filter = NoiseFilter::new(&config.filter, config.threshold, grid.size())?;

        let mut detector = Self::new(map, filter, config.threshold, handler);
        detector.dumper = config.dump.as_ref().map(MagnitudeDumper::new);

        Ok(detector)
    }

    /// Attach a magnitude dumper.
    pub fn with_dumper(mut self, dumper: MagnitudeDumper) -> Self {
        self.dumper = Some(dumper);
        self
    }

    pub fn grid(&self) -> MacroblockGrid {
        self.map.grid()
    }

    pub fn filter(&self) -> &NoiseFilter {
        &self.filter
    }

    /// Number of frames processed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Number of movement events reported so far.
    pub fn events(&self) -> u64 {
        self.events
    }

    /// Count macroblocks that move more than their sensitivity allows.
    pub fn count_exceedances(&self, frame: &FrameBuffer) -> Result<u32> {
        let grid = self.map.grid();
        let (width, height) = grid.dim();
        let stride = grid.row_stride(frame.len())?;

        let count = (0..height)
            .map(|y| {
                let vectors = &frame.as_slice()[y * stride..y * stride + width];
                self.map
                    .row(y)
                    .iter()
                    .zip(vectors)
                    .filter(|(&sens, v)| v.magnitude_sq() > sens as u32)
                    .count()
            })
            .sum::<usize>();

        Ok(count as u32)
    }

    /// Process a single frame of motion vectors.
    ///
    /// Returns the filtered count. Empty grids are ignored.
    pub fn process(&mut self, frame: &FrameBuffer) -> Result<u32> {
        let grid = self.map.grid();

        if grid.is_empty() {
            return Ok(0);
        }

        let count = self.count_exceedances(frame)?;

        if let Some(dumper) = &mut self.dumper {
            dumper.dump(grid, frame);
        }

        let filtered = self.filter.observe(count);
        self.frames += 1;

        let sample = self.filter.last();
        trace!(
            "{:4}({:4} -{:3}) / {} ({})",
            sample.smoothed,
            sample.raw,
            sample.noise_floor,
            self.threshold,
            grid.size()
        );

        if filtered >= self.threshold {
            debug!("Movement: {} (raw {})", filtered, count);
            self.events += 1;
            self.handler.on_event(filtered, MovementEvent::Movement);
        }

        Ok(filtered)
    }
}
