//! # Noise filter
//!
//! Raw per-frame counts of moving macroblocks are too jumpy to trigger on. Foliage, sensor noise
//! and exposure changes produce steady background motion, while real movement shows up as a step
//! above it. The filter keeps two averages over a ring buffer of past counts:
//!
//! * the noise floor, averaged over the whole window;
//! * the trend, averaged over the most recent few frames.
//!
//! Output is the amount by which the trend exceeds the noise floor.

use crate::config::FilterConfig;
use crate::error::Result;

/// Intermediate values of a single [`NoiseFilter::observe`] call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FilterSample {
    /// Count passed in.
    pub raw: u32,
    /// Count after saturation clamping, as stored in the ring buffer.
    pub clamped: u32,
    pub trend: u32,
    pub noise_floor: u32,
    /// Filter output.
    pub smoothed: u32,
}

/// Moving average and noise floor estimator.
pub struct NoiseFilter {
    window: Vec<u32>,
    cursor: usize,
    floor_sum: u64,
    trend_window: usize,
    saturation: u32,
    threshold: u32,
    floor_cap: u32,
    last: FilterSample,
}

impl NoiseFilter {
    /// Create a new filter.
    ///
    /// # Arguments
    ///
    /// * `config` - window sizes and clamping constants.
    /// * `threshold` - detection threshold, used for clamping.
    /// * `total_macroblocks` - number of macroblocks in a frame.
    pub fn new(config: &FilterConfig, threshold: u32, total_macroblocks: usize) -> Result<Self> {
        config.validate()?;

        let saturation = (total_macroblocks / config.saturation_divisor as usize)
            .try_into()
            .unwrap_or(u32::MAX);

        Ok(Self {
            window: vec![0; config.window_size],
            cursor: 0,
            floor_sum: 0,
            trend_window: config.trend_window,
            saturation,
            threshold,
            floor_cap: threshold.saturating_mul(config.floor_cap_multiplier),
            last: Default::default(),
        })
    }

    /// Feed the next frame's count and get the filtered value.
    pub fn observe(&mut self, raw: u32) -> u32 {
        let clamped = if raw > self.saturation {
            self.threshold
        } else {
            raw
        };

        // Big motion must not raise the floor, so contributions are capped both ways.
        let oldest = self.window[self.cursor];
        self.floor_sum += clamped.min(self.floor_cap) as u64;
        self.floor_sum -= oldest.min(self.floor_cap) as u64;
        let noise_floor = (self.floor_sum / self.window.len() as u64) as u32;

        self.window[self.cursor] = clamped;

        let len = self.window.len();
        let trend_sum = (0..self.trend_window)
            .map(|back| self.window[(self.cursor + len - back) % len] as u64)
            .sum::<u64>();
        let trend = (trend_sum / self.trend_window as u64) as u32;

        self.cursor = (self.cursor + 1) % len;

        let smoothed = trend.saturating_sub(noise_floor);

        self.last = FilterSample {
            raw,
            clamped,
            trend,
            noise_floor,
            smoothed,
        };

        smoothed
    }

    /// Get the values computed by the last `observe` call.
    pub fn last(&self) -> FilterSample {
        self.last
    }

    /// Current noise floor estimate.
    pub fn noise_floor(&self) -> u32 {
        (self.floor_sum / self.window.len() as u64) as u32
    }

    pub fn window_size(&self) -> usize {
        self.window.len()
    }

    /// Forget all history.
    pub fn reset(&mut self) {
        self.window.iter_mut().for_each(|v| *v = 0);
        self.cursor = 0;
        self.floor_sum = 0;
        self.last = Default::default();
    }
}
