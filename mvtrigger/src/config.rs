//! # Detector configuration

use crate::error::{Error, Result};
use std::path::PathBuf;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tuning constants of the noise filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct FilterConfig {
    /// Number of past frames the noise floor is averaged over.
    pub window_size: usize,
    /// Number of most recent frames the trend is averaged over.
    pub trend_window: usize,
    /// Counts above `total_macroblocks / saturation_divisor` are treated as noise.
    pub saturation_divisor: u32,
    /// Noise floor contributions are capped at `threshold * floor_cap_multiplier`.
    pub floor_cap_multiplier: u32,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            window_size: 60,
            trend_window: 12,
            saturation_divisor: 4,
            floor_cap_multiplier: 4,
        }
    }
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.trend_window == 0 {
            return Err(Error::Config("trend window must be at least 1".into()));
        }

        if self.window_size < self.trend_window {
            return Err(Error::Config(format!(
                "window size {} is smaller than the trend window {}",
                self.window_size, self.trend_window
            )));
        }

        if self.saturation_divisor == 0 {
            return Err(Error::Config("saturation divisor must be positive".into()));
        }

        Ok(())
    }
}

/// Magnitude dump settings.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DumpConfig {
    /// Output path. `{frame}` or `{frame:0N}` is replaced with the dump counter.
    pub path_template: String,
    /// Dump every `interval`th processed frame.
    #[cfg_attr(feature = "serde", serde(default = "default_interval"))]
    pub interval: usize,
}

#[cfg(feature = "serde")]
fn default_interval() -> usize {
    1
}

impl DumpConfig {
    pub fn new(path_template: impl Into<String>) -> Self {
        Self {
            path_template: path_template.into(),
            interval: 1,
        }
    }
}

/// Complete configuration of a motion detector.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DetectorConfig {
    /// Width of the encoded frames, in pixels.
    pub pixel_width: usize,
    /// Height of the encoded frames, in pixels.
    pub pixel_height: usize,
    /// Grayscale sensitivity map. Takes precedence over `sensitivity`.
    pub map_path: Option<PathBuf>,
    /// Uniform sensitivity, used when there is no map.
    pub sensitivity: u32,
    /// Number of macroblocks that must move, after filtering, to report movement.
    pub threshold: u32,
    pub filter: FilterConfig,
    pub dump: Option<DumpConfig>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            pixel_width: 1280,
            pixel_height: 720,
            map_path: None,
            sensitivity: 10,
            threshold: 20,
            filter: Default::default(),
            dump: None,
        }
    }
}

impl DetectorConfig {
    /// Check the configuration for values that can never work.
    pub fn validate(&self) -> Result<()> {
        if self.pixel_width == 0 || self.pixel_height == 0 {
            return Err(Error::Config(format!(
                "frame dimensions must be positive, got {}x{}",
                self.pixel_width, self.pixel_height
            )));
        }

        self.filter.validate()?;

        if let Some(dump) = &self.dump {
            if dump.interval == 0 {
                return Err(Error::Config("dump interval must be positive".into()));
            }
        }

        Ok(())
    }

    /// Load configuration from a JSON file.
    ///
    /// Missing fields take their default values.
    #[cfg(feature = "serde_json")]
    pub fn from_json_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config = serde_json::from_reader(std::io::BufReader::new(file))?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        DetectorConfig::default().validate().unwrap();
    }

    #[test]
    fn window_smaller_than_trend() {
        let config = DetectorConfig {
            filter: FilterConfig {
                window_size: 11,
                ..Default::default()
            },
            ..Default::default()
        };

        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn zero_values_rejected() {
        let bad = [
            DetectorConfig {
                pixel_width: 0,
                ..Default::default()
            },
            DetectorConfig {
                filter: FilterConfig {
                    trend_window: 0,
                    ..Default::default()
                },
                ..Default::default()
            },
            DetectorConfig {
                filter: FilterConfig {
                    saturation_divisor: 0,
                    ..Default::default()
                },
                ..Default::default()
            },
            DetectorConfig {
                dump: Some(DumpConfig {
                    path_template: "dump.png".into(),
                    interval: 0,
                }),
                ..Default::default()
            },
        ];

        for config in bad {
            assert!(config.validate().is_err(), "{:?}", config);
        }
    }

    #[cfg(feature = "serde_json")]
    #[test]
    fn partial_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("detector.json");
        std::fs::write(
            &path,
            r#"{
                "pixel_width": 1920,
                "pixel_height": 1080,
                "threshold": 5,
                "filter": { "window_size": 30 },
                "dump": { "path_template": "/tmp/mv-{frame:05}.png" }
            }"#,
        )
        .unwrap();

        let config = DetectorConfig::from_json_file(&path).unwrap();

        assert_eq!(config.pixel_width, 1920);
        assert_eq!(config.threshold, 5);
        assert_eq!(config.sensitivity, 10);
        assert_eq!(config.filter.window_size, 30);
        assert_eq!(config.filter.trend_window, 12);
        assert_eq!(config.dump.as_ref().map(|d| d.interval), Some(1));
        config.validate().unwrap();
    }
}
