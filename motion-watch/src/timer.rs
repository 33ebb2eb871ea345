use anyhow::anyhow;
use std::time::{Duration, Instant};

/// Paces a replay to a fixed frame rate.
pub struct Timer {
    start: Instant,
    target: Duration,
    frame_time: Duration,
}

impl Timer {
    pub fn new(fps: f64) -> anyhow::Result<Self> {
        let frame_time = Duration::try_from_secs_f64(1.0 / fps)
            .map_err(|e| anyhow!("unusable frame rate {fps}: {e}"))?;

        Ok(Self {
            start: Instant::now(),
            target: Default::default(),
            frame_time,
        })
    }

    /// Sleep until the next frame is due.
    pub fn tick(&mut self) {
        if let Some(duration) = self.target.checked_sub(self.start.elapsed()) {
            std::thread::sleep(duration);
        }

        self.target += self.frame_time;
    }

    /// Create a timer only when a positive frame rate is given.
    pub fn from_option(fps: Option<f64>) -> anyhow::Result<Option<Self>> {
        fps.filter(|f| *f > 0.0).map(Self::new).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_time_from_rate() {
        let timer = Timer::new(25.0).unwrap();
        assert_eq!(timer.frame_time, Duration::from_millis(40));
    }

    #[test]
    fn unpaced_without_rate() {
        assert!(Timer::from_option(None).unwrap().is_none());
        assert!(Timer::from_option(Some(0.0)).unwrap().is_none());
        assert!(Timer::from_option(Some(-5.0)).unwrap().is_none());
    }

    #[test]
    fn tiny_rate_is_an_error() {
        assert!(Timer::from_option(Some(1e-320)).is_err());
        assert!(Timer::from_option(Some(f64::MIN_POSITIVE)).is_err());
    }
}
