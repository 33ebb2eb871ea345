//! # Motion magnitude dumps
//!
//! Writes the vector length of every macroblock as a grayscale image. Useful for drawing
//! sensitivity maps and checking what the encoder actually reports.

use crate::config::DumpConfig;
use crate::error::Result;
use crate::grid::MacroblockGrid;
use crate::vector::FrameBuffer;
use image::{GrayImage, Luma};
use log::*;
use std::path::PathBuf;

/// Periodically dumps frame magnitudes to image files.
pub struct MagnitudeDumper {
    path_template: String,
    interval: usize,
    frames_seen: usize,
    counter: u64,
}

impl MagnitudeDumper {
    pub fn new(config: &DumpConfig) -> Self {
        Self {
            path_template: config.path_template.clone(),
            interval: config.interval.max(1),
            frames_seen: 0,
            counter: 0,
        }
    }

    /// Number of dumps attempted so far, failed ones included.
    ///
    /// This is also the number the next dump gets in its file name.
    pub fn dumped(&self) -> u64 {
        self.counter
    }

    /// Render a frame's magnitudes into an image.
    ///
    /// Each pixel is the rounded vector length of its macroblock, saturated at 255.
    pub fn render(grid: MacroblockGrid, frame: &FrameBuffer) -> Result<GrayImage> {
        let (width, height) = grid.dim();
        let stride = grid.row_stride(frame.len())?;
        let vectors = frame.as_slice();

        Ok(GrayImage::from_fn(width as u32, height as u32, |x, y| {
            let v = vectors[y as usize * stride + x as usize];
            Luma([v.magnitude().min(u8::MAX as u32) as u8])
        }))
    }

    /// Produce the output path for a given dump number.
    ///
    /// `{frame}` expands to the plain number, `{frame:0N}` pads it with zeroes to `N` digits.
    /// Templates without a placeholder always produce the same path.
    pub fn path_for(&self, counter: u64) -> PathBuf {
        let template = &self.path_template;

        let Some(start) = template.find("{frame") else {
            return template.into();
        };

        let Some(len) = template[start..].find('}') else {
            return template.into();
        };

        let placeholder = &template[start + "{frame".len()..start + len];

        let number = match placeholder.strip_prefix(":0").map(str::parse::<usize>) {
            Some(Ok(width)) => format!("{counter:0width$}"),
            _ => counter.to_string(),
        };

        format!(
            "{}{}{}",
            &template[..start],
            number,
            &template[start + len + 1..]
        )
        .into()
    }

    /// Dump a frame if it is due.
    ///
    /// Failures are logged and otherwise ignored.
    pub fn dump(&mut self, grid: MacroblockGrid, frame: &FrameBuffer) {
        let due = self.frames_seen % self.interval == 0;
        self.frames_seen += 1;

        if !due || grid.is_empty() {
            return;
        }

        let path = self.path_for(self.counter);
        self.counter += 1;

        let img = match Self::render(grid, frame) {
            Ok(img) => img,
            Err(e) => {
                warn!("Not dumping motion magnitudes: {}", e);
                return;
            }
        };

        match img.save(&path) {
            Ok(()) => trace!("Dumped motion magnitudes to {:?}", path),
            Err(e) => warn!("Failed to dump motion magnitudes to {:?}: {}", path, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::MotionVector;

    fn dumper(template: &str, interval: usize) -> MagnitudeDumper {
        MagnitudeDumper::new(&DumpConfig {
            path_template: template.into(),
            interval,
        })
    }

    #[test]
    fn path_templates() {
        let d = dumper("/tmp/dump-{frame}.png", 1);
        assert_eq!(d.path_for(7), PathBuf::from("/tmp/dump-7.png"));

        let d = dumper("/tmp/{frame:05}/mv.png", 1);
        assert_eq!(d.path_for(42), PathBuf::from("/tmp/00042/mv.png"));

        let d = dumper("/run/shm/dump.png", 1);
        assert_eq!(d.path_for(3), PathBuf::from("/run/shm/dump.png"));
    }

    #[test]
    fn render_skips_padding_column() {
        let grid = MacroblockGrid::new(2, 2);
        // Padded layout, the third vector of each row is not a macroblock.
        let frame = FrameBuffer::from(vec![
            MotionVector::new(3, 4),
            MotionVector::new(0, 0),
            MotionVector::new(100, 100),
            MotionVector::new(-6, 8),
            MotionVector::new(127, 127),
            MotionVector::new(100, 100),
        ]);

        let img = MagnitudeDumper::render(grid, &frame).unwrap();

        assert_eq!(img.dimensions(), (2, 2));
        assert_eq!(img.as_raw(), &vec![5, 0, 10, 180]);
    }

    #[test]
    fn dumps_on_interval() {
        let dir = tempfile::tempdir().unwrap();
        let template = dir.path().join("mv-{frame:03}.png");
        let mut d = dumper(template.to_str().unwrap(), 2);

        let grid = MacroblockGrid::new(1, 1);
        let frame = FrameBuffer::from(vec![MotionVector::new(1, 0)]);

        for _ in 0..5 {
            d.dump(grid, &frame);
        }

        assert_eq!(d.dumped(), 3);
        for i in 0..3 {
            let img = image::open(dir.path().join(format!("mv-{i:03}.png")))
                .unwrap()
                .to_luma8();
            assert_eq!(img.as_raw(), &vec![1]);
        }
        assert!(!dir.path().join("mv-003.png").exists());
    }

    #[test]
    fn write_failure_is_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing");
        let template = missing.join("mv-{frame}.png");
        let mut d = dumper(template.to_str().unwrap(), 1);

        let grid = MacroblockGrid::new(1, 1);
        let frame = FrameBuffer::from(vec![MotionVector::new(1, 0)]);

        d.dump(grid, &frame);
        assert_eq!(d.dumped(), 1);

        // A failed dump still uses up its number.
        std::fs::create_dir(&missing).unwrap();
        d.dump(grid, &frame);

        assert_eq!(d.dumped(), 2);
        assert!(!missing.join("mv-0.png").exists());
        assert!(missing.join("mv-1.png").exists());
    }
}
