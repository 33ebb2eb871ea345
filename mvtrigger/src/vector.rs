//! # Motion vector frames

use crate::error::{Error, Result};
use bytemuck::{Pod, Zeroable};

/// Motion vector of a single macroblock, as laid out by the encoder.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct MotionVector {
    pub dx: i8,
    pub dy: i8,
    /// Sum of absolute differences of the block match. Not used in detection.
    pub sad: u16,
}

impl MotionVector {
    pub fn new(dx: i8, dy: i8) -> Self {
        Self { dx, dy, sad: 0 }
    }

    /// Squared length of the vector.
    ///
    /// The largest possible value, `2 * 128^2`, does not fit in `u16`, so this is wider than the
    /// sensitivity map cells.
    pub fn magnitude_sq(&self) -> u32 {
        let (dx, dy) = (self.dx as i32, self.dy as i32);
        (dx * dx + dy * dy) as u32
    }

    /// Length of the vector, rounded to the nearest integer.
    pub fn magnitude(&self) -> u32 {
        (self.magnitude_sq() as f64).sqrt().round() as u32
    }
}

/// Size of a single encoded motion vector.
pub const VECTOR_SIZE: usize = std::mem::size_of::<MotionVector>();

/// Owned motion vectors of a single frame.
///
/// Each buffer is created by the producer and consumed exactly once by the detection worker.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameBuffer {
    vectors: Vec<MotionVector>,
}

impl FrameBuffer {
    /// Copy raw encoder output into a freshly allocated buffer.
    ///
    /// Only whole vectors are copied, trailing bytes are ignored. The source does not need to be
    /// aligned.
    pub fn copy_from_bytes(bytes: &[u8]) -> Result<Self> {
        let count = bytes.len() / VECTOR_SIZE;

        let mut vectors = Vec::new();
        vectors
            .try_reserve_exact(count)
            .map_err(|_| Error::Allocation(count))?;
        vectors.resize(count, MotionVector::zeroed());

        bytemuck::cast_slice_mut::<_, u8>(&mut vectors)
            .copy_from_slice(&bytes[..count * VECTOR_SIZE]);

        Ok(Self { vectors })
    }

    /// Raw bytes of the buffer, in the same layout accepted by
    /// [`copy_from_bytes`](Self::copy_from_bytes).
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vectors)
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn as_slice(&self) -> &[MotionVector] {
        &self.vectors
    }
}

impl From<Vec<MotionVector>> for FrameBuffer {
    fn from(vectors: Vec<MotionVector>) -> Self {
        Self { vectors }
    }
}

impl AsRef<[MotionVector]> for FrameBuffer {
    fn as_ref(&self) -> &[MotionVector] {
        &self.vectors
    }
}
