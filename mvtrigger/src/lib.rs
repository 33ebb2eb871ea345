//! # Motion vector triggered movement detection
//!
//! This library decides, frame by frame, whether there is movement in a scene, using the motion
//! vectors a video encoder already computes for every macroblock. No decoding is involved.
//!
//! Every frame's vectors are compared against a per-macroblock sensitivity map, the number of
//! moving macroblocks is filtered against the recent background motion, and an event is reported
//! whenever the result reaches a threshold. Detection runs on its own thread, fed through a
//! latest-wins handoff, so a slow detector never makes the encoder wait.
//!
//! The easiest way to use the library is to import its prelude:
//!
//! ```
//! use mvtrigger::prelude::v1::*;
//! ```

pub mod config;
pub mod detector;
pub mod diagnostics;
pub mod error;
pub mod filter;
pub mod grid;
pub mod handle;
pub mod handoff;
pub mod sensitivity;
pub mod stream;
pub mod vector;

pub use handle::initialize;

pub mod prelude {
    pub mod v1 {
        pub use crate::{
            config::{DetectorConfig, DumpConfig, FilterConfig},
            detector::{Detector, EventHandler, MovementEvent},
            error::{Error, Result},
            grid::MacroblockGrid,
            handle::{initialize, DetectorHandle, WorkerSummary},
            sensitivity::SensitivityMap,
            vector::{FrameBuffer, MotionVector},
        };
    }
}
