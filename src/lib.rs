//! # deepsort-rs - Multi-Object Tracking Core
//!
//! Rust implementation of the DeepSORT tracking core: stable integer
//! identities for a stream of per-frame bounding-box detections.
//!
//! The crate consists of three tightly coupled subsystems:
//!
//! - A constant-velocity Kalman filter over the `(cx, cy, a, h)` measurement
//!   space
//! - A gated, cascaded data-association engine solved by the Hungarian
//!   (Kuhn-Munkres) algorithm
//! - A tentative/confirmed/deleted track lifecycle manager
//!
//! The detector producing the boxes, any appearance embedding, and video I/O
//! are external collaborators: detections come in, the live track list goes
//! out.
//!
//! ## Example
//!
//! ```rust,ignore
//! use deepsort_rs::{BBox, Tracker, TrackerConfig};
//!
//! let mut tracker = Tracker::new(TrackerConfig::default()).unwrap();
//!
//! // One call per frame with that frame's detections.
//! tracker.update(&[BBox::new(0.0, 0.0, 10.0, 20.0)]).unwrap();
//!
//! for track in tracker.objects() {
//!     println!("track {} at {:?}", track.id(), track.last_position());
//! }
//! ```

pub mod assignment;
pub mod bbox;
pub mod kalman;
pub mod track;
pub mod tracker;

// Re-exports for convenience
pub use assignment::{Assignment, HungarianSolver};
pub use bbox::{BBox, Measurement, Point};
pub use kalman::{KalmanFilter, CHI2_INV_95};
pub use track::{Track, TrackState};
pub use tracker::{Tracker, TrackerConfig};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur while tracking
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Cost matrix entry ({row}, {col}) is negative")]
        NegativeCost { row: usize, col: usize },

        #[error("Projected covariance is not positive definite")]
        NotPositiveDefinite,
    }

    /// Result type for tracking operations
    pub type Result<T> = std::result::Result<T, Error>;
}
