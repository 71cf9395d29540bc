// src/lib.rs

pub mod accuracy;
pub mod color_analysis;
pub mod config;
pub mod contours;
pub mod detector;
pub mod direction;
pub mod frame_source;
pub mod ground_truth;
pub mod overlay;
pub mod pipeline;
pub mod recording;
pub mod session;
pub mod steering;
pub mod types;

pub use accuracy::{AccuracyAggregator, RunSummary};
pub use detector::{ColorMarkerDetector, MarkerDetector};
pub use pipeline::{run_loop, PipelineSinks, SteeringPipeline};
pub use types::{Config, Frame, MarkerPair, Orientation, SteeringAngle, SteeringEstimate};
