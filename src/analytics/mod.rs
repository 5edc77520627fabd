pub mod detection;
pub mod geometry;
pub mod occupancy;
pub mod process_detector;
pub mod zone_matcher;

pub use detection::{BelongingsSensor, Detection, Detector};
pub use geometry::{BoundingBox, Point};
pub use occupancy::{event_for_transition, OccupancyStateMachine, Transition};
pub use process_detector::ProcessDetector;
pub use zone_matcher::{match_zones, MatchResult, MatchStatus};
