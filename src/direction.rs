// src/direction.rs
//
// Travel direction from lateral cone motion.
//
// Cones slide past the car, so the sign of a cone's x-motion between two
// frames tells which side of the track it sits on. Blue motion is consulted
// first, yellow only when the previous frame had no blue cone. With neither
// available the previous angle is carried over unchanged.

use crate::steering::SteeringAngleMapper;
use crate::types::{MarkerPair, Orientation, SteeringAngle, SteeringEstimate};
use tracing::debug;

/// What the tracker remembers from the previous frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrackState {
    pub previous: MarkerPair,
    pub previous_angle: SteeringAngle,
}

/// First-match orientation policy over previous -> current centroids.
///
/// A decreasing blue x means blue cones are on the left (clockwise); any
/// other blue motion, including none, means counter-clockwise. Yellow motion
/// reads the other way round.
pub fn resolve_orientation(previous: &MarkerPair, current: &MarkerPair) -> Option<Orientation> {
    if previous.blue.is_defined() {
        if previous.blue.x > current.blue.x {
            Some(Orientation::Clockwise)
        } else {
            Some(Orientation::CounterClockwise)
        }
    } else if previous.yellow.is_defined() {
        if previous.yellow.x > current.yellow.x {
            Some(Orientation::CounterClockwise)
        } else {
            Some(Orientation::Clockwise)
        }
    } else {
        None
    }
}

#[derive(Debug, Default)]
pub struct DirectionTracker {
    state: TrackState,
}

impl DirectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &TrackState {
        &self.state
    }

    pub fn resolve(&self, current: &MarkerPair) -> Option<Orientation> {
        resolve_orientation(&self.state.previous, current)
    }

    /// Decide this frame's angle and roll the state forward.
    pub fn update(
        &mut self,
        current: MarkerPair,
        mapper: &SteeringAngleMapper,
        timestamp_us: i64,
    ) -> SteeringEstimate {
        let orientation = self.resolve(&current);
        let angle = match orientation {
            Some(o) => mapper.map(&current, o),
            None => {
                debug!(
                    "No previous cone position, holding angle {:.2}",
                    self.state.previous_angle.value()
                );
                self.state.previous_angle
            }
        };

        self.state = TrackState {
            previous: current,
            previous_angle: angle,
        };

        SteeringEstimate {
            timestamp_us,
            angle,
            orientation,
        }
    }
}
