// src/steering.rs
//
// Zone-based steering angle lookup.
//
//   far_left      left       center      right      far_right
//      |  far-left  |  left of   |  right of  | far-right  |
//      |    band    |   center   |   center   |    band    |
//
// Each orientation owns an ordered rule table over the two cones' x
// positions; the first matching rule wins and no match means 0.0. The
// marker expected on the left ("active" side) drifting right maps to
// increasingly negative angles, the right-hand marker drifting left maps to
// increasingly positive ones. Both markers sitting outside the bracket means
// the car is well centred.
//
// Two table variants exist. `Canonical` uses half-open bands [lower, upper)
// and requires both markers outside the bracket for the straight rule.
// `Legacy` keeps the field-tested table verbatim: strict comparisons, an OR
// at the straight rule, and a counter-clockwise rule whose band is empty.

use crate::types::{MarkerClass, MarkerPair, Orientation, SteeringAngle, ZoneConfig, ZoneTableVariant};
use tracing::{debug, warn};

// ============================================================================
// RULE MODEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    FarLeft,
    Left,
    Center,
    Right,
    FarRight,
}

impl Edge {
    fn position(&self, zones: &ZoneConfig) -> f32 {
        match self {
            Edge::FarLeft => zones.far_left,
            Edge::Left => zones.left,
            Edge::Center => zones.center,
            Edge::Right => zones.right,
            Edge::FarRight => zones.far_right,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    Open,
    Inclusive(Edge),
    Exclusive(Edge),
}

/// An x-interval test on one marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Band {
    pub marker: MarkerClass,
    pub lower: Bound,
    pub upper: Bound,
}

impl Band {
    pub fn new(marker: MarkerClass, lower: Bound, upper: Bound) -> Self {
        Self {
            marker,
            lower,
            upper,
        }
    }

    pub fn contains(&self, x: f32, zones: &ZoneConfig) -> bool {
        let above = match self.lower {
            Bound::Open => true,
            Bound::Inclusive(e) => x >= e.position(zones),
            Bound::Exclusive(e) => x > e.position(zones),
        };
        let below = match self.upper {
            Bound::Open => true,
            Bound::Inclusive(e) => x <= e.position(zones),
            Bound::Exclusive(e) => x < e.position(zones),
        };
        above && below
    }

    /// False when no x can satisfy both bounds.
    pub fn is_satisfiable(&self, zones: &ZoneConfig) -> bool {
        let (lo, lo_incl) = match self.lower {
            Bound::Open => return true,
            Bound::Inclusive(e) => (e.position(zones), true),
            Bound::Exclusive(e) => (e.position(zones), false),
        };
        let (hi, hi_incl) = match self.upper {
            Bound::Open => return true,
            Bound::Inclusive(e) => (e.position(zones), true),
            Bound::Exclusive(e) => (e.position(zones), false),
        };
        lo < hi || (lo == hi && lo_incl && hi_incl)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    In(Band),
    All([Band; 2]),
    Any([Band; 2]),
}

impl Condition {
    pub fn matches(&self, pair: &MarkerPair, zones: &ZoneConfig) -> bool {
        let hit = |b: &Band| b.contains(pair.get(b.marker).x, zones);
        match self {
            Condition::In(b) => hit(b),
            Condition::All(bands) => bands.iter().all(hit),
            Condition::Any(bands) => bands.iter().any(hit),
        }
    }

    pub fn is_satisfiable(&self, zones: &ZoneConfig) -> bool {
        match self {
            Condition::In(b) => b.is_satisfiable(zones),
            Condition::All(bands) => bands.iter().all(|b| b.is_satisfiable(zones)),
            Condition::Any(bands) => bands.iter().any(|b| b.is_satisfiable(zones)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZoneRule {
    pub condition: Condition,
    pub angle: SteeringAngle,
}

// ============================================================================
// TABLES
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ZoneTable {
    rules: Vec<ZoneRule>,
}

impl ZoneTable {
    pub fn new(rules: Vec<ZoneRule>) -> Self {
        Self { rules }
    }

    pub fn for_variant(variant: ZoneTableVariant, orientation: Orientation) -> Self {
        match variant {
            ZoneTableVariant::Canonical => Self::canonical(orientation),
            ZoneTableVariant::Legacy => Self::legacy(orientation),
        }
    }

    /// Half-open bands, AND at the straight rule; counter-clockwise is the
    /// clockwise table with the marker roles swapped.
    pub fn canonical(orientation: Orientation) -> Self {
        use Bound::{Exclusive as Ex, Inclusive as Inc, Open};
        use SteeringAngle::*;

        let near = orientation.left_marker();
        let far = near.other();
        let rule = |condition, angle| ZoneRule { condition, angle };
        let band = Band::new;

        Self::new(vec![
            rule(
                Condition::All([
                    band(near, Open, Ex(Edge::Left)),
                    band(far, Inc(Edge::Right), Open),
                ]),
                Straight,
            ),
            rule(Condition::In(band(near, Inc(Edge::Left), Ex(Edge::Center))), Right),
            rule(Condition::In(band(near, Inc(Edge::Center), Ex(Edge::Right))), SharpRight),
            rule(Condition::In(band(near, Inc(Edge::Right), Ex(Edge::FarRight))), HardRight),
            rule(Condition::In(band(far, Inc(Edge::Center), Ex(Edge::Right))), Left),
            rule(Condition::In(band(far, Inc(Edge::Left), Ex(Edge::Center))), SharpLeft),
            rule(Condition::In(band(far, Inc(Edge::FarLeft), Ex(Edge::Left))), HardLeft),
        ])
    }

    /// The tables as they ran on the car, discrepancies included.
    pub fn legacy(orientation: Orientation) -> Self {
        use Bound::{Exclusive as Ex, Open};
        use SteeringAngle::*;

        let near = orientation.left_marker();
        let far = near.other();
        let rule = |condition, angle| ZoneRule { condition, angle };
        let band = Band::new;

        // The counter-clockwise table tests "blue < left && blue > center" for
        // a gentle left turn, which can never hold.
        let gentle_left = match orientation {
            Orientation::Clockwise => band(far, Ex(Edge::Center), Ex(Edge::Right)),
            Orientation::CounterClockwise => band(far, Ex(Edge::Center), Ex(Edge::Left)),
        };

        Self::new(vec![
            rule(
                Condition::Any([
                    band(near, Open, Ex(Edge::Left)),
                    band(far, Ex(Edge::Right), Open),
                ]),
                Straight,
            ),
            rule(Condition::In(band(near, Ex(Edge::Left), Ex(Edge::Center))), Right),
            rule(Condition::In(band(near, Ex(Edge::Center), Ex(Edge::Right))), SharpRight),
            rule(Condition::In(band(near, Ex(Edge::Right), Ex(Edge::FarRight))), HardRight),
            rule(Condition::In(gentle_left), Left),
            rule(Condition::In(band(far, Ex(Edge::Left), Ex(Edge::Center))), SharpLeft),
            rule(Condition::In(band(far, Ex(Edge::FarLeft), Ex(Edge::Left))), HardLeft),
        ])
    }

    /// First matching rule, with its index. No match is straight ahead.
    pub fn evaluate(&self, pair: &MarkerPair, zones: &ZoneConfig) -> (SteeringAngle, Option<usize>) {
        self.rules
            .iter()
            .position(|r| r.condition.matches(pair, zones))
            .map_or((SteeringAngle::Straight, None), |i| (self.rules[i].angle, Some(i)))
    }

    /// Indices of rules that no input can ever reach.
    pub fn unreachable_rules(&self, zones: &ZoneConfig) -> Vec<usize> {
        self.rules
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.condition.is_satisfiable(zones))
            .map(|(i, _)| i)
            .collect()
    }
}

// ============================================================================
// MAPPER
// ============================================================================

#[derive(Debug, Clone)]
pub struct SteeringAngleMapper {
    zones: ZoneConfig,
    clockwise: ZoneTable,
    counter_clockwise: ZoneTable,
}

impl SteeringAngleMapper {
    pub fn new(zones: ZoneConfig) -> Self {
        let clockwise = ZoneTable::for_variant(zones.table, Orientation::Clockwise);
        let counter_clockwise = ZoneTable::for_variant(zones.table, Orientation::CounterClockwise);

        for (name, table) in [("clockwise", &clockwise), ("counter-clockwise", &counter_clockwise)] {
            let dead = table.unreachable_rules(&zones);
            if !dead.is_empty() {
                warn!(
                    "{:?} {} zone table has unreachable rules {:?}",
                    zones.table, name, dead
                );
            }
        }

        Self {
            zones,
            clockwise,
            counter_clockwise,
        }
    }

    pub fn table(&self, orientation: Orientation) -> &ZoneTable {
        match orientation {
            Orientation::Clockwise => &self.clockwise,
            Orientation::CounterClockwise => &self.counter_clockwise,
        }
    }

    pub fn map(&self, pair: &MarkerPair, orientation: Orientation) -> SteeringAngle {
        let (angle, rule) = self.table(orientation).evaluate(pair, &self.zones);
        debug!(
            "{:?}: blue x={:.1} yellow x={:.1} -> rule {:?} angle {:.2}",
            orientation,
            pair.blue.x,
            pair.yellow.x,
            rule,
            angle.value()
        );
        angle
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use Orientation::{Clockwise as Cw, CounterClockwise as Ccw};

    fn mapper(variant: ZoneTableVariant) -> SteeringAngleMapper {
        SteeringAngleMapper::new(ZoneConfig {
            table: variant,
            ..ZoneConfig::default()
        })
    }

    fn angle(m: &SteeringAngleMapper, blue: f32, yellow: f32, o: Orientation) -> f64 {
        m.map(&MarkerPair::new(blue, yellow), o).value()
    }

    #[test]
    fn test_blue_left_of_center_turns_right() {
        let m = mapper(ZoneTableVariant::Canonical);
        assert_eq!(angle(&m, 200.0, 500.0, Cw), -0.1);
    }

    #[test]
    fn test_lone_far_left_yellow_turns_hard_left() {
        let m = mapper(ZoneTableVariant::Canonical);
        assert_eq!(angle(&m, 0.0, 100.0, Cw), 0.25);
    }

    #[test]
    fn test_bracketed_markers_go_straight() {
        let m = mapper(ZoneTableVariant::Canonical);
        assert_eq!(angle(&m, 100.0, 400.0, Cw), 0.0);
        assert_eq!(angle(&m, 400.0, 100.0, Ccw), 0.0);
    }

    #[test]
    fn test_clockwise_bands_step_monotonically() {
        let m = mapper(ZoneTableVariant::Canonical);
        let mut last = f64::INFINITY;
        for x in (0..480).step_by(10) {
            let a = angle(&m, x as f32, 0.0, Cw);
            assert!(a <= last, "angle rose at blue x={x}");
            last = a;
        }
        assert_eq!(angle(&m, 130.0, 0.0, Cw), -0.1);
        assert_eq!(angle(&m, 250.0, 0.0, Cw), -0.2);
        assert_eq!(angle(&m, 400.0, 0.0, Cw), -0.25);

        assert_eq!(angle(&m, 0.0, 300.0, Cw), 0.1);
        assert_eq!(angle(&m, 0.0, 200.0, Cw), 0.2);
        assert_eq!(angle(&m, 0.0, 60.0, Cw), 0.25);
    }

    #[test]
    fn test_counter_clockwise_swaps_marker_roles() {
        let m = mapper(ZoneTableVariant::Canonical);
        assert_eq!(angle(&m, 500.0, 200.0, Ccw), -0.1);
        assert_eq!(angle(&m, 0.0, 300.0, Ccw), -0.2);
        assert_eq!(angle(&m, 0.0, 400.0, Ccw), -0.25);
        assert_eq!(angle(&m, 300.0, 0.0, Ccw), 0.1);
        assert_eq!(angle(&m, 200.0, 0.0, Ccw), 0.2);
        assert_eq!(angle(&m, 60.0, 0.0, Ccw), 0.25);
    }

    #[test]
    fn test_boundaries_belong_to_the_band_above() {
        let m = mapper(ZoneTableVariant::Canonical);
        assert_eq!(angle(&m, 120.0, 0.0, Cw), -0.1);
        assert_eq!(angle(&m, 240.0, 0.0, Cw), -0.2);
        assert_eq!(angle(&m, 360.0, 0.0, Cw), -0.25);
        assert_eq!(angle(&m, 480.0, 0.0, Cw), 0.0);

        assert_eq!(angle(&m, 0.0, 5.0, Cw), 0.25);
        assert_eq!(angle(&m, 0.0, 120.0, Cw), 0.2);
        assert_eq!(angle(&m, 0.0, 240.0, Cw), 0.1);
        // Yellow at the right boundary with blue undefined is the straight bracket.
        assert_eq!(angle(&m, 0.0, 360.0, Cw), 0.0);
    }

    #[test]
    fn test_output_always_in_quantized_set_and_straight_when_bracketed() {
        for variant in [ZoneTableVariant::Canonical, ZoneTableVariant::Legacy] {
            let m = mapper(variant);
            let allowed: Vec<f64> = SteeringAngle::ALL.iter().map(|a| a.value()).collect();
            for b in (0..=640).step_by(8) {
                for y in (0..=640).step_by(8) {
                    for o in [Cw, Ccw] {
                        let a = angle(&m, b as f32, y as f32, o);
                        assert!(allowed.contains(&a));
                    }
                    if (b as f32) < 120.0 && (y as f32) > 360.0 {
                        assert_eq!(angle(&m, b as f32, y as f32, Cw), 0.0);
                    }
                    if (y as f32) < 120.0 && (b as f32) > 360.0 {
                        assert_eq!(angle(&m, b as f32, y as f32, Ccw), 0.0);
                    }
                }
            }
        }
    }

    #[test]
    fn test_legacy_table_keeps_or_at_straight_rule() {
        let m = mapper(ZoneTableVariant::Legacy);
        assert_eq!(angle(&m, 200.0, 500.0, Cw), 0.0);
        assert_eq!(angle(&m, 0.0, 100.0, Cw), 0.0);
        assert_eq!(angle(&m, 100.0, 400.0, Cw), 0.0);
        // Strict comparisons: exact boundaries fall through to the default.
        assert_eq!(angle(&m, 240.0, 0.0, Cw), 0.0);
        assert_eq!(angle(&m, 130.0, 200.0, Cw), -0.1);
    }

    #[test]
    fn test_legacy_counter_clockwise_gentle_left_is_unreachable() {
        let zones = ZoneConfig::default();
        assert_eq!(ZoneTable::legacy(Ccw).unreachable_rules(&zones), vec![4]);
        assert!(ZoneTable::legacy(Cw).unreachable_rules(&zones).is_empty());
        assert!(ZoneTable::canonical(Ccw).unreachable_rules(&zones).is_empty());

        // Blue right of center lands on no legacy rule at all.
        let m = mapper(ZoneTableVariant::Legacy);
        assert_eq!(angle(&m, 300.0, 500.0, Ccw), 0.0);
        let canonical = mapper(ZoneTableVariant::Canonical);
        assert_eq!(angle(&canonical, 300.0, 500.0, Ccw), 0.1);
    }
}
