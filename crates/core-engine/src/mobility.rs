//! Mobility engine (§4.7): drives a node's position along a queue of
//! waypoints, interpolating linearly between them on a fixed tick.

use core_model::Position;
use std::collections::VecDeque;
use std::time::Duration;

pub const DEFAULT_TICK: Duration = Duration::from_millis(50);

fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Waypoint {
    pub position: Position,
    /// Time to travel from wherever the node is now to this waypoint.
    pub duration: Duration,
}

impl Waypoint {
    pub fn new(position: Position, duration: Duration) -> Self {
        Self { position, duration }
    }
}

/// One node's mobility state: a starting position, a queue of waypoints
/// still to visit, and progress through the leg currently underway.
pub struct MobilityTrack {
    current: Position,
    leg_start: Position,
    leg: Option<Waypoint>,
    elapsed_in_leg: Duration,
    queue: VecDeque<Waypoint>,
}

impl MobilityTrack {
    pub fn new(start: Position) -> Self {
        Self {
            current: start,
            leg_start: start,
            leg: None,
            elapsed_in_leg: Duration::ZERO,
            queue: VecDeque::new(),
        }
    }

    pub fn push_waypoint(&mut self, waypoint: Waypoint) {
        self.queue.push_back(waypoint);
    }

    pub fn position(&self) -> Position {
        self.current
    }

    pub fn is_idle(&self) -> bool {
        self.leg.is_none() && self.queue.is_empty()
    }

    /// Advance the track by `dt`, returning the updated position. Legs
    /// with zero duration resolve instantly to their target.
    pub fn advance(&mut self, dt: Duration) -> Position {
        loop {
            if self.leg.is_none() {
                match self.queue.pop_front() {
                    Some(next) => {
                        self.leg_start = self.current;
                        self.leg = Some(next);
                        self.elapsed_in_leg = Duration::ZERO;
                    }
                    None => return self.current,
                }
            }

            let leg = self.leg.unwrap();
            if leg.duration.is_zero() {
                self.current = leg.position;
                self.leg = None;
                continue;
            }

            self.elapsed_in_leg += dt;
            if self.elapsed_in_leg >= leg.duration {
                self.current = leg.position;
                self.leg = None;
                continue;
            }

            let t = self.elapsed_in_leg.as_secs_f64() / leg.duration.as_secs_f64();
            self.current = Position::new(
                lerp(self.leg_start.x, leg.position.x, t),
                lerp(self.leg_start.y, leg.position.y, t),
                lerp(self.leg_start.z, leg.position.z, t),
            );
            return self.current;
        }
    }
}
