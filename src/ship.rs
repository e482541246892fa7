//! Capital ships: movement, turrets and hull damage.

use crate::components::{FireQueue, Layer, Pose, TurretBuild};
use crate::geometry::{HullFrame, face_target, rotated_rect_aabb};
use crate::hull::{CellCoord, DamageMask, HullSprite};
use crate::tuning::{ARRIVAL_EPSILON, KEY_SIZE_FACTOR, SHIP_ACCELERATION, SHIP_DECELERATION};
use crate::turret::Turret;
use rapier2d::parry::bounding_volume::Aabb;
use rapier2d::prelude::Point;
use serde::{Deserialize, Serialize};

/// Where a ship is in its move order. A ship never turns and translates in
/// the same state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementState {
    /// No order, or the last one has completed.
    Idle,
    /// Turning on the spot toward the destination.
    Rotating,
    /// Accelerating along the heading.
    Moving,
    /// Braking so that speed reaches zero at the destination.
    Decelerating,
}

/// A capital ship: one hull, its damage mask and the turrets mounted on it.
#[derive(Debug, Clone)]
pub struct Ship {
    /// Hull centre in world space and heading in radians.
    pose: Pose,
    state: MovementState,
    /// Current speed along the heading, world units per second.
    speed: f32,
    destination: Point<f32>,
    /// Hull size in pixels, width then height.
    hull_size: [f32; 2],
    /// Destructible copy of the hull. Cells only ever go from intact to cleared.
    mask: DamageMask,
    /// Turrets in build order.
    turrets: Vec<Turret>,
    /// Shared with every turret; the battle drains it each tick.
    fire_queue: FireQueue,
}

impl Ship {
    /// Builds a ship at `position` facing `angle` (radians), with one turret
    /// per entry of `builds`. Every turret shares the given fire queue.
    pub fn new(
        position: Point<f32>,
        angle: f32,
        builds: &[TurretBuild],
        hull: &HullSprite,
        fire_queue: FireQueue,
    ) -> Self {
        let mut ship = Self {
            pose: Pose::new(position, angle),
            state: MovementState::Idle,
            speed: 0.0,
            destination: position,
            hull_size: hull.size(),
            mask: DamageMask::from_hull(hull, KEY_SIZE_FACTOR),
            turrets: Vec::with_capacity(builds.len()),
            fire_queue,
        };
        ship.add_turrets(builds);
        ship
    }

    pub fn add_turrets(&mut self, builds: &[TurretBuild]) {
        self.turrets.extend(
            builds
                .iter()
                .map(|build| Turret::new(build, self.fire_queue.clone())),
        );
    }

    /// Position and heading of the hull centre.
    pub fn pose(&self) -> Pose {
        self.pose
    }

    pub fn state(&self) -> MovementState {
        self.state
    }

    /// World units per second along the current heading.
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Target of the last move order, or the spawn point if none was given.
    pub fn destination(&self) -> Point<f32> {
        self.destination
    }

    pub fn hull_size(&self) -> [f32; 2] {
        self.hull_size
    }

    pub fn turrets(&self) -> &[Turret] {
        &self.turrets
    }

    pub fn mask(&self) -> &DamageMask {
        &self.mask
    }

    /// Transform between hull pixels and world space at the current pose.
    pub fn frame(&self) -> HullFrame {
        HullFrame::new(&self.pose, self.hull_size)
    }

    /// A ship with no turrets left is out of the fight.
    pub fn requires_cleanup(&self) -> bool {
        self.turrets.is_empty()
    }

    /// Heads for `destination`, turning on the spot first.
    pub fn move_command(&mut self, destination: Point<f32>) {
        // Ships cannot turn while moving, so any momentum is lost.
        self.speed = 0.0;
        self.destination = destination;
        self.state = MovementState::Rotating;
    }

    /// Orders every turret to fire at `target`. Returns how many accepted.
    pub fn fire_command(&mut self, target: Point<f32>, layer: Layer) -> usize {
        self.turrets
            .iter_mut()
            .map(|turret| turret.fire_command(target, layer))
            .filter(|accepted| *accepted)
            .count()
    }

    /// Advances movement by `dt` seconds, then every turret.
    pub fn update(&mut self, dt: f32) {
        let to_destination = self.destination - self.pose.position;
        let distance = to_destination.norm();

        match self.state {
            MovementState::Idle => {}
            MovementState::Rotating => {
                let position = self.pose.position;
                if face_target(&mut self.pose.rotation, &position, &self.destination, dt) {
                    self.state = MovementState::Moving;
                }
            }
            MovementState::Moving => {
                self.speed += SHIP_ACCELERATION * dt;
                if distance >= ARRIVAL_EPSILON {
                    self.pose.position += to_destination / distance * self.speed * dt;
                }
                let stopping_distance = self.speed * self.speed / (2.0 * SHIP_DECELERATION);
                if distance <= stopping_distance {
                    self.state = MovementState::Decelerating;
                }
            }
            MovementState::Decelerating => {
                self.speed -= SHIP_DECELERATION * dt;
                if self.speed <= 0.0 || distance < ARRIVAL_EPSILON {
                    self.speed = 0.0;
                    self.state = MovementState::Idle;
                } else {
                    self.pose.position += to_destination / distance * self.speed * dt;
                }
            }
        }

        let frame = self.frame();
        for turret in &mut self.turrets {
            turret.update(dt, &frame);
        }
    }

    /// World bounds of the rotated hull rectangle, for the broad phase.
    pub fn world_aabb(&self) -> Aabb {
        rotated_rect_aabb(&self.pose.position, self.hull_size, self.pose.rotation)
    }

    /// Whether a world point lies on an intact part of the hull.
    pub fn collides_with_point(&self, world: &Point<f32>) -> bool {
        intact_at(&self.mask, self.hull_size, &self.frame().to_hull(world))
    }

    /// First intact mask cell crossed by the world-space segment `from -> to`.
    pub fn first_cell_hit(&self, from: &Point<f32>, to: &Point<f32>) -> Option<CellCoord> {
        let frame = self.frame();
        self.mask
            .first_intact_on_segment(&frame.to_hull(from), &frame.to_hull(to))
    }

    /// Destroys `cell` and any turret whose anchor sat on destroyed hull.
    ///
    /// Returns the number of turrets lost.
    pub fn apply_damage(&mut self, cell: CellCoord) -> usize {
        self.mask.clear(cell);

        // Anchors are already in hull pixels, so skip the world round trip.
        let (mask, hull_size) = (&self.mask, self.hull_size);
        let before = self.turrets.len();
        self.turrets
            .retain(|turret| intact_at(mask, hull_size, &turret.local_position()));
        before - self.turrets.len()
    }
}

/// Point collision in hull pixel space: inside the hull rectangle and on an
/// intact mask cell.
fn intact_at(mask: &DamageMask, [width, height]: [f32; 2], pixel: &Point<f32>) -> bool {
    pixel.x >= 0.0
        && pixel.y >= 0.0
        && pixel.x < width
        && pixel.y < height
        && mask.is_intact(mask.cell_at(pixel))
}
