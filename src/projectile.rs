use crate::components::{Layer, ProjectileKind, ShotRequest};
use crate::geometry::{rotated_rect_aabb, vector_angle};
use rapier2d::parry::bounding_volume::Aabb;
use rapier2d::prelude::{Point, Vector};

/// A shot in flight. Moves in a straight line at its kind's speed.
#[derive(Debug, Clone, PartialEq)]
pub struct Projectile {
    kind: ProjectileKind,
    layer: Layer,
    position: Point<f32>,
    rotation: f32,
    velocity: Vector<f32>,
    finished: bool,
}

impl Projectile {
    pub fn new(shot: &ShotRequest) -> Self {
        let heading = shot.target - shot.spawn;
        let length = heading.norm();

        // A shot aimed at its own muzzle has no direction to travel in.
        let (velocity, rotation, finished) = if length > 0.0 {
            (heading / length * shot.kind.speed(), vector_angle(&heading), false)
        } else {
            (Vector::zeros(), 0.0, true)
        };

        Self {
            kind: shot.kind,
            layer: shot.layer,
            position: shot.spawn,
            rotation,
            velocity,
            finished,
        }
    }

    pub fn kind(&self) -> ProjectileKind {
        self.kind
    }

    /// The layer this projectile can damage.
    pub fn layer(&self) -> Layer {
        self.layer
    }

    pub fn position(&self) -> Point<f32> {
        self.position
    }

    pub fn rotation(&self) -> f32 {
        self.rotation
    }

    pub fn velocity(&self) -> Vector<f32> {
        self.velocity
    }

    pub fn size(&self) -> [f32; 2] {
        self.kind.preset().size
    }

    pub fn update(&mut self, dt: f32) {
        self.position += self.velocity * dt;
    }

    /// Where the projectile was before the last `dt` step.
    pub fn previous_position(&self, dt: f32) -> Point<f32> {
        self.position - self.velocity * dt
    }

    pub fn world_aabb(&self) -> Aabb {
        rotated_rect_aabb(&self.position, self.size(), self.rotation)
    }

    pub fn finish(&mut self) {
        self.finished = true;
    }

    pub fn requires_cleanup(&self) -> bool {
        self.finished
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shot(kind: ProjectileKind, spawn: Point<f32>, target: Point<f32>) -> ShotRequest {
        ShotRequest {
            kind,
            layer: Layer::Away,
            spawn,
            target,
        }
    }

    #[test]
    fn laser_flies_along_x_at_full_speed() {
        let projectile = Projectile::new(&shot(
            ProjectileKind::Laser,
            Point::origin(),
            Point::new(100.0, 0.0),
        ));
        assert!((projectile.velocity() - Vector::new(1000.0, 0.0)).norm() < 1.0e-3);
        assert!(projectile.rotation().abs() < 1.0e-6);
        assert!(!projectile.requires_cleanup());
    }

    #[test]
    fn velocity_magnitude_matches_the_kind() {
        let spawn = Point::new(10.0, 20.0);
        let target = Point::new(-35.0, 400.0);
        for kind in [
            ProjectileKind::Laser,
            ProjectileKind::Missile,
            ProjectileKind::Plasma,
        ] {
            let projectile = Projectile::new(&shot(kind, spawn, target));
            let velocity = projectile.velocity();
            assert!((velocity.norm() - kind.speed()).abs() < 1.0e-2);

            let direction = (target - spawn).normalize();
            assert!((velocity.normalize() - direction).norm() < 1.0e-5);
        }
    }

    #[test]
    fn update_advances_by_velocity_and_remembers_the_previous_position() {
        let mut projectile = Projectile::new(&shot(
            ProjectileKind::Plasma,
            Point::new(100.0, 100.0),
            Point::new(100.0, 200.0),
        ));
        projectile.update(0.5);
        assert!((projectile.position() - Point::new(100.0, 400.0)).norm() < 1.0e-3);
        assert!((projectile.previous_position(0.5) - Point::new(100.0, 100.0)).norm() < 1.0e-3);
    }

    #[test]
    fn zero_length_shot_is_finished_immediately() {
        let spot = Point::new(7.0, 7.0);
        let projectile = Projectile::new(&shot(ProjectileKind::Missile, spot, spot));
        assert!(projectile.requires_cleanup());
        assert_eq!(projectile.velocity(), Vector::zeros());
    }
}
