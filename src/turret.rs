use crate::components::{FireQueue, Layer, ProjectileKind, ShotRequest, TurretBuild};
use crate::geometry::{HullFrame, face_target};
use rapier2d::prelude::Point;
use tracing::debug;

/// What a turret is doing between fire orders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TargetingState {
    /// Waiting for an order.
    Idle,
    /// Turning toward `target`. It fires once facing it, then returns to idle.
    Tracking { target: Point<f32>, layer: Layer },
}

/// A gun mounted on a ship's hull.
///
/// The turret only knows its own offset in hull pixels. World positions are
/// derived from the [`HullFrame`] the owning ship passes into every call.
#[derive(Debug, Clone)]
pub struct Turret {
    kind: ProjectileKind,
    /// Anchor in hull pixels, measured from the hull's top-left corner.
    local_position: Point<f32>,
    /// Radians, relative to the hull heading.
    local_rotation: f32,
    /// Seconds since the last shot.
    elapsed: f32,
    state: TargetingState,
    fire_queue: FireQueue,
}

impl Turret {
    pub fn new(build: &TurretBuild, fire_queue: FireQueue) -> Self {
        let reload = build.kind.preset().reload_seconds;
        Self {
            kind: build.kind,
            local_position: build.local_point(),
            local_rotation: 0.0,
            // Ready once its first update has run.
            elapsed: reload,
            state: TargetingState::Idle,
            fire_queue,
        }
    }

    pub fn kind(&self) -> ProjectileKind {
        self.kind
    }

    /// The kind and anchor this turret was built from.
    pub fn build_info(&self) -> TurretBuild {
        TurretBuild::new(self.kind, self.local_position)
    }

    pub fn local_position(&self) -> Point<f32> {
        self.local_position
    }

    /// Rotation relative to the owning hull.
    pub fn local_rotation(&self) -> f32 {
        self.local_rotation
    }

    pub fn state(&self) -> TargetingState {
        self.state
    }

    pub fn is_tracking(&self) -> bool {
        matches!(self.state, TargetingState::Tracking { .. })
    }

    /// Minimum time between shots, fixed by the projectile kind.
    pub fn reload_seconds(&self) -> f32 {
        self.kind.preset().reload_seconds
    }

    /// True once more than a full reload has passed since the last shot.
    pub fn is_reloaded(&self) -> bool {
        self.elapsed > self.reload_seconds()
    }

    /// Anchor in world space for the owning ship's current frame.
    pub fn world_position(&self, frame: &HullFrame) -> Point<f32> {
        frame.to_world(&self.local_position)
    }

    pub fn world_rotation(&self, frame: &HullFrame) -> f32 {
        frame.rotation() + self.local_rotation
    }

    /// Starts tracking `target` if the reload has elapsed.
    ///
    /// Returns whether the command was accepted. The cooldown only restarts
    /// once the shot is actually fired.
    pub fn fire_command(&mut self, target: Point<f32>, layer: Layer) -> bool {
        if !self.is_reloaded() {
            return false;
        }
        self.state = TargetingState::Tracking { target, layer };
        true
    }

    /// Advances the reload clock and, while tracking, turns and maybe fires.
    pub fn update(&mut self, dt: f32, frame: &HullFrame) {
        self.elapsed += dt;

        let TargetingState::Tracking { target, layer } = self.state else {
            return;
        };

        let local_target = frame.to_hull(&target);
        if face_target(&mut self.local_rotation, &self.local_position, &local_target, dt) {
            let spawn = self.world_position(frame);
            self.fire_queue.push(ShotRequest {
                kind: self.kind,
                layer,
                spawn,
                target,
            });
            debug!(kind = ?self.kind, ?layer, x = spawn.x, y = spawn.y, "turret fired");
            self.elapsed = 0.0;
            self.state = TargetingState::Idle;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::Pose;

    fn frame_at_origin() -> HullFrame {
        // 64x64 hull centred on the world origin, unrotated.
        HullFrame::new(&Pose::default(), [64.0, 64.0])
    }

    fn laser_at_centre(queue: &FireQueue) -> Turret {
        let build = TurretBuild::new(ProjectileKind::Laser, Point::new(32.0, 32.0));
        Turret::new(&build, queue.clone())
    }

    #[test]
    fn new_turret_is_ready_after_its_first_update() {
        let queue = FireQueue::new();
        let mut turret = laser_at_centre(&queue);
        assert!(!turret.fire_command(Point::new(100.0, 0.0), Layer::Away));
        assert!(!turret.is_tracking());

        turret.update(1.0 / 60.0, &frame_at_origin());
        assert!(turret.fire_command(Point::new(100.0, 0.0), Layer::Away));
        assert!(turret.is_tracking());
    }

    #[test]
    fn command_needs_elapsed_to_exceed_the_reload() {
        let queue = FireQueue::new();
        let mut turret = laser_at_centre(&queue);
        let frame = frame_at_origin();
        let target = Point::new(100.0, 0.0);

        turret.update(0.25, &frame);
        assert!(turret.fire_command(target, Layer::Away));
        turret.update(0.25, &frame);
        assert_eq!(queue.len(), 1);

        // Exactly one reload (0.5s) after the shot.
        turret.update(0.25, &frame);
        turret.update(0.25, &frame);
        assert!(!turret.is_reloaded());
        assert!(!turret.fire_command(target, Layer::Away));

        turret.update(1.0 / 60.0, &frame);
        assert!(turret.fire_command(target, Layer::Away));
    }

    #[test]
    fn facing_turret_fires_on_next_update() {
        let queue = FireQueue::new();
        let mut turret = laser_at_centre(&queue);
        let frame = frame_at_origin();
        turret.update(1.0 / 60.0, &frame);

        turret.fire_command(Point::new(100.0, 0.0), Layer::Away);
        turret.update(1.0 / 60.0, &frame);

        let shots = queue.drain();
        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0].layer, Layer::Away);
        assert_eq!(shots[0].kind, ProjectileKind::Laser);
        assert!((shots[0].spawn - Point::origin()).norm() < 1.0e-4);
        assert_eq!(shots[0].target, Point::new(100.0, 0.0));
        assert_eq!(turret.state(), TargetingState::Idle);
    }

    #[test]
    fn reload_gates_a_second_command() {
        let queue = FireQueue::new();
        let mut turret = laser_at_centre(&queue);
        let frame = frame_at_origin();
        let target = Point::new(100.0, 0.0);
        turret.update(1.0 / 60.0, &frame);

        assert!(turret.fire_command(target, Layer::Away));
        turret.update(0.1, &frame);
        assert!(!turret.fire_command(target, Layer::Away));

        for _ in 0..60 {
            turret.update(1.0 / 60.0, &frame);
        }
        assert_eq!(queue.len(), 1);
        // A full reload later the turret accepts orders again.
        assert!(turret.fire_command(target, Layer::Away));
    }

    #[test]
    fn tracking_turret_can_be_retargeted() {
        let queue = FireQueue::new();
        let mut turret = laser_at_centre(&queue);
        let frame = frame_at_origin();
        turret.update(1.0 / 60.0, &frame);

        // Behind the turret: two seconds of turning at 45°/s.
        turret.fire_command(Point::new(-100.0, 0.0), Layer::Home);
        turret.update(0.1, &frame);
        turret.update(0.1, &frame);
        assert!(queue.is_empty());

        assert!(turret.is_reloaded());
        assert!(turret.fire_command(Point::new(0.0, 100.0), Layer::Home));
        assert_eq!(
            turret.state(),
            TargetingState::Tracking {
                target: Point::new(0.0, 100.0),
                layer: Layer::Home
            }
        );
    }

    #[test]
    fn turret_turns_in_the_hull_frame() {
        let queue = FireQueue::new();
        let build = TurretBuild::new(ProjectileKind::Plasma, Point::new(32.0, 32.0));
        let mut turret = Turret::new(&build, queue.clone());

        // Ship already faces +y; a target along +y needs no local turning.
        let pose = Pose::new(Point::origin(), std::f32::consts::FRAC_PI_2);
        let frame = HullFrame::new(&pose, [64.0, 64.0]);
        turret.update(1.0 / 60.0, &frame);

        turret.fire_command(Point::new(0.0, 500.0), Layer::Away);
        turret.update(1.0 / 60.0, &frame);

        assert_eq!(queue.len(), 1);
        assert!(turret.local_rotation().abs() < 1.0e-4);
    }

    #[test]
    fn build_info_reports_kind_and_offset() {
        let build = TurretBuild::new(ProjectileKind::Missile, Point::new(8.0, 24.0));
        let turret = Turret::new(&build, FireQueue::new());
        assert_eq!(turret.build_info(), build);
    }
}
