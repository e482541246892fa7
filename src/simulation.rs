//! Battle simulation and tick orchestration
//!
//! [`BattleSimulation`] is a cheap cloneable handle shared by the tick loop,
//! the render thread and the network receive task. Ships, projectiles and
//! pending shots each sit behind their own mutex. Whenever more than one is
//! held they are taken in the order projectiles, ships, fire queue.

use crate::collision;
use crate::components::{FireQueue, Layer, ProjectileKind, ShotRequest, TurretBuild};
use crate::fleet::Fleet;
use crate::hull::HullSprite;
use crate::projectile::Projectile;
use crate::ship::{MovementState, Ship};
use crate::tuning::{FIELD_HEIGHT, FIELD_WIDTH};
use rapier2d::parry::bounding_volume::{Aabb, BoundingVolume};
use rapier2d::prelude::Point;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, trace, warn};

struct BattleShared {
    fleet: Mutex<Fleet>,
    projectiles: Mutex<Vec<Projectile>>,
    fire_queue: FireQueue,
    hull: Arc<HullSprite>,
    bounds: Aabb,
    finished: AtomicBool,
    tick: AtomicU64,
}

#[derive(Clone)]
pub struct BattleSimulation {
    shared: Arc<BattleShared>,
}

impl BattleSimulation {
    /// Creates an empty battle whose ships all use `hull`.
    pub fn new(hull: Arc<HullSprite>) -> Self {
        Self {
            shared: Arc::new(BattleShared {
                fleet: Mutex::new(Fleet::new()),
                projectiles: Mutex::new(Vec::new()),
                fire_queue: FireQueue::new(),
                hull,
                bounds: Aabb::new(Point::origin(), Point::new(FIELD_WIDTH, FIELD_HEIGHT)),
                finished: AtomicBool::new(false),
                tick: AtomicU64::new(0),
            }),
        }
    }

    /// Handle to the queue turrets push their shots onto.
    pub fn fire_queue(&self) -> FireQueue {
        self.shared.fire_queue.clone()
    }

    /// Adds a ship to the end of `layer` and returns its index there.
    pub fn create_ship(
        &self,
        layer: Layer,
        position: Point<f32>,
        angle: f32,
        builds: &[TurretBuild],
    ) -> usize {
        let ship = Ship::new(
            position,
            angle,
            builds,
            &self.shared.hull,
            self.shared.fire_queue.clone(),
        );
        let (_, index) = self.lock_fleet().spawn(layer, ship);
        info!(
            ?layer,
            ship = index,
            x = position.x,
            y = position.y,
            turrets = builds.len(),
            "ship spawned"
        );
        index
    }

    /// Builds extra turrets on an existing ship.
    pub fn add_turrets(&self, layer: Layer, index: usize, builds: &[TurretBuild]) -> bool {
        self.with_ship_mut(layer, index, |ship| ship.add_turrets(builds))
            .is_some()
    }

    /// Returns false if no ship exists at `layer`/`index`.
    pub fn issue_move_command(&self, layer: Layer, index: usize, destination: Point<f32>) -> bool {
        let found = self
            .with_ship_mut(layer, index, |ship| ship.move_command(destination))
            .is_some();
        if found {
            debug!(?layer, ship = index, x = destination.x, y = destination.y, "move command");
        } else {
            warn!(?layer, ship = index, "move command for unknown ship");
        }
        found
    }

    /// Orders every turret of a ship to fire on `target_layer` at `target`.
    ///
    /// Returns false if no ship exists at `layer`/`index`. Turrets still
    /// reloading ignore the order.
    pub fn issue_fire_command(
        &self,
        layer: Layer,
        index: usize,
        target: Point<f32>,
        target_layer: Layer,
    ) -> bool {
        match self.with_ship_mut(layer, index, |ship| ship.fire_command(target, target_layer)) {
            Some(accepted) => {
                debug!(?layer, ship = index, accepted, "fire command");
                true
            }
            None => {
                warn!(?layer, ship = index, "fire command for unknown ship");
                false
            }
        }
    }

    pub fn spawn_projectile(&self, shot: &ShotRequest) {
        self.lock_projectiles().push(Projectile::new(shot));
    }

    /// Runs one fixed step of the battle.
    pub fn advance_tick(&self, dt: f32) -> TickReport {
        let tick = self.shared.tick.fetch_add(1, Ordering::Relaxed) + 1;
        let mut report = TickReport {
            tick,
            ..TickReport::default()
        };

        let shots = self.shared.fire_queue.drain();
        report.spawned = shots.len();

        let mut projectiles = self.lock_projectiles();
        projectiles.extend(shots.iter().map(Projectile::new));
        for projectile in projectiles.iter_mut() {
            projectile.update(dt);
        }

        {
            let mut fleet = self.lock_fleet();
            let bounds = self.shared.bounds;
            projectiles.retain_mut(|projectile| {
                if projectile.requires_cleanup() {
                    report.expired += 1;
                    return false;
                }
                if let Some(hit) = collision::resolve(&mut fleet, projectile, dt) {
                    report.hits += 1;
                    if hit.disabled && fleet.remove(hit.ship).is_some() {
                        report.ships_destroyed += 1;
                        info!(layer = ?hit.layer, remaining = fleet.len(hit.layer), "ship destroyed");
                        if fleet.is_empty(hit.layer) {
                            self.shared.finished.store(true, Ordering::Release);
                            info!(defeated = ?hit.layer, tick, "battle finished");
                        }
                    }
                    projectile.finish();
                } else if !projectile.world_aabb().intersects(&bounds) {
                    report.expired += 1;
                    projectile.finish();
                }
                !projectile.requires_cleanup()
            });
        }
        report.projectiles = projectiles.len();
        drop(projectiles);

        self.lock_fleet().update_all(dt);

        report.finished = self.is_finished();
        trace!(
            tick,
            spawned = report.spawned,
            hits = report.hits,
            projectiles = report.projectiles,
            "tick"
        );
        report
    }

    pub fn is_finished(&self) -> bool {
        self.shared.finished.load(Ordering::Acquire)
    }

    pub fn tick(&self) -> u64 {
        self.shared.tick.load(Ordering::Relaxed)
    }

    pub fn ship_count(&self, layer: Layer) -> usize {
        self.lock_fleet().len(layer)
    }

    pub fn projectile_count(&self) -> usize {
        self.lock_projectiles().len()
    }

    /// Runs `f` on the ship at `layer`/`index`, if it exists.
    pub fn with_ship<R>(&self, layer: Layer, index: usize, f: impl FnOnce(&Ship) -> R) -> Option<R> {
        let fleet = self.lock_fleet();
        let entity = fleet.entity(layer, index)?;
        let ship = fleet.ship(entity)?;
        Some(f(&*ship))
    }

    fn with_ship_mut<R>(
        &self,
        layer: Layer,
        index: usize,
        f: impl FnOnce(&mut Ship) -> R,
    ) -> Option<R> {
        self.lock_fleet().ship_at_mut(layer, index).map(f)
    }

    /// Copies everything a renderer needs out of the battle.
    pub fn snapshot(&self) -> BattleSnapshot {
        let projectiles = self.lock_projectiles();
        let fleet = self.lock_fleet();

        let mut ships = Vec::with_capacity(fleet.total());
        for layer in Layer::ALL {
            fleet.for_each_in_layer(layer, |index, ship| {
                ships.push(ShipView::new(layer, index, ship));
            });
        }

        BattleSnapshot {
            tick: self.tick(),
            finished: self.is_finished(),
            ships,
            projectiles: projectiles.iter().map(ProjectileView::from).collect(),
        }
    }

    fn lock_fleet(&self) -> MutexGuard<'_, Fleet> {
        self.shared
            .fleet
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_projectiles(&self) -> MutexGuard<'_, Vec<Projectile>> {
        self.shared
            .projectiles
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Summary of one [`BattleSimulation::advance_tick`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    /// Projectiles created from queued shots.
    pub spawned: usize,
    pub hits: usize,
    pub ships_destroyed: usize,
    /// Projectiles dropped for leaving the field or being finished.
    pub expired: usize,
    /// Projectiles still in flight after the tick.
    pub projectiles: usize,
    pub finished: bool,
}

/// Render-side copy of the battle state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BattleSnapshot {
    pub tick: u64,
    pub finished: bool,
    pub ships: Vec<ShipView>,
    pub projectiles: Vec<ProjectileView>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShipView {
    pub layer: Layer,
    pub index: usize,
    pub position: [f32; 2],
    pub rotation: f32,
    pub state: MovementState,
    pub speed: f32,
    pub hull_size: [f32; 2],
    pub mask_size: [u32; 2],
    pub intact_cells: usize,
    pub turrets: Vec<TurretView>,
}

impl ShipView {
    fn new(layer: Layer, index: usize, ship: &Ship) -> Self {
        let pose = ship.pose();
        let frame = ship.frame();
        Self {
            layer,
            index,
            position: pose.to_array(),
            rotation: pose.rotation,
            state: ship.state(),
            speed: ship.speed(),
            hull_size: ship.hull_size(),
            mask_size: [ship.mask().width(), ship.mask().height()],
            intact_cells: ship.mask().intact_count(),
            turrets: ship
                .turrets()
                .iter()
                .map(|turret| {
                    let position = turret.world_position(&frame);
                    TurretView {
                        kind: turret.kind(),
                        position: [position.x, position.y],
                        rotation: turret.world_rotation(&frame),
                        tracking: turret.is_tracking(),
                    }
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurretView {
    pub kind: ProjectileKind,
    pub position: [f32; 2],
    pub rotation: f32,
    pub tracking: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectileView {
    pub kind: ProjectileKind,
    pub layer: Layer,
    pub position: [f32; 2],
    pub rotation: f32,
    pub size: [f32; 2],
    pub colour: [u8; 4],
}

impl From<&Projectile> for ProjectileView {
    fn from(projectile: &Projectile) -> Self {
        let position = projectile.position();
        let preset = projectile.kind().preset();
        Self {
            kind: projectile.kind(),
            layer: projectile.layer(),
            position: [position.x, position.y],
            rotation: projectile.rotation(),
            size: preset.size,
            colour: preset.colour,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    fn battle() -> BattleSimulation {
        BattleSimulation::new(Arc::new(HullSprite::solid(64, 32).unwrap()))
    }

    fn laser_shot(spawn: Point<f32>, target: Point<f32>) -> ShotRequest {
        ShotRequest {
            kind: ProjectileKind::Laser,
            layer: Layer::Away,
            spawn,
            target,
        }
    }

    #[test]
    fn queued_shots_become_projectiles_on_the_next_tick() {
        let battle = battle();
        battle
            .fire_queue()
            .push(laser_shot(Point::new(100.0, 100.0), Point::new(200.0, 100.0)));

        let report = battle.advance_tick(DT);
        assert_eq!(report.spawned, 1);
        assert_eq!(report.projectiles, 1);
        assert!(battle.fire_queue().is_empty());
    }

    #[test]
    fn projectiles_leaving_the_field_are_removed_that_tick() {
        let battle = battle();
        battle.spawn_projectile(&laser_shot(Point::new(3990.0, 100.0), Point::new(5000.0, 100.0)));
        battle.spawn_projectile(&laser_shot(Point::new(100.0, 100.0), Point::new(200.0, 100.0)));

        let report = battle.advance_tick(DT);
        assert_eq!(report.expired, 1);
        assert_eq!(battle.projectile_count(), 1);
    }

    #[test]
    fn zero_length_shots_never_fly() {
        let battle = battle();
        let spot = Point::new(500.0, 500.0);
        battle.spawn_projectile(&laser_shot(spot, spot));
        assert_eq!(battle.advance_tick(DT).expired, 1);
        assert_eq!(battle.projectile_count(), 0);
    }

    #[test]
    fn commands_to_missing_ships_are_rejected() {
        let battle = battle();
        assert!(!battle.issue_move_command(Layer::Home, 0, Point::origin()));
        assert!(!battle.issue_fire_command(Layer::Away, 3, Point::origin(), Layer::Home));
        assert!(!battle.add_turrets(Layer::Home, 0, &[]));
    }

    #[test]
    fn snapshot_lists_ships_by_layer_and_index() {
        let battle = battle();
        let turret = TurretBuild::new(ProjectileKind::Plasma, Point::new(32.0, 16.0));
        battle.create_ship(Layer::Away, Point::new(300.0, 300.0), 0.0, &[turret]);
        battle.create_ship(Layer::Home, Point::new(100.0, 100.0), 0.0, &[turret]);

        let snapshot = battle.snapshot();
        assert_eq!(snapshot.ships.len(), 2);
        assert_eq!(snapshot.ships[0].layer, Layer::Home);
        assert_eq!(snapshot.ships[0].position, [100.0, 100.0]);
        assert_eq!(snapshot.ships[1].turrets[0].position, [300.0, 300.0]);
        assert_eq!(snapshot.ships[1].mask_size, [16, 8]);
        assert!(!snapshot.finished);
    }
}
