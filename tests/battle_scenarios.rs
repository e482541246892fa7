use ship_battles::components::{Layer, ProjectileKind, ShotRequest, TurretBuild};
use ship_battles::hull::{CellCoord, HullSprite};
use ship_battles::projectile::Projectile;
use ship_battles::ship::MovementState;
use ship_battles::simulation::BattleSimulation;
use rapier2d::prelude::{Point, Vector};
use std::sync::Arc;

const EPS: f32 = 1.0e-3;

// 8x8 pixel hull: a 2x2 damage mask, cell (0,0) spans hull pixels 0..4.
fn small_battle() -> BattleSimulation {
    BattleSimulation::new(Arc::new(HullSprite::solid(8, 8).unwrap()))
}

fn turret_at(x: f32, y: f32) -> TurretBuild {
    TurretBuild::new(ProjectileKind::Laser, Point::new(x, y))
}

/// A laser crossing hull row 0 of a ship centred on (500, 500). After one
/// 0.1s tick it sits on the ship's centre line.
fn laser_through_row_zero() -> ShotRequest {
    ShotRequest {
        kind: ProjectileKind::Laser,
        layer: Layer::Away,
        spawn: Point::new(400.0, 498.0),
        target: Point::new(600.0, 498.0),
    }
}

#[test]
fn laser_flies_at_its_fixed_speed_toward_the_target() {
    let projectile = Projectile::new(&ShotRequest {
        kind: ProjectileKind::Laser,
        layer: Layer::Away,
        spawn: Point::origin(),
        target: Point::new(100.0, 0.0),
    });

    assert!((projectile.velocity() - Vector::new(1000.0, 0.0)).norm() < EPS);
    assert!(projectile.rotation().abs() < EPS);
}

#[test]
fn every_kind_moves_along_the_firing_line() {
    let spawn = Point::new(10.0, -20.0);
    let target = Point::new(-50.0, 60.0);
    let direction = (target - spawn).normalize();

    for kind in [ProjectileKind::Laser, ProjectileKind::Missile, ProjectileKind::Plasma] {
        let projectile = Projectile::new(&ShotRequest {
            kind,
            layer: Layer::Home,
            spawn,
            target,
        });
        let velocity = projectile.velocity();
        assert!((velocity.norm() - kind.speed()).abs() < EPS, "{kind:?}");
        assert!((velocity.normalize() - direction).norm() < EPS, "{kind:?}");
    }
}

#[test]
fn hit_on_the_last_turret_removes_the_ship_in_the_same_tick() {
    let battle = small_battle();
    battle.create_ship(Layer::Home, Point::new(100.0, 100.0), 0.0, &[turret_at(2.0, 2.0)]);
    battle.create_ship(Layer::Away, Point::new(500.0, 500.0), 0.0, &[turret_at(2.0, 2.0)]);

    battle.spawn_projectile(&laser_through_row_zero());
    let report = battle.advance_tick(0.1);

    assert_eq!(report.hits, 1);
    assert_eq!(report.ships_destroyed, 1);
    assert_eq!(battle.ship_count(Layer::Away), 0);
    assert_eq!(battle.projectile_count(), 0);
    assert!(report.finished);
    assert!(battle.is_finished());

    // Still gone when the next tick starts.
    battle.advance_tick(0.1);
    assert_eq!(battle.ship_count(Layer::Away), 0);
    assert_eq!(battle.ship_count(Layer::Home), 1);
}

#[test]
fn destroyed_cells_never_come_back() {
    let battle = small_battle();
    // Turret in cell (1,1) keeps the ship alive while row 0 is shot away.
    battle.create_ship(Layer::Away, Point::new(500.0, 500.0), 0.0, &[turret_at(6.0, 6.0)]);

    battle.spawn_projectile(&laser_through_row_zero());
    battle.advance_tick(0.1);
    let after_first = battle
        .with_ship(Layer::Away, 0, |ship| {
            (ship.mask().is_intact(CellCoord::new(0, 0)), ship.mask().intact_count())
        })
        .unwrap();
    assert_eq!(after_first, (false, 3));

    for _ in 0..30 {
        battle.advance_tick(0.1);
    }

    // The next shot passes through the hole and stops on the cell behind it.
    battle.spawn_projectile(&laser_through_row_zero());
    battle.advance_tick(0.1);
    let cells = battle
        .with_ship(Layer::Away, 0, |ship| {
            let mask = ship.mask();
            (
                mask.is_intact(CellCoord::new(0, 0)),
                mask.is_intact(CellCoord::new(1, 0)),
                mask.intact_count(),
                ship.turrets().len(),
            )
        })
        .unwrap();
    assert_eq!(cells, (false, false, 2, 1));
}

#[test]
fn overlapping_ships_only_the_first_in_the_list_is_hit() {
    let battle = small_battle();
    battle.create_ship(Layer::Away, Point::new(500.0, 500.0), 0.0, &[turret_at(2.0, 2.0)]);
    battle.create_ship(Layer::Away, Point::new(500.0, 500.0), 0.0, &[turret_at(2.0, 2.0)]);

    battle.spawn_projectile(&laser_through_row_zero());
    let report = battle.advance_tick(0.1);

    assert_eq!(report.hits, 1);
    assert_eq!(battle.ship_count(Layer::Away), 1);
    let survivor = battle
        .with_ship(Layer::Away, 0, |ship| (ship.turrets().len(), ship.mask().intact_count()))
        .unwrap();
    assert_eq!(survivor, (1, 4));
    assert!(!battle.is_finished());
}

#[test]
fn projectiles_leaving_the_field_are_removed_that_tick() {
    let battle = small_battle();
    battle.spawn_projectile(&ShotRequest {
        kind: ProjectileKind::Laser,
        layer: Layer::Away,
        spawn: Point::new(3990.0, 10.0),
        target: Point::new(5000.0, 10.0),
    });
    battle.spawn_projectile(&ShotRequest {
        kind: ProjectileKind::Laser,
        layer: Layer::Away,
        spawn: Point::new(100.0, 100.0),
        target: Point::new(200.0, 100.0),
    });

    let report = battle.advance_tick(0.1);
    assert_eq!(report.expired, 1);
    assert_eq!(report.projectiles, 1);
    assert_eq!(battle.projectile_count(), 1);
}

#[test]
fn second_fire_command_during_reload_is_ignored() {
    let battle = small_battle();
    battle.create_ship(Layer::Home, Point::new(500.0, 500.0), 0.0, &[turret_at(4.0, 4.0)]);
    // Straight ahead of the turret, so it fires without turning.
    let target = Point::new(900.0, 500.0);

    let mut shots = battle.advance_tick(0.1).spawned;
    assert!(battle.issue_fire_command(Layer::Home, 0, target, Layer::Away));
    shots += battle.advance_tick(0.1).spawned;
    assert!(battle.issue_fire_command(Layer::Home, 0, target, Layer::Away));
    for _ in 0..10 {
        shots += battle.advance_tick(0.1).spawned;
    }

    assert_eq!(shots, 1);
}

#[test]
fn move_command_walks_through_every_movement_state_once() {
    let battle = small_battle();
    battle.create_ship(Layer::Home, Point::new(500.0, 500.0), 0.0, &[turret_at(4.0, 4.0)]);
    battle.issue_move_command(Layer::Home, 0, Point::new(700.0, 500.0));

    let state = || battle.with_ship(Layer::Home, 0, |ship| ship.state()).unwrap();
    let mut seen = vec![state()];
    for _ in 0..5000 {
        battle.advance_tick(1.0 / 60.0);
        let current = state();
        if seen.last() != Some(&current) {
            seen.push(current);
        }
        if current == MovementState::Idle {
            break;
        }
    }

    assert_eq!(
        seen,
        [
            MovementState::Rotating,
            MovementState::Moving,
            MovementState::Decelerating,
            MovementState::Idle,
        ]
    );
    let arrived = battle
        .with_ship(Layer::Home, 0, |ship| ship.pose().position)
        .unwrap();
    assert!((arrived - Point::new(700.0, 500.0)).norm() < 5.0);
}
