//! Projectile against hull hit testing.
//!
//! A cheap bounding-box overlap gates the per-cell ray walk. On a hit the
//! struck cell is destroyed and the ship sheds any turret standing on it.

use crate::components::Layer;
use crate::fleet::Fleet;
use crate::hull::CellCoord;
use crate::projectile::Projectile;
use crate::ship::Ship;
use hecs::Entity;
use rapier2d::parry::bounding_volume::BoundingVolume;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub layer: Layer,
    pub ship: Entity,
    pub cell: CellCoord,
    pub turrets_lost: usize,
    /// The ship has no turrets left and must be removed.
    pub disabled: bool,
}

pub fn broad_phase(ship: &Ship, projectile: &Projectile) -> bool {
    ship.world_aabb().intersects(&projectile.world_aabb())
}

/// First intact cell crossed by the projectile during its last `dt` step.
pub fn narrow_phase(ship: &Ship, projectile: &Projectile, dt: f32) -> Option<CellCoord> {
    ship.first_cell_hit(&projectile.previous_position(dt), &projectile.position())
}

/// Tests `projectile` against its target layer and damages the first ship hit.
///
/// Ships are tried in list order, so where hulls overlap the earlier ship
/// takes the hit. At most one ship is damaged.
pub fn resolve(fleet: &mut Fleet, projectile: &Projectile, dt: f32) -> Option<Hit> {
    let layer = projectile.layer();
    for index in 0..fleet.len(layer) {
        let entity = fleet.entity(layer, index)?;
        let Some(ship) = fleet.ship_mut(entity) else {
            continue;
        };
        if !broad_phase(ship, projectile) {
            continue;
        }
        let Some(cell) = narrow_phase(ship, projectile, dt) else {
            continue;
        };

        let turrets_lost = ship.apply_damage(cell);
        let hit = Hit {
            layer,
            ship: entity,
            cell,
            turrets_lost,
            disabled: ship.requires_cleanup(),
        };
        debug!(?layer, ship = index, x = cell.x, y = cell.y, turrets_lost, "projectile hit");
        return Some(hit);
    }
    None
}
