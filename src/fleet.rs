//! Per-layer ship storage.
//!
//! Ships live in a `hecs` world and are addressed by generational handles.
//! Each layer additionally keeps its ships in spawn order, which is the order
//! used for indexing commands and for hit priority.

use crate::components::Layer;
use crate::ship::Ship;
use hecs::{Entity, World};
use tracing::warn;

/// Every ship in the battle, split by layer.
#[derive(Default)]
pub struct Fleet {
    /// Each entity carries a `Layer` and a `Ship`.
    world: World,
    /// Spawn-ordered handles, indexed by `Layer::index`.
    order: [Vec<Entity>; 2],
}

impl Fleet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a ship to the end of `layer`. Returns its handle and index.
    pub fn spawn(&mut self, layer: Layer, ship: Ship) -> (Entity, usize) {
        let entity = self.world.spawn((layer, ship));
        let list = &mut self.order[layer.index()];
        list.push(entity);
        (entity, list.len() - 1)
    }

    /// Number of ships still on `layer`.
    pub fn len(&self, layer: Layer) -> usize {
        self.order[layer.index()].len()
    }

    pub fn is_empty(&self, layer: Layer) -> bool {
        self.order[layer.index()].is_empty()
    }

    /// Ships across both layers.
    pub fn total(&self) -> usize {
        self.order.iter().map(Vec::len).sum()
    }

    /// Handle of the ship at `index` on `layer`, if there is one.
    pub fn entity(&self, layer: Layer, index: usize) -> Option<Entity> {
        self.order[layer.index()].get(index).copied()
    }

    /// Handles of `layer` in list order.
    pub fn handles(&self, layer: Layer) -> &[Entity] {
        &self.order[layer.index()]
    }

    pub fn layer_of(&self, entity: Entity) -> Option<Layer> {
        self.world.get::<&Layer>(entity).ok().map(|layer| *layer)
    }

    /// Borrows a ship. `None` once it has been removed.
    pub fn ship(&self, entity: Entity) -> Option<hecs::Ref<'_, Ship>> {
        self.world.get::<&Ship>(entity).ok()
    }

    pub fn ship_mut(&mut self, entity: Entity) -> Option<&mut Ship> {
        self.world.query_one_mut::<&mut Ship>(entity).ok()
    }

    /// Mutable access by layer and list index, the way commands address ships.
    pub fn ship_at_mut(&mut self, layer: Layer, index: usize) -> Option<&mut Ship> {
        let entity = self.entity(layer, index)?;
        self.ship_mut(entity)
    }

    /// Removes a ship. Later ships in the same layer shift down one index.
    pub fn remove(&mut self, entity: Entity) -> Option<Ship> {
        let layer = self.layer_of(entity)?;
        self.order[layer.index()].retain(|handle| *handle != entity);
        match self.world.remove_one::<Ship>(entity) {
            Ok(ship) => {
                if let Err(e) = self.world.despawn(entity) {
                    warn!(?entity, error = ?e, "ship entity vanished during removal");
                }
                Some(ship)
            }
            Err(_) => None,
        }
    }

    /// Advances every ship on both layers.
    pub fn update_all(&mut self, dt: f32) {
        for (_, ship) in self.world.query_mut::<&mut Ship>() {
            ship.update(dt);
        }
    }

    /// Visits every ship of `layer` in list order.
    pub fn for_each_in_layer(&self, layer: Layer, mut f: impl FnMut(usize, &Ship)) {
        for (index, entity) in self.handles(layer).iter().enumerate() {
            if let Some(ship) = self.ship(*entity) {
                f(index, &*ship);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::FireQueue;
    use crate::hull::HullSprite;
    use rapier2d::prelude::Point;

    fn ship_at(x: f32) -> Ship {
        let hull = HullSprite::solid(16, 16).unwrap();
        Ship::new(Point::new(x, 0.0), 0.0, &[], &hull, FireQueue::new())
    }

    #[test]
    fn layers_keep_spawn_order() {
        let mut fleet = Fleet::new();
        let (_, first) = fleet.spawn(Layer::Home, ship_at(1.0));
        let (_, away) = fleet.spawn(Layer::Away, ship_at(2.0));
        let (_, second) = fleet.spawn(Layer::Home, ship_at(3.0));

        assert_eq!((first, away, second), (0, 0, 1));
        assert_eq!(fleet.len(Layer::Home), 2);
        assert_eq!(fleet.total(), 3);

        let x = fleet.ship_at_mut(Layer::Home, 1).map(|ship| ship.pose().position.x);
        assert_eq!(x, Some(3.0));
    }

    #[test]
    fn removal_shifts_indices_but_keeps_other_handles_valid() {
        let mut fleet = Fleet::new();
        let (a, _) = fleet.spawn(Layer::Away, ship_at(1.0));
        let (b, _) = fleet.spawn(Layer::Away, ship_at(2.0));

        assert!(fleet.remove(a).is_some());
        assert!(fleet.remove(a).is_none());
        assert_eq!(fleet.entity(Layer::Away, 0), Some(b));
        assert_eq!(fleet.ship(b).map(|ship| ship.pose().position.x), Some(2.0));
        assert_eq!(fleet.layer_of(b), Some(Layer::Away));
    }

    #[test]
    fn missing_indices_return_none() {
        let mut fleet = Fleet::new();
        assert!(fleet.ship_at_mut(Layer::Home, 0).is_none());
        assert!(fleet.is_empty(Layer::Home));
    }
}
