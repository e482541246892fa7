//! Shared battle data types.
//!
//! Poses, layers, projectile presets, turret build info and the fire queue
//! that turrets push their shots onto.

use rapier2d::prelude::{Isometry, Point};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Position and orientation in 2D space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Point<f32>,
    pub rotation: f32, // radians
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Point::origin(),
            rotation: 0.0,
        }
    }
}

impl Pose {
    pub fn new(position: Point<f32>, rotation: f32) -> Self {
        Self { position, rotation }
    }

    pub fn isometry(&self) -> Isometry<f32> {
        Isometry::new(self.position.coords, self.rotation)
    }

    pub fn to_array(&self) -> [f32; 2] {
        [self.position.x, self.position.y]
    }
}

/// The team a ship belongs to, and the team a shot is allowed to damage.
///
/// In a networked battle `Home` is always the local player and `Away` the peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Layer {
    Home,
    Away,
}

impl Layer {
    pub const ALL: [Layer; 2] = [Layer::Home, Layer::Away];

    pub fn index(self) -> usize {
        match self {
            Layer::Home => 0,
            Layer::Away => 1,
        }
    }

    /// The layer a ship on this layer shoots at.
    pub fn opposing(self) -> Self {
        match self {
            Layer::Home => Layer::Away,
            Layer::Away => Layer::Home,
        }
    }
}

/// Projectile families a turret can be built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProjectileKind {
    Laser,
    Missile,
    Plasma,
}

/// Fixed per-kind projectile and turret data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectilePreset {
    pub size: [f32; 2],
    pub colour: [u8; 4],
    pub speed: f32,
    pub reload_seconds: f32,
}

impl ProjectileKind {
    pub fn preset(self) -> ProjectilePreset {
        match self {
            ProjectileKind::Laser => ProjectilePreset {
                size: [8.0, 4.0],
                colour: [255, 0, 0, 255],
                speed: 1000.0,
                reload_seconds: 0.5,
            },
            ProjectileKind::Missile => ProjectilePreset {
                size: [24.0, 8.0],
                colour: [0, 255, 255, 255],
                speed: 750.0,
                reload_seconds: 1.0,
            },
            ProjectileKind::Plasma => ProjectilePreset {
                size: [10.0, 10.0],
                colour: [0, 255, 0, 255],
                speed: 600.0,
                reload_seconds: 3.0,
            },
        }
    }

    pub fn speed(self) -> f32 {
        self.preset().speed
    }

    /// Wire tag for this kind.
    pub fn as_u8(self) -> u8 {
        match self {
            ProjectileKind::Laser => 0,
            ProjectileKind::Missile => 1,
            ProjectileKind::Plasma => 2,
        }
    }

    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(ProjectileKind::Laser),
            1 => Some(ProjectileKind::Missile),
            2 => Some(ProjectileKind::Plasma),
            _ => None,
        }
    }
}

/// Information needed to build one turret.
///
/// `local_position` is in hull pixels measured from the hull's top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurretBuild {
    pub kind: ProjectileKind,
    pub local_position: [f32; 2], // array instead of a nalgebra point for serialization
}

impl TurretBuild {
    pub fn new(kind: ProjectileKind, local_position: Point<f32>) -> Self {
        Self {
            kind,
            local_position: [local_position.x, local_position.y],
        }
    }

    pub fn local_point(&self) -> Point<f32> {
        Point::new(self.local_position[0], self.local_position[1])
    }
}

/// A queued instruction to spawn one projectile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShotRequest {
    pub kind: ProjectileKind,
    pub layer: Layer,
    pub spawn: Point<f32>,
    pub target: Point<f32>,
}

/// Pending shots, shared between the turrets that push them and the battle
/// tick that drains them.
#[derive(Debug, Clone, Default)]
pub struct FireQueue {
    shots: Arc<Mutex<Vec<ShotRequest>>>,
}

impl FireQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, shot: ShotRequest) {
        self.lock().push(shot);
    }

    /// Takes every queued shot, leaving the queue empty.
    pub fn drain(&self) -> Vec<ShotRequest> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<ShotRequest>> {
        self.shots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layers_oppose_each_other() {
        assert_eq!(Layer::Home.opposing(), Layer::Away);
        assert_eq!(Layer::Away.opposing(), Layer::Home);
    }

    #[test]
    fn projectile_kind_tags_are_stable() {
        for kind in [
            ProjectileKind::Laser,
            ProjectileKind::Missile,
            ProjectileKind::Plasma,
        ] {
            assert_eq!(ProjectileKind::from_u8(kind.as_u8()), Some(kind));
        }
        assert_eq!(ProjectileKind::from_u8(3), None);
    }

    #[test]
    fn fire_queue_clones_share_storage() {
        let queue = FireQueue::new();
        let turret_handle = queue.clone();
        turret_handle.push(ShotRequest {
            kind: ProjectileKind::Laser,
            layer: Layer::Away,
            spawn: Point::origin(),
            target: Point::new(1.0, 0.0),
        });

        assert_eq!(queue.len(), 1);
        assert_eq!(queue.drain().len(), 1);
        assert!(turret_handle.is_empty());
    }

    #[test]
    fn turret_build_reads_back_its_point() {
        let build = TurretBuild::new(ProjectileKind::Missile, Point::new(12.0, 40.0));
        assert_eq!(build.local_point(), Point::new(12.0, 40.0));
    }
}
