//! Ship construction: the list of turrets a player's ship is built with.

use crate::components::{ProjectileKind, TurretBuild};
use crate::error::BuildError;
use crate::hull::{DamageMask, HullSprite};
use crate::tuning::{DEBUG_BUILD_SPACING, KEY_SIZE_FACTOR, TURRET_SIZE};
use rapier2d::prelude::Point;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Turret layout for one ship, in hull pixel coordinates.
///
/// Stored on disk as JSON:
/// `{"turrets":[{"kind":"laser","local_position":[40.0,20.0]}]}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShipBuild {
    pub turrets: Vec<TurretBuild>,
}

impl ShipBuild {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, BuildError> {
        let text = std::fs::read_to_string(path)?;
        let build = Self::from_json(&text)?;
        info!(path = %path.display(), turrets = build.turrets.len(), "loaded ship build");
        Ok(build)
    }

    pub fn from_json(text: &str) -> Result<Self, BuildError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn turrets(&self) -> &[TurretBuild] {
        &self.turrets
    }

    pub fn len(&self) -> usize {
        self.turrets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turrets.is_empty()
    }

    /// A turret may sit anywhere on intact hull, as long as its square does
    /// not overlap another turret.
    pub fn is_valid_placement(&self, hull: &DamageMask, position: Point<f32>) -> bool {
        let on_hull = position.x >= 0.0
            && position.y >= 0.0
            && hull.is_intact(hull.cell_at(&position));
        on_hull
            && !self
                .turrets
                .iter()
                .any(|turret| squares_overlap(turret.local_point(), position))
    }

    /// Adds a turret if the placement is valid. Returns whether it was placed.
    pub fn add_turret(&mut self, hull: &DamageMask, kind: ProjectileKind, position: Point<f32>) -> bool {
        if !self.is_valid_placement(hull, position) {
            return false;
        }
        self.turrets.push(TurretBuild::new(kind, position));
        debug!(?kind, x = position.x, y = position.y, "turret placed");
        true
    }

    /// Removes every turret whose square overlaps one placed at `position`.
    pub fn clear_area(&mut self, position: Point<f32>) -> usize {
        let before = self.turrets.len();
        self.turrets
            .retain(|turret| !squares_overlap(turret.local_point(), position));
        before - self.turrets.len()
    }

    /// Fills the hull with turrets of one kind on a fixed grid.
    pub fn debug_full(hull: &HullSprite, kind: ProjectileKind) -> Self {
        let mask = DamageMask::from_hull(hull, KEY_SIZE_FACTOR);
        let [width, height] = hull.size();
        let mut build = Self::new();

        let mut y = 0.0;
        while y < height {
            let mut x = 0.0;
            while x < width {
                build.add_turret(&mask, kind, Point::new(x, y));
                x += DEBUG_BUILD_SPACING;
            }
            y += DEBUG_BUILD_SPACING;
        }
        build
    }
}

fn squares_overlap(a: Point<f32>, b: Point<f32>) -> bool {
    (a.x - b.x).abs() < TURRET_SIZE && (a.y - b.y).abs() < TURRET_SIZE
}
