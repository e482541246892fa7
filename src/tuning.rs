//! Gameplay tuning for battles.
//!
//! Everything here is fixed game data; runtime knobs (ports, timeouts, tick
//! rate) live in `config`.

use std::f32::consts::FRAC_PI_4;

/// How fast ships and turrets turn, in radians per second (45°/s).
pub const TURN_RATE: f32 = FRAC_PI_4;

/// Speed gained per second while a ship is in the moving state.
pub const SHIP_ACCELERATION: f32 = 20.0;
/// Speed lost per second while a ship is decelerating.
pub const SHIP_DECELERATION: f32 = 10.0;
/// Remaining distances below this are treated as arrival.
pub const ARRIVAL_EPSILON: f32 = 1.0e-4;

/// Edge length, in hull pixels, of one damage-mask cell.
pub const KEY_SIZE_FACTOR: u32 = 4;

/// Turrets are square; this is their edge length in hull pixels.
pub const TURRET_SIZE: f32 = 32.0;
/// Spacing used when filling a hull with turrets for the debug build.
pub const DEBUG_BUILD_SPACING: f32 = 42.0;

/// Width and height of the playable field. Projectiles leaving it are removed.
pub const FIELD_WIDTH: f32 = 4000.0;
pub const FIELD_HEIGHT: f32 = 4000.0;

/// Offset of each local-battle ship from the centre of the field.
pub const LOCAL_SPAWN_OFFSET: [f32; 2] = [200.0, 200.0];

/// Spawn placement of the hosting peer's ship.
pub const HOST_SPAWN: SpawnPoint = SpawnPoint {
    position: [1800.0, 1800.0],
    angle_degrees: 45.0,
};

/// Spawn placement of the joining peer's ship.
pub const JOINER_SPAWN: SpawnPoint = SpawnPoint {
    position: [2200.0, 2200.0],
    angle_degrees: 225.0,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpawnPoint {
    pub position: [f32; 2],
    pub angle_degrees: f32,
}

impl SpawnPoint {
    pub fn angle(&self) -> f32 {
        self.angle_degrees.to_radians()
    }
}
