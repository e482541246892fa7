//! Angle helpers and the hull coordinate frame.

use crate::components::Pose;
use crate::tuning::TURN_RATE;
use rapier2d::parry::bounding_volume::Aabb;
use rapier2d::prelude::{Isometry, Point, Vector};
use std::f32::consts::{PI, TAU};

/// Angle of `vector` in `[0, 2π)`.
pub fn vector_angle(vector: &Vector<f32>) -> f32 {
    vector.y.atan2(vector.x).rem_euclid(TAU)
}

pub fn angle_to_point(source: &Point<f32>, target: &Point<f32>) -> f32 {
    vector_angle(&(target - source))
}

/// Signed difference `to - from`, wrapped into `(-π, π]`.
pub fn shortest_arc(from: f32, to: f32) -> f32 {
    let diff = (to - from).rem_euclid(TAU);
    if diff > PI { diff - TAU } else { diff }
}

/// Turns `rotation` toward `target` along the shorter arc at [`TURN_RATE`].
///
/// Returns true once the rotation faces the target; the final step snaps
/// exactly onto the target angle.
pub fn face_target(rotation: &mut f32, position: &Point<f32>, target: &Point<f32>, dt: f32) -> bool {
    let wanted = angle_to_point(position, target);
    let difference = shortest_arc(*rotation, wanted);
    let turn = TURN_RATE * dt;

    if difference.abs() <= turn {
        *rotation = wanted;
        true
    } else {
        *rotation = (*rotation + turn.copysign(difference)).rem_euclid(TAU);
        false
    }
}

/// Axis-aligned bounds of a rectangle of `size` centred on `centre` and
/// rotated by `rotation`.
pub fn rotated_rect_aabb(centre: &Point<f32>, size: [f32; 2], rotation: f32) -> Aabb {
    let isometry = Isometry::new(centre.coords, rotation);
    let (hx, hy) = (size[0] / 2.0, size[1] / 2.0);
    let corners = [
        Point::new(-hx, -hy),
        Point::new(hx, -hy),
        Point::new(hx, hy),
        Point::new(-hx, hy),
    ];

    let mut mins = Point::new(f32::INFINITY, f32::INFINITY);
    let mut maxs = Point::new(f32::NEG_INFINITY, f32::NEG_INFINITY);
    for corner in corners {
        let world = isometry.transform_point(&corner);
        mins.x = mins.x.min(world.x);
        mins.y = mins.y.min(world.y);
        maxs.x = maxs.x.max(world.x);
        maxs.y = maxs.y.max(world.y);
    }
    Aabb::new(mins, maxs)
}

/// Maps between world space and a hull's pixel space.
///
/// Hull pixels are measured from the texture's top-left corner; the hull is
/// positioned and rotated about its centre (`origin`).
#[derive(Debug, Clone, Copy)]
pub struct HullFrame {
    isometry: Isometry<f32>,
    origin: Vector<f32>,
}

impl HullFrame {
    pub fn new(pose: &Pose, hull_size: [f32; 2]) -> Self {
        Self {
            isometry: pose.isometry(),
            origin: Vector::new(hull_size[0] / 2.0, hull_size[1] / 2.0),
        }
    }

    pub fn to_world(&self, pixel: &Point<f32>) -> Point<f32> {
        self.isometry.transform_point(&(pixel - self.origin))
    }

    pub fn to_hull(&self, world: &Point<f32>) -> Point<f32> {
        self.isometry.inverse_transform_point(world) + self.origin
    }

    pub fn rotation(&self) -> f32 {
        self.isometry.rotation.angle()
    }
}
