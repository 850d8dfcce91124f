//! Rotation helpers for keeping a body's up-axis on its gravity "up".
//!
//! Bodies use +Y as their local up. These functions only ever apply the
//! minimal arc between the current and target up, so heading is preserved as
//! far as the geometry allows.

use glam::{Quat, Vec3};

/// Rotation that places the body's local +Y on `up` with the smallest turn.
pub fn align_up(rotation: Quat, up: Vec3) -> Quat {
    let target = up.normalize_or_zero();
    if target == Vec3::ZERO {
        return rotation;
    }
    let current = rotation * Vec3::Y;
    (Quat::from_rotation_arc(current, target) * rotation).normalize()
}

/// Turn the body's up-axis toward `up` by at most `max_angle` radians.
///
/// Returns the new rotation and whether the target was reached.
pub fn rotate_up_towards(rotation: Quat, up: Vec3, max_angle: f32) -> (Quat, bool) {
    let target = up.normalize_or_zero();
    if target == Vec3::ZERO {
        return (rotation, true);
    }

    let current = rotation * Vec3::Y;
    let angle = current.angle_between(target);
    if angle <= max_angle.max(0.0) {
        return (align_up(rotation, target), true);
    }

    // Antiparallel ups have no unique arc; tip over the body's own right axis.
    let axis = current.cross(target);
    let axis = if axis.length_squared() < 1e-10 {
        rotation * Vec3::X
    } else {
        axis.normalize()
    };

    let step = Quat::from_axis_angle(axis, max_angle);
    ((step * rotation).normalize(), false)
}

/// Whether two up vectors are the same up to the given dot-product threshold.
pub fn ups_match(a: Vec3, b: Vec3, threshold: f32) -> bool {
    a.normalize_or_zero().dot(b.normalize_or_zero()) >= threshold
}
