//! Gravity area shapes and their down directions.
//!
//! An area is an immutable volume that proposes a gravity direction to every
//! body inside it. All shapes share one trigger representation (an oriented
//! box) and one dispatch point, [`GravityArea::gravity_direction`].

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::error::{GravityError, Result};

/// Smallest half extent accepted for a trigger volume, in meters.
const MIN_HALF_EXTENT: f32 = 1e-4;

/// Smallest squared length accepted for a direction vector.
const MIN_DIRECTION_LENGTH_SQ: f32 = 1e-8;

/// Handle to an area registered with a [`GravityWorld`](crate::GravityWorld).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AreaId(pub u32);

/// One of the six signed axes of a local frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum LocalAxis {
    PosX,
    NegX,
    PosY,
    #[default]
    NegY,
    PosZ,
    NegZ,
}

impl LocalAxis {
    /// Unit vector for this axis in its local frame.
    pub fn vector(self) -> Vec3 {
        match self {
            LocalAxis::PosX => Vec3::X,
            LocalAxis::NegX => Vec3::NEG_X,
            LocalAxis::PosY => Vec3::Y,
            LocalAxis::NegY => Vec3::NEG_Y,
            LocalAxis::PosZ => Vec3::Z,
            LocalAxis::NegZ => Vec3::NEG_Z,
        }
    }
}

/// Box volume with a world-space center and rotation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrientedBox {
    pub center: Vec3,
    pub half_extents: Vec3,
    #[serde(default = "identity_rotation")]
    pub rotation: Quat,
}

fn identity_rotation() -> Quat {
    Quat::IDENTITY
}

impl OrientedBox {
    /// Create an axis-aligned box.
    pub fn new(center: Vec3, half_extents: Vec3) -> Self {
        Self {
            center,
            half_extents,
            rotation: Quat::IDENTITY,
        }
    }

    /// Set the box rotation.
    #[must_use]
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    /// Full edge lengths of the box.
    pub fn size(&self) -> Vec3 {
        self.half_extents * 2.0
    }

    /// Check whether a world-space point lies inside the box (boundary inclusive).
    pub fn contains(&self, point: Vec3) -> bool {
        let local = self.rotation.inverse() * (point - self.center);
        local.abs().cmple(self.half_extents).all()
    }

    fn validated(self, context: &'static str) -> Result<Self> {
        if !self.center.is_finite() {
            return Err(GravityError::DegenerateVolume {
                context,
                half_extents: self.half_extents,
            });
        }
        if !self.half_extents.is_finite() || self.half_extents.min_element() < MIN_HALF_EXTENT {
            return Err(GravityError::DegenerateVolume {
                context,
                half_extents: self.half_extents,
            });
        }
        Ok(Self {
            rotation: validated_rotation(self.rotation, context)?,
            ..self
        })
    }
}

/// Local mesh bounds placed in the world by a transform.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MeshBounds {
    pub local_min: Vec3,
    pub local_max: Vec3,
    pub translation: Vec3,
    #[serde(default = "identity_rotation")]
    pub rotation: Quat,
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}

impl MeshBounds {
    /// World-space box enclosing the scaled mesh bounds.
    pub fn to_oriented_box(&self) -> OrientedBox {
        let local_center = (self.local_min + self.local_max) * 0.5 * self.scale;
        let half_extents = ((self.local_max - self.local_min) * 0.5 * self.scale).abs();
        OrientedBox {
            center: self.translation + self.rotation * local_center,
            half_extents,
            rotation: self.rotation,
        }
    }
}

/// Shape variants of a gravity area.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum AreaShape {
    /// Box volume whose gravity follows one of its own local axes.
    BoxFace { volume: OrientedBox, down: LocalAxis },
    /// Mesh-bounded volume whose gravity follows one of the mesh's local axes.
    MeshFace { bounds: MeshBounds, down: LocalAxis },
    /// Gravity pulls against the normal of a reference surface.
    GroundNormal {
        volume: OrientedBox,
        surface_rotation: Quat,
        #[serde(default = "surface_normal_axis")]
        normal: LocalAxis,
    },
    /// Fixed pull vector, not necessarily unit length.
    DirectionalPull { volume: OrientedBox, pull: Vec3 },
}

fn surface_normal_axis() -> LocalAxis {
    LocalAxis::PosY
}

impl AreaShape {
    fn name(&self) -> &'static str {
        match self {
            AreaShape::BoxFace { .. } => "box face",
            AreaShape::MeshFace { .. } => "mesh face",
            AreaShape::GroundNormal { .. } => "ground normal",
            AreaShape::DirectionalPull { .. } => "directional pull",
        }
    }

    fn validated(self) -> Result<Self> {
        let context = self.name();
        let shape = match self {
            AreaShape::BoxFace { volume, down } => AreaShape::BoxFace {
                volume: volume.validated(context)?,
                down,
            },
            AreaShape::MeshFace { bounds, down } => {
                if !bounds.scale.is_finite() || !bounds.translation.is_finite() {
                    return Err(GravityError::DegenerateVolume {
                        context,
                        half_extents: bounds.to_oriented_box().half_extents,
                    });
                }
                let rotation = validated_rotation(bounds.rotation, context)?;
                let bounds = MeshBounds { rotation, ..bounds };
                bounds.to_oriented_box().validated(context)?;
                AreaShape::MeshFace { bounds, down }
            }
            AreaShape::GroundNormal {
                volume,
                surface_rotation,
                normal,
            } => AreaShape::GroundNormal {
                volume: volume.validated(context)?,
                surface_rotation: validated_rotation(surface_rotation, "surface")?,
                normal,
            },
            AreaShape::DirectionalPull { volume, pull } => {
                if !pull.is_finite() || pull.length_squared() < MIN_DIRECTION_LENGTH_SQ {
                    return Err(GravityError::DegenerateDirection { context });
                }
                AreaShape::DirectionalPull {
                    volume: volume.validated(context)?,
                    pull,
                }
            }
        };
        Ok(shape)
    }
}

fn validated_rotation(rotation: Quat, context: &'static str) -> Result<Quat> {
    if !rotation.is_finite() || rotation.length_squared() < MIN_DIRECTION_LENGTH_SQ {
        return Err(GravityError::InvalidRotation { context });
    }
    Ok(rotation.normalize())
}

/// A validated, immutable gravity area.
#[derive(Clone, Debug, PartialEq)]
pub struct GravityArea {
    shape: AreaShape,
    priority: i32,
    hysteresis_delay: f32,
}

impl GravityArea {
    /// Validate a shape and build an area from it.
    ///
    /// A `hysteresis_delay` of zero commits membership changes on the same tick.
    pub fn new(shape: AreaShape, priority: i32, hysteresis_delay: f32) -> Result<Self> {
        if !hysteresis_delay.is_finite() || hysteresis_delay < 0.0 {
            return Err(GravityError::InvalidDelay {
                delay: hysteresis_delay,
            });
        }
        Ok(Self {
            shape: shape.validated()?,
            priority,
            hysteresis_delay,
        })
    }

    pub fn shape(&self) -> &AreaShape {
        &self.shape
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn hysteresis_delay(&self) -> f32 {
        self.hysteresis_delay
    }

    /// World-space gravity ("down") proposed by this area.
    ///
    /// Unit length for every variant except [`AreaShape::DirectionalPull`],
    /// which returns its pull vector as configured.
    pub fn gravity_direction(&self) -> Vec3 {
        match self.shape {
            AreaShape::BoxFace { volume, down } => volume.rotation * down.vector(),
            AreaShape::MeshFace { bounds, down } => bounds.rotation * down.vector(),
            AreaShape::GroundNormal {
                surface_rotation,
                normal,
                ..
            } => -(surface_rotation * normal.vector()),
            AreaShape::DirectionalPull { pull, .. } => pull,
        }
    }

    /// Trigger volume used to detect bodies entering and leaving the area.
    pub fn trigger_volume(&self) -> OrientedBox {
        match self.shape {
            AreaShape::BoxFace { volume, .. }
            | AreaShape::GroundNormal { volume, .. }
            | AreaShape::DirectionalPull { volume, .. } => volume,
            AreaShape::MeshFace { bounds, .. } => bounds.to_oriented_box(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::FRAC_PI_2;

    use super::*;

    fn unit_box() -> OrientedBox {
        OrientedBox::new(Vec3::ZERO, Vec3::splat(5.0))
    }

    fn assert_vec_eq(a: Vec3, b: Vec3) {
        assert!(a.abs_diff_eq(b, 1e-5), "{a} != {b}");
    }

    #[test]
    fn test_box_face_follows_rotation() {
        let volume = unit_box().with_rotation(Quat::from_rotation_z(FRAC_PI_2));
        let area = GravityArea::new(
            AreaShape::BoxFace {
                volume,
                down: LocalAxis::NegY,
            },
            0,
            0.0,
        )
        .unwrap();

        // Rotating -Y by 90° about Z gives +X.
        assert_vec_eq(area.gravity_direction(), Vec3::X);
    }

    #[test]
    fn test_mesh_face_box_from_bounds() {
        let bounds = MeshBounds {
            local_min: Vec3::new(-1.0, 0.0, -1.0),
            local_max: Vec3::new(1.0, 2.0, 1.0),
            translation: Vec3::new(10.0, 0.0, 0.0),
            rotation: Quat::IDENTITY,
            scale: Vec3::new(2.0, 2.0, 2.0),
        };
        let area = GravityArea::new(
            AreaShape::MeshFace {
                bounds,
                down: LocalAxis::PosZ,
            },
            3,
            0.25,
        )
        .unwrap();

        let volume = area.trigger_volume();
        assert_vec_eq(volume.center, Vec3::new(10.0, 2.0, 0.0));
        assert_vec_eq(volume.half_extents, Vec3::new(2.0, 2.0, 2.0));
        assert_vec_eq(area.gravity_direction(), Vec3::Z);
        assert_eq!(area.priority(), 3);
    }

    #[test]
    fn test_ground_normal_points_into_surface() {
        let tilted = Quat::from_rotation_x(FRAC_PI_2);
        let area = GravityArea::new(
            AreaShape::GroundNormal {
                volume: unit_box(),
                surface_rotation: tilted,
                normal: LocalAxis::PosY,
            },
            0,
            0.0,
        )
        .unwrap();

        // The surface normal +Y rotated about X becomes +Z; gravity opposes it.
        assert_vec_eq(area.gravity_direction(), Vec3::NEG_Z);
    }

    #[test]
    fn test_directional_pull_keeps_magnitude() {
        let area = GravityArea::new(
            AreaShape::DirectionalPull {
                volume: unit_box(),
                pull: Vec3::new(0.0, 0.0, 4.0),
            },
            0,
            0.0,
        )
        .unwrap();
        assert_vec_eq(area.gravity_direction(), Vec3::new(0.0, 0.0, 4.0));
    }

    #[test]
    fn test_zero_extent_rejected() {
        let result = GravityArea::new(
            AreaShape::BoxFace {
                volume: OrientedBox::new(Vec3::ZERO, Vec3::new(1.0, 0.0, 1.0)),
                down: LocalAxis::NegY,
            },
            0,
            0.0,
        );
        assert!(matches!(
            result,
            Err(GravityError::DegenerateVolume { .. })
        ));
    }

    #[test]
    fn test_zero_mesh_scale_rejected() {
        let bounds = MeshBounds {
            local_min: Vec3::splat(-1.0),
            local_max: Vec3::splat(1.0),
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::new(1.0, 0.0, 1.0),
        };
        let result = GravityArea::new(
            AreaShape::MeshFace {
                bounds,
                down: LocalAxis::NegY,
            },
            0,
            0.0,
        );
        assert!(matches!(
            result,
            Err(GravityError::DegenerateVolume { .. })
        ));
    }

    #[test]
    fn test_zero_pull_rejected() {
        let result = GravityArea::new(
            AreaShape::DirectionalPull {
                volume: unit_box(),
                pull: Vec3::ZERO,
            },
            0,
            0.0,
        );
        assert!(matches!(
            result,
            Err(GravityError::DegenerateDirection { .. })
        ));
    }

    #[test]
    fn test_invalid_delay_rejected() {
        let shape = AreaShape::BoxFace {
            volume: unit_box(),
            down: LocalAxis::NegY,
        };
        assert!(matches!(
            GravityArea::new(shape, 0, -0.1),
            Err(GravityError::InvalidDelay { .. })
        ));
        assert!(matches!(
            GravityArea::new(shape, 0, f32::NAN),
            Err(GravityError::InvalidDelay { .. })
        ));
    }

    #[test]
    fn test_zero_rotation_rejected() {
        let volume = unit_box().with_rotation(Quat::from_xyzw(0.0, 0.0, 0.0, 0.0));
        let result = GravityArea::new(
            AreaShape::BoxFace {
                volume,
                down: LocalAxis::NegY,
            },
            0,
            0.0,
        );
        assert!(matches!(result, Err(GravityError::InvalidRotation { .. })));
    }

    #[test]
    fn test_rotation_normalized_on_construction() {
        let volume = unit_box().with_rotation(Quat::from_xyzw(0.0, 0.0, 0.0, 2.0));
        let area = GravityArea::new(
            AreaShape::BoxFace {
                volume,
                down: LocalAxis::NegY,
            },
            0,
            0.0,
        )
        .unwrap();
        assert_vec_eq(area.gravity_direction(), Vec3::NEG_Y);
    }

    #[test]
    fn test_contains_rotated_box() {
        let volume = OrientedBox::new(Vec3::new(0.0, 10.0, 0.0), Vec3::new(4.0, 1.0, 1.0))
            .with_rotation(Quat::from_rotation_z(FRAC_PI_2));

        // The long axis now runs along world Y.
        assert!(volume.contains(Vec3::new(0.0, 13.5, 0.0)));
        assert!(!volume.contains(Vec3::new(3.0, 10.0, 0.0)));
    }
}
