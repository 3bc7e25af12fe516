use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a body in the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BodyId(pub Uuid);

impl BodyId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BodyId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BodyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

/// Rigid transform: position and rotation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Self::IDENTITY
        }
    }

    /// Build from a homogeneous 4x4 matrix. Any scale or shear is discarded.
    pub fn from_matrix(m: Mat4) -> Self {
        let (_scale, rotation, position) = m.to_scale_rotation_translation();
        Self {
            position,
            rotation: rotation.normalize(),
        }
    }

    pub fn to_matrix(&self) -> Mat4 {
        Mat4::from_rotation_translation(self.rotation, self.position)
    }

    /// Interpolate between two transforms: linear on position, slerp on rotation.
    pub fn lerp(&self, other: &Self, t: f32) -> Self {
        Self {
            position: self.position.lerp(other.position, t),
            rotation: self.rotation.slerp(other.rotation, t),
        }
    }

    pub fn is_finite(&self) -> bool {
        self.position.is_finite() && self.rotation.is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_id_uniqueness() {
        let a = BodyId::new();
        let b = BodyId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn transform_default_is_identity() {
        let t = Transform::default();
        assert_eq!(t.position, Vec3::ZERO);
        assert_eq!(t.rotation, Quat::IDENTITY);
    }

    #[test]
    fn matrix_translation_column_becomes_position() {
        let mut m = Mat4::IDENTITY;
        m.w_axis = glam::Vec4::new(-0.5, -0.5, 2.0, 1.0);
        let t = Transform::from_matrix(m);
        assert_eq!(t.position, Vec3::new(-0.5, -0.5, 2.0));
        assert!(t.rotation.abs_diff_eq(Quat::IDENTITY, 1e-6));
    }

    #[test]
    fn matrix_conversion_keeps_rotation() {
        let t = Transform {
            position: Vec3::new(1.0, 2.0, 3.0),
            rotation: Quat::from_rotation_z(0.7),
        };
        let back = Transform::from_matrix(t.to_matrix());
        assert!(back.position.abs_diff_eq(t.position, 1e-5));
        assert!(back.rotation.abs_diff_eq(t.rotation, 1e-5));
    }

    #[test]
    fn lerp_halfway() {
        let a = Transform::from_position(Vec3::ZERO);
        let b = Transform::from_position(Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(a.lerp(&b, 0.5).position, Vec3::new(1.0, 0.0, 0.0));
    }
}
