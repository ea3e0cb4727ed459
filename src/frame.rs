//! Orthonormal shading frames. Lobes are evaluated in a local space where the normal is the
//! z-axis, these frames convert world space directions into that space and back.

use crate::{utils, Vec3d};

/// An orthonormal basis around a normal
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Frame {
    pub tangent: Vec3d,
    pub bitangent: Vec3d,
    pub normal: Vec3d,
}

impl Frame {
    /// Builds a frame around `normal` without branching on the normal direction.
    ///
    /// [Building an Orthonormal Basis, Revisited](https://jcgt.org/published/0006/01/01/)
    #[must_use]
    pub fn from_normal(normal: Vec3d) -> Self {
        let sign = 1.0_f64.copysign(normal.z);
        let a = -1.0 / (sign + normal.z);
        let b = normal.x * normal.y * a;

        #[allow(clippy::suboptimal_flops)]
        let tangent = Vec3d::new(
            1.0 + sign * normal.x * normal.x * a,
            sign * b,
            -sign * normal.x,
        );
        #[allow(clippy::suboptimal_flops)]
        let bitangent = Vec3d::new(b, sign + normal.y * normal.y * a, -normal.y);

        Self {
            tangent,
            bitangent,
            normal,
        }
    }

    /// Builds a frame around `normal` whose tangent is rotated by `angle` radians. Used to
    /// orient anisotropic lobes.
    #[must_use]
    pub fn rotated(normal: Vec3d, angle: f64) -> Self {
        let frame = Self::from_normal(normal);
        if angle == 0.0 {
            return frame;
        }
        let tangent = frame.to_world(utils::rotate_around_z(Vec3d::X, angle));
        Self {
            tangent,
            bitangent: normal.cross(tangent),
            normal,
        }
    }

    #[must_use]
    pub fn to_local(&self, v: Vec3d) -> Vec3d {
        Vec3d::new(v.dot(self.tangent), v.dot(self.bitangent), v.dot(self.normal))
    }

    #[must_use]
    pub fn to_world(&self, v: Vec3d) -> Vec3d {
        self.tangent * v.x + self.bitangent * v.y + self.normal * v.z
    }
}
