use crate::{RgbD, RgbF, Vec3d};

pub trait FloatExt {
    fn sq(self) -> Self;
    fn lerp(self, other: Self, t: Self) -> Self;
}

impl FloatExt for f64 {
    fn sq(self) -> Self {
        self * self
    }
    fn lerp(self, other: Self, t: Self) -> Self {
        #[allow(clippy::suboptimal_flops)]
        {
            self * (1.0 - t) + other * t
        }
    }
}

impl FloatExt for f32 {
    fn sq(self) -> Self {
        self * self
    }

    fn lerp(self, other: Self, t: Self) -> Self {
        #[allow(clippy::suboptimal_flops)]
        {
            self * (1.0 - t) + other * t
        }
    }
}

pub trait SafeCast<Target> {
    fn safe_cast(self) -> Target;
}

impl SafeCast<RgbD> for RgbF {
    fn safe_cast(self) -> RgbD {
        RgbD {
            x: self.x as f64,
            y: self.y as f64,
            z: self.z as f64,
        }
    }
}

impl SafeCast<f64> for f32 {
    fn safe_cast(self) -> f64 {
        self as f64
    }
}

pub trait VecExt {
    type Scalar;
    #[must_use]
    fn luminance(self) -> Self::Scalar;
    #[must_use]
    fn sq(self) -> Self;
    #[must_use]
    fn sqrt(self) -> Self;
    #[must_use]
    fn ln(self) -> Self;
    #[must_use]
    fn exp(self) -> Self;
    #[must_use]
    fn powf_scalar(self, e: Self::Scalar) -> Self;
    #[must_use]
    fn is_white(self) -> bool;
}

impl VecExt for Vec3d {
    type Scalar = f64;

    fn sq(self) -> Self {
        self * self
    }

    /// Returns the perceived brightness of the color
    fn luminance(self) -> Self::Scalar {
        let lfac = Self::new(0.2126, 0.7152, 0.0722);
        self.dot(lfac)
    }

    fn sqrt(self) -> Self {
        Self {
            x: self.x.sqrt(),
            y: self.y.sqrt(),
            z: self.z.sqrt(),
        }
    }

    fn ln(self) -> Self {
        Self {
            x: self.x.ln(),
            y: self.y.ln(),
            z: self.z.ln(),
        }
    }

    fn exp(self) -> Self {
        Self {
            x: self.x.exp(),
            y: self.y.exp(),
            z: self.z.exp(),
        }
    }

    fn powf_scalar(self, e: f64) -> Self {
        Self {
            x: self.x.powf(e),
            y: self.y.powf(e),
            z: self.z.powf(e),
        }
    }

    fn is_white(self) -> bool {
        self.cmpge(Self::ONE).all()
    }
}

/// reflects `vec` about `n`. Both point away from the surface
pub fn reflect(n: Vec3d, vec: Vec3d) -> Vec3d {
    n * (n.dot(vec) * 2.0) - vec
}

pub fn sample_diffuse_lobe(omega_o: Vec3d, eps1: f64, eps2: f64) -> (Vec3d, f64) {
    let eps_theta_sample = eps1.clamp(1e-6, 1.0); // prevent division by zero (division by pdf)
    let cos_theta = eps_theta_sample.sqrt() * omega_o.z.signum();
    let sin_theta = (1.0 - eps_theta_sample).sqrt();
    let phi: f64 = (2.0 * std::f64::consts::PI) * eps2;
    let (sin_phi, cos_phi) = phi.sin_cos();
    let omega_i = Vec3d {
        x: sin_theta * sin_phi,
        y: sin_theta * cos_phi,
        z: cos_theta,
    };
    (omega_i, cos_theta.abs() / (std::f64::consts::PI))
}

pub fn sample_diffuse_lobe_pdf(omega_o: Vec3d, omega_i: Vec3d) -> f64 {
    if omega_i.z * omega_o.z > 0.0 {
        omega_i.z.abs() / (std::f64::consts::PI)
    } else {
        0.0
    }
}

/// Refracts `omega_i` through the microfacet `m`. `None` on total internal reflection
#[must_use]
pub fn refract_good(omega_i: Vec3d, m: Vec3d, ior_i: f64, ior_o: f64) -> Option<Vec3d> {
    let c = omega_i.dot(m);
    let ior_rel = ior_i / ior_o;
    #[allow(clippy::suboptimal_flops)]
    let disc = 1.0 + ior_rel.sq() * (c.sq() - 1.0);
    if disc <= 0.0 {
        None
    } else {
        #[allow(clippy::suboptimal_flops)]
        Some(m * (c * ior_rel - omega_i.z.signum() * disc.sqrt()) - omega_i * ior_rel)
    }
}

pub fn rotate_around_z(v: Vec3d, angle: f64) -> Vec3d {
    let (sin, cos) = angle.sin_cos();
    #[allow(clippy::suboptimal_flops)]
    Vec3d {
        x: v.x * cos - v.y * sin,
        y: v.x * sin + v.y * cos,
        z: v.z,
    }
}

pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    #[allow(clippy::suboptimal_flops)]
    {
        t * t * (3.0 - 2.0 * t)
    }
}
