//! An implementation of the GGX Distribution

use crate::{utils::FloatExt, EvaluateResponse, RgbD, Vec3d};
use std::f64::consts;

/// This is a common microsurface model to describe anisotropic rough surfaces.
/// It is used by every microfacet lobe of [`crate::principled::PrincipledBsdf`]
///
/// # Mathematical background
/// * [Understanding the Masking-Shadowing Function in Microfacet-Based BRDFs](https://jcgt.org/published/0003/02/03/)
/// * [Sampling the GGX Distribution of Visible Normals](https://jcgt.org/published/0007/04/01/)
#[derive(Clone, Copy, Debug)]
pub struct GGX {
    /// roughness in direction x
    /// This roughness values are not perceived linearly. The following formula is a good approximation for
    /// choosing roughness values.
    /// alpha_x = perceived_rougness_x^2
    pub alpha_x: f64,

    /// roughness in direction y
    /// This roughness values are not perceived linearly. The following formula is a good approximation for
    /// choosing roughness values.
    /// alpha_y = perceived_rougness_y^2
    pub alpha_y: f64,
}

impl GGX {
    #[must_use]
    pub fn from_remapped(roughness: f64, anisotropic: f64) -> Self {
        let min_alpha: f64 = 0.001;
        let max_aniso: f64 = 0.9;
        let alpha = roughness.sq();
        let alpha = alpha.max(min_alpha);

        #[allow(clippy::suboptimal_flops)]
        let aspect = (1.0 - max_aniso * anisotropic).sqrt();
        Self {
            alpha_x: alpha / aspect,
            alpha_y: alpha * aspect,
        }
    }

    /// Distribution of normals / Normal Distribution Function
    /// This is the $D$ term in typical Cook-Torance / GGX model
    #[must_use]
    pub fn ndf(&self, m: Vec3d) -> f64 {
        if m.z <= 1e-10 {
            return 0.0;
        }
        let denom = consts::PI
            * self.alpha_x
            * self.alpha_y
            * ((m.x / self.alpha_x).sq() + (m.y / self.alpha_y).sq() + (m.z).sq()).sq();
        1.0 / denom
    }

    /// Masking-Shadowing function
    /// This is the $G$ term in typical Cook-Torance / GGX model
    #[must_use]
    pub fn geometric(&self, omega_i: Vec3d, omega_o: Vec3d, micro_surface: Vec3d) -> f64 {
        self.shadowing(omega_i, micro_surface) * self.shadowing(omega_o, micro_surface)
    }

    /// shadowing function
    /// This is the `G_1` term in typical Cook-Torance / GGX model
    #[must_use]
    pub fn shadowing(&self, omega: Vec3d, micro_surface: Vec3d) -> f64 {
        Self::g1_local(omega, micro_surface) * self.g1_smith(omega)
    }

    /// Smith masking without the local microfacet visibility check
    #[must_use]
    pub fn g1_smith(&self, omega: Vec3d) -> f64 {
        if omega.z.abs() < 1e-10 {
            return 0.0;
        }
        (2.0)
            / ((1.0)
                + f64::sqrt(
                    (1.0)
                        + ((self.alpha_x * omega.x).sq() + (self.alpha_y * omega.y).sq())
                            / (omega.z).sq(),
                ))
    }

    #[must_use]
    fn g1_local(omega: Vec3d, m: Vec3d) -> f64 {
        if omega.dot(m) * omega.z >= (0.0) {
            1.0
        } else {
            0.0
        }
    }

    /// Distribution of visible normals as seen from `omega_o`
    #[must_use]
    pub fn vndf(&self, omega_o: Vec3d, m: Vec3d) -> f64 {
        self.shadowing(omega_o, m) * omega_o.dot(m).clamp(0.0, 1.0) * self.ndf(m) / omega_o.z.abs()
    }

    #[must_use]
    pub fn sample_vndf(&self, omega_o: Vec3d, r1: f64, r2: f64) -> Vec3d {
        let v_h: Vec3d = Vec3d::new(
            omega_o.x * self.alpha_x,
            omega_o.y * self.alpha_y,
            omega_o.z,
        )
        .normalize();

        #[allow(clippy::suboptimal_flops)]
        let lensq = v_h.x * v_h.x + v_h.y * v_h.y;
        let at1: Vec3d = if lensq > (1.0e-10) {
            Vec3d::new(-v_h.y, v_h.x, 0.0) / f64::sqrt(lensq)
        } else {
            Vec3d::new(1.0, 0.0, 0.0)
        };
        let at2: Vec3d = Vec3d::cross(v_h, at1);

        let r = r1.sqrt();
        let phi: f64 = (2.0) * consts::PI * r2;
        let t1 = r * phi.cos();
        let t2 = r * phi.sin();
        let s: f64 = (0.5) * ((1.0) + v_h.z);

        #[allow(clippy::suboptimal_flops)]
        let t2r = (1.0 - s) * (1.0 - t1 * t1).sqrt() + s * t2;

        #[allow(clippy::suboptimal_flops)]
        let m_h: Vec3d = at1 * t1 + at2 * t2r + v_h * (1.0 - t1 * t1 - t2r * t2r).max(0.0).sqrt();

        Vec3d::new(
            self.alpha_x * m_h.x,
            self.alpha_y * m_h.y,
            f64::max(0.0, m_h.z),
        )
        .normalize()
    }

    /// Samples a reflected direction by sampling the visible normals from `omega_o`.
    /// `omega_o` has to be above the surface
    #[must_use]
    pub fn sample_reflection(&self, omega_o: Vec3d, r1: f64, r2: f64) -> Vec3d {
        let m = self.sample_vndf(omega_o, r1, r2);
        crate::utils::reflect(m, omega_o)
    }

    /// Evaluates a reflective Torrance-Sparrow lobe with the given fresnel term.
    ///
    /// The pdf is the one of [`GGX::sample_reflection`]. Reflections can be sampled below the
    /// surface, those keep their pdf but do not contribute.
    #[must_use]
    pub fn torrance_sparrow(&self, omega_o: Vec3d, omega_i: Vec3d, fresnel: RgbD) -> EvaluateResponse {
        if omega_o.z <= 0.0 {
            return EvaluateResponse::ZERO;
        }
        let Some(m) = (omega_o + omega_i).try_normalize() else {
            return EvaluateResponse::ZERO;
        };

        // jacobian of the reflection about m
        let o_dot_m = omega_o.dot(m);
        if o_dot_m <= 0.0 {
            return EvaluateResponse::ZERO;
        }
        let pdf = self.vndf(omega_o, m) / (4.0 * o_dot_m);
        if omega_i.z <= 0.0 {
            return EvaluateResponse {
                bsdf: RgbD::ZERO,
                pdf,
            };
        }

        let g = self.geometric(omega_i, omega_o, m);
        let bsdf = fresnel * (self.ndf(m) * g / (4.0 * omega_o.z * omega_i.z));
        EvaluateResponse { bsdf, pdf }
    }
}
