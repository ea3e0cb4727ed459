//! Retro-reflective sheen of cloth and dust layers

use crate::{
    energy_compensation::{GridLut, Lut3D},
    utils::{self, FloatExt},
    EvaluateResponse, RgbD, Vec3d, BSDF,
};
use std::{f64::consts, sync::OnceLock};

/// Charlie sheen distribution with the visibility term of Neubelt and Pettineo.
///
/// * Alejandro Conty Estevez and Christopher Kulla. Production friendly microfacet sheen BRDF.
///     *Sony Pictures Imageworks,* 2017.
/// * David Neubelt and Matt Pettineo. Crafting a next-gen material pipeline for The Order: 1886. 2013.
#[derive(Clone, Copy, Debug)]
pub struct Sheen {
    pub color: RgbD,

    /// perceptual roughness in `[0, 1]`
    pub roughness: f64,
}

impl Sheen {
    fn alpha(&self) -> f64 {
        self.roughness.sq().clamp(1e-3, 1.0)
    }

    /// Charlie normal distribution function given the cosine of the microfacet normal
    #[must_use]
    pub fn ndf(alpha: f64, cos_theta_h: f64) -> f64 {
        let inv_alpha = 1.0 / alpha;
        let sin2_theta = (1.0 - cos_theta_h.sq()).max(0.0);
        (2.0 + inv_alpha) * sin2_theta.powf(0.5 * inv_alpha) / (2.0 * consts::PI)
    }

    fn visibility(cos_o: f64, cos_i: f64) -> f64 {
        #[allow(clippy::suboptimal_flops)]
        let denom = 4.0 * (cos_i + cos_o - cos_i * cos_o);
        if denom <= 1e-8 {
            0.0
        } else {
            1.0 / denom
        }
    }

    fn reflectance(&self, omega_o: Vec3d, omega_i: Vec3d) -> f64 {
        let Some(h) = (omega_o + omega_i).try_normalize() else {
            return 0.0;
        };
        Self::ndf(self.alpha(), h.z) * Self::visibility(omega_o.z, omega_i.z)
    }

    /// Fraction of the light reflected by a white sheen layer. The rest reaches the layers below.
    #[must_use]
    pub fn albedo(&self, cos_theta_o: f64) -> f64 {
        static ALBEDO: OnceLock<GridLut> = OnceLock::new();
        let lut = ALBEDO.get_or_init(|| {
            let _span = tracing::debug_span!("bake_sheen_albedo").entered();
            GridLut::from_fn([32, 32, 1], |coords| {
                let sheen = Self {
                    color: RgbD::ONE,
                    roughness: coords.y,
                };
                sheen.integrate_albedo(coords.x.max(1e-3), 32)
            })
        });
        lut.sample(Vec3d::new(cos_theta_o, self.roughness, 0.0))
            .clamp(0.0, 1.0)
    }

    /// Stratified cosine weighted quadrature over the hemisphere
    fn integrate_albedo(&self, cos_theta_o: f64, strata: usize) -> f64 {
        let omega_o = Vec3d::new((1.0 - cos_theta_o.sq()).max(0.0).sqrt(), 0.0, cos_theta_o);
        let mut sum = 0.0;
        for a in 0..strata {
            for b in 0..strata {
                let (omega_i, _) = utils::sample_diffuse_lobe(
                    omega_o,
                    (a as f64 + 0.5) / strata as f64,
                    (b as f64 + 0.5) / strata as f64,
                );
                sum += self.reflectance(omega_o, omega_i) * consts::PI;
            }
        }
        sum / (strata * strata) as f64
    }
}

impl BSDF for Sheen {
    fn sample_direction(&self, omega_o: Vec3d, rdf: Vec3d) -> Vec3d {
        utils::sample_diffuse_lobe(omega_o, rdf.x, rdf.y).0
    }

    fn evaluate(&self, omega_o: Vec3d, omega_i: Vec3d) -> EvaluateResponse {
        if omega_o.z <= 0.0 || omega_i.z <= 0.0 {
            return EvaluateResponse::ZERO;
        }
        EvaluateResponse {
            bsdf: self.color * self.reflectance(omega_o, omega_i),
            pdf: utils::sample_diffuse_lobe_pdf(omega_o, omega_i),
        }
    }
}
