//! Diffuse base of the glossy layer, either Lambertian or Oren-Nayar
use std::f64::consts;

use crate::{config::DiffuseModel, utils, EvaluateResponse, RgbD, Vec3d, BSDF};

/// Diffuse reflection below the specular layer. Rough diffuse surfaces like clay or the moon get
/// brighter towards the light direction, which the Oren-Nayar model accounts for.
#[derive(Copy, Clone, Debug)]
pub struct Diffuse {
    /// Every component should be in \[0,1\] to preserve physical validity.
    pub color: RgbD,

    pub model: DiffuseModel,

    /// Oren-Nayar roughness, standard deviation of the facet angles in radians
    pub sigma: f64,
}

impl Diffuse {
    /// Qualitative model from "Generalization of Lambert's reflectance model", Oren and Nayar 1994
    fn oren_nayar(&self, omega_o: Vec3d, omega_i: Vec3d) -> f64 {
        let sigma2 = self.sigma * self.sigma;
        let a = 1.0 - 0.5 * sigma2 / (sigma2 + 0.33);
        let b = 0.45 * sigma2 / (sigma2 + 0.09);

        let sin_theta_o = (1.0 - omega_o.z * omega_o.z).max(0.0).sqrt();
        let sin_theta_i = (1.0 - omega_i.z * omega_i.z).max(0.0).sqrt();

        let max_cos = if sin_theta_o > 1e-4 && sin_theta_i > 1e-4 {
            #[allow(clippy::suboptimal_flops)]
            let cos_phi_diff =
                (omega_o.x * omega_i.x + omega_o.y * omega_i.y) / (sin_theta_o * sin_theta_i);
            cos_phi_diff.max(0.0)
        } else {
            0.0
        };

        // alpha is the larger angle, beta the smaller one
        let (sin_alpha, tan_beta) = if omega_i.z.abs() > omega_o.z.abs() {
            (sin_theta_o, sin_theta_i / omega_i.z.abs())
        } else {
            (sin_theta_i, sin_theta_o / omega_o.z.abs().max(1e-8))
        };

        #[allow(clippy::suboptimal_flops)]
        {
            a + b * max_cos * sin_alpha * tan_beta
        }
    }
}

impl BSDF for Diffuse {
    fn sample_direction(&self, omega_o: Vec3d, rdf: Vec3d) -> Vec3d {
        utils::sample_diffuse_lobe(omega_o, rdf.x, rdf.y).0
    }

    fn evaluate(&self, omega_o: Vec3d, omega_i: Vec3d) -> EvaluateResponse {
        if omega_o.z <= 0.0 || omega_i.z <= 0.0 {
            return EvaluateResponse::ZERO;
        }
        let factor = match self.model {
            DiffuseModel::Lambertian => 1.0,
            DiffuseModel::OrenNayar => self.oren_nayar(omega_o, omega_i),
        };
        EvaluateResponse {
            bsdf: self.color * (factor / consts::PI),
            pdf: utils::sample_diffuse_lobe_pdf(omega_o, omega_i),
        }
    }
}
