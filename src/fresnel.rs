//! Fresnel terms for dielectric interfaces, conductors and thin films

use crate::{
    utils::{self, FloatExt, VecExt},
    RgbD,
};
use std::f64::consts;

/// Unpolarized fresnel reflectance of a dielectric interface.
///
/// `relative_eta` is `eta_t / eta_i`. Returns `1.0` on total internal reflection.
#[must_use]
pub fn full_fresnel_dielectric(cos_theta_i: f64, relative_eta: f64) -> f64 {
    let cos_theta_i = cos_theta_i.abs().min(1.0);
    let sin_theta_t2 = (1.0 - cos_theta_i.sq()) / relative_eta.sq();
    if sin_theta_t2 >= 1.0 {
        // total internal reflection
        return 1.0;
    }
    let cos_theta_t = (1.0 - sin_theta_t2).sqrt();

    #[allow(clippy::suboptimal_flops)]
    let r_parallel = (relative_eta * cos_theta_i - cos_theta_t)
        / (relative_eta * cos_theta_i + cos_theta_t);
    #[allow(clippy::suboptimal_flops)]
    let r_perpendicular = (cos_theta_i - relative_eta * cos_theta_t)
        / (cos_theta_i + relative_eta * cos_theta_t);

    0.5 * (r_parallel.sq() + r_perpendicular.sq())
}

/// Same as [`full_fresnel_dielectric`] but with both indices of refraction given
#[must_use]
pub fn fresnel_dielectric(cos_theta_i: f64, eta_i: f64, eta_t: f64) -> f64 {
    full_fresnel_dielectric(cos_theta_i, eta_t / eta_i)
}

/// Cosine weighted average of the dielectric fresnel over the hemisphere:
/// `2 * integral F(mu) mu dmu`
#[must_use]
pub fn fresnel_hemispherical_albedo(relative_eta: f64) -> f64 {
    const STEPS: usize = 64;
    let mut sum = 0.0;
    for i in 0..STEPS {
        let mu = (i as f64 + 0.5) / STEPS as f64;
        sum += full_fresnel_dielectric(mu, relative_eta) * mu;
    }
    2.0 * sum / STEPS as f64
}

/// Reflectance at normal incidence
#[must_use]
pub fn f0_from_ior(eta_t: f64, eta_i: f64) -> f64 {
    ((eta_t - eta_i) / (eta_t + eta_i)).sq()
}

/// Inverse of [`f0_from_ior`] against vacuum
#[must_use]
pub fn ior_from_f0(f0: RgbD) -> RgbD {
    let sqrt_f0 = f0.clamp(RgbD::ZERO, RgbD::splat(0.9999)).sqrt();
    (RgbD::ONE + sqrt_f0) / (RgbD::ONE - sqrt_f0)
}

/// The F82-tint conductor fresnel model of the Adobe Standard Material.
///
/// `f82_tint` scales the reflectance at the angle where conductors have their characteristic
/// dip (about 82 degrees). A white tint reduces the model to Schlick's approximation.
#[must_use]
pub fn adobe_f82_tint(
    f0: RgbD,
    f82_tint: RgbD,
    f90: RgbD,
    falloff_exponent: f64,
    cos_theta: f64,
) -> RgbD {
    const MU_BAR: f64 = 1.0 / 7.0;
    let schlick = |mu: f64| f0 + (f90 - f0) * (1.0 - mu).powf(falloff_exponent);

    let mu = cos_theta.clamp(0.0, 1.0);
    let b = schlick(MU_BAR) * (RgbD::ONE - f82_tint)
        / (MU_BAR * (1.0 - MU_BAR).powi(6));

    (schlick(mu) - b * (mu * (1.0 - mu).powi(6))).clamp(RgbD::ZERO, RgbD::ONE)
}

/// A thin dielectric film on top of a substrate. Light bouncing inside the film interferes
/// with itself and gives the iridescent look of soap bubbles or oil on water.
#[derive(Clone, Copy, Debug)]
pub struct ThinFilm {
    /// index of refraction of the film
    pub ior: f64,

    /// thickness of the film in nanometers
    pub thickness: f64,
}

impl ThinFilm {
    const WAVELENGTHS: [[f64; 3]; 3] = [
        [610.0, 650.0, 690.0],
        [510.0, 545.0, 580.0],
        [430.0, 460.0, 490.0],
    ];

    /// Airy reflectance of the film for the red, green and blue wavelengths.
    ///
    /// * `outside_ior` - ior of the medium above the film
    /// * `substrate_ior` - per channel ior of the material below the film
    /// * `cos_theta` - cosine between the incident direction and the (micro) normal
    #[must_use]
    pub fn reflectance(&self, outside_ior: f64, substrate_ior: RgbD, cos_theta: f64) -> RgbD {
        let n1 = outside_ior;
        // a vanishing film has to fade into the outside medium
        let n2 = outside_ior.lerp(self.ior, utils::smoothstep(0.0, 30.0, self.thickness));

        let cos1 = cos_theta.abs().min(1.0);
        let sin1_sq = 1.0 - cos1.sq();
        let sin2_sq = (n1 / n2).sq() * sin1_sq;
        if sin2_sq >= 1.0 {
            return RgbD::ONE;
        }
        let cos2 = (1.0 - sin2_sq).sqrt();

        let channel = |n3: f64, wavelengths: [f64; 3]| {
            let cos3 = (1.0 - (n1 / n3).sq() * sin1_sq).max(0.0).sqrt();

            #[allow(clippy::suboptimal_flops)]
            let r12_s = (n1 * cos1 - n2 * cos2) / (n1 * cos1 + n2 * cos2);
            #[allow(clippy::suboptimal_flops)]
            let r23_s = (n2 * cos2 - n3 * cos3) / (n2 * cos2 + n3 * cos3);
            #[allow(clippy::suboptimal_flops)]
            let r12_p = (n2 * cos1 - n1 * cos2) / (n2 * cos1 + n1 * cos2);
            #[allow(clippy::suboptimal_flops)]
            let r23_p = (n3 * cos2 - n2 * cos3) / (n3 * cos2 + n2 * cos3);

            let mut sum = 0.0;
            for wavelength in wavelengths {
                let phase = 4.0 * consts::PI * n2 * self.thickness * cos2 / wavelength;
                sum += 0.5 * (airy(r12_s, r23_s, phase) + airy(r12_p, r23_p, phase));
            }
            (sum / wavelengths.len() as f64).clamp(0.0, 1.0)
        };

        RgbD::new(
            channel(substrate_ior.x, Self::WAVELENGTHS[0]),
            channel(substrate_ior.y, Self::WAVELENGTHS[1]),
            channel(substrate_ior.z, Self::WAVELENGTHS[2]),
        )
    }
}

/// reflectance of a single non absorbing film given the amplitude coefficients of both interfaces
fn airy(r12: f64, r23: f64, phase: f64) -> f64 {
    let cross = 2.0 * r12 * r23 * phase.cos();
    #[allow(clippy::suboptimal_flops)]
    let nume = r12.sq() + r23.sq() + cross;
    #[allow(clippy::suboptimal_flops)]
    let denom = 1.0 + r12.sq() * r23.sq() + cross;
    if denom <= 1e-12 {
        1.0
    } else {
        nume / denom
    }
}
