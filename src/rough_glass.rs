//! [BSDF] that resembles the appearance of glass. Roughness can be adjusted
use crate::{
    fresnel::{self, ThinFilm},
    ggx::GGX,
    utils::{self, FloatExt, VecExt},
    EvaluateResponse, RgbD, Vec3d, BSDF,
};

/// A [BSDF] that resembles the appearance of Glass.
///
/// The view direction is always above the surface, the volume the ray is in is described by
/// [`RoughGlass::relative_eta`]. Inside of an object the normal is flipped before evaluation and
/// `relative_eta` is below one.
///
/// * Bruce Walter, Stephen R. Marschner, Hongsong Li, and Kenneth E. Torrance. Microfacet models for refraction through rough surfaces. 2007.
#[derive(Clone, Copy, Debug)]
pub struct RoughGlass {
    /// directional roughness values
    pub ggx: GGX,

    /// tint of the transmitted light, applied twice for thin walled glass
    pub base_color: RgbD,

    /// `eta_t / eta_i`, must not be exactly `1.0`
    pub relative_eta: f64,

    /// Thin walled glass refracts without bending the light. It represents both interfaces of a
    /// thin sheet at once.
    pub thin_walled: bool,

    /// blend between the dielectric fresnel and the thin film
    pub thin_film: f64,
    pub thin_film_layer: ThinFilm,

    /// ior of the medium the view direction is in
    pub incident_ior: f64,

    /// Directional albedo of the lobe from the current view. Dividing by it brings back the
    /// energy lost by single scattering.
    pub compensation: f64,

    /// Beer-Lambert transmittance of the volume the ray leaves when refracting
    pub absorption: RgbD,
}

impl RoughGlass {
    /// A plain glass interface
    #[must_use]
    pub fn new(ggx: GGX, relative_eta: f64) -> Self {
        Self {
            ggx,
            base_color: RgbD::ONE,
            relative_eta,
            thin_walled: false,
            thin_film: 0.0,
            thin_film_layer: ThinFilm {
                ior: 1.0,
                thickness: 0.0,
            },
            incident_ior: 1.0,
            compensation: 1.0,
            absorption: RgbD::ONE,
        }
    }

    fn fresnel(&self, cos_theta: f64) -> RgbD {
        let dielectric = if self.thin_film < 1.0 {
            RgbD::splat(fresnel::full_fresnel_dielectric(cos_theta, self.relative_eta))
        } else {
            RgbD::ZERO
        };
        let film = if self.thin_film > 0.0 {
            self.thin_film_layer.reflectance(
                self.incident_ior,
                RgbD::splat(self.incident_ior * self.relative_eta),
                cos_theta,
            )
        } else {
            RgbD::ZERO
        };
        dielectric.lerp(film, self.thin_film)
    }

    /// Probability of sampling the reflection
    fn reflect_probability(&self, fresnel: RgbD) -> f64 {
        let mut probability = fresnel.luminance().clamp(0.0, 1.0);
        if probability < 1.0
            && self.thin_film == 0.0
            && self.thin_walled
            && self.ggx.alpha_x.max(self.ggx.alpha_y) < 0.01
        {
            // light bouncing back and forth inside of a smooth thin sheet
            probability +=
                (1.0 - probability).sq() * probability / (1.0 - probability.sq());
        }
        probability
    }

    fn eval_get_pdf_reflect(&self, omega_o: Vec3d, omega_i: Vec3d, fresnel: RgbD, p: f64) -> EvaluateResponse {
        let response = self.ggx.torrance_sparrow(omega_o, omega_i, fresnel);
        EvaluateResponse {
            bsdf: response.bsdf / self.compensation,
            pdf: response.pdf * p,
        }
    }

    fn eval_get_pdf_thin_transmission(
        &self,
        omega_o: Vec3d,
        mirrored_omega_i: Vec3d,
        fresnel: RgbD,
        p: f64,
    ) -> EvaluateResponse {
        let response =
            self.ggx
                .torrance_sparrow(omega_o, mirrored_omega_i, RgbD::ONE - fresnel);
        EvaluateResponse {
            bsdf: response.bsdf * self.base_color.sq() / self.compensation,
            pdf: response.pdf * (1.0 - p),
        }
    }

    fn eval_get_pdf_refract(
        &self,
        omega_o: Vec3d,
        omega_i: Vec3d,
        m: Vec3d,
        fresnel: RgbD,
        p: f64,
    ) -> EvaluateResponse {
        let h_dot_i = omega_i.dot(m);
        let h_dot_o = omega_o.dot(m);
        let dot = h_dot_i + h_dot_o / self.relative_eta;
        let dot2 = dot.sq();
        if dot2 < 1e-16 {
            return EvaluateResponse::ZERO;
        }

        let d = self.ggx.ndf(m);
        let g1_o = self.ggx.g1_smith(omega_o);
        let g1_i = self.ggx.g1_smith(omega_i);

        let jacobian = h_dot_i.abs() / dot2;
        let pdf = jacobian * g1_o / omega_o.z.abs() * d * h_dot_o.abs() * (1.0 - p);

        let bsdf = self.base_color * (RgbD::ONE - fresnel)
            * (d * g1_o * g1_i * (h_dot_i * h_dot_o / (dot2 * omega_i.z * omega_o.z)).abs())
            * self.absorption
            / self.compensation;

        EvaluateResponse { bsdf, pdf }
    }
}

impl BSDF for RoughGlass {
    fn sample_direction(&self, omega_o: Vec3d, rdf: Vec3d) -> Vec3d {
        let m = self.ggx.sample_vndf(omega_o, rdf.x, rdf.y);
        let fresnel = self.fresnel(omega_o.dot(m));
        let p = self.reflect_probability(fresnel);

        let reflected = utils::reflect(m, omega_o);
        if rdf.z < p {
            reflected
        } else if self.thin_walled {
            Vec3d::new(reflected.x, reflected.y, -reflected.z)
        } else {
            // total internal reflection falls back to the reflection
            utils::refract_good(omega_o, m, 1.0, self.relative_eta)
                .and_then(Vec3d::try_normalize)
                .unwrap_or(reflected)
        }
    }

    fn evaluate(&self, omega_o: Vec3d, omega_i: Vec3d) -> EvaluateResponse {
        if omega_o.z <= 0.0 || omega_i.z.abs() < 1e-8 {
            return EvaluateResponse::ZERO;
        }

        let reflecting = omega_i.z > 0.0;
        let thin_transmission = !reflecting && self.thin_walled;
        let effective_omega_i = if thin_transmission {
            Vec3d::new(omega_i.x, omega_i.y, -omega_i.z)
        } else {
            omega_i
        };

        // generalized half vector
        let half = if reflecting || thin_transmission {
            effective_omega_i + omega_o
        } else {
            omega_i * self.relative_eta + omega_o
        };
        let Some(mut m) = half.try_normalize() else {
            return EvaluateResponse::ZERO;
        };
        if m.z < 0.0 {
            m = -m;
        }

        let h_dot_i = effective_omega_i.dot(m);
        let h_dot_o = omega_o.dot(m);
        if h_dot_i * effective_omega_i.z < 0.0 || h_dot_o * omega_o.z < 0.0 {
            // backfacing microfacet
            return EvaluateResponse::ZERO;
        }

        let fresnel = self.fresnel(h_dot_o);
        let p = self.reflect_probability(fresnel);

        if reflecting {
            self.eval_get_pdf_reflect(omega_o, omega_i, fresnel, p)
        } else if thin_transmission {
            self.eval_get_pdf_thin_transmission(omega_o, effective_omega_i, fresnel, p)
        } else {
            self.eval_get_pdf_refract(omega_o, omega_i, m, fresnel, p)
        }
    }
}
