//! [BSDF] that resembles the appearance of metals
use crate::{
    fresnel::{self, ThinFilm},
    ggx::GGX,
    EvaluateResponse, RgbD, Vec3d, BSDF,
};

/// [BSDF] that resembles the appearance of metals.
///
/// The fresnel term is the F82-tint model of the Adobe Standard Material, optionally blended with
/// a thin-film interference layer on top of the metal.
#[derive(Clone, Copy, Debug)]
pub struct Conductive {
    /// The scattering parameters, contains the directional roughness parameters
    pub ggx: GGX,

    /// The `F0` color of the metal
    pub color: RgbD,

    /// reflectance tint at roughly 82 degrees
    pub f82_tint: RgbD,

    /// reflectance at grazing angles
    pub f90: RgbD,

    /// exponent of the falloff from `F0` to `F90`. Schlick's approximation uses `5.0`
    pub f90_falloff_exponent: f64,

    /// blend between the metal fresnel and the thin film
    pub thin_film: f64,
    pub thin_film_layer: ThinFilm,

    /// ior of the medium above the metal, only used by the thin film
    pub outside_ior: f64,

    /// Directional albedo of a white single scattering GGX lobe seen from the current view.
    /// When present, the energy lost by single scattering is added back.
    pub directional_albedo: Option<f64>,
}

impl Conductive {
    /// A plain Schlick metal without thin film and without multiple scattering
    #[must_use]
    pub fn new(ggx: GGX, color: RgbD) -> Self {
        Self {
            ggx,
            color,
            f82_tint: RgbD::ONE,
            f90: RgbD::ONE,
            f90_falloff_exponent: 5.0,
            thin_film: 0.0,
            thin_film_layer: ThinFilm {
                ior: 1.0,
                thickness: 0.0,
            },
            outside_ior: 1.0,
            directional_albedo: None,
        }
    }

    fn fresnel(&self, cos_theta: f64) -> RgbD {
        let metal = if self.thin_film < 1.0 {
            fresnel::adobe_f82_tint(
                self.color,
                self.f82_tint,
                self.f90,
                self.f90_falloff_exponent,
                cos_theta,
            )
        } else {
            RgbD::ZERO
        };
        let film = if self.thin_film > 0.0 {
            self.thin_film_layer.reflectance(
                self.outside_ior,
                fresnel::ior_from_f0(self.color),
                cos_theta,
            )
        } else {
            RgbD::ZERO
        };
        metal.lerp(film, self.thin_film)
    }

    /// Multiple scattering compensation after Turquin, "Practical multiple scattering
    /// compensation for microfacet models", 2019
    fn multiple_scattering(&self) -> RgbD {
        match self.directional_albedo {
            Some(albedo) if albedo > 1e-3 => {
                RgbD::ONE + self.color * ((1.0 - albedo) / albedo)
            }
            _ => RgbD::ONE,
        }
    }
}

impl BSDF for Conductive {
    fn sample_direction(&self, omega_o: Vec3d, rdf: Vec3d) -> Vec3d {
        self.ggx.sample_reflection(omega_o, rdf.x, rdf.y)
    }

    fn evaluate(&self, omega_o: Vec3d, omega_i: Vec3d) -> EvaluateResponse {
        // allow opposite sides, so that we do not lie about the pdf
        let Some(m) = (omega_o + omega_i).try_normalize() else {
            return EvaluateResponse::ZERO;
        };
        let fresnel = self.fresnel(omega_i.dot(m));
        let response = self.ggx.torrance_sparrow(omega_o, omega_i, fresnel);
        EvaluateResponse {
            bsdf: response.bsdf * self.multiple_scattering(),
            pdf: response.pdf,
        }
    }
}
