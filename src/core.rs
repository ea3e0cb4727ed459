/// used for colors
pub type RgbD = glam::f64::DVec3;
/// used for colors
pub type RgbF = glam::f32::Vec3;

/// used for direction vectors
pub type Vec3d = glam::f64::DVec3;
/// used for direction vectors
pub type Vec2d = glam::f64::DVec2;

/// Contains the Data that is returned by [`BSDF::evaluate`]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EvaluateResponse {
    /// The value of the BSDF. Indicates how much light is scattered from the incoming
    /// direction to the outgoing direction. The cosine term is not included.
    pub bsdf: RgbD,

    /// The probability density of sampling the incoming direction given the outgoing direction
    pub pdf: f64,
}

impl EvaluateResponse {
    pub const ZERO: Self = Self {
        bsdf: RgbD::ZERO,
        pdf: 0.0,
    };
}

/// Contains the Data that is returned by [`BSDF::sample_incoming`]
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SampleIncomingResponse {
    /// # Incoming Direction
    ///The direction where light could be arriving at the surface
    pub omega_i: Vec3d,

    /// The value at for the BSDF. Indicates how much light is scattered from the incoming
    /// direction to the outgoing direction
    pub bsdf: RgbD,

    /// The probability distribution for choosing `omega_i` given `omega_o`
    pub pdf: f64,
}

/// Bidirectional Scattering Distribution Functions. Every lobe of the layered
/// [`crate::principled::PrincipledBsdf`] implements this trait.
///
/// All directions are given in the local shading frame of the lobe, the z-axis being the normal.
/// Both directions point away from the surface.
pub trait BSDF {
    /// Given a direction where light is scattered to, samples an incident direction, from which the light
    /// may come from
    ///
    /// # Arguments
    /// * `omega_o` - The direction where light is scattered to. Outgoing direction
    /// * `rdf` - Three uniformly distributed random numbers in `0.0..1.0`
    fn sample_direction(&self, omega_o: Vec3d, rdf: Vec3d) -> Vec3d;

    /// Returns the value of the BSDF at the given directions together with the probability
    /// density of [`BSDF::sample_direction`] producing `omega_i`
    ///
    /// # Arguments
    /// * `omega_o` - Exitant light direction
    /// * `omega_i` - Incident light direction
    fn evaluate(&self, omega_o: Vec3d, omega_i: Vec3d) -> EvaluateResponse;

    /// Samples an incident direction and evaluates the BSDF for it.
    /// See [`SampleIncomingResponse`]
    fn sample_incoming(&self, omega_o: Vec3d, rdf: Vec3d) -> SampleIncomingResponse {
        let omega_i = self.sample_direction(omega_o, rdf);
        let EvaluateResponse { bsdf, pdf } = self.evaluate(omega_o, omega_i);
        SampleIncomingResponse { omega_i, bsdf, pdf }
    }
}
