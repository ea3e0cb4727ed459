//! Options of the principled BSDF that are fixed for a whole render

/// Model used by the diffuse lobe of the glossy base
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiffuseModel {
    Lambertian,
    /// Qualitative Oren-Nayar with [`crate::material::Material::oren_nayar_sigma`]
    #[default]
    OrenNayar,
}

/// Switches for the approximations and compensations of [`crate::principled::PrincipledBsdf`].
///
/// The compensations only take effect if the matching lookup table is present in
/// [`crate::energy_compensation::EnergyCompensation`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct BsdfConfig {
    pub diffuse_model: DiffuseModel,

    /// Brings back the energy single scattering GGX loses on rough metals
    pub ggx_multiple_scattering: bool,

    /// Same for the reflection and refraction of rough glass
    pub glass_energy_compensation: bool,

    /// Energy compensation of the specular layer on top of the diffuse base
    pub glossy_base_energy_compensation: bool,

    /// Energy compensation of the whole material below the coat
    pub clearcoat_energy_compensation: bool,
}

impl Default for BsdfConfig {
    fn default() -> Self {
        Self {
            diffuse_model: DiffuseModel::OrenNayar,
            ggx_multiple_scattering: true,
            glass_energy_compensation: true,
            glossy_base_energy_compensation: true,
            clearcoat_energy_compensation: false,
        }
    }
}
