//! Material parameters of the principled BSDF and the read-only table they are stored in

use crate::{
    error::{Error, Result},
    utils::{FloatExt, SafeCast},
    RgbD, RgbF,
};

/// All parameters of a surface. Parameters are stored as [f32]s, lighting is computed in [f64]s.
///
/// Weight-like parameters are in `[0, 1]`. Colors should be in `[0, 1]` too, except for the
/// emission which is unbounded.
///
/// The layering follows the OpenPBR and Adobe Standard Material models. From top to bottom:
/// coat, sheen, metal or glass or glossy base (specular on top of diffuse).
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Material {
    pub base_color: RgbF,
    pub emission: RgbF,

    /// Standard deviation of the microfacet angles of the Oren-Nayar diffuse lobe, in radians
    pub oren_nayar_sigma: f32,

    pub metallic: f32,
    /// Perceptual roughness, shared by the metal, specular and glass lobes
    pub roughness: f32,
    pub anisotropy: f32,
    /// Rotation of the anisotropy in `[0, 1]`, mapped to `[0, pi]`
    pub anisotropy_rotation: f32,

    /// Blends the first metal lobe with a second one of roughness [`Material::second_roughness`]
    pub second_roughness_weight: f32,
    pub second_roughness: f32,

    /// Tint of the metal at grazing angles close to 82 degrees. See [`crate::fresnel::adobe_f82_tint`]
    pub metallic_f82: RgbF,
    pub metallic_f90: RgbF,
    pub metallic_f90_falloff_exponent: f32,

    pub specular: f32,
    pub specular_tint: f32,
    pub specular_color: RgbF,
    /// How much the specular layer darkens the diffuse base through internal reflections
    pub specular_darkening: f32,

    pub coat: f32,
    pub coat_medium_absorption: RgbF,
    pub coat_medium_thickness: f32,
    pub coat_roughness: f32,
    pub coat_anisotropy: f32,
    pub coat_anisotropy_rotation: f32,
    pub coat_ior: f32,
    pub coat_darkening: f32,

    pub sheen: f32,
    pub sheen_roughness: f32,
    pub sheen_color: RgbF,

    pub ior: f32,
    pub specular_transmission: f32,
    /// Distance at which the transmitted light has the color [`Material::absorption_color`]
    pub absorption_at_distance: f32,
    pub absorption_color: RgbF,

    pub dispersion_scale: f32,
    pub dispersion_abbe_number: f32,

    /// Thin walled objects have no inside. Light leaves them right after entering.
    pub thin_walled: bool,

    pub thin_film: f32,
    pub thin_film_ior: f32,
    /// in nanometers
    pub thin_film_thickness: f32,

    /// Priority of the dielectric when volumes overlap. Higher priorities win.
    pub dielectric_priority: u16,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: RgbF::ONE,
            emission: RgbF::ZERO,
            oren_nayar_sigma: 0.349_065_85,
            metallic: 0.0,
            roughness: 0.3,
            anisotropy: 0.0,
            anisotropy_rotation: 0.0,
            second_roughness_weight: 0.0,
            second_roughness: 0.5,
            metallic_f82: RgbF::ONE,
            metallic_f90: RgbF::ONE,
            metallic_f90_falloff_exponent: 5.0,
            specular: 1.0,
            specular_tint: 1.0,
            specular_color: RgbF::ONE,
            specular_darkening: 1.0,
            coat: 0.0,
            coat_medium_absorption: RgbF::ONE,
            coat_medium_thickness: 0.0,
            coat_roughness: 0.0,
            coat_anisotropy: 0.0,
            coat_anisotropy_rotation: 0.0,
            coat_ior: 1.5,
            coat_darkening: 1.0,
            sheen: 0.0,
            sheen_roughness: 0.5,
            sheen_color: RgbF::ONE,
            ior: 1.5,
            specular_transmission: 0.0,
            absorption_at_distance: 1.0,
            absorption_color: RgbF::ONE,
            dispersion_scale: 0.0,
            dispersion_abbe_number: 20.0,
            thin_walled: false,
            thin_film: 0.0,
            thin_film_ior: 1.3,
            thin_film_thickness: 500.0,
            dielectric_priority: 0,
        }
    }
}

impl Material {
    /// A purely diffuse material
    #[must_use]
    pub fn diffuse(base_color: RgbF) -> Self {
        Self {
            base_color,
            specular: 0.0,
            ..Default::default()
        }
    }

    /// A smooth or rough dielectric that lets light through
    #[must_use]
    pub fn glass(ior: f32, roughness: f32) -> Self {
        Self {
            ior,
            roughness,
            specular_transmission: 1.0,
            ..Default::default()
        }
    }

    /// A metal whose reflectance at normal incidence is `base_color`
    #[must_use]
    pub fn metal(base_color: RgbF, roughness: f32) -> Self {
        Self {
            base_color,
            roughness,
            metallic: 1.0,
            ..Default::default()
        }
    }

    /// An emissive material that does not reflect light
    #[must_use]
    pub fn emissive(emission: RgbF) -> Self {
        Self {
            base_color: RgbF::ZERO,
            emission,
            specular: 0.0,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn is_emissive(&self) -> bool {
        self.emission.max_element() > 0.0
    }

    #[must_use]
    pub fn emission(&self) -> RgbD {
        self.emission.safe_cast()
    }

    /// Thin walled materials get smoother as the ior gets closer to 1. Two rough interfaces
    /// close to one another otherwise look much rougher than a single one.
    #[must_use]
    pub fn thin_walled_roughness(&self, relative_eta: f64) -> f64 {
        let roughness = f64::from(self.roughness);
        if self.thin_walled {
            #[allow(clippy::suboptimal_flops)]
            let scale = (0.65 * relative_eta - 0.35).clamp(0.0, 1.0);
            roughness * scale
        } else {
            roughness
        }
    }

    /// Relative ior between the specular layer and whatever is above it. The coat changes the
    /// medium above the specular layer. Inverted below 1 so the specular layer never shows total
    /// internal reflection.
    #[must_use]
    pub fn specular_relative_ior(&self, incident_ior: f64) -> f64 {
        let above = incident_ior.lerp(f64::from(self.coat_ior), f64::from(self.coat));
        let relative_ior = f64::from(self.ior) / above;
        if relative_ior < 1.0 {
            1.0 / relative_ior
        } else {
            relative_ior
        }
    }

    /// Checks every parameter against its valid range. `index` only labels the error.
    ///
    /// # Errors
    /// [`Error::InvalidIor`] for indices of refraction that are not strictly positive and
    /// [`Error::InvalidMaterialParameter`] for every other parameter out of range.
    pub fn validate(&self, index: usize) -> Result<()> {
        let unit = [
            ("metallic", self.metallic),
            ("roughness", self.roughness),
            ("anisotropy", self.anisotropy),
            ("anisotropy_rotation", self.anisotropy_rotation),
            ("second_roughness_weight", self.second_roughness_weight),
            ("second_roughness", self.second_roughness),
            ("specular", self.specular),
            ("specular_tint", self.specular_tint),
            ("specular_darkening", self.specular_darkening),
            ("coat", self.coat),
            ("coat_roughness", self.coat_roughness),
            ("coat_anisotropy", self.coat_anisotropy),
            ("coat_anisotropy_rotation", self.coat_anisotropy_rotation),
            ("coat_darkening", self.coat_darkening),
            ("sheen", self.sheen),
            ("sheen_roughness", self.sheen_roughness),
            ("specular_transmission", self.specular_transmission),
            ("thin_film", self.thin_film),
            ("dispersion_scale", self.dispersion_scale),
        ];
        for (field, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidMaterialParameter {
                    index,
                    field,
                    value,
                });
            }
        }

        let colors = [
            ("base_color", self.base_color),
            ("specular_color", self.specular_color),
            ("sheen_color", self.sheen_color),
            ("absorption_color", self.absorption_color),
            ("coat_medium_absorption", self.coat_medium_absorption),
            ("metallic_f82", self.metallic_f82),
            ("metallic_f90", self.metallic_f90),
        ];
        for (field, color) in colors {
            if color.min_element() < 0.0 || color.max_element() > 1.0 || color.is_nan() {
                return Err(Error::InvalidMaterialParameter {
                    index,
                    field,
                    value: if color.is_nan() {
                        f32::NAN
                    } else if color.min_element() < 0.0 {
                        color.min_element()
                    } else {
                        color.max_element()
                    },
                });
            }
        }

        let positive = [
            ("oren_nayar_sigma", self.oren_nayar_sigma, true),
            ("absorption_at_distance", self.absorption_at_distance, false),
            ("coat_medium_thickness", self.coat_medium_thickness, true),
            ("dispersion_abbe_number", self.dispersion_abbe_number, false),
            ("thin_film_thickness", self.thin_film_thickness, true),
            (
                "metallic_f90_falloff_exponent",
                self.metallic_f90_falloff_exponent,
                false,
            ),
        ];
        for (field, value, zero_allowed) in positive {
            let valid = if zero_allowed { value >= 0.0 } else { value > 0.0 };
            if !valid {
                return Err(Error::InvalidMaterialParameter {
                    index,
                    field,
                    value,
                });
            }
        }
        if self.emission.min_element() < 0.0 || self.emission.is_nan() {
            return Err(Error::InvalidMaterialParameter {
                index,
                field: "emission",
                value: self.emission.min_element(),
            });
        }

        for (field, value) in [
            ("ior", self.ior),
            ("coat_ior", self.coat_ior),
            ("thin_film_ior", self.thin_film_ior),
        ] {
            // also rejects NaN
            if !(value > 0.0) {
                return Err(Error::InvalidIor {
                    index,
                    field,
                    value,
                });
            }
        }
        Ok(())
    }
}

/// Immutable list of all materials of a scene. Indices into this table identify volumes on
/// the interior stack.
#[derive(Clone, Debug, Default)]
pub struct MaterialTable {
    materials: Vec<Material>,
}

impl MaterialTable {
    /// Validates every material before building the table
    ///
    /// # Errors
    /// The first error of [`Material::validate`]
    pub fn new(materials: Vec<Material>) -> Result<Self> {
        for (index, material) in materials.iter().enumerate() {
            material.validate(index)?;
        }
        tracing::debug!(count = materials.len(), "material table built");
        Ok(Self { materials })
    }

    #[must_use]
    pub fn get(&self, index: u32) -> Option<&Material> {
        self.materials.get(index as usize)
    }

    /// Index of refraction of a volume. `None` is the vacuum around every object.
    #[must_use]
    pub fn ior(&self, index: Option<u32>) -> f64 {
        index
            .and_then(|index| self.get(index))
            .map_or(1.0, |material| f64::from(material.ior))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.materials.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.materials.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Material> {
        self.materials.iter()
    }
}
