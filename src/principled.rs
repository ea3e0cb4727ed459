//! The layered principled BSDF.
//!
//! From top to bottom a surface is made of a coat, a sheen layer and then either a metal, a glass
//! or a glossy base (a specular layer on top of a diffuse base). The layers are blended with the
//! weights of the [`Material`]. Light that goes through a dielectric layer is attenuated by the
//! Fresnel transmission in both directions before it reaches the layers below.
//!
//! Unlike the lobes, [`PrincipledBsdf`] works with world space directions. It needs the volume
//! state of the ray to know the indices of refraction on both sides of the surface.
//!
//! * Andrea Weidlich and Alexander Wilkie. Arbitrarily layered micro-facet surfaces. 2007.
//! * OpenPBR Surface specification, Academy Software Foundation, 2024.
//! * Alan Kutz, Milos Hasan and Paul Edmondson. Novel aspects of the Adobe Standard Material. 2023.
//! * Christopher Kulla and Alejandro Conty. Revisiting physically based shading at Imageworks. 2017.
//! * Eric Heitz. Microfacet-based normal mapping for robust Monte Carlo path tracing. 2017.

use crate::{
    conductive::Conductive,
    config::BsdfConfig,
    diffuse::Diffuse,
    dispersion,
    energy_compensation::EnergyCompensation,
    frame::Frame,
    fresnel::{self, ThinFilm},
    ggx::GGX,
    material::{Material, MaterialTable},
    random::RandomStream,
    rough_glass::RoughGlass,
    sheen::Sheen,
    utils::{self, FloatExt, SafeCast, VecExt},
    volume::{beer_lambert, RayVolumeState, ScatterEvent},
    EvaluateResponse, RgbD, Vec3d, BSDF,
};
use std::f64::consts;

/// The lobes of the principled BSDF, outermost first
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lobe {
    Coat,
    Sheen,
    Metal,
    /// metal lobe with [`Material::second_roughness`]
    SecondMetal,
    Specular,
    Diffuse,
    Glass,
}

impl Lobe {
    pub const ALL: [Self; 7] = [
        Self::Coat,
        Self::Sheen,
        Self::Metal,
        Self::SecondMetal,
        Self::Specular,
        Self::Diffuse,
        Self::Glass,
    ];
}

/// Linear blending weights of the lobes. Normalized, they are the probabilities of sampling
/// each lobe.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct LobeWeights {
    pub coat: f64,
    pub sheen: f64,
    pub metal: f64,
    pub second_metal: f64,
    pub specular: f64,
    pub diffuse: f64,
    pub glass: f64,
}

impl LobeWeights {
    /// Inside of an object only the glass lobe exists
    #[must_use]
    pub fn new(material: &Material, outside: bool) -> Self {
        let outside_factor = if outside { 1.0 } else { 0.0 };
        let metallic = f64::from(material.metallic);
        let transmission = f64::from(material.specular_transmission);
        let second_roughness_weight = f64::from(material.second_roughness_weight);
        let dielectric = (1.0 - metallic) * (1.0 - transmission) * outside_factor;

        Self {
            coat: f64::from(material.coat) * outside_factor,
            sheen: f64::from(material.sheen) * outside_factor,
            metal: metallic * (1.0 - second_roughness_weight) * outside_factor,
            second_metal: metallic * second_roughness_weight * outside_factor,
            specular: dielectric * f64::from(material.specular),
            diffuse: dielectric,
            glass: if outside {
                (1.0 - metallic) * transmission
            } else {
                1.0
            },
        }
    }

    #[must_use]
    pub const fn get(&self, lobe: Lobe) -> f64 {
        match lobe {
            Lobe::Coat => self.coat,
            Lobe::Sheen => self.sheen,
            Lobe::Metal => self.metal,
            Lobe::SecondMetal => self.second_metal,
            Lobe::Specular => self.specular,
            Lobe::Diffuse => self.diffuse,
            Lobe::Glass => self.glass,
        }
    }

    fn total(&self) -> f64 {
        Lobe::ALL.iter().map(|lobe| self.get(*lobe)).sum()
    }

    /// Probability of [`PrincipledBsdf::sample`] picking `lobe`
    #[must_use]
    pub fn probability(&self, lobe: Lobe) -> f64 {
        let total = self.total();
        if total > 0.0 {
            self.get(lobe) / total
        } else {
            0.0
        }
    }

    /// Walks the CDF of the lobe probabilities. The glass lobe takes whatever is left.
    #[must_use]
    pub fn pick(&self, u: f64) -> Lobe {
        let total = self.total();
        let mut cdf = 0.0;
        for lobe in Lobe::ALL {
            cdf += self.get(lobe);
            if self.get(lobe) > 0.0 && u * total < cdf {
                return lobe;
            }
        }
        Lobe::Glass
    }
}

/// Result of [`PrincipledBsdf::sample`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PrincipledSample {
    /// world space direction the light comes from
    pub direction: Vec3d,
    pub bsdf: RgbD,
    /// `0.0` if the sample has to be discarded
    pub pdf: f64,
    pub event: ScatterEvent,
}

/// GGX reflection off a dielectric interface. Used by the coat and the specular layer, the light
/// they transmit is accounted for by the layers below.
#[derive(Clone, Copy, Debug)]
struct DielectricReflection {
    ggx: GGX,
    relative_eta: f64,
    thin_film: f64,
    thin_film_layer: ThinFilm,
    outside_ior: f64,
}

impl DielectricReflection {
    fn fresnel(&self, cos_theta: f64) -> RgbD {
        let dielectric = if self.thin_film < 1.0 {
            RgbD::splat(fresnel::full_fresnel_dielectric(cos_theta, self.relative_eta))
        } else {
            RgbD::ZERO
        };
        let film = if self.thin_film > 0.0 {
            self.thin_film_layer.reflectance(
                self.outside_ior,
                RgbD::splat(self.outside_ior * self.relative_eta),
                cos_theta,
            )
        } else {
            RgbD::ZERO
        };
        dielectric.lerp(film, self.thin_film)
    }
}

impl BSDF for DielectricReflection {
    fn sample_direction(&self, omega_o: Vec3d, rdf: Vec3d) -> Vec3d {
        self.ggx.sample_reflection(omega_o, rdf.x, rdf.y)
    }

    fn evaluate(&self, omega_o: Vec3d, omega_i: Vec3d) -> EvaluateResponse {
        let Some(m) = (omega_o + omega_i).try_normalize() else {
            return EvaluateResponse::ZERO;
        };
        let fresnel = self.fresnel(omega_i.dot(m).clamp(1e-8, 1.0));
        self.ggx.torrance_sparrow(omega_o, omega_i, fresnel)
    }
}

/// Evaluates and samples [`Material`]s. Cheap to create, it only borrows the data shared by every
/// shading point of a render.
#[derive(Clone, Copy, Debug)]
pub struct PrincipledBsdf<'a> {
    pub config: &'a BsdfConfig,
    pub materials: &'a MaterialTable,
    pub compensation: &'a EnergyCompensation,
}

impl<'a> PrincipledBsdf<'a> {
    #[must_use]
    pub const fn new(
        config: &'a BsdfConfig,
        materials: &'a MaterialTable,
        compensation: &'a EnergyCompensation,
    ) -> Self {
        Self {
            config,
            materials,
            compensation,
        }
    }

    /// Evaluates the BSDF for light arriving from `light` and leaving towards `view`. The cosine
    /// term is not included.
    ///
    /// The surface is seen from inside of its object if `view` is below `shading_normal`, only the
    /// glass lobe exists there. Thin walled materials are always seen from outside.
    #[must_use]
    pub fn eval(
        &self,
        material: &Material,
        volume: &RayVolumeState,
        view: Vec3d,
        shading_normal: Vec3d,
        light: Vec3d,
    ) -> EvaluateResponse {
        let view_above = view.dot(shading_normal) > 0.0;
        let outside = view_above || material.thin_walled;
        let normal = if view_above {
            shading_normal
        } else {
            -shading_normal
        };
        self.eval_oriented(material, volume, view, normal, light, outside)
    }

    /// Samples a direction the light could come from and evaluates the BSDF for it.
    ///
    /// The interior stack of `volume` is updated according to the scattering event, so the ray
    /// can continue in the returned direction.
    pub fn sample<R: RandomStream + ?Sized>(
        &self,
        material: &Material,
        volume: &mut RayVolumeState,
        view: Vec3d,
        shading_normal: Vec3d,
        geometric_normal: Vec3d,
        rng: &mut R,
    ) -> PrincipledSample {
        let mut normal = shading_normal;
        let mut outside = view.dot(shading_normal) > 0.0 || material.thin_walled;
        let glass_weight =
            (1.0 - f64::from(material.metallic)) * f64::from(material.specular_transmission);
        if glass_weight == 0.0 && !outside {
            // an opaque surface seen from below its shading normal, bent by interpolated or
            // mapped normals
            normal = utils::reflect(geometric_normal, shading_normal);
            outside = true;
        }

        let weights = LobeWeights::new(material, outside);
        let lobe = weights.pick(rng.next_f64());
        if lobe == Lobe::Glass
            && view.dot(shading_normal) * view.dot(geometric_normal) < 0.0
        {
            normal = utils::reflect(geometric_normal, shading_normal);
        }
        if view.dot(normal) < 0.0 {
            normal = -normal;
        }

        let rdf = rng.vec3d();
        let incident_ior = volume.incident_ior(self.materials);
        let base_frame = Self::base_frame(material, normal);
        let local_view = base_frame.to_local(view);
        let direction = match lobe {
            Lobe::Coat => {
                let coat_frame = Self::coat_frame(material, normal);
                coat_frame.to_world(
                    Self::coat_lobe(material, incident_ior)
                        .sample_direction(coat_frame.to_local(view), rdf),
                )
            }
            Lobe::Sheen => {
                base_frame.to_world(Self::sheen_lobe(material).sample_direction(local_view, rdf))
            }
            Lobe::Metal | Lobe::SecondMetal => {
                let roughness = if lobe == Lobe::Metal {
                    material.roughness
                } else {
                    material.second_roughness
                };
                let metal =
                    self.metal_lobe(material, f64::from(roughness), incident_ior, local_view.z);
                base_frame.to_world(metal.sample_direction(local_view, rdf))
            }
            Lobe::Specular => base_frame.to_world(
                Self::specular_lobe(material, material.specular_relative_ior(incident_ior))
                    .sample_direction(local_view, rdf),
            ),
            Lobe::Diffuse => {
                base_frame.to_world(self.diffuse_lobe(material).sample_direction(local_view, rdf))
            }
            Lobe::Glass => base_frame.to_world(
                self.glass_lobe(material, volume, local_view.z)
                    .sample_direction(local_view, rdf),
            ),
        };

        let below = direction.dot(normal) < 0.0;
        if below && lobe != Lobe::Glass {
            // only the glass lobe transmits
            volume.apply_scatter(ScatterEvent::Reflection);
            return PrincipledSample {
                direction,
                bsdf: RgbD::ZERO,
                pdf: 0.0,
                event: ScatterEvent::Reflection,
            };
        }

        let EvaluateResponse { bsdf, pdf } =
            self.eval_oriented(material, volume, view, normal, direction, outside);
        let event = if !below {
            ScatterEvent::Reflection
        } else if material.thin_walled {
            ScatterEvent::ThinTransmission
        } else {
            ScatterEvent::Refraction
        };
        volume.apply_scatter(event);

        PrincipledSample {
            direction,
            bsdf,
            pdf,
            event,
        }
    }

    /// `normal` must be on the side of `view`
    fn eval_oriented(
        &self,
        material: &Material,
        volume: &RayVolumeState,
        view: Vec3d,
        normal: Vec3d,
        light: Vec3d,
        outside: bool,
    ) -> EvaluateResponse {
        let weights = LobeWeights::new(material, outside);
        let refracting = outside && light.dot(normal) < 0.0;
        let incident_ior = volume.incident_ior(self.materials);

        let base_frame = Self::base_frame(material, normal);
        let local_view = base_frame.to_local(view);
        let local_light = base_frame.to_local(light);

        let mut throughput = RgbD::ONE;
        let mut bsdf = RgbD::ZERO;
        let mut pdf = 0.0;

        if material.coat > 0.0 && outside {
            if !refracting {
                let coat_frame = Self::coat_frame(material, normal);
                let response = Self::coat_lobe(material, incident_ior)
                    .evaluate(coat_frame.to_local(view), coat_frame.to_local(light));
                bsdf += response.bsdf * weights.coat;
                pdf += response.pdf * weights.probability(Lobe::Coat);
            }
            throughput *=
                Self::coat_attenuation(material, incident_ior, local_view.z, local_light.z);
        }

        if weights.sheen > 0.0 {
            let sheen = Self::sheen_lobe(material);
            let response = sheen.evaluate(local_view, local_light);
            bsdf += response.bsdf * weights.sheen * throughput;
            pdf += response.pdf * weights.probability(Lobe::Sheen);
            throughput *= 1.0 - f64::from(material.sheen) * sheen.albedo(local_view.z);
        }

        if !refracting {
            for (lobe, weight, roughness) in [
                (Lobe::Metal, weights.metal, material.roughness),
                (Lobe::SecondMetal, weights.second_metal, material.second_roughness),
            ] {
                if weight > 0.0 {
                    let metal =
                        self.metal_lobe(material, f64::from(roughness), incident_ior, local_view.z);
                    let response = metal.evaluate(local_view, local_light);
                    bsdf += response.bsdf * weight * throughput;
                    pdf += response.pdf * weights.probability(lobe);
                }
            }
        }

        // next to the glossy base, not below it
        if weights.glass > 0.0 {
            let response = self
                .glass_lobe(material, volume, local_view.z)
                .evaluate(local_view, local_light);
            bsdf += response.bsdf * weights.glass * throughput;
            pdf += response.pdf * weights.probability(Lobe::Glass);
        }

        if !refracting && (weights.specular > 0.0 || weights.diffuse > 0.0) {
            let relative_ior = material.specular_relative_ior(incident_ior);
            let mut glossy_base = RgbD::ZERO;

            if weights.specular > 0.0 {
                let specular = Self::specular_lobe(material, relative_ior);
                let response = specular.evaluate(local_view, local_light);
                pdf += response.pdf * weights.probability(Lobe::Specular);
                if (relative_ior - 1.0).abs() > 1e-3 {
                    let tint = RgbD::ONE.lerp(
                        material.specular_color.safe_cast() * f64::from(material.specular_tint),
                        f64::from(material.specular),
                    );
                    glossy_base += response.bsdf * tint * weights.specular * throughput;
                    throughput *= Self::specular_attenuation(
                        material,
                        &specular,
                        local_view.z,
                        local_light.z,
                    );
                }
            }

            if weights.diffuse > 0.0 {
                let response = self.diffuse_lobe(material).evaluate(local_view, local_light);
                glossy_base += response.bsdf * weights.diffuse * throughput;
                pdf += response.pdf * weights.probability(Lobe::Diffuse);
            }

            if self.config.glossy_base_energy_compensation {
                glossy_base /= self.compensation.glossy_base_albedo(
                    local_view.z,
                    f64::from(material.roughness),
                    relative_ior,
                );
            }
            bsdf += glossy_base;
        }

        if self.config.clearcoat_energy_compensation && weights.coat > 0.0 {
            bsdf /= self.compensation.clearcoat_albedo(
                local_view.z,
                f64::from(material.coat_roughness),
                f64::from(material.coat_ior) / incident_ior,
            );
        }

        if pdf <= 0.0 {
            return EvaluateResponse::ZERO;
        }
        EvaluateResponse { bsdf, pdf }
    }

    fn base_frame(material: &Material, normal: Vec3d) -> Frame {
        Frame::rotated(normal, f64::from(material.anisotropy_rotation) * consts::PI)
    }

    fn coat_frame(material: &Material, normal: Vec3d) -> Frame {
        Frame::rotated(normal, f64::from(material.coat_anisotropy_rotation) * consts::PI)
    }

    fn thin_film_layer(material: &Material) -> ThinFilm {
        ThinFilm {
            ior: f64::from(material.thin_film_ior),
            thickness: f64::from(material.thin_film_thickness),
        }
    }

    fn coat_lobe(material: &Material, incident_ior: f64) -> DielectricReflection {
        DielectricReflection {
            ggx: GGX::from_remapped(
                f64::from(material.coat_roughness),
                f64::from(material.coat_anisotropy),
            ),
            relative_eta: f64::from(material.coat_ior) / incident_ior,
            thin_film: 0.0,
            thin_film_layer: Self::thin_film_layer(material),
            outside_ior: incident_ior,
        }
    }

    fn sheen_lobe(material: &Material) -> Sheen {
        Sheen {
            color: material.sheen_color.safe_cast(),
            roughness: f64::from(material.sheen_roughness),
        }
    }

    fn metal_lobe(
        &self,
        material: &Material,
        roughness: f64,
        incident_ior: f64,
        cos_theta_view: f64,
    ) -> Conductive {
        let mut metal = Conductive::new(
            GGX::from_remapped(roughness, f64::from(material.anisotropy)),
            material.base_color.safe_cast(),
        );
        metal.f82_tint = material.metallic_f82.safe_cast();
        metal.f90 = material.metallic_f90.safe_cast();
        metal.f90_falloff_exponent = f64::from(material.metallic_f90_falloff_exponent);
        metal.thin_film = f64::from(material.thin_film);
        metal.thin_film_layer = Self::thin_film_layer(material);
        metal.outside_ior = incident_ior;
        if self.config.ggx_multiple_scattering {
            metal.directional_albedo = self
                .compensation
                .conductor_albedo(cos_theta_view, roughness);
        }
        metal
    }

    fn specular_lobe(material: &Material, relative_ior: f64) -> DielectricReflection {
        DielectricReflection {
            ggx: GGX::from_remapped(
                f64::from(material.roughness),
                f64::from(material.anisotropy),
            ),
            relative_eta: relative_ior,
            thin_film: f64::from(material.thin_film),
            thin_film_layer: Self::thin_film_layer(material),
            // ior of the layer above the specular layer
            outside_ior: f64::from(material.ior) / relative_ior,
        }
    }

    fn diffuse_lobe(&self, material: &Material) -> Diffuse {
        Diffuse {
            color: material.base_color.safe_cast(),
            model: self.config.diffuse_model,
            sigma: f64::from(material.oren_nayar_sigma),
        }
    }

    fn glass_lobe(
        &self,
        material: &Material,
        volume: &RayVolumeState,
        cos_theta_view: f64,
    ) -> RoughGlass {
        let wavelength = volume.sampled_wavelength.abs();
        let disperse = |ior: f64| {
            dispersion::dispersion_ior(
                f64::from(material.dispersion_abbe_number),
                f64::from(material.dispersion_scale),
                ior,
                wavelength,
            )
        };
        let eta_i = disperse(volume.incident_ior(self.materials));
        let eta_t = disperse(volume.outgoing_ior(self.materials));

        // volumes of the same ior on both sides
        let mut relative_eta = eta_t / eta_i;
        if (relative_eta - 1.0).abs() < 1e-5 {
            relative_eta = 1.0 + 1e-5;
        }

        let roughness = material.thin_walled_roughness(relative_eta);
        let mut glass = RoughGlass::new(
            GGX::from_remapped(roughness, f64::from(material.anisotropy)),
            relative_eta,
        );
        glass.base_color = material.base_color.safe_cast();
        glass.thin_walled = material.thin_walled;
        glass.thin_film = f64::from(material.thin_film);
        glass.thin_film_layer = Self::thin_film_layer(material);
        glass.incident_ior = eta_i;
        if self.config.glass_energy_compensation {
            glass.compensation =
                self.compensation
                    .glass_albedo(cos_theta_view, roughness, relative_eta);
        }
        if !material.thin_walled {
            // absorbed by the volume the ray leaves
            glass.absorption = volume
                .incident_material
                .and_then(|index| self.materials.get(index))
                .map_or(RgbD::ONE, |incident| {
                    beer_lambert(incident, volume.distance_in_volume)
                });
        }
        glass
    }

    /// Light reaching the layers below the coat, and back up towards the viewer
    fn coat_attenuation(
        material: &Material,
        incident_ior: f64,
        cos_theta_view: f64,
        cos_theta_light: f64,
    ) -> RgbD {
        let coat_ior = f64::from(material.coat_ior);
        let relative_eta = coat_ior / incident_ior;

        // shading normal fresnel, lights below the surface are refracted by the glass lobe
        let view_fresnel = fresnel::full_fresnel_dielectric(cos_theta_view.abs(), relative_eta);
        let light_fresnel = fresnel::full_fresnel_dielectric(cos_theta_light.abs(), relative_eta);
        let mut attenuation = RgbD::splat((1.0 - light_fresnel) * (1.0 - view_fresnel));

        let absorption: RgbD = material.coat_medium_absorption.safe_cast();
        if !absorption.is_white() {
            // grazing directions travel further through the coat
            let refracted_cos = |cos: f64| {
                (1.0 - (1.0 - cos.sq()) / coat_ior.sq())
                    .max(0.0)
                    .sqrt()
                    .max(1e-6)
            };
            let distance = 1.0 / refracted_cos(cos_theta_light) + 1.0 / refracted_cos(cos_theta_view);
            let optical_depth = (RgbD::ONE - absorption.sqrt().powf_scalar(distance))
                * f64::from(material.coat_medium_thickness);
            attenuation *= (-optical_depth).exp();
        }

        attenuation *= Self::coat_darkening(material, relative_eta, view_fresnel);
        RgbD::ONE.lerp(attenuation, f64::from(material.coat))
    }

    /// Light trapped below the coat by total internal reflection bounces on the base again and
    /// again, darkening and saturating it
    fn coat_darkening(material: &Material, relative_eta: f64, view_fresnel: f64) -> RgbD {
        if material.coat_darkening == 0.0 {
            return RgbD::ONE;
        }
        // diffuse base and smooth base
        let k_rough = 1.0
            - (1.0 - fresnel::fresnel_hemispherical_albedo(relative_eta)) / relative_eta.sq();
        let k_smooth = view_fresnel;
        let k = k_smooth.lerp(k_rough, f64::from(material.roughness));

        let sheen = f64::from(material.sheen);
        let base_color: RgbD = material.base_color.safe_cast();
        let sheen_color: RgbD = material.sheen_color.safe_cast();
        let base_albedo = (base_color + sheen_color * sheen) / (1.0 + sheen);

        let darkening = RgbD::splat(1.0 - k) / (RgbD::ONE - base_albedo * k).max(RgbD::splat(1e-6));
        RgbD::ONE.lerp(
            darkening,
            f64::from(material.coat) * f64::from(material.coat_darkening),
        )
    }

    /// Light reaching the diffuse base through the specular layer
    fn specular_attenuation(
        material: &Material,
        specular: &DielectricReflection,
        cos_theta_view: f64,
        cos_theta_light: f64,
    ) -> RgbD {
        let view_fresnel = specular.fresnel(cos_theta_view.abs());
        let light_fresnel = specular.fresnel(cos_theta_light.abs());
        let mut attenuation = (RgbD::ONE - light_fresnel) * (RgbD::ONE - view_fresnel);

        if material.specular_darkening != 0.0 {
            // only a diffuse base below the specular layer
            let relative_eta = specular.relative_eta;
            let k = 1.0
                - (1.0 - fresnel::fresnel_hemispherical_albedo(relative_eta)) / relative_eta.sq();
            let base_albedo: RgbD = material.base_color.safe_cast();
            let darkening =
                RgbD::splat(1.0 - k) / (RgbD::ONE - base_albedo * k).max(RgbD::splat(1e-6));
            attenuation *= RgbD::ONE.lerp(
                darkening,
                f64::from(material.specular) * f64::from(material.specular_darkening),
            );
        }

        RgbD::ONE.lerp(attenuation, f64::from(material.specular))
    }
}

#[cfg(test)]
mod tests {
    use super::{Lobe, LobeWeights, PrincipledBsdf};
    use crate::{
        config::{BsdfConfig, DiffuseModel},
        energy_compensation::EnergyCompensation,
        material::{Material, MaterialTable},
        test_utils,
        utils::VecExt,
        volume::{RayVolumeState, ScatterEvent},
        RgbD, RgbF, Vec3d,
    };
    use std::f64::consts;

    fn lambertian() -> BsdfConfig {
        BsdfConfig {
            diffuse_model: DiffuseModel::Lambertian,
            ..Default::default()
        }
    }

    /// Estimates the directional albedo of `material` seen from `view` with the normal `+z`
    fn albedo(
        bsdf: &PrincipledBsdf<'_>,
        material: &Material,
        volume: &RayVolumeState,
        view: Vec3d,
        rd: &mut fastrand::Rng,
    ) -> RgbD {
        let num_samples = 50_000;
        let mut sum = RgbD::ZERO;
        for _ in 0..num_samples {
            let mut volume = volume.clone();
            let sample = bsdf.sample(material, &mut volume, view, Vec3d::Z, Vec3d::Z, rd);
            if sample.pdf > 0.0 {
                sum += sample.bsdf * sample.direction.z.abs() / sample.pdf;
            }
        }
        sum / num_samples as f64
    }

    #[test]
    fn lobe_weights() {
        let material = Material {
            metallic: 0.5,
            second_roughness_weight: 0.25,
            specular_transmission: 0.5,
            coat: 1.0,
            ..Default::default()
        };
        let outside = LobeWeights::new(&material, true);
        test_utils::assert_eq_approx_abs!(outside.metal, 0.375, 1e-9);
        test_utils::assert_eq_approx_abs!(outside.second_metal, 0.125, 1e-9);
        test_utils::assert_eq_approx_abs!(outside.glass, 0.25, 1e-9);
        test_utils::assert_eq_approx_abs!(outside.diffuse, 0.25, 1e-9);
        let total: f64 = Lobe::ALL.iter().map(|lobe| outside.probability(*lobe)).sum();
        test_utils::assert_eq_approx_abs!(total, 1.0, 1e-12);

        let inside = LobeWeights::new(&material, false);
        test_utils::assert_eq_approx_abs!(inside.probability(Lobe::Glass), 1.0, 1e-12);
        assert_eq!(inside.pick(0.0), Lobe::Glass);
        assert_eq!(inside.pick(0.99), Lobe::Glass);
        assert_eq!(outside.pick(0.0), Lobe::Coat);
    }

    #[test]
    fn diffuse_at_normal_incidence() {
        let config = BsdfConfig::default();
        let materials = MaterialTable::default();
        let compensation = EnergyCompensation::none();
        let bsdf = PrincipledBsdf::new(&config, &materials, &compensation);
        let material = Material {
            oren_nayar_sigma: 0.0,
            ..Material::diffuse(RgbF::splat(0.8))
        };
        let volume = RayVolumeState::new();

        let response = bsdf.eval(&material, &volume, Vec3d::Z, Vec3d::Z, Vec3d::Z);
        test_utils::assert_eq_approx_abs!(
            response.bsdf,
            RgbD::splat(0.8 / consts::PI),
            RgbD::splat(1e-6)
        );
        test_utils::assert_eq_approx_abs!(response.pdf, 1.0 / consts::PI, 1e-9);

        let light = Vec3d::new(0.6, 0.0, 0.8);
        let response = bsdf.eval(&material, &volume, Vec3d::Z, Vec3d::Z, light);
        test_utils::assert_eq_approx_abs!(response.pdf, 0.8 / consts::PI, 1e-9);

        // nothing below the surface
        let response = bsdf.eval(&material, &volume, Vec3d::Z, Vec3d::Z, -light);
        assert_eq!(response.bsdf, RgbD::ZERO);
    }

    #[test]
    fn sample_matches_eval() {
        let config = BsdfConfig::default();
        let materials = MaterialTable::default();
        let compensation = EnergyCompensation::none();
        let bsdf = PrincipledBsdf::new(&config, &materials, &compensation);
        let materials = [
            Material::default(),
            Material::metal(RgbF::new(0.9, 0.6, 0.3), 0.4),
            Material {
                coat: 1.0,
                coat_roughness: 0.2,
                sheen: 0.5,
                anisotropy: 0.5,
                anisotropy_rotation: 0.3,
                metallic: 0.5,
                second_roughness_weight: 0.5,
                ..Default::default()
            },
            Material {
                coat: 0.7,
                coat_medium_absorption: RgbF::new(0.9, 0.5, 0.2),
                coat_medium_thickness: 1.0,
                thin_film: 0.5,
                thin_film_thickness: 300.0,
                ..Default::default()
            },
        ];

        let mut rd = fastrand::Rng::with_seed(21);
        for material in &materials {
            for _ in 0..2000 {
                let view = test_utils::hemispherical_sample(&mut rd);
                let before = RayVolumeState::new();
                let mut volume = before.clone();
                let sample = bsdf.sample(material, &mut volume, view, Vec3d::Z, Vec3d::Z, &mut rd);
                assert!(sample.bsdf.min_element() >= 0.0);
                assert!(sample.pdf >= 0.0 && sample.pdf.is_finite());
                if sample.pdf == 0.0 {
                    continue;
                }
                assert_eq!(sample.event, ScatterEvent::Reflection);
                let response = bsdf.eval(material, &before, view, Vec3d::Z, sample.direction);
                test_utils::assert_eq_approx!(
                    response.bsdf,
                    sample.bsdf,
                    RgbD::splat(1e-9),
                    RgbD::splat(1e-9)
                );
                test_utils::assert_eq_approx!(response.pdf, sample.pdf, 1e-9, 1e-9);
            }
        }
    }

    #[test]
    fn glass_sample_matches_eval() {
        let config = BsdfConfig::default();
        let materials = MaterialTable::new(vec![
            Material {
                absorption_color: RgbF::new(0.6, 0.8, 1.0),
                ..Material::glass(1.5, 0.3)
            },
            Material {
                coat: 1.0,
                coat_roughness: 0.1,
                coat_ior: 1.6,
                ..Material::glass(1.4, 0.4)
            },
            Material {
                metallic: 0.5,
                base_color: RgbF::new(0.9, 0.7, 0.4),
                ..Material::glass(1.7, 0.25)
            },
            Material {
                thin_walled: true,
                ..Material::glass(1.5, 0.3)
            },
        ])
        .unwrap();
        let compensation = EnergyCompensation::none();
        let bsdf = PrincipledBsdf::new(&config, &materials, &compensation);

        let mut rd = fastrand::Rng::with_seed(27);
        for (index, material) in materials.iter().enumerate() {
            let index = index as u32;
            let mut transmitted = 0;
            for from_inside in [false, true] {
                for _ in 0..3000 {
                    let mut volume = RayVolumeState::new();
                    if from_inside && !material.thin_walled {
                        volume.reach_interface(index, material.dielectric_priority);
                        volume.apply_scatter(ScatterEvent::Refraction);
                        volume.advance(0.5);
                    }
                    volume.reach_interface(index, material.dielectric_priority);
                    assert_eq!(volume.inside_material, from_inside && !material.thin_walled);

                    let above = test_utils::hemispherical_sample(&mut rd);
                    let view = if from_inside { -above } else { above };
                    let before = volume.clone();
                    let sample =
                        bsdf.sample(material, &mut volume, view, Vec3d::Z, Vec3d::Z, &mut rd);
                    assert!(sample.bsdf.min_element() >= 0.0);
                    assert!(sample.pdf >= 0.0 && sample.pdf.is_finite());
                    if sample.pdf == 0.0 {
                        continue;
                    }
                    if sample.event != ScatterEvent::Reflection {
                        transmitted += 1;
                    }

                    let response = bsdf.eval(material, &before, view, Vec3d::Z, sample.direction);
                    test_utils::assert_eq_approx!(
                        response.bsdf,
                        sample.bsdf,
                        RgbD::splat(1e-9),
                        RgbD::splat(1e-9)
                    );
                    test_utils::assert_eq_approx!(response.pdf, sample.pdf, 1e-9, 1e-9);
                }
            }
            assert!(transmitted > 100);
        }
    }

    #[test]
    fn eval_is_zero_without_pdf() {
        let config = BsdfConfig::default();
        let materials = MaterialTable::default();
        let compensation = EnergyCompensation::none();
        let bsdf = PrincipledBsdf::new(&config, &materials, &compensation);
        let material = Material::metal(RgbF::ONE, 0.3);
        let volume = RayVolumeState::new();

        let mut rd = fastrand::Rng::with_seed(22);
        for _ in 0..1000 {
            let view = test_utils::hemispherical_sample(&mut rd);
            let light = test_utils::spherical_sample(&mut rd);
            let response = bsdf.eval(&material, &volume, view, Vec3d::Z, light);
            assert!(response.pdf > 0.0 || response.bsdf == RgbD::ZERO);
        }
    }

    #[test]
    fn energy_conservation() {
        let config = lambertian();
        let materials = MaterialTable::default();
        let compensation = EnergyCompensation::none();
        let bsdf = PrincipledBsdf::new(&config, &materials, &compensation);

        let white_diffuse = Material::diffuse(RgbF::ONE);
        let plastic = Material {
            roughness: 0.4,
            ..Material::default()
        };
        let coated_metal = Material {
            coat: 1.0,
            coat_roughness: 0.1,
            ..Material::metal(RgbF::ONE, 0.2)
        };
        let velvet = Material {
            sheen: 1.0,
            sheen_roughness: 0.6,
            ..Material::diffuse(RgbF::ONE)
        };

        let mut rd = fastrand::Rng::with_seed(23);
        let volume = RayVolumeState::new();
        for view in [
            Vec3d::Z,
            Vec3d::new(0.5, 0.0, 0.8).normalize(),
            Vec3d::new(0.0, -0.7, 0.5).normalize(),
        ] {
            let diffuse = albedo(&bsdf, &white_diffuse, &volume, view, &mut rd);
            test_utils::assert_eq_approx_abs!(diffuse, RgbD::ONE, RgbD::splat(1e-6));

            for material in [&plastic, &coated_metal, &velvet] {
                let reflected = albedo(&bsdf, material, &volume, view, &mut rd);
                test_utils::assert_in_range!(reflected.max_element(), 0.5, 1.05);
            }
        }
    }

    #[test]
    fn smooth_glass_at_normal_incidence() {
        let config = BsdfConfig::default();
        let materials = MaterialTable::new(vec![Material::glass(1.5, 0.0)]).unwrap();
        let compensation = EnergyCompensation::none();
        let bsdf = PrincipledBsdf::new(&config, &materials, &compensation);
        let material = *materials.get(0).unwrap();

        let mut rd = fastrand::Rng::with_seed(24);
        let num_samples = 10_000;
        let mut reflected = 0;
        for _ in 0..num_samples {
            let mut volume = RayVolumeState::new();
            assert!(!volume.reach_interface(0, material.dielectric_priority));
            let sample = bsdf.sample(&material, &mut volume, Vec3d::Z, Vec3d::Z, Vec3d::Z, &mut rd);
            assert!(sample.pdf > 0.0);
            match sample.event {
                ScatterEvent::Reflection => {
                    reflected += 1;
                    assert!(sample.direction.z > 0.0);
                    assert!(volume.interior_stack.is_empty());
                }
                ScatterEvent::Refraction => {
                    assert!(sample.direction.z < 0.0);
                    // exactly one entry above the vacuum
                    assert_eq!(volume.interior_stack.len(), 2);
                    assert_eq!(volume.interior_stack.effective_material(), Some(0));
                }
                ScatterEvent::ThinTransmission => panic!("glass is not thin walled"),
            }
        }
        let ratio = f64::from(reflected) / f64::from(num_samples);
        test_utils::assert_eq_approx_abs!(ratio, 0.04, 0.01);
    }

    #[test]
    fn thin_walled_glass_keeps_the_stack() {
        let config = BsdfConfig::default();
        let materials = MaterialTable::new(vec![Material {
            thin_walled: true,
            ..Material::glass(1.5, 0.2)
        }])
        .unwrap();
        let compensation = EnergyCompensation::none();
        let bsdf = PrincipledBsdf::new(&config, &materials, &compensation);
        let material = *materials.get(0).unwrap();

        let mut rd = fastrand::Rng::with_seed(25);
        let view = Vec3d::new(0.3, 0.0, 0.9).normalize();
        for _ in 0..1000 {
            let mut volume = RayVolumeState::new();
            volume.reach_interface(0, 0);
            let sample = bsdf.sample(&material, &mut volume, view, Vec3d::Z, Vec3d::Z, &mut rd);
            assert_ne!(sample.event, ScatterEvent::Refraction);
            assert!(volume.interior_stack.is_empty());
        }
    }

    #[test]
    fn glass_absorbs_inside() {
        let config = BsdfConfig::default();
        let materials = MaterialTable::new(vec![Material {
            absorption_color: RgbF::new(0.5, 1.0, 1.0),
            ..Material::glass(1.5, 0.3)
        }])
        .unwrap();
        let compensation = EnergyCompensation::none();
        let bsdf = PrincipledBsdf::new(&config, &materials, &compensation);
        let material = *materials.get(0).unwrap();

        // enter the glass and travel one unit inside of it
        let mut volume = RayVolumeState::new();
        volume.reach_interface(0, 0);
        volume.apply_scatter(ScatterEvent::Refraction);
        volume.advance(1.0);
        volume.reach_interface(0, 0);
        assert!(volume.inside_material);

        // the ray hits the back of the surface from inside
        let normal = Vec3d::Z;
        let view = -Vec3d::new(0.1, 0.0, 0.9).normalize();
        let light = Vec3d::new(0.05, 0.0, 1.0).normalize();
        let fresh = {
            let mut fresh = volume.clone();
            fresh.distance_in_volume = 0.0;
            fresh
        };
        let absorbed = bsdf.eval(&material, &volume, view, normal, light);
        let clear = bsdf.eval(&material, &fresh, view, normal, light);
        assert!(clear.bsdf.luminance() > 0.0);
        test_utils::assert_eq_approx_abs!(absorbed.bsdf.x, clear.bsdf.x * 0.5, 1e-6);
        test_utils::assert_eq_approx_abs!(absorbed.bsdf.y, clear.bsdf.y, 1e-9);
    }

    #[test]
    fn fringes_are_fixed() {
        let config = BsdfConfig::default();
        let materials = MaterialTable::default();
        let compensation = EnergyCompensation::none();
        let bsdf = PrincipledBsdf::new(&config, &materials, &compensation);
        let material = Material::diffuse(RgbF::splat(0.5));

        // the view is above the geometry but below the interpolated normal
        let geometric_normal = Vec3d::Z;
        let shading_normal = Vec3d::new(1.0, 0.0, 0.2).normalize();
        let view = Vec3d::new(-1.0, 0.0, 0.3).normalize();
        assert!(view.dot(shading_normal) < 0.0);

        let mut rd = fastrand::Rng::with_seed(26);
        let mut valid = 0;
        for _ in 0..1000 {
            let mut volume = RayVolumeState::new();
            let sample = bsdf.sample(
                &material,
                &mut volume,
                view,
                shading_normal,
                geometric_normal,
                &mut rd,
            );
            assert!(sample.bsdf.is_finite() && sample.pdf.is_finite());
            if sample.pdf > 0.0 && sample.bsdf.luminance() > 0.0 {
                valid += 1;
            }
        }
        assert!(valid > 900);
    }
}
