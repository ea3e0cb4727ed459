//! The function light samples are resampled against

use super::{
    reservoir::ReSTIRDISample,
    scene::{LightScene, Ray, SceneQueries},
};
use crate::{principled::PrincipledBsdf, shading::Surface, utils::VecExt, RgbD, Vec3d};

/// Unshadowed light arriving at a surface from one point on a light
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightPath {
    /// from the surface towards the light, normalized
    pub direction: Vec3d,
    pub distance: f64,

    /// `bsdf * emission * |cos theta|` at the surface
    pub radiance: RgbD,

    /// cosine between the light normal and the direction towards the surface
    pub cos_light: f64,
}

impl LightPath {
    /// converts densities with respect to the light area to solid angle at the surface
    #[must_use]
    pub fn area_to_solid_angle(&self) -> f64 {
        self.distance * self.distance / self.cos_light
    }
}

/// Evaluates light samples at surfaces.
///
/// `WITH_VISIBILITY` in [`TargetFunction::evaluate`] adds a shadow ray, which is only traced if
/// the unshadowed value is not zero.
pub struct TargetFunction<'a, S: ?Sized> {
    pub bsdf: PrincipledBsdf<'a>,
    pub lights: &'a LightScene,
    pub scene: &'a S,

    /// multiply `cos_light / distance^2` into the target
    pub geometry_term: bool,
}

impl<S: SceneQueries + ?Sized> TargetFunction<'_, S> {
    /// The light `sample` sends towards `surface`, without occlusion. `None` if no light arrives.
    #[must_use]
    pub fn light_path(&self, surface: &Surface, sample: &ReSTIRDISample) -> Option<LightPath> {
        let triangle = sample.triangle()?;
        let to_light = sample.point_on_light - surface.position;
        let distance = to_light.length();
        if distance < 1e-8 {
            return None;
        }
        let direction = to_light / distance;

        // emitters shine on both sides
        let cos_light = self.lights.normal(triangle).dot(-direction).abs();
        if cos_light < 1e-8 {
            return None;
        }

        let bsdf = self
            .bsdf
            .eval(
                &surface.material,
                &surface.volume,
                surface.view_direction,
                surface.shading_normal,
                direction,
            )
            .bsdf;
        let radiance = bsdf
            * self.lights.emission(triangle)
            * direction.dot(surface.shading_normal).abs();
        if radiance.max_element() <= 0.0 {
            return None;
        }

        Some(LightPath {
            direction,
            distance,
            radiance,
            cos_light,
        })
    }

    /// `true` if nothing blocks the light path between `surface` and `sample`
    #[must_use]
    pub fn visible(&self, surface: &Surface, sample: &ReSTIRDISample) -> bool {
        let origin = surface.offset_position(sample.point_on_light - surface.position);
        let to_light = sample.point_on_light - origin;
        let distance = to_light.length();
        if distance <= 0.0 {
            return true;
        }
        let ray = Ray::new(origin, to_light / distance);
        !self.scene.shadow_query(&ray, distance * (1.0 - 1e-4))
    }

    /// target of a light path that is known to be unoccluded
    #[must_use]
    pub fn unshadowed(&self, path: &LightPath) -> f64 {
        let target = path.radiance.luminance();
        if self.geometry_term {
            target / path.area_to_solid_angle()
        } else {
            target
        }
    }

    #[must_use]
    pub fn evaluate<const WITH_VISIBILITY: bool>(
        &self,
        surface: &Surface,
        sample: &ReSTIRDISample,
    ) -> f64 {
        let Some(path) = self.light_path(surface, sample) else {
            return 0.0;
        };
        let target = self.unshadowed(&path);
        if WITH_VISIBILITY && target > 0.0 && !self.visible(surface, sample) {
            return 0.0;
        }
        target
    }
}
