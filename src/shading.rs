//! Shading points and the continuation of paths through them.
//!
//! A [`Surface`] is created once a ray reached an interface and the interior stack decided that
//! the interface is not skipped. [`ShadingContext::shade`] then samples the principled BSDF and
//! returns where the path goes next.

use crate::{
    dispersion,
    material::Material,
    principled::PrincipledBsdf,
    random::RandomStream,
    utils::VecExt,
    volume::{RayVolumeState, ScatterEvent},
    RgbD, Vec3d,
};

/// Everything needed to shade a point on a surface
#[derive(Clone, Debug, PartialEq)]
pub struct Surface {
    pub position: Vec3d,
    pub geometric_normal: Vec3d,
    pub shading_normal: Vec3d,

    /// normalized, points away from the surface towards the previous vertex of the path
    pub view_direction: Vec3d,

    pub material_index: u32,
    pub material: Material,

    /// volume state of the ray with the interface at this surface already reached
    pub volume: RayVolumeState,
}

impl Surface {
    /// Lets a ray carrying `volume` reach the surface of `material`.
    ///
    /// Returns `None` if the interface has a lower priority than the volume the ray is in. The
    /// ray then has to continue in its direction with the updated `volume`.
    #[must_use]
    pub fn reach(
        position: Vec3d,
        geometric_normal: Vec3d,
        shading_normal: Vec3d,
        view_direction: Vec3d,
        material_index: u32,
        material: Material,
        volume: &mut RayVolumeState,
    ) -> Option<Self> {
        if volume.reach_interface(material_index, material.dielectric_priority) {
            volume.skip_interface();
            return None;
        }
        Some(Self {
            position,
            geometric_normal,
            shading_normal,
            view_direction,
            material_index,
            material,
            volume: volume.clone(),
        })
    }

    /// roughness of the base layer, compared between neighboring pixels by spatial reuse
    #[must_use]
    pub fn roughness(&self) -> f64 {
        f64::from(self.material.roughness)
    }

    /// A point slightly above or below the surface, on the side of `direction`
    #[must_use]
    pub fn offset_position(&self, direction: Vec3d) -> Vec3d {
        let epsilon = 1e-4 * self.position.abs().max_element().max(1.0);
        if direction.dot(self.geometric_normal) >= 0.0 {
            self.position + self.geometric_normal * epsilon
        } else {
            self.position - self.geometric_normal * epsilon
        }
    }
}

/// Where a path goes after scattering at a surface
#[derive(Clone, Debug, PartialEq)]
pub struct PathContinuation {
    pub direction: Vec3d,

    /// `bsdf * cos / pdf`, including the color weight of a newly sampled wavelength
    pub throughput: RgbD,

    pub pdf: f64,
    pub event: ScatterEvent,

    /// volume state of the continued ray
    pub volume: RayVolumeState,
}

/// Continues paths at surfaces using the principled BSDF
#[derive(Clone, Copy, Debug)]
pub struct ShadingContext<'a> {
    pub bsdf: PrincipledBsdf<'a>,
}

impl<'a> ShadingContext<'a> {
    #[must_use]
    pub const fn new(bsdf: PrincipledBsdf<'a>) -> Self {
        Self { bsdf }
    }

    /// Samples the next direction of a path at `surface`.
    ///
    /// The first dispersive glass a ray meets restricts it to a single wavelength. The wavelength
    /// is kept by the returned volume state for the rest of the path. Returns `None` if the path
    /// is absorbed.
    pub fn shade<R: RandomStream + ?Sized>(
        &self,
        surface: &Surface,
        rng: &mut R,
    ) -> Option<PathContinuation> {
        let material = &surface.material;
        let mut volume = surface.volume.clone();
        let mut tint = RgbD::ONE;
        if is_dispersive(material) && volume.sampled_wavelength == 0.0 {
            let wavelength = dispersion::sample_wavelength(rng.next_f64());
            volume.sampled_wavelength = wavelength;
            tint = dispersion::wavelength_to_rgb(wavelength);
        }

        let sample = self.bsdf.sample(
            material,
            &mut volume,
            surface.view_direction,
            surface.shading_normal,
            surface.geometric_normal,
            rng,
        );
        if sample.pdf <= 0.0 || sample.bsdf.max_element() <= 0.0 {
            return None;
        }

        let cos_theta = sample.direction.dot(surface.shading_normal).abs();
        Some(PathContinuation {
            direction: sample.direction,
            throughput: sample.bsdf * tint * (cos_theta / sample.pdf),
            pdf: sample.pdf,
            event: sample.event,
            volume,
        })
    }

    /// Light emitted by `surface` towards its viewer. Emitters are seen from both sides.
    #[must_use]
    pub fn emission(&self, surface: &Surface) -> RgbD {
        surface.material.emission()
    }
}

fn is_dispersive(material: &Material) -> bool {
    material.dispersion_scale > 0.0
        && material.specular_transmission > 0.0
        && material.metallic < 1.0
}
