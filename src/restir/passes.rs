//! The resampling passes of ReSTIR DI and the render pass that chains them.
//!
//! Every frame runs the initial candidates, an optional temporal pass, a number of spatial
//! passes and the final shading. Each pass reads the reservoirs of the previous one and writes
//! a new buffer, pixels never see results of their neighbors from the same pass.

use super::{
    heuristics,
    reservoir::{ReSTIRDISample, Reservoir},
    scene::{LightScene, SceneQueries},
    settings::{ReSTIRDISettings, MAX_SPATIAL_NEIGHBORS},
    surface::GBuffer,
    target_function::TargetFunction,
};
use crate::{
    error::{Error, Result},
    principled::PrincipledBsdf,
    random::{wang_hash, RandomStream, Xorshift32},
    shading::Surface,
    RgbD, Vec3d,
};
use arrayvec::ArrayVec;
use rayon::prelude::*;
use std::f64::consts;

/// the center pixel and its neighbors
const MAX_CANDIDATES: usize = MAX_SPATIAL_NEIGHBORS as usize + 1;

/// Neighbors whose jacobian is further away from one are not reused
const MAX_JACOBIAN: f64 = 20.0;

/// Jacobian of moving a light sample from the surface at `neighbor` to the surface at `center`.
///
/// The point on the light stays the same, only the solid angle it covers changes. `None` if the
/// shift distorts the density too much.
#[must_use]
pub fn reconnection_jacobian(
    center: Vec3d,
    neighbor: Vec3d,
    point_on_light: Vec3d,
    light_normal: Vec3d,
) -> Option<f64> {
    let to_center = center - point_on_light;
    let to_neighbor = neighbor - point_on_light;
    let distance_center_sq = to_center.length_squared();
    let distance_neighbor_sq = to_neighbor.length_squared();
    let cos_center = light_normal.dot(to_center).abs() / distance_center_sq.sqrt();
    let cos_neighbor = light_normal.dot(to_neighbor).abs() / distance_neighbor_sq.sqrt();

    let jacobian = (cos_center / cos_neighbor) * (distance_neighbor_sq / distance_center_sq);
    if jacobian.is_nan() || !(1.0 / MAX_JACOBIAN..=MAX_JACOBIAN).contains(&jacobian) {
        return None;
    }
    Some(jacobian)
}

/// A reservoir taking part in a resampling step together with the surface it was created for
#[derive(Clone, Copy, Debug)]
struct Candidate<'s> {
    reservoir: Reservoir,
    surface: &'s Surface,
}

/// Runs the resampling steps for single pixels
struct Resampler<'a, S: ?Sized> {
    target: TargetFunction<'a, S>,
    settings: &'a ReSTIRDISettings,
}

impl<S: SceneQueries + ?Sized> Resampler<'_, S> {
    /// Streams light samples into a fresh reservoir. Samples are drawn with respect to the light
    /// area and converted to solid angle at `surface`.
    fn initial_candidates<R: RandomStream + ?Sized>(
        &self,
        surface: &Surface,
        rng: &mut R,
    ) -> Reservoir {
        let lights = self.target.lights;
        let mut reservoir = Reservoir::default();
        let mut target_of_kept = 0.0;
        for _ in 0..self.settings.initial_candidates.light_candidates {
            let Some(light) = lights.sample_light(rng) else {
                break;
            };
            let sample = ReSTIRDISample::new(light.triangle, light.point);
            let (target, source_pdf) = match self.target.light_path(surface, &sample) {
                Some(path) => (
                    self.target.unshadowed(&path),
                    light.pdf_area * path.area_to_solid_angle(),
                ),
                None => (0.0, 1.0),
            };
            if reservoir.add_candidate(sample, target / source_pdf, rng) {
                target_of_kept = target;
            }
        }
        reservoir.end_with_normalization(1.0, f64::from(reservoir.m), target_of_kept);

        if self.settings.initial_candidates.visibility_check
            && reservoir.is_valid()
            && !self.target.visible(surface, &reservoir.sample)
        {
            // keeps its confidence
            reservoir.sample = ReSTIRDISample::INVALID;
            reservoir.weight_sum = 0.0;
            reservoir.ucw = 0.0;
        }
        reservoir
    }

    /// Resamples `candidates` into a reservoir for `center`. The center pixel has to be the last
    /// candidate.
    fn resample<R: RandomStream + ?Sized>(
        &self,
        center: &Surface,
        candidates: &[Candidate<'_>],
        rng: &mut R,
    ) -> Reservoir {
        if self.settings.visibility_in_bias_correction {
            self.resample_with::<true, R>(center, candidates, rng)
        } else {
            self.resample_with::<false, R>(center, candidates, rng)
        }
    }

    fn resample_with<const WITH_VISIBILITY: bool, R: RandomStream + ?Sized>(
        &self,
        center: &Surface,
        candidates: &[Candidate<'_>],
        rng: &mut R,
    ) -> Reservoir {
        let center_index = candidates.len().saturating_sub(1);

        // neighbors the sample cannot be moved from do not take part at all
        let mut accepted: ArrayVec<(Candidate<'_>, f64), MAX_CANDIDATES> = ArrayVec::new();
        for (index, candidate) in candidates.iter().enumerate() {
            if candidate.reservoir.m == 0 || accepted.is_full() {
                continue;
            }
            let jacobian = match candidate.reservoir.sample.triangle() {
                Some(triangle) if index != center_index => {
                    let Some(jacobian) = reconnection_jacobian(
                        center.position,
                        candidate.surface.position,
                        candidate.reservoir.sample.point_on_light,
                        self.target.lights.normal(triangle),
                    ) else {
                        continue;
                    };
                    jacobian
                }
                _ => 1.0,
            };
            accepted.push((*candidate, jacobian));
        }

        let strategy = self.settings.bias_correction.strategy();
        let confidences: ArrayVec<f64, MAX_CANDIDATES> = accepted
            .iter()
            .map(|(candidate, _)| f64::from(candidate.reservoir.m))
            .collect();
        let targets_at = |sample: &ReSTIRDISample| -> ArrayVec<f64, MAX_CANDIDATES> {
            accepted
                .iter()
                .map(|(candidate, _)| {
                    self.target
                        .evaluate::<WITH_VISIBILITY>(candidate.surface, sample)
                })
                .collect()
        };

        let mut output = Reservoir::default();
        let mut selected = None;
        let mut target_of_selected = 0.0;
        for (index, (candidate, jacobian)) in accepted.iter().enumerate() {
            let reservoir = &candidate.reservoir;
            if !reservoir.is_valid() {
                output.combine_with(reservoir, 0.0, 0.0, *jacobian, rng);
                continue;
            }

            let target_at_center = self
                .target
                .evaluate::<WITH_VISIBILITY>(center, &reservoir.sample);
            let mis_weight = if strategy.needs_resampling_targets() {
                strategy.resampling_weight(index, &confidences, &targets_at(&reservoir.sample))
            } else {
                strategy.resampling_weight(index, &confidences, &[])
            };
            if output.combine_with(reservoir, mis_weight, target_at_center, *jacobian, rng) {
                selected = Some(index);
                target_of_selected = target_at_center;
            }
        }

        let (nume, denom) = match selected {
            Some(index) if strategy.needs_normalization_targets() => {
                strategy.normalization(index, &confidences, &targets_at(&output.sample))
            }
            Some(index) => strategy.normalization(index, &confidences, &[]),
            None => (1.0, 1.0),
        };
        output.end_with_normalization(nume, denom, target_of_selected);
        output
    }

    /// Direct light at `surface` estimated from the sample of `reservoir`
    fn shade(&self, surface: &Surface, reservoir: &Reservoir) -> RgbD {
        if !reservoir.is_valid() {
            return RgbD::ZERO;
        }
        let Some(path) = self.target.light_path(surface, &reservoir.sample) else {
            return RgbD::ZERO;
        };
        if !self.target.visible(surface, &reservoir.sample) {
            return RgbD::ZERO;
        }
        path.radiance * reservoir.ucw
    }
}

/// Seeds of the passes of one frame
#[derive(Clone, Copy, Debug)]
enum Pass {
    Initial,
    Temporal,
    Spatial(u32),
}

impl Pass {
    const fn id(self) -> u32 {
        match self {
            Self::Initial => 0,
            Self::Temporal => 1,
            Self::Spatial(pass) => 2 + pass,
        }
    }
}

/// Direct lighting with reservoir based spatiotemporal importance resampling.
///
/// Keeps the reservoirs of the last frame for temporal reuse. The resolution is fixed at
/// creation, every buffer handed to [`ReSTIRDIRenderPass::render_frame`] has to match it.
///
/// * Benedikt Bitterli, Chris Wyman, Matt Pharr, Peter Shirley, Aaron Lefohn and Wojciech Jarosz.
///   Spatiotemporal reservoir resampling for real-time ray tracing with dynamic direct lighting. 2020.
/// * Chris Wyman, Markus Kettunen, Daqi Lin, Benedikt Bitterli, Cem Yuksel, Wojciech Jarosz,
///   Pawel Kozlowski and Giovanni De Francesco. A gentle introduction to ReSTIR. 2023.
#[derive(Clone, Debug)]
pub struct ReSTIRDIRenderPass {
    settings: ReSTIRDISettings,
    width: u32,
    height: u32,
    frame: u32,
    previous_reservoirs: Vec<Reservoir>,
}

impl ReSTIRDIRenderPass {
    /// Too many spatial neighbors are clamped to [`MAX_SPATIAL_NEIGHBORS`].
    ///
    /// # Errors
    /// [`Error::InvalidSetting`] if `settings` do not validate.
    pub fn new(mut settings: ReSTIRDISettings, width: u32, height: u32) -> Result<Self> {
        settings.validate()?;
        settings.clamp_spatial_neighbors();
        Ok(Self {
            settings,
            width,
            height,
            frame: 0,
            previous_reservoirs: Vec::new(),
        })
    }

    #[must_use]
    pub const fn settings(&self) -> &ReSTIRDISettings {
        &self.settings
    }

    /// number of frames rendered so far
    #[must_use]
    pub const fn frame(&self) -> u32 {
        self.frame
    }

    /// reservoirs the last frame was shaded with, empty before the first frame
    #[must_use]
    pub fn reservoirs(&self) -> &[Reservoir] {
        &self.previous_reservoirs
    }

    /// Forgets the reservoirs of the last frame, e.g. after a camera cut
    pub fn reset_temporal(&mut self) {
        self.previous_reservoirs.clear();
    }

    fn check_dimensions(&self, name: &'static str, gbuffer: &GBuffer) -> Result<()> {
        let expected = self.width as usize * self.height as usize;
        if gbuffer.width() != self.width || gbuffer.height() != self.height {
            return Err(Error::DimensionMismatch {
                name,
                expected,
                actual: gbuffer.len(),
            });
        }
        Ok(())
    }

    fn rng(&self, gbuffer: &GBuffer, index: usize, pass: Pass) -> Xorshift32 {
        let (x, y) = gbuffer.coordinates(index);
        Xorshift32::for_pixel(x, y, self.width, wang_hash(self.frame) ^ pass.id())
    }

    /// Renders the direct lighting of one frame.
    ///
    /// `previous_gbuffer` holds the primary hits of the last frame. Without it temporal reuse is
    /// skipped. Returns the radiance reflected towards the camera for every pixel, row major.
    ///
    /// # Errors
    /// [`Error::DimensionMismatch`] if a g-buffer does not match the resolution of the pass and
    /// [`Error::NoLights`] if the scene has no emissive triangle.
    pub fn render_frame<S: SceneQueries + ?Sized>(
        &mut self,
        bsdf: PrincipledBsdf<'_>,
        lights: &LightScene,
        scene: &S,
        gbuffer: &GBuffer,
        previous_gbuffer: Option<&GBuffer>,
    ) -> Result<Vec<RgbD>> {
        self.check_dimensions("g-buffer", gbuffer)?;
        if let Some(previous) = previous_gbuffer {
            self.check_dimensions("previous g-buffer", previous)?;
        }
        if !lights.has_lights() {
            return Err(Error::NoLights);
        }

        let span = tracing::debug_span!("restir_di_frame", frame = self.frame);
        let _enter = span.enter();

        let resampler = Resampler {
            target: TargetFunction {
                bsdf,
                lights,
                scene,
                geometry_term: self.settings.geometry_term_in_target,
            },
            settings: &self.settings,
        };

        let mut reservoirs = self.initial_pass(&resampler, gbuffer);
        if self.settings.temporal.enabled {
            if let Some(previous_gbuffer) = previous_gbuffer {
                reservoirs = self.temporal_pass(&resampler, gbuffer, previous_gbuffer, &reservoirs);
            }
        }
        if self.settings.spatial.enabled {
            for pass in 0..self.settings.spatial.passes {
                reservoirs = self.spatial_pass(&resampler, gbuffer, &reservoirs, pass);
            }
        }

        let image: Vec<RgbD> = {
            let span = tracing::debug_span!("shade");
            let _enter = span.enter();
            reservoirs
                .par_iter()
                .enumerate()
                .map(|(index, reservoir)| {
                    gbuffer
                        .surface(index)
                        .map_or(RgbD::ZERO, |surface| resampler.shade(surface, reservoir))
                })
                .collect()
        };

        tracing::debug!(
            valid = reservoirs.iter().filter(|reservoir| reservoir.is_valid()).count(),
            pixels = reservoirs.len(),
            "finished frame"
        );
        self.previous_reservoirs = reservoirs;
        self.frame = self.frame.wrapping_add(1);
        Ok(image)
    }

    fn initial_pass<S: SceneQueries + ?Sized>(
        &self,
        resampler: &Resampler<'_, S>,
        gbuffer: &GBuffer,
    ) -> Vec<Reservoir> {
        let span = tracing::debug_span!("initial_candidates");
        let _enter = span.enter();
        (0..gbuffer.len())
            .into_par_iter()
            .map(|index| {
                gbuffer.surface(index).map_or_else(Reservoir::default, |surface| {
                    let mut rng = self.rng(gbuffer, index, Pass::Initial);
                    resampler.initial_candidates(surface, &mut rng)
                })
            })
            .collect()
    }

    /// Reuses the reservoir of the same pixel in the last frame
    fn temporal_pass<S: SceneQueries + ?Sized>(
        &self,
        resampler: &Resampler<'_, S>,
        gbuffer: &GBuffer,
        previous_gbuffer: &GBuffer,
        current: &[Reservoir],
    ) -> Vec<Reservoir> {
        if self.previous_reservoirs.len() != current.len() {
            return current.to_vec();
        }
        let span = tracing::debug_span!("temporal_reuse");
        let _enter = span.enter();
        let similarity = &self.settings.similarity;
        let m_cap_multiplier = self.settings.temporal.m_cap_multiplier;

        current
            .par_iter()
            .enumerate()
            .map(|(index, reservoir)| {
                let Some(center) = gbuffer.surface(index) else {
                    return *reservoir;
                };
                let Some(previous_surface) = previous_gbuffer.surface(index) else {
                    return *reservoir;
                };
                if !heuristics::neighbor_similar(similarity, center, previous_surface) {
                    return *reservoir;
                }

                let mut previous = self.previous_reservoirs[index];
                previous.cap_m(m_cap_multiplier.saturating_mul(reservoir.m.max(1)));
                let candidates = [
                    Candidate {
                        reservoir: previous,
                        surface: previous_surface,
                    },
                    Candidate {
                        reservoir: *reservoir,
                        surface: center,
                    },
                ];
                let mut rng = self.rng(gbuffer, index, Pass::Temporal);
                resampler.resample(center, &candidates, &mut rng)
            })
            .collect()
    }

    /// Reuses the reservoirs of random pixels in a disk around every pixel
    fn spatial_pass<S: SceneQueries + ?Sized>(
        &self,
        resampler: &Resampler<'_, S>,
        gbuffer: &GBuffer,
        input: &[Reservoir],
        pass: u32,
    ) -> Vec<Reservoir> {
        let span = tracing::debug_span!("spatial_reuse", pass);
        let _enter = span.enter();
        let neighbors = self.settings.spatial_neighbors();
        let radius = self.settings.spatial.radius;
        let similarity = &self.settings.similarity;

        input
            .par_iter()
            .enumerate()
            .map(|(index, reservoir)| {
                let Some(center) = gbuffer.surface(index) else {
                    return *reservoir;
                };
                let (x, y) = gbuffer.coordinates(index);
                let mut rng = self.rng(gbuffer, index, Pass::Spatial(pass));

                let mut candidates: ArrayVec<Candidate<'_>, MAX_CANDIDATES> = ArrayVec::new();
                for _ in 0..neighbors {
                    let r = radius * rng.next_f64().sqrt();
                    let phi = 2.0 * consts::PI * rng.next_f64();
                    let neighbor_x = i64::from(x) + (r * phi.cos()).round() as i64;
                    let neighbor_y = i64::from(y) + (r * phi.sin()).round() as i64;
                    if neighbor_x == i64::from(x) && neighbor_y == i64::from(y) {
                        continue;
                    }
                    let Some(neighbor) = gbuffer.get(neighbor_x, neighbor_y) else {
                        continue;
                    };
                    if !heuristics::neighbor_similar(similarity, center, neighbor) {
                        continue;
                    }
                    candidates.push(Candidate {
                        reservoir: input[gbuffer.index(neighbor_x as u32, neighbor_y as u32)],
                        surface: neighbor,
                    });
                }
                candidates.push(Candidate {
                    reservoir: *reservoir,
                    surface: center,
                });

                resampler.resample(center, &candidates, &mut rng)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::{reconnection_jacobian, Candidate, ReSTIRDIRenderPass, Resampler};
    use crate::{
        config::{BsdfConfig, DiffuseModel},
        energy_compensation::EnergyCompensation,
        error::Error,
        material::{Material, MaterialTable},
        principled::PrincipledBsdf,
        random::Xorshift32,
        restir::{
            bias_correction::BiasCorrectionMode,
            reservoir::{ReSTIRDISample, Reservoir},
            scene::{HitInfo, LightScene, Ray, SceneQueries, Triangle},
            settings::{ReSTIRDISettings, MAX_SPATIAL_NEIGHBORS},
            surface::GBuffer,
            target_function::TargetFunction,
        },
        shading::Surface,
        test_utils,
        utils::VecExt,
        volume::RayVolumeState,
        RgbD, RgbF, Vec3d,
    };

    struct Empty;

    impl SceneQueries for Empty {
        fn closest_hit(&self, _: &Ray) -> Option<HitInfo> {
            None
        }
    }

    /// a roof at `z = 1` above the plane, below every light
    struct Roof;

    impl SceneQueries for Roof {
        fn closest_hit(&self, ray: &Ray) -> Option<HitInfo> {
            if ray.direction.z <= 0.0 {
                return None;
            }
            let distance = (1.0 - ray.origin.z) / ray.direction.z;
            Some(HitInfo {
                distance,
                triangle: 0,
                position: ray.at(distance),
                geometric_normal: -Vec3d::Z,
                shading_normal: -Vec3d::Z,
            })
        }
    }

    const WIDTH: u32 = 8;
    const HEIGHT: u32 = 8;

    struct Fixture {
        config: BsdfConfig,
        materials: MaterialTable,
        compensation: EnergyCompensation,
        lights: LightScene,
    }

    impl Fixture {
        /// two lights of different colors above a white diffuse plane
        fn new() -> Self {
            let materials = MaterialTable::new(vec![
                Material::diffuse(RgbF::ONE),
                Material::emissive(RgbF::splat(5.0)),
                Material::emissive(RgbF::new(2.0, 4.0, 8.0)),
            ])
            .unwrap();
            let lights = LightScene::new(
                vec![
                    Triangle::new(
                        Vec3d::new(-1.0, -1.0, 1.5),
                        Vec3d::new(0.0, -1.0, 1.5),
                        Vec3d::new(-1.0, 1.0, 1.5),
                    ),
                    Triangle::new(
                        Vec3d::new(0.0, -1.0, 2.0),
                        Vec3d::new(1.0, -1.0, 2.0),
                        Vec3d::new(1.0, 1.0, 2.0),
                    ),
                ],
                vec![1, 2],
                &materials,
            )
            .unwrap();
            Self {
                config: BsdfConfig {
                    diffuse_model: DiffuseModel::Lambertian,
                    ..Default::default()
                },
                materials,
                compensation: EnergyCompensation::none(),
                lights,
            }
        }

        fn bsdf(&self) -> PrincipledBsdf<'_> {
            PrincipledBsdf::new(&self.config, &self.materials, &self.compensation)
        }

        fn target<'a, S: SceneQueries>(&'a self, scene: &'a S, geometry_term: bool) -> TargetFunction<'a, S> {
            TargetFunction {
                bsdf: self.bsdf(),
                lights: &self.lights,
                scene,
                geometry_term,
            }
        }
    }

    fn surface(position: Vec3d, normal: Vec3d) -> Surface {
        Surface::reach(
            position,
            normal,
            normal,
            normal,
            0,
            Material::diffuse(RgbF::ONE),
            &mut RayVolumeState::new(),
        )
        .unwrap()
    }

    /// the plane `z = 0` seen from above, covering `-1..1` in x and y
    fn plane() -> GBuffer {
        let surfaces = (0..WIDTH * HEIGHT)
            .map(|index| {
                let x = f64::from(index % WIDTH) + 0.5;
                let y = f64::from(index / WIDTH) + 0.5;
                let position = Vec3d::new(
                    x / f64::from(WIDTH) * 2.0 - 1.0,
                    y / f64::from(HEIGHT) * 2.0 - 1.0,
                    0.0,
                );
                Some(surface(position, Vec3d::Z))
            })
            .collect();
        GBuffer::new(WIDTH, HEIGHT, surfaces).unwrap()
    }

    /// Direct light at `surface` integrated over the light area on a regular grid
    fn reference(fixture: &Fixture, surface: &Surface) -> RgbD {
        let target = fixture.target(&Empty, true);
        let n = 64;
        let mut sum = RgbD::ZERO;
        for &triangle in fixture.lights.emissive_triangles() {
            let geometry = fixture.lights.triangles()[triangle as usize];
            let mut integral = RgbD::ZERO;
            for i in 0..n {
                for j in 0..n {
                    let point = geometry.sample_point(
                        (f64::from(i) + 0.5) / f64::from(n),
                        (f64::from(j) + 0.5) / f64::from(n),
                    );
                    let sample = ReSTIRDISample::new(triangle, point);
                    if let Some(path) = target.light_path(surface, &sample) {
                        integral += path.radiance / path.area_to_solid_angle();
                    }
                }
            }
            sum += integral * geometry.area() / f64::from(n * n);
        }
        sum
    }

    fn spatial_only() -> ReSTIRDISettings {
        let mut settings = ReSTIRDISettings::default();
        settings.temporal.enabled = false;
        settings.spatial.radius = 3.0;
        settings.bias_correction = BiasCorrectionMode::MisLike;
        settings.geometry_term_in_target = true;
        settings
    }

    #[test]
    fn spatial_reuse_is_unbiased() {
        let fixture = Fixture::new();
        let gbuffer = plane();
        let mut pass = ReSTIRDIRenderPass::new(spatial_only(), WIDTH, HEIGHT).unwrap();

        let frames = 128;
        let mut accumulated = vec![RgbD::ZERO; gbuffer.len()];
        for _ in 0..frames {
            let image = pass
                .render_frame(fixture.bsdf(), &fixture.lights, &Empty, &gbuffer, None)
                .unwrap();
            for (sum, pixel) in accumulated.iter_mut().zip(image) {
                *sum += pixel;
            }
        }
        assert_eq!(pass.frame(), frames);

        let mut total = 0.0;
        let mut total_reference = 0.0;
        for (index, sum) in accumulated.iter().enumerate() {
            let estimate = (*sum / f64::from(frames)).luminance();
            let expected = reference(&fixture, gbuffer.surface(index).unwrap()).luminance();
            assert!(expected > 0.0);
            test_utils::assert_eq_approx!(estimate, expected, 0.0, 0.15);
            total += estimate;
            total_reference += expected;
        }
        test_utils::assert_eq_approx!(total, total_reference, 0.0, 0.03);
    }

    #[test]
    fn temporal_reuse_accumulates_confidence() {
        let fixture = Fixture::new();
        let gbuffer = plane();
        let mut settings = ReSTIRDISettings::default();
        settings.spatial.enabled = false;
        let mut pass = ReSTIRDIRenderPass::new(settings, WIDTH, HEIGHT).unwrap();

        for frame in 1..=4 {
            pass.render_frame(fixture.bsdf(), &fixture.lights, &Empty, &gbuffer, Some(&gbuffer))
                .unwrap();
            assert!(pass.reservoirs().iter().all(|reservoir| reservoir.m == 32 * frame));
        }

        // the previous frame may only count as much as the current one
        settings.temporal.m_cap_multiplier = 1;
        let mut capped = ReSTIRDIRenderPass::new(settings, WIDTH, HEIGHT).unwrap();
        for _ in 0..4 {
            capped
                .render_frame(fixture.bsdf(), &fixture.lights, &Empty, &gbuffer, Some(&gbuffer))
                .unwrap();
        }
        assert!(capped.reservoirs().iter().all(|reservoir| reservoir.m == 64));

        capped.reset_temporal();
        assert!(capped.reservoirs().is_empty());
    }

    #[test]
    fn occluded_lights_are_dark() {
        let fixture = Fixture::new();
        let gbuffer = plane();
        let mut pass = ReSTIRDIRenderPass::new(ReSTIRDISettings::default(), WIDTH, HEIGHT).unwrap();
        let image = pass
            .render_frame(fixture.bsdf(), &fixture.lights, &Roof, &gbuffer, None)
            .unwrap();
        assert!(image.iter().all(|pixel| *pixel == RgbD::ZERO));
        assert!(pass.reservoirs().iter().all(|reservoir| !reservoir.is_valid()));
    }

    #[test]
    fn invalid_inputs_are_rejected() {
        let fixture = Fixture::new();
        let mut pass = ReSTIRDIRenderPass::new(ReSTIRDISettings::default(), WIDTH, HEIGHT).unwrap();

        let small = GBuffer::new(2, 2, vec![None; 4]).unwrap();
        assert!(matches!(
            pass.render_frame(fixture.bsdf(), &fixture.lights, &Empty, &small, None),
            Err(Error::DimensionMismatch { .. })
        ));

        let dark = LightScene::new(vec![], vec![], &fixture.materials).unwrap();
        assert_eq!(
            pass.render_frame(fixture.bsdf(), &dark, &Empty, &plane(), None),
            Err(Error::NoLights)
        );

        let mut settings = ReSTIRDISettings::default();
        settings.initial_candidates.light_candidates = 0;
        assert!(ReSTIRDIRenderPass::new(settings, WIDTH, HEIGHT).is_err());

        // too many neighbors are clamped once, not rejected
        let mut settings = ReSTIRDISettings::default();
        settings.spatial.neighbors = 100;
        let pass = ReSTIRDIRenderPass::new(settings, WIDTH, HEIGHT).unwrap();
        assert_eq!(pass.settings().spatial.neighbors, MAX_SPATIAL_NEIGHBORS);
    }

    #[test]
    fn one_over_z_ignores_neighbors_that_cannot_see_the_sample() {
        let fixture = Fixture::new();
        let center = surface(Vec3d::ZERO, Vec3d::Z);
        // faces away from the lights
        let neighbor = surface(Vec3d::new(0.25, 0.0, 0.0), -Vec3d::Z);

        let sample = ReSTIRDISample::new(0, Vec3d::new(-0.5, 0.0, 1.5));
        let center_reservoir = Reservoir {
            sample,
            weight_sum: 1.0,
            m: 1,
            ucw: 2.0,
        };
        let neighbor_reservoir = Reservoir {
            m: 1,
            ..Default::default()
        };
        let candidates = [
            Candidate {
                reservoir: neighbor_reservoir,
                surface: &neighbor,
            },
            Candidate {
                reservoir: center_reservoir,
                surface: &center,
            },
        ];

        let resample = |mode| {
            let settings = ReSTIRDISettings {
                bias_correction: mode,
                ..Default::default()
            };
            let resampler = Resampler {
                target: fixture.target(&Empty, false),
                settings: &settings,
            };
            resampler.resample(&center, &candidates, &mut Xorshift32::new(5))
        };
        let one_over_m = resample(BiasCorrectionMode::OneOverM);
        let one_over_z = resample(BiasCorrectionMode::OneOverZ);
        assert_eq!(one_over_m.m, 2);
        assert_eq!(one_over_m.sample, sample);
        test_utils::assert_eq_approx_abs!(one_over_m.ucw, 1.0, 1e-9);
        test_utils::assert_eq_approx_abs!(one_over_z.ucw, 2.0, 1e-9);
    }

    #[test]
    fn distorting_neighbors_are_rejected() {
        let light_point = Vec3d::new(0.0, 0.0, 1.0);
        assert_eq!(
            reconnection_jacobian(Vec3d::ZERO, Vec3d::new(0.0, 0.0, -4.0), light_point, Vec3d::Z),
            None
        );
        test_utils::assert_eq_approx_abs!(
            reconnection_jacobian(Vec3d::ZERO, Vec3d::new(0.0, 0.0, -3.0), light_point, Vec3d::Z)
                .unwrap(),
            16.0,
            1e-9
        );
        assert_eq!(
            reconnection_jacobian(Vec3d::ZERO, Vec3d::new(5.0, 0.0, 1.0), light_point, Vec3d::Z),
            None
        );

        let materials = MaterialTable::new(vec![
            Material::diffuse(RgbF::ONE),
            Material::emissive(RgbF::ONE),
        ])
        .unwrap();
        let lights = LightScene::new(
            vec![Triangle::new(
                Vec3d::new(-1.0, -1.0, 1.0),
                Vec3d::new(3.0, -1.0, 1.0),
                Vec3d::new(-1.0, 3.0, 1.0),
            )],
            vec![1],
            &materials,
        )
        .unwrap();
        let config = BsdfConfig::default();
        let compensation = EnergyCompensation::none();
        let settings = ReSTIRDISettings::default();
        let resampler = Resampler {
            target: TargetFunction {
                bsdf: PrincipledBsdf::new(&config, &materials, &compensation),
                lights: &lights,
                scene: &Empty,
                geometry_term: false,
            },
            settings: &settings,
        };

        let center = surface(Vec3d::ZERO, Vec3d::Z);
        let far_below = surface(Vec3d::new(0.0, 0.0, -4.0), Vec3d::Z);
        let reservoir = |m| Reservoir {
            sample: ReSTIRDISample::new(0, light_point),
            weight_sum: 1.0,
            m,
            ucw: 1.0,
        };
        let candidates = [
            Candidate {
                reservoir: reservoir(5),
                surface: &far_below,
            },
            Candidate {
                reservoir: reservoir(3),
                surface: &center,
            },
        ];
        let output = resampler.resample(&center, &candidates, &mut Xorshift32::new(1));
        assert_eq!(output.m, 3);
        assert!(output.is_valid());
    }
}
