//! Lookup tables that bring back the energy single scattering microfacet lobes lose.
//!
//! Rough microfacet lobes only account for light that bounces once on the microsurface. The
//! directional albedo `E` of a lobe tells how much energy survives, dividing by it (or adding the
//! missing `1 - E` back) compensates the loss.
//!
//! * Emmanuel Turquin. Practical multiple scattering compensation for microfacet models. 2019.

use crate::{
    error::{Error, Result},
    ggx::GGX,
    random::{RandomStream, Xorshift32},
    rough_glass::RoughGlass,
    Vec3d, BSDF,
};
use rayon::prelude::*;

/// A table sampled with normalized coordinates in `[0, 1]^3`
pub trait Lut3D: Send + Sync + std::fmt::Debug {
    fn sample(&self, coords: Vec3d) -> f64;
}

/// Regular grid with trilinear interpolation. The first and the last texel of every axis sit
/// exactly on the coordinates `0.0` and `1.0`.
#[derive(Clone, Debug, PartialEq)]
pub struct GridLut {
    size: [usize; 3],
    data: Vec<f32>,
}

impl GridLut {
    /// Wraps baked data, the x-axis varying fastest
    ///
    /// # Errors
    /// [`Error::LutDimensionMismatch`] if `data` does not hold exactly one value per texel
    pub fn new(size: [usize; 3], data: Vec<f32>) -> Result<Self> {
        let expected = size.iter().product::<usize>();
        if expected == 0 || data.len() != expected {
            return Err(Error::LutDimensionMismatch {
                size,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self { size, data })
    }

    /// Bakes a table in parallel, `f` receives the normalized coordinates of every texel
    #[must_use]
    pub fn from_fn<F>(size: [usize; 3], f: F) -> Self
    where
        F: Fn(Vec3d) -> f64 + Sync,
    {
        let size = size.map(|n| n.max(1));
        let data = (0..size.iter().product::<usize>())
            .into_par_iter()
            .map(|index| {
                let x = index % size[0];
                let y = (index / size[0]) % size[1];
                let z = index / (size[0] * size[1]);
                f(Vec3d::new(
                    Self::coordinate(x, size[0]),
                    Self::coordinate(y, size[1]),
                    Self::coordinate(z, size[2]),
                )) as f32
            })
            .collect();
        Self { size, data }
    }

    #[must_use]
    pub const fn size(&self) -> [usize; 3] {
        self.size
    }

    #[must_use]
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    fn coordinate(index: usize, n: usize) -> f64 {
        if n <= 1 {
            0.0
        } else {
            index as f64 / (n - 1) as f64
        }
    }

    fn texel(&self, x: usize, y: usize, z: usize) -> f64 {
        f64::from(self.data[(z * self.size[1] + y) * self.size[0] + x])
    }
}

impl Lut3D for GridLut {
    fn sample(&self, coords: Vec3d) -> f64 {
        let axis = |value: f64, n: usize| {
            let position = value.clamp(0.0, 1.0) * (n - 1) as f64;
            let lower = (position.floor() as usize).min(n - 1);
            let upper = (lower + 1).min(n - 1);
            (lower, upper, position - lower as f64)
        };
        let (x0, x1, tx) = axis(coords.x, self.size[0]);
        let (y0, y1, ty) = axis(coords.y, self.size[1]);
        let (z0, z1, tz) = axis(coords.z, self.size[2]);

        let lerp = |a: f64, b: f64, t: f64| {
            #[allow(clippy::suboptimal_flops)]
            {
                a + (b - a) * t
            }
        };
        let plane = |z: usize| {
            lerp(
                lerp(self.texel(x0, y0, z), self.texel(x1, y0, z), tx),
                lerp(self.texel(x0, y1, z), self.texel(x1, y1, z), tx),
                ty,
            )
        };
        lerp(plane(z0), plane(z1), tz)
    }
}

/// Resolution and quality of the baked tables
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BakeSettings {
    pub texture_size_cos_theta: usize,
    pub texture_size_roughness: usize,
    pub texture_size_ior: usize,
    pub integration_sample_count: usize,
}

impl Default for BakeSettings {
    fn default() -> Self {
        Self {
            texture_size_cos_theta: 32,
            texture_size_roughness: 32,
            texture_size_ior: 32,
            integration_sample_count: 65536,
        }
    }
}

/// Relative iors between `1/3` and `3` are mapped to `[0, 1]`, `1.0` being in the middle
#[must_use]
pub fn ior_coordinate(relative_eta: f64) -> f64 {
    (relative_eta.ln() / 3.0_f64.ln()).mul_add(0.5, 0.5).clamp(0.0, 1.0)
}

fn relative_eta_of(coordinate: f64) -> f64 {
    3.0_f64.powf(coordinate.mul_add(2.0, -1.0))
}

fn view_direction(cos_theta: f64) -> Vec3d {
    let cos_theta = cos_theta.clamp(1e-3, 1.0);
    Vec3d::new((1.0 - cos_theta * cos_theta).sqrt(), 0.0, cos_theta)
}

fn integrate<T: BSDF>(lobe: &T, omega_o: Vec3d, samples: usize, seed: u32) -> f64 {
    let mut rng = Xorshift32::new(seed);
    let mut sum = 0.0;
    for _ in 0..samples {
        let response = lobe.sample_incoming(omega_o, rng.vec3d());
        if response.pdf > 0.0 {
            sum += response.bsdf.x * response.omega_i.z.abs() / response.pdf;
        }
    }
    sum / samples.max(1) as f64
}

/// Directional albedo of a white, single scattering GGX conductor over `(cos_theta, roughness)`
#[must_use]
pub fn bake_conductor_albedo(settings: &BakeSettings) -> GridLut {
    let _span = tracing::debug_span!("bake_conductor_albedo").entered();
    let size = [settings.texture_size_cos_theta, settings.texture_size_roughness, 1];
    let lut = GridLut::from_fn(size, |coords| {
        let lobe = ConductorAlbedoLobe(GGX::from_remapped(coords.y, 0.0));
        let seed = crate::random::wang_hash((coords.x * 7919.0 + coords.y * 104_729.0) as u32);
        integrate(&lobe, view_direction(coords.x), settings.integration_sample_count, seed)
    });
    tracing::debug!(size = ?lut.size(), "conductor albedo baked");
    lut
}

/// Directional albedo (reflection and refraction) of a clear rough glass over
/// `(cos_theta, roughness, ior_coordinate(relative_eta))`
#[must_use]
pub fn bake_glass_albedo(settings: &BakeSettings) -> GridLut {
    let _span = tracing::debug_span!("bake_glass_albedo").entered();
    let size = [
        settings.texture_size_cos_theta,
        settings.texture_size_roughness,
        settings.texture_size_ior,
    ];
    let lut = GridLut::from_fn(size, |coords| {
        let mut relative_eta = relative_eta_of(coords.z);
        if (relative_eta - 1.0).abs() < 1e-5 {
            relative_eta = 1.0 + 1e-5;
        }
        let lobe = RoughGlass::new(GGX::from_remapped(coords.y, 0.0), relative_eta);
        let seed = crate::random::wang_hash(
            (coords.x * 7919.0 + coords.y * 104_729.0 + coords.z * 1_299_709.0) as u32,
        );
        integrate(&lobe, view_direction(coords.x), settings.integration_sample_count, seed)
    });
    tracing::debug!(size = ?lut.size(), "glass albedo baked");
    lut
}

#[derive(Debug)]
struct ConductorAlbedoLobe(GGX);

impl BSDF for ConductorAlbedoLobe {
    fn sample_direction(&self, omega_o: Vec3d, rdf: Vec3d) -> Vec3d {
        self.0.sample_reflection(omega_o, rdf.x, rdf.y)
    }

    fn evaluate(&self, omega_o: Vec3d, omega_i: Vec3d) -> crate::EvaluateResponse {
        self.0.torrance_sparrow(omega_o, omega_i, crate::RgbD::ONE)
    }
}

/// Every table used by [`crate::principled::PrincipledBsdf`]. Missing tables disable their
/// compensation.
#[derive(Debug, Default)]
pub struct EnergyCompensation {
    /// `(cos_theta, roughness)` of a white conductor, see [`bake_conductor_albedo`]
    pub conductor: Option<Box<dyn Lut3D>>,

    /// `(cos_theta, roughness, ior)` of a clear glass, see [`bake_glass_albedo`]
    pub glass: Option<Box<dyn Lut3D>>,

    /// `(cos_theta, roughness, ior)` of a white specular layer on top of a white diffuse base
    pub glossy_base: Option<Box<dyn Lut3D>>,

    /// `(cos_theta, coat roughness, coat ior)` of everything below and including the coat
    pub clearcoat: Option<Box<dyn Lut3D>>,
}

impl EnergyCompensation {
    /// No compensation at all
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Bakes the conductor and the glass tables. Glossy base and clearcoat tables depend on the
    /// whole layered material and have to be provided by the caller.
    #[must_use]
    pub fn bake(settings: &BakeSettings) -> Self {
        let (conductor, glass) = rayon::join(
            || bake_conductor_albedo(settings),
            || bake_glass_albedo(settings),
        );
        Self {
            conductor: Some(Box::new(conductor)),
            glass: Some(Box::new(glass)),
            glossy_base: None,
            clearcoat: None,
        }
    }

    #[must_use]
    pub fn conductor_albedo(&self, cos_theta: f64, roughness: f64) -> Option<f64> {
        self.conductor
            .as_ref()
            .map(|lut| lut.sample(Vec3d::new(cos_theta, roughness, 0.0)).clamp(1e-3, 1.0))
    }

    /// divisor of the glass lobe, `1.0` without table
    #[must_use]
    pub fn glass_albedo(&self, cos_theta: f64, roughness: f64, relative_eta: f64) -> f64 {
        Self::albedo_or_one(self.glass.as_deref(), cos_theta, roughness, relative_eta)
    }

    /// divisor of the glossy base, `1.0` without table
    #[must_use]
    pub fn glossy_base_albedo(&self, cos_theta: f64, roughness: f64, relative_eta: f64) -> f64 {
        Self::albedo_or_one(self.glossy_base.as_deref(), cos_theta, roughness, relative_eta)
    }

    /// divisor of the whole material below the coat, `1.0` without table
    #[must_use]
    pub fn clearcoat_albedo(&self, cos_theta: f64, roughness: f64, relative_eta: f64) -> f64 {
        Self::albedo_or_one(self.clearcoat.as_deref(), cos_theta, roughness, relative_eta)
    }

    fn albedo_or_one(lut: Option<&dyn Lut3D>, cos_theta: f64, roughness: f64, relative_eta: f64) -> f64 {
        lut.map_or(1.0, |lut| {
            lut.sample(Vec3d::new(cos_theta, roughness, ior_coordinate(relative_eta)))
                .clamp(0.05, 1.0)
        })
    }
}
