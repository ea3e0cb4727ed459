//! What ReSTIR needs to know about the scene: ray queries and the emissive triangles.

use crate::{
    error::{Error, Result},
    material::MaterialTable,
    random::RandomStream,
    RgbD, Vec3d,
};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3d,
    /// normalized
    pub direction: Vec3d,
}

impl Ray {
    #[must_use]
    pub const fn new(origin: Vec3d, direction: Vec3d) -> Self {
        Self { origin, direction }
    }

    #[must_use]
    pub fn at(&self, distance: f64) -> Vec3d {
        self.origin + self.direction * distance
    }
}

/// Closest intersection of a ray with the scene
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HitInfo {
    pub distance: f64,
    pub triangle: u32,
    pub position: Vec3d,
    pub geometric_normal: Vec3d,
    pub shading_normal: Vec3d,
}

/// Ray queries provided by the acceleration structure of the renderer
pub trait SceneQueries: Sync {
    fn closest_hit(&self, ray: &Ray) -> Option<HitInfo>;

    /// `true` if something blocks `ray` before `max_distance`
    fn shadow_query(&self, ray: &Ray, max_distance: f64) -> bool {
        self.closest_hit(ray)
            .is_some_and(|hit| hit.distance < max_distance)
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Triangle {
    pub vertices: [Vec3d; 3],
}

impl Triangle {
    #[must_use]
    pub const fn new(a: Vec3d, b: Vec3d, c: Vec3d) -> Self {
        Self {
            vertices: [a, b, c],
        }
    }

    fn edges_cross(&self) -> Vec3d {
        let [a, b, c] = self.vertices;
        (b - a).cross(c - a)
    }

    #[must_use]
    pub fn area(&self) -> f64 {
        0.5 * self.edges_cross().length()
    }

    /// Follows the winding order, zero for degenerate triangles
    #[must_use]
    pub fn normal(&self) -> Vec3d {
        self.edges_cross().normalize_or_zero()
    }

    /// Uniformly distributed point on the triangle
    #[must_use]
    pub fn sample_point(&self, u: f64, v: f64) -> Vec3d {
        let [a, b, c] = self.vertices;
        let (u, v) = if u + v > 1.0 {
            (1.0 - u, 1.0 - v)
        } else {
            (u, v)
        };
        a + (b - a) * u + (c - a) * v
    }
}

/// A point sampled on an emissive triangle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LightSample {
    pub triangle: u32,
    pub point: Vec3d,
    /// probability density with respect to the area of the lights
    pub pdf_area: f64,
}

/// Triangles of the scene together with the list of emissive ones
#[derive(Clone, Debug)]
pub struct LightScene {
    triangles: Vec<Triangle>,
    material_indices: Vec<u32>,
    emission: Vec<RgbD>,
    emissive_triangles: Vec<u32>,
}

impl LightScene {
    /// # Errors
    /// [`Error::DimensionMismatch`] if not every triangle has a material index,
    /// [`Error::UnknownMaterial`] if an index is not part of `materials`.
    pub fn new(
        triangles: Vec<Triangle>,
        material_indices: Vec<u32>,
        materials: &MaterialTable,
    ) -> Result<Self> {
        if triangles.len() != material_indices.len() {
            return Err(Error::DimensionMismatch {
                name: "material_indices",
                expected: triangles.len(),
                actual: material_indices.len(),
            });
        }

        let mut emission = Vec::with_capacity(triangles.len());
        let mut emissive_triangles = Vec::new();
        for (triangle, &material_index) in material_indices.iter().enumerate() {
            let material = materials
                .get(material_index)
                .ok_or(Error::UnknownMaterial {
                    triangle,
                    material: material_index as usize,
                })?;
            if material.is_emissive() && triangles[triangle].area() > 0.0 {
                emissive_triangles.push(triangle as u32);
            }
            emission.push(material.emission());
        }

        tracing::debug!(
            triangles = triangles.len(),
            emissive = emissive_triangles.len(),
            "built light scene"
        );
        Ok(Self {
            triangles,
            material_indices,
            emission,
            emissive_triangles,
        })
    }

    #[must_use]
    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    #[must_use]
    pub fn material_index(&self, triangle: u32) -> Option<u32> {
        self.material_indices.get(triangle as usize).copied()
    }

    #[must_use]
    pub fn emissive_triangles(&self) -> &[u32] {
        &self.emissive_triangles
    }

    #[must_use]
    pub fn has_lights(&self) -> bool {
        !self.emissive_triangles.is_empty()
    }

    /// emitted radiance of a triangle, black for unknown triangles
    #[must_use]
    pub fn emission(&self, triangle: u32) -> RgbD {
        self.emission
            .get(triangle as usize)
            .copied()
            .unwrap_or(RgbD::ZERO)
    }

    #[must_use]
    pub fn normal(&self, triangle: u32) -> Vec3d {
        self.triangles
            .get(triangle as usize)
            .map_or(Vec3d::ZERO, Triangle::normal)
    }

    /// Picks an emissive triangle uniformly and a uniform point on it
    pub fn sample_light<R: RandomStream + ?Sized>(&self, rng: &mut R) -> Option<LightSample> {
        if self.emissive_triangles.is_empty() {
            return None;
        }
        let pick = rng.next_below(self.emissive_triangles.len() as u32);
        let triangle = self.emissive_triangles[pick as usize];
        let geometry = &self.triangles[triangle as usize];
        let point = geometry.sample_point(rng.next_f64(), rng.next_f64());
        Some(LightSample {
            triangle,
            point,
            pdf_area: 1.0 / (self.emissive_triangles.len() as f64 * geometry.area()),
        })
    }
}
