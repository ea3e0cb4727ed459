//! Options of the ReSTIR DI render pass

use super::bias_correction::BiasCorrectionMode;
use crate::error::{Error, Result};

/// Neighbors a spatial pass can look at, the center pixel not included
pub const MAX_SPATIAL_NEIGHBORS: u32 = 16;

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct InitialCandidatesSettings {
    /// number of light samples streamed into the reservoir of every pixel
    pub light_candidates: u32,

    /// Traces a shadow ray towards the sample kept by the reservoir and drops it if occluded
    pub visibility_check: bool,
}

impl Default for InitialCandidatesSettings {
    fn default() -> Self {
        Self {
            light_candidates: 32,
            visibility_check: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TemporalSettings {
    pub enabled: bool,

    /// The reservoir of the previous frame is capped to this many times the confidence of the
    /// new one. Old samples otherwise stick around for too long.
    pub m_cap_multiplier: u32,
}

impl Default for TemporalSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            m_cap_multiplier: 20,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SpatialSettings {
    pub enabled: bool,
    pub passes: u32,
    pub neighbors: u32,
    /// in pixels
    pub radius: f64,
}

impl Default for SpatialSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            passes: 2,
            neighbors: 5,
            radius: 16.0,
        }
    }
}

/// A neighbor is only reused if it looks like the center pixel
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct NeighborSimilarity {
    pub use_plane_distance: bool,
    /// distance of the neighbor to the tangent plane of the center
    pub plane_distance_threshold: f64,

    pub use_normal: bool,
    /// maximal angle between the shading normals
    pub normal_angle_degrees: f64,

    pub use_roughness: bool,
    pub roughness_threshold: f64,
}

impl Default for NeighborSimilarity {
    fn default() -> Self {
        Self {
            use_plane_distance: true,
            plane_distance_threshold: 0.1,
            use_normal: true,
            normal_angle_degrees: 25.0,
            use_roughness: true,
            roughness_threshold: 0.25,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ReSTIRDISettings {
    pub initial_candidates: InitialCandidatesSettings,
    pub temporal: TemporalSettings,
    pub spatial: SpatialSettings,
    pub bias_correction: BiasCorrectionMode,

    /// Traces shadow rays in the target functions used by the bias correction weights
    pub visibility_in_bias_correction: bool,

    /// multiplies `cos_light / distance^2` into the target function
    pub geometry_term_in_target: bool,

    pub similarity: NeighborSimilarity,
}

impl ReSTIRDISettings {
    /// Rejects settings the render pass cannot work with.
    ///
    /// # Errors
    /// [`Error::InvalidSetting`] naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        let invalid = |field: &'static str, reason: &str| -> Result<()> {
            Err(Error::InvalidSetting {
                field,
                reason: reason.to_owned(),
            })
        };

        if self.initial_candidates.light_candidates == 0 {
            return invalid(
                "initial_candidates.light_candidates",
                "at least one candidate is needed",
            );
        }
        if self.temporal.enabled && self.temporal.m_cap_multiplier == 0 {
            return invalid("temporal.m_cap_multiplier", "must be at least 1");
        }
        if self.spatial.enabled {
            if self.spatial.passes == 0 {
                return invalid("spatial.passes", "must be at least 1");
            }
            if self.spatial.neighbors == 0 {
                return invalid("spatial.neighbors", "must be at least 1");
            }
            if !(self.spatial.radius >= 1.0) {
                return invalid("spatial.radius", "must be at least one pixel");
            }
        }

        let similarity = &self.similarity;
        if !(similarity.plane_distance_threshold > 0.0) {
            return invalid("similarity.plane_distance_threshold", "must be positive");
        }
        if !(similarity.normal_angle_degrees > 0.0 && similarity.normal_angle_degrees <= 180.0) {
            return invalid(
                "similarity.normal_angle_degrees",
                "must be in the range (0, 180]",
            );
        }
        if !(similarity.roughness_threshold >= 0.0) {
            return invalid("similarity.roughness_threshold", "must not be negative");
        }
        Ok(())
    }

    /// number of neighbors per spatial pass, limited to [`MAX_SPATIAL_NEIGHBORS`]
    #[must_use]
    pub fn spatial_neighbors(&self) -> u32 {
        self.spatial.neighbors.min(MAX_SPATIAL_NEIGHBORS)
    }

    /// Limits the number of spatial neighbors to [`MAX_SPATIAL_NEIGHBORS`], warning if that
    /// changes the settings
    pub fn clamp_spatial_neighbors(&mut self) {
        if self.spatial.neighbors > MAX_SPATIAL_NEIGHBORS {
            tracing::warn!(
                requested = self.spatial.neighbors,
                max = MAX_SPATIAL_NEIGHBORS,
                "clamping the number of spatial neighbors"
            );
            self.spatial.neighbors = MAX_SPATIAL_NEIGHBORS;
        }
    }
}
