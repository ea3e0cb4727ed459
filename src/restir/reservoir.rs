//! Weighted reservoir sampling of light samples

use crate::{random::RandomStream, Vec3d};

/// A point on an emissive triangle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ReSTIRDISample {
    /// index of the triangle in the scene, `-1` if no light was picked
    pub emissive_triangle_index: i32,
    pub point_on_light: Vec3d,
}

impl Default for ReSTIRDISample {
    fn default() -> Self {
        Self::INVALID
    }
}

impl ReSTIRDISample {
    pub const INVALID: Self = Self {
        emissive_triangle_index: -1,
        point_on_light: Vec3d::ZERO,
    };

    #[must_use]
    pub fn new(triangle: u32, point_on_light: Vec3d) -> Self {
        Self {
            emissive_triangle_index: i32::try_from(triangle).unwrap_or(-1),
            point_on_light,
        }
    }

    #[must_use]
    pub fn triangle(&self) -> Option<u32> {
        u32::try_from(self.emissive_triangle_index).ok()
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.emissive_triangle_index >= 0
    }
}

/// Streaming reservoir holding one light sample.
///
/// `weight_sum` accumulates resampling weights until [`Reservoir::end_with_normalization`] turns
/// it into the unbiased contribution weight `ucw` of the kept sample. `m` is the number of
/// candidates the reservoir stands for and is used as its confidence.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Reservoir {
    pub sample: ReSTIRDISample,
    pub weight_sum: f64,
    pub m: u32,
    pub ucw: f64,
}

impl Reservoir {
    /// A reservoir holds a usable sample once it was normalized to a positive weight
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.sample.is_valid() && self.weight_sum > 0.0 && self.ucw > 0.0
    }

    /// Streams a fresh candidate with its resampling weight into the reservoir. Returns `true` if
    /// the candidate was kept.
    pub fn add_candidate<R: RandomStream + ?Sized>(
        &mut self,
        sample: ReSTIRDISample,
        weight: f64,
        rng: &mut R,
    ) -> bool {
        self.m += 1;
        self.stream(sample, weight, rng)
    }

    /// Streams the sample of another reservoir into this one.
    ///
    /// The resampling weight is `mis_weight * target_at_center * other.ucw * jacobian`, with the
    /// target function evaluated at the surface this reservoir belongs to. Returns `true` if the
    /// sample of `other` was kept.
    pub fn combine_with<R: RandomStream + ?Sized>(
        &mut self,
        other: &Self,
        mis_weight: f64,
        target_at_center: f64,
        jacobian: f64,
        rng: &mut R,
    ) -> bool {
        self.m += other.m;
        let weight = mis_weight * target_at_center * other.ucw * jacobian;
        self.stream(other.sample, weight, rng)
    }

    fn stream<R: RandomStream + ?Sized>(
        &mut self,
        sample: ReSTIRDISample,
        weight: f64,
        rng: &mut R,
    ) -> bool {
        if weight <= 0.0 || !weight.is_finite() {
            return false;
        }
        self.weight_sum += weight;
        if rng.next_f64() < weight / self.weight_sum {
            self.sample = sample;
            true
        } else {
            false
        }
    }

    /// Computes the unbiased contribution weight `weight_sum * nume / (denom * target)` of the
    /// kept sample. `target` is the target function at the kept sample.
    pub fn end_with_normalization(&mut self, nume: f64, denom: f64, target: f64) {
        let (nume, denom) = if self.weight_sum <= 0.0 {
            (1.0, 1.0)
        } else {
            (nume, denom)
        };
        self.ucw = if denom > 0.0 && target > 0.0 && self.sample.is_valid() {
            self.weight_sum * nume / (denom * target)
        } else {
            0.0
        };
        if !self.ucw.is_finite() {
            self.ucw = 0.0;
        }
    }

    /// Limits the confidence of a reservoir reused over many frames
    pub fn cap_m(&mut self, cap: u32) {
        self.m = self.m.min(cap);
    }
}
