//! Random numbers for the shading code.
//!
//! Everything that consumes randomness takes a [`RandomStream`], so tests and callers are free to
//! plug in their own generator. [`Xorshift32`] is the small per pixel generator used by the
//! render passes.

use crate::Vec3d;

/// A source of uniformly distributed numbers
pub trait RandomStream {
    /// next uniformly distributed integer
    fn next_u32(&mut self) -> u32;

    /// Uniform float in `0.0..1.0`. The upper bound is excluded.
    fn next_f64(&mut self) -> f64 {
        (f64::from(self.next_u32()) / f64::from(u32::MAX)).min(1.0 - 1e-6)
    }

    /// Three uniform floats, the way the `sample_...` functions expect them
    fn vec3d(&mut self) -> Vec3d {
        Vec3d::new(self.next_f64(), self.next_f64(), self.next_f64())
    }

    /// Uniform integer in `0..bound`. `bound` must not be zero.
    fn next_below(&mut self, bound: u32) -> u32 {
        ((self.next_f64() * f64::from(bound)) as u32).min(bound - 1)
    }
}

/// Marsaglia's "xor" generator from "Xorshift RNGs", p. 4
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Xorshift32 {
    state: u32,
}

impl Xorshift32 {
    /// A zero seed would lock the generator at zero and is replaced by one
    #[must_use]
    pub const fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Seeds a decorrelated generator for one pixel of one frame
    #[must_use]
    pub fn for_pixel(x: u32, y: u32, width: u32, frame: u32) -> Self {
        let pixel = y.wrapping_mul(width).wrapping_add(x);
        Self::new(wang_hash(pixel.wrapping_add(1)) ^ wang_hash(frame.wrapping_add(0x9e37_79b9)))
    }
}

impl RandomStream for Xorshift32 {
    fn next_u32(&mut self) -> u32 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.state = x;
        x
    }
}

/// Thomas Wang's integer hash, used to turn pixel coordinates into seeds
#[must_use]
pub const fn wang_hash(mut seed: u32) -> u32 {
    seed = (seed ^ 61) ^ (seed >> 16);
    seed = seed.wrapping_mul(9);
    seed ^= seed >> 4;
    seed = seed.wrapping_mul(0x27d4_eb2d);
    seed ^= seed >> 15;
    seed
}

#[cfg(test)]
mod tests {
    use super::{RandomStream, Xorshift32};
    use crate::test_utils;

    #[test]
    fn floats_stay_below_one() {
        let mut rng = Xorshift32::new(42);
        for _ in 0..100_000 {
            let value = rng.next_f64();
            test_utils::assert_in_range!(value, 0.0, 1.0 - 1e-6);
        }
    }

    #[test]
    fn known_sequence() {
        let mut rng = Xorshift32::new(1);
        assert_eq!(rng.next_u32(), 270_369);
        assert_eq!(rng.next_u32(), 67_634_689);
    }

    #[test]
    fn zero_seed_does_not_lock() {
        let mut rng = Xorshift32::new(0);
        assert_ne!(rng.next_u32(), 0);
    }

    #[test]
    fn mean_is_one_half() {
        let mut rng = Xorshift32::for_pixel(3, 7, 64, 2);
        let n = 200_000;
        let mean = (0..n).map(|_| rng.next_f64()).sum::<f64>() / n as f64;
        test_utils::assert_eq_approx_abs!(mean, 0.5, 0.005);
    }

    #[test]
    fn neighbouring_pixels_differ() {
        let a = Xorshift32::for_pixel(0, 0, 64, 0);
        let b = Xorshift32::for_pixel(1, 0, 64, 0);
        let c = Xorshift32::for_pixel(0, 0, 64, 1);
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn bounded_integers() {
        let mut rng = Xorshift32::new(9);
        for _ in 0..10_000 {
            assert!(rng.next_below(5) < 5);
        }
    }
}
