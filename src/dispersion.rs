//! Wavelength dependent index of refraction.
//!
//! A dispersive glass refracts every wavelength differently. Once a ray refracts through such a
//! glass, it carries a single wavelength (see [`crate::volume::RayVolumeState::sampled_wavelength`])
//! and its throughput is tinted by [`wavelength_to_rgb`].

use crate::RgbD;
use std::sync::OnceLock;

pub const MIN_WAVELENGTH: f64 = 380.0;
pub const MAX_WAVELENGTH: f64 = 780.0;

/// Fraunhofer lines used to define the Abbe number
const LAMBDA_D: f64 = 587.56;
const LAMBDA_F: f64 = 486.13;
const LAMBDA_C: f64 = 656.27;

/// Index of refraction of a material at `wavelength` (in nanometers) following Cauchy's
/// equation `n = A + B / lambda^2`. `base_ior` is the ior at the sodium d-line.
///
/// A `wavelength` or `dispersion_scale` of zero disables dispersion.
#[must_use]
pub fn dispersion_ior(abbe_number: f64, dispersion_scale: f64, base_ior: f64, wavelength: f64) -> f64 {
    if dispersion_scale <= 0.0 || wavelength <= 0.0 || abbe_number <= 0.0 {
        return base_ior;
    }
    let abbe_number = abbe_number / dispersion_scale;
    let b = (base_ior - 1.0) / (abbe_number * (LAMBDA_F.powi(-2) - LAMBDA_C.powi(-2)));
    let a = base_ior - b / (LAMBDA_D * LAMBDA_D);
    a + b / (wavelength * wavelength)
}

/// Uniformly samples a visible wavelength
#[must_use]
pub fn sample_wavelength(u: f64) -> f64 {
    #[allow(clippy::suboptimal_flops)]
    {
        MIN_WAVELENGTH + u * (MAX_WAVELENGTH - MIN_WAVELENGTH)
    }
}

fn gaussian(x: f64, center: f64, width: f64) -> f64 {
    (-0.5 * ((x - center) / width).powi(2)).exp()
}

fn unnormalized_rgb(wavelength: f64) -> RgbD {
    RgbD::new(
        gaussian(wavelength, 610.0, 45.0),
        gaussian(wavelength, 550.0, 40.0),
        gaussian(wavelength, 455.0, 30.0),
    )
}

/// Color weight of a single wavelength. Averaged over uniformly sampled wavelengths the
/// weights add up to white, so a dispersive glass does not tint the image.
#[must_use]
pub fn wavelength_to_rgb(wavelength: f64) -> RgbD {
    static NORMALIZATION: OnceLock<RgbD> = OnceLock::new();
    let normalization = NORMALIZATION.get_or_init(|| {
        const STEPS: usize = 2048;
        let mut sum = RgbD::ZERO;
        for i in 0..STEPS {
            sum += unnormalized_rgb(sample_wavelength((i as f64 + 0.5) / STEPS as f64));
        }
        sum / STEPS as f64
    });
    unnormalized_rgb(wavelength) / *normalization
}
