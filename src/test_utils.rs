pub trait ApproxEqual: Copy {
    fn equals_approx(self, other: Self, eps: Self, eps_rel: Self) -> bool;
    fn equals_approx_abs(self, other: Self, eps: Self) -> bool;
    fn equals_approx_rel(self, other: Self, eps: Self) -> bool;
}

macro_rules! assert_eq_approx {
    ($lhs:expr, $rhs:expr, $eps_abs:expr, $eps_rel:expr) => {
        assert!(
            $crate::test_utils::ApproxEqual::equals_approx($lhs, $rhs, $eps_abs, $eps_rel),
            r#"assert_eq_abs failed:
    {}: {:?}
    {}: {:?}
    {} (maximum absolute error): {:?}
    {} (maximum relative error): {:?}"#,
            stringify!($lhs),
            $lhs,
            stringify!($rhs),
            $rhs,
            stringify!($eps_abs),
            $eps_abs,
            stringify!($eps_rel),
            $eps_rel,
        );
    };

    ($lhs:expr, $rhs:expr, $eps_abs: expr, $eps_rel:expr, $($arg:tt)+) => {
        assert!($crate::test_utils::ApproxEqual::equals_approx($lhs, $rhs, $eps_abs, $eps_rel), $($arg)*);
    }
}

macro_rules! assert_eq_approx_abs {
    ($lhs:expr, $rhs:expr, $eps_abs:expr) => {
        assert!(
            $crate::test_utils::ApproxEqual::equals_approx_abs($lhs, $rhs, $eps_abs),
            r#"assert_eq_abs failed:
    {}: {:?}
    {}: {:?}
    {} (maximum absolute error): {:?}"#,
            stringify!($lhs),
            $lhs,
            stringify!($rhs),
            $rhs,
            stringify!($eps_abs),
            $eps_abs,
        )
    };

    ($lhs:expr, $rhs:expr, $eps_abs:expr, $($arg:tt)+) => {
        assert!($crate::test_utils::ApproxEqual::equals_approx_abs($lhs, $rhs, $eps_abs),
        $($arg)*);
    };
}

macro_rules! assert_in_range {
    ($value:expr, $lower:expr, $upper:expr) => {
        assert!(
            $lower <= $value && $value <= $upper,
            r#"assert_in_range failed:
    {} (value): {:?}
    {} (lower bound): {:?}
    {} (upper bound): {:?}"#,
            stringify!($value),
            $value,
            stringify!($lower),
            $lower,
            stringify!($upper),
            $upper
        )
    };
}

macro_rules! impl_approx_equal {
    ($scalar:ty, $vector:ty) => {
        impl ApproxEqual for $scalar {
            fn equals_approx(self, other: Self, eps: Self, eps_rel: Self) -> bool {
                #[allow(clippy::float_cmp)]
                if self == other || (self - other).abs() <= eps {
                    true
                } else {
                    let diff = (self - other).abs();
                    let max = self.abs().max(other.abs());
                    diff <= max * eps_rel
                }
            }

            fn equals_approx_abs(self, other: Self, eps: Self) -> bool {
                #[allow(clippy::float_cmp)]
                if self == other {
                    true
                } else {
                    (self - other).abs() <= eps
                }
            }

            fn equals_approx_rel(self, other: Self, eps: Self) -> bool {
                #[allow(clippy::float_cmp)]
                if self == other {
                    return true;
                }
                let diff = (self - other).abs();
                let max = self.abs().max(other.abs());
                diff <= max * eps
            }
        }

        impl ApproxEqual for $vector {
            fn equals_approx_rel(self, other: Self, eps: Self) -> bool {
                $crate::test_utils::ApproxEqual::equals_approx_rel(self.x, other.x, eps.x)
                    && $crate::test_utils::ApproxEqual::equals_approx_rel(self.y, other.y, eps.y)
                    && $crate::test_utils::ApproxEqual::equals_approx_rel(self.z, other.z, eps.z)
            }
            fn equals_approx_abs(self, other: Self, eps: Self) -> bool {
                $crate::test_utils::ApproxEqual::equals_approx_abs(self.x, other.x, eps.x)
                    && $crate::test_utils::ApproxEqual::equals_approx_abs(self.y, other.y, eps.y)
                    && $crate::test_utils::ApproxEqual::equals_approx_abs(self.z, other.z, eps.z)
            }
            fn equals_approx(self, other: Self, eps_abs: Self, eps_rel: Self) -> bool {
                $crate::test_utils::ApproxEqual::equals_approx(
                    self.x, other.x, eps_abs.x, eps_rel.x,
                ) && $crate::test_utils::ApproxEqual::equals_approx(
                    self.y, other.y, eps_abs.y, eps_rel.y,
                ) && $crate::test_utils::ApproxEqual::equals_approx(
                    self.z, other.z, eps_abs.z, eps_rel.z,
                )
            }
        }
    };
}

impl_approx_equal!(f64, Vec3d);

use std::f64::consts;

pub(crate) use assert_eq_approx;
pub(crate) use assert_eq_approx_abs;
pub(crate) use assert_in_range;

use crate::{
    random::RandomStream,
    utils::{FloatExt, VecExt},
    EvaluateResponse, RgbD, SampleIncomingResponse, Vec3d, BSDF,
};

impl RandomStream for fastrand::Rng {
    fn next_u32(&mut self) -> u32 {
        self.u32(..)
    }

    fn next_f64(&mut self) -> f64 {
        self.f64()
    }
}

/** sample a direction with density 1 / 4pi */
pub fn spherical_sample(rd: &mut fastrand::Rng) -> Vec3d {
    let u = rd.f64();
    let v = rd.f64();
    spherical_sample_uv(u, v)
}

/** sample a direction above the surface with density 1 / 2pi */
pub fn hemispherical_sample(rd: &mut fastrand::Rng) -> Vec3d {
    let v = spherical_sample(rd);
    Vec3d::new(v.x, v.y, v.z.abs().max(1e-4)).normalize()
}

fn spherical_sample_uv(u: f64, v: f64) -> Vec3d {
    #[allow(clippy::suboptimal_flops)]
    let cos_theta = 2.0 * u - 1.0;
    #[allow(clippy::suboptimal_flops)]
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
    let phi = v * 2.0 * consts::PI;
    let (sin_phi, cos_phi) = phi.sin_cos();
    Vec3d::new(sin_theta * sin_phi, sin_theta * cos_phi, cos_theta)
}

/// Checks that a lobe does not reflect more light than it receives. The view direction is always
/// above the surface, that is how every lobe of the principled BSDF is evaluated.
#[allow(clippy::cast_lossless)]
pub fn test_energy_conservation<T: BSDF>(material: &T, allowed_energy_loss: f64) {
    let mut rd = fastrand::Rng::with_seed(1);
    let runs = 20;
    let num_samples = 20_000;
    for _i in 0..runs {
        // grazing views lose energy to masking, that is tested by the lobes themselves
        let omega_o = loop {
            let omega_o = hemispherical_sample(&mut rd);
            if omega_o.z > 0.1 {
                break omega_o;
            }
        };
        let mut sum = RgbD::ZERO;
        let mut sum2 = RgbD::ZERO;
        for _ in 0..num_samples {
            let SampleIncomingResponse { omega_i, bsdf, pdf } =
                material.sample_incoming(omega_o, rd.vec3d());

            if bsdf.luminance() > 0.0 && pdf > 0.0 {
                let contrib = bsdf / pdf * omega_i.z.abs();
                sum += contrib;
                sum2 += contrib.sq();
            }
        }
        sum /= num_samples as f64;
        sum2 /= num_samples as f64;

        let variance =
            (sum2 - sum.sq()).luminance() * num_samples as f64 / (num_samples - 1) as f64;

        let std_error = (variance.abs() / num_samples as f64).sqrt();
        let confidence = (4.0 * std_error).max(1e-3);

        for channel in [sum.x, sum.y, sum.z] {
            assert_in_range!(
                channel,
                1.0 - confidence - allowed_energy_loss,
                1.0 + confidence
            );
        }
    }
}

/// Sampled directions have to be consistent with [`BSDF::evaluate`]: every direction with a
/// contribution has a positive pdf and nothing is negative.
pub fn test_bsdf_sample_eval<T: BSDF>(material: &T) {
    let mut rd = fastrand::Rng::with_seed(2);
    let runs = 10000;
    for _ in 0..runs {
        let omega_o = hemispherical_sample(&mut rd);
        let SampleIncomingResponse { omega_i, bsdf, pdf } =
            material.sample_incoming(omega_o, rd.vec3d());
        assert!(
            pdf > 0.0 || bsdf.luminance() == 0.0,
            r#"
    PDFs must be greater than 0.
    pdf: {pdf},
    bsdf: {bsdf:?},
    omega_o: {omega_o:?},
    omega_i: {omega_i:?}"#
        );
        assert_eq_approx_abs!(omega_i.length(), 1.0, 1e-6);

        assert!(pdf >= 0.0 && pdf.is_finite());
        assert!(bsdf.x >= 0.0);
        assert!(bsdf.y >= 0.0);
        assert!(bsdf.z >= 0.0);
    }
}

pub fn test_bsdf_reciprocity<T: BSDF>(material: &T) {
    let mut rd = fastrand::Rng::with_seed(3);
    let runs = 10000;
    for _i in 0..runs {
        let omega_o = hemispherical_sample(&mut rd);
        let omega_i = hemispherical_sample(&mut rd);

        let EvaluateResponse {
            bsdf: c_bsdf,
            pdf: c_pdf,
        } = material.evaluate(omega_o, omega_i);
        let EvaluateResponse {
            bsdf: r_bsdf,
            pdf: r_pdf,
        } = material.evaluate(omega_i, omega_o);

        assert!(c_pdf >= 0.0, "the pdf should always be more than 0");
        assert!(r_pdf >= 0.0, "the pdf should always be more than 0");
        assert!(c_bsdf.x >= 0.0, "the bsdf should always be positive");
        assert!(c_bsdf.y >= 0.0, "the bsdf should always be positive");
        assert!(c_bsdf.z >= 0.0, "the bsdf should always be positive");

        assert_eq_approx!(c_bsdf, r_bsdf, RgbD::splat(0.001), RgbD::splat(0.0001));
    }
}

/// Integrates `1 / pdf` with samples drawn half from the lobe and half uniformly from the
/// sphere. The result only approaches 1 if the pdf returned by [`BSDF::evaluate`] is the density
/// [`BSDF::sample_direction`] actually samples with.
pub fn test_integrate_inverse_pdf<T: BSDF>(material: &T) {
    const DOMAIN: f64 = 4.0 * std::f64::consts::PI;
    let spheric_pdf = 1.0 / DOMAIN;

    let mut rd = fastrand::Rng::with_seed(4);
    let runs = 8;
    let num_samples = 200_000;
    for i in 0..runs {
        let omega_o: Vec3d = hemispherical_sample(&mut rd);
        let mut sum = 0.0;
        let mut sum_of_squared = 0.0;
        for _ in 0..num_samples {
            let omega_i = if rd.bool() {
                material.sample_direction(omega_o, rd.vec3d())
            } else {
                spherical_sample(&mut rd)
            };
            let pdf_bsdf = material.evaluate(omega_o, omega_i).pdf;
            #[allow(clippy::suboptimal_flops)]
            let pdf = 0.5 * spheric_pdf + 0.5 * pdf_bsdf;
            let value = 1.0 / pdf;
            sum += value;
            sum_of_squared += value.sq();
        }
        sum /= DOMAIN * num_samples as f64;
        sum_of_squared /= DOMAIN.sq() * (num_samples) as f64;
        let variance_unscaled = sum_of_squared - sum.sq();

        let sample_standard_deviation =
            ((num_samples as f64) / (num_samples - 1) as f64 * variance_unscaled).sqrt();
        let standard_error = sample_standard_deviation / (num_samples as f64).sqrt();

        let confidence_thres = (4.0 * standard_error).max(2e-3);
        assert_eq_approx_abs!(
            sum,
            1.0,
            confidence_thres,
            r#"
    expected the monte carlo test to approach 1.
    But it approached {sum} after {num_samples} Samples with a standard error of {standard_error}.
    omega_o: {omega_o:?}
    i: {i}"#
        );
    }
}
