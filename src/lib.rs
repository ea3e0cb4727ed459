#![warn(clippy::pedantic)]
#![warn(clippy::perf)]
#![warn(clippy::nursery)]
#![warn(clippy::suboptimal_flops)]
#![deny(clippy::return_self_not_must_use)]
#![allow(clippy::similar_names)]
#![deny(clippy::semicolon_if_nothing_returned)]
#![deny(clippy::must_use_candidate)]
#![deny(clippy::double_must_use)]
#![deny(clippy::use_self)]
#![deny(clippy::unreadable_literal)]
#![deny(clippy::explicit_iter_loop)]
// these are lints to enable later
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::module_name_repetitions)]

//! A layered principled material for pathtracing, nested dielectrics and ReSTIR direct lighting.
//!
//! # Design Decisions
//! **NOTE: This crate is pretty much in alpha state. Therefore a lot of the following things may
//! or may not change in the future**
//!
//! The [`principled::PrincipledBsdf`] stacks a coat, sheen, two metals, glass and a glossy
//! diffuse base. Every layer is a small lobe implementing the [BSDF] trait. Layers below another
//! one are attenuated by the energy the upper layer reflects.
//!
//! Lighting calculations are done exclusively in [f64]s. This is because [BSDF]s can be extremely
//! spiky. Using [f64] has helped reducing numerical errors. However, material parameters are
//! stored as [f32]s for a minimal memory footprint. Energy compensation relies on precomputed
//! lookup tables, see [`energy_compensation`].
//!
//! [BSDF]s are computed in a local space. That means, the surface is assumed to be the xy-plane
//! and the z-vector is assumed to be the normal. The principled material takes world space
//! directions and rotates them into the frames of its layers.
//!
//! The `|omega_i.dot(n)|`, `|cos theta_i|` or `|omega_i.z|` are not part of the [BSDF]. The user is
//! responsible for multiplying them in if necessary (almost always). Pdf's on the other hand,
//! are meant for high quality importance sampling. Therefore, they try to take this cosine term
//! into account when generating samples.
//!
//! Overlapping dielectrics are resolved by priorities. Every ray carries a
//! [`volume::RayVolumeState`] with the stack of objects it is inside of. Interfaces of lower
//! priority than the enclosing object are skipped.
//!
//! Sampling takes a [`random::RandomStream`]. The lobes themselves stay deterministic and are fed
//! uniformly distributed [f64]s in `0.0..1.0` as a [Vec3d].
//!
//! This crate is built on [glam] for a simple but fast vector math library at the core. ReSTIR
//! passes run on [rayon] and report through [tracing].
//!
//! # Features
//! * `principled` (default): the layered material and its lobes
//! * `restir` (default): ReSTIR DI on top of the principled material
//! * `serde`: (de)serialization of materials and settings
//!
//! # References
//! A lot of pathtracing literature went into this. Here are the most influential papers and other
//! sources:
//! * Brent Burley. Physically-based shading at Disney, course notes, revised 2014. In *ACM
//!     SIGGRAPH, Practical physically-based shading in film and game production,* 2012.
//! * Eric Heitz. Understanding the masking-shadowing function in microfacet-based brdfs.
//!     *Journal of Computer Graphics Techniques, 3(2):32–91,* 2014.
//! * Bruce Walter, Stephen R. Marschner, Hongsong Li, and Kenneth E. Torrance. Microfacet models for refraction through rough surfaces. In *Proceedings of the Eurographics Symposium on Rendering,* 2007.
//! * Eric Heitz, Sampling the GGX Distribution of Visible Normals, *Journal of Computer Graphics Techniques (JCGT)*, vol. 7, no. 4, 1–13, 2018
//!     <http://jcgt.org/published/0007/04/01/>
//! * Charles M. Schmidt and Brian Budge. Simple nested dielectrics in ray traced images.
//!     *Journal of Graphics Tools, 7(2):1–8,* 2002.
//! * Alejandro Conty Estevez and Christopher Kulla. Production Friendly Microfacet Sheen BRDF. 2017.
//! * Laurent Belcour and Pascal Barla. A Practical Extension to Microfacet Theory for the Modeling of Varying Iridescence. 2017.
//! * Benedikt Bitterli, Chris Wyman, Matt Pharr, Peter Shirley, Aaron Lefohn and Wojciech Jarosz.
//!     Spatiotemporal reservoir resampling for real-time ray tracing with dynamic direct lighting. 2020.
//! * Blenders Principled BSDF: <https://github.com/dfelinto/blender/blob/master/intern/cycles/kernel/osl/shaders/node_principled_bsdf.osl>

mod core;

pub use core::{EvaluateResponse, RgbD, RgbF, SampleIncomingResponse, Vec2d, Vec3d, BSDF};
pub use error::{Error, Result};

#[cfg(test)]
pub(crate) mod test_utils;
pub(crate) mod utils;

pub mod dispersion;
pub mod error;
pub mod frame;
pub mod fresnel;
pub mod interior_stack;
pub mod material;
pub mod random;
pub mod volume;

#[cfg(feature = "ggx")]
pub mod ggx;

#[cfg(feature = "principled")]
pub mod conductive;
#[cfg(feature = "principled")]
pub mod config;
#[cfg(feature = "principled")]
pub mod diffuse;
#[cfg(feature = "principled")]
pub mod energy_compensation;
#[cfg(feature = "principled")]
pub mod principled;
#[cfg(feature = "principled")]
pub mod rough_glass;
#[cfg(feature = "principled")]
pub mod shading;
#[cfg(feature = "principled")]
pub mod sheen;

#[cfg(feature = "restir")]
pub mod restir;
