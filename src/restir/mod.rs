//! Direct lighting with ReSTIR DI.
//!
//! Every pixel of a [`GBuffer`] streams light samples into a [`Reservoir`]. The reservoirs are
//! then shared with the same pixel of the next frame and with neighboring pixels, which
//! multiplies the number of light samples a pixel effectively sees. The
//! [`BiasCorrectionMode`] decides how reused samples are weighted.
//!
//! Samples and their contribution weights are kept with respect to solid angle at the surface
//! they belong to. The scene is only accessed through [`SceneQueries`], so any ray tracer can
//! plug in.

pub mod bias_correction;
pub mod heuristics;
pub mod passes;
pub mod reservoir;
pub mod scene;
pub mod settings;
pub mod surface;
pub mod target_function;

pub use bias_correction::{BiasCorrection, BiasCorrectionMode};
pub use passes::ReSTIRDIRenderPass;
pub use reservoir::{ReSTIRDISample, Reservoir};
pub use scene::{HitInfo, LightScene, Ray, SceneQueries, Triangle};
pub use settings::ReSTIRDISettings;
pub use surface::GBuffer;
