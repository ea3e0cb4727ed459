//! Errors raised while building materials, lookup tables and render passes.
//!
//! Shading itself never fails. Degenerate configurations are rejected here, before any
//! sample is drawn.

use thiserror::Error;

/// Main error type of this crate
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A material parameter is outside of its valid range
    #[error("Material {index}: parameter `{field}` is out of range: {value}")]
    InvalidMaterialParameter {
        index: usize,
        field: &'static str,
        value: f32,
    },

    /// Indices of refraction have to be strictly positive
    #[error("Material {index}: invalid index of refraction `{field}`: {value}")]
    InvalidIor {
        index: usize,
        field: &'static str,
        value: f32,
    },

    /// A ReSTIR setting cannot be used
    #[error("Invalid ReSTIR setting `{field}`: {reason}")]
    InvalidSetting {
        field: &'static str,
        reason: String,
    },

    /// A buffer does not match the resolution of the render pass
    #[error("Buffer `{name}` has {actual} entries, expected {expected}")]
    DimensionMismatch {
        name: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A lookup table was built from a buffer of the wrong size
    #[error("Lookup table has {actual} entries, expected {expected} for size {size:?}")]
    LutDimensionMismatch {
        size: [usize; 3],
        expected: usize,
        actual: usize,
    },

    /// A triangle references a material that is not part of the table
    #[error("Triangle {triangle} references unknown material {material}")]
    UnknownMaterial { triangle: usize, material: usize },

    /// Light sampling needs at least one emissive triangle
    #[error("The scene contains no emissive triangle")]
    NoLights,
}

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;
