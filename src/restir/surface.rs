//! Per pixel surfaces of the primary hits

use crate::{
    error::{Error, Result},
    shading::Surface,
};

/// The primary hit of every pixel, `None` where the camera ray left the scene. Row major.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GBuffer {
    width: u32,
    height: u32,
    surfaces: Vec<Option<Surface>>,
}

impl GBuffer {
    /// # Errors
    /// [`Error::DimensionMismatch`] if there is not exactly one entry per pixel.
    pub fn new(width: u32, height: u32, surfaces: Vec<Option<Surface>>) -> Result<Self> {
        let expected = width as usize * height as usize;
        if surfaces.len() != expected {
            return Err(Error::DimensionMismatch {
                name: "g-buffer",
                expected,
                actual: surfaces.len(),
            });
        }
        Ok(Self {
            width,
            height,
            surfaces,
        })
    }

    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// `None` for pixels outside of the buffer and for pixels without a hit
    #[must_use]
    pub fn get(&self, x: i64, y: i64) -> Option<&Surface> {
        if x < 0 || y < 0 || x >= i64::from(self.width) || y >= i64::from(self.height) {
            return None;
        }
        self.surfaces[self.index(x as u32, y as u32)].as_ref()
    }

    #[must_use]
    pub fn surface(&self, index: usize) -> Option<&Surface> {
        self.surfaces.get(index).and_then(Option::as_ref)
    }

    #[must_use]
    pub const fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    #[must_use]
    pub const fn coordinates(&self, index: usize) -> (u32, u32) {
        ((index % self.width as usize) as u32, (index / self.width as usize) as u32)
    }
}
