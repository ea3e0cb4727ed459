//! State a ray carries through nested volumes

use crate::{
    interior_stack::InteriorStack,
    material::{Material, MaterialTable},
    utils::{SafeCast, VecExt},
    RgbD,
};

/// How the light interacted with an interface, decided when a lobe is sampled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScatterEvent {
    /// The ray stays on the side it came from
    Reflection,
    /// The ray crosses the interface and changes volume
    Refraction,
    /// The ray crosses a thin walled interface. It enters and leaves in one go.
    ThinTransmission,
}

/// Created for every camera ray and updated at each interface the ray crosses
#[derive(Clone, Debug, PartialEq)]
pub struct RayVolumeState {
    /// Volume the ray travels in. `None` is vacuum.
    pub incident_material: Option<u32>,

    /// Volume the ray ends up in if it refracts through the current interface
    pub outgoing_material: Option<u32>,

    pub interior_stack: InteriorStack,

    /// The current interface is left from inside of its volume
    pub inside_material: bool,

    /// Distance travelled since the last volume change. Drives Beer-Lambert absorption.
    pub distance_in_volume: f64,

    /// Wavelength in nanometers the ray was restricted to by a dispersive glass, `0.0` for none
    pub sampled_wavelength: f64,

    /// an interface was pushed and waits for its scattering event
    pending_interface: bool,
}

impl Default for RayVolumeState {
    fn default() -> Self {
        Self {
            incident_material: None,
            outgoing_material: None,
            interior_stack: InteriorStack::new(),
            inside_material: false,
            distance_in_volume: 0.0,
            sampled_wavelength: 0.0,
            pending_interface: false,
        }
    }
}

impl RayVolumeState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes the interface of `material_index` onto the interior stack and resolves the volumes
    /// on both sides of it. Returns `true` if the interface must be skipped, the ray then
    /// continues in its direction as if nothing was hit.
    pub fn reach_interface(&mut self, material_index: u32, priority: u16) -> bool {
        let crossing = self.interior_stack.push(material_index, priority);
        self.incident_material = crossing.incident;
        self.outgoing_material = crossing.outgoing;
        self.inside_material = crossing.inside_material;
        self.pending_interface = !crossing.skip;
        crossing.skip
    }

    /// Lets the ray through the current interface without scattering
    pub fn skip_interface(&mut self) {
        self.pending_interface = false;
    }

    /// Updates the interior stack once the scattering event at the last reached interface is known
    pub fn apply_scatter(&mut self, event: ScatterEvent) {
        if !self.pending_interface {
            return;
        }
        self.pending_interface = false;
        match event {
            ScatterEvent::Reflection | ScatterEvent::ThinTransmission => {
                self.interior_stack.pop(false);
            }
            ScatterEvent::Refraction => {
                self.distance_in_volume = 0.0;
                if self.inside_material {
                    self.interior_stack.pop(true);
                }
            }
        }
    }

    /// Accumulates the distance the ray travelled inside its current volume
    pub fn advance(&mut self, distance: f64) {
        if self.interior_stack.effective_material().is_some() {
            self.distance_in_volume += distance;
        }
    }

    #[must_use]
    pub fn incident_ior(&self, materials: &MaterialTable) -> f64 {
        materials.ior(self.incident_material)
    }

    #[must_use]
    pub fn outgoing_ior(&self, materials: &MaterialTable) -> f64 {
        materials.ior(self.outgoing_material)
    }
}

/// Beer-Lambert transmittance after travelling `distance` through `material`.
///
/// The absorption coefficient is remapped so that the transmittance is exactly
/// `absorption_color` at `absorption_at_distance`.
#[must_use]
pub fn beer_lambert(material: &Material, distance: f64) -> RgbD {
    let absorption_color: RgbD = material.absorption_color.safe_cast();
    if absorption_color.is_white() {
        return RgbD::ONE;
    }
    let coefficient = absorption_color.max(RgbD::splat(1e-8)).ln()
        / f64::from(material.absorption_at_distance);
    (coefficient * distance).exp()
}
