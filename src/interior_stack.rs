//! Priority based nested dielectrics.
//!
//! A ray keeps track of the volumes it is in with a small stack. Every interface the ray reaches
//! is pushed. When volumes overlap (a liquid touching the glass around it for example) only the
//! volume with the highest priority is considered present, the interfaces of the others are skipped.
//!
//! * Charles M. Schmidt and Brian Budge. Simple nested dielectrics in ray traced images.
//!     *Journal of Graphics Tools, 7(2):1–8,* 2002.
//! * Matthias Raab. Automatic handling of materials in nested volumes. *Ray Tracing Gems,* 2019.

use arrayvec::ArrayVec;

/// Maximum number of entries, including the vacuum at the bottom
pub const INTERIOR_STACK_SIZE: usize = 8;

/// One interface the ray went through
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StackEntry {
    /// `None` is the vacuum every ray starts in
    pub material: Option<u32>,
    pub priority: u16,
    /// whether this is the most recent entry of its material
    pub topmost: bool,
    /// odd entries of a material mean the ray is inside of it
    pub odd_parity: bool,
}

impl StackEntry {
    const VACUUM: Self = Self {
        material: None,
        priority: 0,
        topmost: true,
        odd_parity: true,
    };
}

/// What happens to a ray that reaches an interface, see [`InteriorStack::push`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterfaceCrossing {
    /// The interface belongs to a volume of lower priority and has to be ignored
    pub skip: bool,
    /// The volume the ray is currently in
    pub incident: Option<u32>,
    /// The volume the ray is in after refracting through the interface
    pub outgoing: Option<u32>,
    /// The ray reached the interface from inside of the material
    pub inside_material: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteriorStack {
    entries: ArrayVec<StackEntry, INTERIOR_STACK_SIZE>,
}

impl Default for InteriorStack {
    fn default() -> Self {
        Self::new()
    }
}

impl InteriorStack {
    /// A stack with only the vacuum in it
    #[must_use]
    pub fn new() -> Self {
        let mut entries = ArrayVec::new();
        entries.push(StackEntry::VACUUM);
        Self { entries }
    }

    #[must_use]
    pub fn entries(&self) -> &[StackEntry] {
        &self.entries
    }

    /// number of entries, the vacuum included
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// the vacuum is always present, this means no volume was entered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.len() <= 1
    }

    /// The volume that currently determines ior and absorption
    #[must_use]
    pub fn effective_material(&self) -> Option<u32> {
        self.entries[self.effective_index(None)].material
    }

    /// Highest priority entry the ray is inside of. Later entries win ties.
    fn effective_index(&self, exclude: Option<usize>) -> usize {
        let mut best = 0;
        for (index, entry) in self.entries.iter().enumerate() {
            if Some(index) == exclude || !entry.topmost || !entry.odd_parity {
                continue;
            }
            if entry.priority >= self.entries[best].priority {
                best = index;
            }
        }
        best
    }

    fn previous_index_of(&self, material: Option<u32>) -> Option<usize> {
        self.entries
            .iter()
            .rposition(|entry| entry.material == material)
    }

    /// Records that the ray reached an interface of `material`.
    ///
    /// The entry stays on the stack until [`InteriorStack::pop`] is called once the scattering
    /// event at the interface is known. Skipped interfaces of a volume the ray leaves are removed
    /// right away. When the stack is full the interface is skipped.
    pub fn push(&mut self, material: u32, priority: u16) -> InterfaceCrossing {
        let effective = self.effective_index(None);
        let previous = self.previous_index_of(Some(material));

        if self.entries.is_full() {
            let current = self.entries[effective].material;
            return InterfaceCrossing {
                skip: true,
                incident: current,
                outgoing: current,
                inside_material: previous.is_some_and(|index| self.entries[index].odd_parity),
            };
        }

        let odd_parity = previous.map_or(true, |index| !self.entries[index].odd_parity);
        if let Some(index) = previous {
            self.entries[index].topmost = false;
        }
        self.entries.push(StackEntry {
            material: Some(material),
            priority,
            topmost: true,
            odd_parity,
        });

        if odd_parity {
            // entering
            InterfaceCrossing {
                skip: priority < self.entries[effective].priority,
                incident: self.entries[effective].material,
                outgoing: Some(material),
                inside_material: false,
            }
        } else {
            // leaving
            let skip = self.entries[effective].material != Some(material);
            let outgoing = self.entries[self.effective_index(previous)].material;
            if skip {
                self.pop(true);
            }
            InterfaceCrossing {
                skip,
                incident: Some(material),
                outgoing,
                inside_material: true,
            }
        }
    }

    /// Removes the entry of the last interface. If the ray left the volume (`inside`), the entry
    /// of the interface it entered through is removed as well.
    pub fn pop(&mut self, inside: bool) {
        if self.entries.len() <= 1 {
            return;
        }
        let Some(top) = self.entries.pop() else {
            return;
        };

        if inside {
            if let Some(index) = self.previous_index_of(top.material) {
                if index > 0 {
                    self.entries.remove(index);
                }
            }
        }

        if let Some(index) = self.previous_index_of(top.material) {
            self.entries[index].topmost = true;
        }
    }
}
