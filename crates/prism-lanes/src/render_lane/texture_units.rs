// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Assignment of textures to sampler units within one batch.

use ahash::AHashMap;
use prism_core::renderer::TextureId;

/// The outcome of asking a [`TextureUnitBinder`] for a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitBinding {
    /// The texture already has this unit in the current batch.
    Resident(u32),
    /// The texture was just given this unit.
    Assigned(u32),
    /// Every unit holds another texture. The caller must flush first.
    Full,
}

impl UnitBinding {
    /// The unit, unless the table was full.
    pub fn unit(self) -> Option<u32> {
        match self {
            UnitBinding::Resident(u) | UnitBinding::Assigned(u) => Some(u),
            UnitBinding::Full => None,
        }
    }
}

/// Maps the textures of the pending batch to sampler units `0..max_units`.
///
/// Units are handed out in order, so the n-th distinct texture of a batch
/// always gets unit n. The table only empties on
/// [`TextureUnitBinder::reset_frame`], which the owning pipeline calls after
/// every flush.
#[derive(Debug, Clone)]
pub struct TextureUnitBinder {
    units: Vec<TextureId>,
    lookup: AHashMap<TextureId, u32>,
    max_units: u32,
}

impl TextureUnitBinder {
    /// Creates an empty table with `max_units` units (at least one).
    pub fn new(max_units: u32) -> Self {
        let max_units = max_units.max(1);
        Self {
            units: Vec::with_capacity(max_units as usize),
            lookup: AHashMap::with_capacity(max_units as usize),
            max_units,
        }
    }

    /// Finds or assigns the unit for `texture`.
    pub fn bind(&mut self, texture: TextureId) -> UnitBinding {
        if let Some(&unit) = self.lookup.get(&texture) {
            return UnitBinding::Resident(unit);
        }
        if self.units.len() as u32 >= self.max_units {
            return UnitBinding::Full;
        }
        let unit = self.units.len() as u32;
        self.units.push(texture);
        self.lookup.insert(texture, unit);
        UnitBinding::Assigned(unit)
    }

    /// The unit `texture` holds in the pending batch.
    pub fn unit_of(&self, texture: TextureId) -> Option<u32> {
        self.lookup.get(&texture).copied()
    }

    /// Every `(unit, texture)` pair of the pending batch, by unit.
    pub fn assignments(&self) -> impl Iterator<Item = (u32, TextureId)> + '_ {
        self.units.iter().enumerate().map(|(u, t)| (u as u32, *t))
    }

    /// The number of units in use.
    pub fn occupied(&self) -> usize {
        self.units.len()
    }

    /// The size of the table.
    pub fn max_units(&self) -> u32 {
        self.max_units
    }

    /// Empties the table.
    pub fn reset_frame(&mut self) {
        self.units.clear();
        self.lookup.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_texture_keeps_its_unit() {
        let mut binder = TextureUnitBinder::new(4);
        let a = TextureId(10);
        assert_eq!(binder.bind(a), UnitBinding::Assigned(0));
        assert_eq!(binder.bind(a), UnitBinding::Resident(0));
        assert_eq!(binder.bind(TextureId(11)), UnitBinding::Assigned(1));
        assert_eq!(binder.occupied(), 2);
    }

    #[test]
    fn full_table_refuses_new_textures_only() {
        let mut binder = TextureUnitBinder::new(2);
        binder.bind(TextureId(1));
        binder.bind(TextureId(2));
        assert_eq!(binder.bind(TextureId(3)), UnitBinding::Full);
        assert_eq!(binder.bind(TextureId(2)), UnitBinding::Resident(1));
        binder.reset_frame();
        assert_eq!(binder.bind(TextureId(3)), UnitBinding::Assigned(0));
        assert_eq!(
            binder.assignments().collect::<Vec<_>>(),
            vec![(0, TextureId(3))]
        );
    }

    #[test]
    fn zero_units_still_allows_one() {
        let mut binder = TextureUnitBinder::new(0);
        assert_eq!(binder.max_units(), 1);
        assert_eq!(binder.bind(TextureId(1)).unit(), Some(0));
        assert_eq!(binder.bind(TextureId(2)).unit(), None);
    }
}
