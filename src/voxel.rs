//! Packed 16-bit voxel codec and the material-kind lookup table.
//!
//! # Bit layout
//!
//! ```text
//! 15          11 10      7 6             0
//! ┌─────────────┬─────────┬───────────────┐
//! │  weight (5) │ flags(4)│  material (7) │
//! └─────────────┴─────────┴───────────────┘
//! ```
//!
//! The 5-bit weight field stores `w5 ∈ [0, 31]`, decoded as
//! `w5 / 31 - 0.5`, so weights cover `[-0.5, +0.5]`. Negative weights are
//! outside the surface, positive weights inside. Every 16-bit value decodes;
//! encoding quantizes the weight to the nearest of the 32 levels
//! (round-trip error ≤ 1/62).
//!
//! Material 0 is air by convention: terrain generators write it for empty
//! cells and the mesher treats it as belonging to every surface pass.

use crate::constants::SDF_WEIGHT_GAIN;

/// Palette index of a voxel material (`0..128`).
pub type MaterialId = u8;

const MATERIAL_MASK: u16 = 0x007F;
const FLAGS_SHIFT: u16 = 7;
const FLAGS_MASK: u16 = 0x000F;
const WEIGHT_SHIFT: u16 = 11;
const WEIGHT_MASK: u16 = 0x001F;

/// One packed voxel cell.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Voxel(u16);

impl Voxel {
  /// The empty cell: weight -0.5, material 0, flags 0.
  pub const AIR: Voxel = Voxel(0);

  /// Pack a weight, material and flag nibble into a voxel.
  ///
  /// The weight is clamped to `[-0.5, +0.5]` and quantized to 5 bits;
  /// material and flags are masked to their field widths.
  #[inline]
  pub fn pack(weight: f32, material: MaterialId, flags: u8) -> Voxel {
    let w5 = ((weight.clamp(-0.5, 0.5) + 0.5) * 31.0).round() as u16;
    Voxel(
      (w5 & WEIGHT_MASK) << WEIGHT_SHIFT
        | (flags as u16 & FLAGS_MASK) << FLAGS_SHIFT
        | (material as u16 & MATERIAL_MASK),
    )
  }

  /// Reinterpret a raw 16-bit value as a voxel. Total: every value decodes.
  #[inline(always)]
  pub const fn from_raw(raw: u16) -> Voxel {
    Voxel(raw)
  }

  /// The raw packed representation.
  #[inline(always)]
  pub const fn raw(self) -> u16 {
    self.0
  }

  /// Decode all three fields at once. Inverse of [`Voxel::pack`] up to
  /// weight quantization.
  #[inline]
  pub fn unpack(self) -> (f32, MaterialId, u8) {
    (self.weight(), self.material(), self.flags())
  }

  /// Decoded weight in `[-0.5, +0.5]`.
  #[inline(always)]
  pub fn weight(self) -> f32 {
    ((self.0 >> WEIGHT_SHIFT) & WEIGHT_MASK) as f32 / 31.0 - 0.5
  }

  /// Material palette index.
  #[inline(always)]
  pub const fn material(self) -> MaterialId {
    (self.0 & MATERIAL_MASK) as u8
  }

  /// Reserved flag nibble. No runtime semantics.
  #[inline(always)]
  pub const fn flags(self) -> u8 {
    ((self.0 >> FLAGS_SHIFT) & FLAGS_MASK) as u8
  }

  /// Copy of this voxel with the material replaced and weight/flags kept.
  #[inline]
  pub const fn with_material(self, material: MaterialId) -> Voxel {
    Voxel(self.0 & !MATERIAL_MASK | (material as u16 & MATERIAL_MASK))
  }

  /// Copy of this voxel with the weight replaced and material/flags kept.
  #[inline]
  pub fn with_weight(self, weight: f32) -> Voxel {
    let w5 = ((weight.clamp(-0.5, 0.5) + 0.5) * 31.0).round() as u16;
    Voxel(self.0 & !(WEIGHT_MASK << WEIGHT_SHIFT) | (w5 & WEIGHT_MASK) << WEIGHT_SHIFT)
  }
}

impl std::fmt::Debug for Voxel {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Voxel")
      .field("weight", &self.weight())
      .field("material", &self.material())
      .field("flags", &self.flags())
      .finish()
  }
}

/// Map a signed-distance sample (voxel units, negative inside) into the
/// weight domain: `clamp(-sdf * SDF_WEIGHT_GAIN, -0.5, +0.5)`.
///
/// Monotone decreasing in `sdf`, so deeper inside the shape means a larger
/// weight; saturates one voxel away from the surface on either side.
#[inline(always)]
pub fn sdf_to_weight(sdf: f32) -> f32 {
  (-sdf * SDF_WEIGHT_GAIN).clamp(-0.5, 0.5)
}

// =============================================================================
// Material kinds
// =============================================================================

/// Render classification of a material: which of the three chunk surfaces
/// its cells contribute to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[repr(u8)]
pub enum MaterialKind {
  Solid = 0,
  Transparent = 1,
  Liquid = 2,
}

/// Well-known palette indices used by the reference terrain and stamps.
pub mod materials {
  use super::MaterialId;

  pub const AIR: MaterialId = 0;
  pub const GRASS: MaterialId = 1;
  pub const DIRT: MaterialId = 2;
  pub const STONE: MaterialId = 3;
  pub const SAND: MaterialId = 4;
  pub const WATER: MaterialId = 5;
  pub const GLASS: MaterialId = 6;
  pub const LEAVES: MaterialId = 7;
  pub const WOOD: MaterialId = 8;
  pub const ROCK: MaterialId = 9;
  pub const ICE: MaterialId = 10;
}

/// Number of palette slots.
pub const MATERIAL_COUNT: usize = 128;

/// Process-wide material classification table. Built once at compile time
/// and never mutated.
pub const MATERIAL_KINDS: [MaterialKind; MATERIAL_COUNT] = build_material_kinds();

const fn build_material_kinds() -> [MaterialKind; MATERIAL_COUNT] {
  let mut kinds = [MaterialKind::Solid; MATERIAL_COUNT];
  kinds[materials::WATER as usize] = MaterialKind::Liquid;
  kinds[materials::GLASS as usize] = MaterialKind::Transparent;
  kinds[materials::ICE as usize] = MaterialKind::Transparent;
  kinds
}

/// Look up the kind of a material. The top palette bit is masked so any
/// `u8` is a valid query.
#[inline(always)]
pub fn material_kind(material: MaterialId) -> MaterialKind {
  MATERIAL_KINDS[(material & 0x7F) as usize]
}

#[cfg(test)]
#[path = "voxel_test.rs"]
mod voxel_test;
