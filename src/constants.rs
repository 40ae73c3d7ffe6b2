//! Layout constants for 32³ voxel chunks and their expanded meshing grids.
//!
//! # Chunk layout
//!
//! A chunk stores `32³ = 32768` packed voxels in x-innermost order:
//!
//! ```text
//! index = x + y * 32 + z * 1024
//! ```
//!
//! This matches the documented snapshot wire order (x-major innermost), so a
//! chunk's `data` can be copied to and from the wire without reshuffling.
//!
//! # Expanded grid layout
//!
//! The mesher never reads a chunk directly. It reads a `34³` expanded grid:
//! the chunk's own voxels at indices `[1, 32]` per axis, plus a 1-voxel halo
//! at `0` and `33` sampled from the face/edge/corner neighbors. Grid sample
//! `g` therefore corresponds to chunk voxel `g - 1`.
//!
//! ```text
//!  grid index:   0    1 .. 32   33
//!                │    └──┬──┘    │
//!                │    own voxels │
//!                └ low halo      └ high halo (stitches to +axis neighbor)
//! ```

/// Voxels per chunk axis.
pub const CHUNK_SIZE: usize = 32;

/// `CHUNK_SIZE²`, the stride of the z axis in a chunk buffer.
pub const CHUNK_SIZE_SQ: usize = CHUNK_SIZE * CHUNK_SIZE;

/// Total voxels in a chunk (`32³ = 32768`).
pub const CHUNK_VOLUME: usize = CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE;

/// Samples per axis of an expanded grid (chunk plus 1-voxel halo each side).
pub const GRID_SIZE: usize = CHUNK_SIZE + 2;

/// `GRID_SIZE²`, the stride of the z axis in an expanded grid.
pub const GRID_SIZE_SQ: usize = GRID_SIZE * GRID_SIZE;

/// Total samples in an expanded grid (`34³`).
pub const GRID_VOLUME: usize = GRID_SIZE * GRID_SIZE * GRID_SIZE;

/// Cells per axis the mesher visits (`[0, CHUNK_SIZE]` inclusive).
pub const CELLS_PER_AXIS: usize = GRID_SIZE - 1;

/// World edge length of one voxel, in meters.
pub const VOXEL_SCALE: f32 = 0.25;

/// World edge length of one chunk, in meters (`32 * 0.25 = 8`).
pub const CHUNK_WORLD_SIZE: f32 = CHUNK_SIZE as f32 * VOXEL_SCALE;

/// Depth, in voxel layers, of the low-boundary slab whose changes force the
/// negative-axis neighbor to remesh (its expanded grid reads these layers
/// through its high halo).
pub const MESH_MARGIN: usize = 2;

/// Weight substituted for corners whose material is filtered out of the
/// current surface pass. Just below zero: the corner reads as barely
/// outside, so facing surfaces appear on both sides of a material-kind
/// boundary.
pub const FILTER_WEIGHT: f32 = -1e-5;

/// Gain of the signed-distance → weight mapping. One voxel of distance
/// spans the full half-weight range, so the zero crossing inside a cell
/// always interpolates between non-saturated weights.
pub const SDF_WEIGHT_GAIN: f32 = 0.5;

/// Convert chunk-local coordinates to a linear chunk-buffer index.
#[inline(always)]
pub const fn voxel_index(x: usize, y: usize, z: usize) -> usize {
  x + y * CHUNK_SIZE + z * CHUNK_SIZE_SQ
}

/// Convert a linear chunk-buffer index back to `(x, y, z)`.
#[inline(always)]
pub const fn voxel_coords(idx: usize) -> (usize, usize, usize) {
  (idx % CHUNK_SIZE, (idx / CHUNK_SIZE) % CHUNK_SIZE, idx / CHUNK_SIZE_SQ)
}

/// Convert grid-local coordinates to a linear expanded-grid index.
#[inline(always)]
pub const fn grid_index(x: usize, y: usize, z: usize) -> usize {
  x + y * GRID_SIZE + z * GRID_SIZE_SQ
}

/// Expanded-grid index offsets of the 8 corners of a cell, relative to the
/// cell origin. Corner bit layout: bit 0 = +x, bit 1 = +y, bit 2 = +z.
pub const GRID_CORNER_OFFSETS: [usize; 8] = [
  grid_index(0, 0, 0),
  grid_index(1, 0, 0),
  grid_index(0, 1, 0),
  grid_index(1, 1, 0),
  grid_index(0, 0, 1),
  grid_index(1, 0, 1),
  grid_index(0, 1, 1),
  grid_index(1, 1, 1),
];

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn voxel_index_is_x_innermost() {
    assert_eq!(voxel_index(0, 0, 0), 0);
    assert_eq!(voxel_index(1, 0, 0), 1);
    assert_eq!(voxel_index(0, 1, 0), CHUNK_SIZE);
    assert_eq!(voxel_index(0, 0, 1), CHUNK_SIZE_SQ);
    assert_eq!(
      voxel_index(CHUNK_SIZE - 1, CHUNK_SIZE - 1, CHUNK_SIZE - 1),
      CHUNK_VOLUME - 1
    );
  }

  #[test]
  fn voxel_coords_roundtrip() {
    for idx in [0, 1, 31, 32, 1023, 1024, CHUNK_VOLUME - 1] {
      let (x, y, z) = voxel_coords(idx);
      assert_eq!(voxel_index(x, y, z), idx);
    }
  }

  #[test]
  fn grid_corner_offsets_match_bits() {
    for corner in 0..8usize {
      let dx = corner & 1;
      let dy = (corner >> 1) & 1;
      let dz = (corner >> 2) & 1;
      assert_eq!(GRID_CORNER_OFFSETS[corner], grid_index(dx, dy, dz));
    }
  }
}
