//! Expanded-grid construction: copy a chunk plus a 1-voxel halo from its
//! neighbors into a dense 34³ buffer the mesher (and the workers) can own.
//!
//! The halo is asymmetric in intent. The low halo (grid index 0) exists so
//! vertices can be placed on the negative face; the high halo (index 33)
//! exists so a chunk's positive face stitches to its neighbor's low slab.
//! When a positive-axis face neighbor is not loaded there is nothing to
//! stitch to, and the returned `skip_high_boundary` flag tells the mesher
//! to suppress the faces that would otherwise hang unconnected.

use std::collections::HashMap;

use crate::chunk::{Chunk, ChunkKey};
use crate::constants::{CHUNK_SIZE, CHUNK_VOLUME, GRID_SIZE, GRID_VOLUME, grid_index, voxel_index};
use crate::voxel::Voxel;

/// Owned, reusable 34³ voxel buffer. Acquired from the worker pool's free
/// list and returned to it after meshing.
pub type GridBuffer = Box<[Voxel; GRID_VOLUME]>;

/// Allocate a fresh air-filled grid buffer.
pub fn new_grid_buffer() -> GridBuffer {
  Box::new([Voxel::AIR; GRID_VOLUME])
}

/// Fill `out` with the chunk's voxels at `[1, 32]` per axis and the 1-voxel
/// halo sampled from the 26 surrounding chunks. Missing neighbors read as
/// air. With `prefer_temp`, any chunk (this one or a neighbor) that has a
/// staging buffer is read from staging instead of its authoritative data.
///
/// Returns `skip_high_boundary`: per axis, true iff the +axis face neighbor
/// is not loaded.
pub fn expand_chunk_to_grid(
  chunk: &Chunk,
  chunks: &HashMap<ChunkKey, Chunk>,
  out: &mut GridBuffer,
  prefer_temp: bool,
) -> [bool; 3] {
  let source = select_source(chunk, prefer_temp);

  // Interior: x rows are contiguous in both layouts.
  for z in 0..CHUNK_SIZE {
    for y in 0..CHUNK_SIZE {
      let src = voxel_index(0, y, z);
      let dst = grid_index(1, y + 1, z + 1);
      out[dst..dst + CHUNK_SIZE].copy_from_slice(&source[src..src + CHUNK_SIZE]);
    }
  }

  // Prefetch the 3x3x3 neighborhood once instead of hashing per halo voxel.
  let mut neighbors: [[[Option<&Chunk>; 3]; 3]; 3] = [[[None; 3]; 3]; 3];
  for dz in -1i32..=1 {
    for dy in -1i32..=1 {
      for dx in -1i32..=1 {
        if dx == 0 && dy == 0 && dz == 0 {
          continue;
        }
        neighbors[(dz + 1) as usize][(dy + 1) as usize][(dx + 1) as usize] =
          chunks.get(&chunk.key.offset(dx, dy, dz));
      }
    }
  }

  let size = CHUNK_SIZE as i32;
  let edge = (GRID_SIZE - 1) as usize;
  for gz in 0..GRID_SIZE {
    for gy in 0..GRID_SIZE {
      for gx in 0..GRID_SIZE {
        if gx != 0 && gx != edge && gy != 0 && gy != edge && gz != 0 && gz != edge {
          continue;
        }
        let vx = gx as i32 - 1;
        let vy = gy as i32 - 1;
        let vz = gz as i32 - 1;
        let (dx, lx) = (vx.div_euclid(size), vx.rem_euclid(size) as usize);
        let (dy, ly) = (vy.div_euclid(size), vy.rem_euclid(size) as usize);
        let (dz, lz) = (vz.div_euclid(size), vz.rem_euclid(size) as usize);
        let voxel = match neighbors[(dz + 1) as usize][(dy + 1) as usize][(dx + 1) as usize] {
          Some(neighbor) => select_source(neighbor, prefer_temp)[voxel_index(lx, ly, lz)],
          None => Voxel::AIR,
        };
        out[grid_index(gx, gy, gz)] = voxel;
      }
    }
  }

  [
    !chunks.contains_key(&chunk.key.offset(1, 0, 0)),
    !chunks.contains_key(&chunk.key.offset(0, 1, 0)),
    !chunks.contains_key(&chunk.key.offset(0, 0, 1)),
  ]
}

#[inline]
fn select_source(chunk: &Chunk, prefer_temp: bool) -> &[Voxel; CHUNK_VOLUME] {
  if prefer_temp {
    if let Some(temp) = chunk.temp_data() {
      return temp;
    }
  }
  chunk.data()
}
