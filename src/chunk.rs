//! Chunk storage: a 32³ voxel cube on the integer chunk lattice, with an
//! optional staging copy used by the build preview.
//!
//! The chunk map (`world::VoxelWorld`) exclusively owns every chunk. A chunk
//! never holds references to its neighbors; margin reads resolve neighbors
//! through the map on demand, which keeps unloading trivial and cycle-free.

use std::collections::HashMap;
use std::fmt;

use glam::Vec3;

use crate::constants::{CHUNK_SIZE, CHUNK_VOLUME, CHUNK_WORLD_SIZE, MESH_MARGIN, voxel_index};
use crate::voxel::Voxel;

/// Position of a chunk on the integer chunk lattice.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, PartialOrd, Ord)]
pub struct ChunkKey {
  pub x: i32,
  pub y: i32,
  pub z: i32,
}

impl ChunkKey {
  pub const fn new(x: i32, y: i32, z: i32) -> Self {
    Self { x, y, z }
  }

  /// Key of the chunk containing a world-space position.
  pub fn from_world(pos: Vec3) -> Self {
    Self {
      x: (pos.x / CHUNK_WORLD_SIZE).floor() as i32,
      y: (pos.y / CHUNK_WORLD_SIZE).floor() as i32,
      z: (pos.z / CHUNK_WORLD_SIZE).floor() as i32,
    }
  }

  /// Key offset by a lattice delta.
  pub const fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
    Self {
      x: self.x + dx,
      y: self.y + dy,
      z: self.z + dz,
    }
  }

  /// Chebyshev (L∞) distance to another key, in chunks.
  pub fn linf_distance(self, other: ChunkKey) -> i32 {
    (self.x - other.x)
      .abs()
      .max((self.y - other.y).abs())
      .max((self.z - other.z).abs())
  }

  /// Chunk origin in voxel-lattice units (not meters).
  pub fn origin_voxels(self) -> Vec3 {
    Vec3::new(
      self.x as f32 * CHUNK_SIZE as f32,
      self.y as f32 * CHUNK_SIZE as f32,
      self.z as f32 * CHUNK_SIZE as f32,
    )
  }
}

impl fmt::Display for ChunkKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{},{},{}", self.x, self.y, self.z)
  }
}

/// Dense voxel buffer of one chunk.
pub type ChunkData = Box<[Voxel; CHUNK_VOLUME]>;

fn new_chunk_data() -> ChunkData {
  Box::new([Voxel::AIR; CHUNK_VOLUME])
}

/// One 32³ voxel volume.
pub struct Chunk {
  pub key: ChunkKey,
  data: ChunkData,
  temp_data: Option<ChunkData>,
  /// Mesh out of date relative to `data`.
  pub dirty: bool,
}

impl Chunk {
  /// Create an air-filled chunk at the given lattice position.
  pub fn new(key: ChunkKey) -> Self {
    Self {
      key,
      data: new_chunk_data(),
      temp_data: None,
      dirty: false,
    }
  }

  /// Read a voxel. Out-of-bounds coordinates read as air.
  #[inline]
  pub fn get_voxel(&self, x: i32, y: i32, z: i32) -> Voxel {
    if !in_bounds(x) || !in_bounds(y) || !in_bounds(z) {
      return Voxel::AIR;
    }
    self.data[voxel_index(x as usize, y as usize, z as usize)]
  }

  /// Write a voxel and mark the chunk dirty. Out-of-bounds writes no-op.
  #[inline]
  pub fn set_voxel(&mut self, x: i32, y: i32, z: i32, voxel: Voxel) {
    if !in_bounds(x) || !in_bounds(y) || !in_bounds(z) {
      debug_assert!(false, "voxel write out of bounds: ({x}, {y}, {z})");
      return;
    }
    self.data[voxel_index(x as usize, y as usize, z as usize)] = voxel;
    self.dirty = true;
  }

  /// Read a voxel with a one-voxel margin: coordinates in `[-1, 32]`
  /// resolve through the neighbor chunk on that side (including edge and
  /// corner diagonals). Missing neighbors read as air.
  pub fn get_voxel_with_margin(
    &self,
    x: i32,
    y: i32,
    z: i32,
    chunks: &HashMap<ChunkKey, Chunk>,
  ) -> Voxel {
    let size = CHUNK_SIZE as i32;
    debug_assert!(
      (-1..=size).contains(&x) && (-1..=size).contains(&y) && (-1..=size).contains(&z),
      "margin read out of range: ({x}, {y}, {z})"
    );
    let (dx, lx) = (x.div_euclid(size), x.rem_euclid(size));
    let (dy, ly) = (y.div_euclid(size), y.rem_euclid(size));
    let (dz, lz) = (z.div_euclid(size), z.rem_euclid(size));
    if dx == 0 && dy == 0 && dz == 0 {
      return self.get_voxel(lx, ly, lz);
    }
    chunks
      .get(&self.key.offset(dx, dy, dz))
      .map_or(Voxel::AIR, |c| c.get_voxel(lx, ly, lz))
  }

  /// Authoritative voxel buffer.
  #[inline(always)]
  pub fn data(&self) -> &[Voxel; CHUNK_VOLUME] {
    &self.data
  }

  /// Mutable authoritative buffer. The caller is responsible for marking
  /// the chunk dirty when it changes anything.
  #[inline(always)]
  pub fn data_mut(&mut self) -> &mut [Voxel; CHUNK_VOLUME] {
    &mut self.data
  }

  /// Staging buffer, if a preview currently touches this chunk.
  #[inline(always)]
  pub fn temp_data(&self) -> Option<&[Voxel; CHUNK_VOLUME]> {
    self.temp_data.as_deref()
  }

  /// Mutable staging buffer.
  #[inline(always)]
  pub fn temp_data_mut(&mut self) -> Option<&mut [Voxel; CHUNK_VOLUME]> {
    self.temp_data.as_deref_mut()
  }

  #[inline(always)]
  pub fn has_temp(&self) -> bool {
    self.temp_data.is_some()
  }

  /// Refresh the staging buffer from `data`, allocating it if absent.
  /// Idempotent: repeated calls leave the same staging contents.
  pub fn copy_to_temp(&mut self) {
    match &mut self.temp_data {
      Some(temp) => temp.copy_from_slice(&self.data[..]),
      None => self.temp_data = Some(self.data.clone()),
    }
  }

  /// Free the staging buffer.
  pub fn discard_temp(&mut self) {
    self.temp_data = None;
  }

  /// Promote the staging buffer into `data` and mark the chunk dirty.
  /// The staging buffer is kept; the caller discards it.
  pub fn copy_from_temp(&mut self) {
    if let Some(temp) = &self.temp_data {
      self.data.copy_from_slice(&temp[..]);
      self.dirty = true;
    }
  }

  /// Serialize as the documented out-of-band snapshot encoding:
  /// little-endian `(x, y, z)` as `i32`, then 32768 voxels in x-innermost
  /// order as little-endian `u16`.
  pub fn to_bytes(&self) -> Vec<u8> {
    let mut out = Vec::with_capacity(12 + CHUNK_VOLUME * 2);
    out.extend_from_slice(&self.key.x.to_le_bytes());
    out.extend_from_slice(&self.key.y.to_le_bytes());
    out.extend_from_slice(&self.key.z.to_le_bytes());
    for voxel in self.data.iter() {
      out.extend_from_slice(&voxel.raw().to_le_bytes());
    }
    out
  }

  /// Decode a snapshot produced by [`Chunk::to_bytes`]. Returns `None` on a
  /// length mismatch.
  pub fn from_bytes(bytes: &[u8]) -> Option<Chunk> {
    if bytes.len() != 12 + CHUNK_VOLUME * 2 {
      return None;
    }
    let i32_at = |off: usize| i32::from_le_bytes(bytes[off..off + 4].try_into().unwrap());
    let key = ChunkKey::new(i32_at(0), i32_at(4), i32_at(8));
    let mut chunk = Chunk::new(key);
    for (i, voxel) in chunk.data.iter_mut().enumerate() {
      let off = 12 + i * 2;
      *voxel = Voxel::from_raw(u16::from_le_bytes([bytes[off], bytes[off + 1]]));
    }
    Some(chunk)
  }
}

#[inline(always)]
fn in_bounds(c: i32) -> bool {
  (0..CHUNK_SIZE as i32).contains(&c)
}

/// True iff any voxel in the low `MESH_MARGIN` layers of `axis` differs
/// between the two buffers. When a drawn edit changes these layers, the
/// negative-axis neighbor's expanded grid sees the change through its high
/// halo and must remesh too.
pub fn has_boundary_changes(
  a: &[Voxel; CHUNK_VOLUME],
  b: &[Voxel; CHUNK_VOLUME],
  axis: usize,
) -> bool {
  debug_assert!(axis < 3);
  for layer in 0..MESH_MARGIN {
    for u in 0..CHUNK_SIZE {
      for v in 0..CHUNK_SIZE {
        let idx = match axis {
          0 => voxel_index(layer, u, v),
          1 => voxel_index(u, layer, v),
          _ => voxel_index(u, v, layer),
        };
        if a[idx] != b[idx] {
          return true;
        }
      }
    }
  }
  false
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::voxel::materials;

  #[test]
  fn out_of_bounds_reads_air_and_writes_mark_dirty() {
    let mut chunk = Chunk::new(ChunkKey::new(0, 0, 0));
    assert_eq!(chunk.get_voxel(-1, 0, 0), Voxel::AIR);
    assert_eq!(chunk.get_voxel(0, 32, 0), Voxel::AIR);
    assert!(!chunk.dirty);
    chunk.set_voxel(5, 5, 5, Voxel::pack(0.4, materials::STONE, 0));
    assert!(chunk.dirty);
    assert_eq!(chunk.get_voxel(5, 5, 5).material(), materials::STONE);
  }

  #[test]
  fn margin_reads_resolve_face_edge_and_corner_neighbors() {
    let mut chunks = HashMap::new();
    let key = ChunkKey::new(0, 0, 0);

    let mut face = Chunk::new(ChunkKey::new(-1, 0, 0));
    face.set_voxel(31, 7, 7, Voxel::pack(0.5, materials::DIRT, 0));
    chunks.insert(face.key, face);

    let mut corner = Chunk::new(ChunkKey::new(1, 1, 1));
    corner.set_voxel(0, 0, 0, Voxel::pack(0.5, materials::SAND, 0));
    chunks.insert(corner.key, corner);

    let chunk = Chunk::new(key);
    assert_eq!(
      chunk.get_voxel_with_margin(-1, 7, 7, &chunks).material(),
      materials::DIRT
    );
    assert_eq!(
      chunk.get_voxel_with_margin(32, 32, 32, &chunks).material(),
      materials::SAND
    );
    // Absent neighbor reads as air.
    assert_eq!(chunk.get_voxel_with_margin(7, -1, 7, &chunks), Voxel::AIR);
  }

  #[test]
  fn temp_lifecycle() {
    let mut chunk = Chunk::new(ChunkKey::new(0, 0, 0));
    chunk.set_voxel(1, 2, 3, Voxel::pack(0.4, materials::STONE, 0));
    chunk.dirty = false;

    chunk.copy_to_temp();
    assert!(chunk.has_temp());
    assert_eq!(
      chunk.temp_data().unwrap()[voxel_index(1, 2, 3)],
      chunk.get_voxel(1, 2, 3)
    );

    // Draw into staging; data is untouched.
    chunk.temp_data_mut().unwrap()[voxel_index(9, 9, 9)] = Voxel::pack(0.5, materials::SAND, 0);
    assert_eq!(chunk.get_voxel(9, 9, 9), Voxel::AIR);
    assert!(!chunk.dirty);

    // copy_to_temp refreshes staging from data, dropping the staged edit.
    chunk.copy_to_temp();
    assert_eq!(chunk.temp_data().unwrap()[voxel_index(9, 9, 9)], Voxel::AIR);

    // Promote and discard.
    chunk.temp_data_mut().unwrap()[voxel_index(9, 9, 9)] = Voxel::pack(0.5, materials::SAND, 0);
    chunk.copy_from_temp();
    assert!(chunk.dirty);
    assert!(chunk.has_temp());
    chunk.discard_temp();
    assert!(!chunk.has_temp());
    assert_eq!(chunk.get_voxel(9, 9, 9).material(), materials::SAND);
  }

  #[test]
  fn snapshot_roundtrip() {
    let mut chunk = Chunk::new(ChunkKey::new(-3, 1, 12));
    chunk.set_voxel(0, 0, 0, Voxel::pack(0.25, materials::GRASS, 2));
    chunk.set_voxel(31, 31, 31, Voxel::pack(-0.25, materials::WATER, 0));

    let bytes = chunk.to_bytes();
    let decoded = Chunk::from_bytes(&bytes).unwrap();
    assert_eq!(decoded.key, chunk.key);
    assert_eq!(decoded.data()[..], chunk.data()[..]);

    assert!(Chunk::from_bytes(&bytes[1..]).is_none());
  }

  #[test]
  fn boundary_change_detection_scans_two_layers() {
    let a = Chunk::new(ChunkKey::new(0, 0, 0));
    let mut b = Chunk::new(ChunkKey::new(0, 0, 0));

    b.set_voxel(1, 16, 16, Voxel::pack(0.5, materials::STONE, 0));
    assert!(has_boundary_changes(a.data(), b.data(), 0));
    assert!(!has_boundary_changes(a.data(), b.data(), 1));
    assert!(!has_boundary_changes(a.data(), b.data(), 2));

    let mut c = Chunk::new(ChunkKey::new(0, 0, 0));
    c.set_voxel(16, 16, 2, Voxel::pack(0.5, materials::STONE, 0));
    // Layer 2 is outside the margin on every axis.
    assert!(!has_boundary_changes(a.data(), c.data(), 2));
  }
}
