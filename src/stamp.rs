//! Stamps: small prebuilt voxel patterns (trees, rocks, huts) and the
//! deterministic point generator that scatters them over terrain.
//!
//! Determinism contract: placements for a chunk derive only from
//! `(seed, cx, cz)`. Per-cell hashes seed a local RNG, so the same seed and
//! chunk produce identical placements regardless of chunk load order or
//! which neighbor asked. A stamp near a chunk edge overlaps into adjacent
//! chunks, so `generate_for_chunk` also re-derives the neighbor chunks'
//! points and returns the ones within the requested margin.

use std::borrow::Cow;
use std::sync::OnceLock;

use noise::{NoiseFn, Perlin};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::chunk::Chunk;
use crate::constants::CHUNK_SIZE;
use crate::voxel::{materials, sdf_to_weight, MaterialId, Voxel};

/// One voxel of a stamp, positioned relative to the stamp anchor (ground
/// contact point).
#[derive(Clone, Copy, Debug)]
pub struct StampCell {
  pub x: i32,
  pub y: i32,
  pub z: i32,
  pub material: MaterialId,
  pub weight: f32,
}

/// A finite voxel pattern plus its bounding box.
#[derive(Clone, Debug)]
pub struct Stamp {
  pub cells: Vec<StampCell>,
  pub min: [i32; 3],
  pub max: [i32; 3],
}

impl Stamp {
  fn from_cells(cells: Vec<StampCell>) -> Self {
    let mut min = [i32::MAX; 3];
    let mut max = [i32::MIN; 3];
    for cell in &cells {
      let p = [cell.x, cell.y, cell.z];
      for axis in 0..3 {
        min[axis] = min[axis].min(p[axis]);
        max[axis] = max[axis].max(p[axis]);
      }
    }
    if cells.is_empty() {
      min = [0; 3];
      max = [0; 3];
    }
    Self { cells, min, max }
  }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StampKind {
  Tree,
  Rock,
  Hut,
}

/// How a stamp voxel combines with what is already in the chunk.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum StampBlend {
  /// Write the stamp voxel unconditionally.
  Replace,
  /// Keep the larger weight (stamps grow out of terrain without eroding it).
  Max,
  /// Keep the smaller weight (carving stamps).
  Min,
  /// Only recolor already-solid cells.
  Paint,
}

pub const TREE_VARIANTS: usize = 4;
pub const ROCK_VARIANTS: usize = 3;

/// Fetch a stamp. Tree and rock variants are generated once and cached;
/// hut stamps are rotatable and built per call (quarter turns around Y).
pub fn get_stamp(kind: StampKind, variant: u32, rotation: u8) -> Cow<'static, Stamp> {
  match kind {
    StampKind::Tree => {
      static TREES: OnceLock<Vec<Stamp>> = OnceLock::new();
      let trees = TREES.get_or_init(|| (0..TREE_VARIANTS).map(build_tree).collect());
      Cow::Borrowed(&trees[variant as usize % TREE_VARIANTS])
    }
    StampKind::Rock => {
      static ROCKS: OnceLock<Vec<Stamp>> = OnceLock::new();
      let rocks = ROCKS.get_or_init(|| (0..ROCK_VARIANTS).map(build_rock).collect());
      Cow::Borrowed(&rocks[variant as usize % ROCK_VARIANTS])
    }
    StampKind::Hut => Cow::Owned(build_hut(rotation % 4)),
  }
}

fn build_tree(variant: usize) -> Stamp {
  let trunk_height = 5 + (variant as i32 % 3);
  let canopy_radius = 2 + (variant as i32 % 2);
  let mut cells = Vec::new();

  for y in 0..trunk_height {
    cells.push(StampCell {
      x: 0,
      y,
      z: 0,
      material: materials::WOOD,
      weight: 0.5,
    });
  }

  let center_y = trunk_height + canopy_radius - 1;
  for dz in -canopy_radius..=canopy_radius {
    for dy in -canopy_radius..=canopy_radius {
      for dx in -canopy_radius..=canopy_radius {
        let dist = ((dx * dx + dy * dy + dz * dz) as f32).sqrt();
        let weight = sdf_to_weight(dist - canopy_radius as f32);
        if weight <= -0.5 {
          continue;
        }
        if dx == 0 && dz == 0 && dy + center_y < trunk_height {
          continue;
        }
        cells.push(StampCell {
          x: dx,
          y: center_y + dy,
          z: dz,
          material: materials::LEAVES,
          weight,
        });
      }
    }
  }
  Stamp::from_cells(cells)
}

fn build_rock(variant: usize) -> Stamp {
  let radius = 2 + variant as i32;
  let mut cells = Vec::new();
  // Hemisphere sunk one voxel into the ground so it never floats.
  for dz in -radius..=radius {
    for dy in -1..=radius {
      for dx in -radius..=radius {
        let dist = ((dx * dx + dy * dy + dz * dz) as f32).sqrt();
        let weight = sdf_to_weight(dist - radius as f32 + 0.5);
        if weight <= -0.5 {
          continue;
        }
        cells.push(StampCell {
          x: dx,
          y: dy,
          z: dz,
          material: materials::ROCK,
          weight,
        });
      }
    }
  }
  Stamp::from_cells(cells)
}

fn build_hut(rotation: u8) -> Stamp {
  const HALF: i32 = 3;
  const WALL_HEIGHT: i32 = 4;
  let mut cells = Vec::new();

  for y in 0..=WALL_HEIGHT {
    for z in -HALF..=HALF {
      for x in -HALF..=HALF {
        let on_wall = x.abs() == HALF || z.abs() == HALF;
        let roof = y == WALL_HEIGHT;
        if !on_wall && !roof {
          continue;
        }
        // Door opening on the front wall.
        if z == -HALF && x.abs() <= 1 && y < 3 && !roof {
          continue;
        }
        cells.push(StampCell {
          x,
          y,
          z,
          material: materials::WOOD,
          weight: 0.5,
        });
      }
    }
  }

  for _ in 0..rotation {
    for cell in &mut cells {
      let (x, z) = (cell.x, cell.z);
      cell.x = -z;
      cell.z = x;
    }
  }
  Stamp::from_cells(cells)
}

// =============================================================================
// Point generation
// =============================================================================

/// A stamp anchored at a world voxel column.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct StampPlacement {
  /// Anchor column in world voxel coordinates.
  pub x: i32,
  pub z: i32,
  pub kind: StampKind,
  pub variant: u32,
  pub rotation: u8,
}

/// Deterministic, density-driven stamp scatterer.
pub struct StampPointGenerator {
  seed: u32,
  density: Perlin,
  min_spacing: f32,
  cell_size: i32,
}

impl StampPointGenerator {
  pub fn new(seed: u32) -> Self {
    Self {
      seed,
      density: Perlin::new(seed.wrapping_add(11)),
      min_spacing: 6.0,
      cell_size: 8,
    }
  }

  /// All placements whose anchor lies inside the chunk's XZ footprint
  /// expanded by `margin` voxels, including anchors in neighbor chunks,
  /// re-derived with the identical per-chunk computation.
  pub fn generate_for_chunk(&self, cx: i32, cz: i32, margin: i32) -> Vec<StampPlacement> {
    let size = CHUNK_SIZE as i32;
    let min_x = cx * size - margin;
    let max_x = (cx + 1) * size + margin;
    let min_z = cz * size - margin;
    let max_z = (cz + 1) * size + margin;

    let reach = 1 + (margin - 1).max(0) / size;
    let mut placements = Vec::new();
    for ncz in cz - reach..=cz + reach {
      for ncx in cx - reach..=cx + reach {
        for placement in self.points_in_chunk(ncx, ncz) {
          if placement.x >= min_x
            && placement.x < max_x
            && placement.z >= min_z
            && placement.z < max_z
          {
            placements.push(placement);
          }
        }
      }
    }
    placements
  }

  /// Stratified candidate points of one chunk: one candidate per
  /// `cell_size²` cell, jittered, thinned by the density field and a
  /// minimum-spacing rule applied in fixed cell order.
  fn points_in_chunk(&self, cx: i32, cz: i32) -> Vec<StampPlacement> {
    let size = CHUNK_SIZE as i32;
    let cells = size / self.cell_size;
    let mut accepted: Vec<(f32, f32)> = Vec::new();
    let mut out = Vec::new();

    for gz in 0..cells {
      for gx in 0..cells {
        let cell_index = (gz * cells + gx) as u32;
        let mut rng = SmallRng::seed_from_u64(cell_hash(self.seed, cx, cz, cell_index));

        let px = (cx * size + gx * self.cell_size) as f32
          + rng.random::<f32>() * self.cell_size as f32;
        let pz = (cz * size + gz * self.cell_size) as f32
          + rng.random::<f32>() * self.cell_size as f32;

        let density = self.density.get([px as f64 * 0.02, pz as f64 * 0.02]);
        if density < 0.0 {
          continue;
        }
        if rng.random::<f64>() > density + 0.2 {
          continue;
        }
        let spaced = accepted.iter().all(|&(ax, az)| {
          let dx = ax - px;
          let dz = az - pz;
          dx * dx + dz * dz >= self.min_spacing * self.min_spacing
        });
        if !spaced {
          continue;
        }
        accepted.push((px, pz));

        let roll: f32 = rng.random();
        let kind = if roll < 0.04 {
          StampKind::Hut
        } else if density > 0.45 || roll < 0.7 {
          StampKind::Tree
        } else {
          StampKind::Rock
        };
        out.push(StampPlacement {
          x: px.floor() as i32,
          z: pz.floor() as i32,
          kind,
          variant: rng.random_range(0..TREE_VARIANTS as u32),
          rotation: rng.random_range(0..4u8),
        });
      }
    }
    out
  }
}

/// splitmix64 over the placement cell identity.
fn cell_hash(seed: u32, cx: i32, cz: i32, cell: u32) -> u64 {
  let mut x = (seed as u64)
    ^ (cx as i64 as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
    ^ (cz as i64 as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
    ^ (cell as u64).wrapping_mul(0xD6E8_FEB8_6659_FD93);
  x ^= x >> 30;
  x = x.wrapping_mul(0xBF58_476D_1CE4_E5B9);
  x ^= x >> 27;
  x = x.wrapping_mul(0x94D0_49BB_1331_11EB);
  x ^ (x >> 31)
}

// =============================================================================
// Placement into chunks
// =============================================================================

/// Writes stamp cells into a chunk, anchored at a placement column and a
/// terrain surface height.
pub struct StampPlacer;

impl StampPlacer {
  /// Write every stamp cell that lands inside the chunk. `surface_y` is
  /// the world voxel height of the ground at the anchor column.
  pub fn place(
    chunk: &mut Chunk,
    placement: &StampPlacement,
    stamp: &Stamp,
    surface_y: i32,
    blend: StampBlend,
  ) {
    let size = CHUNK_SIZE as i32;
    let origin_x = chunk.key.x * size;
    let origin_y = chunk.key.y * size;
    let origin_z = chunk.key.z * size;

    for cell in &stamp.cells {
      let lx = placement.x + cell.x - origin_x;
      let ly = surface_y + cell.y - origin_y;
      let lz = placement.z + cell.z - origin_z;
      if !(0..size).contains(&lx) || !(0..size).contains(&ly) || !(0..size).contains(&lz) {
        continue;
      }
      let old = chunk.get_voxel(lx, ly, lz);
      let new = match blend {
        StampBlend::Replace => Some(Voxel::pack(cell.weight, cell.material, 0)),
        StampBlend::Max => {
          (cell.weight > old.weight()).then(|| Voxel::pack(cell.weight, cell.material, 0))
        }
        StampBlend::Min => {
          (cell.weight < old.weight()).then(|| Voxel::pack(cell.weight, cell.material, 0))
        }
        StampBlend::Paint => (old.weight() > 0.0).then(|| old.with_material(cell.material)),
      };
      if let Some(voxel) = new {
        if voxel != old {
          chunk.set_voxel(lx, ly, lz, voxel);
        }
      }
    }
  }
}

#[cfg(test)]
#[path = "stamp_test.rs"]
mod stamp_test;
