//! Terrain generation: the pluggable chunk-fill interface and a layered
//! noise reference implementation.
//!
//! The world invokes [`ChunkFiller::fill_chunk`] exactly once, when a chunk
//! first enters the visibility radius. Implementations must be
//! deterministic per `(seed, chunk)`: the same chunk regenerates
//! identically no matter the load order.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};

use crate::chunk::Chunk;
use crate::constants::CHUNK_SIZE;
use crate::stamp::{get_stamp, StampBlend, StampPointGenerator};
use crate::voxel::{materials, sdf_to_weight, Voxel};

/// Fills a freshly created chunk with terrain.
pub trait ChunkFiller {
  fn fill_chunk(&self, chunk: &mut Chunk);
}

/// Flat ground at a fixed voxel height. The baseline world for tests and
/// scenarios: solid below `height`, air above.
pub struct FlatTerrain {
  pub height: f32,
  pub material: u8,
}

impl FlatTerrain {
  pub fn new(height: f32) -> Self {
    Self {
      height,
      material: materials::GRASS,
    }
  }
}

impl ChunkFiller for FlatTerrain {
  fn fill_chunk(&self, chunk: &mut Chunk) {
    let size = CHUNK_SIZE as i32;
    let origin_y = chunk.key.y * size;
    for z in 0..size {
      for y in 0..size {
        let wy = (origin_y + y) as f32 + 0.5;
        let weight = sdf_to_weight(wy - self.height);
        if weight <= -0.5 {
          continue;
        }
        let voxel = Voxel::pack(weight, self.material, 0);
        for x in 0..size {
          chunk.set_voxel(x, y, z, voxel);
        }
      }
    }
  }
}

/// Layered-noise terrain: domain-warped fBm elevation, height-banded
/// materials, water below sea level, then deterministic stamp placement.
pub struct NoiseTerrain {
  seed: u32,
  elevation: Fbm<Perlin>,
  warp: Perlin,
  detail: Perlin,
  stamps: StampPointGenerator,
  /// Base ground height in voxels.
  pub base_height: f64,
  /// Elevation amplitude in voxels.
  pub amplitude: f64,
  /// Water surface height in voxels.
  pub sea_level: f64,
  /// Place stamps on the generated surface.
  pub stamps_enabled: bool,
}

/// How far (in voxels) a stamp anchored in a neighbor chunk can reach into
/// this one. Must cover the widest stamp's XZ extent.
const STAMP_MARGIN: i32 = 8;

impl NoiseTerrain {
  pub fn new(seed: u32) -> Self {
    Self {
      seed,
      elevation: Fbm::<Perlin>::new(seed)
        .set_octaves(4)
        .set_frequency(0.008)
        .set_persistence(0.5),
      warp: Perlin::new(seed.wrapping_add(1)),
      detail: Perlin::new(seed.wrapping_add(2)),
      stamps: StampPointGenerator::new(seed),
      base_height: 12.0,
      amplitude: 18.0,
      sea_level: 8.0,
      stamps_enabled: true,
    }
  }

  pub fn seed(&self) -> u32 {
    self.seed
  }

  /// Terrain surface height at a world voxel column, in voxels.
  pub fn height_at(&self, wx: f64, wz: f64) -> f64 {
    // Low-frequency domain warp breaks up the fBm's grid alignment.
    let warp_x = self.warp.get([wx * 0.003, wz * 0.003]) * 40.0;
    let warp_z = self.warp.get([wx * 0.003 + 100.0, wz * 0.003 + 100.0]) * 40.0;
    let elevation = self.elevation.get([wx + warp_x, wz + warp_z]);
    let detail = self.detail.get([wx * 0.1, wz * 0.1]) * 1.5;
    self.base_height + elevation * self.amplitude + detail
  }

  fn material_for(&self, depth: f64, surface: f64) -> u8 {
    if depth <= 1.0 {
      if surface < self.sea_level + 1.5 {
        materials::SAND
      } else {
        materials::GRASS
      }
    } else if depth <= 4.0 {
      materials::DIRT
    } else {
      materials::STONE
    }
  }
}

impl ChunkFiller for NoiseTerrain {
  fn fill_chunk(&self, chunk: &mut Chunk) {
    let size = CHUNK_SIZE as i32;
    let origin = chunk.key.origin_voxels();

    for z in 0..size {
      for x in 0..size {
        let wx = (origin.x + x as f32) as f64 + 0.5;
        let wz = (origin.z + z as f32) as f64 + 0.5;
        let surface = self.height_at(wx, wz);

        for y in 0..size {
          let wy = (origin.y + y as f32) as f64 + 0.5;
          let ground = sdf_to_weight((wy - surface) as f32);
          if ground > -0.5 {
            let depth = surface - wy;
            let material = if ground >= 0.0 {
              self.material_for(depth, surface)
            } else {
              materials::AIR
            };
            chunk.set_voxel(x, y, z, Voxel::pack(ground, material, 0));
          } else if wy < self.sea_level {
            let water = sdf_to_weight((wy - self.sea_level) as f32);
            chunk.set_voxel(x, y, z, Voxel::pack(water, materials::WATER, 0));
          }
        }
      }
    }

    if self.stamps_enabled {
      self.place_stamps(chunk);
    }
  }
}

impl NoiseTerrain {
  fn place_stamps(&self, chunk: &mut Chunk) {
    let size = CHUNK_SIZE as i32;
    let placements = self
      .stamps
      .generate_for_chunk(chunk.key.x, chunk.key.z, STAMP_MARGIN);

    for placement in &placements {
      let surface = self
        .height_at(placement.x as f64 + 0.5, placement.z as f64 + 0.5)
        .floor();
      // No stamps under water.
      if surface < self.sea_level {
        continue;
      }
      let surface_y = surface as i32;
      let stamp = get_stamp(placement.kind, placement.variant, placement.rotation);

      // Skip when the stamp's vertical extent misses this chunk entirely.
      let chunk_min_y = chunk.key.y * size;
      let chunk_max_y = chunk_min_y + size;
      if surface_y + stamp.max[1] < chunk_min_y || surface_y + stamp.min[1] >= chunk_max_y {
        continue;
      }
      crate::stamp::StampPlacer::place(chunk, placement, &stamp, surface_y, StampBlend::Max);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::chunk::ChunkKey;
  use crate::constants::CHUNK_VOLUME;

  #[test]
  fn flat_terrain_splits_solid_from_air() {
    let mut chunk = Chunk::new(ChunkKey::new(0, 0, 0));
    FlatTerrain::new(2.5).fill_chunk(&mut chunk);

    assert!(chunk.get_voxel(5, 0, 5).weight() > 0.0);
    assert!(chunk.get_voxel(5, 1, 5).weight() > 0.0);
    assert!(chunk.get_voxel(5, 4, 5).weight() < 0.0);
    assert_eq!(chunk.get_voxel(5, 0, 5).material(), materials::GRASS);
    assert!(chunk.dirty);
  }

  #[test]
  fn noise_terrain_is_deterministic() {
    let terrain_a = NoiseTerrain::new(42);
    let terrain_b = NoiseTerrain::new(42);

    let mut chunk_a = Chunk::new(ChunkKey::new(3, 0, -2));
    let mut chunk_b = Chunk::new(ChunkKey::new(3, 0, -2));
    terrain_a.fill_chunk(&mut chunk_a);
    terrain_b.fill_chunk(&mut chunk_b);

    assert_eq!(chunk_a.data()[..], chunk_b.data()[..]);
  }

  #[test]
  fn noise_terrain_produces_a_surface() {
    let terrain = NoiseTerrain::new(7);
    let mut chunk = Chunk::new(ChunkKey::new(0, 0, 0));
    terrain.fill_chunk(&mut chunk);

    let solid = chunk.data().iter().filter(|v| v.weight() > 0.0).count();
    assert!(solid > 0, "no solid voxels generated");
    assert!(solid < CHUNK_VOLUME, "chunk generated fully solid");
  }

  #[test]
  fn materials_band_with_depth() {
    let terrain = NoiseTerrain::new(0);
    let mut found_stone_below_grass = false;
    let mut chunk = Chunk::new(ChunkKey::new(0, 0, 0));
    terrain.fill_chunk(&mut chunk);

    for z in 0..32 {
      for x in 0..32 {
        // Walk down from the top until the first solid voxel; skip columns
        // that are solid at the chunk ceiling (surface above this chunk).
        if chunk.get_voxel(x, 31, z).weight() > 0.0 {
          continue;
        }
        for y in (6..31).rev() {
          let v = chunk.get_voxel(x, y, z);
          if v.weight() > 0.0 {
            let top = v.material();
            assert!(
              top == materials::GRASS || top == materials::SAND,
              "surface voxel is {top}"
            );
            let deep = chunk.get_voxel(x, y - 6, z);
            if deep.weight() > 0.0 && deep.material() == materials::STONE {
              found_stone_below_grass = true;
            }
            break;
          }
        }
      }
    }
    assert!(found_stone_below_grass);
  }

  #[test]
  fn water_fills_below_sea_level() {
    let mut terrain = NoiseTerrain::new(3);
    terrain.stamps_enabled = false;
    // Push the ground far down so the chunk floor is under water.
    terrain.base_height = -20.0;
    terrain.amplitude = 4.0;

    let mut chunk = Chunk::new(ChunkKey::new(0, 0, 0));
    terrain.fill_chunk(&mut chunk);

    let v = chunk.get_voxel(16, 2, 16);
    assert_eq!(v.material(), materials::WATER);
    assert!(v.weight() > 0.0);
    // Above sea level: air.
    assert_eq!(chunk.get_voxel(16, 20, 16), Voxel::AIR);
  }

  #[test]
  fn stamps_are_stable_across_refills() {
    let terrain = NoiseTerrain::new(99);
    let mut chunk_a = Chunk::new(ChunkKey::new(1, 0, 1));
    let mut chunk_b = Chunk::new(ChunkKey::new(1, 0, 1));
    terrain.fill_chunk(&mut chunk_a);
    terrain.fill_chunk(&mut chunk_b);
    assert_eq!(chunk_a.data()[..], chunk_b.data()[..]);
  }
}
