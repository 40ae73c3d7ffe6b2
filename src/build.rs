//! Build operations: a positioned, rotated brush applied to chunk voxels.
//!
//! Applying an operation is a pure per-voxel computation: convert the voxel
//! center to world space, rotate it into the brush frame, evaluate the
//! configured SDF and combine the sample with the existing voxel according
//! to the brush mode. Affected-chunk enumeration is likewise a pure
//! function of the operation, conservative by construction.

use glam::{Mat3, Quat, Vec3};
use smallvec::SmallVec;

use crate::chunk::ChunkKey;
use crate::constants::{CHUNK_SIZE, CHUNK_VOLUME, VOXEL_SCALE, voxel_index};
use crate::sdf::{sdf_from_config, BuildConfig, BuildMode};
use crate::voxel::{sdf_to_weight, Voxel};

/// A brush placed in the world.
#[derive(Clone, Copy, Debug)]
pub struct BuildOperation {
  /// Brush center in world meters.
  pub center: Vec3,
  pub rotation: Quat,
  pub config: BuildConfig,
}

impl BuildOperation {
  pub fn new(center: Vec3, rotation: Quat, config: BuildConfig) -> Self {
    Self {
      center,
      rotation,
      config,
    }
  }
}

/// Chunk keys a build operation could touch.
pub type AffectedChunks = SmallVec<[ChunkKey; 8]>;

/// Enumerate every chunk the operation could modify.
///
/// Conservative: the world AABB of the rotated brush (absolute rotation
/// matrix times the half-extents, plus shell thickness) is converted to the
/// voxel lattice, padded by one voxel for boundary safety, and floored to
/// chunk coordinates.
pub fn affected_chunks(op: &BuildOperation) -> AffectedChunks {
  let rot = Mat3::from_quat(op.rotation);
  let mut half = op.config.size;
  if let Some(t) = op.config.thickness {
    half += Vec3::splat(t);
  }
  // Per world axis: sum of |row · axis| over the brush half-extents.
  let half_world = Vec3::new(
    rot.row(0).abs().dot(half),
    rot.row(1).abs().dot(half),
    rot.row(2).abs().dot(half),
  );

  let center_voxels = op.center / VOXEL_SCALE;
  let min = center_voxels - half_world - Vec3::ONE;
  let max = center_voxels + half_world + Vec3::ONE;

  let size = CHUNK_SIZE as f32;
  let min_chunk = (min / size).floor();
  let max_chunk = (max / size).floor();

  let mut keys = AffectedChunks::new();
  for cz in min_chunk.z as i32..=max_chunk.z as i32 {
    for cy in min_chunk.y as i32..=max_chunk.y as i32 {
      for cx in min_chunk.x as i32..=max_chunk.x as i32 {
        keys.push(ChunkKey::new(cx, cy, cz));
      }
    }
  }
  keys
}

/// Apply the operation to one chunk's voxel buffer (authoritative data on
/// the commit path, staging on the preview path).
///
/// Returns `true` iff any voxel changed; detection is an exact packed-value
/// compare per cell.
pub fn draw_to_chunk(key: ChunkKey, op: &BuildOperation, target: &mut [Voxel; CHUNK_VOLUME]) -> bool {
  let origin = key.origin_voxels();
  let inv_rotation = op.rotation.inverse();
  let mut changed = false;

  for z in 0..CHUNK_SIZE {
    for y in 0..CHUNK_SIZE {
      for x in 0..CHUNK_SIZE {
        let world =
          (origin + Vec3::new(x as f32, y as f32, z as f32) + Vec3::splat(0.5)) * VOXEL_SCALE;
        let local = inv_rotation * (world - op.center) / VOXEL_SCALE;
        let sdf = sdf_from_config(local, &op.config);
        // One voxel past the surface the weight contribution saturates at
        // the air floor and no mode can change the cell.
        if sdf >= 1.0 {
          continue;
        }

        let idx = voxel_index(x, y, z);
        let old = target[idx];
        let new = combine(old, sdf, &op.config);
        if new != old {
          target[idx] = new;
          changed = true;
        }
      }
    }
  }
  changed
}

/// Combine one SDF sample with an existing voxel according to the brush
/// mode.
#[inline]
fn combine(old: Voxel, sdf: f32, config: &BuildConfig) -> Voxel {
  let sample_weight = sdf_to_weight(sdf);
  let old_weight = old.weight();
  match config.mode {
    BuildMode::Add => {
      if sample_weight > old_weight {
        Voxel::pack(sample_weight, config.material, old.flags())
      } else {
        old
      }
    }
    BuildMode::Subtract => {
      let carved = -sample_weight;
      if carved < old_weight {
        old.with_weight(carved)
      } else {
        old
      }
    }
    BuildMode::Paint => {
      if sdf <= 0.0 && old_weight > 0.0 {
        old.with_material(config.material)
      } else {
        old
      }
    }
    BuildMode::Fill => {
      let raised = sample_weight.max(old_weight);
      if sdf <= 0.0 {
        Voxel::pack(raised, config.material, old.flags())
      } else if sample_weight > old_weight {
        Voxel::pack(sample_weight, config.material, old.flags())
      } else {
        old
      }
    }
  }
}

// =============================================================================
// Operation identity
// =============================================================================

/// Cheap equality fingerprint for "is this the operation already shown".
/// Centers are rounded to 0.01 m so cursor jitter below a centimeter does
/// not re-dispatch a preview batch.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct OperationFingerprint {
  center: [i32; 3],
  rotation: [i32; 4],
  config: BuildConfig,
}

impl OperationFingerprint {
  pub fn of(op: &BuildOperation) -> Self {
    let q = |v: f32| (v * 100.0).round() as i32;
    let r = |v: f32| (v * 1000.0).round() as i32;
    Self {
      center: [q(op.center.x), q(op.center.y), q(op.center.z)],
      rotation: [
        r(op.rotation.x),
        r(op.rotation.y),
        r(op.rotation.z),
        r(op.rotation.w),
      ],
      config: op.config,
    }
  }
}

#[cfg(test)]
#[path = "build_test.rs"]
mod build_test;
