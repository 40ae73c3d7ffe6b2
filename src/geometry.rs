//! Per-triangle geometry expansion for material blending.
//!
//! The mesher produces an indexed mesh with one material per vertex. A
//! triangle whose three vertices carry different materials needs all three
//! at every fragment so the shader can blend them. Expansion duplicates
//! each triangle's vertices and gives every expanded vertex the same
//! `material_ids` triple plus a one-hot barycentric weight, so interpolation
//! across the triangle yields smooth per-fragment blend factors without
//! growing the texture atlas.
//!
//! Positions move from grid space to chunk-local meters here: grid sample
//! `g` is chunk voxel `g - 1`, whose center sits at `g - 0.5` voxel units,
//! scaled by `VOXEL_SCALE`. The renderer adds the chunk origin translation.

use crate::constants::VOXEL_SCALE;
use crate::surface_nets::SurfaceNetOutput;
use crate::voxel::MaterialId;

/// Expanded, render-ready triangle soup for one surface of one chunk.
#[derive(Default, Clone)]
pub struct TriangleGeometry {
  /// `x, y, z` per vertex, chunk-local meters.
  pub positions: Vec<f32>,
  /// Unit normal per vertex.
  pub normals: Vec<f32>,
  /// The triangle's three source materials, repeated on each of its three
  /// vertices.
  pub material_ids: Vec<MaterialId>,
  /// Barycentric blend weights: `(1,0,0)`, `(0,1,0)`, `(0,0,1)` on the
  /// triangle's three vertices.
  pub material_weights: Vec<f32>,
  /// Identity triangle list `0, 1, 2, …`.
  pub indices: Vec<u32>,
}

impl TriangleGeometry {
  pub fn vertex_count(&self) -> usize {
    self.positions.len() / 3
  }

  pub fn triangle_count(&self) -> usize {
    self.indices.len() / 3
  }

  pub fn is_empty(&self) -> bool {
    self.indices.is_empty()
  }
}

const BARYCENTRIC: [[f32; 3]; 3] = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

/// Expand an indexed surface into per-triangle vertices with blended
/// material attributes.
pub fn build_triangle_geometry(net: &SurfaceNetOutput) -> TriangleGeometry {
  let triangle_count = net.triangle_count();
  let vertex_count = triangle_count * 3;
  let mut geometry = TriangleGeometry {
    positions: Vec::with_capacity(vertex_count * 3),
    normals: Vec::with_capacity(vertex_count * 3),
    material_ids: Vec::with_capacity(vertex_count * 3),
    material_weights: Vec::with_capacity(vertex_count * 3),
    indices: (0..vertex_count as u32).collect(),
  };

  for triangle in net.indices.chunks_exact(3) {
    let tri_materials = [
      net.materials[triangle[0] as usize],
      net.materials[triangle[1] as usize],
      net.materials[triangle[2] as usize],
    ];
    for (slot, &index) in triangle.iter().enumerate() {
      let at = index as usize * 3;
      for axis in 0..3 {
        geometry
          .positions
          .push((net.positions[at + axis] - 0.5) * VOXEL_SCALE);
        geometry.normals.push(net.normals[at + axis]);
      }
      geometry.material_ids.extend_from_slice(&tri_materials);
      geometry
        .material_weights
        .extend_from_slice(&BARYCENTRIC[slot]);
    }
  }
  geometry
}

#[cfg(test)]
#[path = "geometry_test.rs"]
mod geometry_test;
