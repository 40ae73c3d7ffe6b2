//! Multi-surface Naive Surface Nets over an expanded 34³ grid.
//!
//! Surface Nets is a dual contouring method: one vertex per cell that the
//! surface crosses, placed at the centroid of its edge crossings, connected
//! into quads across neighboring cells. This implementation extracts three
//! surfaces (solid, transparent, liquid) in a single pass over the grid, so
//! glass against stone produces two facing surfaces instead of one shared
//! sheet.
//!
//! # One pass, three virtual grids
//!
//! For every cell, the 8 corner weights are re-read through a per-surface
//! filter: a corner whose material belongs to the surface (or is air) keeps
//! its weight; every other corner is replaced by `FILTER_WEIGHT`, a value
//! just below zero. Filtered corners therefore read as *barely outside*,
//! which pins a vertex directly against the material boundary on each side
//! of it, and both adjacent surfaces emit their own geometry there.
//!
//! ```text
//!      stone │ glass              solid pass        transparent pass
//!    ────────┼────────    →    surface up to │     │ surface up to
//!            │                 the boundary ─┤     ├─ the boundary
//! ```
//!
//! # Face ownership at chunk boundaries
//!
//! Cells 0 and 32 of a grid overlap the neighbor chunks' windows, so every
//! boundary face is seen by two chunks. Ownership convention: a cell on the
//! low boundary of any axis never emits faces (the negative neighbor emits
//! them from its high cells); a cell on a high boundary emits only if that
//! +axis neighbor is loaded (`skip_high_boundary[axis]` false), otherwise
//! the face would hang unconnected at the edge of loaded space. Suppressed
//! cells still place their vertex so the faces of the next cell inward can
//! reference it.
//!
//! # Normals
//!
//! Face emission accumulates unit face normals into the three touched
//! vertices. With this winding the accumulated sums point into the solid,
//! so finalization stores the *negation* of the normalized accumulator.

use glam::Vec3A;

use crate::constants::{
  CELLS_PER_AXIS, CHUNK_SIZE, FILTER_WEIGHT, GRID_CORNER_OFFSETS, GRID_VOLUME, grid_index,
};
use crate::edge_table::{corner_offset, CUBE_EDGES, EDGE_TABLE};
use crate::voxel::{material_kind, materials, MaterialId, MaterialKind, Voxel};

/// One extracted surface: indexed triangle mesh with per-vertex materials.
/// Positions are in grid coordinates (the cell lattice of the expanded
/// grid); the geometry builder maps them to chunk-local meters.
#[derive(Default, Clone)]
pub struct SurfaceNetOutput {
  /// `x, y, z` per vertex.
  pub positions: Vec<f32>,
  /// Unit normal per vertex, parallel to `positions`.
  pub normals: Vec<f32>,
  /// Material palette index per vertex.
  pub materials: Vec<MaterialId>,
  /// Triangle list, three indices per triangle.
  pub indices: Vec<u32>,
}

impl SurfaceNetOutput {
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

/// The three surfaces extracted from one grid.
#[derive(Default, Clone)]
pub struct ChunkSurfaces {
  pub solid: SurfaceNetOutput,
  pub transparent: SurfaceNetOutput,
  pub liquid: SurfaceNetOutput,
}

impl ChunkSurfaces {
  pub fn layer(&self, kind: MaterialKind) -> &SurfaceNetOutput {
    match kind {
      MaterialKind::Solid => &self.solid,
      MaterialKind::Transparent => &self.transparent,
      MaterialKind::Liquid => &self.liquid,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.solid.is_empty() && self.transparent.is_empty() && self.liquid.is_empty()
  }
}

const LAYER_KINDS: [MaterialKind; 3] = [
  MaterialKind::Solid,
  MaterialKind::Transparent,
  MaterialKind::Liquid,
];

/// Two-slab rolling buffer of emitted vertex indices, one entry per cell of
/// the current and previous z slabs. -1 marks "no vertex".
struct VertexIndexBuffer {
  data: Vec<i32>,
}

const SLAB: usize = CELLS_PER_AXIS * CELLS_PER_AXIS;

impl VertexIndexBuffer {
  fn new() -> Self {
    Self {
      data: vec![-1; SLAB * 2],
    }
  }

  /// Reset the slab that cell layer `z` maps to. Must run before the layer
  /// is processed, evicting values from layer `z - 2`.
  #[inline]
  fn begin_slab(&mut self, z: usize) {
    let base = (z & 1) * SLAB;
    self.data[base..base + SLAB].fill(-1);
  }

  #[inline(always)]
  fn get(&self, x: usize, y: usize, z: usize) -> i32 {
    self.data[(z & 1) * SLAB + y * CELLS_PER_AXIS + x]
  }

  #[inline(always)]
  fn set(&mut self, x: usize, y: usize, z: usize, value: i32) {
    self.data[(z & 1) * SLAB + y * CELLS_PER_AXIS + x] = value;
  }
}

/// Extract the three surfaces of one expanded grid.
///
/// Deterministic: byte-identical input and flags produce byte-identical
/// output buffers.
#[tracing::instrument(skip_all, name = "surface_nets::mesh_grid")]
pub fn mesh_grid(grid: &[Voxel; GRID_VOLUME], skip_high_boundary: [bool; 3]) -> ChunkSurfaces {
  let mut surfaces = ChunkSurfaces::default();
  let mut buffers = [
    VertexIndexBuffer::new(),
    VertexIndexBuffer::new(),
    VertexIndexBuffer::new(),
  ];

  for z in 0..CELLS_PER_AXIS {
    for buffer in &mut buffers {
      buffer.begin_slab(z);
    }
    for y in 0..CELLS_PER_AXIS {
      for x in 0..CELLS_PER_AXIS {
        process_cell(grid, [x, y, z], skip_high_boundary, &mut buffers, &mut surfaces);
      }
    }
  }

  for layer in 0..3 {
    finalize_normals(layer_mut(&mut surfaces, layer));
  }
  surfaces
}

#[inline(always)]
fn layer_mut(surfaces: &mut ChunkSurfaces, layer: usize) -> &mut SurfaceNetOutput {
  match layer {
    0 => &mut surfaces.solid,
    1 => &mut surfaces.transparent,
    _ => &mut surfaces.liquid,
  }
}

/// Process one 2×2×2 cell: up to one vertex and three quads per surface.
#[inline]
fn process_cell(
  grid: &[Voxel; GRID_VOLUME],
  pos: [usize; 3],
  skip_high_boundary: [bool; 3],
  buffers: &mut [VertexIndexBuffer; 3],
  surfaces: &mut ChunkSurfaces,
) {
  let [x, y, z] = pos;
  let base = grid_index(x, y, z);

  let mut weights = [0.0f32; 8];
  let mut mats = [0u8; 8];
  let mut kinds = [MaterialKind::Solid; 8];
  let mut all_outside = true;
  for corner in 0..8 {
    let voxel = grid[base + GRID_CORNER_OFFSETS[corner]];
    weights[corner] = voxel.weight();
    mats[corner] = voxel.material();
    kinds[corner] = material_kind(mats[corner]);
    all_outside &= weights[corner] < 0.0;
  }
  // Filtering only pushes weights below zero, so a cell with every corner
  // already outside is homogeneous in all three passes.
  if all_outside {
    return;
  }

  // Face emission is suppressed on the low boundary of any axis (the
  // negative neighbor owns those faces) and on unloaded high boundaries.
  let suppress_faces = x == 0
    || y == 0
    || z == 0
    || (x == CHUNK_SIZE && skip_high_boundary[0])
    || (y == CHUNK_SIZE && skip_high_boundary[1])
    || (z == CHUNK_SIZE && skip_high_boundary[2]);

  for layer in 0..3 {
    let kind = LAYER_KINDS[layer];

    let mut filtered = [0.0f32; 8];
    let mut mask = 0usize;
    for corner in 0..8 {
      let w = if mats[corner] == materials::AIR || kinds[corner] == kind {
        weights[corner]
      } else {
        FILTER_WEIGHT
      };
      filtered[corner] = w;
      if w < 0.0 {
        mask |= 1 << corner;
      }
    }
    if mask == 0 || mask == 0xFF {
      continue;
    }

    let edge_mask = EDGE_TABLE[mask];
    let output = layer_mut(surfaces, layer);

    // Vertex: centroid of the edge crossings, in the cell-local frame.
    let mut sum = Vec3A::ZERO;
    let mut crossings = 0u32;
    for (edge, &[c0, c1]) in CUBE_EDGES.iter().enumerate() {
      if edge_mask & (1 << edge) == 0 {
        continue;
      }
      let g0 = filtered[c0 as usize];
      let g1 = filtered[c1 as usize];
      let denom = g0 - g1;
      if denom.abs() < 1e-10 {
        continue;
      }
      let t = g0 / denom;
      let p0 = Vec3A::from_array(corner_offset(c0));
      let p1 = Vec3A::from_array(corner_offset(c1));
      sum += p0 + (p1 - p0) * t;
      crossings += 1;
    }
    let local = if crossings == 0 {
      Vec3A::splat(0.5)
    } else {
      sum / crossings as f32
    };

    // Most-inside corner labels the vertex; ties break to the lower index
    // by the strict comparison in iteration order.
    let mut best = 0usize;
    for corner in 1..8 {
      if filtered[corner] > filtered[best] {
        best = corner;
      }
    }

    let vertex_index = output.vertex_count() as i32;
    output
      .positions
      .extend_from_slice(&[x as f32 + local.x, y as f32 + local.y, z as f32 + local.z]);
    output.normals.extend_from_slice(&[0.0, 0.0, 0.0]);
    output.materials.push(mats[best]);
    buffers[layer].set(x, y, z, vertex_index);

    if suppress_faces {
      continue;
    }
    emit_faces(pos, edge_mask, mask, &buffers[layer], output);
  }
}

/// Emit up to three quads for a cell, one per axis whose origin edge
/// crosses the surface, referencing the vertices of the three
/// negative-direction neighbor cells from the rolling buffers.
#[inline]
fn emit_faces(
  pos: [usize; 3],
  edge_mask: u16,
  corner_mask: usize,
  buffer: &VertexIndexBuffer,
  output: &mut SurfaceNetOutput,
) {
  let [x, y, z] = pos;
  for axis in 0..3 {
    if edge_mask & (1 << axis) == 0 {
      continue;
    }
    let u = (axis + 1) % 3;
    let v = (axis + 2) % 3;

    let mut p_u = [x, y, z];
    p_u[u] -= 1;
    let mut p_uv = p_u;
    p_uv[v] -= 1;
    let mut p_v = [x, y, z];
    p_v[v] -= 1;

    let a = buffer.get(x, y, z);
    let b = buffer.get(p_u[0], p_u[1], p_u[2]);
    let c = buffer.get(p_uv[0], p_uv[1], p_uv[2]);
    let d = buffer.get(p_v[0], p_v[1], p_v[2]);
    if a < 0 || b < 0 || c < 0 || d < 0 {
      continue;
    }

    // Winding by the inside/outside state of corner 0; the quad splits
    // into two triangles sharing the a-c diagonal.
    if corner_mask & 1 != 0 {
      push_triangle(output, a as u32, b as u32, c as u32);
      push_triangle(output, a as u32, c as u32, d as u32);
    } else {
      push_triangle(output, a as u32, d as u32, c as u32);
      push_triangle(output, a as u32, c as u32, b as u32);
    }
  }
}

/// Append a triangle and accumulate its unit face normal into the three
/// vertex normal slots.
#[inline]
fn push_triangle(output: &mut SurfaceNetOutput, i0: u32, i1: u32, i2: u32) {
  output.indices.extend_from_slice(&[i0, i1, i2]);

  let p = |i: u32| {
    let at = i as usize * 3;
    Vec3A::new(
      output.positions[at],
      output.positions[at + 1],
      output.positions[at + 2],
    )
  };
  let p0 = p(i0);
  let face = (p(i1) - p0).cross(p(i2) - p0);
  let len_sq = face.length_squared();
  if len_sq < 1e-12 {
    return;
  }
  let unit = face * len_sq.sqrt().recip();
  for i in [i0, i1, i2] {
    let at = i as usize * 3;
    output.normals[at] += unit.x;
    output.normals[at + 1] += unit.y;
    output.normals[at + 2] += unit.z;
  }
}

/// Normalize and negate the accumulated normals (the accumulator points
/// into the solid).
fn finalize_normals(output: &mut SurfaceNetOutput) {
  for normal in output.normals.chunks_exact_mut(3) {
    let n = Vec3A::new(normal[0], normal[1], normal[2]);
    let len_sq = n.length_squared();
    let stored = if len_sq > 1e-12 {
      -(n * len_sq.sqrt().recip())
    } else {
      Vec3A::Y
    };
    normal[0] = stored.x;
    normal[1] = stored.y;
    normal[2] = stored.z;
  }
}
