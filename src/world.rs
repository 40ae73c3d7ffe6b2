//! The voxel world: chunk map, visibility-driven load/unload, the remesh
//! queue, and application of authoritative edits.
//!
//! One `update` per frame drives everything: chunks enter the map when
//! their lattice position comes within the visibility radius of the anchor
//! (filled by the pluggable terrain filler), leave it when they fall
//! outside, and a bounded slice of the remesh queue is dispatched to the
//! worker pool, nearest chunks first. Completed batches apply atomically
//! in the same tick they are observed, and every applied chunk is reported
//! through [`WorldEvents`] (and the registered listeners) so the collision
//! rebuilder and the build preview can react.
//!
//! The world owns no global state and never blocks: meshing runs on the
//! pool, results are polled.

use std::collections::{HashMap, HashSet};

use glam::Vec3;

use crate::build::{affected_chunks, draw_to_chunk, AffectedChunks, BuildOperation};
use crate::chunk::{has_boundary_changes, Chunk, ChunkKey};
use crate::geometry::{build_triangle_geometry, TriangleGeometry};
use crate::grid::expand_chunk_to_grid;
#[cfg(feature = "metrics")]
use crate::metrics::WorldMetrics;
use crate::surface_nets::ChunkSurfaces;
use crate::terrain::ChunkFiller;
use crate::worker::{BatchHandle, MeshJob, MeshWorkerPool};

/// Construction-time world parameters.
#[derive(Clone, Copy, Debug)]
pub struct WorldConfig {
  pub seed: u32,
  /// Chunks stay loaded within this L∞ radius (in chunks) of the anchor.
  pub visibility_radius: i32,
  /// Upper bound on remesh-queue entries dispatched per batch.
  pub max_remesh_per_batch: usize,
}

impl Default for WorldConfig {
  fn default() -> Self {
    Self {
      seed: 0,
      visibility_radius: 2,
      max_remesh_per_batch: 16,
    }
  }
}

/// The three render-ready surface slots of one chunk.
#[derive(Default, Clone)]
pub struct SurfaceGeometry {
  pub solid: Option<TriangleGeometry>,
  pub transparent: Option<TriangleGeometry>,
  pub liquid: Option<TriangleGeometry>,
}

impl SurfaceGeometry {
  pub fn from_surfaces(surfaces: &ChunkSurfaces) -> Self {
    let build = |net: &crate::surface_nets::SurfaceNetOutput| {
      (!net.is_empty()).then(|| build_triangle_geometry(net))
    };
    Self {
      solid: build(&surfaces.solid),
      transparent: build(&surfaces.transparent),
      liquid: build(&surfaces.liquid),
    }
  }

  pub fn clear(&mut self) {
    self.solid = None;
    self.transparent = None;
    self.liquid = None;
  }

  pub fn is_empty(&self) -> bool {
    self.solid.is_none() && self.transparent.is_none() && self.liquid.is_none()
  }
}

/// Renderer-facing mesh container of one chunk: the authoritative buffers,
/// a shadow preview set, and the single flag selecting which one is drawn.
#[derive(Default)]
pub struct ChunkMeshes {
  pub main: SurfaceGeometry,
  pub preview: SurfaceGeometry,
  pub preview_active: bool,
}

/// What happened during one `update` tick.
#[derive(Default, Debug)]
pub struct WorldEvents {
  /// Chunks whose authoritative meshes were replaced this tick.
  pub remeshed: Vec<ChunkKey>,
  /// Chunks removed from memory this tick.
  pub unloaded: Vec<ChunkKey>,
}

type KeyListener = Box<dyn FnMut(ChunkKey)>;

/// Owner of all chunks and their meshes.
pub struct VoxelWorld {
  pub config: WorldConfig,
  chunks: HashMap<ChunkKey, Chunk>,
  meshes: HashMap<ChunkKey, ChunkMeshes>,
  remesh_queue: HashSet<ChunkKey>,
  filler: Box<dyn ChunkFiller>,
  batch: Option<BatchHandle>,
  unload_listeners: Vec<KeyListener>,
  remesh_listeners: Vec<KeyListener>,
  #[cfg(feature = "metrics")]
  pub metrics: WorldMetrics,
}

impl VoxelWorld {
  pub fn new(config: WorldConfig, filler: Box<dyn ChunkFiller>) -> Self {
    Self {
      config,
      chunks: HashMap::new(),
      meshes: HashMap::new(),
      remesh_queue: HashSet::new(),
      filler,
      batch: None,
      unload_listeners: Vec::new(),
      remesh_listeners: Vec::new(),
      #[cfg(feature = "metrics")]
      metrics: WorldMetrics::new(),
    }
  }

  // ===========================================================================
  // Accessors
  // ===========================================================================

  pub fn chunk(&self, key: ChunkKey) -> Option<&Chunk> {
    self.chunks.get(&key)
  }

  pub fn chunk_mut(&mut self, key: ChunkKey) -> Option<&mut Chunk> {
    self.chunks.get_mut(&key)
  }

  pub fn chunks(&self) -> &HashMap<ChunkKey, Chunk> {
    &self.chunks
  }

  pub fn contains_chunk(&self, key: ChunkKey) -> bool {
    self.chunks.contains_key(&key)
  }

  pub fn chunk_meshes(&self, key: ChunkKey) -> Option<&ChunkMeshes> {
    self.meshes.get(&key)
  }

  pub fn loaded_chunk_count(&self) -> usize {
    self.chunks.len()
  }

  pub fn is_queued_for_remesh(&self, key: ChunkKey) -> bool {
    self.remesh_queue.contains(&key)
  }

  /// True while dirty chunks are queued or a remesh batch is on the
  /// workers.
  pub fn has_pending_remesh(&self) -> bool {
    !self.remesh_queue.is_empty() || self.batch.is_some()
  }

  /// Called when a chunk leaves memory, before the tick's events are
  /// returned.
  pub fn add_unload_listener(&mut self, listener: impl FnMut(ChunkKey) + 'static) {
    self.unload_listeners.push(Box::new(listener));
  }

  /// Called when a chunk's authoritative meshes are replaced.
  pub fn add_remesh_listener(&mut self, listener: impl FnMut(ChunkKey) + 'static) {
    self.remesh_listeners.push(Box::new(listener));
  }

  /// Queue a chunk for remeshing. No-op for unloaded keys.
  pub fn enqueue_remesh(&mut self, key: ChunkKey) {
    if self.chunks.contains_key(&key) {
      self.remesh_queue.insert(key);
    }
  }

  // ===========================================================================
  // Frame tick
  // ===========================================================================

  /// One frame of world upkeep around the given anchor position.
  #[tracing::instrument(skip_all)]
  pub fn update(&mut self, anchor: Vec3, pool: &MeshWorkerPool) -> WorldEvents {
    let anchor_key = ChunkKey::from_world(anchor);
    let mut events = WorldEvents::default();

    self.load_missing_chunks(anchor_key);
    self.unload_distant_chunks(anchor_key, &mut events);
    self.poll_remesh_batch(pool, &mut events);
    self.dispatch_remesh_batch(anchor_key, pool);

    #[cfg(feature = "metrics")]
    self.metrics.set_loaded_chunks(self.chunks.len());
    events
  }

  fn load_missing_chunks(&mut self, anchor: ChunkKey) {
    let r = self.config.visibility_radius;
    let mut loaded = 0u32;
    for dz in -r..=r {
      for dy in -r..=r {
        for dx in -r..=r {
          let key = anchor.offset(dx, dy, dz);
          if self.chunks.contains_key(&key) {
            continue;
          }
          let mut chunk = Chunk::new(key);
          self.filler.fill_chunk(&mut chunk);
          if chunk.dirty {
            self.remesh_queue.insert(key);
          }
          self.chunks.insert(key, chunk);
          self.meshes.insert(key, ChunkMeshes::default());
          loaded += 1;
        }
      }
    }
    if loaded > 0 {
      tracing::debug!(loaded, total = self.chunks.len(), "chunks loaded");
    }
  }

  fn unload_distant_chunks(&mut self, anchor: ChunkKey, events: &mut WorldEvents) {
    let r = self.config.visibility_radius;
    let distant: Vec<ChunkKey> = self
      .chunks
      .keys()
      .copied()
      .filter(|key| key.linf_distance(anchor) > r)
      .collect();
    for key in distant {
      self.chunks.remove(&key);
      self.meshes.remove(&key);
      self.remesh_queue.remove(&key);
      for listener in &mut self.unload_listeners {
        listener(key);
      }
      events.unloaded.push(key);
      tracing::trace!(%key, "chunk unloaded");
    }
  }

  fn poll_remesh_batch(&mut self, pool: &MeshWorkerPool, events: &mut WorldEvents) {
    let Some(handle) = &mut self.batch else {
      return;
    };
    let Some(results) = pool.poll(handle) else {
      return;
    };
    self.batch = None;

    for result in results {
      // The chunk may have unloaded while its mesh was on the workers.
      let Some(meshes) = self.meshes.get_mut(&result.key) else {
        continue;
      };
      meshes.main = SurfaceGeometry::from_surfaces(&result.surfaces);
      #[cfg(feature = "metrics")]
      self.metrics.record_mesh_timing(result.mesh_time_us);
      for listener in &mut self.remesh_listeners {
        listener(result.key);
      }
      events.remeshed.push(result.key);
    }
  }

  fn dispatch_remesh_batch(&mut self, anchor: ChunkKey, pool: &MeshWorkerPool) {
    if self.batch.is_some() || self.remesh_queue.is_empty() {
      return;
    }

    // Nearest dirty chunks first; ties in key order for determinism.
    let mut queued: Vec<ChunkKey> = self.remesh_queue.iter().copied().collect();
    queued.sort_by_key(|key| (key.linf_distance(anchor), *key));
    queued.truncate(self.config.max_remesh_per_batch);

    for key in &queued {
      self.remesh_queue.remove(key);
      if let Some(chunk) = self.chunks.get_mut(key) {
        chunk.dirty = false;
      }
    }

    let mut jobs = Vec::with_capacity(queued.len());
    for key in queued {
      let Some(chunk) = self.chunks.get(&key) else {
        continue;
      };
      let mut grid = pool.take_grid();
      let skip_high_boundary = expand_chunk_to_grid(chunk, &self.chunks, &mut grid, false);
      jobs.push(MeshJob {
        key,
        grid,
        skip_high_boundary,
      });
    }
    if jobs.is_empty() {
      return;
    }
    tracing::debug!(items = jobs.len(), "remesh batch dispatched");
    #[cfg(feature = "metrics")]
    self.metrics.record_batch_dispatched(jobs.len());
    self.batch = Some(pool.dispatch_batch(jobs));
  }

  // ===========================================================================
  // Authoritative edits
  // ===========================================================================

  /// Apply a build operation to the authoritative data of every loaded
  /// affected chunk. Changed chunks are queued for remesh, as is the
  /// negative-axis neighbor of every axis whose low boundary slab changed.
  /// Returns the keys whose data changed (possibly empty).
  pub fn apply_build_operation(&mut self, op: &BuildOperation) -> AffectedChunks {
    let mut changed = AffectedChunks::new();
    let mut neighbor_invalidations: Vec<ChunkKey> = Vec::new();

    for key in affected_chunks(op) {
      let Some(chunk) = self.chunks.get_mut(&key) else {
        continue;
      };
      let before = chunk.data().clone();
      if !draw_to_chunk(key, op, chunk.data_mut()) {
        continue;
      }
      chunk.dirty = true;
      for axis in 0..3 {
        if has_boundary_changes(&before, chunk.data(), axis) {
          let mut delta = [0i32; 3];
          delta[axis] = -1;
          neighbor_invalidations.push(key.offset(delta[0], delta[1], delta[2]));
        }
      }
      changed.push(key);
    }

    for key in changed.iter().copied() {
      self.remesh_queue.insert(key);
    }
    for key in neighbor_invalidations {
      self.enqueue_remesh(key);
    }
    if !changed.is_empty() {
      tracing::debug!(chunks = changed.len(), "build operation applied");
    }
    changed
  }

  // ===========================================================================
  // Preview mesh plumbing
  // ===========================================================================

  /// Install freshly meshed preview buffers on a chunk and make them the
  /// drawn set.
  pub(crate) fn install_preview(&mut self, key: ChunkKey, surfaces: &ChunkSurfaces) {
    if let Some(meshes) = self.meshes.get_mut(&key) {
      meshes.preview = SurfaceGeometry::from_surfaces(surfaces);
      meshes.preview_active = true;
    }
  }

  /// Hide and drop a chunk's preview buffers; the main meshes are drawn
  /// again.
  pub(crate) fn deactivate_preview(&mut self, key: ChunkKey) {
    if let Some(meshes) = self.meshes.get_mut(&key) {
      meshes.preview_active = false;
      meshes.preview.clear();
    }
  }
}
