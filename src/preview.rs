//! Non-destructive build preview.
//!
//! The preview shadows the authoritative meshes of every chunk a pending
//! edit touches: the edit is drawn into per-chunk staging buffers, the
//! touched chunks are meshed off-thread as one batch, and when *every*
//! chunk of the batch is ready the preview meshes swap in together. The
//! authoritative data is never modified until commit.
//!
//! # Let it finish, then catch up
//!
//! The cursor moves faster than a batch can mesh. Cancelling and
//! redispatching on every move would starve the pipeline, so an in-flight
//! batch is never cancelled by movement: the newest requested operation is
//! parked in `pending_operation` and dispatched as the next batch the
//! moment the current one applies. Intermediate operations are simply
//! dropped: the user sees the preview catch up one batch at a time, and
//! the scene always shows *some* complete, untorn preview.
//!
//! # Lifecycle
//!
//! - `clear_preview`: discard everything, restore the main meshes.
//! - `hold_preview`: keep the preview meshes visible but stop tracking the
//!   cursor; used when the edit was sent to the server and the
//!   authoritative confirmation will arrive as a normal remesh.
//! - `commit_preview`: promote the staged buffers into authoritative data
//!   locally and queue the same remeshes an `apply_build_operation` would.
//!
//! After hold or commit the preview meshes stay visible per chunk until
//! that chunk's authoritative remesh lands (`handle_events` observes it and
//! flips `preview_active` off), which makes the hand-off seam-free: at no
//! frame does the old mesh show through.

use std::collections::HashSet;

use glam::{Quat, Vec3};

use crate::build::{
  affected_chunks, draw_to_chunk, BuildOperation, OperationFingerprint,
};
use crate::chunk::{has_boundary_changes, ChunkKey};
use crate::grid::expand_chunk_to_grid;
use crate::sdf::BuildConfig;
use crate::worker::{BatchHandle, MeshJob, MeshWorkerPool};
use crate::world::{VoxelWorld, WorldEvents};

/// Preview state machine. One instance per local builder.
#[derive(Default)]
pub struct BuildPreview {
  /// Chunks that own a visible preview mesh or belong to the in-flight
  /// batch.
  active_chunks: HashSet<ChunkKey>,
  /// In-flight batch, if any.
  batch: Option<BatchHandle>,
  /// Chunks whose previews leave the scene when the in-flight batch
  /// applies (they were active but are not part of the new batch).
  staged_evictions: Vec<ChunkKey>,
  /// Members of the most recent dispatch: drawn chunks plus their
  /// re-meshed boundary neighbors.
  batch_members: HashSet<ChunkKey>,
  /// Chunks holding staged data drawn for `last_operation`.
  drawn_chunks: HashSet<ChunkKey>,
  /// Latest operation requested while a batch was in flight.
  pending_operation: Option<BuildOperation>,
  /// The operation currently displayed or being dispatched.
  last_operation: Option<OperationFingerprint>,
  /// Chunks whose preview meshes outlive hold/commit until their
  /// authoritative remesh arrives.
  pending_commit: HashSet<ChunkKey>,
}

impl BuildPreview {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn batch_in_flight(&self) -> bool {
    self.batch.is_some()
  }

  pub fn active_chunks(&self) -> &HashSet<ChunkKey> {
    &self.active_chunks
  }

  pub fn pending_commit_chunks(&self) -> &HashSet<ChunkKey> {
    &self.pending_commit
  }

  pub fn displayed_operation(&self) -> Option<&OperationFingerprint> {
    self.last_operation.as_ref()
  }

  // ===========================================================================
  // Frame entry points
  // ===========================================================================

  /// Track the builder cursor. Called every frame with the current brush.
  pub fn update_preview(
    &mut self,
    center: Vec3,
    rotation: Quat,
    config: BuildConfig,
    world: &mut VoxelWorld,
    pool: &MeshWorkerPool,
  ) {
    let op = BuildOperation::new(center, rotation, config);
    let fingerprint = OperationFingerprint::of(&op);

    // Already displaying exactly this operation.
    if self.batch.is_none()
      && self.last_operation.as_ref() == Some(&fingerprint)
      && !self.active_chunks.is_empty()
    {
      return;
    }
    // A batch is meshing: park the newest request, never cancel.
    if self.batch.is_some() {
      self.pending_operation = Some(op);
      return;
    }
    self.last_operation = Some(fingerprint);
    self.dispatch(op, world, pool, false);
  }

  /// Observe the in-flight batch. Call once per frame after
  /// `world.update`. When the batch has completed, evictions and the new
  /// preview meshes apply together in this one call, then any parked
  /// operation dispatches.
  pub fn poll(&mut self, world: &mut VoxelWorld, pool: &MeshWorkerPool) {
    let Some(handle) = &mut self.batch else {
      return;
    };
    let Some(results) = pool.poll(handle) else {
      return;
    };
    self.batch = None;

    let evictions = std::mem::take(&mut self.staged_evictions);
    self.apply_evictions(&evictions, world);

    // An empty result set is the worker-failure watchdog path: treat as
    // "no change" and fall through to the catch-up step.
    for result in &results {
      if world.contains_chunk(result.key) {
        world.install_preview(result.key, &result.surfaces);
        #[cfg(feature = "metrics")]
        world.metrics.record_mesh_timing(result.mesh_time_us);
      }
    }
    tracing::trace!(chunks = results.len(), "preview batch applied");

    self.process_pending(world, pool);
  }

  /// Forward the world's per-tick events: authoritative remeshes release
  /// held preview meshes, unloads drop dead keys.
  pub fn handle_events(&mut self, events: &WorldEvents, world: &mut VoxelWorld) {
    for key in &events.remeshed {
      if self.pending_commit.remove(key) {
        world.deactivate_preview(*key);
      }
    }
    for key in &events.unloaded {
      self.pending_commit.remove(key);
      self.active_chunks.remove(key);
      self.drawn_chunks.remove(key);
      self.batch_members.remove(key);
    }
  }

  // ===========================================================================
  // Lifecycle
  // ===========================================================================

  /// Drop the preview entirely: cancel the in-flight batch, discard all
  /// staging buffers, restore main-mesh visibility. Held commits are not
  /// touched.
  pub fn clear_preview(&mut self, world: &mut VoxelWorld) {
    self.cancel_batch();
    let active: Vec<ChunkKey> = self.active_chunks.drain().collect();
    self.apply_evictions(&active, world);
    self.drawn_chunks.clear();
    self.batch_members.clear();
    self.pending_operation = None;
    self.last_operation = None;
  }

  /// Freeze the preview for a server-confirmed edit: staging buffers are
  /// discarded (the confirmation arrives as an authoritative edit), but
  /// the preview meshes stay visible until each chunk's remesh lands.
  pub fn hold_preview(&mut self, world: &mut VoxelWorld) {
    self.cancel_batch();
    for key in &self.active_chunks {
      if let Some(chunk) = world.chunk_mut(*key) {
        chunk.discard_temp();
      }
    }
    self.pending_commit.extend(self.active_chunks.drain());
    self.drawn_chunks.clear();
    self.batch_members.clear();
    self.pending_operation = None;
    self.last_operation = None;
    tracing::debug!(held = self.pending_commit.len(), "preview held");
  }

  /// Promote the displayed operation's staging buffers into authoritative
  /// data and queue the remeshes `apply_build_operation` would have.
  /// Preview meshes stay visible per chunk until the authoritative remesh
  /// replaces them. Returns the committed chunk keys.
  pub fn commit_preview(&mut self, world: &mut VoxelWorld) -> Vec<ChunkKey> {
    self.cancel_batch();

    // Chunks displaying a stale (pre-catch-up) preview are not part of
    // the displayed operation: restore them instead of committing them.
    let stale: Vec<ChunkKey> = self
      .active_chunks
      .iter()
      .filter(|key| !self.batch_members.contains(key))
      .copied()
      .collect();
    self.apply_evictions(&stale, world);

    let mut committed: Vec<ChunkKey> = Vec::new();
    let mut invalidations: Vec<ChunkKey> = Vec::new();
    for key in self.active_chunks.drain() {
      let Some(chunk) = world.chunk_mut(key) else {
        continue;
      };
      if self.drawn_chunks.contains(&key) && chunk.has_temp() {
        // Boundary comparison must run before the staged data becomes
        // authoritative.
        if let Some(temp) = chunk.temp_data() {
          for axis in 0..3 {
            if has_boundary_changes(chunk.data(), temp, axis) {
              let mut delta = [0i32; 3];
              delta[axis] = -1;
              invalidations.push(key.offset(delta[0], delta[1], delta[2]));
            }
          }
        }
        chunk.copy_from_temp();
        chunk.discard_temp();
        committed.push(key);
      }
      self.pending_commit.insert(key);
    }

    committed.sort();
    for key in committed.iter().copied() {
      world.enqueue_remesh(key);
    }
    for key in invalidations {
      world.enqueue_remesh(key);
    }

    self.drawn_chunks.clear();
    self.batch_members.clear();
    self.pending_operation = None;
    self.last_operation = None;
    tracing::debug!(chunks = committed.len(), "preview committed");
    committed
  }

  // ===========================================================================
  // Batch construction
  // ===========================================================================

  /// Draw and dispatch one preview batch for `op`.
  fn dispatch(
    &mut self,
    op: BuildOperation,
    world: &mut VoxelWorld,
    pool: &MeshWorkerPool,
    catch_up: bool,
  ) {
    #[cfg(feature = "metrics")]
    world.metrics.record_preview_batch(catch_up);
    #[cfg(not(feature = "metrics"))]
    let _ = catch_up;

    // Pass 1: stage the edit into every loaded affected chunk. This must
    // finish for all chunks before any grid expansion, because a chunk's
    // expanded grid reads its neighbors' staging buffers.
    let mut drawn: Vec<ChunkKey> = Vec::new();
    for key in affected_chunks(&op) {
      let Some(chunk) = world.chunk_mut(key) else {
        continue;
      };
      chunk.copy_to_temp();
      let Some(temp) = chunk.temp_data_mut() else {
        continue;
      };
      if draw_to_chunk(key, &op, temp) {
        drawn.push(key);
      } else {
        chunk.discard_temp();
      }
    }
    self.drawn_chunks = drawn.iter().copied().collect();

    // Pass 2b: a drawn chunk whose low boundary slabs changed is read by
    // its negative-axis neighbor's high halo, so that neighbor re-meshes
    // in the same batch even though its own data is untouched.
    let mut members: HashSet<ChunkKey> = self.drawn_chunks.clone();
    let mut to_mesh: Vec<ChunkKey> = drawn.clone();
    for key in &drawn {
      let Some(chunk) = world.chunk(*key) else {
        continue;
      };
      let Some(temp) = chunk.temp_data() else {
        continue;
      };
      for axis in 0..3 {
        if has_boundary_changes(chunk.data(), temp, axis) {
          let mut delta = [0i32; 3];
          delta[axis] = -1;
          let neighbor = key.offset(delta[0], delta[1], delta[2]);
          if world.contains_chunk(neighbor) && members.insert(neighbor) {
            to_mesh.push(neighbor);
          }
        }
      }
    }

    // Pass 2: expand every batch member against staging data.
    let mut jobs: Vec<MeshJob> = Vec::with_capacity(to_mesh.len());
    for key in &to_mesh {
      let Some(chunk) = world.chunk(*key) else {
        continue;
      };
      let mut grid = pool.take_grid();
      let skip_high_boundary = expand_chunk_to_grid(chunk, world.chunks(), &mut grid, true);
      jobs.push(MeshJob {
        key: *key,
        grid,
        skip_high_boundary,
      });
    }

    // Evictions are computed only now, after pass 2b, so boundary
    // neighbors are never wrongly swept out.
    let evictions: Vec<ChunkKey> = self
      .active_chunks
      .iter()
      .filter(|key| !members.contains(key))
      .copied()
      .collect();
    self.active_chunks.extend(members.iter().copied());
    self.batch_members = members;

    if jobs.is_empty() {
      // Nothing to mesh: clear leftover previews synchronously.
      self.apply_evictions(&evictions, world);
      return;
    }

    tracing::debug!(items = jobs.len(), catch_up, "preview batch dispatched");
    self.staged_evictions = evictions;
    self.batch = Some(pool.dispatch_batch(jobs));
  }

  /// Catch-up step: dispatch the newest parked operation if it differs
  /// from what is displayed.
  fn process_pending(&mut self, world: &mut VoxelWorld, pool: &MeshWorkerPool) {
    let Some(op) = self.pending_operation.take() else {
      return;
    };
    let fingerprint = OperationFingerprint::of(&op);
    if self.last_operation.as_ref() == Some(&fingerprint) {
      return;
    }
    self.last_operation = Some(fingerprint);
    self.dispatch(op, world, pool, true);
  }

  fn cancel_batch(&mut self) {
    if let Some(mut handle) = self.batch.take() {
      handle.cancel();
    }
    self.staged_evictions.clear();
  }

  /// Restore a set of chunks to their main meshes and drop their staging
  /// buffers.
  fn apply_evictions(&mut self, keys: &[ChunkKey], world: &mut VoxelWorld) {
    for key in keys {
      world.deactivate_preview(*key);
      if let Some(chunk) = world.chunk_mut(*key) {
        chunk.discard_temp();
      }
      self.active_chunks.remove(key);
    }
  }
}

#[cfg(test)]
#[path = "preview_test.rs"]
mod preview_test;
