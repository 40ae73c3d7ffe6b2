//! Worker pool: off-thread meshing of expanded grids in cancellable
//! batches, with a shared free list of reusable grid buffers.
//!
//! One batch is one `rayon::spawn` that meshes its items with
//! `into_par_iter` and sends the complete result set over a bounded(1)
//! channel. The main thread polls; results for a batch arrive exactly once,
//! after every item has finished, so applying them to the scene is atomic
//! within one main-thread turn. Cancellation drops the receiver: in-flight
//! items complete quietly on their worker and their grids still return to
//! the free list, because the workers push buffers back as each item
//! finishes rather than handing them to the caller.
//!
//! A worker that dies (panics) drops the sender without sending; the poll
//! observes the disconnect and reports an empty result set, so callers
//! waiting on the batch recover instead of staying in-flight forever.

use std::sync::{Arc, Mutex};

use crossbeam_channel::{bounded, Receiver, TryRecvError};
use rayon::prelude::*;
use web_time::Instant;

use crate::chunk::ChunkKey;
use crate::grid::{new_grid_buffer, GridBuffer};
use crate::surface_nets::{mesh_grid, ChunkSurfaces};

/// One chunk's meshing input: an owned expanded grid plus its boundary
/// flags. The grid transfers into the pool and comes back via the free
/// list.
pub struct MeshJob {
  pub key: ChunkKey,
  pub grid: GridBuffer,
  pub skip_high_boundary: [bool; 3],
}

/// One chunk's meshing output.
pub struct MeshResult {
  pub key: ChunkKey,
  pub surfaces: ChunkSurfaces,
  /// Raw meshing time in microseconds.
  pub mesh_time_us: u64,
}

/// Handle to one in-flight batch. Dropping it (or calling [`cancel`])
/// detaches the batch: its results are discarded and [`MeshWorkerPool::poll`]
/// never reports them.
///
/// [`cancel`]: BatchHandle::cancel
pub struct BatchHandle {
  receiver: Option<Receiver<Vec<MeshResult>>>,
}

impl BatchHandle {
  /// Discard the batch. Workers still running complete quietly; their
  /// grids return to the pool's free list.
  pub fn cancel(&mut self) {
    self.receiver = None;
  }

  pub fn is_cancelled(&self) -> bool {
    self.receiver.is_none()
  }
}

/// Shared free list plus dispatch entry points.
pub struct MeshWorkerPool {
  free_grids: Arc<Mutex<Vec<GridBuffer>>>,
}

impl MeshWorkerPool {
  pub fn new() -> Self {
    Self {
      free_grids: Arc::new(Mutex::new(Vec::new())),
    }
  }

  /// Pop a reusable grid buffer, allocating when the free list is empty.
  /// The expander overwrites every sample, so buffers are handed out
  /// uncleared.
  pub fn take_grid(&self) -> GridBuffer {
    self
      .free_grids
      .lock()
      .unwrap()
      .pop()
      .unwrap_or_else(new_grid_buffer)
  }

  /// Return a grid to the free list without meshing it.
  pub fn recycle_grid(&self, grid: GridBuffer) {
    self.free_grids.lock().unwrap().push(grid);
  }

  /// Number of buffers currently parked in the free list.
  pub fn free_grid_count(&self) -> usize {
    self.free_grids.lock().unwrap().len()
  }

  /// Submit a batch. Items may finish in any order on the workers; the
  /// handle reports the full result set once, when all of them are done.
  #[tracing::instrument(skip_all, fields(items = jobs.len()))]
  pub fn dispatch_batch(&self, jobs: Vec<MeshJob>) -> BatchHandle {
    let (sender, receiver) = bounded(1);
    let free_grids = Arc::clone(&self.free_grids);

    rayon::spawn(move || {
      let results: Vec<MeshResult> = jobs
        .into_par_iter()
        .map(|job| {
          let start = Instant::now();
          let surfaces = mesh_grid(&job.grid, job.skip_high_boundary);
          let mesh_time_us = start.elapsed().as_micros() as u64;
          free_grids.lock().unwrap().push(job.grid);
          MeshResult {
            key: job.key,
            surfaces,
            mesh_time_us,
          }
        })
        .collect();
      // Send failure means the batch was cancelled; results are dropped.
      let _ = sender.send(results);
    });

    BatchHandle {
      receiver: Some(receiver),
    }
  }

  /// Non-blocking check on a batch. `None` while running; `Some(results)`
  /// exactly once when complete. A disconnected worker reports an empty
  /// result set so the caller can clear its in-flight state.
  pub fn poll(&self, handle: &mut BatchHandle) -> Option<Vec<MeshResult>> {
    let receiver = handle.receiver.as_ref()?;
    match receiver.try_recv() {
      Ok(results) => {
        handle.receiver = None;
        Some(results)
      }
      Err(TryRecvError::Empty) => None,
      Err(TryRecvError::Disconnected) => {
        tracing::debug!("mesh batch worker disconnected without results");
        handle.receiver = None;
        Some(Vec::new())
      }
    }
  }
}

impl Default for MeshWorkerPool {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::constants::GRID_SIZE;
  use crate::constants::grid_index;
  use crate::voxel::{materials, sdf_to_weight, Voxel};

  fn plane_grid(pool: &MeshWorkerPool, height: f32) -> GridBuffer {
    let mut grid = pool.take_grid();
    for z in 0..GRID_SIZE {
      for y in 0..GRID_SIZE {
        for x in 0..GRID_SIZE {
          let sdf = (y as f32 - 0.5) - height;
          grid[grid_index(x, y, z)] = Voxel::pack(sdf_to_weight(sdf), materials::STONE, 0);
        }
      }
    }
    grid
  }

  fn poll_until_complete(pool: &MeshWorkerPool, handle: &mut BatchHandle) -> Vec<MeshResult> {
    for _ in 0..2000 {
      if let Some(results) = pool.poll(handle) {
        return results;
      }
      std::thread::sleep(std::time::Duration::from_millis(1));
    }
    panic!("batch never completed");
  }

  #[test]
  fn batch_completes_with_all_items() {
    let pool = MeshWorkerPool::new();
    let jobs: Vec<MeshJob> = (0..4)
      .map(|i| MeshJob {
        key: ChunkKey::new(i, 0, 0),
        grid: plane_grid(&pool, 10.0 + i as f32),
        skip_high_boundary: [true; 3],
      })
      .collect();

    let mut handle = pool.dispatch_batch(jobs);
    let results = poll_until_complete(&pool, &mut handle);

    assert_eq!(results.len(), 4);
    for result in &results {
      assert!(result.surfaces.solid.triangle_count() > 0);
    }
    // The batch fired once; subsequent polls report nothing.
    assert!(pool.poll(&mut handle).is_none());
  }

  #[test]
  fn grids_return_to_the_free_list() {
    let pool = MeshWorkerPool::new();
    let jobs = vec![MeshJob {
      key: ChunkKey::new(0, 0, 0),
      grid: plane_grid(&pool, 8.0),
      skip_high_boundary: [true; 3],
    }];

    let mut handle = pool.dispatch_batch(jobs);
    poll_until_complete(&pool, &mut handle);
    assert_eq!(pool.free_grid_count(), 1);

    // Reuse: taking pops the recycled buffer instead of allocating.
    let _grid = pool.take_grid();
    assert_eq!(pool.free_grid_count(), 0);
  }

  #[test]
  fn cancelled_batch_never_reports_and_still_recycles() {
    let pool = MeshWorkerPool::new();
    let jobs = vec![MeshJob {
      key: ChunkKey::new(0, 0, 0),
      grid: plane_grid(&pool, 8.0),
      skip_high_boundary: [true; 3],
    }];

    let mut handle = pool.dispatch_batch(jobs);
    handle.cancel();
    assert!(handle.is_cancelled());
    assert!(pool.poll(&mut handle).is_none());

    // The worker finishes on its own and parks the grid.
    for _ in 0..2000 {
      if pool.free_grid_count() == 1 {
        return;
      }
      std::thread::sleep(std::time::Duration::from_millis(1));
    }
    panic!("cancelled batch never recycled its grid");
  }

  #[test]
  fn empty_batch_reports_empty_results() {
    let pool = MeshWorkerPool::new();
    let mut handle = pool.dispatch_batch(Vec::new());
    let results = poll_until_complete(&pool, &mut handle);
    assert!(results.is_empty());
  }
}
