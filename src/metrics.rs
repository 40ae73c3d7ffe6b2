//! Feature-gated runtime statistics for the voxel world.
//!
//! Compiled in with `--features metrics` and toggled at runtime through
//! [`COLLECT_METRICS`]; with the feature off every record call is a no-op.

use std::collections::VecDeque;
#[cfg(feature = "metrics")]
use std::sync::atomic::Ordering;
use std::sync::atomic::AtomicBool;

/// Runtime toggle for metrics collection.
pub static COLLECT_METRICS: AtomicBool = AtomicBool::new(true);

/// True when metrics are both compiled in and enabled at runtime.
#[inline]
pub fn is_enabled() -> bool {
  #[cfg(feature = "metrics")]
  {
    COLLECT_METRICS.load(Ordering::Relaxed)
  }
  #[cfg(not(feature = "metrics"))]
  {
    false
  }
}

/// Fixed-capacity window of recent values.
#[derive(Debug, Clone)]
pub struct RollingWindow {
  buffer: VecDeque<u64>,
  capacity: usize,
}

impl RollingWindow {
  pub fn new(capacity: usize) -> Self {
    Self {
      buffer: VecDeque::with_capacity(capacity),
      capacity,
    }
  }

  pub fn push(&mut self, value: u64) {
    if self.buffer.len() >= self.capacity {
      self.buffer.pop_front();
    }
    self.buffer.push_back(value);
  }

  pub fn len(&self) -> usize {
    self.buffer.len()
  }

  pub fn is_empty(&self) -> bool {
    self.buffer.is_empty()
  }

  pub fn clear(&mut self) {
    self.buffer.clear();
  }

  pub fn average(&self) -> f64 {
    if self.buffer.is_empty() {
      0.0
    } else {
      self.buffer.iter().sum::<u64>() as f64 / self.buffer.len() as f64
    }
  }
}

impl Default for RollingWindow {
  fn default() -> Self {
    Self::new(128)
  }
}

/// Counters and timing windows updated by the world and the preview.
#[derive(Debug, Clone, Default)]
pub struct WorldMetrics {
  /// Rolling window of per-chunk mesh times in microseconds.
  pub mesh_timings: RollingWindow,
  /// Most recent per-chunk mesh time.
  pub last_mesh_us: u64,
  /// Chunks meshed since startup (standard queue and preview).
  pub chunks_meshed: u64,
  /// Standard remesh batches dispatched.
  pub batches_dispatched: u64,
  /// Preview batches dispatched.
  pub preview_batches: u64,
  /// Preview catch-up dispatches (a pending operation replacing a finished
  /// batch).
  pub preview_catch_ups: u64,
  /// Chunks currently loaded.
  pub loaded_chunks: u64,
}

impl WorldMetrics {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn record_mesh_timing(&mut self, timing_us: u64) {
    if is_enabled() {
      self.mesh_timings.push(timing_us);
      self.last_mesh_us = timing_us;
      self.chunks_meshed += 1;
    }
  }

  pub fn record_batch_dispatched(&mut self, _items: usize) {
    if is_enabled() {
      self.batches_dispatched += 1;
    }
  }

  pub fn record_preview_batch(&mut self, catch_up: bool) {
    if is_enabled() {
      self.preview_batches += 1;
      if catch_up {
        self.preview_catch_ups += 1;
      }
    }
  }

  pub fn set_loaded_chunks(&mut self, count: usize) {
    if is_enabled() {
      self.loaded_chunks = count as u64;
    }
  }

  pub fn avg_mesh_timing_us(&self) -> f64 {
    self.mesh_timings.average()
  }
}
