//! voxelfield - client-side voxel world core for a multiplayer sandbox.
//!
//! A chunked, editable scalar field meshed by a multi-surface Surface Nets
//! extraction, with a non-destructive build preview that stages SDF edits,
//! meshes them on background workers and swaps the results in atomically.
//!
//! The crate is engine-agnostic: it consumes an anchor position and edit
//! commands, and produces per-chunk geometry buffers (three surfaces per
//! chunk, per-triangle material blending). Rendering, input, physics and
//! networking live outside.
//!
//! # Frame loop
//!
//! ```ignore
//! use voxelfield::{BuildPreview, MeshWorkerPool, VoxelWorld, WorldConfig};
//! use voxelfield::terrain::NoiseTerrain;
//!
//! let pool = MeshWorkerPool::new();
//! let mut world = VoxelWorld::new(
//!     WorldConfig::default(),
//!     Box::new(NoiseTerrain::new(1337)),
//! );
//! let mut preview = BuildPreview::new();
//!
//! // Each frame:
//! let events = world.update(player_position, &pool);
//! preview.handle_events(&events, &mut world);
//! preview.poll(&mut world, &pool);
//!
//! // While the builder is aiming:
//! preview.update_preview(cursor, rotation, brush, &mut world, &pool);
//! // On click (local commit) or server confirmation:
//! preview.commit_preview(&mut world);
//! ```

pub mod constants;
pub mod voxel;
pub mod chunk;
pub mod sdf;
pub mod build;
pub mod grid;
pub mod edge_table;

// Re-export commonly used items
pub use chunk::{Chunk, ChunkKey};
pub use constants::{CHUNK_SIZE, CHUNK_WORLD_SIZE, GRID_SIZE, MESH_MARGIN, VOXEL_SCALE};
pub use sdf::{BuildConfig, BuildMode, BuildShape};
pub use voxel::{MaterialId, MaterialKind, Voxel, MATERIAL_KINDS};

// Surface extraction
pub mod surface_nets;
pub use surface_nets::{ChunkSurfaces, SurfaceNetOutput};

// Render-facing geometry expansion
pub mod geometry;
pub use geometry::TriangleGeometry;

// Worker pool for off-thread meshing
pub mod worker;
pub use worker::{BatchHandle, MeshJob, MeshResult, MeshWorkerPool};

// World state and edits
pub mod world;
pub use world::{ChunkMeshes, VoxelWorld, WorldConfig, WorldEvents};
pub use build::BuildOperation;

// Non-destructive build preview
pub mod preview;
pub use preview::BuildPreview;

// Terrain generation and stamps
pub mod stamp;
pub mod terrain;
pub use terrain::{ChunkFiller, NoiseTerrain};

// Engine-agnostic metrics collection
pub mod metrics;
