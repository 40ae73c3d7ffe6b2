use criterion::{black_box, criterion_group, criterion_main, Criterion};

use voxelfield::constants::{grid_index, GRID_SIZE};
use voxelfield::grid::new_grid_buffer;
use voxelfield::surface_nets::mesh_grid;
use voxelfield::voxel::{materials, sdf_to_weight, Voxel};

fn sphere_grid(radius: f32) -> voxelfield::grid::GridBuffer {
  let mut grid = new_grid_buffer();
  let center = GRID_SIZE as f32 * 0.5;
  for z in 0..GRID_SIZE {
    for y in 0..GRID_SIZE {
      for x in 0..GRID_SIZE {
        let dx = x as f32 - center;
        let dy = y as f32 - center;
        let dz = z as f32 - center;
        let sdf = (dx * dx + dy * dy + dz * dz).sqrt() - radius;
        grid[grid_index(x, y, z)] = Voxel::pack(sdf_to_weight(sdf), materials::STONE, 0);
      }
    }
  }
  grid
}

fn mixed_material_grid() -> voxelfield::grid::GridBuffer {
  let mut grid = new_grid_buffer();
  let center = GRID_SIZE as f32 * 0.5;
  for z in 0..GRID_SIZE {
    for y in 0..GRID_SIZE {
      for x in 0..GRID_SIZE {
        let dx = x as f32 - center;
        let dy = y as f32 - center;
        let dz = z as f32 - center;
        let sdf = (dx * dx + dy * dy + dz * dz).sqrt() - 12.0;
        let material = match y / 8 {
          0 => materials::STONE,
          1 => materials::WATER,
          2 => materials::GLASS,
          _ => materials::GRASS,
        };
        grid[grid_index(x, y, z)] = Voxel::pack(sdf_to_weight(sdf), material, 0);
      }
    }
  }
  grid
}

fn bench_surface_nets(c: &mut Criterion) {
  let sphere = sphere_grid(12.0);
  c.bench_function("mesh_grid/sphere_r12", |b| {
    b.iter(|| mesh_grid(black_box(&sphere), [false; 3]))
  });

  let small = sphere_grid(4.0);
  c.bench_function("mesh_grid/sphere_r4", |b| {
    b.iter(|| mesh_grid(black_box(&small), [false; 3]))
  });

  let mixed = mixed_material_grid();
  c.bench_function("mesh_grid/three_surfaces", |b| {
    b.iter(|| mesh_grid(black_box(&mixed), [false; 3]))
  });
}

criterion_group!(benches, bench_surface_nets);
criterion_main!(benches);
