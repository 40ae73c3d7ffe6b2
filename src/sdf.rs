//! Signed-distance primitives and the build-config dispatcher.
//!
//! All distances are in voxel units, negative inside, and the primitives are
//! the standard inigo-quilez formulations, so they are 1-Lipschitz almost
//! everywhere. That bound is what keeps the mesher's edge interpolation
//! well-behaved: a weight sampled one voxel from the surface can never
//! overshoot the quantization range.

use glam::{Vec2, Vec3};

use crate::voxel::MaterialId;

/// Brush shape of a build operation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BuildShape {
  Cube,
  Sphere,
  Cylinder,
  Prism,
}

/// How a drawn signed distance combines with the existing voxel field.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum BuildMode {
  /// Union: raise weights inside the shape, writing the brush material
  /// where the weight grew.
  Add,
  /// Carve: lower weights inside the shape, leaving materials alone.
  Subtract,
  /// Repaint the material of already-solid cells inside the shape.
  Paint,
  /// Union like `Add`, but the brush material is written over the whole
  /// intersection, including cells that were already solid.
  Fill,
}

/// A user-authored brush: shape, combine mode, size and material, plus the
/// optional shell/arc modifiers.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct BuildConfig {
  pub shape: BuildShape,
  pub mode: BuildMode,
  /// Half-extents in voxels. Spheres use `size.x` as radius, cylinders
  /// `size.x` radius / `size.y` half-height, prisms `size.x` width and
  /// `size.z` half-length.
  pub size: Vec3,
  /// Palette index written by Add / Paint / Fill.
  pub material: MaterialId,
  /// Hollow the shape into a shell of this half-thickness (voxels).
  pub thickness: Option<f32>,
  /// Keep only the angular slice `|atan2(z, x)| <= arc_sweep / 2` (radians).
  pub arc_sweep: Option<f32>,
  /// With both `thickness` and `arc_sweep`: cap the open ends of the shell.
  pub closed: bool,
}

impl BuildConfig {
  pub fn new(shape: BuildShape, mode: BuildMode, size: Vec3, material: MaterialId) -> Self {
    Self {
      shape,
      mode,
      size,
      material,
      thickness: None,
      arc_sweep: None,
      closed: false,
    }
  }

  pub fn with_thickness(mut self, thickness: f32) -> Self {
    self.thickness = Some(thickness);
    self
  }

  pub fn with_arc_sweep(mut self, radians: f32) -> Self {
    self.arc_sweep = Some(radians);
    self
  }

  pub fn with_closed(mut self, closed: bool) -> Self {
    self.closed = closed;
    self
  }
}

// =============================================================================
// Primitives
// =============================================================================

/// Sphere of radius `r` at the origin.
#[inline]
pub fn sd_sphere(p: Vec3, r: f32) -> f32 {
  p.length() - r
}

/// Axis-aligned box with half-extents `b`.
#[inline]
pub fn sd_box(p: Vec3, b: Vec3) -> f32 {
  let q = p.abs() - b;
  q.max(Vec3::ZERO).length() + q.max_element().min(0.0)
}

/// Capped cylinder along Y: radius `r`, half-height `h`.
#[inline]
pub fn sd_capped_cylinder(p: Vec3, r: f32, h: f32) -> f32 {
  let d = Vec2::new(Vec2::new(p.x, p.z).length(), p.y).abs() - Vec2::new(r, h);
  d.max(Vec2::ZERO).length() + d.x.max(d.y).min(0.0)
}

/// Triangular prism along Z: triangle width `w`, half-length `h`.
#[inline]
pub fn sd_tri_prism(p: Vec3, w: f32, h: f32) -> f32 {
  let q = p.abs();
  (q.z - h).max((q.x * 0.866_025 + p.y * 0.5).max(-p.y) - w * 0.5)
}

// =============================================================================
// Config dispatch
// =============================================================================

/// Evaluate a configured brush at a brush-local point (voxel units).
///
/// Modifier order depends on `closed`: a closed arc cuts the solid shape
/// first and then shells it, so the shell wraps around the cut faces; an
/// open arc shells first and then cuts, leaving the shell ends open.
pub fn sdf_from_config(p: Vec3, config: &BuildConfig) -> f32 {
  let mut d = match config.shape {
    BuildShape::Cube => sd_box(p, config.size),
    BuildShape::Sphere => sd_sphere(p, config.size.x),
    BuildShape::Cylinder => sd_capped_cylinder(p, config.size.x, config.size.y),
    BuildShape::Prism => sd_tri_prism(p, config.size.x, config.size.z),
  };

  match (config.thickness, config.arc_sweep) {
    (None, None) => d,
    (Some(t), None) => d.abs() - t,
    (None, Some(sweep)) => d.max(sd_arc_cut(p, sweep)),
    (Some(t), Some(sweep)) => {
      if config.closed {
        d = d.max(sd_arc_cut(p, sweep));
        d.abs() - t
      } else {
        d = d.abs() - t;
        d.max(sd_arc_cut(p, sweep))
      }
    }
  }
}

/// Signed distance to the wedge `|atan2(z, x)| <= sweep / 2` around the Y
/// axis (negative inside the wedge). Exact out to a quarter turn past the
/// cut plane, clamped to the radial distance beyond.
#[inline]
fn sd_arc_cut(p: Vec3, sweep: f32) -> f32 {
  let half = (sweep * 0.5).clamp(0.0, std::f32::consts::PI);
  let r = Vec2::new(p.x, p.z).length();
  let phi = p.z.atan2(p.x).abs();
  let delta = phi - half;
  if delta.abs() < std::f32::consts::FRAC_PI_2 {
    r * delta.sin()
  } else if delta > 0.0 {
    r
  } else {
    -r
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn sphere_distances() {
    assert!((sd_sphere(Vec3::new(3.0, 0.0, 0.0), 2.0) - 1.0).abs() < 1e-6);
    assert!((sd_sphere(Vec3::ZERO, 2.0) + 2.0).abs() < 1e-6);
    assert!(sd_sphere(Vec3::new(2.0, 0.0, 0.0), 2.0).abs() < 1e-6);
  }

  #[test]
  fn box_distances() {
    let b = Vec3::new(1.0, 2.0, 3.0);
    // On a face.
    assert!(sd_box(Vec3::new(1.0, 0.0, 0.0), b).abs() < 1e-6);
    // Outside along one axis.
    assert!((sd_box(Vec3::new(2.5, 0.0, 0.0), b) - 1.5).abs() < 1e-6);
    // Inside: distance to the nearest face.
    assert!((sd_box(Vec3::new(0.5, 0.0, 0.0), b) + 0.5).abs() < 1e-6);
    // Outside a corner: Euclidean distance.
    let corner = Vec3::new(2.0, 3.0, 4.0);
    let expected = (corner - b).length();
    assert!((sd_box(corner, b) - expected).abs() < 1e-6);
  }

  #[test]
  fn cylinder_distances() {
    // On the barrel.
    assert!(sd_capped_cylinder(Vec3::new(2.0, 0.0, 0.0), 2.0, 3.0).abs() < 1e-6);
    // On a cap.
    assert!(sd_capped_cylinder(Vec3::new(0.0, 3.0, 0.0), 2.0, 3.0).abs() < 1e-6);
    // Inside.
    assert!(sd_capped_cylinder(Vec3::ZERO, 2.0, 3.0) < 0.0);
  }

  #[test]
  fn prism_contains_origin() {
    assert!(sd_tri_prism(Vec3::ZERO, 2.0, 2.0) < 0.0);
    assert!(sd_tri_prism(Vec3::new(0.0, 0.0, 5.0), 2.0, 2.0) > 0.0);
    assert!(sd_tri_prism(Vec3::new(0.0, 3.0, 0.0), 2.0, 2.0) > 0.0);
  }

  #[test]
  fn lipschitz_bound_spot_check() {
    // |∇sdf| <= 1 almost everywhere: finite differences along x never
    // exceed the step.
    let config = BuildConfig::new(
      BuildShape::Cylinder,
      BuildMode::Add,
      Vec3::new(2.0, 3.0, 0.0),
      1,
    );
    let step = 0.01;
    let mut x = -5.0f32;
    while x < 5.0 {
      let p0 = Vec3::new(x, 1.3, -0.7);
      let p1 = Vec3::new(x + step, 1.3, -0.7);
      let d = (sdf_from_config(p1, &config) - sdf_from_config(p0, &config)).abs();
      assert!(d <= step + 1e-4, "gradient {} at x={}", d / step, x);
      x += step * 10.0;
    }
  }

  #[test]
  fn thickness_makes_a_shell() {
    let config = BuildConfig::new(
      BuildShape::Sphere,
      BuildMode::Add,
      Vec3::splat(4.0),
      1,
    )
    .with_thickness(0.5);
    // Center of a hollow sphere is outside the shell.
    assert!(sdf_from_config(Vec3::ZERO, &config) > 0.0);
    // On the original surface: deepest inside the shell.
    assert!((sdf_from_config(Vec3::new(4.0, 0.0, 0.0), &config) + 0.5).abs() < 1e-6);
  }

  #[test]
  fn arc_sweep_slices_the_shape() {
    let config = BuildConfig::new(
      BuildShape::Sphere,
      BuildMode::Add,
      Vec3::splat(4.0),
      1,
    )
    .with_arc_sweep(std::f32::consts::FRAC_PI_2);
    // +x is inside the 90° slice.
    assert!(sdf_from_config(Vec3::new(3.0, 0.0, 0.0), &config) < 0.0);
    // -x is cut away.
    assert!(sdf_from_config(Vec3::new(-3.0, 0.0, 0.0), &config) > 0.0);
  }
}
