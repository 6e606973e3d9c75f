use cgmath::{Point3, Vector3};
use std::f32::consts::PI;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum GeometryError {
  #[error("sphere resolution must be at least 1")]
  ZeroResolution,
  #[error("sphere resolution {0} produces more vertices than a u32 index can address")]
  ResolutionTooLarge(u32),
  #[error("sphere radius must be positive and finite, got {0}")]
  InvalidRadius(f32),
  #[error("index {index} at position {position} is out of range for {vertex_count} vertices")]
  IndexOutOfRange {
    position: usize,
    index: u32,
    vertex_count: usize,
  },
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
  pub position: [f32; 3],
}

impl From<Point3<f32>> for Vertex {
  fn from(p: Point3<f32>) -> Self {
    Self {
      position: [p.x, p.y, p.z],
    }
  }
}

/// Vertex positions plus triangle indices into them.
///
/// Vertex order is the topology order the indices refer to.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Geometry {
  vertices: Vec<Vertex>,
  indices: Vec<u32>,
}

impl Geometry {
  pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Result<Self, GeometryError> {
    let geometry = Self { vertices, indices };
    geometry.validate()?;
    Ok(geometry)
  }

  /// UV sphere with `resolution` stacks and `resolution` sectors.
  ///
  /// Stacks sweep from +pi/2 down to -pi/2, sectors from 0 to 2pi, giving
  /// `(resolution + 1)^2` vertices. Triangles touching a pole collapse to a
  /// single fan, so the degenerate half of each pole quad is skipped.
  pub fn sphere(radius: f32, resolution: u32, center: Point3<f32>) -> Result<Self, GeometryError> {
    if resolution == 0 {
      return Err(GeometryError::ZeroResolution);
    }
    if !(radius.is_finite() && radius > 0.0) {
      return Err(GeometryError::InvalidRadius(radius));
    }
    let row = u64::from(resolution) + 1;
    if row * row > u64::from(u32::MAX) {
      return Err(GeometryError::ResolutionTooLarge(resolution));
    }

    let stacks = resolution;
    let sectors = resolution;
    let stack_step = PI / stacks as f32;
    let sector_step = 2.0 * PI / sectors as f32;
    let offset = Vector3::new(center.x, center.y, center.z);

    let mut vertices = Vec::with_capacity((row * row) as usize);
    for i in 0..=stacks {
      let stack_angle = PI / 2.0 - i as f32 * stack_step;
      let xy = radius * stack_angle.cos();
      let z = radius * stack_angle.sin();
      for j in 0..=sectors {
        let sector_angle = j as f32 * sector_step;
        let local = Point3::new(xy * sector_angle.cos(), xy * sector_angle.sin(), z);
        vertices.push(Vertex::from(local + offset));
      }
    }

    let mut indices = Vec::with_capacity(6 * (stacks as usize) * (stacks as usize).saturating_sub(1));
    for i in 0..stacks {
      let mut k1 = i * (sectors + 1);
      let mut k2 = k1 + sectors + 1;
      for _ in 0..sectors {
        if i != 0 {
          indices.extend_from_slice(&[k1, k2, k1 + 1]);
        }
        if i != stacks - 1 {
          indices.extend_from_slice(&[k1 + 1, k2, k2 + 1]);
        }
        k1 += 1;
        k2 += 1;
      }
    }

    Ok(Self { vertices, indices })
  }

  pub fn validate(&self) -> Result<(), GeometryError> {
    let vertex_count = self.vertices.len();
    match self
      .indices
      .iter()
      .enumerate()
      .find(|(_, &index)| index as usize >= vertex_count)
    {
      Some((position, &index)) => Err(GeometryError::IndexOutOfRange {
        position,
        index,
        vertex_count,
      }),
      None => Ok(()),
    }
  }

  pub fn vertices(&self) -> &[Vertex] {
    &self.vertices
  }

  pub fn indices(&self) -> &[u32] {
    &self.indices
  }

  pub fn is_empty(&self) -> bool {
    self.vertices.is_empty() || self.indices.is_empty()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use cgmath::{EuclideanSpace, InnerSpace};

  #[test]
  fn sphere_counts_match_resolution() {
    for resolution in 1..=24u32 {
      let sphere = Geometry::sphere(1.0, resolution, Point3::origin()).unwrap();
      let r = resolution as usize;
      assert_eq!(sphere.vertices().len(), (r + 1) * (r + 1));
      assert_eq!(sphere.indices().len(), 6 * r * (r - 1));
      sphere.validate().unwrap();
    }
  }

  #[test]
  fn vertices_lie_on_the_surface() {
    let center = Point3::new(1.5, -2.0, 0.25);
    let radius = 0.7;
    let sphere = Geometry::sphere(radius, 15, center).unwrap();
    for v in sphere.vertices() {
      let d = (Point3::from(v.position) - center).magnitude();
      assert!((d - radius).abs() < 1e-5, "vertex at distance {d}");
    }
  }

  #[test]
  fn zero_resolution_is_rejected() {
    assert_eq!(
      Geometry::sphere(1.0, 0, Point3::origin()),
      Err(GeometryError::ZeroResolution)
    );
  }

  #[test]
  fn non_positive_radius_is_rejected() {
    assert!(matches!(
      Geometry::sphere(0.0, 8, Point3::origin()),
      Err(GeometryError::InvalidRadius(_))
    ));
    assert!(matches!(
      Geometry::sphere(f32::NAN, 8, Point3::origin()),
      Err(GeometryError::InvalidRadius(_))
    ));
  }

  #[test]
  fn tessellation_is_deterministic() {
    let a = Geometry::sphere(0.2, 15, Point3::origin()).unwrap();
    let b = Geometry::sphere(0.2, 15, Point3::origin()).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn center_is_a_pure_translation() {
    let offset = Vector3::new(3.0, 4.0, -1.0);
    let at_origin = Geometry::sphere(0.5, 6, Point3::origin()).unwrap();
    let moved = Geometry::sphere(0.5, 6, Point3::from_vec(offset)).unwrap();
    assert_eq!(at_origin.indices(), moved.indices());
    for (a, b) in at_origin.vertices().iter().zip(moved.vertices()) {
      let shifted = Point3::from(a.position) + offset;
      assert_eq!(Vertex::from(shifted), *b);
    }
  }

  #[test]
  fn poles_have_no_degenerate_triangles() {
    let sphere = Geometry::sphere(1.0, 8, Point3::origin()).unwrap();
    for tri in sphere.indices().chunks(3) {
      let [a, b, c] = [tri[0], tri[1], tri[2]].map(|i| Point3::from(sphere.vertices()[i as usize].position));
      let area = (b - a).cross(c - a).magnitude();
      assert!(area > 1e-6, "degenerate triangle {tri:?}");
    }
  }

  #[test]
  fn validate_reports_out_of_range_index() {
    let vertices = vec![Vertex { position: [0.0; 3] }; 3];
    let err = Geometry::new(vertices, vec![0, 1, 3]).unwrap_err();
    assert_eq!(
      err,
      GeometryError::IndexOutOfRange {
        position: 2,
        index: 3,
        vertex_count: 3
      }
    );
  }
}
