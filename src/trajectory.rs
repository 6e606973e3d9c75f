use crate::geometry::Vertex;
use crate::TrailParams;
use cgmath::{MetricSpace, Point3};
use std::collections::VecDeque;

const MIN_CAPACITY: usize = 2;

/// Bounded, distance-decimated history of one body's positions.
#[derive(Clone, Debug)]
pub struct Trajectory {
  points: VecDeque<Vertex>,
  capacity: usize,
  min_spacing: f32,
}

impl Trajectory {
  /// Capacities below 2 are raised to 2.
  pub fn new(params: &TrailParams) -> Self {
    let capacity = params.capacity.max(MIN_CAPACITY);
    Self {
      points: VecDeque::with_capacity(capacity + 1),
      capacity,
      min_spacing: params.min_spacing,
    }
  }

  /// Records `point` unless it sits within `min_spacing` of the last kept point.
  /// Returns whether the point was kept.
  pub fn push(&mut self, point: Point3<f32>) -> bool {
    if let Some(last) = self.points.back() {
      if Point3::from(last.position).distance(point) <= self.min_spacing {
        return false;
      }
    }
    self.points.push_back(Vertex::from(point));
    while self.points.len() > self.capacity {
      self.points.pop_front();
    }
    true
  }

  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn last(&self) -> Option<Point3<f32>> {
    self.points.back().map(|v| Point3::from(v.position))
  }

  pub fn points(&self) -> impl Iterator<Item = Point3<f32>> + '_ {
    self.points.iter().map(|v| Point3::from(v.position))
  }

  /// Oldest-first storage, possibly split in two by the ring layout.
  pub fn as_slices(&self) -> (&[Vertex], &[Vertex]) {
    self.points.as_slices()
  }

  pub fn clear(&mut self) {
    self.points.clear();
  }
}
