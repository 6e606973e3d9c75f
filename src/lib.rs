pub mod camera;
pub mod celestial;
pub mod error;
pub mod geometry;
pub mod physics;
pub mod render;
pub mod scenario;
pub mod state;
pub mod trajectory;
pub mod universe;

use cgmath::{Point3, Vector3};

pub use error::AppError;

/// Fixed-step integration settings shared by the integrator and the orchestrator.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct SimParams {
  pub delta_t: f32,
  /// Strength of the single gravity center (G·M folded into one constant).
  pub gravity: f32,
  pub softening: f32,
  pub capture_radius: f32,
  /// Physics runs once every `update_every` rendered frames.
  pub update_every: u32,
  pub gravity_center: Point3<f32>,
}

impl Default for SimParams {
  fn default() -> Self {
    Self {
      delta_t: 0.008,
      gravity: 4.8,
      softening: 1e-6,
      capture_radius: 0.01,
      update_every: 10,
      gravity_center: Point3::new(0.0, 0.0, 0.0),
    }
  }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TrailParams {
  /// Points kept before the oldest is evicted. Values below 2 are raised to 2,
  /// the fewest a line strip can be drawn from.
  pub capacity: usize,
  pub min_spacing: f32,
}

impl Default for TrailParams {
  fn default() -> Self {
    Self {
      capacity: 500,
      min_spacing: 0.05,
    }
  }
}

pub struct CameraParams {
  pub pan_sensitivity: f32,
  pub zoom_sensitivity: f32,
  pub min_distance: f32,
  pub max_distance: f32,
  pub eye: Point3<f32>,
  pub target: Point3<f32>,
}

impl Default for CameraParams {
  fn default() -> Self {
    Self {
      pan_sensitivity: 0.02,
      zoom_sensitivity: 0.5,
      min_distance: 2.0,
      max_distance: 50.0,
      eye: Point3::new(-6.0, 4.0, -10.0),
      target: Point3::new(0.0, 0.0, 0.0),
    }
  }
}

#[derive(Clone, Debug)]
pub struct ScenarioParams {
  pub resolution: u32,
  pub body_radius: f32,
  pub anchor_radius: f32,
  pub body_color: Vector3<f32>,
  pub anchor_color: Vector3<f32>,
  pub trail_color: Vector3<f32>,
  pub planet_position: Point3<f32>,
  pub planet_velocity: Vector3<f32>,
  pub planet_mass: f32,
  /// Extra randomly placed bodies on near-circular orbits.
  pub satellites: u32,
  pub seed: u64,
  pub trails: bool,
}

impl Default for ScenarioParams {
  fn default() -> Self {
    Self {
      resolution: 15,
      body_radius: 0.2,
      anchor_radius: 0.5,
      body_color: Vector3::new(1.0, 1.0, 0.2),
      anchor_color: Vector3::new(1.0, 0.55, 0.1),
      trail_color: Vector3::new(0.5, 0.8, 0.2),
      planet_position: Point3::new(-3.0, 0.0, 0.0),
      planet_velocity: Vector3::new(0.0, 0.7, 0.0),
      planet_mass: 1.0,
      satellites: 0,
      seed: 42,
      trails: true,
    }
  }
}
