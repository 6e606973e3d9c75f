use crate::SimParams;
use cgmath::{InnerSpace, MetricSpace, Point3, Quaternion, Rad, Rotation3, Vector3};

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum PhysicsError {
  #[error("body mass must be positive and finite, got {0}")]
  InvalidMass(f32),
  #[error("timestep must be positive and finite, got {0}")]
  InvalidTimestep(f32),
  #[error("physics must run at least once every frame interval, got update_every = 0")]
  ZeroUpdateInterval,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BodyState {
  Active,
  /// Fell into the gravity center. Terminal: the body is pinned there with zero velocity.
  Captured,
}

/// Point mass with a free-spinning orientation.
#[derive(Clone, Debug, PartialEq)]
pub struct PhysicsBody {
  position: Point3<f32>,
  velocity: Vector3<f32>,
  force: Vector3<f32>,
  mass: f32,
  orientation: Quaternion<f32>,
  angular_velocity: Vector3<f32>,
  state: BodyState,
}

impl PhysicsBody {
  pub fn new(position: Point3<f32>, velocity: Vector3<f32>, mass: f32) -> Result<Self, PhysicsError> {
    if !(mass.is_finite() && mass > 0.0) {
      return Err(PhysicsError::InvalidMass(mass));
    }
    Ok(Self {
      position,
      velocity,
      force: Vector3::new(0.0, 0.0, 0.0),
      mass,
      orientation: Quaternion::new(1.0, 0.0, 0.0, 0.0),
      angular_velocity: Vector3::new(0.0, 0.0, 0.0),
      state: BodyState::Active,
    })
  }

  /// A body that starts out captured at `center`, e.g. the visible marker for the gravity source.
  pub fn anchored(center: Point3<f32>, mass: f32) -> Result<Self, PhysicsError> {
    let mut body = Self::new(center, Vector3::new(0.0, 0.0, 0.0), mass)?;
    body.capture(center);
    Ok(body)
  }

  #[must_use]
  pub fn with_angular_velocity(mut self, angular_velocity: Vector3<f32>) -> Self {
    self.angular_velocity = angular_velocity;
    self
  }

  /// Adds to the force accumulator; consumed by the next integration step.
  pub fn apply_force(&mut self, force: Vector3<f32>) {
    self.force += force;
  }

  fn capture(&mut self, center: Point3<f32>) {
    self.position = center;
    self.velocity = Vector3::new(0.0, 0.0, 0.0);
    self.force = Vector3::new(0.0, 0.0, 0.0);
    self.state = BodyState::Captured;
  }

  pub fn position(&self) -> Point3<f32> {
    self.position
  }

  pub fn velocity(&self) -> Vector3<f32> {
    self.velocity
  }

  pub fn force(&self) -> Vector3<f32> {
    self.force
  }

  pub fn mass(&self) -> f32 {
    self.mass
  }

  pub fn orientation(&self) -> Quaternion<f32> {
    self.orientation
  }

  pub fn angular_velocity(&self) -> Vector3<f32> {
    self.angular_velocity
  }

  pub fn state(&self) -> BodyState {
    self.state
  }

  pub fn is_captured(&self) -> bool {
    self.state == BodyState::Captured
  }
}

/// Semi-implicit Euler integrator around one static gravity center.
#[derive(Copy, Clone, Debug)]
pub struct GravityIntegrator {
  center: Point3<f32>,
  gravity: f32,
  softening: f32,
  capture_radius: f32,
}

impl GravityIntegrator {
  pub fn new(params: &SimParams) -> Self {
    Self {
      center: params.gravity_center,
      gravity: params.gravity,
      softening: params.softening,
      capture_radius: params.capture_radius,
    }
  }

  pub fn center(&self) -> Point3<f32> {
    self.center
  }

  /// Softened inverse-square pull towards the center.
  pub fn acceleration_at(&self, position: Point3<f32>) -> Vector3<f32> {
    let r = position - self.center;
    let dist = r.magnitude();
    if dist == 0.0 {
      return Vector3::new(0.0, 0.0, 0.0);
    }
    let dist2 = dist * dist + self.softening;
    -r.normalize() * self.gravity / dist2
  }

  pub fn step<'b>(&self, bodies: impl IntoIterator<Item = &'b mut PhysicsBody>, dt: f32) {
    for body in bodies {
      self.step_body(body, dt);
    }
  }

  /// Advances one body by `dt`. Returns `true` if the body was captured on this step.
  pub fn step_body(&self, body: &mut PhysicsBody, dt: f32) -> bool {
    let mut captured_now = false;
    if body.state == BodyState::Active {
      if body.position.distance(self.center) < self.capture_radius {
        body.capture(self.center);
        captured_now = true;
      } else {
        let accel = self.acceleration_at(body.position);
        body.force += accel * body.mass;
        body.velocity += body.force / body.mass * dt;
        body.position += body.velocity * dt;
        body.force = Vector3::new(0.0, 0.0, 0.0);

        if body.position.distance(self.center) < self.capture_radius {
          body.capture(self.center);
          captured_now = true;
        }
      }
    }
    if captured_now {
      log::debug!("body captured at gravity center {:?}", self.center);
    }

    // Spin is independent of the translational state and is never damped.
    body.orientation = (body.orientation * spin(body.angular_velocity * dt)).normalize();
    captured_now
  }
}

fn spin(rotation: Vector3<f32>) -> Quaternion<f32> {
  let angle = rotation.magnitude();
  if angle <= f32::EPSILON {
    return Quaternion::new(1.0, 0.0, 0.0, 0.0);
  }
  Quaternion::from_axis_angle(rotation / angle, Rad(angle))
}

#[cfg(test)]
mod tests {
  use super::*;

  fn integrator() -> GravityIntegrator {
    GravityIntegrator::new(&SimParams::default())
  }

  fn reference_body() -> PhysicsBody {
    PhysicsBody::new(Point3::new(-3.0, 0.0, 0.0), Vector3::new(0.0, 0.7, 0.0), 1.0).unwrap()
  }

  #[test]
  fn rejects_non_positive_mass() {
    let origin = Point3::new(0.0, 0.0, 0.0);
    let still = Vector3::new(0.0, 0.0, 0.0);
    assert_eq!(PhysicsBody::new(origin, still, 0.0), Err(PhysicsError::InvalidMass(0.0)));
    assert!(PhysicsBody::new(origin, still, -2.0).is_err());
    assert!(PhysicsBody::new(origin, still, f32::INFINITY).is_err());
  }

  #[test]
  fn single_step_follows_semi_implicit_euler() {
    let g = integrator();
    let mut body = reference_body();
    let dt = 0.008;
    g.step_body(&mut body, dt);

    let gm = SimParams::default().gravity;
    let ax = gm / (9.0 + 1e-6);
    let vx = ax * dt;
    assert!((body.velocity().x - vx).abs() < 1e-6);
    assert!((body.velocity().y - 0.7).abs() < 1e-6);
    // Position uses the already updated velocity.
    assert!((body.position().x - (-3.0 + vx * dt)).abs() < 1e-6);
    assert!((body.position().y - 0.7 * dt).abs() < 1e-6);
  }

  #[test]
  fn force_accumulator_is_cleared_every_step() {
    let g = integrator();
    let mut body = reference_body();
    body.apply_force(Vector3::new(0.0, 0.0, 10.0));
    g.step_body(&mut body, 0.008);
    assert_eq!(body.force(), Vector3::new(0.0, 0.0, 0.0));
    let vz_after_kick = body.velocity().z;
    assert!((vz_after_kick - 0.08).abs() < 1e-6);

    g.step_body(&mut body, 0.008);
    assert!((body.velocity().z - vz_after_kick).abs() < 1e-5);
  }

  #[test]
  fn integration_is_deterministic() {
    let g = integrator();
    let mut a = reference_body().with_angular_velocity(Vector3::new(0.0, 1.3, 0.2));
    let mut b = a.clone();
    for _ in 0..2_000 {
      g.step_body(&mut a, 0.008);
    }
    for _ in 0..2_000 {
      g.step_body(&mut b, 0.008);
    }
    assert_eq!(a, b);
  }

  #[test]
  fn reference_body_moves_inward_along_velocity() {
    let g = integrator();
    let mut body = reference_body();
    let start = body.position();
    for _ in 0..10 {
      g.step_body(&mut body, 0.008);
    }
    assert!(body.position().x > start.x, "pulled toward the center");
    assert!(body.position().y > 0.05, "carried along the initial velocity");
    assert!(body.position().distance(start) > 0.05);
  }

  #[test]
  fn body_inside_capture_radius_is_pinned() {
    let g = integrator();
    let mut body = PhysicsBody::new(Point3::new(0.005, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0), 1.0).unwrap();
    assert!(g.step_body(&mut body, 0.008));
    assert_eq!(body.state(), BodyState::Captured);
    assert_eq!(body.position(), g.center());
    assert_eq!(body.velocity(), Vector3::new(0.0, 0.0, 0.0));

    body.apply_force(Vector3::new(5.0, 0.0, 0.0));
    for _ in 0..20 {
      assert!(!g.step_body(&mut body, 0.008));
    }
    assert_eq!(body.position(), g.center());
    assert_eq!(body.velocity(), Vector3::new(0.0, 0.0, 0.0));
  }

  #[test]
  fn capture_happens_on_the_crossing_step() {
    let g = GravityIntegrator::new(&SimParams {
      gravity: 0.0,
      ..SimParams::default()
    });
    // Coasting straight at the center, lands within the radius after one step.
    let mut body = PhysicsBody::new(Point3::new(0.02, 0.0, 0.0), Vector3::new(-1.5, 0.0, 0.0), 1.0).unwrap();
    let captured = g.step_body(&mut body, 0.01);
    assert!(captured);
    assert!(body.is_captured());
    assert_eq!(body.position(), g.center());
  }

  #[test]
  fn softening_keeps_acceleration_finite() {
    let g = integrator();
    let a = g.acceleration_at(Point3::new(1e-4, 0.0, 0.0));
    assert!(a.x.is_finite() && a.x < 0.0);
    assert_eq!(g.acceleration_at(g.center()), Vector3::new(0.0, 0.0, 0.0));
  }

  #[test]
  fn orientation_stays_normalized_and_spins() {
    let g = integrator();
    let mut body = reference_body().with_angular_velocity(Vector3::new(0.0, 2.0, 0.0));
    for _ in 0..5_000 {
      g.step_body(&mut body, 0.008);
      assert!((body.orientation().magnitude() - 1.0).abs() < 1e-5);
    }
    assert_ne!(body.orientation(), Quaternion::new(1.0, 0.0, 0.0, 0.0));
  }

  #[test]
  fn captured_bodies_keep_spinning() {
    let g = integrator();
    let mut body = PhysicsBody::anchored(g.center(), 1.0)
      .unwrap()
      .with_angular_velocity(Vector3::new(0.0, 0.0, 1.0));
    let before = body.orientation();
    g.step_body(&mut body, 0.1);
    assert_ne!(body.orientation(), before);
    assert_eq!(body.position(), g.center());
  }
}
