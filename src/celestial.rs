use crate::physics::PhysicsBody;
use crate::render::{MeshRenderable, RenderError, Renderable, TrailRenderable};
use cgmath::{EuclideanSpace, Matrix4, Point3, SquareMatrix, Vector3};

/// One simulated body together with everything needed to draw it.
pub struct Celestial {
  name: String,
  body: PhysicsBody,
  mesh: MeshRenderable,
  trail: Option<TrailRenderable>,
  tracking: bool,
  color: Vector3<f32>,
  trail_color: Vector3<f32>,
  prev_position: Point3<f32>,
  interpolated: Point3<f32>,
}

impl Celestial {
  pub fn new(name: impl Into<String>, body: PhysicsBody, mesh: MeshRenderable, color: Vector3<f32>) -> Self {
    let position = body.position();
    Self {
      name: name.into(),
      body,
      mesh,
      trail: None,
      tracking: false,
      color,
      trail_color: Vector3::new(1.0, 1.0, 1.0),
      prev_position: position,
      interpolated: position,
    }
  }

  #[must_use]
  pub fn with_trail(mut self, trail: TrailRenderable, color: Vector3<f32>) -> Self {
    self.trail = Some(trail);
    self.trail_color = color;
    self.tracking = true;
    self
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn body(&self) -> &PhysicsBody {
    &self.body
  }

  pub(crate) fn body_mut(&mut self) -> &mut PhysicsBody {
    &mut self.body
  }

  pub fn trail(&self) -> Option<&TrailRenderable> {
    self.trail.as_ref()
  }

  pub fn mesh(&self) -> &MeshRenderable {
    &self.mesh
  }

  pub fn prev_position(&self) -> Point3<f32> {
    self.prev_position
  }

  pub fn interpolated_position(&self) -> Point3<f32> {
    self.interpolated
  }

  pub fn is_tracking(&self) -> bool {
    self.tracking && self.trail.is_some()
  }

  /// Stops (or resumes) feeding and drawing the trail. The recorded history is kept.
  pub fn set_tracking(&mut self, tracking: bool) {
    self.tracking = tracking;
  }

  pub fn set_color(&mut self, color: Vector3<f32>) {
    self.color = color;
  }

  pub fn set_trail_color(&mut self, color: Vector3<f32>) {
    self.trail_color = color;
  }

  pub fn upload(&mut self) -> Result<(), RenderError> {
    self.mesh.upload()?;
    if let Some(trail) = self.trail.as_mut() {
      trail.upload()?;
    }
    Ok(())
  }

  /// Remembers the pre-step position that interpolation starts from.
  pub(crate) fn snapshot(&mut self) {
    self.prev_position = self.body.position();
  }

  /// Blends between the last two integrated positions and records the result in the trail.
  pub(crate) fn interpolate(&mut self, alpha: f32) -> Point3<f32> {
    let prev = self.prev_position.to_vec();
    let current = self.body.position().to_vec();
    self.interpolated = Point3::from_vec(prev + (current - prev) * alpha);
    if self.tracking {
      if let Some(trail) = self.trail.as_mut() {
        trail.record(self.interpolated);
      }
    }
    self.interpolated
  }

  pub fn model_matrix(&self) -> Matrix4<f32> {
    Matrix4::from_translation(self.interpolated.to_vec()) * Matrix4::from(self.body.orientation())
  }

  /// Mesh first, then the trail when tracking. Trail points are already in world space.
  ///
  /// Nothing is submitted unless every renderable that would be drawn has been uploaded.
  pub fn draw(&self) -> Result<(), RenderError> {
    let trail = self.trail.as_ref().filter(|_| self.tracking);
    if !self.mesh.is_uploaded() {
      return Err(RenderError::NotUploaded("mesh"));
    }
    if trail.is_some_and(|t| !t.is_uploaded()) {
      return Err(RenderError::NotUploaded("trail"));
    }

    self.mesh.draw(&self.model_matrix(), self.color)?;
    if let Some(trail) = trail {
      trail.draw(&Matrix4::identity(), self.trail_color)?;
    }
    Ok(())
  }
}
