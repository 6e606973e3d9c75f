use super::{Backend, BufferId, BufferKind, DrawCommand, ObjectUniform, Primitive, RenderError, Renderable};
use crate::geometry::Vertex;
use crate::trajectory::Trajectory;
use cgmath::{Matrix4, Point3, Vector3};
use std::rc::Rc;

const VERTEX_SIZE: u64 = std::mem::size_of::<Vertex>() as u64;

/// Line strip over a body's [`Trajectory`], streamed into a fixed-size vertex buffer.
pub struct TrailRenderable {
  trajectory: Trajectory,
  backend: Rc<dyn Backend>,
  buffer: Option<BufferId>,
}

impl TrailRenderable {
  pub fn new(backend: Rc<dyn Backend>, trajectory: Trajectory) -> Self {
    Self {
      trajectory,
      backend,
      buffer: None,
    }
  }

  pub fn record(&mut self, position: Point3<f32>) -> bool {
    self.trajectory.push(position)
  }

  pub fn trajectory(&self) -> &Trajectory {
    &self.trajectory
  }

  pub fn clear(&mut self) {
    self.trajectory.clear();
  }
}

impl Renderable for TrailRenderable {
  fn upload(&mut self) -> Result<(), RenderError> {
    if self.buffer.is_some() {
      return Ok(());
    }
    let size = self.trajectory.capacity() as u64 * VERTEX_SIZE;
    let id = self
      .backend
      .create_buffer("Trail Vertex Buffer", BufferKind::DynamicVertex, size, None)?;
    log::debug!("trail buffer allocated for {} points", self.trajectory.capacity());
    self.buffer = Some(id);
    Ok(())
  }

  fn draw(&self, model: &Matrix4<f32>, color: Vector3<f32>) -> Result<(), RenderError> {
    let id = self.buffer.ok_or(RenderError::NotUploaded("trail"))?;
    if self.trajectory.len() < 2 {
      return Ok(());
    }
    // Only the live prefix is rewritten, oldest point first.
    let (front, back) = self.trajectory.as_slices();
    self.backend.write_buffer(id, 0, bytemuck::cast_slice(front))?;
    if !back.is_empty() {
      let offset = front.len() as u64 * VERTEX_SIZE;
      self.backend.write_buffer(id, offset, bytemuck::cast_slice(back))?;
    }
    self.backend.submit(DrawCommand {
      primitive: Primitive::LineStrip,
      vertex_buffer: id,
      index_buffer: None,
      count: self.trajectory.len() as u32,
      uniforms: ObjectUniform::new(model, color),
    })
  }

  fn is_uploaded(&self) -> bool {
    self.buffer.is_some()
  }
}

impl Drop for TrailRenderable {
  fn drop(&mut self) {
    if let Some(id) = self.buffer.take() {
      self.backend.release_buffer(id);
      log::debug!("trail buffer released");
    }
  }
}
