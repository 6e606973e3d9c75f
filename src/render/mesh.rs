use super::{Backend, BufferId, BufferKind, DrawCommand, ObjectUniform, Primitive, RenderError, Renderable};
use crate::geometry::Geometry;
use cgmath::{Matrix4, Vector3};
use std::rc::Rc;

struct MeshBuffers {
  vertex: BufferId,
  index: BufferId,
}

/// Static indexed triangle mesh.
pub struct MeshRenderable {
  geometry: Geometry,
  backend: Rc<dyn Backend>,
  buffers: Option<MeshBuffers>,
}

impl MeshRenderable {
  /// Fails before touching the backend if `geometry` has nothing to draw.
  pub fn new(backend: Rc<dyn Backend>, geometry: Geometry) -> Result<Self, RenderError> {
    if geometry.is_empty() {
      return Err(RenderError::EmptyGeometry("mesh"));
    }
    geometry.validate()?;
    Ok(Self {
      geometry,
      backend,
      buffers: None,
    })
  }

  pub fn geometry(&self) -> &Geometry {
    &self.geometry
  }

  pub fn index_count(&self) -> u32 {
    self.geometry.indices().len() as u32
  }
}

impl Renderable for MeshRenderable {
  fn upload(&mut self) -> Result<(), RenderError> {
    if self.buffers.is_some() {
      return Ok(());
    }
    let vertex_bytes: &[u8] = bytemuck::cast_slice(self.geometry.vertices());
    let index_bytes: &[u8] = bytemuck::cast_slice(self.geometry.indices());

    let vertex = self.backend.create_buffer(
      "Mesh Vertex Buffer",
      BufferKind::Vertex,
      vertex_bytes.len() as u64,
      Some(vertex_bytes),
    )?;
    let index = match self.backend.create_buffer(
      "Mesh Index Buffer",
      BufferKind::Index,
      index_bytes.len() as u64,
      Some(index_bytes),
    ) {
      Ok(index) => index,
      Err(e) => {
        self.backend.release_buffer(vertex);
        return Err(e);
      }
    };
    log::debug!(
      "mesh uploaded: {} vertices, {} indices",
      self.geometry.vertices().len(),
      self.geometry.indices().len()
    );
    self.buffers = Some(MeshBuffers { vertex, index });
    Ok(())
  }

  fn draw(&self, model: &Matrix4<f32>, color: Vector3<f32>) -> Result<(), RenderError> {
    let buffers = self.buffers.as_ref().ok_or(RenderError::NotUploaded("mesh"))?;
    self.backend.submit(DrawCommand {
      primitive: Primitive::Triangles,
      vertex_buffer: buffers.vertex,
      index_buffer: Some(buffers.index),
      count: self.index_count(),
      uniforms: ObjectUniform::new(model, color),
    })
  }

  fn is_uploaded(&self) -> bool {
    self.buffers.is_some()
  }
}

impl Drop for MeshRenderable {
  fn drop(&mut self) {
    if let Some(buffers) = self.buffers.take() {
      self.backend.release_buffer(buffers.vertex);
      self.backend.release_buffer(buffers.index);
      log::debug!("mesh buffers released");
    }
  }
}
