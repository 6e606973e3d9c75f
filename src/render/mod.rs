pub mod gpu;
pub mod headless;
pub mod mesh;
pub mod trail;

use cgmath::{Matrix4, Vector3};
use std::num::NonZeroU32;

pub use mesh::MeshRenderable;
pub use trail::TrailRenderable;

/// Rendering error types
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
  #[error("refusing to upload empty geometry for {0}")]
  EmptyGeometry(&'static str),
  #[error(transparent)]
  Geometry(#[from] crate::geometry::GeometryError),
  #[error("{0} drawn before its buffers were uploaded")]
  NotUploaded(&'static str),
  #[error("buffer id space exhausted")]
  OutOfBufferIds,
  #[error("unknown buffer {0:?}")]
  UnknownBuffer(BufferId),
  #[error("write of {len} bytes at offset {offset} overflows buffer {id:?} of {size} bytes")]
  BufferOverflow {
    id: BufferId,
    offset: u64,
    len: u64,
    size: u64,
  },
  #[error("shader compilation error: {0}")]
  Shader(String),
  #[error("failed to read shader source {path}: {source}")]
  ShaderSource {
    path: String,
    source: std::io::Error,
  },
  #[error("no compatible graphics adapter")]
  NoAdapter,
  #[error("surface does not support the adapter")]
  UnsupportedSurface,
  #[error("device request failed: {0}")]
  RequestDevice(#[from] wgpu::RequestDeviceError),
  #[error("surface creation failed: {0}")]
  CreateSurface(#[from] wgpu::CreateSurfaceError),
  #[error("surface error: {0}")]
  Surface(#[from] wgpu::SurfaceError),
}

/// Opaque handle into a [`Backend`]'s buffer table. Zero is never handed out.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BufferId(NonZeroU32);

impl BufferId {
  /// The id following `counter`, or `None` once the id space is exhausted.
  pub(crate) fn next_after(counter: u32) -> Option<Self> {
    counter.checked_add(1).and_then(NonZeroU32::new).map(Self)
  }

  pub fn get(self) -> u32 {
    self.0.get()
  }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BufferKind {
  /// Written once at creation.
  Vertex,
  /// Rewritten in sub-ranges every frame.
  DynamicVertex,
  Index,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Primitive {
  Triangles,
  LineStrip,
}

/// Per-draw `model` and `color` slots.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectUniform {
  pub model: [[f32; 4]; 4],
  pub color: [f32; 4],
}

impl ObjectUniform {
  pub fn new(model: &Matrix4<f32>, color: Vector3<f32>) -> Self {
    Self {
      model: (*model).into(),
      color: [color.x, color.y, color.z, 1.0],
    }
  }
}

/// Per-frame `view` and `projection` slots.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
  pub view: [[f32; 4]; 4],
  pub projection: [[f32; 4]; 4],
}

impl CameraUniform {
  pub fn new() -> Self {
    use cgmath::SquareMatrix;
    Self {
      view: Matrix4::identity().into(),
      projection: Matrix4::identity().into(),
    }
  }

  pub fn update(&mut self, view: &Matrix4<f32>, projection: &Matrix4<f32>) {
    self.view = (*view).into();
    self.projection = (*projection).into();
  }
}

impl Default for CameraUniform {
  fn default() -> Self {
    Self::new()
  }
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct DrawCommand {
  pub primitive: Primitive,
  pub vertex_buffer: BufferId,
  pub index_buffer: Option<BufferId>,
  /// Index count for indexed draws, vertex count otherwise.
  pub count: u32,
  pub uniforms: ObjectUniform,
}

/// The device a [`Renderable`] allocates buffers on and submits draws to.
///
/// Shared through `Rc<dyn Backend>`; everything runs on the render thread, so
/// implementations use interior mutability rather than `&mut self`.
pub trait Backend {
  fn create_buffer(
    &self,
    label: &str,
    kind: BufferKind,
    size: u64,
    contents: Option<&[u8]>,
  ) -> Result<BufferId, RenderError>;

  fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), RenderError>;

  /// Unknown ids are ignored.
  fn release_buffer(&self, id: BufferId);

  /// Starts a frame. Draws still queued from a frame that was never rendered are dropped.
  fn set_camera(&self, view: &Matrix4<f32>, projection: &Matrix4<f32>);

  fn submit(&self, command: DrawCommand) -> Result<(), RenderError>;
}

/// Something that owns GPU buffers and can draw itself.
///
/// `upload` must succeed before the first `draw`; calling it again is a no-op.
/// Buffers are released when the renderable is dropped.
pub trait Renderable {
  fn upload(&mut self) -> Result<(), RenderError>;

  fn draw(&self, model: &Matrix4<f32>, color: Vector3<f32>) -> Result<(), RenderError>;

  fn is_uploaded(&self) -> bool;
}
