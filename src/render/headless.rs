use super::{Backend, BufferId, BufferKind, CameraUniform, DrawCommand, Primitive, RenderError};
use cgmath::Matrix4;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct BackendStats {
  pub created: usize,
  pub released: usize,
  pub writes: usize,
  pub triangle_draws: usize,
  pub line_draws: usize,
  pub camera_uploads: usize,
}

struct HostBuffer {
  kind: BufferKind,
  data: Vec<u8>,
}

/// CPU-side [`Backend`]: buffers live in host memory and draws are queued for inspection.
///
/// Checks ids and write ranges the same way the wgpu backend does, so a
/// headless run exercises the full upload/draw lifecycle without a GPU.
#[derive(Default)]
pub struct HeadlessBackend {
  buffers: RefCell<HashMap<BufferId, HostBuffer>>,
  next_id: Cell<u32>,
  commands: RefCell<Vec<DrawCommand>>,
  camera: Cell<CameraUniform>,
  stats: Cell<BackendStats>,
}

impl HeadlessBackend {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn stats(&self) -> BackendStats {
    self.stats.get()
  }

  pub fn live_buffers(&self) -> usize {
    self.buffers.borrow().len()
  }

  pub fn buffer_size(&self, id: BufferId) -> Option<u64> {
    self.buffers.borrow().get(&id).map(|b| b.data.len() as u64)
  }

  pub fn buffer_kind(&self, id: BufferId) -> Option<BufferKind> {
    self.buffers.borrow().get(&id).map(|b| b.kind)
  }

  pub fn buffer_contents(&self, id: BufferId) -> Option<Vec<u8>> {
    self.buffers.borrow().get(&id).map(|b| b.data.clone())
  }

  pub fn camera(&self) -> CameraUniform {
    self.camera.get()
  }

  /// Drains the draws submitted since the last call, i.e. one frame's worth.
  pub fn take_commands(&self) -> Vec<DrawCommand> {
    std::mem::take(&mut *self.commands.borrow_mut())
  }

  fn bump(&self, f: impl FnOnce(&mut BackendStats)) {
    let mut stats = self.stats.get();
    f(&mut stats);
    self.stats.set(stats);
  }
}

impl Backend for HeadlessBackend {
  fn create_buffer(
    &self,
    label: &str,
    kind: BufferKind,
    size: u64,
    contents: Option<&[u8]>,
  ) -> Result<BufferId, RenderError> {
    let id = BufferId::next_after(self.next_id.get()).ok_or(RenderError::OutOfBufferIds)?;
    let mut data = vec![0u8; size as usize];
    if let Some(contents) = contents {
      if contents.len() as u64 > size {
        return Err(RenderError::BufferOverflow {
          id,
          offset: 0,
          len: contents.len() as u64,
          size,
        });
      }
      data[..contents.len()].copy_from_slice(contents);
    }
    self.next_id.set(id.get());
    self.buffers.borrow_mut().insert(id, HostBuffer { kind, data });
    self.bump(|s| s.created += 1);
    log::trace!("headless: created {label} {id:?} ({size} bytes)");
    Ok(id)
  }

  fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), RenderError> {
    let mut buffers = self.buffers.borrow_mut();
    let buffer = buffers.get_mut(&id).ok_or(RenderError::UnknownBuffer(id))?;
    let size = buffer.data.len() as u64;
    let len = data.len() as u64;
    if offset + len > size {
      return Err(RenderError::BufferOverflow { id, offset, len, size });
    }
    let start = offset as usize;
    buffer.data[start..start + data.len()].copy_from_slice(data);
    drop(buffers);
    self.bump(|s| s.writes += 1);
    Ok(())
  }

  fn release_buffer(&self, id: BufferId) {
    if self.buffers.borrow_mut().remove(&id).is_some() {
      self.bump(|s| s.released += 1);
    }
  }

  fn set_camera(&self, view: &Matrix4<f32>, projection: &Matrix4<f32>) {
    self.commands.borrow_mut().clear();
    let mut camera = self.camera.get();
    camera.update(view, projection);
    self.camera.set(camera);
    self.bump(|s| s.camera_uploads += 1);
  }

  fn submit(&self, command: DrawCommand) -> Result<(), RenderError> {
    {
      let buffers = self.buffers.borrow();
      if !buffers.contains_key(&command.vertex_buffer) {
        return Err(RenderError::UnknownBuffer(command.vertex_buffer));
      }
      if let Some(index) = command.index_buffer {
        if !buffers.contains_key(&index) {
          return Err(RenderError::UnknownBuffer(index));
        }
      }
    }
    match command.primitive {
      Primitive::Triangles => self.bump(|s| s.triangle_draws += 1),
      Primitive::LineStrip => self.bump(|s| s.line_draws += 1),
    }
    self.commands.borrow_mut().push(command);
    Ok(())
  }
}
