use super::{Backend, BufferId, BufferKind, CameraUniform, DrawCommand, ObjectUniform, Primitive, RenderError};
use cgmath::Matrix4;
use std::borrow::Cow;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::path::Path;
use wgpu::{util::DeviceExt, PipelineCompilationOptions};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
  r: 0.02,
  g: 0.02,
  b: 0.05,
  a: 1.0,
};

const INITIAL_DRAW_SLOTS: u64 = 64;

const VERTEX_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];

/// Reads a WGSL file, or falls back to the built-in body shader.
pub fn load_shader(path: Option<&Path>) -> Result<Cow<'static, str>, RenderError> {
  match path {
    None => Ok(Cow::Borrowed(include_str!("../shaders/body.wgsl"))),
    Some(path) => std::fs::read_to_string(path)
      .map(Cow::Owned)
      .map_err(|source| RenderError::ShaderSource {
        path: path.display().to_string(),
        source,
      }),
  }
}

struct GpuBuffer {
  buffer: wgpu::Buffer,
  size: u64,
}

/// Dynamic-offset uniform buffer holding one `ObjectUniform` per draw in the frame.
struct DrawSlots {
  buffer: wgpu::Buffer,
  bind_group: wgpu::BindGroup,
  capacity: u64,
}

/// wgpu implementation of [`Backend`].
///
/// Draws submitted during a frame are queued and replayed by [`GpuBackend::render`]
/// inside a single render pass.
pub struct GpuBackend {
  device: wgpu::Device,
  queue: wgpu::Queue,
  buffers: RefCell<HashMap<BufferId, GpuBuffer>>,
  next_id: Cell<u32>,
  commands: RefCell<Vec<DrawCommand>>,
  camera_buffer: wgpu::Buffer,
  camera_bind_group: wgpu::BindGroup,
  draw_layout: wgpu::BindGroupLayout,
  draw_slots: RefCell<DrawSlots>,
  draw_stride: u64,
  triangle_pipeline: wgpu::RenderPipeline,
  line_pipeline: wgpu::RenderPipeline,
  depth_view: RefCell<wgpu::TextureView>,
}

impl GpuBackend {
  pub async fn init(
    device: wgpu::Device,
    queue: wgpu::Queue,
    color_format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    shader_source: &str,
  ) -> Result<Self, RenderError> {
    let camera_uniform = CameraUniform::new();
    let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
      label: Some("Camera Buffer"),
      contents: bytemuck::cast_slice(&[camera_uniform]),
      usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    });
    let camera_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      entries: &[wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX,
        ty: wgpu::BindingType::Buffer {
          ty: wgpu::BufferBindingType::Uniform,
          has_dynamic_offset: false,
          min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<CameraUniform>() as _),
        },
        count: None,
      }],
      label: Some("camera_bind_group_layout"),
    });
    let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
      layout: &camera_layout,
      entries: &[wgpu::BindGroupEntry {
        binding: 0,
        resource: camera_buffer.as_entire_binding(),
      }],
      label: Some("camera_bind_group"),
    });

    let draw_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
      entries: &[wgpu::BindGroupLayoutEntry {
        binding: 0,
        visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Buffer {
          ty: wgpu::BufferBindingType::Uniform,
          has_dynamic_offset: true,
          min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<ObjectUniform>() as _),
        },
        count: None,
      }],
      label: Some("draw_bind_group_layout"),
    });
    let alignment = u64::from(device.limits().min_uniform_buffer_offset_alignment);
    let draw_stride = (std::mem::size_of::<ObjectUniform>() as u64).div_ceil(alignment) * alignment;
    let draw_slots = create_draw_slots(&device, &draw_layout, draw_stride, INITIAL_DRAW_SLOTS);

    // Shader and pipeline validation errors are reported through the scope instead of panicking.
    device.push_error_scope(wgpu::ErrorFilter::Validation);
    let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
      label: Some("Body Shader"),
      source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(shader_source)),
    });
    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
      label: Some("render"),
      bind_group_layouts: &[&camera_layout, &draw_layout],
      push_constant_ranges: &[],
    });
    let triangle_pipeline = create_pipeline(
      &device,
      &layout,
      &shader,
      color_format,
      wgpu::PrimitiveTopology::TriangleList,
    );
    let line_pipeline = create_pipeline(
      &device,
      &layout,
      &shader,
      color_format,
      wgpu::PrimitiveTopology::LineStrip,
    );
    if let Some(err) = device.pop_error_scope().await {
      return Err(RenderError::Shader(err.to_string()));
    }

    let depth_view = create_depth_view(&device, width, height);

    Ok(Self {
      device,
      queue,
      buffers: RefCell::new(HashMap::new()),
      next_id: Cell::new(0),
      commands: RefCell::new(Vec::new()),
      camera_buffer,
      camera_bind_group,
      draw_layout,
      draw_slots: RefCell::new(draw_slots),
      draw_stride,
      triangle_pipeline,
      line_pipeline,
      depth_view: RefCell::new(depth_view),
    })
  }

  pub fn device(&self) -> &wgpu::Device {
    &self.device
  }

  pub fn resize(&self, width: u32, height: u32) {
    *self.depth_view.borrow_mut() = create_depth_view(&self.device, width, height);
  }

  fn ensure_draw_capacity(&self, needed: u64) {
    let mut slots = self.draw_slots.borrow_mut();
    if needed > slots.capacity {
      let capacity = needed.next_power_of_two();
      log::debug!("growing per-draw uniform buffer to {capacity} slots");
      *slots = create_draw_slots(&self.device, &self.draw_layout, self.draw_stride, capacity);
    }
  }

  /// Replays every draw submitted since the previous call into `target`.
  pub fn render(&self, target: &wgpu::TextureView) {
    let commands = std::mem::take(&mut *self.commands.borrow_mut());
    self.ensure_draw_capacity(commands.len() as u64);

    let slots = self.draw_slots.borrow();
    if !commands.is_empty() {
      let stride = self.draw_stride as usize;
      let mut staging = vec![0u8; commands.len() * stride];
      for (slot, command) in staging.chunks_exact_mut(stride).zip(&commands) {
        let bytes = bytemuck::bytes_of(&command.uniforms);
        slot[..bytes.len()].copy_from_slice(bytes);
      }
      self.queue.write_buffer(&slots.buffer, 0, &staging);
    }

    let buffers = self.buffers.borrow();
    let depth_view = self.depth_view.borrow();
    let mut command_encoder = self
      .device
      .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: None });
    {
      let mut rpass = command_encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("Body Pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
          view: target,
          resolve_target: None,
          ops: wgpu::Operations {
            load: wgpu::LoadOp::Clear(CLEAR_COLOR),
            store: wgpu::StoreOp::Store,
          },
        })],
        depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
          view: &depth_view,
          depth_ops: Some(wgpu::Operations {
            load: wgpu::LoadOp::Clear(1.0),
            store: wgpu::StoreOp::Store,
          }),
          stencil_ops: None,
        }),
        timestamp_writes: None,
        occlusion_query_set: None,
      });
      rpass.set_bind_group(0, &self.camera_bind_group, &[]);

      for (i, command) in commands.iter().enumerate() {
        let Some(vertex) = buffers.get(&command.vertex_buffer) else {
          log::warn!("skipping draw: vertex buffer {:?} was released", command.vertex_buffer);
          continue;
        };
        let pipeline = match command.primitive {
          Primitive::Triangles => &self.triangle_pipeline,
          Primitive::LineStrip => &self.line_pipeline,
        };
        rpass.set_pipeline(pipeline);
        rpass.set_bind_group(1, &slots.bind_group, &[(i as u64 * self.draw_stride) as u32]);
        rpass.set_vertex_buffer(0, vertex.buffer.slice(..));
        match command.index_buffer {
          Some(index_id) => {
            let Some(index) = buffers.get(&index_id) else {
              log::warn!("skipping draw: index buffer {index_id:?} was released");
              continue;
            };
            rpass.set_index_buffer(index.buffer.slice(..), wgpu::IndexFormat::Uint32);
            rpass.draw_indexed(0..command.count, 0, 0..1);
          }
          None => rpass.draw(0..command.count, 0..1),
        }
      }
    }
    self.queue.submit(Some(command_encoder.finish()));
  }
}

impl Backend for GpuBackend {
  fn create_buffer(
    &self,
    label: &str,
    kind: BufferKind,
    size: u64,
    contents: Option<&[u8]>,
  ) -> Result<BufferId, RenderError> {
    let id = BufferId::next_after(self.next_id.get()).ok_or(RenderError::OutOfBufferIds)?;
    let usage = match kind {
      BufferKind::Vertex | BufferKind::DynamicVertex => wgpu::BufferUsages::VERTEX,
      BufferKind::Index => wgpu::BufferUsages::INDEX,
    } | wgpu::BufferUsages::COPY_DST;

    let buffer = match contents {
      Some(contents) => {
        if contents.len() as u64 > size {
          return Err(RenderError::BufferOverflow {
            id,
            offset: 0,
            len: contents.len() as u64,
            size,
          });
        }
        self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
          label: Some(label),
          contents,
          usage,
        })
      }
      None => self.device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: size.next_multiple_of(wgpu::COPY_BUFFER_ALIGNMENT),
        usage,
        mapped_at_creation: false,
      }),
    };
    self.next_id.set(id.get());
    self.buffers.borrow_mut().insert(id, GpuBuffer { buffer, size });
    Ok(id)
  }

  fn write_buffer(&self, id: BufferId, offset: u64, data: &[u8]) -> Result<(), RenderError> {
    let buffers = self.buffers.borrow();
    let target = buffers.get(&id).ok_or(RenderError::UnknownBuffer(id))?;
    let len = data.len() as u64;
    if offset + len > target.size {
      return Err(RenderError::BufferOverflow {
        id,
        offset,
        len,
        size: target.size,
      });
    }
    self.queue.write_buffer(&target.buffer, offset, data);
    Ok(())
  }

  fn release_buffer(&self, id: BufferId) {
    if let Some(released) = self.buffers.borrow_mut().remove(&id) {
      released.buffer.destroy();
    }
  }

  fn set_camera(&self, view: &Matrix4<f32>, projection: &Matrix4<f32>) {
    let stale = std::mem::take(&mut *self.commands.borrow_mut());
    if !stale.is_empty() {
      log::debug!("dropping {} draws from an unpresented frame", stale.len());
    }
    let mut camera_uniform = CameraUniform::new();
    camera_uniform.update(view, projection);
    self.queue.write_buffer(
      &self.camera_buffer,
      0,
      bytemuck::cast_slice(&[camera_uniform]),
    );
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
    self.commands.borrow_mut().push(command);
    Ok(())
  }
}

fn create_draw_slots(
  device: &wgpu::Device,
  layout: &wgpu::BindGroupLayout,
  stride: u64,
  capacity: u64,
) -> DrawSlots {
  let buffer = device.create_buffer(&wgpu::BufferDescriptor {
    label: Some("Per-Draw Uniform Buffer"),
    size: stride * capacity,
    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
    mapped_at_creation: false,
  });
  let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
    layout,
    entries: &[wgpu::BindGroupEntry {
      binding: 0,
      resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
        buffer: &buffer,
        offset: 0,
        size: wgpu::BufferSize::new(std::mem::size_of::<ObjectUniform>() as _),
      }),
    }],
    label: Some("draw_bind_group"),
  });
  DrawSlots {
    buffer,
    bind_group,
    capacity,
  }
}

fn create_pipeline(
  device: &wgpu::Device,
  layout: &wgpu::PipelineLayout,
  shader: &wgpu::ShaderModule,
  color_format: wgpu::TextureFormat,
  topology: wgpu::PrimitiveTopology,
) -> wgpu::RenderPipeline {
  device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
    label: Some("Render Pipeline"),
    layout: Some(layout),
    vertex: wgpu::VertexState {
      module: shader,
      entry_point: "vs_main",
      compilation_options: PipelineCompilationOptions::default(),
      buffers: &[wgpu::VertexBufferLayout {
        array_stride: 3 * 4,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &VERTEX_ATTRIBUTES,
      }],
    },
    fragment: Some(wgpu::FragmentState {
      module: shader,
      entry_point: "fs_main",
      compilation_options: PipelineCompilationOptions::default(),
      targets: &[Some(color_format.into())],
    }),
    primitive: wgpu::PrimitiveState {
      topology,
      ..wgpu::PrimitiveState::default()
    },
    depth_stencil: Some(wgpu::DepthStencilState {
      format: DEPTH_FORMAT,
      depth_write_enabled: true,
      depth_compare: wgpu::CompareFunction::Less,
      stencil: wgpu::StencilState::default(),
      bias: wgpu::DepthBiasState::default(),
    }),
    multisample: wgpu::MultisampleState::default(),
    multiview: None,
    cache: None,
  })
}

fn create_depth_view(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
  let texture = device.create_texture(&wgpu::TextureDescriptor {
    label: Some("Depth Texture"),
    size: wgpu::Extent3d {
      width: width.max(1),
      height: height.max(1),
      depth_or_array_layers: 1,
    },
    mip_level_count: 1,
    sample_count: 1,
    dimension: wgpu::TextureDimension::D2,
    format: DEPTH_FORMAT,
    usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
    view_formats: &[],
  });
  texture.create_view(&wgpu::TextureViewDescriptor::default())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn built_in_shader_declares_both_entry_points() {
    let source = load_shader(None).unwrap();
    assert!(source.contains("fn vs_main"));
    assert!(source.contains("fn fs_main"));
    assert!(source.contains("var<uniform> camera"));
  }

  #[test]
  fn missing_shader_file_is_reported() {
    let err = load_shader(Some(Path::new("/definitely/not/here.wgsl"))).unwrap_err();
    assert!(matches!(err, RenderError::ShaderSource { .. }));
  }
}
