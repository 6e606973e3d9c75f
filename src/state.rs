use crate::camera::{Camera, CameraController};
use crate::render::gpu::{load_shader, GpuBackend};
use crate::render::headless::{BackendStats, HeadlessBackend};
use crate::render::{Backend, RenderError};
use crate::universe::Universe;
use crate::{scenario, AppError, CameraParams, ScenarioParams, SimParams, TrailParams};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use winit::keyboard::*;
use winit::{
  dpi::PhysicalSize,
  event::{ElementState, Event, KeyEvent, WindowEvent},
  event_loop::{EventLoop, EventLoopWindowTarget},
  window::Window,
};

const WINDOW_TITLE: &str = "Orbit Viz";

/// Everything a run needs, assembled from defaults and the command line.
#[derive(Default)]
pub struct RunConfig {
  pub sim: SimParams,
  pub scenario: ScenarioParams,
  pub trail: TrailParams,
  pub camera: CameraParams,
  pub headless: bool,
  /// Frame limit for headless runs.
  pub frames: u64,
  pub shader: Option<PathBuf>,
}

struct EventLoopWrapper {
  event_loop: EventLoop<()>,
  window: Arc<Window>,
}

impl EventLoopWrapper {
  pub fn new(title: &str) -> Result<Self, AppError> {
    let event_loop = EventLoop::new()?;
    let mut builder = winit::window::WindowBuilder::new();
    builder = builder.with_title(title).with_resizable(false);
    let window = Arc::new(builder.build(&event_loop)?);

    Ok(Self { event_loop, window })
  }
}

struct SurfaceWrapper {
  surface: wgpu::Surface<'static>,
  config: wgpu::SurfaceConfiguration,
}

impl SurfaceWrapper {
  fn acquire(&mut self, device: &wgpu::Device) -> Result<wgpu::SurfaceTexture, RenderError> {
    match self.surface.get_current_texture() {
      Ok(frame) => Ok(frame),
      Err(wgpu::SurfaceError::Timeout) => Ok(self.surface.get_current_texture()?),
      Err(_) => {
        self.surface.configure(device, &self.config);
        Ok(self.surface.get_current_texture()?)
      }
    }
  }

  fn resize(&mut self, device: &wgpu::Device, size: PhysicalSize<u32>) {
    self.config.width = size.width.max(1);
    self.config.height = size.height.max(1);
    self.surface.configure(device, &self.config);
  }
}

/// Per-second frame counter for the window title.
struct FpsCounter {
  since: Instant,
  frames: u32,
}

impl FpsCounter {
  fn new() -> Self {
    Self {
      since: Instant::now(),
      frames: 0,
    }
  }

  fn tick(&mut self) -> Option<f64> {
    self.frames += 1;
    let elapsed = self.since.elapsed().as_secs_f64();
    if elapsed < 1.0 {
      return None;
    }
    let fps = f64::from(self.frames) / elapsed;
    self.frames = 0;
    self.since = Instant::now();
    Some(fps)
  }
}

struct State {
  surface: SurfaceWrapper,
  gpu: Rc<GpuBackend>,
  camera: Camera,
  camera_controller: CameraController,
}

impl State {
  async fn init(window: Arc<Window>, config: &RunConfig) -> Result<Self, AppError> {
    let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
      #[cfg(not(target_arch = "wasm32"))]
      backends: wgpu::Backends::PRIMARY,
      ..Default::default()
    });
    let size = window.inner_size();
    let surface = instance
      .create_surface(window)
      .map_err(RenderError::from)?;

    let adapter = instance
      .request_adapter(&wgpu::RequestAdapterOptions {
        power_preference: wgpu::PowerPreference::default(),
        compatible_surface: Some(&surface),
        force_fallback_adapter: false,
      })
      .await
      .ok_or(RenderError::NoAdapter)?;

    let (device, queue) = adapter
      .request_device(
        &wgpu::DeviceDescriptor {
          label: None,
          required_features: wgpu::Features::empty(),
          required_limits: wgpu::Limits::default(),
          memory_hints: Default::default(),
        },
        None,
      )
      .await
      .map_err(RenderError::from)?;

    let width = size.width.max(1);
    let height = size.height.max(1);
    let mut surface_config = surface
      .get_default_config(&adapter, width, height)
      .ok_or(RenderError::UnsupportedSurface)?;
    let view_format = surface_config.format.add_srgb_suffix();
    surface_config.view_formats.push(view_format);
    surface.configure(&device, &surface_config);

    let shader = load_shader(config.shader.as_deref())?;
    let gpu = GpuBackend::init(device, queue, view_format, width, height, &shader).await?;
    log::info!("renderer ready: {:?}", adapter.get_info().backend);

    Ok(Self {
      surface: SurfaceWrapper {
        surface,
        config: surface_config,
      },
      gpu: Rc::new(gpu),
      camera: Camera::new(&config.camera, width, height),
      camera_controller: CameraController::init(&config.camera),
    })
  }

  fn input(&mut self, event: &WindowEvent) -> bool {
    self.camera_controller.process_events(event)
  }

  fn resize(&mut self, size: PhysicalSize<u32>) {
    self.surface.resize(self.gpu.device(), size);
    self.gpu.resize(size.width, size.height);
    self.camera.resize(size.width, size.height);
  }

  fn update(&mut self, universe: &mut Universe<'_>) {
    self.camera_controller.update_camera(&mut self.camera);
    universe.set_camera(self.camera.view_matrix(), self.camera.projection_matrix());
  }

  fn render(&mut self) -> Result<(), RenderError> {
    let frame = self.surface.acquire(self.gpu.device())?;
    let view = frame.texture.create_view(&wgpu::TextureViewDescriptor {
      format: Some(self.surface.config.view_formats[0]),
      ..wgpu::TextureViewDescriptor::default()
    });
    self.gpu.render(&view);
    frame.present();
    Ok(())
  }
}

async fn start(config: RunConfig, running: Arc<AtomicBool>) -> Result<(), AppError> {
  let window_loop = EventLoopWrapper::new(WINDOW_TITLE)?;
  let mut context = State::init(window_loop.window.clone(), &config).await?;

  let backend: Rc<dyn Backend> = context.gpu.clone();
  let mut bodies = scenario::create_bodies(&backend, &config.sim, &config.scenario, &config.trail)?;
  for body in bodies.iter_mut() {
    body.upload()?;
  }
  let mut universe = Universe::new(bodies.iter_mut().collect(), &config.sim, backend)?;
  let mut fps = FpsCounter::new();
  let window = window_loop.window.clone();

  window_loop.event_loop.run(move |event, target: &EventLoopWindowTarget<()>| match event {
    Event::WindowEvent { event, window_id } if window_id == window.id() => {
      if context.input(&event) {
        return;
      }
      match event {
        WindowEvent::CloseRequested
        | WindowEvent::KeyboardInput {
          event:
            KeyEvent {
              state: ElementState::Pressed,
              physical_key: PhysicalKey::Code(KeyCode::Escape),
              ..
            },
          ..
        } => target.exit(),
        WindowEvent::Resized(size) => context.resize(size),
        WindowEvent::RedrawRequested => {
          context.update(&mut universe);
          let report = universe.frame();
          log::trace!("{report:?}");
          if let Err(e) = context.render() {
            log::error!("frame {} not presented: {e}", report.frame);
          }
          if let Some(rate) = fps.tick() {
            window.set_title(&format!("{WINDOW_TITLE} - FPS: {rate:.0}"));
          }
        }
        _ => {}
      }
    }
    Event::AboutToWait => {
      if running.load(Ordering::SeqCst) {
        window.request_redraw();
      } else {
        target.exit();
      }
    }
    _ => {}
  })?;
  Ok(())
}

/// Runs the scenario without a window until `config.frames` frames have run or
/// `running` is cleared. Returns the backend counters.
pub fn run_headless(config: &RunConfig, running: &AtomicBool) -> Result<BackendStats, AppError> {
  let headless = Rc::new(HeadlessBackend::new());
  let backend: Rc<dyn Backend> = headless.clone();
  let mut bodies = scenario::create_bodies(&backend, &config.sim, &config.scenario, &config.trail)?;
  for body in bodies.iter_mut() {
    body.upload()?;
  }

  let camera = Camera::new(&config.camera, 800, 600);
  let mut universe = Universe::new(bodies.iter_mut().collect(), &config.sim, backend)?;
  universe.set_camera(camera.view_matrix(), camera.projection_matrix());

  let log_every = u64::from(config.sim.update_every.max(1)) * 100;
  while running.load(Ordering::SeqCst) && universe.frame_counter() < config.frames {
    let report = universe.frame();
    headless.take_commands();
    if report.frame % log_every == 0 {
      for c in universe.celestials() {
        let p = c.interpolated_position();
        log::info!(
          "frame {:>6} {:<12} ({:>7.3}, {:>7.3}, {:>7.3}) trail {}",
          report.frame,
          c.name(),
          p.x,
          p.y,
          p.z,
          c.trail().map_or(0, |t| t.trajectory().len())
        );
      }
    }
  }
  log::info!("headless run finished after {} frames", universe.frame_counter());
  Ok(headless.stats())
}

pub fn run(config: RunConfig) -> Result<(), AppError> {
  env_logger::init();
  let running = Arc::new(AtomicBool::new(true));
  let flag = running.clone();
  ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst))?;

  if config.headless {
    let stats = run_headless(&config, &running)?;
    log::info!("{stats:?}");
    Ok(())
  } else {
    pollster::block_on(start(config, running))
  }
}
