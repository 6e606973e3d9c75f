use crate::CameraParams;
use cgmath::{InnerSpace, Matrix4, Point3, Vector3};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: cgmath::Matrix4<f32> = cgmath::Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.5,
    0.0, 0.0, 0.0, 1.0,
);

/// Pixels of trackpad scroll that count as one wheel notch.
const PIXELS_PER_LINE: f64 = 40.0;

pub struct Camera {
  pub eye: Point3<f32>,
  pub target: Point3<f32>,
  pub up: Vector3<f32>,
  pub aspect: f32,
  pub fovy: f32,
  pub znear: f32,
  pub zfar: f32,
}

impl Camera {
  pub fn new(params: &CameraParams, width: u32, height: u32) -> Self {
    let mut camera = Self {
      eye: params.eye,
      target: params.target,
      up: Vector3::unit_y(),
      aspect: 4.0 / 3.0,
      fovy: 45.0,
      znear: 0.1,
      zfar: 100.0,
    };
    camera.resize(width, height);
    camera
  }

  /// Keeps the previous aspect ratio while the framebuffer is zero-sized (minimized).
  pub fn resize(&mut self, width: u32, height: u32) {
    if width > 0 && height > 0 {
      self.aspect = width as f32 / height as f32;
    }
  }

  pub fn view_matrix(&self) -> Matrix4<f32> {
    Matrix4::look_at_rh(self.eye, self.target, self.up)
  }

  pub fn projection_matrix(&self) -> Matrix4<f32> {
    let proj = cgmath::perspective(cgmath::Deg(self.fovy), self.aspect, self.znear, self.zfar);
    OPENGL_TO_WGPU_MATRIX * proj
  }

  pub fn distance(&self) -> f32 {
    (self.eye - self.target).magnitude()
  }
}

/// Turns pointer drags into pans and scroll into clamped zoom.
pub struct CameraController {
  pan_sensitivity: f32,
  zoom_sensitivity: f32,
  min_distance: f32,
  max_distance: f32,
  is_dragging: bool,
  last_cursor: Option<(f64, f64)>,
  pending_pan: (f64, f64),
  pending_zoom: f64,
}

impl CameraController {
  pub fn init(params: &CameraParams) -> Self {
    Self {
      pan_sensitivity: params.pan_sensitivity,
      zoom_sensitivity: params.zoom_sensitivity,
      min_distance: params.min_distance,
      max_distance: params.max_distance,
      is_dragging: false,
      last_cursor: None,
      pending_pan: (0.0, 0.0),
      pending_zoom: 0.0,
    }
  }

  /// Buffers input until the next [`CameraController::update_camera`]. Returns whether the event was consumed.
  pub fn process_events(&mut self, event: &WindowEvent) -> bool {
    match event {
      WindowEvent::MouseInput {
        state,
        button: MouseButton::Left,
        ..
      } => {
        self.is_dragging = *state == ElementState::Pressed;
        true
      }
      WindowEvent::CursorMoved { position, .. } => {
        if let Some((last_x, last_y)) = self.last_cursor {
          if self.is_dragging {
            self.pending_pan.0 += position.x - last_x;
            self.pending_pan.1 += position.y - last_y;
          }
        }
        self.last_cursor = Some((position.x, position.y));
        self.is_dragging
      }
      WindowEvent::CursorLeft { .. } => {
        self.last_cursor = None;
        false
      }
      WindowEvent::MouseWheel { delta, .. } => {
        self.pending_zoom += match delta {
          MouseScrollDelta::LineDelta(_, y) => f64::from(*y),
          MouseScrollDelta::PixelDelta(p) => p.y / PIXELS_PER_LINE,
        };
        true
      }
      _ => false,
    }
  }

  pub fn update_camera(&mut self, camera: &mut Camera) {
    let (dx, dy) = std::mem::take(&mut self.pending_pan);
    if dx != 0.0 || dy != 0.0 {
      self.pan(camera, dx as f32, dy as f32);
    }
    let zoom = std::mem::take(&mut self.pending_zoom);
    if zoom != 0.0 {
      self.zoom(camera, zoom as f32);
    }
  }

  /// Slides the eye in the view plane; screen-space `dy` grows downwards.
  pub fn pan(&self, camera: &mut Camera, dx: f32, dy: f32) {
    let forward = (camera.eye - camera.target).normalize();
    let right = Vector3::unit_y().cross(forward);
    if right.magnitude2() < f32::EPSILON {
      return;
    }
    let right = right.normalize();
    let up = forward.cross(right);
    camera.eye += right * dx * self.pan_sensitivity;
    camera.eye += up * -dy * self.pan_sensitivity;
  }

  /// Positive `amount` moves the eye towards the target.
  pub fn zoom(&self, camera: &mut Camera, amount: f32) {
    let offset = camera.eye - camera.target;
    let direction = offset.normalize();
    let distance = (offset.magnitude() - amount * self.zoom_sensitivity).clamp(self.min_distance, self.max_distance);
    camera.eye = camera.target + direction * distance;
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn setup() -> (Camera, CameraController) {
    let params = CameraParams::default();
    (Camera::new(&params, 800, 600), CameraController::init(&params))
  }

  #[test]
  fn zoom_is_clamped() {
    let (mut camera, controller) = setup();
    controller.zoom(&mut camera, 1_000.0);
    assert!((camera.distance() - 2.0).abs() < 1e-4);
    controller.zoom(&mut camera, -1_000.0);
    assert!((camera.distance() - 50.0).abs() < 1e-3);
  }

  #[test]
  fn zoom_keeps_viewing_direction() {
    let (mut camera, controller) = setup();
    let before = (camera.eye - camera.target).normalize();
    controller.zoom(&mut camera, 2.0);
    let after = (camera.eye - camera.target).normalize();
    assert!((before - after).magnitude() < 1e-5);
    assert!(camera.distance() < 12.9);
  }

  #[test]
  fn pan_moves_eye_but_not_target() {
    let (mut camera, controller) = setup();
    let eye = camera.eye;
    controller.pan(&mut camera, 10.0, -5.0);
    assert_ne!(camera.eye, eye);
    assert_eq!(camera.target, Point3::new(0.0, 0.0, 0.0));
  }

  #[test]
  fn pan_straight_down_the_up_axis_is_ignored() {
    let (mut camera, controller) = setup();
    camera.eye = Point3::new(0.0, 10.0, 0.0);
    controller.pan(&mut camera, 3.0, 3.0);
    assert_eq!(camera.eye, Point3::new(0.0, 10.0, 0.0));
  }

  #[test]
  fn aspect_survives_zero_sized_framebuffer() {
    let (mut camera, _) = setup();
    camera.resize(0, 0);
    assert!((camera.aspect - 800.0 / 600.0).abs() < 1e-6);
    camera.resize(1920, 1080);
    assert!((camera.aspect - 1920.0 / 1080.0).abs() < 1e-6);
  }
}
