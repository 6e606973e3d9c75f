use crate::celestial::Celestial;
use crate::physics::{GravityIntegrator, PhysicsError};
use crate::render::Backend;
use crate::SimParams;
use cgmath::{Matrix4, SquareMatrix};
use std::rc::Rc;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameReport {
  pub frame: u64,
  /// Physics advanced on this frame.
  pub integrated: bool,
  pub alpha: f32,
  pub drawn: usize,
  pub skipped: usize,
}

/// Drives a set of caller-owned [`Celestial`]s: fixed-step physics every
/// `update_every` frames, interpolated poses on every frame.
pub struct Universe<'a> {
  celestials: Vec<&'a mut Celestial>,
  integrator: GravityIntegrator,
  backend: Rc<dyn Backend>,
  delta_t: f32,
  update_every: u32,
  frame_counter: u64,
  view: Matrix4<f32>,
  projection: Matrix4<f32>,
}

impl<'a> Universe<'a> {
  pub fn new(
    celestials: Vec<&'a mut Celestial>,
    params: &SimParams,
    backend: Rc<dyn Backend>,
  ) -> Result<Self, PhysicsError> {
    if params.update_every == 0 {
      return Err(PhysicsError::ZeroUpdateInterval);
    }
    if !(params.delta_t.is_finite() && params.delta_t > 0.0) {
      return Err(PhysicsError::InvalidTimestep(params.delta_t));
    }
    Ok(Self {
      celestials,
      integrator: GravityIntegrator::new(params),
      backend,
      delta_t: params.delta_t,
      update_every: params.update_every,
      frame_counter: 0,
      view: Matrix4::identity(),
      projection: Matrix4::identity(),
    })
  }

  pub fn add(&mut self, celestial: &'a mut Celestial) {
    self.celestials.push(celestial);
  }

  pub fn celestials(&self) -> &[&'a mut Celestial] {
    &self.celestials
  }

  pub fn frame_counter(&self) -> u64 {
    self.frame_counter
  }

  pub fn integrator(&self) -> &GravityIntegrator {
    &self.integrator
  }

  /// Matrices uploaded at the start of the next draw.
  pub fn set_camera(&mut self, view: Matrix4<f32>, projection: Matrix4<f32>) {
    self.view = view;
    self.projection = projection;
  }

  /// Interpolation weight the next frame will use, in `[0, 1)`.
  pub fn alpha(&self) -> f32 {
    let phase = self.frame_counter % u64::from(self.update_every);
    phase as f32 / self.update_every as f32
  }

  /// Runs one rendered frame: integrate if due, interpolate, then draw.
  pub fn frame(&mut self) -> FrameReport {
    let integrated = self.frame_counter % u64::from(self.update_every) == 0;
    if integrated {
      for celestial in self.celestials.iter_mut() {
        celestial.snapshot();
        self.integrator.step_body(celestial.body_mut(), self.delta_t);
      }
    }

    let alpha = self.alpha();
    for celestial in self.celestials.iter_mut() {
      celestial.interpolate(alpha);
    }

    self.backend.set_camera(&self.view, &self.projection);
    let mut drawn = 0;
    let mut skipped = 0;
    for celestial in self.celestials.iter() {
      match celestial.draw() {
        Ok(()) => drawn += 1,
        Err(e) => {
          log::warn!("skipping {}: {e}", celestial.name());
          skipped += 1;
        }
      }
    }

    let report = FrameReport {
      frame: self.frame_counter,
      integrated,
      alpha,
      drawn,
      skipped,
    };
    self.frame_counter += 1;
    report
  }
}
