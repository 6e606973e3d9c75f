use crate::geometry::GeometryError;
use crate::physics::PhysicsError;
use crate::render::RenderError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
  #[error(transparent)]
  Geometry(#[from] GeometryError),
  #[error(transparent)]
  Physics(#[from] PhysicsError),
  #[error(transparent)]
  Render(#[from] RenderError),
  #[error("event loop error: {0}")]
  EventLoop(#[from] winit::error::EventLoopError),
  #[error("window creation failed: {0}")]
  Window(#[from] winit::error::OsError),
  #[error("failed to install Ctrl-C handler: {0}")]
  Signal(#[from] ctrlc::Error),
  #[error("invalid scenario: {0}")]
  Scenario(String),
}
