use cgmath::{EuclideanSpace, MetricSpace, Point3, Vector3};
use orbit_viz::celestial::Celestial;
use orbit_viz::geometry::Geometry;
use orbit_viz::physics::PhysicsBody;
use orbit_viz::render::headless::HeadlessBackend;
use orbit_viz::render::{Backend, MeshRenderable, Primitive};
use orbit_viz::scenario::create_bodies;
use orbit_viz::state::{run_headless, RunConfig};
use orbit_viz::universe::Universe;
use orbit_viz::{ScenarioParams, SimParams, TrailParams};
use std::rc::Rc;
use std::sync::atomic::AtomicBool;

/// Headless backend plus a trait-object handle onto the same instance
pub fn headless() -> (Rc<HeadlessBackend>, Rc<dyn Backend>) {
  let backend = Rc::new(HeadlessBackend::new());
  let shared: Rc<dyn Backend> = backend.clone();
  (backend, shared)
}

/// Runs `frames` frames over freshly built scenario bodies and returns their final positions
pub fn simulate(scenario: &ScenarioParams, frames: u64) -> Vec<Point3<f32>> {
  let (_, backend) = headless();
  let sim = SimParams::default();
  let mut bodies = create_bodies(&backend, &sim, scenario, &TrailParams::default()).unwrap();
  for body in bodies.iter_mut() {
    body.upload().unwrap();
  }
  let mut universe = Universe::new(bodies.iter_mut().collect(), &sim, backend).unwrap();
  for _ in 0..frames {
    universe.frame();
  }
  drop(universe);
  bodies.iter().map(|c| c.body().position()).collect()
}

// ==================================================================================
// Scenario
// ==================================================================================

#[test]
fn reference_planet_falls_towards_the_center() {
  let positions = simulate(&ScenarioParams::default(), 1_000);
  let planet = positions[1];
  assert!(planet.x > -3.0, "planet should be pulled towards +x, got {planet:?}");
  assert!(planet.y > 0.0, "planet should keep its initial +y motion, got {planet:?}");
  assert_eq!(positions[0], Point3::origin());
}

#[test]
fn runs_are_deterministic() {
  let scenario = ScenarioParams {
    satellites: 3,
    seed: 7,
    ..ScenarioParams::default()
  };
  assert_eq!(simulate(&scenario, 600), simulate(&scenario, 600));
}

#[test]
fn different_seeds_place_satellites_differently() {
  let a = ScenarioParams {
    satellites: 2,
    seed: 1,
    ..ScenarioParams::default()
  };
  let b = ScenarioParams { seed: 2, ..a.clone() };
  assert_ne!(simulate(&a, 0)[2..], simulate(&b, 0)[2..]);
}

// ==================================================================================
// Capture
// ==================================================================================

#[test]
fn body_inside_capture_radius_stays_pinned_but_keeps_spinning() {
  let (backend, shared) = headless();
  let body = PhysicsBody::new(Point3::new(0.005, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0), 1.0)
    .unwrap()
    .with_angular_velocity(Vector3::new(0.0, 2.0, 0.0));
  let mesh = MeshRenderable::new(shared.clone(), Geometry::sphere(0.2, 8, Point3::origin()).unwrap()).unwrap();
  let mut probe = Celestial::new("probe", body, mesh, Vector3::new(1.0, 1.0, 1.0));
  probe.upload().unwrap();
  let start = probe.body().orientation();

  let mut universe = Universe::new(vec![&mut probe], &SimParams::default(), shared).unwrap();
  for _ in 0..100 {
    universe.frame();
  }
  drop(universe);

  assert!(probe.body().is_captured());
  assert_eq!(probe.body().position(), Point3::origin());
  assert_eq!(probe.body().velocity(), Vector3::new(0.0, 0.0, 0.0));
  assert!(probe.interpolated_position().distance(Point3::origin()) < 1e-6);
  assert_ne!(probe.body().orientation(), start);
  assert_eq!(backend.stats().triangle_draws, 100);
}

// ==================================================================================
// Rendering lifecycle
// ==================================================================================

#[test]
fn every_frame_draws_meshes_then_trails() {
  let (backend, shared) = headless();
  let sim = SimParams::default();
  let mut bodies = create_bodies(&shared, &sim, &ScenarioParams::default(), &TrailParams::default()).unwrap();
  for body in bodies.iter_mut() {
    body.upload().unwrap();
  }
  let mut universe = Universe::new(bodies.iter_mut().collect(), &sim, shared).unwrap();

  for _ in 0..300 {
    let report = universe.frame();
    assert_eq!(report.skipped, 0);
    let commands = backend.take_commands();
    assert!(commands.len() >= 2);
    assert_eq!(commands[0].primitive, Primitive::Triangles);
    assert_eq!(commands[1].primitive, Primitive::Triangles);
  }
  assert!(backend.stats().line_draws > 0);
  assert_eq!(backend.stats().camera_uploads, 300);
}

#[test]
fn dropping_bodies_releases_every_buffer() {
  let (backend, shared) = headless();
  let scenario = ScenarioParams {
    satellites: 4,
    ..ScenarioParams::default()
  };
  let mut bodies = create_bodies(&shared, &SimParams::default(), &scenario, &TrailParams::default()).unwrap();
  for body in bodies.iter_mut() {
    body.upload().unwrap();
  }
  // Two buffers per mesh, one per trail; the center has no trail.
  assert_eq!(backend.live_buffers(), 6 * 2 + 5);
  drop(bodies);
  assert_eq!(backend.live_buffers(), 0);
  assert_eq!(backend.stats().created, backend.stats().released);
}

// ==================================================================================
// Headless runner
// ==================================================================================

#[test]
fn headless_run_stops_at_the_frame_limit() {
  let config = RunConfig {
    frames: 500,
    ..RunConfig::default()
  };
  let stats = run_headless(&config, &AtomicBool::new(true)).unwrap();
  assert_eq!(stats.camera_uploads, 500);
  assert_eq!(stats.triangle_draws, 2 * 500);
  assert!(stats.line_draws > 0 && stats.line_draws < 500);
}

#[test]
fn headless_run_honors_cancellation() {
  let config = RunConfig {
    frames: 500,
    ..RunConfig::default()
  };
  let stats = run_headless(&config, &AtomicBool::new(false)).unwrap();
  assert_eq!(stats.camera_uploads, 0);
  assert_eq!(stats.created, 5);
}

#[test]
fn headless_run_rejects_a_zero_update_interval() {
  let config = RunConfig {
    frames: 10,
    sim: SimParams {
      update_every: 0,
      ..SimParams::default()
    },
    ..RunConfig::default()
  };
  assert!(run_headless(&config, &AtomicBool::new(true)).is_err());
}
