use crate::celestial::Celestial;
use crate::geometry::Geometry;
use crate::physics::PhysicsBody;
use crate::render::{Backend, MeshRenderable, TrailRenderable};
use crate::trajectory::Trajectory;
use crate::{AppError, ScenarioParams, SimParams, TrailParams};
use cgmath::{EuclideanSpace, InnerSpace, Point3, Vector3};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::f32::consts::PI;
use std::rc::Rc;

const SATELLITE_MIN_RADIUS: f32 = 1.5;
const SATELLITE_MAX_RADIUS: f32 = 6.0;

/// Builds the bodies for a run. The caller owns the result and lends it to a `Universe`.
///
/// The first entry is a static marker at the gravity center, the second the
/// configured planet, followed by `scenario.satellites` seeded random orbiters.
pub fn create_bodies(
  backend: &Rc<dyn Backend>,
  sim: &SimParams,
  scenario: &ScenarioParams,
  trail: &TrailParams,
) -> Result<Vec<Celestial>, AppError> {
  let mut bodies = Vec::with_capacity(2 + scenario.satellites as usize);
  let sphere = |radius: f32| -> Result<MeshRenderable, AppError> {
    let geometry = Geometry::sphere(radius, scenario.resolution, Point3::origin())?;
    Ok(MeshRenderable::new(backend.clone(), geometry)?)
  };
  let with_trail = |celestial: Celestial| {
    if scenario.trails {
      let renderable = TrailRenderable::new(backend.clone(), Trajectory::new(trail));
      celestial.with_trail(renderable, scenario.trail_color)
    } else {
      celestial
    }
  };

  let anchor = PhysicsBody::anchored(sim.gravity_center, 1.0)?.with_angular_velocity(Vector3::new(0.0, 0.3, 0.0));
  bodies.push(Celestial::new(
    "center",
    anchor,
    sphere(scenario.anchor_radius)?,
    scenario.anchor_color,
  ));

  let planet = PhysicsBody::new(
    scenario.planet_position,
    scenario.planet_velocity,
    scenario.planet_mass,
  )?;
  bodies.push(with_trail(Celestial::new(
    "planet",
    planet,
    sphere(scenario.body_radius)?,
    scenario.body_color,
  )));

  if scenario.satellites > 0 {
    let mut rng = SmallRng::seed_from_u64(scenario.seed);
    let tilt = Normal::new(0.0f32, 0.15).map_err(|e| AppError::Scenario(e.to_string()))?;
    let speed_jitter = Normal::new(1.0f32, 0.05).map_err(|e| AppError::Scenario(e.to_string()))?;

    for i in 0..scenario.satellites {
      let radius = rng.gen_range(SATELLITE_MIN_RADIUS..SATELLITE_MAX_RADIUS);
      let theta = rng.gen::<f32>() * 2.0 * PI;
      let offset = Vector3::new(radius * theta.cos(), radius * theta.sin(), tilt.sample(&mut rng) * radius);
      let position = sim.gravity_center + offset;

      // Roughly circular: v^2 = GM / r, perturbed so orbits differ.
      let tangent = Vector3::new(-theta.sin(), theta.cos(), 0.0);
      let speed = (sim.gravity / offset.magnitude()).sqrt() * speed_jitter.sample(&mut rng);
      let spin = Vector3::new(rng.gen::<f32>(), rng.gen::<f32>(), rng.gen::<f32>()) * 2.0;
      let body = PhysicsBody::new(position, tangent * speed, 1.0)?.with_angular_velocity(spin);

      let color = Vector3::new(
        rng.gen_range(0.3..1.0),
        rng.gen_range(0.3..1.0),
        rng.gen_range(0.3..1.0),
      );
      log::info!("satellite {i}: r = {radius:.2}, speed = {speed:.3}");
      bodies.push(with_trail(Celestial::new(
        format!("satellite-{i}"),
        body,
        sphere(scenario.body_radius * 0.5)?,
        color,
      )));
    }
  }

  Ok(bodies)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::render::headless::HeadlessBackend;
  use crate::render::RenderError;

  fn backend() -> Rc<dyn Backend> {
    Rc::new(HeadlessBackend::new())
  }

  #[test]
  fn default_scenario_has_center_and_planet() {
    let bodies = create_bodies(
      &backend(),
      &SimParams::default(),
      &ScenarioParams::default(),
      &TrailParams::default(),
    )
    .unwrap();
    assert_eq!(bodies.len(), 2);
    assert!(bodies[0].body().is_captured());
    assert!(bodies[0].trail().is_none());
    assert_eq!(bodies[1].body().position(), Point3::new(-3.0, 0.0, 0.0));
    assert!(bodies[1].is_tracking());
  }

  #[test]
  fn satellites_are_reproducible_from_the_seed() {
    let params = ScenarioParams {
      satellites: 5,
      ..ScenarioParams::default()
    };
    let positions = || -> Vec<Point3<f32>> {
      create_bodies(&backend(), &SimParams::default(), &params, &TrailParams::default())
        .unwrap()
        .iter()
        .map(|c| c.body().position())
        .collect()
    };
    let a = positions();
    assert_eq!(a.len(), 7);
    assert_eq!(a, positions());
    for p in &a[2..] {
      let r = p.to_vec().magnitude();
      assert!(r >= SATELLITE_MIN_RADIUS * 0.9, "satellite too close: {r}");
    }
  }

  #[test]
  fn trails_can_be_disabled() {
    let params = ScenarioParams {
      trails: false,
      ..ScenarioParams::default()
    };
    let bodies = create_bodies(&backend(), &SimParams::default(), &params, &TrailParams::default()).unwrap();
    assert!(bodies.iter().all(|c| c.trail().is_none()));
  }

  #[test]
  fn zero_resolution_fails_before_any_allocation() {
    let headless = Rc::new(HeadlessBackend::new());
    let shared: Rc<dyn Backend> = headless.clone();
    let params = ScenarioParams {
      resolution: 0,
      ..ScenarioParams::default()
    };
    let err = create_bodies(&shared, &SimParams::default(), &params, &TrailParams::default()).err().unwrap();
    assert!(matches!(err, AppError::Geometry(_)));
    assert_eq!(headless.stats().created, 0);
  }

  #[test]
  fn resolution_one_has_nothing_to_draw() {
    let params = ScenarioParams {
      resolution: 1,
      ..ScenarioParams::default()
    };
    let err = create_bodies(&backend(), &SimParams::default(), &params, &TrailParams::default()).err().unwrap();
    assert!(matches!(err, AppError::Render(RenderError::EmptyGeometry(_))));
  }
}
