use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use orbit_viz::state::RunConfig;
use orbit_viz::{CameraParams, ScenarioParams, SimParams, TrailParams};
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

/// Fixed-timestep orbit visualizer around a single gravity center
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
  /// Number of extra randomly placed satellites
  #[arg(short, long, default_value_t = 0)]
  satellites: u32,
  /// Seed for satellite placement
  #[arg(long, default_value_t = 42)]
  seed: u64,
  /// Run in headless mode (no window)
  #[arg(long, default_value_t = false)]
  headless: bool,
  /// Frames to run in headless mode
  #[arg(long, default_value_t = 10_000)]
  frames: u64,
  /// Rendered frames per physics step
  #[arg(long, default_value_t = 10)]
  update_every: u32,
  /// Sphere tessellation (segments per ring)
  #[arg(short, long, default_value_t = 15)]
  resolution: u32,
  /// Do not record or draw orbit trails
  #[arg(long, default_value_t = false)]
  no_trails: bool,
  /// WGSL file replacing the built-in shader
  #[arg(long)]
  shader: Option<PathBuf>,
  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
  /// Generate shell completion scripts
  Completions {
    /// The shell to generate the script for
    #[arg(value_enum)]
    shell: Shell,
  },
}

impl Args {
  fn into_config(self) -> RunConfig {
    RunConfig {
      sim: SimParams {
        update_every: self.update_every,
        ..SimParams::default()
      },
      scenario: ScenarioParams {
        resolution: self.resolution,
        satellites: self.satellites,
        seed: self.seed,
        trails: !self.no_trails,
        ..ScenarioParams::default()
      },
      trail: TrailParams::default(),
      camera: CameraParams::default(),
      headless: self.headless,
      frames: self.frames,
      shader: self.shader,
    }
  }
}

fn main() -> ExitCode {
  let args = Args::parse();

  if let Some(Commands::Completions { shell }) = args.command {
    let mut cmd = Args::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
    return ExitCode::SUCCESS;
  }

  match orbit_viz::state::run(args.into_config()) {
    Ok(()) => ExitCode::SUCCESS,
    Err(e) => {
      log::error!("{e}");
      eprintln!("error: {e}");
      ExitCode::FAILURE
    }
  }
}
