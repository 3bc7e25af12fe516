use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use glam::Vec3;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;
use tickworks_common::{BodyId, Transform};
use tickworks_control::{Trajectory, TrajectoryController, Waypoint};
use tickworks_kernel::{
    Body, ClockConfig, Environment, Geometry, SplitMix64, World, timestep_from_secs,
};
use tickworks_physics::{BallisticEngine, EngineRegistry};
use tickworks_scene::{Scene, load_scene, read_body_definition};

const DEFAULT_GRAVITY: Vec3 = Vec3::new(0.0, 0.0, -9.81);
/// Spawned bodies land in a 0.4 m cube above this corner.
const SPAWN_CORNER: Vec3 = Vec3::new(-0.5, -0.5, 2.0);
const SPAWN_SPREAD: f32 = 0.4;

#[derive(Parser)]
#[command(name = "tickworks", about = "Fixed-step simulation stepping demo")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version and default clock settings
    Info,
    /// List registered physics engines
    Engines,
    /// Run the simulation and keep dropping bodies into it
    Physics(PhysicsArgs),
}

#[derive(Args)]
struct PhysicsArgs {
    /// Scene file to load (YAML or JSON)
    #[arg(long)]
    scene: Option<PathBuf>,
    /// Physics engine; overrides the scene's engine (default: ballistic)
    #[arg(long)]
    engine: Option<String>,
    /// Simulation timestep in seconds
    #[arg(long, default_value_t = 0.01)]
    timestep: f64,
    /// Gravity as x,y,z; overrides the scene's gravity (default: 0,0,-9.81)
    #[arg(long, value_parser = parse_vec3, allow_hyphen_values = true)]
    gravity: Option<Vec3>,
    /// Stop spawning after this many bodies
    #[arg(long, default_value_t = 40)]
    max_bodies: usize,
    /// Wall-clock milliseconds between reports (and spawns)
    #[arg(long, default_value_t = 400)]
    interval_ms: u64,
    /// Stop after this many wall-clock seconds (runs forever otherwise)
    #[arg(long)]
    duration: Option<f64>,
    /// Seed for body selection and placement
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// Body definition files to spawn from (repeatable; every file in --parts-dir otherwise)
    #[arg(long = "body")]
    bodies: Vec<PathBuf>,
    /// Directory searched for `*.body.{yaml,yml,json}` files when no --body is given
    #[arg(long, default_value = "data/parts")]
    parts_dir: PathBuf,
    /// Step as fast as possible instead of pacing to the wall clock
    #[arg(long)]
    fast: bool,
    /// Add a kinematically driven sweeper body
    #[arg(long)]
    kinematic: bool,
}

fn parse_vec3(s: &str) -> Result<Vec3, String> {
    let parts: Vec<f32> = s
        .split(',')
        .map(|p| p.trim().parse::<f32>().map_err(|e| format!("`{p}`: {e}")))
        .collect::<Result<_, _>>()?;
    match parts.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
        _ => Err(format!("expected three comma-separated values, got {}", parts.len())),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Info => {
            println!("tickworks v{}", env!("CARGO_PKG_VERSION"));
            println!("clock: {:?}", ClockConfig::default());
            let registry = EngineRegistry::with_builtins();
            let engines: Vec<&str> = registry.names().collect();
            println!("engines: {}", engines.join(", "));
        }
        Commands::Engines => {
            for name in EngineRegistry::with_builtins().names() {
                println!("{name}");
            }
        }
        Commands::Physics(args) => run_physics(args)?,
    }

    Ok(())
}

/// Body files found in `dir`, sorted by name.
fn discover_parts(dir: &Path) -> anyhow::Result<Vec<PathBuf>> {
    let mut parts = Vec::new();
    for entry in std::fs::read_dir(dir).with_context(|| format!("listing {}", dir.display()))? {
        let path = entry?.path();
        let is_body_file = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| {
                [".body.yaml", ".body.yml", ".body.json"]
                    .iter()
                    .any(|suffix| name.ends_with(suffix))
            });
        if is_body_file && path.is_file() {
            parts.push(path);
        }
    }
    parts.sort();
    anyhow::ensure!(!parts.is_empty(), "no body files in {}", dir.display());
    Ok(parts)
}

/// First `body<N>` name, starting at `*next`, that the world does not use yet.
fn free_body_name(world: &World, next: &mut usize) -> String {
    loop {
        let name = format!("body{next}");
        *next += 1;
        if world.body_by_name(&name).is_none() {
            return name;
        }
    }
}

/// Read a randomly chosen part file and drop it into the spawn cube.
/// The caller holds the world lock for the whole read-add-place sequence.
fn spawn_body(
    world: &mut World,
    parts: &[PathBuf],
    rng: &mut SplitMix64,
    next_name: &mut usize,
) -> anyhow::Result<BodyId> {
    let path = &parts[rng.next_index(parts.len())];
    let mut body = read_body_definition(path)
        .with_context(|| format!("reading {}", path.display()))?
        .to_body();
    body.name = free_body_name(world, next_name);
    let offset = Vec3::new(rng.next_f32(), rng.next_f32(), rng.next_f32());
    let placement = Transform::from_position(SPAWN_CORNER + SPAWN_SPREAD * offset);
    let id = world.add_body(body)?;
    world.set_transform(id, placement)?;
    Ok(id)
}

fn sweeper_path() -> anyhow::Result<Trajectory> {
    let corners = [
        Vec3::new(1.0, 1.0, 0.5),
        Vec3::new(-1.0, 1.0, 0.5),
        Vec3::new(-1.0, -1.0, 0.5),
        Vec3::new(1.0, -1.0, 0.5),
        Vec3::new(1.0, 1.0, 0.5),
    ];
    let waypoints = corners
        .iter()
        .enumerate()
        .map(|(i, &corner)| Waypoint {
            time: i as f32 * 2.0,
            transform: Transform::from_position(corner),
        })
        .collect();
    Ok(Trajectory::new(waypoints)?)
}

fn run_physics(args: PhysicsArgs) -> anyhow::Result<()> {
    let timestep = timestep_from_secs(args.timestep)?;
    let registry = EngineRegistry::with_builtins();
    let env = Environment::new(ClockConfig {
        realtime: !args.fast,
        ..ClockConfig::default()
    })?;

    let scene: Option<Scene> = args
        .scene
        .as_deref()
        .map(load_scene)
        .transpose()
        .context("loading scene")?;
    if let Some(scene) = &scene {
        scene.instantiate(&env, &registry)?;
    }

    let scene_engine = scene.as_ref().and_then(Scene::engine_name);
    let engine = match (args.engine.as_deref(), scene_engine) {
        (Some(name), _) => Some(registry.create(name)?),
        (None, Some(_)) => None,
        (None, None) => Some(registry.create(BallisticEngine::NAME)?),
    };
    let gravity = args
        .gravity
        .or_else(|| scene.as_ref().and_then(Scene::gravity))
        .unwrap_or(DEFAULT_GRAVITY);

    let parts = if args.bodies.is_empty() {
        discover_parts(&args.parts_dir)?
    } else {
        args.bodies.clone()
    };

    {
        let mut world = env.lock();
        if let Some(engine) = engine {
            world.set_physics_engine(engine);
        }
        world.physics_mut().set_gravity(gravity);
        if args.kinematic {
            let sweeper = world.add_body(
                Body::new("sweeper")
                    .fixed()
                    .with_geometry(Geometry::Sphere { radius: 0.1 }),
            )?;
            let mut controller = TrajectoryController::new("sweeper-ctrl", sweeper);
            controller.set_path(sweeper_path()?);
            world.add_participant(Box::new(controller));
        }
        tracing::info!(
            engine = world.physics().name(),
            gravity = ?world.physics().gravity(),
            bodies = world.body_count(),
            "environment ready"
        );
    }

    env.stop_simulation();
    env.start_simulation(timestep)?;
    let started = Instant::now();
    let interval = Duration::from_millis(args.interval_ms);
    let mut rng = SplitMix64::new(args.seed);
    let mut spawned = 0usize;
    let mut next_name = 0usize;

    loop {
        {
            let mut world = env.lock();
            if spawned < args.max_bodies {
                spawn_body(&mut world, &parts, &mut rng, &mut next_name)?;
                spawned += 1;
            }
            let events = world.drain_events();
            tracing::debug!(events = events.len(), tick = world.tick(), "drained world events");
        }

        std::thread::sleep(interval);

        if let Some(err) = env.take_last_error() {
            env.stop_simulation();
            return Err(err).context("simulation stopped");
        }

        let sim = env.simulation_time().as_secs_f64();
        let real = started.elapsed().as_secs_f64();
        println!(
            "sim time: {sim:.6}s, real time: {real:.6}s, diff = {:.6}s",
            sim - real
        );

        if args.duration.is_some_and(|limit| real >= limit) {
            break;
        }
    }

    env.stop_simulation();
    print_summary(&env.lock(), env.simulation_time());
    Ok(())
}

fn print_summary(world: &World, sim_time: Duration) {
    let resting = world
        .bodies()
        .values()
        .filter(|b| !b.is_static && b.linear_velocity.length_squared() < 1e-6)
        .count();
    println!(
        "World: tick={} sim_time={:.3}s bodies={} resting={}",
        world.tick(),
        sim_time.as_secs_f64(),
        world.body_count(),
        resting
    );
}
