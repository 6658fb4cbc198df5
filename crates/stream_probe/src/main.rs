//! Headless world streaming probe.
//!
//! Opens a world directory, spawns an anchor at the spawn tile and walks it
//! one chunk per move, logging the window and chunk cache state after each
//! step.
//!
//! ```text
//! stream_probe --world worlds/earth --moves east,east,south --ticks 20
//! ```

use std::error::Error;
use std::path::PathBuf;
use std::time::Duration;

use bevy::log::LogPlugin;
use bevy::prelude::*;
use bevy_tile_stream::{
  CloseWorld, OpenWorld, StreamingConfig, StreamingWorld, TileStreamPlugin, WindowAnchor,
};
use clap::{Parser, ValueEnum};

#[derive(Parser)]
#[command(name = "stream_probe", about = "Walk a streamed tile world headlessly")]
struct Args {
  /// World directory containing world.toml
  #[arg(short, long)]
  world: PathBuf,
  /// Streaming config TOML (defaults are used when omitted)
  #[arg(short, long)]
  config: Option<PathBuf>,
  /// Comma-separated moves, one chunk each
  #[arg(short, long, value_delimiter = ',')]
  moves: Vec<Direction>,
  /// Frames to run after each move
  #[arg(short, long, default_value_t = 30)]
  ticks: u32,
  /// Sleep between frames in milliseconds
  #[arg(long, default_value_t = 5)]
  frame_ms: u64,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Direction {
  North,
  South,
  East,
  West,
}

impl Direction {
  /// Unit step in chunk space. Tile rows grow southward.
  fn step(self) -> Vec2 {
    match self {
      Self::North => Vec2::new(0.0, -1.0),
      Self::South => Vec2::new(0.0, 1.0),
      Self::East => Vec2::new(1.0, 0.0),
      Self::West => Vec2::new(-1.0, 0.0),
    }
  }
}

fn main() -> Result<(), Box<dyn Error>> {
  let args = Args::parse();

  let config = match &args.config {
    Some(path) => StreamingConfig::load(path)?,
    None => StreamingConfig::default(),
  };
  config.validate()?;
  let chunk_world_size = config.chunk_world_size();

  let mut app = App::new();
  app
    .add_plugins(MinimalPlugins)
    .add_plugins(LogPlugin::default())
    .add_plugins(TileStreamPlugin::new(config));

  app
    .world_mut()
    .commands()
    .queue(OpenWorld::new(args.world.clone()));
  app.update(); // Apply open command

  let Some(spawn) = app
    .world()
    .get_resource::<StreamingWorld>()
    .map(StreamingWorld::spawn_local_position)
  else {
    return Err(format!("could not open world at {}", args.world.display()).into());
  };
  let anchor = app
    .world_mut()
    .spawn((Transform::from_translation(spawn.extend(0.0)), WindowAnchor))
    .id();

  run_frames(&mut app, args.ticks, args.frame_ms);
  report(&app, "initial");

  for (i, direction) in args.moves.iter().enumerate() {
    if let Some(mut transform) = app.world_mut().get_mut::<Transform>(anchor) {
      let step = direction.step() * chunk_world_size;
      transform.translation += step.extend(0.0);
    }
    run_frames(&mut app, args.ticks, args.frame_ms);
    report(&app, &format!("move {} ({direction:?})", i + 1));
  }

  app.world_mut().commands().queue(CloseWorld);
  app.update();
  Ok(())
}

fn run_frames(app: &mut App, frames: u32, frame_ms: u64) {
  for _ in 0..frames {
    app.update();
    std::thread::sleep(Duration::from_millis(frame_ms));
  }
}

fn report(app: &App, label: &str) {
  if let Some(world) = app.world().get_resource::<StreamingWorld>() {
    info!("[{label}]\n{}", world.stats());
  }
}
