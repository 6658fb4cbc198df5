//! Full Bevy E2E streaming test.
//!
//! Tests the plugin flow:
//! 1. Open a world with the `OpenWorld` command
//! 2. Let the producer prefetch the neighborhood
//! 3. Move the anchor across a chunk boundary
//! 4. Verify the window recentered and window-local entities shifted back

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use bevy::ecs::message::MessageReader;
use bevy::prelude::*;
use bevy_tile_stream::{
  Chunk, ChunkLoader, ChunkPos, CloseWorld, LoadError, OpenWorld, StreamingConfig,
  StreamingWorld, TileStreamPlugin, WindowAnchor, WindowLocal, WindowShifted,
  track_window_anchor,
};
use tempfile::TempDir;

const WORLD_TOML: &str = r#"
name = "plugin_test"
display_name = "Plugin Test"
width = 10
height = 10
sea_level = 0
shallows_level = 0
sand_level = 0
spawn_position = { x = 22, y = 22 }
"#;

struct FlatLoader;

impl ChunkLoader for FlatLoader {
  fn load(&self, _world_dir: &Path, _chunk: &mut Chunk) -> Result<(), LoadError> {
    Ok(())
  }
}

#[derive(Resource, Default)]
struct Shifts(Vec<WindowShifted>);

fn collect_shifts(mut reader: MessageReader<WindowShifted>, mut shifts: ResMut<Shifts>) {
  shifts.0.extend(reader.read().copied());
}

struct TestHarness {
  app: App,
  _dir: TempDir,
}

impl TestHarness {
  fn new() -> Self {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("world.toml"), WORLD_TOML).unwrap();

    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.add_plugins(TileStreamPlugin::new(StreamingConfig {
      chunk_size: 4,
      tile_size: 1.0,
      local_world_size: 3,
      maximum_chunks_in_cache: 8,
      maximum_chunks_in_pool: 64,
      chunk_cache_range: 2,
      chunk_cache_log: true,
    }));
    app.init_resource::<Shifts>();
    app.add_systems(Update, collect_shifts.after(track_window_anchor));

    app
      .world_mut()
      .commands()
      .queue(OpenWorld::with_loader(dir.path(), Arc::new(FlatLoader)));
    app.update(); // Apply open command

    Self { app, _dir: dir }
  }

  fn streaming(&self) -> &StreamingWorld {
    self.app.world().resource::<StreamingWorld>()
  }

  fn run_until(&mut self, mut condition: impl FnMut(&StreamingWorld) -> bool) {
    for _ in 0..1000 {
      self.app.update();
      if condition(self.streaming()) {
        return;
      }
      std::thread::sleep(Duration::from_millis(2));
    }
    panic!("condition not reached");
  }

  fn translation(&self, entity: Entity) -> Vec3 {
    self.app.world().get::<Transform>(entity).unwrap().translation
  }

  fn set_translation(&mut self, entity: Entity, translation: Vec3) {
    self
      .app
      .world_mut()
      .get_mut::<Transform>(entity)
      .unwrap()
      .translation = translation;
  }
}

#[test]
fn open_world_builds_window_at_spawn() {
  let harness = TestHarness::new();
  let streaming = harness.streaming();

  assert_eq!(streaming.global_chunk_position(), ChunkPos::new(5, 5));
  assert_eq!(streaming.window().origin(), ChunkPos::new(4, 4));
  assert_eq!(streaming.pool().len(), 9);
  assert_eq!(streaming.spawn_local_position(), Vec2::new(6.5, 6.5));
}

#[test]
fn producer_prefetches_neighborhood() {
  let mut harness = TestHarness::new();

  // Range 2 around (5, 5): a 5x5 square, all in-world.
  harness.run_until(|w| w.pool().len() == 25 && !w.coordinator().is_producing());

  let streaming = harness.streaming();
  for y in 3..=7 {
    for x in 3..=7 {
      assert!(streaming.pool().contains(ChunkPos::new(x, y)));
    }
  }
  assert_eq!(streaming.stats().staged, 0);
}

#[test]
fn anchor_crossing_recenters_and_shifts_locals() {
  let mut harness = TestHarness::new();
  let spawn = harness.streaming().spawn_local_position();

  let anchor = harness
    .app
    .world_mut()
    .spawn((Transform::from_translation(spawn.extend(0.0)), WindowAnchor))
    .id();
  let prop = harness
    .app
    .world_mut()
    .spawn((Transform::from_xyz(1.0, 2.0, 3.0), WindowLocal))
    .id();
  let bystander = harness
    .app
    .world_mut()
    .spawn(Transform::from_xyz(1.0, 2.0, 3.0))
    .id();

  harness.app.update();
  assert_eq!(harness.streaming().global_chunk_position(), ChunkPos::new(5, 5));
  assert!(harness.app.world().resource::<Shifts>().0.is_empty());

  // One chunk (4 tiles of 1 unit) east.
  harness.set_translation(anchor, Vec3::new(spawn.x + 4.0, spawn.y, 0.0));
  harness.app.update();

  assert_eq!(harness.streaming().global_chunk_position(), ChunkPos::new(6, 5));
  assert_eq!(harness.translation(anchor), Vec3::new(spawn.x, spawn.y, 0.0));
  assert_eq!(harness.translation(prop), Vec3::new(-3.0, 2.0, 3.0));
  assert_eq!(harness.translation(bystander), Vec3::new(1.0, 2.0, 3.0));

  let shifts = &harness.app.world().resource::<Shifts>().0;
  assert_eq!(
    shifts,
    &vec![WindowShifted {
      delta: IVec2::new(1, 0),
      center: ChunkPos::new(6, 5),
    }]
  );

  // Global position is unchanged by the shift.
  let global = harness
    .streaming()
    .global_tile_position(harness.translation(anchor).truncate());
  assert_eq!(global, bevy_tile_stream::TilePos::new(26, 22));
}

#[test]
fn close_world_removes_resource() {
  let mut harness = TestHarness::new();
  harness.app.world_mut().commands().queue(CloseWorld);
  harness.app.update();
  assert!(harness.app.world().get_resource::<StreamingWorld>().is_none());
}

#[test]
fn open_missing_world_is_logged_not_fatal() {
  let mut app = App::new();
  app.add_plugins(MinimalPlugins);
  app.add_plugins(TileStreamPlugin::default());
  app
    .world_mut()
    .commands()
    .queue(OpenWorld::new("no/such/world"));
  app.update();
  assert!(app.world().get_resource::<StreamingWorld>().is_none());
}
