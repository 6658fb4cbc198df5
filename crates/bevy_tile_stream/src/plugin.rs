//! Bevy integration: plugin, components, commands and systems.

use std::path::PathBuf;
use std::sync::Arc;

use bevy::ecs::message::MessageWriter;
use bevy::prelude::*;

use crate::config::StreamingConfig;
use crate::coords::ChunkPos;
use crate::loading::{ChunkLoader, ImageChunkLoader};
use crate::world::StreamingWorld;
use crate::world_type::WorldType;

/// Plugin that streams the open [`StreamingWorld`] around a
/// [`WindowAnchor`].
///
/// Open a world by queueing [`OpenWorld`]. Every frame the chunk cache is
/// managed, then the anchor is checked for leaving the window's center
/// chunk. When it does, the window recenters and every [`WindowLocal`]
/// entity is shifted back by the same amount.
#[derive(Default)]
pub struct TileStreamPlugin {
  pub config: StreamingConfig,
}

impl TileStreamPlugin {
  pub fn new(config: StreamingConfig) -> Self {
    Self { config }
  }
}

impl Plugin for TileStreamPlugin {
  fn build(&self, app: &mut App) {
    app
      .insert_resource(self.config.clone())
      .add_message::<WindowShifted>()
      .add_systems(Update, (manage_chunk_cache, track_window_anchor).chain());
  }
}

/// Entity positioned in window-local space.
///
/// Its `Transform` is shifted whenever the window recenters, so its global
/// position stays the same.
#[derive(Component, Clone, Copy, Debug, Default)]
pub struct WindowLocal;

/// The entity the window follows. At most one should exist.
#[derive(Component, Clone, Copy, Debug, Default)]
#[require(WindowLocal)]
pub struct WindowAnchor;

/// Message written after the window recenters.
#[derive(bevy::prelude::Message, Clone, Copy, Debug, PartialEq, Eq)]
pub struct WindowShifted {
  /// Movement in chunks.
  pub delta: IVec2,
  /// New center chunk.
  pub center: ChunkPos,
}

/// Command that opens a world directory and inserts [`StreamingWorld`].
///
/// Uses the [`StreamingConfig`] resource. Replaces a world that is already
/// open. Failures are logged.
///
/// # Example
/// ```ignore
/// fn setup(mut commands: Commands) {
///     commands.queue(OpenWorld::new("worlds/earth"));
/// }
/// ```
pub struct OpenWorld {
  dir: PathBuf,
  loader: Option<Arc<dyn ChunkLoader>>,
}

impl OpenWorld {
  /// Opens `dir`, decoding chunk images with [`ImageChunkLoader`].
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self {
      dir: dir.into(),
      loader: None,
    }
  }

  /// Opens `dir` with a custom loader.
  pub fn with_loader(dir: impl Into<PathBuf>, loader: Arc<dyn ChunkLoader>) -> Self {
    Self {
      dir: dir.into(),
      loader: Some(loader),
    }
  }
}

impl bevy::ecs::system::Command for OpenWorld {
  fn apply(self, world: &mut World) {
    let config = world
      .get_resource::<StreamingConfig>()
      .cloned()
      .unwrap_or_default();

    let world_type = match WorldType::load(&self.dir) {
      Ok(world_type) => world_type,
      Err(e) => {
        error!("Failed to load world from {}: {e}", self.dir.display());
        return;
      }
    };
    let loader: Arc<dyn ChunkLoader> = match self.loader {
      Some(loader) => loader,
      None => Arc::new(ImageChunkLoader::new(world_type.levels)),
    };

    // Close the previous session before the new one starts loading.
    world.remove_resource::<StreamingWorld>();
    match StreamingWorld::open(config, world_type, loader) {
      Ok(streaming) => {
        world.insert_resource(streaming);
      }
      Err(e) => error!("Failed to open world {}: {e}", self.dir.display()),
    }
  }
}

/// Command that closes the open world.
pub struct CloseWorld;

impl bevy::ecs::system::Command for CloseWorld {
  fn apply(self, world: &mut World) {
    // Teardown runs in StreamingWorld's Drop.
    world.remove_resource::<StreamingWorld>();
  }
}

/// Drains produced chunks into the pool and starts the pending order.
pub fn manage_chunk_cache(world: Option<ResMut<StreamingWorld>>) {
  if let Some(mut world) = world {
    world.tick();
  }
}

/// Recenters the window when the anchor leaves the center chunk and
/// shifts window-local entities to compensate.
pub fn track_window_anchor(
  world: Option<ResMut<StreamingWorld>>,
  mut locals: Query<(&mut Transform, Has<WindowAnchor>), With<WindowLocal>>,
  mut shifted: MessageWriter<WindowShifted>,
) {
  let Some(mut world) = world else {
    return;
  };
  let Some(anchor) = locals
    .iter()
    .find(|(_, is_anchor)| *is_anchor)
    .map(|(transform, _)| transform.translation.truncate())
  else {
    return;
  };

  let Some(delta) = world.track(anchor) else {
    return;
  };
  let shift = -delta.as_vec2() * world.config().chunk_world_size();
  for (mut transform, _) in &mut locals {
    transform.translation.x += shift.x;
    transform.translation.y += shift.y;
  }

  let center = world.global_chunk_position();
  debug!("Window recentered on {},{} (delta {delta})", center.x, center.y);
  shifted.write(WindowShifted { delta, center });
}
