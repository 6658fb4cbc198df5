//! PNG chunk images.
//!
//! Each chunk is stored as `<x>_<y>.png` in the world directory. The
//! elevation byte is read from the red channel.

use std::io;
use std::path::Path;

use image::ImageFormat;

use super::{ChunkLoader, LoadError};
use crate::primitives::Chunk;
use crate::tile::{ElevationLevels, Tile};

/// Decodes chunk images with the `image` crate.
#[derive(Clone, Debug)]
pub struct ImageChunkLoader {
  levels: ElevationLevels,
}

impl ImageChunkLoader {
  pub fn new(levels: ElevationLevels) -> Self {
    Self { levels }
  }

  /// File name of the image for a chunk.
  pub fn file_name(x: i32, y: i32) -> String {
    format!("{x}_{y}.png")
  }
}

impl ChunkLoader for ImageChunkLoader {
  fn load(&self, world_dir: &Path, chunk: &mut Chunk) -> Result<(), LoadError> {
    let pos = chunk.pos();
    let path = world_dir.join(Self::file_name(pos.x, pos.y));
    let bytes = match std::fs::read(&path) {
      Ok(bytes) => bytes,
      Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(LoadError::Missing(path)),
      Err(e) => return Err(LoadError::Io(e)),
    };

    let image = image::load_from_memory_with_format(&bytes, ImageFormat::Png)
      .map_err(|e| LoadError::Decode(Box::new(e)))?
      .to_rgba8();

    // Pixels past the chunk edge are ignored; a smaller image leaves blanks.
    let width = image.width().min(chunk.size());
    let height = image.height().min(chunk.size());
    for y in 0..height {
      for x in 0..width {
        let elevation = image.get_pixel(x, y)[0];
        chunk.set_tile(x, y, Tile::from_elevation(elevation, &self.levels));
      }
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use image::{Rgba, RgbaImage};

  use super::*;
  use crate::coords::ChunkPos;
  use crate::tile::TileKind;

  fn levels() -> ElevationLevels {
    ElevationLevels::new(10, 20, 30)
  }

  #[test]
  fn decodes_red_channel() {
    let dir = tempfile::tempdir().unwrap();
    let mut image = RgbaImage::new(4, 4);
    image.put_pixel(1, 2, Rgba([200, 0, 0, 255]));
    image.put_pixel(3, 3, Rgba([15, 15, 15, 255]));
    image.save(dir.path().join("2_-1.png")).unwrap();

    let mut chunk = Chunk::blank(ChunkPos::new(2, -1), 4);
    ImageChunkLoader::new(levels())
      .load(dir.path(), &mut chunk)
      .unwrap();

    assert_eq!(chunk.tile(1, 2).kind, TileKind::Grass);
    assert_eq!(chunk.tile(3, 3).elevation, 15);
    assert_eq!(chunk.tile(3, 3).kind, TileKind::Shallows);
    assert_eq!(chunk.tile(0, 0).elevation, 0);
  }

  #[test]
  fn oversized_images_are_cropped() {
    let dir = tempfile::tempdir().unwrap();
    let image = RgbaImage::from_pixel(6, 3, Rgba([100, 100, 100, 255]));
    image.save(dir.path().join("0_0.png")).unwrap();

    let mut chunk = Chunk::blank(ChunkPos::new(0, 0), 4);
    ImageChunkLoader::new(levels())
      .load(dir.path(), &mut chunk)
      .unwrap();

    assert_eq!(chunk.tile(3, 2).elevation, 100);
    assert_eq!(chunk.tile(3, 3).elevation, 0);
  }

  #[test]
  fn missing_and_corrupt_files() {
    let dir = tempfile::tempdir().unwrap();
    let loader = ImageChunkLoader::new(levels());

    let mut chunk = Chunk::blank(ChunkPos::new(5, 5), 4);
    assert!(matches!(
      loader.load(dir.path(), &mut chunk),
      Err(LoadError::Missing(_))
    ));

    std::fs::write(dir.path().join("5_5.png"), b"not a png").unwrap();
    assert!(matches!(
      loader.load(dir.path(), &mut chunk),
      Err(LoadError::Decode(_))
    ));
  }
}
