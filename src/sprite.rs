//! Compose many thumbnails into one square image sprite.
//!
//! Tiles are placed left to right, then top to bottom, on an `N x N` grid with
//! `N = ceil(sqrt(K))`. Unused cells at the end of the grid stay black.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgb, RgbImage};
use log::{debug, info, warn};
#[cfg(not(feature = "perf"))]
use rayon::prelude::*;
use thiserror::Error;

const CHANNELS: usize = 3;

/// Pixel size of every tile in a sprite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileSize {
    height: u32,
    width: u32,
}

impl Default for TileSize {
    fn default() -> Self {
        Self {
            height: 64,
            width: 64,
        }
    }
}

impl TileSize {
    /// Create a tile size, rejecting zero dimensions.
    pub fn new(height: u32, width: u32) -> Result<Self, SpriteError> {
        if height == 0 || width == 0 {
            return Err(SpriteError::InvalidTileSize { height, width });
        }
        Ok(Self { height, width })
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn width(&self) -> u32 {
        self.width
    }
}

/// Errors that abort sprite creation.
#[derive(Debug, Error)]
pub enum SpriteError {
    #[error("tile size must be non-zero, got {height}x{width}")]
    InvalidTileSize { height: u32, width: u32 },
    #[error("cannot create a sprite from an empty image sequence")]
    EmptySequence,
    #[error("tile {index} is {actual_width}x{actual_height}, expected {width}x{height}")]
    TileSizeMismatch {
        index: usize,
        width: u32,
        height: u32,
        actual_width: u32,
        actual_height: u32,
    },
    #[error("sprite dimension overflow")]
    Overflow,
    #[error("failed to write sprite to {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("failed to move sprite into place at {path}")]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why a single tile could not be loaded.
#[derive(Debug, Error)]
pub enum TileError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to decode {path}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// Read an image and scale it to exactly `size`.
///
/// The file is read as bytes before decoding, so any path the OS accepts works.
/// Grayscale images stay single channel, everything else becomes RGB.
pub fn load_tile(path: &Path, size: TileSize) -> Result<DynamicImage, TileError> {
    let bytes = fs::read(path).map_err(|source| TileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let image = image::load_from_memory(&bytes).map_err(|source| TileError::Decode {
        path: path.to_path_buf(),
        source,
    })?;
    let scaled = image.resize_exact(size.width, size.height, FilterType::Triangle);
    Ok(if scaled.color().has_color() {
        DynamicImage::ImageRgb8(scaled.to_rgb8())
    } else {
        DynamicImage::ImageLuma8(scaled.to_luma8())
    })
}

/// Like [`load_tile`], but substitutes a black tile when loading fails.
pub fn load_tile_or_blank(path: &Path, size: TileSize) -> DynamicImage {
    match load_tile(path, size) {
        Ok(tile) => tile,
        Err(err) => {
            warn!("replacing with an empty thumbnail: {err}: {}", error_cause(&err));
            blank_tile(size)
        }
    }
}

fn error_cause(err: &TileError) -> String {
    match err {
        TileError::Io { source, .. } => source.to_string(),
        TileError::Decode { source, .. } => source.to_string(),
    }
}

fn blank_tile(size: TileSize) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::new(size.width, size.height))
}

/// Load every tile, keeping the input order.
pub fn load_tiles<P: AsRef<Path> + Sync>(paths: &[P], size: TileSize) -> Vec<DynamicImage> {
    let total = paths.len();
    let load = |(i, path): (usize, &P)| {
        let path = path.as_ref();
        info!("add image {} of {} to sprite from {}", i + 1, total, path.display());
        load_tile_or_blank(path, size)
    };
    #[cfg(not(feature = "perf"))]
    return paths.par_iter().enumerate().map(load).collect();
    #[cfg(feature = "perf")]
    return paths.iter().enumerate().map(load).collect();
}

/// Number of tiles along each axis of the square grid, `ceil(sqrt(count))`.
pub fn grid_side(count: usize) -> usize {
    let mut side = (count as f64).sqrt() as usize;
    while side * side < count {
        side += 1;
    }
    while side > 0 && (side - 1) * (side - 1) >= count {
        side -= 1;
    }
    side
}

/// Tile the images row-major into a square RGB image, padding with black tiles.
///
/// # Errors
///
/// Returns [`SpriteError::EmptySequence`] for no tiles and
/// [`SpriteError::TileSizeMismatch`] when a tile is not exactly `size`.
pub fn compose_sprite(tiles: &[DynamicImage], size: TileSize) -> Result<RgbImage, SpriteError> {
    if tiles.is_empty() {
        return Err(SpriteError::EmptySequence);
    }
    for (index, tile) in tiles.iter().enumerate() {
        let (actual_width, actual_height) = tile.dimensions();
        if (actual_width, actual_height) != (size.width, size.height) {
            return Err(SpriteError::TileSizeMismatch {
                index,
                width: size.width,
                height: size.height,
                actual_width,
                actual_height,
            });
        }
    }

    let side = grid_side(tiles.len());
    let tile_width = size.width as usize;
    let tile_height = size.height as usize;
    let sprite_width = u32::try_from(side * tile_width).map_err(|_| SpriteError::Overflow)?;
    let sprite_height = u32::try_from(side * tile_height).map_err(|_| SpriteError::Overflow)?;
    let sprite_len = (sprite_width as usize)
        .checked_mul(sprite_height as usize)
        .and_then(|pixels| pixels.checked_mul(CHANNELS))
        .ok_or(SpriteError::Overflow)?;
    debug!(
        "composing {} tiles on a {side}x{side} grid ({sprite_width}x{sprite_height} pixels)",
        tiles.len()
    );

    // zero-filled, so the padding cells need no writes
    let mut raw = vec![0_u8; sprite_len];
    let row_len = tile_width * CHANNELS;
    let stride = sprite_width as usize * CHANNELS;

    for (index, tile) in tiles.iter().enumerate() {
        let rgb = to_rgb(tile);
        let src = rgb.as_raw();
        let tile_row = index / side;
        let tile_col = index % side;

        for y in 0..tile_height {
            let src_offset = y * row_len;
            let dst_offset = (tile_row * tile_height + y) * stride + tile_col * row_len;
            raw[dst_offset..dst_offset + row_len]
                .copy_from_slice(&src[src_offset..src_offset + row_len]);
        }
    }

    RgbImage::from_raw(sprite_width, sprite_height, raw).ok_or(SpriteError::Overflow)
}

/// Promote a tile to three channels; grayscale values are replicated to R, G and B.
fn to_rgb(tile: &DynamicImage) -> RgbImage {
    match tile {
        DynamicImage::ImageLuma8(gray) => RgbImage::from_fn(gray.width(), gray.height(), |x, y| {
            let value = gray.get_pixel(x, y)[0];
            Rgb([value, value, value])
        }),
        DynamicImage::ImageRgb8(rgb) => rgb.clone(),
        other => other.to_rgb8(),
    }
}

/// Write the sprite as PNG through a sibling temporary file, so a failed write
/// never leaves a partial file at `path`.
pub fn write_sprite(sprite: &RgbImage, path: &Path) -> Result<(), SpriteError> {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sprite.png".to_string());
    let temporary = path.with_file_name(format!(".{file_name}.tmp"));

    if let Err(source) = sprite.save_with_format(&temporary, ImageFormat::Png) {
        let _ = fs::remove_file(&temporary);
        return Err(SpriteError::Write {
            path: path.to_path_buf(),
            source,
        });
    }
    fs::rename(&temporary, path).map_err(|source| {
        let _ = fs::remove_file(&temporary);
        SpriteError::Persist {
            path: path.to_path_buf(),
            source,
        }
    })
}

/// Load the images at `image_paths`, tile them into a sprite and write it to `output_path`.
///
/// Images that cannot be read become black tiles; only configuration errors and a
/// failure to write the output are returned.
pub fn compose<P: AsRef<Path> + Sync>(
    image_paths: &[P],
    tile_size: TileSize,
    output_path: &Path,
) -> Result<(), SpriteError> {
    if image_paths.is_empty() {
        return Err(SpriteError::EmptySequence);
    }
    let tiles = load_tiles(image_paths, tile_size);
    let sprite = compose_sprite(&tiles, tile_size)?;
    write_sprite(&sprite, output_path)?;
    info!(
        "wrote {}x{} sprite with {} images to {}",
        sprite.width(),
        sprite.height(),
        tiles.len(),
        output_path.display()
    );
    Ok(())
}
