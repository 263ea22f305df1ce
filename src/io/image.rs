//! Raster decode, crop, paste and atomic PNG export

use image::error::ImageError;
use image::imageops;
use image::{ImageFormat, ImageReader, RgbaImage};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::io::error::{CollageError, Result, WithPath, invalid_parameter};
use crate::spatial::grid::CropBox;

/// Decode an image file into 8-bit RGBA
///
/// The format is sniffed from the file contents, so a misleading extension
/// does not matter.
///
/// # Errors
///
/// Returns an error if:
/// - The file cannot be opened or read
/// - The content is not in a supported image format
/// - The image data is corrupt
pub fn open_rgba(path: &Path) -> Result<RgbaImage> {
    let reader = ImageReader::open(path)
        .with_path(path, "open image")?
        .with_guessed_format()
        .with_path(path, "read image header")?;

    if reader.format().is_none() {
        return Err(CollageError::UnsupportedImageFormat {
            path: path.to_path_buf(),
            detail: "unrecognized file signature".to_string(),
        });
    }

    let decoded = reader.decode().map_err(|source| match source {
        ImageError::Unsupported(detail) => CollageError::UnsupportedImageFormat {
            path: path.to_path_buf(),
            detail: detail.to_string(),
        },
        source => CollageError::ImageLoad {
            path: path.to_path_buf(),
            source,
        },
    })?;

    Ok(decoded.into_rgba8())
}

/// Copy the pixels under `crop` into a new image
///
/// # Errors
///
/// Returns an error if the crop box does not lie inside the image
pub fn crop(image: &RgbaImage, crop: CropBox) -> Result<RgbaImage> {
    if !crop.fits_within(image.width(), image.height()) {
        return Err(invalid_parameter(
            "crop",
            &crop,
            &format!("outside {}x{} image", image.width(), image.height()),
        ));
    }

    Ok(imageops::crop_imm(image, crop.x0, crop.y0, crop.width(), crop.height()).to_image())
}

/// Overwrite the region of `canvas` under `target` with `tile`
///
/// # Errors
///
/// Returns an error if the tile size differs from the target box or the box
/// does not lie inside the canvas
pub fn paste(canvas: &mut RgbaImage, tile: &RgbaImage, target: CropBox) -> Result<()> {
    if tile.dimensions() != (target.width(), target.height()) {
        return Err(invalid_parameter(
            "tile",
            &format!("{}x{}", tile.width(), tile.height()),
            &format!("does not match target box {target}"),
        ));
    }
    if !target.fits_within(canvas.width(), canvas.height()) {
        return Err(invalid_parameter(
            "target",
            &target,
            &format!("outside {}x{} canvas", canvas.width(), canvas.height()),
        ));
    }

    imageops::replace(canvas, tile, i64::from(target.x0), i64::from(target.y0));
    Ok(())
}

/// Save an image as PNG without ever exposing a partially written file
///
/// The image is encoded into a hidden temporary file next to `output_path`
/// and renamed over it once complete.
///
/// # Errors
///
/// Returns an error if:
/// - The parent directory cannot be created
/// - The image cannot be encoded
/// - The temporary file cannot be moved into place
pub fn export_png(image: &RgbaImage, output_path: &Path) -> Result<()> {
    let parent = match output_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).with_path(parent, "create directory")?;

    let mut staged = tempfile::Builder::new()
        .prefix(".")
        .suffix(".png.partial")
        .tempfile_in(parent)
        .with_path(parent, "create temporary output")?;

    {
        let mut writer = BufWriter::new(staged.as_file_mut());
        image
            .write_to(&mut writer, ImageFormat::Png)
            .map_err(|source| CollageError::ImageExport {
                path: output_path.to_path_buf(),
                source,
            })?;
        writer.flush().with_path(output_path, "write output image")?;
    }

    staged
        .persist(output_path)
        .map_err(|e| e.error)
        .with_path(output_path, "move output image into place")?;

    Ok(())
}
