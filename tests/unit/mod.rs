//! Unit tests mirroring the `src/` layout, one file per source file


use image::{Rgba, RgbaImage};
use std::path::{Path, PathBuf};

/// Image whose pixels vary smoothly with position, offset by `shift`
pub fn gradient_image(width: u32, height: u32, shift: u8) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        let r = ((x * 255) / width.max(1)) as u8;
        let g = ((y * 255) / height.max(1)) as u8;
        Rgba([r.wrapping_add(shift), g, shift, 255])
    })
}

/// Image of a single color
pub fn solid_image(width: u32, height: u32, value: u8) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([value, value, value, 255]))
}

/// Write `image` as PNG to `dir/name` and return its path
pub fn write_png(dir: &Path, name: &str, image: &RgbaImage) -> PathBuf {
    let path = dir.join(name);
    image.save(&path).expect("test image should be writable");
    path
}
