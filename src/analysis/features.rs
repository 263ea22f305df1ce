//! Fixed-size grayscale feature vectors for image tiles
//!
//! A tile is resampled to the sample dimensions with a triangle filter,
//! reduced to 8-bit luminance (alpha dropped) and flattened row by row.
//! The same extractor runs when a profile is built and when a collage is
//! synthesized, so both sides of a query live in the same feature space.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgba, RgbaImage};

use crate::io::error::{Result, invalid_parameter};
use crate::spatial::grid::{CropBox, GridTiler};

const SAMPLE_FILTER: FilterType = FilterType::Triangle;

/// Luminance samples of one tile in row-major order
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FeatureVector(Vec<u8>);

impl FeatureVector {
    /// Borrow the raw luminance values
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// Number of components
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check whether the vector has no components
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Take ownership of the raw luminance values
    pub fn into_inner(self) -> Vec<u8> {
        self.0
    }
}

impl From<Vec<u8>> for FeatureVector {
    fn from(values: Vec<u8>) -> Self {
        Self(values)
    }
}

impl AsRef<[u8]> for FeatureVector {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Reduces tiles to vectors of `sample_width * sample_height` luminance values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureExtractor {
    sample_width: u32,
    sample_height: u32,
}

impl FeatureExtractor {
    /// Create an extractor for the given sample dimensions
    ///
    /// # Errors
    ///
    /// Returns an error if either sample dimension is zero
    pub fn new(sample_width: u32, sample_height: u32) -> Result<Self> {
        if sample_width == 0 {
            return Err(invalid_parameter(
                "sample_width",
                &sample_width,
                &"must be positive",
            ));
        }
        if sample_height == 0 {
            return Err(invalid_parameter(
                "sample_height",
                &sample_height,
                &"must be positive",
            ));
        }

        Ok(Self {
            sample_width,
            sample_height,
        })
    }

    /// Length of every vector this extractor produces
    pub const fn dimension(&self) -> usize {
        self.sample_width as usize * self.sample_height as usize
    }

    /// Sample dimensions (width, height)
    pub const fn sample_size(&self) -> (u32, u32) {
        (self.sample_width, self.sample_height)
    }

    /// Reduce an arbitrary pixel view to a feature vector
    pub fn extract<I>(&self, view: &I) -> FeatureVector
    where
        I: GenericImageView<Pixel = Rgba<u8>>,
    {
        let sampled = imageops::resize(view, self.sample_width, self.sample_height, SAMPLE_FILTER);
        let luma = DynamicImage::ImageRgba8(sampled).into_luma8();
        FeatureVector(luma.into_raw())
    }

    /// Reduce the pixels under `crop` to a feature vector
    ///
    /// # Errors
    ///
    /// Returns an error if the crop box does not lie inside the image
    pub fn extract_region(&self, image: &RgbaImage, crop: CropBox) -> Result<FeatureVector> {
        if !crop.fits_within(image.width(), image.height()) {
            return Err(invalid_parameter(
                "crop",
                &crop,
                &format!("outside {}x{} image", image.width(), image.height()),
            ));
        }

        let view = imageops::crop_imm(image, crop.x0, crop.y0, crop.width(), crop.height());
        Ok(self.extract(&*view))
    }

    /// Extract one vector per box of `tiler`, in tiling order
    ///
    /// # Errors
    ///
    /// Returns an error if the tiler was planned for a larger surface than `image`
    pub fn extract_tiles(
        &self,
        image: &RgbaImage,
        tiler: &GridTiler,
    ) -> Result<Vec<(CropBox, FeatureVector)>> {
        tiler
            .boxes()
            .map(|crop| Ok((crop, self.extract_region(image, crop)?)))
            .collect()
    }
}
