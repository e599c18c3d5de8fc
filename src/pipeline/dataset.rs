//! Image-folder dataset.
//!
//! Pairs every image in a directory with an optional ground-truth mask from a
//! second directory, matched by file stem.

use std::fs;
use std::path::{Path, PathBuf};

use image::{ColorType, DynamicImage};
use ndarray::{Array2, Array3, ShapeError};
use tracing::debug;

use crate::error::PipelineError;

use super::colormap::ColorMap;

/// Channels of a decoded image and of the normalization constants.
pub const RGB_CHANNELS: usize = 3;

/// File extensions recognised as images.
pub const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "tif", "tiff"];

/// Mask file name suffixes tried, in order, after the image stem.
const MASK_SUFFIXES: [&str; 3] = [".png", "_instance_color_RGB.png", "_mask.png"];

/// One image and its optional mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub image_path: PathBuf,
    pub mask_path: Option<PathBuf>,
}

impl Sample {
    /// File name of the image, used to name outputs.
    pub fn file_name(&self) -> String {
        self.image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Sorted list of images in a directory.
#[derive(Debug, Clone, Default)]
pub struct ImageFolder {
    samples: Vec<Sample>,
}

impl ImageFolder {
    /// Scan `image_dir` for images and match masks from `mask_dir`.
    pub fn open(image_dir: &Path, mask_dir: Option<&Path>) -> Result<Self, PipelineError> {
        let entries = fs::read_dir(image_dir).map_err(|e| PipelineError::io(image_dir, e))?;

        let mut images = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| PipelineError::io(image_dir, e))?.path();
            if path.is_file() && has_image_extension(&path) {
                images.push(path);
            }
        }
        images.sort();

        let samples: Vec<Sample> = images
            .into_iter()
            .map(|image_path| {
                let mask_path = mask_dir.and_then(|dir| find_mask(dir, &image_path));
                Sample {
                    image_path,
                    mask_path,
                }
            })
            .collect();

        debug!(
            images = samples.len(),
            masks = samples.iter().filter(|s| s.mask_path.is_some()).count(),
            "Scanned image folder"
        );
        Ok(Self { samples })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Sample> {
        self.samples.iter()
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            let e = e.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&e.as_str())
        })
        .unwrap_or(false)
}

fn find_mask(mask_dir: &Path, image_path: &Path) -> Option<PathBuf> {
    let stem = image_path.file_stem()?.to_string_lossy();
    MASK_SUFFIXES
        .iter()
        .map(|suffix| mask_dir.join(format!("{stem}{suffix}")))
        .find(|p| p.is_file())
}

/// Load an image as `(height, width, 3)` RGB.
pub fn load_image(path: &Path) -> Result<Array3<u8>, PipelineError> {
    let img = image::open(path).map_err(|e| PipelineError::image(path, e))?;
    rgb_array(img).map_err(|e| invalid_data(path, e))
}

/// Load a mask as a label map.
///
/// Single-channel masks are read as labels directly; colour masks are
/// decoded through `colormap`.
pub fn load_mask(path: &Path, colormap: &ColorMap) -> Result<Array2<u8>, PipelineError> {
    let img = image::open(path).map_err(|e| PipelineError::image(path, e))?;
    match img.color() {
        ColorType::L8 => {
            let gray = img.to_luma8();
            let (w, h) = gray.dimensions();
            Array2::from_shape_vec((h as usize, w as usize), gray.into_raw())
                .map_err(|e| invalid_data(path, e))
        }
        _ => {
            let rgb = rgb_array(img).map_err(|e| invalid_data(path, e))?;
            Ok(colormap.decode(rgb.view()))
        }
    }
}

/// Convert a decoded image into an `(height, width, 3)` array.
///
/// Takes over the decoded RGB buffer without copying it.
pub fn rgb_array(img: DynamicImage) -> Result<Array3<u8>, ShapeError> {
    let rgb = img.to_rgb8();
    let (w, h) = rgb.dimensions();
    Array3::from_shape_vec((h as usize, w as usize, RGB_CHANNELS), rgb.into_raw())
}

fn invalid_data(path: &Path, e: ShapeError) -> PipelineError {
    PipelineError::io(path, std::io::Error::new(std::io::ErrorKind::InvalidData, e))
}
