//! Class colour tables.
//!
//! Ground-truth masks in aerial segmentation datasets are commonly stored as
//! colour-coded RGB images. A [`ColorMap`] converts those colours to class
//! indices and renders predicted label maps back to colour.

use std::collections::HashMap;

use image::{Rgb, RgbImage};
use ndarray::{Array2, ArrayView2, ArrayView3};

/// Label written for pixels that must not be scored.
pub const IGNORE_INDEX: u8 = 255;

/// Colour used when rendering labels that have no entry in the table.
const UNKNOWN_COLOR: [u8; 3] = [255, 255, 255];

/// The 16-class iSAID palette, background first.
const ISAID_CLASSES: [(&str, [u8; 3]); 16] = [
    ("background", [0, 0, 0]),
    ("ship", [0, 0, 63]),
    ("storage_tank", [0, 191, 127]),
    ("baseball_diamond", [0, 63, 0]),
    ("tennis_court", [0, 63, 127]),
    ("basketball_court", [0, 63, 191]),
    ("ground_track_field", [0, 63, 255]),
    ("bridge", [0, 127, 63]),
    ("large_vehicle", [0, 127, 127]),
    ("small_vehicle", [0, 0, 127]),
    ("helicopter", [0, 0, 191]),
    ("swimming_pool", [0, 0, 255]),
    ("roundabout", [0, 63, 63]),
    ("soccer_ball_field", [0, 127, 191]),
    ("plane", [0, 127, 255]),
    ("harbor", [0, 100, 155]),
];

/// Ordered class names and their RGB colours.
#[derive(Debug, Clone)]
pub struct ColorMap {
    names: Vec<String>,
    colors: Vec<[u8; 3]>,
    lookup: HashMap<[u8; 3], u8>,
}

impl ColorMap {
    /// Build a colour map from `(name, rgb)` entries; the entry index is the class index.
    ///
    /// At most 255 entries are kept so every class fits in a `u8` label
    /// distinct from [`IGNORE_INDEX`].
    pub fn new<S: Into<String>>(entries: impl IntoIterator<Item = (S, [u8; 3])>) -> Self {
        let mut names = Vec::new();
        let mut colors = Vec::new();
        let mut lookup = HashMap::new();
        for (index, (name, rgb)) in entries.into_iter().take(IGNORE_INDEX as usize).enumerate() {
            names.push(name.into());
            colors.push(rgb);
            lookup.entry(rgb).or_insert(index as u8);
        }
        Self {
            names,
            colors,
            lookup,
        }
    }

    /// The iSAID aerial-imagery palette.
    pub fn isaid() -> Self {
        Self::new(ISAID_CLASSES)
    }

    pub fn len(&self) -> usize {
        self.colors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn colors(&self) -> &[[u8; 3]] {
        &self.colors
    }

    /// Class index for an exact colour match.
    pub fn class_of(&self, rgb: [u8; 3]) -> Option<u8> {
        self.lookup.get(&rgb).copied()
    }

    /// Convert an `(h, w, 3)` colour mask to labels. Unknown colours map to
    /// [`IGNORE_INDEX`].
    pub fn decode(&self, mask: ArrayView3<'_, u8>) -> Array2<u8> {
        let (h, w, _) = mask.dim();
        Array2::from_shape_fn((h, w), |(y, x)| {
            let rgb = [mask[[y, x, 0]], mask[[y, x, 1]], mask[[y, x, 2]]];
            self.class_of(rgb).unwrap_or(IGNORE_INDEX)
        })
    }

    /// Render a label map as an RGB image.
    pub fn colorize(&self, labels: ArrayView2<'_, u8>) -> RgbImage {
        let (h, w) = labels.dim();
        RgbImage::from_fn(w as u32, h as u32, |x, y| {
            let label = labels[[y as usize, x as usize]] as usize;
            Rgb(self.colors.get(label).copied().unwrap_or(UNKNOWN_COLOR))
        })
    }
}

impl Default for ColorMap {
    fn default() -> Self {
        Self::isaid()
    }
}
