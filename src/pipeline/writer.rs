//! Background visualisation writer.
//!
//! Colourising and PNG-encoding a full-resolution label map is slow enough to
//! be worth overlapping with inference on the next image. Writes are handed
//! to the tokio blocking pool and only awaited at [`shutdown`](VisualizationWriter::shutdown).

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ndarray::Array2;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::PipelineError;

use super::colormap::ColorMap;

/// Fire-and-forget writer of colourised label maps.
pub struct VisualizationWriter {
    out_dir: PathBuf,
    colormap: Arc<ColorMap>,
    handle: Handle,
    pending: Vec<(PathBuf, JoinHandle<Result<(), PipelineError>>)>,
}

impl VisualizationWriter {
    /// Create the output directory and a writer spawning onto `handle`.
    ///
    /// The number of concurrent writes is bounded by the runtime's blocking
    /// thread limit.
    pub fn new(
        out_dir: impl Into<PathBuf>,
        colormap: Arc<ColorMap>,
        handle: Handle,
    ) -> Result<Self, PipelineError> {
        let out_dir = out_dir.into();
        fs::create_dir_all(&out_dir).map_err(|e| PipelineError::io(&out_dir, e))?;
        Ok(Self {
            out_dir,
            colormap,
            handle,
            pending: Vec::new(),
        })
    }

    pub fn out_dir(&self) -> &Path {
        &self.out_dir
    }

    /// Output path for an input file name: same stem, `.png` extension.
    pub fn output_path(&self, file_name: &str) -> PathBuf {
        let stem = Path::new(file_name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_name.to_string());
        self.out_dir.join(format!("{stem}.png"))
    }

    /// Queue a label map for writing and return immediately.
    pub fn submit(&mut self, labels: Array2<u8>, file_name: &str) {
        let path = self.output_path(file_name);
        let colormap = Arc::clone(&self.colormap);
        let task_path = path.clone();
        let task = self
            .handle
            .spawn_blocking(move || write_labels(&task_path, &labels, &colormap));
        debug!("Queued visualisation {:?}", path);
        self.pending.push((path, task));
    }

    /// Number of writes submitted and not yet awaited.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Wait for every queued write. Returns the number of writes that failed;
    /// each failure is logged.
    pub async fn shutdown(self) -> usize {
        let mut failures = 0;
        for (path, task) in self.pending {
            let result = match task.await {
                Ok(result) => result,
                Err(e) => Err(PipelineError::Writer(e.to_string())),
            };
            if let Err(e) = result {
                warn!("Failed to write {:?}: {}", path, e);
                failures += 1;
            }
        }
        failures
    }
}

/// Colourise `labels` and save them as PNG at `path`.
pub fn write_labels(path: &Path, labels: &Array2<u8>, colormap: &ColorMap) -> Result<(), PipelineError> {
    colormap
        .colorize(labels.view())
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|e| PipelineError::image(path, e))
}
