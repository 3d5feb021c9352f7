use crate::classifier::{Classifier, ClassifierError, InferenceEngine, Recognition};
use indicatif::ProgressBar;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadingMode {
    Parallel,
    Sequential,
}

/// Parameters that control how a directory scan behaves.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanConfig {
    /// Lower-case file extensions treated as images.
    pub extensions: Vec<String>,
    pub threading: ThreadingMode,
}

impl ScanConfig {
    /// Builds a new configuration from the supplied extensions and threading mode.
    pub fn new(extensions: Vec<String>, threading: ThreadingMode) -> Self {
        Self {
            extensions: extensions.into_iter().map(|ext| ext.to_lowercase()).collect(),
            threading,
        }
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self::new(default_extensions(), ThreadingMode::Parallel)
    }
}

/// Image extensions the bundled decoders understand.
pub fn default_extensions() -> Vec<String> {
    ["jpg", "jpeg", "png", "gif", "bmp"]
        .iter()
        .map(|ext| ext.to_string())
        .collect()
}

/// Outcome of classifying one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanEntry {
    pub path: PathBuf,
    /// Decoded width and height, `(0, 0)` when decoding failed.
    pub dimensions: (u32, u32),
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub recognitions: Vec<Recognition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Complete summary for a scan, suitable for serialisation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    pub entries: Vec<ScanEntry>,
}

impl ScanSummary {
    /// Entries that were classified, including those with no result above threshold.
    pub fn classified(&self) -> impl Iterator<Item = &ScanEntry> {
        self.entries.iter().filter(|entry| entry.error.is_none())
    }

    /// Entries whose decode or inference failed.
    pub fn failed(&self) -> impl Iterator<Item = &ScanEntry> {
        self.entries.iter().filter(|entry| entry.error.is_some())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn count_entries(root: &Path) -> u64 {
    WalkDir::new(root).into_iter().count() as u64
}

/// Classify every image under `root`.
///
/// Per-file failures are recorded on the entry and the scan continues.
/// Entries are sorted by path.
///
/// # Errors
///
/// Returns [`ClassifierError::Uninitialized`] without touching the
/// filesystem when the classifier is not ready.
pub fn scan<E: InferenceEngine>(
    root: &Path,
    config: &ScanConfig,
    classifier: &Classifier<E>,
    progress_bar: &ProgressBar,
) -> Result<ScanSummary, ClassifierError> {
    if let Some(cause) = classifier.init_error() {
        return Err(ClassifierError::Uninitialized {
            reason: cause.to_string(),
        });
    }

    let mut entries = match config.threading {
        ThreadingMode::Parallel => scan_parallel(root, config, classifier, progress_bar),
        ThreadingMode::Sequential => scan_sequential(root, config, classifier, progress_bar),
    };
    entries.sort_by(|a, b| a.path.cmp(&b.path));

    tracing::info!(
        root = %root.display(),
        files = entries.len(),
        failed = entries.iter().filter(|e| e.error.is_some()).count(),
        "scan finished"
    );
    Ok(ScanSummary { entries })
}

fn scan_parallel<E: InferenceEngine>(
    root: &Path,
    config: &ScanConfig,
    classifier: &Classifier<E>,
    progress_bar: &ProgressBar,
) -> Vec<ScanEntry> {
    WalkDir::new(root)
        .into_iter()
        .par_bridge()
        .filter_map(|entry| handle_entry(entry, config, classifier, progress_bar))
        .collect()
}

fn scan_sequential<E: InferenceEngine>(
    root: &Path,
    config: &ScanConfig,
    classifier: &Classifier<E>,
    progress_bar: &ProgressBar,
) -> Vec<ScanEntry> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| handle_entry(entry, config, classifier, progress_bar))
        .collect()
}

fn handle_entry<E: InferenceEngine>(
    entry: Result<walkdir::DirEntry, walkdir::Error>,
    config: &ScanConfig,
    classifier: &Classifier<E>,
    progress_bar: &ProgressBar,
) -> Option<ScanEntry> {
    progress_bar.inc(1);
    let entry = match entry {
        Ok(entry) => entry,
        Err(error) => {
            tracing::warn!(%error, "skipping unreadable entry");
            progress_bar.set_message(format!("Error: {}", error));
            return None;
        }
    };

    let path = entry.path();
    if !entry.file_type().is_file() || !has_image_extension(path, &config.extensions) {
        return None;
    }
    progress_bar.set_message(format!("Classifying: {}", path.display()));

    Some(classify_file(path, classifier).unwrap_or_else(|(dimensions, error)| {
        tracing::warn!(path = %path.display(), %error, "classification failed");
        progress_bar.set_message(format!("Error: {}", error));
        ScanEntry {
            path: path.to_path_buf(),
            dimensions,
            recognitions: Vec::new(),
            error: Some(error.to_string()),
        }
    }))
}

fn classify_file<E: InferenceEngine>(
    path: &Path,
    classifier: &Classifier<E>,
) -> Result<ScanEntry, ((u32, u32), ClassifierError)> {
    let image = image::open(path).map_err(|e| ((0, 0), ClassifierError::from(e)))?;
    let dimensions = (image.width(), image.height());
    let recognitions = classifier
        .classify(&image)
        .map_err(|error| (dimensions, error))?;
    Ok(ScanEntry {
        path: path.to_path_buf(),
        dimensions,
        recognitions,
        error: None,
    })
}

fn has_image_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let lower = ext.to_lowercase();
            extensions.iter().any(|candidate| candidate == &lower)
        })
        .unwrap_or(false)
}
