//! Image classification engine for Sightline.
//!
//! The [`classifier`] module holds the pipeline itself: label loading,
//! preprocessing, the inference engine capability and top-K ranking. The
//! scanner and reporting modules build batch classification of a directory
//! on top of it. Scan results (`ScanSummary`, `ScanEntry`, `ScanReport`) are
//! serialisable for downstream consumers.

pub mod classifier;
pub mod progress;
pub mod reporting;
pub mod scanner;

pub use classifier::{
    default_config_path, preprocess, rank, Bitmap, Classifier, ClassifierConfig, ClassifierError,
    InferenceEngine, InferenceError, InputTensor, LabelSet, PipelineConfig, PipelineState,
    PixelSource, Recognition,
};
pub use reporting::{
    create_report, print_recognitions, print_results, read_report, write_json, ReportingError,
    ScanReport,
};
pub use scanner::{
    count_entries, default_extensions, scan, ScanConfig, ScanEntry, ScanSummary, ThreadingMode,
};

#[cfg(feature = "onnx")]
pub use classifier::{default_ort_dylib_path, init_ort_runtime, OrtEngine};
