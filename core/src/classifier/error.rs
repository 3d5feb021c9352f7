//! Error types for the classification pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while building or running a classifier.
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// A label or model resource could not be opened or read.
    #[error("failed to read {resource}: {source}")]
    Resource {
        resource: String,
        #[source]
        source: std::io::Error,
    },

    /// A label resource was readable but its contents were not understood.
    #[error("invalid label data in {resource}: {reason}")]
    LabelFormat { resource: String, reason: String },

    /// The model file does not exist.
    #[error("model not found: {}", .0.display())]
    ModelNotFound(PathBuf),

    /// The engine rejected the model bytes.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// `classify` was called on a pipeline whose construction failed.
    #[error("classifier is not initialized: {reason}")]
    Uninitialized { reason: String },

    /// The engine failed to produce a usable output vector.
    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// Pipeline options are out of range.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The supplied image cannot be preprocessed.
    #[error("invalid image: {0}")]
    InvalidImage(String),

    /// The image file could not be decoded.
    #[error("image decode error: {0}")]
    Image(#[from] image::ImageError),

    /// Reading, parsing or writing the configuration file failed.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ClassifierError {
    pub(crate) fn resource(resource: impl Into<String>, source: std::io::Error) -> Self {
        Self::Resource {
            resource: resource.into(),
            source,
        }
    }

    /// True for failures raised by a single inference call.
    pub fn is_inference(&self) -> bool {
        matches!(self, Self::Inference(_))
    }

    /// True when the pipeline never reached the ready state.
    pub fn is_uninitialized(&self) -> bool {
        matches!(self, Self::Uninitialized { .. })
    }
}

/// Failures of a single inference call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InferenceError {
    /// The engine signalled an execution fault.
    #[error("inference engine fault: {0}")]
    Engine(String),

    /// The output vector length does not match the label count.
    #[error("model produced {actual} scores but {expected} labels are loaded")]
    ShapeMismatch { expected: usize, actual: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_mismatch_mentions_both_lengths() {
        let err = ClassifierError::from(InferenceError::ShapeMismatch {
            expected: 3,
            actual: 5,
        });
        let message = format!("{err}");
        assert!(message.contains('3'));
        assert!(message.contains('5'));
        assert!(err.is_inference());
        assert!(!err.is_uninitialized());
    }

    #[test]
    fn resource_error_exposes_io_source() {
        use std::error::Error as _;

        let err = ClassifierError::resource(
            "labels.txt",
            std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
        );
        assert!(format!("{err}").starts_with("failed to read labels.txt"));
        assert!(err.source().is_some());
    }
}
