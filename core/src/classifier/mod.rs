//! Image classification pipeline.
//!
//! A [`Classifier`] owns a label set and a loaded model and exposes a single
//! operation, [`Classifier::classify`]:
//!
//! 1. resize the image to the model's square input and normalise it into an
//!    [`InputTensor`] ([`preprocess`]);
//! 2. run the model once through an [`InferenceEngine`];
//! 3. keep the scores above the confidence threshold and return the best
//!    `max_results` as [`Recognition`]s ([`rank`]).
//!
//! # Construction
//!
//! Loading never panics and never returns an error. If the labels, the model
//! or the configuration cannot be used, the classifier is built in the
//! [`PipelineState::Uninitialized`] state and every `classify` call fails
//! with [`ClassifierError::Uninitialized`]. Check [`Classifier::is_ready`]
//! or [`Classifier::init_error`] after construction.
//!
//! ```no_run
//! use sightline_core::classifier::{init_ort_runtime, Classifier, OrtEngine, PipelineConfig};
//! use std::path::Path;
//!
//! init_ort_runtime(".vendor/onnxruntime/lib/libonnxruntime.so")?;
//! let classifier = Classifier::from_paths(
//!     OrtEngine,
//!     PipelineConfig::new(224),
//!     Path::new("models/labels.txt"),
//!     Path::new("models/mobilenet.onnx"),
//! );
//! let image = image::open("cat.jpg")?;
//! for recognition in classifier.classify(&image)? {
//!     println!("{}", recognition);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod config;
mod error;
mod labels;
mod preprocess;
mod ranking;
mod runtime;

pub use config::{
    default_config_path, ClassifierConfig, PipelineConfig, DEFAULT_CONFIG_FILE, MAX_INPUT_SIDE,
};
pub use error::{ClassifierError, InferenceError};
pub use labels::{
    load_labels_from_csv, load_labels_from_json, load_labels_from_text, LabelSet, UNKNOWN_LABEL,
};
pub use preprocess::{preprocess, resize_nearest, Bitmap, InputTensor, PixelSource};
pub use ranking::{rank, rank_with_config, Recognition};
pub use runtime::{read_model, read_model_file, InferenceEngine};

#[cfg(feature = "onnx")]
pub use runtime::{default_ort_dylib_path, init_ort_runtime, OrtEngine, OrtModel};

use std::io::Read;
use std::path::Path;

/// Readiness of a [`Classifier`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineState {
    /// Labels, model and configuration loaded; `classify` may be called.
    Ready,
    /// Construction failed; `classify` always fails.
    Uninitialized,
}

enum Slot<H> {
    Ready { labels: LabelSet, model: H },
    Uninitialized { cause: ClassifierError },
}

/// Classification pipeline bound to one engine, model and label set.
pub struct Classifier<E: InferenceEngine> {
    engine: E,
    config: PipelineConfig,
    slot: Slot<E::Handle>,
}

impl<E: InferenceEngine> Classifier<E> {
    /// Load labels and model from files.
    pub fn from_paths(engine: E, config: PipelineConfig, labels: &Path, model: &Path) -> Self {
        let loaded = LabelSet::load(labels)
            .and_then(|labels| read_model_file(model).map(|bytes| (labels, bytes)));
        Self::build(engine, config, loaded)
    }

    /// Load labels (one per line) and model bytes from arbitrary streams.
    pub fn from_readers<L: Read, M: Read>(engine: E, config: PipelineConfig, labels: L, model: M) -> Self {
        let loaded = LabelSet::from_reader(labels)
            .and_then(|labels| read_model(model).map(|bytes| (labels, bytes)));
        Self::build(engine, config, loaded)
    }

    /// Build from an already loaded label set and in-memory model bytes.
    pub fn from_parts(engine: E, config: PipelineConfig, labels: LabelSet, model: &[u8]) -> Self {
        let slot = match Self::load_model(&engine, &config, labels, model) {
            Ok((labels, model)) => {
                tracing::info!(
                    labels = labels.len(),
                    input_side = config.input_side,
                    "classifier ready"
                );
                Slot::Ready { labels, model }
            }
            Err(cause) => Self::uninitialized(cause),
        };
        Self {
            engine,
            config,
            slot,
        }
    }

    /// Build from a [`ClassifierConfig`] document.
    pub fn from_config(engine: E, config: &ClassifierConfig) -> Self {
        Self::from_paths(
            engine,
            config.pipeline.clone(),
            &config.labels_path(),
            &config.model_path(),
        )
    }

    fn build(
        engine: E,
        config: PipelineConfig,
        loaded: Result<(LabelSet, Vec<u8>), ClassifierError>,
    ) -> Self {
        match loaded {
            Ok((labels, bytes)) => Self::from_parts(engine, config, labels, &bytes),
            Err(cause) => Self {
                engine,
                config,
                slot: Self::uninitialized(cause),
            },
        }
    }

    fn load_model(
        engine: &E,
        config: &PipelineConfig,
        labels: LabelSet,
        model: &[u8],
    ) -> Result<(LabelSet, E::Handle), ClassifierError> {
        config.validate()?;
        let handle = engine.load(model, config)?;
        if let Some(outputs) = engine.output_len(&handle) {
            if outputs != labels.len() {
                tracing::warn!(
                    labels = labels.len(),
                    outputs,
                    "label count does not match model output length"
                );
            }
        }
        Ok((labels, handle))
    }

    fn uninitialized(cause: ClassifierError) -> Slot<E::Handle> {
        tracing::warn!(error = %cause, "classifier left uninitialized");
        Slot::Uninitialized { cause }
    }

    pub fn state(&self) -> PipelineState {
        match self.slot {
            Slot::Ready { .. } => PipelineState::Ready,
            Slot::Uninitialized { .. } => PipelineState::Uninitialized,
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == PipelineState::Ready
    }

    /// Why construction failed, if it did.
    pub fn init_error(&self) -> Option<&ClassifierError> {
        match &self.slot {
            Slot::Ready { .. } => None,
            Slot::Uninitialized { cause } => Some(cause),
        }
    }

    pub fn labels(&self) -> Option<&LabelSet> {
        match &self.slot {
            Slot::Ready { labels, .. } => Some(labels),
            Slot::Uninitialized { .. } => None,
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Classify one image.
    ///
    /// # Errors
    ///
    /// - [`ClassifierError::Uninitialized`] if construction failed; the
    ///   engine is not called.
    /// - [`ClassifierError::InvalidImage`] for a zero-sized image.
    /// - [`ClassifierError::Inference`] if the engine faults or returns a
    ///   score vector whose length differs from the label count.
    pub fn classify<P: PixelSource + ?Sized>(&self, image: &P) -> Result<Vec<Recognition>, ClassifierError> {
        let (labels, model) = match &self.slot {
            Slot::Ready { labels, model } => (labels, model),
            Slot::Uninitialized { cause } => {
                return Err(ClassifierError::Uninitialized {
                    reason: cause.to_string(),
                })
            }
        };

        let input = preprocess(image, &self.config)?;
        let scores = self.engine.run(model, &input)?;
        if scores.len() != labels.len() {
            return Err(InferenceError::ShapeMismatch {
                expected: labels.len(),
                actual: scores.len(),
            }
            .into());
        }

        let results = rank_with_config(&scores, labels, &self.config);
        tracing::debug!(results = results.len(), "classified image");
        Ok(results)
    }
}
