//! Inference engine capability and the ONNX Runtime binding.
//!
//! The pipeline only talks to [`InferenceEngine`]; swapping engines never
//! touches preprocessing or ranking.

use super::config::PipelineConfig;
use super::error::{ClassifierError, InferenceError};
use super::preprocess::InputTensor;
use std::io::Read;
use std::path::Path;

/// Something that can turn model bytes into a handle and run it.
///
/// `run` takes a shared handle. Engines whose sessions cannot execute
/// concurrently must serialise inside `run`, around the execution call
/// only.
pub trait InferenceEngine: Send + Sync {
    /// Loaded, immutable model.
    type Handle: Send + Sync;

    /// Build a handle from the full model bytes.
    fn load(&self, model: &[u8], config: &PipelineConfig) -> Result<Self::Handle, ClassifierError>;

    /// Execute the model on one input tensor and return its score vector.
    fn run(&self, handle: &Self::Handle, input: &InputTensor) -> Result<Vec<f32>, InferenceError>;

    /// Output vector length advertised by the model, if known up front.
    fn output_len(&self, _handle: &Self::Handle) -> Option<usize> {
        None
    }
}

/// Read a model file fully into memory.
pub fn read_model_file(path: &Path) -> Result<Vec<u8>, ClassifierError> {
    if !path.exists() {
        return Err(ClassifierError::ModelNotFound(path.to_path_buf()));
    }
    std::fs::read(path).map_err(|e| ClassifierError::resource(path.display().to_string(), e))
}

/// Read model bytes from an arbitrary stream.
pub fn read_model<R: Read>(mut reader: R) -> Result<Vec<u8>, ClassifierError> {
    let mut bytes = Vec::new();
    reader
        .read_to_end(&mut bytes)
        .map_err(|e| ClassifierError::resource("model resource", e))?;
    Ok(bytes)
}

#[cfg(feature = "onnx")]
pub use self::onnx::{default_ort_dylib_path, init_ort_runtime, OrtEngine, OrtModel};

#[cfg(feature = "onnx")]
mod onnx {
    use super::*;
    use ndarray::Array4;
    use ort::session::{builder::GraphOptimizationLevel, Session};
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    /// Global flag to track if ORT runtime has been initialized.
    static ORT_INITIALIZED: OnceLock<()> = OnceLock::new();

    /// Initialize the ONNX Runtime with the path to the dynamic library.
    ///
    /// Must be called once before [`OrtEngine`] loads a model. Subsequent
    /// calls after a successful initialization are no-ops.
    ///
    /// # Arguments
    ///
    /// * `dylib_path` - Path to `onnxruntime.dll` (Windows) or `libonnxruntime.so` (Linux)
    ///
    /// # Example
    ///
    /// ```no_run
    /// use sightline_core::classifier::init_ort_runtime;
    ///
    /// init_ort_runtime(".vendor/onnxruntime/lib/libonnxruntime.so")?;
    /// # Ok::<(), sightline_core::classifier::ClassifierError>(())
    /// ```
    pub fn init_ort_runtime(dylib_path: impl AsRef<Path>) -> Result<(), ClassifierError> {
        let path = dylib_path.as_ref();

        if ORT_INITIALIZED.get().is_some() {
            return Ok(());
        }

        if !path.exists() {
            return Err(ClassifierError::ModelLoad(format!(
                "ONNX Runtime library not found at: {}",
                path.display()
            )));
        }

        let path_str = path.to_str().ok_or_else(|| {
            ClassifierError::ModelLoad("ONNX Runtime path contains invalid UTF-8".to_string())
        })?;

        ort::init_from(path_str)
            .commit()
            .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?;

        let _ = ORT_INITIALIZED.set(());
        tracing::info!(library = %path.display(), "ONNX Runtime initialized");
        Ok(())
    }

    /// Default location of the ONNX Runtime library, relative to the working directory.
    pub fn default_ort_dylib_path() -> PathBuf {
        #[cfg(windows)]
        {
            PathBuf::from(".vendor/onnxruntime/lib/onnxruntime.dll")
        }
        #[cfg(target_os = "macos")]
        {
            PathBuf::from(".vendor/onnxruntime/lib/libonnxruntime.dylib")
        }
        #[cfg(not(any(windows, target_os = "macos")))]
        {
            PathBuf::from(".vendor/onnxruntime/lib/libonnxruntime.so")
        }
    }

    /// ONNX Runtime engine. Models take an NHWC `[1, S, S, 3]` float input.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct OrtEngine;

    /// Loaded ONNX session.
    pub struct OrtModel {
        session: Mutex<Session>,
        input_name: String,
        output_len: Option<usize>,
    }

    /// Class count from a model output shape: the last dimension, when the
    /// model states it. Dynamic (`-1`) or zero dimensions yield `None`.
    fn class_count(dimensions: &[i64]) -> Option<usize> {
        dimensions
            .last()
            .copied()
            .filter(|&dim| dim > 0)
            .and_then(|dim| usize::try_from(dim).ok())
    }

    impl InferenceEngine for OrtEngine {
        type Handle = OrtModel;

        fn load(&self, model: &[u8], config: &PipelineConfig) -> Result<OrtModel, ClassifierError> {
            if config.use_accelerator {
                tracing::debug!("accelerator requested; no execution provider compiled in, using CPU");
            }

            let session = Session::builder()
                .and_then(|builder| builder.with_optimization_level(GraphOptimizationLevel::Level3))
                .and_then(|builder| builder.with_intra_threads(config.inference_threads))
                .and_then(|builder| builder.commit_from_memory(model))
                .map_err(|e| ClassifierError::ModelLoad(e.to_string()))?;

            let input_name = session
                .inputs
                .first()
                .map(|i| i.name.clone())
                .unwrap_or_else(|| "input".to_string());

            let output_len = session
                .outputs
                .first()
                .and_then(|output| output.output_type.tensor_shape())
                .and_then(|shape| class_count(shape));
            tracing::debug!(input = %input_name, outputs = ?output_len, "ONNX session ready");

            Ok(OrtModel {
                session: Mutex::new(session),
                input_name,
                output_len,
            })
        }

        fn output_len(&self, handle: &OrtModel) -> Option<usize> {
            handle.output_len
        }

        fn run(&self, handle: &OrtModel, input: &InputTensor) -> Result<Vec<f32>, InferenceError> {
            let side = input.side() as usize;
            let array = Array4::from_shape_vec((1, side, side, 3), input.as_slice().to_vec())
                .map_err(|e| InferenceError::Engine(e.to_string()))?;
            let tensor = ort::value::Tensor::from_array(array)
                .map_err(|e| InferenceError::Engine(e.to_string()))?;

            let mut session = handle
                .session
                .lock()
                .map_err(|_| InferenceError::Engine("session lock poisoned".to_string()))?;

            let outputs = session
                .run(ort::inputs![handle.input_name.as_str() => tensor])
                .map_err(|e| InferenceError::Engine(e.to_string()))?;

            let output = outputs
                .values()
                .next()
                .ok_or_else(|| InferenceError::Engine("no output tensor found".to_string()))?;

            let (_shape, scores) = output
                .try_extract_tensor::<f32>()
                .map_err(|e| InferenceError::Engine(e.to_string()))?;

            let scores = scores.to_vec();
            Ok(scores)
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_model_file_is_reported_as_not_found() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.onnx");
        assert!(matches!(
            read_model_file(&path),
            Err(ClassifierError::ModelNotFound(p)) if p == path
        ));
    }

    #[test]
    fn reads_model_bytes_from_file_and_stream() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("model.bin");
        std::fs::write(&path, [1u8, 2, 3]).unwrap();
        assert_eq!(read_model_file(&path).unwrap(), vec![1, 2, 3]);
        assert_eq!(read_model(&[4u8, 5][..]).unwrap(), vec![4, 5]);
    }
}
