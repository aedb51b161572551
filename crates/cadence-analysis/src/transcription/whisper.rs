//! whisper.cpp speech model

use std::ffi::CStr;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, OnceLock, PoisonError};

use super::error::{Result, TranscriptionError};
use super::tier::QualityTier;
use super::whisper_ffi::{Context, ContextOptions, WhisperLibrary, WhisperSamplingStrategy};
use super::{SpeechModel, SpeechModelLoader};
use crate::device::{InferenceStrategy, Precision};
use crate::models::ModelStore;

/// Let whisper detect the sung language
const AUTO_LANGUAGE: &CStr = c"auto";

/// A loaded whisper model; inference calls are serialised
pub struct WhisperModel {
    tier: QualityTier,
    lib: Arc<WhisperLibrary>,
    context: Mutex<Context>,
}

impl SpeechModel for WhisperModel {
    fn transcribe(&self, samples: &[f32]) -> Result<String> {
        let mut params = self.lib.full_default_params(WhisperSamplingStrategy::Greedy);
        params.configure_for_lyrics();
        params.language = AUTO_LANGUAGE.as_ptr();

        let mut context = self.context.lock().unwrap_or_else(PoisonError::into_inner);
        context
            .full(&params, samples)
            .map_err(TranscriptionError::Inference)?;

        let segments = (0..context.full_n_segments())
            .map(|i| context.full_get_segment_text(i))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(TranscriptionError::Inference)?;

        log::debug!(
            "transcribe: {} segments with the {} model",
            segments.len(),
            self.tier
        );

        Ok(segments
            .iter()
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" "))
    }
}

/// GPU placement follows the device, flash attention the precision
pub(crate) fn context_options(strategy: &InferenceStrategy) -> ContextOptions {
    ContextOptions {
        use_gpu: strategy.device.is_accelerator(),
        flash_attn: strategy.precision == Precision::Reduced,
    }
}

/// Loads whisper models from the model directory
pub struct WhisperLoader {
    models: ModelStore,
    library_path: Option<PathBuf>,
    library: OnceLock<std::result::Result<Arc<WhisperLibrary>, String>>,
}

impl WhisperLoader {
    pub fn new(models: ModelStore, library_path: Option<PathBuf>) -> Self {
        Self {
            models,
            library_path,
            library: OnceLock::new(),
        }
    }

    fn library(&self) -> Result<Arc<WhisperLibrary>> {
        self.library
            .get_or_init(|| {
                let lib = WhisperLibrary::locate(self.library_path.as_deref());
                if let Ok(lib) = &lib {
                    if let Some(info) = lib.system_info() {
                        log::debug!("library: {}", info.trim());
                    }
                }
                lib
            })
            .clone()
            .map_err(TranscriptionError::LibraryUnavailable)
    }
}

impl SpeechModelLoader for WhisperLoader {
    fn load(&self, tier: QualityTier, strategy: &InferenceStrategy) -> Result<Arc<dyn SpeechModel>> {
        // Checked first so a missing library never triggers a model download
        let lib = self.library()?;
        let path = self.models.ensure(&tier.model_file(), None)?;

        let options = context_options(strategy);
        log::info!(
            "load: whisper {} on {:?} ({:?} precision) from {:?}",
            tier,
            strategy.device,
            strategy.precision,
            path
        );
        let context = Context::new(Arc::clone(&lib), &path, options)
            .map_err(TranscriptionError::ContextInit)?;

        Ok(Arc::new(WhisperModel {
            tier,
            lib,
            context: Mutex::new(context),
        }))
    }
}
