//! Runtime bindings to the whisper.cpp shared library
//!
//! The library is opened with `libloading` so the crate builds without a C
//! toolchain; transcription is simply unavailable when no library is found.
//! Struct layouts must match `whisper.h` exactly.

use libloading::Library;
use std::ffi::{c_char, c_float, c_int, c_void, CStr, CString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Opaque `whisper_context *`
type WhisperContextPtr = *mut c_void;

/// Nullable callback and grammar pointers
type CallbackPtr = *const c_void;

#[repr(C)]
#[derive(Clone, Copy)]
pub struct WhisperAheads {
    pub n_heads: usize,
    pub heads: *const c_void,
}

/// `whisper_context_params`
#[repr(C)]
#[derive(Clone, Copy)]
pub struct WhisperContextParams {
    pub use_gpu: bool,
    pub flash_attn: bool,
    pub gpu_device: c_int,

    pub dtw_token_timestamps: bool,
    pub dtw_aheads_preset: c_int,
    pub dtw_n_top: c_int,
    pub dtw_aheads: WhisperAheads,
    pub dtw_mem_size: usize,
}

#[repr(C)]
#[derive(Clone, Copy)]
pub struct WhisperVadParams {
    pub threshold: c_float,
    pub min_speech_duration_ms: c_int,
    pub min_silence_duration_ms: c_int,
    pub max_speech_duration_s: c_float,
    pub speech_pad_ms: c_int,
    pub samples_overlap: c_float,
}

/// `whisper_full_params`
#[repr(C)]
#[derive(Clone)]
pub struct WhisperFullParams {
    pub strategy: c_int,

    pub n_threads: c_int,
    pub n_max_text_ctx: c_int,
    pub offset_ms: c_int,
    pub duration_ms: c_int,

    pub translate: bool,
    pub no_context: bool,
    pub no_timestamps: bool,
    pub single_segment: bool,
    pub print_special: bool,
    pub print_progress: bool,
    pub print_realtime: bool,
    pub print_timestamps: bool,

    pub token_timestamps: bool,
    pub thold_pt: c_float,
    pub thold_ptsum: c_float,
    pub max_len: c_int,
    pub split_on_word: bool,
    pub max_tokens: c_int,

    pub debug_mode: bool,
    pub audio_ctx: c_int,

    pub tdrz_enable: bool,

    pub suppress_regex: *const c_char,

    pub initial_prompt: *const c_char,
    pub carry_initial_prompt: bool,
    pub prompt_tokens: *const c_int,
    pub prompt_n_tokens: c_int,

    pub language: *const c_char,
    pub detect_language: bool,

    pub suppress_blank: bool,
    pub suppress_nst: bool,

    pub temperature: c_float,
    pub max_initial_ts: c_float,
    pub length_penalty: c_float,

    pub temperature_inc: c_float,
    pub entropy_thold: c_float,
    pub logprob_thold: c_float,
    pub no_speech_thold: c_float,

    pub greedy_best_of: c_int,

    pub beam_search_beam_size: c_int,
    pub beam_search_patience: c_float,

    pub new_segment_callback: CallbackPtr,
    pub new_segment_callback_user_data: *mut c_void,

    pub progress_callback: CallbackPtr,
    pub progress_callback_user_data: *mut c_void,

    pub encoder_begin_callback: CallbackPtr,
    pub encoder_begin_callback_user_data: *mut c_void,

    pub abort_callback: CallbackPtr,
    pub abort_callback_user_data: *mut c_void,

    pub logits_filter_callback: CallbackPtr,
    pub logits_filter_callback_user_data: *mut c_void,

    pub grammar_rules: *const CallbackPtr,
    pub n_grammar_rules: usize,
    pub i_start_rule: usize,
    pub grammar_penalty: c_float,

    pub vad: bool,
    pub vad_model_path: *const c_char,
    pub vad_params: WhisperVadParams,
}

impl WhisperFullParams {
    /// Settings for whole-song lyrics: independent segments, quiet output,
    /// and thresholds that suppress hallucinated text over instrumental parts
    pub fn configure_for_lyrics(&mut self) {
        self.no_context = true;
        self.single_segment = false;
        self.no_timestamps = true;
        self.print_special = false;
        self.print_progress = false;
        self.print_realtime = false;
        self.print_timestamps = false;

        self.duration_ms = 0;
        self.max_tokens = 0;

        self.suppress_blank = true;
        self.suppress_nst = true;
        self.entropy_thold = 2.4;
        self.logprob_thold = -1.0;
        self.no_speech_thold = 0.6;
        self.temperature = 0.0;
        self.temperature_inc = 0.2;
    }
}

#[repr(C)]
#[allow(dead_code)]
pub enum WhisperSamplingStrategy {
    Greedy = 0,
    BeamSearch = 1,
}

/// An opened whisper.cpp library
pub struct WhisperLibrary {
    _lib: Library,
    context_default_params: unsafe extern "C" fn() -> WhisperContextParams,
    init_from_file_with_params:
        unsafe extern "C" fn(path_model: *const c_char, params: WhisperContextParams) -> WhisperContextPtr,
    free: unsafe extern "C" fn(ctx: WhisperContextPtr),
    full_default_params: unsafe extern "C" fn(strategy: c_int) -> WhisperFullParams,
    full: unsafe extern "C" fn(
        ctx: WhisperContextPtr,
        params: WhisperFullParams,
        samples: *const c_float,
        n_samples: c_int,
    ) -> c_int,
    full_n_segments: unsafe extern "C" fn(ctx: WhisperContextPtr) -> c_int,
    full_get_segment_text:
        unsafe extern "C" fn(ctx: WhisperContextPtr, i_segment: c_int) -> *const c_char,
    print_system_info: unsafe extern "C" fn() -> *const c_char,
}

// SAFETY: the library handle and function pointers hold no thread-local state
unsafe impl Send for WhisperLibrary {}
unsafe impl Sync for WhisperLibrary {}

/// Platform file name of the shared library
pub fn library_file_name() -> &'static str {
    if cfg!(windows) {
        "whisper.dll"
    } else if cfg!(target_os = "macos") {
        "libwhisper.dylib"
    } else {
        "libwhisper.so"
    }
}

impl WhisperLibrary {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        unsafe {
            let lib = Library::new(path.as_ref())
                .map_err(|e| format!("Failed to load whisper library: {}", e))?;

            let context_default_params = *lib
                .get::<unsafe extern "C" fn() -> WhisperContextParams>(
                    b"whisper_context_default_params\0",
                )
                .map_err(|e| format!("Failed to load whisper_context_default_params: {}", e))?;

            let init_from_file_with_params = *lib
                .get::<unsafe extern "C" fn(*const c_char, WhisperContextParams) -> WhisperContextPtr>(
                    b"whisper_init_from_file_with_params\0",
                )
                .map_err(|e| format!("Failed to load whisper_init_from_file_with_params: {}", e))?;

            let free = *lib
                .get::<unsafe extern "C" fn(WhisperContextPtr)>(b"whisper_free\0")
                .map_err(|e| format!("Failed to load whisper_free: {}", e))?;

            let full_default_params = *lib
                .get::<unsafe extern "C" fn(c_int) -> WhisperFullParams>(
                    b"whisper_full_default_params\0",
                )
                .map_err(|e| format!("Failed to load whisper_full_default_params: {}", e))?;

            let full = *lib
                .get::<unsafe extern "C" fn(
                    WhisperContextPtr,
                    WhisperFullParams,
                    *const c_float,
                    c_int,
                ) -> c_int>(b"whisper_full\0")
                .map_err(|e| format!("Failed to load whisper_full: {}", e))?;

            let full_n_segments = *lib
                .get::<unsafe extern "C" fn(WhisperContextPtr) -> c_int>(
                    b"whisper_full_n_segments\0",
                )
                .map_err(|e| format!("Failed to load whisper_full_n_segments: {}", e))?;

            let full_get_segment_text = *lib
                .get::<unsafe extern "C" fn(WhisperContextPtr, c_int) -> *const c_char>(
                    b"whisper_full_get_segment_text\0",
                )
                .map_err(|e| format!("Failed to load whisper_full_get_segment_text: {}", e))?;

            let print_system_info = *lib
                .get::<unsafe extern "C" fn() -> *const c_char>(b"whisper_print_system_info\0")
                .map_err(|e| format!("Failed to load whisper_print_system_info: {}", e))?;

            Ok(Self {
                _lib: lib,
                context_default_params,
                init_from_file_with_params,
                free,
                full_default_params,
                full,
                full_n_segments,
                full_get_segment_text,
                print_system_info,
            })
        }
    }

    /// Open the library from `explicit`, or search next to the executable,
    /// the working directory and finally the system library path
    pub fn locate(explicit: Option<&Path>) -> Result<Arc<Self>, String> {
        if let Some(path) = explicit {
            let lib = Self::load(path)?;
            log::info!("locate: Loaded whisper library from {:?}", path);
            return Ok(Arc::new(lib));
        }

        let name = library_file_name();
        let candidates: [Option<PathBuf>; 2] = [
            std::env::current_exe()
                .ok()
                .and_then(|p| p.parent().map(|p| p.join(name))),
            std::env::current_dir().ok().map(|d| d.join(name)),
        ];

        for path in candidates.iter().flatten() {
            if !path.exists() {
                continue;
            }
            match Self::load(path) {
                Ok(lib) => {
                    log::info!("locate: Loaded whisper library from {:?}", path);
                    return Ok(Arc::new(lib));
                }
                Err(e) => log::warn!("locate: {:?}: {}", path, e),
            }
        }

        let lib = Self::load(name)?;
        log::info!("locate: Loaded whisper library from system path");
        Ok(Arc::new(lib))
    }

    pub fn full_default_params(&self, strategy: WhisperSamplingStrategy) -> WhisperFullParams {
        unsafe { (self.full_default_params)(strategy as c_int) }
    }

    /// Backends compiled into the library (CPU features, CUDA, Metal...)
    pub fn system_info(&self) -> Option<String> {
        let ptr = unsafe { (self.print_system_info)() };
        if ptr.is_null() {
            return None;
        }
        let c_str = unsafe { CStr::from_ptr(ptr) };
        c_str.to_str().ok().map(str::to_string)
    }
}

/// Loaded model; freed on drop
pub struct Context {
    lib: Arc<WhisperLibrary>,
    ptr: WhisperContextPtr,
}

// SAFETY: a whisper context may move between threads; calls are serialised by
// the owner
unsafe impl Send for Context {}

/// Context creation settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContextOptions {
    pub use_gpu: bool,
    pub flash_attn: bool,
}

impl Context {
    /// Load a ggml model
    pub fn new(lib: Arc<WhisperLibrary>, model_path: &Path, options: ContextOptions) -> Result<Self, String> {
        let path_str = model_path.to_str().ok_or("Invalid model path")?;
        let c_path = CString::new(path_str).map_err(|e| format!("Invalid path: {}", e))?;

        let mut params = unsafe { (lib.context_default_params)() };
        params.use_gpu = options.use_gpu;
        params.flash_attn = options.flash_attn;

        let ptr = unsafe { (lib.init_from_file_with_params)(c_path.as_ptr(), params) };
        if ptr.is_null() {
            return Err(format!("Failed to initialize whisper context from: {}", path_str));
        }

        Ok(Self { lib, ptr })
    }

    pub fn full(&mut self, params: &WhisperFullParams, samples: &[f32]) -> Result<(), String> {
        let result = unsafe {
            (self.lib.full)(self.ptr, params.clone(), samples.as_ptr(), samples.len() as c_int)
        };
        if result != 0 {
            return Err(format!("Transcription failed with code: {}", result));
        }
        Ok(())
    }

    pub fn full_n_segments(&self) -> i32 {
        unsafe { (self.lib.full_n_segments)(self.ptr) }
    }

    pub fn full_get_segment_text(&self, i_segment: i32) -> Result<String, String> {
        let ptr = unsafe { (self.lib.full_get_segment_text)(self.ptr, i_segment) };
        if ptr.is_null() {
            return Err(format!("Failed to get segment {} text", i_segment));
        }
        let c_str = unsafe { CStr::from_ptr(ptr) };
        c_str
            .to_str()
            .map(|s| s.to_string())
            .map_err(|e| format!("Invalid UTF-8 in segment: {}", e))
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        unsafe { (self.lib.free)(self.ptr) };
    }
}
