//! Model file downloads and on-disk cache
//!
//! Model files are fetched on first use and kept in the models directory
//! (`~/.cache/cadence/models` by default). Downloads go to a `.tmp` sibling
//! and are renamed once their size has been verified, so a partially
//! downloaded file is never mistaken for a usable model.

use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Download progress callback (0.0 to 1.0)
pub type DownloadProgress = Box<dyn Fn(f32) + Send>;

#[derive(Error, Debug)]
pub enum ModelStoreError {
    #[error("Model download failed: {0}")]
    DownloadFailed(String),

    #[error("Download of {url} incomplete: expected {expected} bytes, got {actual}")]
    Incomplete {
        url: String,
        expected: u64,
        actual: u64,
    },

    #[error("Model cache I/O error at {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, ModelStoreError>;

/// A downloadable model file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFile {
    pub filename: String,
    pub url: String,
}

impl ModelFile {
    pub fn new(filename: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            filename: filename.into(),
            url: url.into(),
        }
    }
}

/// Directory of downloaded model files
#[derive(Debug, Clone)]
pub struct ModelStore {
    cache_dir: PathBuf,
}

impl ModelStore {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Local path where `model` is (or would be) stored
    pub fn model_path(&self, model: &ModelFile) -> PathBuf {
        self.cache_dir.join(&model.filename)
    }

    pub fn is_available(&self, model: &ModelFile) -> bool {
        self.model_path(model).is_file()
    }

    /// Path to `model`, downloading it first if needed
    pub fn ensure(&self, model: &ModelFile, progress: Option<DownloadProgress>) -> Result<PathBuf> {
        let path = self.model_path(model);
        if path.is_file() {
            log::debug!("ensure: {} found at {:?}", model.filename, path);
            if let Some(cb) = &progress {
                cb(1.0);
            }
            return Ok(path);
        }

        log::info!("ensure: Downloading {} from {}", model.filename, model.url);
        self.download_file(&model.url, &path, progress)?;
        Ok(path)
    }

    fn download_file(
        &self,
        url: &str,
        target_path: &Path,
        progress: Option<DownloadProgress>,
    ) -> Result<()> {
        fs::create_dir_all(&self.cache_dir).map_err(io_error(&self.cache_dir))?;

        let temp_path = target_path.with_extension("tmp");

        let response = ureq::get(url)
            .call()
            .map_err(|e| ModelStoreError::DownloadFailed(format!("{}: {}", url, e)))?;

        let content_length: Option<u64> = response
            .header("Content-Length")
            .and_then(|s| s.parse().ok());

        let mut file = fs::File::create(&temp_path).map_err(io_error(&temp_path))?;
        let mut reader = response.into_reader();
        let mut buffer = [0u8; 8192];
        let mut downloaded: u64 = 0;

        loop {
            let bytes_read = reader.read(&mut buffer).map_err(io_error(&temp_path))?;
            if bytes_read == 0 {
                break;
            }
            file.write_all(&buffer[..bytes_read])
                .map_err(io_error(&temp_path))?;
            downloaded += bytes_read as u64;

            if let (Some(cb), Some(total)) = (&progress, content_length) {
                // Hold below 100% until the size check passes
                cb((downloaded as f32 / total as f32).min(0.99));
            }
        }

        file.flush().map_err(io_error(&temp_path))?;
        drop(file);

        if let Some(expected) = content_length {
            if downloaded != expected {
                fs::remove_file(&temp_path).ok();
                return Err(ModelStoreError::Incomplete {
                    url: url.to_string(),
                    expected,
                    actual: downloaded,
                });
            }
        }

        fs::rename(&temp_path, target_path).map_err(io_error(target_path))?;

        log::info!(
            "download_file: Stored {:?} ({} bytes)",
            target_path.file_name().unwrap_or_default(),
            downloaded
        );

        if let Some(cb) = progress {
            cb(1.0);
        }
        Ok(())
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ModelStoreError {
    let path = path.to_path_buf();
    move |source| ModelStoreError::Io { path, source }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_path() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let model = ModelFile::new("htdemucs.onnx", "https://example.invalid/htdemucs.onnx");
        assert_eq!(store.model_path(&model), dir.path().join("htdemucs.onnx"));
        assert!(!store.is_available(&model));
    }

    #[test]
    fn test_existing_file_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        // An unreachable URL proves no request is made
        let model = ModelFile::new("ggml-base.bin", "http://127.0.0.1:9/ggml-base.bin");
        std::fs::write(store.model_path(&model), b"weights").unwrap();

        let reported = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let sink = reported.clone();
        let path = store
            .ensure(&model, Some(Box::new(move |p| sink.lock().unwrap().push(p))))
            .unwrap();

        assert_eq!(path, dir.path().join("ggml-base.bin"));
        assert_eq!(*reported.lock().unwrap(), vec![1.0]);
    }

    #[test]
    fn test_failed_download_leaves_no_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        let model = ModelFile::new("missing.onnx", "http://127.0.0.1:9/missing.onnx");

        assert!(matches!(store.ensure(&model, None), Err(ModelStoreError::DownloadFailed(_))));
        assert!(!store.is_available(&model));
    }
}
