//! Model files on disk and loaded models in memory

mod cache;
mod store;

pub use cache::{ModelCache, StageKind};
pub use store::{DownloadProgress, ModelFile, ModelStore, ModelStoreError};
