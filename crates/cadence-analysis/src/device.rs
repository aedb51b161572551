//! Compute device selection
//!
//! The device is chosen once when the analyzer is built. Everything that
//! depends on it (inference precision, separation segment length) is read
//! from the resulting [`InferenceStrategy`].

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComputeDevice {
    Cpu,
    Accelerator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Full,
    /// Half precision / flash attention on the accelerator
    Reduced,
}

/// Device-dependent inference settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct InferenceStrategy {
    pub device: ComputeDevice,
    pub precision: Precision,
    /// Length of each separation window
    pub separation_segment_secs: f64,
}

impl ComputeDevice {
    /// Accelerator when requested and an execution provider is usable
    pub fn detect(prefer_accelerator: bool) -> Self {
        if prefer_accelerator && accelerator_available() {
            log::info!("detect: Using accelerator");
            ComputeDevice::Accelerator
        } else {
            log::info!(
                "detect: Using CPU{}",
                if prefer_accelerator { " (no accelerator found)" } else { "" }
            );
            ComputeDevice::Cpu
        }
    }

    pub fn is_accelerator(self) -> bool {
        self == ComputeDevice::Accelerator
    }

    pub fn strategy(self) -> InferenceStrategy {
        match self {
            ComputeDevice::Cpu => InferenceStrategy {
                device: self,
                precision: Precision::Full,
                separation_segment_secs: 10.0,
            },
            ComputeDevice::Accelerator => InferenceStrategy {
                device: self,
                precision: Precision::Reduced,
                separation_segment_secs: 30.0,
            },
        }
    }
}

impl Default for InferenceStrategy {
    fn default() -> Self {
        ComputeDevice::Cpu.strategy()
    }
}

#[cfg(feature = "cuda")]
fn accelerator_available() -> bool {
    use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider};
    CUDAExecutionProvider::default().is_available().unwrap_or(false)
}

#[cfg(all(feature = "directml", not(feature = "cuda")))]
fn accelerator_available() -> bool {
    use ort::execution_providers::{DirectMLExecutionProvider, ExecutionProvider};
    DirectMLExecutionProvider::default().is_available().unwrap_or(false)
}

#[cfg(not(any(feature = "cuda", feature = "directml")))]
fn accelerator_available() -> bool {
    false
}
