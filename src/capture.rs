use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// A freshly captured face image, as raw encoded bytes (e.g. a JPEG).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Probe(Vec<u8>);

impl Probe {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Captured image is empty")]
    Empty,
}

/// Something that can take a picture of the person at the booth.
#[async_trait]
pub trait Capture: Send + Sync {
    async fn capture_probe(&self) -> Result<Probe, CaptureError>;
}

/// Captures by reading an image file, standing in for a camera.
#[derive(Debug, Clone)]
pub struct FileCapture {
    path: PathBuf,
}

impl FileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Capture for FileCapture {
    async fn capture_probe(&self) -> Result<Probe, CaptureError> {
        let bytes = tokio::fs::read(&self.path)
            .await
            .map_err(|source| CaptureError::Io {
                path: self.path.clone(),
                source,
            })?;
        if bytes.is_empty() {
            return Err(CaptureError::Empty);
        }
        Ok(Probe::new(bytes))
    }
}
