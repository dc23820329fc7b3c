use std::io::Write;
use std::process::ExitStatus;
use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::Deserialize;
use thiserror::Error;
use tokio::process::Command;

use crate::capture::Probe;
use crate::model::voter::TemplateRef;

/// Why a single probe/template comparison could not produce an answer.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("Template {0} does not exist")]
    MissingTemplate(TemplateRef),
    #[error("Could not stage probe image: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not run verifier: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("Verifier exited with {status}: {stderr}")]
    Status { status: ExitStatus, stderr: String },
    #[error("Malformed verifier output: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("Verifier did not answer within {0:?}")]
    TimedOut(Duration),
    #[error("{0}")]
    Other(String),
}

/// Compares a probe against one enrolled template.
///
/// Implementations may be slow, and may fail for one template while working
/// for others.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, probe: &Probe, template: &TemplateRef) -> Result<bool, VerifyError>;
}

/// What the external command prints. Extra fields (distances, thresholds...) are ignored.
#[derive(Debug, Deserialize)]
struct VerifyResponse {
    verified: bool,
}

/// Runs an external face verification command for each comparison:
/// `<command...> <probe_path> <template_path>`.
///
/// The command must exit successfully and print `{"verified": <bool>}` on stdout.
/// The child is killed if the verification is abandoned.
#[derive(Debug, Clone)]
pub struct CommandVerifier {
    program: String,
    args: Vec<String>,
}

impl CommandVerifier {
    /// Returns [`None`] if `command` is empty.
    pub fn new(command: &[String]) -> Option<Self> {
        let (program, args) = command.split_first()?;
        Some(Self {
            program: program.clone(),
            args: args.to_vec(),
        })
    }
}

#[async_trait]
impl Verifier for CommandVerifier {
    async fn verify(&self, probe: &Probe, template: &TemplateRef) -> Result<bool, VerifyError> {
        if !template.path().is_file() {
            return Err(VerifyError::MissingTemplate(template.clone()));
        }

        // Removed when dropped, including on cancellation.
        let mut probe_file = tempfile::Builder::new()
            .prefix("probe")
            .suffix(".jpg")
            .tempfile()?;
        probe_file.write_all(probe.bytes())?;
        probe_file.flush()?;

        debug!("Running {} against {template}", self.program);
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(probe_file.path())
            .arg(template.path())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(VerifyError::Spawn)?;

        if !output.status.success() {
            return Err(VerifyError::Status {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let response: VerifyResponse = serde_json::from_slice(&output.stdout)?;
        Ok(response.verified)
    }
}
